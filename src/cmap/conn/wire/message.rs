use bitflags::bitflags;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use super::{
    header::{Header, OpCode},
    next_request_id,
};
use crate::{
    bson::{Document, RawDocument, RawDocumentBuf},
    error::{Error, Result},
    sdam::DEFAULT_MAX_MESSAGE_SIZE_BYTES,
};

/// An OP_MSG wire protocol message carrying a single document section.
#[derive(Clone, Debug)]
pub struct Message {
    pub(crate) document_payload: RawDocumentBuf,
    pub(crate) response_to: i32,
    pub(crate) flags: MessageFlags,
    pub(crate) checksum: Option<u32>,
    pub(crate) request_id: Option<i32>,
}

impl Message {
    /// Creates a message whose body section is `document`.
    pub fn from_document(document: RawDocumentBuf) -> Self {
        Self {
            document_payload: document,
            response_to: 0,
            flags: MessageFlags::empty(),
            checksum: None,
            request_id: None,
        }
    }

    /// Sets the id of the request this message is a reply to.
    pub fn with_response_to(mut self, response_to: i32) -> Self {
        self.response_to = response_to;
        self
    }

    /// The body section of this message.
    pub fn document(&self) -> &RawDocument {
        &self.document_payload
    }

    /// The request id assigned to this message, if it has one.
    pub fn request_id(&self) -> Option<i32> {
        self.request_id
    }

    /// The id of the request this message is a reply to.
    pub fn response_to(&self) -> i32 {
        self.response_to
    }

    /// The flag bits of this message.
    pub fn flags(&self) -> MessageFlags {
        self.flags
    }

    /// Gets this message's body as a Document. If deserialization fails, returns a document
    /// containing the error.
    pub(crate) fn get_command_document(&self) -> Document {
        match self.document_payload.to_document() {
            Ok(document) => document,
            Err(error) => crate::bson::doc! { "serialization error": error.to_string() },
        }
    }

    /// Reads bytes from `reader` and deserializes them into a Message.
    pub(crate) async fn read_from<R: AsyncRead + Unpin + Send>(
        mut reader: R,
        max_message_size_bytes: Option<i32>,
    ) -> Result<Self> {
        let header = Header::read_from(&mut reader).await?;
        let max_len = max_message_size_bytes.unwrap_or(DEFAULT_MAX_MESSAGE_SIZE_BYTES);
        if header.length > max_len {
            return Err(Error::invalid_response(format!(
                "Message length {} over maximum {}",
                header.length, max_len
            )));
        }

        let length_remaining = usize::try_from(header.length)
            .ok()
            .and_then(|length| length.checked_sub(Header::LENGTH))
            .ok_or_else(|| {
                Error::invalid_response(format!("Invalid message length {}", header.length))
            })?;
        let mut buf = vec![0u8; length_remaining];
        reader.read_exact(&mut buf).await?;

        Self::read_op_msg(&buf, &header)
    }

    fn read_op_msg(mut bytes: &[u8], header: &Header) -> Result<Self> {
        let flags = MessageFlags::from_bits_truncate(read_u32(&mut bytes)?);

        let mut document_payload = None;
        while bytes.len() > 4 {
            let payload_type = bytes[0];
            bytes = &bytes[1..];
            if payload_type != 0 {
                return Err(Error::invalid_response(format!(
                    "unsupported OP_MSG section kind {}",
                    payload_type
                )));
            }
            if document_payload.is_some() {
                return Err(Error::invalid_response(
                    "an OP_MSG response must contain exactly one payload type 0 section",
                ));
            }
            document_payload = Some(read_document(&mut bytes)?);
        }

        let checksum = if bytes.len() == 4 && flags.contains(MessageFlags::CHECKSUM_PRESENT) {
            Some(read_u32(&mut bytes)?)
        } else if !bytes.is_empty() {
            return Err(Error::invalid_response(format!(
                "The server indicated that the reply would be {} bytes long, but {} bytes were \
                 left unread",
                header.length,
                bytes.len(),
            )));
        } else {
            None
        };

        Ok(Self {
            response_to: header.response_to,
            flags,
            document_payload: document_payload.ok_or_else(|| {
                Error::invalid_response(
                    "an OP_MSG response must contain exactly one payload type 0 section",
                )
            })?,
            checksum,
            request_id: Some(header.request_id),
        })
    }

    /// Serializes the Message to bytes and writes them to `writer`.
    pub(crate) async fn write_to<W: AsyncWrite + Send + Unpin>(&self, mut writer: W) -> Result<()> {
        let document_bytes = self.document_payload.as_bytes();
        let total_length = Header::LENGTH
            + std::mem::size_of::<u32>()
            + 1
            + document_bytes.len()
            + self
                .checksum
                .as_ref()
                .map(std::mem::size_of_val)
                .unwrap_or(0);

        let header = Header {
            length: i32::try_from(total_length).map_err(|_| {
                Error::invalid_argument(format!("message of {} bytes is too large", total_length))
            })?,
            request_id: self.request_id.unwrap_or_else(next_request_id),
            response_to: self.response_to,
            op_code: OpCode::Message,
        };

        header.write_to(&mut writer).await?;
        writer.write_u32_le(self.flags.bits()).await?;
        // Payload type 0
        writer.write_u8(0).await?;
        writer.write_all(document_bytes).await?;

        if let Some(checksum) = self.checksum {
            writer.write_u32_le(checksum).await?;
        }

        writer.flush().await?;

        Ok(())
    }
}

fn read_u32(bytes: &mut &[u8]) -> Result<u32> {
    if bytes.len() < 4 {
        return Err(Error::invalid_response("unexpected end of message"));
    }
    let (head, rest) = bytes.split_at(4);
    *bytes = rest;
    Ok(u32::from_le_bytes([head[0], head[1], head[2], head[3]]))
}

fn read_document(bytes: &mut &[u8]) -> Result<RawDocumentBuf> {
    let length = match bytes.get(..4) {
        Some(prefix) => i32::from_le_bytes([prefix[0], prefix[1], prefix[2], prefix[3]]),
        None => return Err(Error::invalid_response("unexpected end of message")),
    };
    let length = usize::try_from(length)
        .ok()
        .filter(|length| *length <= bytes.len())
        .ok_or_else(|| Error::invalid_response(format!("invalid document length {}", length)))?;
    let (document, rest) = bytes.split_at(length);
    *bytes = rest;
    RawDocumentBuf::from_bytes(document.to_vec())
        .map_err(|e| Error::invalid_response(e.to_string()))
}

bitflags! {
    /// The bitwise flags of an OP_MSG.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
    pub struct MessageFlags: u32 {
        /// The message ends with a CRC-32C checksum.
        const CHECKSUM_PRESENT = 0b_0000_0000_0000_0000_0000_0000_0000_0001;
        /// Another message will follow this one without a further request.
        const MORE_TO_COME     = 0b_0000_0000_0000_0000_0000_0000_0000_0010;
        /// The client is prepared for multiple replies to this request.
        const EXHAUST_ALLOWED  = 0b_0000_0000_0000_0001_0000_0000_0000_0000;
    }
}
