use serde::de::DeserializeOwned;

use super::wire::{next_request_id, Message};
use crate::{
    bson::{Bson, Document, RawDocumentBuf},
    bson_util,
    error::{CommandError, Error, ErrorKind, Result},
    sdam::{ServerDescription, ServerType},
    selection_criteria::ReadPreference,
};

/// `Command` is a driver side abstraction of a server command containing all the information
/// necessary to serialize it to a wire message.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Command {
    pub(crate) name: String,
    pub(crate) target_db: String,
    pub(crate) body: Document,
    pub(crate) is_write: bool,
    pub(crate) read_pref: Option<ReadPreference>,
}

impl Command {
    /// Constructs a write command. Write commands are never routed using a read preference.
    pub(crate) fn new_write(
        name: impl Into<String>,
        target_db: impl Into<String>,
        body: Document,
    ) -> Self {
        Self {
            name: name.into(),
            target_db: target_db.into(),
            body,
            is_write: true,
            read_pref: None,
        }
    }

    /// Constructs a read command.
    pub(crate) fn new_read(
        name: impl Into<String>,
        target_db: impl Into<String>,
        read_pref: Option<ReadPreference>,
        body: Document,
    ) -> Self {
        Self {
            name: name.into(),
            target_db: target_db.into(),
            body,
            is_write: false,
            read_pref,
        }
    }

    /// Builds the full request document sent to `server`: the command body followed by the
    /// envelope fields.
    pub(crate) fn to_document(&self, server: &ServerDescription) -> Document {
        let mut document = self.body.clone();
        document.insert("$db", self.target_db.clone());
        if let Some(read_pref) = self.envelope_read_pref(server) {
            document.insert("$readPreference", read_pref.to_document());
        }
        document
    }

    /// A mongos only honours a read preference passed in the envelope; other servers route on the
    /// client's selection alone.
    fn envelope_read_pref(&self, server: &ServerDescription) -> Option<ReadPreference> {
        if self.is_write || server.server_type != ServerType::Mongos {
            return None;
        }
        self.read_pref
            .filter(|read_pref| *read_pref != ReadPreference::Primary)
    }

    /// Serializes this command into an OP_MSG with a freshly assigned request id.
    pub(crate) fn into_message(self, server: &ServerDescription) -> Result<Message> {
        let document = crate::bson::to_raw_document_buf(&self.to_document(server))?;
        let mut message = Message::from_document(document);
        message.request_id = Some(next_request_id());
        Ok(message)
    }
}

/// A reply received from the server, kept in its raw form until it is decoded.
#[derive(Debug, Clone)]
pub(crate) struct RawCommandResponse {
    pub(crate) source: String,
    raw: RawDocumentBuf,
}

impl RawCommandResponse {
    #[cfg(test)]
    pub(crate) fn with_document(doc: Document) -> Result<Self> {
        let raw = crate::bson::to_raw_document_buf(&doc)?;
        Ok(Self {
            source: "localhost:27017".to_string(),
            raw,
        })
    }

    pub(crate) fn new(source: impl Into<String>, message: Message) -> Self {
        Self {
            source: source.into(),
            raw: message.document_payload,
        }
    }

    fn to_document(&self) -> Result<Document> {
        self.raw
            .to_document()
            .map_err(|e| Error::invalid_response(e.to_string()))
    }

    /// Returns whether this response indicates a success or not (i.e. if "ok: 1")
    pub(crate) fn is_success(&self) -> bool {
        match self.to_document() {
            Ok(document) => document
                .get("ok")
                .and_then(bson_util::get_int)
                .map(|ok| ok == 1)
                .unwrap_or(false),
            Err(_) => false,
        }
    }

    /// Returns a result indicating whether this response corresponds to a command failure.
    pub(crate) fn validate(&self) -> Result<()> {
        if self.is_success() {
            return Ok(());
        }
        let document = self.to_document()?;
        let command_error: CommandError = crate::bson::from_bson(Bson::Document(document))
            .map_err(|_| Error::invalid_response("invalid server response"))?;
        Err(ErrorKind::Command(command_error).into())
    }

    /// Deserialize the body of the response.
    pub(crate) fn body<T: DeserializeOwned>(&self) -> Result<T> {
        crate::bson::from_slice(self.raw.as_bytes())
            .map_err(|e| Error::invalid_response(e.to_string()))
    }

    /// The response as an owned document.
    pub(crate) fn raw_body(&self) -> Result<Document> {
        self.to_document()
    }

    /// The address of the server that sent this response.
    pub(crate) fn source_address(&self) -> &str {
        &self.source
    }
}
