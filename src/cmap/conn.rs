mod command;
#[cfg(test)]
mod test;
pub(crate) mod wire;

use futures_util::future::{BoxFuture, FutureExt};
use tokio::io::{AsyncRead, AsyncWrite};

pub(crate) use self::command::{Command, RawCommandResponse};
use self::wire::Message;
use crate::{
    error::{ErrorKind, Result},
    sdam::DEFAULT_MAX_MESSAGE_SIZE_BYTES,
    trace::CONNECTION_TRACING_EVENT_TARGET,
};

/// A connection to a single server, capable of exchanging wire protocol messages.
///
/// Implementations are leased from a [`ConnectionSource`](crate::sdam::ConnectionSource) and are
/// exclusively owned by one party at a time: the dispatching caller, a detached background task
/// executing an unacknowledged write, or a [`Cursor`](crate::Cursor).
pub trait Connection: Send {
    /// Writes `message` to the server.
    fn send_message(&mut self, message: Message) -> BoxFuture<'_, Result<()>>;

    /// Reads the next message sent by the server.
    fn receive_message(&mut self) -> BoxFuture<'_, Result<Message>>;

    /// Ends the lease on this connection, returning it to wherever it was leased from. This is
    /// called exactly once per lease, after which the connection is never used again.
    fn release(&mut self);
}

/// A scoped lease on a [`Connection`]. The underlying connection is released exactly once: either
/// explicitly via [`ConnectionLease::release`] or when the lease is dropped.
pub(crate) struct ConnectionLease {
    connection: Box<dyn Connection>,
    address: String,
    released: bool,
}

impl std::fmt::Debug for ConnectionLease {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionLease")
            .field("address", &self.address)
            .field("released", &self.released)
            .finish()
    }
}

impl ConnectionLease {
    pub(crate) fn new(connection: Box<dyn Connection>, address: String) -> Self {
        Self {
            connection,
            address,
            released: false,
        }
    }

    pub(crate) fn address(&self) -> &str {
        &self.address
    }

    pub(crate) async fn send_message(&mut self, message: Message) -> Result<()> {
        self.check_live()?;
        self.connection.send_message(message).await
    }

    pub(crate) async fn receive_message(&mut self) -> Result<Message> {
        self.check_live()?;
        self.connection.receive_message().await
    }

    /// Ends the lease. Subsequent calls, and the eventual drop, are no-ops.
    pub(crate) fn release(&mut self) {
        if self.released {
            return;
        }
        self.released = true;
        self.connection.release();
        tracing::trace!(
            target: CONNECTION_TRACING_EVENT_TARGET,
            serverHost = self.address.as_str(),
            "Connection released"
        );
    }

    fn check_live(&self) -> Result<()> {
        if self.released {
            return Err(ErrorKind::Io(std::sync::Arc::new(std::io::Error::new(
                std::io::ErrorKind::NotConnected,
                "connection lease has already been released",
            )))
            .into());
        }
        Ok(())
    }
}

impl Drop for ConnectionLease {
    fn drop(&mut self) {
        self.release();
    }
}

/// A [`Connection`] that speaks OP_MSG over any asynchronous byte stream, such as a TCP or TLS
/// stream established by the caller.
#[derive(Debug)]
pub struct StreamConnection<S> {
    stream: Option<S>,
    max_message_size_bytes: i32,
}

impl<S> StreamConnection<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    /// Wraps an established stream.
    pub fn new(stream: S) -> Self {
        Self {
            stream: Some(stream),
            max_message_size_bytes: DEFAULT_MAX_MESSAGE_SIZE_BYTES,
        }
    }

    /// Sets the largest reply, in bytes, that will be accepted from the server.
    pub fn with_max_message_size_bytes(mut self, max_message_size_bytes: i32) -> Self {
        self.max_message_size_bytes = max_message_size_bytes;
        self
    }

    fn stream(&mut self) -> Result<&mut S> {
        self.stream
            .as_mut()
            .ok_or_else(|| ErrorKind::from(std::io::ErrorKind::NotConnected).into())
    }
}

impl<S> Connection for StreamConnection<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    fn send_message(&mut self, message: Message) -> BoxFuture<'_, Result<()>> {
        async move {
            let stream = self.stream()?;
            message.write_to(stream).await
        }
        .boxed()
    }

    fn receive_message(&mut self) -> BoxFuture<'_, Result<Message>> {
        async move {
            let max_message_size_bytes = self.max_message_size_bytes;
            let stream = self.stream()?;
            Message::read_from(stream, Some(max_message_size_bytes)).await
        }
        .boxed()
    }

    fn release(&mut self) {
        self.stream.take();
    }
}
