//! Contains the `Error` and `Result` types that `mongodb_dispatch` uses.


use std::{fmt, sync::Arc};

use serde::Deserialize;
use thiserror::Error;

use crate::bson::Document;

/// The result type for all methods that can return an error in the `mongodb_dispatch` crate.
pub type Result<T> = std::result::Result<T, Error>;

/// An error that can occur in the `mongodb_dispatch` crate. The inner [`ErrorKind`] is wrapped in
/// an `Arc` to allow the errors to be cloned.
///
/// Note that an unacknowledged write is not reported through this type; see
/// [`WriteOutcome`](crate::dispatch::WriteOutcome).
#[derive(Clone, Debug, Error)]
#[error("{kind}")]
#[non_exhaustive]
pub struct Error {
    /// The type of error that occurred.
    pub kind: Arc<ErrorKind>,
}

impl Error {
    pub(crate) fn new(kind: ErrorKind) -> Self {
        Self {
            kind: Arc::new(kind),
        }
    }

    pub(crate) fn invalid_argument(message: impl Into<String>) -> Self {
        ErrorKind::InvalidArgument {
            message: message.into(),
        }
        .into()
    }

    pub(crate) fn invalid_response(message: impl Into<String>) -> Self {
        ErrorKind::InvalidResponse {
            message: message.into(),
        }
        .into()
    }

    pub(crate) fn server_selection(message: impl Into<String>) -> Self {
        ErrorKind::ServerSelection {
            message: message.into(),
        }
        .into()
    }

    pub(crate) fn cancelled(message: impl Into<String>) -> Self {
        ErrorKind::Cancelled {
            message: message.into(),
        }
        .into()
    }

    /// Whether this error was raised locally, before any network activity, because the operation
    /// was malformed.
    pub fn is_validation_error(&self) -> bool {
        matches!(self.kind.as_ref(), ErrorKind::InvalidArgument { .. })
    }

    /// Whether this error occurred while writing a request to or reading a reply from the server.
    pub fn is_transport_error(&self) -> bool {
        matches!(self.kind.as_ref(), ErrorKind::Io(..))
    }

    /// Whether this error occurred while interpreting a reply that was successfully received.
    pub fn is_decode_error(&self) -> bool {
        matches!(
            self.kind.as_ref(),
            ErrorKind::InvalidResponse { .. }
                | ErrorKind::BsonDecode(..)
                | ErrorKind::Command(..)
                | ErrorKind::WriteConcern(..)
        )
    }

    /// Whether the operation was cancelled or ran past its deadline.
    pub fn is_cancellation(&self) -> bool {
        matches!(self.kind.as_ref(), ErrorKind::Cancelled { .. })
    }

    /// Whether an error originated from the server.
    pub fn is_server_error(&self) -> bool {
        matches!(
            self.kind.as_ref(),
            ErrorKind::Command(..) | ErrorKind::WriteConcern(..)
        )
    }

    /// Gets the code/message tuple from this error, if applicable.
    pub(crate) fn code_and_message(&self) -> Option<(i32, &str)> {
        match self.kind.as_ref() {
            ErrorKind::Command(ref cmd_err) => Some((cmd_err.code, cmd_err.message.as_str())),
            ErrorKind::WriteConcern(ref wc_err) => Some((wc_err.code, wc_err.message.as_str())),
            _ => None,
        }
    }

    /// Whether this error is the server reporting that a cursor no longer exists.
    pub(crate) fn is_cursor_not_found(&self) -> bool {
        self.code_and_message().map(|(code, _)| code) == Some(43)
    }
}

impl<E> From<E> for Error
where
    ErrorKind: From<E>,
{
    fn from(err: E) -> Self {
        Self::new(err.into())
    }
}

impl std::ops::Deref for Error {
    type Target = Arc<ErrorKind>;

    fn deref(&self) -> &Self::Target {
        &self.kind
    }
}

/// The types of errors that can occur.
#[allow(missing_docs)]
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ErrorKind {
    /// An invalid argument was provided to a database operation.
    #[error("An invalid argument was provided: {message}")]
    #[non_exhaustive]
    InvalidArgument { message: String },

    /// No suitable server could be selected for the operation.
    #[error("Server selection failed: {message}")]
    #[non_exhaustive]
    ServerSelection { message: String },

    /// A connection could not be leased from the selected server.
    #[error("Unable to check out a connection: {message}")]
    #[non_exhaustive]
    ConnectionCheckout { message: String },

    /// Wrapper around `bson::ser::Error`.
    #[error("{0}")]
    BsonEncode(#[from] crate::bson::ser::Error),

    /// Wrapper around `bson::de::Error`.
    #[error("{0}")]
    BsonDecode(#[from] crate::bson::de::Error),

    /// Wrapper around [`std::io::Error`]. Raised when a request could not be written or a reply
    /// could not be read.
    #[error("I/O error: {0}")]
    Io(Arc<std::io::Error>),

    /// The server returned an invalid reply to a database operation.
    #[error("The server returned an invalid reply to a database operation: {message}")]
    #[non_exhaustive]
    InvalidResponse { message: String },

    /// The server returned an error to an attempted operation.
    #[error("Command failed: {0}")]
    Command(CommandError),

    /// The server could not satisfy the requested write concern.
    #[error("Write concern error: {0}")]
    WriteConcern(WriteConcernError),

    /// The operation was cancelled, or its deadline elapsed, before it completed.
    #[error("Operation cancelled: {message}")]
    #[non_exhaustive]
    Cancelled { message: String },

    /// A cursor was advanced after it had been closed.
    #[error("Cursor has been closed")]
    CursorClosed,
}

impl From<std::io::Error> for ErrorKind {
    fn from(err: std::io::Error) -> Self {
        Self::Io(Arc::new(err))
    }
}

impl From<std::io::ErrorKind> for ErrorKind {
    fn from(err: std::io::ErrorKind) -> Self {
        Self::Io(Arc::new(err.into()))
    }
}

/// An error that occurred due to a database command failing.
#[derive(Clone, Debug, Deserialize, PartialEq)]
#[non_exhaustive]
pub struct CommandError {
    /// Identifies the type of error.
    #[serde(default)]
    pub code: i32,

    /// The name associated with the error code.
    #[serde(rename = "codeName", default)]
    pub code_name: String,

    /// A description of the error that occurred.
    #[serde(rename = "errmsg", default)]
    pub message: String,
}

impl fmt::Display for CommandError {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        write!(fmt, "({}): {}", self.code_name, self.message)
    }
}

/// An error that occurred due to not being able to satisfy a write concern.
#[derive(Clone, Debug, Deserialize, PartialEq)]
#[non_exhaustive]
pub struct WriteConcernError {
    /// Identifies the type of write concern error.
    pub code: i32,

    /// The name associated with the error code.
    #[serde(rename = "codeName", default)]
    pub code_name: String,

    /// A description of the error that occurred.
    #[serde(rename = "errmsg", default)]
    pub message: String,

    /// A document identifying the write concern setting related to the error.
    #[serde(rename = "errInfo")]
    pub details: Option<Document>,
}

impl fmt::Display for WriteConcernError {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        write!(fmt, "({}): {}", self.code_name, self.message)
    }
}
