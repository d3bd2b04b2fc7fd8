//! Failure taxonomy and server error mapping.
//!
//! Every call made through a [`Handler`](crate::handler::Handler) either succeeds or fails
//! with one [`Error`]. Failures reported by the server are never paraphrased: the
//! [`Error::RequestFailed`] variant carries the message text exactly as it arrived on the
//! wire, and its `Display` output is that text and nothing else.
//!
//! Authentication failures are not a separate kind. A rejected `Authenticate` request
//! fails the same way as a select on a missing space, and callers distinguish the two by
//! the message or the error code.
use std::io;

use thiserror::Error;

/// Error code reported when a space name cannot be resolved.
pub const ER_NO_SUCH_SPACE: u32 = 36;

/// Error code reported when an index cannot be resolved.
pub const ER_NO_SUCH_INDEX: u32 = 35;

/// Bit set in the response code of every failed request.
pub(crate) const ERROR_FLAG: u32 = 0x8000;

/// A specialized [`Result`] type for client operations.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// All possible errors returned by the client.
#[derive(Debug, Error)]
pub enum Error {
    /// The underlying stream could not be established or broke mid-frame.
    #[error("transport error: {0}")]
    Io(#[from] io::Error),

    /// The stream could not be established; nothing was sent.
    #[error("failed to connect: {0}")]
    Connect(#[source] io::Error),

    /// The server greeting was missing or malformed.
    #[error("handshake failed: {0}")]
    Handshake(String),

    /// No response arrived within the configured socket timeout.
    #[error("request timed out")]
    Timeout,

    /// A frame could not be interpreted.
    #[error("protocol error: {0}")]
    Protocol(String),

    #[error("failed to encode message: {0}")]
    Encode(#[from] rmpv::encode::Error),

    #[error("failed to decode message: {0}")]
    Decode(#[from] rmpv::decode::Error),

    /// The server rejected the request, authentication included.
    #[error("{message}")]
    RequestFailed { code: u32, message: String },

    /// Invalid arguments caught before anything was sent.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("extension error: {0}")]
    Extension(String),
}

impl Error {
    pub(crate) fn request_failed(code: u32, message: impl Into<String>) -> Self {
        Error::RequestFailed {
            code,
            message: message.into(),
        }
    }

    pub(crate) fn unknown_space(name: &str) -> Self {
        Self::request_failed(ER_NO_SUCH_SPACE, format!("Space '{name}' does not exist"))
    }

    pub(crate) fn unknown_index(space_id: u32, index: &str) -> Self {
        Self::request_failed(
            ER_NO_SUCH_INDEX,
            format!("No index '{index}' is defined in space #{space_id}"),
        )
    }

    pub(crate) fn missing_primary_index(space: &str) -> Self {
        Self::request_failed(
            ER_NO_SUCH_INDEX,
            format!("No index #0 is defined in space '{space}'"),
        )
    }

    /// Server error code, if this failure came from the server.
    pub fn code(&self) -> Option<u32> {
        match self {
            Error::RequestFailed { code, .. } => Some(*code),
            _ => None,
        }
    }

    /// Server message text, verbatim.
    pub fn server_message(&self) -> Option<&str> {
        match self {
            Error::RequestFailed { message, .. } => Some(message),
            _ => None,
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, Error::Timeout)
    }

    /// Whether the failure happened below the request level, leaving the
    /// stream in an unknown position.
    pub fn is_transport(&self) -> bool {
        matches!(self, Error::Io(_) | Error::Connect(_) | Error::Timeout)
    }

    /// Whether the request never reached the server.
    pub fn is_unsent(&self) -> bool {
        matches!(self, Error::Connect(_))
    }
}

/// Converts a failed response status into a typed error.
///
/// The response code has [`ERROR_FLAG`] set and the low bits hold the server error
/// code; the message is kept exactly as received.
pub fn map_failure(status: u32, message: String) -> Error {
    Error::RequestFailed {
        code: status & !ERROR_FLAG,
        message,
    }
}

/// Maps an io error raised while a frame was in flight.
pub(crate) fn map_io(err: io::Error) -> Error {
    match err.kind() {
        io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock => Error::Timeout,
        _ => Error::Io(err),
    }
}
