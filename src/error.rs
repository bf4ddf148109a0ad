//! Crate error types
//!
//! Layered error model: each subsystem (message codec, frame transport,
//! authentication, connection lifecycle) has its own error enum, all of
//! which convert into the crate-level [`Error`].

use std::fmt;

/// Convenience result alias used throughout the crate
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level error type
#[derive(Debug)]
pub enum Error {
    /// Socket I/O failure (fatal to the connection)
    Io(std::io::Error),
    /// Frame transport violation (recoverable; the frame is dropped)
    Frame(FrameError),
    /// Message encoding/decoding failure
    Msg(MsgError),
    /// Authentication failure
    Auth(AuthError),
    /// Connection lifecycle failure
    Connection(ConnectionError),
    /// Error text reported by the server in a reply
    Server(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Io(e) => write!(f, "I/O error: {}", e),
            Error::Frame(e) => write!(f, "Frame error: {}", e),
            Error::Msg(e) => write!(f, "Message error: {}", e),
            Error::Auth(e) => write!(f, "Authentication error: {}", e),
            Error::Connection(e) => write!(f, "Connection error: {}", e),
            Error::Server(text) => write!(f, "From server: {}", text),
        }
    }
}

impl std::error::Error for Error {}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Io(e)
    }
}

impl From<FrameError> for Error {
    fn from(e: FrameError) -> Self {
        Error::Frame(e)
    }
}

impl From<MsgError> for Error {
    fn from(e: MsgError) -> Self {
        Error::Msg(e)
    }
}

impl From<AuthError> for Error {
    fn from(e: AuthError) -> Self {
        Error::Auth(e)
    }
}

impl From<ConnectionError> for Error {
    fn from(e: ConnectionError) -> Self {
        Error::Connection(e)
    }
}

/// Frame transport errors
///
/// These never tear down the connection: the offending frame has already
/// been consumed from the stream, so the caller logs and moves on.
#[derive(Debug, Clone, PartialEq)]
pub enum FrameError {
    /// Declared frame length exceeds the sanity ceiling
    Oversize { len: usize, max: usize },
    /// Frame body failed to deserialize
    Malformed(MsgError),
}

impl fmt::Display for FrameError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FrameError::Oversize { len, max } => {
                write!(f, "Frame of {} bytes exceeds the {} byte limit", len, max)
            }
            FrameError::Malformed(e) => write!(f, "Malformed frame body: {}", e),
        }
    }
}

impl std::error::Error for FrameError {}

/// Message codec errors
#[derive(Debug, Clone, PartialEq)]
pub enum MsgError {
    /// Buffer ended in the middle of a field
    UnexpectedEof,
    /// Unrecognized field type byte
    UnknownFieldType(u8),
    /// Field data has a length its type does not allow
    BadLength { field_type: u8, len: usize },
    /// Field name or string payload is not valid UTF-8
    InvalidUtf8,
    /// Maps/lists nested deeper than the decoder allows
    NestingTooDeep,
}

impl fmt::Display for MsgError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MsgError::UnexpectedEof => write!(f, "Unexpected end of buffer"),
            MsgError::UnknownFieldType(t) => write!(f, "Unknown field type {:#04x}", t),
            MsgError::BadLength { field_type, len } => {
                write!(f, "Field type {} with invalid data length {}", field_type, len)
            }
            MsgError::InvalidUtf8 => write!(f, "Invalid UTF-8 data"),
            MsgError::NestingTooDeep => write!(f, "Nesting depth limit exceeded"),
        }
    }
}

impl std::error::Error for MsgError {}

/// Authentication errors
#[derive(Debug, Clone, PartialEq)]
pub enum AuthError {
    /// Credential source declined to supply credentials
    Rejected,
    /// Hello reply carried no 32-byte challenge
    InvalidChallenge(usize),
}

impl fmt::Display for AuthError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuthError::Rejected => write!(f, "Credentials rejected by user"),
            AuthError::InvalidChallenge(len) => {
                write!(f, "Server challenge has {} bytes, expected 32", len)
            }
        }
    }
}

impl std::error::Error for AuthError {}

/// Connection lifecycle errors
#[derive(Debug, Clone, PartialEq)]
pub enum ConnectionError {
    /// TCP connect did not complete within the configured timeout
    ConnectTimeout,
    /// Peer closed the socket or a read/write failed mid-conversation
    ConnectionLost,
    /// Operation attempted on a connection already shut down
    Closed,
    /// URL could not be parsed as htsp://host[:port][/path]
    InvalidUrl(String),
}

impl fmt::Display for ConnectionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionError::ConnectTimeout => write!(f, "Connection attempt timed out"),
            ConnectionError::ConnectionLost => write!(f, "Connection with server lost"),
            ConnectionError::Closed => write!(f, "Connection is closed"),
            ConnectionError::InvalidUrl(url) => write!(f, "Invalid URL: {}", url),
        }
    }
}

impl std::error::Error for ConnectionError {}
