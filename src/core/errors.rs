// src/core/errors.rs

//! Defines the primary error type for the entire application.

use std::sync::Arc;
use thiserror::Error;

/// The main error enum, representing all possible failures within the server.
/// Using `thiserror` gives us `Display` for free and keeps call sites using `?`.
#[derive(Error, Debug, Clone)]
pub enum FerriteError {
    #[error("IO Error: {0}")]
    Io(Arc<std::io::Error>),

    #[error("Incomplete data in stream")]
    IncompleteData,

    #[error("Unknown command '{0}'")]
    UnknownCommand(String),

    #[error("Syntax error")]
    SyntaxError,

    #[error("Wrong number of arguments for '{0}' command")]
    WrongArgumentCount(String),

    #[error("WRONGTYPE Operation against a key holding the wrong kind of value")]
    WrongType,

    #[error("value is not an integer or out of range")]
    NotAnInteger,

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("The ID specified in XADD must be greater than 0-0")]
    XAddIdZero,

    #[error("The ID specified in XADD is equal or smaller than the target stream top item")]
    XAddIdNotIncreasing,

    #[error("Replication error: {0}")]
    ReplicationError(String),

    #[error("RDB parse error: {0}")]
    RdbParseError(String),

    #[error("timed out waiting for a reply")]
    TimedOut,

    #[error("Internal error: {0}")]
    Internal(String),
}

impl FerriteError {
    /// Renders the error the way it appears on the wire, as the message half of
    /// a RESP error frame (`-<this>\r\n`). A handful of variants already carry
    /// their own error-code prefix (e.g. `WRONGTYPE`); everything else is
    /// prefixed with the generic `ERR` code.
    pub fn to_resp_message(&self) -> String {
        match self {
            FerriteError::WrongType => self.to_string(),
            FerriteError::XAddIdZero | FerriteError::XAddIdNotIncreasing => self.to_string(),
            other => format!("ERR {other}"),
        }
    }
}

impl From<std::io::Error> for FerriteError {
    fn from(e: std::io::Error) -> Self {
        FerriteError::Io(Arc::new(e))
    }
}

impl From<std::num::ParseIntError> for FerriteError {
    fn from(_: std::num::ParseIntError) -> Self {
        FerriteError::NotAnInteger
    }
}

impl From<std::str::Utf8Error> for FerriteError {
    fn from(_: std::str::Utf8Error) -> Self {
        FerriteError::InvalidRequest("invalid UTF-8".to_string())
    }
}

impl From<std::string::FromUtf8Error> for FerriteError {
    fn from(_: std::string::FromUtf8Error) -> Self {
        FerriteError::InvalidRequest("invalid UTF-8".to_string())
    }
}
