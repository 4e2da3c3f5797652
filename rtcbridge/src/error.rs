use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use crate::types::SinkId;

/// Failure loading or validating [`RtcBridgeConfig`](crate::RtcBridgeConfig)
#[derive(Error, Debug)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Config load error: {0}")]
    Config(#[from] config::ConfigError),
}

pub type Result<T> = std::result::Result<T, Error>;

/// Malformed session description or candidate text
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{description} (line: {line})")]
pub struct SdpParseError {
    /// What was wrong
    pub description: String,
    /// Offending line, or `<unknown>` when the parser does not report one
    pub line: String,
}

impl SdpParseError {
    pub fn new(description: impl Into<String>, line: impl Into<String>) -> Self {
        Self {
            description: description.into(),
            line: line.into(),
        }
    }

    /// Error with no line indicator
    pub fn without_line(description: impl Into<String>) -> Self {
        Self::new(description, "<unknown>")
    }
}

/// Error category reported by a connection engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RtcErrorKind {
    InvalidParameter,
    InvalidRange,
    SyntaxError,
    InvalidState,
    InvalidModification,
    NetworkError,
    ResourceExhausted,
    InternalError,
    OperationError,
    UnsupportedOperation,
    UnsupportedParameter,
}

impl RtcErrorKind {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::InvalidParameter => "INVALID_PARAMETER",
            Self::InvalidRange => "INVALID_RANGE",
            Self::SyntaxError => "SYNTAX_ERROR",
            Self::InvalidState => "INVALID_STATE",
            Self::InvalidModification => "INVALID_MODIFICATION",
            Self::NetworkError => "NETWORK_ERROR",
            Self::ResourceExhausted => "RESOURCE_EXHAUSTED",
            Self::InternalError => "INTERNAL_ERROR",
            Self::OperationError => "OPERATION_ERROR",
            Self::UnsupportedOperation => "UNSUPPORTED_OPERATION",
            Self::UnsupportedParameter => "UNSUPPORTED_PARAMETER",
        }
    }
}

impl fmt::Display for RtcErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Failure reported by the engine for a create/set/submit operation
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[error("{kind}: {message}")]
pub struct RtcError {
    pub kind: RtcErrorKind,
    pub message: String,
}

impl RtcError {
    pub fn new(kind: RtcErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn invalid_state(message: impl Into<String>) -> Self {
        Self::new(RtcErrorKind::InvalidState, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(RtcErrorKind::InternalError, message)
    }
}

impl From<webrtc::Error> for RtcError {
    fn from(err: webrtc::Error) -> Self {
        match &err {
            webrtc::Error::ErrConnectionClosed => Self::invalid_state(err.to_string()),
            webrtc::Error::Sdp(_) => Self::new(RtcErrorKind::SyntaxError, err.to_string()),
            _ => Self::new(RtcErrorKind::OperationError, err.to_string()),
        }
    }
}

/// A sink refused or failed to consume a frame
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("sink {sink} failed: {reason}")]
pub struct SinkError {
    pub sink: SinkId,
    pub reason: String,
}

impl SinkError {
    pub fn new(sink: SinkId, reason: impl Into<String>) -> Self {
        Self {
            sink,
            reason: reason.into(),
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FrameError {
    #[error("zero-sized frame {width}x{height}")]
    ZeroSized { width: u32, height: u32 },

    #[error("{plane} plane holds {actual} bytes, expected {expected}")]
    PlaneSize {
        plane: &'static str,
        expected: usize,
        actual: usize,
    },
}
