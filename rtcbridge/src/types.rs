//! Identifier types shared by the negotiation and video halves of the crate

use serde::{Deserialize, Serialize};
use std::fmt;

/// Length of generated identifiers
const GENERATED_ID_LEN: usize = 12;

/// Unique identifier for a negotiation session
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(String);

impl SessionId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generate a random session id
    #[must_use]
    pub fn generate() -> Self {
        Self(nanoid::nanoid!(GENERATED_ID_LEN))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for SessionId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for SessionId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Identity of a registered video sink
///
/// Registration, update and removal are all keyed by this value, so two
/// distinct sinks must never share one.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SinkId(String);

impl SinkId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generate a random sink id
    #[must_use]
    pub fn generate() -> Self {
        Self(nanoid::nanoid!(GENERATED_ID_LEN))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SinkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for SinkId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for SinkId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}
