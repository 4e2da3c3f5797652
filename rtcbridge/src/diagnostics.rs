//! Diagnostic reporting
//!
//! Negotiation and video code never call the logging macros for failures
//! directly. They hand a [`Diagnostic`] to an injected [`DiagnosticSink`], so
//! the decision logic can be exercised with [`CollectingDiagnostics`] and
//! production builds route everything through [`TracingDiagnostics`].

use crate::error::{RtcError, SdpParseError};
use crate::types::SinkId;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Engine operation a diagnostic refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    CreateOffer,
    CreateAnswer,
    SetLocalDescription,
    SetRemoteDescription,
    AddIceCandidate,
    GetStats,
    SetParameters,
}

impl Operation {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::CreateOffer => "create_offer",
            Self::CreateAnswer => "create_answer",
            Self::SetLocalDescription => "set_local_description",
            Self::SetRemoteDescription => "set_remote_description",
            Self::AddIceCandidate => "add_ice_candidate",
            Self::GetStats => "get_stats",
            Self::SetParameters => "set_parameters",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What the parser was asked to read
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParseTarget {
    Offer,
    Answer,
    IceCandidate,
}

impl fmt::Display for ParseTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Offer => "offer",
            Self::Answer => "answer",
            Self::IceCandidate => "ice candidate",
        })
    }
}

/// Error taxonomy bucket
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Parse,
    Negotiation,
    Configuration,
    DeliveryFault,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Debug,
    Info,
    Warn,
    Error,
}

/// A reported failure
#[derive(Debug, Clone, PartialEq)]
pub enum Diagnostic {
    /// Malformed description or candidate text
    Parse {
        target: ParseTarget,
        error: SdpParseError,
    },

    /// Engine failure on a create/set operation
    Negotiation {
        operation: Operation,
        error: RtcError,
    },

    /// Engine refused a parsed candidate; carries the raw text for correlation
    CandidateRejected { error: RtcError, candidate: String },

    /// Session not in a shape that allows the requested change
    Configuration { message: String },

    /// A sink failed to take a frame
    DeliveryFault { sink: SinkId, reason: String },
}

impl Diagnostic {
    #[must_use]
    pub const fn category(&self) -> Category {
        match self {
            Self::Parse { .. } => Category::Parse,
            Self::Negotiation { .. } | Self::CandidateRejected { .. } => Category::Negotiation,
            Self::Configuration { .. } => Category::Configuration,
            Self::DeliveryFault { .. } => Category::DeliveryFault,
        }
    }

    #[must_use]
    pub const fn severity(&self) -> Severity {
        match self {
            Self::CandidateRejected { .. } | Self::DeliveryFault { .. } => Severity::Warn,
            _ => Severity::Error,
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Parse { target, error } => {
                write!(f, "Failed to parse {target}: {}\nline: {}", error.description, error.line)
            }
            Self::Negotiation { operation, error } => {
                write!(f, "{operation} failed: {}: {}", error.kind, error.message)
            }
            Self::CandidateRejected { error, candidate } => write!(
                f,
                "Failed to apply the received candidate. type={} message={} sdp={candidate}",
                error.kind, error.message
            ),
            Self::Configuration { message } => f.write_str(message),
            Self::DeliveryFault { sink, reason } => {
                write!(f, "Frame delivery to sink {sink} failed: {reason}")
            }
        }
    }
}

/// Receiver of diagnostics
pub trait DiagnosticSink: Send + Sync {
    fn report(&self, diagnostic: Diagnostic);
}

impl<T: DiagnosticSink + ?Sized> DiagnosticSink for Arc<T> {
    fn report(&self, diagnostic: Diagnostic) {
        (**self).report(diagnostic);
    }
}

/// Emits every diagnostic as a `tracing` event
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingDiagnostics;

impl DiagnosticSink for TracingDiagnostics {
    fn report(&self, diagnostic: Diagnostic) {
        let category = diagnostic.category();
        match diagnostic.severity() {
            Severity::Debug => debug!(?category, "{diagnostic}"),
            Severity::Info => info!(?category, "{diagnostic}"),
            Severity::Warn => warn!(?category, "{diagnostic}"),
            Severity::Error => error!(?category, "{diagnostic}"),
        }
    }
}

/// Default sink used when a caller does not inject one
#[must_use]
pub fn tracing_sink() -> Arc<dyn DiagnosticSink> {
    Arc::new(TracingDiagnostics)
}

/// Keeps diagnostics in memory, optionally forwarding them to `tracing` too
#[derive(Debug, Default)]
pub struct CollectingDiagnostics {
    entries: Mutex<Vec<Diagnostic>>,
    forward: bool,
}

impl CollectingDiagnostics {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Collect and also emit through `tracing`
    #[must_use]
    pub fn forwarding() -> Self {
        Self {
            entries: Mutex::new(Vec::new()),
            forward: true,
        }
    }

    #[must_use]
    pub fn snapshot(&self) -> Vec<Diagnostic> {
        self.entries.lock().clone()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    /// Number of collected diagnostics in `category`
    #[must_use]
    pub fn count(&self, category: Category) -> usize {
        self.entries
            .lock()
            .iter()
            .filter(|d| d.category() == category)
            .count()
    }

    pub fn clear(&self) {
        self.entries.lock().clear();
    }
}

impl DiagnosticSink for CollectingDiagnostics {
    fn report(&self, diagnostic: Diagnostic) {
        if self.forward {
            TracingDiagnostics.report(diagnostic.clone());
        }
        self.entries.lock().push(diagnostic);
    }
}
