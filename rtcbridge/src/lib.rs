//! `rtcbridge`: negotiation and video plumbing for a WebRTC peer connection
//!
//! This crate sits between an application and an observer-style peer
//! connection engine. It turns the engine's callback-based asynchronous
//! operations into exactly-once continuations, orchestrates the offer/answer
//! and ICE exchange on top of them, and adapts captured video frames to the
//! constraints of every consumer before fanning them out.
//!
//! ## Architecture
//!
//! - **`CompletionThunk`**: one-shot success/failure continuation pair handed to the engine
//! - **`NegotiationSession`**: offer/answer/ICE orchestration for one connection
//! - **`FrameAdapter`**: per-frame drop and downscale decisions
//! - **`FrameBroadcaster`**: ordered sink registry and frame fan-out
//! - **`VideoSource`**: adapter and broadcaster wired together
//! - **`DiagnosticSink`**: injected reporting of parse, negotiation and delivery failures
//!
//! ## Usage
//!
//! ```rust,ignore
//! use rtcbridge::{MediaRole, NegotiationSession};
//!
//! let session = NegotiationSession::new(engine);
//! session.create_offer(
//!     MediaRole::Publish,
//!     |offer| signaling.send(offer.to_sdp_string()),
//!     |error| eprintln!("offer failed: {error}"),
//! );
//! ```

pub mod completion;
pub mod config;
pub mod diagnostics;
pub mod error;
pub mod logging;
pub mod negotiation;
mod types;
pub mod video;

pub use completion::{CompletionThunk, FailureReport};
pub use config::{LogFormat, LoggingConfig, RtcBridgeConfig, SessionConfig, VideoConfig};
pub use diagnostics::{
    Category, CollectingDiagnostics, Diagnostic, DiagnosticSink, Operation, ParseTarget,
    Severity, TracingDiagnostics,
};
pub use error::{Error, FrameError, Result, RtcError, RtcErrorKind, SdpParseError, SinkError};
pub use negotiation::{
    EncodingParameters, EngineEvent, IceCandidate, MediaRole, MessageSender, NegotiationSession,
    NegotiationState, PeerConnectionEngine, SdpType, SessionDescription, StatsReport,
};
pub use types::{SessionId, SinkId};
pub use video::{
    FrameAdapter, FrameBroadcaster, I420Buffer, VideoFrame, VideoSink, VideoSinkWants,
    VideoSource,
};
