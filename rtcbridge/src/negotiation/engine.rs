//! Connection engine seam
//!
//! The engine performs the actual negotiation work and reports results through
//! the thunks it is handed. Implementations may complete on any thread.

use super::description::{IceCandidate, SessionDescription};
use crate::completion::CompletionThunk;
use crate::error::RtcError;
use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use std::fmt;
use std::sync::Arc;
use webrtc::ice_transport::ice_connection_state::RTCIceConnectionState;
use webrtc::rtp_transceiver::rtp_codec::RTPCodecType;
use webrtc::rtp_transceiver::rtp_transceiver_direction::RTCRtpTransceiverDirection;

/// Continuation for create-offer/create-answer
pub type CreateDescriptionThunk = CompletionThunk<SessionDescription>;

/// Continuation for set-local/set-remote
pub type SetDescriptionThunk = CompletionThunk<()>;

/// Continuation for stats delivery; it has no failure path
pub type StatsThunk = CompletionThunk<StatsReport, Infallible>;

/// Completion callback for candidate submission
pub type CandidateCallback = Box<dyn FnOnce(Result<(), RtcError>) + Send + 'static>;

/// Media direction intent of a local offer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaRole {
    /// Send only; nothing is requested from the remote side
    Publish,
    /// Receive audio and video from the remote side
    Subscribe,
}

/// Options for create-offer/create-answer
///
/// `None` for a receive flag leaves the decision to the engine.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OfferAnswerOptions {
    pub offer_to_receive_video: Option<bool>,
    pub offer_to_receive_audio: Option<bool>,
    pub voice_activity_detection: bool,
    pub ice_restart: bool,
}

impl OfferAnswerOptions {
    #[must_use]
    pub fn for_role(role: MediaRole) -> Self {
        let receive = match role {
            MediaRole::Publish => false,
            MediaRole::Subscribe => true,
        };
        Self {
            offer_to_receive_video: Some(receive),
            offer_to_receive_audio: Some(receive),
            ..Self::default()
        }
    }
}

/// Media kind of a transceiver
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Audio,
    Video,
    Unsupported,
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Audio => "audio",
            Self::Video => "video",
            Self::Unsupported => "unsupported",
        })
    }
}

impl From<RTPCodecType> for MediaKind {
    fn from(codec_type: RTPCodecType) -> Self {
        match codec_type {
            RTPCodecType::Audio => Self::Audio,
            RTPCodecType::Video => Self::Video,
            _ => Self::Unsupported,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransceiverDirection {
    SendRecv,
    SendOnly,
    RecvOnly,
    Inactive,
    Stopped,
}

impl TransceiverDirection {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::SendRecv => "sendrecv",
            Self::SendOnly => "sendonly",
            Self::RecvOnly => "recvonly",
            Self::Inactive => "inactive",
            Self::Stopped => "stopped",
        }
    }

    /// Map a `webrtc` direction; `Unspecified` has no counterpart
    #[must_use]
    pub const fn from_webrtc(direction: RTCRtpTransceiverDirection) -> Option<Self> {
        match direction {
            RTCRtpTransceiverDirection::Sendrecv => Some(Self::SendRecv),
            RTCRtpTransceiverDirection::Sendonly => Some(Self::SendOnly),
            RTCRtpTransceiverDirection::Recvonly => Some(Self::RecvOnly),
            RTCRtpTransceiverDirection::Inactive => Some(Self::Inactive),
            _ => None,
        }
    }
}

impl fmt::Display for TransceiverDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-layer send settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EncodingParameters {
    pub rid: Option<String>,
    pub active: bool,
    pub max_bitrate_bps: Option<u32>,
    pub min_bitrate_bps: Option<u32>,
    pub max_framerate: Option<f64>,
    pub scale_resolution_down_by: Option<f64>,
}

impl Default for EncodingParameters {
    fn default() -> Self {
        Self {
            rid: None,
            active: true,
            max_bitrate_bps: None,
            min_bitrate_bps: None,
            max_framerate: None,
            scale_resolution_down_by: None,
        }
    }
}

/// A sender's full parameter set; `encodings` order matches the engine's layers
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RtpParameters {
    pub transaction_id: String,
    pub encodings: Vec<EncodingParameters>,
}

/// Opaque statistics report
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StatsReport(serde_json::Value);

impl StatsReport {
    #[must_use]
    pub const fn new(value: serde_json::Value) -> Self {
        Self(value)
    }

    #[must_use]
    pub const fn as_json(&self) -> &serde_json::Value {
        &self.0
    }

    #[must_use]
    pub fn into_json(self) -> serde_json::Value {
        self.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IceConnectionState {
    New,
    Checking,
    Connected,
    Completed,
    Failed,
    Disconnected,
    Closed,
}

impl From<RTCIceConnectionState> for IceConnectionState {
    fn from(state: RTCIceConnectionState) -> Self {
        match state {
            RTCIceConnectionState::Checking => Self::Checking,
            RTCIceConnectionState::Connected => Self::Connected,
            RTCIceConnectionState::Completed => Self::Completed,
            RTCIceConnectionState::Failed => Self::Failed,
            RTCIceConnectionState::Disconnected => Self::Disconnected,
            RTCIceConnectionState::Closed => Self::Closed,
            _ => Self::New,
        }
    }
}

/// Sending half of a transceiver
pub trait RtpSender: Send + Sync {
    fn parameters(&self) -> RtpParameters;

    /// Apply a full parameter set in one step
    fn set_parameters(&self, parameters: RtpParameters) -> Result<(), RtcError>;
}

pub trait RtpTransceiver: Send + Sync {
    fn mid(&self) -> Option<String>;
    fn direction(&self) -> TransceiverDirection;
    /// Direction agreed in the last completed negotiation
    fn current_direction(&self) -> Option<TransceiverDirection>;
    fn media_kind(&self) -> MediaKind;
    fn sender(&self) -> Arc<dyn RtpSender>;
}

/// Observer-style peer connection engine
///
/// Every asynchronous method returns immediately and later signals the thunk
/// it was given, possibly from a different thread.
pub trait PeerConnectionEngine: Send + Sync + 'static {
    fn create_offer(&self, options: OfferAnswerOptions, observer: CreateDescriptionThunk);

    fn create_answer(&self, options: OfferAnswerOptions, observer: CreateDescriptionThunk);

    fn set_local_description(
        &self,
        description: SessionDescription,
        observer: SetDescriptionThunk,
    );

    fn set_remote_description(
        &self,
        description: SessionDescription,
        observer: SetDescriptionThunk,
    );

    fn add_ice_candidate(&self, candidate: IceCandidate, on_complete: CandidateCallback);

    fn get_stats(&self, observer: StatsThunk);

    fn transceivers(&self) -> Vec<Arc<dyn RtpTransceiver>>;

    fn local_description(&self) -> Option<SessionDescription>;

    /// Close the connection; must not wait on in-flight operations
    fn close(&self);
}

/// Outbound signaling produced by the engine
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineEvent {
    IceConnectionStateChange(IceConnectionState),
    IceCandidate {
        sdp_mid: String,
        sdp_mline_index: u16,
        candidate: String,
    },
}

/// Relays outbound signaling to the remote peer
pub trait MessageSender: Send + Sync {
    fn on_ice_connection_state_change(&self, state: IceConnectionState);

    fn on_ice_candidate(&self, sdp_mid: &str, sdp_mline_index: u16, sdp: &str);
}
