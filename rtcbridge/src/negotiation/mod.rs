//! Negotiation completion bridge and orchestration

mod description;
mod engine;
mod session;

pub use description::{CandidateType, IceCandidate, SdpType, SessionDescription};
pub use engine::{
    CandidateCallback, CreateDescriptionThunk, EncodingParameters, EngineEvent,
    IceConnectionState, MediaKind, MediaRole, MessageSender, OfferAnswerOptions,
    PeerConnectionEngine, RtpParameters, RtpSender, RtpTransceiver, SetDescriptionThunk,
    StatsReport, StatsThunk, TransceiverDirection,
};
pub use session::{NegotiationSession, NegotiationState, SessionBuilder};
