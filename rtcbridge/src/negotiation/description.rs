//! Session descriptions and ICE candidates
//!
//! Both are carried around as their text form plus the few attributes the
//! negotiation layer looks at. Parsing validates the text before it reaches
//! the engine so malformed input is rejected with a line indicator.

use crate::error::{RtcError, SdpParseError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::io::Cursor;
use webrtc::ice::candidate::candidate_base::unmarshal_candidate;
use webrtc::ice::candidate::{Candidate, CandidateType as IceCandidateType};
use webrtc::ice_transport::ice_candidate::RTCIceCandidateInit;
use webrtc::peer_connection::sdp::sdp_type::RTCSdpType;
use webrtc::peer_connection::sdp::session_description::RTCSessionDescription;
use webrtc::sdp::description::session::SessionDescription as ParsedSdp;

/// Kind of session description
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SdpType {
    Offer,
    Pranswer,
    Answer,
    Rollback,
}

impl SdpType {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Offer => "offer",
            Self::Pranswer => "pranswer",
            Self::Answer => "answer",
            Self::Rollback => "rollback",
        }
    }
}

impl fmt::Display for SdpType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<RTCSdpType> for SdpType {
    type Error = RtcError;

    fn try_from(sdp_type: RTCSdpType) -> Result<Self, Self::Error> {
        match sdp_type {
            RTCSdpType::Offer => Ok(Self::Offer),
            RTCSdpType::Pranswer => Ok(Self::Pranswer),
            RTCSdpType::Answer => Ok(Self::Answer),
            RTCSdpType::Rollback => Ok(Self::Rollback),
            RTCSdpType::Unspecified => Err(RtcError::new(
                crate::error::RtcErrorKind::InvalidParameter,
                "unspecified session description type",
            )),
        }
    }
}

impl From<SdpType> for RTCSdpType {
    fn from(sdp_type: SdpType) -> Self {
        match sdp_type {
            SdpType::Offer => Self::Offer,
            SdpType::Pranswer => Self::Pranswer,
            SdpType::Answer => Self::Answer,
            SdpType::Rollback => Self::Rollback,
        }
    }
}

/// An offer or answer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionDescription {
    kind: SdpType,
    sdp: String,
}

impl SessionDescription {
    /// Wrap text produced by the engine itself; no validation is done
    pub fn new(kind: SdpType, sdp: impl Into<String>) -> Self {
        Self {
            kind,
            sdp: sdp.into(),
        }
    }

    /// Parse inbound text as a description of `kind`
    pub fn parse(kind: SdpType, sdp: &str) -> Result<Self, SdpParseError> {
        if kind == SdpType::Rollback && sdp.trim().is_empty() {
            return Ok(Self::new(kind, String::new()));
        }
        if sdp.trim().is_empty() {
            return Err(SdpParseError::without_line("Empty session description"));
        }

        for line in sdp.lines() {
            let line = line.trim_end_matches('\r');
            if line.is_empty() {
                continue;
            }
            if !is_sdp_line(line) {
                return Err(SdpParseError::new("Invalid SDP line.", line));
            }
        }

        let mut reader = Cursor::new(sdp.as_bytes());
        ParsedSdp::unmarshal(&mut reader)
            .map_err(|e| SdpParseError::without_line(format!("Invalid session description: {e}")))?;

        Ok(Self::new(kind, sdp))
    }

    #[must_use]
    pub const fn kind(&self) -> SdpType {
        self.kind
    }

    /// Serialized text form
    #[must_use]
    pub fn to_sdp_string(&self) -> String {
        self.sdp.clone()
    }

    #[must_use]
    pub fn as_sdp(&self) -> &str {
        &self.sdp
    }
}

/// `<type>=<value>` with a single lowercase letter type
fn is_sdp_line(line: &str) -> bool {
    let bytes = line.as_bytes();
    bytes.len() >= 2 && bytes[0].is_ascii_lowercase() && bytes[1] == b'='
}

impl TryFrom<RTCSessionDescription> for SessionDescription {
    type Error = RtcError;

    fn try_from(desc: RTCSessionDescription) -> Result<Self, Self::Error> {
        Ok(Self::new(SdpType::try_from(desc.sdp_type)?, desc.sdp))
    }
}

impl TryFrom<&SessionDescription> for RTCSessionDescription {
    type Error = RtcError;

    fn try_from(desc: &SessionDescription) -> Result<Self, Self::Error> {
        let converted = match desc.kind {
            SdpType::Offer => Self::offer(desc.sdp.clone())?,
            SdpType::Answer => Self::answer(desc.sdp.clone())?,
            SdpType::Pranswer => Self::pranswer(desc.sdp.clone())?,
            SdpType::Rollback => {
                let mut rollback = Self::default();
                rollback.sdp_type = RTCSdpType::Rollback;
                rollback
            }
        };
        Ok(converted)
    }
}

/// ICE candidate type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CandidateType {
    Host,
    Srflx,
    Prflx,
    Relay,
}

impl TryFrom<IceCandidateType> for CandidateType {
    type Error = SdpParseError;

    fn try_from(candidate_type: IceCandidateType) -> Result<Self, Self::Error> {
        match candidate_type {
            IceCandidateType::Host => Ok(Self::Host),
            IceCandidateType::ServerReflexive => Ok(Self::Srflx),
            IceCandidateType::PeerReflexive => Ok(Self::Prflx),
            IceCandidateType::Relay => Ok(Self::Relay),
            IceCandidateType::Unspecified => {
                Err(SdpParseError::without_line("Unspecified candidate type"))
            }
        }
    }
}

/// Remote reachability hint for one media section
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IceCandidate {
    sdp_mid: String,
    sdp_mline_index: u16,
    candidate: String,
    foundation: String,
    component: u16,
    protocol: String,
    priority: u32,
    address: String,
    port: u16,
    candidate_type: CandidateType,
}

const CANDIDATE_PREFIX: &str = "candidate:";

impl IceCandidate {
    /// Parse a `candidate:` attribute received from the remote peer
    ///
    /// The attribute body goes through the ICE agent's own unmarshaller, so
    /// anything accepted here is accepted by the engine as well.
    pub fn parse(sdp_mid: &str, sdp_mline_index: u16, sdp: &str) -> Result<Self, SdpParseError> {
        let line = sdp.trim();
        let line = line.strip_prefix("a=").unwrap_or(line);
        let body = line
            .strip_prefix(CANDIDATE_PREFIX)
            .ok_or_else(|| SdpParseError::new("Expect line: candidate:<candidate-str>", line))?;

        let parsed = unmarshal_candidate(body)
            .map_err(|e| SdpParseError::new(format!("Invalid candidate: {e}"), line))?;
        let candidate_type = CandidateType::try_from(parsed.candidate_type())
            .map_err(|e| SdpParseError::new(e.description, line))?;

        Ok(Self {
            sdp_mid: sdp_mid.to_string(),
            sdp_mline_index,
            candidate: format!("{CANDIDATE_PREFIX}{body}"),
            foundation: parsed.foundation(),
            component: parsed.component(),
            protocol: parsed.network_type().network_short(),
            priority: parsed.priority(),
            address: parsed.address(),
            port: parsed.port(),
            candidate_type,
        })
    }

    #[must_use]
    pub fn sdp_mid(&self) -> &str {
        &self.sdp_mid
    }

    #[must_use]
    pub const fn sdp_mline_index(&self) -> u16 {
        self.sdp_mline_index
    }

    /// Serialized `candidate:` attribute
    #[must_use]
    pub fn to_sdp_string(&self) -> String {
        self.candidate.clone()
    }

    #[must_use]
    pub fn foundation(&self) -> &str {
        &self.foundation
    }

    #[must_use]
    pub const fn component(&self) -> u16 {
        self.component
    }

    #[must_use]
    pub fn protocol(&self) -> &str {
        &self.protocol
    }

    #[must_use]
    pub const fn priority(&self) -> u32 {
        self.priority
    }

    #[must_use]
    pub fn address(&self) -> &str {
        &self.address
    }

    #[must_use]
    pub const fn port(&self) -> u16 {
        self.port
    }

    #[must_use]
    pub const fn candidate_type(&self) -> CandidateType {
        self.candidate_type
    }
}

impl From<&IceCandidate> for RTCIceCandidateInit {
    fn from(candidate: &IceCandidate) -> Self {
        Self {
            candidate: candidate.candidate.clone(),
            sdp_mid: Some(candidate.sdp_mid.clone()),
            sdp_mline_index: Some(candidate.sdp_mline_index),
            username_fragment: None,
        }
    }
}
