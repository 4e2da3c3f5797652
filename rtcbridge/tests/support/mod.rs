//! In-memory peer connection engine for integration tests
//!
//! Every asynchronous call is recorded and its continuation parked until the
//! test completes it, from the test thread or any other.

#![allow(dead_code)]

use parking_lot::Mutex;
use rtcbridge::negotiation::{
    CandidateCallback, CreateDescriptionThunk, IceCandidate, MediaKind, OfferAnswerOptions,
    PeerConnectionEngine, RtpParameters, RtpSender, RtpTransceiver, SdpType, SessionDescription,
    SetDescriptionThunk, StatsThunk, TransceiverDirection,
};
use rtcbridge::{RtcError, RtcErrorKind};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

pub const OFFER_SDP: &str = "v=0\r\n\
o=- 4215775240449105457 2 IN IP4 127.0.0.1\r\n\
s=-\r\n\
t=0 0\r\n\
a=group:BUNDLE 0\r\n\
m=video 9 UDP/TLS/RTP/SAVPF 96\r\n\
c=IN IP4 0.0.0.0\r\n\
a=mid:0\r\n\
a=sendonly\r\n\
a=rtpmap:96 VP8/90000\r\n";

pub const ANSWER_SDP: &str = "v=0\r\n\
o=- 7614219274584779017 2 IN IP4 127.0.0.1\r\n\
s=-\r\n\
t=0 0\r\n\
a=group:BUNDLE 0\r\n\
m=video 9 UDP/TLS/RTP/SAVPF 96\r\n\
c=IN IP4 0.0.0.0\r\n\
a=mid:0\r\n\
a=recvonly\r\n\
a=rtpmap:96 VP8/90000\r\n";

pub const HOST_CANDIDATE: &str = "candidate:1 1 udp 2122252543 192.168.1.2 54321 typ host";

#[derive(Debug, Clone, PartialEq)]
pub enum EngineCall {
    CreateOffer(OfferAnswerOptions),
    CreateAnswer(OfferAnswerOptions),
    SetLocal(SdpType),
    SetRemote(SdpType),
    AddIceCandidate(String),
    GetStats,
    Close,
}

#[derive(Default)]
pub struct FakeEngine {
    calls: Mutex<Vec<EngineCall>>,
    creates: Mutex<VecDeque<CreateDescriptionThunk>>,
    local_sets: Mutex<VecDeque<(SessionDescription, SetDescriptionThunk)>>,
    remote_sets: Mutex<VecDeque<(SessionDescription, SetDescriptionThunk)>>,
    candidates: Mutex<VecDeque<(IceCandidate, CandidateCallback)>>,
    stats: Mutex<VecDeque<StatsThunk>>,
    transceivers: Mutex<Vec<Arc<dyn RtpTransceiver>>>,
    local_description: Mutex<Option<SessionDescription>>,
    closed: AtomicBool,
}

impl FakeEngine {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn calls(&self) -> Vec<EngineCall> {
        self.calls.lock().clone()
    }

    pub fn count(&self, matches: impl Fn(&EngineCall) -> bool) -> usize {
        self.calls.lock().iter().filter(|call| matches(call)).count()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    pub fn add_transceiver(&self, transceiver: Arc<dyn RtpTransceiver>) {
        self.transceivers.lock().push(transceiver);
    }

    pub fn take_create(&self) -> CreateDescriptionThunk {
        self.creates
            .lock()
            .pop_front()
            .expect("no pending create call")
    }

    pub fn take_set_local(&self) -> (SessionDescription, SetDescriptionThunk) {
        self.local_sets
            .lock()
            .pop_front()
            .expect("no pending set-local call")
    }

    pub fn take_set_remote(&self) -> (SessionDescription, SetDescriptionThunk) {
        self.remote_sets
            .lock()
            .pop_front()
            .expect("no pending set-remote call")
    }

    pub fn take_candidate(&self) -> (IceCandidate, CandidateCallback) {
        self.candidates
            .lock()
            .pop_front()
            .expect("no pending candidate")
    }

    pub fn take_stats(&self) -> StatsThunk {
        self.stats.lock().pop_front().expect("no pending stats call")
    }

    /// Complete the oldest set-local call and remember the description
    pub fn apply_pending_local(&self) {
        let (description, thunk) = self.take_set_local();
        *self.local_description.lock() = Some(description);
        thunk.resolve(());
    }

    fn record(&self, call: EngineCall) {
        self.calls.lock().push(call);
    }
}

impl PeerConnectionEngine for FakeEngine {
    fn create_offer(&self, options: OfferAnswerOptions, observer: CreateDescriptionThunk) {
        self.record(EngineCall::CreateOffer(options));
        self.creates.lock().push_back(observer);
    }

    fn create_answer(&self, options: OfferAnswerOptions, observer: CreateDescriptionThunk) {
        self.record(EngineCall::CreateAnswer(options));
        self.creates.lock().push_back(observer);
    }

    fn set_local_description(&self, description: SessionDescription, observer: SetDescriptionThunk) {
        self.record(EngineCall::SetLocal(description.kind()));
        self.local_sets.lock().push_back((description, observer));
    }

    fn set_remote_description(
        &self,
        description: SessionDescription,
        observer: SetDescriptionThunk,
    ) {
        self.record(EngineCall::SetRemote(description.kind()));
        self.remote_sets.lock().push_back((description, observer));
    }

    fn add_ice_candidate(&self, candidate: IceCandidate, on_complete: CandidateCallback) {
        self.record(EngineCall::AddIceCandidate(candidate.to_sdp_string()));
        self.candidates.lock().push_back((candidate, on_complete));
    }

    fn get_stats(&self, observer: StatsThunk) {
        self.record(EngineCall::GetStats);
        self.stats.lock().push_back(observer);
    }

    fn transceivers(&self) -> Vec<Arc<dyn RtpTransceiver>> {
        self.transceivers.lock().clone()
    }

    fn local_description(&self) -> Option<SessionDescription> {
        self.local_description.lock().clone()
    }

    fn close(&self) {
        self.record(EngineCall::Close);
        self.closed.store(true, Ordering::SeqCst);
    }
}

pub struct FakeSender {
    parameters: Mutex<RtpParameters>,
    set_calls: AtomicUsize,
    fail_with: Option<RtcError>,
}

impl FakeSender {
    pub fn with_layers(layers: usize) -> Arc<Self> {
        Arc::new(Self {
            parameters: Mutex::new(RtpParameters {
                transaction_id: "tx-1".to_string(),
                encodings: vec![Default::default(); layers],
            }),
            set_calls: AtomicUsize::new(0),
            fail_with: None,
        })
    }

    pub fn failing(error: RtcError) -> Arc<Self> {
        Arc::new(Self {
            parameters: Mutex::new(RtpParameters::default()),
            set_calls: AtomicUsize::new(0),
            fail_with: Some(error),
        })
    }

    pub fn set_calls(&self) -> usize {
        self.set_calls.load(Ordering::SeqCst)
    }

    pub fn invalid_modification() -> RtcError {
        RtcError::new(RtcErrorKind::InvalidModification, "layer count changed")
    }
}

impl RtpSender for FakeSender {
    fn parameters(&self) -> RtpParameters {
        self.parameters.lock().clone()
    }

    fn set_parameters(&self, parameters: RtpParameters) -> Result<(), RtcError> {
        self.set_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(error) = &self.fail_with {
            return Err(error.clone());
        }
        *self.parameters.lock() = parameters;
        Ok(())
    }
}

pub struct FakeTransceiver {
    pub mid: Option<String>,
    pub kind: MediaKind,
    pub direction: TransceiverDirection,
    pub current_direction: Option<TransceiverDirection>,
    pub sender: Arc<FakeSender>,
}

impl FakeTransceiver {
    pub fn new(mid: &str, kind: MediaKind, sender: Arc<FakeSender>) -> Arc<Self> {
        Arc::new(Self {
            mid: Some(mid.to_string()),
            kind,
            direction: TransceiverDirection::SendOnly,
            current_direction: None,
            sender,
        })
    }
}

impl RtpTransceiver for FakeTransceiver {
    fn mid(&self) -> Option<String> {
        self.mid.clone()
    }

    fn direction(&self) -> TransceiverDirection {
        self.direction
    }

    fn current_direction(&self) -> Option<TransceiverDirection> {
        self.current_direction
    }

    fn media_kind(&self) -> MediaKind {
        self.kind
    }

    fn sender(&self) -> Arc<dyn RtpSender> {
        self.sender.clone()
    }
}
