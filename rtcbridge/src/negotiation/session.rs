//! Offer/answer/ICE orchestration for one peer connection
//!
//! Every engine call is paired with a [`CompletionThunk`]. Thunks only hold a
//! weak reference to the session, so a completion that lands after the
//! session was dropped never touches session state.

use super::description::{IceCandidate, SdpType, SessionDescription};
use super::engine::{
    EngineEvent, EncodingParameters, IceConnectionState, MediaKind, MediaRole, MessageSender,
    OfferAnswerOptions, PeerConnectionEngine, SetDescriptionThunk, StatsReport, StatsThunk,
};
use crate::completion::CompletionThunk;
use crate::config::SessionConfig;
use crate::diagnostics::{self, Diagnostic, DiagnosticSink, Operation, ParseTarget};
use crate::error::{RtcError, SdpParseError};
use crate::types::SessionId;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use tracing::{debug, info, warn};

/// Negotiation progress of a session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NegotiationState {
    New,
    OfferCreated,
    LocalSet,
    RemoteSet,
    Stable,
    Failed,
}

impl NegotiationState {
    /// Whether remote candidates are expected in this state
    #[must_use]
    pub const fn accepts_candidates(&self) -> bool {
        matches!(self, Self::LocalSet | Self::RemoteSet | Self::Stable)
    }
}

#[derive(Debug, Default, Clone, Copy)]
struct Progress {
    created: bool,
    local_applied: bool,
    remote_applied: bool,
    failed: bool,
}

impl Progress {
    const fn state(&self) -> NegotiationState {
        if self.failed {
            NegotiationState::Failed
        } else if self.local_applied && self.remote_applied {
            NegotiationState::Stable
        } else if self.remote_applied {
            NegotiationState::RemoteSet
        } else if self.local_applied {
            NegotiationState::LocalSet
        } else if self.created {
            NegotiationState::OfferCreated
        } else {
            NegotiationState::New
        }
    }
}

struct SessionShared {
    id: SessionId,
    engine: Arc<dyn PeerConnectionEngine>,
    diagnostics: Arc<dyn DiagnosticSink>,
    message_sender: Option<Arc<dyn MessageSender>>,
    config: SessionConfig,
    progress: Mutex<Progress>,
    closed: AtomicBool,
}

impl SessionShared {
    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    fn state(&self) -> NegotiationState {
        self.progress.lock().state()
    }

    fn update(&self, change: impl FnOnce(&mut Progress)) {
        let (old, new) = {
            let mut progress = self.progress.lock();
            let old = progress.state();
            change(&mut progress);
            (old, progress.state())
        };
        if old != new {
            debug!(session_id = %self.id, from = ?old, to = ?new, "Negotiation state changed");
        }
    }

    /// Apply a freshly created description locally. The outcome only moves
    /// the session state; the diagnostic sink records failures and the caller
    /// never sees them.
    fn apply_local_best_effort(self: &Arc<Self>, description: SessionDescription) {
        let on_applied = Arc::downgrade(self);
        let on_discarded = Arc::downgrade(self);

        let thunk = SetDescriptionThunk::new(
            Operation::SetLocalDescription,
            Arc::clone(&self.diagnostics),
            move |()| {
                if let Some(shared) = live(&on_applied) {
                    shared.update(|p| p.local_applied = true);
                }
            },
            move |error: RtcError| {
                if let Some(shared) = live(&on_discarded) {
                    shared.update(|p| p.failed = true);
                    debug!(
                        session_id = %shared.id,
                        error = %error,
                        "Local description failure not surfaced to caller"
                    );
                }
            },
        );

        self.engine.set_local_description(description, thunk);
    }
}

/// Live session handle; only reachable while the session is still open
fn live(weak: &Weak<SessionShared>) -> Option<Arc<SessionShared>> {
    weak.upgrade().filter(|shared| !shared.is_closed())
}

/// Builder for [`NegotiationSession`]
pub struct SessionBuilder {
    engine: Arc<dyn PeerConnectionEngine>,
    id: Option<SessionId>,
    config: SessionConfig,
    diagnostics: Option<Arc<dyn DiagnosticSink>>,
    message_sender: Option<Arc<dyn MessageSender>>,
}

impl SessionBuilder {
    #[must_use]
    pub fn id(mut self, id: impl Into<SessionId>) -> Self {
        self.id = Some(id.into());
        self
    }

    #[must_use]
    pub fn config(mut self, config: SessionConfig) -> Self {
        self.config = config;
        self
    }

    #[must_use]
    pub fn diagnostics(mut self, diagnostics: Arc<dyn DiagnosticSink>) -> Self {
        self.diagnostics = Some(diagnostics);
        self
    }

    #[must_use]
    pub fn message_sender(mut self, sender: Arc<dyn MessageSender>) -> Self {
        self.message_sender = Some(sender);
        self
    }

    #[must_use]
    pub fn build(self) -> NegotiationSession {
        let id = self.id.unwrap_or_else(SessionId::generate);
        info!(session_id = %id, "Negotiation session created");

        NegotiationSession {
            shared: Arc::new(SessionShared {
                id,
                engine: self.engine,
                diagnostics: self.diagnostics.unwrap_or_else(diagnostics::tracing_sink),
                message_sender: self.message_sender,
                config: self.config,
                progress: Mutex::new(Progress::default()),
                closed: AtomicBool::new(false),
            }),
        }
    }
}

/// Drives the offer/answer/ICE exchange of one connection
///
/// Dropping the session closes the engine connection immediately, even with
/// operations still in flight.
pub struct NegotiationSession {
    shared: Arc<SessionShared>,
}

impl NegotiationSession {
    #[must_use]
    pub fn builder(engine: Arc<dyn PeerConnectionEngine>) -> SessionBuilder {
        SessionBuilder {
            engine,
            id: None,
            config: SessionConfig::default(),
            diagnostics: None,
            message_sender: None,
        }
    }

    #[must_use]
    pub fn new(engine: Arc<dyn PeerConnectionEngine>) -> Self {
        Self::builder(engine).build()
    }

    #[must_use]
    pub fn id(&self) -> &SessionId {
        &self.shared.id
    }

    #[must_use]
    pub fn state(&self) -> NegotiationState {
        self.shared.state()
    }

    /// Create an offer for `role`, apply it locally, then hand it to `on_success`
    pub fn create_offer<S, F>(&self, role: MediaRole, on_success: S, on_failure: F)
    where
        S: FnOnce(SessionDescription) + Send + 'static,
        F: FnOnce(RtcError) + Send + 'static,
    {
        let options = OfferAnswerOptions::for_role(role);
        info!(session_id = %self.shared.id, role = ?role, "Creating offer");

        let thunk = self.creation_thunk(Operation::CreateOffer, on_success, on_failure);
        self.shared.engine.create_offer(options, thunk);
    }

    /// Create an answer with unconstrained options; it mirrors the remote offer
    pub fn create_answer<S, F>(&self, on_success: S, on_failure: F)
    where
        S: FnOnce(SessionDescription) + Send + 'static,
        F: FnOnce(RtcError) + Send + 'static,
    {
        info!(session_id = %self.shared.id, "Creating answer");

        let thunk = self.creation_thunk(Operation::CreateAnswer, on_success, on_failure);
        self.shared
            .engine
            .create_answer(OfferAnswerOptions::default(), thunk);
    }

    fn creation_thunk<S, F>(
        &self,
        operation: Operation,
        on_success: S,
        on_failure: F,
    ) -> CompletionThunk<SessionDescription>
    where
        S: FnOnce(SessionDescription) + Send + 'static,
        F: FnOnce(RtcError) + Send + 'static,
    {
        let on_created = Arc::downgrade(&self.shared);
        let on_failed = Arc::downgrade(&self.shared);

        CompletionThunk::new(
            operation,
            Arc::clone(&self.shared.diagnostics),
            move |description: SessionDescription| {
                if let Some(shared) = live(&on_created) {
                    shared.update(|p| p.created = true);
                    if shared.config.log_sdp {
                        info!(
                            session_id = %shared.id,
                            kind = %description.kind(),
                            sdp = %description.as_sdp(),
                            "Created session description"
                        );
                    }
                    shared.apply_local_best_effort(description.clone());
                } else {
                    debug!(
                        kind = %description.kind(),
                        "Session closed before the created description could be applied"
                    );
                }
                on_success(description);
            },
            move |error: RtcError| {
                if let Some(shared) = live(&on_failed) {
                    shared.update(|p| p.failed = true);
                }
                on_failure(error);
            },
        )
    }

    /// Parse `sdp` as an offer and apply it as the remote description
    ///
    /// A parse failure is reported to the diagnostic sink and returned; neither
    /// continuation fires in that case.
    pub fn set_offer<S, F>(&self, sdp: &str, on_success: S, on_failure: F) -> Result<(), SdpParseError>
    where
        S: FnOnce() + Send + 'static,
        F: FnOnce(RtcError) + Send + 'static,
    {
        self.set_remote(SdpType::Offer, ParseTarget::Offer, sdp, on_success, on_failure)
    }

    /// Parse `sdp` as an answer and apply it as the remote description
    ///
    /// Parse failures behave as in [`Self::set_offer`].
    pub fn set_answer<S, F>(&self, sdp: &str, on_success: S, on_failure: F) -> Result<(), SdpParseError>
    where
        S: FnOnce() + Send + 'static,
        F: FnOnce(RtcError) + Send + 'static,
    {
        self.set_remote(SdpType::Answer, ParseTarget::Answer, sdp, on_success, on_failure)
    }

    fn set_remote<S, F>(
        &self,
        kind: SdpType,
        target: ParseTarget,
        sdp: &str,
        on_success: S,
        on_failure: F,
    ) -> Result<(), SdpParseError>
    where
        S: FnOnce() + Send + 'static,
        F: FnOnce(RtcError) + Send + 'static,
    {
        let description = match SessionDescription::parse(kind, sdp) {
            Ok(description) => description,
            Err(error) => {
                self.shared.diagnostics.report(Diagnostic::Parse {
                    target,
                    error: error.clone(),
                });
                return Err(error);
            }
        };

        let on_applied = Arc::downgrade(&self.shared);
        let on_failed = Arc::downgrade(&self.shared);

        let thunk = SetDescriptionThunk::new(
            Operation::SetRemoteDescription,
            Arc::clone(&self.shared.diagnostics),
            move |()| {
                if let Some(shared) = live(&on_applied) {
                    shared.update(|p| p.remote_applied = true);
                }
                on_success();
            },
            move |error: RtcError| {
                if let Some(shared) = live(&on_failed) {
                    shared.update(|p| p.failed = true);
                }
                on_failure(error);
            },
        );

        debug!(session_id = %self.shared.id, kind = %kind, "Applying remote description");
        self.shared.engine.set_remote_description(description, thunk);
        Ok(())
    }

    /// Hand a remote candidate to the engine
    ///
    /// Nothing is surfaced to the caller: parse failures and engine rejections
    /// are only reported to the diagnostic sink.
    pub fn add_ice_candidate(&self, sdp_mid: &str, sdp_mline_index: u16, sdp: &str) {
        let candidate = match IceCandidate::parse(sdp_mid, sdp_mline_index, sdp) {
            Ok(candidate) => candidate,
            Err(error) => {
                self.shared.diagnostics.report(Diagnostic::Parse {
                    target: ParseTarget::IceCandidate,
                    error,
                });
                return;
            }
        };

        let state = self.shared.state();
        if !state.accepts_candidates() {
            debug!(
                session_id = %self.shared.id,
                state = ?state,
                "Candidate arrived before any description was applied"
            );
        }

        let diagnostics = Arc::clone(&self.shared.diagnostics);
        let raw = sdp.to_string();
        self.shared.engine.add_ice_candidate(
            candidate,
            Box::new(move |result| {
                if let Err(error) = result {
                    diagnostics.report(Diagnostic::CandidateRejected {
                        error,
                        candidate: raw,
                    });
                }
            }),
        );
    }

    /// Request a statistics report; `callback` runs when it is delivered
    pub fn get_stats<C>(&self, callback: C)
    where
        C: FnOnce(StatsReport) + Send + 'static,
    {
        let thunk = StatsThunk::from_parts(
            Operation::GetStats,
            Arc::clone(&self.shared.diagnostics),
            Some(Box::new(callback)),
            None,
        );
        self.shared.engine.get_stats(thunk);
    }

    /// Replace the encodings of the first video sender
    ///
    /// Logs every transceiver first. Without a video transceiver this reports a
    /// configuration error and changes nothing.
    pub fn set_encoding_parameters(&self, encodings: Vec<EncodingParameters>) {
        let transceivers = self.shared.engine.transceivers();

        for transceiver in &transceivers {
            let mid = transceiver.mid();
            let current_direction = transceiver.current_direction();
            info!(
                session_id = %self.shared.id,
                mid = mid.as_deref().unwrap_or("nullopt"),
                direction = %transceiver.direction(),
                current_direction = current_direction.map_or("nullopt", |d| d.as_str()),
                media_type = %transceiver.media_kind(),
                sender_encoding_count = transceiver.sender().parameters().encodings.len(),
                "transceiver"
            );
        }

        let Some(video) = transceivers
            .iter()
            .find(|t| t.media_kind() == MediaKind::Video)
        else {
            self.shared.diagnostics.report(Diagnostic::Configuration {
                message: "video transceiver not found".to_string(),
            });
            return;
        };

        let sender = video.sender();
        let mut parameters = sender.parameters();
        parameters.encodings = encodings;

        if let Err(error) = sender.set_parameters(parameters) {
            self.shared.diagnostics.report(Diagnostic::Negotiation {
                operation: Operation::SetParameters,
                error,
            });
        }
    }

    /// Serialized current local description, if any
    #[must_use]
    pub fn local_offer(&self) -> Option<String> {
        self.shared
            .engine
            .local_description()
            .map(|description| description.to_sdp_string())
    }

    /// Relay an outbound engine event to the message sender
    pub fn handle_engine_event(&self, event: EngineEvent) {
        match event {
            EngineEvent::IceConnectionStateChange(state) => {
                match state {
                    IceConnectionState::Failed | IceConnectionState::Disconnected => {
                        warn!(session_id = %self.shared.id, state = ?state, "ICE connection degraded");
                    }
                    _ => info!(session_id = %self.shared.id, state = ?state, "ICE connection state changed"),
                }
                if let Some(sender) = &self.shared.message_sender {
                    sender.on_ice_connection_state_change(state);
                }
            }
            EngineEvent::IceCandidate {
                sdp_mid,
                sdp_mline_index,
                candidate,
            } => {
                debug!(session_id = %self.shared.id, sdp_mid = %sdp_mid, "Local ICE candidate gathered");
                if let Some(sender) = &self.shared.message_sender {
                    sender.on_ice_candidate(&sdp_mid, sdp_mline_index, &candidate);
                }
            }
        }
    }
}

impl Drop for NegotiationSession {
    fn drop(&mut self) {
        self.shared.closed.store(true, Ordering::Release);
        self.shared.engine.close();
        info!(
            session_id = %self.shared.id,
            state = ?self.shared.state(),
            "Negotiation session closed"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_progress_states() {
        let mut progress = Progress::default();
        assert_eq!(progress.state(), NegotiationState::New);

        progress.created = true;
        assert_eq!(progress.state(), NegotiationState::OfferCreated);

        progress.local_applied = true;
        assert_eq!(progress.state(), NegotiationState::LocalSet);
        assert!(progress.state().accepts_candidates());

        progress.remote_applied = true;
        assert_eq!(progress.state(), NegotiationState::Stable);

        progress.failed = true;
        assert_eq!(progress.state(), NegotiationState::Failed);
    }

    #[test]
    fn test_answerer_path() {
        let progress = Progress {
            remote_applied: true,
            created: true,
            ..Progress::default()
        };
        assert_eq!(progress.state(), NegotiationState::RemoteSet);
        assert!(!NegotiationState::OfferCreated.accepts_candidates());
    }
}
