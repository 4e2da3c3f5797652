//! Fan-out of frames to registered sinks

use super::frame::VideoFrame;
use super::wants::VideoSinkWants;
use crate::config::VideoConfig;
use crate::diagnostics::{Diagnostic, DiagnosticSink};
use crate::error::SinkError;
use crate::types::SinkId;
use indexmap::IndexMap;
use parking_lot::RwLock;
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use tracing::debug;

/// Consumer of video frames
pub trait VideoSink: Send + Sync {
    /// Accept a frame; an error is reported and does not affect other sinks
    fn on_frame(&self, frame: &VideoFrame) -> Result<(), SinkError>;

    /// A frame was captured but dropped by the adapter
    fn on_discarded_frame(&self) {}
}

impl<T: VideoSink + ?Sized> VideoSink for Arc<T> {
    fn on_frame(&self, frame: &VideoFrame) -> Result<(), SinkError> {
        (**self).on_frame(frame)
    }

    fn on_discarded_frame(&self) {
        (**self).on_discarded_frame();
    }
}

/// Result of one [`FrameBroadcaster::dispatch`] call
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchReport {
    pub delivered: usize,
    pub failed: usize,
}

struct SinkEntry<S> {
    sink: S,
    wants: VideoSinkWants,
}

/// Ordered set of sinks keyed by [`SinkId`]
///
/// Membership may change from any thread; [`dispatch`](Self::dispatch)
/// delivers to the sinks registered when it started, in registration order.
pub struct FrameBroadcaster<S = Arc<dyn VideoSink>> {
    sinks: RwLock<IndexMap<SinkId, SinkEntry<S>>>,
    current_wants: RwLock<VideoSinkWants>,
    diagnostics: Arc<dyn DiagnosticSink>,
    isolate_panics: bool,
}

impl<S: VideoSink + Clone> FrameBroadcaster<S> {
    pub fn new(diagnostics: Arc<dyn DiagnosticSink>, config: &VideoConfig) -> Self {
        Self {
            sinks: RwLock::new(IndexMap::new()),
            current_wants: RwLock::new(VideoSinkWants::unconstrained()),
            diagnostics,
            isolate_panics: config.isolate_sink_panics,
        }
    }

    /// Insert or replace a sink; an update keeps its registration position
    ///
    /// Returns the new aggregate wants.
    pub fn add_or_update_sink(&self, id: SinkId, sink: S, wants: VideoSinkWants) -> VideoSinkWants {
        let mut sinks = self.sinks.write();
        let updated = sinks.insert(id.clone(), SinkEntry { sink, wants }).is_some();
        debug!(sink_id = %id, updated, sinks = sinks.len(), "Video sink registered");
        self.recompute(&sinks)
    }

    /// Remove a sink if present; returns the new aggregate wants
    pub fn remove_sink(&self, id: &SinkId) -> VideoSinkWants {
        let mut sinks = self.sinks.write();
        if sinks.shift_remove(id).is_some() {
            debug!(sink_id = %id, sinks = sinks.len(), "Video sink removed");
        }
        self.recompute(&sinks)
    }

    fn recompute(&self, sinks: &IndexMap<SinkId, SinkEntry<S>>) -> VideoSinkWants {
        let wants = VideoSinkWants::aggregate(sinks.values().map(|entry| &entry.wants));
        *self.current_wants.write() = wants;
        wants
    }

    /// Pointwise-strictest wants over all sinks; unconstrained when empty
    #[must_use]
    pub fn current_wants(&self) -> VideoSinkWants {
        *self.current_wants.read()
    }

    #[must_use]
    pub fn sink_count(&self) -> usize {
        self.sinks.read().len()
    }

    #[must_use]
    pub fn contains(&self, id: &SinkId) -> bool {
        self.sinks.read().contains_key(id)
    }

    fn snapshot(&self) -> Vec<(SinkId, S)> {
        self.sinks
            .read()
            .iter()
            .map(|(id, entry)| (id.clone(), entry.sink.clone()))
            .collect()
    }

    /// Deliver a frame to every sink in registration order
    ///
    /// The lock is released before delivery, so sinks may add or remove sinks
    /// (including themselves) from inside `on_frame`.
    pub fn dispatch(&self, frame: &VideoFrame) -> DispatchReport {
        let mut report = DispatchReport::default();

        for (id, sink) in self.snapshot() {
            let outcome = if self.isolate_panics {
                panic::catch_unwind(AssertUnwindSafe(|| sink.on_frame(frame)))
                    .unwrap_or_else(|payload| {
                        Err(SinkError::new(
                            id.clone(),
                            format!("sink panicked: {}", panic_message(&*payload)),
                        ))
                    })
            } else {
                sink.on_frame(frame)
            };

            match outcome {
                Ok(()) => report.delivered += 1,
                Err(err) => {
                    report.failed += 1;
                    self.diagnostics.report(Diagnostic::DeliveryFault {
                        sink: id,
                        reason: err.reason,
                    });
                }
            }
        }

        report
    }

    /// Tell every sink a frame was dropped before delivery
    ///
    /// A panicking sink is reported as a delivery fault like in
    /// [`dispatch`](Self::dispatch).
    pub fn discard(&self) {
        for (id, sink) in self.snapshot() {
            if !self.isolate_panics {
                sink.on_discarded_frame();
                continue;
            }
            if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(|| sink.on_discarded_frame())) {
                self.diagnostics.report(Diagnostic::DeliveryFault {
                    sink: id,
                    reason: format!(
                        "sink panicked on discarded frame: {}",
                        panic_message(&*payload)
                    ),
                });
            }
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("unknown panic payload")
}
