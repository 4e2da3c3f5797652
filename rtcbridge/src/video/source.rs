//! Capturer-side glue between the adapter and the broadcaster

use super::adapter::{AdapterStats, FrameAdapter};
use super::broadcaster::{DispatchReport, FrameBroadcaster, VideoSink};
use super::frame::VideoFrame;
use super::wants::VideoSinkWants;
use crate::config::VideoConfig;
use crate::diagnostics::DiagnosticSink;
use crate::types::SinkId;
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::trace;

/// What happened to a captured frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameOutcome {
    Dropped,
    Delivered {
        rescaled: bool,
        report: DispatchReport,
    },
}

/// A video source that adapts captured frames to the wants of its sinks
pub struct VideoSource<S = Arc<dyn VideoSink>> {
    adapter: FrameAdapter,
    broadcaster: FrameBroadcaster<S>,
    // Keeps broadcaster membership and adapter constraints in step
    membership: Mutex<()>,
}

impl<S: VideoSink + Clone> VideoSource<S> {
    pub fn new(config: &VideoConfig, diagnostics: Arc<dyn DiagnosticSink>) -> Self {
        Self {
            adapter: FrameAdapter::new(config),
            broadcaster: FrameBroadcaster::new(diagnostics, config),
            membership: Mutex::new(()),
        }
    }

    /// Feed one captured frame through adaptation and fan-out
    pub fn on_frame(&self, frame: VideoFrame) -> FrameOutcome {
        let size = (frame.width(), frame.height());
        let Some(adapted) = self.adapter.adapt(frame) else {
            trace!("Frame dropped by adapter");
            self.broadcaster.discard();
            return FrameOutcome::Dropped;
        };

        FrameOutcome::Delivered {
            rescaled: (adapted.width(), adapted.height()) != size,
            report: self.broadcaster.dispatch(&adapted),
        }
    }

    pub fn add_or_update_sink(&self, id: SinkId, sink: S, wants: VideoSinkWants) {
        let _guard = self.membership.lock();
        let aggregate = self.broadcaster.add_or_update_sink(id, sink, wants);
        self.adapter.on_sink_wants(&aggregate);
    }

    pub fn remove_sink(&self, id: &SinkId) {
        let _guard = self.membership.lock();
        let aggregate = self.broadcaster.remove_sink(id);
        self.adapter.on_sink_wants(&aggregate);
    }

    /// Aggregate wants of all sinks
    #[must_use]
    pub fn sink_wants(&self) -> VideoSinkWants {
        self.broadcaster.current_wants()
    }

    #[must_use]
    pub fn adapter_stats(&self) -> AdapterStats {
        self.adapter.stats()
    }

    #[must_use]
    pub const fn broadcaster(&self) -> &FrameBroadcaster<S> {
        &self.broadcaster
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::CollectingDiagnostics;
    use crate::error::SinkError;
    use crate::video::frame::I420Buffer;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct Counting {
        frames: AtomicUsize,
        discarded: AtomicUsize,
    }

    impl VideoSink for Counting {
        fn on_frame(&self, _: &VideoFrame) -> Result<(), SinkError> {
            self.frames.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        fn on_discarded_frame(&self) {
            self.discarded.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn frame(width: u32, height: u32, ts: i64) -> VideoFrame {
        VideoFrame::builder(Arc::new(I420Buffer::new(width, height).expect("buffer")))
            .timestamp_us(ts)
            .build()
    }

    #[test]
    fn test_sink_wants_reach_adapter() {
        let source: VideoSource =
            VideoSource::new(&VideoConfig::default(), Arc::new(CollectingDiagnostics::new()));
        let sink = Arc::new(Counting::default());
        source.add_or_update_sink(
            SinkId::new("preview"),
            sink.clone(),
            VideoSinkWants::default().with_max_resolution(640, 360),
        );

        let outcome = source.on_frame(frame(1280, 720, 0));
        assert_eq!(
            outcome,
            FrameOutcome::Delivered {
                rescaled: true,
                report: DispatchReport {
                    delivered: 1,
                    failed: 0
                }
            }
        );

        source.remove_sink(&SinkId::new("preview"));
        assert!(source.sink_wants().is_unconstrained());
        assert_eq!(sink.frames.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_height_only_alignment_counts_as_rescale() {
        let source: VideoSource =
            VideoSource::new(&VideoConfig::default(), Arc::new(CollectingDiagnostics::new()));
        source.add_or_update_sink(
            SinkId::new("encoder"),
            Arc::new(Counting::default()),
            VideoSinkWants::default().with_resolution_alignment(16),
        );

        let outcome = source.on_frame(frame(640, 360, 0));
        assert!(matches!(
            outcome,
            FrameOutcome::Delivered { rescaled: true, .. }
        ));
        assert_eq!(source.adapter_stats().frames_scaled, 1);
    }

    #[test]
    fn test_dropped_frames_are_announced() {
        let source: VideoSource =
            VideoSource::new(&VideoConfig::default(), Arc::new(CollectingDiagnostics::new()));
        let sink = Arc::new(Counting::default());
        source.add_or_update_sink(
            SinkId::new("paused"),
            sink.clone(),
            VideoSinkWants::default().with_max_framerate(0),
        );

        assert_eq!(source.on_frame(frame(320, 240, 0)), FrameOutcome::Dropped);
        assert_eq!(sink.discarded.load(Ordering::SeqCst), 1);
        assert_eq!(sink.frames.load(Ordering::SeqCst), 0);
        assert_eq!(source.adapter_stats().frames_dropped, 1);
    }
}
