//! Per-frame drop and downscale decisions

use super::frame::{UpdateRect, VideoFrame, VideoRotation};
use super::wants::VideoSinkWants;
use crate::config::VideoConfig;
use parking_lot::Mutex;
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, trace};

/// Outcome of [`FrameAdapter::adapt_frame_resolution`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdaptationDecision {
    /// The frame-rate constraint is not yet satisfied
    Drop,
    Keep {
        target_width: u32,
        target_height: u32,
    },
}

impl AdaptationDecision {
    #[must_use]
    pub const fn is_drop(&self) -> bool {
        matches!(self, Self::Drop)
    }

    /// Whether a frame of `width` x `height` must be resampled
    #[must_use]
    pub const fn needs_scaling(&self, width: u32, height: u32) -> bool {
        match self {
            Self::Drop => false,
            Self::Keep {
                target_width,
                target_height,
            } => *target_width != width || *target_height != height,
        }
    }

    /// Map a partial-update region of the source into output coordinates
    #[must_use]
    pub fn map_update_rect(&self, rect: &UpdateRect, width: u32, height: u32) -> Option<UpdateRect> {
        match self {
            Self::Drop => None,
            Self::Keep {
                target_width,
                target_height,
            } => Some(rect.scale_with_frame(
                width,
                height,
                0,
                0,
                width,
                height,
                *target_width,
                *target_height,
            )),
        }
    }
}

/// Running counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct AdapterStats {
    pub frames_in: u64,
    pub frames_dropped: u64,
    pub frames_scaled: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Fraction {
    numerator: u64,
    denominator: u64,
}

impl Fraction {
    const ONE: Self = Self {
        numerator: 1,
        denominator: 1,
    };

    const fn scale_pixel_count(&self, pixels: u64) -> u64 {
        pixels * self.numerator * self.numerator / (self.denominator * self.denominator)
    }

    const fn scale(&self, value: u32) -> u32 {
        (value as u64 * self.numerator / self.denominator) as u32
    }

    /// Next step down: alternately x3/4 and x2/3, giving 1, 3/4, 1/2, 3/8, 1/4, ...
    const fn step_down(self) -> Self {
        if self.numerator % 3 == 0 && self.denominator % 2 == 0 {
            Self {
                numerator: self.numerator / 3,
                denominator: self.denominator / 2,
            }
        } else {
            Self {
                numerator: self.numerator * 3,
                denominator: self.denominator * 4,
            }
        }
    }
}

/// Pick the scale step whose pixel count is closest to `target_pixels`
/// without exceeding `max_pixels`
fn find_scale(input_pixels: u64, target_pixels: u64, max_pixels: u64) -> Fraction {
    if input_pixels <= target_pixels {
        return Fraction::ONE;
    }

    let mut current = Fraction::ONE;
    let mut best = Fraction::ONE;
    let mut best_distance = u64::MAX;

    while current.scale_pixel_count(input_pixels) > target_pixels {
        current = current.step_down();
        let output_pixels = current.scale_pixel_count(input_pixels);
        if output_pixels <= max_pixels {
            let distance = target_pixels.abs_diff(output_pixels);
            if distance < best_distance {
                best_distance = distance;
                best = current;
                if distance == 0 {
                    break;
                }
            }
        }
    }

    best
}

/// Round down to a multiple of `alignment`, never below one multiple when the
/// input allows it
const fn align_down(value: u32, alignment: u32) -> u32 {
    if alignment <= 1 {
        return value;
    }
    let aligned = value / alignment * alignment;
    if aligned == 0 { value } else { aligned }
}

#[derive(Debug, Default)]
struct FramerateController {
    interval_us: Option<i64>,
    next_frame_timestamp_us: Option<i64>,
}

impl FramerateController {
    fn set_interval(&mut self, interval_us: Option<i64>) {
        if self.interval_us != interval_us {
            self.interval_us = interval_us;
            self.next_frame_timestamp_us = None;
        }
    }

    fn should_drop(&mut self, timestamp_us: i64, tolerance_us: i64) -> bool {
        let Some(interval) = self.interval_us else {
            return false;
        };
        if interval == i64::MAX {
            return true;
        }

        if let Some(next) = self.next_frame_timestamp_us {
            // A backwards jump too large to measure counts as a reset
            let behind = next.checked_sub(timestamp_us);
            if behind.is_some_and(|behind| behind <= interval.saturating_mul(2)) {
                if timestamp_us.saturating_add(tolerance_us) < next {
                    return true;
                }
                let ahead = timestamp_us.checked_sub(next).unwrap_or(i64::MAX);
                self.next_frame_timestamp_us = Some(if ahead < interval {
                    next.saturating_add(interval)
                } else {
                    timestamp_us.saturating_add(interval)
                });
                return false;
            }
        }

        self.next_frame_timestamp_us = Some(timestamp_us.saturating_add(interval));
        false
    }
}

#[derive(Debug, Default)]
struct AdapterState {
    wants: VideoSinkWants,
    framerate: FramerateController,
    stats: AdapterStats,
}

/// Drop/scale policy driven by the aggregated sink wants
///
/// Wants are updated from the sink management thread through
/// [`FrameAdapter::on_sink_wants`]; decisions are taken on the capture thread.
#[derive(Debug)]
pub struct FrameAdapter {
    state: Mutex<AdapterState>,
    tolerance_us: i64,
}

impl Default for FrameAdapter {
    fn default() -> Self {
        Self::new(&VideoConfig::default())
    }
}

impl FrameAdapter {
    #[must_use]
    pub fn new(config: &VideoConfig) -> Self {
        Self {
            state: Mutex::new(AdapterState::default()),
            tolerance_us: config.framerate_tolerance_us.max(0),
        }
    }

    /// Replace the constraint state; called on membership or wants changes
    pub fn on_sink_wants(&self, wants: &VideoSinkWants) {
        let mut state = self.state.lock();
        if state.wants == *wants {
            return;
        }
        debug!(
            max_pixel_count = wants.max_pixel_count,
            target_pixel_count = ?wants.target_pixel_count,
            max_framerate_fps = wants.max_framerate_fps,
            resolution_alignment = wants.resolution_alignment,
            "Video adaptation constraints updated"
        );
        state.framerate.set_interval(wants.frame_interval_us());
        state.wants = *wants;
    }

    #[must_use]
    pub fn wants(&self) -> VideoSinkWants {
        self.state.lock().wants
    }

    #[must_use]
    pub fn stats(&self) -> AdapterStats {
        self.state.lock().stats
    }

    /// Decide whether to drop a frame and, if kept, its output size
    pub fn adapt_frame_resolution(
        &self,
        width: u32,
        height: u32,
        timestamp_us: i64,
    ) -> AdaptationDecision {
        let mut state = self.state.lock();
        state.stats.frames_in += 1;

        let wants = state.wants;
        if wants.max_pixel_count == 0
            || state.framerate.should_drop(timestamp_us, self.tolerance_us)
        {
            state.stats.frames_dropped += 1;
            trace!(timestamp_us, "Dropping frame");
            return AdaptationDecision::Drop;
        }

        let max_pixels = u64::from(wants.max_pixel_count);
        let target_pixels = wants
            .target_pixel_count
            .map_or(max_pixels, |target| u64::from(target).min(max_pixels));
        let input_pixels = u64::from(width) * u64::from(height);

        let scale = find_scale(input_pixels, target_pixels, max_pixels);
        let alignment = wants.resolution_alignment.max(1);
        let target_width = align_down(scale.scale(width), alignment);
        let target_height = align_down(scale.scale(height), alignment);

        if target_width == 0 || target_height == 0 {
            state.stats.frames_dropped += 1;
            return AdaptationDecision::Drop;
        }
        if target_width != width || target_height != height {
            state.stats.frames_scaled += 1;
        }

        AdaptationDecision::Keep {
            target_width,
            target_height,
        }
    }

    /// Apply the decision to a frame
    ///
    /// Returns the input frame untouched when it already fits; a downscaled
    /// frame gets a fresh buffer, a remapped update region and no rotation.
    pub fn adapt(&self, frame: VideoFrame) -> Option<VideoFrame> {
        let (width, height) = (frame.width(), frame.height());
        let decision = self.adapt_frame_resolution(width, height, frame.timestamp_us());

        let AdaptationDecision::Keep {
            target_width,
            target_height,
        } = decision
        else {
            return None;
        };
        if !decision.needs_scaling(width, height) {
            return Some(frame);
        }

        let buffer = frame.buffer().scaled(target_width, target_height);
        let mut builder = VideoFrame::builder(Arc::new(buffer))
            .id(frame.id())
            .timestamp_us(frame.timestamp_us())
            .rotation(VideoRotation::None);
        if let Some(rect) = frame
            .update_rect()
            .and_then(|rect| decision.map_update_rect(&rect, width, height))
        {
            builder = builder.update_rect(rect);
        }

        Some(builder.build())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::video::frame::I420Buffer;

    const FRAME_INTERVAL_30FPS: i64 = 33_333;

    fn capped(width: u32, height: u32) -> FrameAdapter {
        let adapter = FrameAdapter::default();
        adapter.on_sink_wants(&VideoSinkWants::default().with_max_resolution(width, height));
        adapter
    }

    #[test]
    fn test_scale_steps() {
        let mut steps = vec![Fraction::ONE];
        for _ in 0..5 {
            let next = steps[steps.len() - 1].step_down();
            steps.push(next);
        }
        let as_pairs: Vec<_> = steps.iter().map(|f| (f.numerator, f.denominator)).collect();
        assert_eq!(as_pairs, vec![(1, 1), (3, 4), (1, 2), (3, 8), (1, 4), (3, 16)]);
    }

    #[test]
    fn test_unconstrained_keeps_size() {
        let adapter = FrameAdapter::default();
        assert_eq!(
            adapter.adapt_frame_resolution(1920, 1080, 0),
            AdaptationDecision::Keep {
                target_width: 1920,
                target_height: 1080
            }
        );
    }

    #[test]
    fn test_downscale_respects_max_pixels() {
        let adapter = capped(640, 480);
        let decision = adapter.adapt_frame_resolution(1280, 720, 0);
        assert_eq!(
            decision,
            AdaptationDecision::Keep {
                target_width: 640,
                target_height: 360
            }
        );
        assert!(decision.needs_scaling(1280, 720));
    }

    #[test]
    fn test_target_pixel_count_prefers_closest_step() {
        let adapter = FrameAdapter::default();
        adapter.on_sink_wants(
            &VideoSinkWants::default()
                .with_max_resolution(1280, 720)
                .with_target_pixel_count(640 * 360),
        );
        assert_eq!(
            adapter.adapt_frame_resolution(1280, 720, 0),
            AdaptationDecision::Keep {
                target_width: 640,
                target_height: 360
            }
        );
    }

    #[test]
    fn test_alignment_rounds_down() {
        let adapter = FrameAdapter::default();
        adapter.on_sink_wants(
            &VideoSinkWants::default()
                .with_max_resolution(640, 480)
                .with_resolution_alignment(16),
        );
        assert_eq!(
            adapter.adapt_frame_resolution(1280, 720, 0),
            AdaptationDecision::Keep {
                target_width: 640,
                target_height: 352
            }
        );
    }

    #[test]
    fn test_framerate_halved() {
        let adapter = FrameAdapter::default();
        adapter.on_sink_wants(&VideoSinkWants::default().with_max_framerate(15));

        let kept = (0..30)
            .filter(|i| {
                !adapter
                    .adapt_frame_resolution(640, 480, i * FRAME_INTERVAL_30FPS)
                    .is_drop()
            })
            .count();
        assert_eq!(kept, 15);
        assert_eq!(adapter.stats().frames_dropped, 15);
    }

    #[test]
    fn test_jitter_within_tolerance_is_kept() {
        let adapter = FrameAdapter::default();
        adapter.on_sink_wants(&VideoSinkWants::default().with_max_framerate(30));
        assert!(!adapter.adapt_frame_resolution(640, 480, 0).is_drop());
        assert!(!adapter
            .adapt_frame_resolution(640, 480, FRAME_INTERVAL_30FPS - 500)
            .is_drop());
        assert!(adapter
            .adapt_frame_resolution(640, 480, FRAME_INTERVAL_30FPS + 10_000)
            .is_drop());
    }

    #[test]
    fn test_zero_framerate_drops_everything() {
        let adapter = FrameAdapter::default();
        adapter.on_sink_wants(&VideoSinkWants::default().with_max_framerate(0));
        assert!((0..5).all(|i| adapter
            .adapt_frame_resolution(320, 240, i * FRAME_INTERVAL_30FPS)
            .is_drop()));
    }

    #[test]
    fn test_clock_reset_recovers() {
        let adapter = FrameAdapter::default();
        adapter.on_sink_wants(&VideoSinkWants::default().with_max_framerate(10));
        assert!(!adapter.adapt_frame_resolution(320, 240, 10_000_000).is_drop());
        assert!(!adapter.adapt_frame_resolution(320, 240, 0).is_drop());
    }

    #[test]
    fn test_extreme_backwards_jump_resets_clock() {
        let adapter = FrameAdapter::default();
        adapter.on_sink_wants(&VideoSinkWants::default().with_max_framerate(30));
        assert!(!adapter.adapt_frame_resolution(320, 240, i64::MAX - 10).is_drop());
        assert!(!adapter.adapt_frame_resolution(320, 240, -1).is_drop());
        assert!(!adapter.adapt_frame_resolution(320, 240, i64::MIN).is_drop());
        assert!(!adapter.adapt_frame_resolution(320, 240, i64::MAX).is_drop());
    }

    #[test]
    fn test_adapt_passes_fitting_frame_through() {
        let adapter = capped(1280, 720);
        let frame = VideoFrame::builder(Arc::new(I420Buffer::new(640, 360).expect("buffer")))
            .rotation(VideoRotation::Rotate90)
            .build();
        let out = adapter.adapt(frame.clone()).expect("kept");
        assert!(out.shares_buffer_with(&frame));
        assert_eq!(out.rotation(), VideoRotation::Rotate90);
    }

    #[test]
    fn test_adapt_rescales_into_new_buffer() {
        let adapter = capped(640, 360);
        let frame = VideoFrame::builder(Arc::new(I420Buffer::new(1280, 720).expect("buffer")))
            .timestamp_us(7)
            .rotation(VideoRotation::Rotate180)
            .update_rect(UpdateRect::new(0, 0, 1280, 720))
            .build();

        let out = adapter.adapt(frame.clone()).expect("kept");
        assert!(!out.shares_buffer_with(&frame));
        assert_eq!((out.width(), out.height()), (640, 360));
        assert_eq!(out.rotation(), VideoRotation::None);
        assert_eq!(out.timestamp_us(), 7);
        assert_eq!(out.update_rect(), Some(UpdateRect::new(0, 0, 640, 360)));
        // Source untouched
        assert_eq!(frame.width(), 1280);
    }
}
