//! Sink constraints and their aggregation

use serde::{Deserialize, Serialize};

/// What a sink wants from the frames it is handed
///
/// Unconstrained fields hold `u32::MAX` (or `None` for the target).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VideoSinkWants {
    /// Upper bound on width * height
    pub max_pixel_count: u32,
    /// Preferred width * height; the adapter aims for the closest step below `max_pixel_count`
    pub target_pixel_count: Option<u32>,
    pub max_framerate_fps: u32,
    /// The sink wants rotation baked into the pixels rather than carried as metadata
    pub rotation_applied: bool,
    /// Output width and height must be multiples of this
    pub resolution_alignment: u32,
}

impl Default for VideoSinkWants {
    fn default() -> Self {
        Self::unconstrained()
    }
}

impl VideoSinkWants {
    #[must_use]
    pub const fn unconstrained() -> Self {
        Self {
            max_pixel_count: u32::MAX,
            target_pixel_count: None,
            max_framerate_fps: u32::MAX,
            rotation_applied: false,
            resolution_alignment: 1,
        }
    }

    /// Cap at `width` x `height` pixels
    #[must_use]
    pub const fn with_max_resolution(mut self, width: u32, height: u32) -> Self {
        self.max_pixel_count = width.saturating_mul(height);
        self
    }

    #[must_use]
    pub const fn with_max_framerate(mut self, fps: u32) -> Self {
        self.max_framerate_fps = fps;
        self
    }

    #[must_use]
    pub const fn with_target_pixel_count(mut self, pixels: u32) -> Self {
        self.target_pixel_count = Some(pixels);
        self
    }

    #[must_use]
    pub const fn with_resolution_alignment(mut self, alignment: u32) -> Self {
        self.resolution_alignment = alignment;
        self
    }

    #[must_use]
    pub const fn with_rotation_applied(mut self, applied: bool) -> Self {
        self.rotation_applied = applied;
        self
    }

    #[must_use]
    pub fn is_unconstrained(&self) -> bool {
        *self == Self::unconstrained()
    }

    /// Minimum spacing between delivered frames, `None` when unlimited
    #[must_use]
    pub const fn frame_interval_us(&self) -> Option<i64> {
        match self.max_framerate_fps {
            u32::MAX => None,
            0 => Some(i64::MAX),
            fps => {
                let interval = 1_000_000 / fps as i64;
                if interval == 0 {
                    None
                } else {
                    Some(interval)
                }
            }
        }
    }

    /// Pointwise-strictest combination of every sink's wants
    ///
    /// An empty input yields [`VideoSinkWants::unconstrained`].
    pub fn aggregate<'a>(wants: impl IntoIterator<Item = &'a Self>) -> Self {
        wants
            .into_iter()
            .fold(Self::unconstrained(), |acc, w| Self {
                max_pixel_count: acc.max_pixel_count.min(w.max_pixel_count),
                target_pixel_count: match (acc.target_pixel_count, w.target_pixel_count) {
                    (Some(a), Some(b)) => Some(a.min(b)),
                    (a, b) => a.or(b),
                },
                max_framerate_fps: acc.max_framerate_fps.min(w.max_framerate_fps),
                rotation_applied: acc.rotation_applied || w.rotation_applied,
                resolution_alignment: lcm(
                    acc.resolution_alignment.max(1),
                    w.resolution_alignment.max(1),
                ),
            })
    }
}

const fn gcd(mut a: u32, mut b: u32) -> u32 {
    while b != 0 {
        let t = a % b;
        a = b;
        b = t;
    }
    a
}

fn lcm(a: u32, b: u32) -> u32 {
    (a / gcd(a, b)).saturating_mul(b)
}
