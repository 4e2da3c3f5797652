//! Video frames and planar I420 buffers

use crate::error::FrameError;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Clockwise rotation the renderer must apply
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum VideoRotation {
    #[default]
    None,
    Rotate90,
    Rotate180,
    Rotate270,
}

impl VideoRotation {
    #[must_use]
    pub const fn degrees(&self) -> u16 {
        match self {
            Self::None => 0,
            Self::Rotate90 => 90,
            Self::Rotate180 => 180,
            Self::Rotate270 => 270,
        }
    }
}

/// Planar YUV 4:2:0 picture with tightly packed rows
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct I420Buffer {
    width: u32,
    height: u32,
    y: Bytes,
    u: Bytes,
    v: Bytes,
}

impl I420Buffer {
    /// Black picture of the given size
    pub fn new(width: u32, height: u32) -> Result<Self, FrameError> {
        if width == 0 || height == 0 {
            return Err(FrameError::ZeroSized { width, height });
        }
        let (luma, chroma) = plane_sizes(width, height);
        Ok(Self {
            width,
            height,
            y: Bytes::from(vec![16u8; luma]),
            u: Bytes::from(vec![128u8; chroma]),
            v: Bytes::from(vec![128u8; chroma]),
        })
    }

    /// Wrap existing planes; each must hold exactly one picture's worth of bytes
    pub fn from_planes(
        width: u32,
        height: u32,
        y: impl Into<Bytes>,
        u: impl Into<Bytes>,
        v: impl Into<Bytes>,
    ) -> Result<Self, FrameError> {
        if width == 0 || height == 0 {
            return Err(FrameError::ZeroSized { width, height });
        }
        let (luma, chroma) = plane_sizes(width, height);
        let (y, u, v) = (y.into(), u.into(), v.into());

        for (plane, expected, actual) in [
            ("Y", luma, y.len()),
            ("U", chroma, u.len()),
            ("V", chroma, v.len()),
        ] {
            if expected != actual {
                return Err(FrameError::PlaneSize {
                    plane,
                    expected,
                    actual,
                });
            }
        }

        Ok(Self {
            width,
            height,
            y,
            u,
            v,
        })
    }

    #[must_use]
    pub const fn width(&self) -> u32 {
        self.width
    }

    #[must_use]
    pub const fn height(&self) -> u32 {
        self.height
    }

    #[must_use]
    pub const fn chroma_width(&self) -> u32 {
        self.width.div_ceil(2)
    }

    #[must_use]
    pub const fn chroma_height(&self) -> u32 {
        self.height.div_ceil(2)
    }

    #[must_use]
    pub fn data_y(&self) -> &[u8] {
        &self.y
    }

    #[must_use]
    pub fn data_u(&self) -> &[u8] {
        &self.u
    }

    #[must_use]
    pub fn data_v(&self) -> &[u8] {
        &self.v
    }

    /// Resample into a newly allocated buffer of `width` x `height`
    #[must_use]
    pub fn scaled(&self, width: u32, height: u32) -> Self {
        let width = width.max(1);
        let height = height.max(1);
        let (chroma_width, chroma_height) = (width.div_ceil(2), height.div_ceil(2));

        let y = super::scale::scale_plane(
            &self.y,
            self.width as usize,
            self.height as usize,
            width as usize,
            height as usize,
        );
        let u = super::scale::scale_plane(
            &self.u,
            self.chroma_width() as usize,
            self.chroma_height() as usize,
            chroma_width as usize,
            chroma_height as usize,
        );
        let v = super::scale::scale_plane(
            &self.v,
            self.chroma_width() as usize,
            self.chroma_height() as usize,
            chroma_width as usize,
            chroma_height as usize,
        );

        Self {
            width,
            height,
            y: Bytes::from(y),
            u: Bytes::from(u),
            v: Bytes::from(v),
        }
    }
}

/// Luma and per-chroma plane sizes in bytes
const fn plane_sizes(width: u32, height: u32) -> (usize, usize) {
    let luma = width as usize * height as usize;
    let chroma = width.div_ceil(2) as usize * height.div_ceil(2) as usize;
    (luma, chroma)
}

/// Region of a frame that changed since the previous frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct UpdateRect {
    pub offset_x: u32,
    pub offset_y: u32,
    pub width: u32,
    pub height: u32,
}

impl UpdateRect {
    #[must_use]
    pub const fn new(offset_x: u32, offset_y: u32, width: u32, height: u32) -> Self {
        Self {
            offset_x,
            offset_y,
            width,
            height,
        }
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Smallest rectangle covering both
    #[must_use]
    pub fn union(&self, other: &Self) -> Self {
        if other.is_empty() {
            return *self;
        }
        if self.is_empty() {
            return *other;
        }
        let left = self.offset_x.min(other.offset_x);
        let top = self.offset_y.min(other.offset_y);
        let right = (self.offset_x + self.width).max(other.offset_x + other.width);
        let bottom = (self.offset_y + self.height).max(other.offset_y + other.height);
        Self::new(left, top, right - left, bottom - top)
    }

    /// Map this rectangle through a crop of the source frame followed by a
    /// scale to `scaled_width` x `scaled_height`
    ///
    /// The result is widened by one pixel on each side, clamped to the
    /// output, to cover the resampling filter's reach into neighbours.
    #[allow(clippy::too_many_arguments)]
    #[must_use]
    pub fn scale_with_frame(
        &self,
        frame_width: u32,
        frame_height: u32,
        crop_x: u32,
        crop_y: u32,
        crop_width: u32,
        crop_height: u32,
        scaled_width: u32,
        scaled_height: u32,
    ) -> Self {
        if self.is_empty() || crop_width == 0 || crop_height == 0 {
            return Self::default();
        }

        // Whole frame changed: stays whole frame
        if self.offset_x == 0
            && self.offset_y == 0
            && self.width >= frame_width
            && self.height >= frame_height
        {
            return Self::new(0, 0, scaled_width, scaled_height);
        }

        let clamp = |v: i64, max: u32| v.clamp(0, i64::from(max));

        // Into crop coordinates
        let x1 = clamp(i64::from(self.offset_x) - i64::from(crop_x), crop_width);
        let y1 = clamp(i64::from(self.offset_y) - i64::from(crop_y), crop_height);
        let x2 = clamp(
            i64::from(self.offset_x) + i64::from(self.width) - i64::from(crop_x),
            crop_width,
        );
        let y2 = clamp(
            i64::from(self.offset_y) + i64::from(self.height) - i64::from(crop_y),
            crop_height,
        );
        if x1 >= x2 || y1 >= y2 {
            return Self::default();
        }

        let (cw, ch) = (i64::from(crop_width), i64::from(crop_height));
        let (sw, sh) = (i64::from(scaled_width), i64::from(scaled_height));

        // Floor the start, ceil the end, then widen by one pixel
        let sx1 = (x1 * sw / cw - 1).max(0);
        let sy1 = (y1 * sh / ch - 1).max(0);
        let sx2 = ((x2 * sw + cw - 1) / cw + 1).min(sw);
        let sy2 = ((y2 * sh + ch - 1) / ch + 1).min(sh);

        Self::new(
            sx1 as u32,
            sy1 as u32,
            (sx2 - sx1) as u32,
            (sy2 - sy1) as u32,
        )
    }
}

/// A captured picture plus its metadata
///
/// Cloning is cheap: the pixel buffer is shared.
#[derive(Debug, Clone)]
pub struct VideoFrame {
    id: u16,
    timestamp_us: i64,
    rotation: VideoRotation,
    buffer: Arc<I420Buffer>,
    update_rect: Option<UpdateRect>,
}

impl VideoFrame {
    #[must_use]
    pub fn builder(buffer: Arc<I420Buffer>) -> VideoFrameBuilder {
        VideoFrameBuilder {
            id: 0,
            timestamp_us: 0,
            rotation: VideoRotation::None,
            buffer,
            update_rect: None,
        }
    }

    #[must_use]
    pub const fn id(&self) -> u16 {
        self.id
    }

    #[must_use]
    pub const fn timestamp_us(&self) -> i64 {
        self.timestamp_us
    }

    #[must_use]
    pub const fn rotation(&self) -> VideoRotation {
        self.rotation
    }

    #[must_use]
    pub fn width(&self) -> u32 {
        self.buffer.width()
    }

    #[must_use]
    pub fn height(&self) -> u32 {
        self.buffer.height()
    }

    #[must_use]
    pub const fn buffer(&self) -> &Arc<I420Buffer> {
        &self.buffer
    }

    #[must_use]
    pub const fn update_rect(&self) -> Option<UpdateRect> {
        self.update_rect
    }

    /// Whether both frames point at the same pixel buffer
    #[must_use]
    pub fn shares_buffer_with(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.buffer, &other.buffer)
    }
}

pub struct VideoFrameBuilder {
    id: u16,
    timestamp_us: i64,
    rotation: VideoRotation,
    buffer: Arc<I420Buffer>,
    update_rect: Option<UpdateRect>,
}

impl VideoFrameBuilder {
    #[must_use]
    pub fn id(mut self, id: u16) -> Self {
        self.id = id;
        self
    }

    #[must_use]
    pub fn timestamp_us(mut self, timestamp_us: i64) -> Self {
        self.timestamp_us = timestamp_us;
        self
    }

    #[must_use]
    pub fn rotation(mut self, rotation: VideoRotation) -> Self {
        self.rotation = rotation;
        self
    }

    #[must_use]
    pub fn update_rect(mut self, update_rect: UpdateRect) -> Self {
        self.update_rect = Some(update_rect);
        self
    }

    #[must_use]
    pub fn build(self) -> VideoFrame {
        VideoFrame {
            id: self.id,
            timestamp_us: self.timestamp_us,
            rotation: self.rotation,
            buffer: self.buffer,
            update_rect: self.update_rect,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_buffer_plane_sizes() {
        let buffer = I420Buffer::new(5, 3).expect("buffer");
        assert_eq!(buffer.data_y().len(), 15);
        assert_eq!(buffer.data_u().len(), 6);
        assert_eq!(buffer.chroma_width(), 3);
        assert_eq!(buffer.chroma_height(), 2);
    }

    #[test]
    fn test_from_planes_validates_sizes() {
        let err = I420Buffer::from_planes(4, 4, vec![0u8; 16], vec![0u8; 4], vec![0u8; 3])
            .expect_err("short V plane");
        assert_eq!(
            err,
            FrameError::PlaneSize {
                plane: "V",
                expected: 4,
                actual: 3
            }
        );
        assert!(I420Buffer::new(0, 10).is_err());
    }

    #[test]
    fn test_update_rect_union() {
        let a = UpdateRect::new(0, 0, 10, 10);
        let b = UpdateRect::new(5, 5, 10, 10);
        assert_eq!(a.union(&b), UpdateRect::new(0, 0, 15, 15));
        assert_eq!(a.union(&UpdateRect::default()), a);
    }

    #[test]
    fn test_update_rect_scaled_into_output() {
        let rect = UpdateRect::new(100, 100, 200, 200);
        let scaled = rect.scale_with_frame(1280, 720, 0, 0, 1280, 720, 640, 360);
        assert_eq!(scaled, UpdateRect::new(49, 49, 102, 102));
    }

    #[test]
    fn test_full_frame_rect_stays_full_frame() {
        let rect = UpdateRect::new(0, 0, 1280, 720);
        let scaled = rect.scale_with_frame(1280, 720, 0, 0, 1280, 720, 960, 540);
        assert_eq!(scaled, UpdateRect::new(0, 0, 960, 540));
    }

    #[test]
    fn test_update_rect_clamped_to_output() {
        let rect = UpdateRect::new(1270, 710, 10, 10);
        let scaled = rect.scale_with_frame(1280, 720, 0, 0, 1280, 720, 640, 360);
        assert!(scaled.offset_x + scaled.width <= 640);
        assert!(scaled.offset_y + scaled.height <= 360);
        assert!(!scaled.is_empty());
    }

    #[test]
    fn test_frame_clone_shares_buffer() {
        let frame = VideoFrame::builder(Arc::new(I420Buffer::new(4, 4).expect("buffer")))
            .timestamp_us(42)
            .rotation(VideoRotation::Rotate90)
            .build();
        let copy = frame.clone();
        assert!(copy.shares_buffer_with(&frame));
        assert_eq!(copy.rotation().degrees(), 90);
        assert_eq!(copy.timestamp_us(), 42);
    }
}
