//! Video frame adaptation and distribution
//!
//! Captured frames flow through a [`FrameAdapter`], which drops or downscales
//! them according to the aggregated [`VideoSinkWants`], and then a
//! [`FrameBroadcaster`], which hands them to every registered [`VideoSink`].
//! [`VideoSource`] wires the two together.

mod adapter;
mod broadcaster;
mod frame;
mod scale;
mod source;
mod wants;

pub use adapter::{AdaptationDecision, AdapterStats, FrameAdapter};
pub use broadcaster::{DispatchReport, FrameBroadcaster, VideoSink};
pub use frame::{I420Buffer, UpdateRect, VideoFrame, VideoFrameBuilder, VideoRotation};
pub use source::{FrameOutcome, VideoSource};
pub use wants::VideoSinkWants;
