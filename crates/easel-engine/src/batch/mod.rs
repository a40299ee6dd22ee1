//! Batching of assembled geometry on its way to the device.
//!
//! - [`GeometryBuffer`]: accumulates faces into large indexed draws
//! - [`Recorder`]: captures geometry into a [`RecordedShape`] instead of drawing it
//! - [`Blending`]: screen blend modes and the two-texture combiner

mod blend;
mod geometry;
mod recorder;

pub use blend::{BlendMode, Blending, combiner_plan};
pub use geometry::{BufferPolicy, FlushTarget, GeometryBuffer};
pub use recorder::{RecordedShape, Recorder, ShapeChild};
