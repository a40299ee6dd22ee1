//! Small value types shared by the transform, shape and lighting modules.
//!
//! Canonical space:
//! - sketch coordinates in pixels, origin top-left, +X right, +Y down
//! - the default camera flips Y so that sketch space maps onto a
//!   right-handed eye space looking down -Z
//!
//! Matrices are column-major (see [`Mat4`]).

mod mat4;
mod vec3;
mod viewport;

pub use mat4::Mat4;
pub use vec3::Vec3;
pub use viewport::Viewport;

/// Tolerance used by tessellation and polygon tests.
pub const EPSILON: f32 = 0.0001;
