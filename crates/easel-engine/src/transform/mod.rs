//! Matrix and camera system.
//!
//! [`Transforms`] is the host-side copy of the device's matrix pair plus the
//! camera. Every call updates the host matrices first and marks them dirty;
//! the renderer loads dirty matrices into the device before it draws or
//! touches lights.
//!
//! The modelview inverse is kept current on every change. Which inverse
//! routine runs is decided by [`TransformKind`]: the cheap transpose for
//! rotation and translation, the general cofactor inverse otherwise.

mod camera;
mod kind;
mod stack;
mod state;

pub use kind::TransformKind;
pub use stack::MatrixStack;
pub use state::Transforms;
