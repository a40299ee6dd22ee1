//! Texture resources and offscreen framebuffers.
//!
//! A [`Texture`] owns one device texture object sized to the device's rules
//! (power-of-two padded when required) and converts host ARGB pixels to and
//! from the native layout. Texture-to-texture copies and read-back go through
//! a temporary [`Framebuffer`].

mod framebuffer;
mod params;
mod texture;

pub use framebuffer::{Framebuffer, FramebufferInit};
pub use params::{Sampling, TextureParams, Wrap};
pub use texture::{Texture, TextureBinding};

/// Texture units a vertex can sample from.
pub const MAX_TEXTURES: usize = 2;
