//! Colors and host pixel layouts.
//!
//! Scope:
//! - straight-alpha vertex/light colors
//! - the ALPHA/RGB/ARGB host formats and their remaps into the native RGBA
//!   layout for both byte orders

pub mod color;
pub mod pixels;

pub use color::Color;
pub use pixels::{ByteOrder, PixelFormat};
