//! Easel engine crate.
//!
//! An immediate-mode 2D/3D rendering core: shapes, transforms, lights and
//! textures on top of a stateful fixed-function [`device::GraphicsApi`].
//! [`renderer::Renderer`] is the drawing surface; everything else is the
//! machinery it is built from.

pub mod batch;
pub mod coords;
pub mod device;
pub mod lighting;
pub mod logging;
pub mod paint;
pub mod renderer;
pub mod shape;
pub mod texture;
pub mod transform;

pub use renderer::{RenderSurface, Renderer, RendererInit};
