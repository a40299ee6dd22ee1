//! Device layer.
//!
//! This module is responsible for:
//! - the downward [`GraphicsApi`] trait and its value types
//! - capability flags queried once per device
//! - the shared [`GraphicsContext`]: live-object registry and framebuffer stack
//! - the context lock handing the device to one thread at a time
//! - two backends: [`HeadlessApi`] (host memory) and [`WgpuApi`] (offscreen GPU)

mod api;
mod caps;
mod context;
mod error;
mod gpu;
mod headless;
mod registry;

pub use api::{
    Attachment, BlendEquation, BlendFactor, BlendState, Combine, CombineFunc, CombineSource,
    DrawBatch, GraphicsApi, LightCommand, MatrixMode, PixelRect, Primitive, RenderBufferDesc,
    RenderBufferFormat, ResourceId, ResourceKind, TexEnv, TextureDesc,
};
pub use caps::DeviceCapabilities;
pub use context::{ContextGuard, ContextLock, FbBinding, GraphicsContext};
pub use error::{EngineError, EngineResult};
pub use gpu::{GpuInit, WgpuApi};
pub use headless::{Call, DrawRecord, HeadlessApi};
pub use registry::ResourceRegistry;
