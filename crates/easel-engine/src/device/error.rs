use std::fmt;

use crate::lighting::MAX_LIGHTS;

/// Recoverable failures surfaced by the renderer and its resources.
///
/// Misuse that the drawing API tolerates (popping an empty stack, an
/// unsupported blend mode) is logged instead and never reaches this type.
#[derive(Debug)]
pub enum EngineError {
    /// A light was added while `MAX_LIGHTS` lights are active.
    TooManyLights,
    /// `begin_camera` while a camera block is already open.
    CameraAlreadyActive,
    /// `end_camera` without a matching `begin_camera`.
    CameraNotActive,
    /// `begin_draw` while a frame is already open.
    AlreadyDrawing,
    /// `end_draw` without a matching `begin_draw`.
    NotDrawing,
    /// Backing size exceeds the device's maximum texture size.
    TextureTooLarge { width: u32, height: u32, max: u32 },
    /// Pixel slice length does not match the target rectangle.
    PixelCountMismatch { expected: usize, actual: usize },
    /// Number of color textures differs from the framebuffer's color buffer count.
    ColorBufferCountMismatch { expected: usize, actual: usize },
    /// The device rejected a framebuffer configuration.
    InvalidFramebuffer(&'static str),
    /// `pop_framebuffer` on an empty stack.
    FramebufferStackEmpty,
    /// The calling thread already holds the graphics context.
    ContextAlreadyHeld,
    /// The texture has no device object (never created, or deleted).
    TextureNotAvailable,
    /// Backend failure (adapter, device, read-back).
    Device(anyhow::Error),
}

impl fmt::Display for EngineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EngineError::TooManyLights => write!(f, "can only create {MAX_LIGHTS} lights"),
            EngineError::CameraAlreadyActive => {
                write!(f, "begin_camera() called while already manipulating the camera")
            }
            EngineError::CameraNotActive => write!(f, "end_camera() called without begin_camera()"),
            EngineError::AlreadyDrawing => write!(f, "begin_draw() called twice without end_draw()"),
            EngineError::NotDrawing => write!(f, "end_draw() called without begin_draw()"),
            EngineError::TextureTooLarge { width, height, max } => write!(
                f,
                "texture of {width}x{height} exceeds the maximum texture size {max}"
            ),
            EngineError::PixelCountMismatch { expected, actual } => {
                write!(f, "wrong pixel count: expected {expected}, got {actual}")
            }
            EngineError::ColorBufferCountMismatch { expected, actual } => write!(
                f,
                "wrong number of color textures: framebuffer has {expected}, got {actual}"
            ),
            EngineError::InvalidFramebuffer(why) => write!(f, "invalid framebuffer: {why}"),
            EngineError::FramebufferStackEmpty => write!(f, "framebuffer stack is empty"),
            EngineError::ContextAlreadyHeld => {
                write!(f, "graphics context is already held by this thread")
            }
            EngineError::TextureNotAvailable => write!(f, "texture has no device object"),
            EngineError::Device(e) => write!(f, "device error: {e:#}"),
        }
    }
}

impl std::error::Error for EngineError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            EngineError::Device(e) => Some(e.as_ref()),
            _ => None,
        }
    }
}

impl From<anyhow::Error> for EngineError {
    fn from(e: anyhow::Error) -> Self {
        EngineError::Device(e)
    }
}

pub type EngineResult<T> = Result<T, EngineError>;
