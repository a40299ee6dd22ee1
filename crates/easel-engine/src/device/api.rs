//! The downward interface: a stateful, fixed-function graphics device.
//!
//! Everything the renderer does to the device goes through [`GraphicsApi`].
//! State set here (matrices, blend, lights, texture environments, the bound
//! framebuffer) stays in effect until set again.

use anyhow::Result;

use crate::coords::Mat4;
use crate::lighting::Material;
use crate::paint::{ByteOrder, Color};
use crate::texture::{MAX_TEXTURES, Sampling, Wrap};

use super::DeviceCapabilities;

/// Device object name. Zero is never handed out.
pub type ResourceId = u32;

#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum ResourceKind {
    Texture,
    VertexBuffer,
    Framebuffer,
    RenderBuffer,
}

#[derive(Debug, Copy, Clone, Default, Eq, PartialEq)]
pub enum MatrixMode {
    #[default]
    ModelView,
    Projection,
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum Primitive {
    Points,
    Lines,
    LineStrip,
    Triangles,
}

// ── blending ──────────────────────────────────────────────────────────────

#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum BlendFactor {
    Zero,
    One,
    SrcColor,
    OneMinusSrcColor,
    DstColor,
    OneMinusDstColor,
    SrcAlpha,
    OneMinusSrcAlpha,
    DstAlpha,
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum BlendEquation {
    Add,
    ReverseSubtract,
    Min,
    Max,
}

/// Screen blend: `dst = equation(src * src_factor, dst * dst_factor)`.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub struct BlendState {
    pub equation: BlendEquation,
    pub src: BlendFactor,
    pub dst: BlendFactor,
}

impl BlendState {
    /// Source replaces destination.
    pub const REPLACE: Self = Self {
        equation: BlendEquation::Add,
        src: BlendFactor::One,
        dst: BlendFactor::Zero,
    };

    /// Classic straight-alpha "over".
    pub const ALPHA: Self = Self {
        equation: BlendEquation::Add,
        src: BlendFactor::SrcAlpha,
        dst: BlendFactor::OneMinusSrcAlpha,
    };
}

// ── texture environment ───────────────────────────────────────────────────

/// Operand of a combiner stage.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum CombineSource {
    /// Output of the previous stage (the vertex color for unit 0).
    Previous,
    /// The texture bound to this stage's unit.
    Texture,
    /// The texture bound to a specific unit.
    TextureUnit(usize),
    /// The interpolated vertex color (tinted and lit).
    Primary,
}

/// Combiner function over up to three operands.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum CombineFunc {
    /// `a0`
    Replace,
    /// `a0 * a1`
    Modulate,
    /// `a0 + a1`
    Add,
    /// `a0 - a1`
    Subtract,
    /// `a0 * (1 - alpha(a2)) + a1 * alpha(a2)`
    Interpolate,
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct Combine {
    pub func: CombineFunc,
    pub args: [CombineSource; 3],
}

impl Combine {
    pub const fn new(func: CombineFunc, a0: CombineSource, a1: CombineSource) -> Self {
        Self { func, args: [a0, a1, a1] }
    }

    pub const fn interpolate(a0: CombineSource, a1: CombineSource, weight: CombineSource) -> Self {
        Self { func: CombineFunc::Interpolate, args: [a0, a1, weight] }
    }
}

/// Per-unit texture environment.
#[derive(Debug, Copy, Clone, Default, Eq, PartialEq)]
pub enum TexEnv {
    /// Texel times previous color.
    #[default]
    Modulate,
    /// Texel only.
    Replace,
    /// Separate RGB and alpha combiners.
    Combine { rgb: Combine, alpha: Combine },
}

// ── lights ────────────────────────────────────────────────────────────────

/// One light parameter update, applied to light `index`.
#[derive(Debug, Copy, Clone, PartialEq)]
pub enum LightCommand {
    Enable,
    Disable,
    Ambient([f32; 4]),
    Diffuse([f32; 4]),
    Specular([f32; 4]),
    /// Homogeneous position; `w == 0` makes the light directional. Taken
    /// through the modelview matrix current at the time of the call.
    Position([f32; 4]),
    /// Spot axis, taken through the current modelview like `Position`.
    SpotDirection([f32; 3]),
    Attenuation { constant: f32, linear: f32, quadratic: f32 },
    /// Cone half-angle in degrees; 180 disables the cone.
    SpotCutoff(f32),
    SpotExponent(f32),
}

// ── textures and framebuffers ─────────────────────────────────────────────

/// Storage layout of a texture object.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct TextureDesc {
    pub width: u32,
    pub height: u32,
    pub sampling: Sampling,
    pub wrap_u: Wrap,
    pub wrap_v: Wrap,
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum RenderBufferFormat {
    Color,
    Depth(u8),
    Stencil(u8),
    DepthStencil,
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct RenderBufferDesc {
    pub format: RenderBufferFormat,
    pub width: u32,
    pub height: u32,
    pub samples: u32,
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum Attachment {
    Color(usize),
    Depth,
    Stencil,
}

/// Integer rectangle in device pixels, origin at the bottom-left.
///
/// A negative extent mirrors the rectangle along that axis.
#[derive(Debug, Copy, Clone, Default, Eq, PartialEq)]
pub struct PixelRect {
    pub x: i32,
    pub y: i32,
    pub w: i32,
    pub h: i32,
}

impl PixelRect {
    pub const fn new(x: i32, y: i32, w: i32, h: i32) -> Self {
        Self { x, y, w, h }
    }

    pub const fn sized(w: u32, h: u32) -> Self {
        Self { x: 0, y: 0, w: w as i32, h: h as i32 }
    }
}

// ── draw batches ──────────────────────────────────────────────────────────

/// One draw submission. Attribute slices are parallel to `positions`.
#[derive(Debug, Copy, Clone)]
pub struct DrawBatch<'a> {
    pub primitive: Primitive,
    pub positions: &'a [[f32; 3]],
    pub colors: &'a [[f32; 4]],
    pub normals: Option<&'a [[f32; 3]]>,
    pub texcoords: [Option<&'a [[f32; 2]]>; MAX_TEXTURES],
    /// Bound texture per unit, in unit order.
    pub textures: &'a [ResourceId],
    /// Indexed submission when present.
    pub indices: Option<&'a [u32]>,
    /// Line width or point size.
    pub size: f32,
}

impl<'a> DrawBatch<'a> {
    pub fn new(primitive: Primitive, positions: &'a [[f32; 3]], colors: &'a [[f32; 4]]) -> Self {
        Self {
            primitive,
            positions,
            colors,
            normals: None,
            texcoords: [None; MAX_TEXTURES],
            textures: &[],
            indices: None,
            size: 1.0,
        }
    }

    /// Number of vertices the primitive assembly will consume.
    pub fn element_count(&self) -> usize {
        self.indices.map_or(self.positions.len(), <[u32]>::len)
    }
}

/// Stateful immediate-mode device.
///
/// Pixels crossing this boundary are native RGBA `u32`s in
/// [`GraphicsApi::byte_order`], rows bottom-up.
pub trait GraphicsApi {
    fn capabilities(&self) -> DeviceCapabilities;

    fn byte_order(&self) -> ByteOrder {
        ByteOrder::native()
    }

    /// Size of the default (screen) target.
    fn screen_size(&self) -> (u32, u32);

    // resources
    fn gen_resource(&mut self, kind: ResourceKind) -> ResourceId;
    fn delete_resource(&mut self, kind: ResourceKind, id: ResourceId);

    // fixed-function state
    fn load_matrix(&mut self, mode: MatrixMode, m: &Mat4);
    fn viewport(&mut self, rect: PixelRect);
    fn set_depth_test(&mut self, enabled: bool);
    fn set_depth_mask(&mut self, enabled: bool);
    fn set_blend(&mut self, state: BlendState);
    fn clear(&mut self, color: Option<Color>, depth: bool, stencil: bool);
    fn set_lighting(&mut self, enabled: bool);
    fn light(&mut self, index: usize, cmd: LightCommand);
    fn material(&mut self, material: &Material);

    // textures
    /// (Re)allocates zero-filled storage.
    fn tex_image(&mut self, id: ResourceId, desc: &TextureDesc);
    fn tex_sub_image(&mut self, id: ResourceId, rect: PixelRect, pixels: &[u32]);
    fn generate_mipmaps(&mut self, id: ResourceId);
    fn tex_env(&mut self, unit: usize, env: TexEnv);

    // framebuffers
    /// `None` binds the screen.
    fn bind_framebuffer(&mut self, fb: Option<ResourceId>);
    fn attach_texture(&mut self, fb: ResourceId, index: usize, tex: Option<ResourceId>);
    fn renderbuffer_storage(&mut self, rb: ResourceId, desc: &RenderBufferDesc);
    fn attach_renderbuffer(&mut self, fb: ResourceId, slot: Attachment, rb: ResourceId);
    fn framebuffer_complete(&mut self, fb: ResourceId) -> bool;
    fn blit_framebuffer(
        &mut self,
        src: Option<ResourceId>,
        dst: Option<ResourceId>,
        src_rect: PixelRect,
        dst_rect: PixelRect,
    );
    /// Reads from the bound framebuffer.
    fn read_pixels(&mut self, rect: PixelRect) -> Result<Vec<u32>>;
    /// Copies a region of the bound framebuffer into a texture.
    fn copy_to_texture(&mut self, tex: ResourceId, rect: PixelRect);

    // drawing
    /// Draws `src` texels of `tex` into `dst` of the bound target, replacing
    /// what is there (no blending, no lighting, no depth writes).
    fn draw_texture(&mut self, tex: ResourceId, src: PixelRect, dst: PixelRect);
    fn draw(&mut self, batch: &DrawBatch<'_>);
    /// Submits pending work.
    fn finish(&mut self) -> Result<()>;
}
