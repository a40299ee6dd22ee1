use crate::device::{
    Attachment, EngineError, EngineResult, FbBinding, GraphicsApi, GraphicsContext, PixelRect,
    RenderBufferDesc, RenderBufferFormat, ResourceId, ResourceKind,
};
use crate::paint::Color;

use super::TextureBinding;

/// Creation parameters for a [`Framebuffer`].
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct FramebufferInit {
    pub width: u32,
    pub height: u32,
    /// More than one enables a multisample color buffer.
    pub samples: u32,
    pub color_buffers: usize,
    /// 0, 16, 24 or 32.
    pub depth_bits: u8,
    /// 0, 1, 4 or 8.
    pub stencil_bits: u8,
    /// One 24/8 depth-stencil buffer instead of separate ones.
    pub packed_depth_stencil: bool,
    /// Stands for the default target; owns nothing.
    pub screen: bool,
}

impl FramebufferInit {
    /// One color buffer, no depth or stencil, single sample.
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            samples: 1,
            color_buffers: 1,
            depth_bits: 0,
            stencil_bits: 0,
            packed_depth_stencil: false,
            screen: false,
        }
    }

    pub fn screen(width: u32, height: u32) -> Self {
        Self { color_buffers: 0, screen: true, ..Self::new(width, height) }
    }

    pub fn with_samples(mut self, samples: u32) -> Self {
        self.samples = samples;
        self
    }

    pub fn with_color_buffers(mut self, count: usize) -> Self {
        self.color_buffers = count;
        self
    }

    pub fn with_depth(mut self, bits: u8) -> Self {
        self.depth_bits = bits;
        self
    }

    pub fn with_stencil(mut self, bits: u8) -> Self {
        self.stencil_bits = bits;
        self
    }

    pub fn with_packed_depth_stencil(mut self) -> Self {
        self.packed_depth_stencil = true;
        self
    }
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
enum Kind {
    Screen,
    /// No framebuffer objects: draws land on the screen and are copied into
    /// the first color texture when the binding is left.
    ScreenBacked,
    Object,
}

/// An offscreen render target.
#[derive(Debug)]
pub struct Framebuffer {
    width: u32,
    height: u32,
    kind: Kind,
    id: Option<ResourceId>,
    samples: u32,
    depth_bits: u8,
    stencil_bits: u8,
    packed: bool,
    color_count: usize,
    color_buffers: Vec<TextureBinding>,
    renderbuffers: Vec<ResourceId>,
    no_depth: bool,
}

impl Framebuffer {
    pub fn new<A: GraphicsApi>(ctx: &mut GraphicsContext<A>, init: FramebufferInit) -> EngineResult<Self> {
        let mut init = init;
        if init.screen {
            init.samples = 1;
            init.color_buffers = 0;
            init.depth_bits = 0;
            init.stencil_bits = 0;
            init.packed_depth_stencil = false;
        }

        let caps = *ctx.caps();
        if init.samples > 1 && !caps.multisample_framebuffers {
            log::debug!("multisample framebuffers unsupported; using one sample");
            init.samples = 1;
        }

        let (depth_bits, stencil_bits, packed) = if init.depth_bits == 0 && init.stencil_bits == 0 {
            (0, 0, false)
        } else if init.packed_depth_stencil {
            (24, 8, true)
        } else {
            (init.depth_bits, init.stencil_bits, false)
        };
        if !matches!(depth_bits, 0 | 16 | 24 | 32) {
            return Err(EngineError::InvalidFramebuffer("depth buffer must be 16, 24 or 32 bits"));
        }
        if !matches!(stencil_bits, 0 | 1 | 4 | 8) {
            return Err(EngineError::InvalidFramebuffer("stencil buffer must be 1, 4 or 8 bits"));
        }

        let needs_storage = depth_bits > 0 || stencil_bits > 0 || init.samples > 1;
        if !init.screen && needs_storage && (init.width == 0 || init.height == 0) {
            return Err(EngineError::InvalidFramebuffer("size undefined"));
        }

        let kind = if init.screen {
            Kind::Screen
        } else if caps.framebuffer_objects {
            Kind::Object
        } else {
            log::debug!("framebuffer objects unsupported; offscreen target backed by the screen");
            Kind::ScreenBacked
        };

        let mut fb = Self {
            width: init.width,
            height: init.height,
            kind,
            id: None,
            samples: init.samples.max(1),
            depth_bits,
            stencil_bits,
            packed,
            color_count: init.color_buffers,
            color_buffers: Vec::new(),
            renderbuffers: Vec::new(),
            no_depth: false,
        };
        if kind == Kind::Object {
            fb.allocate(ctx);
        }
        Ok(fb)
    }

    fn allocate<A: GraphicsApi>(&mut self, ctx: &mut GraphicsContext<A>) {
        let id = ctx.create(ResourceKind::Framebuffer);
        self.id = Some(id);

        if self.samples > 1 {
            self.add_renderbuffer(ctx, id, RenderBufferFormat::Color, Attachment::Color(0));
        }
        if self.packed {
            self.add_renderbuffer(ctx, id, RenderBufferFormat::DepthStencil, Attachment::Depth);
        } else {
            if self.depth_bits > 0 {
                self.add_renderbuffer(ctx, id, RenderBufferFormat::Depth(self.depth_bits), Attachment::Depth);
            }
            if self.stencil_bits > 0 {
                self.add_renderbuffer(ctx, id, RenderBufferFormat::Stencil(self.stencil_bits), Attachment::Stencil);
            }
        }
        log::trace!("framebuffer {id}: {}x{} x{} samples", self.width, self.height, self.samples);
    }

    fn add_renderbuffer<A: GraphicsApi>(
        &mut self,
        ctx: &mut GraphicsContext<A>,
        fb: ResourceId,
        format: RenderBufferFormat,
        slot: Attachment,
    ) {
        let rb = ctx.create(ResourceKind::RenderBuffer);
        let desc = RenderBufferDesc { format, width: self.width, height: self.height, samples: self.samples };
        ctx.api_mut().renderbuffer_storage(rb, &desc);
        ctx.api_mut().attach_renderbuffer(fb, slot, rb);
        self.renderbuffers.push(rb);
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn id(&self) -> Option<ResourceId> {
        self.id
    }

    pub fn is_screen(&self) -> bool {
        self.kind == Kind::Screen
    }

    pub fn is_multisample(&self) -> bool {
        self.samples > 1
    }

    pub fn samples(&self) -> u32 {
        self.samples
    }

    pub fn has_depth_buffer(&self) -> bool {
        self.depth_bits > 0
    }

    pub fn has_stencil_buffer(&self) -> bool {
        self.stencil_bits > 0
    }

    pub fn color_buffer(&self, index: usize) -> Option<TextureBinding> {
        self.color_buffers.get(index).copied()
    }

    /// What to push on the context's framebuffer stack to draw here.
    pub fn binding(&self) -> FbBinding {
        match self.kind {
            Kind::Screen => FbBinding::SCREEN,
            Kind::ScreenBacked => FbBinding {
                id: None,
                copy_back: self
                    .color_buffers
                    .first()
                    .map(|t| (t.id, PixelRect::sized(self.width, self.height))),
            },
            Kind::Object => self.id.map_or(FbBinding::SCREEN, FbBinding::object),
        }
    }

    // ── color buffers ─────────────────────────────────────────────────────

    pub fn set_color_buffer<A: GraphicsApi>(
        &mut self,
        ctx: &mut GraphicsContext<A>,
        texture: TextureBinding,
    ) -> EngineResult<()> {
        self.set_color_buffers(ctx, &[texture])
    }

    /// Attaches `textures` as color buffers 0..n. The count must match the
    /// one given at creation. Ignored by screen framebuffers.
    pub fn set_color_buffers<A: GraphicsApi>(
        &mut self,
        ctx: &mut GraphicsContext<A>,
        textures: &[TextureBinding],
    ) -> EngineResult<()> {
        if self.kind == Kind::Screen {
            return Ok(());
        }
        if textures.len() != self.color_count {
            return Err(EngineError::ColorBufferCountMismatch {
                expected: self.color_count,
                actual: textures.len(),
            });
        }
        self.color_buffers = textures.to_vec();

        let Some(id) = self.id else { return Ok(()) };
        ctx.push_framebuffer();
        ctx.set_framebuffer(FbBinding::object(id));
        for index in 0..self.color_count {
            ctx.api_mut().attach_texture(id, index, None);
        }
        for (index, tex) in textures.iter().enumerate() {
            ctx.api_mut().attach_texture(id, index, Some(tex.id));
        }
        let complete = ctx.api_mut().framebuffer_complete(id);
        ctx.pop_framebuffer()?;

        if complete {
            Ok(())
        } else {
            Err(EngineError::InvalidFramebuffer("incomplete color attachments"))
        }
    }

    // ── operations ────────────────────────────────────────────────────────

    /// Clears color to transparent black, depth and stencil.
    pub fn clear<A: GraphicsApi>(&self, ctx: &mut GraphicsContext<A>) -> EngineResult<()> {
        ctx.push_framebuffer();
        ctx.set_framebuffer(self.binding());
        ctx.api_mut().clear(Some(Color::transparent()), true, true);
        ctx.pop_framebuffer()
    }

    /// Blits the whole color buffer into `dest`, scaling to its size.
    /// Resolves multisample buffers.
    pub fn copy_to<A: GraphicsApi>(&self, ctx: &mut GraphicsContext<A>, dest: &Framebuffer) {
        ctx.api_mut().blit_framebuffer(
            self.id,
            dest.id,
            PixelRect::sized(self.width, self.height),
            PixelRect::sized(dest.width, dest.height),
        );
    }

    /// Reads the whole target as native pixels, rows bottom-up.
    pub fn read_pixels<A: GraphicsApi>(&self, ctx: &mut GraphicsContext<A>) -> EngineResult<Vec<u32>> {
        ctx.push_framebuffer();
        ctx.set_framebuffer(self.binding());
        let read = ctx.api_mut().read_pixels(PixelRect::sized(self.width, self.height));
        ctx.pop_framebuffer()?;
        Ok(read?)
    }

    /// Marks that depth testing was turned off while drawing here.
    pub fn disable_depth_test(&mut self) {
        self.no_depth = true;
    }

    /// Restores the depth test after drawing with it disabled, unless the
    /// renderer keeps depth testing off.
    pub fn finish<A: GraphicsApi>(&self, ctx: &mut GraphicsContext<A>, depth_test_disabled: bool) {
        if self.no_depth {
            ctx.api_mut().set_depth_test(!depth_test_disabled);
        }
    }

    /// Releases the framebuffer object and its render buffers.
    pub fn delete<A: GraphicsApi>(self, ctx: &mut GraphicsContext<A>) {
        for rb in self.renderbuffers {
            ctx.delete(ResourceKind::RenderBuffer, rb);
        }
        if let Some(id) = self.id {
            ctx.delete(ResourceKind::Framebuffer, id);
        }
    }
}
