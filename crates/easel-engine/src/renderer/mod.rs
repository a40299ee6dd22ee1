//! Sketch-facing renderer.
//!
//! [`Renderer`] owns the device context and every piece of per-surface
//! state: matrices, lights, the shape under construction, the geometry
//! buffer and an optional recording. Calls are grouped by concern:
//! - frame pairing and offscreen targets (this file)
//! - shapes, style and blend modes (`draw`)
//! - transforms and camera (`matrices`)
//! - lights and material (`lights`)
//! - shape recording (`record`)
//! - pixel access (`pixels`)

mod draw;
mod init;
mod lights;
mod matrices;
mod pixels;
mod record;

pub use init::{RenderSurface, RendererInit};

use crate::batch::{Blending, BufferPolicy, FlushTarget, GeometryBuffer, Recorder};
use crate::device::{EngineError, EngineResult, FbBinding, GraphicsApi, GraphicsContext, PixelRect};
use crate::lighting::{LightSet, Material};
use crate::paint::PixelFormat;
use crate::shape::ShapeAssembler;
use crate::texture::{Framebuffer, FramebufferInit, Texture, TextureBinding, TextureParams};
use crate::transform::Transforms;

/// Own render target of an offscreen renderer.
///
/// A multisampled target draws into render buffers and is resolved into
/// `resolve`, whose color buffer is `color`, at the end of every frame.
#[derive(Debug)]
struct Offscreen {
    target: Framebuffer,
    resolve: Option<Framebuffer>,
    color: Texture,
}

impl Offscreen {
    fn new<A: GraphicsApi>(ctx: &mut GraphicsContext<A>, init: &RendererInit) -> EngineResult<Self> {
        let caps = *ctx.caps();
        let multisample = init.samples > 1 && caps.framebuffer_objects && caps.multisample_framebuffers;

        let color = Texture::new(ctx, init.width, init.height, TextureParams::new(PixelFormat::Argb))?;
        let color_binding = color.binding().ok_or(EngineError::TextureNotAvailable)?;

        let base = FramebufferInit::new(init.width, init.height)
            .with_depth(24)
            .with_stencil(8)
            .with_packed_depth_stencil();

        if multisample {
            let target = Framebuffer::new(ctx, base.with_samples(init.samples).with_color_buffers(0))?;
            let mut resolve = Framebuffer::new(ctx, FramebufferInit::new(init.width, init.height))?;
            resolve.set_color_buffer(ctx, color_binding)?;
            log::debug!("offscreen target: {}x{}, {} samples", init.width, init.height, init.samples);
            Ok(Self { target, resolve: Some(resolve), color })
        } else {
            let mut target = Framebuffer::new(ctx, base)?;
            target.set_color_buffer(ctx, color_binding)?;
            log::debug!("offscreen target: {}x{}", init.width, init.height);
            Ok(Self { target, resolve: None, color })
        }
    }

    /// Where finished frames are read from.
    fn output(&self) -> FbBinding {
        self.resolve.as_ref().unwrap_or(&self.target).binding()
    }

    fn delete<A: GraphicsApi>(mut self, ctx: &mut GraphicsContext<A>) {
        self.target.delete(ctx);
        if let Some(resolve) = self.resolve {
            resolve.delete(ctx);
        }
        self.color.delete(ctx);
    }
}

/// Immediate-mode 2D/3D renderer over a [`GraphicsApi`].
pub struct Renderer<A: GraphicsApi> {
    ctx: GraphicsContext<A>,
    width: u32,
    height: u32,
    depth_test: bool,

    transforms: Transforms,
    lights: LightSet,
    material: Material,
    shapes: ShapeAssembler,
    geometry: GeometryBuffer,
    blending: Blending,

    recorder: Option<Recorder>,
    merge_shapes: bool,

    drawing: bool,
    offscreen: Option<Offscreen>,
    /// 1x1 texture used by `set(x, y, argb)`.
    pixel: Option<Texture>,
}

impl<A: GraphicsApi> Renderer<A> {
    pub fn new(api: A, init: RendererInit) -> EngineResult<Self> {
        let mut ctx = GraphicsContext::new(api);
        let offscreen = if init.offscreen { Some(Offscreen::new(&mut ctx, &init)?) } else { None };

        log::debug!(
            "renderer {}x{} ({:?} geometry, depth sort {})",
            init.width,
            init.height,
            init.policy,
            init.depth_sort
        );
        Ok(Self {
            ctx,
            width: init.width,
            height: init.height,
            depth_test: init.depth_test,
            transforms: Transforms::new(init.width as f32, init.height as f32),
            lights: LightSet::new(),
            material: Material::default(),
            shapes: ShapeAssembler::new(init.depth_sort),
            geometry: GeometryBuffer::new(init.policy, init.max_vertices),
            blending: Blending::new(),
            recorder: None,
            merge_shapes: init.merge_shapes,
            drawing: false,
            offscreen,
            pixel: None,
        })
    }

    // ── accessors ─────────────────────────────────────────────────────────

    pub fn context(&self) -> &GraphicsContext<A> {
        &self.ctx
    }

    /// For creating textures and framebuffers that share this device.
    pub fn context_mut(&mut self) -> &mut GraphicsContext<A> {
        &mut self.ctx
    }

    pub fn api(&self) -> &A {
        self.ctx.api()
    }

    pub fn is_drawing(&self) -> bool {
        self.drawing
    }

    pub fn is_offscreen(&self) -> bool {
        self.offscreen.is_some()
    }

    pub fn transforms(&self) -> &Transforms {
        &self.transforms
    }

    pub fn light_set(&self) -> &LightSet {
        &self.lights
    }

    pub fn geometry(&self) -> &GeometryBuffer {
        &self.geometry
    }

    pub fn shapes(&self) -> &ShapeAssembler {
        &self.shapes
    }

    /// Color texture of an offscreen renderer; holds the last finished frame.
    pub fn offscreen_texture(&self) -> Option<TextureBinding> {
        self.offscreen.as_ref().and_then(|o| o.color.binding())
    }

    pub fn set_depth_test(&mut self, on: bool) {
        self.depth_test = on;
        if self.drawing {
            self.ctx.api_mut().set_depth_test(on);
        }
    }

    // ── frame ─────────────────────────────────────────────────────────────

    /// Opens a frame: resets the camera, projection, lights and textures,
    /// and clears depth and stencil. Offscreen renderers bind their own
    /// target until [`end_draw`](Self::end_draw).
    pub fn begin_draw(&mut self) -> EngineResult<()> {
        if self.drawing {
            return Err(EngineError::AlreadyDrawing);
        }
        self.drawing = true;

        if self.geometry.policy() == BufferPolicy::AccumulateAll {
            self.geometry.init();
        }
        self.shapes.no_texture();

        if let Some(off) = &self.offscreen {
            self.ctx.push_framebuffer();
            self.ctx.set_framebuffer(off.target.binding());
        }

        let caps = *self.ctx.caps();
        let api = self.ctx.api_mut();
        api.viewport(PixelRect::sized(self.width, self.height));
        api.set_depth_test(self.depth_test);
        api.clear(None, true, true);

        self.transforms.camera();
        self.transforms.perspective();
        self.transforms.invalidate();
        self.transforms.sync(api);
        self.lights.no_lights(api);

        let screen = self.blending.screen_mode();
        self.blending.set_screen_blend(api, &caps, screen);
        log::trace!("begin_draw");
        Ok(())
    }

    /// Closes the frame: submits deferred and accumulated geometry, then
    /// releases the offscreen target.
    pub fn end_draw(&mut self) -> EngineResult<()> {
        if !self.drawing {
            return Err(EngineError::NotDrawing);
        }

        if self.shapes.depth_sort() {
            self.render_shape();
        }
        if self.geometry.policy() == BufferPolicy::AccumulateAll {
            self.flush_geometry();
        }

        if let Some(off) = &self.offscreen {
            self.ctx.pop_framebuffer()?;
            if let Some(resolve) = &off.resolve {
                off.target.copy_to(&mut self.ctx, resolve);
            }
        }

        self.drawing = false;
        log::trace!("end_draw: {} geometry flushes", self.geometry.flush_count());
        Ok(())
    }

    /// Submits pending buffered geometry to the device, or to the recording
    /// when one is open. Not counted as a flush.
    fn flush_geometry(&mut self) {
        if self.geometry.is_empty() {
            return;
        }
        if let Some(rec) = self.recorder.as_mut() {
            self.geometry.finish::<A>(&mut FlushTarget::Record(rec));
            return;
        }
        let caps = *self.ctx.caps();
        let frame = self.buffer_frame();
        let api = self.ctx.api_mut();
        self.transforms.sync(api);
        self.geometry.finish(&mut FlushTarget::Render {
            api,
            caps,
            blending: &mut self.blending,
            frame,
        });
    }

    /// `(camera, modelview)` for buffers whose vertices are stored relative
    /// to the camera.
    fn buffer_frame(&self) -> Option<(crate::coords::Mat4, crate::coords::Mat4)> {
        match self.geometry.policy() {
            BufferPolicy::AccumulateAll => {
                Some((*self.transforms.camera_matrix(), *self.transforms.modelview()))
            }
            _ => None,
        }
    }

    /// Runs `f` with the renderer's output bound: the live target during a
    /// frame, the finished frame otherwise.
    fn with_target<R>(&mut self, f: impl FnOnce(&mut GraphicsContext<A>) -> R) -> EngineResult<R> {
        let binding = match &self.offscreen {
            None => FbBinding::SCREEN,
            Some(off) if self.drawing => off.target.binding(),
            Some(off) => off.output(),
        };
        self.ctx.push_framebuffer();
        self.ctx.set_framebuffer(binding);
        let out = f(&mut self.ctx);
        self.ctx.pop_framebuffer()?;
        Ok(out)
    }

    /// Releases every device object the renderer created.
    pub fn dispose(mut self) -> A {
        if let Some(mut pixel) = self.pixel.take() {
            pixel.delete(&mut self.ctx);
        }
        if let Some(off) = self.offscreen.take() {
            off.delete(&mut self.ctx);
        }
        let leaked = self.ctx.teardown();
        if leaked > 0 {
            log::debug!("renderer teardown released {leaked} objects");
        }
        self.ctx.into_api()
    }
}

impl<A: GraphicsApi> RenderSurface for Renderer<A> {
    fn width(&self) -> u32 {
        self.width
    }

    fn height(&self) -> u32 {
        self.height
    }

    fn supports_3d(&self) -> bool {
        true
    }

    fn supports_offscreen(&self) -> bool {
        true
    }
}
