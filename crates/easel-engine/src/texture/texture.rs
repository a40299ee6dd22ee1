use crate::device::{
    EngineError, EngineResult, GraphicsApi, GraphicsContext, PixelRect, ResourceId, ResourceKind,
    TextureDesc,
};
use crate::paint::{PixelFormat, pixels};

use super::{Framebuffer, FramebufferInit, TextureParams};

/// What a draw needs to know about a bound texture.
///
/// Two bindings are equal when they name the same device object.
#[derive(Debug, Copy, Clone)]
pub struct TextureBinding {
    pub id: ResourceId,
    pub width: u32,
    pub height: u32,
    /// Largest usable texture coordinate per axis (`width / gpu_width`).
    pub max_u: f32,
    pub max_v: f32,
    pub flip_x: bool,
    pub flip_y: bool,
}

impl PartialEq for TextureBinding {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for TextureBinding {}

impl TextureBinding {
    /// Maps a normalized coordinate into the padded texture, honoring flips.
    pub fn tex_coord(&self, u: f32, v: f32) -> [f32; 2] {
        let axis = |t: f32, flip: bool, max: f32| if flip { (1.0 - t) * max } else { t * max };
        [axis(u, self.flip_x, self.max_u), axis(v, self.flip_y, self.max_v)]
    }
}

/// A device texture plus its host-side description.
///
/// `width`/`height` are the logical size; the device object may be larger
/// when non-power-of-two textures are unsupported. Host pixels handed to
/// [`Texture::set`] and returned by [`Texture::get`] are `0xAARRGGBB`.
#[derive(Debug)]
pub struct Texture {
    width: u32,
    height: u32,
    gpu_width: u32,
    gpu_height: u32,
    params: TextureParams,
    id: Option<ResourceId>,
    flip_x: bool,
    flip_y: bool,
    max_u: f32,
    max_v: f32,

    temp_fb: Option<Framebuffer>,
    warned_mipmaps: bool,
}

impl Texture {
    /// Creates the texture and its zero-filled device storage.
    pub fn new<A: GraphicsApi>(
        ctx: &mut GraphicsContext<A>,
        width: u32,
        height: u32,
        params: TextureParams,
    ) -> EngineResult<Self> {
        let mut tex = Self::deferred(width, height, params);
        tex.create(ctx)?;
        Ok(tex)
    }

    /// Describes a texture without allocating it; storage is created by the
    /// first upload.
    pub fn deferred(width: u32, height: u32, params: TextureParams) -> Self {
        Self {
            width,
            height,
            gpu_width: 0,
            gpu_height: 0,
            params,
            id: None,
            flip_x: false,
            flip_y: false,
            max_u: 0.0,
            max_v: 0.0,
            temp_fb: None,
            warned_mipmaps: false,
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn gpu_width(&self) -> u32 {
        self.gpu_width
    }

    pub fn gpu_height(&self) -> u32 {
        self.gpu_height
    }

    pub fn params(&self) -> TextureParams {
        self.params
    }

    pub fn id(&self) -> Option<ResourceId> {
        self.id
    }

    pub fn is_available(&self) -> bool {
        self.id.is_some()
    }

    pub fn max_tex_coords(&self) -> (f32, f32) {
        (self.max_u, self.max_v)
    }

    pub fn is_flipped_x(&self) -> bool {
        self.flip_x
    }

    pub fn is_flipped_y(&self) -> bool {
        self.flip_y
    }

    pub fn set_flipped_x(&mut self, flip: bool) {
        self.flip_x = flip;
    }

    pub fn set_flipped_y(&mut self, flip: bool) {
        self.flip_y = flip;
    }

    pub fn binding(&self) -> Option<TextureBinding> {
        self.id.map(|id| TextureBinding {
            id,
            width: self.width,
            height: self.height,
            max_u: self.max_u,
            max_v: self.max_v,
            flip_x: self.flip_x,
            flip_y: self.flip_y,
        })
    }

    // ── allocation ────────────────────────────────────────────────────────

    fn create<A: GraphicsApi>(&mut self, ctx: &mut GraphicsContext<A>) -> EngineResult<()> {
        self.release(ctx);

        let caps = *ctx.caps();
        let (gpu_width, gpu_height) = if caps.npot_textures {
            (self.width, self.height)
        } else {
            (self.width.next_power_of_two(), self.height.next_power_of_two())
        };
        if gpu_width > caps.max_texture_size || gpu_height > caps.max_texture_size {
            return Err(EngineError::TextureTooLarge {
                width: gpu_width,
                height: gpu_height,
                max: caps.max_texture_size,
            });
        }

        let id = ctx.create(ResourceKind::Texture);
        ctx.api_mut().tex_image(
            id,
            &TextureDesc {
                width: gpu_width,
                height: gpu_height,
                sampling: self.params.sampling,
                wrap_u: self.params.wrap_u,
                wrap_v: self.params.wrap_v,
            },
        );

        self.id = Some(id);
        self.gpu_width = gpu_width;
        self.gpu_height = gpu_height;
        self.flip_x = false;
        self.flip_y = false;
        self.max_u = ratio(self.width, gpu_width);
        self.max_v = ratio(self.height, gpu_height);
        log::trace!(
            "texture {id}: {}x{} in {gpu_width}x{gpu_height}",
            self.width,
            self.height
        );
        Ok(())
    }

    fn release<A: GraphicsApi>(&mut self, ctx: &mut GraphicsContext<A>) {
        if let Some(fb) = self.temp_fb.take() {
            fb.delete(ctx);
        }
        if let Some(id) = self.id.take() {
            ctx.delete(ResourceKind::Texture, id);
        }
    }

    /// Tears the texture down and recreates it with a new size and parameters.
    pub fn init<A: GraphicsApi>(
        &mut self,
        ctx: &mut GraphicsContext<A>,
        width: u32,
        height: u32,
        params: TextureParams,
    ) -> EngineResult<()> {
        self.release(ctx);
        self.width = width;
        self.height = height;
        self.params = params;
        self.create(ctx)
    }

    /// Releases the device object. The texture can be recreated with `init`.
    pub fn delete<A: GraphicsApi>(&mut self, ctx: &mut GraphicsContext<A>) {
        self.release(ctx);
    }

    /// Replaces this texture with a `width` x `height` one holding a scaled
    /// copy of the current contents.
    pub fn resize<A: GraphicsApi>(
        &mut self,
        ctx: &mut GraphicsContext<A>,
        width: u32,
        height: u32,
    ) -> EngineResult<()> {
        let mut resized = Texture::new(ctx, width, height, self.params)?;
        resized.copy_texels(ctx, self, 0, 0, self.width, self.height, true)?;
        self.release(ctx);
        *self = resized;
        Ok(())
    }

    // ── upload ────────────────────────────────────────────────────────────

    /// Uploads `pixels` (`w * h`, in `format`) into the region at `(x, y)`.
    pub fn set<A: GraphicsApi>(
        &mut self,
        ctx: &mut GraphicsContext<A>,
        pixels: &[u32],
        x: u32,
        y: u32,
        w: u32,
        h: u32,
        format: PixelFormat,
    ) -> EngineResult<()> {
        let expected = (w * h) as usize;
        if pixels.len() != expected {
            return Err(EngineError::PixelCountMismatch { expected, actual: pixels.len() });
        }
        if self.id.is_none() {
            self.create(ctx)?;
        }
        let id = self.id.ok_or(EngineError::TextureNotAvailable)?;

        let order = ctx.api().byte_order();
        let mut native = vec![0; expected];
        pixels::to_native_slice(pixels, &mut native, format, order);
        ctx.api_mut()
            .tex_sub_image(id, PixelRect::new(x as i32, y as i32, w as i32, h as i32), &native);

        if self.params.uses_mipmaps() {
            if ctx.caps().auto_mipmaps {
                ctx.api_mut().generate_mipmaps(id);
            } else if !self.warned_mipmaps {
                log::debug!("mipmap generation unsupported; texture {id} only refreshes its base level");
                self.warned_mipmaps = true;
            }
        }
        Ok(())
    }

    /// Uploads a full `width * height` image.
    pub fn set_pixels<A: GraphicsApi>(
        &mut self,
        ctx: &mut GraphicsContext<A>,
        pixels: &[u32],
        format: PixelFormat,
    ) -> EngineResult<()> {
        self.set(ctx, pixels, 0, 0, self.width, self.height, format)
    }

    // ── read-back ─────────────────────────────────────────────────────────

    /// Reads the texture back as `width * height` ARGB pixels.
    pub fn get<A: GraphicsApi>(&mut self, ctx: &mut GraphicsContext<A>) -> EngineResult<Vec<u32>> {
        let binding = self.binding().ok_or(EngineError::TextureNotAvailable)?;
        let mut fb = self.take_temp_fb(ctx)?;
        fb.set_color_buffer(ctx, binding)?;

        let full = PixelRect::sized(self.gpu_width, self.gpu_height);
        ctx.push_framebuffer();
        ctx.set_framebuffer(fb.binding());
        if !ctx.caps().framebuffer_objects {
            // The temporary target is the screen: draw the texture there first.
            ctx.api_mut().draw_texture(binding.id, full, full);
        }
        let read = ctx.api_mut().read_pixels(full);
        let popped = ctx.pop_framebuffer();
        self.temp_fb = Some(fb);
        let native = read?;
        popped?;

        let (w, h) = (self.width as usize, self.height as usize);
        let mut out =
            pixels::to_argb_unpadded(&native, self.gpu_width as usize, w, h, ctx.api().byte_order());
        if self.flip_x {
            pixels::flip_horizontal(&mut out, w, h);
        }
        if self.flip_y {
            pixels::flip_vertical(&mut out, w, h);
        }
        Ok(out)
    }

    // ── texture to texture ────────────────────────────────────────────────

    /// Copies all of `src`, scaled to cover this texture.
    pub fn set_from<A: GraphicsApi>(
        &mut self,
        ctx: &mut GraphicsContext<A>,
        src: &Texture,
    ) -> EngineResult<()> {
        self.copy_texels(ctx, src, 0, 0, src.width, src.height, true)
    }

    /// Copies the `(x, y, w, h)` crop of `src`, scaled to cover this texture.
    pub fn set_from_region<A: GraphicsApi>(
        &mut self,
        ctx: &mut GraphicsContext<A>,
        src: &Texture,
        x: u32,
        y: u32,
        w: u32,
        h: u32,
    ) -> EngineResult<()> {
        self.copy_texels(ctx, src, x, y, w, h, true)
    }

    /// Copies all of `src` into the same texels of this texture.
    pub fn put<A: GraphicsApi>(&mut self, ctx: &mut GraphicsContext<A>, src: &Texture) -> EngineResult<()> {
        self.copy_texels(ctx, src, 0, 0, src.width, src.height, false)
    }

    /// Copies the `(x, y, w, h)` region of `src` into the same region here.
    pub fn put_region<A: GraphicsApi>(
        &mut self,
        ctx: &mut GraphicsContext<A>,
        src: &Texture,
        x: u32,
        y: u32,
        w: u32,
        h: u32,
    ) -> EngineResult<()> {
        self.copy_texels(ctx, src, x, y, w, h, false)
    }

    #[allow(clippy::too_many_arguments)]
    fn copy_texels<A: GraphicsApi>(
        &mut self,
        ctx: &mut GraphicsContext<A>,
        src: &Texture,
        x: u32,
        y: u32,
        w: u32,
        h: u32,
        scale: bool,
    ) -> EngineResult<()> {
        let src_id = src.id.ok_or(EngineError::TextureNotAvailable)?;
        if self.id.is_none() {
            self.create(ctx)?;
        }
        let binding = self.binding().ok_or(EngineError::TextureNotAvailable)?;

        let mut fb = self.take_temp_fb(ctx)?;
        fb.set_color_buffer(ctx, binding)?;
        fb.disable_depth_test();

        let crop = PixelRect::new(x as i32, y as i32, w as i32, h as i32);
        let dst = if scale { PixelRect::sized(self.width, self.height) } else { crop };

        ctx.push_framebuffer();
        ctx.set_framebuffer(fb.binding());
        ctx.api_mut().draw_texture(src_id, crop, dst);
        let popped = ctx.pop_framebuffer();
        self.temp_fb = Some(fb);
        popped
    }

    /// The cached temporary framebuffer, rebuilt when the backing size changed.
    fn take_temp_fb<A: GraphicsApi>(&mut self, ctx: &mut GraphicsContext<A>) -> EngineResult<Framebuffer> {
        match self.temp_fb.take() {
            Some(fb) if fb.width() == self.gpu_width && fb.height() == self.gpu_height => Ok(fb),
            stale => {
                if let Some(fb) = stale {
                    fb.delete(ctx);
                }
                Framebuffer::new(ctx, FramebufferInit::new(self.gpu_width, self.gpu_height))
            }
        }
    }
}

fn ratio(size: u32, gpu_size: u32) -> f32 {
    if gpu_size == 0 { 0.0 } else { size as f32 / gpu_size as f32 }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::{Call, DeviceCapabilities, HeadlessApi};
    use crate::texture::Sampling;

    fn ctx() -> GraphicsContext<HeadlessApi> {
        GraphicsContext::new(HeadlessApi::new(16, 16))
    }

    fn minimal_ctx() -> GraphicsContext<HeadlessApi> {
        let caps = DeviceCapabilities { max_texture_size: 64, ..DeviceCapabilities::minimal() };
        GraphicsContext::new(HeadlessApi::new(16, 16).with_capabilities(caps))
    }

    // ── allocation ────────────────────────────────────────────────────────

    #[test]
    fn npot_size_is_kept_when_supported() {
        let mut ctx = ctx();
        let tex = Texture::new(&mut ctx, 5, 3, TextureParams::default()).unwrap();
        assert_eq!((tex.gpu_width(), tex.gpu_height()), (5, 3));
        assert_eq!(tex.max_tex_coords(), (1.0, 1.0));
    }

    #[test]
    fn padded_to_power_of_two_without_npot() {
        let mut ctx = minimal_ctx();
        let tex = Texture::new(&mut ctx, 5, 3, TextureParams::default()).unwrap();
        assert_eq!((tex.gpu_width(), tex.gpu_height()), (8, 4));
        assert_eq!(tex.max_tex_coords(), (5.0 / 8.0, 0.75));

        let id = tex.id().unwrap();
        assert!(ctx.api().texture_pixels(id).unwrap().iter().all(|&p| p == 0));
    }

    #[test]
    fn oversized_texture_errors() {
        let mut ctx = minimal_ctx();
        let err = Texture::new(&mut ctx, 65, 2, TextureParams::default()).unwrap_err();
        assert!(matches!(err, EngineError::TextureTooLarge { width: 128, max: 64, .. }));
    }

    #[test]
    fn init_deletes_the_old_object() {
        let mut ctx = ctx();
        let mut tex = Texture::new(&mut ctx, 4, 4, TextureParams::default()).unwrap();
        let old = tex.id().unwrap();
        tex.init(&mut ctx, 2, 2, TextureParams::default()).unwrap();
        assert_ne!(tex.id(), Some(old));
        assert!(!ctx.registry().is_live(ResourceKind::Texture, old));
        assert_eq!(tex.width(), 2);
    }

    // ── upload and read-back ──────────────────────────────────────────────

    #[test]
    fn set_rejects_wrong_pixel_count() {
        let mut ctx = ctx();
        let mut tex = Texture::new(&mut ctx, 2, 2, TextureParams::default()).unwrap();
        let err = tex.set(&mut ctx, &[0; 3], 0, 0, 2, 2, PixelFormat::Argb).unwrap_err();
        assert!(matches!(err, EngineError::PixelCountMismatch { expected: 4, actual: 3 }));
    }

    #[test]
    fn set_creates_missing_storage() {
        let mut ctx = ctx();
        let mut tex = Texture::deferred(2, 1, TextureParams::default());
        tex.set_pixels(&mut ctx, &[0xFF11_2233, 0x8044_5566], PixelFormat::Argb).unwrap();
        assert!(tex.is_available());
    }

    #[test]
    fn get_returns_uploaded_argb() {
        let mut ctx = minimal_ctx();
        let mut tex = Texture::new(&mut ctx, 3, 2, TextureParams::default()).unwrap();
        let px = [0xFF00_0001, 0xFF00_0002, 0xFF00_0003, 0x8000_0004, 0x8000_0005, 0x8000_0006];
        tex.set_pixels(&mut ctx, &px, PixelFormat::Argb).unwrap();
        assert_eq!(tex.get(&mut ctx).unwrap(), px);
    }

    #[test]
    fn get_applies_flips() {
        let mut ctx = ctx();
        let mut tex = Texture::new(&mut ctx, 2, 2, TextureParams::default()).unwrap();
        tex.set_pixels(&mut ctx, &[1, 2, 3, 4].map(|v| 0xFF00_0000 | v), PixelFormat::Argb).unwrap();
        tex.set_flipped_x(true);
        tex.set_flipped_y(true);
        assert_eq!(tex.get(&mut ctx).unwrap(), [4, 3, 2, 1].map(|v| 0xFF00_0000 | v));
    }

    #[test]
    fn rgb_upload_reads_back_opaque() {
        let mut ctx = ctx();
        let mut tex = Texture::new(&mut ctx, 1, 1, TextureParams::new(PixelFormat::Rgb)).unwrap();
        tex.set_pixels(&mut ctx, &[0x0012_3456], PixelFormat::Rgb).unwrap();
        assert_eq!(tex.get(&mut ctx).unwrap(), [0xFF12_3456]);
    }

    #[test]
    fn mipmapped_upload_without_auto_mipmaps_still_uploads() {
        let caps = DeviceCapabilities { auto_mipmaps: false, ..DeviceCapabilities::full() };
        let mut ctx = GraphicsContext::new(HeadlessApi::new(4, 4).with_capabilities(caps));
        let params = TextureParams::default().with_sampling(Sampling::Trilinear);
        let mut tex = Texture::new(&mut ctx, 1, 1, params).unwrap();
        tex.set_pixels(&mut ctx, &[0xFFFF_FFFF], PixelFormat::Argb).unwrap();

        let id = tex.id().unwrap();
        assert_eq!(ctx.api().mipmap_generations(id), 0);
        assert_eq!(tex.get(&mut ctx).unwrap(), [0xFFFF_FFFF]);
    }

    #[test]
    fn mipmapped_upload_regenerates_chain() {
        let mut ctx = ctx();
        let params = TextureParams::default().with_sampling(Sampling::Trilinear);
        let mut tex = Texture::new(&mut ctx, 1, 1, params).unwrap();
        tex.set_pixels(&mut ctx, &[0], PixelFormat::Argb).unwrap();
        assert_eq!(ctx.api().mipmap_generations(tex.id().unwrap()), 1);
    }

    #[test]
    fn read_back_without_framebuffer_objects_goes_through_screen() {
        let mut ctx = minimal_ctx();
        let mut tex = Texture::new(&mut ctx, 2, 1, TextureParams::default()).unwrap();
        tex.set_pixels(&mut ctx, &[0xFF00_00AA, 0xFF00_00BB], PixelFormat::Argb).unwrap();
        assert_eq!(tex.get(&mut ctx).unwrap(), [0xFF00_00AA, 0xFF00_00BB]);
        assert!(ctx.api().calls().iter().any(|c| matches!(c, Call::DrawTexture(..))));
        assert_eq!(ctx.framebuffer_depth(), 0);
    }

    // ── texture to texture ────────────────────────────────────────────────

    #[test]
    fn put_copies_unscaled() {
        let mut ctx = ctx();
        let mut src = Texture::new(&mut ctx, 2, 1, TextureParams::default()).unwrap();
        src.set_pixels(&mut ctx, &[0xFF00_0001, 0xFF00_0002], PixelFormat::Argb).unwrap();
        let mut dst = Texture::new(&mut ctx, 4, 1, TextureParams::default()).unwrap();
        dst.put(&mut ctx, &src).unwrap();
        assert_eq!(dst.get(&mut ctx).unwrap(), [0xFF00_0001, 0xFF00_0002, 0, 0]);
    }

    #[test]
    fn set_from_scales_to_cover() {
        let mut ctx = ctx();
        let mut src = Texture::new(&mut ctx, 2, 1, TextureParams::default()).unwrap();
        src.set_pixels(&mut ctx, &[0xFF00_0001, 0xFF00_0002], PixelFormat::Argb).unwrap();
        let mut dst = Texture::new(&mut ctx, 4, 1, TextureParams::default()).unwrap();
        dst.set_from(&mut ctx, &src).unwrap();
        assert_eq!(
            dst.get(&mut ctx).unwrap(),
            [0xFF00_0001, 0xFF00_0001, 0xFF00_0002, 0xFF00_0002]
        );
    }

    #[test]
    fn copy_without_framebuffer_objects_copies_back_from_screen() {
        let mut ctx = minimal_ctx();
        let mut src = Texture::new(&mut ctx, 2, 2, TextureParams::default()).unwrap();
        src.set_pixels(&mut ctx, &[0xFF00_0007; 4], PixelFormat::Argb).unwrap();
        let mut dst = Texture::new(&mut ctx, 2, 2, TextureParams::default()).unwrap();
        dst.put(&mut ctx, &src).unwrap();
        assert!(ctx.api().calls().iter().any(|c| matches!(c, Call::CopyToTexture(..))));
        assert_eq!(dst.get(&mut ctx).unwrap(), [0xFF00_0007; 4]);
    }

    #[test]
    fn resize_keeps_contents_scaled() {
        let mut ctx = ctx();
        let mut tex = Texture::new(&mut ctx, 1, 1, TextureParams::default()).unwrap();
        tex.set_pixels(&mut ctx, &[0xFFAB_CDEF], PixelFormat::Argb).unwrap();
        let old = tex.id().unwrap();

        tex.resize(&mut ctx, 2, 2).unwrap();
        assert_eq!((tex.width(), tex.height()), (2, 2));
        assert!(!ctx.registry().is_live(ResourceKind::Texture, old));
        assert_eq!(tex.get(&mut ctx).unwrap(), [0xFFAB_CDEF; 4]);
    }

    #[test]
    fn bindings_compare_by_object() {
        let a = TextureBinding { id: 3, width: 1, height: 1, max_u: 1.0, max_v: 1.0, flip_x: false, flip_y: false };
        let b = TextureBinding { flip_x: true, max_u: 0.5, ..a };
        assert_eq!(a, b);
        assert_eq!(b.tex_coord(0.0, 0.25), [0.5, 0.25]);
    }
}
