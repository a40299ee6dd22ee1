//! In-memory [`GraphicsApi`].
//!
//! Textures, render buffers and the screen are plain pixel vectors. Texture
//! copies, blits, clears and read-back run on the host; draws and state
//! changes are recorded as [`Call`]s for inspection. Primitive rasterization
//! is not performed.

use std::collections::HashMap;

use anyhow::{Result, bail};

use crate::coords::Mat4;
use crate::lighting::Material;
use crate::paint::{ByteOrder, Color, PixelFormat, pixels};
use crate::texture::MAX_TEXTURES;

use super::DeviceCapabilities;
use super::api::{
    Attachment, BlendState, DrawBatch, GraphicsApi, LightCommand, MatrixMode, PixelRect,
    Primitive, RenderBufferDesc, RenderBufferFormat, ResourceId, ResourceKind, TexEnv,
    TextureDesc,
};

/// Owned copy of a [`DrawBatch`].
#[derive(Debug, Clone, PartialEq)]
pub struct DrawRecord {
    pub primitive: Primitive,
    pub positions: Vec<[f32; 3]>,
    pub colors: Vec<[f32; 4]>,
    pub normals: Option<Vec<[f32; 3]>>,
    pub texcoords: [Option<Vec<[f32; 2]>>; MAX_TEXTURES],
    pub textures: Vec<ResourceId>,
    pub indices: Option<Vec<u32>>,
    pub size: f32,
}

impl DrawRecord {
    fn of(batch: &DrawBatch<'_>) -> Self {
        Self {
            primitive: batch.primitive,
            positions: batch.positions.to_vec(),
            colors: batch.colors.to_vec(),
            normals: batch.normals.map(<[_]>::to_vec),
            texcoords: batch.texcoords.map(|t| t.map(<[_]>::to_vec)),
            textures: batch.textures.to_vec(),
            indices: batch.indices.map(<[_]>::to_vec),
            size: batch.size,
        }
    }

    pub fn element_count(&self) -> usize {
        self.indices.as_ref().map_or(self.positions.len(), Vec::len)
    }
}

/// One recorded device call.
#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    LoadMatrix(MatrixMode, Mat4),
    Viewport(PixelRect),
    DepthTest(bool),
    DepthMask(bool),
    Blend(BlendState),
    Clear { color: Option<Color>, depth: bool, stencil: bool },
    Lighting(bool),
    Light(usize, LightCommand),
    Material(Material),
    TexImage(ResourceId, TextureDesc),
    TexSubImage(ResourceId, PixelRect),
    GenerateMipmaps(ResourceId),
    TexEnv(usize, TexEnv),
    BindFramebuffer(Option<ResourceId>),
    AttachTexture(ResourceId, usize, Option<ResourceId>),
    RenderBufferStorage(ResourceId, RenderBufferDesc),
    AttachRenderBuffer(ResourceId, Attachment, ResourceId),
    Blit(Option<ResourceId>, Option<ResourceId>),
    ReadPixels(PixelRect),
    CopyToTexture(ResourceId, PixelRect),
    DrawTexture(ResourceId, PixelRect, PixelRect),
    Draw(DrawRecord),
    Finish,
}

#[derive(Debug, Clone)]
struct Image {
    width: u32,
    height: u32,
    pixels: Vec<u32>,
}

impl Image {
    fn new(width: u32, height: u32) -> Self {
        Self { width, height, pixels: vec![0; (width * height) as usize] }
    }

    fn index(&self, x: i32, y: i32) -> Option<usize> {
        (x >= 0 && y >= 0 && (x as u32) < self.width && (y as u32) < self.height)
            .then(|| (y as u32 * self.width + x as u32) as usize)
    }
}

#[derive(Debug, Clone, Default)]
struct Framebuffer {
    colors: Vec<Option<ResourceId>>,
    color_rb: Option<ResourceId>,
    depth_rb: Option<ResourceId>,
    stencil_rb: Option<ResourceId>,
}

#[derive(Debug, Clone)]
struct RenderBuffer {
    desc: RenderBufferDesc,
    image: Image,
}

/// Where pixel operations land.
#[derive(Debug, Copy, Clone)]
enum Surface {
    Screen,
    Texture(ResourceId),
    RenderBuffer(ResourceId),
}

pub struct HeadlessApi {
    caps: DeviceCapabilities,
    order: ByteOrder,
    next_id: ResourceId,
    deleted: HashMap<ResourceKind, usize>,

    screen: Image,
    textures: HashMap<ResourceId, (TextureDesc, Image)>,
    framebuffers: HashMap<ResourceId, Framebuffer>,
    renderbuffers: HashMap<ResourceId, RenderBuffer>,
    bound_fb: Option<ResourceId>,

    modelview: Mat4,
    projection: Mat4,
    blend: BlendState,
    lighting: bool,
    tex_env: [TexEnv; MAX_TEXTURES],
    mipmap_generations: HashMap<ResourceId, usize>,

    calls: Vec<Call>,
}

impl HeadlessApi {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            caps: DeviceCapabilities::full(),
            order: ByteOrder::native(),
            next_id: 1,
            deleted: HashMap::new(),
            screen: Image::new(width, height),
            textures: HashMap::new(),
            framebuffers: HashMap::new(),
            renderbuffers: HashMap::new(),
            bound_fb: None,
            modelview: Mat4::IDENTITY,
            projection: Mat4::IDENTITY,
            blend: BlendState::ALPHA,
            lighting: false,
            tex_env: [TexEnv::Modulate; MAX_TEXTURES],
            mipmap_generations: HashMap::new(),
            calls: Vec::new(),
        }
    }

    pub fn with_capabilities(mut self, caps: DeviceCapabilities) -> Self {
        self.caps = caps;
        self
    }

    pub fn with_byte_order(mut self, order: ByteOrder) -> Self {
        self.order = order;
        self
    }

    // ── inspection ────────────────────────────────────────────────────────

    pub fn calls(&self) -> &[Call] {
        &self.calls
    }

    pub fn take_calls(&mut self) -> Vec<Call> {
        std::mem::take(&mut self.calls)
    }

    pub fn draws(&self) -> impl Iterator<Item = &DrawRecord> {
        self.calls.iter().filter_map(|c| match c {
            Call::Draw(d) => Some(d),
            _ => None,
        })
    }

    pub fn deleted(&self, kind: ResourceKind) -> usize {
        self.deleted.get(&kind).copied().unwrap_or(0)
    }

    pub fn bound_framebuffer(&self) -> Option<ResourceId> {
        self.bound_fb
    }

    pub fn matrix(&self, mode: MatrixMode) -> Mat4 {
        match mode {
            MatrixMode::ModelView => self.modelview,
            MatrixMode::Projection => self.projection,
        }
    }

    pub fn blend(&self) -> BlendState {
        self.blend
    }

    pub fn lighting_enabled(&self) -> bool {
        self.lighting
    }

    pub fn current_tex_env(&self, unit: usize) -> Option<TexEnv> {
        self.tex_env.get(unit).copied()
    }

    pub fn texture_desc(&self, id: ResourceId) -> Option<TextureDesc> {
        self.textures.get(&id).map(|(d, _)| *d)
    }

    /// Native pixels of a texture's base level, rows bottom-up.
    pub fn texture_pixels(&self, id: ResourceId) -> Option<&[u32]> {
        self.textures.get(&id).map(|(_, img)| img.pixels.as_slice())
    }

    pub fn mipmap_generations(&self, id: ResourceId) -> usize {
        self.mipmap_generations.get(&id).copied().unwrap_or(0)
    }

    pub fn screen_pixels(&self) -> &[u32] {
        &self.screen.pixels
    }

    /// Screen pixel as `0xAARRGGBB`, `y` counted from the bottom.
    pub fn screen_argb(&self, x: i32, y: i32) -> Option<u32> {
        self.screen.index(x, y).map(|i| pixels::to_argb(self.screen.pixels[i], self.order))
    }

    // ── surfaces ──────────────────────────────────────────────────────────

    fn surface_of(&self, fb: Option<ResourceId>) -> Option<Surface> {
        let Some(id) = fb else { return Some(Surface::Screen) };
        let fb = self.framebuffers.get(&id)?;
        if let Some(rb) = fb.color_rb {
            return Some(Surface::RenderBuffer(rb));
        }
        fb.colors.first().copied().flatten().map(Surface::Texture)
    }

    fn image(&self, s: Surface) -> Option<&Image> {
        match s {
            Surface::Screen => Some(&self.screen),
            Surface::Texture(id) => self.textures.get(&id).map(|(_, img)| img),
            Surface::RenderBuffer(id) => self.renderbuffers.get(&id).map(|rb| &rb.image),
        }
    }

    fn image_mut(&mut self, s: Surface) -> Option<&mut Image> {
        match s {
            Surface::Screen => Some(&mut self.screen),
            Surface::Texture(id) => self.textures.get_mut(&id).map(|(_, img)| img),
            Surface::RenderBuffer(id) => self.renderbuffers.get_mut(&id).map(|rb| &mut rb.image),
        }
    }

    fn bound_surface(&self) -> Option<Surface> {
        self.surface_of(self.bound_fb)
    }

    /// Nearest-texel scaled copy of `src_rect` of `src` onto `dst_rect` of
    /// the destination surface. Mirrored rectangles flip the copy.
    fn copy_scaled(&mut self, src: Image, src_rect: PixelRect, dst: Surface, dst_rect: PixelRect) {
        let Some(out) = self.image_mut(dst) else { return };
        let (dw, dh) = (dst_rect.w.abs(), dst_rect.h.abs());
        let (sw, sh) = (src_rect.w.abs(), src_rect.h.abs());
        if dw == 0 || dh == 0 || sw == 0 || sh == 0 {
            return;
        }
        let flip_x = (src_rect.w < 0) != (dst_rect.w < 0);
        let flip_y = (src_rect.h < 0) != (dst_rect.h < 0);
        let sx0 = src_rect.x.min(src_rect.x + src_rect.w);
        let sy0 = src_rect.y.min(src_rect.y + src_rect.h);
        let dx0 = dst_rect.x.min(dst_rect.x + dst_rect.w);
        let dy0 = dst_rect.y.min(dst_rect.y + dst_rect.h);

        for j in 0..dh {
            let mut v = (j as f32 + 0.5) / dh as f32;
            if flip_y {
                v = 1.0 - v;
            }
            let sy = sy0 + ((v * sh as f32) as i32).min(sh - 1);
            for i in 0..dw {
                let mut u = (i as f32 + 0.5) / dw as f32;
                if flip_x {
                    u = 1.0 - u;
                }
                let sx = sx0 + ((u * sw as f32) as i32).min(sw - 1);
                let texel = src.index(sx, sy).map_or(0, |k| src.pixels[k]);
                if let Some(k) = out.index(dx0 + i, dy0 + j) {
                    out.pixels[k] = texel;
                }
            }
        }
    }
}

impl GraphicsApi for HeadlessApi {
    fn capabilities(&self) -> DeviceCapabilities {
        self.caps
    }

    fn byte_order(&self) -> ByteOrder {
        self.order
    }

    fn screen_size(&self) -> (u32, u32) {
        (self.screen.width, self.screen.height)
    }

    fn gen_resource(&mut self, kind: ResourceKind) -> ResourceId {
        let id = self.next_id;
        self.next_id += 1;
        match kind {
            ResourceKind::Framebuffer => {
                self.framebuffers.insert(id, Framebuffer::default());
            }
            ResourceKind::Texture | ResourceKind::VertexBuffer | ResourceKind::RenderBuffer => {}
        }
        id
    }

    fn delete_resource(&mut self, kind: ResourceKind, id: ResourceId) {
        match kind {
            ResourceKind::Texture => {
                self.textures.remove(&id);
            }
            ResourceKind::Framebuffer => {
                self.framebuffers.remove(&id);
            }
            ResourceKind::RenderBuffer => {
                self.renderbuffers.remove(&id);
            }
            ResourceKind::VertexBuffer => {}
        }
        *self.deleted.entry(kind).or_default() += 1;
    }

    fn load_matrix(&mut self, mode: MatrixMode, m: &Mat4) {
        match mode {
            MatrixMode::ModelView => self.modelview = *m,
            MatrixMode::Projection => self.projection = *m,
        }
        self.calls.push(Call::LoadMatrix(mode, *m));
    }

    fn viewport(&mut self, rect: PixelRect) {
        self.calls.push(Call::Viewport(rect));
    }

    fn set_depth_test(&mut self, enabled: bool) {
        self.calls.push(Call::DepthTest(enabled));
    }

    fn set_depth_mask(&mut self, enabled: bool) {
        self.calls.push(Call::DepthMask(enabled));
    }

    fn set_blend(&mut self, state: BlendState) {
        self.blend = state;
        self.calls.push(Call::Blend(state));
    }

    fn clear(&mut self, color: Option<Color>, depth: bool, stencil: bool) {
        self.calls.push(Call::Clear { color, depth, stencil });
        let Some(color) = color else { return };
        let native = pixels::to_native(color.to_argb(), PixelFormat::Argb, self.order);
        if let Some(img) = self.bound_surface().and_then(|s| self.image_mut(s)) {
            img.pixels.fill(native);
        }
    }

    fn set_lighting(&mut self, enabled: bool) {
        self.lighting = enabled;
        self.calls.push(Call::Lighting(enabled));
    }

    fn light(&mut self, index: usize, cmd: LightCommand) {
        self.calls.push(Call::Light(index, cmd));
    }

    fn material(&mut self, material: &Material) {
        self.calls.push(Call::Material(*material));
    }

    fn tex_image(&mut self, id: ResourceId, desc: &TextureDesc) {
        self.textures.insert(id, (*desc, Image::new(desc.width, desc.height)));
        self.calls.push(Call::TexImage(id, *desc));
    }

    fn tex_sub_image(&mut self, id: ResourceId, rect: PixelRect, src: &[u32]) {
        self.calls.push(Call::TexSubImage(id, rect));
        let Some((_, img)) = self.textures.get_mut(&id) else { return };
        for j in 0..rect.h.max(0) {
            for i in 0..rect.w.max(0) {
                let Some(k) = img.index(rect.x + i, rect.y + j) else { continue };
                if let Some(&p) = src.get((j * rect.w + i) as usize) {
                    img.pixels[k] = p;
                }
            }
        }
    }

    fn generate_mipmaps(&mut self, id: ResourceId) {
        *self.mipmap_generations.entry(id).or_default() += 1;
        self.calls.push(Call::GenerateMipmaps(id));
    }

    fn tex_env(&mut self, unit: usize, env: TexEnv) {
        if let Some(slot) = self.tex_env.get_mut(unit) {
            *slot = env;
        }
        self.calls.push(Call::TexEnv(unit, env));
    }

    fn bind_framebuffer(&mut self, fb: Option<ResourceId>) {
        self.bound_fb = fb;
        self.calls.push(Call::BindFramebuffer(fb));
    }

    fn attach_texture(&mut self, fb: ResourceId, index: usize, tex: Option<ResourceId>) {
        self.calls.push(Call::AttachTexture(fb, index, tex));
        let Some(fb) = self.framebuffers.get_mut(&fb) else { return };
        if fb.colors.len() <= index {
            fb.colors.resize(index + 1, None);
        }
        fb.colors[index] = tex;
    }

    fn renderbuffer_storage(&mut self, rb: ResourceId, desc: &RenderBufferDesc) {
        self.renderbuffers
            .insert(rb, RenderBuffer { desc: *desc, image: Image::new(desc.width, desc.height) });
        self.calls.push(Call::RenderBufferStorage(rb, *desc));
    }

    fn attach_renderbuffer(&mut self, fb: ResourceId, slot: Attachment, rb: ResourceId) {
        self.calls.push(Call::AttachRenderBuffer(fb, slot, rb));
        let format = self.renderbuffers.get(&rb).map(|r| r.desc.format);
        let Some(fb) = self.framebuffers.get_mut(&fb) else { return };
        match (slot, format) {
            (Attachment::Color(_), _) => fb.color_rb = Some(rb),
            (Attachment::Depth, Some(RenderBufferFormat::DepthStencil)) => {
                fb.depth_rb = Some(rb);
                fb.stencil_rb = Some(rb);
            }
            (Attachment::Depth, _) => fb.depth_rb = Some(rb),
            (Attachment::Stencil, _) => fb.stencil_rb = Some(rb),
        }
    }

    fn framebuffer_complete(&mut self, fb: ResourceId) -> bool {
        self.framebuffers
            .get(&fb)
            .is_some_and(|f| f.color_rb.is_some() || f.colors.iter().any(Option::is_some))
    }

    fn blit_framebuffer(
        &mut self,
        src: Option<ResourceId>,
        dst: Option<ResourceId>,
        src_rect: PixelRect,
        dst_rect: PixelRect,
    ) {
        self.calls.push(Call::Blit(src, dst));
        let (Some(s), Some(d)) = (self.surface_of(src), self.surface_of(dst)) else { return };
        let Some(image) = self.image(s).cloned() else { return };
        self.copy_scaled(image, src_rect, d, dst_rect);
    }

    fn read_pixels(&mut self, rect: PixelRect) -> Result<Vec<u32>> {
        self.calls.push(Call::ReadPixels(rect));
        let Some(img) = self.bound_surface().and_then(|s| self.image(s)) else {
            bail!("read_pixels: bound framebuffer has no color storage");
        };
        let mut out = Vec::with_capacity((rect.w.max(0) * rect.h.max(0)) as usize);
        for j in 0..rect.h.max(0) {
            for i in 0..rect.w.max(0) {
                out.push(img.index(rect.x + i, rect.y + j).map_or(0, |k| img.pixels[k]));
            }
        }
        Ok(out)
    }

    fn copy_to_texture(&mut self, tex: ResourceId, rect: PixelRect) {
        self.calls.push(Call::CopyToTexture(tex, rect));
        let Some(image) = self.bound_surface().and_then(|s| self.image(s)).cloned() else {
            return;
        };
        self.copy_scaled(image, rect, Surface::Texture(tex), rect);
    }

    fn draw_texture(&mut self, tex: ResourceId, src: PixelRect, dst: PixelRect) {
        self.calls.push(Call::DrawTexture(tex, src, dst));
        let Some(target) = self.bound_surface() else { return };
        let Some((_, image)) = self.textures.get(&tex) else { return };
        let image = image.clone();
        self.copy_scaled(image, src, target, dst);
    }

    fn draw(&mut self, batch: &DrawBatch<'_>) {
        self.calls.push(Call::Draw(DrawRecord::of(batch)));
    }

    fn finish(&mut self) -> Result<()> {
        self.calls.push(Call::Finish);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::texture::{Sampling, Wrap};

    fn desc(w: u32, h: u32) -> TextureDesc {
        TextureDesc { width: w, height: h, sampling: Sampling::Point, wrap_u: Wrap::Clamp, wrap_v: Wrap::Clamp }
    }

    fn texture_with(api: &mut HeadlessApi, w: u32, h: u32, px: &[u32]) -> ResourceId {
        let id = api.gen_resource(ResourceKind::Texture);
        api.tex_image(id, &desc(w, h));
        api.tex_sub_image(id, PixelRect::sized(w, h), px);
        id
    }

    #[test]
    fn draw_texture_copies_unscaled() {
        let mut api = HeadlessApi::new(4, 4);
        let tex = texture_with(&mut api, 2, 2, &[1, 2, 3, 4]);
        api.draw_texture(tex, PixelRect::sized(2, 2), PixelRect::new(1, 1, 2, 2));
        let row1 = &api.screen_pixels()[4..8];
        let row2 = &api.screen_pixels()[8..12];
        assert_eq!(row1, &[0, 1, 2, 0]);
        assert_eq!(row2, &[0, 3, 4, 0]);
    }

    #[test]
    fn draw_texture_scales_and_mirrors() {
        let mut api = HeadlessApi::new(4, 1);
        let tex = texture_with(&mut api, 2, 1, &[7, 9]);
        api.draw_texture(tex, PixelRect::new(0, 0, 2, 1), PixelRect::new(4, 0, -4, 1));
        assert_eq!(api.screen_pixels(), &[9, 9, 7, 7]);
    }

    #[test]
    fn framebuffer_reads_its_color_texture() {
        let mut api = HeadlessApi::new(2, 2);
        let tex = texture_with(&mut api, 2, 1, &[5, 6]);
        let fb = api.gen_resource(ResourceKind::Framebuffer);
        api.attach_texture(fb, 0, Some(tex));
        assert!(api.framebuffer_complete(fb));

        api.bind_framebuffer(Some(fb));
        assert_eq!(api.read_pixels(PixelRect::sized(2, 1)).unwrap(), vec![5, 6]);
    }

    #[test]
    fn blit_resolves_color_renderbuffer_into_texture() {
        let mut api = HeadlessApi::new(2, 2);
        let ms = api.gen_resource(ResourceKind::Framebuffer);
        let rb = api.gen_resource(ResourceKind::RenderBuffer);
        api.renderbuffer_storage(
            rb,
            &RenderBufferDesc { format: RenderBufferFormat::Color, width: 2, height: 2, samples: 4 },
        );
        api.attach_renderbuffer(ms, Attachment::Color(0), rb);
        api.bind_framebuffer(Some(ms));
        api.clear(Some(Color::white()), false, false);

        let tex = texture_with(&mut api, 2, 2, &[0; 4]);
        let fb = api.gen_resource(ResourceKind::Framebuffer);
        api.attach_texture(fb, 0, Some(tex));
        api.blit_framebuffer(Some(ms), Some(fb), PixelRect::sized(2, 2), PixelRect::sized(2, 2));

        let white = pixels::to_native(0xFFFF_FFFF, PixelFormat::Argb, api.byte_order());
        assert!(api.texture_pixels(tex).unwrap().iter().all(|&p| p == white));
    }

    #[test]
    fn read_without_color_storage_fails() {
        let mut api = HeadlessApi::new(2, 2);
        let fb = api.gen_resource(ResourceKind::Framebuffer);
        api.bind_framebuffer(Some(fb));
        assert!(api.read_pixels(PixelRect::sized(1, 1)).is_err());
        assert!(!api.framebuffer_complete(fb));
    }

    #[test]
    fn copy_to_texture_grabs_bound_region() {
        let mut api = HeadlessApi::new(2, 2);
        api.clear(Some(Color::black()), false, false);
        let tex = texture_with(&mut api, 2, 2, &[0; 4]);
        api.copy_to_texture(tex, PixelRect::sized(2, 2));
        let black = pixels::to_native(0xFF00_0000, PixelFormat::Argb, api.byte_order());
        assert_eq!(api.texture_pixels(tex).unwrap(), &[black; 4]);
    }
}
