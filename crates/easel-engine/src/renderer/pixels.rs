use crate::device::{EngineResult, GraphicsApi, PixelRect};
use crate::paint::{Color, PixelFormat, pixels};
use crate::texture::{Sampling, Texture, TextureParams};

use super::Renderer;

/// Pixel coordinates here are sketch coordinates: `(0, 0)` is the top-left
/// pixel. Framebuffer rows are stored bottom-up.
impl<A: GraphicsApi> Renderer<A> {
    fn in_bounds(&self, x: i32, y: i32) -> bool {
        x >= 0 && y >= 0 && (x as u32) < self.width && (y as u32) < self.height
    }

    /// Draws pending buffered geometry so pixel access sees it.
    fn settle(&mut self) {
        if self.recorder.is_none() {
            self.flush_geometry();
        }
    }

    /// Clears the surface to `color`, plus depth and stencil.
    pub fn background(&mut self, color: Color) -> EngineResult<()> {
        if !self.geometry.is_empty() && self.recorder.is_none() {
            log::trace!("background: dropping {} buffered vertices", self.geometry.vert_count());
            let textures = *self.geometry.textures();
            self.geometry.reset(textures);
        }
        self.with_target(|ctx| ctx.api_mut().clear(Some(color), true, true))
    }

    /// ARGB color of one pixel, alpha forced opaque. Outside the surface
    /// the result is 0.
    pub fn get(&mut self, x: i32, y: i32) -> EngineResult<u32> {
        if !self.in_bounds(x, y) {
            return Ok(0);
        }
        self.settle();
        let row = self.height as i32 - 1 - y;
        let read = self.with_target(|ctx| ctx.api_mut().read_pixels(PixelRect::new(x, row, 1, 1)))??;
        let order = self.ctx.api().byte_order();
        Ok(read.first().map_or(0, |&p| pixels::screen_get(p, order)))
    }

    /// Writes one ARGB pixel by drawing a 1x1 texture over it.
    pub fn set(&mut self, x: i32, y: i32, argb: u32) -> EngineResult<()> {
        if !self.in_bounds(x, y) {
            return Ok(());
        }
        self.settle();

        let mut pixel = match self.pixel.take() {
            Some(tex) => tex,
            None => Texture::new(
                &mut self.ctx,
                1,
                1,
                TextureParams::new(PixelFormat::Argb).with_sampling(Sampling::Point),
            )?,
        };
        let uploaded = pixel.set_pixels(&mut self.ctx, &[argb], PixelFormat::Argb);
        let id = pixel.id();
        self.pixel = Some(pixel);
        uploaded?;

        if let Some(id) = id {
            let row = self.height as i32 - 1 - y;
            self.with_target(|ctx| {
                ctx.api_mut().draw_texture(id, PixelRect::sized(1, 1), PixelRect::new(x, row, 1, 1))
            })?;
        }
        Ok(())
    }

    /// The whole surface as ARGB pixels, top row first.
    pub fn load_pixels(&mut self) -> EngineResult<Vec<u32>> {
        self.settle();
        let (w, h) = (self.width, self.height);
        let native = self.with_target(|ctx| ctx.api_mut().read_pixels(PixelRect::sized(w, h)))??;
        let order = self.ctx.api().byte_order();
        let mut out = pixels::to_argb_unpadded(&native, w as usize, w as usize, h as usize, order);
        pixels::flip_vertical(&mut out, w as usize, h as usize);
        Ok(out)
    }
}
