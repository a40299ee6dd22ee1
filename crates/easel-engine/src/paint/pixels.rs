//! Host pixel layouts and their remaps into the native RGBA layout.
//!
//! Host images are `u32` per pixel in one of three layouts:
//! - `Alpha`: coverage in the low byte (`0x000000AA`)
//! - `Rgb`:   opaque `0x00RRGGBB`
//! - `Argb`:  straight alpha `0xAARRGGBB`
//!
//! The native layout is RGBA *in memory*: the four bytes of each pixel read
//! R, G, B, A at increasing addresses. How that looks as a `u32` depends on
//! the byte order: `0xRRGGBBAA` on big-endian, `0xAABBGGRR` on little-endian.
//! Getting a remap wrong does not crash, it silently swaps channels, so every
//! function here is pure and tested against the byte view.

/// Platform byte order of the native pixel layout.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum ByteOrder {
    Big,
    Little,
}

impl ByteOrder {
    /// Byte order of the machine this crate is compiled for.
    #[inline]
    pub const fn native() -> Self {
        if cfg!(target_endian = "big") { ByteOrder::Big } else { ByteOrder::Little }
    }

    /// Memory bytes (R, G, B, A) of a native pixel.
    #[inline]
    pub const fn to_bytes(self, pixel: u32) -> [u8; 4] {
        match self {
            ByteOrder::Big => pixel.to_be_bytes(),
            ByteOrder::Little => pixel.to_le_bytes(),
        }
    }

    /// Native pixel from memory bytes (R, G, B, A).
    #[inline]
    pub const fn from_bytes(self, rgba: [u8; 4]) -> u32 {
        match self {
            ByteOrder::Big => u32::from_be_bytes(rgba),
            ByteOrder::Little => u32::from_le_bytes(rgba),
        }
    }
}

impl Default for ByteOrder {
    fn default() -> Self {
        Self::native()
    }
}

/// Host pixel layout accepted at the texture boundary.
#[derive(Debug, Copy, Clone, Default, Eq, PartialEq)]
pub enum PixelFormat {
    Alpha,
    Rgb,
    #[default]
    Argb,
}

// ── host -> native ────────────────────────────────────────────────────────

/// Remaps one host pixel into the native RGBA layout.
///
/// `Alpha` pixels become white with the given coverage; `Rgb` pixels become
/// opaque.
#[inline]
pub const fn to_native(pixel: u32, format: PixelFormat, order: ByteOrder) -> u32 {
    match order {
        ByteOrder::Big => match format {
            PixelFormat::Alpha => 0xFFFF_FF00 | (pixel & 0xFF),
            PixelFormat::Rgb => (pixel << 8) | 0xFF,
            PixelFormat::Argb => (pixel << 8) | ((pixel >> 24) & 0xFF),
        },
        ByteOrder::Little => match format {
            PixelFormat::Alpha => ((pixel & 0xFF) << 24) | 0x00FF_FFFF,
            PixelFormat::Rgb => {
                0xFF00_0000 | ((pixel & 0xFF) << 16) | ((pixel & 0xFF_0000) >> 16) | (pixel & 0xFF00)
            }
            PixelFormat::Argb => {
                ((pixel & 0xFF) << 16) | ((pixel & 0xFF_0000) >> 16) | (pixel & 0xFF00_FF00)
            }
        },
    }
}

/// Remaps a whole host image. `dst` must be at least as long as `src`.
pub fn to_native_slice(src: &[u32], dst: &mut [u32], format: PixelFormat, order: ByteOrder) {
    for (d, &s) in dst.iter_mut().zip(src) {
        *d = to_native(s, format, order);
    }
}

// ── native -> host ────────────────────────────────────────────────────────

/// Remaps one native pixel into `0xAARRGGBB`.
#[inline]
pub const fn to_argb(pixel: u32, order: ByteOrder) -> u32 {
    match order {
        ByteOrder::Big => (pixel >> 8) | ((pixel << 24) & 0xFF00_0000),
        ByteOrder::Little => {
            ((pixel & 0xFF) << 16) | ((pixel & 0xFF_0000) >> 16) | (pixel & 0xFF00_FF00)
        }
    }
}

/// Copies a padded native image (`stride` pixels per row) into a tightly
/// packed `width * height` ARGB image, dropping the padding.
pub fn to_argb_unpadded(
    src: &[u32],
    stride: usize,
    width: usize,
    height: usize,
    order: ByteOrder,
) -> Vec<u32> {
    let mut out = Vec::with_capacity(width * height);
    for row in src.chunks(stride.max(1)).take(height) {
        out.extend(row.iter().take(width).map(|&p| to_argb(p, order)));
    }
    out
}

// ── single pixels ─────────────────────────────────────────────────────────

/// Screen read of one pixel: ARGB with alpha forced opaque.
#[inline]
pub const fn screen_get(pixel: u32, order: ByteOrder) -> u32 {
    to_argb(pixel, order) | 0xFF00_0000
}

// ── flips ─────────────────────────────────────────────────────────────────

/// Reverses the row order of a `width * height` image in place.
///
/// Framebuffers are read bottom-up; sketch pixels are top-down. With an odd
/// height the middle row stays where it is.
pub fn flip_vertical(pixels: &mut [u32], width: usize, height: usize) {
    if width == 0 {
        return;
    }
    for y in 0..height / 2 {
        let (top, bottom) = pixels.split_at_mut((height - 1 - y) * width);
        top[y * width..(y + 1) * width].swap_with_slice(&mut bottom[..width]);
    }
}

/// Reverses each row of a `width * height` image in place.
pub fn flip_horizontal(pixels: &mut [u32], width: usize, height: usize) {
    if width == 0 {
        return;
    }
    for row in pixels.chunks_mut(width).take(height) {
        row.reverse();
    }
}
