use crate::paint::PixelFormat;

/// Texture filtering.
#[derive(Debug, Copy, Clone, Default, Eq, PartialEq)]
pub enum Sampling {
    /// Nearest texel.
    Point,
    /// Linear within the base level.
    #[default]
    Bilinear,
    /// Linear across mipmap levels; the texture carries a mip chain.
    Trilinear,
}

#[derive(Debug, Copy, Clone, Default, Eq, PartialEq)]
pub enum Wrap {
    #[default]
    Clamp,
    Repeat,
}

/// Creation parameters for a [`Texture`](super::Texture).
#[derive(Debug, Copy, Clone, Default, Eq, PartialEq)]
pub struct TextureParams {
    pub format: PixelFormat,
    pub sampling: Sampling,
    pub wrap_u: Wrap,
    pub wrap_v: Wrap,
}

impl TextureParams {
    pub fn new(format: PixelFormat) -> Self {
        Self { format, ..Self::default() }
    }

    pub fn with_sampling(mut self, sampling: Sampling) -> Self {
        self.sampling = sampling;
        self
    }

    pub fn with_wrap(mut self, wrap_u: Wrap, wrap_v: Wrap) -> Self {
        self.wrap_u = wrap_u;
        self.wrap_v = wrap_v;
        self
    }

    pub fn uses_mipmaps(&self) -> bool {
        self.sampling == Sampling::Trilinear
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_argb_bilinear_clamped() {
        let p = TextureParams::default();
        assert_eq!(p.format, PixelFormat::Argb);
        assert_eq!(p.sampling, Sampling::Bilinear);
        assert_eq!((p.wrap_u, p.wrap_v), (Wrap::Clamp, Wrap::Clamp));
        assert!(!p.uses_mipmaps());
    }

    #[test]
    fn trilinear_means_mipmaps() {
        assert!(TextureParams::new(PixelFormat::Rgb).with_sampling(Sampling::Trilinear).uses_mipmaps());
    }
}
