/// What the device can do, queried once when a backend is created.
///
/// Every flag has a fallback path when it is off:
/// - `npot_textures`: textures are padded to the next power of two
/// - `auto_mipmaps`: mipmapped uploads only refresh level 0 (warned once)
/// - `matrix_get`: matrices are tracked on the host only
/// - `texenv_crossbar`: two-texture combines skip tint and lighting
/// - `vertex_buffers`: geometry is streamed from host arrays
/// - `framebuffer_objects`: offscreen targets render to the screen and copy back
/// - `multisample_framebuffers`: multisample requests fall back to one sample
/// - `blend_equation`: LIGHTEST, DARKEST and DIFFERENCE are unavailable
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct DeviceCapabilities {
    pub npot_textures: bool,
    pub auto_mipmaps: bool,
    pub matrix_get: bool,
    pub texenv_crossbar: bool,
    pub vertex_buffers: bool,
    pub framebuffer_objects: bool,
    pub multisample_framebuffers: bool,
    pub blend_equation: bool,
    pub max_texture_size: u32,
    pub max_line_width: f32,
    pub max_point_size: f32,
    pub max_texture_units: usize,
}

impl DeviceCapabilities {
    /// Everything supported, with generous limits.
    pub fn full() -> Self {
        Self {
            npot_textures: true,
            auto_mipmaps: true,
            matrix_get: true,
            texenv_crossbar: true,
            vertex_buffers: true,
            framebuffer_objects: true,
            multisample_framebuffers: true,
            blend_equation: true,
            max_texture_size: 8192,
            max_line_width: 10.0,
            max_point_size: 64.0,
            max_texture_units: 2,
        }
    }

    /// Bare fixed-function device: no extensions, one texture unit.
    pub fn minimal() -> Self {
        Self {
            npot_textures: false,
            auto_mipmaps: false,
            matrix_get: false,
            texenv_crossbar: false,
            vertex_buffers: false,
            framebuffer_objects: false,
            multisample_framebuffers: false,
            blend_equation: false,
            max_texture_size: 1024,
            max_line_width: 1.0,
            max_point_size: 1.0,
            max_texture_units: 1,
        }
    }

    /// Derives capabilities from a driver extension string.
    ///
    /// Substring matches, so vendor prefixes (`GL_ARB_`, `GL_EXT_`, `GL_OES_`)
    /// all count. Blend equations are assumed present.
    pub fn from_extensions(
        extensions: &str,
        max_texture_size: u32,
        max_line_width: f32,
        max_point_size: f32,
        max_texture_units: usize,
    ) -> Self {
        let has = |name: &str| extensions.contains(name);
        Self {
            npot_textures: has("texture_non_power_of_two"),
            auto_mipmaps: has("generate_mipmap"),
            matrix_get: has("matrix_get"),
            texenv_crossbar: has("texture_env_crossbar"),
            vertex_buffers: has("vertex_buffer_object"),
            framebuffer_objects: has("framebuffer_object"),
            multisample_framebuffers: has("framebuffer_multisample"),
            blend_equation: true,
            max_texture_size,
            max_line_width,
            max_point_size,
            max_texture_units,
        }
    }
}

impl Default for DeviceCapabilities {
    fn default() -> Self {
        Self::full()
    }
}
