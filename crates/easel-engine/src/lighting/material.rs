use crate::paint::Color;

/// Surface response terms sent with every lit draw.
///
/// The diffuse term is not stored: it is the vertex color.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Material {
    pub ambient: Color,
    pub specular: Color,
    pub emissive: Color,
    pub shininess: f32,
}

impl Default for Material {
    fn default() -> Self {
        Self {
            ambient: Color::gray(0.2),
            specular: Color::black(),
            emissive: Color::black(),
            shininess: 1.0,
        }
    }
}
