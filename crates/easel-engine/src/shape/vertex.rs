use crate::texture::{MAX_TEXTURES, TextureBinding};

/// Textures bound to the units when a vertex was emitted.
///
/// Units are filled from zero without gaps. Two sets are equal when every
/// unit names the same device texture.
#[derive(Debug, Copy, Clone, Default, Eq, PartialEq)]
pub struct TextureSet {
    units: [Option<TextureBinding>; MAX_TEXTURES],
}

impl TextureSet {
    pub const NONE: Self = Self { units: [None; MAX_TEXTURES] };

    pub fn single(binding: TextureBinding) -> Self {
        let mut set = Self::NONE;
        set.units[0] = Some(binding);
        set
    }

    /// Binds `bindings` to units 0.., dropping any beyond the unit count.
    pub fn from_slice(bindings: &[TextureBinding]) -> Self {
        let mut set = Self::NONE;
        for (slot, b) in set.units.iter_mut().zip(bindings) {
            *slot = Some(*b);
        }
        set
    }

    pub fn len(&self) -> usize {
        self.units.iter().take_while(|u| u.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.units[0].is_none()
    }

    pub fn get(&self, unit: usize) -> Option<&TextureBinding> {
        self.units.get(unit).and_then(Option::as_ref)
    }

    pub fn iter(&self) -> impl Iterator<Item = &TextureBinding> {
        self.units.iter().map_while(Option::as_ref)
    }

    pub fn ids(&self) -> Vec<u32> {
        self.iter().map(|b| b.id).collect()
    }
}

/// One assembled vertex.
#[derive(Debug, Copy, Clone, Default, PartialEq)]
pub struct Vertex {
    pub position: [f32; 3],
    pub fill: [f32; 4],
    pub stroke: [f32; 4],
    pub normal: [f32; 3],
    pub has_normal: bool,
    pub stroke_weight: f32,
    /// Normalized texture coordinates per unit.
    pub uv: [[f32; 2]; MAX_TEXTURES],
    pub textures: TextureSet,
}

impl Vertex {
    pub fn at(x: f32, y: f32, z: f32) -> Self {
        Self { position: [x, y, z], ..Self::default() }
    }

    /// Texture coordinate of `unit` as the device samples it.
    pub fn tex_coord(&self, unit: usize) -> [f32; 2] {
        match self.textures.get(unit) {
            Some(b) => b.tex_coord(self.uv[unit][0], self.uv[unit][1]),
            None => [0.0, 0.0],
        }
    }
}

/// Appends to `v`, doubling its capacity when it is full.
pub(crate) fn push_doubling<T>(v: &mut Vec<T>, item: T) {
    if v.len() == v.capacity() {
        let extra = v.capacity().max(1);
        v.reserve_exact(extra);
    }
    v.push(item);
}
