use crate::paint::Color;
use crate::texture::{MAX_TEXTURES, TextureBinding};

use super::{EndMode, ShapeKind, Tessellation, TextureMode, TextureSet, Vertex};

/// Drawing style and the shape under construction.
///
/// Every `vertex` call snapshots the current style (colors, stroke weight,
/// normal, bound textures) into the emitted [`Vertex`].
#[derive(Debug)]
pub struct ShapeAssembler {
    kind: ShapeKind,
    fill: Option<Color>,
    stroke: Option<Color>,
    tint: Option<Color>,
    stroke_weight: f32,
    normal: Option<[f32; 3]>,
    auto_normal: bool,
    textures: TextureSet,
    texture_mode: TextureMode,
    depth_sort: bool,
    tess: Tessellation,
}

impl Default for ShapeAssembler {
    fn default() -> Self {
        Self::new(false)
    }
}

impl ShapeAssembler {
    pub fn new(depth_sort: bool) -> Self {
        Self {
            kind: ShapeKind::Polygon,
            fill: Some(Color::white()),
            stroke: Some(Color::black()),
            tint: None,
            stroke_weight: 1.0,
            normal: None,
            auto_normal: true,
            textures: TextureSet::NONE,
            texture_mode: TextureMode::Normal,
            depth_sort,
            tess: Tessellation::new(),
        }
    }

    // ── style ─────────────────────────────────────────────────────────────

    pub fn fill(&mut self, color: Color) {
        self.fill = Some(color);
    }

    pub fn no_fill(&mut self) {
        self.fill = None;
    }

    pub fn stroke(&mut self, color: Color) {
        self.stroke = Some(color);
    }

    pub fn no_stroke(&mut self) {
        self.stroke = None;
    }

    /// Color textured vertices are multiplied with; white when unset.
    pub fn tint(&mut self, color: Color) {
        self.tint = Some(color);
    }

    pub fn no_tint(&mut self) {
        self.tint = None;
    }

    pub fn stroke_weight(&mut self, weight: f32) {
        self.stroke_weight = weight;
    }

    pub fn current_stroke_weight(&self) -> f32 {
        self.stroke_weight
    }

    pub fn is_filling(&self) -> bool {
        self.fill.is_some()
    }

    pub fn is_stroking(&self) -> bool {
        self.stroke.is_some()
    }

    /// Normal given to subsequent vertices. Cleared by `begin_shape`.
    pub fn normal(&mut self, nx: f32, ny: f32, nz: f32) {
        self.normal = Some([nx, ny, nz]);
    }

    pub fn set_auto_normal(&mut self, on: bool) {
        self.auto_normal = on;
    }

    pub fn set_depth_sort(&mut self, on: bool) {
        self.depth_sort = on;
    }

    pub fn depth_sort(&self) -> bool {
        self.depth_sort
    }

    pub fn texture_mode(&mut self, mode: TextureMode) {
        self.texture_mode = mode;
    }

    pub fn texture(&mut self, binding: TextureBinding) {
        self.textures = TextureSet::single(binding);
    }

    /// Binds several textures to consecutive units.
    pub fn textures(&mut self, bindings: &[TextureBinding]) {
        if bindings.len() > MAX_TEXTURES {
            log::warn!(
                "{} textures bound, only {MAX_TEXTURES} units available; extra textures ignored",
                bindings.len()
            );
        }
        self.textures = TextureSet::from_slice(bindings);
    }

    pub fn no_texture(&mut self) {
        self.textures = TextureSet::NONE;
    }

    pub fn bound_textures(&self) -> &TextureSet {
        &self.textures
    }

    // ── shapes ────────────────────────────────────────────────────────────

    pub fn kind(&self) -> ShapeKind {
        self.kind
    }

    pub fn begin_shape(&mut self, kind: ShapeKind) {
        self.kind = kind;
        self.normal = None;
        self.tess.begin(self.depth_sort);
        self.no_texture();
    }

    pub fn vertex(&mut self, x: f32, y: f32) {
        self.emit(x, y, 0.0, &[]);
    }

    pub fn vertex3(&mut self, x: f32, y: f32, z: f32) {
        self.emit(x, y, z, &[]);
    }

    pub fn vertex_uv(&mut self, x: f32, y: f32, u: f32, v: f32) {
        self.emit(x, y, 0.0, &[[u, v]]);
    }

    pub fn vertex3_uv(&mut self, x: f32, y: f32, z: f32, u: f32, v: f32) {
        self.emit(x, y, z, &[[u, v]]);
    }

    /// `(x, y, u0, v0, u1, v1, ..)` when `values` has an even length,
    /// `(x, y, z, u0, v0, ..)` when odd.
    pub fn vertex_slice(&mut self, values: &[f32]) {
        if values.len() < 2 {
            log::warn!("vertex: need at least two coordinates, got {}", values.len());
            return;
        }
        let (xyz, rest) = if values.len() % 2 == 0 {
            ([values[0], values[1], 0.0], &values[2..])
        } else {
            ([values[0], values[1], values[2]], &values[3..])
        };
        let uv: Vec<[f32; 2]> = rest.chunks_exact(2).map(|c| [c[0], c[1]]).collect();
        self.emit(xyz[0], xyz[1], xyz[2], &uv);
    }

    fn emit(&mut self, x: f32, y: f32, z: f32, uv: &[[f32; 2]]) {
        let mut v = Vertex::at(x, y, z);
        v.fill = match (self.textures.is_empty(), self.fill) {
            (false, _) => self.tint.unwrap_or(Color::white()).to_array(),
            (true, Some(c)) => c.to_array(),
            (true, None) => Color::transparent().to_array(),
        };
        v.stroke = self.stroke.unwrap_or(Color::transparent()).to_array();
        v.stroke_weight = if self.stroke.is_some() { self.stroke_weight } else { 0.0 };
        if let Some(n) = self.normal {
            v.normal = n;
            v.has_normal = true;
        }
        v.textures = self.textures;
        for (unit, &[u, t]) in uv.iter().enumerate().take(MAX_TEXTURES) {
            v.uv[unit] = match (self.texture_mode, self.textures.get(unit)) {
                (TextureMode::Image, Some(b)) => [u / b.width as f32, t / b.height as f32],
                _ => [u, t],
            };
        }
        self.tess.push(v);
    }

    /// Generates strokes and fills for the shape. Returns `false` when no
    /// vertex was added since `begin_shape`.
    pub fn end_shape(&mut self, mode: EndMode) -> bool {
        if self.tess.shape_vertices().is_empty() {
            return false;
        }
        if self.is_stroking() {
            self.tess.stroke(self.kind, mode);
        }
        if self.is_filling() && self.kind.has_fill() {
            self.tess.fill(self.kind, self.auto_normal);
        }
        true
    }

    pub fn tessellation(&self) -> &Tessellation {
        &self.tess
    }

    /// Drops all assembled geometry.
    pub fn clear(&mut self) {
        self.tess.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn binding(id: u32, w: u32, h: u32) -> TextureBinding {
        TextureBinding { id, width: w, height: h, max_u: 1.0, max_v: 1.0, flip_x: false, flip_y: false }
    }

    #[test]
    fn end_without_vertices_does_nothing() {
        let mut s = ShapeAssembler::default();
        s.begin_shape(ShapeKind::Polygon);
        assert!(!s.end_shape(EndMode::Close));
        assert!(s.tessellation().lines().is_empty());
    }

    #[test]
    fn style_is_snapshotted_per_vertex() {
        let mut s = ShapeAssembler::default();
        s.begin_shape(ShapeKind::Triangles);
        s.fill(Color::rgb(1.0, 0.0, 0.0));
        s.vertex(0.0, 0.0);
        s.fill(Color::rgb(0.0, 1.0, 0.0));
        s.stroke_weight(4.0);
        s.vertex(1.0, 0.0);
        let vs = s.tessellation().vertices();
        assert_eq!(vs[0].fill, [1.0, 0.0, 0.0, 1.0]);
        assert_eq!(vs[1].fill, [0.0, 1.0, 0.0, 1.0]);
        assert_eq!(vs[1].stroke_weight, 4.0);
    }

    #[test]
    fn slice_form_reads_parity() {
        let mut s = ShapeAssembler::default();
        s.begin_shape(ShapeKind::Points);
        s.texture(binding(1, 10, 10));
        s.vertex_slice(&[1.0, 2.0, 0.5, 0.25]);
        s.vertex_slice(&[1.0, 2.0, 3.0]);
        let vs = s.tessellation().vertices();
        assert_eq!(vs[0].position, [1.0, 2.0, 0.0]);
        assert_eq!(vs[0].uv[0], [0.5, 0.25]);
        assert_eq!(vs[1].position, [1.0, 2.0, 3.0]);
    }

    #[test]
    fn image_mode_divides_by_image_size() {
        let mut s = ShapeAssembler::default();
        s.begin_shape(ShapeKind::Quads);
        s.texture_mode(TextureMode::Image);
        s.texture(binding(1, 200, 100));
        s.vertex_uv(0.0, 0.0, 50.0, 50.0);
        assert_eq!(s.tessellation().vertices()[0].uv[0], [0.25, 0.5]);
    }

    #[test]
    fn textured_vertices_use_tint() {
        let mut s = ShapeAssembler::default();
        s.begin_shape(ShapeKind::Quads);
        s.fill(Color::rgb(1.0, 0.0, 0.0));
        s.texture(binding(1, 4, 4));
        s.vertex_uv(0.0, 0.0, 0.0, 0.0);
        s.tint(Color::gray(0.5));
        s.vertex_uv(1.0, 0.0, 1.0, 0.0);
        let vs = s.tessellation().vertices();
        assert_eq!(vs[0].fill, [1.0, 1.0, 1.0, 1.0]);
        assert_eq!(vs[1].fill, [0.5, 0.5, 0.5, 1.0]);
    }

    #[test]
    fn begin_shape_unbinds_textures() {
        let mut s = ShapeAssembler::default();
        s.texture(binding(1, 4, 4));
        s.begin_shape(ShapeKind::Polygon);
        assert!(s.bound_textures().is_empty());
    }

    #[test]
    fn no_fill_skips_triangles() {
        let mut s = ShapeAssembler::default();
        s.no_fill();
        s.begin_shape(ShapeKind::Triangles);
        for (x, y) in [(0.0, 0.0), (1.0, 0.0), (0.0, 1.0)] {
            s.vertex(x, y);
        }
        assert!(s.end_shape(EndMode::Open));
        assert!(s.tessellation().triangles().is_empty());
        assert_eq!(s.tessellation().paths().len(), 1);
    }

    #[test]
    fn many_vertices_survive_growth() {
        let mut s = ShapeAssembler::default();
        s.begin_shape(ShapeKind::Points);
        for i in 0..2000 {
            s.vertex(i as f32, 0.0);
        }
        let vs = s.tessellation().vertices();
        assert_eq!(vs.len(), 2000);
        assert!(vs.iter().enumerate().all(|(i, v)| v.position[0] == i as f32));
    }
}
