use crate::coords::Vec3;

use super::faces::FaceList;
use super::triangulate::triangulate;
use super::vertex::push_doubling;
use super::{EndMode, ShapeKind, Vertex};

pub const DEFAULT_VERTICES: usize = 512;
pub const DEFAULT_POINTS: usize = 512;
pub const DEFAULT_LINES: usize = 512;
pub const DEFAULT_TRIANGLES: usize = 256;
pub const DEFAULT_PATHS: usize = 64;
pub const DEFAULT_FACES: usize = 64;

/// A run of connected lines, drawn as one strip.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct Path {
    /// Index of the first line.
    pub offset: usize,
    pub length: usize,
}

/// Vertices of the shapes assembled so far and the points, lines and
/// triangles generated from them.
///
/// Normally holds one shape; with depth sorting enabled shapes pile up until
/// the renderer flushes them at the end of the frame.
#[derive(Debug)]
pub struct Tessellation {
    vertices: Vec<Vertex>,
    points: Vec<usize>,
    lines: Vec<[usize; 2]>,
    paths: Vec<Path>,
    triangles: Vec<[usize; 3]>,
    faces: FaceList,
    shape_first: usize,
}

impl Default for Tessellation {
    fn default() -> Self {
        Self::new()
    }
}

impl Tessellation {
    pub fn new() -> Self {
        Self {
            vertices: Vec::with_capacity(DEFAULT_VERTICES),
            points: Vec::with_capacity(DEFAULT_POINTS),
            lines: Vec::with_capacity(DEFAULT_LINES),
            paths: Vec::with_capacity(DEFAULT_PATHS),
            triangles: Vec::with_capacity(DEFAULT_TRIANGLES),
            faces: FaceList::with_capacity(DEFAULT_FACES),
            shape_first: 0,
        }
    }

    /// Starts a shape. Unless `keep` is set, everything from earlier shapes
    /// is dropped first.
    pub fn begin(&mut self, keep: bool) {
        if !keep {
            self.clear();
        }
        self.shape_first = self.vertices.len();
    }

    pub fn clear(&mut self) {
        self.vertices.clear();
        self.points.clear();
        self.lines.clear();
        self.paths.clear();
        self.triangles.clear();
        self.faces.clear();
        self.shape_first = 0;
    }

    pub fn push(&mut self, v: Vertex) {
        push_doubling(&mut self.vertices, v);
    }

    pub fn vertices(&self) -> &[Vertex] {
        &self.vertices
    }

    /// Vertices of the shape being assembled.
    pub fn shape_vertices(&self) -> &[Vertex] {
        &self.vertices[self.shape_first..]
    }

    pub fn points(&self) -> &[usize] {
        &self.points
    }

    pub fn lines(&self) -> &[[usize; 2]] {
        &self.lines
    }

    pub fn paths(&self) -> &[Path] {
        &self.paths
    }

    pub fn triangles(&self) -> &[[usize; 3]] {
        &self.triangles
    }

    pub fn faces(&self) -> &FaceList {
        &self.faces
    }

    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty()
    }

    // ── strokes ───────────────────────────────────────────────────────────

    fn add_point(&mut self, a: usize) {
        push_doubling(&mut self.points, a);
    }

    fn line_break(&mut self) {
        let offset = self.lines.len();
        push_doubling(&mut self.paths, Path { offset, length: 0 });
    }

    fn add_line(&mut self, a: usize, b: usize) {
        if self.paths.is_empty() {
            self.line_break();
        }
        push_doubling(&mut self.lines, [a, b]);
        if let Some(path) = self.paths.last_mut() {
            path.length += 1;
        }
    }

    /// Generates outline points and lines for the current shape.
    pub fn stroke(&mut self, kind: ShapeKind, mode: EndMode) {
        let first = self.shape_first;
        let last = self.vertices.len();
        let close = mode == EndMode::Close;
        if last == first {
            return;
        }

        match kind {
            ShapeKind::Points => {
                for i in first..last {
                    self.add_point(i);
                }
            }
            ShapeKind::Lines => {
                let first_line = self.lines.len();
                let mut i = first;
                while i + 1 < last {
                    self.line_break();
                    self.add_line(i, i + 1);
                    i += 2;
                }
                if close && self.lines.len() > first_line {
                    let start = self.lines[first_line][0];
                    self.add_line(last - 1, start);
                }
            }
            ShapeKind::LineStrip | ShapeKind::LineLoop | ShapeKind::Polygon => {
                self.line_break();
                for i in first..last - 1 {
                    self.add_line(i, i + 1);
                }
                if close || kind == ShapeKind::LineLoop {
                    self.add_line(last - 1, first);
                }
            }
            ShapeKind::Triangles => {
                let mut i = first;
                while i + 2 < last {
                    self.line_break();
                    self.add_line(i, i + 1);
                    self.add_line(i + 1, i + 2);
                    self.add_line(i + 2, i);
                    i += 3;
                }
            }
            ShapeKind::TriangleStrip => {
                self.line_break();
                for i in first..last - 1 {
                    self.add_line(i, i + 1);
                }
                for i in first..last.saturating_sub(2) {
                    self.line_break();
                    self.add_line(i, i + 2);
                }
            }
            ShapeKind::TriangleFan => {
                if last - first < 3 {
                    return;
                }
                for i in first + 1..last {
                    self.line_break();
                    self.add_line(first, i);
                }
                self.line_break();
                for i in first + 1..last - 1 {
                    self.add_line(i, i + 1);
                }
                self.add_line(last - 1, first + 1);
            }
            ShapeKind::Quads => {
                let mut i = first;
                while i + 3 < last {
                    self.line_break();
                    self.add_line(i, i + 1);
                    self.add_line(i + 1, i + 2);
                    self.add_line(i + 2, i + 3);
                    self.add_line(i + 3, i);
                    i += 4;
                }
            }
            ShapeKind::QuadStrip => {
                let mut i = first;
                while i + 3 < last {
                    self.line_break();
                    self.add_line(i, i + 2);
                    self.add_line(i + 2, i + 3);
                    self.add_line(i + 3, i + 1);
                    self.add_line(i + 1, i);
                    i += 2;
                }
            }
        }
    }

    // ── fills ─────────────────────────────────────────────────────────────

    /// Generates fill triangles for the current shape, grouping them into
    /// faces by texture set.
    pub fn fill(&mut self, kind: ShapeKind, auto_normal: bool) {
        let first = self.shape_first;
        let last = self.vertices.len();

        match kind {
            ShapeKind::Triangles => {
                let mut i = first;
                while i + 2 < last {
                    self.add_triangle([i, i + 1, i + 2], auto_normal);
                    i += 3;
                }
            }
            ShapeKind::TriangleStrip => {
                for i in first..last.saturating_sub(2) {
                    if (i - first) % 2 == 0 {
                        self.add_triangle([i, i + 2, i + 1], auto_normal);
                    } else {
                        self.add_triangle([i, i + 1, i + 2], auto_normal);
                    }
                }
            }
            ShapeKind::TriangleFan => {
                for i in first + 1..last.saturating_sub(1) {
                    self.add_triangle([first, i, i + 1], auto_normal);
                }
            }
            ShapeKind::Quads => {
                let mut i = first;
                while i + 3 < last {
                    self.add_triangle([i, i + 1, i + 2], auto_normal);
                    self.add_triangle([i, i + 2, i + 3], auto_normal);
                    i += 4;
                }
            }
            ShapeKind::QuadStrip => {
                let mut i = first;
                while i + 3 < last {
                    self.add_triangle([i, i + 2, i + 1], auto_normal);
                    self.add_triangle([i + 2, i + 3, i + 1], auto_normal);
                    i += 2;
                }
            }
            ShapeKind::Polygon => {
                let positions: Vec<[f32; 3]> =
                    self.vertices[first..last].iter().map(|v| v.position).collect();
                for [a, b, c] in triangulate(&positions) {
                    self.add_triangle([first + a, first + b, first + c], auto_normal);
                }
            }
            ShapeKind::Points | ShapeKind::Lines | ShapeKind::LineStrip | ShapeKind::LineLoop => {}
        }
    }

    fn add_triangle(&mut self, tri: [usize; 3], auto_normal: bool) {
        if auto_normal {
            self.auto_normal(tri);
        }
        let index = self.triangles.len();
        push_doubling(&mut self.triangles, tri);
        let textures = self.vertices[tri[0]].textures;
        self.faces.push(index, tri, textures);
    }

    fn auto_normal(&mut self, [a, b, c]: [usize; 3]) {
        if tri_has_normals(&self.vertices, [a, b, c]) {
            return;
        }
        let p = |i: usize| {
            let [x, y, z] = self.vertices[i].position;
            Vec3::new(x, y, z)
        };
        let (pa, pb, pc) = (p(a), p(b), p(c));
        let n = (pb - pa).cross(pb - pc).normalized();
        for i in [a, b, c] {
            self.vertices[i].normal = n.to_array();
            self.vertices[i].has_normal = true;
        }
    }
}

fn tri_has_normals(vertices: &[Vertex], tri: [usize; 3]) -> bool {
    tri.iter().all(|&i| vertices[i].has_normal)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shape::TextureSet;
    use crate::texture::TextureBinding;

    fn with_vertices(xy: &[(f32, f32)]) -> Tessellation {
        let mut t = Tessellation::new();
        t.begin(false);
        for &(x, y) in xy {
            t.push(Vertex::at(x, y, 0.0));
        }
        t
    }

    fn path_lines(t: &Tessellation, p: usize) -> Vec<[usize; 2]> {
        let path = t.paths()[p];
        t.lines()[path.offset..path.offset + path.length].to_vec()
    }

    // ── strokes ───────────────────────────────────────────────────────────

    #[test]
    fn points_get_one_point_each() {
        let mut t = with_vertices(&[(0.0, 0.0), (1.0, 0.0), (2.0, 0.0)]);
        t.stroke(ShapeKind::Points, EndMode::Open);
        assert_eq!(t.points(), &[0, 1, 2]);
        assert!(t.lines().is_empty());
    }

    #[test]
    fn lines_get_a_path_per_pair() {
        let mut t = with_vertices(&[(0.0, 0.0), (1.0, 0.0), (2.0, 0.0), (3.0, 0.0), (4.0, 0.0)]);
        t.stroke(ShapeKind::Lines, EndMode::Open);
        assert_eq!(t.paths().len(), 2);
        assert_eq!(path_lines(&t, 1), vec![[2, 3]]);
    }

    #[test]
    fn closed_polygon_outline_returns_to_start() {
        let mut t = with_vertices(&[(0.0, 0.0), (1.0, 0.0), (1.0, 1.0)]);
        t.stroke(ShapeKind::Polygon, EndMode::Close);
        assert_eq!(t.paths().len(), 1);
        assert_eq!(path_lines(&t, 0), vec![[0, 1], [1, 2], [2, 0]]);
    }

    #[test]
    fn line_loop_closes_without_close_mode() {
        let mut t = with_vertices(&[(0.0, 0.0), (1.0, 0.0), (1.0, 1.0)]);
        t.stroke(ShapeKind::LineLoop, EndMode::Open);
        assert_eq!(path_lines(&t, 0).last(), Some(&[2, 0]));
    }

    #[test]
    fn triangle_fan_spokes_then_rim() {
        let mut t = with_vertices(&[(0.0, 0.0), (1.0, 0.0), (1.0, 1.0), (0.0, 1.0)]);
        t.stroke(ShapeKind::TriangleFan, EndMode::Open);
        assert_eq!(t.paths().len(), 4);
        assert_eq!(path_lines(&t, 0), vec![[0, 1]]);
        assert_eq!(path_lines(&t, 3), vec![[1, 2], [2, 3], [3, 1]]);
    }

    #[test]
    fn quad_strip_outlines_each_cell() {
        let mut t = with_vertices(&[(0.0, 0.0), (0.0, 1.0), (1.0, 0.0), (1.0, 1.0), (2.0, 0.0), (2.0, 1.0)]);
        t.stroke(ShapeKind::QuadStrip, EndMode::Open);
        assert_eq!(t.paths().len(), 2);
        assert_eq!(path_lines(&t, 1), vec![[2, 4], [4, 5], [5, 3], [3, 2]]);
    }

    #[test]
    fn path_lengths_cover_every_line() {
        let mut t = with_vertices(&[(0.0, 0.0), (1.0, 0.0), (1.0, 1.0), (0.0, 1.0), (0.5, 2.0)]);
        t.stroke(ShapeKind::TriangleStrip, EndMode::Open);
        let total: usize = t.paths().iter().map(|p| p.length).sum();
        assert_eq!(total, t.lines().len());
    }

    // ── fills ─────────────────────────────────────────────────────────────

    #[test]
    fn three_vertex_triangles_shape_gives_one_face() {
        let mut t = with_vertices(&[(0.0, 0.0), (10.0, 0.0), (0.0, 10.0)]);
        t.fill(ShapeKind::Triangles, false);
        assert_eq!(t.triangles(), &[[0, 1, 2]]);
        assert_eq!(t.faces().len(), 1);
        let face = &t.faces().as_slice()[0];
        assert_eq!((face.offset, face.length, face.min_index, face.max_index), (0, 1, 0, 2));
    }

    #[test]
    fn strip_alternates_winding() {
        let mut t = with_vertices(&[(0.0, 0.0), (0.0, 1.0), (1.0, 0.0), (1.0, 1.0)]);
        t.fill(ShapeKind::TriangleStrip, false);
        assert_eq!(t.triangles(), &[[0, 2, 1], [1, 2, 3]]);
    }

    #[test]
    fn quads_split_into_two_triangles_each() {
        let mut t = with_vertices(&[(0.0, 0.0), (1.0, 0.0), (1.0, 1.0), (0.0, 1.0), (5.0, 5.0)]);
        t.fill(ShapeKind::Quads, false);
        assert_eq!(t.triangles(), &[[0, 1, 2], [0, 2, 3]]);
    }

    #[test]
    fn line_kinds_have_no_fill() {
        let mut t = with_vertices(&[(0.0, 0.0), (1.0, 0.0), (1.0, 1.0)]);
        t.fill(ShapeKind::LineStrip, false);
        assert!(t.triangles().is_empty());
        assert!(t.faces().is_empty());
    }

    #[test]
    fn faces_follow_texture_changes() {
        let tex = TextureSet::single(TextureBinding {
            id: 9,
            width: 2,
            height: 2,
            max_u: 1.0,
            max_v: 1.0,
            flip_x: false,
            flip_y: false,
        });
        let mut t = with_vertices(&[]);
        for i in 0..9 {
            let mut v = Vertex::at(i as f32, (i % 3) as f32, 0.0);
            if (3..6).contains(&i) {
                v.textures = tex;
            }
            t.push(v);
        }
        t.fill(ShapeKind::Triangles, false);
        let faces = t.faces();
        assert_eq!(faces.len(), 3);
        assert_eq!(faces.triangle_count(), t.triangles().len());
        assert_eq!(faces.as_slice()[1].textures, tex);
    }

    #[test]
    fn auto_normal_fills_missing_normals() {
        let mut t = with_vertices(&[(0.0, 0.0), (10.0, 0.0), (0.0, 10.0)]);
        t.fill(ShapeKind::Triangles, true);
        let n = t.vertices()[0].normal;
        assert!(t.vertices().iter().all(|v| v.has_normal));
        assert!((n[2].abs() - 1.0).abs() < 1e-6);
    }

    #[test]
    fn auto_normal_keeps_explicit_normals() {
        let mut t = Tessellation::new();
        t.begin(false);
        for (x, y) in [(0.0, 0.0), (10.0, 0.0), (0.0, 10.0)] {
            let mut v = Vertex::at(x, y, 0.0);
            v.normal = [1.0, 0.0, 0.0];
            v.has_normal = true;
            t.push(v);
        }
        t.fill(ShapeKind::Triangles, true);
        assert!(t.vertices().iter().all(|v| v.normal == [1.0, 0.0, 0.0]));
    }

    #[test]
    fn keep_appends_after_previous_shape() {
        let mut t = with_vertices(&[(0.0, 0.0), (1.0, 0.0), (0.0, 1.0)]);
        t.fill(ShapeKind::Triangles, false);
        t.begin(true);
        for (x, y) in [(5.0, 5.0), (6.0, 5.0), (5.0, 6.0)] {
            t.push(Vertex::at(x, y, 0.0));
        }
        t.fill(ShapeKind::Triangles, false);
        assert_eq!(t.triangles(), &[[0, 1, 2], [3, 4, 5]]);
        assert_eq!(t.shape_vertices().len(), 3);

        t.begin(false);
        assert!(t.is_empty());
        assert!(t.triangles().is_empty());
    }
}
