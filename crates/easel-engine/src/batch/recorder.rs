use std::ops::Range;

use crate::shape::{ShapeKind, TextureSet};
use crate::texture::MAX_TEXTURES;

/// One drawable part of a recorded shape.
#[derive(Debug, Clone, PartialEq)]
pub struct ShapeChild {
    pub name: String,
    pub kind: ShapeKind,
    pub vertices: Range<usize>,
    /// Index range for indexed children.
    pub indices: Option<Range<usize>>,
    pub stroke_weight: f32,
    pub textures: TextureSet,
}

impl ShapeChild {
    /// Whether `next` continues this child: same name, kind, stroke and
    /// textures, and ranges starting where this child's end.
    fn continues_with(&self, next: &ShapeChild) -> bool {
        let indices_adjacent = match (&self.indices, &next.indices) {
            (Some(a), Some(b)) => a.end == b.start,
            (None, None) => true,
            _ => false,
        };
        self.name == next.name
            && self.kind == next.kind
            && self.stroke_weight == next.stroke_weight
            && self.textures == next.textures
            && self.vertices.end == next.vertices.start
            && indices_adjacent
    }
}

/// Geometry captured between `begin_record` and `end_record`.
///
/// Attribute arrays are parallel; `texcoords` has one array per unit, zero
/// for vertices without a texture on that unit.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecordedShape {
    pub vertices: Vec<[f32; 3]>,
    pub colors: Vec<[f32; 4]>,
    pub normals: Vec<[f32; 3]>,
    pub texcoords: [Vec<[f32; 2]>; MAX_TEXTURES],
    /// Empty unless faces were captured through the geometry buffer.
    pub indices: Vec<u32>,
    pub children: Vec<ShapeChild>,
}

impl RecordedShape {
    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty()
    }
}

/// Accumulates a [`RecordedShape`].
#[derive(Debug, Default)]
pub struct Recorder {
    shape: RecordedShape,
    merge: bool,
    name: Option<String>,
    started: usize,
}

impl Recorder {
    /// With `merge` set every child is named `shape`, so consecutive
    /// compatible children collapse into one.
    pub fn new(merge: bool) -> Self {
        Self { merge, ..Self::default() }
    }

    /// Name for the children recorded from now on.
    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = Some(name.into());
    }

    pub fn vertex_count(&self) -> usize {
        self.shape.vertices.len()
    }

    pub fn index_count(&self) -> usize {
        self.shape.indices.len()
    }

    fn child_name(&self) -> String {
        match (&self.name, self.merge) {
            (_, true) => "shape".to_string(),
            (Some(name), false) => name.clone(),
            (None, false) => format!("shape:{}", self.started),
        }
    }

    pub fn add_child(
        &mut self,
        kind: ShapeKind,
        vertices: Range<usize>,
        indices: Option<Range<usize>>,
        stroke_weight: f32,
        textures: TextureSet,
    ) {
        let child = ShapeChild { name: self.child_name(), kind, vertices, indices, stroke_weight, textures };
        self.started += 1;

        if let Some(last) = self.shape.children.last_mut() {
            if last.continues_with(&child) {
                last.vertices.end = child.vertices.end;
                if let (Some(a), Some(b)) = (&mut last.indices, &child.indices) {
                    a.end = b.end;
                }
                return;
            }
        }
        self.shape.children.push(child);
    }

    /// Appends one non-indexed vertex.
    pub fn push_vertex(
        &mut self,
        position: [f32; 3],
        color: [f32; 4],
        normal: [f32; 3],
        texcoords: [[f32; 2]; MAX_TEXTURES],
    ) {
        self.shape.vertices.push(position);
        self.shape.colors.push(color);
        self.shape.normals.push(normal);
        for (dst, tc) in self.shape.texcoords.iter_mut().zip(texcoords) {
            dst.push(tc);
        }
    }

    /// Appends an indexed batch; its indices are offset past the vertices
    /// already recorded.
    pub fn append_indexed(
        &mut self,
        positions: &[[f32; 3]],
        colors: &[[f32; 4]],
        normals: &[[f32; 3]],
        texcoords: [&[[f32; 2]]; MAX_TEXTURES],
        indices: &[u32],
    ) {
        let base = self.shape.vertices.len() as u32;
        self.shape.indices.extend(indices.iter().map(|i| base + i));
        self.shape.vertices.extend_from_slice(positions);
        self.shape.colors.extend_from_slice(colors);
        self.shape.normals.extend_from_slice(normals);
        for (dst, src) in self.shape.texcoords.iter_mut().zip(texcoords) {
            dst.extend_from_slice(src);
        }
    }

    pub fn finish(self) -> RecordedShape {
        log::debug!(
            "recorded shape: {} vertices, {} indices, {} children",
            self.shape.vertices.len(),
            self.shape.indices.len(),
            self.shape.children.len()
        );
        self.shape
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tris(rec: &mut Recorder, n0: usize, len: usize) {
        let i0 = rec.index_count();
        rec.add_child(ShapeKind::Triangles, n0..n0 + len, Some(i0..i0 + 3), 0.0, TextureSet::NONE);
    }

    #[test]
    fn merged_children_collapse_when_adjacent() {
        let mut rec = Recorder::new(true);
        rec.add_child(ShapeKind::Triangles, 0..3, Some(0..3), 0.0, TextureSet::NONE);
        rec.add_child(ShapeKind::Triangles, 3..6, Some(3..6), 0.0, TextureSet::NONE);
        rec.add_child(ShapeKind::LineStrip, 6..9, None, 1.0, TextureSet::NONE);
        let shape = rec.finish();
        assert_eq!(shape.children.len(), 2);
        assert_eq!(shape.children[0].vertices, 0..6);
        assert_eq!(shape.children[0].indices, Some(0..6));
        assert_eq!(shape.children[0].name, "shape");
    }

    #[test]
    fn unmerged_children_are_numbered() {
        let mut rec = Recorder::new(false);
        tris(&mut rec, 0, 3);
        tris(&mut rec, 3, 3);
        let names: Vec<String> = rec.finish().children.into_iter().map(|c| c.name).collect();
        assert_eq!(names, vec!["shape:0", "shape:1"]);
    }

    #[test]
    fn named_children_merge_under_their_name() {
        let mut rec = Recorder::new(false);
        rec.set_name("wheel");
        rec.add_child(ShapeKind::Triangles, 0..3, None, 0.0, TextureSet::NONE);
        rec.add_child(ShapeKind::Triangles, 3..6, None, 0.0, TextureSet::NONE);
        rec.add_child(ShapeKind::Triangles, 9..12, None, 0.0, TextureSet::NONE);
        let shape = rec.finish();
        assert_eq!(shape.children.len(), 2);
        assert_eq!(shape.children[0].name, "wheel");
    }

    #[test]
    fn indexed_batches_are_offset() {
        let mut rec = Recorder::new(false);
        rec.push_vertex([0.0; 3], [1.0; 4], [0.0; 3], [[0.0; 2]; MAX_TEXTURES]);
        let pos = [[1.0, 0.0, 0.0], [2.0, 0.0, 0.0], [3.0, 0.0, 0.0]];
        let col = [[1.0; 4]; 3];
        let nrm = [[0.0, 0.0, 1.0]; 3];
        let tc = [[0.0; 2]; 3];
        rec.append_indexed(&pos, &col, &nrm, [&tc, &tc], &[0, 1, 2]);
        let shape = rec.finish();
        assert_eq!(shape.indices, vec![1, 2, 3]);
        assert_eq!(shape.vertices.len(), 4);
        assert_eq!(shape.texcoords[1].len(), 4);
    }
}
