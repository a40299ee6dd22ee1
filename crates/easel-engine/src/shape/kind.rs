/// Primitive kind passed to `begin_shape`.
#[derive(Debug, Copy, Clone, Default, Eq, PartialEq, Hash)]
pub enum ShapeKind {
    Points,
    Lines,
    LineStrip,
    LineLoop,
    Triangles,
    TriangleStrip,
    TriangleFan,
    Quads,
    QuadStrip,
    /// Arbitrary simple polygon, filled by ear clipping.
    #[default]
    Polygon,
}

impl ShapeKind {
    /// Whether the kind produces fill triangles at all.
    pub fn has_fill(self) -> bool {
        !matches!(self, ShapeKind::Points | ShapeKind::Lines | ShapeKind::LineStrip | ShapeKind::LineLoop)
    }
}

/// How `end_shape` treats the outline.
#[derive(Debug, Copy, Clone, Default, Eq, PartialEq)]
pub enum EndMode {
    #[default]
    Open,
    /// Joins the last vertex back to the first.
    Close,
}

/// How `vertex` texture coordinates are interpreted.
#[derive(Debug, Copy, Clone, Default, Eq, PartialEq)]
pub enum TextureMode {
    /// Already normalized to 0..1.
    #[default]
    Normal,
    /// In image pixels; divided by the image size of the unit.
    Image,
}
