use crate::batch::{FlushTarget, RecordedShape, Recorder};
use crate::device::GraphicsApi;
use crate::shape::{EndMode, ShapeKind};

use super::Renderer;

impl<A: GraphicsApi> Renderer<A> {
    pub fn is_recording(&self) -> bool {
        self.recorder.is_some()
    }

    /// Starts capturing geometry instead of drawing it. Geometry already
    /// waiting in the buffer is drawn first so it stays out of the
    /// recording.
    pub fn begin_record(&mut self) {
        if self.recorder.is_some() {
            log::warn!("begin_record: already recording");
            return;
        }
        self.flush_geometry();
        self.recorder = Some(Recorder::new(self.merge_shapes));
        log::debug!("recording started");
    }

    /// Stops recording and returns what was captured, including geometry
    /// still pending in the buffer. `None` when no recording was open.
    pub fn end_record(&mut self) -> Option<RecordedShape> {
        let Some(mut rec) = self.recorder.take() else {
            log::warn!("end_record: start recording with begin_record");
            return None;
        };
        self.geometry.finish::<A>(&mut FlushTarget::Record(&mut rec));
        Some(rec.finish())
    }

    /// Starts a recording holding a single shape of `kind`.
    pub fn begin_shape_recorder(&mut self, kind: ShapeKind) {
        self.begin_record();
        self.begin_shape(kind);
    }

    /// Ends the shape opened by [`begin_shape_recorder`](Self::begin_shape_recorder)
    /// and returns it, or `None` when it produced no geometry.
    pub fn end_shape_recorder(&mut self, mode: EndMode) -> Option<RecordedShape> {
        self.end_shape(mode);
        self.end_record().filter(|shape| !shape.is_empty())
    }

    /// With merging on, compatible consecutive children of a recording
    /// collapse into one. Applies to recordings started afterwards.
    pub fn merge_shapes(&mut self, merge: bool) {
        self.merge_shapes = merge;
    }

    /// Names the children recorded from now on.
    pub fn shape_name(&mut self, name: &str) {
        match self.recorder.as_mut() {
            Some(rec) => rec.set_name(name),
            None => log::debug!("shape_name({name:?}) outside a recording"),
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::batch::BufferPolicy;
    use crate::device::HeadlessApi;
    use crate::renderer::{Renderer, RendererInit};
    use crate::shape::{EndMode, ShapeKind};
    use crate::texture::{Texture, TextureParams};

    fn renderer(policy: BufferPolicy) -> Renderer<HeadlessApi> {
        let init = RendererInit::new(50, 50).with_policy(policy, 0);
        let mut r = Renderer::new(HeadlessApi::new(50, 50), init).unwrap();
        r.begin_draw().unwrap();
        r
    }

    fn quad(r: &mut Renderer<HeadlessApi>, x: f32) {
        r.begin_shape(ShapeKind::Quads);
        r.vertex(x, 0.0);
        r.vertex(x + 5.0, 0.0);
        r.vertex(x + 5.0, 5.0);
        r.vertex(x, 5.0);
        r.end_shape(EndMode::Open);
    }

    // ── direct ────────────────────────────────────────────────────────────

    #[test]
    fn recording_draws_nothing() {
        let mut r = renderer(BufferPolicy::Disabled);
        r.begin_record();
        quad(&mut r, 0.0);
        assert_eq!(r.api().draws().count(), 0);
        let shape = r.end_record().unwrap();
        assert!(!r.is_recording());
        assert_eq!(shape.vertices.len(), 6 + 5);
        assert!(shape.indices.is_empty());
        assert_eq!(shape.children.len(), 2);
        assert_eq!(shape.children[0].kind, ShapeKind::Triangles);
        assert_eq!(shape.children[0].vertices, 0..6);
        assert_eq!(shape.children[1].kind, ShapeKind::LineStrip);
        assert_eq!(shape.children[1].vertices, 6..11);
        assert_eq!(shape.children[1].stroke_weight, 1.0);
    }

    #[test]
    fn end_without_begin_returns_none() {
        let mut r = renderer(BufferPolicy::Disabled);
        assert!(r.end_record().is_none());
    }

    #[test]
    fn merged_recording_collapses_children() {
        let mut r = renderer(BufferPolicy::Disabled);
        r.no_stroke();
        r.merge_shapes(true);
        r.begin_record();
        quad(&mut r, 0.0);
        quad(&mut r, 10.0);
        let shape = r.end_record().unwrap();
        assert_eq!(shape.children.len(), 1);
        assert_eq!(shape.children[0].name, "shape");
        assert_eq!(shape.children[0].vertices, 0..12);
    }

    #[test]
    fn named_children_keep_their_name() {
        let mut r = renderer(BufferPolicy::Disabled);
        r.no_stroke();
        r.begin_record();
        r.shape_name("left");
        quad(&mut r, 0.0);
        r.shape_name("right");
        quad(&mut r, 10.0);
        let names: Vec<String> = r.end_record().unwrap().children.into_iter().map(|c| c.name).collect();
        assert_eq!(names, vec!["left", "right"]);
    }

    // ── buffered ──────────────────────────────────────────────────────────

    #[test]
    fn buffered_recording_keeps_indices_and_ranges() {
        let mut r = renderer(BufferPolicy::AccumulateAll);
        r.no_stroke();
        r.begin_record();
        quad(&mut r, 0.0);
        quad(&mut r, 10.0);
        let shape = r.end_record().unwrap();
        assert_eq!(shape.vertices.len(), 8);
        assert_eq!(shape.indices, vec![0, 1, 2, 0, 2, 3, 4, 5, 6, 4, 6, 7]);
        let first = &shape.children[0];
        assert_eq!(first.vertices, 0..4);
        assert_eq!(first.indices, Some(0..6));
        assert_eq!(shape.children[1].vertices, 4..8);
        assert_eq!(shape.children[1].indices, Some(6..12));
    }

    #[test]
    fn begin_record_draws_pending_geometry_first() {
        let mut r = renderer(BufferPolicy::AccumulateAll);
        r.no_stroke();
        quad(&mut r, 0.0);
        r.begin_record();
        assert_eq!(r.api().draws().count(), 1);
        assert_eq!(r.geometry().flush_count(), 0);
        quad(&mut r, 10.0);
        let shape = r.end_record().unwrap();
        assert_eq!(shape.vertices[0], [10.0, 0.0, 0.0]);
    }

    #[test]
    fn strokes_after_buffered_faces_follow_them() {
        let mut r = renderer(BufferPolicy::AccumulateAll);
        r.begin_record();
        quad(&mut r, 0.0);
        let shape = r.end_record().unwrap();
        assert_eq!(shape.children[0].kind, ShapeKind::Triangles);
        assert_eq!(shape.children[0].vertices, 0..4);
        assert_eq!(shape.children[1].kind, ShapeKind::LineStrip);
        assert_eq!(shape.children[1].vertices, 4..9);
    }

    #[test]
    fn texture_change_splits_recorded_children() {
        let mut r = renderer(BufferPolicy::AccumulateAll);
        r.no_stroke();
        r.merge_shapes(true);
        let t = Texture::new(r.context_mut(), 2, 2, TextureParams::default()).unwrap();
        r.begin_record();
        quad(&mut r, 0.0);
        r.begin_shape(ShapeKind::Triangles);
        r.texture(&t);
        r.vertex_uv(0.0, 0.0, 0.0, 0.0);
        r.vertex_uv(1.0, 0.0, 1.0, 0.0);
        r.vertex_uv(0.0, 1.0, 0.0, 1.0);
        r.end_shape(EndMode::Open);
        let shape = r.end_record().unwrap();
        assert_eq!(shape.children.len(), 2);
        assert_eq!(shape.children[1].vertices, 4..7);
        assert_eq!(shape.children[1].indices, Some(6..9));
        assert_eq!(shape.texcoords[0][5], [1.0, 0.0]);
    }

    #[test]
    fn shape_recorder_returns_single_shape() {
        let mut r = renderer(BufferPolicy::Disabled);
        r.begin_shape_recorder(ShapeKind::Triangles);
        r.vertex(0.0, 0.0);
        r.vertex(1.0, 0.0);
        r.vertex(0.0, 1.0);
        let shape = r.end_shape_recorder(EndMode::Close).unwrap();
        assert_eq!(shape.children[0].vertices, 0..3);

        r.begin_shape_recorder(ShapeKind::Triangles);
        assert!(r.end_shape_recorder(EndMode::Close).is_none());
    }
}
