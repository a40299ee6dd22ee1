use crate::coords::{Mat4, Vec3};
use crate::device::{DeviceCapabilities, DrawBatch, GraphicsApi, MatrixMode, Primitive};
use crate::shape::{Face, TextureSet, Vertex, push_doubling};
use crate::texture::MAX_TEXTURES;
use crate::transform::MatrixStack;

use super::{Blending, Recorder};

/// When accumulated fill geometry is submitted.
#[derive(Debug, Copy, Clone, Default, Eq, PartialEq)]
pub enum BufferPolicy {
    /// No buffer: faces are drawn as soon as they are generated.
    #[default]
    Disabled,
    /// Each face goes through the buffer and is submitted on its own.
    PerShape,
    /// Faces accumulate across shapes until the texture set changes, the
    /// vertex cap is exceeded or the frame ends.
    AccumulateAll,
}

/// Where a flush sends the buffered geometry.
pub enum FlushTarget<'a, A: GraphicsApi + ?Sized> {
    Render {
        api: &'a mut A,
        caps: DeviceCapabilities,
        blending: &'a mut Blending,
        /// `(camera, modelview)`: draw under the camera, then restore the
        /// modelview. `None` draws under whatever is loaded.
        frame: Option<(Mat4, Mat4)>,
    },
    Record(&'a mut Recorder),
}

/// Indexed triangle storage that merges faces into few large draws.
///
/// Vertices are stored already transformed by the buffer's own matrix stack,
/// which in [`BufferPolicy::AccumulateAll`] mirrors the sketch's transforms
/// relative to the camera.
#[derive(Debug)]
pub struct GeometryBuffer {
    policy: BufferPolicy,
    max_vertices: usize,

    positions: Vec<[f32; 3]>,
    normals: Vec<[f32; 3]>,
    colors: Vec<[f32; 4]>,
    texcoords: [Vec<[f32; 2]>; MAX_TEXTURES],
    indices: Vec<u32>,
    textures: TextureSet,
    stack: MatrixStack,

    flushes: usize,
}

impl GeometryBuffer {
    /// `max_vertices == 0` means no cap.
    pub fn new(policy: BufferPolicy, max_vertices: usize) -> Self {
        Self {
            policy,
            max_vertices,
            positions: Vec::new(),
            normals: Vec::new(),
            colors: Vec::new(),
            texcoords: Default::default(),
            indices: Vec::new(),
            textures: TextureSet::NONE,
            stack: MatrixStack::new(),
            flushes: 0,
        }
    }

    pub fn policy(&self) -> BufferPolicy {
        self.policy
    }

    pub fn is_enabled(&self) -> bool {
        self.policy != BufferPolicy::Disabled
    }

    /// Frame start: empties the buffer, unbinds textures, resets the local
    /// matrix stack and the flush counter.
    pub fn init(&mut self) {
        self.reset(TextureSet::NONE);
        self.stack.clear();
        self.flushes = 0;
    }

    /// Empties the buffer and binds `textures`. The matrix stack is kept.
    pub fn reset(&mut self, textures: TextureSet) {
        self.positions.clear();
        self.normals.clear();
        self.colors.clear();
        for t in &mut self.texcoords {
            t.clear();
        }
        self.indices.clear();
        self.textures = textures;
    }

    pub fn textures(&self) -> &TextureSet {
        &self.textures
    }

    pub fn vert_count(&self) -> usize {
        self.positions.len()
    }

    pub fn idx_count(&self) -> usize {
        self.indices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    /// Flushes caused by a texture change, the vertex cap or per-shape
    /// submission since the last [`GeometryBuffer::init`].
    pub fn flush_count(&self) -> usize {
        self.flushes
    }

    pub fn stack(&self) -> &MatrixStack {
        &self.stack
    }

    pub fn stack_mut(&mut self) -> &mut MatrixStack {
        &mut self.stack
    }

    /// Appends the triangles of one face. Only vertices in
    /// `min_index..=max_index` are copied; indices are rebased onto the
    /// buffer.
    pub fn add(&mut self, triangles: &[[usize; 3]], vertices: &[Vertex], min_index: usize, max_index: usize) {
        let base = self.positions.len();
        for tri in triangles {
            for &i in tri {
                push_doubling(&mut self.indices, (base + i - min_index) as u32);
            }
        }

        let m = *self.stack.current();
        for v in &vertices[min_index..=max_index] {
            let p = m.transform_point(Vec3::from(v.position));
            let n = m.transform_vector(Vec3::from(v.normal));
            push_doubling(&mut self.positions, p.to_array());
            push_doubling(&mut self.normals, n.to_array());
            push_doubling(&mut self.colors, v.fill);
            for (unit, coords) in self.texcoords.iter_mut().enumerate() {
                let tc = match self.textures.get(unit) {
                    Some(b) => b.tex_coord(v.uv[unit][0], v.uv[unit][1]),
                    None => [0.0, 0.0],
                };
                push_doubling(coords, tc);
            }
        }
    }

    /// Routes one face through the buffer, flushing according to the policy.
    pub fn push_face<A: GraphicsApi + ?Sized>(
        &mut self,
        face: &Face,
        triangles: &[[usize; 3]],
        vertices: &[Vertex],
        target: &mut FlushTarget<'_, A>,
    ) {
        let tris = &triangles[face.offset..face.offset + face.length];

        if self.textures != face.textures {
            if self.policy == BufferPolicy::AccumulateAll && !self.is_empty() {
                log::trace!("geometry flush: texture change after {} vertices", self.vert_count());
                self.flush(target);
                self.flushes += 1;
            }
            self.reset(face.textures);
        }

        self.add(tris, vertices, face.min_index, face.max_index);

        match self.policy {
            BufferPolicy::AccumulateAll => {
                if 0 < self.max_vertices && self.max_vertices < self.vert_count() {
                    log::trace!("geometry flush: {} vertices over cap", self.vert_count());
                    self.flush(target);
                    self.flushes += 1;
                    self.reset(face.textures);
                }
            }
            BufferPolicy::PerShape | BufferPolicy::Disabled => {
                self.flush(target);
                self.flushes += 1;
                self.reset(TextureSet::NONE);
            }
        }
    }

    /// Submits pending geometry without counting it as a flush, leaving the
    /// buffer empty.
    pub fn finish<A: GraphicsApi + ?Sized>(&mut self, target: &mut FlushTarget<'_, A>) {
        if !self.is_empty() {
            self.flush(target);
            self.reset(TextureSet::NONE);
        }
    }

    fn flush<A: GraphicsApi + ?Sized>(&self, target: &mut FlushTarget<'_, A>) {
        match target {
            FlushTarget::Render { api, caps, blending, frame } => {
                self.render(&mut **api, caps, blending, *frame)
            }
            FlushTarget::Record(rec) => self.record(rec),
        }
    }

    /// Draws the buffer as one indexed triangle batch.
    pub fn render<A: GraphicsApi + ?Sized>(
        &self,
        api: &mut A,
        caps: &DeviceCapabilities,
        blending: &mut Blending,
        frame: Option<(Mat4, Mat4)>,
    ) {
        if self.is_empty() {
            return;
        }
        if let Some((camera, _)) = frame {
            api.load_matrix(MatrixMode::ModelView, &camera);
        }

        let count = self.textures.len();
        let ids = self.textures.ids();
        let combined = count > 1 && blending.setup_combiner(api, caps, count);

        let mut batch = DrawBatch::new(Primitive::Triangles, &self.positions, &self.colors);
        batch.normals = Some(&self.normals);
        for unit in 0..count.min(MAX_TEXTURES) {
            batch.texcoords[unit] = Some(&self.texcoords[unit]);
        }
        batch.textures = &ids;
        batch.indices = Some(&self.indices);
        api.draw(&batch);

        if combined {
            blending.cleanup_combiner(api, caps, count);
        }
        if let Some((_, modelview)) = frame {
            api.load_matrix(MatrixMode::ModelView, &modelview);
        }
    }

    /// Appends the buffer to a recording.
    pub fn record(&self, rec: &mut Recorder) {
        let texcoords: [&[[f32; 2]]; MAX_TEXTURES] = std::array::from_fn(|unit| self.texcoords[unit].as_slice());
        rec.append_indexed(&self.positions, &self.colors, &self.normals, texcoords, &self.indices);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::{Call, HeadlessApi};
    use crate::texture::TextureBinding;

    fn set(id: u32) -> TextureSet {
        TextureSet::single(TextureBinding {
            id,
            width: 4,
            height: 4,
            max_u: 0.5,
            max_v: 1.0,
            flip_x: false,
            flip_y: false,
        })
    }

    fn quad(textures: TextureSet, x: f32) -> Vec<Vertex> {
        [(0.0, 0.0), (1.0, 0.0), (1.0, 1.0), (0.0, 1.0)]
            .iter()
            .map(|&(dx, dy)| {
                let mut v = Vertex::at(x + dx, dy, 0.0);
                v.fill = [1.0, 0.0, 0.0, 1.0];
                v.uv[0] = [dx, dy];
                v.textures = textures;
                v
            })
            .collect()
    }

    const QUAD_TRIS: [[usize; 3]; 2] = [[0, 1, 2], [0, 2, 3]];

    fn face(textures: TextureSet) -> Face {
        Face { offset: 0, length: 2, min_index: 0, max_index: 3, textures }
    }

    fn draws(api: &HeadlessApi) -> usize {
        api.calls().iter().filter(|c| matches!(c, Call::Draw(_))).count()
    }

    fn push(buf: &mut GeometryBuffer, api: &mut HeadlessApi, blending: &mut Blending, textures: TextureSet) {
        let verts = quad(textures, 0.0);
        let mut target = FlushTarget::Render {
            api,
            caps: DeviceCapabilities::full(),
            blending,
            frame: None,
        };
        buf.push_face(&face(textures), &QUAD_TRIS, &verts, &mut target);
    }

    // ── flush policy ──────────────────────────────────────────────────────

    #[test]
    fn accumulate_all_flushes_once_on_texture_change() {
        let mut api = HeadlessApi::new(8, 8);
        let mut blending = Blending::new();
        let mut buf = GeometryBuffer::new(BufferPolicy::AccumulateAll, 0);
        buf.init();

        push(&mut buf, &mut api, &mut blending, set(1));
        assert_eq!(buf.flush_count(), 0);
        push(&mut buf, &mut api, &mut blending, set(2));
        assert_eq!(buf.flush_count(), 1);
        assert_eq!(draws(&api), 1);
        assert_eq!(buf.textures(), &set(2));
        assert_eq!(buf.vert_count(), 4);
    }

    #[test]
    fn accumulate_all_merges_same_textures() {
        let mut api = HeadlessApi::new(8, 8);
        let mut blending = Blending::new();
        let mut buf = GeometryBuffer::new(BufferPolicy::AccumulateAll, 0);
        buf.init();
        for _ in 0..3 {
            push(&mut buf, &mut api, &mut blending, set(1));
        }
        assert_eq!(buf.flush_count(), 0);
        assert_eq!(buf.vert_count(), 12);
        assert_eq!(&buf.indices[6..12], &[4, 5, 6, 4, 6, 7]);
    }

    #[test]
    fn vertex_cap_forces_flush() {
        let mut api = HeadlessApi::new(8, 8);
        let mut blending = Blending::new();
        let mut buf = GeometryBuffer::new(BufferPolicy::AccumulateAll, 6);
        buf.init();
        push(&mut buf, &mut api, &mut blending, TextureSet::NONE);
        assert_eq!(buf.flush_count(), 0);
        push(&mut buf, &mut api, &mut blending, TextureSet::NONE);
        assert_eq!(buf.flush_count(), 1);
        assert!(buf.is_empty());
    }

    #[test]
    fn per_shape_submits_every_face() {
        let mut api = HeadlessApi::new(8, 8);
        let mut blending = Blending::new();
        let mut buf = GeometryBuffer::new(BufferPolicy::PerShape, 0);
        buf.init();
        push(&mut buf, &mut api, &mut blending, set(1));
        push(&mut buf, &mut api, &mut blending, set(1));
        assert_eq!(buf.flush_count(), 2);
        assert_eq!(draws(&api), 2);
        assert!(buf.is_empty());
    }

    #[test]
    fn finish_is_not_counted() {
        let mut api = HeadlessApi::new(8, 8);
        let mut blending = Blending::new();
        let mut buf = GeometryBuffer::new(BufferPolicy::AccumulateAll, 0);
        buf.init();
        push(&mut buf, &mut api, &mut blending, set(1));
        let mut target = FlushTarget::Render {
            api: &mut api,
            caps: DeviceCapabilities::full(),
            blending: &mut blending,
            frame: None,
        };
        buf.finish(&mut target);
        assert_eq!(buf.flush_count(), 0);
        assert!(buf.is_empty());
        assert_eq!(draws(&api), 1);
    }

    // ── contents ──────────────────────────────────────────────────────────

    #[test]
    fn add_applies_local_matrix_and_texcoord_scale() {
        let mut buf = GeometryBuffer::new(BufferPolicy::AccumulateAll, 0);
        buf.init();
        buf.reset(set(1));
        buf.stack_mut().translate(10.0, 0.0, 0.0);
        buf.add(&QUAD_TRIS, &quad(set(1), 0.0), 0, 3);
        assert_eq!(buf.positions[1], [11.0, 0.0, 0.0]);
        assert_eq!(buf.texcoords[0][1], [0.5, 0.0]);
        assert_eq!(buf.texcoords[1][1], [0.0, 0.0]);
    }

    #[test]
    fn add_rebases_indices_on_min_index() {
        let mut buf = GeometryBuffer::new(BufferPolicy::PerShape, 0);
        let mut verts = quad(TextureSet::NONE, 0.0);
        verts.extend(quad(TextureSet::NONE, 5.0));
        buf.add(&[[4, 5, 6], [4, 6, 7]], &verts, 4, 7);
        assert_eq!(buf.indices, vec![0, 1, 2, 0, 2, 3]);
        assert_eq!(buf.positions[0], [5.0, 0.0, 0.0]);
    }

    #[test]
    fn init_resets_stack_but_reset_keeps_it() {
        let mut buf = GeometryBuffer::new(BufferPolicy::AccumulateAll, 0);
        buf.stack_mut().scale(2.0, 2.0, 2.0);
        buf.reset(TextureSet::NONE);
        assert_ne!(*buf.stack().current(), Mat4::IDENTITY);
        buf.init();
        assert_eq!(*buf.stack().current(), Mat4::IDENTITY);
    }

    #[test]
    fn render_draws_under_camera_and_restores() {
        let mut api = HeadlessApi::new(8, 8);
        let mut blending = Blending::new();
        let mut buf = GeometryBuffer::new(BufferPolicy::AccumulateAll, 0);
        buf.init();
        buf.add(&QUAD_TRIS, &quad(TextureSet::NONE, 0.0), 0, 3);

        let camera = Mat4::translation(0.0, 0.0, -5.0);
        let modelview = Mat4::translation(1.0, 2.0, -5.0);
        buf.render(&mut api, &DeviceCapabilities::full(), &mut blending, Some((camera, modelview)));

        let calls = api.calls();
        assert_eq!(calls[0], Call::LoadMatrix(MatrixMode::ModelView, camera));
        assert!(matches!(&calls[1], Call::Draw(d) if d.element_count() == 6));
        assert_eq!(calls[2], Call::LoadMatrix(MatrixMode::ModelView, modelview));
    }
}
