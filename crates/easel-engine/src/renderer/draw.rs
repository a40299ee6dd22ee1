use crate::batch::{BlendMode, BufferPolicy, FlushTarget};
use crate::device::{DrawBatch, GraphicsApi, Primitive};
use crate::paint::Color;
use crate::shape::{EndMode, ShapeKind, TextureMode, TextureSet};
use crate::texture::{MAX_TEXTURES, Texture, TextureBinding};

use super::Renderer;

impl<A: GraphicsApi> Renderer<A> {
    // ── style ─────────────────────────────────────────────────────────────

    pub fn fill(&mut self, color: Color) {
        self.shapes.fill(color);
    }

    pub fn no_fill(&mut self) {
        self.shapes.no_fill();
    }

    pub fn stroke(&mut self, color: Color) {
        self.shapes.stroke(color);
    }

    pub fn no_stroke(&mut self) {
        self.shapes.no_stroke();
    }

    pub fn stroke_weight(&mut self, weight: f32) {
        self.shapes.stroke_weight(weight);
    }

    pub fn tint(&mut self, color: Color) {
        self.shapes.tint(color);
    }

    pub fn no_tint(&mut self) {
        self.shapes.no_tint();
    }

    pub fn normal(&mut self, nx: f32, ny: f32, nz: f32) {
        self.shapes.normal(nx, ny, nz);
    }

    pub fn auto_normal(&mut self, on: bool) {
        self.shapes.set_auto_normal(on);
    }

    pub fn texture_mode(&mut self, mode: TextureMode) {
        self.shapes.texture_mode(mode);
    }

    /// Binds `texture` for the following vertices. A texture without a
    /// device object is ignored with a warning.
    pub fn texture(&mut self, texture: &Texture) {
        match texture.binding() {
            Some(binding) => self.shapes.texture(binding),
            None => log::warn!("texture(): texture has no device object"),
        }
    }

    /// Binds one texture per unit; extra textures are dropped.
    pub fn textures(&mut self, bindings: &[TextureBinding]) {
        self.shapes.textures(bindings);
    }

    pub fn no_texture(&mut self) {
        self.shapes.no_texture();
    }

    /// Screen blend mode, applied immediately.
    pub fn blend_mode(&mut self, mode: BlendMode) {
        let caps = *self.ctx.caps();
        self.blending.set_screen_blend(self.ctx.api_mut(), &caps, mode);
    }

    /// Mode used when a face carries more than one texture.
    pub fn texture_blend(&mut self, mode: BlendMode) {
        self.blending.set_texture_blend(mode);
    }

    /// Keeps shapes until `end_draw` instead of drawing each at `end_shape`.
    pub fn set_depth_sort(&mut self, on: bool) {
        if self.shapes.depth_sort() && !on && self.drawing {
            self.render_shape();
        }
        self.shapes.set_depth_sort(on);
    }

    // ── shapes ────────────────────────────────────────────────────────────

    pub fn begin_shape(&mut self, kind: ShapeKind) {
        self.shapes.begin_shape(kind);
    }

    pub fn vertex(&mut self, x: f32, y: f32) {
        self.shapes.vertex(x, y);
    }

    pub fn vertex3(&mut self, x: f32, y: f32, z: f32) {
        self.shapes.vertex3(x, y, z);
    }

    pub fn vertex_uv(&mut self, x: f32, y: f32, u: f32, v: f32) {
        self.shapes.vertex_uv(x, y, u, v);
    }

    pub fn vertex3_uv(&mut self, x: f32, y: f32, z: f32, u: f32, v: f32) {
        self.shapes.vertex3_uv(x, y, z, u, v);
    }

    /// `(x, y, u0, v0, ...)` for an even count, `(x, y, z, u0, v0, ...)`
    /// for an odd one.
    pub fn vertex_slice(&mut self, values: &[f32]) {
        self.shapes.vertex_slice(values);
    }

    /// Tessellates the shape and, unless depth sorting defers it, draws (or
    /// records) its triangles, points and lines in that order.
    pub fn end_shape(&mut self, mode: EndMode) {
        if !self.shapes.end_shape(mode) {
            return;
        }
        if !self.shapes.depth_sort() {
            self.render_shape();
        }
    }

    pub(super) fn render_shape(&mut self) {
        if self.shapes.tessellation().is_empty() {
            return;
        }
        if self.recorder.is_none() {
            self.transforms.sync(self.ctx.api_mut());
            self.ctx.api_mut().material(&self.material);
        }
        self.render_triangles();
        self.render_points();
        self.render_lines();
        self.shapes.clear();
    }

    // ── triangles ─────────────────────────────────────────────────────────

    fn render_triangles(&mut self) {
        if self.shapes.tessellation().faces().is_empty() {
            return;
        }
        if self.geometry.is_enabled() {
            self.buffer_faces();
        } else {
            self.draw_faces();
        }
    }

    /// Routes every face through the geometry buffer.
    fn buffer_faces(&mut self) {
        let caps = *self.ctx.caps();
        let frame = self.buffer_frame();
        let tess = self.shapes.tessellation();

        for face in tess.faces().as_slice() {
            match self.recorder.as_mut() {
                Some(rec) => {
                    let i0 = rec.index_count() + self.geometry.idx_count();
                    let n0 = rec.vertex_count() + self.geometry.vert_count();
                    rec.add_child(
                        ShapeKind::Triangles,
                        n0..n0 + face.max_index - face.min_index + 1,
                        Some(i0..i0 + 3 * face.length),
                        0.0,
                        face.textures,
                    );
                    self.geometry.push_face::<A>(
                        face,
                        tess.triangles(),
                        tess.vertices(),
                        &mut FlushTarget::Record(rec),
                    );
                }
                None => {
                    let mut target = FlushTarget::Render {
                        api: self.ctx.api_mut(),
                        caps,
                        blending: &mut self.blending,
                        frame,
                    };
                    self.geometry.push_face(face, tess.triangles(), tess.vertices(), &mut target);
                }
            }
        }
    }

    /// Expands each face into flat arrays and draws or records it directly.
    fn draw_faces(&mut self) {
        let caps = *self.ctx.caps();
        let tess = self.shapes.tessellation();
        let vertices = tess.vertices();

        for face in tess.faces().as_slice() {
            let tris = &tess.triangles()[face.offset..face.offset + face.length];
            let n = tris.len() * 3;
            let mut positions = Vec::with_capacity(n);
            let mut colors = Vec::with_capacity(n);
            let mut normals = Vec::with_capacity(n);
            let mut texcoords: [Vec<[f32; 2]>; MAX_TEXTURES] = Default::default();

            for &i in tris.iter().flatten() {
                let v = &vertices[i];
                positions.push(v.position);
                colors.push(v.fill);
                normals.push(v.normal);
                for (unit, coords) in texcoords.iter_mut().enumerate() {
                    let tc = match face.textures.get(unit) {
                        Some(b) => b.tex_coord(v.uv[unit][0], v.uv[unit][1]),
                        None => [0.0, 0.0],
                    };
                    coords.push(tc);
                }
            }

            if let Some(rec) = self.recorder.as_mut() {
                let n0 = rec.vertex_count();
                for k in 0..n {
                    rec.push_vertex(positions[k], colors[k], normals[k], std::array::from_fn(|u| texcoords[u][k]));
                }
                rec.add_child(ShapeKind::Triangles, n0..n0 + n, None, 0.0, face.textures);
                continue;
            }

            let api = self.ctx.api_mut();
            let count = face.textures.len();
            let combined = count > 1 && self.blending.setup_combiner(api, &caps, count);

            let ids = face.textures.ids();
            let mut batch = DrawBatch::new(Primitive::Triangles, &positions, &colors);
            batch.normals = Some(&normals);
            for unit in 0..count.min(MAX_TEXTURES) {
                batch.texcoords[unit] = Some(&texcoords[unit]);
            }
            batch.textures = &ids;
            api.draw(&batch);

            if combined {
                self.blending.cleanup_combiner(api, &caps, count);
            }
        }
    }

    // ── points and lines ──────────────────────────────────────────────────

    /// Before geometry is recorded directly, pending buffered faces are
    /// recorded so recorded ranges stay in submission order.
    fn record_pending(&mut self) {
        if let Some(rec) = self.recorder.as_mut() {
            self.geometry.finish::<A>(&mut FlushTarget::Record(rec));
        }
    }

    fn render_points(&mut self) {
        let tess = self.shapes.tessellation();
        let Some(&first) = tess.points().first() else { return };
        let size = tess.vertices()[first].stroke_weight;
        if size <= 0.0 {
            return;
        }

        let vertices = tess.vertices();
        let positions: Vec<[f32; 3]> = tess.points().iter().map(|&i| vertices[i].position).collect();
        let colors: Vec<[f32; 4]> = tess.points().iter().map(|&i| vertices[i].stroke).collect();

        if self.recorder.is_some() {
            self.record_pending();
            if let Some(rec) = self.recorder.as_mut() {
                let n0 = rec.vertex_count();
                for (p, c) in positions.iter().zip(&colors) {
                    rec.push_vertex(*p, *c, [0.0; 3], [[0.0; 2]; MAX_TEXTURES]);
                }
                rec.add_child(ShapeKind::Points, n0..n0 + positions.len(), None, size, TextureSet::NONE);
            }
            return;
        }

        let mut batch = DrawBatch::new(Primitive::Points, &positions, &colors);
        batch.size = size;
        self.ctx.api_mut().draw(&batch);
    }

    /// Each path is one line strip: the first line's start, then every
    /// line's end.
    fn render_lines(&mut self) {
        let strips: Vec<(Vec<[f32; 3]>, Vec<[f32; 4]>, f32)> = {
            let tess = self.shapes.tessellation();
            let (vertices, lines) = (tess.vertices(), tess.lines());
            tess.paths()
                .iter()
                .filter(|path| path.length > 0)
                .filter_map(|path| {
                    let run = &lines[path.offset..path.offset + path.length];
                    let start = &vertices[run[0][0]];
                    if start.stroke_weight <= 0.0 {
                        return None;
                    }
                    let ends = run.iter().map(|l| &vertices[l[1]]);
                    let strip: Vec<_> = std::iter::once(start).chain(ends).collect();
                    Some((
                        strip.iter().map(|v| v.position).collect(),
                        strip.iter().map(|v| v.stroke).collect(),
                        start.stroke_weight,
                    ))
                })
                .collect()
        };
        if strips.is_empty() {
            return;
        }

        if self.recorder.is_some() {
            self.record_pending();
        }
        for (positions, colors, weight) in &strips {
            if let Some(rec) = self.recorder.as_mut() {
                let n0 = rec.vertex_count();
                for (p, c) in positions.iter().zip(colors) {
                    rec.push_vertex(*p, *c, [0.0; 3], [[0.0; 2]; MAX_TEXTURES]);
                }
                rec.add_child(ShapeKind::LineStrip, n0..n0 + positions.len(), None, *weight, TextureSet::NONE);
                continue;
            }
            let mut batch = DrawBatch::new(Primitive::LineStrip, positions, colors);
            batch.size = *weight;
            self.ctx.api_mut().draw(&batch);
        }
    }

    /// Accumulated geometry policy of this renderer.
    pub fn buffer_policy(&self) -> BufferPolicy {
        self.geometry.policy()
    }
}

#[cfg(test)]
mod tests {
    use crate::batch::{BlendMode, BufferPolicy};
    use crate::device::{Call, DrawRecord, HeadlessApi, Primitive, TexEnv};
    use crate::paint::Color;
    use crate::renderer::{Renderer, RendererInit};
    use crate::shape::{EndMode, ShapeKind};
    use crate::texture::{Texture, TextureParams};

    fn renderer(init: RendererInit) -> Renderer<HeadlessApi> {
        let mut r = Renderer::new(HeadlessApi::new(init.width, init.height), init).unwrap();
        r.begin_draw().unwrap();
        r
    }

    fn draws(r: &Renderer<HeadlessApi>) -> Vec<DrawRecord> {
        r.api().draws().cloned().collect()
    }

    fn square(r: &mut Renderer<HeadlessApi>, x: f32) {
        r.begin_shape(ShapeKind::Quads);
        r.vertex(x, 0.0);
        r.vertex(x + 10.0, 0.0);
        r.vertex(x + 10.0, 10.0);
        r.vertex(x, 10.0);
        r.end_shape(EndMode::Open);
    }

    fn textured_square(r: &mut Renderer<HeadlessApi>, tex: &Texture, x: f32) {
        r.begin_shape(ShapeKind::Quads);
        r.texture(tex);
        r.vertex_uv(x, 0.0, 0.0, 0.0);
        r.vertex_uv(x + 10.0, 0.0, 1.0, 0.0);
        r.vertex_uv(x + 10.0, 10.0, 1.0, 1.0);
        r.vertex_uv(x, 10.0, 0.0, 1.0);
        r.end_shape(EndMode::Open);
    }

    fn texture(r: &mut Renderer<HeadlessApi>) -> Texture {
        Texture::new(r.context_mut(), 4, 4, TextureParams::default()).unwrap()
    }

    // ── direct drawing ────────────────────────────────────────────────────

    #[test]
    fn triangles_then_lines_in_order() {
        let mut r = renderer(RendererInit::new(50, 50));
        r.stroke_weight(2.0);
        square(&mut r, 0.0);
        let d = draws(&r);
        assert_eq!(d.len(), 2);
        assert_eq!(d[0].primitive, Primitive::Triangles);
        assert_eq!(d[0].positions.len(), 6);
        assert!(d[0].indices.is_none());
        assert_eq!(d[1].primitive, Primitive::LineStrip);
        assert_eq!(d[1].positions.len(), 5);
        assert_eq!(d[1].size, 2.0);
    }

    #[test]
    fn single_triangle_draws_vertices_in_order() {
        let mut r = renderer(RendererInit::new(50, 50));
        r.no_stroke();
        r.fill(Color::rgb(1.0, 0.0, 0.0));
        r.begin_shape(ShapeKind::Triangles);
        r.vertex(0.0, 0.0);
        r.vertex(10.0, 0.0);
        r.vertex(0.0, 10.0);
        r.end_shape(EndMode::Open);
        let d = draws(&r);
        assert_eq!(d.len(), 1);
        assert_eq!(d[0].positions, vec![[0.0, 0.0, 0.0], [10.0, 0.0, 0.0], [0.0, 10.0, 0.0]]);
        assert_eq!(d[0].colors[0], [1.0, 0.0, 0.0, 1.0]);
    }

    #[test]
    fn zero_weight_strokes_are_skipped() {
        let mut r = renderer(RendererInit::new(50, 50));
        r.no_fill();
        r.stroke_weight(0.0);
        square(&mut r, 0.0);
        assert!(draws(&r).is_empty());
    }

    #[test]
    fn points_use_stroke_color_and_weight() {
        let mut r = renderer(RendererInit::new(50, 50));
        r.stroke(Color::rgb(0.0, 1.0, 0.0));
        r.stroke_weight(3.0);
        r.begin_shape(ShapeKind::Points);
        r.vertex(1.0, 1.0);
        r.vertex(2.0, 2.0);
        r.end_shape(EndMode::Open);
        let d = draws(&r);
        assert_eq!(d.len(), 1);
        assert_eq!(d[0].primitive, Primitive::Points);
        assert_eq!(d[0].size, 3.0);
        assert_eq!(d[0].colors[1], [0.0, 1.0, 0.0, 1.0]);
    }

    #[test]
    fn draws_are_preceded_by_material() {
        let mut r = renderer(RendererInit::new(50, 50));
        let before = r.api().calls().len();
        square(&mut r, 0.0);
        let calls = &r.api().calls()[before..];
        let material = calls.iter().position(|c| matches!(c, Call::Material(_))).unwrap();
        let draw = calls.iter().position(|c| matches!(c, Call::Draw(_))).unwrap();
        assert!(material < draw);
    }

    #[test]
    fn textured_face_scales_coordinates() {
        let mut r = renderer(RendererInit::new(50, 50));
        r.no_stroke();
        let tex = texture(&mut r);
        textured_square(&mut r, &tex, 0.0);
        let d = draws(&r);
        assert_eq!(d[0].textures, vec![tex.id().unwrap()]);
        let tc = d[0].texcoords[0].as_ref().unwrap();
        assert_eq!(tc[2], [1.0, 1.0]);
        assert!(d[0].texcoords[1].is_none());
    }

    #[test]
    fn two_textures_configure_and_restore_combiner() {
        let mut r = renderer(RendererInit::new(50, 50));
        r.no_stroke();
        r.texture_blend(BlendMode::Multiply);
        r.blend_mode(BlendMode::Add);
        let (a, b) = (texture(&mut r), texture(&mut r));
        r.begin_shape(ShapeKind::Triangles);
        r.textures(&[a.binding().unwrap(), b.binding().unwrap()]);
        r.vertex_uv(0.0, 0.0, 0.0, 0.0);
        r.vertex_uv(1.0, 0.0, 1.0, 0.0);
        r.vertex_uv(0.0, 1.0, 0.0, 1.0);
        r.end_shape(EndMode::Open);

        assert_eq!(draws(&r)[0].textures.len(), 2);
        assert_eq!(r.api().current_tex_env(0), Some(TexEnv::Modulate));
        assert_eq!(r.api().blend(), BlendMode::Add.screen_state());
        assert!(r.api().calls().iter().any(|c| matches!(c, Call::TexEnv(0, TexEnv::Combine { .. }))));
    }

    // ── depth sort ────────────────────────────────────────────────────────

    #[test]
    fn depth_sort_defers_to_end_draw() {
        let mut r = renderer(RendererInit::new(50, 50).with_depth_sort(true));
        r.no_stroke();
        square(&mut r, 0.0);
        square(&mut r, 20.0);
        assert!(draws(&r).is_empty());
        r.end_draw().unwrap();
        let d = draws(&r);
        assert_eq!(d.len(), 1);
        assert_eq!(d[0].primitive, Primitive::Triangles);
        assert_eq!(d[0].positions.len(), 12);
        assert_eq!(d[0].positions[6], [20.0, 0.0, 0.0]);
    }

    // ── geometry buffer ───────────────────────────────────────────────────

    #[test]
    fn accumulate_all_batches_until_end_draw() {
        let mut r = renderer(RendererInit::new(50, 50).with_policy(BufferPolicy::AccumulateAll, 0));
        r.no_stroke();
        square(&mut r, 0.0);
        square(&mut r, 20.0);
        assert!(draws(&r).is_empty());
        r.end_draw().unwrap();
        let d = draws(&r);
        assert_eq!(d.len(), 1);
        assert_eq!(d[0].indices.as_ref().unwrap().len(), 12);
        assert_eq!(r.geometry().flush_count(), 0);
    }

    #[test]
    fn accumulate_all_flushes_once_per_texture_change() {
        let mut r = renderer(RendererInit::new(50, 50).with_policy(BufferPolicy::AccumulateAll, 0));
        r.no_stroke();
        let (t1, t2) = (texture(&mut r), texture(&mut r));
        textured_square(&mut r, &t1, 0.0);
        textured_square(&mut r, &t2, 20.0);
        assert_eq!(r.geometry().flush_count(), 1);
        assert_eq!(draws(&r).len(), 1);
    }

    #[test]
    fn accumulate_all_mirrors_transforms_into_buffer() {
        let mut r = renderer(RendererInit::new(50, 50).with_policy(BufferPolicy::AccumulateAll, 0));
        r.no_stroke();
        r.push_matrix();
        r.translate(5.0, 0.0, 0.0);
        square(&mut r, 0.0);
        r.pop_matrix();
        square(&mut r, 0.0);
        r.end_draw().unwrap();
        let d = draws(&r);
        assert_eq!(d[0].positions[0], [5.0, 0.0, 0.0]);
        assert_eq!(d[0].positions[4], [0.0, 0.0, 0.0]);
    }

    #[test]
    fn per_shape_submits_indexed_batches() {
        let mut r = renderer(RendererInit::new(50, 50).with_policy(BufferPolicy::PerShape, 0));
        r.no_stroke();
        square(&mut r, 0.0);
        square(&mut r, 20.0);
        let d = draws(&r);
        assert_eq!(d.len(), 2);
        assert!(d.iter().all(|d| d.indices.is_some()));
        assert_eq!(r.geometry().flush_count(), 2);
    }
}
