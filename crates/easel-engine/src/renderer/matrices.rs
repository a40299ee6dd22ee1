use crate::batch::BufferPolicy;
use crate::coords::{Mat4, Vec3};
use crate::device::{EngineResult, GraphicsApi, MatrixMode};
use crate::transform::MatrixStack;

use super::Renderer;

impl<A: GraphicsApi> Renderer<A> {
    /// The geometry buffer's stack when it mirrors modelview transforms:
    /// accumulating across shapes, in modelview mode, outside a camera block.
    fn mirrored_stack(&mut self) -> Option<&mut MatrixStack> {
        let mirrors = self.geometry.policy() == BufferPolicy::AccumulateAll
            && self.transforms.matrix_mode() == MatrixMode::ModelView
            && !self.transforms.is_manipulating_camera();
        if mirrors { Some(self.geometry.stack_mut()) } else { None }
    }

    // ── stack ─────────────────────────────────────────────────────────────

    pub fn push_matrix(&mut self) {
        self.transforms.push_matrix();
        if let Some(stack) = self.mirrored_stack() {
            stack.push();
        }
    }

    pub fn pop_matrix(&mut self) {
        self.transforms.pop_matrix();
        if let Some(stack) = self.mirrored_stack() {
            stack.pop();
        }
    }

    pub fn matrix_mode(&mut self, mode: MatrixMode) {
        self.transforms.set_matrix_mode(mode);
    }

    // ── transforms ────────────────────────────────────────────────────────

    pub fn translate(&mut self, tx: f32, ty: f32, tz: f32) {
        self.transforms.translate(tx, ty, tz);
        if let Some(stack) = self.mirrored_stack() {
            stack.translate(tx, ty, tz);
        }
    }

    pub fn rotate(&mut self, angle: f32, axis: Vec3) {
        self.transforms.rotate(angle, axis);
        if let Some(stack) = self.mirrored_stack() {
            stack.rotate(angle, axis);
        }
    }

    pub fn rotate_x(&mut self, angle: f32) {
        self.rotate(angle, Vec3::new(1.0, 0.0, 0.0));
    }

    pub fn rotate_y(&mut self, angle: f32) {
        self.rotate(angle, Vec3::new(0.0, 1.0, 0.0));
    }

    pub fn rotate_z(&mut self, angle: f32) {
        self.rotate(angle, Vec3::new(0.0, 0.0, 1.0));
    }

    pub fn scale(&mut self, sx: f32, sy: f32, sz: f32) {
        self.transforms.scale(sx, sy, sz);
        if let Some(stack) = self.mirrored_stack() {
            stack.scale(sx, sy, sz);
        }
    }

    pub fn shear_x(&mut self, angle: f32) {
        self.transforms.shear_x(angle);
        if let Some(stack) = self.mirrored_stack() {
            let mut m = Mat4::IDENTITY;
            m.m[4] = angle.tan();
            stack.apply(&m);
        }
    }

    pub fn shear_y(&mut self, angle: f32) {
        self.transforms.shear_y(angle);
        if let Some(stack) = self.mirrored_stack() {
            let mut m = Mat4::IDENTITY;
            m.m[1] = angle.tan();
            stack.apply(&m);
        }
    }

    /// Post-multiplies the current matrix by `rows`, given row by row.
    pub fn apply_matrix(&mut self, rows: [f32; 16]) {
        self.transforms.apply_matrix(rows);
        if let Some(stack) = self.mirrored_stack() {
            stack.apply(&Mat4::from_cols_array(rows).transpose());
        }
    }

    /// A mirroring buffer is drawn under the camera; its local frame becomes
    /// the camera inverse so camera × local stays equal to the modelview.
    pub fn reset_matrix(&mut self) {
        self.transforms.reset_matrix();
        let camera_inv = *self.transforms.camera_inverse();
        if let Some(stack) = self.mirrored_stack() {
            stack.set(camera_inv);
        }
    }

    pub fn modelview(&self) -> &Mat4 {
        self.transforms.modelview()
    }

    pub fn projection(&self) -> &Mat4 {
        self.transforms.projection()
    }

    // ── camera ────────────────────────────────────────────────────────────

    pub fn begin_camera(&mut self) -> EngineResult<()> {
        self.transforms.begin_camera()
    }

    pub fn end_camera(&mut self) -> EngineResult<()> {
        if !self.transforms.is_manipulating_camera() {
            return self.transforms.end_camera();
        }
        self.flush_geometry();
        self.transforms.end_camera()?;
        self.reset_buffer_frame();
        Ok(())
    }

    pub fn update_camera(&mut self) -> EngineResult<()> {
        self.transforms.update_camera()
    }

    pub fn camera(&mut self) {
        self.flush_geometry();
        self.transforms.camera();
        self.reset_buffer_frame();
    }

    pub fn camera_look_at(&mut self, eye: Vec3, center: Vec3, up: Vec3) {
        self.flush_geometry();
        self.transforms.camera_look_at(eye, center, up);
        self.reset_buffer_frame();
    }

    /// The modelview now equals the camera, so buffered vertices start
    /// again from an identity local frame.
    fn reset_buffer_frame(&mut self) {
        if self.geometry.policy() == BufferPolicy::AccumulateAll {
            self.geometry.stack_mut().reset();
        }
    }

    // Buffered faces are drawn under the projection loaded at flush time,
    // so projection changes submit them first.

    pub fn perspective(&mut self) {
        self.flush_geometry();
        self.transforms.perspective();
    }

    pub fn perspective_with(&mut self, fov: f32, aspect: f32, near: f32, far: f32) {
        self.flush_geometry();
        self.transforms.perspective_with(fov, aspect, near, far);
    }

    pub fn frustum(&mut self, left: f32, right: f32, bottom: f32, top: f32, near: f32, far: f32) {
        self.flush_geometry();
        self.transforms.frustum(left, right, bottom, top, near, far);
    }

    pub fn ortho(&mut self) {
        self.flush_geometry();
        self.transforms.ortho();
    }

    pub fn ortho_with(&mut self, left: f32, right: f32, bottom: f32, top: f32, near: f32, far: f32) {
        self.flush_geometry();
        self.transforms.ortho_with(left, right, bottom, top, near, far);
    }

    // ── queries ───────────────────────────────────────────────────────────

    pub fn screen_x(&self, x: f32, y: f32, z: f32) -> f32 {
        self.transforms.screen_x(x, y, z)
    }

    pub fn screen_y(&self, x: f32, y: f32, z: f32) -> f32 {
        self.transforms.screen_y(x, y, z)
    }

    pub fn screen_z(&self, x: f32, y: f32, z: f32) -> f32 {
        self.transforms.screen_z(x, y, z)
    }

    pub fn model_x(&self, x: f32, y: f32, z: f32) -> f32 {
        self.transforms.model_x(x, y, z)
    }

    pub fn model_y(&self, x: f32, y: f32, z: f32) -> f32 {
        self.transforms.model_y(x, y, z)
    }

    pub fn model_z(&self, x: f32, y: f32, z: f32) -> f32 {
        self.transforms.model_z(x, y, z)
    }
}
