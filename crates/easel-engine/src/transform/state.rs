use crate::coords::{Mat4, Vec3, Viewport};
use crate::device::{EngineError, EngineResult, GraphicsApi, MatrixMode};

use super::{MatrixStack, TransformKind};

/// Saved modelview state: the matrix, its inverse and what it contains.
#[derive(Debug, Copy, Clone, PartialEq)]
struct Frame {
    matrix: Mat4,
    inverse: Mat4,
    kind: TransformKind,
}

/// Host-side matrix state of one renderer.
#[derive(Debug, Clone)]
pub struct Transforms {
    pub(super) viewport: Viewport,
    mode: MatrixMode,

    pub(super) modelview: Mat4,
    pub(super) modelview_inv: Mat4,
    pub(super) kind: TransformKind,
    saved: Vec<Frame>,
    pub(super) projection: MatrixStack,

    pub(super) camera: Mat4,
    pub(super) camera_inv: Mat4,
    pub(super) camera_kind: TransformKind,
    pub(super) manipulating_camera: bool,

    pub(super) camera_fov: f32,
    pub(super) camera_x: f32,
    pub(super) camera_y: f32,
    pub(super) camera_z: f32,
    pub(super) camera_near: f32,
    pub(super) camera_far: f32,
    pub(super) camera_aspect: f32,

    pub(super) modelview_dirty: bool,
    pub(super) projection_dirty: bool,
}

impl Transforms {
    pub fn new(width: f32, height: f32) -> Self {
        let mut t = Self {
            viewport: Viewport::default(),
            mode: MatrixMode::ModelView,
            modelview: Mat4::IDENTITY,
            modelview_inv: Mat4::IDENTITY,
            kind: TransformKind::RigidBody,
            saved: Vec::new(),
            projection: MatrixStack::new(),
            camera: Mat4::IDENTITY,
            camera_inv: Mat4::IDENTITY,
            camera_kind: TransformKind::RigidBody,
            manipulating_camera: false,
            camera_fov: 0.0,
            camera_x: 0.0,
            camera_y: 0.0,
            camera_z: 0.0,
            camera_near: 0.0,
            camera_far: 0.0,
            camera_aspect: 1.0,
            modelview_dirty: true,
            projection_dirty: true,
        };
        t.set_size(width, height);
        t
    }

    /// Recomputes the camera defaults for a new surface size.
    ///
    /// Matrices are left alone; `camera()` and `perspective()` pick the new
    /// defaults up.
    pub fn set_size(&mut self, width: f32, height: f32) {
        self.viewport = Viewport::new(width, height);
        self.camera_fov = std::f32::consts::PI / 3.0;
        self.camera_x = width / 2.0;
        self.camera_y = height / 2.0;
        self.camera_z = self.camera_y / (self.camera_fov / 2.0).tan();
        self.camera_near = self.camera_z / 10.0;
        self.camera_far = self.camera_z * 10.0;
        self.camera_aspect = self.viewport.aspect();
    }

    pub fn viewport(&self) -> Viewport {
        self.viewport
    }

    // ── getters ───────────────────────────────────────────────────────────

    pub fn matrix_mode(&self) -> MatrixMode {
        self.mode
    }

    pub fn set_matrix_mode(&mut self, mode: MatrixMode) {
        self.mode = mode;
    }

    pub fn modelview(&self) -> &Mat4 {
        &self.modelview
    }

    /// Inverse of the modelview; stale when the modelview went singular.
    pub fn modelview_inverse(&self) -> &Mat4 {
        &self.modelview_inv
    }

    pub fn projection(&self) -> &Mat4 {
        self.projection.current()
    }

    pub fn camera_matrix(&self) -> &Mat4 {
        &self.camera
    }

    pub fn camera_inverse(&self) -> &Mat4 {
        &self.camera_inv
    }

    pub fn kind(&self) -> TransformKind {
        self.kind
    }

    pub fn is_manipulating_camera(&self) -> bool {
        self.manipulating_camera
    }

    pub fn stack_depth(&self, mode: MatrixMode) -> usize {
        match mode {
            MatrixMode::ModelView => self.saved.len(),
            MatrixMode::Projection => self.projection.depth(),
        }
    }

    /// Loads whichever matrices changed since the last sync.
    pub fn sync<A: GraphicsApi + ?Sized>(&mut self, api: &mut A) {
        if self.projection_dirty {
            api.load_matrix(MatrixMode::Projection, self.projection.current());
            self.projection_dirty = false;
        }
        if self.modelview_dirty {
            api.load_matrix(MatrixMode::ModelView, &self.modelview);
            self.modelview_dirty = false;
        }
    }

    /// Forces the next [`sync`](Self::sync) to reload both matrices.
    pub fn invalidate(&mut self) {
        self.modelview_dirty = true;
        self.projection_dirty = true;
    }

    // ── stack ─────────────────────────────────────────────────────────────

    pub fn push_matrix(&mut self) {
        match self.mode {
            MatrixMode::ModelView => self.saved.push(Frame {
                matrix: self.modelview,
                inverse: self.modelview_inv,
                kind: self.kind,
            }),
            MatrixMode::Projection => self.projection.push(),
        }
    }

    /// Underflow is logged and leaves the current matrix unchanged.
    pub fn pop_matrix(&mut self) {
        match self.mode {
            MatrixMode::ModelView => match self.saved.pop() {
                Some(frame) => {
                    self.modelview = frame.matrix;
                    self.modelview_inv = frame.inverse;
                    self.kind = frame.kind;
                    self.modelview_dirty = true;
                }
                None => log::warn!("pop_matrix: empty modelview stack"),
            },
            MatrixMode::Projection => {
                if self.projection.pop() {
                    self.projection_dirty = true;
                } else {
                    log::warn!("pop_matrix: empty projection stack");
                }
            }
        }
    }

    // ── transforms ────────────────────────────────────────────────────────

    pub fn translate(&mut self, tx: f32, ty: f32, tz: f32) {
        self.transform(TransformKind::RigidBody, |m| m.translate(tx, ty, tz));
    }

    /// `angle` in radians around `axis`.
    pub fn rotate(&mut self, angle: f32, axis: Vec3) {
        self.transform(TransformKind::RigidBody, |m| m.rotate(angle, axis));
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
        self.transform(TransformKind::General, |m| m.scale(sx, sy, sz));
    }

    pub fn shear_x(&mut self, angle: f32) {
        let t = angle.tan();
        #[rustfmt::skip]
        let rows = [
            1.0, t,   0.0, 0.0,
            0.0, 1.0, 0.0, 0.0,
            0.0, 0.0, 1.0, 0.0,
            0.0, 0.0, 0.0, 1.0,
        ];
        self.apply_matrix(rows);
    }

    pub fn shear_y(&mut self, angle: f32) {
        let t = angle.tan();
        #[rustfmt::skip]
        let rows = [
            1.0, 0.0, 0.0, 0.0,
            t,   1.0, 0.0, 0.0,
            0.0, 0.0, 1.0, 0.0,
            0.0, 0.0, 0.0, 1.0,
        ];
        self.apply_matrix(rows);
    }

    /// Post-multiplies by a matrix given row by row.
    pub fn apply_matrix(&mut self, rows: [f32; 16]) {
        let m = Mat4::from_cols_array(rows).transpose();
        self.transform(TransformKind::General, |cur| cur.apply(&m));
    }

    /// Identity in the current mode.
    pub fn reset_matrix(&mut self) {
        match self.mode {
            MatrixMode::ModelView => {
                self.modelview = Mat4::IDENTITY;
                self.modelview_inv = Mat4::IDENTITY;
                self.kind = TransformKind::RigidBody;
                self.modelview_dirty = true;
            }
            MatrixMode::Projection => {
                self.projection.reset();
                self.projection_dirty = true;
            }
        }
    }

    /// Replaces the modelview, e.g. with the camera at frame start.
    pub fn load_modelview(&mut self, m: Mat4, inverse: Mat4, kind: TransformKind) {
        self.modelview = m;
        self.modelview_inv = inverse;
        self.kind = kind;
        self.modelview_dirty = true;
    }

    fn transform(&mut self, op_kind: TransformKind, op: impl FnOnce(&mut Mat4)) {
        match self.mode {
            MatrixMode::ModelView => {
                op(&mut self.modelview);
                self.kind = self.kind.then(op_kind);
                self.update_inverse();
                self.modelview_dirty = true;
            }
            MatrixMode::Projection => {
                let mut m = *self.projection.current();
                op(&mut m);
                self.projection.set(m);
                self.projection_dirty = true;
            }
        }
    }

    /// Recomputes the modelview inverse with the routine `kind` allows.
    /// A singular modelview keeps the previous inverse.
    pub(super) fn update_inverse(&mut self) {
        match self.kind {
            TransformKind::RigidBody => self.modelview_inv = self.modelview.rigid_inverse(),
            TransformKind::General => match self.modelview.inverse() {
                Some(inv) => self.modelview_inv = inv,
                None => log::debug!("singular modelview; keeping previous inverse"),
            },
        }
    }

    // ── camera block ──────────────────────────────────────────────────────

    /// Starts moving the camera with ordinary transform calls.
    pub fn begin_camera(&mut self) -> EngineResult<()> {
        if self.manipulating_camera {
            return Err(EngineError::CameraAlreadyActive);
        }
        self.manipulating_camera = true;
        Ok(())
    }

    /// Makes the current modelview the new camera.
    pub fn end_camera(&mut self) -> EngineResult<()> {
        if !self.manipulating_camera {
            return Err(EngineError::CameraNotActive);
        }
        self.update_inverse();
        self.camera = self.modelview;
        self.camera_inv = self.modelview_inv;
        self.camera_kind = self.kind;
        self.manipulating_camera = false;
        Ok(())
    }

    /// Reloads the camera into the modelview from inside a camera block.
    pub fn update_camera(&mut self) -> EngineResult<()> {
        if !self.manipulating_camera {
            return Err(EngineError::CameraNotActive);
        }
        self.load_modelview(self.camera, self.camera_inv, self.camera_kind);
        Ok(())
    }
}
