use crate::coords::{Mat4, Vec3};

use super::{TransformKind, Transforms};

impl Transforms {
    /// Default camera: looking down -Z at the centre of the surface, far
    /// enough that the surface fills a `PI / 3` field of view.
    pub fn camera(&mut self) {
        let (cx, cy, cz) = (self.camera_x, self.camera_y, self.camera_z);
        self.camera_look_at(
            Vec3::new(cx, cy, cz),
            Vec3::new(cx, cy, 0.0),
            Vec3::new(0.0, 1.0, 0.0),
        );
    }

    /// Replaces the modelview and the camera with a look-at transform.
    ///
    /// Coordinates are in sketch space (+Y down); the result maps them into
    /// eye space with Y up.
    pub fn camera_look_at(&mut self, eye: Vec3, center: Vec3, up: Vec3) {
        let h = self.viewport.height;
        let eye = Vec3::new(eye.x, h - eye.y, eye.z);
        let center = Vec3::new(center.x, h - center.y, center.z);

        let z = (eye - center).normalized();
        let x = up.cross(z).normalized();
        let y = z.cross(x).normalized();

        #[rustfmt::skip]
        let mut m = Mat4::from_rows(
            x.x, x.y, x.z, 0.0,
            y.x, y.y, y.z, 0.0,
            z.x, z.y, z.z, 0.0,
            0.0, 0.0, 0.0, 1.0,
        );
        m.translate(-eye.x, -eye.y + h, -eye.z);
        for r in 0..4 {
            m.m[4 + r] = -m.m[4 + r];
        }

        let inv = m.rigid_inverse();
        self.load_modelview(m, inv, TransformKind::RigidBody);
        self.camera = m;
        self.camera_inv = inv;
        self.camera_kind = TransformKind::RigidBody;
    }

    // ── projections ───────────────────────────────────────────────────────

    /// Default perspective: the camera's field of view and aspect, near and
    /// far planes at a tenth and ten times the camera distance.
    pub fn perspective(&mut self) {
        self.perspective_with(self.camera_fov, self.camera_aspect, self.camera_near, self.camera_far);
    }

    pub fn perspective_with(&mut self, fov: f32, aspect: f32, near: f32, far: f32) {
        self.set_projection(Mat4::perspective(fov, aspect, near, far));
    }

    pub fn frustum(&mut self, left: f32, right: f32, bottom: f32, top: f32, near: f32, far: f32) {
        self.set_projection(Mat4::frustum(left, right, bottom, top, near, far));
    }

    /// Orthographic projection of the whole surface.
    pub fn ortho(&mut self) {
        let (w, h) = (self.viewport.width, self.viewport.height);
        self.ortho_with(0.0, w, 0.0, h, self.camera_near, self.camera_far);
    }

    /// Box in surface coordinates; shifted so the surface centre sits on the
    /// camera axis.
    pub fn ortho_with(&mut self, left: f32, right: f32, bottom: f32, top: f32, near: f32, far: f32) {
        let (hw, hh) = (self.viewport.width / 2.0, self.viewport.height / 2.0);
        self.set_projection(Mat4::ortho(left - hw, right - hw, bottom - hh, top - hh, near, far));
    }

    fn set_projection(&mut self, m: Mat4) {
        self.projection.set(m);
        self.projection_dirty = true;
    }

    // ── coordinate queries ────────────────────────────────────────────────

    fn project(&self, x: f32, y: f32, z: f32) -> [f32; 3] {
        let eye = self.modelview.transform4([x, y, z, 1.0]);
        let [ox, oy, oz, ow] = self.projection.current().transform4(eye);
        if ow != 0.0 { [ox / ow, oy / ow, oz / ow] } else { [ox, oy, oz] }
    }

    /// Surface x, in pixels, of a point in the current model space.
    pub fn screen_x(&self, x: f32, y: f32, z: f32) -> f32 {
        let [ox, _, _] = self.project(x, y, z);
        self.viewport.width * (1.0 + ox) / 2.0
    }

    /// Surface y, in pixels from the top.
    pub fn screen_y(&self, x: f32, y: f32, z: f32) -> f32 {
        let [_, oy, _] = self.project(x, y, z);
        self.viewport.height * (1.0 - oy) / 2.0
    }

    /// Window depth in 0..1.
    pub fn screen_z(&self, x: f32, y: f32, z: f32) -> f32 {
        let [_, _, oz] = self.project(x, y, z);
        (oz + 1.0) / 2.0
    }

    fn to_world(&self, x: f32, y: f32, z: f32) -> [f32; 3] {
        let eye = self.modelview.transform4([x, y, z, 1.0]);
        let [ox, oy, oz, ow] = self.camera_inv.transform4(eye);
        if ow != 0.0 { [ox / ow, oy / ow, oz / ow] } else { [ox, oy, oz] }
    }

    /// World-space x of a point in the current model space, i.e. with the
    /// camera taken back out.
    pub fn model_x(&self, x: f32, y: f32, z: f32) -> f32 {
        self.to_world(x, y, z)[0]
    }

    pub fn model_y(&self, x: f32, y: f32, z: f32) -> f32 {
        self.to_world(x, y, z)[1]
    }

    pub fn model_z(&self, x: f32, y: f32, z: f32) -> f32 {
        self.to_world(x, y, z)[2]
    }
}
