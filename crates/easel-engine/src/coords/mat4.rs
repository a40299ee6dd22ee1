use core::ops::Mul;

use super::Vec3;

/// Determinants below this magnitude are treated as singular.
const SINGULAR_DET: f64 = 1e-18;

/// 4x4 `f32` matrix stored column-major.
///
/// Layout: element (row `r`, column `c`) lives at `m[c * 4 + r]`, so the
/// translation occupies `m[12..15]`. This is the layout graphics APIs expect
/// when loading a matrix, and the one every method here reads and writes.
///
/// Composition is post-multiplication: `a.apply(&b)` yields `a * b`, so `b`
/// acts on vertices first. `translate`, `rotate` and `scale` follow the same
/// rule, mirroring a fixed-function matrix stack.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Mat4 {
    pub m: [f32; 16],
}

impl Default for Mat4 {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Mat4 {
    pub const IDENTITY: Mat4 = Mat4 {
        m: [
            1.0, 0.0, 0.0, 0.0, //
            0.0, 1.0, 0.0, 0.0, //
            0.0, 0.0, 1.0, 0.0, //
            0.0, 0.0, 0.0, 1.0,
        ],
    };

    #[inline]
    pub const fn from_cols_array(m: [f32; 16]) -> Self {
        Self { m }
    }

    /// Builds a matrix from sixteen values listed row by row.
    #[rustfmt::skip]
    pub const fn from_rows(
        n00: f32, n01: f32, n02: f32, n03: f32,
        n10: f32, n11: f32, n12: f32, n13: f32,
        n20: f32, n21: f32, n22: f32, n23: f32,
        n30: f32, n31: f32, n32: f32, n33: f32,
    ) -> Self {
        Self {
            m: [
                n00, n10, n20, n30,
                n01, n11, n21, n31,
                n02, n12, n22, n32,
                n03, n13, n23, n33,
            ],
        }
    }

    #[inline]
    pub const fn get(&self, row: usize, col: usize) -> f32 {
        self.m[col * 4 + row]
    }

    #[inline]
    pub fn set(&mut self, row: usize, col: usize, value: f32) {
        self.m[col * 4 + row] = value;
    }

    #[inline]
    pub const fn to_cols_array(&self) -> [f32; 16] {
        self.m
    }

    // ── constructors ──────────────────────────────────────────────────────

    pub const fn translation(tx: f32, ty: f32, tz: f32) -> Self {
        let mut m = Self::IDENTITY.m;
        m[12] = tx;
        m[13] = ty;
        m[14] = tz;
        Self { m }
    }

    pub const fn scaling(sx: f32, sy: f32, sz: f32) -> Self {
        let mut m = Self::IDENTITY.m;
        m[0] = sx;
        m[5] = sy;
        m[10] = sz;
        Self { m }
    }

    /// Rotation of `angle` radians around `axis` (normalized internally).
    ///
    /// A zero axis yields the identity.
    pub fn rotation(angle: f32, axis: Vec3) -> Self {
        let len = axis.length();
        if len == 0.0 || !len.is_finite() {
            return Self::IDENTITY;
        }
        let Vec3 { x, y, z } = axis / len;
        let (s, c) = angle.sin_cos();
        let t = 1.0 - c;

        Self::from_rows(
            t * x * x + c,     t * x * y - s * z, t * x * z + s * y, 0.0,
            t * x * y + s * z, t * y * y + c,     t * y * z - s * x, 0.0,
            t * x * z - s * y, t * y * z + s * x, t * z * z + c,     0.0,
            0.0,               0.0,               0.0,               1.0,
        )
    }

    /// Perspective frustum, same convention as `glFrustum`.
    pub fn frustum(left: f32, right: f32, bottom: f32, top: f32, near: f32, far: f32) -> Self {
        let mut m = [0.0f32; 16];
        m[0] = 2.0 * near / (right - left);
        m[5] = 2.0 * near / (top - bottom);
        m[8] = (right + left) / (right - left);
        m[9] = (top + bottom) / (top - bottom);
        m[10] = (-far - near) / (far - near);
        m[11] = -1.0;
        m[14] = -(2.0 * near * far) / (far - near);
        Self { m }
    }

    /// Symmetric frustum from a vertical field of view (radians).
    pub fn perspective(fov_y: f32, aspect: f32, near: f32, far: f32) -> Self {
        let ymax = near * (fov_y / 2.0).tan();
        let ymin = -ymax;
        Self::frustum(ymin * aspect, ymax * aspect, ymin, ymax, near, far)
    }

    /// Orthographic box, same convention as `glOrtho`.
    pub fn ortho(left: f32, right: f32, bottom: f32, top: f32, near: f32, far: f32) -> Self {
        let x = 2.0 / (right - left);
        let y = 2.0 / (top - bottom);
        let z = -2.0 / (far - near);
        let tx = -(right + left) / (right - left);
        let ty = -(top + bottom) / (top - bottom);
        let tz = -(far + near) / (far - near);
        Self::from_rows(
            x, 0.0, 0.0, tx, //
            0.0, y, 0.0, ty, //
            0.0, 0.0, z, tz, //
            0.0, 0.0, 0.0, 1.0,
        )
    }

    // ── composition ───────────────────────────────────────────────────────

    /// `self = self * rhs`.
    #[inline]
    pub fn apply(&mut self, rhs: &Mat4) {
        *self = *self * *rhs;
    }

    #[inline]
    pub fn translate(&mut self, tx: f32, ty: f32, tz: f32) {
        // Post-multiplying by a translation only touches the last column.
        for r in 0..4 {
            self.m[12 + r] += self.m[r] * tx + self.m[4 + r] * ty + self.m[8 + r] * tz;
        }
    }

    #[inline]
    pub fn rotate(&mut self, angle: f32, axis: Vec3) {
        self.apply(&Mat4::rotation(angle, axis));
    }

    #[inline]
    pub fn scale(&mut self, sx: f32, sy: f32, sz: f32) {
        for r in 0..4 {
            self.m[r] *= sx;
            self.m[4 + r] *= sy;
            self.m[8 + r] *= sz;
        }
    }

    pub fn transpose(&self) -> Mat4 {
        let mut out = [0.0f32; 16];
        for c in 0..4 {
            for r in 0..4 {
                out[r * 4 + c] = self.m[c * 4 + r];
            }
        }
        Mat4 { m: out }
    }

    // ── inverse ───────────────────────────────────────────────────────────

    /// Determinant via the 2x2 block expansion used by [`Mat4::inverse`].
    pub fn determinant(&self) -> f32 {
        let b = Blocks::of(self);
        b.det() as f32
    }

    /// General inverse using 2x2 cofactor blocks, computed in `f64`.
    ///
    /// Returns `None` when the matrix is singular; callers decide whether to
    /// keep a previous inverse.
    pub fn inverse(&self) -> Option<Mat4> {
        let m = self.m.map(f64::from);
        let Blocks { a0, a1, a2, a3, a4, a5, b0, b1, b2, b3, b4, b5 } = Blocks::of(self);

        let det = a0 * b5 - a1 * b4 + a2 * b3 + a3 * b2 - a4 * b1 + a5 * b0;
        if !det.is_finite() || det.abs() < SINGULAR_DET {
            return None;
        }

        let mut inv = [0.0f64; 16];
        inv[0] = m[5] * b5 - m[6] * b4 + m[7] * b3;
        inv[4] = -m[4] * b5 + m[6] * b2 - m[7] * b1;
        inv[8] = m[4] * b4 - m[5] * b2 + m[7] * b0;
        inv[12] = -m[4] * b3 + m[5] * b1 - m[6] * b0;
        inv[1] = -m[1] * b5 + m[2] * b4 - m[3] * b3;
        inv[5] = m[0] * b5 - m[2] * b2 + m[3] * b1;
        inv[9] = -m[0] * b4 + m[1] * b2 - m[3] * b0;
        inv[13] = m[0] * b3 - m[1] * b1 + m[2] * b0;
        inv[2] = m[13] * a5 - m[14] * a4 + m[15] * a3;
        inv[6] = -m[12] * a5 + m[14] * a2 - m[15] * a1;
        inv[10] = m[12] * a4 - m[13] * a2 + m[15] * a0;
        inv[14] = -m[12] * a3 + m[13] * a1 - m[14] * a0;
        inv[3] = -m[9] * a5 + m[10] * a4 - m[11] * a3;
        inv[7] = m[8] * a5 - m[10] * a2 + m[11] * a1;
        inv[11] = -m[8] * a4 + m[9] * a2 - m[11] * a0;
        inv[15] = m[8] * a3 - m[9] * a1 + m[10] * a0;

        let inv_det = 1.0 / det;
        Some(Mat4 { m: inv.map(|v| (v * inv_det) as f32) })
    }

    /// Inverse of a rotation + translation matrix.
    ///
    /// Only valid when the upper 3x3 block is orthonormal (no scale or
    /// shear); the result is then exact and much cheaper than [`Mat4::inverse`].
    pub fn rigid_inverse(&self) -> Mat4 {
        let m = &self.m;
        let t = Vec3::new(m[12], m[13], m[14]);
        let u = Vec3::new(m[0], m[1], m[2]);
        let v = Vec3::new(m[4], m[5], m[6]);
        let w = Vec3::new(m[8], m[9], m[10]);

        Mat4::from_rows(
            u.x, u.y, u.z, -u.dot(t), //
            v.x, v.y, v.z, -v.dot(t), //
            w.x, w.y, w.z, -w.dot(t), //
            0.0, 0.0, 0.0, 1.0,
        )
    }

    // ── transforms ────────────────────────────────────────────────────────

    /// Full homogeneous transform.
    #[inline]
    pub fn transform4(&self, v: [f32; 4]) -> [f32; 4] {
        let m = &self.m;
        let mut out = [0.0f32; 4];
        for (r, o) in out.iter_mut().enumerate() {
            *o = m[r] * v[0] + m[4 + r] * v[1] + m[8 + r] * v[2] + m[12 + r] * v[3];
        }
        out
    }

    /// Transforms a point (w = 1) without the projective divide.
    #[inline]
    pub fn transform_point(&self, p: Vec3) -> Vec3 {
        let [x, y, z, _] = self.transform4([p.x, p.y, p.z, 1.0]);
        Vec3::new(x, y, z)
    }

    /// Transforms a direction by the upper 3x3 block only.
    #[inline]
    pub fn transform_vector(&self, v: Vec3) -> Vec3 {
        let [x, y, z, _] = self.transform4([v.x, v.y, v.z, 0.0]);
        Vec3::new(x, y, z)
    }

    pub fn approx_eq(&self, other: &Mat4, eps: f32) -> bool {
        self.m.iter().zip(other.m.iter()).all(|(a, b)| (a - b).abs() <= eps)
    }

    pub fn is_finite(&self) -> bool {
        self.m.iter().all(|v| v.is_finite())
    }
}

impl Mul for Mat4 {
    type Output = Mat4;

    fn mul(self, rhs: Mat4) -> Mat4 {
        let mut out = [0.0f32; 16];
        for c in 0..4 {
            for r in 0..4 {
                out[c * 4 + r] = self.m[r] * rhs.m[c * 4]
                    + self.m[4 + r] * rhs.m[c * 4 + 1]
                    + self.m[8 + r] * rhs.m[c * 4 + 2]
                    + self.m[12 + r] * rhs.m[c * 4 + 3];
            }
        }
        Mat4 { m: out }
    }
}

/// The twelve 2x2 minors of the top and bottom column pairs.
struct Blocks {
    a0: f64,
    a1: f64,
    a2: f64,
    a3: f64,
    a4: f64,
    a5: f64,
    b0: f64,
    b1: f64,
    b2: f64,
    b3: f64,
    b4: f64,
    b5: f64,
}

impl Blocks {
    fn of(mat: &Mat4) -> Self {
        let m = mat.m.map(f64::from);
        Self {
            a0: m[0] * m[5] - m[1] * m[4],
            a1: m[0] * m[6] - m[2] * m[4],
            a2: m[0] * m[7] - m[3] * m[4],
            a3: m[1] * m[6] - m[2] * m[5],
            a4: m[1] * m[7] - m[3] * m[5],
            a5: m[2] * m[7] - m[3] * m[6],
            b0: m[8] * m[13] - m[9] * m[12],
            b1: m[8] * m[14] - m[10] * m[12],
            b2: m[8] * m[15] - m[11] * m[12],
            b3: m[9] * m[14] - m[10] * m[13],
            b4: m[9] * m[15] - m[11] * m[13],
            b5: m[10] * m[15] - m[11] * m[14],
        }
    }

    fn det(&self) -> f64 {
        self.a0 * self.b5 - self.a1 * self.b4 + self.a2 * self.b3 + self.a3 * self.b2
            - self.a4 * self.b1
            + self.a5 * self.b0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::{FRAC_PI_2, FRAC_PI_3};

    fn sample() -> Mat4 {
        let mut m = Mat4::IDENTITY;
        m.translate(10.0, -4.0, 2.5);
        m.rotate(0.7, Vec3::new(0.3, 1.0, -0.2));
        m.scale(2.0, 0.5, 3.0);
        m
    }

    // ── layout ────────────────────────────────────────────────────────────

    #[test]
    fn from_rows_is_column_major() {
        let m = Mat4::from_rows(
            1.0, 2.0, 3.0, 4.0, //
            5.0, 6.0, 7.0, 8.0, //
            9.0, 10.0, 11.0, 12.0, //
            13.0, 14.0, 15.0, 16.0,
        );
        assert_eq!(m.m[0], 1.0);
        assert_eq!(m.m[1], 5.0);
        assert_eq!(m.m[4], 2.0);
        assert_eq!(m.get(0, 3), 4.0);
        assert_eq!(m.get(3, 0), 13.0);
    }

    #[test]
    fn translation_lives_in_last_column() {
        let m = Mat4::translation(1.0, 2.0, 3.0);
        assert_eq!(&m.m[12..15], &[1.0, 2.0, 3.0]);
        assert_eq!(m.transform_point(Vec3::zero()), Vec3::new(1.0, 2.0, 3.0));
    }

    // ── multiply ──────────────────────────────────────────────────────────

    #[test]
    fn identity_is_neutral() {
        let m = sample();
        assert_eq!(m * Mat4::IDENTITY, m);
        assert_eq!(Mat4::IDENTITY * m, m);
    }

    #[test]
    fn translate_matches_post_multiplication() {
        let mut a = sample();
        let b = sample() * Mat4::translation(3.0, -1.0, 4.0);
        a.translate(3.0, -1.0, 4.0);
        assert!(a.approx_eq(&b, 1e-5));
    }

    #[test]
    fn scale_matches_post_multiplication() {
        let mut a = sample();
        let b = sample() * Mat4::scaling(2.0, 3.0, 4.0);
        a.scale(2.0, 3.0, 4.0);
        assert!(a.approx_eq(&b, 1e-5));
    }

    #[test]
    fn post_multiplied_transform_applies_last_call_first() {
        let mut m = Mat4::IDENTITY;
        m.translate(10.0, 0.0, 0.0);
        m.scale(2.0, 2.0, 2.0);
        // scale first, then translate
        assert_eq!(m.transform_point(Vec3::new(1.0, 0.0, 0.0)), Vec3::new(12.0, 0.0, 0.0));
    }

    #[test]
    fn rotation_about_z_turns_x_into_y() {
        let m = Mat4::rotation(FRAC_PI_2, Vec3::new(0.0, 0.0, 1.0));
        let p = m.transform_point(Vec3::new(1.0, 0.0, 0.0));
        assert!(p.x.abs() < 1e-6);
        assert!((p.y - 1.0).abs() < 1e-6);
    }

    #[test]
    fn rotation_with_zero_axis_is_identity() {
        assert_eq!(Mat4::rotation(1.0, Vec3::zero()), Mat4::IDENTITY);
    }

    // ── transpose ─────────────────────────────────────────────────────────

    #[test]
    fn transpose_swaps_rows_and_columns() {
        let m = sample();
        let t = m.transpose();
        for r in 0..4 {
            for c in 0..4 {
                assert_eq!(m.get(r, c), t.get(c, r));
            }
        }
        assert_eq!(t.transpose(), m);
    }

    // ── inverse ───────────────────────────────────────────────────────────

    #[test]
    fn inverse_times_matrix_is_identity() {
        let m = sample();
        let inv = m.inverse().unwrap();
        assert!((m * inv).approx_eq(&Mat4::IDENTITY, 1e-5));
        assert!((inv * m).approx_eq(&Mat4::IDENTITY, 1e-5));
    }

    #[test]
    fn inverse_of_projection_round_trips() {
        let p = Mat4::perspective(FRAC_PI_3, 1.5, 0.5, 500.0);
        let inv = p.inverse().unwrap();
        assert!((p * inv).approx_eq(&Mat4::IDENTITY, 1e-5));
    }

    #[test]
    fn singular_matrix_has_no_inverse() {
        let mut m = sample();
        m.scale(1.0, 0.0, 1.0);
        assert!(m.inverse().is_none());
        assert_eq!(m.determinant(), 0.0);
    }

    #[test]
    fn determinant_of_scaling_is_product() {
        let m = Mat4::scaling(2.0, 3.0, 4.0);
        assert!((m.determinant() - 24.0).abs() < 1e-6);
    }

    #[test]
    fn rigid_inverse_matches_general_inverse() {
        let mut m = Mat4::IDENTITY;
        m.translate(5.0, -7.0, 11.0);
        m.rotate(1.1, Vec3::new(1.0, 2.0, 3.0));
        m.translate(-2.0, 0.5, 0.0);
        let fast = m.rigid_inverse();
        let general = m.inverse().unwrap();
        assert!(fast.approx_eq(&general, 1e-4));
        assert!((m * fast).approx_eq(&Mat4::IDENTITY, 1e-5));
    }

    #[test]
    fn rigid_inverse_is_wrong_for_scaled_matrices() {
        let mut m = Mat4::IDENTITY;
        m.scale(2.0, 2.0, 2.0);
        assert!(!(m * m.rigid_inverse()).approx_eq(&Mat4::IDENTITY, 1e-3));
    }

    // ── projections ───────────────────────────────────────────────────────

    #[test]
    fn ortho_maps_box_corners_to_ndc() {
        let m = Mat4::ortho(-50.0, 50.0, -25.0, 25.0, 1.0, 10.0);
        let p = m.transform4([50.0, 25.0, -1.0, 1.0]);
        assert!((p[0] - 1.0).abs() < 1e-6);
        assert!((p[1] - 1.0).abs() < 1e-6);
        assert!((p[2] + 1.0).abs() < 1e-6);
    }

    #[test]
    fn frustum_near_plane_maps_to_minus_one() {
        let m = Mat4::frustum(-1.0, 1.0, -1.0, 1.0, 1.0, 100.0);
        let p = m.transform4([0.0, 0.0, -1.0, 1.0]);
        assert!((p[2] / p[3] + 1.0).abs() < 1e-5);
        assert_eq!(m.m[11], -1.0);
        assert_eq!(m.m[15], 0.0);
    }
}
