use crate::coords::{Mat4, Vec3};

/// A current matrix plus a LIFO of saved ones.
///
/// Used for the projection matrix and for the geometry buffer's local frame,
/// neither of which needs an inverse.
#[derive(Debug, Clone, Default)]
pub struct MatrixStack {
    current: Mat4,
    saved: Vec<Mat4>,
}

impl MatrixStack {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn current(&self) -> &Mat4 {
        &self.current
    }

    pub fn set(&mut self, m: Mat4) {
        self.current = m;
    }

    /// Identity, keeping saved frames.
    pub fn reset(&mut self) {
        self.current = Mat4::IDENTITY;
    }

    /// Identity with no saved frames.
    pub fn clear(&mut self) {
        self.current = Mat4::IDENTITY;
        self.saved.clear();
    }

    pub fn depth(&self) -> usize {
        self.saved.len()
    }

    pub fn push(&mut self) {
        self.saved.push(self.current);
    }

    /// Restores the last pushed matrix. Returns `false` and leaves the
    /// current matrix alone when nothing was pushed.
    pub fn pop(&mut self) -> bool {
        match self.saved.pop() {
            Some(m) => {
                self.current = m;
                true
            }
            None => false,
        }
    }

    pub fn translate(&mut self, tx: f32, ty: f32, tz: f32) {
        self.current.translate(tx, ty, tz);
    }

    pub fn rotate(&mut self, angle: f32, axis: Vec3) {
        self.current.rotate(angle, axis);
    }

    pub fn scale(&mut self, sx: f32, sy: f32, sz: f32) {
        self.current.scale(sx, sy, sz);
    }

    pub fn apply(&mut self, m: &Mat4) {
        self.current.apply(m);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pop_restores_pushed_matrix() {
        let mut s = MatrixStack::new();
        s.translate(1.0, 2.0, 3.0);
        let before = *s.current();
        s.push();
        s.scale(2.0, 2.0, 2.0);
        s.rotate(0.3, Vec3::new(0.0, 0.0, 1.0));
        assert!(s.pop());
        assert_eq!(*s.current(), before);
    }

    #[test]
    fn pop_on_empty_keeps_current() {
        let mut s = MatrixStack::new();
        s.translate(5.0, 0.0, 0.0);
        let before = *s.current();
        assert!(!s.pop());
        assert_eq!(*s.current(), before);
    }

    #[test]
    fn clear_drops_saved_frames() {
        let mut s = MatrixStack::new();
        s.push();
        s.push();
        s.translate(1.0, 0.0, 0.0);
        s.clear();
        assert_eq!(s.depth(), 0);
        assert_eq!(*s.current(), Mat4::IDENTITY);
    }
}
