/// What the accumulated modelview transform is known to contain.
#[derive(Debug, Copy, Clone, Default, Eq, PartialEq)]
pub enum TransformKind {
    /// Rotations, translations and axis flips only: the inverse is the
    /// transpose of the 3x3 block with the translation undone.
    #[default]
    RigidBody,
    /// Anything else, including scale, shear and arbitrary matrices.
    General,
}

impl TransformKind {
    /// Kind after composing with a transform of kind `next`.
    #[inline]
    pub fn then(self, next: TransformKind) -> TransformKind {
        match (self, next) {
            (TransformKind::RigidBody, TransformKind::RigidBody) => TransformKind::RigidBody,
            _ => TransformKind::General,
        }
    }
}
