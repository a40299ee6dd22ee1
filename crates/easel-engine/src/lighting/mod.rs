//! Fixed-function lighting: the light list kept by the renderer, materials,
//! and the host-side shading equation for backends without a lighting stage.

mod fixed;
mod light;
mod material;

pub use fixed::{FixedLight, LightingState};
pub use light::{Falloff, Light, LightKind, LightSet};
pub use material::Material;

/// Most lights a scene can hold at once.
pub const MAX_LIGHTS: usize = 8;
