//! Shape assembly and tessellation.
//!
//! [`ShapeAssembler`] turns `begin_shape` / `vertex` / `end_shape` calls into
//! a [`Tessellation`]: vertices plus the points, line paths and fill
//! triangles generated for the shape kind. Fill triangles are grouped into
//! [`Face`]s, runs that share one texture set and can be drawn with one
//! texture binding.

mod assembler;
mod faces;
mod kind;
mod tessellate;
mod triangulate;
mod vertex;

pub use assembler::ShapeAssembler;
pub use faces::{Face, FaceList};
pub use kind::{EndMode, ShapeKind, TextureMode};
pub use tessellate::{
    DEFAULT_FACES, DEFAULT_LINES, DEFAULT_PATHS, DEFAULT_POINTS, DEFAULT_TRIANGLES, DEFAULT_VERTICES,
    Path, Tessellation,
};
pub use triangulate::triangulate;
pub use vertex::{TextureSet, Vertex};
pub(crate) use vertex::push_doubling;
