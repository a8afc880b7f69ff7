// ============================================
// Mesh Module - Marching Cubes меш чанка
// ============================================

mod data;
mod marching;
mod normals;
mod tables;
mod vertex;

pub use data::Mesh;
pub use marching::{cube_case, extract_surface, interpolate_edge, UNCOLORED};
pub use normals::{flat_face_normal, gradient_epsilon};
pub use vertex::TerrainVertex;
