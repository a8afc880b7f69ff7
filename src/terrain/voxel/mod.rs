// ============================================
// Voxel Module - Воксельные данные чанка
// ============================================

pub mod context;
pub mod thread_local;

mod chunk;
mod grid;

pub use chunk::ChunkData;
pub use context::MeshingContext;
pub use grid::DensityGrid;
pub use thread_local::with_meshing_context;

pub(crate) use grid::lerp;
