// ============================================
// Voxel Terrain - Синтез и стриминг воксельного terrain
// ============================================

pub mod terrain;

pub use terrain::{
    Brush, BrushMode, ChunkCoord, ChunkData, ChunkScheduler, ChunkStreamer, CompletionHandle, ConfigError,
    JobError, Mesh, TerrainConfig, TerrainError,
};
