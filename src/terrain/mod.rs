// ============================================
// Terrain Module - Воксельный terrain на marching cubes
// ============================================
//
// Поле плотности -> сетка чанка -> marching cubes -> цвет биомов,
// задачи чанков планируются пулом воркеров по приоритету.

pub mod biomes;
pub mod cache;
pub mod config;
pub mod edit;
pub mod error;
pub mod generation;
pub mod lod;
pub mod manager;
pub mod mesh;
pub mod voxel;

// Re-exports
pub use biomes::{BiomeBand, BiomeColorizer, Capability, ColorGradient, ModifierConfig, ModifierStack, TerrainModifier};
pub use cache::{ChunkContext, ChunkCoord};
pub use config::{DensityConfig, NoiseSettings, TerrainConfig};
pub use edit::{Brush, BrushMode};
pub use error::{ConfigError, JobError, TerrainError};
pub use generation::{DensityField, DensitySource, HeightFunction};
pub use lod::{LodLevel, LodPolicy, RingLodPolicy};
pub use manager::{ChunkPipeline, ChunkScheduler, ChunkStreamer, CompletionHandle, EditPayload, JobState, SchedulerStats};
pub use mesh::{Mesh, TerrainVertex};
pub use voxel::{ChunkData, DensityGrid};
