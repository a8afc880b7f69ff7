// ============================================
// Chunk Data - Сетка плотности + меш чанка
// ============================================

use std::sync::Arc;

use ultraviolet::Vec3;

use crate::terrain::cache::{ChunkContext, ChunkCoord};
use crate::terrain::mesh::Mesh;

use super::grid::DensityGrid;

/// Данные чанка: владеет сеткой и мешем.
///
/// Создаётся задачей генерации, меняется на месте задачами редактирования,
/// уничтожается когда чанк покидает рабочий набор.
#[derive(Clone, Debug, PartialEq)]
pub struct ChunkData {
    pub context: ChunkContext,
    pub grid: DensityGrid,
    pub mesh: Mesh,
}

impl ChunkData {
    pub fn new(context: ChunkContext, grid: DensityGrid, mesh: Mesh) -> Self {
        Self { context, grid, mesh }
    }

    #[inline]
    pub fn coord(&self) -> ChunkCoord {
        self.context.coord
    }

    #[inline]
    pub fn lod(&self) -> u8 {
        self.context.lod
    }

    /// Трансформ чанк -> мир (сдвиг на угол чанка)
    #[inline]
    pub fn world_origin(&self, chunk_size: u32) -> Vec3 {
        self.context.world_origin(chunk_size)
    }

    /// Забрать владение из результата задачи (копия, если Arc ещё разделён)
    pub fn into_owned(data: Arc<ChunkData>) -> ChunkData {
        Arc::try_unwrap(data).unwrap_or_else(|shared| (*shared).clone())
    }
}
