// ============================================
// Chunk Key - Идентификатор чанка
// ============================================

use std::fmt;

use serde::{Deserialize, Serialize};
use ultraviolet::Vec3;

/// Координата чанка в пространстве чанков (в единицах базового чанка)
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Default, Serialize, Deserialize)]
pub struct ChunkCoord {
    pub x: i32,
    pub y: i32,
    pub z: i32,
}

impl ChunkCoord {
    pub const fn new(x: i32, y: i32, z: i32) -> Self {
        Self { x, y, z }
    }

    /// Чанк, содержащий мировую точку
    pub fn containing(pos: Vec3, chunk_size: u32) -> Self {
        let cs = chunk_size as f32;
        Self {
            x: (pos.x / cs).floor() as i32,
            y: (pos.y / cs).floor() as i32,
            z: (pos.z / cs).floor() as i32,
        }
    }

    /// Мировая позиция угла чанка
    #[inline]
    pub fn world_origin(&self, chunk_size: u32) -> Vec3 {
        let cs = chunk_size as f32;
        Vec3::new(self.x as f32 * cs, self.y as f32 * cs, self.z as f32 * cs)
    }

    /// Выравнивание по сетке грубого LOD (как делает LOD-кольцо)
    pub fn snapped_to_lod(&self, lod: u8) -> Self {
        let scale = 1i32 << lod;
        Self {
            x: self.x.div_euclid(scale) * scale,
            y: self.y.div_euclid(scale) * scale,
            z: self.z.div_euclid(scale) * scale,
        }
    }

    /// Горизонтальная (XZ) дистанция в чанках
    #[inline]
    pub fn horizontal_distance(&self, other: &ChunkCoord) -> f32 {
        let dx = (self.x - other.x) as f32;
        let dz = (self.z - other.z) as f32;
        (dx * dx + dz * dz).sqrt()
    }

    /// Chebyshev-дистанция по XZ (используется LOD-кольцами)
    #[inline]
    pub fn ring_distance(&self, other: &ChunkCoord) -> i32 {
        (self.x - other.x).abs().max((self.z - other.z).abs())
    }
}

impl fmt::Display for ChunkCoord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, {})", self.x, self.y, self.z)
    }
}

/// Неизменяемый дескриптор задачи: идентичность для дедупликации и приоритета
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct ChunkContext {
    pub coord: ChunkCoord,
    pub lod: u8,
}

impl ChunkContext {
    pub fn new(coord: ChunkCoord, lod: u8) -> Self {
        Self { coord, lod }
    }

    /// Шаг сетки в мировых единицах
    #[inline]
    pub fn step(&self) -> u32 {
        1 << self.lod
    }

    /// Мировой размер чанка на этом LOD
    #[inline]
    pub fn world_extent(&self, chunk_size: u32) -> f32 {
        (chunk_size << self.lod) as f32
    }

    #[inline]
    pub fn world_origin(&self, chunk_size: u32) -> Vec3 {
        self.coord.world_origin(chunk_size)
    }
}
