// ============================================
// LOD Levels - Уровни детализации
// ============================================

use serde::{Deserialize, Serialize};

use crate::terrain::error::ConfigError;

/// Кольцо LOD: [min_chunks, max_chunks) по Chebyshev-дистанции
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LodLevel {
    pub min_chunks: i32,
    pub max_chunks: i32,
}

impl LodLevel {
    /// Индекс в таблице = индекс LOD (scale = 1 << lod)
    pub const DEFAULT_LEVELS: [LodLevel; 4] = [
        LodLevel { min_chunks: 0, max_chunks: 8 },
        LodLevel { min_chunks: 8, max_chunks: 16 },
        LodLevel { min_chunks: 16, max_chunks: 32 },
        LodLevel { min_chunks: 32, max_chunks: 64 },
    ];

    #[inline]
    pub fn contains(&self, distance: i32) -> bool {
        distance >= self.min_chunks && distance < self.max_chunks
    }

    /// Кольца должны идти подряд, начиная с 0, без дыр и пересечений
    pub fn validate_table(levels: &[LodLevel]) -> Result<(), ConfigError> {
        if levels.is_empty() {
            return Err(ConfigError::Lod("at least one LOD level is required".into()));
        }
        if levels.len() > 8 {
            return Err(ConfigError::Lod(format!("at most 8 LOD levels are supported, got {}", levels.len())));
        }
        let mut expected_min = 0;
        for (lod, level) in levels.iter().enumerate() {
            if level.min_chunks != expected_min {
                return Err(ConfigError::Lod(format!(
                    "level {} starts at {} but previous ring ends at {}",
                    lod, level.min_chunks, expected_min
                )));
            }
            if level.max_chunks <= level.min_chunks {
                return Err(ConfigError::Lod(format!("level {} is empty", lod)));
            }
            expected_min = level.max_chunks;
        }
        Ok(())
    }
}

/// Политика LOD: бакет дистанции -> индекс LOD
pub trait LodPolicy: Send + Sync {
    fn lod_for_distance(&self, ring_distance: i32) -> Option<u8>;

    /// Дальность, за которой чанки не нужны
    fn max_distance(&self) -> i32;

    /// Самый грубый LOD, который может вернуть политика
    fn max_lod(&self) -> u8;
}

/// Политика по таблице колец
#[derive(Clone, Debug)]
pub struct RingLodPolicy {
    levels: Vec<LodLevel>,
}

impl RingLodPolicy {
    pub fn new(levels: Vec<LodLevel>) -> Result<Self, ConfigError> {
        LodLevel::validate_table(&levels)?;
        Ok(Self { levels })
    }

    pub fn levels(&self) -> &[LodLevel] {
        &self.levels
    }
}

impl Default for RingLodPolicy {
    fn default() -> Self {
        Self { levels: LodLevel::DEFAULT_LEVELS.to_vec() }
    }
}

impl LodPolicy for RingLodPolicy {
    fn lod_for_distance(&self, ring_distance: i32) -> Option<u8> {
        self.levels
            .iter()
            .position(|level| level.contains(ring_distance))
            .map(|lod| lod as u8)
    }

    fn max_distance(&self) -> i32 {
        self.levels.last().map(|l| l.max_chunks).unwrap_or(0)
    }

    fn max_lod(&self) -> u8 {
        self.levels.len().saturating_sub(1) as u8
    }
}
