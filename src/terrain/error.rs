// ============================================
// Errors - Таксономия ошибок terrain
// ============================================
//
// - ConfigError: неверная конфигурация, падаем сразу при создании
// - TerrainError: ошибка внутри пайплайна одной задачи
// - JobError: чем завершается CompletionHandle, если не успехом

use std::sync::atomic::{AtomicBool, Ordering};

use thiserror::Error;

use crate::terrain::cache::ChunkCoord;

/// Ошибки конфигурации (проверяются до запуска воркеров)
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("chunk size must be positive, got {0}")]
    ChunkSize(u32),
    #[error("chunk size {0} is too large (max {1})")]
    ChunkSizeTooLarge(u32, u32),
    #[error("iso level must lie strictly between 0 and 1, got {0}")]
    IsoLevel(f32),
    #[error("surface falloff {falloff} is too narrow for the coarsest LOD step (needs at least {required})")]
    SurfaceFalloff { falloff: f32, required: f32 },
    #[error("at least one biome band is required")]
    MissingBiomes,
    #[error("biome bands must be sorted by min_height (band {index} at {height} follows {previous})")]
    UnsortedBiomes { index: usize, height: f32, previous: f32 },
    #[error("biome band {0} has an empty color gradient")]
    EmptyGradient(usize),
    #[error("biome band {0} has gradient keys outside [0, 1] or out of order")]
    GradientKeys(usize),
    #[error("worker pool needs at least one thread")]
    NoWorkers,
    #[error("emptiness pre-test needs at least 2 samples per axis, got {0}")]
    PretestSamples(u32),
    #[error("invalid noise layer `{layer}`: {reason}")]
    NoiseLayer { layer: &'static str, reason: String },
    #[error("invalid density source: {0}")]
    Density(String),
    #[error("invalid LOD table: {0}")]
    Lod(String),
    #[error("invalid brush: {0}")]
    Brush(String),
    #[error("invalid modifier #{index}: {reason}")]
    Modifier { index: usize, reason: String },
    #[error("failed to parse terrain config: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("failed to read terrain config: {0}")]
    Io(#[from] std::io::Error),
}

/// Ошибки генерации/редактирования одного чанка
#[derive(Debug, Error)]
pub enum TerrainError {
    /// Кооперативная отмена - ожидаемое событие, не сбой
    #[error("job cancelled")]
    Cancelled,
    #[error("density grid is {actual} samples per axis, expected {expected}")]
    GridMismatch { expected: u32, actual: u32 },
    #[error("edits are only supported at LOD 0, chunk is at LOD {0}")]
    EditLod(u8),
    #[error("LOD {lod} is outside the configured table (max {max})")]
    LodOutOfRange { lod: u8, max: u8 },
    #[error("{0}")]
    Brush(#[from] ConfigError),
    #[error("terrain fault: {0}")]
    Fault(String),
}

impl TerrainError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, TerrainError::Cancelled)
    }
}

/// Точка проверки отмены внутри длинных циклов
#[inline]
pub fn ensure_not_cancelled(cancel: &AtomicBool) -> Result<(), TerrainError> {
    if cancel.load(Ordering::Relaxed) {
        Err(TerrainError::Cancelled)
    } else {
        Ok(())
    }
}

/// Итог неуспешной задачи, видимый через CompletionHandle
#[derive(Debug, Clone, Error, PartialEq)]
pub enum JobError {
    /// Задача вытеснена новым запросом или отменена явно
    #[error("job was cancelled")]
    Cancelled,
    /// Планировщик остановлен до завершения задачи
    #[error("scheduler shut down before the job finished")]
    Shutdown,
    #[error("job for chunk {coord} at LOD {lod} failed: {reason}")]
    Failed { coord: ChunkCoord, lod: u8, reason: String },
}

impl JobError {
    /// Отмена и остановка - штатные исходы, их не логируем как ошибку
    pub fn is_cancelled(&self) -> bool {
        matches!(self, JobError::Cancelled | JobError::Shutdown)
    }
}
