// ============================================
// Chunk Pipeline - Синтез -> меш -> цвет
// ============================================
//
// Генерация: поле плотности -> сетка -> marching cubes -> биомы.
// Правка:    кисть по сетке -> полная пересборка меша -> биомы.
// Выполняется синхронно внутри одного воркера.

use std::sync::atomic::AtomicBool;

use crate::terrain::biomes::BiomeColorizer;
use crate::terrain::cache::ChunkContext;
use crate::terrain::config::TerrainConfig;
use crate::terrain::edit::apply_brush;
use crate::terrain::error::{ensure_not_cancelled, ConfigError, TerrainError};
use crate::terrain::generation::{fill_density_grid, should_generate_chunk, DensityField};
use crate::terrain::mesh::extract_surface;
use crate::terrain::voxel::ChunkData;

use super::types::EditPayload;

/// Неизменяемый после создания пайплайн, разделяется всеми воркерами
#[derive(Clone, Debug)]
pub struct ChunkPipeline {
    chunk_size: u32,
    iso: f32,
    max_lod: u8,
    pretest_samples: u32,
    field: DensityField,
    colorizer: BiomeColorizer,
}

impl ChunkPipeline {
    pub fn from_config(config: &TerrainConfig) -> Result<Self, ConfigError> {
        let field = DensityField::from_config(config)?;
        Self::with_field(config, field)
    }

    /// Пайплайн с произвольным полем (своя функция высоты)
    pub fn with_field(config: &TerrainConfig, field: DensityField) -> Result<Self, ConfigError> {
        config.validate()?;
        let required = config.coarsest_step() as f32 / config.iso_level.min(1.0 - config.iso_level);
        if !(field.falloff() >= required) {
            return Err(ConfigError::SurfaceFalloff { falloff: field.falloff(), required });
        }
        Ok(Self {
            chunk_size: config.chunk_size,
            iso: config.iso_level,
            max_lod: config.max_lod(),
            pretest_samples: config.pretest_samples,
            colorizer: BiomeColorizer::new(&config.biomes)?,
            field,
        })
    }

    #[inline]
    pub fn chunk_size(&self) -> u32 {
        self.chunk_size
    }

    #[inline]
    pub fn iso(&self) -> f32 {
        self.iso
    }

    /// Самый грубый допустимый LOD
    #[inline]
    pub fn max_lod(&self) -> u8 {
        self.max_lod
    }

    /// LOD за пределами таблицы отклоняется до любых сдвигов на `lod`
    #[inline]
    pub fn check_lod(&self, lod: u8) -> Result<(), TerrainError> {
        if lod > self.max_lod {
            return Err(TerrainError::LodOutOfRange { lod, max: self.max_lod });
        }
        Ok(())
    }

    pub fn field(&self) -> &DensityField {
        &self.field
    }

    pub fn colorizer(&self) -> &BiomeColorizer {
        &self.colorizer
    }

    /// Грубый пре-тест пустоты (см. should_generate_chunk)
    pub fn should_generate(&self, ctx: &ChunkContext) -> Result<bool, TerrainError> {
        self.check_lod(ctx.lod)?;
        Ok(should_generate_chunk(&self.field, ctx, self.chunk_size, self.pretest_samples))
    }

    /// Полная генерация чанка
    pub fn generate(&self, ctx: &ChunkContext, cancel: &AtomicBool) -> Result<ChunkData, TerrainError> {
        self.check_lod(ctx.lod)?;
        let grid = fill_density_grid(&self.field, ctx, self.chunk_size, cancel)?;
        let mut chunk = ChunkData::new(*ctx, grid, Default::default());
        self.remesh(&mut chunk, cancel)?;
        Ok(chunk)
    }

    /// Правка: кисть + полная пересборка меша
    pub fn edit(&self, payload: EditPayload, cancel: &AtomicBool) -> Result<ChunkData, TerrainError> {
        let EditPayload { mut chunk, brush } = payload;
        ensure_not_cancelled(cancel)?;
        apply_brush(&mut chunk, &brush, self.chunk_size)?;
        self.remesh(&mut chunk, cancel)?;
        Ok(chunk)
    }

    /// Пересобрать и раскрасить меш по текущей сетке
    pub fn remesh(&self, chunk: &mut ChunkData, cancel: &AtomicBool) -> Result<(), TerrainError> {
        self.check_lod(chunk.lod())?;
        let expected = self.chunk_size + 1;
        if chunk.grid.samples() != expected {
            return Err(TerrainError::GridMismatch { expected, actual: chunk.grid.samples() });
        }
        let mut mesh = extract_surface(&chunk.grid, chunk.lod(), self.iso, cancel)?;
        ensure_not_cancelled(cancel)?;
        let origin = chunk.world_origin(self.chunk_size);
        self.colorizer.colorize(&mut mesh, origin, self.field.modifiers());
        chunk.mesh = mesh;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use ultraviolet::Vec3;

    use super::*;
    use crate::terrain::cache::ChunkCoord;
    use crate::terrain::config::DensityConfig;
    use crate::terrain::edit::{Brush, BrushMode};

    fn flat_config() -> TerrainConfig {
        TerrainConfig {
            chunk_size: 16,
            density: DensityConfig::Flat { height: 8.0 },
            ..TerrainConfig::default()
        }
    }

    fn live() -> AtomicBool {
        AtomicBool::new(false)
    }

    #[test]
    fn test_generate_colors_by_height() {
        let config = flat_config();
        let pipeline = ChunkPipeline::from_config(&config).unwrap();
        let ctx = ChunkContext::new(ChunkCoord::new(0, 0, 0), 0);
        let chunk = pipeline.generate(&ctx, &live()).unwrap();
        assert!(chunk.mesh.is_consistent());
        assert!(!chunk.mesh.is_empty());
        let expected = pipeline.colorizer().color_for_height(8.0);
        assert!(chunk.mesh.colors.iter().all(|c| *c == expected));
    }

    #[test]
    fn test_edit_digs_a_hole_and_remeshes() {
        let config = flat_config();
        let pipeline = ChunkPipeline::from_config(&config).unwrap();
        let ctx = ChunkContext::new(ChunkCoord::new(0, 0, 0), 0);
        let chunk = pipeline.generate(&ctx, &live()).unwrap();
        let before = chunk.mesh.triangle_count();

        let brush = Brush::new(Vec3::new(8.0, 8.0, 8.0), 4.0, 1.0, BrushMode::Subtract, &config.brush).unwrap();
        let edited = pipeline.edit(EditPayload::new(chunk, brush), &live()).unwrap();
        assert!(edited.mesh.is_consistent());
        assert_ne!(edited.mesh.triangle_count(), before);
        // поверхность опустилась под центром кисти
        let lowest = edited.mesh.positions.iter().map(|p| p.y).fold(f32::INFINITY, f32::min);
        assert!(lowest < 8.0 - 1.0);
    }

    #[test]
    fn test_cancelled_generate() {
        let pipeline = ChunkPipeline::from_config(&flat_config()).unwrap();
        let ctx = ChunkContext::new(ChunkCoord::new(0, 0, 0), 0);
        let cancel = AtomicBool::new(true);
        assert!(pipeline.generate(&ctx, &cancel).unwrap_err().is_cancelled());
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = TerrainConfig { biomes: Vec::new(), ..flat_config() };
        assert!(matches!(ChunkPipeline::from_config(&config), Err(ConfigError::MissingBiomes)));

        let config = flat_config();
        let narrow = DensityField::from_config(&config).unwrap().with_falloff(1.0);
        assert!(matches!(
            ChunkPipeline::with_field(&config, narrow),
            Err(ConfigError::SurfaceFalloff { .. })
        ));
    }

    #[test]
    fn test_lod_beyond_table_rejected() {
        let pipeline = ChunkPipeline::from_config(&flat_config()).unwrap();
        assert_eq!(pipeline.max_lod(), 3);
        let ctx = ChunkContext::new(ChunkCoord::new(0, 0, 0), 200);
        assert!(matches!(
            pipeline.should_generate(&ctx),
            Err(TerrainError::LodOutOfRange { lod: 200, max: 3 })
        ));
        assert!(matches!(
            pipeline.generate(&ctx, &live()),
            Err(TerrainError::LodOutOfRange { .. })
        ));
        assert!(pipeline.should_generate(&ChunkContext::new(ChunkCoord::new(0, 0, 0), 3)).unwrap());
    }
}
