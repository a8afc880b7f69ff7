// ============================================
// Terrain Config - Data-Driven конфигурация из JSON
// ============================================
// Единый источник параметров: размер чанка, ISO, шум, LOD, биомы, кисти

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::terrain::biomes::{BiomeBand, ModifierConfig};
use crate::terrain::error::ConfigError;
use crate::terrain::generation::RemapCurve;
use crate::terrain::lod::LodLevel;

/// Максимальный размер чанка (сетка (N+1)^3 должна влезать в u32 индексы)
pub const MAX_CHUNK_SIZE: u32 = 256;

/// Один слой шума (fbm)
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct NoiseLayer {
    pub frequency: f32,
    pub amplitude: f32,
    pub octaves: u32,
}

impl NoiseLayer {
    pub const fn new(frequency: f32, amplitude: f32, octaves: u32) -> Self {
        Self { frequency, amplitude, octaves }
    }

    fn validate(&self, layer: &'static str) -> Result<(), ConfigError> {
        let fail = |reason: String| Err(ConfigError::NoiseLayer { layer, reason });
        if !self.frequency.is_finite() || self.frequency <= 0.0 {
            return fail(format!("frequency must be positive, got {}", self.frequency));
        }
        if !self.amplitude.is_finite() || self.amplitude < 0.0 {
            return fail(format!("amplitude must be non-negative, got {}", self.amplitude));
        }
        if self.octaves == 0 || self.octaves > 12 {
            return fail(format!("octaves must be in 1..=12, got {}", self.octaves));
        }
        Ok(())
    }
}

/// Параметры слоёного шума высот
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NoiseSettings {
    pub seed: u32,
    /// Базовая высота поверхности
    pub base_height: f32,
    /// Вертикальный масштаб после remap-кривой
    pub vertical_scale: f32,
    /// Континенты - очень низкая частота
    pub continent: NoiseLayer,
    /// Горные гребни (ridged)
    pub mountain: NoiseLayer,
    /// Маска, где вообще бывают горы
    pub mountain_mask: NoiseLayer,
    /// Мелкая детализация
    pub detail: NoiseLayer,
    /// Фактор плоскости (гасит детализацию)
    pub flatness: NoiseLayer,
    pub remap: RemapCurve,
}

impl Default for NoiseSettings {
    fn default() -> Self {
        Self {
            seed: 42,
            base_height: 16.0,
            vertical_scale: 24.0,
            continent: NoiseLayer::new(0.002, 1.0, 4),
            mountain: NoiseLayer::new(0.006, 1.2, 3),
            mountain_mask: NoiseLayer::new(0.001, 1.0, 2),
            detail: NoiseLayer::new(0.03, 0.15, 3),
            flatness: NoiseLayer::new(0.004, 1.0, 2),
            remap: RemapCurve::default(),
        }
    }
}

impl NoiseSettings {
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.continent.validate("continent")?;
        self.mountain.validate("mountain")?;
        self.mountain_mask.validate("mountain_mask")?;
        self.detail.validate("detail")?;
        self.flatness.validate("flatness")?;
        if !self.base_height.is_finite() || !self.vertical_scale.is_finite() {
            return Err(ConfigError::Density("base_height and vertical_scale must be finite".into()));
        }
        self.remap.validate()
    }
}

/// Источник плотности
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DensityConfig {
    /// Карта высот: density = iso - (y - height(x, z))
    Heightfield(NoiseSettings),
    /// Планета: density = iso + (radius + height(dir) - |p - center|) * scale
    Planet {
        noise: NoiseSettings,
        center: [f32; 3],
        radius: f32,
        scale: f32,
    },
    /// Плоская поверхность на фиксированной высоте
    Flat { height: f32 },
}

impl Default for DensityConfig {
    fn default() -> Self {
        DensityConfig::Heightfield(NoiseSettings::default())
    }
}

impl DensityConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        match self {
            DensityConfig::Heightfield(noise) => noise.validate(),
            DensityConfig::Planet { noise, center, radius, scale } => {
                noise.validate()?;
                if center.iter().any(|c| !c.is_finite()) {
                    return Err(ConfigError::Density("planet center must be finite".into()));
                }
                if !radius.is_finite() || *radius <= 0.0 {
                    return Err(ConfigError::Density(format!("planet radius must be positive, got {}", radius)));
                }
                if !scale.is_finite() || *scale <= 0.0 {
                    return Err(ConfigError::Density(format!("planet scale must be positive, got {}", scale)));
                }
                Ok(())
            }
            DensityConfig::Flat { height } => {
                if !height.is_finite() {
                    return Err(ConfigError::Density("flat height must be finite".into()));
                }
                Ok(())
            }
        }
    }
}

/// Таблица LOD-колец
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LodConfig {
    pub levels: Vec<LodLevel>,
}

impl Default for LodConfig {
    fn default() -> Self {
        Self { levels: LodLevel::DEFAULT_LEVELS.to_vec() }
    }
}

/// Ограничения кистей (проверяются при создании кисти)
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BrushLimits {
    pub max_radius: f32,
    pub max_intensity: f32,
}

impl Default for BrushLimits {
    fn default() -> Self {
        Self { max_radius: 64.0, max_intensity: 1.0 }
    }
}

impl BrushLimits {
    fn validate(&self) -> Result<(), ConfigError> {
        if !self.max_radius.is_finite() || self.max_radius <= 0.0 {
            return Err(ConfigError::Brush(format!("max_radius must be positive, got {}", self.max_radius)));
        }
        if !self.max_intensity.is_finite() || self.max_intensity <= 0.0 {
            return Err(ConfigError::Brush(format!("max_intensity must be positive, got {}", self.max_intensity)));
        }
        Ok(())
    }
}

/// Вертикальная полоса чанков вокруг наблюдателя
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamingConfig {
    /// Нижний слой чанков (абсолютный chunk y)
    pub min_chunk_y: i32,
    /// Верхний слой чанков (включительно)
    pub max_chunk_y: i32,
}

impl Default for StreamingConfig {
    fn default() -> Self {
        Self { min_chunk_y: -1, max_chunk_y: 2 }
    }
}

/// Полная конфигурация terrain
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TerrainConfig {
    pub chunk_size: u32,
    /// Порог поверхности, строго внутри (0, 1)
    pub iso_level: f32,
    /// Ширина переходной зоны плотности в мировых единицах:
    /// density = iso + signed_distance / surface_falloff
    pub surface_falloff: f32,
    pub worker_threads: usize,
    /// Интервал ожидания пустой очереди воркером
    pub poll_interval_ms: u64,
    /// Сэмплов на ось в грубом пре-тесте пустоты
    pub pretest_samples: u32,
    pub density: DensityConfig,
    pub lod: LodConfig,
    pub biomes: Vec<BiomeBand>,
    pub modifiers: Vec<ModifierConfig>,
    pub brush: BrushLimits,
    pub streaming: StreamingConfig,
}

impl Default for TerrainConfig {
    fn default() -> Self {
        Self {
            chunk_size: 32,
            iso_level: 0.5,
            surface_falloff: 16.0,
            worker_threads: default_worker_threads(),
            poll_interval_ms: 50,
            pretest_samples: 2,
            density: DensityConfig::default(),
            lod: LodConfig::default(),
            biomes: BiomeBand::default_bands(),
            modifiers: Vec::new(),
            brush: BrushLimits::default(),
            streaming: StreamingConfig::default(),
        }
    }
}

fn default_worker_threads() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get().saturating_sub(1).max(1))
        .unwrap_or(2)
}

impl TerrainConfig {
    /// Загрузить конфиг из JSON строки (с валидацией)
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: TerrainConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Загрузить конфиг из файла
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path.as_ref())?;
        Self::from_json_str(&content)
    }

    /// Проверка всех параметров; вызывается до старта воркеров
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.chunk_size == 0 {
            return Err(ConfigError::ChunkSize(self.chunk_size));
        }
        if self.chunk_size > MAX_CHUNK_SIZE {
            return Err(ConfigError::ChunkSizeTooLarge(self.chunk_size, MAX_CHUNK_SIZE));
        }
        // плотность зажата в [0, 1]: ISO на краях никогда не пересекается
        if !(self.iso_level > 0.0 && self.iso_level < 1.0) {
            return Err(ConfigError::IsoLevel(self.iso_level));
        }
        if self.worker_threads == 0 {
            return Err(ConfigError::NoWorkers);
        }
        if self.pretest_samples < 2 {
            return Err(ConfigError::PretestSamples(self.pretest_samples));
        }
        self.density.validate()?;
        LodLevel::validate_table(&self.lod.levels)?;
        // оба конца ребра самого грубого LOD должны лежать в линейной зоне
        let required = self.coarsest_step() as f32 / self.iso_level.min(1.0 - self.iso_level);
        if !self.surface_falloff.is_finite() || self.surface_falloff < required {
            return Err(ConfigError::SurfaceFalloff { falloff: self.surface_falloff, required });
        }
        BiomeBand::validate_bands(&self.biomes)?;
        for (index, modifier) in self.modifiers.iter().enumerate() {
            modifier.validate().map_err(|reason| ConfigError::Modifier { index, reason })?;
        }
        self.brush.validate()?;
        if self.streaming.min_chunk_y > self.streaming.max_chunk_y {
            return Err(ConfigError::Lod(format!(
                "vertical band is empty: {}..={}",
                self.streaming.min_chunk_y, self.streaming.max_chunk_y
            )));
        }
        Ok(())
    }

    /// Самый грубый LOD таблицы
    #[inline]
    pub fn max_lod(&self) -> u8 {
        self.lod.levels.len().saturating_sub(1) as u8
    }

    /// Шаг сетки самого грубого LOD в мировых единицах
    #[inline]
    pub fn coarsest_step(&self) -> u32 {
        1 << self.max_lod()
    }

    /// Число сэмплов сетки на ось: N + 1
    #[inline]
    pub fn grid_samples(&self) -> u32 {
        self.chunk_size + 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        TerrainConfig::default().validate().unwrap();
    }

    #[test]
    fn test_zero_chunk_size_fails_fast() {
        let config = TerrainConfig { chunk_size: 0, ..Default::default() };
        assert!(matches!(config.validate(), Err(ConfigError::ChunkSize(0))));
    }

    #[test]
    fn test_iso_level_outside_unit_interval_rejected() {
        for iso in [0.0, 1.0, 1.5, -0.2, f32::NAN] {
            let config = TerrainConfig { iso_level: iso, ..Default::default() };
            assert!(matches!(config.validate(), Err(ConfigError::IsoLevel(_))), "iso {}", iso);
        }
        let config = TerrainConfig { iso_level: 0.3, surface_falloff: 32.0, ..Default::default() };
        config.validate().unwrap();
    }

    #[test]
    fn test_surface_falloff_covers_coarsest_step() {
        // 4 кольца -> шаг 8, при ISO 0.5 нужна зона 16
        let config = TerrainConfig { surface_falloff: 8.0, ..Default::default() };
        match config.validate() {
            Err(ConfigError::SurfaceFalloff { required, .. }) => assert_eq!(required, 16.0),
            other => panic!("unexpected result: {:?}", other),
        }
        let config = TerrainConfig {
            surface_falloff: 2.0,
            lod: LodConfig { levels: vec![LodLevel { min_chunks: 0, max_chunks: 4 }] },
            ..Default::default()
        };
        config.validate().unwrap();
        assert_eq!(config.max_lod(), 0);
    }

    #[test]
    fn test_missing_biomes_fails_fast() {
        let config = TerrainConfig { biomes: Vec::new(), ..Default::default() };
        assert!(matches!(config.validate(), Err(ConfigError::MissingBiomes)));
    }

    #[test]
    fn test_bad_noise_layer_is_reported() {
        let mut noise = NoiseSettings::default();
        noise.detail.octaves = 0;
        let config = TerrainConfig { density: DensityConfig::Heightfield(noise), ..Default::default() };
        match config.validate() {
            Err(ConfigError::NoiseLayer { layer, .. }) => assert_eq!(layer, "detail"),
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_json_partial_config_uses_defaults() {
        let json = r#"{
            "chunk_size": 16,
            "iso_level": 0.5,
            "worker_threads": 2,
            "density": { "kind": "flat", "height": 8.0 },
            "biomes": [
                { "min_height": 0.0, "gradient": [[0.0, [0.1, 0.5, 0.1]]] },
                { "min_height": 20.0, "gradient": [[0.0, [0.9, 0.9, 0.9]]] }
            ]
        }"#;
        let config = TerrainConfig::from_json_str(json).unwrap();
        assert_eq!(config.chunk_size, 16);
        assert_eq!(config.density, DensityConfig::Flat { height: 8.0 });
        assert_eq!(config.lod.levels.len(), LodLevel::DEFAULT_LEVELS.len());
        assert_eq!(config.biomes.len(), 2);
    }

    #[test]
    fn test_json_invalid_values_rejected() {
        let json = r#"{ "chunk_size": 0 }"#;
        assert!(TerrainConfig::from_json_str(json).is_err());
        assert!(matches!(TerrainConfig::from_json_str("{ not json"), Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_planet_radius_must_be_positive() {
        let config = TerrainConfig {
            density: DensityConfig::Planet {
                noise: NoiseSettings::default(),
                center: [0.0; 3],
                radius: -5.0,
                scale: 1.0,
            },
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::Density(_))));
    }
}
