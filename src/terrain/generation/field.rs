// ============================================
// Density Field - Источник плотности + модификаторы
// ============================================
//
// density = iso + signed_distance / falloff, зажато в [0, 1].
// Положительная дистанция = внутри (твёрдое), поэтому граница ISO
// лежит ровно на поверхности функции высоты. Линейная зона шириной
// в falloff держит оба конца ребра грубого LOD незажатыми.

use std::fmt;
use std::sync::Arc;

use ultraviolet::Vec3;

use crate::terrain::biomes::ModifierStack;
use crate::terrain::config::{DensityConfig, TerrainConfig};
use crate::terrain::error::ConfigError;

use super::height::{FlatHeight, HeightFunction, LayeredHeight};

/// Ширина переходной зоны по умолчанию (шаг LOD 3 при ISO 0.5)
pub const DEFAULT_SURFACE_FALLOFF: f32 = 16.0;

/// Форма поверхности: карта высот или сфера
#[derive(Clone)]
pub enum DensitySource {
    Heightfield {
        height: Arc<dyn HeightFunction>,
    },
    Sphere {
        height: Arc<dyn HeightFunction>,
        center: Vec3,
        radius: f32,
        scale: f32,
    },
}

impl fmt::Debug for DensitySource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DensitySource::Heightfield { .. } => f.write_str("Heightfield"),
            DensitySource::Sphere { center, radius, scale, .. } => f
                .debug_struct("Sphere")
                .field("center", center)
                .field("radius", radius)
                .field("scale", scale)
                .finish(),
        }
    }
}

impl DensitySource {
    /// Карта высот из любой функции/замыкания
    pub fn heightfield<H: HeightFunction + 'static>(height: H) -> Self {
        DensitySource::Heightfield { height: Arc::new(height) }
    }

    /// Знаковая дистанция до поверхности (> 0 внутри)
    #[inline]
    pub fn signed_distance(&self, p: Vec3) -> f32 {
        match self {
            DensitySource::Heightfield { height } => height.height(p.x, p.z) - p.y,
            DensitySource::Sphere { height, center, radius, scale } => {
                let offset = p - *center;
                let distance = offset.mag();
                // в центре направление не определено - берём любое
                let dir = if distance > 1e-6 { offset / distance } else { Vec3::unit_y() };
                (*radius + height.radial_height(dir, *radius) - distance) * *scale
            }
        }
    }
}

/// Детерминированное поле плотности
#[derive(Clone, Debug)]
pub struct DensityField {
    source: DensitySource,
    iso: f32,
    falloff: f32,
    modifiers: ModifierStack,
}

impl DensityField {
    pub fn new(source: DensitySource, iso: f32) -> Self {
        Self { source, iso, falloff: DEFAULT_SURFACE_FALLOFF, modifiers: ModifierStack::default() }
    }

    pub fn with_falloff(mut self, falloff: f32) -> Self {
        self.falloff = falloff;
        self
    }

    pub fn with_modifiers(mut self, modifiers: ModifierStack) -> Self {
        self.modifiers = modifiers;
        self
    }

    /// Собрать поле из конфига (источник + модификаторы плотности)
    pub fn from_config(config: &TerrainConfig) -> Result<Self, ConfigError> {
        config.density.validate()?;
        let source = match &config.density {
            DensityConfig::Heightfield(noise) => DensitySource::heightfield(LayeredHeight::new(noise.clone())),
            DensityConfig::Planet { noise, center, radius, scale } => DensitySource::Sphere {
                height: Arc::new(LayeredHeight::new(noise.clone())),
                center: Vec3::from(*center),
                radius: *radius,
                scale: *scale,
            },
            DensityConfig::Flat { height } => DensitySource::heightfield(FlatHeight(*height)),
        };
        let modifiers = ModifierStack::from_configs(&config.modifiers)?;
        Ok(Self::new(source, config.iso_level)
            .with_falloff(config.surface_falloff)
            .with_modifiers(modifiers))
    }

    #[inline]
    pub fn iso(&self) -> f32 {
        self.iso
    }

    #[inline]
    pub fn falloff(&self) -> f32 {
        self.falloff
    }

    pub fn source(&self) -> &DensitySource {
        &self.source
    }

    pub fn modifiers(&self) -> &ModifierStack {
        &self.modifiers
    }

    /// Высота колонны (x, z), если источник - карта высот
    #[inline]
    pub fn column_height(&self, x: f32, z: f32) -> Option<f32> {
        match &self.source {
            DensitySource::Heightfield { height } => Some(height.height(x, z)),
            DensitySource::Sphere { .. } => None,
        }
    }

    /// Плотность в мировой точке
    #[inline]
    pub fn sample(&self, p: Vec3) -> f32 {
        self.finish(p, self.source.signed_distance(p))
    }

    /// Плотность карты высот при уже посчитанной высоте колонны
    #[inline]
    pub fn sample_with_height(&self, p: Vec3, height: f32) -> f32 {
        self.finish(p, height - p.y)
    }

    /// Модификаторы работают с дистанцией, нормировка в самом конце
    #[inline]
    fn finish(&self, p: Vec3, distance: f32) -> f32 {
        let distance = if self.modifiers.has_density() {
            self.modifiers.apply_density(p, distance)
        } else {
            distance
        };
        (self.iso + distance / self.falloff).clamp(0.0, 1.0)
    }
}
