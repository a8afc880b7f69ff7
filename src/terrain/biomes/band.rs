// ============================================
// Biome Bands - Высотные полосы биомов
// ============================================

use serde::{Deserialize, Serialize};

use crate::terrain::error::ConfigError;
use crate::terrain::voxel::lerp;

/// Ключ градиента: (позиция 0..1, цвет RGB)
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct GradientKey(pub f32, pub [f32; 3]);

/// Цветовой градиент биома (ключи по возрастанию позиции)
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ColorGradient {
    keys: Vec<GradientKey>,
}

impl ColorGradient {
    pub fn new(keys: Vec<GradientKey>) -> Self {
        Self { keys }
    }

    /// Одноцветный градиент
    pub fn solid(color: [f32; 3]) -> Self {
        Self { keys: vec![GradientKey(0.0, color)] }
    }

    pub fn keys(&self) -> &[GradientKey] {
        &self.keys
    }

    fn is_well_formed(&self) -> bool {
        self.keys.iter().all(|k| (0.0..=1.0).contains(&k.0) && k.1.iter().all(|c| c.is_finite()))
            && self.keys.windows(2).all(|w| w[0].0 <= w[1].0)
    }

    /// Цвет в позиции t (за крайними ключами - зажим)
    pub fn evaluate(&self, t: f32) -> [f32; 3] {
        let (first, last) = match (self.keys.first(), self.keys.last()) {
            (Some(first), Some(last)) => (*first, *last),
            _ => return [0.0; 3],
        };
        if t <= first.0 {
            return first.1;
        }
        if t >= last.0 {
            return last.1;
        }
        let upper = self.keys.partition_point(|k| k.0 <= t);
        let a = self.keys[upper - 1];
        let b = self.keys[upper];
        let span = b.0 - a.0;
        let f = if span > 0.0 { (t - a.0) / span } else { 0.0 };
        [lerp(a.1[0], b.1[0], f), lerp(a.1[1], b.1[1], f), lerp(a.1[2], b.1[2], f)]
    }

    /// Репрезентативный цвет полосы (середина градиента)
    #[inline]
    pub fn representative(&self) -> [f32; 3] {
        self.evaluate(0.5)
    }
}

/// Полоса биома: от `min_height` до начала следующей полосы
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BiomeBand {
    pub min_height: f32,
    pub gradient: ColorGradient,
}

impl BiomeBand {
    pub fn new(min_height: f32, gradient: ColorGradient) -> Self {
        Self { min_height, gradient }
    }

    /// Песок -> трава -> скалы -> снег
    pub fn default_bands() -> Vec<BiomeBand> {
        vec![
            BiomeBand::new(
                0.0,
                ColorGradient::new(vec![
                    GradientKey(0.0, [0.76, 0.70, 0.50]),
                    GradientKey(1.0, [0.82, 0.76, 0.56]),
                ]),
            ),
            BiomeBand::new(
                12.0,
                ColorGradient::new(vec![
                    GradientKey(0.0, [0.30, 0.55, 0.20]),
                    GradientKey(1.0, [0.22, 0.45, 0.15]),
                ]),
            ),
            BiomeBand::new(
                40.0,
                ColorGradient::new(vec![
                    GradientKey(0.0, [0.45, 0.42, 0.38]),
                    GradientKey(1.0, [0.55, 0.52, 0.48]),
                ]),
            ),
            BiomeBand::new(64.0, ColorGradient::solid([0.95, 0.95, 0.97])),
        ]
    }

    /// Полосы непустые, отсортированы строго по min_height
    pub fn validate_bands(bands: &[BiomeBand]) -> Result<(), ConfigError> {
        if bands.is_empty() {
            return Err(ConfigError::MissingBiomes);
        }
        for (index, band) in bands.iter().enumerate() {
            if band.gradient.keys.is_empty() {
                return Err(ConfigError::EmptyGradient(index));
            }
            if !band.gradient.is_well_formed() {
                return Err(ConfigError::GradientKeys(index));
            }
            if !band.min_height.is_finite() {
                return Err(ConfigError::Density(format!("biome band {} has a non-finite min_height", index)));
            }
            if let Some(prev) = index.checked_sub(1).map(|i| &bands[i]) {
                if band.min_height <= prev.min_height {
                    return Err(ConfigError::UnsortedBiomes {
                        index,
                        height: band.min_height,
                        previous: prev.min_height,
                    });
                }
            }
        }
        Ok(())
    }
}
