// ============================================
// Height Map - Слоёная карта высот
// ============================================
//
// continent + mountain (ridged, под маской) + detail (гасится flatness)
// -> remap-кривая -> вертикальный масштаб

use noise::{Fbm, MultiFractal, NoiseFn, Perlin};
use ultraviolet::Vec3;

use crate::terrain::config::{NoiseLayer, NoiseSettings};

/// Функция высоты поверхности (композиция вместо наследования генераторов)
pub trait HeightFunction: Send + Sync {
    /// Высота поверхности в точке (x, z)
    fn height(&self, x: f32, z: f32) -> f32;

    /// Высота вдоль радиального направления (для планет)
    fn radial_height(&self, dir: Vec3, radius: f32) -> f32 {
        let p = dir * radius;
        self.height(p.x, p.z)
    }
}

impl<F> HeightFunction for F
where
    F: Fn(f32, f32) -> f32 + Send + Sync,
{
    #[inline]
    fn height(&self, x: f32, z: f32) -> f32 {
        self(x, z)
    }
}

/// Постоянная высота (плоский мир)
#[derive(Clone, Copy, Debug)]
pub struct FlatHeight(pub f32);

impl HeightFunction for FlatHeight {
    #[inline]
    fn height(&self, _x: f32, _z: f32) -> f32 {
        self.0
    }

    #[inline]
    fn radial_height(&self, _dir: Vec3, _radius: f32) -> f32 {
        self.0
    }
}

/// Слоёный шум высот с детерминированным сидом
pub struct LayeredHeight {
    settings: NoiseSettings,
    continent: Fbm<Perlin>,
    mountain: Fbm<Perlin>,
    mountain_mask: Fbm<Perlin>,
    detail: Fbm<Perlin>,
    flatness: Fbm<Perlin>,
}

fn build_layer(layer: &NoiseLayer, seed: u32) -> Fbm<Perlin> {
    Fbm::<Perlin>::new(seed)
        .set_octaves(layer.octaves as usize)
        .set_frequency(layer.frequency as f64)
}

#[inline(always)]
fn smoothstep(t: f32) -> f32 {
    let t = t.clamp(0.0, 1.0);
    t * t * (3.0 - 2.0 * t)
}

/// Сырые значения слоёв в точке
struct LayerSample {
    continent: f32,
    mountain: f32,
    mask: f32,
    detail: f32,
    flatness: f32,
}

impl LayeredHeight {
    pub fn new(settings: NoiseSettings) -> Self {
        let seed = settings.seed;
        Self {
            continent: build_layer(&settings.continent, seed),
            mountain: build_layer(&settings.mountain, seed ^ 0xA5A5_A5A5),
            mountain_mask: build_layer(&settings.mountain_mask, seed ^ 0x9C9C_9C9C),
            detail: build_layer(&settings.detail, seed ^ 0xB4B4_B4B4),
            flatness: build_layer(&settings.flatness, seed ^ 0x7D7D_7D7D),
            settings,
        }
    }

    pub fn settings(&self) -> &NoiseSettings {
        &self.settings
    }

    /// Композиция слоёв в "шумовых" единицах (до remap)
    fn compose(&self, s: LayerSample) -> f32 {
        let cfg = &self.settings;

        let continent = s.continent * cfg.continent.amplitude;

        // Маска гор: плавный переход, горы только в "горных" регионах
        let mask01 = (s.mask + 1.0) * 0.5;
        let mask = smoothstep((mask01 - 0.45) / 0.3) * cfg.mountain_mask.amplitude;

        // Ridged: 1 - |n| даёт острые гребни
        let ridge = (1.0 - s.mountain.abs()).powi(2);
        let mountains = ridge * cfg.mountain.amplitude * mask;

        // Плоские регионы гасят мелкую детализацию
        let flat = ((s.flatness + 1.0) * 0.5 * cfg.flatness.amplitude).clamp(0.0, 1.0);
        let detail = s.detail * cfg.detail.amplitude * (1.0 - flat);

        continent + mountains + detail
    }

    #[inline]
    fn finish(&self, combined: f32) -> f32 {
        self.settings.base_height + self.settings.remap.evaluate(combined) * self.settings.vertical_scale
    }
}

impl HeightFunction for LayeredHeight {
    fn height(&self, x: f32, z: f32) -> f32 {
        let p = [x as f64, z as f64];
        let sample = LayerSample {
            continent: self.continent.get(p) as f32,
            mountain: self.mountain.get(p) as f32,
            mask: self.mountain_mask.get(p) as f32,
            detail: self.detail.get(p) as f32,
            flatness: self.flatness.get(p) as f32,
        };
        self.finish(self.compose(sample))
    }

    /// Для планеты сэмплируем 3D шум на сфере радиуса `radius`
    fn radial_height(&self, dir: Vec3, radius: f32) -> f32 {
        let q = dir * radius;
        let p = [q.x as f64, q.y as f64, q.z as f64];
        let sample = LayerSample {
            continent: self.continent.get(p) as f32,
            mountain: self.mountain.get(p) as f32,
            mask: self.mountain_mask.get(p) as f32,
            detail: self.detail.get(p) as f32,
            flatness: self.flatness.get(p) as f32,
        };
        self.finish(self.compose(sample))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_seed_same_height() {
        let a = LayeredHeight::new(NoiseSettings::default());
        let b = LayeredHeight::new(NoiseSettings::default());
        for i in 0..32 {
            let x = i as f32 * 13.7 - 200.0;
            let z = i as f32 * -7.3 + 55.0;
            assert_eq!(a.height(x, z).to_bits(), b.height(x, z).to_bits());
        }
    }

    #[test]
    fn test_different_seed_changes_terrain() {
        let a = LayeredHeight::new(NoiseSettings::default());
        let b = LayeredHeight::new(NoiseSettings { seed: 7, ..NoiseSettings::default() });
        let differs = (0..64).any(|i| {
            let x = i as f32 * 31.1 + 0.37;
            a.height(x, x * 0.5) != b.height(x, x * 0.5)
        });
        assert!(differs);
    }

    #[test]
    fn test_heights_are_finite_and_bounded() {
        let settings = NoiseSettings::default();
        let h = LayeredHeight::new(settings.clone());
        let bound = settings.continent.amplitude
            + settings.mountain.amplitude * settings.mountain_mask.amplitude
            + settings.detail.amplitude;
        for i in 0..100 {
            let v = h.height(i as f32 * 97.0, i as f32 * -41.0);
            assert!(v.is_finite());
            // fbm может немного выходить за [-1, 1]
            assert!((v - settings.base_height).abs() <= 2.0 * bound * settings.vertical_scale);
        }
    }

    #[test]
    fn test_closure_is_a_height_function() {
        let f = |x: f32, _z: f32| x * 0.5;
        assert_eq!(f.height(4.0, 0.0), 2.0);
        assert_eq!(FlatHeight(16.0).height(123.0, -9.0), 16.0);
        assert_eq!(FlatHeight(16.0).radial_height(Vec3::unit_x(), 100.0), 16.0);
    }
}
