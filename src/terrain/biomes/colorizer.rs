// ============================================
// Biome Colorizer - Цвет вершин по высоте
// ============================================
//
// Базовый проход: две полосы, между min_height которых лежит вершина,
// смешиваются по t = inverse_lerp. Потом модификаторы цвета по порядку.

use ultraviolet::Vec3;

use crate::terrain::error::ConfigError;
use crate::terrain::mesh::Mesh;
use crate::terrain::voxel::lerp;

use super::band::BiomeBand;
use super::modifiers::ModifierStack;

#[inline]
fn inverse_lerp(a: f32, b: f32, v: f32) -> f32 {
    ((v - a) / (b - a)).clamp(0.0, 1.0)
}

/// Раскраска мешей по упорядоченным полосам биомов
#[derive(Clone, Debug)]
pub struct BiomeColorizer {
    heights: Vec<f32>,
    colors: Vec<[f32; 3]>,
}

impl BiomeColorizer {
    pub fn new(bands: &[BiomeBand]) -> Result<Self, ConfigError> {
        BiomeBand::validate_bands(bands)?;
        Ok(Self {
            heights: bands.iter().map(|b| b.min_height).collect(),
            colors: bands.iter().map(|b| b.gradient.representative()).collect(),
        })
    }

    pub fn band_count(&self) -> usize {
        self.heights.len()
    }

    /// Цвет для мировой высоты; за крайними полосами - зажим
    pub fn color_for_height(&self, height: f32) -> [f32; 3] {
        // полосы непустые (проверено в new)
        let last = self.heights.len() - 1;
        if height <= self.heights[0] {
            return self.colors[0];
        }
        if height >= self.heights[last] {
            return self.colors[last];
        }
        let upper = self.heights.partition_point(|h| *h <= height);
        let lower = upper - 1;
        let t = inverse_lerp(self.heights[lower], self.heights[upper], height);
        let (a, b) = (self.colors[lower], self.colors[upper]);
        [lerp(a[0], b[0], t), lerp(a[1], b[1], t), lerp(a[2], b[2], t)]
    }

    /// Раскрасить все вершины меша (позиции локальные, `origin` - угол чанка)
    pub fn colorize(&self, mesh: &mut Mesh, origin: Vec3, modifiers: &ModifierStack) {
        for (position, color) in mesh.positions.iter().zip(mesh.colors.iter_mut()) {
            let world = origin + *position;
            let base = self.color_for_height(world.y);
            *color = if modifiers.has_color() {
                modifiers.apply_color(world, base)
            } else {
                base
            };
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::terrain::biomes::{ColorGradient, ModifierConfig};

    fn two_bands() -> Vec<BiomeBand> {
        vec![
            BiomeBand::new(0.0, ColorGradient::solid([0.0, 0.0, 0.0])),
            BiomeBand::new(10.0, ColorGradient::solid([1.0, 1.0, 1.0])),
        ]
    }

    #[test]
    fn test_heights_outside_bands_clamp() {
        let c = BiomeColorizer::new(&two_bands()).unwrap();
        assert_eq!(c.color_for_height(-100.0), [0.0, 0.0, 0.0]);
        assert_eq!(c.color_for_height(1e6), [1.0, 1.0, 1.0]);
        assert_eq!(c.color_for_height(0.0), [0.0, 0.0, 0.0]);
        assert_eq!(c.color_for_height(10.0), [1.0, 1.0, 1.0]);
    }

    #[test]
    fn test_blend_between_bands() {
        let c = BiomeColorizer::new(&two_bands()).unwrap();
        let mid = c.color_for_height(2.5);
        assert!((mid[0] - 0.25).abs() < 1e-6);
    }

    #[test]
    fn test_default_bands_clamp_to_extremes() {
        let bands = BiomeBand::default_bands();
        let c = BiomeColorizer::new(&bands).unwrap();
        assert_eq!(c.color_for_height(-50.0), bands[0].gradient.representative());
        assert_eq!(c.color_for_height(500.0), bands[bands.len() - 1].gradient.representative());
    }

    #[test]
    fn test_missing_bands_rejected() {
        assert!(matches!(BiomeColorizer::new(&[]), Err(ConfigError::MissingBiomes)));
    }

    #[test]
    fn test_colorize_uses_world_height_then_modifiers() {
        let c = BiomeColorizer::new(&two_bands()).unwrap();
        let mut mesh = Mesh::default();
        mesh.push_flat_triangle(
            [Vec3::new(0.0, 0.0, 0.0), Vec3::new(1.0, 0.0, 0.0), Vec3::new(0.0, 0.0, 1.0)],
            Vec3::unit_y(),
            [1.0, 1.0, 1.0],
        );
        // чанк на высоте 5: середина между полосами
        c.colorize(&mut mesh, Vec3::new(100.0, 5.0, 100.0), &ModifierStack::default());
        assert!(mesh.colors.iter().all(|col| (col[0] - 0.5).abs() < 1e-6));

        let path = ModifierStack::from_configs(&[ModifierConfig::Path {
            points: vec![[100.0, 100.0]],
            radius: 50.0,
            color: [1.0, 0.0, 0.0],
            strength: 1.0,
        }])
        .unwrap();
        c.colorize(&mut mesh, Vec3::new(100.0, 5.0, 100.0), &path);
        // вершина на самой точке пути - полностью цвет пути
        assert_eq!(mesh.colors[0], [1.0, 0.0, 0.0]);
    }
}
