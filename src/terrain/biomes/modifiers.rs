// ============================================
// Modifiers - Модификаторы плотности и цвета
// ============================================
//
// Модификатор объявляет свои возможности (capabilities),
// пайплайн вызывает его только для заявленных стадий:
// - ModifiesDensity: во время синтеза, над знаковой дистанцией
//   до поверхности (до нормировки в плотность)
// - ModifiesColor: после базового прохода биомов
// Порядок вызова = порядок в конфиге.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use ultraviolet::{Vec2, Vec3};

use crate::terrain::error::ConfigError;
use crate::terrain::voxel::lerp;

/// Возможность модификатора
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Capability {
    ModifiesDensity,
    ModifiesColor,
}

/// Модификатор terrain
pub trait TerrainModifier: Send + Sync + fmt::Debug {
    fn name(&self) -> &str;

    fn capabilities(&self) -> &'static [Capability];

    #[inline]
    fn has(&self, capability: Capability) -> bool {
        self.capabilities().contains(&capability)
    }

    /// Вызывается только если заявлен ModifiesDensity.
    /// `distance` - знаковая дистанция до поверхности (> 0 внутри)
    fn modify_density(&self, _world: Vec3, distance: f32) -> f32 {
        distance
    }

    /// Вызывается только если заявлен ModifiesColor
    fn modify_color(&self, _world: Vec3, color: [f32; 3]) -> [f32; 3] {
        color
    }
}

/// Описание модификатора в конфиге
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ModifierConfig {
    /// Дорога/тропа: подкрашивает цвет вблизи ломаной (XZ)
    Path {
        points: Vec<[f32; 2]>,
        radius: f32,
        color: [f32; 3],
        #[serde(default = "default_strength")]
        strength: f32,
    },
    /// Плато: тянет поверхность к высоте `height` внутри радиуса
    Flatten {
        center: [f32; 2],
        radius: f32,
        height: f32,
        #[serde(default = "default_strength")]
        strength: f32,
    },
}

fn default_strength() -> f32 {
    1.0
}

impl ModifierConfig {
    pub fn validate(&self) -> Result<(), String> {
        let (radius, strength) = match self {
            ModifierConfig::Path { points, radius, strength, .. } => {
                if points.is_empty() {
                    return Err("path needs at least one point".into());
                }
                (*radius, *strength)
            }
            ModifierConfig::Flatten { radius, height, strength, .. } => {
                if !height.is_finite() {
                    return Err("flatten height must be finite".into());
                }
                (*radius, *strength)
            }
        };
        if !radius.is_finite() || radius <= 0.0 {
            return Err(format!("radius must be positive, got {}", radius));
        }
        if !(0.0..=1.0).contains(&strength) {
            return Err(format!("strength must be in [0, 1], got {}", strength));
        }
        Ok(())
    }

    pub fn build(&self) -> Arc<dyn TerrainModifier> {
        match self {
            ModifierConfig::Path { points, radius, color, strength } => Arc::new(PathModifier {
                points: points.iter().map(|p| Vec2::new(p[0], p[1])).collect(),
                radius: *radius,
                color: *color,
                strength: *strength,
            }),
            ModifierConfig::Flatten { center, radius, height, strength } => Arc::new(FlattenModifier {
                center: Vec2::new(center[0], center[1]),
                radius: *radius,
                height: *height,
                strength: *strength,
            }),
        }
    }
}

/// Мягкий спад: 1 в центре, 0 на радиусе
#[inline]
fn falloff(distance: f32, radius: f32) -> f32 {
    let t = (distance / radius).clamp(0.0, 1.0);
    1.0 - t * t * (3.0 - 2.0 * t)
}

/// Дистанция от точки до отрезка на плоскости XZ
fn distance_to_segment(p: Vec2, a: Vec2, b: Vec2) -> f32 {
    let ab = b - a;
    let len_sq = ab.mag_sq();
    if len_sq < 1e-12 {
        return (p - a).mag();
    }
    let t = ((p - a).dot(ab) / len_sq).clamp(0.0, 1.0);
    (p - (a + ab * t)).mag()
}

/// Подкраска вершин около ломаной (дороги, тропы)
#[derive(Clone, Debug)]
pub struct PathModifier {
    points: Vec<Vec2>,
    radius: f32,
    color: [f32; 3],
    strength: f32,
}

impl PathModifier {
    pub fn distance(&self, p: Vec2) -> f32 {
        match self.points.as_slice() {
            [] => f32::INFINITY,
            [single] => (p - *single).mag(),
            points => points
                .windows(2)
                .map(|w| distance_to_segment(p, w[0], w[1]))
                .fold(f32::INFINITY, f32::min),
        }
    }
}

impl TerrainModifier for PathModifier {
    fn name(&self) -> &str {
        "path"
    }

    fn capabilities(&self) -> &'static [Capability] {
        &[Capability::ModifiesColor]
    }

    fn modify_color(&self, world: Vec3, color: [f32; 3]) -> [f32; 3] {
        let d = self.distance(Vec2::new(world.x, world.z));
        if d >= self.radius {
            return color;
        }
        let w = falloff(d, self.radius) * self.strength;
        [
            lerp(color[0], self.color[0], w),
            lerp(color[1], self.color[1], w),
            lerp(color[2], self.color[2], w),
        ]
    }
}

/// Плато: смешивает плотность с плоскостью на высоте `height`
#[derive(Clone, Debug)]
pub struct FlattenModifier {
    center: Vec2,
    radius: f32,
    height: f32,
    strength: f32,
}

impl TerrainModifier for FlattenModifier {
    fn name(&self) -> &str {
        "flatten"
    }

    fn capabilities(&self) -> &'static [Capability] {
        &[Capability::ModifiesDensity]
    }

    fn modify_density(&self, world: Vec3, distance: f32) -> f32 {
        let d = (Vec2::new(world.x, world.z) - self.center).mag();
        if d >= self.radius {
            return distance;
        }
        let plateau = self.height - world.y;
        lerp(distance, plateau, falloff(d, self.radius) * self.strength)
    }
}

/// Списки модификаторов по возможностям (в порядке конфига)
#[derive(Clone, Debug, Default)]
pub struct ModifierStack {
    density: Vec<Arc<dyn TerrainModifier>>,
    color: Vec<Arc<dyn TerrainModifier>>,
}

impl ModifierStack {
    pub fn new(modifiers: Vec<Arc<dyn TerrainModifier>>) -> Self {
        let density = modifiers
            .iter()
            .filter(|m| m.has(Capability::ModifiesDensity))
            .cloned()
            .collect();
        let color = modifiers
            .into_iter()
            .filter(|m| m.has(Capability::ModifiesColor))
            .collect();
        Self { density, color }
    }

    pub fn from_configs(configs: &[ModifierConfig]) -> Result<Self, ConfigError> {
        let mut modifiers = Vec::with_capacity(configs.len());
        for (index, config) in configs.iter().enumerate() {
            config.validate().map_err(|reason| ConfigError::Modifier { index, reason })?;
            modifiers.push(config.build());
        }
        Ok(Self::new(modifiers))
    }

    #[inline]
    pub fn has_density(&self) -> bool {
        !self.density.is_empty()
    }

    #[inline]
    pub fn has_color(&self) -> bool {
        !self.color.is_empty()
    }

    #[inline]
    pub fn apply_density(&self, world: Vec3, distance: f32) -> f32 {
        self.density
            .iter()
            .fold(distance, |d, m| m.modify_density(world, d))
    }

    #[inline]
    pub fn apply_color(&self, world: Vec3, color: [f32; 3]) -> [f32; 3] {
        self.color.iter().fold(color, |c, m| m.modify_color(world, c))
    }
}
