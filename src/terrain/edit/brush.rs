// ============================================
// Brush - Локальное редактирование плотности
// ============================================
//
// Кисть меняет сетку только внутри своего bbox (зажатого к сетке):
// amount = intensity * (1 - d / r), результат зажимается в [0, 1].
// Пересборка меша - забота пайплайна.

use log::warn;
use serde::{Deserialize, Serialize};
use ultraviolet::Vec3;

use crate::terrain::cache::ChunkCoord;
use crate::terrain::config::BrushLimits;
use crate::terrain::error::{ConfigError, TerrainError};
use crate::terrain::voxel::ChunkData;

/// Добавить или убрать материал
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BrushMode {
    Add,
    Subtract,
}

/// Параметры кисти (мировые координаты)
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Brush {
    center: Vec3,
    radius: f32,
    intensity: f32,
    mode: BrushMode,
}

impl Brush {
    /// Кисть проверяется сразу при создании, а не внутри воркера
    pub fn new(
        center: Vec3,
        radius: f32,
        intensity: f32,
        mode: BrushMode,
        limits: &BrushLimits,
    ) -> Result<Self, ConfigError> {
        if !(center.x.is_finite() && center.y.is_finite() && center.z.is_finite()) {
            return Err(ConfigError::Brush("center must be finite".into()));
        }
        if !radius.is_finite() || radius <= 0.0 || radius > limits.max_radius {
            return Err(ConfigError::Brush(format!(
                "radius must be in (0, {}], got {}",
                limits.max_radius, radius
            )));
        }
        if !intensity.is_finite() || intensity <= 0.0 || intensity > limits.max_intensity {
            return Err(ConfigError::Brush(format!(
                "intensity must be in (0, {}], got {}",
                limits.max_intensity, intensity
            )));
        }
        Ok(Self { center, radius, intensity, mode })
    }

    #[inline]
    pub fn center(&self) -> Vec3 {
        self.center
    }

    #[inline]
    pub fn radius(&self) -> f32 {
        self.radius
    }

    #[inline]
    pub fn intensity(&self) -> f32 {
        self.intensity
    }

    #[inline]
    pub fn mode(&self) -> BrushMode {
        self.mode
    }

    /// Величина эффекта на дистанции `d` (0 за радиусом)
    #[inline]
    pub fn falloff(&self, distance: f32) -> f32 {
        if distance >= self.radius {
            0.0
        } else {
            self.intensity * (1.0 - distance / self.radius)
        }
    }
}

/// Диапазон индексов сетки по одной оси, задетый кистью
fn axis_range(center: f32, radius: f32, max_index: u32) -> Option<(u32, u32)> {
    let lo = (center - radius).floor().max(0.0);
    let hi = (center + radius).ceil().min(max_index as f32);
    if lo > hi {
        None
    } else {
        Some((lo as u32, hi as u32))
    }
}

/// Применить кисть к сетке чанка LOD 0. Возвращает true, если что-то изменилось.
pub fn apply_brush(chunk: &mut ChunkData, brush: &Brush, chunk_size: u32) -> Result<bool, TerrainError> {
    if chunk.lod() != 0 {
        return Err(TerrainError::EditLod(chunk.lod()));
    }
    let expected = chunk_size + 1;
    if chunk.grid.samples() != expected {
        return Err(TerrainError::GridMismatch { expected, actual: chunk.grid.samples() });
    }

    // на LOD 0 шаг сетки = 1 мировой единице
    let local = brush.center - chunk.world_origin(chunk_size);
    let max_index = chunk_size;
    let ranges = (
        axis_range(local.x, brush.radius, max_index),
        axis_range(local.y, brush.radius, max_index),
        axis_range(local.z, brush.radius, max_index),
    );
    let ((x0, x1), (y0, y1), (z0, z1)) = match ranges {
        (Some(x), Some(y), Some(z)) => (x, y, z),
        _ => {
            warn!(
                "Brush at {:?} (r={}) does not touch chunk {}",
                brush.center,
                brush.radius,
                chunk.coord()
            );
            return Ok(false);
        }
    };

    let sign = match brush.mode {
        BrushMode::Add => 1.0,
        BrushMode::Subtract => -1.0,
    };

    let mut changed = false;
    for z in z0..=z1 {
        for y in y0..=y1 {
            for x in x0..=x1 {
                let d = (Vec3::new(x as f32, y as f32, z as f32) - local).mag();
                let amount = brush.falloff(d);
                if amount <= 0.0 {
                    continue;
                }
                let old = chunk.grid.get(x, y, z);
                let new = (old + sign * amount).clamp(0.0, 1.0);
                if new != old {
                    chunk.grid.set(x, y, z, new);
                    changed = true;
                }
            }
        }
    }
    Ok(changed)
}

/// Все чанки, чьи сэмплы (включая слой за границей) задевает кисть
pub fn affected_chunks(brush: &Brush, chunk_size: u32) -> Vec<ChunkCoord> {
    let cs = chunk_size as f32;
    let lo = brush.center - Vec3::broadcast(brush.radius);
    let hi = brush.center + Vec3::broadcast(brush.radius);
    // чанк c хранит сэмплы [c * cs, (c + 1) * cs]
    let first = |v: f32| (v / cs - 1.0).ceil() as i32;
    let last = |v: f32| (v / cs).floor() as i32;

    let mut coords = Vec::new();
    for z in first(lo.z)..=last(hi.z) {
        for y in first(lo.y)..=last(hi.y) {
            for x in first(lo.x)..=last(hi.x) {
                coords.push(ChunkCoord::new(x, y, z));
            }
        }
    }
    coords
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::terrain::cache::ChunkContext;
    use crate::terrain::mesh::Mesh;
    use crate::terrain::voxel::DensityGrid;

    fn chunk(fill: f32) -> ChunkData {
        ChunkData::new(
            ChunkContext::new(ChunkCoord::new(0, 0, 0), 0),
            DensityGrid::filled(9, fill),
            Mesh::default(),
        )
    }

    fn brush(center: Vec3, radius: f32, mode: BrushMode) -> Brush {
        Brush::new(center, radius, 1.0, mode, &BrushLimits::default()).unwrap()
    }

    #[test]
    fn test_add_never_exceeds_one() {
        let mut data = chunk(0.5);
        let b = brush(Vec3::new(4.0, 4.0, 4.0), 3.0, BrushMode::Add);
        for _ in 0..10 {
            apply_brush(&mut data, &b, 8).unwrap();
        }
        assert!(data.grid.values().iter().all(|v| *v <= 1.0));
        assert_eq!(data.grid.get(4, 4, 4), 1.0);
    }

    #[test]
    fn test_subtract_never_below_zero() {
        let mut data = chunk(0.5);
        let b = brush(Vec3::new(4.0, 4.0, 4.0), 3.0, BrushMode::Subtract);
        for _ in 0..10 {
            apply_brush(&mut data, &b, 8).unwrap();
        }
        assert!(data.grid.values().iter().all(|v| *v >= 0.0));
        assert_eq!(data.grid.get(4, 4, 4), 0.0);
    }

    #[test]
    fn test_only_inside_radius_changes() {
        let mut data = chunk(0.5);
        let b = Brush::new(Vec3::new(4.0, 4.0, 4.0), 2.0, 0.25, BrushMode::Add, &BrushLimits::default()).unwrap();
        assert!(apply_brush(&mut data, &b, 8).unwrap());
        assert_eq!(data.grid.get(4, 4, 4), 0.75);
        assert!((data.grid.get(5, 4, 4) - 0.625).abs() < 1e-6);
        // ровно на радиусе эффект нулевой
        assert_eq!(data.grid.get(6, 4, 4), 0.5);
        assert_eq!(data.grid.get(0, 0, 0), 0.5);
    }

    #[test]
    fn test_brush_outside_chunk_is_noop() {
        let mut data = chunk(0.5);
        let b = brush(Vec3::new(100.0, 4.0, 4.0), 3.0, BrushMode::Add);
        assert!(!apply_brush(&mut data, &b, 8).unwrap());
        assert!(data.grid.values().iter().all(|v| *v == 0.5));
    }

    #[test]
    fn test_coarse_chunk_rejected() {
        let mut data = chunk(0.5);
        data.context.lod = 1;
        let b = brush(Vec3::new(4.0, 4.0, 4.0), 3.0, BrushMode::Add);
        assert!(matches!(apply_brush(&mut data, &b, 8), Err(TerrainError::EditLod(1))));
        let mut data = chunk(0.5);
        assert!(matches!(apply_brush(&mut data, &b, 16), Err(TerrainError::GridMismatch { .. })));
    }

    #[test]
    fn test_invalid_brush_parameters() {
        let limits = BrushLimits::default();
        assert!(Brush::new(Vec3::zero(), 0.0, 1.0, BrushMode::Add, &limits).is_err());
        assert!(Brush::new(Vec3::zero(), 1000.0, 1.0, BrushMode::Add, &limits).is_err());
        assert!(Brush::new(Vec3::zero(), 4.0, -1.0, BrushMode::Add, &limits).is_err());
        assert!(Brush::new(Vec3::new(f32::NAN, 0.0, 0.0), 4.0, 1.0, BrushMode::Add, &limits).is_err());
    }

    #[test]
    fn test_affected_chunks_cover_border_layers() {
        // кисть внутри чанка (0,0,0), далеко от граней
        let b = brush(Vec3::new(16.0, 16.0, 16.0), 4.0, BrushMode::Add);
        assert_eq!(affected_chunks(&b, 32), vec![ChunkCoord::new(0, 0, 0)]);

        // кисть у грани x = 32: задевает и соседа
        let b = brush(Vec3::new(31.0, 16.0, 16.0), 4.0, BrushMode::Add);
        let coords = affected_chunks(&b, 32);
        assert!(coords.contains(&ChunkCoord::new(0, 0, 0)));
        assert!(coords.contains(&ChunkCoord::new(1, 0, 0)));
        assert_eq!(coords.len(), 2);

        // кисть у нуля: чанк -1 хранит слой x = 0 как свою границу
        let b = brush(Vec3::new(2.0, 16.0, 16.0), 4.0, BrushMode::Add);
        assert!(affected_chunks(&b, 32).contains(&ChunkCoord::new(-1, 0, 0)));
    }
}
