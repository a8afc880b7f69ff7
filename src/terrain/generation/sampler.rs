// ============================================
// Sampler - Заполнение сетки плотности чанка
// ============================================

use std::sync::atomic::AtomicBool;

use ndshape::Shape;
use ultraviolet::Vec3;

use crate::terrain::cache::ChunkContext;
use crate::terrain::error::{ensure_not_cancelled, TerrainError};
use crate::terrain::voxel::DensityGrid;

use super::field::DensityField;

/// Мировая позиция сэмпла (x, y, z) сетки чанка
#[inline]
pub fn sample_position(origin: Vec3, step: f32, x: u32, y: u32, z: u32) -> Vec3 {
    origin + Vec3::new(x as f32, y as f32, z as f32) * step
}

/// Заполнить сетку (N+1)^3 сэмплами поля в мировых координатах.
/// Соседние чанки сэмплируют общие грани в одних и тех же точках.
pub fn fill_density_grid(
    field: &DensityField,
    ctx: &ChunkContext,
    chunk_size: u32,
    cancel: &AtomicBool,
) -> Result<DensityGrid, TerrainError> {
    let samples = chunk_size + 1;
    let origin = ctx.world_origin(chunk_size);
    let step = ctx.step() as f32;

    let mut grid = DensityGrid::filled(samples, 0.0);
    let shape = grid.shape();
    let values = grid.values_mut();

    for z in 0..samples {
        ensure_not_cancelled(cancel)?;
        for x in 0..samples {
            // карта высот: одна высота на колонну
            let column = sample_position(origin, step, x, 0, z);
            let height = field.column_height(column.x, column.z);
            for y in 0..samples {
                let p = sample_position(origin, step, x, y, z);
                let i = shape.linearize([x, y, z]) as usize;
                values[i] = match height {
                    Some(h) => field.sample_with_height(p, h),
                    None => field.sample(p),
                };
            }
        }
    }

    Ok(grid)
}

/// Грубый пре-тест пустоты по решётке `samples_per_axis`^3 на объёме чанка.
///
/// false только если ВСЕ сэмплы строго по одну сторону ISO.
/// Тонкие детали между узлами решётки могут быть пропущены:
/// это допустимое приближение, а не ошибка.
pub fn should_generate_chunk(
    field: &DensityField,
    ctx: &ChunkContext,
    chunk_size: u32,
    samples_per_axis: u32,
) -> bool {
    let n = samples_per_axis.max(2);
    let origin = ctx.world_origin(chunk_size);
    let extent = ctx.world_extent(chunk_size);
    let spacing = extent / (n - 1) as f32;
    let iso = field.iso();

    let mut above = false;
    let mut below = false;
    for z in 0..n {
        for y in 0..n {
            for x in 0..n {
                let v = field.sample(sample_position(origin, spacing, x, y, z));
                if v > iso {
                    above = true;
                } else if v < iso {
                    below = true;
                } else {
                    // ровно на ISO - поверхность точно рядом
                    return true;
                }
                if above && below {
                    return true;
                }
            }
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::terrain::cache::ChunkCoord;
    use crate::terrain::config::TerrainConfig;
    use crate::terrain::generation::{DensitySource, FlatHeight};
    use crate::terrain::mesh::extract_surface;

    fn flat_field(height: f32) -> DensityField {
        DensityField::new(DensitySource::heightfield(FlatHeight(height)), 0.5)
    }

    fn live() -> AtomicBool {
        AtomicBool::new(false)
    }

    #[test]
    fn test_generation_is_bit_identical() {
        let field = DensityField::from_config(&TerrainConfig::default()).unwrap();
        let ctx = ChunkContext::new(ChunkCoord::new(3, 0, -2), 0);
        let a = fill_density_grid(&field, &ctx, 16, &live()).unwrap();
        let b = fill_density_grid(&field, &ctx, 16, &live()).unwrap();
        assert_eq!(a, b);
        let mesh_a = extract_surface(&a, 0, 0.5, &live()).unwrap();
        let mesh_b = extract_surface(&b, 0, 0.5, &live()).unwrap();
        assert_eq!(mesh_a, mesh_b);
    }

    #[test]
    fn test_flat_world_scenario() {
        let field = flat_field(16.0);
        let ctx = ChunkContext::new(ChunkCoord::new(0, 0, 0), 0);
        assert!(should_generate_chunk(&field, &ctx, 32, 2));

        let grid = fill_density_grid(&field, &ctx, 32, &live()).unwrap();
        assert_eq!(grid.samples(), 33);
        let mesh = extract_surface(&grid, 0, 0.5, &live()).unwrap();
        assert!(mesh.is_consistent());
        assert_eq!(mesh.triangle_count(), 32 * 32 * 2);

        let origin = ctx.world_origin(32);
        for p in &mesh.positions {
            let world_y = origin.y + p.y;
            assert!((world_y - 16.0).abs() < 1e-4, "vertex off the plane: {}", world_y);
        }
        for n in &mesh.normals {
            assert!((*n - Vec3::unit_y()).mag() < 1e-4);
        }
    }

    #[test]
    fn test_neighbor_chunks_share_border_samples() {
        let field = DensityField::from_config(&TerrainConfig::default()).unwrap();
        let a = ChunkContext::new(ChunkCoord::new(0, 0, 0), 0);
        let b = ChunkContext::new(ChunkCoord::new(1, 0, 0), 0);
        let ga = fill_density_grid(&field, &a, 8, &live()).unwrap();
        let gb = fill_density_grid(&field, &b, 8, &live()).unwrap();
        for z in 0..9 {
            for y in 0..9 {
                assert_eq!(ga.get(8, y, z).to_bits(), gb.get(0, y, z).to_bits());
            }
        }
    }

    #[test]
    fn test_empty_pretest_is_sound() {
        let field = flat_field(16.0);
        // чанк целиком над поверхностью
        let air = ChunkContext::new(ChunkCoord::new(0, 2, 0), 0);
        assert!(!should_generate_chunk(&field, &air, 32, 2));
        let grid = fill_density_grid(&field, &air, 32, &live()).unwrap();
        assert!(extract_surface(&grid, 0, 0.5, &live()).unwrap().is_empty());

        // чанк целиком под поверхностью
        let solid = ChunkContext::new(ChunkCoord::new(0, -2, 0), 0);
        assert!(!should_generate_chunk(&field, &solid, 32, 2));
        let grid = fill_density_grid(&field, &solid, 32, &live()).unwrap();
        assert!(extract_surface(&grid, 0, 0.5, &live()).unwrap().is_empty());
    }

    #[test]
    fn test_coarse_lod_spans_scaled_extent() {
        let field = flat_field(40.0);
        // LOD 1: чанк (0,0,0) покрывает y 0..64
        let ctx = ChunkContext::new(ChunkCoord::new(0, 0, 0), 1);
        assert!(should_generate_chunk(&field, &ctx, 32, 2));
        let grid = fill_density_grid(&field, &ctx, 32, &live()).unwrap();
        let mesh = extract_surface(&grid, 1, 0.5, &live()).unwrap();
        assert!(!mesh.is_empty());
        for p in &mesh.positions {
            assert!((p.y - 40.0).abs() < 1e-4);
        }
    }

    /// Максимальное отклонение вершин плоского мира от высоты поверхности
    fn flat_surface_error(height: f32, lod: u8) -> f32 {
        let field = flat_field(height);
        let ctx = ChunkContext::new(ChunkCoord::new(0, 0, 0), lod);
        let grid = fill_density_grid(&field, &ctx, 16, &live()).unwrap();
        let mesh = extract_surface(&grid, lod, 0.5, &live()).unwrap();
        assert!(!mesh.is_empty(), "no surface at h = {} lod = {}", height, lod);
        mesh.positions.iter().map(|p| (p.y - height).abs()).fold(0.0, f32::max)
    }

    #[test]
    fn test_off_grid_heights_are_exact_at_every_lod() {
        for (height, lod) in [(8.25, 0), (7.7, 0), (9.0, 3), (7.7, 3), (33.0, 2), (21.3, 1)] {
            let error = flat_surface_error(height, lod);
            assert!(error < 1e-3, "h = {} lod = {}: off by {}", height, lod, error);
        }
    }

    #[test]
    fn test_cancelled_fill() {
        let field = flat_field(16.0);
        let ctx = ChunkContext::new(ChunkCoord::new(0, 0, 0), 0);
        let cancel = AtomicBool::new(true);
        assert!(fill_density_grid(&field, &ctx, 8, &cancel).unwrap_err().is_cancelled());
    }
}
