// ============================================
// Marching Cubes - Извлечение поверхности из сетки плотности
// ============================================
//
// Угол "твёрдый", если плотность > ISO. Каждая вершина треугольника
// уникальна (без шаринга), нормаль общая на грань: фасетный вид.

use std::sync::atomic::AtomicBool;

use ultraviolet::Vec3;

use crate::terrain::error::{ensure_not_cancelled, TerrainError};
use crate::terrain::voxel::{with_meshing_context, DensityGrid};

use super::data::Mesh;
use super::normals::{flat_face_normal, geometric_normal, gradient_epsilon};
use super::tables::{CORNER_OFFSETS, EDGE_CORNERS, EDGE_TABLE, TRI_TABLE};

/// Цвет до прохода колоризатора
pub const UNCOLORED: [f32; 3] = [1.0, 1.0, 1.0];

/// Порог, ниже которого значения на концах ребра считаются равными
const EDGE_EPSILON: f32 = 1e-6;

/// Точка пересечения ISO на ребре: t = (iso - v0) / (v1 - v0).
/// При v0 ≈ v1 - середина ребра.
#[inline]
pub fn interpolate_edge(p0: Vec3, p1: Vec3, v0: f32, v1: f32, iso: f32) -> Vec3 {
    let dv = v1 - v0;
    if dv.abs() < EDGE_EPSILON {
        return (p0 + p1) * 0.5;
    }
    let t = ((iso - v0) / dv).clamp(0.0, 1.0);
    p0 + (p1 - p0) * t
}

/// Код случая: бит i выставлен, если угол i твёрдый
#[inline]
pub fn cube_case(values: &[f32; 8], iso: f32) -> usize {
    values
        .iter()
        .enumerate()
        .fold(0usize, |code, (i, &v)| if v > iso { code | (1 << i) } else { code })
}

/// Построить меш чанка из сетки плотности.
///
/// Позиции в локальных мировых единицах: индекс сетки * (1 << lod).
/// Отмена проверяется на каждом z-слое и при расчёте нормалей.
pub fn extract_surface(
    grid: &DensityGrid,
    lod: u8,
    iso: f32,
    cancel: &AtomicBool,
) -> Result<Mesh, TerrainError> {
    let cells = grid.cells();
    // Быстрый выход: поверхность не пересекает чанк
    if cells == 0 || !grid.straddles(iso) {
        return Ok(Mesh::default());
    }

    let step = (1u32 << lod) as f32;
    let eps = gradient_epsilon(lod);

    with_meshing_context(|ctx| {
        ctx.begin();

        for z in 0..cells {
            ensure_not_cancelled(cancel)?;
            for y in 0..cells {
                for x in 0..cells {
                    let mut values = [0.0f32; 8];
                    for (i, [ox, oy, oz]) in CORNER_OFFSETS.iter().enumerate() {
                        values[i] = grid.get(x + ox, y + oy, z + oz);
                    }

                    let case = cube_case(&values, iso);
                    let edges = EDGE_TABLE[case];
                    if edges == 0 {
                        continue;
                    }

                    let mut edge_points = [Vec3::zero(); 12];
                    for (edge, [a, b]) in EDGE_CORNERS.iter().enumerate() {
                        if edges & (1 << edge) == 0 {
                            continue;
                        }
                        edge_points[edge] = interpolate_edge(
                            corner_position(x, y, z, *a),
                            corner_position(x, y, z, *b),
                            values[*a],
                            values[*b],
                            iso,
                        );
                    }

                    for tri in TRI_TABLE[case].chunks_exact(3) {
                        if tri[0] < 0 {
                            break;
                        }
                        ctx.triangles.push([
                            edge_points[tri[0] as usize],
                            edge_points[tri[1] as usize],
                            edge_points[tri[2] as usize],
                        ]);
                    }
                }
            }
        }

        let mut mesh = Mesh::with_capacity(ctx.triangles.len() * 3);
        for (i, tri) in ctx.triangles.iter().enumerate() {
            if i % 1024 == 0 {
                ensure_not_cancelled(cancel)?;
            }
            // Вырожденные треугольники (вершина в углу куба) не эмитим
            let face = geometric_normal(tri);
            if face.mag_sq() < 1e-12 {
                continue;
            }
            let normal = flat_face_normal(grid, tri, eps);
            // Обход CCW со стороны пустоты
            let corners = if face.dot(normal) < 0.0 {
                [tri[0] * step, tri[2] * step, tri[1] * step]
            } else {
                [tri[0] * step, tri[1] * step, tri[2] * step]
            };
            mesh.push_flat_triangle(corners, normal, UNCOLORED);
        }

        Ok(mesh)
    })
}

#[inline(always)]
fn corner_position(x: u32, y: u32, z: u32, corner: usize) -> Vec3 {
    let [ox, oy, oz] = CORNER_OFFSETS[corner];
    Vec3::new((x + ox) as f32, (y + oy) as f32, (z + oz) as f32)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn not_cancelled() -> AtomicBool {
        AtomicBool::new(false)
    }

    /// Плотность = clamp(iso + (h - y)), как у плоского источника
    fn flat_grid(samples: u32, height: f32, iso: f32) -> DensityGrid {
        let mut grid = DensityGrid::filled(samples, 0.0);
        for z in 0..samples {
            for y in 0..samples {
                for x in 0..samples {
                    grid.set(x, y, z, (iso + height - y as f32).clamp(0.0, 1.0));
                }
            }
        }
        grid
    }

    #[test]
    fn test_edge_interpolation_hits_iso() {
        let cases = [(0.1f32, 0.9f32, 0.5f32), (-3.0, 2.0, 0.0), (0.49, 0.51, 0.5), (0.0, 1.0, 0.73)];
        for (v0, v1, iso) in cases {
            let p0 = Vec3::new(1.0, 2.0, 3.0);
            let p1 = Vec3::new(1.0, 3.0, 3.0);
            let p = interpolate_edge(p0, p1, v0, v1, iso);
            let t = (p - p0).mag() / (p1 - p0).mag();
            let resampled = v0 + (v1 - v0) * t;
            assert!((resampled - iso).abs() < 1e-5, "{} {} {}", v0, v1, iso);
        }
    }

    #[test]
    fn test_equal_values_use_midpoint() {
        let p = interpolate_edge(Vec3::zero(), Vec3::new(2.0, 0.0, 0.0), 0.5, 0.5, 0.5);
        assert_eq!(p, Vec3::new(1.0, 0.0, 0.0));
    }

    #[test]
    fn test_uniform_grids_are_empty() {
        let solid = DensityGrid::filled(9, 1.0);
        let air = DensityGrid::filled(9, 0.0);
        assert!(extract_surface(&solid, 0, 0.5, &not_cancelled()).unwrap().is_empty());
        assert!(extract_surface(&air, 0, 0.5, &not_cancelled()).unwrap().is_empty());
    }

    #[test]
    fn test_flat_surface_is_planar_and_faces_up() {
        let grid = flat_grid(9, 4.0, 0.5);
        let mesh = extract_surface(&grid, 0, 0.5, &not_cancelled()).unwrap();
        assert!(!mesh.is_empty());
        assert!(mesh.is_consistent());
        // 8x8 ячеек по 2 треугольника
        assert_eq!(mesh.triangle_count(), 128);
        for p in &mesh.positions {
            assert!((p.y - 4.0).abs() < 1e-5);
        }
        for n in &mesh.normals {
            assert!((*n - Vec3::unit_y()).mag() < 1e-4);
        }
        // обход CCW сверху
        for tri in mesh.indices.chunks_exact(3) {
            let corners = [
                mesh.positions[tri[0] as usize],
                mesh.positions[tri[1] as usize],
                mesh.positions[tri[2] as usize],
            ];
            assert!(geometric_normal(&corners).y > 0.0);
        }
    }

    #[test]
    fn test_lod_scales_positions() {
        let grid = flat_grid(9, 4.0, 0.5);
        let mesh = extract_surface(&grid, 1, 0.5, &not_cancelled()).unwrap();
        for p in &mesh.positions {
            assert!((p.y - 8.0).abs() < 1e-5);
            assert!(p.x <= 16.0 && p.z <= 16.0);
        }
    }

    #[test]
    fn test_vertices_are_not_shared() {
        let grid = flat_grid(5, 2.3, 0.5);
        let mesh = extract_surface(&grid, 0, 0.5, &not_cancelled()).unwrap();
        let mut sorted = mesh.indices.clone();
        sorted.sort_unstable();
        sorted.dedup();
        assert_eq!(sorted.len(), mesh.indices.len());
        assert_eq!(mesh.vertex_count(), mesh.indices.len());
    }

    #[test]
    fn test_cancelled_extraction_returns_cancelled() {
        let grid = flat_grid(9, 4.0, 0.5);
        let cancel = AtomicBool::new(true);
        let result = extract_surface(&grid, 0, 0.5, &cancel);
        assert!(matches!(result, Err(TerrainError::Cancelled)));
    }

    #[test]
    fn test_single_solid_corner_makes_one_triangle() {
        let mut grid = DensityGrid::filled(2, 0.0);
        grid.set(0, 0, 0, 1.0);
        let mesh = extract_surface(&grid, 0, 0.5, &not_cancelled()).unwrap();
        assert_eq!(mesh.triangle_count(), 1);
        // нормаль смотрит от твёрдого угла
        let n = mesh.normals[0];
        assert!(n.x > 0.0 && n.y > 0.0 && n.z > 0.0);
    }
}
