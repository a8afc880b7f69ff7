// ============================================
// Normals - Плоские нормали из градиента поля
// ============================================

use ultraviolet::Vec3;

use crate::terrain::voxel::DensityGrid;

/// Эпсилон центральной разности в ячейках сетки.
///
/// LOD 0: маленький фиксированный шаг по трилинейной выборке.
/// Грубые LOD: ровно одна ячейка (= шаг LOD в мировых единицах).
#[inline]
pub fn gradient_epsilon(lod: u8) -> f32 {
    if lod == 0 {
        0.25
    } else {
        1.0
    }
}

/// Нормаль грани: усреднённый градиент трёх вершин, инвертированный
/// (плотность растёт внутрь тверди, нормаль смотрит в пустоту).
/// Если градиент вырожден - геометрическая нормаль треугольника.
pub fn flat_face_normal(grid: &DensityGrid, corners: &[Vec3; 3], eps: f32) -> Vec3 {
    let sum = corners
        .iter()
        .fold(Vec3::zero(), |acc, p| acc + grid.gradient(*p, eps));
    let normal = -(sum / 3.0);
    if normal.mag_sq() > 1e-12 {
        return normal.normalized();
    }
    let face = geometric_normal(corners);
    if face.mag_sq() > 1e-12 {
        face.normalized()
    } else {
        Vec3::unit_y()
    }
}

/// Ненормированная нормаль по правилу правой руки (CCW)
#[inline]
pub fn geometric_normal(corners: &[Vec3; 3]) -> Vec3 {
    (corners[1] - corners[0]).cross(corners[2] - corners[0])
}
