// ============================================
// Meshing Context - Переиспользуемые буферы
// ============================================
//
// Принцип "Alloc Once, Reuse Forever": треугольники собираются
// в scratch-буфер воркера, итоговый Mesh выделяется ровно по размеру.

use ultraviolet::Vec3;

/// Начальная ёмкость scratch (треугольников)
const INITIAL_TRIANGLES: usize = 4096;

/// Контекст генерации меша - scratch одного потока
pub struct MeshingContext {
    /// Треугольники в координатах сетки до расчёта нормалей
    pub triangles: Vec<[Vec3; 3]>,
    /// Сколько раз контекст использовался (для диагностики)
    pub uses: u64,
}

impl MeshingContext {
    pub fn new() -> Self {
        Self {
            triangles: Vec::with_capacity(INITIAL_TRIANGLES),
            uses: 0,
        }
    }

    /// Очищает буферы, сохраняя capacity
    #[inline]
    pub fn begin(&mut self) {
        self.triangles.clear();
        self.uses += 1;
    }
}

impl Default for MeshingContext {
    fn default() -> Self {
        Self::new()
    }
}
