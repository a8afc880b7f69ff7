// ============================================
// Mesh - Меш чанка (значение, рендер на стороне хоста)
// ============================================

use ultraviolet::Vec3;

use super::vertex::TerrainVertex;

/// Треугольный меш: позиции, индексы, нормали и цвета.
///
/// Инварианты: `normals.len() == colors.len() == positions.len()`,
/// `indices.len() % 3 == 0`. Позиции в локальных координатах чанка
/// (мировые единицы относительно угла чанка).
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Mesh {
    pub positions: Vec<Vec3>,
    pub indices: Vec<u32>,
    pub normals: Vec<Vec3>,
    pub colors: Vec<[f32; 3]>,
}

impl Mesh {
    pub fn with_capacity(vertices: usize) -> Self {
        Self {
            positions: Vec::with_capacity(vertices),
            indices: Vec::with_capacity(vertices),
            normals: Vec::with_capacity(vertices),
            colors: Vec::with_capacity(vertices),
        }
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    #[inline]
    pub fn vertex_count(&self) -> usize {
        self.positions.len()
    }

    #[inline]
    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    /// Добавить плоский треугольник: три уникальные вершины с общей нормалью
    pub fn push_flat_triangle(&mut self, corners: [Vec3; 3], normal: Vec3, color: [f32; 3]) {
        let base = self.positions.len() as u32;
        for corner in corners {
            self.positions.push(corner);
            self.normals.push(normal);
            self.colors.push(color);
        }
        self.indices.extend_from_slice(&[base, base + 1, base + 2]);
    }

    /// Проверка структурных инвариантов
    pub fn is_consistent(&self) -> bool {
        self.normals.len() == self.positions.len()
            && self.colors.len() == self.positions.len()
            && self.indices.len() % 3 == 0
            && self.indices.iter().all(|&i| (i as usize) < self.positions.len())
    }

    /// Интерливнутые вершины для GPU
    pub fn to_vertices(&self, origin: Vec3) -> Vec<TerrainVertex> {
        self.positions
            .iter()
            .zip(&self.normals)
            .zip(&self.colors)
            .map(|((p, n), c)| {
                let world = *p + origin;
                TerrainVertex::new([world.x, world.y, world.z], [n.x, n.y, n.z], *c)
            })
            .collect()
    }

    /// Сырые байты вершин и индексов (готовы для write_buffer)
    pub fn vertex_bytes(vertices: &[TerrainVertex]) -> &[u8] {
        bytemuck::cast_slice(vertices)
    }

    pub fn index_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.indices)
    }

    /// Ограничивающий бокс (None для пустого меша)
    pub fn bounds(&self) -> Option<(Vec3, Vec3)> {
        let first = *self.positions.first()?;
        Some(self.positions.iter().fold((first, first), |(lo, hi), p| {
            (lo.min_by_component(*p), hi.max_by_component(*p))
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flat_triangle_keeps_invariants() {
        let mut mesh = Mesh::default();
        let n = Vec3::unit_y();
        mesh.push_flat_triangle([Vec3::zero(), Vec3::unit_x(), Vec3::unit_z()], n, [1.0, 0.0, 0.0]);
        mesh.push_flat_triangle([Vec3::zero(), Vec3::unit_z(), Vec3::unit_x()], n, [0.0, 1.0, 0.0]);
        assert!(mesh.is_consistent());
        assert_eq!(mesh.vertex_count(), 6);
        assert_eq!(mesh.triangle_count(), 2);
        assert_eq!(mesh.indices, vec![0, 1, 2, 3, 4, 5]);
    }

    #[test]
    fn test_vertices_are_offset_to_world() {
        let mut mesh = Mesh::default();
        mesh.push_flat_triangle([Vec3::zero(), Vec3::unit_x(), Vec3::unit_z()], Vec3::unit_y(), [0.5; 3]);
        let verts = mesh.to_vertices(Vec3::new(32.0, 0.0, -32.0));
        assert_eq!(verts[1].position, [33.0, 0.0, -32.0]);
        assert_eq!(Mesh::vertex_bytes(&verts).len(), 3 * TerrainVertex::STRIDE);
        assert_eq!(mesh.index_bytes().len(), 12);
    }

    #[test]
    fn test_bounds() {
        assert!(Mesh::default().bounds().is_none());
        let mut mesh = Mesh::default();
        mesh.push_flat_triangle(
            [Vec3::new(1.0, 2.0, 3.0), Vec3::new(-1.0, 5.0, 0.0), Vec3::new(0.0, 0.0, 4.0)],
            Vec3::unit_y(),
            [0.0; 3],
        );
        let (lo, hi) = mesh.bounds().unwrap();
        assert_eq!(lo, Vec3::new(-1.0, 0.0, 0.0));
        assert_eq!(hi, Vec3::new(1.0, 5.0, 4.0));
    }
}
