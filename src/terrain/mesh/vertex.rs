// ============================================
// Terrain Vertex - Структура вершины
// ============================================

/// Интерливнутая вершина для загрузки в GPU буфер хостом
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable, Default)]
pub struct TerrainVertex {
    pub position: [f32; 3],
    pub normal: [f32; 3],
    pub color: [f32; 3],
}

impl TerrainVertex {
    pub fn new(position: [f32; 3], normal: [f32; 3], color: [f32; 3]) -> Self {
        Self { position, normal, color }
    }

    /// Шаг вершины в байтах (для описания vertex layout)
    pub const STRIDE: usize = std::mem::size_of::<TerrainVertex>();
}
