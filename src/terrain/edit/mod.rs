// ============================================
// Edit Module - Кисти редактирования terrain
// ============================================

mod brush;

pub use brush::{affected_chunks, apply_brush, Brush, BrushMode};
