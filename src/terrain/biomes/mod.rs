// ============================================
// Biomes Module - Цвет поверхности и модификаторы
// ============================================

mod band;
mod colorizer;
mod modifiers;

pub use band::{BiomeBand, ColorGradient, GradientKey};
pub use colorizer::BiomeColorizer;
pub use modifiers::{
    Capability, FlattenModifier, ModifierConfig, ModifierStack, PathModifier, TerrainModifier,
};
