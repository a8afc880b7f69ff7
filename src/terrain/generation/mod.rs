// ============================================
// Generation Module - Синтез поля плотности
// ============================================
//
// Слоёный шум высот -> источник плотности (карта высот / планета)
// -> модификаторы плотности -> сетка чанка

mod curve;
mod field;
mod height;
mod sampler;

pub use curve::RemapCurve;
pub use field::{DensityField, DensitySource};
pub use height::{FlatHeight, HeightFunction, LayeredHeight};
pub use sampler::{fill_density_grid, sample_position, should_generate_chunk};
