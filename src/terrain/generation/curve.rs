// ============================================
// Remap Curve - Кусочно-линейная кривая высот
// ============================================

use serde::{Deserialize, Serialize};

use crate::terrain::error::ConfigError;
use crate::terrain::voxel::lerp;

/// Кривая по контрольным точкам [x, y], отсортированным по x.
/// Пустая кривая - тождество; за крайними точками значение зажимается.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RemapCurve {
    points: Vec<[f32; 2]>,
}

impl RemapCurve {
    pub fn identity() -> Self {
        Self::default()
    }

    pub fn new(points: Vec<[f32; 2]>) -> Result<Self, ConfigError> {
        let curve = Self { points };
        curve.validate()?;
        Ok(curve)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.points.iter().flatten().any(|v| !v.is_finite()) {
            return Err(ConfigError::Density("remap curve points must be finite".into()));
        }
        if self.points.windows(2).any(|w| w[1][0] <= w[0][0]) {
            return Err(ConfigError::Density("remap curve points must be strictly increasing in x".into()));
        }
        Ok(())
    }

    #[inline]
    pub fn evaluate(&self, x: f32) -> f32 {
        let (first, last) = match (self.points.first(), self.points.last()) {
            (Some(first), Some(last)) => (*first, *last),
            _ => return x,
        };
        if x <= first[0] {
            return first[1];
        }
        if x >= last[0] {
            return last[1];
        }
        // первая точка с x > значения
        let upper = self.points.partition_point(|p| p[0] <= x);
        let a = self.points[upper - 1];
        let b = self.points[upper];
        lerp(a[1], b[1], (x - a[0]) / (b[0] - a[0]))
    }
}
