// ============================================
// Density Grid - Сетка плотности чанка
// ============================================
//
// (N+1)^3 сэмплов: лишний слой за границей чанка нужен,
// чтобы грани на стыке интерполировались так же, как у соседа.

use ndshape::{RuntimeShape, Shape};
use ultraviolet::Vec3;

/// Плотная 3D сетка значений плотности (x - самая быстрая ось)
#[derive(Clone, Debug, PartialEq)]
pub struct DensityGrid {
    samples: u32,
    values: Vec<f32>,
}

impl DensityGrid {
    /// Сетка `samples`^3, заполненная одним значением
    pub fn filled(samples: u32, value: f32) -> Self {
        let len = (samples as usize).pow(3);
        Self { samples, values: vec![value; len] }
    }

    /// Сэмплов на ось (N + 1)
    #[inline]
    pub fn samples(&self) -> u32 {
        self.samples
    }

    /// Логический размер чанка в ячейках (N)
    #[inline]
    pub fn cells(&self) -> u32 {
        self.samples.saturating_sub(1)
    }

    #[inline]
    pub fn shape(&self) -> RuntimeShape<u32, 3> {
        RuntimeShape::<u32, 3>::new([self.samples; 3])
    }

    #[inline]
    pub fn values(&self) -> &[f32] {
        &self.values
    }

    #[inline]
    pub fn values_mut(&mut self) -> &mut [f32] {
        &mut self.values
    }

    #[inline]
    pub fn get(&self, x: u32, y: u32, z: u32) -> f32 {
        self.values[self.shape().linearize([x, y, z]) as usize]
    }

    #[inline]
    pub fn set(&mut self, x: u32, y: u32, z: u32, value: f32) {
        let i = self.shape().linearize([x, y, z]) as usize;
        self.values[i] = value;
    }

    /// Минимум и максимум по всей сетке
    pub fn min_max(&self) -> (f32, f32) {
        self.values
            .iter()
            .fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), &v| (lo.min(v), hi.max(v)))
    }

    /// Пересекает ли поверхность ISO эту сетку
    pub fn straddles(&self, iso: f32) -> bool {
        let (lo, hi) = self.min_max();
        lo <= iso && hi > iso
    }

    /// Трилинейная выборка в координатах сетки (с зажимом к границам)
    pub fn sample_trilinear(&self, p: Vec3) -> f32 {
        let max = self.cells() as f32;
        let px = p.x.clamp(0.0, max);
        let py = p.y.clamp(0.0, max);
        let pz = p.z.clamp(0.0, max);

        let last = self.cells().saturating_sub(1);
        let x0 = (px.floor() as u32).min(last);
        let y0 = (py.floor() as u32).min(last);
        let z0 = (pz.floor() as u32).min(last);
        let (x1, y1, z1) = ((x0 + 1).min(self.cells()), (y0 + 1).min(self.cells()), (z0 + 1).min(self.cells()));

        let tx = px - x0 as f32;
        let ty = py - y0 as f32;
        let tz = pz - z0 as f32;

        let c00 = lerp(self.get(x0, y0, z0), self.get(x1, y0, z0), tx);
        let c10 = lerp(self.get(x0, y1, z0), self.get(x1, y1, z0), tx);
        let c01 = lerp(self.get(x0, y0, z1), self.get(x1, y0, z1), tx);
        let c11 = lerp(self.get(x0, y1, z1), self.get(x1, y1, z1), tx);

        let c0 = lerp(c00, c10, ty);
        let c1 = lerp(c01, c11, ty);
        lerp(c0, c1, tz)
    }

    /// Градиент поля (центральная разность по трилинейной выборке)
    pub fn gradient(&self, p: Vec3, eps: f32) -> Vec3 {
        let dx = Vec3::new(eps, 0.0, 0.0);
        let dy = Vec3::new(0.0, eps, 0.0);
        let dz = Vec3::new(0.0, 0.0, eps);
        Vec3::new(
            self.sample_trilinear(p + dx) - self.sample_trilinear(p - dx),
            self.sample_trilinear(p + dy) - self.sample_trilinear(p - dy),
            self.sample_trilinear(p + dz) - self.sample_trilinear(p - dz),
        ) / (2.0 * eps)
    }
}

#[inline(always)]
pub(crate) fn lerp(a: f32, b: f32, t: f32) -> f32 {
    a + (b - a) * t
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ramp_grid() -> DensityGrid {
        // плотность = y: градиент строго вверх
        let mut grid = DensityGrid::filled(5, 0.0);
        for z in 0..5 {
            for y in 0..5 {
                for x in 0..5 {
                    grid.set(x, y, z, y as f32);
                }
            }
        }
        grid
    }

    #[test]
    fn test_indexing_roundtrip() {
        let mut grid = DensityGrid::filled(4, 0.0);
        grid.set(3, 1, 2, 7.0);
        assert_eq!(grid.get(3, 1, 2), 7.0);
        assert_eq!(grid.values().iter().filter(|v| **v == 7.0).count(), 1);
        assert_eq!(grid.cells(), 3);
    }

    #[test]
    fn test_trilinear_matches_samples_and_midpoints() {
        let grid = ramp_grid();
        assert_eq!(grid.sample_trilinear(Vec3::new(1.0, 2.0, 3.0)), 2.0);
        assert!((grid.sample_trilinear(Vec3::new(1.3, 2.5, 0.7)) - 2.5).abs() < 1e-5);
        // зажим за границей
        assert_eq!(grid.sample_trilinear(Vec3::new(0.0, 10.0, 0.0)), 4.0);
    }

    #[test]
    fn test_gradient_points_up_on_ramp() {
        let grid = ramp_grid();
        let g = grid.gradient(Vec3::new(2.0, 2.0, 2.0), 0.25);
        assert!((g.y - 1.0).abs() < 1e-5);
        assert!(g.x.abs() < 1e-6 && g.z.abs() < 1e-6);
    }

    #[test]
    fn test_straddles() {
        let grid = ramp_grid();
        assert!(grid.straddles(0.5));
        assert!(!grid.straddles(10.0));
        assert!(!DensityGrid::filled(3, 0.2).straddles(0.5));
    }
}
