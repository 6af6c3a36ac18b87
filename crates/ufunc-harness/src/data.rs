//! Seeded input generators

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rand_distr::{Distribution, Normal, Uniform};
use ufunc_core::{Error, NumericArray, Result};

/// Default seed for reproducible inputs
pub const DEFAULT_SEED: u64 = 42;

/// Deterministic source of benchmark inputs
pub struct DataGenerator {
    rng: ChaCha8Rng,
}

impl Default for DataGenerator {
    fn default() -> Self {
        Self::new(DEFAULT_SEED)
    }
}

impl DataGenerator {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: ChaCha8Rng::seed_from_u64(seed),
        }
    }

    /// `n` draws from `[low, high)`
    pub fn uniform_f32(&mut self, n: usize, low: f32, high: f32) -> Result<NumericArray> {
        if !(low < high) {
            return Err(Error::InvalidParameter(format!(
                "uniform range must satisfy low < high, got [{low}, {high})"
            )));
        }
        let dist = Uniform::new(low, high);
        Ok(NumericArray::from_vec(
            (0..n).map(|_| dist.sample(&mut self.rng)).collect(),
        ))
    }

    /// `n` draws from a normal distribution
    ///
    /// `std_dev` must be finite and non-negative.
    pub fn normal_f32(&mut self, n: usize, mean: f32, std_dev: f32) -> Result<NumericArray> {
        if !(std_dev.is_finite() && std_dev >= 0.0) || !mean.is_finite() {
            return Err(Error::InvalidParameter(format!(
                "normal distribution needs a finite mean and std_dev >= 0, got N({mean}, {std_dev})"
            )));
        }
        let dist = Normal::new(mean, std_dev)
            .map_err(|e| Error::InvalidParameter(format!("normal distribution: {e}")))?;
        Ok(NumericArray::from_vec(
            (0..n).map(|_| dist.sample(&mut self.rng)).collect(),
        ))
    }

    /// `n` integers from `[low, high)`
    pub fn integers_i64(&mut self, n: usize, low: i64, high: i64) -> Result<NumericArray> {
        if low >= high {
            return Err(Error::InvalidParameter(format!(
                "integer range must satisfy low < high, got [{low}, {high})"
            )));
        }
        Ok(NumericArray::from_vec(
            (0..n).map(|_| self.rng.gen_range(low..high)).collect(),
        ))
    }

    /// `[rows, 2]` array of points on the unit circle
    pub fn unit_vectors_f32(&mut self, rows: usize) -> Result<NumericArray> {
        let dist = Uniform::new(-std::f32::consts::PI, std::f32::consts::PI);
        let coords = (0..rows)
            .flat_map(|_| {
                let angle = dist.sample(&mut self.rng);
                [angle.cos(), angle.sin()]
            })
            .collect();
        NumericArray::from_shape_vec([rows, 2], coords)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seeded_generators_repeat() {
        let a = DataGenerator::new(7).uniform_f32(100, -3.0, 3.0).unwrap();
        let b = DataGenerator::new(7).uniform_f32(100, -3.0, 3.0).unwrap();
        assert!(a.bit_eq(&b));
        assert!(a
            .as_slice::<f32>()
            .unwrap()
            .iter()
            .all(|v| (-3.0..3.0).contains(v)));
    }

    #[test]
    fn test_invalid_ranges() {
        let mut gen = DataGenerator::default();
        assert!(gen.uniform_f32(1, 1.0, 1.0).is_err());
        assert!(gen.integers_i64(1, 5, 0).is_err());
        assert!(matches!(gen.normal_f32(1, 0.0, -1.0), Err(Error::InvalidParameter(_))));
        assert!(gen.normal_f32(1, 0.0, f32::NAN).is_err());
        assert!(gen.normal_f32(1, f32::INFINITY, 1.0).is_err());

        let flat = gen.normal_f32(4, 2.0, 0.0).unwrap();
        assert_eq!(flat.as_slice::<f32>().unwrap(), &[2.0; 4]);
    }

    #[test]
    fn test_unit_vectors_shape() {
        let v = DataGenerator::default().unit_vectors_f32(10).unwrap();
        assert_eq!(v.shape().dims(), &[10, 2]);
        for row in v.as_slice::<f32>().unwrap().chunks(2) {
            let norm = (row[0] * row[0] + row[1] * row[1]).sqrt();
            assert!((norm - 1.0).abs() < 1e-6);
        }
    }
}
