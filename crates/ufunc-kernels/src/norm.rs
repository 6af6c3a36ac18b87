//! Row reductions

use ufunc_core::CoreKernel;

/// Euclidean length of each row, layout `(i)->()`
///
/// Squares are accumulated in `float64` and the result rounded to
/// `float32`.
#[derive(Clone, Copy, Debug, Default)]
pub struct L2Norm;

impl CoreKernel for L2Norm {
    type Elem = f32;

    fn name(&self) -> &'static str {
        "l2_norm"
    }

    fn layout(&self) -> &'static str {
        "(i)->()"
    }

    fn call(&self, row: &[f32]) -> f32 {
        let acc: f64 = row.iter().map(|&v| f64::from(v) * f64::from(v)).sum();
        acc.sqrt() as f32
    }
}
