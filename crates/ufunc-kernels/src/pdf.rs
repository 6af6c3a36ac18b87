//! Gaussian probability density kernels
//!
//! Three ways to evaluate the same density:
//!
//! - [`GaussianPdf`]: `float32` kernel that compiles for the device
//! - [`CpuGaussianPdf`]: the same formula generic over the float type, meant
//!   for host loops
//! - [`NormPdf`] / [`norm_pdf`]: the `statrs` normal distribution, used as a
//!   reference; it calls into a host library and cannot run on the device

use num_traits::{Float, FloatConst};
use statrs::distribution::{Continuous, Normal};
use std::marker::PhantomData;
use ufunc_core::{Element, Error, KernelOutput, NumericArray, Result, ScalarKernel};

/// `sqrt(2π)` rounded to `float32`
pub const SQRT_2PI: f32 = 2.506_628_3;

/// Density of `N(mean, sigma²)` at `x` in `float32`
#[derive(Clone, Copy, Debug, Default)]
pub struct GaussianPdf;

impl ScalarKernel for GaussianPdf {
    type Args = (f32, f32, f32);
    type Output = f32;

    fn name(&self) -> &'static str {
        "gaussian_pdf"
    }

    #[inline]
    fn call(&self, (x, mean, sigma): (f32, f32, f32)) -> f32 {
        let z = (x - mean) / sigma;
        (-0.5 * z * z).exp() / (sigma * SQRT_2PI)
    }
}

/// [`GaussianPdf`] for any float element type
///
/// `sqrt(2π)` is computed in `T`, so the `float64` instantiation keeps full
/// precision.
#[derive(Clone, Copy, Debug)]
pub struct CpuGaussianPdf<T>(PhantomData<T>);

impl<T> CpuGaussianPdf<T> {
    pub fn new() -> Self {
        Self(PhantomData)
    }
}

impl<T> Default for CpuGaussianPdf<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Element + KernelOutput + Float + FloatConst> ScalarKernel for CpuGaussianPdf<T> {
    type Args = (T, T, T);
    type Output = T;

    fn name(&self) -> &'static str {
        "cpu_gaussian_pdf"
    }

    #[inline]
    fn call(&self, (x, mean, sigma): (T, T, T)) -> T {
        let two = T::one() + T::one();
        let half = T::one() / two;
        let sqrt_2pi = (two * T::PI()).sqrt();
        let z = (x - mean) / sigma;
        (-(half * z * z)).exp() / (sigma * sqrt_2pi)
    }
}

/// Normal density from `statrs`, host only
///
/// Returns NaN where `sigma` is not a valid standard deviation.
#[derive(Clone, Copy, Debug, Default)]
pub struct NormPdf;

impl ScalarKernel for NormPdf {
    type Args = (f64, f64, f64);
    type Output = f64;

    fn name(&self) -> &'static str {
        "norm_pdf"
    }

    fn call(&self, (x, mean, sigma): (f64, f64, f64)) -> f64 {
        Normal::new(mean, sigma)
            .map(|normal| normal.pdf(x))
            .unwrap_or(f64::NAN)
    }

    fn device_compatible(&self) -> bool {
        false
    }
}

/// Reference density over a whole float array, evaluated in `float64`
pub fn norm_pdf(x: &NumericArray, mean: f64, sigma: f64) -> Result<NumericArray> {
    let normal = Normal::new(mean, sigma)
        .map_err(|e| Error::InvalidParameter(format!("normal({mean}, {sigma}): {e}")))?;
    let x = x.astype::<f64>()?;
    let values = x.as_slice::<f64>()?.iter().map(|&v| normal.pdf(v)).collect();
    NumericArray::from_shape_vec(x.shape().clone(), values)
}
