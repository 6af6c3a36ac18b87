//! Concrete kernels for the broadcast executor
//!
//! # Kernels
//!
//! | Kernel | Signature | Device |
//! |--------|-----------|--------|
//! | [`GaussianPdf`] | `float32(float32, float32, float32)` | yes |
//! | [`CpuGaussianPdf`] | generic float | yes |
//! | [`NormPdf`] | `float64(float64, float64, float64)` | host only |
//! | [`Add`] | generic | yes |
//! | [`AddTen`] | generic | yes |
//! | [`Hypot`] | `float64(float64, float64)` | yes |
//! | [`PolarToCartesian`] | `Tuple(float32, float32)(float32, float32)` | yes |
//! | [`PolarDistance`] | `float32(float32, float32, float32, float32)` | yes |
//! | [`MakePulses`] | `float32(float32, float32, float32)` | yes |
//! | [`L2Norm`] | `(i)->()` over `float32` | yes |

pub mod arith;
pub mod geometry;
pub mod norm;
pub mod pdf;
pub mod signal;

pub use arith::{Add, AddTen};
pub use geometry::{hypot, polar_to_cartesian, Hypot, PolarDistance, PolarToCartesian};
pub use norm::L2Norm;
pub use pdf::{norm_pdf, CpuGaussianPdf, GaussianPdf, NormPdf, SQRT_2PI};
pub use signal::MakePulses;

use tracing::debug;
use ufunc_core::{KernelRegistry, Result};

/// Registry of every scalar kernel in this crate
pub fn builtin_registry() -> Result<KernelRegistry> {
    let registry = KernelRegistry::new()
        .with(GaussianPdf)?
        .with(CpuGaussianPdf::<f32>::new())?
        .with(NormPdf)?
        .with(Add::<i64>::new())?
        .with(Add::<f32>::new())?
        .with(AddTen::<i64>::new())?
        .with(Hypot)?
        .with(PolarToCartesian)?
        .with(PolarDistance)?
        .with(MakePulses)?;
    debug!(kernels = registry.len(), "built builtin kernel registry");
    Ok(registry)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_registry() {
        let registry = builtin_registry().unwrap();
        assert_eq!(registry.len(), 10);
        assert_eq!(
            registry.names(),
            vec![
                "add_f32",
                "add_i64",
                "add_ten",
                "cpu_gaussian_pdf",
                "gaussian_pdf",
                "hypot",
                "make_pulses",
                "norm_pdf",
                "polar_distance",
                "polar_to_cartesian",
            ]
        );
        assert!(!registry.get("norm_pdf").unwrap().device_compatible());
        assert_eq!(
            registry.get("gaussian_pdf").unwrap().signature().to_string(),
            "float32(float32, float32, float32)"
        );
    }
}
