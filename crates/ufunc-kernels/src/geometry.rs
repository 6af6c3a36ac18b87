//! Hypotenuse and polar-coordinate kernels

use ufunc_core::ScalarKernel;

/// Overflow-safe `sqrt(x² + y²)`
///
/// Scales by the larger magnitude so the square never overflows:
/// `max * sqrt(1 + (min / max)²)`.
#[inline]
pub fn hypot(x: f64, y: f64) -> f64 {
    let x = x.abs();
    let y = y.abs();
    let big = x.max(y);
    if big == 0.0 {
        return 0.0;
    }
    let t = x.min(y) / big;
    big * (1.0 + t * t).sqrt()
}

/// [`hypot`] as a kernel
#[derive(Clone, Copy, Debug, Default)]
pub struct Hypot;

impl ScalarKernel for Hypot {
    type Args = (f64, f64);
    type Output = f64;

    fn name(&self) -> &'static str {
        "hypot"
    }

    #[inline]
    fn call(&self, (x, y): (f64, f64)) -> f64 {
        hypot(x, y)
    }
}

/// `(rho cos θ, rho sin θ)`
#[inline]
pub fn polar_to_cartesian(rho: f32, theta: f32) -> (f32, f32) {
    let (sin, cos) = theta.sin_cos();
    (rho * cos, rho * sin)
}

/// [`polar_to_cartesian`] as a two-output kernel
#[derive(Clone, Copy, Debug, Default)]
pub struct PolarToCartesian;

impl ScalarKernel for PolarToCartesian {
    type Args = (f32, f32);
    type Output = (f32, f32);

    fn name(&self) -> &'static str {
        "polar_to_cartesian"
    }

    #[inline]
    fn call(&self, (rho, theta): (f32, f32)) -> (f32, f32) {
        polar_to_cartesian(rho, theta)
    }
}

/// Euclidean distance between two points given in polar coordinates
#[derive(Clone, Copy, Debug, Default)]
pub struct PolarDistance;

impl ScalarKernel for PolarDistance {
    type Args = (f32, f32, f32, f32);
    type Output = f32;

    fn name(&self) -> &'static str {
        "polar_distance"
    }

    #[inline]
    fn call(&self, (rho1, theta1, rho2, theta2): (f32, f32, f32, f32)) -> f32 {
        let (x1, y1) = polar_to_cartesian(rho1, theta1);
        let (x2, y2) = polar_to_cartesian(rho2, theta2);
        ((x1 - x2).powi(2) + (y1 - y2).powi(2)).sqrt()
    }
}
