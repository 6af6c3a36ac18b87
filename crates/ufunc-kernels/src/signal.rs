//! Signal synthesis kernels

use ufunc_core::ScalarKernel;

/// Clipped sine pulse: `max(sin(i / period) - 0.3, 0) * amplitude`
#[derive(Clone, Copy, Debug, Default)]
pub struct MakePulses;

impl MakePulses {
    /// Portion of each sine period cut off below the pulse
    pub const THRESHOLD: f32 = 0.3;
}

impl ScalarKernel for MakePulses {
    type Args = (f32, f32, f32);
    type Output = f32;

    fn name(&self) -> &'static str {
        "make_pulses"
    }

    #[inline]
    fn call(&self, (i, period, amplitude): (f32, f32, f32)) -> f32 {
        ((i / period).sin() - Self::THRESHOLD).max(0.0) * amplitude
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::f32::consts::FRAC_PI_2;

    #[test]
    fn test_pulse_shape() {
        let pulses = MakePulses;
        // peak of the sine
        assert_relative_eq!(pulses.call((FRAC_PI_2, 1.0, 100.0)), 70.0, epsilon = 1e-3);
        // below threshold
        assert_eq!(pulses.call((0.0, 1.0, 100.0)), 0.0);
        assert_eq!(pulses.call((-FRAC_PI_2, 1.0, 100.0)), 0.0);
    }

    #[test]
    fn test_never_negative() {
        for i in 0..1000 {
            assert!(MakePulses.call((i as f32, 7.3, 100.0)) >= 0.0);
        }
    }
}
