//! Shared utilities for integration tests
#![allow(dead_code)]

pub use approx::assert_relative_eq;

use ufunc_core::{DeviceConfig, DeviceContext, ScalarKernel};

/// Relative tolerance for comparing float32 results across targets
pub const F32_TOLERANCE: f32 = 1e-5;

/// Generate array lengths around the launch block size of [`test_device`]
pub fn edge_case_lengths() -> Vec<usize> {
    vec![
        0,   // Empty
        1,   // Single element
        2,   // Smaller than a block
        7,   // Block - 1
        8,   // One full block
        9,   // Block + 1
        16,  // Two blocks
        17,  // Two blocks + 1
        100, // Round number
        127, // Mersenne prime
    ]
}

/// Special floating-point values for edge case testing
pub fn special_values() -> Vec<f32> {
    vec![
        0.0,
        -0.0,
        1.0,
        -1.0,
        f32::MIN_POSITIVE,
        f32::EPSILON,
        std::f32::consts::PI,
        1e-30,
        1e30,
    ]
}

/// Small device with 8-thread blocks so short inputs span several blocks
pub fn test_device() -> DeviceContext {
    DeviceContext::open(
        DeviceConfig::new()
            .with_memory_bytes(1 << 20)
            .with_threads_per_block(8)
            .with_units(2),
    )
    .expect("test device")
}

/// Assert two vectors are equal within relative tolerance
pub fn assert_vectors_close(actual: &[f32], expected: &[f32], context: &str) {
    assert_eq!(
        actual.len(),
        expected.len(),
        "length mismatch for {}",
        context
    );

    for (&a, &e) in actual.iter().zip(expected.iter()) {
        assert_relative_eq!(a, e, max_relative = F32_TOLERANCE, epsilon = 1e-30);
    }
}

/// Generate test data with specific patterns
pub fn generate_test_data(len: usize) -> Vec<f32> {
    (0..len).map(|i| i as f32 + 0.1).collect()
}

/// Generate complementary test data for binary operations
pub fn generate_test_data_complement(len: usize) -> Vec<f32> {
    (0..len).map(|i| (len - i) as f32 + 0.2).collect()
}

#[derive(Clone, Copy)]
pub struct Add;

impl ScalarKernel for Add {
    type Args = (i64, i64);
    type Output = i64;

    fn name(&self) -> &'static str {
        "add"
    }

    fn call(&self, (x, y): (i64, i64)) -> i64 {
        x + y
    }
}

#[derive(Clone, Copy)]
pub struct Gaussian;

impl ScalarKernel for Gaussian {
    type Args = (f32, f32, f32);
    type Output = f32;

    fn name(&self) -> &'static str {
        "gaussian"
    }

    fn call(&self, (x, mean, sigma): (f32, f32, f32)) -> f32 {
        let z = (x - mean) / sigma;
        (-0.5 * z * z).exp() / (sigma * (2.0 * std::f32::consts::PI).sqrt())
    }
}
