//! Timing samples and their summary statistics

use statrs::statistics::Statistics;
use std::fmt;

/// Samples from one benchmark, in seconds per batch of `number` calls
#[derive(Clone, Debug, PartialEq)]
pub struct BenchmarkResult {
    label: String,
    number: usize,
    repeat: usize,
    samples: Vec<f64>,
}

impl BenchmarkResult {
    pub(crate) fn new(label: impl Into<String>, number: usize, samples: Vec<f64>) -> Self {
        Self {
            label: label.into(),
            number,
            repeat: samples.len(),
            samples,
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn number(&self) -> usize {
        self.number
    }

    pub fn repeat(&self) -> usize {
        self.repeat
    }

    /// Samples in run order
    pub fn samples(&self) -> &[f64] {
        &self.samples
    }

    /// Mean seconds per batch
    pub fn mean(&self) -> f64 {
        self.samples.iter().sum::<f64>() / self.samples.len() as f64
    }

    pub fn min(&self) -> f64 {
        Statistics::min(self.samples.iter())
    }

    pub fn max(&self) -> f64 {
        Statistics::max(self.samples.iter())
    }

    /// Sample standard deviation, NaN for a single sample
    pub fn std_dev(&self) -> f64 {
        Statistics::std_dev(self.samples.iter())
    }

    /// Mean seconds per individual call
    pub fn per_call(&self) -> f64 {
        self.mean() / self.number as f64
    }
}

impl fmt::Display for BenchmarkResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.label, self.mean())
    }
}
