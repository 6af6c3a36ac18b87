//! Side-by-side reporting of several benchmark results

use crate::result::BenchmarkResult;
use std::fmt;
use tracing::debug;

/// Results measured against the first one added
#[derive(Clone, Debug, Default)]
pub struct Comparison {
    title: String,
    results: Vec<BenchmarkResult>,
}

impl Comparison {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            results: Vec::new(),
        }
    }

    /// Add a result; the first one becomes the baseline
    pub fn add(&mut self, result: BenchmarkResult) -> &mut Self {
        debug!(label = result.label(), mean = result.mean(), "comparison entry");
        self.results.push(result);
        self
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn results(&self) -> &[BenchmarkResult] {
        &self.results
    }

    pub fn baseline(&self) -> Option<&BenchmarkResult> {
        self.results.first()
    }

    /// Mean of `label` over the baseline mean
    pub fn ratio(&self, label: &str) -> Option<f64> {
        let baseline = self.baseline()?;
        let result = self.results.iter().find(|r| r.label() == label)?;
        Some(result.mean() / baseline.mean())
    }

    /// How many times faster `label` is than the baseline
    pub fn speedup(&self, label: &str) -> Option<f64> {
        self.ratio(label).map(f64::recip)
    }

    /// Fastest result by mean
    pub fn fastest(&self) -> Option<&BenchmarkResult> {
        self.results
            .iter()
            .min_by(|a, b| a.mean().total_cmp(&b.mean()))
    }

    /// One `"<label>: <mean>"` line per result, in insertion order
    pub fn lines(&self) -> Vec<String> {
        self.results.iter().map(ToString::to_string).collect()
    }
}

impl fmt::Display for Comparison {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", self.title)?;
        let Some(baseline) = self.baseline() else {
            return write!(f, "  (no results)");
        };
        let width = self.results.iter().map(|r| r.label().len()).max().unwrap_or(0);
        for (i, result) in self.results.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            write!(
                f,
                "  {:<width$}  mean {:.6e} s  min {:.6e} s  x{:.2}",
                result.label(),
                result.mean(),
                result.min(),
                baseline.mean() / result.mean(),
            )?;
        }
        Ok(())
    }
}
