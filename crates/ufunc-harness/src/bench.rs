//! Repeat-and-time runner

use crate::config::BenchConfig;
use crate::result::BenchmarkResult;
use std::hint::black_box;
use std::time::Instant;
use tracing::{debug, instrument};
use ufunc_core::Result;

/// Times a callable `repeat` times, `number` calls per sample
#[derive(Clone, Debug)]
pub struct Benchmark {
    label: String,
    config: BenchConfig,
}

impl Benchmark {
    pub fn new(label: impl Into<String>, config: BenchConfig) -> Self {
        Self {
            label: label.into(),
            config,
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn config(&self) -> BenchConfig {
        self.config
    }

    /// Run the benchmark
    ///
    /// One untimed call primes caches and compilation first. The first
    /// error returned by `f` aborts the run.
    #[instrument(skip(self, f), fields(label = %self.label, number = self.config.number, repeat = self.config.repeat))]
    pub fn run<T, F>(&self, mut f: F) -> Result<BenchmarkResult>
    where
        F: FnMut() -> Result<T>,
    {
        black_box(f()?);

        let mut samples = Vec::with_capacity(self.config.repeat);
        for run in 0..self.config.repeat {
            let start = Instant::now();
            for _ in 0..self.config.number {
                black_box(f()?);
            }
            let elapsed = start.elapsed().as_secs_f64();
            debug!(run, elapsed, "sample");
            samples.push(elapsed);
        }

        Ok(BenchmarkResult::new(
            self.label.clone(),
            self.config.number,
            samples,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ufunc_core::Error;

    #[test]
    fn test_sample_count() {
        let bench = Benchmark::new("noop", BenchConfig::new(10, 4).unwrap());
        let result = bench.run(|| Ok(())).unwrap();
        assert_eq!(result.samples().len(), 4);
        assert_eq!(result.number(), 10);
        assert!(result.samples().iter().all(|s| s.is_finite() && *s >= 0.0));
    }

    #[test]
    fn test_priming_call_is_extra() {
        let mut calls = 0;
        Benchmark::new("count", BenchConfig::new(3, 2).unwrap())
            .run(|| {
                calls += 1;
                Ok(calls)
            })
            .unwrap();
        assert_eq!(calls, 7);
    }

    #[test]
    fn test_error_aborts_run() {
        let mut calls = 0;
        let result = Benchmark::new("fail", BenchConfig::new(5, 5).unwrap()).run(|| {
            calls += 1;
            if calls == 3 {
                Err(Error::InvalidParameter("boom".into()))
            } else {
                Ok(())
            }
        });
        assert!(matches!(result, Err(Error::InvalidParameter(_))));
        assert_eq!(calls, 3);
    }
}
