//! Benchmark configuration

use std::env;
use ufunc_core::{Error, Result};

/// How many times to call the benchmarked function
///
/// Each of the `repeat` runs calls it `number` times and yields one sample.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BenchConfig {
    pub number: usize,
    pub repeat: usize,
}

impl Default for BenchConfig {
    fn default() -> Self {
        Self {
            number: 1,
            repeat: 5,
        }
    }
}

impl BenchConfig {
    pub fn new(number: usize, repeat: usize) -> Result<Self> {
        let config = Self { number, repeat };
        config.validate()?;
        Ok(config)
    }

    /// Apply `UFUNC_BENCH_NUMBER` and `UFUNC_BENCH_REPEAT` overrides
    pub fn with_env_overrides(mut self) -> Result<Self> {
        if let Some(number) = parse_var("UFUNC_BENCH_NUMBER")? {
            self.number = number;
        }
        if let Some(repeat) = parse_var("UFUNC_BENCH_REPEAT")? {
            self.repeat = repeat;
        }
        self.validate()?;
        Ok(self)
    }

    /// Defaults with environment overrides
    pub fn from_env() -> Result<Self> {
        Self::default().with_env_overrides()
    }

    /// Total timed calls
    pub fn calls(&self) -> usize {
        self.number * self.repeat
    }

    fn validate(&self) -> Result<()> {
        if self.number == 0 || self.repeat == 0 {
            return Err(Error::InvalidParameter(format!(
                "number and repeat must be positive, got number={} repeat={}",
                self.number, self.repeat
            )));
        }
        Ok(())
    }
}

fn parse_var(name: &str) -> Result<Option<usize>> {
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse::<usize>()
            .map(Some)
            .map_err(|e| Error::InvalidParameter(format!("{name}={raw:?}: {e}"))),
        Err(_) => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_validates() {
        assert_eq!(BenchConfig::new(100, 3).unwrap().calls(), 300);
        assert!(matches!(BenchConfig::new(0, 3), Err(Error::InvalidParameter(_))));
        assert!(matches!(BenchConfig::new(3, 0), Err(Error::InvalidParameter(_))));
    }

    #[test]
    fn test_default() {
        let config = BenchConfig::default();
        assert_eq!(config.number, 1);
        assert_eq!(config.repeat, 5);
    }
}
