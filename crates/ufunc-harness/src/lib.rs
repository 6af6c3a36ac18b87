//! Benchmark harness for broadcast kernels
//!
//! Times a callable with an untimed priming call followed by `repeat`
//! samples of `number` calls, summarises the samples with `statrs`, and
//! compares variants against a baseline.
//!
//! ```rust
//! use ufunc_harness::{BenchConfig, Benchmark};
//!
//! let result = Benchmark::new("noop", BenchConfig::new(100, 3).unwrap())
//!     .run(|| Ok(()))
//!     .unwrap();
//! assert_eq!(result.samples().len(), 3);
//! ```

pub mod bench;
pub mod comparison;
pub mod config;
pub mod data;
pub mod result;

pub use bench::Benchmark;
pub use comparison::Comparison;
pub use config::BenchConfig;
pub use data::{DataGenerator, DEFAULT_SEED};
pub use result::BenchmarkResult;

use tracing_subscriber::EnvFilter;

/// Install a `fmt` subscriber filtered by `RUST_LOG`, default `warn`
///
/// Safe to call more than once; later calls are ignored.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init();
}
