//! Broadcast scalar kernels on the host or a simulated accelerator, and
//! time them
//!
//! This crate re-exports the workspace members:
//!
//! - [`core`]: kernels, broadcasting, device staging, compile cache
//! - [`kernels`]: the concrete kernels
//! - [`harness`]: timing, comparisons and seeded inputs
//!
//! The `benches/` programs reproduce each demonstration and print one
//! `"<label>: <mean seconds per batch>"` line per variant.

pub use ufunc_core as core;
pub use ufunc_harness as harness;
pub use ufunc_kernels as kernels;

pub use ufunc_core::{
    DType, DeviceBuffer, DeviceConfig, DeviceContext, Error, Executor, NumericArray, Operand,
    Result, Shape,
};
pub use ufunc_harness::{BenchConfig, Benchmark, BenchmarkResult, Comparison, DataGenerator};

/// Prelude for the demonstration programs
pub mod prelude {
    pub use ufunc_core::prelude::*;
    pub use ufunc_harness::{
        init_tracing, BenchConfig, Benchmark, BenchmarkResult, Comparison, DataGenerator,
    };
    pub use ufunc_kernels::*;
}

/// Host executor for the demonstrations, parallel when available
#[cfg(feature = "parallel")]
pub fn host_executor() -> Executor<ufunc_core::ParallelEngine> {
    Executor::parallel()
}

/// Host executor for the demonstrations, parallel when available
#[cfg(not(feature = "parallel"))]
pub fn host_executor() -> Executor {
    Executor::sequential()
}
