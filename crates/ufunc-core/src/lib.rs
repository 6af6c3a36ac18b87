//! Core types for broadcasting scalar kernels on the host or a device
//!
//! This crate provides statically typed scalar kernels, numpy-style
//! broadcasting, a process-wide compile cache, and a simulated accelerator
//! with explicit memory staging.
//!
//! # Architecture Overview
//!
//! The library is organized into three layers:
//!
//! 1. **Layer 1: Data** - Element types, shapes and host arrays
//! 2. **Layer 2: Kernels** - Scalar and row kernels with declared signatures
//! 3. **Layer 3: Execution** - Host engines, device contexts and the
//!    broadcast executor, sharing one compile cache
//!
//! # Design Philosophy
//!
//! - **Explicit Precision**: Signatures are associated types, so `f32` vs
//!   `f64` is visible and checked at compile time
//! - **Explicit Devices**: Every device operation names its context
//! - **Explicit Transfers**: Host/device copies happen only when asked for
//!   and are counted
//! - **All or Nothing**: A failed call writes no output
//!
//! # Example
//!
//! ```rust
//! use ufunc_core::prelude::*;
//!
//! #[derive(Clone, Copy)]
//! struct Scale;
//!
//! impl ScalarKernel for Scale {
//!     type Args = (f32, f32);
//!     type Output = f32;
//!
//!     fn name(&self) -> &'static str {
//!         "scale"
//!     }
//!
//!     fn call(&self, (x, k): (f32, f32)) -> f32 {
//!         x * k
//!     }
//! }
//!
//! let x = NumericArray::from_vec(vec![1.0f32, 2.0, 3.0]);
//! let exec = Executor::sequential();
//!
//! let host = exec.call(&Scale, &[Operand::from(&x), 2.0f32.into()]).unwrap();
//! assert_eq!(host.as_slice::<f32>().unwrap(), &[2.0, 4.0, 6.0]);
//!
//! let ctx = DeviceContext::open(DeviceConfig::new().with_units(2)).unwrap();
//! let device = exec.call_on(&ctx, &Scale, &[Operand::from(&x), 2.0f32.into()]).unwrap();
//! assert!(device.bit_eq(&host));
//! ```

pub mod array;
pub mod cache;
pub mod device;
pub mod error;
pub mod execution;
pub mod executor;
pub mod gufunc;
pub mod kernel;
pub mod numeric;
pub mod operand;
pub mod registry;
pub mod shape;

// Re-export core types
pub use error::{Error, Result};

pub use array::NumericArray;
pub use cache::{CacheStats, CompileCache, CompileKey, CompiledKernel, Target};
pub use device::{DeviceBuffer, DeviceConfig, DeviceContext, LaunchConfig, TransferStats};
pub use execution::{sequential, ExecutionEngine, ExecutionStrategy, SequentialEngine};
#[cfg(feature = "parallel")]
pub use execution::{parallel, ParallelEngine};
pub use executor::{Executor, Outputs};
pub use gufunc::{CoreKernel, CoreLayout};
pub use kernel::{KernelArgs, KernelId, KernelOutput, ScalarKernel, Signature};
pub use numeric::{ArrayData, DType, Element, ScalarValue};
pub use operand::Operand;
pub use registry::{DynKernel, KernelInfo, KernelRegistry};
pub use shape::Shape;

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::{
        CoreKernel, DType, DeviceBuffer, DeviceConfig, DeviceContext, Element, ExecutionEngine,
        Executor, KernelRegistry, NumericArray, Operand, Result, ScalarKernel, Shape, Target,
    };

    pub use crate::error::Error;

    #[cfg(feature = "parallel")]
    pub use crate::execution::ParallelEngine;
    pub use crate::execution::{ExecutionStrategy, SequentialEngine};
}
