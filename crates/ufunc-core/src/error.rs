//! Error types for kernel definition, broadcasting and device staging
//!
//! Every failure in this workspace surfaces as one of these variants. Nothing
//! in the core catches or retries them.

use crate::numeric::DType;
use thiserror::Error;

/// Core error type for broadcast execution
#[derive(Error, Debug)]
pub enum Error {
    /// Operand shapes cannot be broadcast together
    #[error("Shape mismatch in {context}: cannot broadcast {left:?} with {right:?}")]
    ShapeMismatch {
        context: String,
        left: Vec<usize>,
        right: Vec<usize>,
    },

    /// An operand's element type differs from the declared signature
    #[error("Type mismatch in {context}: expected {expected}, got {actual}")]
    TypeMismatch {
        context: String,
        expected: String,
        actual: String,
    },

    /// The requested execution target is not available
    #[error("Unsupported target: {0}")]
    UnsupportedTarget(String),

    /// A device allocation exceeds the remaining device memory
    #[error("Out of device memory: requested {requested} bytes, {available} available")]
    OutOfDeviceMemory { requested: usize, available: usize },

    /// A device buffer was used after release
    #[error("Stale buffer: device buffer #{id} {reason}")]
    StaleBuffer { id: u64, reason: &'static str },

    /// The kernel cannot be translated for the requested target
    #[error("Compile failure for `{kernel}`: {reason}")]
    CompileFailure { kernel: String, reason: String },

    /// Invalid parameter provided to a function
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// Other errors
    #[error("Other error: {0}")]
    Other(#[from] anyhow::Error),
}

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Create a shape mismatch error between two shapes
    pub fn shape_mismatch(context: &str, left: &[usize], right: &[usize]) -> Self {
        Self::ShapeMismatch {
            context: context.to_string(),
            left: left.to_vec(),
            right: right.to_vec(),
        }
    }

    /// Create a type mismatch error between two dtypes
    pub fn type_mismatch(context: &str, expected: DType, actual: DType) -> Self {
        Self::TypeMismatch {
            context: context.to_string(),
            expected: expected.to_string(),
            actual: actual.to_string(),
        }
    }

    /// Create a type mismatch error for an operand count that does not match the arity
    pub fn arity_mismatch(kernel: &str, expected: usize, actual: usize) -> Self {
        Self::TypeMismatch {
            context: kernel.to_string(),
            expected: format!("{expected} operands"),
            actual: format!("{actual} operands"),
        }
    }

    /// Whether this error came from the device runtime rather than the inputs
    pub fn is_device_error(&self) -> bool {
        matches!(
            self,
            Self::UnsupportedTarget(_) | Self::OutOfDeviceMemory { .. } | Self::StaleBuffer { .. }
        )
    }
}
