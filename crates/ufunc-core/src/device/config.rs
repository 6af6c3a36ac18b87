//! Device capabilities and limits

use crate::{Error, Result};
use std::env;

/// Default arena capacity: 256 MiB
pub const DEFAULT_MEMORY_BYTES: usize = 256 * 1024 * 1024;

/// Default block size of a launch grid
pub const DEFAULT_THREADS_PER_BLOCK: usize = 256;

/// Configuration used to open a [`DeviceContext`](super::DeviceContext)
#[derive(Clone, Debug, PartialEq)]
pub struct DeviceConfig {
    /// Whether a device is present at all
    pub enabled: bool,
    /// Arena capacity in bytes
    pub memory_bytes: usize,
    /// Logical threads per block of a launch grid
    pub threads_per_block: usize,
    /// Worker threads executing blocks
    pub units: usize,
    /// Whether 64-bit floating point kernels can be compiled
    pub supports_f64: bool,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            memory_bytes: DEFAULT_MEMORY_BYTES,
            threads_per_block: DEFAULT_THREADS_PER_BLOCK,
            units: num_cpus::get().max(1),
            supports_f64: true,
        }
    }
}

impl DeviceConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Configuration of a host without a device
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Self::default()
        }
    }

    pub fn with_memory_bytes(mut self, bytes: usize) -> Self {
        self.memory_bytes = bytes;
        self
    }

    pub fn with_threads_per_block(mut self, threads: usize) -> Self {
        self.threads_per_block = threads;
        self
    }

    pub fn with_units(mut self, units: usize) -> Self {
        self.units = units;
        self
    }

    pub fn with_f64(mut self, supported: bool) -> Self {
        self.supports_f64 = supported;
        self
    }

    /// Defaults overridden by `UFUNC_DEVICE`, `UFUNC_DEVICE_MEMORY` and
    /// `UFUNC_DEVICE_UNITS`
    ///
    /// `UFUNC_DEVICE=off` (or `0`, `false`) disables the device.
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Ok(value) = env::var("UFUNC_DEVICE") {
            config.enabled = !matches!(
                value.trim().to_ascii_lowercase().as_str(),
                "off" | "0" | "false" | "none"
            );
        }
        if let Some(bytes) = parse_var("UFUNC_DEVICE_MEMORY")? {
            config.memory_bytes = bytes;
        }
        if let Some(units) = parse_var("UFUNC_DEVICE_UNITS")? {
            config.units = units;
        }

        config.validate()?;
        Ok(config)
    }

    /// Reject configurations no launch grid can run on
    pub fn validate(&self) -> Result<()> {
        if self.threads_per_block == 0 {
            return Err(Error::InvalidParameter(
                "threads_per_block must be positive".to_string(),
            ));
        }
        if self.units == 0 {
            return Err(Error::InvalidParameter(
                "device units must be positive".to_string(),
            ));
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
