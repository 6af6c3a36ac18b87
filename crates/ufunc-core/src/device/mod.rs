//! Simulated accelerator: explicit context, memory arena and launch grid
//!
//! A [`DeviceContext`] is the only way to reach device memory. It owns a
//! capacity-limited arena, counts every transfer, and executes launches as a
//! grid of `ceil(n / threads_per_block)` blocks on its own worker pool.
//! There is no ambient "current device"; every device operation names the
//! context it runs on.
//!
//! # Example
//!
//! ```rust
//! use ufunc_core::{DeviceConfig, DeviceContext, NumericArray};
//!
//! let ctx = DeviceContext::open(DeviceConfig::new().with_units(2)).unwrap();
//! let a = NumericArray::from_vec(vec![1.0f32, 2.0, 3.0]);
//!
//! let d_a = ctx.to_device(&a).unwrap();
//! assert!(ctx.to_host(&d_a).unwrap().bit_eq(&a));
//!
//! ctx.release(&d_a).unwrap();
//! assert!(ctx.to_host(&d_a).is_err());
//! ```

mod config;
mod memory;

pub use config::{DeviceConfig, DEFAULT_MEMORY_BYTES, DEFAULT_THREADS_PER_BLOCK};

use crate::array::NumericArray;
use crate::cache::{CompileCache, CompileKey, CompiledKernel, Target};
use crate::execution::ExecutionEngine;
use crate::kernel::ScalarKernel;
use crate::numeric::{ArrayData, DType};
use crate::shape::Shape;
use crate::{Error, Result};
use memory::Arena;
use std::fmt;
use std::ops::Range;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, trace};

#[cfg(feature = "parallel")]
type DeviceEngine = crate::execution::ParallelEngine;
#[cfg(not(feature = "parallel"))]
type DeviceEngine = crate::execution::SequentialEngine;

static NEXT_CONTEXT_ID: AtomicU64 = AtomicU64::new(1);
static NEXT_BUFFER_ID: AtomicU64 = AtomicU64::new(1);

/// Handle to an array in a context's device memory
///
/// The handle does not keep memory alive: after [`DeviceContext::release`]
/// every use of it fails with [`Error::StaleBuffer`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DeviceBuffer {
    id: u64,
    context: u64,
    dtype: DType,
    shape: Shape,
}

impl DeviceBuffer {
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn dtype(&self) -> DType {
        self.dtype
    }

    pub fn shape(&self) -> &Shape {
        &self.shape
    }

    pub fn len(&self) -> usize {
        self.shape.size()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn nbytes(&self) -> usize {
        self.len() * self.dtype.size_of()
    }
}

/// Grid dimensions of one launch
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LaunchConfig {
    pub blocks: usize,
    pub threads_per_block: usize,
}

impl LaunchConfig {
    /// Smallest grid covering `n` logical threads
    pub fn for_elements(n: usize, threads_per_block: usize) -> Self {
        Self {
            blocks: n.div_ceil(threads_per_block.max(1)),
            threads_per_block,
        }
    }

    /// Logical threads in the grid, including idle ones in the last block
    pub fn threads(&self) -> usize {
        self.blocks * self.threads_per_block
    }
}

/// Snapshot of a context's transfer and launch counters
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TransferStats {
    pub host_to_device_bytes: u64,
    pub host_to_device_copies: u64,
    pub device_to_host_bytes: u64,
    pub device_to_host_copies: u64,
    pub allocations: u64,
    pub releases: u64,
    pub launches: u64,
}

impl fmt::Display for TransferStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "h2d {} B in {} copies, d2h {} B in {} copies, {} allocations, {} releases, {} launches",
            self.host_to_device_bytes,
            self.host_to_device_copies,
            self.device_to_host_bytes,
            self.device_to_host_copies,
            self.allocations,
            self.releases,
            self.launches
        )
    }
}

#[derive(Default)]
struct Counters {
    h2d_bytes: AtomicU64,
    h2d_copies: AtomicU64,
    d2h_bytes: AtomicU64,
    d2h_copies: AtomicU64,
    allocations: AtomicU64,
    releases: AtomicU64,
    launches: AtomicU64,
}

impl Counters {
    fn snapshot(&self) -> TransferStats {
        TransferStats {
            host_to_device_bytes: self.h2d_bytes.load(Ordering::Relaxed),
            host_to_device_copies: self.h2d_copies.load(Ordering::Relaxed),
            device_to_host_bytes: self.d2h_bytes.load(Ordering::Relaxed),
            device_to_host_copies: self.d2h_copies.load(Ordering::Relaxed),
            allocations: self.allocations.load(Ordering::Relaxed),
            releases: self.releases.load(Ordering::Relaxed),
            launches: self.launches.load(Ordering::Relaxed),
        }
    }

    fn reset(&self) {
        for counter in [
            &self.h2d_bytes,
            &self.h2d_copies,
            &self.d2h_bytes,
            &self.d2h_copies,
            &self.allocations,
            &self.releases,
            &self.launches,
        ] {
            counter.store(0, Ordering::Relaxed);
        }
    }
}

struct ContextInner {
    id: u64,
    config: DeviceConfig,
    arena: Mutex<Arena>,
    counters: Counters,
    engine: DeviceEngine,
}

/// An open device
///
/// Cloning the context shares the same device. Memory is freed when the
/// last clone is dropped.
#[derive(Clone)]
pub struct DeviceContext {
    inner: Arc<ContextInner>,
}

impl fmt::Debug for DeviceContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeviceContext")
            .field("id", &self.inner.id)
            .field("config", &self.inner.config)
            .finish()
    }
}

impl DeviceContext {
    /// Open a device with an explicit configuration
    pub fn open(config: DeviceConfig) -> Result<Self> {
        config.validate()?;
        if !config.enabled {
            return Err(Error::UnsupportedTarget(
                "no device available".to_string(),
            ));
        }

        let engine = build_engine(config.units)?;
        let id = NEXT_CONTEXT_ID.fetch_add(1, Ordering::Relaxed);
        debug!(
            context = id,
            memory_bytes = config.memory_bytes,
            units = config.units,
            threads_per_block = config.threads_per_block,
            "opened device context"
        );

        Ok(Self {
            inner: Arc::new(ContextInner {
                id,
                arena: Mutex::new(Arena::new(config.memory_bytes)),
                config,
                counters: Counters::default(),
                engine,
            }),
        })
    }

    /// Open the device described by the environment
    pub fn detect() -> Result<Self> {
        Self::open(DeviceConfig::from_env()?)
    }

    pub fn id(&self) -> u64 {
        self.inner.id
    }

    pub fn config(&self) -> &DeviceConfig {
        &self.inner.config
    }

    pub fn capacity(&self) -> usize {
        self.arena()
            .map(|a| a.capacity())
            .unwrap_or(self.inner.config.memory_bytes)
    }

    /// Bytes held by live buffers
    pub fn used_bytes(&self) -> usize {
        self.arena().map(|a| a.used()).unwrap_or(0)
    }

    pub fn available_bytes(&self) -> usize {
        self.arena().map(|a| a.available()).unwrap_or(0)
    }

    /// Number of buffers not yet released
    pub fn live_buffers(&self) -> usize {
        self.arena().map(|a| a.live()).unwrap_or(0)
    }

    pub fn stats(&self) -> TransferStats {
        self.inner.counters.snapshot()
    }

    pub fn reset_stats(&self) {
        self.inner.counters.reset();
    }

    /// Grid used for `n` logical threads
    pub fn launch_config(&self, n: usize) -> LaunchConfig {
        LaunchConfig::for_elements(n, self.inner.config.threads_per_block)
    }

    /// Copy a host array into new device memory
    pub fn to_device(&self, array: &NumericArray) -> Result<DeviceBuffer> {
        let bytes = array.nbytes();
        let buffer = self.insert(array.shape().clone(), array.data().clone())?;
        self.count_h2d(bytes);
        debug!(buffer = buffer.id, bytes, "copied host to device");
        Ok(buffer)
    }

    /// Copy a device buffer back into a new host array
    pub fn to_host(&self, buffer: &DeviceBuffer) -> Result<NumericArray> {
        let (data, shape) = self.read(buffer)?;
        let array = NumericArray::from_data(shape, (*data).clone())?;
        self.inner
            .counters
            .d2h_bytes
            .fetch_add(array.nbytes() as u64, Ordering::Relaxed);
        self.inner.counters.d2h_copies.fetch_add(1, Ordering::Relaxed);
        debug!(buffer = buffer.id, bytes = array.nbytes(), "copied device to host");
        Ok(array)
    }

    /// Reserve device memory without copying anything into it
    ///
    /// Contents are unspecified until written; in this implementation they
    /// read as zero bits.
    pub fn allocate(&self, shape: impl Into<Shape>, dtype: DType) -> Result<DeviceBuffer> {
        let shape = shape.into();
        let data = ArrayData::zeroed(dtype, shape.size());
        let buffer = self.insert(shape, data)?;
        debug!(buffer = buffer.id, bytes = buffer.nbytes(), "allocated device buffer");
        Ok(buffer)
    }

    /// Overwrite an existing buffer with a host array of the same shape and dtype
    pub fn copy_from_host(&self, buffer: &DeviceBuffer, array: &NumericArray) -> Result<()> {
        if array.dtype() != buffer.dtype {
            return Err(Error::type_mismatch(
                "copy into device buffer",
                buffer.dtype,
                array.dtype(),
            ));
        }
        if array.shape() != &buffer.shape {
            return Err(Error::shape_mismatch(
                "copy into device buffer",
                buffer.shape.dims(),
                array.shape().dims(),
            ));
        }
        self.write(buffer, array.data().clone())?;
        self.count_h2d(array.nbytes());
        Ok(())
    }

    /// Free a buffer; any later use of the handle is an error
    pub fn release(&self, buffer: &DeviceBuffer) -> Result<()> {
        self.check_owner(buffer)?;
        let slot = self.arena()?.remove(buffer.id).ok_or(Error::StaleBuffer {
            id: buffer.id,
            reason: "was already released",
        })?;
        self.inner.counters.releases.fetch_add(1, Ordering::Relaxed);
        debug!(buffer = buffer.id, bytes = slot.bytes, "released device buffer");
        Ok(())
    }

    /// Resolve a kernel for this device through `cache`
    ///
    /// Kernels that call host-only code fail with [`Error::CompileFailure`];
    /// `float64` signatures fail with [`Error::UnsupportedTarget`] on devices
    /// without 64-bit support.
    pub fn compile<K: ScalarKernel>(
        &self,
        cache: &CompileCache,
        kernel: &K,
    ) -> Result<Arc<CompiledKernel>> {
        self.compile_key(
            cache,
            CompileKey::of(kernel, Target::Device),
            kernel.device_compatible(),
        )
    }

    /// [`compile`](Self::compile) for kernels known only by key
    pub fn compile_key(
        &self,
        cache: &CompileCache,
        key: CompileKey,
        device_compatible: bool,
    ) -> Result<Arc<CompiledKernel>> {
        if key.signature.uses_f64() && !self.inner.config.supports_f64 {
            return Err(Error::UnsupportedTarget(format!(
                "device does not support float64 (`{}` has signature {})",
                key.kernel, key.signature
            )));
        }
        cache.get_or_compile(key, |key| {
            if device_compatible {
                Ok(())
            } else {
                Err(Error::CompileFailure {
                    kernel: key.kernel.name.to_string(),
                    reason: "kernel body calls host-only code".to_string(),
                })
            }
        })
    }

    /// Run `thread(i)` for every `i in 0..n` over the launch grid
    ///
    /// Blocks until the whole grid has finished; results are in index order.
    pub fn launch<R, F>(&self, compiled: &CompiledKernel, n: usize, thread: F) -> Result<Vec<R>>
    where
        R: Send,
        F: Fn(usize) -> R + Sync + Send,
    {
        let blocks = self.launch_blocks(compiled, n, |range| {
            range.map(&thread).collect::<Vec<R>>()
        })?;
        Ok(blocks.into_iter().flatten().collect())
    }

    /// Run `block(range)` once per block of the launch grid
    ///
    /// `range` holds the indices of the block's active threads. Results are
    /// in block order.
    pub fn launch_blocks<R, F>(
        &self,
        compiled: &CompiledKernel,
        n: usize,
        block: F,
    ) -> Result<Vec<R>>
    where
        R: Send,
        F: Fn(Range<usize>) -> R + Sync + Send,
    {
        if compiled.target() != Target::Device {
            return Err(Error::UnsupportedTarget(format!(
                "`{}` was compiled for the host",
                compiled.symbol()
            )));
        }

        let grid = self.launch_config(n);
        let per_block = grid.threads_per_block;
        debug!(
            symbol = compiled.symbol(),
            n,
            blocks = grid.blocks,
            threads_per_block = per_block,
            "launching kernel"
        );

        let results = self.inner.engine.execute_batch(grid.blocks, |index| {
            let start = index * per_block;
            let end = n.min(start + per_block);
            trace!(block = index, start, end, "block");
            block(start..end)
        });
        self.inner.counters.launches.fetch_add(1, Ordering::Relaxed);

        Ok(results)
    }

    /// Snapshot of a buffer's contents
    pub(crate) fn read(&self, buffer: &DeviceBuffer) -> Result<(Arc<ArrayData>, Shape)> {
        self.check_owner(buffer)?;
        let arena = self.arena()?;
        let slot = arena.get(buffer.id).ok_or(Error::StaleBuffer {
            id: buffer.id,
            reason: "was released",
        })?;
        Ok((Arc::clone(&slot.data), slot.shape.clone()))
    }

    /// Replace a buffer's contents with data of the same dtype and length
    pub(crate) fn write(&self, buffer: &DeviceBuffer, data: ArrayData) -> Result<()> {
        self.check_owner(buffer)?;
        debug_assert_eq!(data.dtype(), buffer.dtype);
        debug_assert_eq!(data.len(), buffer.len());
        self.arena()?.replace(buffer.id, data).ok_or(Error::StaleBuffer {
            id: buffer.id,
            reason: "was released",
        })
    }

    /// Keep computed results in device memory
    pub(crate) fn store(&self, shape: Shape, data: ArrayData) -> Result<DeviceBuffer> {
        self.insert(shape, data)
    }

    /// Fail early when `bytes` more device memory cannot be provided
    pub(crate) fn ensure_room(&self, bytes: usize) -> Result<()> {
        self.arena()?.ensure_room(bytes)
    }

    fn insert(&self, shape: Shape, data: ArrayData) -> Result<DeviceBuffer> {
        let buffer = DeviceBuffer {
            id: NEXT_BUFFER_ID.fetch_add(1, Ordering::Relaxed),
            context: self.inner.id,
            dtype: data.dtype(),
            shape: shape.clone(),
        };
        self.arena()?.insert(buffer.id, shape, data)?;
        self.inner.counters.allocations.fetch_add(1, Ordering::Relaxed);
        Ok(buffer)
    }

    fn count_h2d(&self, bytes: usize) {
        self.inner
            .counters
            .h2d_bytes
            .fetch_add(bytes as u64, Ordering::Relaxed);
        self.inner.counters.h2d_copies.fetch_add(1, Ordering::Relaxed);
    }

    fn check_owner(&self, buffer: &DeviceBuffer) -> Result<()> {
        if buffer.context != self.inner.id {
            return Err(Error::StaleBuffer {
                id: buffer.id,
                reason: "belongs to another device context",
            });
        }
        Ok(())
    }

    fn arena(&self) -> Result<MutexGuard<'_, Arena>> {
        self.inner
            .arena
            .lock()
            .map_err(|_| Error::Other(anyhow::anyhow!("device arena lock poisoned")))
    }
}

#[cfg(feature = "parallel")]
fn build_engine(units: usize) -> Result<DeviceEngine> {
    crate::execution::ParallelEngine::with_num_threads(units)
}

#[cfg(not(feature = "parallel"))]
fn build_engine(_units: usize) -> Result<DeviceEngine> {
    Ok(crate::execution::SequentialEngine::new())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_device() -> DeviceContext {
        DeviceContext::open(
            DeviceConfig::new()
                .with_memory_bytes(1024)
                .with_threads_per_block(4)
                .with_units(2),
        )
        .unwrap()
    }

    #[derive(Clone, Copy)]
    struct Square;

    impl ScalarKernel for Square {
        type Args = (f64,);
        type Output = f64;

        fn name(&self) -> &'static str {
            "square"
        }

        fn call(&self, (x,): (f64,)) -> f64 {
            x * x
        }
    }

    #[derive(Clone, Copy)]
    struct HostOnly;

    impl ScalarKernel for HostOnly {
        type Args = (f32,);
        type Output = f32;

        fn name(&self) -> &'static str {
            "host_only"
        }

        fn call(&self, (x,): (f32,)) -> f32 {
            x
        }

        fn device_compatible(&self) -> bool {
            false
        }
    }

    #[test]
    fn test_disabled_device() {
        let err = DeviceContext::open(DeviceConfig::disabled()).unwrap_err();
        assert!(matches!(err, Error::UnsupportedTarget(_)));
    }

    #[test]
    fn test_round_trip_is_bit_exact() {
        let ctx = small_device();
        let a = NumericArray::from_vec(vec![-0.0f64, f64::NAN, 1.5, f64::INFINITY]);

        let d_a = ctx.to_device(&a).unwrap();
        assert_eq!(d_a.shape(), a.shape());
        assert_eq!(d_a.dtype(), DType::F64);
        assert!(ctx.to_host(&d_a).unwrap().bit_eq(&a));

        let stats = ctx.stats();
        assert_eq!(stats.host_to_device_bytes, 32);
        assert_eq!(stats.device_to_host_bytes, 32);
        assert_eq!(stats.allocations, 1);
    }

    #[test]
    fn test_release_makes_buffer_stale() {
        let ctx = small_device();
        let d = ctx.allocate([2, 3], DType::F32).unwrap();
        assert_eq!(ctx.used_bytes(), 24);
        assert_eq!(ctx.live_buffers(), 1);

        ctx.release(&d).unwrap();
        assert_eq!(ctx.used_bytes(), 0);
        assert!(matches!(ctx.to_host(&d), Err(Error::StaleBuffer { .. })));
        assert!(matches!(ctx.release(&d), Err(Error::StaleBuffer { .. })));
    }

    #[test]
    fn test_buffer_from_other_context() {
        let a = small_device();
        let b = small_device();
        let d = a.allocate(4, DType::I32).unwrap();

        match b.to_host(&d) {
            Err(Error::StaleBuffer { reason, .. }) => {
                assert_eq!(reason, "belongs to another device context")
            }
            other => panic!("expected StaleBuffer, got {other:?}"),
        }
    }

    #[test]
    fn test_out_of_memory() {
        let ctx = small_device();
        let err = ctx.allocate(200, DType::F64).unwrap_err();
        assert!(matches!(
            err,
            Error::OutOfDeviceMemory {
                requested: 1600,
                available: 1024
            }
        ));
        assert_eq!(ctx.live_buffers(), 0);
    }

    #[test]
    fn test_allocate_reads_zero() {
        let ctx = small_device();
        let d = ctx.allocate(3, DType::I64).unwrap();
        assert_eq!(ctx.to_host(&d).unwrap().as_slice::<i64>().unwrap(), &[0, 0, 0]);
    }

    #[test]
    fn test_copy_from_host_checks_layout() {
        let ctx = small_device();
        let d = ctx.allocate(3, DType::F32).unwrap();

        ctx.copy_from_host(&d, &NumericArray::from_vec(vec![1.0f32, 2.0, 3.0]))
            .unwrap();
        assert_eq!(ctx.to_host(&d).unwrap().to_vec::<f32>().unwrap(), vec![1.0, 2.0, 3.0]);

        let wrong_type = NumericArray::from_vec(vec![1.0f64, 2.0, 3.0]);
        assert!(matches!(
            ctx.copy_from_host(&d, &wrong_type),
            Err(Error::TypeMismatch { .. })
        ));
        let wrong_shape = NumericArray::from_vec(vec![1.0f32, 2.0]);
        assert!(matches!(
            ctx.copy_from_host(&d, &wrong_shape),
            Err(Error::ShapeMismatch { .. })
        ));
    }

    #[test]
    fn test_launch_grid() {
        let ctx = small_device();
        let cache = CompileCache::new();
        let compiled = ctx.compile(&cache, &Square).unwrap();

        assert_eq!(ctx.launch_config(10), LaunchConfig { blocks: 3, threads_per_block: 4 });
        assert_eq!(ctx.launch_config(10).threads(), 12);

        let out = ctx.launch(&compiled, 10, |i| Square.call((i as f64,))).unwrap();
        assert_eq!(out.len(), 10);
        assert_eq!(out[9], 81.0);
        assert_eq!(ctx.stats().launches, 1);
    }

    #[test]
    fn test_launch_rejects_host_compilation() {
        let ctx = small_device();
        let cache = CompileCache::new();
        let host = cache
            .get_or_compile(CompileKey::of(&Square, Target::Host), |_| Ok(()))
            .unwrap();
        assert!(matches!(
            ctx.launch(&host, 1, |i| i),
            Err(Error::UnsupportedTarget(_))
        ));
    }

    #[test]
    fn test_compile_capabilities() {
        let cache = CompileCache::new();

        let no_f64 = DeviceContext::open(DeviceConfig::new().with_units(1).with_f64(false)).unwrap();
        assert!(matches!(
            no_f64.compile(&cache, &Square),
            Err(Error::UnsupportedTarget(_))
        ));

        let ctx = small_device();
        assert!(matches!(
            ctx.compile(&cache, &HostOnly),
            Err(Error::CompileFailure { .. })
        ));
        assert!(ctx.compile(&cache, &Square).is_ok());
        assert_eq!(cache.stats().entries, 1);
    }

    #[test]
    fn test_reset_stats() {
        let ctx = small_device();
        let d = ctx.to_device(&NumericArray::from_vec(vec![1i32])).unwrap();
        ctx.release(&d).unwrap();
        assert_eq!(ctx.stats().releases, 1);

        ctx.reset_stats();
        assert_eq!(ctx.stats(), TransferStats::default());
    }
}
