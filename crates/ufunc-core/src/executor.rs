//! Broadcast executor
//!
//! Applies a scalar kernel elementwise over broadcast operands, either on the
//! host through an [`ExecutionEngine`] or on a [`DeviceContext`]. Every call
//! validates all operands before evaluating anything and writes its outputs
//! only after every position has been computed, so a failed call leaves no
//! partial output behind.
//!
//! # Example
//!
//! ```rust
//! use ufunc_core::{Executor, NumericArray, Operand, ScalarKernel};
//!
//! #[derive(Clone, Copy)]
//! struct Add;
//!
//! impl ScalarKernel for Add {
//!     type Args = (i64, i64);
//!     type Output = i64;
//!
//!     fn name(&self) -> &'static str {
//!         "add"
//!     }
//!
//!     fn call(&self, (x, y): (i64, i64)) -> i64 {
//!         x + y
//!     }
//! }
//!
//! let a = NumericArray::from_vec(vec![10i64, 20, 30, 40]);
//! let b = NumericArray::arange::<i64>(4).unwrap();
//!
//! let out = Executor::sequential()
//!     .call(&Add, &[Operand::from(&a), Operand::from(&b)])
//!     .unwrap();
//! assert_eq!(out.as_slice::<i64>().unwrap(), &[10, 21, 32, 43]);
//! ```

use crate::array::NumericArray;
use crate::cache::{CompileCache, CompileKey, CompiledKernel, Target};
use crate::device::{DeviceBuffer, DeviceContext};
use crate::execution::{chunk_ranges, ExecutionEngine, SequentialEngine};
use crate::gufunc::{CoreKernel, RowPlan};
use crate::kernel::{KernelArgs, KernelOutput, ScalarKernel, Signature};
use crate::numeric::{ArrayData, Element, ScalarValue};
use crate::operand::{Operand, Source};
use crate::registry::DynKernel;
use crate::shape::Shape;
use crate::{Error, Result};
use std::ops::Range;
use std::sync::Arc;
use tracing::{debug, instrument};

/// Result columns of a kernel, one per declared output
pub type Outputs<K, X> = <<K as ScalarKernel>::Output as KernelOutput>::Columns<X>;

/// Broadcast executor bound to a host engine and a compile cache
#[derive(Clone)]
pub struct Executor<E: ExecutionEngine = SequentialEngine> {
    engine: E,
    cache: Arc<CompileCache>,
}

impl Executor<SequentialEngine> {
    /// Host loop on the calling thread
    pub fn sequential() -> Self {
        Self::new(SequentialEngine::new())
    }
}

#[cfg(feature = "parallel")]
impl Executor<crate::execution::ParallelEngine> {
    /// Host loop on the global Rayon pool
    pub fn parallel() -> Self {
        Self::new(crate::execution::ParallelEngine::new())
    }
}

impl<E: ExecutionEngine> Executor<E> {
    /// Executor using the process-wide compile cache
    pub fn new(engine: E) -> Self {
        Self {
            engine,
            cache: CompileCache::global(),
        }
    }

    /// Use a private compile cache instead of the global one
    pub fn with_cache(mut self, cache: Arc<CompileCache>) -> Self {
        self.cache = cache;
        self
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    pub fn cache(&self) -> &Arc<CompileCache> {
        &self.cache
    }

    /// Resolve a kernel for the host
    pub fn compile<K: ScalarKernel>(&self, kernel: &K) -> Result<Arc<CompiledKernel>> {
        self.cache
            .get_or_compile(CompileKey::of(kernel, Target::Host), |_| Ok(()))
    }

    /// Evaluate a kernel on one set of scalars through the compile cache
    pub fn call_scalar<K: ScalarKernel>(&self, kernel: &K, args: K::Args) -> Result<K::Output> {
        self.compile(kernel)?;
        Ok(kernel.call(args))
    }

    /// Broadcast a kernel over host operands
    ///
    /// Device buffers are rejected; use [`call_on`](Self::call_on).
    #[instrument(skip_all, fields(kernel = kernel.name()))]
    pub fn call<K: ScalarKernel>(
        &self,
        kernel: &K,
        operands: &[Operand<'_>],
    ) -> Result<Outputs<K, NumericArray>> {
        let out = check_operands(kernel.name(), &kernel.signature(), operands)?;
        let held = hold_host(kernel.name(), operands)?;
        self.compile(kernel)?;

        let sources: Vec<Source<'_>> = held.iter().map(Held::source).collect();
        let lanes = K::Args::lanes(&sources, &out, kernel.name())?;
        let n = out.size();

        let values: Vec<K::Output> = if n == 0 {
            Vec::new()
        } else {
            let ranges: Vec<Range<usize>> =
                chunk_ranges(n, self.engine.preferred_chunk(n)).collect();
            debug!(
                n,
                chunks = ranges.len(),
                parallel = self.engine.is_parallel(),
                "evaluating on host"
            );
            let lanes = &lanes;
            self.engine
                .execute_batch(ranges.len(), |chunk| {
                    ranges[chunk]
                        .clone()
                        .map(|i| kernel.call(K::Args::gather(lanes, i)))
                        .collect::<Vec<_>>()
                })
                .into_iter()
                .flatten()
                .collect()
        };

        K::Output::try_map(K::Output::split(values), |data| {
            NumericArray::from_data(out.clone(), data)
        })
    }

    /// Broadcast on a device and copy the results back to the host
    ///
    /// Host operands are staged in and released afterwards; device operands
    /// are read in place.
    #[instrument(skip_all, fields(kernel = kernel.name(), context = ctx.id()))]
    pub fn call_on<K: ScalarKernel>(
        &self,
        ctx: &DeviceContext,
        kernel: &K,
        operands: &[Operand<'_>],
    ) -> Result<Outputs<K, NumericArray>> {
        let buffers = self.call_on_device(ctx, kernel, operands)?;
        K::Output::try_map(buffers, |buffer| copy_out(ctx, &buffer))
    }

    /// Broadcast on a device and keep the results in device memory
    #[instrument(skip_all, fields(kernel = kernel.name(), context = ctx.id()))]
    pub fn call_on_device<K: ScalarKernel>(
        &self,
        ctx: &DeviceContext,
        kernel: &K,
        operands: &[Operand<'_>],
    ) -> Result<Outputs<K, DeviceBuffer>> {
        let out = check_operands(kernel.name(), &kernel.signature(), operands)?;
        let compiled = ctx.compile(&self.cache, kernel)?;

        let mut staging = Staging::new(ctx);
        let held = staging.hold(operands)?;
        ctx.ensure_room(out.size() * output_width(&kernel.signature()))?;

        let columns = launch_typed(ctx, &compiled, kernel, &held, &out)?;
        drop(held);
        drop(staging);

        K::Output::try_map(columns, |data| ctx.store(out.clone(), data))
    }

    /// Broadcast on a device into a pre-allocated output buffer
    ///
    /// `out` must have exactly the broadcast shape and the kernel's result
    /// type. It may alias one of the operands.
    #[instrument(skip_all, fields(kernel = kernel.name(), context = ctx.id(), out = out.id()))]
    pub fn call_on_into<K>(
        &self,
        ctx: &DeviceContext,
        kernel: &K,
        operands: &[Operand<'_>],
        out: &DeviceBuffer,
    ) -> Result<()>
    where
        K: ScalarKernel,
        K::Output: Element,
    {
        let shape = check_operands(kernel.name(), &kernel.signature(), operands)?;
        let expected = <K::Output as Element>::DTYPE;
        if out.dtype() != expected {
            return Err(Error::type_mismatch(
                &format!("output buffer of {}", kernel.name()),
                expected,
                out.dtype(),
            ));
        }
        if out.shape() != &shape {
            return Err(Error::shape_mismatch(
                &format!("output buffer of {}", kernel.name()),
                shape.dims(),
                out.shape().dims(),
            ));
        }
        ctx.read(out)?;
        let compiled = ctx.compile(&self.cache, kernel)?;

        let mut staging = Staging::new(ctx);
        let held = staging.hold(operands)?;
        let columns = launch_typed(ctx, &compiled, kernel, &held, &shape)?;

        match K::Output::into_vec(columns).into_iter().next() {
            Some(data) => ctx.write(out, data),
            None => Err(Error::InvalidParameter(format!(
                "`{}` produced no output column",
                kernel.name()
            ))),
        }
    }

    /// Broadcast a type-erased kernel over host operands
    #[instrument(skip_all, fields(kernel = kernel.name()))]
    pub fn call_dyn(
        &self,
        kernel: &dyn DynKernel,
        operands: &[Operand<'_>],
    ) -> Result<Vec<NumericArray>> {
        let signature = kernel.signature();
        let out = check_operands(kernel.name(), &signature, operands)?;
        let held = hold_host(kernel.name(), operands)?;
        self.cache.get_or_compile(
            CompileKey {
                kernel: kernel.id(),
                target: Target::Host,
                signature: signature.clone(),
            },
            |_| Ok(()),
        )?;

        let sources: Vec<Source<'_>> = held.iter().map(Held::source).collect();
        let n = out.size();
        let ranges: Vec<Range<usize>> = chunk_ranges(n, self.engine.preferred_chunk(n)).collect();
        let parts = self.engine.execute_batch(ranges.len(), |chunk| {
            kernel.evaluate(&sources, &out, ranges[chunk].clone())
        });

        join_columns(kernel.name(), &signature, parts)?
            .into_iter()
            .map(|data| NumericArray::from_data(out.clone(), data))
            .collect()
    }

    /// Broadcast a type-erased kernel on a device and copy the results back
    #[instrument(skip_all, fields(kernel = kernel.name(), context = ctx.id()))]
    pub fn call_dyn_on(
        &self,
        ctx: &DeviceContext,
        kernel: &dyn DynKernel,
        operands: &[Operand<'_>],
    ) -> Result<Vec<NumericArray>> {
        let signature = kernel.signature();
        let out = check_operands(kernel.name(), &signature, operands)?;
        let compiled = ctx.compile_key(
            &self.cache,
            CompileKey {
                kernel: kernel.id(),
                target: Target::Device,
                signature: signature.clone(),
            },
            kernel.device_compatible(),
        )?;

        let mut staging = Staging::new(ctx);
        let held = staging.hold(operands)?;
        ctx.ensure_room(out.size() * output_width(&signature))?;

        let sources: Vec<Source<'_>> = held.iter().map(Held::source).collect();
        let parts = if out.size() == 0 {
            debug!("empty broadcast, skipping launch");
            Vec::new()
        } else {
            ctx.launch_blocks(&compiled, out.size(), |range| {
                kernel.evaluate(&sources, &out, range)
            })?
        };
        let columns = join_columns(kernel.name(), &signature, parts)?;
        drop(sources);
        drop(held);
        drop(staging);

        columns
            .into_iter()
            .map(|data| {
                let buffer = ctx.store(out.clone(), data)?;
                copy_out(ctx, &buffer)
            })
            .collect()
    }

    /// Apply a row kernel to the last axis of a host array
    #[instrument(skip_all, fields(kernel = kernel.name()))]
    pub fn reduce_rows<C: CoreKernel>(&self, kernel: &C, input: &NumericArray) -> Result<NumericArray> {
        let plan = RowPlan::new(kernel, input)?;
        self.cache.get_or_compile(
            CompileKey {
                kernel: kernel.id(),
                target: Target::Host,
                signature: kernel.signature(),
            },
            |_| Ok(()),
        )?;

        let values = input.as_slice::<C::Elem>()?;
        let ranges: Vec<Range<usize>> =
            chunk_ranges(plan.rows, self.engine.preferred_chunk(plan.rows)).collect();
        let results: Vec<C::Elem> = self
            .engine
            .execute_batch(ranges.len(), |chunk| {
                ranges[chunk]
                    .clone()
                    .map(|row| kernel.call(plan.row(values, row)))
                    .collect::<Vec<_>>()
            })
            .into_iter()
            .flatten()
            .collect();

        NumericArray::from_shape_vec(plan.out_shape, results)
    }

    /// Apply a row kernel on a device, one logical thread per row
    #[instrument(skip_all, fields(kernel = kernel.name(), context = ctx.id()))]
    pub fn reduce_rows_on<C: CoreKernel>(
        &self,
        ctx: &DeviceContext,
        kernel: &C,
        input: &NumericArray,
    ) -> Result<NumericArray> {
        let plan = RowPlan::new(kernel, input)?;
        let compiled = ctx.compile_key(
            &self.cache,
            CompileKey {
                kernel: kernel.id(),
                target: Target::Device,
                signature: kernel.signature(),
            },
            kernel.device_compatible(),
        )?;

        let mut staging = Staging::new(ctx);
        let held = staging.hold(&[Operand::Host(input)])?;
        ctx.ensure_room(plan.rows * C::Elem::DTYPE.size_of())?;

        let results: Vec<C::Elem> = match held.first() {
            Some(Held::Snapshot(data, _)) => {
                let values = data.view::<C::Elem>().ok_or_else(|| {
                    Error::type_mismatch(kernel.name(), C::Elem::DTYPE, data.dtype())
                })?;
                if plan.rows == 0 {
                    Vec::new()
                } else {
                    ctx.launch(&compiled, plan.rows, |row| kernel.call(plan.row(values, row)))?
                }
            }
            _ => {
                return Err(Error::Other(anyhow::anyhow!(
                    "row input for {} was not staged on the device",
                    kernel.name()
                )))
            }
        };
        drop(held);
        drop(staging);

        let buffer = ctx.store(plan.out_shape, C::Elem::wrap(results))?;
        copy_out(ctx, &buffer)
    }
}

/// Arity and array dtypes against the signature, then the broadcast shape
fn check_operands(name: &str, signature: &Signature, operands: &[Operand<'_>]) -> Result<Shape> {
    if operands.len() != signature.arity() {
        return Err(Error::arity_mismatch(name, signature.arity(), operands.len()));
    }
    for (position, (operand, &expected)) in operands.iter().zip(signature.inputs()).enumerate() {
        if !matches!(operand, Operand::Scalar(_)) && operand.dtype() != expected {
            return Err(Error::type_mismatch(
                &format!("argument {position} of {name}"),
                expected,
                operand.dtype(),
            ));
        }
    }
    let shapes: Vec<Shape> = operands.iter().map(Operand::shape).collect();
    Shape::broadcast_all(&shapes)
}

/// Bytes per output position across all result columns
fn output_width(signature: &Signature) -> usize {
    signature.outputs().iter().map(|d| d.size_of()).sum()
}

/// Operand storage kept alive for the duration of one call
enum Held<'a> {
    Borrowed(&'a NumericArray),
    Snapshot(Arc<ArrayData>, Shape),
    Scalar(ScalarValue),
}

impl Held<'_> {
    fn source(&self) -> Source<'_> {
        match self {
            Held::Borrowed(array) => Source::Array {
                data: array.data(),
                shape: array.shape(),
            },
            Held::Snapshot(data, shape) => Source::Array { data, shape },
            Held::Scalar(value) => Source::Scalar(*value),
        }
    }
}

fn hold_host<'a>(name: &str, operands: &[Operand<'a>]) -> Result<Vec<Held<'a>>> {
    operands
        .iter()
        .map(|operand| match *operand {
            Operand::Host(array) => Ok(Held::Borrowed(array)),
            Operand::Scalar(value) => Ok(Held::Scalar(value)),
            Operand::Device(buffer) => Err(Error::UnsupportedTarget(format!(
                "device buffer #{} passed to host call of {name}",
                buffer.id()
            ))),
        })
        .collect()
}

/// Host operands copied to a device for one call, released on drop
struct Staging<'c> {
    ctx: &'c DeviceContext,
    staged: Vec<DeviceBuffer>,
}

impl<'c> Staging<'c> {
    fn new(ctx: &'c DeviceContext) -> Self {
        Self {
            ctx,
            staged: Vec::new(),
        }
    }

    fn hold(&mut self, operands: &[Operand<'_>]) -> Result<Vec<Held<'static>>> {
        let mut held = Vec::with_capacity(operands.len());
        for operand in operands {
            match *operand {
                Operand::Host(array) => {
                    let buffer = self.ctx.to_device(array)?;
                    self.staged.push(buffer.clone());
                    let (data, shape) = self.ctx.read(&buffer)?;
                    held.push(Held::Snapshot(data, shape));
                }
                Operand::Device(buffer) => {
                    let (data, shape) = self.ctx.read(buffer)?;
                    held.push(Held::Snapshot(data, shape));
                }
                Operand::Scalar(value) => held.push(Held::Scalar(value)),
            }
        }
        Ok(held)
    }
}

impl Drop for Staging<'_> {
    fn drop(&mut self) {
        for buffer in self.staged.drain(..) {
            // Buffers were created by this call and cannot be stale
            let _ = self.ctx.release(&buffer);
        }
    }
}

fn launch_typed<K: ScalarKernel>(
    ctx: &DeviceContext,
    compiled: &CompiledKernel,
    kernel: &K,
    held: &[Held<'_>],
    out: &Shape,
) -> Result<Outputs<K, ArrayData>> {
    let sources: Vec<Source<'_>> = held.iter().map(Held::source).collect();
    let lanes = K::Args::lanes(&sources, out, kernel.name())?;
    let n = out.size();

    let values = if n == 0 {
        debug!("empty broadcast, skipping launch");
        Vec::new()
    } else {
        let lanes = &lanes;
        ctx.launch(compiled, n, |i| kernel.call(K::Args::gather(lanes, i)))?
    };

    Ok(K::Output::split(values))
}

fn copy_out(ctx: &DeviceContext, buffer: &DeviceBuffer) -> Result<NumericArray> {
    let host = ctx.to_host(buffer);
    ctx.release(buffer)?;
    host
}

/// Reassemble per-chunk column parts into whole columns
fn join_columns(
    name: &str,
    signature: &Signature,
    parts: Vec<Result<Vec<ArrayData>>>,
) -> Result<Vec<ArrayData>> {
    let outputs = signature.outputs();
    let mut columns: Vec<Vec<ArrayData>> = vec![Vec::new(); outputs.len()];
    for part in parts {
        for (column, data) in columns.iter_mut().zip(part?) {
            column.push(data);
        }
    }

    columns
        .into_iter()
        .zip(outputs)
        .map(|(column, &dtype)| {
            ArrayData::concat(dtype, column).ok_or_else(|| Error::CompileFailure {
                kernel: name.to_string(),
                reason: format!("result column is not {dtype}"),
            })
        })
        .collect()
}
