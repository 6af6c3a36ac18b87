//! Named, type-erased kernels
//!
//! Statically typed [`ScalarKernel`]s are erased behind [`DynKernel`] so they
//! can be listed, described and invoked by name with operands whose types are
//! only known at runtime.

use crate::cache::{CompileCache, Target};
use crate::kernel::{KernelArgs, KernelId, KernelOutput, ScalarKernel, Signature};
use crate::numeric::ArrayData;
use crate::operand::Source;
use crate::shape::Shape;
use crate::{Error, Result};
use std::collections::BTreeMap;
use std::fmt;
use std::ops::Range;
use std::sync::Arc;

/// Object-safe view of a scalar kernel
pub trait DynKernel: Send + Sync {
    fn name(&self) -> &'static str;

    fn id(&self) -> KernelId;

    fn signature(&self) -> Signature;

    fn device_compatible(&self) -> bool;

    /// Evaluate flat output positions `range` of a broadcast over `out`
    ///
    /// Returns one column per kernel result, each `range.len()` long.
    fn evaluate(&self, sources: &[Source<'_>], out: &Shape, range: Range<usize>)
        -> Result<Vec<ArrayData>>;
}

struct Registered<K>(K);

impl<K: ScalarKernel> DynKernel for Registered<K> {
    fn name(&self) -> &'static str {
        self.0.name()
    }

    fn id(&self) -> KernelId {
        self.0.id()
    }

    fn signature(&self) -> Signature {
        self.0.signature()
    }

    fn device_compatible(&self) -> bool {
        self.0.device_compatible()
    }

    fn evaluate(
        &self,
        sources: &[Source<'_>],
        out: &Shape,
        range: Range<usize>,
    ) -> Result<Vec<ArrayData>> {
        let lanes = K::Args::lanes(sources, out, self.0.name())?;
        let values: Vec<K::Output> = range
            .map(|i| self.0.call(K::Args::gather(&lanes, i)))
            .collect();
        Ok(K::Output::into_vec(K::Output::split(values)))
    }
}

/// Erase a kernel's static types
pub fn erase<K: ScalarKernel>(kernel: K) -> Arc<dyn DynKernel> {
    Arc::new(Registered(kernel))
}

/// Description of a registered kernel
#[derive(Clone, Debug, PartialEq)]
pub struct KernelInfo {
    pub name: &'static str,
    pub signature: Signature,
    pub device_compatible: bool,
    /// Targets present in the compile cache
    pub compiled: Vec<Target>,
}

impl KernelInfo {
    pub fn arity(&self) -> usize {
        self.signature.arity()
    }

    pub fn outputs(&self) -> usize {
        self.signature.outputs().len()
    }
}

impl fmt::Display for KernelInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", self.name)?;
        writeln!(f, "    signature: {}", self.signature)?;
        writeln!(
            f,
            "    device: {}",
            if self.device_compatible { "yes" } else { "host only" }
        )?;
        if self.compiled.is_empty() {
            write!(f, "    compiled: none")
        } else {
            let targets: Vec<String> = self.compiled.iter().map(Target::to_string).collect();
            write!(f, "    compiled: {}", targets.join(", "))
        }
    }
}

/// Kernels indexed by name
#[derive(Clone, Default)]
pub struct KernelRegistry {
    kernels: BTreeMap<&'static str, Arc<dyn DynKernel>>,
}

impl KernelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a kernel; names must be unique
    pub fn register<K: ScalarKernel>(&mut self, kernel: K) -> Result<()> {
        let name = kernel.name();
        if self.kernels.contains_key(name) {
            return Err(Error::InvalidParameter(format!(
                "kernel `{name}` is already registered"
            )));
        }
        self.kernels.insert(name, erase(kernel));
        Ok(())
    }

    /// Builder form of [`register`](Self::register)
    pub fn with<K: ScalarKernel>(mut self, kernel: K) -> Result<Self> {
        self.register(kernel)?;
        Ok(self)
    }

    pub fn get(&self, name: &str) -> Result<Arc<dyn DynKernel>> {
        self.kernels
            .get(name)
            .cloned()
            .ok_or_else(|| Error::InvalidParameter(format!("unknown kernel `{name}`")))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.kernels.contains_key(name)
    }

    /// Registered names in sorted order
    pub fn names(&self) -> Vec<&'static str> {
        self.kernels.keys().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.kernels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.kernels.is_empty()
    }

    /// Describe one kernel, including the targets `cache` holds for it
    pub fn info(&self, name: &str, cache: &CompileCache) -> Result<KernelInfo> {
        let kernel = self.get(name)?;
        Ok(describe(kernel.as_ref(), cache))
    }

    /// Describe every kernel in name order
    pub fn infos(&self, cache: &CompileCache) -> Vec<KernelInfo> {
        self.kernels
            .values()
            .map(|kernel| describe(kernel.as_ref(), cache))
            .collect()
    }
}

impl fmt::Debug for KernelRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KernelRegistry")
            .field("kernels", &self.names())
            .finish()
    }
}

fn describe(kernel: &dyn DynKernel, cache: &CompileCache) -> KernelInfo {
    KernelInfo {
        name: kernel.name(),
        signature: kernel.signature(),
        device_compatible: kernel.device_compatible(),
        compiled: cache.targets_for(kernel.id()),
    }
}
