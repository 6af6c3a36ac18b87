//! Process-wide compile cache
//!
//! Resolving a kernel for a target happens once per
//! (kernel identity, target, signature) and the result is shared by every
//! later call.
//!
//! # Thread Safety and Cache Design
//!
//! The `CompileCache` implements a thread-safe, compute-once cache that
//! prevents redundant compilation when several threads request the same key
//! simultaneously.
//!
//! 1. **State Machine**: Each entry is either `Compiling` or `Ready(Arc<_>)`
//! 2. **Compute-Once Semantics**: The first thread marks the key `Compiling`
//!    and compiles outside the lock; later threads wait on the condition
//!    variable and receive the same `Arc`
//! 3. **Failures are not cached**: A failed compilation removes the
//!    `Compiling` marker and wakes waiters, which then retry
//!
//! ## State Transitions
//!
//! - `None` → `Compiling` → `Ready(value)`
//! - `Compiling` → `None` (only on error)
//! - Never: `Ready` → anything (entries are immutable, no eviction)

use crate::kernel::{KernelId, ScalarKernel, Signature};
use crate::{Error, Result};
use lazy_static::lazy_static;
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::time::{Duration, Instant};
use tracing::debug;

lazy_static! {
    static ref GLOBAL_CACHE: Arc<CompileCache> = Arc::new(CompileCache::new());
}

/// Where a compiled kernel runs
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Target {
    /// Host CPU loop
    Host,
    /// Accelerator launch grid
    Device,
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Target::Host => f.write_str("host"),
            Target::Device => f.write_str("device"),
        }
    }
}

/// Cache key: kernel identity, target and signature
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct CompileKey {
    pub kernel: KernelId,
    pub target: Target,
    pub signature: Signature,
}

impl CompileKey {
    pub fn of<K: ScalarKernel>(kernel: &K, target: Target) -> Self {
        Self {
            kernel: kernel.id(),
            target,
            signature: kernel.signature(),
        }
    }
}

/// A kernel resolved for one target and signature
#[derive(Clone, Debug)]
pub struct CompiledKernel {
    key: CompileKey,
    symbol: String,
    compile_time: Duration,
    sequence: u64,
}

impl CompiledKernel {
    /// Lower `key` into a compiled entry
    ///
    /// `sequence` numbers compilations in the order they happened.
    pub fn lower(key: CompileKey, sequence: u64) -> Self {
        let start = Instant::now();
        let symbol = format!(
            "{}::{}__{}",
            key.target,
            key.kernel.name,
            key.signature.mangled()
        );
        Self {
            key,
            symbol,
            compile_time: start.elapsed(),
            sequence,
        }
    }

    pub fn key(&self) -> &CompileKey {
        &self.key
    }

    pub fn target(&self) -> Target {
        self.key.target
    }

    pub fn signature(&self) -> &Signature {
        &self.key.signature
    }

    /// Mangled entry-point name, e.g. `device::add__i64_i64__i64`
    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn compile_time(&self) -> Duration {
        self.compile_time
    }

    pub fn sequence(&self) -> u64 {
        self.sequence
    }
}

#[derive(Clone)]
enum EntryState {
    Compiling,
    Ready(Arc<CompiledKernel>),
}

/// Thread-safe compute-once cache of compiled kernels
pub struct CompileCache {
    storage: Mutex<HashMap<CompileKey, EntryState>>,
    ready: Condvar,
    hits: AtomicUsize,
    misses: AtomicUsize,
    compilations: AtomicU64,
}

impl CompileCache {
    pub fn new() -> Self {
        Self {
            storage: Mutex::new(HashMap::new()),
            ready: Condvar::new(),
            hits: AtomicUsize::new(0),
            misses: AtomicUsize::new(0),
            compilations: AtomicU64::new(0),
        }
    }

    /// The process-wide cache shared by executors and device contexts
    pub fn global() -> Arc<CompileCache> {
        Arc::clone(&GLOBAL_CACHE)
    }

    /// Get a compiled kernel or compile it if not present
    ///
    /// `validate` runs before lowering on a miss; its error is returned and
    /// nothing is cached.
    pub fn get_or_compile<F>(&self, key: CompileKey, validate: F) -> Result<Arc<CompiledKernel>>
    where
        F: FnOnce(&CompileKey) -> Result<()>,
    {
        let mut storage = self.lock()?;
        loop {
            match storage.get(&key).cloned() {
                Some(EntryState::Ready(compiled)) => {
                    self.hits.fetch_add(1, Ordering::Relaxed);
                    return Ok(compiled);
                }
                Some(EntryState::Compiling) => {
                    storage = self
                        .ready
                        .wait(storage)
                        .map_err(|_| poisoned())?;
                }
                None => break,
            }
        }

        storage.insert(key.clone(), EntryState::Compiling);
        drop(storage);
        self.misses.fetch_add(1, Ordering::Relaxed);

        let outcome = validate(&key).map(|()| {
            let sequence = self.compilations.fetch_add(1, Ordering::Relaxed);
            Arc::new(CompiledKernel::lower(key.clone(), sequence))
        });

        let mut storage = self.lock()?;
        match &outcome {
            Ok(compiled) => {
                debug!(
                    symbol = compiled.symbol(),
                    signature = %key.signature,
                    "compiled kernel"
                );
                storage.insert(key, EntryState::Ready(Arc::clone(compiled)));
            }
            Err(err) => {
                debug!(kernel = key.kernel.name, target = %key.target, %err, "compilation failed");
                storage.remove(&key);
            }
        }
        drop(storage);
        self.ready.notify_all();

        outcome
    }

    /// Compiled entry for `key` if it is ready
    pub fn get(&self, key: &CompileKey) -> Option<Arc<CompiledKernel>> {
        let storage = self.storage.lock().ok()?;
        match storage.get(key) {
            Some(EntryState::Ready(compiled)) => Some(Arc::clone(compiled)),
            _ => None,
        }
    }

    /// Targets a kernel has been compiled for
    pub fn targets_for(&self, kernel: KernelId) -> Vec<Target> {
        let Ok(storage) = self.storage.lock() else {
            return Vec::new();
        };
        let mut targets: Vec<Target> = storage
            .iter()
            .filter(|(key, state)| key.kernel == kernel && matches!(state, EntryState::Ready(_)))
            .map(|(key, _)| key.target)
            .collect();
        targets.sort_by_key(|t| matches!(t, Target::Device));
        targets.dedup();
        targets
    }

    /// Get cache statistics
    pub fn stats(&self) -> CacheStats {
        let hits = self.hits.load(Ordering::Relaxed);
        let misses = self.misses.load(Ordering::Relaxed);

        let entries = if let Ok(storage) = self.storage.lock() {
            storage.len()
        } else {
            0
        };

        CacheStats {
            hits,
            misses,
            entries,
            hit_rate: if hits + misses > 0 {
                hits as f64 / (hits + misses) as f64
            } else {
                0.0
            },
        }
    }

    /// Remove every ready entry and reset statistics
    pub fn clear(&self) {
        if let Ok(mut storage) = self.storage.lock() {
            storage.retain(|_, state| matches!(state, EntryState::Compiling));
        }
        self.hits.store(0, Ordering::Relaxed);
        self.misses.store(0, Ordering::Relaxed);
    }

    fn lock(&self) -> Result<MutexGuard<'_, HashMap<CompileKey, EntryState>>> {
        self.storage.lock().map_err(|_| poisoned())
    }
}

impl Default for CompileCache {
    fn default() -> Self {
        Self::new()
    }
}

fn poisoned() -> Error {
    Error::Other(anyhow::anyhow!("compile cache lock poisoned"))
}

/// Cache statistics
#[derive(Debug, Clone)]
pub struct CacheStats {
    /// Number of cache hits
    pub hits: usize,
    /// Number of cache misses
    pub misses: usize,
    /// Number of entries currently in cache
    pub entries: usize,
    /// Hit rate (hits / (hits + misses))
    pub hit_rate: f64,
}
