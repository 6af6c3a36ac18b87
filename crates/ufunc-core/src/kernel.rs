//! Scalar kernel definitions with statically declared signatures
//!
//! A kernel is a pure function from 1–4 scalars to one scalar or a pair of
//! scalars. Its signature is the pair of associated types `Args` and
//! `Output`, so a kernel whose body disagrees with its declared arity or
//! precision does not compile.
//!
//! # Example
//!
//! ```rust
//! use ufunc_core::ScalarKernel;
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
//! assert_eq!(Add.signature().to_string(), "int64(int64, int64)");
//! ```

use crate::numeric::{ArrayData, DType, Element};
use crate::operand::{Lane, Source};
use crate::shape::Shape;
use crate::{Error, Result};
use std::any::TypeId;
use std::fmt;

/// Declared input and output element types of a kernel
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Signature {
    inputs: Vec<DType>,
    outputs: Vec<DType>,
}

impl Signature {
    pub fn new(inputs: Vec<DType>, outputs: Vec<DType>) -> Self {
        Self { inputs, outputs }
    }

    /// Signature of a scalar kernel type
    pub fn of<K: ScalarKernel>() -> Self {
        Self::new(K::Args::dtypes(), K::Output::dtypes())
    }

    pub fn inputs(&self) -> &[DType] {
        &self.inputs
    }

    pub fn outputs(&self) -> &[DType] {
        &self.outputs
    }

    pub fn arity(&self) -> usize {
        self.inputs.len()
    }

    /// Whether any argument or result is 64-bit floating point
    pub fn uses_f64(&self) -> bool {
        self.inputs
            .iter()
            .chain(self.outputs.iter())
            .any(|&d| d == DType::F64)
    }

    /// Compact symbol fragment such as `f32_f32__f32`
    pub fn mangled(&self) -> String {
        let short = |d: &DType| match d {
            DType::F32 => "f32",
            DType::F64 => "f64",
            DType::I32 => "i32",
            DType::I64 => "i64",
        };
        let inputs: Vec<_> = self.inputs.iter().map(short).collect();
        let outputs: Vec<_> = self.outputs.iter().map(short).collect();
        format!("{}__{}", inputs.join("_"), outputs.join("_"))
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let join = |dtypes: &[DType]| {
            dtypes
                .iter()
                .map(|d| d.name())
                .collect::<Vec<_>>()
                .join(", ")
        };
        if self.outputs.len() == 1 {
            write!(f, "{}({})", self.outputs[0], join(&self.inputs))
        } else {
            write!(f, "Tuple({})({})", join(&self.outputs), join(&self.inputs))
        }
    }
}

/// Identity of a kernel: its name plus its Rust type
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct KernelId {
    pub name: &'static str,
    pub type_id: TypeId,
}

impl fmt::Display for KernelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

/// Argument tuples a kernel can be declared over
///
/// Implemented for tuples of one to four [`Element`] types.
pub trait KernelArgs: Copy + Send + Sync + 'static {
    /// Number of arguments
    const ARITY: usize;

    /// Per-argument element readers for one broadcast call
    type Lanes<'a>: Sync;

    /// Declared argument types
    fn dtypes() -> Vec<DType>;

    /// Bind resolved operands to typed readers over the output shape
    fn lanes<'a>(sources: &[Source<'a>], out: &Shape, kernel: &str) -> Result<Self::Lanes<'a>>;

    /// Arguments for flat output position `index`
    fn gather(lanes: &Self::Lanes<'_>, index: usize) -> Self;
}

macro_rules! impl_kernel_args {
    ($arity:expr; $($name:ident : $idx:tt),+) => {
        impl<$($name: Element),+> KernelArgs for ($($name,)+) {
            const ARITY: usize = $arity;

            type Lanes<'a> = ($(Lane<'a, $name>,)+);

            fn dtypes() -> Vec<DType> {
                vec![$($name::DTYPE),+]
            }

            fn lanes<'a>(
                sources: &[Source<'a>],
                out: &Shape,
                kernel: &str,
            ) -> Result<Self::Lanes<'a>> {
                if sources.len() != $arity {
                    return Err(Error::arity_mismatch(kernel, $arity, sources.len()));
                }
                Ok(($(sources[$idx].lane::<$name>($idx, out, kernel)?,)+))
            }

            #[inline]
            fn gather(lanes: &Self::Lanes<'_>, index: usize) -> Self {
                ($(lanes.$idx.get(index),)+)
            }
        }
    };
}

impl_kernel_args!(1; A: 0);
impl_kernel_args!(2; A: 0, B: 1);
impl_kernel_args!(3; A: 0, B: 1, C: 2);
impl_kernel_args!(4; A: 0, B: 1, C: 2, D: 3);

/// Kernel results: one scalar or a pair of scalars
pub trait KernelOutput: Copy + Send + Sync + 'static {
    /// Number of result columns
    const ARITY: usize;

    /// One value per result column
    type Columns<X>;

    /// Declared result types
    fn dtypes() -> Vec<DType>;

    /// Split per-element results into one storage column per result
    fn split(values: Vec<Self>) -> Self::Columns<ArrayData>;

    /// Convert every column, stopping at the first error
    fn try_map<X, Y, F>(columns: Self::Columns<X>, f: F) -> Result<Self::Columns<Y>>
    where
        F: FnMut(X) -> Result<Y>;

    /// Flatten columns into a vector in result order
    fn into_vec<X>(columns: Self::Columns<X>) -> Vec<X>;
}

macro_rules! impl_single_output {
    ($($ty:ty),+) => {
        $(
            impl KernelOutput for $ty {
                const ARITY: usize = 1;

                type Columns<X> = X;

                fn dtypes() -> Vec<DType> {
                    vec![<$ty as Element>::DTYPE]
                }

                fn split(values: Vec<Self>) -> ArrayData {
                    <$ty as Element>::wrap(values)
                }

                fn try_map<X, Y, F>(column: X, mut f: F) -> Result<Y>
                where
                    F: FnMut(X) -> Result<Y>,
                {
                    f(column)
                }

                fn into_vec<X>(column: X) -> Vec<X> {
                    vec![column]
                }
            }
        )+
    };
}

impl_single_output!(f32, f64, i32, i64);

impl<A: Element, B: Element> KernelOutput for (A, B) {
    const ARITY: usize = 2;

    type Columns<X> = (X, X);

    fn dtypes() -> Vec<DType> {
        vec![A::DTYPE, B::DTYPE]
    }

    fn split(values: Vec<Self>) -> (ArrayData, ArrayData) {
        let (a, b): (Vec<A>, Vec<B>) = values.into_iter().unzip();
        (A::wrap(a), B::wrap(b))
    }

    fn try_map<X, Y, F>((a, b): (X, X), mut f: F) -> Result<(Y, Y)>
    where
        F: FnMut(X) -> Result<Y>,
    {
        Ok((f(a)?, f(b)?))
    }

    fn into_vec<X>((a, b): (X, X)) -> Vec<X> {
        vec![a, b]
    }
}

/// A pure scalar function that can be broadcast over arrays
///
/// Implementations must be free of side effects: the executor evaluates
/// positions in any order and on any thread.
pub trait ScalarKernel: Send + Sync + 'static {
    /// Argument tuple, e.g. `(f32, f32, f32)`
    type Args: KernelArgs;

    /// Result, either an element type or a pair of element types
    type Output: KernelOutput;

    /// Name used for caching, logging and lookup
    fn name(&self) -> &'static str;

    /// Evaluate at one position
    fn call(&self, args: Self::Args) -> Self::Output;

    /// Whether the body can be lowered for the device
    ///
    /// Kernels that call into host-only libraries return `false`.
    fn device_compatible(&self) -> bool {
        true
    }

    /// Declared signature
    fn signature(&self) -> Signature {
        Signature::new(Self::Args::dtypes(), Self::Output::dtypes())
    }

    /// Identity used as the compile cache key
    fn id(&self) -> KernelId {
        KernelId {
            name: self.name(),
            type_id: TypeId::of::<Self>(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Clone, Copy)]
    struct Fma;

    impl ScalarKernel for Fma {
        type Args = (f32, f32, f32);
        type Output = f32;

        fn name(&self) -> &'static str {
            "fma"
        }

        fn call(&self, (a, b, c): (f32, f32, f32)) -> f32 {
            a * b + c
        }
    }

    #[derive(Clone, Copy)]
    struct SinCos;

    impl ScalarKernel for SinCos {
        type Args = (f64,);
        type Output = (f64, f64);

        fn name(&self) -> &'static str {
            "sin_cos"
        }

        fn call(&self, (x,): (f64,)) -> (f64, f64) {
            x.sin_cos()
        }
    }

    #[test]
    fn test_signature_display() {
        assert_eq!(Fma.signature().to_string(), "float32(float32, float32, float32)");
        assert_eq!(SinCos.signature().to_string(), "Tuple(float64, float64)(float64)");
        assert_eq!(Signature::of::<Fma>(), Fma.signature());
    }

    #[test]
    fn test_signature_properties() {
        let sig = Fma.signature();
        assert_eq!(sig.arity(), 3);
        assert!(!sig.uses_f64());
        assert_eq!(sig.mangled(), "f32_f32_f32__f32");
        assert!(SinCos.signature().uses_f64());
    }

    #[test]
    fn test_kernel_identity() {
        assert_eq!(Fma.id(), Fma.id());
        assert_ne!(Fma.id(), SinCos.id());
        assert_eq!(Fma.id().to_string(), "fma");
    }

    #[test]
    fn test_output_split() {
        let (s, c) = <(f64, f64)>::split(vec![(1.0, 2.0), (3.0, 4.0)]);
        assert_eq!(s.view::<f64>(), Some(&[1.0, 3.0][..]));
        assert_eq!(c.view::<f64>(), Some(&[2.0, 4.0][..]));

        let single = f32::split(vec![1.0, 2.0]);
        assert_eq!(f32::into_vec(single).len(), 1);
    }

    #[test]
    fn test_arity_constants() {
        assert_eq!(<(f32, f32, f32) as KernelArgs>::ARITY, 3);
        assert_eq!(<(i64,) as KernelArgs>::ARITY, 1);
        assert_eq!(<(f32, f32) as KernelOutput>::ARITY, 2);
        assert_eq!(<f32 as KernelOutput>::ARITY, 1);
    }
}
