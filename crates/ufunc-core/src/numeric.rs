//! Fixed-width element types for kernel signatures and arrays
//!
//! Precision is always explicit: a kernel declared over `f32` never accepts
//! `f64` arrays, and the device cost of 64-bit arithmetic stays visible in
//! the signature.
//!
//! # Design Philosophy
//!
//! - **Closed set**: `float32`, `float64`, `int32` and `int64` only
//! - **Plain old data**: every element is `Pod`, so buffers are byte copies
//! - **Runtime tags**: [`DType`] carries the type through type-erased storage

use bytemuck::Pod;
use num_traits::NumCast;
use std::fmt::{self, Debug};

/// Runtime tag for an element type
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum DType {
    F32,
    F64,
    I32,
    I64,
}

impl DType {
    /// Size of one element in bytes
    pub fn size_of(self) -> usize {
        match self {
            DType::F32 | DType::I32 => 4,
            DType::F64 | DType::I64 => 8,
        }
    }

    /// Name used in signature strings
    pub fn name(self) -> &'static str {
        match self {
            DType::F32 => "float32",
            DType::F64 => "float64",
            DType::I32 => "int32",
            DType::I64 => "int64",
        }
    }

    /// Whether this is a floating point type
    pub fn is_float(self) -> bool {
        matches!(self, DType::F32 | DType::F64)
    }
}

impl fmt::Display for DType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Type-erased element storage
#[derive(Clone, Debug, PartialEq)]
pub enum ArrayData {
    F32(Vec<f32>),
    F64(Vec<f64>),
    I32(Vec<i32>),
    I64(Vec<i64>),
}

impl ArrayData {
    /// Zero-filled storage of the given type and length
    pub fn zeroed(dtype: DType, len: usize) -> Self {
        match dtype {
            DType::F32 => ArrayData::F32(vec![0.0; len]),
            DType::F64 => ArrayData::F64(vec![0.0; len]),
            DType::I32 => ArrayData::I32(vec![0; len]),
            DType::I64 => ArrayData::I64(vec![0; len]),
        }
    }

    pub fn dtype(&self) -> DType {
        match self {
            ArrayData::F32(_) => DType::F32,
            ArrayData::F64(_) => DType::F64,
            ArrayData::I32(_) => DType::I32,
            ArrayData::I64(_) => DType::I64,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            ArrayData::F32(v) => v.len(),
            ArrayData::F64(v) => v.len(),
            ArrayData::I32(v) => v.len(),
            ArrayData::I64(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Raw bytes of the storage
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            ArrayData::F32(v) => bytemuck::cast_slice(v),
            ArrayData::F64(v) => bytemuck::cast_slice(v),
            ArrayData::I32(v) => bytemuck::cast_slice(v),
            ArrayData::I64(v) => bytemuck::cast_slice(v),
        }
    }

    /// Size of the storage in bytes
    pub fn nbytes(&self) -> usize {
        self.len() * self.dtype().size_of()
    }

    /// Bitwise equality (NaN payloads and signed zeros included)
    pub fn bit_eq(&self, other: &ArrayData) -> bool {
        self.dtype() == other.dtype() && self.as_bytes() == other.as_bytes()
    }

    /// Typed view, `None` if `T` is not the stored type
    pub fn view<T: Element>(&self) -> Option<&[T]> {
        T::view(self)
    }

    /// Join parts of one dtype end to end
    ///
    /// Returns `None` when a part has a different dtype.
    pub fn concat(dtype: DType, parts: Vec<ArrayData>) -> Option<ArrayData> {
        fn join<T: Element>(parts: Vec<ArrayData>) -> Option<ArrayData> {
            let total = parts.iter().map(ArrayData::len).sum();
            let mut values = Vec::with_capacity(total);
            for part in &parts {
                values.extend_from_slice(T::view(part)?);
            }
            Some(T::wrap(values))
        }

        match dtype {
            DType::F32 => join::<f32>(parts),
            DType::F64 => join::<f64>(parts),
            DType::I32 => join::<i32>(parts),
            DType::I64 => join::<i64>(parts),
        }
    }
}

/// A single typed value used as a broadcast operand
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum ScalarValue {
    F32(f32),
    F64(f64),
    I32(i32),
    I64(i64),
}

impl ScalarValue {
    pub fn dtype(&self) -> DType {
        match self {
            ScalarValue::F32(_) => DType::F32,
            ScalarValue::F64(_) => DType::F64,
            ScalarValue::I32(_) => DType::I32,
            ScalarValue::I64(_) => DType::I64,
        }
    }

    /// Numeric cast to `T`, `None` when the value is not representable
    ///
    /// A float converts to an integer type only when it is a whole number
    /// in range.
    pub fn cast<T: Element>(self) -> Option<T> {
        let integral = !T::DTYPE.is_float();
        match self {
            ScalarValue::F32(v) if integral && v.fract() != 0.0 => None,
            ScalarValue::F64(v) if integral && v.fract() != 0.0 => None,
            ScalarValue::F32(v) => <T as NumCast>::from(v),
            ScalarValue::F64(v) => <T as NumCast>::from(v),
            ScalarValue::I32(v) => <T as NumCast>::from(v),
            ScalarValue::I64(v) => <T as NumCast>::from(v),
        }
    }
}

/// Element types usable in kernel signatures
pub trait Element: Pod + NumCast + PartialEq + Debug + Send + Sync + 'static {
    /// Runtime tag of this type
    const DTYPE: DType;

    /// Move a vector into type-erased storage
    fn wrap(values: Vec<Self>) -> ArrayData;

    /// Borrow type-erased storage as this type
    fn view(data: &ArrayData) -> Option<&[Self]>;

    /// `self + rhs`, wrapping on integer overflow
    fn wrapping_add(self, rhs: Self) -> Self;
}

macro_rules! impl_element {
    ($ty:ty, $variant:ident, $add:expr) => {
        impl Element for $ty {
            const DTYPE: DType = DType::$variant;

            fn wrap(values: Vec<Self>) -> ArrayData {
                ArrayData::$variant(values)
            }

            fn view(data: &ArrayData) -> Option<&[Self]> {
                match data {
                    ArrayData::$variant(v) => Some(v),
                    _ => None,
                }
            }

            #[inline]
            fn wrapping_add(self, rhs: Self) -> Self {
                let add: fn($ty, $ty) -> $ty = $add;
                add(self, rhs)
            }
        }

        impl From<$ty> for ScalarValue {
            fn from(value: $ty) -> Self {
                ScalarValue::$variant(value)
            }
        }

        impl From<Vec<$ty>> for ArrayData {
            fn from(values: Vec<$ty>) -> Self {
                ArrayData::$variant(values)
            }
        }
    };
}

impl_element!(f32, F32, |a, b| a + b);
impl_element!(f64, F64, |a, b| a + b);
impl_element!(i32, I32, i32::wrapping_add);
impl_element!(i64, I64, i64::wrapping_add);
