//! Broadcast operands and their typed element readers

use crate::array::NumericArray;
use crate::device::DeviceBuffer;
use crate::numeric::{ArrayData, DType, Element, ScalarValue};
use crate::shape::{strided_offset, Shape};
use crate::{Error, Result};

/// One argument of a broadcast call
#[derive(Clone, Copy, Debug)]
pub enum Operand<'a> {
    /// Array in host memory
    Host(&'a NumericArray),
    /// Buffer in device memory
    Device(&'a DeviceBuffer),
    /// A literal repeated across every position
    Scalar(ScalarValue),
}

impl Operand<'_> {
    pub fn dtype(&self) -> DType {
        match self {
            Operand::Host(array) => array.dtype(),
            Operand::Device(buffer) => buffer.dtype(),
            Operand::Scalar(value) => value.dtype(),
        }
    }

    pub fn shape(&self) -> Shape {
        match self {
            Operand::Host(array) => array.shape().clone(),
            Operand::Device(buffer) => buffer.shape().clone(),
            Operand::Scalar(_) => Shape::scalar(),
        }
    }

    pub fn is_device(&self) -> bool {
        matches!(self, Operand::Device(_))
    }
}

impl<'a> From<&'a NumericArray> for Operand<'a> {
    fn from(array: &'a NumericArray) -> Self {
        Operand::Host(array)
    }
}

impl<'a> From<&'a DeviceBuffer> for Operand<'a> {
    fn from(buffer: &'a DeviceBuffer) -> Self {
        Operand::Device(buffer)
    }
}

impl From<ScalarValue> for Operand<'_> {
    fn from(value: ScalarValue) -> Self {
        Operand::Scalar(value)
    }
}

macro_rules! impl_scalar_operand {
    ($($ty:ty),+) => {
        $(
            impl From<$ty> for Operand<'_> {
                fn from(value: $ty) -> Self {
                    Operand::Scalar(value.into())
                }
            }
        )+
    };
}

impl_scalar_operand!(f32, f64, i32, i64);

/// An operand resolved to storage the executor can read directly
#[derive(Clone, Copy, Debug)]
pub enum Source<'a> {
    Array { data: &'a ArrayData, shape: &'a Shape },
    Scalar(ScalarValue),
}

impl<'a> Source<'a> {
    pub fn shape(&self) -> Shape {
        match self {
            Source::Array { shape, .. } => (*shape).clone(),
            Source::Scalar(_) => Shape::scalar(),
        }
    }

    /// Typed reader for argument `position` over the output shape
    ///
    /// Arrays must already have the declared type; scalars are cast to it.
    pub fn lane<T: Element>(&self, position: usize, out: &Shape, kernel: &str) -> Result<Lane<'a, T>> {
        match *self {
            Source::Scalar(value) => value.cast::<T>().map(Lane::Scalar).ok_or_else(|| {
                Error::type_mismatch(
                    &format!("scalar argument {position} of {kernel}"),
                    T::DTYPE,
                    value.dtype(),
                )
            }),
            Source::Array { data, shape } => {
                let values = data.view::<T>().ok_or_else(|| {
                    Error::type_mismatch(
                        &format!("argument {position} of {kernel}"),
                        T::DTYPE,
                        data.dtype(),
                    )
                })?;
                if values.len() == 1 {
                    Ok(Lane::Scalar(values[0]))
                } else if shape.is_same_layout(out) {
                    Ok(Lane::Contiguous(values))
                } else {
                    Ok(Lane::Strided {
                        values,
                        dims: out.dims().to_vec(),
                        strides: shape.broadcast_strides(out),
                    })
                }
            }
        }
    }
}

/// Reads one argument at flat output positions
#[derive(Clone, Debug)]
pub enum Lane<'a, T> {
    /// Same value everywhere
    Scalar(T),
    /// Position `i` reads element `i`
    Contiguous(&'a [T]),
    /// Position `i` is remapped through broadcast strides
    Strided {
        values: &'a [T],
        dims: Vec<usize>,
        strides: Vec<usize>,
    },
}

impl<T: Element> Lane<'_, T> {
    #[inline]
    pub fn get(&self, index: usize) -> T {
        match self {
            Lane::Scalar(value) => *value,
            Lane::Contiguous(values) => values[index],
            Lane::Strided {
                values,
                dims,
                strides,
            } => values[strided_offset(index, dims, strides)],
        }
    }
}
