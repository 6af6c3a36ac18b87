//! Host-resident numeric arrays
//!
//! A [`NumericArray`] owns contiguous row-major storage of one element type.
//! Its dtype and shape are fixed at construction; reshaping or moving to the
//! device produces a new value.

use crate::numeric::{ArrayData, DType, Element};
use crate::shape::Shape;
use crate::{Error, Result};

/// Fixed-shape, homogeneously-typed array in host memory
#[derive(Clone, Debug, PartialEq)]
pub struct NumericArray {
    data: ArrayData,
    shape: Shape,
}

impl NumericArray {
    /// One-dimensional array from a vector
    pub fn from_vec<T: Element>(values: Vec<T>) -> Self {
        let shape = Shape::vector(values.len());
        Self {
            data: T::wrap(values),
            shape,
        }
    }

    /// Array of the given shape from row-major values
    pub fn from_shape_vec<T: Element>(shape: impl Into<Shape>, values: Vec<T>) -> Result<Self> {
        Self::from_data(shape, T::wrap(values))
    }

    /// Array from type-erased storage
    pub fn from_data(shape: impl Into<Shape>, data: ArrayData) -> Result<Self> {
        let shape = shape.into();
        if shape.size() != data.len() {
            return Err(Error::shape_mismatch(
                "array construction",
                shape.dims(),
                &[data.len()],
            ));
        }
        Ok(Self { data, shape })
    }

    /// Zero-dimensional array holding one value
    pub fn scalar<T: Element>(value: T) -> Self {
        Self {
            data: T::wrap(vec![value]),
            shape: Shape::scalar(),
        }
    }

    /// Zero-filled array
    pub fn zeros(shape: impl Into<Shape>, dtype: DType) -> Self {
        let shape = shape.into();
        Self {
            data: ArrayData::zeroed(dtype, shape.size()),
            shape,
        }
    }

    /// `[0, 1, ..., len - 1]` in the requested element type
    ///
    /// Fails when the last index does not fit in `T`.
    pub fn arange<T: Element>(len: usize) -> Result<Self> {
        let index = |i: usize| {
            <T as num_traits::NumCast>::from(i).ok_or_else(|| {
                Error::InvalidParameter(format!("index {i} does not fit in {}", T::DTYPE))
            })
        };
        if let Some(last) = len.checked_sub(1) {
            index(last)?;
        }
        let values = (0..len).map(index).collect::<Result<Vec<T>>>()?;
        Ok(Self::from_vec::<T>(values))
    }

    pub fn dtype(&self) -> DType {
        self.data.dtype()
    }

    pub fn shape(&self) -> &Shape {
        &self.shape
    }

    /// Number of elements
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn data(&self) -> &ArrayData {
        &self.data
    }

    pub fn into_data(self) -> ArrayData {
        self.data
    }

    /// Size of the element storage in bytes
    pub fn nbytes(&self) -> usize {
        self.data.nbytes()
    }

    /// Typed view of the elements
    pub fn as_slice<T: Element>(&self) -> Result<&[T]> {
        T::view(&self.data)
            .ok_or_else(|| Error::type_mismatch("array view", T::DTYPE, self.dtype()))
    }

    /// Copy of the elements as a vector
    pub fn to_vec<T: Element>(&self) -> Result<Vec<T>> {
        self.as_slice::<T>().map(<[T]>::to_vec)
    }

    /// New array with the same elements and a different shape
    pub fn reshape(&self, shape: impl Into<Shape>) -> Result<Self> {
        let shape = shape.into();
        if shape.size() != self.len() {
            return Err(Error::shape_mismatch("reshape", self.shape.dims(), shape.dims()));
        }
        Ok(Self {
            data: self.data.clone(),
            shape,
        })
    }

    /// Element type converted copy
    pub fn astype<T: Element>(&self) -> Result<Self> {
        let values = match &self.data {
            ArrayData::F32(v) => cast_all::<_, T>(v)?,
            ArrayData::F64(v) => cast_all::<_, T>(v)?,
            ArrayData::I32(v) => cast_all::<_, T>(v)?,
            ArrayData::I64(v) => cast_all::<_, T>(v)?,
        };
        Self::from_shape_vec(self.shape.clone(), values)
    }

    /// Bitwise equality of dtype, shape and contents
    pub fn bit_eq(&self, other: &NumericArray) -> bool {
        self.shape == other.shape && self.data.bit_eq(&other.data)
    }
}

fn cast_all<S: Element, T: Element>(values: &[S]) -> Result<Vec<T>> {
    values
        .iter()
        .map(|&v| {
            <T as num_traits::NumCast>::from(v)
                .ok_or_else(|| Error::type_mismatch("astype", T::DTYPE, S::DTYPE))
        })
        .collect()
}

impl<T: Element> From<Vec<T>> for NumericArray {
    fn from(values: Vec<T>) -> Self {
        Self::from_vec(values)
    }
}
