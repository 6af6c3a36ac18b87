//! Array shapes and broadcasting rules
//!
//! Shapes are aligned on their trailing axes. Two axes are compatible when
//! they are equal or when one of them is 1; missing leading axes count as 1.
//! A scalar has the empty shape `()` and broadcasts against everything.

use crate::{Error, Result};
use std::fmt;

/// Dimensions of an array, outermost first
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct Shape(Vec<usize>);

impl Shape {
    pub fn new(dims: impl Into<Vec<usize>>) -> Self {
        Self(dims.into())
    }

    /// The zero-dimensional shape of a scalar
    pub fn scalar() -> Self {
        Self(Vec::new())
    }

    /// One-dimensional shape of length `len`
    pub fn vector(len: usize) -> Self {
        Self(vec![len])
    }

    pub fn dims(&self) -> &[usize] {
        &self.0
    }

    pub fn ndim(&self) -> usize {
        self.0.len()
    }

    /// Number of elements (1 for a scalar)
    pub fn size(&self) -> usize {
        self.0.iter().product()
    }

    /// Broadcast two shapes together
    pub fn broadcast(&self, other: &Shape) -> Result<Shape> {
        let ndim = self.ndim().max(other.ndim());
        let mut dims = vec![0; ndim];

        for axis in 0..ndim {
            let a = self.axis_from_end(ndim - 1 - axis);
            let b = other.axis_from_end(ndim - 1 - axis);
            dims[axis] = match (a, b) {
                (a, b) if a == b => a,
                (1, b) => b,
                (a, 1) => a,
                _ => return Err(Error::shape_mismatch("broadcast", self.dims(), other.dims())),
            };
        }

        Ok(Shape(dims))
    }

    /// Broadcast any number of shapes, starting from the scalar shape
    pub fn broadcast_all<'a, I>(shapes: I) -> Result<Shape>
    where
        I: IntoIterator<Item = &'a Shape>,
    {
        shapes
            .into_iter()
            .try_fold(Shape::scalar(), |acc, shape| acc.broadcast(shape))
    }

    /// Row-major strides for a contiguous array of this shape
    pub fn contiguous_strides(&self) -> Vec<usize> {
        let mut strides = vec![0; self.ndim()];
        let mut step = 1;
        for axis in (0..self.ndim()).rev() {
            strides[axis] = step;
            step *= self.0[axis];
        }
        strides
    }

    /// Strides that read this shape as if it had the broadcast shape `out`
    ///
    /// Axes that are missing or of length 1 get stride 0. `out` must be a
    /// broadcast of `self`.
    pub fn broadcast_strides(&self, out: &Shape) -> Vec<usize> {
        debug_assert!(out.ndim() >= self.ndim());
        let own = self.contiguous_strides();
        let offset = out.ndim() - self.ndim();

        (0..out.ndim())
            .map(|axis| {
                if axis < offset {
                    return 0;
                }
                let own_axis = axis - offset;
                if self.0[own_axis] == 1 && out.0[axis] != 1 {
                    0
                } else {
                    own[own_axis]
                }
            })
            .collect()
    }

    /// Whether reading this shape as `out` needs no index remapping
    ///
    /// `out` must be a broadcast of `self`; equal sizes then imply that only
    /// leading unit axes differ.
    pub fn is_same_layout(&self, out: &Shape) -> bool {
        self.size() == out.size()
    }

    /// Shape with the last axis removed
    pub fn without_last_axis(&self) -> Option<Shape> {
        self.0
            .split_last()
            .map(|(_, rest)| Shape(rest.to_vec()))
    }

    fn axis_from_end(&self, from_end: usize) -> usize {
        if from_end < self.ndim() {
            self.0[self.ndim() - 1 - from_end]
        } else {
            1
        }
    }
}

/// Offset into a strided source for flat output position `index`
#[inline]
pub fn strided_offset(mut index: usize, out_dims: &[usize], strides: &[usize]) -> usize {
    let mut offset = 0;
    for axis in (0..out_dims.len()).rev() {
        let dim = out_dims[axis];
        offset += (index % dim) * strides[axis];
        index /= dim;
    }
    offset
}

impl From<Vec<usize>> for Shape {
    fn from(dims: Vec<usize>) -> Self {
        Self(dims)
    }
}

impl<const N: usize> From<[usize; N]> for Shape {
    fn from(dims: [usize; N]) -> Self {
        Self(dims.to_vec())
    }
}

impl From<usize> for Shape {
    fn from(len: usize) -> Self {
        Self::vector(len)
    }
}

impl fmt::Display for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(")?;
        for (i, dim) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{dim}")?;
        }
        if self.0.len() == 1 {
            write!(f, ",")?;
        }
        write!(f, ")")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_broadcast_equal_and_scalar() {
        let a = Shape::vector(5);
        assert_eq!(a.broadcast(&Shape::vector(5)).unwrap(), a);
        assert_eq!(a.broadcast(&Shape::scalar()).unwrap(), a);
        assert_eq!(Shape::scalar().broadcast(&a).unwrap(), a);
    }

    #[test]
    fn test_broadcast_row_against_matrix() {
        let row = Shape::vector(4);
        let matrix = Shape::new([4, 4]);
        assert_eq!(row.broadcast(&matrix).unwrap(), Shape::new([4, 4]));

        let column = Shape::new([3, 1]);
        assert_eq!(column.broadcast(&Shape::vector(2)).unwrap(), Shape::new([3, 2]));
    }

    #[test]
    fn test_broadcast_length_one() {
        let single = Shape::vector(1);
        assert_eq!(single.broadcast(&Shape::vector(7)).unwrap(), Shape::vector(7));
    }

    #[test]
    fn test_broadcast_mismatch() {
        let err = Shape::vector(5).broadcast(&Shape::vector(7)).unwrap_err();
        match err {
            Error::ShapeMismatch { left, right, .. } => {
                assert_eq!(left, vec![5]);
                assert_eq!(right, vec![7]);
            }
            _ => panic!("Wrong error type"),
        }
    }

    #[test]
    fn test_broadcast_all() {
        let shapes = [Shape::vector(3), Shape::scalar(), Shape::new([2, 1])];
        assert_eq!(Shape::broadcast_all(&shapes).unwrap(), Shape::new([2, 3]));
        assert_eq!(Shape::broadcast_all(std::iter::empty()).unwrap(), Shape::scalar());
    }

    #[test]
    fn test_strides() {
        let shape = Shape::new([2, 3, 4]);
        assert_eq!(shape.contiguous_strides(), vec![12, 4, 1]);

        let row = Shape::vector(4);
        let out = Shape::new([4, 4]);
        assert_eq!(row.broadcast_strides(&out), vec![0, 1]);
        assert!(!row.is_same_layout(&out));
        assert!(out.is_same_layout(&out));
        assert!(Shape::vector(4).is_same_layout(&Shape::new([1, 4])));
    }

    #[test]
    fn test_strided_offset() {
        let out = Shape::new([4, 4]);
        let strides = Shape::vector(4).broadcast_strides(&out);
        assert_eq!(strides_walk(&out, &strides), (0..16).map(|i| i % 4).collect::<Vec<_>>());

        let column = Shape::new([4, 1]);
        let strides = column.broadcast_strides(&out);
        assert_eq!(strides_walk(&out, &strides), (0..16).map(|i| i / 4).collect::<Vec<_>>());
    }

    fn strides_walk(out: &Shape, strides: &[usize]) -> Vec<usize> {
        (0..out.size())
            .map(|i| strided_offset(i, out.dims(), strides))
            .collect()
    }

    #[test]
    fn test_display_and_size() {
        assert_eq!(Shape::new([4, 4]).to_string(), "(4, 4)");
        assert_eq!(Shape::vector(3).to_string(), "(3,)");
        assert_eq!(Shape::scalar().to_string(), "()");
        assert_eq!(Shape::scalar().size(), 1);
        assert_eq!(Shape::new([3, 0]).size(), 0);
    }

    #[test]
    fn test_without_last_axis() {
        assert_eq!(Shape::new([10, 2]).without_last_axis(), Some(Shape::vector(10)));
        assert_eq!(Shape::vector(2).without_last_axis(), Some(Shape::scalar()));
        assert_eq!(Shape::scalar().without_last_axis(), None);
    }
}
