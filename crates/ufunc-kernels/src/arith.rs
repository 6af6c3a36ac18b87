//! Elementwise arithmetic kernels

use std::marker::PhantomData;
use ufunc_core::{DType, Element, KernelOutput, ScalarKernel};

/// `x + y` in one element type, wrapping on integer overflow
///
/// Each instantiation has its own name (`add_i64`, `add_f32`, ...) so
/// several can share one registry.
#[derive(Clone, Copy, Debug)]
pub struct Add<T>(PhantomData<T>);

impl<T> Add<T> {
    pub fn new() -> Self {
        Self(PhantomData)
    }
}

impl<T> Default for Add<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Element + KernelOutput> ScalarKernel for Add<T> {
    type Args = (T, T);
    type Output = T;

    fn name(&self) -> &'static str {
        match T::DTYPE {
            DType::F32 => "add_f32",
            DType::F64 => "add_f64",
            DType::I32 => "add_i32",
            DType::I64 => "add_i64",
        }
    }

    #[inline]
    fn call(&self, (x, y): (T, T)) -> T {
        x.wrapping_add(y)
    }
}

/// `x + 10` for whatever element type it is instantiated with, wrapping on
/// integer overflow
///
/// Every instantiation is a separate compile-cache entry, the way an
/// untyped kernel is specialised per input type on first use.
#[derive(Clone, Copy, Debug)]
pub struct AddTen<T>(PhantomData<T>);

impl<T> AddTen<T> {
    pub fn new() -> Self {
        Self(PhantomData)
    }
}

impl<T> Default for AddTen<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Element + KernelOutput + From<i8>> ScalarKernel for AddTen<T> {
    type Args = (T,);
    type Output = T;

    fn name(&self) -> &'static str {
        "add_ten"
    }

    #[inline]
    fn call(&self, (x,): (T,)) -> T {
        x.wrapping_add(<T as From<i8>>::from(10))
    }
}
