//! Generalized kernels over core dimensions
//!
//! A [`CoreKernel`] consumes a whole row (the last axis) instead of one
//! element. Its layout string names the core dimensions in numpy notation;
//! `(i)->()` reduces every row of an array to one value, so an input of shape
//! `(m, i)` produces an output of shape `(m,)`.

use crate::array::NumericArray;
use crate::kernel::{KernelId, Signature};
use crate::numeric::Element;
use crate::shape::Shape;
use crate::{Error, Result};
use std::any::TypeId;
use std::fmt;

/// Parsed core-dimension layout such as `(i)->()` or `(m,n),(n)->(m)`
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CoreLayout {
    inputs: Vec<Vec<String>>,
    outputs: Vec<Vec<String>>,
}

impl CoreLayout {
    pub fn parse(layout: &str) -> Result<Self> {
        let invalid = |reason: &str| Error::InvalidParameter(format!("layout {layout:?}: {reason}"));

        let (lhs, rhs) = layout
            .split_once("->")
            .ok_or_else(|| invalid("missing `->`"))?;
        let inputs = parse_groups(lhs).map_err(|r| invalid(r))?;
        let outputs = parse_groups(rhs).map_err(|r| invalid(r))?;

        for dim in outputs.iter().flatten() {
            if !inputs.iter().flatten().any(|d| d == dim) {
                return Err(invalid("output dimension not bound by any input"));
            }
        }

        Ok(Self { inputs, outputs })
    }

    pub fn inputs(&self) -> &[Vec<String>] {
        &self.inputs
    }

    pub fn outputs(&self) -> &[Vec<String>] {
        &self.outputs
    }

    /// One input with one core dimension reduced to a scalar
    pub fn is_row_reduction(&self) -> bool {
        self.inputs.len() == 1
            && self.inputs[0].len() == 1
            && self.outputs.len() == 1
            && self.outputs[0].is_empty()
    }
}

impl fmt::Display for CoreLayout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let side = |groups: &[Vec<String>]| {
            groups
                .iter()
                .map(|g| format!("({})", g.join(",")))
                .collect::<Vec<_>>()
                .join(",")
        };
        write!(f, "{}->{}", side(&self.inputs), side(&self.outputs))
    }
}

fn parse_groups(side: &str) -> std::result::Result<Vec<Vec<String>>, &'static str> {
    let mut groups = Vec::new();
    let mut rest = side.trim();

    loop {
        rest = rest
            .strip_prefix('(')
            .ok_or("expected `(`")?;
        let close = rest.find(')').ok_or("unclosed `(`")?;
        let body = rest[..close].trim();

        let dims = if body.is_empty() {
            Vec::new()
        } else {
            body.split(',')
                .map(|d| {
                    let d = d.trim();
                    if !d.is_empty() && d.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
                        Ok(d.to_string())
                    } else {
                        Err("invalid dimension name")
                    }
                })
                .collect::<std::result::Result<Vec<_>, _>>()?
        };
        groups.push(dims);

        rest = rest[close + 1..].trim_start();
        if rest.is_empty() {
            return Ok(groups);
        }
        rest = rest
            .strip_prefix(',')
            .ok_or("expected `,` between groups")?
            .trim_start();
    }
}

/// A function of one row of elements
pub trait CoreKernel: Send + Sync + 'static {
    type Elem: Element;

    fn name(&self) -> &'static str;

    /// Core-dimension layout; only row reductions can be executed
    fn layout(&self) -> &'static str {
        "(i)->()"
    }

    fn call(&self, row: &[Self::Elem]) -> Self::Elem;

    fn device_compatible(&self) -> bool {
        true
    }

    fn signature(&self) -> Signature {
        Signature::new(vec![Self::Elem::DTYPE], vec![Self::Elem::DTYPE])
    }

    fn id(&self) -> KernelId {
        KernelId {
            name: self.name(),
            type_id: TypeId::of::<Self>(),
        }
    }
}

/// How a row reduction maps an input onto its output
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct RowPlan {
    pub out_shape: Shape,
    pub rows: usize,
    pub row_len: usize,
}

impl RowPlan {
    pub fn new<K: CoreKernel>(kernel: &K, input: &NumericArray) -> Result<Self> {
        let layout = CoreLayout::parse(kernel.layout())?;
        if !layout.is_row_reduction() {
            return Err(Error::CompileFailure {
                kernel: kernel.name().to_string(),
                reason: format!("layout {layout} is not supported, only (i)->()"),
            });
        }
        if input.dtype() != K::Elem::DTYPE {
            return Err(Error::type_mismatch(
                &format!("argument 0 of {}", kernel.name()),
                K::Elem::DTYPE,
                input.dtype(),
            ));
        }

        let out_shape = input.shape().without_last_axis().ok_or_else(|| {
            Error::shape_mismatch(
                &format!("core dimension of {}", kernel.name()),
                &[0],
                input.shape().dims(),
            )
        })?;
        let row_len = input.shape().dims().last().copied().unwrap_or(0);

        Ok(Self {
            rows: out_shape.size(),
            row_len,
            out_shape,
        })
    }

    pub fn row<'a, T>(&self, values: &'a [T], index: usize) -> &'a [T] {
        let start = index * self.row_len;
        &values[start..start + self.row_len]
    }
}
