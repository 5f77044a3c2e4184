//! # Values - The Data Flowing Through Generative Functions
//!
//! Arguments, return values and recorded choices are all [`Value`]s. The
//! type is deliberately small: scalars, heterogeneous tuples, and arrays
//! whose leading dimension is what `Batch` and `Scan` iterate over.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::shape::{Shape, TypeId};

/// A dynamically-typed value.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub enum Value {
    /// The unit value (no data).
    #[default]
    Unit,
    /// A boolean.
    Bool(bool),
    /// A signed integer.
    Int(i64),
    /// A real number.
    Real(f64),
    /// A heterogeneous product.
    Tuple(Vec<Value>),
    /// A homogeneous array indexed along its leading dimension.
    Array(Vec<Value>),
}

impl Value {
    /// Build a tuple value.
    pub fn tuple(items: impl IntoIterator<Item = Value>) -> Self {
        Value::Tuple(items.into_iter().collect())
    }

    /// Build an array value.
    pub fn array(items: impl IntoIterator<Item = Value>) -> Self {
        Value::Array(items.into_iter().collect())
    }

    /// Build an array of reals.
    pub fn reals(items: impl IntoIterator<Item = f64>) -> Self {
        Value::Array(items.into_iter().map(Value::Real).collect())
    }

    /// Short name of this value's kind, for error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Unit => "unit",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Real(_) => "real",
            Value::Tuple(_) => "tuple",
            Value::Array(_) => "array",
        }
    }

    fn mismatch(&self, expected: &'static str) -> CoreError {
        CoreError::TypeMismatch {
            expected,
            got: self.kind().to_string(),
        }
    }

    /// Read a real. Integers are widened.
    pub fn as_real(&self) -> Result<f64, CoreError> {
        match self {
            Value::Real(x) => Ok(*x),
            Value::Int(i) => Ok(*i as f64),
            other => Err(other.mismatch("real")),
        }
    }

    /// Read an integer.
    pub fn as_int(&self) -> Result<i64, CoreError> {
        match self {
            Value::Int(i) => Ok(*i),
            other => Err(other.mismatch("int")),
        }
    }

    /// Read a non-negative integer as an index.
    pub fn as_index(&self) -> Result<usize, CoreError> {
        match self {
            Value::Int(i) if *i >= 0 => Ok(*i as usize),
            Value::Bool(b) => Ok(usize::from(*b)),
            other => Err(other.mismatch("non-negative int")),
        }
    }

    /// Read a boolean.
    pub fn as_bool(&self) -> Result<bool, CoreError> {
        match self {
            Value::Bool(b) => Ok(*b),
            other => Err(other.mismatch("bool")),
        }
    }

    /// Borrow the items of a tuple.
    pub fn as_tuple(&self) -> Result<&[Value], CoreError> {
        match self {
            Value::Tuple(items) => Ok(items),
            Value::Unit => Ok(&[]),
            other => Err(other.mismatch("tuple")),
        }
    }

    /// Borrow the items of an array.
    pub fn as_array(&self) -> Result<&[Value], CoreError> {
        match self {
            Value::Array(items) => Ok(items),
            other => Err(other.mismatch("array")),
        }
    }

    /// Read an array of reals.
    pub fn as_reals(&self) -> Result<Vec<f64>, CoreError> {
        self.as_array()?.iter().map(Value::as_real).collect()
    }

    /// Element `i` of a tuple or array.
    pub fn at(&self, i: usize) -> Result<&Value, CoreError> {
        let items = match self {
            Value::Tuple(items) | Value::Array(items) => items,
            other => return Err(other.mismatch("tuple or array")),
        };
        items
            .get(i)
            .ok_or(CoreError::IndexOutOfBounds { index: i, len: items.len() })
    }

    /// Leading extent of an array value.
    pub fn extent(&self) -> Result<usize, CoreError> {
        self.as_array().map(<[Value]>::len)
    }

    /// Bitwise equality: reals compare by bit pattern, so `NaN` equals
    /// itself and `0.0` differs from `-0.0`.
    pub fn bitwise_eq(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Unit, Value::Unit) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Real(a), Value::Real(b)) => a.to_bits() == b.to_bits(),
            (Value::Tuple(a), Value::Tuple(b)) | (Value::Array(a), Value::Array(b)) => {
                a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.bitwise_eq(y))
            }
            _ => false,
        }
    }

    /// The structural shape of this value.
    ///
    /// Arrays take the shape of their first element; an empty array has
    /// unit element shape.
    pub fn shape(&self) -> Shape {
        match self {
            Value::Unit => Shape::Unit,
            Value::Bool(_) => Shape::Scalar(TypeId("bool")),
            Value::Int(_) => Shape::Scalar(TypeId("int")),
            Value::Real(_) => Shape::Scalar(TypeId("real")),
            Value::Tuple(items) => Shape::Tuple(items.iter().map(Value::shape).collect()),
            Value::Array(items) => Shape::Array(
                items.len(),
                Box::new(items.first().map(Value::shape).unwrap_or(Shape::Unit)),
            ),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Unit => write!(f, "()"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Int(i) => write!(f, "{i}"),
            Value::Real(x) => write!(f, "{x}"),
            Value::Tuple(items) => {
                write!(f, "(")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{item}")?;
                }
                write!(f, ")")
            }
            Value::Array(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{item}")?;
                }
                write!(f, "]")
            }
        }
    }
}

impl From<f64> for Value {
    fn from(x: f64) -> Self {
        Value::Real(x)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Value::Int(i64::from(i))
    }
}

impl From<usize> for Value {
    fn from(i: usize) -> Self {
        Value::Int(i as i64)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<()> for Value {
    fn from(_: ()) -> Self {
        Value::Unit
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::Array(items)
    }
}
