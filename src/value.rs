//! Tuple field values.
//!
//! [`Value`] is the structured value exchanged with the server: tuple fields, key parts
//! and update arguments. It mirrors the MessagePack type system, with extension values
//! decoded through the [`ExtensionRegistry`] into tagged [`Ext`] values.
//!
//! Integers are normalized on construction and on decode: non-negative numbers are
//! always [`Value::UInt`], and [`Value::Int`] only ever holds negative numbers, so a value
//! built locally compares equal to the same value read back from the server.
use std::fmt;

use crate::{
    error::{Error, Result},
    ext::{Ext, ExtensionRegistry},
};

/// A single tuple row.
pub type Tuple = Vec<Value>;

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Nil,
    Bool(bool),
    /// Negative integer.
    Int(i64),
    UInt(u64),
    F32(f32),
    F64(f64),
    Str(String),
    Bin(Vec<u8>),
    Array(Vec<Value>),
    Map(Vec<(Value, Value)>),
    Ext(Ext),
}

impl Value {
    pub fn as_u64(&self) -> Option<u64> {
        match self {
            Value::UInt(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(n) => Some(*n),
            Value::UInt(n) => i64::try_from(*n).ok(),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::F32(n) => Some(f64::from(*n)),
            Value::F64(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[Value]> {
        match self {
            Value::Array(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_ext(&self) -> Option<&Ext> {
        match self {
            Value::Ext(ext) => Some(ext),
            _ => None,
        }
    }

    pub fn is_number(&self) -> bool {
        matches!(
            self,
            Value::Int(_) | Value::UInt(_) | Value::F32(_) | Value::F64(_)
        )
    }

    /// Converts into the codec representation.
    pub(crate) fn to_wire(&self, extensions: &ExtensionRegistry) -> Result<rmpv::Value> {
        Ok(match self {
            Value::Nil => rmpv::Value::Nil,
            Value::Bool(b) => rmpv::Value::Boolean(*b),
            Value::Int(n) => rmpv::Value::from(*n),
            Value::UInt(n) => rmpv::Value::from(*n),
            Value::F32(n) => rmpv::Value::F32(*n),
            Value::F64(n) => rmpv::Value::F64(*n),
            Value::Str(s) => rmpv::Value::from(s.as_str()),
            Value::Bin(b) => rmpv::Value::Binary(b.clone()),
            Value::Array(items) => rmpv::Value::Array(
                items
                    .iter()
                    .map(|v| v.to_wire(extensions))
                    .collect::<Result<_>>()?,
            ),
            Value::Map(entries) => rmpv::Value::Map(
                entries
                    .iter()
                    .map(|(k, v)| Ok((k.to_wire(extensions)?, v.to_wire(extensions)?)))
                    .collect::<Result<_>>()?,
            ),
            Value::Ext(ext) => {
                let (code, data) = extensions.pack(ext)?;
                rmpv::Value::Ext(code, data)
            }
        })
    }

    /// Converts from the codec representation.
    pub(crate) fn from_wire(value: rmpv::Value, extensions: &ExtensionRegistry) -> Result<Self> {
        Ok(match value {
            rmpv::Value::Nil => Value::Nil,
            rmpv::Value::Boolean(b) => Value::Bool(b),
            rmpv::Value::Integer(n) => match (n.as_u64(), n.as_i64()) {
                (Some(n), _) => Value::UInt(n),
                (None, Some(n)) => Value::Int(n),
                (None, None) => return Err(Error::Protocol(format!("integer out of range: {n:?}"))),
            },
            rmpv::Value::F32(n) => Value::F32(n),
            rmpv::Value::F64(n) => Value::F64(n),
            rmpv::Value::String(s) => match s.into_str() {
                Some(s) => Value::Str(s),
                None => return Err(Error::Protocol("string is not valid utf-8".into())),
            },
            rmpv::Value::Binary(b) => Value::Bin(b),
            rmpv::Value::Array(items) => Value::Array(
                items
                    .into_iter()
                    .map(|v| Value::from_wire(v, extensions))
                    .collect::<Result<_>>()?,
            ),
            rmpv::Value::Map(entries) => Value::Map(
                entries
                    .into_iter()
                    .map(|(k, v)| {
                        Ok((
                            Value::from_wire(k, extensions)?,
                            Value::from_wire(v, extensions)?,
                        ))
                    })
                    .collect::<Result<_>>()?,
            ),
            rmpv::Value::Ext(code, data) => Value::Ext(extensions.unpack(code, &data)?),
        })
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Nil => f.write_str("nil"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Int(n) => write!(f, "{n}"),
            Value::UInt(n) => write!(f, "{n}"),
            Value::F32(n) => write!(f, "{n}"),
            Value::F64(n) => write!(f, "{n}"),
            Value::Str(s) => write!(f, "{s:?}"),
            Value::Bin(b) => write!(f, "<{} bytes>", b.len()),
            Value::Array(items) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{item}")?;
                }
                f.write_str("]")
            }
            Value::Map(entries) => {
                f.write_str("{")?;
                for (i, (k, v)) in entries.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{k}: {v}")?;
                }
                f.write_str("}")
            }
            Value::Ext(ext) => write!(f, "ext({})", ext.code()),
        }
    }
}

macro_rules! from_unsigned {
    ($($ty:ty),*) => {$(
        impl From<$ty> for Value {
            fn from(n: $ty) -> Self {
                Value::UInt(n as u64)
            }
        }
    )*};
}

macro_rules! from_signed {
    ($($ty:ty),*) => {$(
        impl From<$ty> for Value {
            fn from(n: $ty) -> Self {
                if n < 0 {
                    Value::Int(n as i64)
                } else {
                    Value::UInt(n as u64)
                }
            }
        }
    )*};
}

from_unsigned!(u8, u16, u32, u64, usize);
from_signed!(i8, i16, i32, i64, isize);

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<f32> for Value {
    fn from(n: f32) -> Self {
        Value::F32(n)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::F64(n)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(s)
    }
}

impl From<Vec<u8>> for Value {
    fn from(b: Vec<u8>) -> Self {
        Value::Bin(b)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::Array(items)
    }
}

impl From<Ext> for Value {
    fn from(ext: Ext) -> Self {
        Value::Ext(ext)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Value::Nil, Into::into)
    }
}

/// Builds a [`Tuple`] from a list of values.
///
/// ```rust
/// use tarantool_client::{tuple, Value};
///
/// let row = tuple![2016, 10, "ok"];
/// assert_eq!(row, vec![Value::UInt(2016), Value::UInt(10), Value::from("ok")]);
/// ```
#[macro_export]
macro_rules! tuple {
    ($($value:expr),* $(,)?) => {
        vec![$($crate::Value::from($value)),*]
    };
}
