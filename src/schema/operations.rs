//! Field mutations consumed by update and upsert requests.
//!
//! [`Operations`] is an ordered list of [`Operation`]s. The server applies them in the
//! order they were added; the client never reorders or merges them. Field numbers are
//! zero-based, and negative numbers count from the end of the tuple.
use crate::{
    error::{Error, Result},
    ext::ExtensionRegistry,
    value::Value,
};

/// Field targeted by an operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Field {
    Number(i64),
    Name(String),
}

macro_rules! numbered_field {
    ($($ty:ty),*) => {$(
        impl From<$ty> for Field {
            fn from(n: $ty) -> Self {
                Field::Number(n as i64)
            }
        }
    )*};
}

numbered_field!(u8, u16, u32, i8, i16, i32, i64, usize);

impl From<&str> for Field {
    fn from(name: &str) -> Self {
        Field::Name(name.to_string())
    }
}

impl From<String> for Field {
    fn from(name: String) -> Self {
        Field::Name(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationKind {
    Add,
    Subtract,
    BitAnd,
    BitOr,
    BitXor,
    Splice,
    Insert,
    Delete,
    Set,
}

impl OperationKind {
    pub fn symbol(self) -> &'static str {
        match self {
            OperationKind::Add => "+",
            OperationKind::Subtract => "-",
            OperationKind::BitAnd => "&",
            OperationKind::BitOr => "|",
            OperationKind::BitXor => "^",
            OperationKind::Splice => ":",
            OperationKind::Insert => "!",
            OperationKind::Delete => "#",
            OperationKind::Set => "=",
        }
    }
}

/// A single field mutation.
#[derive(Debug, Clone, PartialEq)]
pub struct Operation {
    kind: OperationKind,
    field: Field,
    args: Vec<Value>,
}

impl Operation {
    pub fn kind(&self) -> OperationKind {
        self.kind
    }

    pub fn field(&self) -> &Field {
        &self.field
    }

    pub fn args(&self) -> &[Value] {
        &self.args
    }

    fn validate(&self) -> Result<()> {
        if let Field::Name(name) = &self.field {
            if name.is_empty() {
                return Err(Error::InvalidArgument("field name is empty".into()));
            }
        }

        let arg = self.args.first();
        match self.kind {
            OperationKind::Add | OperationKind::Subtract => {
                if !arg.is_some_and(Value::is_number) {
                    return Err(Error::InvalidArgument(format!(
                        "'{}' on field {:?} requires a number, got {:?}",
                        self.kind.symbol(),
                        self.field,
                        arg
                    )));
                }
            }
            OperationKind::BitAnd | OperationKind::BitOr | OperationKind::BitXor => {
                if arg.and_then(Value::as_u64).is_none() {
                    return Err(Error::InvalidArgument(format!(
                        "'{}' on field {:?} requires an unsigned integer, got {:?}",
                        self.kind.symbol(),
                        self.field,
                        arg
                    )));
                }
            }
            OperationKind::Splice => {
                if matches!(self.args.get(1), Some(Value::Int(_))) {
                    return Err(Error::InvalidArgument(format!(
                        "splice length on field {:?} is negative",
                        self.field
                    )));
                }
            }
            OperationKind::Delete => {
                if arg.and_then(Value::as_u64).is_none_or(|count| count == 0) {
                    return Err(Error::InvalidArgument(format!(
                        "delete on field {:?} requires a positive count",
                        self.field
                    )));
                }
            }
            OperationKind::Insert | OperationKind::Set => {}
        }
        Ok(())
    }

    fn to_wire(&self, extensions: &ExtensionRegistry) -> Result<rmpv::Value> {
        let mut op = Vec::with_capacity(self.args.len() + 2);
        op.push(rmpv::Value::from(self.kind.symbol()));
        op.push(match &self.field {
            Field::Number(n) => rmpv::Value::from(*n),
            Field::Name(name) => rmpv::Value::from(name.as_str()),
        });
        for arg in &self.args {
            op.push(arg.to_wire(extensions)?);
        }
        Ok(rmpv::Value::Array(op))
    }
}

macro_rules! operation {
    ($($start:ident, $and:ident => $kind:ident;)*) => {$(
        pub fn $start(field: impl Into<Field>, value: impl Into<Value>) -> Self {
            Self::default().$and(field, value)
        }

        pub fn $and(self, field: impl Into<Field>, value: impl Into<Value>) -> Self {
            self.push(OperationKind::$kind, field.into(), vec![value.into()])
        }
    )*};
}

/// Ordered list of field mutations.
///
/// ```rust
/// use tarantool_client::Operations;
///
/// let ops = Operations::set(2, 0).and_add(3, 1);
/// assert_eq!(ops.len(), 2);
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Operations {
    operations: Vec<Operation>,
}

impl Operations {
    operation! {
        add, and_add => Add;
        subtract, and_subtract => Subtract;
        bit_and, and_bit_and => BitAnd;
        bit_or, and_bit_or => BitOr;
        bit_xor, and_bit_xor => BitXor;
        insert, and_insert => Insert;
        set, and_set => Set;
    }

    pub fn splice(field: impl Into<Field>, offset: i64, length: i64, replacement: &str) -> Self {
        Self::default().and_splice(field, offset, length, replacement)
    }

    pub fn and_splice(
        self,
        field: impl Into<Field>,
        offset: i64,
        length: i64,
        replacement: &str,
    ) -> Self {
        self.push(
            OperationKind::Splice,
            field.into(),
            vec![
                Value::from(offset),
                Value::from(length),
                Value::from(replacement),
            ],
        )
    }

    pub fn delete(field: impl Into<Field>, count: u32) -> Self {
        Self::default().and_delete(field, count)
    }

    pub fn and_delete(self, field: impl Into<Field>, count: u32) -> Self {
        self.push(OperationKind::Delete, field.into(), vec![Value::from(count)])
    }

    fn push(mut self, kind: OperationKind, field: Field, args: Vec<Value>) -> Self {
        self.operations.push(Operation { kind, field, args });
        self
    }

    pub fn iter(&self) -> impl Iterator<Item = &Operation> {
        self.operations.iter()
    }

    pub fn len(&self) -> usize {
        self.operations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }

    /// Checks every operation's arguments without touching the server.
    pub fn validate(&self) -> Result<()> {
        self.operations.iter().try_for_each(Operation::validate)
    }

    pub(crate) fn to_wire(&self, extensions: &ExtensionRegistry) -> Result<rmpv::Value> {
        Ok(rmpv::Value::Array(
            self.operations
                .iter()
                .map(|op| op.to_wire(extensions))
                .collect::<Result<_>>()?,
        ))
    }
}
