use crate::{protocol::IteratorType, value::Value};

/// Default select limit: every matching tuple.
pub const DEFAULT_LIMIT: u32 = u32::MAX;

/// Types usable as an index key.
///
/// A single scalar becomes a one-part key; vectors and arrays keep their order.
pub trait IntoKey {
    fn into_key(self) -> Vec<Value>;
}

impl<V: Into<Value>> IntoKey for Vec<V> {
    fn into_key(self) -> Vec<Value> {
        self.into_iter().map(Into::into).collect()
    }
}

impl<V: Into<Value>, const N: usize> IntoKey for [V; N] {
    fn into_key(self) -> Vec<Value> {
        self.into_iter().map(Into::into).collect()
    }
}

macro_rules! scalar_key {
    ($($ty:ty),*) => {$(
        impl IntoKey for $ty {
            fn into_key(self) -> Vec<Value> {
                vec![Value::from(self)]
            }
        }
    )*};
}

scalar_key!(u8, u16, u32, u64, usize, i8, i16, i32, i64, isize, bool, &str, String, Value);

/// Index addressed by number or by name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum IndexRef {
    Id(u32),
    Name(String),
}

impl Default for IndexRef {
    fn default() -> Self {
        IndexRef::Id(0)
    }
}

impl From<u32> for IndexRef {
    fn from(id: u32) -> Self {
        IndexRef::Id(id)
    }
}

impl From<&str> for IndexRef {
    fn from(name: &str) -> Self {
        IndexRef::Name(name.to_string())
    }
}

impl From<String> for IndexRef {
    fn from(name: String) -> Self {
        IndexRef::Name(name)
    }
}

/// Describes a select: which index, which key, and how many tuples.
///
/// ```rust
/// use tarantool_client::{Criteria, IteratorType};
///
/// let all = Criteria::all();
/// assert_eq!(all.iterator_type(), IteratorType::All);
///
/// let year = Criteria::key([2016, 10]).limit(1);
/// assert_eq!(year.iterator_type(), IteratorType::Eq);
/// assert_eq!(year.get_key().len(), 2);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct Criteria {
    index: IndexRef,
    key: Vec<Value>,
    limit: u32,
    offset: u32,
    iterator: Option<IteratorType>,
}

impl Default for Criteria {
    fn default() -> Self {
        Self {
            index: IndexRef::default(),
            key: Vec::new(),
            limit: DEFAULT_LIMIT,
            offset: 0,
            iterator: None,
        }
    }
}

impl Criteria {
    /// Unrestricted scan of the primary index.
    pub fn all() -> Self {
        Self::default()
    }

    /// Equality lookup on `parts`; an empty key scans everything.
    pub fn key(parts: impl IntoKey) -> Self {
        Self::default().and_key(parts)
    }

    pub fn index(id: u32) -> Self {
        Self::default().and_index(id)
    }

    pub fn index_name(name: &str) -> Self {
        Self::default().and_index(name)
    }

    pub fn and_key(mut self, parts: impl IntoKey) -> Self {
        self.key = parts.into_key();
        self
    }

    pub fn and_index(mut self, index: impl Into<IndexRef>) -> Self {
        self.index = index.into();
        self
    }

    pub fn limit(mut self, limit: u32) -> Self {
        self.limit = limit;
        self
    }

    pub fn offset(mut self, offset: u32) -> Self {
        self.offset = offset;
        self
    }

    pub fn iterator(mut self, iterator: IteratorType) -> Self {
        self.iterator = Some(iterator);
        self
    }

    pub fn get_index(&self) -> &IndexRef {
        &self.index
    }

    pub fn get_key(&self) -> &[Value] {
        &self.key
    }

    pub fn get_limit(&self) -> u32 {
        self.limit
    }

    pub fn get_offset(&self) -> u32 {
        self.offset
    }

    /// The explicit iterator, or `All` for an empty key and `Eq` otherwise.
    pub fn iterator_type(&self) -> IteratorType {
        match self.iterator {
            Some(iterator) => iterator,
            None if self.key.is_empty() => IteratorType::All,
            None => IteratorType::Eq,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scalar_key_is_wrapped() {
        assert_eq!(5u32.into_key(), vec![Value::UInt(5)]);
        assert_eq!("name".into_key(), vec![Value::from("name")]);
    }

    #[test]
    fn key_order_is_kept() {
        let criteria = Criteria::key(vec![2016, 10]);
        assert_eq!(criteria.get_key(), &[Value::UInt(2016), Value::UInt(10)]);
    }

    #[test]
    fn defaults() {
        let criteria = Criteria::all();

        assert_eq!(criteria.get_index(), &IndexRef::Id(0));
        assert_eq!(criteria.get_limit(), DEFAULT_LIMIT);
        assert_eq!(criteria.get_offset(), 0);
        assert_eq!(criteria.iterator_type(), IteratorType::All);
    }

    #[test]
    fn explicit_iterator_wins() {
        let criteria = Criteria::key([1]).iterator(IteratorType::Ge);
        assert_eq!(criteria.iterator_type(), IteratorType::Ge);
    }

    #[test]
    fn index_by_name() {
        let criteria = Criteria::index_name("secondary").and_key("x").offset(3);

        assert_eq!(criteria.get_index(), &IndexRef::Name("secondary".into()));
        assert_eq!(criteria.get_offset(), 3);
    }
}
