use std::{fmt, sync::Arc};

use crate::{
    error::Result,
    handler::Handler,
    protocol::Request,
    value::Tuple,
};

use super::{Criteria, IndexRef, IntoKey, Operations, SchemaCache, SpaceMeta, cache::PRIMARY_INDEX};

/// Data operations on one space.
pub struct Space<'a> {
    handler: &'a dyn Handler,
    cache: &'a SchemaCache,
    id: u32,
    meta: Option<Arc<SpaceMeta>>,
}

impl<'a> Space<'a> {
    pub(crate) fn new(handler: &'a dyn Handler, cache: &'a SchemaCache, meta: Arc<SpaceMeta>) -> Self {
        Self {
            handler,
            cache,
            id: meta.id(),
            meta: Some(meta),
        }
    }

    pub(crate) fn by_id(handler: &'a dyn Handler, cache: &'a SchemaCache, id: u32) -> Self {
        Self {
            handler,
            cache,
            id,
            meta: None,
        }
    }

    pub fn id(&self) -> u32 {
        self.id
    }

    /// Space name, when the space was looked up by name.
    pub fn name(&self) -> Option<&str> {
        self.meta.as_deref().map(SpaceMeta::name)
    }

    fn index_id(&self, index: &IndexRef) -> Result<u32> {
        match index {
            IndexRef::Id(id) => Ok(*id),
            IndexRef::Name(name) => match self.meta.as_deref().and_then(|m| m.index_id(name)) {
                Some(id) => Ok(id),
                None => self.cache.resolve_index(self.id, name, self.handler),
            },
        }
    }

    pub fn select(&self, criteria: Criteria) -> Result<Vec<Tuple>> {
        let index_id = self.index_id(criteria.get_index())?;
        let request = Request::Select {
            space_id: self.id,
            index_id,
            key: criteria.get_key().to_vec(),
            limit: criteria.get_limit(),
            offset: criteria.get_offset(),
            iterator: criteria.iterator_type(),
        };

        self.handler.handle(request)?.into_tuples()
    }

    pub fn insert(&self, tuple: Tuple) -> Result<Vec<Tuple>> {
        let request = Request::Insert {
            space_id: self.id,
            tuple,
        };
        self.handler.handle(request)?.into_tuples()
    }

    pub fn replace(&self, tuple: Tuple) -> Result<Vec<Tuple>> {
        let request = Request::Replace {
            space_id: self.id,
            tuple,
        };
        self.handler.handle(request)?.into_tuples()
    }

    /// Updates the tuple with primary key `key`.
    pub fn update(&self, key: impl IntoKey, operations: Operations) -> Result<Vec<Tuple>> {
        self.update_by_index(PRIMARY_INDEX, key, operations)
    }

    pub fn update_by_index(
        &self,
        index: impl Into<IndexRef>,
        key: impl IntoKey,
        operations: Operations,
    ) -> Result<Vec<Tuple>> {
        operations.validate()?;
        let request = Request::Update {
            space_id: self.id,
            index_id: self.index_id(&index.into())?,
            key: key.into_key(),
            operations,
        };
        self.handler.handle(request)?.into_tuples()
    }

    /// Inserts `tuple`, or applies `operations` to the existing tuple with the same key.
    pub fn upsert(&self, tuple: Tuple, operations: Operations) -> Result<()> {
        operations.validate()?;
        let request = Request::Upsert {
            space_id: self.id,
            tuple,
            operations,
        };
        self.handler.handle(request)?;
        Ok(())
    }

    /// Deletes the tuple with primary key `key`.
    pub fn delete(&self, key: impl IntoKey) -> Result<Vec<Tuple>> {
        self.delete_by_index(PRIMARY_INDEX, key)
    }

    pub fn delete_by_index(&self, index: impl Into<IndexRef>, key: impl IntoKey) -> Result<Vec<Tuple>> {
        let request = Request::Delete {
            space_id: self.id,
            index_id: self.index_id(&index.into())?,
            key: key.into_key(),
        };
        self.handler.handle(request)?.into_tuples()
    }
}

impl fmt::Debug for Space<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Space")
            .field("id", &self.id)
            .field("name", &self.name())
            .finish_non_exhaustive()
    }
}
