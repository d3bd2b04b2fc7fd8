//! Space name resolution cache.
//!
//! Requests address spaces and indexes by numeric id, while callers use names. The
//! [`SchemaCache`] translates one into the other by selecting from the server's system
//! views through the same [`Handler`] that serves ordinary requests, so resolution calls
//! pass through every middleware (authentication included) and are counted like any
//! other call.
//!
//! # Overview
//!
//! - A miss on a space name costs exactly two requests: the space row from `_vspace`
//!   looked up by name, then its primary index from `_vindex`. Only a complete
//!   [`SpaceMeta`] is ever stored.
//! - A hit costs nothing.
//! - [`SchemaCache::flush`] drops every entry at once. There is no partial eviction.
//!
//! # Design Notes
//!
//! - A flush that happens while a cold resolution is in flight wins: the resolution still
//!   returns its result to its caller, but the result is not stored.
//! - Concurrent misses on the same name are not coalesced; each caller resolves on its own.
use std::{
    collections::HashMap,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use log::{debug, warn};

use crate::{
    error::{Error, Result},
    handler::Handler,
    protocol::{IteratorType, Request},
    value::{Tuple, Value},
};

/// System view listing the spaces visible to the current user.
pub const VSPACE_ID: u32 = 281;
/// `_vspace` index on the space name.
pub const VSPACE_NAME_INDEX: u32 = 2;
/// System view listing the indexes visible to the current user.
pub const VINDEX_ID: u32 = 289;
/// `_vindex` index on `(space id, index name)`.
pub const VINDEX_NAME_INDEX: u32 = 2;

/// Id of every space's primary index.
pub const PRIMARY_INDEX: u32 = 0;

/// Resolved identifiers of one space.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpaceMeta {
    id: u32,
    name: String,
    indexes: HashMap<String, u32>,
}

impl SpaceMeta {
    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn primary_index(&self) -> u32 {
        PRIMARY_INDEX
    }

    /// Index id for an index name known at resolution time.
    pub fn index_id(&self, name: &str) -> Option<u32> {
        self.indexes.get(name).copied()
    }
}

#[derive(Debug, Default)]
struct CacheState {
    spaces: HashMap<String, Arc<SpaceMeta>>,
    indexes: HashMap<(u32, String), u32>,
    generation: u64,
}

/// Maps space names to [`SpaceMeta`], and secondary index names to ids.
#[derive(Debug, Default)]
pub struct SchemaCache {
    state: Mutex<CacheState>,
}

impl SchemaCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, CacheState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Returns the cached entry for `name`, resolving it through `handler` on a miss.
    pub fn resolve_or_fetch(&self, name: &str, handler: &dyn Handler) -> Result<Arc<SpaceMeta>> {
        let generation = {
            let state = self.lock();
            if let Some(meta) = state.spaces.get(name) {
                return Ok(Arc::clone(meta));
            }
            state.generation
        };

        debug!("resolving space '{name}'");
        let meta = Arc::new(fetch_space(name, handler)?);

        let mut state = self.lock();
        if state.generation == generation {
            let stored = state
                .spaces
                .entry(name.to_string())
                .or_insert_with(|| Arc::clone(&meta));
            Ok(Arc::clone(stored))
        } else {
            warn!("schema flushed while resolving '{name}'; result not cached");
            Ok(meta)
        }
    }

    /// Resolves a secondary index name of space `space_id`.
    pub fn resolve_index(&self, space_id: u32, index: &str, handler: &dyn Handler) -> Result<u32> {
        let key = (space_id, index.to_string());
        let generation = {
            let state = self.lock();
            if let Some(id) = state.indexes.get(&key) {
                return Ok(*id);
            }
            state.generation
        };

        debug!("resolving index '{index}' of space #{space_id}");
        let rows = select(
            handler,
            VINDEX_ID,
            VINDEX_NAME_INDEX,
            vec![Value::from(space_id), Value::from(index)],
        )?;
        let id = rows
            .first()
            .map(|row| u32_field(row, 1, "index id"))
            .transpose()?
            .ok_or_else(|| Error::unknown_index(space_id, index))?;

        let mut state = self.lock();
        if state.generation == generation {
            state.indexes.insert(key, id);
        }
        Ok(id)
    }

    /// Discards every cached space and index.
    pub fn flush(&self) {
        let mut state = self.lock();
        state.spaces.clear();
        state.indexes.clear();
        state.generation += 1;
        debug!("schema cache flushed");
    }

    pub fn contains(&self, name: &str) -> bool {
        self.lock().spaces.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.lock().spaces.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn fetch_space(name: &str, handler: &dyn Handler) -> Result<SpaceMeta> {
    let rows = select(handler, VSPACE_ID, VSPACE_NAME_INDEX, vec![Value::from(name)])?;
    let id = match rows.first() {
        Some(row) => u32_field(row, 0, "space id")?,
        None => return Err(Error::unknown_space(name)),
    };

    let rows = select(
        handler,
        VINDEX_ID,
        PRIMARY_INDEX,
        vec![Value::from(id), Value::from(PRIMARY_INDEX)],
    )?;
    let primary = rows
        .first()
        .ok_or_else(|| Error::missing_primary_index(name))?;
    let primary_name = primary
        .get(2)
        .and_then(Value::as_str)
        .unwrap_or("primary")
        .to_string();

    Ok(SpaceMeta {
        id,
        name: name.to_string(),
        indexes: HashMap::from([(primary_name, PRIMARY_INDEX)]),
    })
}

fn select(handler: &dyn Handler, space_id: u32, index_id: u32, key: Vec<Value>) -> Result<Vec<Tuple>> {
    handler
        .handle(Request::Select {
            space_id,
            index_id,
            key,
            limit: 1,
            offset: 0,
            iterator: IteratorType::Eq,
        })?
        .into_tuples()
}

fn u32_field(row: &[Value], position: usize, what: &str) -> Result<u32> {
    row.get(position)
        .and_then(Value::as_u64)
        .and_then(|n| u32::try_from(n).ok())
        .ok_or_else(|| Error::Protocol(format!("system view row has no valid {what}")))
}
