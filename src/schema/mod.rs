//! Schema-level access: spaces, lookup criteria and update operations.
//!
//! # Key Components
//!
//! - [`SchemaCache`]: Resolves space and index names into ids, caching the result.
//! - [`Space`]: Select, insert, replace, update, upsert and delete on one space.
//! - [`Criteria`]: What a select looks up (index, key, limit, offset, iterator).
//! - [`Operations`]: Ordered field mutations for update and upsert.
mod cache;
mod criteria;
mod operations;
mod space;

pub use cache::{
    PRIMARY_INDEX, SchemaCache, SpaceMeta, VINDEX_ID, VINDEX_NAME_INDEX, VSPACE_ID,
    VSPACE_NAME_INDEX,
};
pub use criteria::{Criteria, DEFAULT_LIMIT, IndexRef, IntoKey};
pub use operations::{Field, Operation, OperationKind, Operations};
pub use space::Space;
