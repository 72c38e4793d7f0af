//! Versioned table schemas for the normalize stage.
//!
//! The schema lifecycle during normalization:
//!
//! 1. **Load**: the coordinator loads the named schema, or creates an
//!    empty one on first sight.
//! 2. **Snapshot**: a serialized [`StoredSchema`] travels to each worker;
//!    workers rebuild a private mutable [`Schema`] from it.
//! 3. **Coerce**: rows are coerced against the worker's schema; new or
//!    widened columns come back as [`PartialTable`] deltas.
//! 4. **Merge**: the coordinator re-applies every delta to its master
//!    schema. Incompatible proposals surface as
//!    [`SchemaError::CannotCoerceColumn`] and drive the retry protocol.
//! 5. **Persist**: a changed schema is saved to the store and a copy is
//!    sealed into the load package.
//!
//! Column types only ever widen. Nothing in this crate rewrites a value
//! that was already emitted.

pub mod coerce;
pub mod error;
pub mod schema;
pub mod storage;
pub mod types;

pub use error::SchemaError;
pub use schema::{Schema, SchemaSettings, StoredSchema};
pub use storage::SchemaStorage;
pub use types::{ColumnSchema, DataType, PartialTable, SchemaUpdate, TableSchema};
