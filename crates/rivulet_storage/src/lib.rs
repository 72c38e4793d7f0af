//! Volumes and row writers for the normalize stage.
//!
//! Two directory-backed stores: the normalize volume holds extracted-items
//! files produced upstream; the load volume holds load packages staged
//! under `new/` and atomically promoted to `loaded/`. Row writers append
//! coerced rows to per-table files inside a package, in the destination's
//! preferred loader format.

pub mod error;
pub mod load_volume;
pub mod normalize_volume;
pub mod writers;

pub use error::StorageError;
pub use load_volume::{LoadStorage, LOADED_PACKAGES_FOLDER, NEW_PACKAGES_FOLDER};
pub use normalize_volume::NormalizeStorage;
pub use writers::WriterPool;
