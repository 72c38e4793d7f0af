//! Rivulet normalize engine.
//!
//! Turns heterogeneous extracted records into schema-conformant rows,
//! partitioned by table and staged as atomically-committed load packages,
//! while evolving the shared table schema as new fields are observed.
//!
//! The [`normalize::Normalize`] coordinator shards pending input files
//! across shared-nothing workers ([`worker::normalize_files`]), merges the
//! schema deltas they discover, retries chunks that lose a merge conflict
//! and falls back to a single worker when conflicts persist.

pub mod cancel;
pub mod error;
pub mod metrics;
pub mod normalize;
pub mod relational;
pub mod worker;

pub use cancel::CancelToken;
pub use error::NormalizeError;
pub use metrics::metrics;
pub use normalize::{Normalize, RunMetrics};
pub use worker::{WorkerOutput, WorkerParams};
