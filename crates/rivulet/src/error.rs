//! Engine errors.

use rivulet_protocol::pua::PuaDecodeError;
use rivulet_schema::SchemaError;
use rivulet_storage::StorageError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum NormalizeError {
    #[error(transparent)]
    Schema(#[from] SchemaError),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Pua(#[from] PuaDecodeError),

    #[error("malformed record batch in {file} line {line}: {source}")]
    Decode {
        file: String,
        line: usize,
        #[source]
        source: serde_json::Error,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("worker thread panicked")]
    WorkerPanic,

    #[error("cancellation requested")]
    Cancelled,
}

impl NormalizeError {
    /// Conflicts are the one error kind the coordinator recovers from
    /// (chunk retry, then single-worker fallback).
    pub fn is_coercion_conflict(&self) -> bool {
        matches!(
            self,
            NormalizeError::Schema(SchemaError::CannotCoerceColumn { .. })
        )
    }
}
