//! Schema errors.

use crate::types::DataType;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SchemaError {
    /// Two incompatible type proposals for the same column. Drives the
    /// coordinator's retry / single-worker fallback protocol.
    #[error(
        "cannot coerce column {table}.{column} from {existing} to {}",
        .incoming.map(|t| t.to_string()).unwrap_or_else(|| "null".to_string())
    )]
    CannotCoerceColumn {
        table: String,
        column: String,
        existing: DataType,
        incoming: Option<DataType>,
    },

    #[error("schema {0} not found")]
    NotFound(String),

    #[error("stored schema {name} is corrupt: {reason}")]
    Corrupt { name: String, reason: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl SchemaError {
    pub fn is_coercion_conflict(&self) -> bool {
        matches!(self, SchemaError::CannotCoerceColumn { .. })
    }
}
