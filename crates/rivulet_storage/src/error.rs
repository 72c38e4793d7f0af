//! Storage errors.

use rivulet_protocol::naming::NamingError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Naming(#[from] NamingError),

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("row value for column {column} does not fit {expected}")]
    ColumnType { column: String, expected: String },

    #[error("arrow error: {0}")]
    Arrow(#[from] arrow::error::ArrowError),

    #[error("parquet error: {0}")]
    Parquet(#[from] parquet::errors::ParquetError),
}
