//! Buffered row writers.
//!
//! One pool per worker chunk. Writers are keyed by `(schema, table)` and
//! created lazily on the first row; output file names carry the chunk id,
//! so concurrent workers writing the same table within one load package
//! never share a path.

use crate::error::StorageError;
use rivulet_protocol::config::LoaderFileFormat;
use rivulet_protocol::naming;
use rivulet_protocol::types::Row;
use rivulet_schema::ColumnSchema;
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

mod jsonl;
mod parquet;

pub use jsonl::JsonlWriter;
pub use parquet::ParquetWriter;

/// A buffered writer appending rows to one output file.
pub trait RowWriter: Send {
    fn write_row(&mut self, row: &Row, columns: &[ColumnSchema]) -> Result<(), StorageError>;

    /// Flush, close and return the final file path.
    fn close(self: Box<Self>) -> Result<PathBuf, StorageError>;
}

fn new_row_writer(
    format: LoaderFileFormat,
    path: &Path,
) -> Result<Box<dyn RowWriter>, StorageError> {
    Ok(match format {
        LoaderFileFormat::Jsonl => Box::new(JsonlWriter::create(path)?),
        LoaderFileFormat::Parquet => Box::new(ParquetWriter::create(path)),
    })
}

pub struct WriterPool {
    package_dir: PathBuf,
    chunk_id: String,
    format: LoaderFileFormat,
    writers: HashMap<(String, String), Box<dyn RowWriter>>,
}

impl WriterPool {
    pub(crate) fn new(package_dir: PathBuf, chunk_id: String, format: LoaderFileFormat) -> Self {
        Self {
            package_dir,
            chunk_id,
            format,
            writers: HashMap::new(),
        }
    }

    /// Append one coerced row to the writer owning `(schema, table)`,
    /// creating it on first use.
    pub fn write_data_item(
        &mut self,
        schema_name: &str,
        table: &str,
        row: &Row,
        columns: &[ColumnSchema],
    ) -> Result<(), StorageError> {
        let key = (schema_name.to_string(), table.to_string());
        let writer = match self.writers.entry(key) {
            Entry::Occupied(entry) => entry.into_mut(),
            Entry::Vacant(entry) => {
                fs::create_dir_all(&self.package_dir)?;
                let file_name = naming::row_file_name(
                    schema_name,
                    table,
                    &self.chunk_id,
                    self.format.file_extension(),
                );
                entry.insert(new_row_writer(self.format, &self.package_dir.join(file_name))?)
            }
        };
        writer.write_row(row, columns)
    }

    /// Flush and close every writer, returning the closed file paths.
    pub fn close_writers(self) -> Result<Vec<PathBuf>, StorageError> {
        let mut closed = Vec::with_capacity(self.writers.len());
        for (_, writer) in self.writers {
            closed.push(writer.close()?);
        }
        closed.sort();
        Ok(closed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rivulet_protocol::types::ScalarValue;
    use rivulet_schema::DataType;
    use tempfile::tempdir;

    fn columns(fields: &[(&str, DataType)]) -> Vec<ColumnSchema> {
        fields
            .iter()
            .map(|(name, data_type)| ColumnSchema {
                name: name.to_string(),
                data_type: *data_type,
                nullable: true,
            })
            .collect()
    }

    fn row(fields: &[(&str, ScalarValue)]) -> Row {
        fields
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn pool_writes_one_file_per_table() {
        let dir = tempdir().unwrap();
        let mut pool = WriterPool::new(
            dir.path().join("pkg"),
            "abc123".to_string(),
            LoaderFileFormat::Jsonl,
        );

        let cols = columns(&[("id", DataType::Int64)]);
        pool.write_data_item("s1", "orders", &row(&[("id", ScalarValue::Int(1))]), &cols)
            .unwrap();
        pool.write_data_item("s1", "orders", &row(&[("id", ScalarValue::Int(2))]), &cols)
            .unwrap();
        pool.write_data_item("s1", "users", &row(&[("id", ScalarValue::Int(3))]), &cols)
            .unwrap();

        let closed = pool.close_writers().unwrap();
        assert_eq!(closed.len(), 2);
        let names: Vec<String> = closed
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().to_string())
            .collect();
        assert!(names.contains(&"s1.orders.abc123.jsonl".to_string()));
        assert!(names.contains(&"s1.users.abc123.jsonl".to_string()));

        let orders = std::fs::read_to_string(dir.path().join("pkg/s1.orders.abc123.jsonl")).unwrap();
        assert_eq!(orders.lines().count(), 2);
    }

    #[test]
    fn empty_pool_closes_cleanly() {
        let pool = WriterPool::new(
            PathBuf::from("/nonexistent"),
            "x".to_string(),
            LoaderFileFormat::Jsonl,
        );
        assert!(pool.close_writers().unwrap().is_empty());
    }
}
