//! Line-delimited JSON row writer.

use crate::error::StorageError;
use crate::writers::RowWriter;
use rivulet_protocol::types::Row;
use rivulet_schema::ColumnSchema;
use serde_json::{Map, Value as JsonValue};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

pub struct JsonlWriter {
    path: PathBuf,
    writer: BufWriter<File>,
}

impl JsonlWriter {
    pub fn create(path: &Path) -> Result<Self, StorageError> {
        Ok(Self {
            path: path.to_path_buf(),
            writer: BufWriter::new(File::create(path)?),
        })
    }
}

impl RowWriter for JsonlWriter {
    fn write_row(&mut self, row: &Row, columns: &[ColumnSchema]) -> Result<(), StorageError> {
        // Keys in schema column order; anything the schema does not know
        // about yet trails behind rather than being dropped.
        let mut object = Map::with_capacity(row.len());
        for column in columns {
            if let Some(value) = row.get(&column.name) {
                object.insert(column.name.clone(), value.to_json());
            }
        }
        for (name, value) in row {
            if !object.contains_key(name) {
                object.insert(name.clone(), value.to_json());
            }
        }
        serde_json::to_writer(&mut self.writer, &JsonValue::Object(object))?;
        self.writer.write_all(b"\n")?;
        Ok(())
    }

    fn close(self: Box<Self>) -> Result<PathBuf, StorageError> {
        let mut this = *self;
        this.writer.flush()?;
        Ok(this.path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rivulet_protocol::types::ScalarValue;
    use rivulet_schema::DataType;
    use tempfile::tempdir;

    #[test]
    fn rows_follow_column_order() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("out.jsonl");
        let mut writer = Box::new(JsonlWriter::create(&path).unwrap());

        let columns = vec![
            ColumnSchema {
                name: "id".to_string(),
                data_type: DataType::Int64,
                nullable: true,
            },
            ColumnSchema {
                name: "amount".to_string(),
                data_type: DataType::Int64,
                nullable: true,
            },
        ];
        let row: Row = [
            ("amount".to_string(), ScalarValue::Int(10)),
            ("id".to_string(), ScalarValue::Int(1)),
        ]
        .into_iter()
        .collect();

        writer.write_row(&row, &columns).unwrap();
        let closed = writer.close().unwrap();
        assert_eq!(closed, path);

        let contents = std::fs::read_to_string(&path).unwrap();
        assert_eq!(contents, "{\"id\":1,\"amount\":10}\n");
    }
}
