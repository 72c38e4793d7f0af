//! Parquet row writer.
//!
//! Rows are buffered until close because the file schema must reflect the
//! final column set: columns may be added or widened while the chunk is
//! still being processed. At close every buffered value is coerced to its
//! column's final type and the batch is written in one shot.

use crate::error::StorageError;
use crate::writers::RowWriter;
use arrow::array::{
    ArrayRef, BinaryBuilder, BooleanBuilder, Date32Builder, Float64Builder, Int64Builder,
    RecordBatch, StringBuilder, TimestampMicrosecondBuilder,
};
use arrow::datatypes::{DataType as ArrowDataType, Field, Schema as ArrowSchema, TimeUnit};
use chrono::NaiveDate;
use parquet::arrow::ArrowWriter;
use parquet::file::properties::WriterProperties;
use rivulet_protocol::types::{Row, ScalarValue};
use rivulet_schema::coerce::coerce_value;
use rivulet_schema::{ColumnSchema, DataType};
use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Arc;

pub struct ParquetWriter {
    path: PathBuf,
    rows: Vec<Row>,
    columns: Vec<ColumnSchema>,
}

impl ParquetWriter {
    pub fn create(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
            rows: Vec::new(),
            columns: Vec::new(),
        }
    }
}

impl RowWriter for ParquetWriter {
    fn write_row(&mut self, row: &Row, columns: &[ColumnSchema]) -> Result<(), StorageError> {
        // Columns only ever grow or widen; the latest set wins.
        if columns.len() >= self.columns.len() {
            self.columns = columns.to_vec();
        }
        self.rows.push(row.clone());
        Ok(())
    }

    fn close(self: Box<Self>) -> Result<PathBuf, StorageError> {
        let this = *self;
        let fields: Vec<Field> = this.columns.iter().map(arrow_field).collect();
        let schema = Arc::new(ArrowSchema::new(fields));

        let file = File::create(&this.path)?;
        let mut writer =
            ArrowWriter::try_new(file, schema.clone(), Some(WriterProperties::builder().build()))?;
        if !this.columns.is_empty() {
            let arrays: Vec<ArrayRef> = this
                .columns
                .iter()
                .map(|column| build_array(column, &this.rows))
                .collect::<Result<_, _>>()?;
            let batch = RecordBatch::try_new(schema, arrays)?;
            writer.write(&batch)?;
        }
        writer.close()?;
        Ok(this.path)
    }
}

fn arrow_field(column: &ColumnSchema) -> Field {
    let data_type = match column.data_type {
        DataType::Bool => ArrowDataType::Boolean,
        DataType::Int64 => ArrowDataType::Int64,
        DataType::Float64 => ArrowDataType::Float64,
        // Decimals ride as strings; loaders re-parse them losslessly.
        DataType::Decimal => ArrowDataType::Utf8,
        DataType::Timestamp => ArrowDataType::Timestamp(TimeUnit::Microsecond, Some("UTC".into())),
        DataType::Date => ArrowDataType::Date32,
        DataType::Text => ArrowDataType::Utf8,
        DataType::Binary => ArrowDataType::Binary,
    };
    Field::new(column.name.clone(), data_type, column.nullable)
}

fn build_array(column: &ColumnSchema, rows: &[Row]) -> Result<ArrayRef, StorageError> {
    let mut cells = Vec::with_capacity(rows.len());
    for row in rows {
        let cell = match row.get(&column.name) {
            None | Some(ScalarValue::Null) => None,
            Some(value) => Some(coerce_value(column.data_type, value).ok_or_else(|| {
                StorageError::ColumnType {
                    column: column.name.clone(),
                    expected: column.data_type.to_string(),
                }
            })?),
        };
        cells.push(cell);
    }

    let array: ArrayRef = match column.data_type {
        DataType::Bool => {
            let mut builder = BooleanBuilder::with_capacity(cells.len());
            for cell in cells {
                match cell {
                    Some(ScalarValue::Bool(b)) => builder.append_value(b),
                    _ => builder.append_null(),
                }
            }
            Arc::new(builder.finish())
        }
        DataType::Int64 => {
            let mut builder = Int64Builder::with_capacity(cells.len());
            for cell in cells {
                match cell {
                    Some(ScalarValue::Int(i)) => builder.append_value(i),
                    _ => builder.append_null(),
                }
            }
            Arc::new(builder.finish())
        }
        DataType::Float64 => {
            let mut builder = Float64Builder::with_capacity(cells.len());
            for cell in cells {
                match cell {
                    Some(ScalarValue::Float(f)) => builder.append_value(f),
                    _ => builder.append_null(),
                }
            }
            Arc::new(builder.finish())
        }
        DataType::Decimal => {
            let mut builder = StringBuilder::new();
            for cell in cells {
                match cell {
                    Some(ScalarValue::Decimal(d)) => builder.append_value(d.to_string()),
                    _ => builder.append_null(),
                }
            }
            Arc::new(builder.finish())
        }
        DataType::Timestamp => {
            let mut builder = TimestampMicrosecondBuilder::with_capacity(cells.len())
                .with_timezone("UTC");
            for cell in cells {
                match cell {
                    Some(ScalarValue::Timestamp(t)) => builder.append_value(t.timestamp_micros()),
                    _ => builder.append_null(),
                }
            }
            Arc::new(builder.finish())
        }
        DataType::Date => {
            let epoch = NaiveDate::default();
            let mut builder = Date32Builder::with_capacity(cells.len());
            for cell in cells {
                match cell {
                    Some(ScalarValue::Date(d)) => {
                        builder.append_value((d - epoch).num_days() as i32)
                    }
                    _ => builder.append_null(),
                }
            }
            Arc::new(builder.finish())
        }
        DataType::Text => {
            let mut builder = StringBuilder::new();
            for cell in cells {
                match cell {
                    Some(ScalarValue::Text(s)) => builder.append_value(s),
                    _ => builder.append_null(),
                }
            }
            Arc::new(builder.finish())
        }
        DataType::Binary => {
            let mut builder = BinaryBuilder::new();
            for cell in cells {
                match cell {
                    Some(ScalarValue::Binary(b)) => builder.append_value(b),
                    _ => builder.append_null(),
                }
            }
            Arc::new(builder.finish())
        }
    };
    Ok(array)
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow::array::{Array, Float64Array, Int64Array, StringArray};
    use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
    use tempfile::tempdir;

    fn column(name: &str, data_type: DataType) -> ColumnSchema {
        ColumnSchema {
            name: name.to_string(),
            data_type,
            nullable: true,
        }
    }

    fn row(fields: &[(&str, ScalarValue)]) -> Row {
        fields
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn writes_a_readable_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("orders.parquet");
        let mut writer = Box::new(ParquetWriter::create(&path));

        let columns = vec![column("id", DataType::Int64), column("note", DataType::Text)];
        writer
            .write_row(
                &row(&[("id", ScalarValue::Int(1)), ("note", ScalarValue::Text("a".into()))]),
                &columns,
            )
            .unwrap();
        writer
            .write_row(&row(&[("id", ScalarValue::Int(2))]), &columns)
            .unwrap();
        writer.close().unwrap();

        let file = File::open(&path).unwrap();
        let reader = ParquetRecordBatchReaderBuilder::try_new(file)
            .unwrap()
            .build()
            .unwrap();
        let batches: Vec<RecordBatch> = reader.map(|b| b.unwrap()).collect();
        assert_eq!(batches.len(), 1);
        let batch = &batches[0];
        assert_eq!(batch.num_rows(), 2);

        let ids = batch
            .column(0)
            .as_any()
            .downcast_ref::<Int64Array>()
            .unwrap();
        assert_eq!(ids.value(0), 1);
        assert_eq!(ids.value(1), 2);

        let notes = batch
            .column(1)
            .as_any()
            .downcast_ref::<StringArray>()
            .unwrap();
        assert_eq!(notes.value(0), "a");
        assert!(notes.is_null(1));
    }

    #[test]
    fn widened_column_casts_buffered_values() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("orders.parquet");
        let mut writer = Box::new(ParquetWriter::create(&path));

        // First row written while the column was still an integer.
        writer
            .write_row(
                &row(&[("amount", ScalarValue::Int(10))]),
                &[column("amount", DataType::Int64)],
            )
            .unwrap();
        writer
            .write_row(
                &row(&[("amount", ScalarValue::Float(10.5))]),
                &[column("amount", DataType::Float64)],
            )
            .unwrap();
        writer.close().unwrap();

        let file = File::open(&path).unwrap();
        let reader = ParquetRecordBatchReaderBuilder::try_new(file)
            .unwrap()
            .build()
            .unwrap();
        let batch = reader.map(|b| b.unwrap()).next().unwrap();
        let amounts = batch
            .column(0)
            .as_any()
            .downcast_ref::<Float64Array>()
            .unwrap();
        assert_eq!(amounts.value(0), 10.0);
        assert_eq!(amounts.value(1), 10.5);
    }
}
