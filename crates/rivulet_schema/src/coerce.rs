//! Row coercion against the current table definition.

use crate::error::SchemaError;
use crate::schema::Schema;
use crate::types::{ColumnSchema, DataType, PartialTable, TableSchema};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use chrono::{DateTime, NaiveDate, Utc};
use rivulet_protocol::lineage;
use rivulet_protocol::types::{Row, ScalarValue};
use rust_decimal::Decimal;
use std::str::FromStr;

/// Coerce one value to a target column type. Returns `None` when the value
/// cannot represent the target type without loss or guessing.
pub fn coerce_value(target: DataType, value: &ScalarValue) -> Option<ScalarValue> {
    if DataType::of(value) == Some(target) {
        return Some(value.clone());
    }
    match (target, value) {
        (DataType::Int64, ScalarValue::Text(s)) => s.parse::<i64>().ok().map(ScalarValue::Int),
        (DataType::Float64, ScalarValue::Int(i)) => Some(ScalarValue::Float(*i as f64)),
        (DataType::Float64, ScalarValue::Text(s)) => s.parse::<f64>().ok().map(ScalarValue::Float),
        (DataType::Decimal, ScalarValue::Int(i)) => Some(ScalarValue::Decimal(Decimal::from(*i))),
        (DataType::Decimal, ScalarValue::Float(f)) => {
            Decimal::from_f64_retain(*f).map(ScalarValue::Decimal)
        }
        (DataType::Decimal, ScalarValue::Text(s)) => {
            Decimal::from_str(s).ok().map(ScalarValue::Decimal)
        }
        (DataType::Timestamp, ScalarValue::Text(s)) => DateTime::parse_from_rfc3339(s)
            .ok()
            .map(|t| ScalarValue::Timestamp(t.with_timezone(&Utc))),
        (DataType::Timestamp, ScalarValue::Int(i)) => {
            DateTime::from_timestamp(*i, 0).map(ScalarValue::Timestamp)
        }
        (DataType::Timestamp, ScalarValue::Date(d)) => d
            .and_hms_opt(0, 0, 0)
            .map(|t| ScalarValue::Timestamp(t.and_utc())),
        (DataType::Date, ScalarValue::Text(s)) => NaiveDate::parse_from_str(s, "%Y-%m-%d")
            .ok()
            .map(ScalarValue::Date),
        (DataType::Binary, ScalarValue::Text(s)) => BASE64.decode(s).ok().map(ScalarValue::Binary),
        (DataType::Text, v) if !v.is_null() => Some(ScalarValue::Text(v.render_text())),
        _ => None,
    }
}

impl Schema {
    /// Coerce a row into a table, inferring new columns and widening
    /// existing ones as needed.
    ///
    /// Returns the coerced row and, when columns were added or widened, a
    /// partial table carrying only those columns. The schema itself is not
    /// mutated here; the caller applies the partial so the delta can also
    /// travel back to the coordinator.
    pub fn coerce_row(
        &self,
        table_name: &str,
        parent_table: Option<&str>,
        row: Row,
    ) -> Result<(Row, Option<PartialTable>), SchemaError> {
        let table = self.table(table_name);
        let mut out = Row::new();
        let mut added: Vec<ColumnSchema> = Vec::new();

        for (name, value) in row {
            let column = table
                .and_then(|t| t.column(&name))
                .map(|c| (c.data_type, c.nullable))
                .or_else(|| {
                    added
                        .iter()
                        .find(|c| c.name == name)
                        .map(|c| (c.data_type, c.nullable))
                });

            match column {
                Some((col_type, nullable)) => {
                    if value.is_null() {
                        if !nullable {
                            return Err(SchemaError::CannotCoerceColumn {
                                table: table_name.to_string(),
                                column: name,
                                existing: col_type,
                                incoming: None,
                            });
                        }
                        out.insert(name, ScalarValue::Null);
                        continue;
                    }
                    // `of` is Some for non-null values.
                    let incoming = match DataType::of(&value) {
                        Some(t) => t,
                        None => continue,
                    };
                    if let Some(coerced) = coerce_value(col_type, &value) {
                        out.insert(name, coerced);
                    } else if DataType::can_widen(col_type, incoming) {
                        added_upsert(
                            &mut added,
                            ColumnSchema {
                                name: name.clone(),
                                data_type: incoming,
                                nullable,
                            },
                        );
                        out.insert(name, value);
                    } else {
                        return Err(SchemaError::CannotCoerceColumn {
                            table: table_name.to_string(),
                            column: name,
                            existing: col_type,
                            incoming: Some(incoming),
                        });
                    }
                }
                None => {
                    // Nothing to infer from a null in an unknown column.
                    let incoming = match DataType::of(&value) {
                        Some(t) => t,
                        None => continue,
                    };
                    added_upsert(
                        &mut added,
                        ColumnSchema {
                            name: name.clone(),
                            data_type: incoming,
                            nullable: !lineage::is_lineage_column(&name),
                        },
                    );
                    out.insert(name, value);
                }
            }
        }

        let partial = if added.is_empty() {
            None
        } else {
            let parent = table
                .and_then(|t| t.parent.clone())
                .or_else(|| parent_table.map(String::from));
            Some(TableSchema {
                name: table_name.to_string(),
                parent,
                columns: added,
            })
        };
        Ok((out, partial))
    }
}

fn added_upsert(added: &mut Vec<ColumnSchema>, column: ColumnSchema) {
    match added.iter_mut().find(|c| c.name == column.name) {
        Some(existing) => *existing = column,
        None => added.push(column),
    }
}
