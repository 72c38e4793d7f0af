//! Column, table and update types.

use rivulet_protocol::types::ScalarValue;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Nominal column type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataType {
    Bool,
    Int64,
    Float64,
    Decimal,
    Timestamp,
    Date,
    Text,
    Binary,
}

impl DataType {
    /// Nominal type of a cell value. `Null` carries no type.
    pub fn of(value: &ScalarValue) -> Option<DataType> {
        match value {
            ScalarValue::Null => None,
            ScalarValue::Bool(_) => Some(DataType::Bool),
            ScalarValue::Int(_) => Some(DataType::Int64),
            ScalarValue::Float(_) => Some(DataType::Float64),
            ScalarValue::Text(_) => Some(DataType::Text),
            ScalarValue::Timestamp(_) => Some(DataType::Timestamp),
            ScalarValue::Date(_) => Some(DataType::Date),
            ScalarValue::Decimal(_) => Some(DataType::Decimal),
            ScalarValue::Binary(_) => Some(DataType::Binary),
        }
    }

    /// Whether a column may move from `from` to `to` without rewriting
    /// rows that were already emitted.
    ///
    /// Widening is permitted from `Int64` (the narrowest inference for
    /// numeric-looking data) and from `Date`; once a column has settled on
    /// any other scalar type it no longer moves.
    pub fn can_widen(from: DataType, to: DataType) -> bool {
        if from == to {
            return true;
        }
        matches!(
            (from, to),
            (DataType::Int64, DataType::Float64)
                | (DataType::Int64, DataType::Decimal)
                | (DataType::Int64, DataType::Text)
                | (DataType::Date, DataType::Timestamp)
        )
    }
}

impl std::fmt::Display for DataType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DataType::Bool => write!(f, "bool"),
            DataType::Int64 => write!(f, "int64"),
            DataType::Float64 => write!(f, "float64"),
            DataType::Decimal => write!(f, "decimal"),
            DataType::Timestamp => write!(f, "timestamp"),
            DataType::Date => write!(f, "date"),
            DataType::Text => write!(f, "text"),
            DataType::Binary => write!(f, "binary"),
        }
    }
}

/// One column of a table, in discovery order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnSchema {
    pub name: String,
    pub data_type: DataType,
    pub nullable: bool,
}

/// A table definition: parent linkage and ordered columns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableSchema {
    pub name: String,
    pub parent: Option<String>,
    pub columns: Vec<ColumnSchema>,
}

impl TableSchema {
    pub fn new(name: impl Into<String>, parent: Option<String>) -> Self {
        Self {
            name: name.into(),
            parent,
            columns: Vec::new(),
        }
    }

    pub fn column(&self, name: &str) -> Option<&ColumnSchema> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// Append a column, or replace the definition of an existing one in
    /// place (order is preserved).
    pub fn upsert_column(&mut self, column: ColumnSchema) {
        match self.columns.iter_mut().find(|c| c.name == column.name) {
            Some(existing) => *existing = column,
            None => self.columns.push(column),
        }
    }
}

/// A partial table: only the columns added or widened by one coercion.
pub type PartialTable = TableSchema;

/// One worker-side bundle of partial tables, keyed by table name, each
/// list in production order. Non-conflicting bundles merge commutatively.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SchemaUpdate {
    pub tables: BTreeMap<String, Vec<PartialTable>>,
}

impl SchemaUpdate {
    pub fn push(&mut self, table: impl Into<String>, partial: PartialTable) {
        self.tables.entry(table.into()).or_default().push(partial);
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    /// Total number of partial tables in the bundle.
    pub fn delta_count(&self) -> usize {
        self.tables.values().map(Vec::len).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn widening_rules() {
        assert!(DataType::can_widen(DataType::Int64, DataType::Int64));
        assert!(DataType::can_widen(DataType::Int64, DataType::Float64));
        assert!(DataType::can_widen(DataType::Int64, DataType::Decimal));
        assert!(DataType::can_widen(DataType::Int64, DataType::Text));
        assert!(DataType::can_widen(DataType::Date, DataType::Timestamp));

        assert!(!DataType::can_widen(DataType::Float64, DataType::Text));
        assert!(!DataType::can_widen(DataType::Float64, DataType::Int64));
        assert!(!DataType::can_widen(DataType::Text, DataType::Int64));
        assert!(!DataType::can_widen(DataType::Timestamp, DataType::Date));
    }

    #[test]
    fn upsert_preserves_order() {
        let mut table = TableSchema::new("orders", None);
        table.upsert_column(ColumnSchema {
            name: "id".to_string(),
            data_type: DataType::Int64,
            nullable: true,
        });
        table.upsert_column(ColumnSchema {
            name: "amount".to_string(),
            data_type: DataType::Int64,
            nullable: true,
        });
        table.upsert_column(ColumnSchema {
            name: "id".to_string(),
            data_type: DataType::Float64,
            nullable: true,
        });

        let names: Vec<&str> = table.columns.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["id", "amount"]);
        assert_eq!(table.column("id").unwrap().data_type, DataType::Float64);
    }

    #[test]
    fn update_delta_count() {
        let mut update = SchemaUpdate::default();
        assert!(update.is_empty());
        update.push("orders", TableSchema::new("orders", None));
        update.push("orders", TableSchema::new("orders", None));
        update.push("orders__items", TableSchema::new("orders__items", Some("orders".to_string())));
        assert_eq!(update.delta_count(), 3);
    }
}
