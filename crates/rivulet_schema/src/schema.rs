//! The mutable schema and its serialized snapshot.

use crate::error::SchemaError;
use crate::types::{PartialTable, TableSchema};
use rivulet_protocol::types::Row;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Schema-level hints applied before coercion. Patterns are either
/// `column` / `column_prefix*` (any table) or `table.column` /
/// `table.column_prefix*`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SchemaSettings {
    #[serde(default)]
    pub excluded_columns: Vec<String>,
}

/// Serialized snapshot of a [`Schema`]. This is the value that crosses the
/// worker boundary and what the store and load packages persist; workers
/// never share schema memory with the coordinator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredSchema {
    pub name: String,
    pub version: u64,
    pub tables: Vec<TableSchema>,
    #[serde(default)]
    pub settings: SchemaSettings,
}

/// A named, versioned set of table definitions.
#[derive(Debug, Clone)]
pub struct Schema {
    name: String,
    version: u64,
    tables: BTreeMap<String, TableSchema>,
    settings: SchemaSettings,
}

impl Schema {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: 1,
            tables: BTreeMap::new(),
            settings: SchemaSettings::default(),
        }
    }

    pub fn from_stored(stored: StoredSchema) -> Self {
        Self {
            name: stored.name,
            version: stored.version,
            tables: stored
                .tables
                .into_iter()
                .map(|t| (t.name.clone(), t))
                .collect(),
            settings: stored.settings,
        }
    }

    pub fn to_stored(&self) -> StoredSchema {
        StoredSchema {
            name: self.name.clone(),
            version: self.version,
            tables: self.tables.values().cloned().collect(),
            settings: self.settings.clone(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn table(&self, name: &str) -> Option<&TableSchema> {
        self.tables.get(name)
    }

    pub fn tables(&self) -> impl Iterator<Item = &TableSchema> {
        self.tables.values()
    }

    pub fn settings(&self) -> &SchemaSettings {
        &self.settings
    }

    pub fn set_settings(&mut self, settings: SchemaSettings) {
        self.settings = settings;
    }

    /// Current columns of a table, in schema order.
    pub fn table_columns(&self, name: &str) -> Vec<crate::types::ColumnSchema> {
        self.tables
            .get(name)
            .map(|t| t.columns.clone())
            .unwrap_or_default()
    }

    /// Apply a partial table to the schema.
    ///
    /// New tables and columns are appended; an existing column accepts a
    /// differing type only along the widening order. The version is bumped
    /// only when the application changed something, so re-applying a delta
    /// another worker already contributed is a no-op and non-conflicting
    /// merges commute, final version included.
    pub fn update_schema(&mut self, partial: &PartialTable) -> Result<(), SchemaError> {
        let mut changed = false;
        match self.tables.get_mut(&partial.name) {
            None => {
                self.tables.insert(partial.name.clone(), partial.clone());
                changed = true;
            }
            Some(table) => {
                for incoming in &partial.columns {
                    match table.columns.iter_mut().find(|c| c.name == incoming.name) {
                        None => {
                            table.columns.push(incoming.clone());
                            changed = true;
                        }
                        Some(existing) => {
                            if existing.data_type != incoming.data_type {
                                if crate::types::DataType::can_widen(
                                    existing.data_type,
                                    incoming.data_type,
                                ) {
                                    existing.data_type = incoming.data_type;
                                    changed = true;
                                } else if !crate::types::DataType::can_widen(
                                    incoming.data_type,
                                    existing.data_type,
                                ) {
                                    return Err(SchemaError::CannotCoerceColumn {
                                        table: partial.name.clone(),
                                        column: incoming.name.clone(),
                                        existing: existing.data_type,
                                        incoming: Some(incoming.data_type),
                                    });
                                }
                                // The existing type is already wider: keep it.
                            }
                            if incoming.nullable && !existing.nullable {
                                existing.nullable = true;
                                changed = true;
                            }
                        }
                    }
                }
            }
        }
        if changed {
            self.version += 1;
        }
        Ok(())
    }

    /// Drop columns excluded by the schema settings. May return an empty
    /// row, in which case the caller skips the row entirely.
    pub fn filter_row(&self, table: &str, mut row: Row) -> Row {
        if self.settings.excluded_columns.is_empty() {
            return row;
        }
        row.retain(|column, _| {
            !self
                .settings
                .excluded_columns
                .iter()
                .any(|pattern| pattern_matches(pattern, table, column))
        });
        row
    }
}

fn pattern_matches(pattern: &str, table: &str, column: &str) -> bool {
    let (table_pattern, column_pattern) = match pattern.split_once('.') {
        Some((t, c)) => (Some(t), c),
        None => (None, pattern),
    };
    if let Some(t) = table_pattern {
        if t != table {
            return false;
        }
    }
    match column_pattern.strip_suffix('*') {
        Some(prefix) => column.starts_with(prefix),
        None => column_pattern == column,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ColumnSchema, DataType};
    use rivulet_protocol::types::ScalarValue;

    fn column(name: &str, data_type: DataType) -> ColumnSchema {
        ColumnSchema {
            name: name.to_string(),
            data_type,
            nullable: true,
        }
    }

    fn partial(table: &str, columns: Vec<ColumnSchema>) -> PartialTable {
        TableSchema {
            name: table.to_string(),
            parent: None,
            columns,
        }
    }

    #[test]
    fn update_appends_tables_and_columns() {
        let mut schema = Schema::new("s1");
        assert_eq!(schema.version(), 1);

        schema
            .update_schema(&partial("orders", vec![column("id", DataType::Int64)]))
            .unwrap();
        schema
            .update_schema(&partial("orders", vec![column("amount", DataType::Int64)]))
            .unwrap();

        assert_eq!(schema.version(), 3);
        let names: Vec<&str> = schema
            .table("orders")
            .unwrap()
            .columns
            .iter()
            .map(|c| c.name.as_str())
            .collect();
        assert_eq!(names, vec!["id", "amount"]);
    }

    #[test]
    fn update_widens_along_the_order() {
        let mut schema = Schema::new("s1");
        schema
            .update_schema(&partial("orders", vec![column("amount", DataType::Int64)]))
            .unwrap();
        schema
            .update_schema(&partial("orders", vec![column("amount", DataType::Float64)]))
            .unwrap();
        assert_eq!(
            schema.table("orders").unwrap().column("amount").unwrap().data_type,
            DataType::Float64
        );

        // Re-proposing the narrower type is a no-op, not a conflict, and
        // does not bump the version.
        let version = schema.version();
        schema
            .update_schema(&partial("orders", vec![column("amount", DataType::Int64)]))
            .unwrap();
        assert_eq!(
            schema.table("orders").unwrap().column("amount").unwrap().data_type,
            DataType::Float64
        );
        assert_eq!(schema.version(), version);
    }

    #[test]
    fn incompatible_update_is_a_conflict() {
        let mut schema = Schema::new("s1");
        schema
            .update_schema(&partial("orders", vec![column("amount", DataType::Float64)]))
            .unwrap();
        let err = schema
            .update_schema(&partial("orders", vec![column("amount", DataType::Text)]))
            .unwrap_err();
        assert!(err.is_coercion_conflict());
        // A failed merge does not bump the version.
        assert_eq!(schema.version(), 2);
    }

    #[test]
    fn stored_round_trip() {
        let mut schema = Schema::new("s1");
        schema
            .update_schema(&partial("orders", vec![column("id", DataType::Int64)]))
            .unwrap();
        let rebuilt = Schema::from_stored(schema.to_stored());
        assert_eq!(rebuilt.name(), "s1");
        assert_eq!(rebuilt.version(), schema.version());
        assert_eq!(rebuilt.table("orders"), schema.table("orders"));
    }

    #[test]
    fn filter_row_applies_patterns() {
        let mut schema = Schema::new("s1");
        schema.set_settings(SchemaSettings {
            excluded_columns: vec!["internal_*".to_string(), "orders.note".to_string()],
        });

        let mut row = Row::new();
        row.insert("internal_flag".to_string(), ScalarValue::Bool(true));
        row.insert("note".to_string(), ScalarValue::Text("x".to_string()));
        row.insert("id".to_string(), ScalarValue::Int(1));

        let filtered = schema.filter_row("orders", row.clone());
        let keys: Vec<&str> = filtered.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["id"]);

        // The table-scoped pattern leaves other tables alone.
        let filtered = schema.filter_row("customers", row);
        let keys: Vec<&str> = filtered.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["id", "note"]);
    }
}
