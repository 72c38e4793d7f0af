//! Item normalizer: one nested record in, flat rows out.
//!
//! Nested mappings flatten into `parent__child` columns; nested sequences
//! become child tables named `{parent_table}__{field}`, one row per
//! element, linked to the parent row. The root row is emitted first, then
//! children in depth-first field order.

use crate::error::NormalizeError;
use rivulet_protocol::lineage;
use rivulet_protocol::naming;
use rivulet_protocol::types::{Row, ScalarValue};
use rivulet_schema::{DataType, Schema, SchemaError};
use serde_json::{Map as JsonMap, Value as JsonValue};

/// `((table, parent_table), row)` as emitted by the normalizer.
pub type RowEmission = ((String, Option<String>), Row);

#[derive(Clone, Copy)]
enum Parentage<'a> {
    Root,
    Child { parent_id: &'a str, index: u64 },
}

/// Expand one record into rows. Every scalar still carries the extract
/// encoding; callers run the PUA decode pass afterwards.
pub fn normalize_data_item(
    schema: &Schema,
    item: &JsonValue,
    load_id: &str,
    root_table: &str,
) -> Result<Vec<RowEmission>, NormalizeError> {
    let mut out = Vec::new();
    descend(
        &mut out,
        schema,
        item,
        root_table,
        None,
        Parentage::Root,
        load_id,
    )?;
    Ok(out)
}

fn descend(
    out: &mut Vec<RowEmission>,
    schema: &Schema,
    value: &JsonValue,
    table: &str,
    parent_table: Option<&str>,
    parentage: Parentage<'_>,
    load_id: &str,
) -> Result<(), NormalizeError> {
    let mut row = Row::new();
    let mut lists: Vec<(String, &Vec<JsonValue>)> = Vec::new();

    match value {
        JsonValue::Object(map) => flatten_into(&mut row, &mut lists, map, "", table)?,
        other => {
            // A sequence element that is not a mapping lands in a single
            // `value` column; nested sequences ride along as JSON text.
            let cell = ScalarValue::from_json(other)
                .unwrap_or_else(|| ScalarValue::Text(other.to_string()));
            row.insert(lineage::SCALAR_VALUE_COLUMN.to_string(), cell);
        }
    }

    let row_id = match parentage {
        Parentage::Root => {
            lineage::root_row_id(schema.name(), table, load_id, &value.to_string())
        }
        Parentage::Child { parent_id, index } => lineage::child_row_id(parent_id, table, index),
    };
    insert_checked(
        &mut row,
        table,
        lineage::ROW_ID_COLUMN.to_string(),
        ScalarValue::Text(row_id.clone()),
    )?;
    match parentage {
        Parentage::Root => {
            insert_checked(
                &mut row,
                table,
                lineage::LOAD_ID_COLUMN.to_string(),
                ScalarValue::Text(load_id.to_string()),
            )?;
        }
        Parentage::Child { parent_id, index } => {
            insert_checked(
                &mut row,
                table,
                lineage::PARENT_ID_COLUMN.to_string(),
                ScalarValue::Text(parent_id.to_string()),
            )?;
            insert_checked(
                &mut row,
                table,
                lineage::ITEM_INDEX_COLUMN.to_string(),
                ScalarValue::Int(index as i64),
            )?;
        }
    }

    out.push(((table.to_string(), parent_table.map(String::from)), row));

    for (field, items) in lists {
        let child_table = format!("{}__{}", table, field);
        for (index, item) in items.iter().enumerate() {
            descend(
                out,
                schema,
                item,
                &child_table,
                Some(table),
                Parentage::Child {
                    parent_id: &row_id,
                    index: index as u64,
                },
                load_id,
            )?;
        }
    }
    Ok(())
}

fn flatten_into<'a>(
    row: &mut Row,
    lists: &mut Vec<(String, &'a Vec<JsonValue>)>,
    map: &'a JsonMap<String, JsonValue>,
    prefix: &str,
    table: &str,
) -> Result<(), NormalizeError> {
    for (key, value) in map {
        let ident = naming::normalize_identifier(key);
        let name = if prefix.is_empty() {
            ident
        } else {
            format!("{}__{}", prefix, ident)
        };
        match value {
            JsonValue::Object(nested) => flatten_into(row, lists, nested, &name, table)?,
            JsonValue::Array(items) => lists.push((name, items)),
            scalar => {
                if let Some(cell) = ScalarValue::from_json(scalar) {
                    insert_checked(row, table, name, cell)?;
                }
            }
        }
    }
    Ok(())
}

/// Flattened names must stay unique within a row; a collision means two
/// record paths map onto the same column.
fn insert_checked(
    row: &mut Row,
    table: &str,
    name: String,
    value: ScalarValue,
) -> Result<(), NormalizeError> {
    if let Some(existing) = row.get(&name) {
        return Err(NormalizeError::Schema(SchemaError::CannotCoerceColumn {
            table: table.to_string(),
            column: name,
            existing: DataType::of(existing).unwrap_or(DataType::Text),
            incoming: DataType::of(&value),
        }));
    }
    row.insert(name, value);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn emissions(item: JsonValue) -> Vec<RowEmission> {
        let schema = Schema::new("s1");
        normalize_data_item(&schema, &item, "1.000001", "orders").unwrap()
    }

    #[test]
    fn flat_record_yields_one_row() {
        let rows = emissions(json!({"id": 1, "amount": 10}));
        assert_eq!(rows.len(), 1);
        let ((table, parent), row) = &rows[0];
        assert_eq!(table, "orders");
        assert_eq!(parent, &None);
        assert_eq!(row.get("id"), Some(&ScalarValue::Int(1)));
        assert_eq!(row.get("amount"), Some(&ScalarValue::Int(10)));
        assert!(row.contains_key(lineage::ROW_ID_COLUMN));
        assert_eq!(
            row.get(lineage::LOAD_ID_COLUMN),
            Some(&ScalarValue::Text("1.000001".to_string()))
        );
    }

    #[test]
    fn nested_mapping_flattens() {
        let rows = emissions(json!({"id": 1, "customer": {"name": "a", "address": {"city": "x"}}}));
        assert_eq!(rows.len(), 1);
        let (_, row) = &rows[0];
        assert_eq!(row.get("customer__name"), Some(&ScalarValue::Text("a".to_string())));
        assert_eq!(
            row.get("customer__address__city"),
            Some(&ScalarValue::Text("x".to_string()))
        );
    }

    #[test]
    fn nested_sequence_becomes_child_table() {
        let rows = emissions(json!({"id": 1, "items": [{"sku": "a"}, {"sku": "b"}]}));
        assert_eq!(rows.len(), 3);

        let ((root_table, _), root_row) = &rows[0];
        assert_eq!(root_table, "orders");
        let root_id = match root_row.get(lineage::ROW_ID_COLUMN) {
            Some(ScalarValue::Text(id)) => id.clone(),
            other => panic!("missing root row id: {:?}", other),
        };

        for (index, ((table, parent), row)) in rows[1..].iter().enumerate() {
            assert_eq!(table, "orders__items");
            assert_eq!(parent.as_deref(), Some("orders"));
            assert_eq!(
                row.get(lineage::PARENT_ID_COLUMN),
                Some(&ScalarValue::Text(root_id.clone()))
            );
            assert_eq!(
                row.get(lineage::ITEM_INDEX_COLUMN),
                Some(&ScalarValue::Int(index as i64))
            );
        }
        assert_eq!(rows[1].1.get("sku"), Some(&ScalarValue::Text("a".to_string())));
        assert_eq!(rows[2].1.get("sku"), Some(&ScalarValue::Text("b".to_string())));
    }

    #[test]
    fn scalar_sequence_rows_use_value_column() {
        let rows = emissions(json!({"id": 1, "tags": ["x", "y"]}));
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[1].0 .0, "orders__tags");
        assert_eq!(
            rows[1].1.get(lineage::SCALAR_VALUE_COLUMN),
            Some(&ScalarValue::Text("x".to_string()))
        );
    }

    #[test]
    fn grandchildren_follow_their_parent() {
        let rows = emissions(json!({
            "id": 1,
            "items": [{"sku": "a", "lots": [{"n": 1}]}, {"sku": "b"}]
        }));
        let tables: Vec<&str> = rows.iter().map(|((t, _), _)| t.as_str()).collect();
        assert_eq!(
            tables,
            vec!["orders", "orders__items", "orders__items__lots", "orders__items"]
        );
    }

    #[test]
    fn field_names_are_normalized() {
        let rows = emissions(json!({"Order ID": 1}));
        assert!(rows[0].1.contains_key("order_id"));
    }

    #[test]
    fn colliding_paths_conflict() {
        let schema = Schema::new("s1");
        let err = normalize_data_item(
            &schema,
            &json!({"a__b": 1, "a": {"b": 2}}),
            "1.000001",
            "orders",
        )
        .unwrap_err();
        assert!(err.is_coercion_conflict());
    }

    #[test]
    fn root_ids_are_content_deterministic() {
        let a = emissions(json!({"id": 1}));
        let b = emissions(json!({"id": 1}));
        assert_eq!(
            a[0].1.get(lineage::ROW_ID_COLUMN),
            b[0].1.get(lineage::ROW_ID_COLUMN)
        );
    }
}
