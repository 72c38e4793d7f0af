//! Lineage column names and row identity.
//!
//! Every normalized row carries a deterministic id; child rows additionally
//! carry the parent row id and their index within the originating sequence.

/// Deterministic row id present on every row.
pub const ROW_ID_COLUMN: &str = "_rivulet_id";
/// Load package id, present on root rows only.
pub const LOAD_ID_COLUMN: &str = "_rivulet_load_id";
/// Parent row id, present on child rows only.
pub const PARENT_ID_COLUMN: &str = "_rivulet_parent_id";
/// Index of a child row within its originating sequence.
pub const ITEM_INDEX_COLUMN: &str = "_rivulet_idx";
/// Column name used for rows produced from sequences of bare scalars.
pub const SCALAR_VALUE_COLUMN: &str = "value";

/// Lineage columns are engine-owned and never nullable.
pub fn is_lineage_column(name: &str) -> bool {
    name.starts_with("_rivulet_")
}

/// Content-derived id for a root row.
pub fn root_row_id(schema: &str, table: &str, load_id: &str, content: &str) -> String {
    let mut hasher = blake3::Hasher::new();
    hasher.update(schema.as_bytes());
    hasher.update(table.as_bytes());
    hasher.update(load_id.as_bytes());
    hasher.update(content.as_bytes());
    hasher.finalize().to_hex()[..16].to_string()
}

/// Id for a child row, derived from its parent and position.
pub fn child_row_id(parent_id: &str, table: &str, index: u64) -> String {
    let mut hasher = blake3::Hasher::new();
    hasher.update(parent_id.as_bytes());
    hasher.update(table.as_bytes());
    hasher.update(&index.to_le_bytes());
    hasher.finalize().to_hex()[..16].to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lineage_detection() {
        assert!(is_lineage_column(ROW_ID_COLUMN));
        assert!(is_lineage_column(PARENT_ID_COLUMN));
        assert!(!is_lineage_column("value"));
        assert!(!is_lineage_column("amount"));
    }

    #[test]
    fn row_ids_are_deterministic() {
        let a = root_row_id("s1", "orders", "123.000001", r#"{"id":1}"#);
        let b = root_row_id("s1", "orders", "123.000001", r#"{"id":1}"#);
        assert_eq!(a, b);
        assert_eq!(a.len(), 16);

        let c = root_row_id("s1", "orders", "123.000002", r#"{"id":1}"#);
        assert_ne!(a, c);
    }

    #[test]
    fn child_ids_vary_by_index() {
        let p = root_row_id("s1", "orders", "1.0", "{}");
        assert_ne!(child_row_id(&p, "orders__items", 0), child_row_id(&p, "orders__items", 1));
    }
}
