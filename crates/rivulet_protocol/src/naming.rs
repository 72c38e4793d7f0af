//! File and identifier naming rules shared by the volumes and the engine.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum NamingError {
    #[error("invalid extracted file name: {0}")]
    InvalidExtractedFileName(String),
}

/// Components encoded in an extracted-items file name:
/// `{schema}.{root_table}.{unique_id}.{format}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedFileName {
    pub schema: String,
    pub root_table: String,
    pub unique_id: String,
    pub format: String,
}

/// Recover the schema and root table from an extracted-items file name.
pub fn parse_extracted_file_name(name: &str) -> Result<ExtractedFileName, NamingError> {
    let parts: Vec<&str> = name.split('.').collect();
    if parts.len() < 4 || parts.iter().any(|p| p.is_empty()) {
        return Err(NamingError::InvalidExtractedFileName(name.to_string()));
    }
    // Table names may contain dots from upstream sources; schema, unique id
    // and format never do.
    Ok(ExtractedFileName {
        schema: parts[0].to_string(),
        root_table: parts[1..parts.len() - 2].join("."),
        unique_id: parts[parts.len() - 2].to_string(),
        format: parts[parts.len() - 1].to_string(),
    })
}

/// Build an extracted-items file name. The inverse of
/// [`parse_extracted_file_name`].
pub fn extracted_file_name(schema: &str, root_table: &str, unique_id: &str, format: &str) -> String {
    format!("{}.{}.{}.{}", schema, root_table, unique_id, format)
}

/// Row file name inside a load package: `{schema}.{table}.{chunk_id}.{ext}`.
pub fn row_file_name(schema: &str, table: &str, chunk_id: &str, extension: &str) -> String {
    format!("{}.{}.{}.{}", schema, table, chunk_id, extension)
}

/// Stable short digest identifying a worker file chunk. Parameterizes the
/// output file paths so workers never collide within a load package.
pub fn chunk_id(files: &[String]) -> String {
    let joined = files.join("\n");
    blake3::hash(joined.as_bytes()).to_hex()[..16].to_string()
}

/// Chunk id for a retried chunk. The retry ordinal keeps retried writers
/// away from the paths of the deleted first attempt.
pub fn retry_chunk_id(base: &str, retry: u32) -> String {
    format!("{}r{}", base, retry)
}

/// Canonicalize a record field name into a column identifier: lowercase
/// ascii alphanumerics and underscores, runs of anything else collapsed to
/// a single underscore.
pub fn normalize_identifier(name: &str) -> String {
    let mut ident = String::with_capacity(name.len());
    let mut last_was_underscore = false;
    for ch in name.chars() {
        let mapped = if ch.is_ascii_alphanumeric() {
            ch.to_ascii_lowercase()
        } else {
            '_'
        };
        if mapped == '_' {
            if last_was_underscore {
                continue;
            }
            last_was_underscore = true;
        } else {
            last_was_underscore = false;
        }
        ident.push(mapped);
    }
    let ident = ident.trim_matches('_');
    if ident.is_empty() {
        "field".to_string()
    } else {
        ident.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_round_trip() {
        let name = extracted_file_name("shop", "orders", "001", "jsonl");
        let parsed = parse_extracted_file_name(&name).unwrap();
        assert_eq!(parsed.schema, "shop");
        assert_eq!(parsed.root_table, "orders");
        assert_eq!(parsed.unique_id, "001");
        assert_eq!(parsed.format, "jsonl");
    }

    #[test]
    fn parse_table_with_dots() {
        let parsed = parse_extracted_file_name("s1.public.orders.abc.jsonl").unwrap();
        assert_eq!(parsed.schema, "s1");
        assert_eq!(parsed.root_table, "public.orders");
        assert_eq!(parsed.unique_id, "abc");
    }

    #[test]
    fn parse_rejects_short_and_empty_parts() {
        assert!(parse_extracted_file_name("orders.jsonl").is_err());
        assert!(parse_extracted_file_name("s1..001.jsonl").is_err());
    }

    #[test]
    fn chunk_ids_are_stable_and_distinct() {
        let a = chunk_id(&["s1.orders.001.jsonl".to_string()]);
        let b = chunk_id(&["s1.orders.001.jsonl".to_string()]);
        let c = chunk_id(&["s1.orders.002.jsonl".to_string()]);
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.len(), 16);
    }

    #[test]
    fn retry_chunk_ids_differ_from_base() {
        let base = chunk_id(&["s1.orders.001.jsonl".to_string()]);
        assert_ne!(retry_chunk_id(&base, 1), base);
        assert_ne!(retry_chunk_id(&base, 2), retry_chunk_id(&base, 1));
    }

    #[test]
    fn identifier_normalization() {
        assert_eq!(normalize_identifier("orderId"), "orderid");
        assert_eq!(normalize_identifier("Total Amount (EUR)"), "total_amount_eur");
        assert_eq!(normalize_identifier("__x__"), "x");
        assert_eq!(normalize_identifier("$$$"), "field");
    }
}
