//! Typed cell values flowing from decoded records into row files.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use rust_decimal::Decimal;
use serde_json::Value as JsonValue;
use std::collections::BTreeMap;

/// A flat row produced by the item normalizer: column name to cell value.
///
/// Column order is owned by the table schema, not by the row, so a sorted
/// map is sufficient here.
pub type Row = BTreeMap<String, ScalarValue>;

/// A single cell value.
///
/// Records arrive as JSON, but after the PUA decode pass cells may carry
/// types JSON cannot express directly (timestamps, decimals, binary).
#[derive(Debug, Clone, PartialEq)]
pub enum ScalarValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    Timestamp(DateTime<Utc>),
    Date(NaiveDate),
    Decimal(Decimal),
    Binary(Vec<u8>),
}

impl ScalarValue {
    /// Convert a JSON scalar into a cell value. Objects and arrays are not
    /// scalars and return `None`; the normalizer flattens those.
    pub fn from_json(value: &JsonValue) -> Option<ScalarValue> {
        match value {
            JsonValue::Null => Some(ScalarValue::Null),
            JsonValue::Bool(b) => Some(ScalarValue::Bool(*b)),
            JsonValue::Number(n) => n
                .as_i64()
                .map(ScalarValue::Int)
                .or_else(|| n.as_f64().map(ScalarValue::Float)),
            JsonValue::String(s) => Some(ScalarValue::Text(s.clone())),
            JsonValue::Object(_) | JsonValue::Array(_) => None,
        }
    }

    /// JSON wire form used by the jsonl row writer. Timestamps and dates
    /// render as ISO-8601 strings, decimals as strings, binary as base64.
    pub fn to_json(&self) -> JsonValue {
        match self {
            ScalarValue::Null => JsonValue::Null,
            ScalarValue::Bool(b) => JsonValue::Bool(*b),
            ScalarValue::Int(i) => JsonValue::from(*i),
            ScalarValue::Float(f) => serde_json::Number::from_f64(*f)
                .map(JsonValue::Number)
                .unwrap_or(JsonValue::Null),
            ScalarValue::Text(s) => JsonValue::String(s.clone()),
            ScalarValue::Timestamp(t) => {
                JsonValue::String(t.to_rfc3339_opts(SecondsFormat::Micros, true))
            }
            ScalarValue::Date(d) => JsonValue::String(d.format("%Y-%m-%d").to_string()),
            ScalarValue::Decimal(d) => JsonValue::String(d.to_string()),
            ScalarValue::Binary(b) => JsonValue::String(BASE64.encode(b)),
        }
    }

    /// Display form used when a value is coerced into a text column.
    pub fn render_text(&self) -> String {
        match self {
            ScalarValue::Null => String::new(),
            ScalarValue::Bool(b) => b.to_string(),
            ScalarValue::Int(i) => i.to_string(),
            ScalarValue::Float(f) => f.to_string(),
            ScalarValue::Text(s) => s.clone(),
            ScalarValue::Timestamp(t) => t.to_rfc3339_opts(SecondsFormat::Micros, true),
            ScalarValue::Date(d) => d.format("%Y-%m-%d").to_string(),
            ScalarValue::Decimal(d) => d.to_string(),
            ScalarValue::Binary(b) => BASE64.encode(b),
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, ScalarValue::Null)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::str::FromStr;

    #[test]
    fn from_json_scalars() {
        assert_eq!(ScalarValue::from_json(&json!(null)), Some(ScalarValue::Null));
        assert_eq!(ScalarValue::from_json(&json!(true)), Some(ScalarValue::Bool(true)));
        assert_eq!(ScalarValue::from_json(&json!(42)), Some(ScalarValue::Int(42)));
        assert_eq!(ScalarValue::from_json(&json!(1.5)), Some(ScalarValue::Float(1.5)));
        assert_eq!(
            ScalarValue::from_json(&json!("x")),
            Some(ScalarValue::Text("x".to_string()))
        );
        assert_eq!(ScalarValue::from_json(&json!({"a": 1})), None);
        assert_eq!(ScalarValue::from_json(&json!([1])), None);
    }

    #[test]
    fn json_wire_form() {
        let d = Decimal::from_str("10.25").unwrap();
        assert_eq!(ScalarValue::Decimal(d).to_json(), json!("10.25"));
        assert_eq!(ScalarValue::Binary(vec![1, 2, 3]).to_json(), json!("AQID"));

        let date = NaiveDate::from_ymd_opt(2024, 1, 15).unwrap();
        assert_eq!(ScalarValue::Date(date).to_json(), json!("2024-01-15"));
    }

    #[test]
    fn text_rendering() {
        assert_eq!(ScalarValue::Int(10).render_text(), "10");
        assert_eq!(ScalarValue::Bool(false).render_text(), "false");
    }
}
