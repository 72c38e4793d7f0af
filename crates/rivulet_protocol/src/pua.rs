//! Private-use-area decoding of typed string scalars.
//!
//! Extract encodes values JSON cannot carry (decimals, timestamps, dates,
//! big integers, binary) as strings prefixed with a private-use-area
//! character. The normalizer reverses that encoding for every scalar before
//! coercion.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use rust_decimal::Decimal;
use std::str::FromStr;
use thiserror::Error;

use crate::types::ScalarValue;

/// First code point of the tag range.
pub const PUA_START: u32 = 0xF026;

const TAG_DECIMAL: u32 = 0;
const TAG_TIMESTAMP: u32 = 1;
const TAG_DATE: u32 = 2;
const TAG_BIG_INT: u32 = 3;
const TAG_BINARY: u32 = 4;
const TAG_COUNT: u32 = 5;

#[derive(Debug, Error)]
pub enum PuaDecodeError {
    #[error("malformed typed-string payload for tag {tag}: {payload:?}")]
    Malformed { tag: u32, payload: String },
}

/// Decode a tagged string scalar back to its intended runtime type.
///
/// Untagged values pass through unchanged. A tagged string with an
/// unparseable payload is an error, never silently kept as text.
pub fn custom_pua_decode(value: ScalarValue) -> Result<ScalarValue, PuaDecodeError> {
    let s = match &value {
        ScalarValue::Text(s) => s,
        _ => return Ok(value),
    };
    let first = match s.chars().next() {
        Some(c) => c,
        None => return Ok(value),
    };
    let code = first as u32;
    if !(PUA_START..PUA_START + TAG_COUNT).contains(&code) {
        return Ok(value);
    }
    let tag = code - PUA_START;
    let payload = &s[first.len_utf8()..];

    let decoded = match tag {
        TAG_DECIMAL | TAG_BIG_INT => Decimal::from_str(payload).ok().map(ScalarValue::Decimal),
        TAG_TIMESTAMP => DateTime::parse_from_rfc3339(payload)
            .ok()
            .map(|t| ScalarValue::Timestamp(t.with_timezone(&Utc))),
        TAG_DATE => NaiveDate::parse_from_str(payload, "%Y-%m-%d")
            .ok()
            .map(ScalarValue::Date),
        TAG_BINARY => BASE64.decode(payload).ok().map(ScalarValue::Binary),
        _ => None,
    };

    decoded.ok_or_else(|| PuaDecodeError::Malformed {
        tag,
        payload: payload.to_string(),
    })
}

/// Encode a typed scalar the way extract does. The inverse of
/// [`custom_pua_decode`]; used by tests and tooling that fabricate
/// extracted-items files.
pub fn custom_pua_encode(value: &ScalarValue) -> ScalarValue {
    let tagged = |tag: u32, payload: String| {
        let mut s = String::with_capacity(payload.len() + 3);
        // Tag code points are valid chars by construction.
        if let Some(c) = char::from_u32(PUA_START + tag) {
            s.push(c);
        }
        s.push_str(&payload);
        ScalarValue::Text(s)
    };
    match value {
        ScalarValue::Decimal(d) => tagged(TAG_DECIMAL, d.to_string()),
        ScalarValue::Timestamp(t) => {
            tagged(TAG_TIMESTAMP, t.to_rfc3339_opts(SecondsFormat::Micros, true))
        }
        ScalarValue::Date(d) => tagged(TAG_DATE, d.format("%Y-%m-%d").to_string()),
        ScalarValue::Binary(b) => tagged(TAG_BINARY, BASE64.encode(b)),
        other => other.clone(),
    }
}
