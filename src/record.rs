//! Record type and line-protocol codec.
//!
//! A small `serde`-derived struct plus the token-splitting parser for the
//! ingest line format: `<measurement>[,<tag>=<v>...] <field>=<v>[,...] [<ts>]`.

use crate::error::{LsmError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::{SystemTime, UNIX_EPOCH};

/// A single ingested data point.
///
/// Field values are kept as strings; numeric interpretation is deferred to
/// the query executor, matching an untyped field store.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Record {
    pub measurement: String,
    pub tags: BTreeMap<String, String>,
    pub fields: BTreeMap<String, String>,
    pub timestamp: i64,
}

impl Record {
    /// The storage key: `measurement + ":" + timestamp`.
    pub fn storage_key(&self) -> Vec<u8> {
        format!("{}:{}", self.measurement, self.timestamp).into_bytes()
    }

    /// Storage value: JSON-encoded record.
    pub fn to_json_bytes(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    pub fn from_json_bytes(bytes: &[u8]) -> Result<Self> {
        Ok(serde_json::from_slice(bytes)?)
    }

    /// Look up `key` first in tags, then in fields, as string.
    pub fn lookup(&self, key: &str) -> Option<&str> {
        self.tags
            .get(key)
            .or_else(|| self.fields.get(key))
            .map(|s| s.as_str())
    }

    /// Field value coerced to f64 for aggregation; missing or non-numeric = None.
    pub fn numeric_field(&self, field: &str) -> Option<f64> {
        self.fields.get(field).and_then(|v| v.parse::<f64>().ok())
    }
}

impl From<serde_json::Error> for LsmError {
    fn from(e: serde_json::Error) -> Self {
        LsmError::MalformedLine(e.to_string())
    }
}

fn now_nanos() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos() as i64
}

/// Parse a single line-protocol record.
///
/// ```text
/// <measurement>[,<tag>=<v>...] <field>=<v>[,<field>=<v>]... [<timestamp>]
/// ```
pub fn parse_line(line: &str) -> Result<Record> {
    let parts: Vec<&str> = line.split_whitespace().collect();
    if parts.len() < 2 {
        return Err(LsmError::MalformedLine(line.to_string()));
    }

    let mut measurement_tags = parts[0].split(',');
    let measurement = measurement_tags
        .next()
        .filter(|m| !m.is_empty())
        .ok_or_else(|| LsmError::MalformedLine(line.to_string()))?
        .to_string();

    let tags: BTreeMap<String, String> = measurement_tags
        .filter_map(|seg| seg.split_once('='))
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();

    let fields: BTreeMap<String, String> = parts[1]
        .split(',')
        .filter_map(|seg| seg.split_once('='))
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();

    let timestamp = match parts.get(2) {
        Some(ts) => ts
            .parse::<i64>()
            .map_err(|_| LsmError::MalformedLine(line.to_string()))?,
        None => now_nanos(),
    };

    Ok(Record {
        measurement,
        tags,
        fields,
        timestamp,
    })
}

/// Serialize a record back into line-protocol form.
///
/// Round-trips through `parse_line` for any record whose tag/field values
/// contain no whitespace, comma, or `=`.
pub fn serialize_line(record: &Record) -> String {
    let mut out = record.measurement.clone();
    for (k, v) in &record.tags {
        out.push(',');
        out.push_str(k);
        out.push('=');
        out.push_str(v);
    }
    out.push(' ');
    out.push_str(
        &record
            .fields
            .iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect::<Vec<_>>()
            .join(","),
    );
    out.push(' ');
    out.push_str(&record.timestamp.to_string());
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_tags_fields_and_timestamp() {
        let r = parse_line("cpu,host=a,region=eu value=1.5,idle=true 1000").unwrap();
        assert_eq!(r.measurement, "cpu");
        assert_eq!(r.tags.get("host").unwrap(), "a");
        assert_eq!(r.tags.get("region").unwrap(), "eu");
        assert_eq!(r.fields.get("value").unwrap(), "1.5");
        assert_eq!(r.fields.get("idle").unwrap(), "true");
        assert_eq!(r.timestamp, 1000);
    }

    #[test]
    fn missing_timestamp_uses_wall_clock() {
        let before = now_nanos();
        let r = parse_line("cpu value=1").unwrap();
        let after = now_nanos();
        assert!(r.timestamp >= before && r.timestamp <= after);
    }

    #[test]
    fn fewer_than_two_tokens_is_malformed() {
        assert!(parse_line("cpu").is_err());
        assert!(parse_line("").is_err());
    }

    #[test]
    fn segments_without_equals_are_ignored() {
        let r = parse_line("cpu,justatag value=1,justafield 5").unwrap();
        assert!(r.tags.is_empty());
        assert_eq!(r.fields.len(), 1);
    }

    #[test]
    fn round_trips_through_serialize() {
        let r = parse_line("cpu,host=a value=1,idle=false 42").unwrap();
        let line = serialize_line(&r);
        let r2 = parse_line(&line).unwrap();
        assert_eq!(r, r2);
    }

    #[test]
    fn json_round_trip_preserves_fields() {
        let r = parse_line("cpu,host=a value=1 42").unwrap();
        let bytes = r.to_json_bytes().unwrap();
        let r2 = Record::from_json_bytes(&bytes).unwrap();
        assert_eq!(r, r2);
    }
}
