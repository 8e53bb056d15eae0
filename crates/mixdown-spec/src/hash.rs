//! Canonical timeline hashing.
//!
//! Two timelines that differ only in key order or whitespace hash the same.
//! Render reports carry this hash next to the PCM hash so a rendered file can
//! be traced back to the document that produced it.

use crate::error::SpecError;
use crate::timeline::Timeline;

/// Computes the canonical BLAKE3 hash of a timeline.
///
/// ```text
/// timeline_hash = hex(BLAKE3(canonical_json(timeline)))
/// ```
///
/// # Example
/// ```
/// use mixdown_spec::Timeline;
/// use mixdown_spec::hash::canonical_timeline_hash;
///
/// let timeline = Timeline::from_json(r#"{"project": {"duration": 5.0}}"#).unwrap();
/// let hash = canonical_timeline_hash(&timeline).unwrap();
/// assert_eq!(hash.len(), 64);
/// ```
pub fn canonical_timeline_hash(timeline: &Timeline) -> Result<String, SpecError> {
    let value = timeline.to_value()?;
    Ok(canonical_value_hash(&value))
}

/// Computes the canonical BLAKE3 hash of a JSON value.
pub fn canonical_value_hash(value: &serde_json::Value) -> String {
    let canonical = canonicalize_json(value);
    blake3::hash(canonical.as_bytes()).to_hex().to_string()
}

/// Serializes a JSON value with sorted keys and no whitespace.
pub fn canonicalize_json(value: &serde_json::Value) -> String {
    let mut out = String::new();
    write_value(value, &mut out);
    out
}

fn write_value(value: &serde_json::Value, out: &mut String) {
    match value {
        serde_json::Value::Null => out.push_str("null"),
        serde_json::Value::Bool(b) => out.push_str(if *b { "true" } else { "false" }),
        serde_json::Value::Number(n) => out.push_str(&format_number(n)),
        serde_json::Value::String(s) => write_string(s, out),
        serde_json::Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_value(item, out);
            }
            out.push(']');
        }
        serde_json::Value::Object(obj) => {
            let mut entries: Vec<(&String, &serde_json::Value)> = obj.iter().collect();
            entries.sort_by(|a, b| a.0.cmp(b.0));
            out.push('{');
            for (i, (key, item)) in entries.into_iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_string(key, out);
                out.push(':');
                write_value(item, out);
            }
            out.push('}');
        }
    }
}

fn format_number(n: &serde_json::Number) -> String {
    if let Some(i) = n.as_i64() {
        return i.to_string();
    }
    if let Some(u) = n.as_u64() {
        return u.to_string();
    }
    match n.as_f64() {
        Some(f) if f.is_finite() => {
            if f == 0.0 {
                "0".to_string()
            } else if f.fract() == 0.0 && f.abs() < 1e15 {
                // 2.0 and 2 are the same timeline
                format!("{}", f as i64)
            } else {
                format!("{}", f)
            }
        }
        _ => "null".to_string(),
    }
}

fn write_string(s: &str, out: &mut String) {
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if c < '\x20' => out.push_str(&format!("\\u{:04x}", c as u32)),
            c => out.push(c),
        }
    }
    out.push('"');
}
