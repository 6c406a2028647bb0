// ── Diagnostics redaction ──
//
// Snapshots and coordinator state are safe to share once secrets and
// hardware addresses are masked.

use serde_json::{Map, Value};

/// Replacement for masked values.
pub const REDACTED: &str = "**REDACTED**";

/// Keys whose values are masked wherever they appear.
pub const REDACTED_KEYS: &[&str] = &["password", "authorization", "macAddress", "identifier"];

/// Deep copy of `value` with every [`REDACTED_KEYS`] entry masked.
pub fn redact(value: &Value) -> Value {
    match value {
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(k, v)| {
                    let v = if REDACTED_KEYS.contains(&k.as_str()) && !v.is_null() {
                        Value::String(REDACTED.to_owned())
                    } else {
                        redact(v)
                    };
                    (k.clone(), v)
                })
                .collect::<Map<_, _>>(),
        ),
        Value::Array(items) => Value::Array(items.iter().map(redact).collect()),
        other => other.clone(),
    }
}
