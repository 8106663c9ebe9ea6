//! Canonical JSON encoding used for every signed payload in this workspace
//! (capability tokens, revocation records, snapshot envelopes).
//!
//! "Canonical" here means: object keys sorted lexicographically at every
//! level, no insignificant whitespace, and numbers/strings encoded exactly
//! as `serde_json` would encode them otherwise. This is deliberately not a
//! general canonicalization scheme (no float normalization beyond what
//! `serde_json` already does) — it only needs to be a stable, deterministic
//! encoding of the specific structs this workspace signs.

use serde::Serialize;
use serde_json::Value;

/// Serialize `value` to canonical JSON bytes: keys sorted, no whitespace.
pub fn canonical_json<T: Serialize>(value: &T) -> serde_json::Result<Vec<u8>> {
    let v = serde_json::to_value(value)?;
    let sorted = sort_value(v);
    serde_json::to_vec(&sorted)
}

fn sort_value(value: Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut sorted: Vec<(String, Value)> =
                map.into_iter().map(|(k, v)| (k, sort_value(v))).collect();
            sorted.sort_by(|a, b| a.0.cmp(&b.0));
            let mut out = serde_json::Map::new();
            for (k, v) in sorted {
                out.insert(k, v);
            }
            Value::Object(out)
        }
        Value::Array(items) => Value::Array(items.into_iter().map(sort_value).collect()),
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn sorts_keys_at_every_level() {
        let value = json!({"b": 1, "a": {"z": 1, "y": 2}, "c": [ {"q": 1, "p": 2} ]});
        let bytes = canonical_json(&value).unwrap();
        let s = String::from_utf8(bytes).unwrap();
        assert_eq!(
            s,
            r#"{"a":{"y":2,"z":1},"b":1,"c":[{"p":2,"q":1}]}"#
        );
    }

    #[test]
    fn is_deterministic_regardless_of_input_key_order() {
        let a = json!({"iss": "x", "exp": 1, "sub": "y"});
        let b = json!({"sub": "y", "exp": 1, "iss": "x"});
        assert_eq!(canonical_json(&a).unwrap(), canonical_json(&b).unwrap());
    }

    #[test]
    fn no_whitespace_in_output() {
        let value = json!({"a": 1, "b": [1, 2, 3]});
        let bytes = canonical_json(&value).unwrap();
        let s = String::from_utf8(bytes).unwrap();
        assert!(!s.contains(' ') && !s.contains('\n'));
    }
}
