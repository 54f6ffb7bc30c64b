//! Content hashing for cache identities.
//!
//! Values are canonicalised before digesting: object keys are sorted at every
//! nesting level, so two structurally equal JSON values hash identically no
//! matter the order their keys were inserted in. Digests are lowercase hex
//! SHA-256.

use serde_json::Value;
use sha2::{Digest, Sha256};

/// Hash a JSON value after recursive canonicalisation.
pub fn hash_value(value: &Value) -> String {
    hex_sha256(canonical_json(value).as_bytes())
}

/// Hash a piece of source text or a stable identifier verbatim.
pub fn hash_source(source: &str) -> String {
    hex_sha256(source.as_bytes())
}

/// Render a JSON value in canonical form: no whitespace, object keys sorted
/// lexicographically at every depth, array order preserved.
pub fn canonical_json(value: &Value) -> String {
    let mut out = String::new();
    write_canonical(value, &mut out);
    out
}

fn write_canonical(value: &Value, out: &mut String) {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<(&String, &Value)> = map.iter().collect();
            entries.sort_by(|a, b| a.0.cmp(b.0));
            out.push('{');
            for (i, (key, child)) in entries.into_iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                out.push_str(&Value::String(key.clone()).to_string());
                out.push(':');
                write_canonical(child, out);
            }
            out.push('}');
        }
        Value::Array(items) => {
            out.push('[');
            for (i, child) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical(child, out);
            }
            out.push(']');
        }
        scalar => out.push_str(&scalar.to_string()),
    }
}

fn hex_sha256(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    format!("{:x}", hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_hash_is_hex_sha256() {
        let h = hash_source("abc");
        assert_eq!(
            h,
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn test_top_level_key_order_ignored() {
        let a = json!({"firstname": "Nicolas", "age": 32});
        let b = json!({"age": 32, "firstname": "Nicolas"});
        assert_eq!(hash_value(&a), hash_value(&b));
    }

    #[test]
    fn test_nested_key_order_ignored() {
        let a = json!({"candidate": {"name": "Nicolas", "city": {"zip": "44000", "name": "Nantes"}}});
        let b = json!({"candidate": {"city": {"name": "Nantes", "zip": "44000"}, "name": "Nicolas"}});
        assert_eq!(hash_value(&a), hash_value(&b));
    }

    #[test]
    fn test_array_order_matters() {
        assert_ne!(hash_value(&json!([1, 2])), hash_value(&json!([2, 1])));
    }

    #[test]
    fn test_distinct_values_distinct_hashes() {
        assert_ne!(hash_value(&json!({"a": 1})), hash_value(&json!({"a": 2})));
        assert_ne!(hash_value(&json!("1")), hash_value(&json!(1)));
    }

    #[test]
    fn test_canonical_form() {
        let value = json!({"b": [true, null], "a": {"d": 1.5, "c": "x\"y"}});
        assert_eq!(
            canonical_json(&value),
            r#"{"a":{"c":"x\"y","d":1.5},"b":[true,null]}"#
        );
    }

    #[test]
    fn test_hash_is_stable_across_calls() {
        let value = json!({"pdfAsText": "Nicolas Rotier\n32 years old"});
        assert_eq!(hash_value(&value), hash_value(&value));
    }
}
