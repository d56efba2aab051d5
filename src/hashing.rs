//! Hashing helpers.
//!
//! SHA-256 names cache files and staging directories, SHA-1 is kept for
//! callers that key on it, and 32-bit FNV-1a fingerprints event data for
//! the event history ledger. The FNV-1a output must match the other client
//! platforms bit for bit, so the flattening and `key:value` layout below
//! are part of the contract.

use serde_json::{Map, Value};
use sha1::Sha1;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;

const FNV1A_32_OFFSET_BASIS: u32 = 0x811c_9dc5;
const FNV1A_32_PRIME: u32 = 0x0100_0193;

/// Lowercase hex SHA-256 of the UTF-8 bytes of `input`.
pub fn sha256_hex(input: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(input.as_bytes());
    hex::encode(hasher.finalize())
}

/// Lowercase hex SHA-1 of the UTF-8 bytes of `input`.
pub fn sha1_hex(input: &str) -> String {
    let mut hasher = Sha1::new();
    hasher.update(input.as_bytes());
    hex::encode(hasher.finalize())
}

pub fn hex_encode(bytes: &[u8]) -> String {
    hex::encode(bytes)
}

/// Decodes a hex string. Returns `None` for odd lengths or non-hex characters.
pub fn hex_decode(input: &str) -> Option<Vec<u8>> {
    hex::decode(input).ok()
}

/// 32-bit FNV-1a over the UTF-8 bytes of `input`, widened to `i64`.
///
/// Empty input hashes to 0, which the history layer reads as "nothing to record".
pub fn fnv1a_32(input: &str) -> i64 {
    if input.is_empty() {
        return 0;
    }

    let hash = input.as_bytes().iter().fold(FNV1A_32_OFFSET_BASIS, |hash, byte| {
        (hash ^ u32::from(*byte)).wrapping_mul(FNV1A_32_PRIME)
    });

    i64::from(hash)
}

/// Flattens nested objects into `.`-joined keys, sorted by key bytes.
pub fn flatten_map(map: &Map<String, Value>) -> BTreeMap<String, Value> {
    let mut flattened = BTreeMap::new();
    flatten_into(None, map, &mut flattened);
    flattened
}

fn flatten_into(prefix: Option<&str>, map: &Map<String, Value>, out: &mut BTreeMap<String, Value>) {
    for (key, value) in map {
        let full_key = match prefix {
            Some(prefix) => format!("{}.{}", prefix, key),
            None => key.clone(),
        };

        match value {
            Value::Object(nested) => flatten_into(Some(&full_key), nested, out),
            other => {
                out.insert(full_key, other.clone());
            }
        }
    }
}

/// Renders a flattened value the way it appears in a `key:value` fingerprint.
pub fn value_to_hash_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => "null".to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::Array(items) => {
            let parts: Vec<String> = items.iter().map(value_to_hash_string).collect();
            format!("[{}]", parts.join(", "))
        }
        Value::Object(_) => value.to_string(),
    }
}

/// FNV-1a fingerprint of event data.
///
/// Without a mask (or with an empty one) every flattened key contributes, in
/// ASCII order. With a mask only the listed keys contribute, in mask order;
/// keys missing from the data are skipped. If nothing contributes the result is 0.
pub fn map_to_fnv1a_hash(map: &Map<String, Value>, mask: Option<&[String]>) -> i64 {
    if map.is_empty() {
        return 0;
    }

    let flattened = flatten_map(map);
    let mut fingerprint = String::new();

    match mask {
        Some(keys) if !keys.is_empty() => {
            for key in keys {
                if let Some(value) = flattened.get(key) {
                    fingerprint.push_str(key);
                    fingerprint.push(':');
                    fingerprint.push_str(&value_to_hash_string(value));
                }
            }
        }
        _ => {
            for (key, value) in &flattened {
                fingerprint.push_str(key);
                fingerprint.push(':');
                fingerprint.push_str(&value_to_hash_string(value));
            }
        }
    }

    fnv1a_32(&fingerprint)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn as_map(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => panic!("expected object"),
        }
    }

    #[test]
    fn test_sha256_known_vector() {
        assert_eq!(
            sha256_hex("www.sample.com"),
            "dd6681ae7411ac16cdc5756c483ec438b5512e26013715b76e8ae7587120486a"
        );
    }

    #[test]
    fn test_sha1_known_vector() {
        assert_eq!(sha1_hex("abc"), "a9993e364706816aba3e25717850c26c9cd0d89d");
    }

    #[test]
    fn test_hex_decode_rejects_garbage() {
        assert_eq!(hex_decode("6869"), Some(b"hi".to_vec()));
        assert_eq!(hex_decode("zz"), None);
        assert_eq!(hex_decode("abc"), None);
        assert_eq!(hex_encode(b"\"etag\""), "2265746167");
    }

    #[test]
    fn test_fnv1a_reference_values() {
        assert_eq!(fnv1a_32("a"), 3_826_002_220);
        assert_eq!(fnv1a_32("foobar"), 3_214_735_720);
        assert_eq!(fnv1a_32("key:value"), 4_007_910_315);
        assert_eq!(fnv1a_32(""), 0);
    }

    #[test]
    fn test_map_hash_matches_cross_platform_value() {
        let map = as_map(json!({"key": "value"}));
        assert_eq!(map_to_fnv1a_hash(&map, None), 4_007_910_315);
    }

    #[test]
    fn test_map_hash_sorts_keys_case_sensitively() {
        let map = as_map(json!({"b": 2, "a": 1}));
        assert_eq!(map_to_fnv1a_hash(&map, None), 3_371_500_665);

        // Uppercase sorts before lowercase in ASCII
        let map = as_map(json!({"a": 1, "B": 2}));
        assert_eq!(map_to_fnv1a_hash(&map, None), 2_482_176_625);
    }

    #[test]
    fn test_map_hash_uses_mask_order() {
        let map = as_map(json!({"a": 1, "b": 2, "c": 3}));
        let mask = vec!["b".to_string(), "a".to_string()];
        assert_eq!(map_to_fnv1a_hash(&map, Some(&mask)), 2_029_889_745);
    }

    #[test]
    fn test_map_hash_absent_mask_keys_yield_zero() {
        let map = as_map(json!({"a": 1}));
        let mask = vec!["missing".to_string()];
        assert_eq!(map_to_fnv1a_hash(&map, Some(&mask)), 0);
    }

    #[test]
    fn test_map_hash_empty_mask_hashes_everything() {
        let map = as_map(json!({"b": 2, "a": 1}));
        let empty: Vec<String> = Vec::new();
        assert_eq!(
            map_to_fnv1a_hash(&map, Some(&empty)),
            map_to_fnv1a_hash(&map, None)
        );
        assert_eq!(map_to_fnv1a_hash(&map, Some(&empty)), 3_371_500_665);
    }

    #[test]
    fn test_map_hash_flattens_nested_objects() {
        let map = as_map(json!({"xdm": {"eventType": "click"}}));
        assert_eq!(map_to_fnv1a_hash(&map, None), 3_457_886_704);
    }

    #[test]
    fn test_map_hash_value_rendering() {
        let map = as_map(json!({"a": true, "b": 1.5}));
        assert_eq!(map_to_fnv1a_hash(&map, None), 3_931_702_120);

        let map = as_map(json!({"list": [1, "two"]}));
        assert_eq!(map_to_fnv1a_hash(&map, None), 281_169_040);
    }

    #[test]
    fn test_map_hash_empty_map_is_zero() {
        assert_eq!(map_to_fnv1a_hash(&Map::new(), None), 0);
    }
}
