//! Hashing System - Canonical Serialization & Fingerprints
//!
//! The fingerprint is a pure function of a snapshot's semantic content: two
//! states with the same refs, selection, and variations hash identically no
//! matter which event sequence produced them.

use serde::Serialize;
use serde_json::{to_string, Value};
use sha2::{Digest, Sha256};

use crate::governor::AppState;

/// Compute SHA-256 hash of bytes, return hex string
pub fn sha256_hex(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    let result = hasher.finalize();
    hex::encode(result)
}

/// Convert to canonical JSON (recursively sorted keys, no whitespace)
pub fn canonical_json<T: Serialize>(value: &T) -> Result<String, serde_json::Error> {
    let v: Value = serde_json::to_value(value)?;
    let sorted = sort_value(&v);
    to_string(&sorted)
}

fn sort_value(v: &Value) -> Value {
    match v {
        Value::Object(map) => {
            let mut sorted: Vec<_> = map.iter().collect();
            sorted.sort_by(|a, b| a.0.cmp(b.0));
            let sorted_map: serde_json::Map<String, Value> = sorted
                .into_iter()
                .map(|(k, v)| (k.clone(), sort_value(v)))
                .collect();
            Value::Object(sorted_map)
        }
        Value::Array(arr) => Value::Array(arr.iter().map(sort_value).collect()),
        _ => v.clone(),
    }
}

/// 32-bit FNV-1a rolling hash, rendered as fixed-width hex.
pub fn rolling_hash_hex(data: &[u8]) -> String {
    let mut hash: u32 = 0x811c_9dc5;
    for &byte in data {
        hash ^= u32::from(byte);
        hash = hash.wrapping_mul(0x0100_0193);
    }
    format!("{hash:08x}")
}

/// Fingerprint of a snapshot's semantic content.
///
/// Canonicalizes refs, selection, and sorted variations (the compiled artifact
/// and error list are derived data and excluded), then hashes the canonical
/// form. Pure function of value, not of history.
pub fn fingerprint(state: &AppState) -> String {
    let mut variations = state.variations.clone();
    variations.sort();

    let view = serde_json::json!({
        "refs": state.refs,
        "selected": state.selection,
        "variations": variations,
    });

    // `view` is already a Value, so canonicalization cannot fail.
    let canonical = to_string(&sort_value(&view)).unwrap_or_default();
    rolling_hash_hex(canonical.as_bytes())
}

// We need hex encoding
mod hex {
    pub fn encode(bytes: impl AsRef<[u8]>) -> String {
        bytes.as_ref().iter().map(|b| format!("{:02x}", b)).collect()
    }
}
