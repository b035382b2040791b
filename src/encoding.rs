//! Canonical CBOR encoding and domain-separated hashing.
//!
//! Canonical form follows RFC 8949 §4.2 ("Core Deterministic Encoding
//! Requirements"): definite-length items only, integers in their
//! smallest representation, and map keys sorted by their own encoded
//! byte string. `ciborium` gives us the definite-length/smallest-int
//! properties for free; this module adds the map-key sort and rejects
//! floats, since neither is guaranteed by a plain derive(Serialize).
//!
//! `SignBytes(x) = domain_tag || canonical_bytes(x)`. Hashing is always
//! `hash::h3_256(SignBytes(x))` - there is no second hash function
//! anywhere in this crate.

use crate::errors::{ConsensusError, Result};
use crate::hash::h3_256;
use ciborium::value::Value;
use serde::Serialize;

/// Fixed domain-tag registry. Every caller must use one of these; a
/// handwritten string literal elsewhere would silently create a new,
/// unregistered domain and is exactly the kind of drift this registry
/// exists to prevent.
pub mod domain {
    pub const HEADER_V1: &str = "poies.header.v1";
    pub const POLICY_V1: &str = "poies.policy.v1";
    pub const SHARE_RECEIPT_V1: &str = "poies.share_receipt.v1";

    pub fn nullifier_v1(type_name: &str) -> String {
        format!("poies.nullifier.{}.v1", type_name)
    }
}

/// Recursively sort every map's entries by the canonical byte encoding
/// of their keys, and reject floats/NaN anywhere in the tree.
fn canonicalize(value: Value) -> Result<Value> {
    match value {
        Value::Float(_) => Err(ConsensusError::Encoding {
            reason: "floating-point value not allowed in canonical encoding".into(),
        }),
        Value::Array(items) => {
            let mut out = Vec::with_capacity(items.len());
            for item in items {
                out.push(canonicalize(item)?);
            }
            Ok(Value::Array(out))
        }
        Value::Map(entries) => {
            let mut keyed: Vec<(Vec<u8>, Value, Value)> = Vec::with_capacity(entries.len());
            for (k, v) in entries {
                let k = canonicalize(k)?;
                let v = canonicalize(v)?;
                let mut key_bytes = Vec::new();
                ciborium::into_writer(&k, &mut key_bytes).map_err(|e| ConsensusError::Encoding {
                    reason: format!("key encode failed: {}", e),
                })?;
                keyed.push((key_bytes, k, v));
            }
            keyed.sort_by(|a, b| a.0.cmp(&b.0));
            let mut seen = std::collections::HashSet::new();
            for (key_bytes, _, _) in &keyed {
                if !seen.insert(key_bytes.clone()) {
                    return Err(ConsensusError::Encoding {
                        reason: "duplicate map key in canonical encoding".into(),
                    });
                }
            }
            Ok(Value::Map(
                keyed.into_iter().map(|(_, k, v)| (k, v)).collect(),
            ))
        }
        other => Ok(other),
    }
}

/// Serialize `value` to canonical CBOR bytes.
pub fn encode_canonical<T: Serialize>(value: &T) -> Result<Vec<u8>> {
    let raw = Value::serialized(value).map_err(|e| ConsensusError::Encoding {
        reason: format!("serialize failed: {}", e),
    })?;
    let canonical = canonicalize(raw)?;
    let mut bytes = Vec::new();
    ciborium::into_writer(&canonical, &mut bytes).map_err(|e| ConsensusError::Encoding {
        reason: format!("encode failed: {}", e),
    })?;
    Ok(bytes)
}

/// `SignBytes(x) = domain_tag || canonical_bytes(x)`.
pub fn sign_bytes<T: Serialize>(domain_tag: &str, value: &T) -> Result<Vec<u8>> {
    let mut out = domain_tag.as_bytes().to_vec();
    out.extend(encode_canonical(value)?);
    Ok(out)
}

/// `hash(x) = H3_256(SignBytes(x))`.
pub fn domain_hash<T: Serialize>(domain_tag: &str, value: &T) -> Result<[u8; 32]> {
    Ok(h3_256(&sign_bytes(domain_tag, value)?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use std::collections::BTreeMap;

    #[derive(Serialize, Deserialize, PartialEq, Eq, Debug)]
    struct Sample {
        b_field: u32,
        a_field: u32,
        nested: BTreeMap<String, i64>,
    }

    #[test]
    fn test_deterministic_encoding() {
        let mut nested = BTreeMap::new();
        nested.insert("z".to_string(), 1);
        nested.insert("a".to_string(), 2);
        let sample = Sample {
            b_field: 1,
            a_field: 2,
            nested,
        };

        let bytes1 = encode_canonical(&sample).unwrap();
        let bytes2 = encode_canonical(&sample).unwrap();
        assert_eq!(bytes1, bytes2);
    }

    #[test]
    fn test_map_keys_sorted_regardless_of_field_order() {
        // Two structurally-equal values built with fields swapped in
        // source order must still canonicalize to the same bytes,
        // because canonicalization sorts by encoded key bytes, not by
        // struct declaration order.
        #[derive(Serialize)]
        struct Reordered {
            a_field: u32,
            b_field: u32,
            nested: BTreeMap<String, i64>,
        }

        let mut nested = BTreeMap::new();
        nested.insert("z".to_string(), 1);
        nested.insert("a".to_string(), 2);

        let original = Sample {
            b_field: 1,
            a_field: 2,
            nested: nested.clone(),
        };
        let reordered = Reordered {
            a_field: 2,
            b_field: 1,
            nested,
        };

        assert_eq!(
            encode_canonical(&original).unwrap(),
            encode_canonical(&reordered).unwrap()
        );
    }

    #[test]
    fn test_domain_hash_separates_domains() {
        let value = 42u32;
        let h1 = domain_hash(domain::HEADER_V1, &value).unwrap();
        let h2 = domain_hash(domain::POLICY_V1, &value).unwrap();
        assert_ne!(h1, h2);
    }

    #[test]
    fn test_sign_bytes_prefixes_domain_tag() {
        let value = 7u32;
        let bytes = sign_bytes(domain::HEADER_V1, &value).unwrap();
        assert!(bytes.starts_with(domain::HEADER_V1.as_bytes()));
    }

    #[test]
    fn test_nullifier_domain_per_type() {
        let ai = domain::nullifier_v1("AI");
        let storage = domain::nullifier_v1("Storage");
        assert_ne!(ai, storage);
        assert!(ai.starts_with("poies.nullifier."));
    }
}
