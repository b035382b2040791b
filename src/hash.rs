//! The single hash primitive used anywhere in the consensus kernel.
//!
//! `spec.md` §4.2 mandates exactly one hash function, referred to as
//! `H3_256`; we implement it as SHA3-256 (Keccak, FIPS 202) via the
//! audited `sha3` crate, the same way the teacher built its single
//! `sha256` primitive on `sha2`. Nothing outside this module may import
//! a hash crate directly - `encoding::hash`/`encoding::domain_hash` are
//! the only consensus-path callers.

use sha3::{Digest, Sha3_256};

/// Compute `H3_256(data)`.
pub fn h3_256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Sha3_256::new();
    hasher.update(data);
    hasher.finalize().into()
}

/// `H3_256` of several concatenated slices, without an intermediate
/// allocation.
pub fn h3_256_multi(parts: &[&[u8]]) -> [u8; 32] {
    let mut hasher = Sha3_256::new();
    for part in parts {
        hasher.update(part);
    }
    hasher.finalize().into()
}

/// Combine two 32-byte hashes into their parent hash in a binary Merkle
/// tree: `H3_256(left || right)`.
pub fn combine(left: &[u8; 32], right: &[u8; 32]) -> [u8; 32] {
    h3_256_multi(&[left, right])
}
