//! Generic deterministic binary Merkle tree over 32-byte leaves.
//!
//! Odd levels duplicate the last leaf/node rather than promoting it
//! unchanged (`spec.md` §4.8) - this crate has exactly one Merkle
//! consumer (`share_receipts`), so there is a single, unambiguous rule.

use crate::errors::{ConsensusError, Result};
use crate::hash::combine;

/// Merkle proof: sibling path from a leaf to the root plus the
/// left/right direction at each level (`false` = current node is left).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MerkleProof {
    pub leaf_index: usize,
    pub path: Vec<[u8; 32]>,
    pub directions: Vec<bool>,
}

/// Compute the Merkle root over `leaves`.
///
/// - Empty input -> all-zero root (defined edge case, never a valid
///   non-empty share-receipt set in practice but kept total).
/// - Single leaf -> that leaf's hash.
/// - Odd level -> duplicate the last node before combining.
pub fn compute_root(leaves: &[[u8; 32]]) -> [u8; 32] {
    if leaves.is_empty() {
        return [0u8; 32];
    }
    if leaves.len() == 1 {
        return leaves[0];
    }

    let mut level = leaves.to_vec();
    while level.len() > 1 {
        if level.len() % 2 == 1 {
            level.push(*level.last().unwrap());
        }
        let mut next = Vec::with_capacity(level.len() / 2);
        for pair in level.chunks(2) {
            next.push(combine(&pair[0], &pair[1]));
        }
        level = next;
    }
    level[0]
}

/// Generate an inclusion proof for `leaf_index`.
pub fn generate_proof(leaves: &[[u8; 32]], leaf_index: usize) -> Result<MerkleProof> {
    if leaf_index >= leaves.len() {
        return Err(ConsensusError::Schema {
            field: "leaf_index".into(),
            reason: format!("{} out of bounds for {} leaves", leaf_index, leaves.len()),
        });
    }

    let mut path = Vec::new();
    let mut directions = Vec::new();
    let mut level = leaves.to_vec();
    let mut index = leaf_index;

    while level.len() > 1 {
        if level.len() % 2 == 1 {
            level.push(*level.last().unwrap());
        }
        let sibling_index = if index % 2 == 0 { index + 1 } else { index - 1 };
        path.push(level[sibling_index]);
        directions.push(index % 2 == 1);

        let mut next = Vec::with_capacity(level.len() / 2);
        for pair in level.chunks(2) {
            next.push(combine(&pair[0], &pair[1]));
        }
        level = next;
        index /= 2;
    }

    Ok(MerkleProof {
        leaf_index,
        path,
        directions,
    })
}

/// Verify `leaf` against `expected_root` using `proof`.
pub fn verify_proof(leaf: &[u8; 32], proof: &MerkleProof, expected_root: &[u8; 32]) -> Result<()> {
    if proof.path.len() != proof.directions.len() {
        return Err(ConsensusError::Schema {
            field: "proof".into(),
            reason: "path/directions length mismatch".into(),
        });
    }

    let mut current = *leaf;
    for (sibling, is_right) in proof.path.iter().zip(proof.directions.iter()) {
        current = if *is_right {
            combine(sibling, &current)
        } else {
            combine(&current, sibling)
        };
    }

    if &current != expected_root {
        return Err(ConsensusError::Schema {
            field: "merkle_root".into(),
            reason: "computed root does not match expected root".into(),
        });
    }
    Ok(())
}
