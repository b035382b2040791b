//! Sliding-window nullifier set for replay protection (`spec.md` §4.7).
//!
//! Memory is bounded: nullifiers are indexed by the height that first
//! consumed them and pruned once `current_height - first_height` exceeds
//! the configured window, so the set never grows past `O(proofs per
//! block * window)` regardless of chain length.

use crate::errors::{ConsensusError, NullifierReuseError, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};

/// Bounded replay-protection set, FIFO-pruned by height.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NullifierSet {
    seen: HashSet<[u8; 32]>,
    first_height: HashMap<[u8; 32], u64>,
    by_height: BTreeMap<u64, Vec<[u8; 32]>>,
}

impl NullifierSet {
    pub fn new() -> Self {
        NullifierSet {
            seen: HashSet::new(),
            first_height: HashMap::new(),
            by_height: BTreeMap::new(),
        }
    }

    /// Reject if `nullifier` is already present; never mutates state.
    /// Call for every nullifier a candidate would consume *before*
    /// recording any of them, so a rejected candidate leaves the set
    /// untouched.
    pub fn check(&self, nullifier: &[u8; 32]) -> Result<()> {
        if let Some(&first) = self.first_height.get(nullifier) {
            return Err(ConsensusError::NullifierReuse(NullifierReuseError {
                nullifier: hex::encode(nullifier),
                first_height: first,
            }));
        }
        Ok(())
    }

    /// Record `nullifier` as consumed at `height`. Callers must have
    /// already called `check` on every nullifier in the same candidate;
    /// `record` itself does not re-check.
    pub fn record(&mut self, nullifier: [u8; 32], height: u64) {
        self.seen.insert(nullifier);
        self.first_height.insert(nullifier, height);
        self.by_height.entry(height).or_default().push(nullifier);
    }

    /// Drop every nullifier first recorded at or before
    /// `current_height - window`, bounding memory to the replay window.
    pub fn prune(&mut self, current_height: u64, window: u64) {
        let cutoff = current_height.saturating_sub(window);
        let stale_heights: Vec<u64> = self
            .by_height
            .range(..=cutoff)
            .map(|(&h, _)| h)
            .collect();
        for h in stale_heights {
            if let Some(nullifiers) = self.by_height.remove(&h) {
                for n in nullifiers {
                    self.seen.remove(&n);
                    self.first_height.remove(&n);
                }
            }
        }
    }

    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }
}

impl Default for NullifierSet {
    fn default() -> Self {
        Self::new()
    }
}
