//! Consensus-critical type definitions.
//!
//! Field order is EXPLICIT and FROZEN per type - changing it changes the
//! canonical encoding and therefore every hash derived from it. All
//! types route through `encoding` for hashing/serialization; nothing
//! here computes a hash directly.

use crate::errors::{ConsensusError, Result};
use bitflags::bitflags;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Codec/version tag carried in the header for forward compatibility.
pub const CODEC_VERSION: u8 = 1;

/// Bound on `Header::aux` (optional auxiliary bytes).
pub const MAX_AUX_BYTES: usize = 256;

/// Bound on the number of proof envelopes attached to one candidate.
pub const MAX_PROOFS_PER_BLOCK: usize = 4096;

// ==================== PROOF TYPES ====================

/// The closed set of proof types the caps/policy/α-tuner tables key off.
/// Ordering is the fixed lexicographic order `spec.md` §4.3/§4.5 require
/// for deterministic iteration - derived from each variant's canonical
/// name, not declaration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProofType {
    Ai,
    HashShare,
    Quantum,
    Storage,
    Vdf,
}

impl ProofType {
    /// Canonical name used both for display and as the lexicographic
    /// sort key (`spec.md` requires ordering to be independent of
    /// implementation-defined enum discriminants).
    pub fn canonical_name(&self) -> &'static str {
        match self {
            Self::Ai => "AI",
            Self::HashShare => "HashShare",
            Self::Quantum => "Quantum",
            Self::Storage => "Storage",
            Self::Vdf => "VDF",
        }
    }

    /// All proof types in their fixed lexicographic order.
    pub fn all_in_order() -> [ProofType; 5] {
        let mut types = [
            ProofType::Ai,
            ProofType::HashShare,
            ProofType::Quantum,
            ProofType::Storage,
            ProofType::Vdf,
        ];
        types.sort_by_key(|t| t.canonical_name());
        types
    }
}

impl PartialOrd for ProofType {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ProofType {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.canonical_name().cmp(other.canonical_name())
    }
}

// ==================== PROOF METRICS ====================

/// Verifier-emitted metrics, one variant per proof type. Every field is
/// a bounded non-negative integer; the verifier that produced the
/// envelope is solely responsible for these bounds holding, but the
/// scorer re-validates them (`schema_check`) before use since a
/// malformed envelope must fail closed, not panic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProofMetrics {
    /// Hash-share proofs never contribute ψ directly - their quality is
    /// already expressed in `H(u)`. `shares` is carried for receipts
    /// only.
    HashShare { shares: u32 },
    /// `quality_bp` in `[0, 10_000]` (basis points of "perfect"
    /// quality); `compute_units` bounded by policy.
    Ai { quality_bp: u32, compute_units: u64 },
    /// `fidelity_bp` in `[0, 10_000]`; `qubits` bounded by policy.
    Quantum { fidelity_bp: u32, qubits: u32 },
    /// `bytes_committed` and `duration_blocks` both non-negative,
    /// bounded by policy.
    Storage {
        bytes_committed: u64,
        duration_blocks: u32,
    },
    /// `iterations` elapsed; `verified_speedup_bp` in `[0, 10_000]`
    /// basis points over the sequential baseline.
    Vdf {
        iterations: u64,
        verified_speedup_bp: u32,
    },
}

impl ProofMetrics {
    pub fn proof_type(&self) -> ProofType {
        match self {
            Self::HashShare { .. } => ProofType::HashShare,
            Self::Ai { .. } => ProofType::Ai,
            Self::Quantum { .. } => ProofType::Quantum,
            Self::Storage { .. } => ProofType::Storage,
            Self::Vdf { .. } => ProofType::Vdf,
        }
    }

    /// Structural bound check (`spec.md` "bounded domain"); does not
    /// compute ψ - see `scorer::psi_pre`.
    pub fn schema_check(&self) -> Result<()> {
        let bp_ok = |bp: u32| bp <= 10_000;
        match *self {
            Self::HashShare { .. } => Ok(()),
            Self::Ai { quality_bp, .. } => {
                if bp_ok(quality_bp) {
                    Ok(())
                } else {
                    Err(ConsensusError::Schema {
                        field: "Ai.quality_bp".into(),
                        reason: "must be <= 10000".into(),
                    })
                }
            }
            Self::Quantum { fidelity_bp, .. } => {
                if bp_ok(fidelity_bp) {
                    Ok(())
                } else {
                    Err(ConsensusError::Schema {
                        field: "Quantum.fidelity_bp".into(),
                        reason: "must be <= 10000".into(),
                    })
                }
            }
            Self::Storage { .. } => Ok(()),
            Self::Vdf {
                verified_speedup_bp,
                ..
            } => {
                if bp_ok(verified_speedup_bp) {
                    Ok(())
                } else {
                    Err(ConsensusError::Schema {
                        field: "Vdf.verified_speedup_bp".into(),
                        reason: "must be <= 10000".into(),
                    })
                }
            }
        }
    }
}

/// One verified proof attached to a candidate block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProofEnvelope {
    pub metrics: ProofMetrics,
    /// Domain-separated 32-byte replay tag, produced by the verifier.
    pub nullifier: [u8; 32],
    /// Position within the candidate's proof list; the stable secondary
    /// sort key within a type (`spec.md` §4.5 step 2).
    pub index: u32,
}

impl ProofEnvelope {
    pub fn proof_type(&self) -> ProofType {
        self.metrics.proof_type()
    }
}

// ==================== HEADER ====================

/// Consensus-relevant block header fields. Every field here, and only
/// these fields, participate in `SignBytes`/hashing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Header {
    pub codec_version: u8,
    pub parent_hash: [u8; 32],
    pub height: u64,
    pub chain_id: u64,
    /// Current acceptance threshold in μ-nats.
    pub theta: i64,
    /// Nonce sampling seed, consumed by `scorer::derive_u`.
    pub u_seed: [u8; 32],
    pub proofs_commitment: [u8; 32],
    pub proofs_root: [u8; 32],
    pub share_receipts_root: [u8; 32],
    pub alg_policy_root: [u8; 32],
    pub policy_root: [u8; 32],
    pub aux: Vec<u8>,
}

impl Header {
    pub fn schema_check(&self) -> Result<()> {
        if self.codec_version != CODEC_VERSION {
            return Err(ConsensusError::Schema {
                field: "codec_version".into(),
                reason: format!(
                    "expected {}, got {}",
                    CODEC_VERSION, self.codec_version
                ),
            });
        }
        if self.aux.len() > MAX_AUX_BYTES {
            return Err(ConsensusError::Schema {
                field: "aux".into(),
                reason: format!("exceeds {} bytes", MAX_AUX_BYTES),
            });
        }
        Ok(())
    }
}

// ==================== BREAKDOWN / RECEIPT ====================

bitflags! {
    /// Bit-field of policy/scoring rules that fired while producing a
    /// verdict. Informational bits (e.g. `CAP_EXCEEDED`) may be set on
    /// an otherwise-accepted block (`spec.md` scenario 2); others are
    /// only set on rejection.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
    pub struct RuleFlags: u32 {
        const CAP_EXCEEDED       = 1 << 0;
        const TOTAL_CAP_EXCEEDED = 1 << 1;
        const ESCORT_MISSING     = 1 << 2;
        const DIVERSITY_FAIL     = 1 << 3;
        const NULLIFIER_REUSE    = 1 << 4;
        const THETA_MISMATCH     = 1 << 5;
        const BELOW_THETA        = 1 << 6;
    }
}

/// Per-type pre/post cap ψ values plus the overall score breakdown.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Breakdown {
    /// `(pre_cap, post_cap)` ψ sums per type, in type-lexicographic
    /// order (`BTreeMap` iteration order over `ProofType`'s `Ord`).
    pub psi_by_type: BTreeMap<ProofType, (i64, i64)>,
    /// Hash-share contribution `H(u)`.
    pub h_u: i64,
    /// Final score `S = H(u) + Σ post-cap ψ`.
    pub score: i64,
    pub rules_fired: RuleFlags,
    /// Nullifiers consumed by this candidate (only meaningful on
    /// accept; empty on reject).
    pub consumed_nullifiers: Vec<[u8; 32]>,
}

/// The verdict returned by `validator::validate_header`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Verdict {
    Accept { receipt: AcceptanceReceipt },
    Reject {
        reason: RejectReason,
        receipt: Option<AcceptanceReceipt>,
    },
}

/// Structured rejection reason, stable across implementations and safe
/// to surface verbatim over RPC (`spec.md` §7).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RejectReason {
    PolicyRootMismatch,
    AlgPolicyRootMismatch,
    Schema { field: String },
    NullifierReuse { nullifier: String, first_height: u64 },
    ThetaMismatch,
    BelowThreshold,
    CapExceeded { proof_type: String },
    EscortMissing { proof_type: String },
    DiversityFail,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AcceptanceReceipt {
    pub height: u64,
    pub header_hash: [u8; 32],
    pub breakdown: Breakdown,
    pub theta: i64,
}

// ==================== SHARE RECEIPTS ====================

/// One micro-target share receipt aggregated into the block's
/// `share_receipts_root` (`spec.md` §4.8). `leaf_key` is the receipt's
/// own identity - the Merkle leaf order is a sort over the *hash* of
/// this struct, never over `leaf_key` or any other field directly (see
/// `share_receipts::aggregate_share_receipts`). The payload is opaque
/// to this crate beyond its canonical encoding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShareReceipt {
    pub leaf_key: [u8; 32],
    pub payload: Vec<u8>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_proof_type_lexicographic_order() {
        let order = ProofType::all_in_order();
        let names: Vec<&str> = order.iter().map(|t| t.canonical_name()).collect();
        let mut sorted = names.clone();
        sorted.sort();
        assert_eq!(names, sorted);
    }

    #[test]
    fn test_proof_type_ord_matches_name() {
        assert!(ProofType::Ai < ProofType::HashShare);
        assert!(ProofType::Storage < ProofType::Vdf);
    }

    #[test]
    fn test_ai_metrics_schema_check() {
        let ok = ProofMetrics::Ai {
            quality_bp: 9_000,
            compute_units: 10,
        };
        assert!(ok.schema_check().is_ok());

        let bad = ProofMetrics::Ai {
            quality_bp: 10_001,
            compute_units: 10,
        };
        assert!(bad.schema_check().is_err());
    }

    #[test]
    fn test_header_schema_check_rejects_bad_version() {
        let mut header = sample_header();
        header.codec_version = 99;
        assert!(header.schema_check().is_err());
    }

    #[test]
    fn test_header_schema_check_rejects_oversized_aux() {
        let mut header = sample_header();
        header.aux = vec![0u8; MAX_AUX_BYTES + 1];
        assert!(header.schema_check().is_err());
    }

    fn sample_header() -> Header {
        Header {
            codec_version: CODEC_VERSION,
            parent_hash: [0u8; 32],
            height: 1,
            chain_id: 1,
            theta: 600_000,
            u_seed: [1u8; 32],
            proofs_commitment: [0u8; 32],
            proofs_root: [0u8; 32],
            share_receipts_root: [0u8; 32],
            alg_policy_root: [0u8; 32],
            policy_root: [0u8; 32],
            aux: Vec::new(),
        }
    }

    #[test]
    fn test_rule_flags_bitwise() {
        let mut flags = RuleFlags::empty();
        flags |= RuleFlags::CAP_EXCEEDED;
        assert!(flags.contains(RuleFlags::CAP_EXCEEDED));
        assert!(!flags.contains(RuleFlags::ESCORT_MISSING));
    }

    #[test]
    fn test_proof_type_serde_tokens() {
        serde_test::assert_tokens(&ProofType::HashShare, &[serde_test::Token::UnitVariant {
            name: "ProofType",
            variant: "HashShare",
        }]);
    }
}
