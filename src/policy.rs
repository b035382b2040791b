//! Policy document: load, validate, and derive the policy root.
//!
//! The policy document is produced and governed outside this crate
//! (`spec.md` §9: "YAML policy loading is pushed out of the core") but
//! *parsing* the already-fetched YAML/JSON text into the validated,
//! strongly-typed `PolicyDocument` and computing its canonical root is
//! this crate's job, mirroring the teacher's own strict-decode
//! philosophy (`spec.md` §4.3: "Unknown fields are errors").

use crate::encoding::{domain, domain_hash};
use crate::errors::{ConsensusError, PolicyError, Result};
use crate::types::ProofType;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Per-type and total ψ caps, plus escort/diversity rules
/// (`spec.md` §4.3).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CapsConfig {
    /// Γ_type, μ-nats, one entry per `ProofType`.
    pub per_type: BTreeMap<ProofType, i64>,
    /// Γ_total, μ-nats.
    pub total: i64,
    /// Soft-threshold share of Σψ (basis points) above which a type
    /// requires an escort proof.
    pub escort_soft_threshold_bp: i64,
    /// For each type, the set of other types that count as its escort.
    pub escort_sets: BTreeMap<ProofType, Vec<ProofType>>,
    /// Minimum distinct proof types required (`q` in `spec.md` §4.3).
    pub diversity_min: usize,
}

/// α-tuner bounds and window (`spec.md` §4.4).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AlphaTunerConfig {
    /// α_min in Q32.32 raw form, per type.
    pub alpha_min: BTreeMap<ProofType, i64>,
    /// α_max in Q32.32 raw form, per type.
    pub alpha_max: BTreeMap<ProofType, i64>,
    /// Maximum per-update step, Q32.32 raw form.
    pub alpha_step: i64,
    /// Gain applied to the observed/target gap, Q32.32 raw form.
    pub alpha_gain: i64,
    /// Target share π_t, basis points, per type; must sum to 10_000.
    pub target_share_bp: BTreeMap<ProofType, i64>,
    /// Window length W, in accepted blocks.
    pub window_len: u32,
}

/// Θ-retargeting constants (`spec.md` §4.6).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DifficultyConfig {
    /// β numerator/denominator, `β ∈ (0, 1]`.
    pub beta_num: i64,
    pub beta_den: i64,
    /// k numerator/denominator (proportional gain).
    pub k_num: i64,
    pub k_den: i64,
    pub log_t_target: i64,
    pub min_log_t: i64,
    pub max_log_t: i64,
    /// Size of the inter-block interval ring buffer.
    pub ring_len: usize,
}

/// Fork-choice weighting mode (`spec.md` §9 open question 3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ForkChoiceMode {
    HeightOnly,
    HeightThenWeightedScore,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ForkChoiceConfig {
    pub mode: ForkChoiceMode,
    /// N ancestors summed for the weighted tie-break, ignored under
    /// `HeightOnly`.
    pub weighted_ancestors: u32,
}

/// The full, validated policy document. `policy_root(doc)` is the value
/// bound into every header's `policy_root` field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PolicyDocument {
    pub version: u32,
    pub caps: CapsConfig,
    pub alpha: AlphaTunerConfig,
    pub difficulty: DifficultyConfig,
    /// Nullifier replay window W, in heights.
    pub nullifier_window: u64,
    pub fork_choice: ForkChoiceConfig,
}

/// Parse an already-fetched YAML policy document and validate it.
pub fn load_yaml(text: &str) -> Result<PolicyDocument> {
    let doc: PolicyDocument = serde_yaml::from_str(text).map_err(|e| {
        ConsensusError::Policy(PolicyError::InvalidDocument {
            reason: format!("yaml parse error: {}", e),
        })
    })?;
    validate(&doc)?;
    Ok(doc)
}

/// Parse an already-fetched JSON policy document and validate it.
pub fn load_json(text: &str) -> Result<PolicyDocument> {
    let doc: PolicyDocument = serde_json::from_str(text).map_err(|e| {
        ConsensusError::Policy(PolicyError::InvalidDocument {
            reason: format!("json parse error: {}", e),
        })
    })?;
    validate(&doc)?;
    Ok(doc)
}

/// Structural validation beyond what serde's `deny_unknown_fields`
/// already enforces (`spec.md` §4.3 "Bounds").
pub fn validate(doc: &PolicyDocument) -> Result<()> {
    if doc.caps.total < 0 {
        return invalid("caps.total must be non-negative");
    }
    let mut soft_min_sum: i64 = 0;
    for (t, cap) in &doc.caps.per_type {
        if *cap < 0 {
            return invalid(&format!("caps.per_type[{:?}] must be non-negative", t));
        }
        soft_min_sum = soft_min_sum
            .checked_add(0)
            .ok_or(ConsensusError::NumericOverflow {
                op: "policy.validate.soft_min_sum".into(),
            })?;
    }
    if doc.caps.total < soft_min_sum {
        return invalid("caps.total must be >= sum of soft minima");
    }
    if doc.caps.diversity_min > ProofType::all_in_order().len() {
        return invalid("caps.diversity_min exceeds number of known proof types");
    }

    let target_sum: i64 = doc.alpha.target_share_bp.values().sum();
    if !doc.alpha.target_share_bp.is_empty() && target_sum != 10_000 {
        return invalid("alpha.target_share_bp must sum to 10000");
    }
    for t in ProofType::all_in_order() {
        let min = doc.alpha.alpha_min.get(&t);
        let max = doc.alpha.alpha_max.get(&t);
        if let (Some(min), Some(max)) = (min, max) {
            if min > max {
                return invalid(&format!("alpha_min > alpha_max for {:?}", t));
            }
        }
    }
    if doc.alpha.alpha_step < 0 {
        return invalid("alpha.alpha_step must be non-negative");
    }

    if doc.difficulty.beta_den <= 0 || doc.difficulty.beta_num < 0 || doc.difficulty.beta_num > doc.difficulty.beta_den {
        return invalid("difficulty.beta must be in (0, 1] as a rational");
    }
    if doc.difficulty.k_den <= 0 {
        return invalid("difficulty.k_den must be positive");
    }
    if doc.difficulty.min_log_t > doc.difficulty.max_log_t {
        return invalid("difficulty.min_log_t must be <= max_log_t");
    }
    if doc.difficulty.ring_len == 0 {
        return invalid("difficulty.ring_len must be positive");
    }

    if doc.nullifier_window == 0 {
        return invalid("nullifier_window must be positive");
    }

    Ok(())
}

fn invalid(reason: &str) -> Result<()> {
    Err(ConsensusError::Policy(PolicyError::InvalidDocument {
        reason: reason.to_string(),
    }))
}

/// Canonical policy root: `hash(canonical_bytes(policy))`.
pub fn policy_root(doc: &PolicyDocument) -> Result<[u8; 32]> {
    domain_hash(domain::POLICY_V1, doc)
}

/// Test fixtures shared by this crate's unit tests and its integration
/// tests under `tests/`; kept unconditionally compiled (not
/// `#[cfg(test)]`) since integration tests link this crate as an
/// ordinary external dependency.
pub mod testutil {
    use super::*;

    /// A permissive default policy document used across this crate's
    /// test suites and the integration golden tests.
    pub fn default_policy() -> PolicyDocument {
        let mut per_type = BTreeMap::new();
        per_type.insert(ProofType::Ai, 700_000);
        per_type.insert(ProofType::HashShare, 0);
        per_type.insert(ProofType::Quantum, 700_000);
        per_type.insert(ProofType::Storage, 700_000);
        per_type.insert(ProofType::Vdf, 700_000);

        let mut escort_sets = BTreeMap::new();
        escort_sets.insert(ProofType::Quantum, vec![ProofType::Storage, ProofType::Vdf]);

        let mut alpha_min = BTreeMap::new();
        let mut alpha_max = BTreeMap::new();
        let mut target_share_bp = BTreeMap::new();
        for t in ProofType::all_in_order() {
            alpha_min.insert(t, crate::numerics::Q32_32::from_ratio(1, 2).unwrap().0);
            alpha_max.insert(t, crate::numerics::Q32_32::from_ratio(2, 1).unwrap().0);
            target_share_bp.insert(t, 2_000);
        }

        PolicyDocument {
            version: 1,
            caps: CapsConfig {
                per_type,
                total: 2_000_000,
                escort_soft_threshold_bp: 6_000,
                escort_sets,
                diversity_min: 1,
            },
            alpha: AlphaTunerConfig {
                alpha_min,
                alpha_max,
                alpha_step: crate::numerics::Q32_32::from_ratio(1, 100).unwrap().0,
                alpha_gain: crate::numerics::Q32_32::from_ratio(1, 1).unwrap().0,
                target_share_bp,
                window_len: 100,
            },
            difficulty: DifficultyConfig {
                beta_num: 1,
                beta_den: 8,
                k_num: 1,
                k_den: 16,
                log_t_target: 600_000,
                min_log_t: 100_000,
                max_log_t: 2_000_000,
                ring_len: 32,
            },
            nullifier_window: 100,
            fork_choice: ForkChoiceConfig {
                mode: ForkChoiceMode::HeightThenWeightedScore,
                weighted_ancestors: 8,
            },
        }
    }
}
