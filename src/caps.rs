//! Per-type and total ψ cap enforcement, escort, and diversity rules
//! (`spec.md` §4.3).
//!
//! Cap clipping is *not* a rejection by itself - `spec.md` scenario 2
//! accepts a block whose AI contribution was clipped to Γ_AI and merely
//! records `CAP_EXCEEDED` in the breakdown. Escort and diversity
//! failures, by contrast, are hard rejections and surface as
//! `PolicyError`.

use crate::errors::{ConsensusError, PolicyError, Result};
use crate::policy::CapsConfig;
use crate::types::{ProofType, RuleFlags};
use std::collections::BTreeMap;

/// Output of the cap pipeline: per-type `(pre_cap, post_cap)` ψ plus any
/// rule flags fired along the way.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapsOutput {
    pub psi_by_type: BTreeMap<ProofType, (i64, i64)>,
    pub total_post_cap: i64,
    pub rules_fired: RuleFlags,
}

/// Clip each type's ψ to its per-type cap, then clip the resulting total
/// to the global cap via deterministic partial allocation in
/// lexicographic type order (`ProofType`'s `Ord`, i.e. `BTreeMap`
/// iteration order): walk types in order, grant each its full post-type-cap
/// amount while total budget remains, then grant the remainder to the
/// first type whose full amount would overrun it, and zero to everything
/// after. This makes clipping a pure function of (ψ, type order, caps),
/// never of input order within a type.
pub fn apply_caps(psi_pre: &BTreeMap<ProofType, i64>, caps: &CapsConfig) -> Result<CapsOutput> {
    let mut rules_fired = RuleFlags::empty();
    let mut per_type_capped: BTreeMap<ProofType, (i64, i64)> = BTreeMap::new();

    for (&t, &pre) in psi_pre {
        if pre < 0 {
            return Err(ConsensusError::Schema {
                field: format!("psi_pre[{:?}]", t),
                reason: "must be non-negative".into(),
            });
        }
        let cap = *caps.per_type.get(&t).unwrap_or(&0);
        let capped = pre.min(cap);
        if capped < pre {
            rules_fired |= RuleFlags::CAP_EXCEEDED;
        }
        per_type_capped.insert(t, (pre, capped));
    }

    let sum_capped: i64 = per_type_capped
        .values()
        .try_fold(0i64, |acc, &(_, capped)| {
            acc.checked_add(capped)
                .ok_or(ConsensusError::NumericOverflow {
                    op: "caps.sum_capped".into(),
                })
        })?;

    let mut psi_by_type = BTreeMap::new();
    let total_post_cap;

    if sum_capped <= caps.total {
        for (t, (pre, capped)) in per_type_capped {
            psi_by_type.insert(t, (pre, capped));
        }
        total_post_cap = sum_capped;
    } else {
        rules_fired |= RuleFlags::TOTAL_CAP_EXCEEDED;
        let mut remaining = caps.total;
        for (t, (pre, capped)) in per_type_capped {
            let granted = capped.min(remaining);
            remaining -= granted;
            psi_by_type.insert(t, (pre, granted));
        }
        total_post_cap = caps.total;
    }

    Ok(CapsOutput {
        psi_by_type,
        total_post_cap,
        rules_fired,
    })
}

/// Escort rule: any type whose post-cap share of `total_post_cap` exceeds
/// `escort_soft_threshold_bp` must have at least one of its configured
/// escort types present with positive post-cap ψ. Types absent from
/// `escort_sets` carry no escort obligation.
pub fn check_escort(output: &CapsOutput, caps: &CapsConfig) -> Result<()> {
    if output.total_post_cap == 0 {
        return Ok(());
    }
    for (&t, escorts) in &caps.escort_sets {
        let (_, post) = output.psi_by_type.get(&t).copied().unwrap_or((0, 0));
        if post == 0 {
            continue;
        }
        let share_bp = (post as i128 * 10_000) / output.total_post_cap as i128;
        if share_bp <= caps.escort_soft_threshold_bp as i128 {
            continue;
        }
        let has_escort = escorts
            .iter()
            .any(|e| output.psi_by_type.get(e).map_or(false, |&(_, p)| p > 0));
        if !has_escort {
            return Err(ConsensusError::Policy(PolicyError::EscortMissing {
                proof_type: t.canonical_name().to_string(),
                share_bp: share_bp as i64,
                threshold_bp: caps.escort_soft_threshold_bp,
            }));
        }
    }
    Ok(())
}

/// Diversity rule: at least `caps.diversity_min` distinct proof types
/// must be present in the candidate (presence, not post-cap value - a
/// `HashShare` proof always has ψ=0 but still counts as present).
pub fn check_diversity(psi_pre: &BTreeMap<ProofType, i64>, caps: &CapsConfig) -> Result<()> {
    let distinct = psi_pre.len();
    if distinct < caps.diversity_min {
        return Err(ConsensusError::Policy(PolicyError::DiversityFail {
            distinct,
            required: caps.diversity_min,
        }));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::testutil::default_policy;

    fn psi_map(entries: &[(ProofType, i64)]) -> BTreeMap<ProofType, i64> {
        entries.iter().cloned().collect()
    }

    #[test]
    fn test_apply_caps_no_clipping() {
        let policy = default_policy();
        let psi = psi_map(&[(ProofType::Ai, 100_000)]);
        let out = apply_caps(&psi, &policy.caps).unwrap();
        assert_eq!(out.psi_by_type[&ProofType::Ai], (100_000, 100_000));
        assert!(!out.rules_fired.contains(RuleFlags::CAP_EXCEEDED));
    }

    #[test]
    fn test_apply_caps_clips_per_type() {
        let policy = default_policy();
        let psi = psi_map(&[(ProofType::Ai, 900_000)]);
        let out = apply_caps(&psi, &policy.caps).unwrap();
        assert_eq!(out.psi_by_type[&ProofType::Ai], (900_000, 700_000));
        assert!(out.rules_fired.contains(RuleFlags::CAP_EXCEEDED));
    }

    #[test]
    fn test_apply_caps_clips_total_in_lexicographic_order() {
        let mut policy = default_policy();
        policy.caps.total = 1_000_000;
        let psi = psi_map(&[
            (ProofType::Ai, 700_000),
            (ProofType::Quantum, 700_000),
            (ProofType::Storage, 700_000),
        ]);
        let out = apply_caps(&psi, &policy.caps).unwrap();
        // AI sorts first ("AI" < "Quantum" < "Storage"): gets its full
        // 700_000, Quantum gets the remaining 300_000, Storage gets 0.
        assert_eq!(out.psi_by_type[&ProofType::Ai].1, 700_000);
        assert_eq!(out.psi_by_type[&ProofType::Quantum].1, 300_000);
        assert_eq!(out.psi_by_type[&ProofType::Storage].1, 0);
        assert_eq!(out.total_post_cap, 1_000_000);
        assert!(out.rules_fired.contains(RuleFlags::TOTAL_CAP_EXCEEDED));
    }

    #[test]
    fn test_check_escort_requires_configured_partner() {
        let policy = default_policy();
        let psi = psi_map(&[(ProofType::Quantum, 700_000)]);
        let out = apply_caps(&psi, &policy.caps).unwrap();
        assert!(check_escort(&out, &policy.caps).is_err());
    }

    #[test]
    fn test_check_escort_satisfied_with_partner_present() {
        let policy = default_policy();
        let psi = psi_map(&[(ProofType::Quantum, 700_000), (ProofType::Storage, 10_000)]);
        let out = apply_caps(&psi, &policy.caps).unwrap();
        assert!(check_escort(&out, &policy.caps).is_ok());
    }

    #[test]
    fn test_check_diversity_fails_below_minimum() {
        let mut policy = default_policy();
        policy.caps.diversity_min = 2;
        let psi = psi_map(&[(ProofType::Ai, 1)]);
        assert!(check_diversity(&psi, &policy.caps).is_err());
    }

    #[test]
    fn test_check_diversity_counts_zero_psi_hashshare() {
        let mut policy = default_policy();
        policy.caps.diversity_min = 2;
        let psi = psi_map(&[(ProofType::Ai, 1), (ProofType::HashShare, 0)]);
        assert!(check_diversity(&psi, &policy.caps).is_ok());
    }

    #[quickcheck_macros::quickcheck]
    fn prop_total_post_cap_never_exceeds_configured_total(
        ai: u32,
        quantum: u32,
        storage: u32,
        vdf: u32,
    ) -> bool {
        let policy = default_policy();
        let psi = psi_map(&[
            (ProofType::Ai, ai as i64),
            (ProofType::Quantum, quantum as i64),
            (ProofType::Storage, storage as i64),
            (ProofType::Vdf, vdf as i64),
        ]);
        match apply_caps(&psi, &policy.caps) {
            Ok(out) => out.total_post_cap <= policy.caps.total,
            Err(_) => true,
        }
    }
}
