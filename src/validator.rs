//! Block-acceptance orchestration (`spec.md` §4.10).
//!
//! `validate_header` runs its checks in the exact order `spec.md` §4.10
//! fixes, so two implementations seeing the same simultaneously-invalid
//! header always report the same `RejectReason`: (1) policy roots, (2)
//! schema, (3) nullifier replay, (4) score, (5) Θ-match, folded into the
//! final acceptance test alongside the below-threshold check. Only a
//! candidate that clears every one of these has its score committed to
//! `State`; anything rejected, at any step, leaves `State` byte-for-byte
//! unchanged.

use crate::errors::{ConsensusError, PolicyError, Result, ThetaScheduleError};
use crate::policy::PolicyDocument;
use crate::scorer;
use crate::state::State;
use crate::types::{
    AcceptanceReceipt, Header, ProofEnvelope, RejectReason, RuleFlags, Verdict,
};

/// Translate a non-fatal `ConsensusError` into the `RejectReason`
/// surfaced on `Verdict::Reject`. Fatal invariants
/// (`ConsensusError::is_fatal_invariant`) are never passed here - they
/// propagate as `Err` from `validate_header` instead.
fn to_reject_reason(err: &ConsensusError) -> RejectReason {
    match err {
        ConsensusError::Schema { field, .. } => RejectReason::Schema {
            field: field.clone(),
        },
        ConsensusError::Policy(PolicyError::PolicyRootMismatch { .. }) => {
            RejectReason::PolicyRootMismatch
        }
        ConsensusError::Policy(PolicyError::AlgPolicyRootMismatch { .. }) => {
            RejectReason::AlgPolicyRootMismatch
        }
        ConsensusError::Policy(PolicyError::CapExceeded { proof_type, .. }) => {
            RejectReason::CapExceeded {
                proof_type: proof_type.clone(),
            }
        }
        ConsensusError::Policy(PolicyError::EscortMissing { proof_type, .. }) => {
            RejectReason::EscortMissing {
                proof_type: proof_type.clone(),
            }
        }
        ConsensusError::Policy(PolicyError::DiversityFail { .. }) => RejectReason::DiversityFail,
        ConsensusError::Policy(PolicyError::InvalidDocument { .. }) => RejectReason::Schema {
            field: "policy".into(),
        },
        ConsensusError::ThetaSchedule(_) => RejectReason::ThetaMismatch,
        ConsensusError::NullifierReuse(e) => RejectReason::NullifierReuse {
            nullifier: e.nullifier.clone(),
            first_height: e.first_height,
        },
        ConsensusError::NumericOverflow { .. } | ConsensusError::Encoding { .. } => {
            unreachable!("fatal invariants must not reach to_reject_reason")
        }
    }
}

fn reject(err: ConsensusError) -> Result<Verdict> {
    if err.is_fatal_invariant() {
        return Err(err);
    }
    Ok(Verdict::Reject {
        reason: to_reject_reason(&err),
        receipt: None,
    })
}

/// Validate one candidate header against its attached proof envelopes,
/// the governing policy, and the externally-computed alg-policy root,
/// mutating `state` only on acceptance.
pub fn validate_header(
    header: &Header,
    envelopes: &[ProofEnvelope],
    policy: &PolicyDocument,
    expected_alg_policy_root: [u8; 32],
    state: &mut State,
) -> Result<Verdict> {
    // 1. policy roots
    let expected_policy_root = match crate::policy::policy_root(policy) {
        Ok(root) => root,
        Err(e) => return Err(e),
    };
    if header.policy_root != expected_policy_root {
        return reject(ConsensusError::Policy(PolicyError::PolicyRootMismatch {
            header: hex::encode(header.policy_root),
            loaded: hex::encode(expected_policy_root),
        }));
    }
    if header.alg_policy_root != expected_alg_policy_root {
        return reject(ConsensusError::Policy(PolicyError::AlgPolicyRootMismatch {
            header: hex::encode(header.alg_policy_root),
            loaded: hex::encode(expected_alg_policy_root),
        }));
    }

    // 2. schema
    if let Err(e) = header.schema_check() {
        return reject(e);
    }

    // 3. nullifier replay
    for envelope in envelopes {
        if let Err(e) = state.nullifiers.check(&envelope.nullifier) {
            return reject(e);
        }
    }

    // 4. score
    let breakdown = match scorer::compute_breakdown(header, envelopes, policy, &state.alpha) {
        Ok(b) => b,
        Err(e) => return reject(e),
    };

    let header_hash = match crate::encoding::domain_hash(crate::encoding::domain::HEADER_V1, header)
    {
        Ok(h) => h,
        Err(e) => return Err(e),
    };

    // 5. Θ-match, folded into the final acceptance test alongside the
    // below-threshold check.
    if header.theta != state.theta {
        return reject(ConsensusError::ThetaSchedule(
            ThetaScheduleError::ThetaMismatch {
                header: header.theta,
                state: state.theta,
            },
        ));
    }

    if breakdown.rules_fired.contains(RuleFlags::BELOW_THETA) {
        let receipt = AcceptanceReceipt {
            height: header.height,
            header_hash,
            breakdown,
            theta: state.theta,
        };
        return Ok(Verdict::Reject {
            reason: RejectReason::BelowThreshold,
            receipt: Some(receipt),
        });
    }

    commit(header, envelopes, &breakdown, policy, state)?;

    Ok(Verdict::Accept {
        receipt: AcceptanceReceipt {
            height: header.height,
            header_hash,
            breakdown,
            theta: state.theta,
        },
    })
}

/// Apply an accepted candidate's effects to `state`. Only called after
/// every rejection rule has already passed.
fn commit(
    header: &Header,
    envelopes: &[ProofEnvelope],
    breakdown: &crate::types::Breakdown,
    policy: &PolicyDocument,
    state: &mut State,
) -> Result<()> {
    for envelope in envelopes {
        state.nullifiers.record(envelope.nullifier, header.height);
    }
    state.nullifiers.prune(header.height, policy.nullifier_window);

    let psi_post: std::collections::BTreeMap<_, _> = breakdown
        .psi_by_type
        .iter()
        .map(|(&t, &(_, post))| (t, post))
        .collect();
    state.alpha.record(&psi_post);
    state.alpha.maybe_retarget(&policy.alpha)?;

    // This kernel carries no wall-clock timestamps; H(u) is itself a
    // logarithmic draw and doubles as the retargeting signal in its
    // place (the sortition analogue of inter-block time).
    state.difficulty.observe(breakdown.h_u, &policy.difficulty)?;
    match state
        .difficulty
        .next_theta(state.theta, &policy.difficulty)
    {
        Ok(new_theta) => state.theta = new_theta,
        Err(ConsensusError::ThetaSchedule(ThetaScheduleError::WindowUnderflow { .. })) => {}
        Err(e) => return Err(e),
    }

    state.height = header.height;
    Ok(())
}
