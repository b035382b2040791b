//! Per-candidate scoring pipeline: `u_seed` -> `H(u)`, per-proof ψ, α
//! scaling, caps/escort/diversity, and the final `Breakdown`
//! (`spec.md` §4.5).
//!
//! This module is a pure function of its inputs - no I/O, no mutation of
//! `State` - so the same candidate always produces the same `Breakdown`
//! regardless of call order, which is what makes α-tuning and Θ
//! retargeting (which *do* consume this output) safe to replay.

use crate::alpha_tuner::{apply_alpha, AlphaState};
use crate::errors::Result;
use crate::numerics::{checked_add, ln_neg_mu, Q32_32};
use crate::policy::PolicyDocument;
use crate::{caps, hash};
use crate::types::{Breakdown, Header, ProofEnvelope, ProofMetrics, ProofType, RuleFlags};
use std::collections::BTreeMap;

/// Deterministically derive the per-block sampling value `u ∈ (0, 1]`
/// from the header's `u_seed`, resolving the scaling left open by
/// `spec.md` §9: hash the seed for uniform spread, then take the top 32
/// bits of the digest as the Q32.32 fractional value `(bits + 1) /
/// 2^32`, which keeps `u` strictly positive even for an all-zero digest.
pub fn derive_u(u_seed: &[u8; 32]) -> Q32_32 {
    let digest = hash::h3_256(u_seed);
    let top32 = u32::from_be_bytes([digest[0], digest[1], digest[2], digest[3]]);
    Q32_32(top32 as i64 + 1)
}

/// ψ_pre for one proof, before α scaling or caps. Every formula is
/// monotone non-decreasing in its inputs, which is what makes the
/// overall pipeline monotone in proof quality (Invariant A).
fn psi_pre(metrics: &ProofMetrics) -> Result<i64> {
    match *metrics {
        ProofMetrics::HashShare { .. } => Ok(0),
        ProofMetrics::Ai {
            quality_bp,
            compute_units,
        } => {
            let units = compute_units.min(1_000_000) as i64;
            crate::numerics::checked_mul(quality_bp as i64, units)
        }
        ProofMetrics::Quantum { fidelity_bp, qubits } => {
            crate::numerics::checked_mul(fidelity_bp as i64, qubits as i64)
        }
        ProofMetrics::Storage {
            bytes_committed,
            duration_blocks,
        } => {
            let kib = (bytes_committed / 1024).min(1_000_000) as i64;
            crate::numerics::checked_mul(kib, duration_blocks as i64)
        }
        ProofMetrics::Vdf {
            iterations,
            verified_speedup_bp,
        } => {
            let bounded_iterations = iterations.min(1_000_000) as i64;
            let product = crate::numerics::checked_mul(bounded_iterations, verified_speedup_bp as i64)?;
            Ok(product / 10_000)
        }
    }
}

/// Sum raw ψ_pre per type, then apply each type's current α scale.
fn psi_scaled_by_type(
    envelopes: &[ProofEnvelope],
    alpha: &AlphaState,
) -> Result<BTreeMap<ProofType, i64>> {
    let mut raw: BTreeMap<ProofType, i64> = BTreeMap::new();
    for e in envelopes {
        e.metrics.schema_check()?;
        let contribution = psi_pre(&e.metrics)?;
        let entry = raw.entry(e.proof_type()).or_insert(0);
        *entry = checked_add(*entry, contribution)?;
    }

    let mut scaled = BTreeMap::new();
    for (t, sum_raw) in raw {
        scaled.insert(t, apply_alpha(sum_raw, alpha.scale(t))?);
    }
    Ok(scaled)
}

/// Run the full scoring pipeline for one candidate block's proof set.
/// Returns `Err` for the two hard-rejection rules (escort, diversity);
/// cap clipping and sub-threshold scores are recorded as `RuleFlags` on
/// the returned `Breakdown` instead, leaving the accept/reject decision
/// to `validator`.
pub fn compute_breakdown(
    header: &Header,
    envelopes: &[ProofEnvelope],
    policy: &PolicyDocument,
    alpha: &AlphaState,
) -> Result<Breakdown> {
    let psi_pre_scaled = psi_scaled_by_type(envelopes, alpha)?;

    caps::check_diversity(&psi_pre_scaled, &policy.caps)?;
    let caps_output = caps::apply_caps(&psi_pre_scaled, &policy.caps)?;
    caps::check_escort(&caps_output, &policy.caps)?;

    let u = derive_u(&header.u_seed);
    let h_u = ln_neg_mu(u)?;

    let score = checked_add(h_u, caps_output.total_post_cap)?;

    let mut rules_fired = caps_output.rules_fired;
    if score < header.theta {
        rules_fired |= RuleFlags::BELOW_THETA;
    }

    let mut consumed_nullifiers: Vec<[u8; 32]> = envelopes.iter().map(|e| e.nullifier).collect();
    consumed_nullifiers.sort();

    Ok(Breakdown {
        psi_by_type: caps_output.psi_by_type,
        h_u,
        score,
        rules_fired,
        consumed_nullifiers,
    })
}
