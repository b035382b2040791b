//! Slow, windowed per-type α scaling correction (`spec.md` §4.4).
//!
//! α nudges each type's raw ψ contribution toward its configured target
//! share of the total, re-evaluated once per `window_len` accepted
//! blocks rather than every block - a single noisy block must never
//! move α by more than `alpha_step`.

use crate::errors::Result;
use crate::numerics::{clamp, Q32_32};
use crate::policy::AlphaTunerConfig;
use crate::types::ProofType;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Scale a raw ψ contribution by a type's current α factor, floor
/// rounding, checked overflow.
pub fn apply_alpha(psi_raw: i64, alpha: Q32_32) -> Result<i64> {
    Q32_32::from_ratio(psi_raw, 1)?.mul_q(alpha)?.to_mu_nats(1)
}

/// Persistent α state: current per-type scale plus the in-flight
/// observation window. Owned by `State`, mutated only through
/// `record`/`maybe_retarget`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlphaState {
    alpha: BTreeMap<ProofType, i64>,
    window_psi: BTreeMap<ProofType, i64>,
    window_count: u32,
}

impl AlphaState {
    /// Start every type at α = 1.0, clamped into its configured bounds.
    pub fn new(config: &AlphaTunerConfig) -> Self {
        let mut alpha = BTreeMap::new();
        for t in ProofType::all_in_order() {
            let min = config.alpha_min.get(&t).copied().unwrap_or(Q32_32::ONE.0);
            let max = config.alpha_max.get(&t).copied().unwrap_or(Q32_32::ONE.0);
            alpha.insert(t, clamp(Q32_32::ONE.0, min, max));
        }
        AlphaState {
            alpha,
            window_psi: BTreeMap::new(),
            window_count: 0,
        }
    }

    /// Current α for `t`, or 1.0 if `t` has no configured bounds.
    pub fn scale(&self, t: ProofType) -> Q32_32 {
        Q32_32(self.alpha.get(&t).copied().unwrap_or(Q32_32::ONE.0))
    }

    /// Fold one accepted block's post-cap ψ-by-type into the current
    /// window. Must be called exactly once per accepted block, before
    /// `maybe_retarget`.
    pub fn record(&mut self, psi_by_type: &BTreeMap<ProofType, i64>) {
        for (&t, &psi) in psi_by_type {
            *self.window_psi.entry(t).or_insert(0) += psi;
        }
        self.window_count += 1;
    }

    /// If the window has closed (`window_count == window_len`), retarget
    /// every type's α toward its configured target share and reset the
    /// window. Returns whether a retarget happened.
    pub fn maybe_retarget(&mut self, config: &AlphaTunerConfig) -> Result<bool> {
        if self.window_count < config.window_len {
            return Ok(false);
        }

        let total: i64 = self.window_psi.values().sum();
        for t in ProofType::all_in_order() {
            let target_bp = config.target_share_bp.get(&t).copied().unwrap_or(0);
            let observed_bp = if total > 0 {
                let psi_t = self.window_psi.get(&t).copied().unwrap_or(0);
                ((psi_t as i128 * 10_000) / total as i128) as i64
            } else {
                0
            };
            let gap_bp = target_bp - observed_bp;

            let min = config.alpha_min.get(&t).copied().unwrap_or(Q32_32::ONE.0);
            let max = config.alpha_max.get(&t).copied().unwrap_or(Q32_32::ONE.0);
            let current = self.alpha.get(&t).copied().unwrap_or(Q32_32::ONE.0);

            let raw_delta = Q32_32(config.alpha_gain)
                .mul_q(Q32_32::from_ratio(gap_bp, 10_000)?)?
                .0;
            let delta = clamp(raw_delta, -config.alpha_step, config.alpha_step);
            let updated = clamp(current + delta, min, max);
            self.alpha.insert(t, updated);
        }

        self.window_psi.clear();
        self.window_count = 0;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::testutil::default_policy;

    #[test]
    fn test_initial_alpha_is_one() {
        let policy = default_policy();
        let state = AlphaState::new(&policy.alpha);
        assert_eq!(state.scale(ProofType::Ai), Q32_32::ONE);
    }

    #[test]
    fn test_no_retarget_before_window_closes() {
        let policy = default_policy();
        let mut state = AlphaState::new(&policy.alpha);
        let mut psi = BTreeMap::new();
        psi.insert(ProofType::Ai, 1_000);
        state.record(&psi);
        assert!(!state.maybe_retarget(&policy.alpha).unwrap());
    }

    #[test]
    fn test_retarget_fires_at_window_boundary() {
        let mut policy = default_policy();
        policy.alpha.window_len = 1;
        let mut state = AlphaState::new(&policy.alpha);
        let mut psi = BTreeMap::new();
        for t in ProofType::all_in_order() {
            psi.insert(t, 100);
        }
        state.record(&psi);
        assert!(state.maybe_retarget(&policy.alpha).unwrap());
    }

    #[test]
    fn test_retarget_increases_alpha_for_underrepresented_type() {
        let mut policy = default_policy();
        policy.alpha.window_len = 1;
        policy.alpha.alpha_step = Q32_32::from_ratio(1, 1).unwrap().0;
        let mut state = AlphaState::new(&policy.alpha);
        // AI contributes nothing; every other type contributes equally -
        // AI's observed share (0%) is far below its 20% target, so its α
        // should move up.
        let mut psi = BTreeMap::new();
        psi.insert(ProofType::HashShare, 0);
        psi.insert(ProofType::Quantum, 100);
        psi.insert(ProofType::Storage, 100);
        psi.insert(ProofType::Vdf, 100);
        state.record(&psi);
        state.maybe_retarget(&policy.alpha).unwrap();
        assert!(state.scale(ProofType::Ai).0 > Q32_32::ONE.0);
    }

    #[test]
    fn test_retarget_respects_alpha_bounds() {
        let mut policy = default_policy();
        policy.alpha.window_len = 1;
        policy.alpha.alpha_step = Q32_32::from_ratio(10, 1).unwrap().0;
        policy
            .alpha
            .alpha_max
            .insert(ProofType::Ai, Q32_32::from_ratio(3, 2).unwrap().0);
        let mut state = AlphaState::new(&policy.alpha);
        let mut psi = BTreeMap::new();
        psi.insert(ProofType::Quantum, 1_000_000);
        state.record(&psi);
        state.maybe_retarget(&policy.alpha).unwrap();
        assert!(state.scale(ProofType::Ai).0 <= Q32_32::from_ratio(3, 2).unwrap().0);
    }

    #[test]
    fn test_apply_alpha_identity_at_one() {
        assert_eq!(apply_alpha(12_345, Q32_32::ONE).unwrap(), 12_345);
    }

    #[test]
    fn test_apply_alpha_halves() {
        let half = Q32_32::from_ratio(1, 2).unwrap();
        assert_eq!(apply_alpha(100, half).unwrap(), 50);
    }
}
