//! EMA-based Θ (acceptance threshold) retargeting in log-space
//! (`spec.md` §4.6).
//!
//! Each retarget blends two independent corrections before clamping:
//! Θ itself mean-reverts toward `log_t_target` by weight β, and a
//! proportional term nudges it further using the EMA of observed
//! inter-block log intervals (also weighted by β) against the same
//! target. The result is always clamped into `[min_log_t, max_log_t]`,
//! and never computed from fewer than `ring_len` observations
//! (Invariant F).

use crate::errors::{ConsensusError, Result, ThetaScheduleError};
use crate::numerics::{clamp, lerp_mu};
use crate::policy::DifficultyConfig;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Persistent Θ-retargeting state: the bounded ring of recent observed
/// log-intervals plus their running EMA.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DifficultyState {
    ring: VecDeque<i64>,
    ema_log_interval: i64,
}

impl DifficultyState {
    /// Start the EMA at the configured target so the first `ring_len`
    /// observations don't drag Θ toward a spurious extreme.
    pub fn new(config: &DifficultyConfig) -> Self {
        DifficultyState {
            ring: VecDeque::with_capacity(config.ring_len),
            ema_log_interval: config.log_t_target,
        }
    }

    /// Fold in one observed inter-block log-interval (μ-nats), updating
    /// the EMA with weight β and pruning the ring to `ring_len`.
    pub fn observe(&mut self, log_interval: i64, config: &DifficultyConfig) -> Result<()> {
        self.ema_log_interval = lerp_mu(
            self.ema_log_interval,
            log_interval,
            config.beta_num,
            config.beta_den,
        )?;
        self.ring.push_back(log_interval);
        while self.ring.len() > config.ring_len {
            self.ring.pop_front();
        }
        Ok(())
    }

    /// Number of observations folded in so far, capped at `ring_len`.
    pub fn observation_count(&self) -> usize {
        self.ring.len()
    }

    /// Compute the next Θ from `current_theta` and the accumulated EMA.
    /// Requires a full window of observations (Invariant F); the result
    /// is always clamped into `[min_log_t, max_log_t]`.
    pub fn next_theta(&self, current_theta: i64, config: &DifficultyConfig) -> Result<i64> {
        if self.ring.len() < config.ring_len {
            return Err(ThetaScheduleError::WindowUnderflow {
                have: self.ring.len(),
                need: config.ring_len,
            }
            .into());
        }
        if current_theta < config.min_log_t || current_theta > config.max_log_t {
            return Err(ThetaScheduleError::OutOfRange {
                value: current_theta,
                min: config.min_log_t,
                max: config.max_log_t,
            }
            .into());
        }

        // Mean-revert Θ itself toward log_t_target by weight β, same as
        // the observed-interval EMA above, before applying the
        // proportional correction - otherwise a Θ displaced from target
        // by some past shock never decays back even once the observed
        // interval stream settles exactly on target.
        let reverted = lerp_mu(current_theta, config.log_t_target, config.beta_num, config.beta_den)?;

        // Slow blocks (observed interval above target) should lower Θ,
        // making acceptance easier; fast blocks raise it.
        let error = (self.ema_log_interval as i128) - (config.log_t_target as i128);
        let step = (error * config.k_num as i128) / config.k_den as i128;
        let step = i64::try_from(step).map_err(|_| ConsensusError::NumericOverflow {
            op: "difficulty.next_theta.step".into(),
        })?;
        let raw = reverted
            .checked_sub(step)
            .ok_or(ConsensusError::NumericOverflow {
                op: "difficulty.next_theta.sub".into(),
            })?;
        Ok(clamp(raw, config.min_log_t, config.max_log_t))
    }
}
