//! Mutable consensus state, owned exclusively by `validator`.
//!
//! Everything reachable from here is what actually changes as blocks
//! are accepted: the α-tuner window, the Θ-retargeting EMA, and the
//! nullifier replay set. Rejected candidates never touch any of it -
//! `validator::validate_header` only calls into `State` after a
//! candidate has cleared every hard-rejection rule.

use crate::alpha_tuner::AlphaState;
use crate::difficulty::DifficultyState;
use crate::nullifiers::NullifierSet;
use crate::policy::PolicyDocument;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct State {
    pub height: u64,
    pub theta: i64,
    pub alpha: AlphaState,
    pub difficulty: DifficultyState,
    pub nullifiers: NullifierSet,
}

impl State {
    /// Fresh state at genesis, with Θ seeded to the policy's target.
    pub fn genesis(policy: &PolicyDocument) -> Self {
        State {
            height: 0,
            theta: policy.difficulty.log_t_target,
            alpha: AlphaState::new(&policy.alpha),
            difficulty: DifficultyState::new(&policy.difficulty),
            nullifiers: NullifierSet::new(),
        }
    }
}
