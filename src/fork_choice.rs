//! Deterministic fork choice (`spec.md` §4.9, Invariant G).
//!
//! Height is primary. Under `HeightThenWeightedScore`, a tie at the same
//! height is broken by the summed score over the last
//! `weighted_ancestors` blocks; `HeightOnly` skips straight to the final
//! tiebreak. The final tiebreak is always the lexicographically smaller
//! header hash, so two honest nodes that received the same two
//! competing tips always converge on the same one.

use crate::policy::{ForkChoiceConfig, ForkChoiceMode};
use std::cmp::Ordering;

/// One candidate chain tip as seen by fork choice.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainTip {
    pub height: u64,
    pub header_hash: [u8; 32],
    /// Sum of `Breakdown::score` over the last `weighted_ancestors`
    /// blocks ending at this tip. Ignored under `HeightOnly`; callers
    /// may pass `0` in that mode.
    pub weighted_score: i64,
}

/// Total order over tips: `Ordering::Greater` means `a` is preferred
/// over `b`.
pub fn compare(a: &ChainTip, b: &ChainTip, config: &ForkChoiceConfig) -> Ordering {
    match a.height.cmp(&b.height) {
        Ordering::Equal => {}
        other => return other,
    }

    if config.mode == ForkChoiceMode::HeightThenWeightedScore {
        match a.weighted_score.cmp(&b.weighted_score) {
            Ordering::Equal => {}
            other => return other,
        }
    }

    // Final tiebreak: smaller hash wins, so flip the natural byte-order
    // comparison to express "preferred".
    b.header_hash.cmp(&a.header_hash)
}

/// The single preferred tip among `tips`, or `None` if `tips` is empty.
pub fn best_of<'a>(tips: &'a [ChainTip], config: &ForkChoiceConfig) -> Option<&'a ChainTip> {
    tips.iter()
        .fold(None, |best: Option<&ChainTip>, candidate| match best {
            None => Some(candidate),
            Some(current) => {
                if compare(candidate, current, config) == Ordering::Greater {
                    Some(candidate)
                } else {
                    Some(current)
                }
            }
        })
}
