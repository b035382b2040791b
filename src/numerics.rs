//! Fixed-point arithmetic for the consensus path.
//!
//! No floating point anywhere below this line. All log-space values are
//! i64 "μ-nats" (10⁻⁶ nats); all ratios are Q32.32 signed fixed-point
//! (32 integer bits, 32 fractional bits, stored in an i64). Every
//! rounding rule is floor-toward-negative-infinity unless documented
//! otherwise, and every arithmetic op that can overflow is checked and
//! surfaces `ConsensusError::NumericOverflow` rather than panicking or
//! wrapping.

use crate::errors::{ConsensusError, Result};

/// Fractional bits of a Q32.32 value.
pub const Q_FRAC_BITS: u32 = 32;

/// `1.0` in Q32.32.
pub const Q_ONE: i64 = 1i64 << Q_FRAC_BITS;

/// A signed Q32.32 fixed-point number, stored as a raw i64.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Q32_32(pub i64);

impl Q32_32 {
    pub const ONE: Q32_32 = Q32_32(Q_ONE);
    pub const ZERO: Q32_32 = Q32_32(0);

    /// Build `num / den` as Q32.32, floor rounding. `den` must be > 0.
    pub fn from_ratio(num: i64, den: i64) -> Result<Q32_32> {
        if den <= 0 {
            return Err(ConsensusError::NumericOverflow {
                op: "from_ratio:den<=0".into(),
            });
        }
        let scaled = (num as i128) << Q_FRAC_BITS;
        let q = scaled.div_euclid(den as i128);
        if q > i64::MAX as i128 || q < i64::MIN as i128 {
            return Err(ConsensusError::NumericOverflow {
                op: "from_ratio:overflow".into(),
            });
        }
        Ok(Q32_32(q as i64))
    }

    /// Truncate the fractional part, returning the integer part (floor).
    pub fn to_i64_floor(self) -> i64 {
        self.0 >> Q_FRAC_BITS
    }

    /// Multiply two Q32.32 values with floor rounding, checked overflow.
    pub fn mul_q(self, other: Q32_32) -> Result<Q32_32> {
        let product = (self.0 as i128) * (other.0 as i128);
        let shifted = product >> Q_FRAC_BITS;
        if shifted > i64::MAX as i128 || shifted < i64::MIN as i128 {
            return Err(ConsensusError::NumericOverflow {
                op: "mul_q:overflow".into(),
            });
        }
        Ok(Q32_32(shifted as i64))
    }

    /// Convert a Q32.32 ratio into μ-nats by multiplying with a
    /// μ-nat-valued scale already expressed as a plain i64 (used to
    /// rescale ψ contributions that start life as ratios).
    pub fn to_mu_nats(self, scale_mu: i64) -> Result<i64> {
        let scaled = (self.0 as i128) * (scale_mu as i128);
        let floor_div = scaled.div_euclid(Q_ONE as i128);
        if floor_div > i64::MAX as i128 || floor_div < i64::MIN as i128 {
            return Err(ConsensusError::NumericOverflow {
                op: "to_mu_nats:overflow".into(),
            });
        }
        Ok(floor_div as i64)
    }
}

/// Checked saturating add: saturates at i64::MAX/MIN and reports the
/// saturation as an error rather than silently clamping, so callers in
/// the consensus path can decide whether a clamp is acceptable.
pub fn checked_add(a: i64, b: i64) -> Result<i64> {
    a.checked_add(b).ok_or(ConsensusError::NumericOverflow {
        op: "add".into(),
    })
}

pub fn checked_sub(a: i64, b: i64) -> Result<i64> {
    a.checked_sub(b).ok_or(ConsensusError::NumericOverflow {
        op: "sub".into(),
    })
}

pub fn checked_mul(a: i64, b: i64) -> Result<i64> {
    a.checked_mul(b).ok_or(ConsensusError::NumericOverflow {
        op: "mul".into(),
    })
}

/// Clamp `x` into `[lo, hi]`. `lo` must be <= `hi`.
pub fn clamp(x: i64, lo: i64, hi: i64) -> i64 {
    debug_assert!(lo <= hi);
    x.max(lo).min(hi)
}

/// Linear interpolation in μ-nat space with floor rounding:
/// `a + (b - a) * w_num / w_den`, `w_den` must be > 0.
pub fn lerp_mu(a: i64, b: i64, w_num: i64, w_den: i64) -> Result<i64> {
    if w_den <= 0 {
        return Err(ConsensusError::NumericOverflow {
            op: "lerp_mu:w_den<=0".into(),
        });
    }
    let delta = (b as i128) - (a as i128);
    let term = delta * (w_num as i128);
    let floor_term = term.div_euclid(w_den as i128);
    let result = (a as i128) + floor_term;
    if result > i64::MAX as i128 || result < i64::MIN as i128 {
        return Err(ConsensusError::NumericOverflow {
            op: "lerp_mu:overflow".into(),
        });
    }
    Ok(result as i64)
}

/// Number of fixed-point series terms used by `ln_neg_mu`'s Mercator
/// series, applied AFTER range reduction brings its argument into
/// `[0.5, 1)` (so the series ratio is never worse than 0.5). Thirty
/// terms bound the truncation error to well under 1 μ-nat anywhere in
/// that reduced range (see the proptest `prop_ln_neg_mu_error_bound` in
/// this module, which samples the full domain `u ∈ (0, 1]`).
const LN_SERIES_TERMS: u32 = 30;

/// `ln(2)` as a Q32.32 raw value (`0xB17217F7`, floor-rounded), used to
/// re-assemble `H(u)` from the range-reduced series result.
const LN2_Q32_32: i64 = 2_977_044_471;

/// `H(u) = -ln(u)` in μ-nats, for `u` a Q32.32 value in `(0, 1]`.
///
/// Evaluating the Mercator series `-ln(u) = Σ (1-u)^n / n` directly on
/// `u` only converges quickly when `u` is close to 1: for small `u`
/// (which `scorer::derive_u` produces routinely, not as a rare edge
/// case - any digest with a zero-heavy top 32 bits maps there) the
/// series ratio `(1-u)` approaches 1 and a fixed term count leaves an
/// error far past the 1 μ-nat bound `spec.md` §4.1 requires.
///
/// Range reduction fixes this: write `u = m * 2^-k` with `m` in
/// `[0.5, 1)`, found by left-shifting `u`'s raw value until its
/// highest set bit sits at the Q32.32 "one half" position. Then
/// `H(u) = H(m) + k * ln(2)`, and `H(m)`'s series always has ratio
/// `(1-m) <= 0.5`, so it converges in a bounded number of terms
/// regardless of how small the original `u` was.
pub fn ln_neg_mu(u: Q32_32) -> Result<i64> {
    if u.0 <= 0 || u.0 > Q_ONE {
        return Err(ConsensusError::NumericOverflow {
            op: "ln_neg_mu:domain".into(),
        });
    }
    if u.0 == Q_ONE {
        return Ok(0);
    }

    // u.0 is in [1, Q_ONE - 1]; find k so that (u.0 << k) lands with its
    // highest set bit at position 31, i.e. in [Q_ONE/2, Q_ONE).
    let bits = 64 - (u.0 as u64).leading_zeros() as i64; // in [1, 32]
    let k = 32 - bits;
    let m = Q32_32(u.0 << k);

    let one_minus_m = Q32_32(Q_ONE - m.0);
    let mut term = one_minus_m; // (1-m)^1
    let mut sum_q = Q32_32::ZERO;

    for n in 1..=LN_SERIES_TERMS as i64 {
        let contribution = Q32_32::from_ratio(term.0, n)?;
        sum_q = Q32_32(checked_add(sum_q.0, contribution.0)?);
        if n < LN_SERIES_TERMS as i64 {
            term = term.mul_q(one_minus_m)?;
        }
    }

    // sum_q is -ln(m) in Q32.32 nats; add back k * ln(2) before the
    // single final rescale to μ-nats, so rounding happens once.
    let k_ln2 = checked_mul(k, LN2_Q32_32)?;
    let total = checked_add(k_ln2, sum_q.0)?;
    Q32_32(total).to_mu_nats(1_000_000)
}
