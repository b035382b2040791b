//! Typed error definitions for the PoIES consensus kernel.
//!
//! NO PANICS on the consensus path - every failure is a typed, recoverable
//! value. Defense-in-depth: explicit error codes for observability and
//! debugging by the surrounding node, which is the only layer allowed to
//! log or alert on these.

use thiserror::Error;

/// Result type alias for consensus operations.
pub type Result<T> = std::result::Result<T, ConsensusError>;

/// Policy-layer rejection reasons (caps, escort, diversity, roots).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PolicyError {
    #[error("type cap exceeded: type={proof_type}, psi={psi}, cap={cap}")]
    CapExceeded {
        proof_type: String,
        psi: i64,
        cap: i64,
    },

    #[error("escort requirement unmet for type={proof_type}, share_bp={share_bp}, threshold_bp={threshold_bp}")]
    EscortMissing {
        proof_type: String,
        share_bp: i64,
        threshold_bp: i64,
    },

    #[error("diversity requirement unmet: distinct_types={distinct}, required={required}")]
    DiversityFail { distinct: usize, required: usize },

    #[error("policy root mismatch: header={header}, loaded={loaded}")]
    PolicyRootMismatch { header: String, loaded: String },

    #[error("alg-policy root mismatch: header={header}, loaded={loaded}")]
    AlgPolicyRootMismatch { header: String, loaded: String },

    #[error("invalid policy document: {reason}")]
    InvalidDocument { reason: String },
}

/// Θ-retargeting failures.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ThetaScheduleError {
    #[error("interval ring buffer underflow: have={have}, need={need}")]
    WindowUnderflow { have: usize, need: usize },

    #[error("retargeted logT out of range: value={value}, min={min}, max={max}")]
    OutOfRange { value: i64, min: i64, max: i64 },

    #[error("theta mismatch: header={header}, state={state}")]
    ThetaMismatch { header: i64, state: i64 },
}

/// Replay-protection failure: a nullifier was already observed.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("nullifier reuse: nullifier={nullifier}, first_height={first_height}")]
pub struct NullifierReuseError {
    pub nullifier: String,
    pub first_height: u64,
}

/// Root error type for the consensus kernel. Every public entry point
/// returns `Result<_, ConsensusError>`; no panics, no unwraps, on any
/// path reachable from validation.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConsensusError {
    #[error("policy error: {0}")]
    Policy(#[from] PolicyError),

    #[error("theta schedule error: {0}")]
    ThetaSchedule(#[from] ThetaScheduleError),

    #[error("nullifier reuse error: {0}")]
    NullifierReuse(#[from] NullifierReuseError),

    #[error("schema error: field={field}, reason={reason}")]
    Schema { field: String, reason: String },

    #[error("numeric overflow: op={op}")]
    NumericOverflow { op: String },

    #[error("encoding error: {reason}")]
    Encoding { reason: String },
}

impl ConsensusError {
    /// Error code for monitoring and alerting by the surrounding node.
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Policy(PolicyError::CapExceeded { .. }) => "E1000",
            Self::Policy(PolicyError::EscortMissing { .. }) => "E1001",
            Self::Policy(PolicyError::DiversityFail { .. }) => "E1002",
            Self::Policy(PolicyError::PolicyRootMismatch { .. }) => "E1003",
            Self::Policy(PolicyError::AlgPolicyRootMismatch { .. }) => "E1004",
            Self::Policy(PolicyError::InvalidDocument { .. }) => "E1005",

            Self::ThetaSchedule(ThetaScheduleError::WindowUnderflow { .. }) => "E2000",
            Self::ThetaSchedule(ThetaScheduleError::OutOfRange { .. }) => "E2001",
            Self::ThetaSchedule(ThetaScheduleError::ThetaMismatch { .. }) => "E2002",

            Self::NullifierReuse(_) => "E3000",

            Self::Schema { .. } => "E4000",
            Self::NumericOverflow { .. } => "E5000",
            Self::Encoding { .. } => "E6000",
        }
    }

    /// Fatal programming invariants that must never mutate state even
    /// partially - the validator treats these identically to a rejection
    /// but the surrounding node should treat them as more serious.
    pub fn is_fatal_invariant(&self) -> bool {
        matches!(self, Self::NumericOverflow { .. } | Self::Encoding { .. })
    }

    /// Whether the candidate header was structurally rejected vs.
    /// consensus-internally malformed input.
    pub fn is_rejection(&self) -> bool {
        matches!(
            self,
            Self::Policy(_) | Self::ThetaSchedule(_) | Self::NullifierReuse(_) | Self::Schema { .. }
        )
    }
}
