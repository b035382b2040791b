//! PoIES Consensus Kernel - Deterministic Block-Acceptance Logic
//!
//! This crate implements the consensus-critical acceptance rules for
//! Proof-of-Integrated-External-Services (PoIES) blocks: given a
//! candidate header, its attached proof envelopes, and the governing
//! policy, it produces a `Verdict` - accept or reject, with a full
//! breakdown of how the score was reached.
//!
//! # Architecture
//!
//! - **numerics**: Q32.32 fixed-point arithmetic and the μ-nat
//!   log-space primitives (`H(u) = -ln(u)`)
//! - **hash**: the single H3_256 (SHA3-256) hash primitive
//! - **encoding**: canonical CBOR encoding and domain-separated hashing
//!   (`SignBytes`/`hash`)
//! - **types**: canonical consensus data structures
//! - **policy**: the validated policy document and its canonical root
//! - **merkle**: deterministic Merkle tree construction
//! - **caps**: per-type/total ψ cap clipping, escort, diversity
//! - **alpha_tuner**: windowed per-type α scaling correction
//! - **difficulty**: EMA-based Θ retargeting
//! - **nullifiers**: sliding-window replay protection
//! - **share_receipts**: share-receipt Merkle aggregation
//! - **fork_choice**: deterministic chain-tip selection
//! - **scorer**: the pure per-candidate scoring pipeline
//! - **state**: mutable consensus state, owned by `validator`
//! - **validator**: the top-level `validate_header` entry point
//! - **errors**: typed error handling (no panics in consensus)
//!
//! # Quality Gates
//!
//! - Determinism: identical inputs (header, proofs, policy, state)
//!   always produce identical verdicts, independent of platform or
//!   call history.
//! - No panics: every fallible operation on the consensus path returns
//!   `Result<_, ConsensusError>`.
//! - No floating point on the consensus path: every score, cap, and
//!   threshold is computed in integer μ-nats or Q32.32 fixed point.
//!
//! # Usage
//!
//! ```rust
//! use poies_consensus::policy::testutil::default_policy;
//! use poies_consensus::state::State;
//! use poies_consensus::types::{Header, ProofEnvelope, ProofMetrics, CODEC_VERSION};
//! use poies_consensus::validator::validate_header;
//!
//! let policy = default_policy();
//! let mut state = State::genesis(&policy);
//! let header = Header {
//!     codec_version: CODEC_VERSION,
//!     parent_hash: [0u8; 32],
//!     height: 1,
//!     chain_id: 1,
//!     theta: state.theta,
//!     u_seed: [7u8; 32],
//!     proofs_commitment: [0u8; 32],
//!     proofs_root: [0u8; 32],
//!     share_receipts_root: [0u8; 32],
//!     alg_policy_root: [0u8; 32],
//!     policy_root: poies_consensus::policy::policy_root(&policy)?,
//!     aux: Vec::new(),
//! };
//! let envelopes = vec![ProofEnvelope {
//!     metrics: ProofMetrics::HashShare { shares: 1 },
//!     nullifier: [1u8; 32],
//!     index: 0,
//! }];
//! let verdict = validate_header(&header, &envelopes, &policy, [0u8; 32], &mut state)?;
//! # Ok::<(), poies_consensus::errors::ConsensusError>(())
//! ```

pub mod alpha_tuner;
pub mod caps;
pub mod difficulty;
pub mod encoding;
pub mod errors;
pub mod fork_choice;
pub mod hash;
pub mod merkle;
pub mod nullifiers;
pub mod numerics;
pub mod policy;
pub mod scorer;
pub mod share_receipts;
pub mod state;
pub mod types;
pub mod validator;

pub use errors::{ConsensusError, Result};
pub use types::{
    AcceptanceReceipt, Breakdown, Header, ProofEnvelope, ProofMetrics, ProofType, RejectReason,
    RuleFlags, ShareReceipt, Verdict, CODEC_VERSION,
};

/// Library version (matches `Cargo.toml`).
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name.
pub const NAME: &str = env!("CARGO_PKG_NAME");

/// Version info string, useful for diagnostics logged by the
/// surrounding node.
pub fn version_info() -> String {
    format!("{} v{} (codec v{})", NAME, VERSION, CODEC_VERSION)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_info() {
        let info = version_info();
        assert!(info.contains("poies-consensus"));
    }
}
