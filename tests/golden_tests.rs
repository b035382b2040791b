//! Golden scenario tests - the concrete acceptance scenarios this
//! kernel's behavior is pinned against.
//!
//! These are not hash-frozen vectors (the policy document and its root
//! are constructed in-test, not shipped as a frozen binary blob) but
//! they pin the *semantics* of each scenario: a regression here means a
//! behavior change, not a cosmetic diff.

use poies_consensus::alpha_tuner::AlphaState;
use poies_consensus::fork_choice::{self, ChainTip};
use poies_consensus::policy::testutil::default_policy;
use poies_consensus::policy::{self, ForkChoiceMode};
use poies_consensus::state::State;
use poies_consensus::types::{
    Header, ProofEnvelope, ProofMetrics, ProofType, RejectReason, Verdict, CODEC_VERSION,
};
use poies_consensus::validator::validate_header;

fn header_at(policy: &poies_consensus::policy::PolicyDocument, height: u64, theta: i64, u_seed: [u8; 32]) -> Header {
    Header {
        codec_version: CODEC_VERSION,
        parent_hash: [0u8; 32],
        height,
        chain_id: 1,
        theta,
        u_seed,
        proofs_commitment: [0u8; 32],
        proofs_root: [0u8; 32],
        share_receipts_root: [0u8; 32],
        alg_policy_root: [0u8; 32],
        policy_root: policy::policy_root(policy).unwrap(),
        aux: Vec::new(),
    }
}

/// Scenario 1: a single HashShare proof (ψ_pre = 0) is accepted purely
/// on `H(u)`, the sole contribution to its score.
#[test]
fn test_scenario_baseline_accept_hashshare_only() {
    let policy = default_policy();
    let mut state = State::genesis(&policy);
    let header = header_at(&policy, 1, state.theta, [7u8; 32]);
    let envelopes = vec![ProofEnvelope {
        metrics: ProofMetrics::HashShare { shares: 1 },
        nullifier: [1u8; 32],
        index: 0,
    }];

    let verdict = validate_header(&header, &envelopes, &policy, [0u8; 32], &mut state).unwrap();
    match verdict {
        Verdict::Accept { receipt } => {
            assert_eq!(receipt.breakdown.score, receipt.breakdown.h_u);
            assert!(receipt.breakdown.h_u > 0);
        }
        other => panic!("expected accept, got {:?}", other),
    }
}

/// Scenario 2: an AI proof whose raw ψ exceeds Γ_AI is accepted with
/// its contribution clipped to the cap, and `CAP_EXCEEDED` recorded.
#[test]
fn test_scenario_cap_clipping_to_gamma_ai() {
    let policy = default_policy();
    let mut state = State::genesis(&policy);
    let header = header_at(&policy, 1, state.theta, [3u8; 32]);
    let envelopes = vec![ProofEnvelope {
        metrics: ProofMetrics::Ai {
            quality_bp: 10_000,
            compute_units: 1_000_000,
        },
        nullifier: [1u8; 32],
        index: 0,
    }];

    let verdict = validate_header(&header, &envelopes, &policy, [0u8; 32], &mut state).unwrap();
    match verdict {
        Verdict::Accept { receipt } => {
            let (pre, post) = receipt.breakdown.psi_by_type[&ProofType::Ai];
            assert!(pre > post);
            assert_eq!(post, policy.caps.per_type[&ProofType::Ai]);
            assert!(receipt
                .breakdown
                .rules_fired
                .contains(poies_consensus::RuleFlags::CAP_EXCEEDED));
        }
        other => panic!("expected accept with clipping, got {:?}", other),
    }
}

/// Scenario 3: a Quantum proof whose share of the block exceeds the
/// escort soft threshold, with no Storage/VDF escort present, is
/// rejected.
#[test]
fn test_scenario_escort_missing_rejection() {
    let policy = default_policy();
    let mut state = State::genesis(&policy);
    let header = header_at(&policy, 1, state.theta, [3u8; 32]);
    let envelopes = vec![ProofEnvelope {
        metrics: ProofMetrics::Quantum {
            fidelity_bp: 10_000,
            qubits: 100,
        },
        nullifier: [1u8; 32],
        index: 0,
    }];

    let verdict = validate_header(&header, &envelopes, &policy, [0u8; 32], &mut state).unwrap();
    assert!(matches!(
        verdict,
        Verdict::Reject {
            reason: RejectReason::EscortMissing { .. },
            ..
        }
    ));
    assert_eq!(state.height, 0);
}

/// Scenario 4: replaying a nullifier already consumed at an earlier
/// height is rejected, reporting that earlier height.
#[test]
fn test_scenario_nullifier_reuse_rejection() {
    let policy = default_policy();
    let mut state = State::genesis(&policy);
    let nullifier = [9u8; 32];

    let header1 = header_at(&policy, 1, state.theta, [1u8; 32]);
    let envelopes = vec![ProofEnvelope {
        metrics: ProofMetrics::HashShare { shares: 1 },
        nullifier,
        index: 0,
    }];
    let first = validate_header(&header1, &envelopes, &policy, [0u8; 32], &mut state).unwrap();
    assert!(matches!(first, Verdict::Accept { .. }));

    let header2 = header_at(&policy, 2, state.theta, [2u8; 32]);
    let second = validate_header(&header2, &envelopes, &policy, [0u8; 32], &mut state).unwrap();
    match second {
        Verdict::Reject {
            reason: RejectReason::NullifierReuse { first_height, .. },
            ..
        } => assert_eq!(first_height, 1),
        other => panic!("expected nullifier reuse rejection, got {:?}", other),
    }
}

/// Scenario 5: Θ retargets downward across a run of slow blocks (large
/// `H(u)` draws), and the retargeted value is used as the next block's
/// required threshold.
#[test]
fn test_scenario_theta_retargets_under_slow_blocks() {
    let mut policy = default_policy();
    policy.difficulty.ring_len = 4;
    policy.difficulty.k_num = 1;
    policy.difficulty.k_den = 4;
    let mut state = State::genesis(&policy);
    let initial_theta = state.theta;

    for height in 1..=5u64 {
        let mut seed = [0u8; 32];
        seed[0] = height as u8;
        let header = header_at(&policy, height, state.theta, seed);
        let envelopes = vec![ProofEnvelope {
            metrics: ProofMetrics::HashShare { shares: 1 },
            nullifier: [height as u8; 32],
            index: 0,
        }];
        let verdict =
            validate_header(&header, &envelopes, &policy, [0u8; 32], &mut state).unwrap();
        assert!(matches!(verdict, Verdict::Accept { .. }), "height {}", height);
    }

    assert_ne!(
        state.theta, initial_theta,
        "theta should have retargeted after a full ring of observations"
    );
}

/// Scenario 6: two competing tips at the same height and weighted score
/// are deterministically resolved by the lexicographically smaller
/// header hash.
#[test]
fn test_scenario_fork_choice_tiebreak_by_smaller_hash() {
    let mut a_hash = [0xffu8; 32];
    a_hash[0] = 0x01;
    let mut b_hash = [0xffu8; 32];
    b_hash[0] = 0x02;

    let tip_a = ChainTip {
        height: 100,
        header_hash: a_hash,
        weighted_score: 500,
    };
    let tip_b = ChainTip {
        height: 100,
        header_hash: b_hash,
        weighted_score: 500,
    };

    let config = poies_consensus::policy::ForkChoiceConfig {
        mode: ForkChoiceMode::HeightThenWeightedScore,
        weighted_ancestors: 8,
    };
    let best = fork_choice::best_of(&[tip_a.clone(), tip_b.clone()], &config).unwrap();
    assert_eq!(best.header_hash, a_hash, "smaller header hash must win the tie");
}

#[test]
fn test_alpha_state_scale_stable_without_retarget() {
    let policy = default_policy();
    let state = AlphaState::new(&policy.alpha);
    let s1 = state.scale(ProofType::Ai);
    let s2 = state.scale(ProofType::Ai);
    assert_eq!(s1, s2);
}
