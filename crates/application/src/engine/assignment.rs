//! Assignment generation: who evaluates what.
//!
//! Two-phase balanced random algorithm over an `n×k` matrix. Phase 1 walks a
//! random permutation of participants per proposal until the coverage quota
//! is met; Phase 2 fills every participant up to exactly `m` proposals. A
//! participant is never assigned their own proposal.
//!
//! The RNG is seeded explicitly so a recorded seed reproduces the batch
//! bit-for-bit: the `u64` seed goes little-endian into the first 8 bytes of
//! the ChaCha20 seed, the rest stay zero.

use peerrank_domain::errors::{AppError, AppResult, InfeasibilityError};
use peerrank_domain::{Assignment, EventId, ParticipantId, Proposal, VotingConfiguration};
use rand::seq::SliceRandom;
use rand_chacha::rand_core::SeedableRng;
use rand_chacha::ChaCha20Rng;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// A generated assignment batch together with the seed that produced it.
#[derive(Debug)]
pub struct AssignmentPlan {
    /// Seed the batch was generated from; persisting it makes the run
    /// reproducible for audit
    pub seed: u64,
    /// One assignment per participant, each with exactly `m` proposals
    pub assignments: Vec<Assignment>,
}

fn rng_from_seed(seed: u64) -> ChaCha20Rng {
    let mut seed32 = [0u8; 32];
    seed32[..8].copy_from_slice(&seed.to_le_bytes());
    ChaCha20Rng::from_seed(seed32)
}

/// Generate assignments for every participant.
///
/// Inputs are re-sorted by id internally so the output depends only on the
/// id sets and the seed, not on storage ordering.
pub fn generate(
    event_id: EventId,
    participants: &[ParticipantId],
    proposals: &[Proposal],
    config: &VotingConfiguration,
    seed: u64,
    cancel: &CancellationToken,
) -> AppResult<AssignmentPlan> {
    let mut participants: Vec<ParticipantId> = participants.to_vec();
    participants.sort();
    let mut proposals: Vec<&Proposal> = proposals.iter().collect();
    proposals.sort_by_key(|p| p.id);

    let n = participants.len();
    let k = proposals.len();
    let m = config.attachments_per_evaluator as usize;
    let min_evals = config.min_evaluations_per_file as usize;

    let mut rng = rng_from_seed(seed);

    // assign[i][j]: participant i evaluates proposal j
    let mut assign = vec![vec![false; k]; n];
    let mut load = vec![0usize; n];
    let mut evals_per_proposal = vec![0usize; k];

    let conflicts = |i: usize, j: usize| proposals[j].author_id == participants[i];

    // Phase 1: coverage. Walk a fresh permutation of participants for every
    // proposal until the quota is met or the permutation is exhausted.
    for j in 0..k {
        if cancel.is_cancelled() {
            return Err(AppError::Cancelled {
                operation: "generate assignments".into(),
            });
        }

        let mut order: Vec<usize> = (0..n).collect();
        order.shuffle(&mut rng);

        for &i in &order {
            if evals_per_proposal[j] >= min_evals {
                break;
            }
            if conflicts(i, j) || assign[i][j] || load[i] >= m {
                continue;
            }
            assign[i][j] = true;
            load[i] += 1;
            evals_per_proposal[j] += 1;
        }

        if evals_per_proposal[j] < min_evals {
            return Err(InfeasibilityError::CoverageUnreachable(proposals[j].id).into());
        }
    }

    // Phase 2: fill every participant to exactly m.
    for i in 0..n {
        if cancel.is_cancelled() {
            return Err(AppError::Cancelled {
                operation: "generate assignments".into(),
            });
        }

        if load[i] >= m {
            continue;
        }

        let mut order: Vec<usize> = (0..k).collect();
        order.shuffle(&mut rng);

        for &j in &order {
            if load[i] >= m {
                break;
            }
            if assign[i][j] || conflicts(i, j) {
                continue;
            }
            assign[i][j] = true;
            load[i] += 1;
            evals_per_proposal[j] += 1;
        }

        if load[i] < m {
            return Err(InfeasibilityError::AssignmentShortfall {
                participant: participants[i],
                shortfall: (m - load[i]) as u32,
            }
            .into());
        }
    }

    let assignments = participants
        .iter()
        .enumerate()
        .map(|(i, &participant_id)| {
            let proposal_ids = (0..k)
                .filter(|&j| assign[i][j])
                .map(|j| proposals[j].id)
                .collect();
            Assignment::new(event_id, participant_id, proposal_ids)
        })
        .collect();

    debug!(
        event_id = %event_id,
        participants = n,
        proposals = k,
        seed,
        "assignment batch generated"
    );

    Ok(AssignmentPlan { seed, assignments })
}
