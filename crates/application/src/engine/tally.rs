//! Modified Borda Count aggregation.
//!
//! Reconstructs the global ranking `G` from partial ballots. Each ballot
//! contributes only to the proposals it covers, and scores are normalised by
//! `m·(m−1)` so a single ballot's maximum contribution per proposal is 1
//! regardless of `m`.
//!
//! Ordering is fully deterministic: MBC descending, then first-place votes
//! descending, then proposal id ascending. Determinism here is a correctness
//! requirement because the quality scores are derived from this order.

use peerrank_domain::{BallotEntry, Proposal, ProposalStanding, VotingConfiguration};
use std::collections::HashMap;
use tracing::debug;

/// Compute MBC scores and the global ranking for all proposals of an event.
///
/// Proposals with zero received votes score 0 and are flagged
/// `insufficient_evaluations` when their vote count is below
/// `min_evaluations_per_file`.
pub fn rank_proposals(
    proposals: &[Proposal],
    ballots: &[BallotEntry],
    config: &VotingConfiguration,
) -> Vec<ProposalStanding> {
    let m = f64::from(config.attachments_per_evaluator);
    // m = 1 carries no ordinal information; the guard keeps the score at 0
    // instead of dividing by zero.
    let denominator = (m * (m - 1.0)).max(1.0);

    let mut by_proposal: HashMap<_, Vec<&BallotEntry>> = HashMap::new();
    for entry in ballots {
        by_proposal.entry(entry.proposal_id).or_default().push(entry);
    }

    let mut standings: Vec<ProposalStanding> = proposals
        .iter()
        .map(|proposal| {
            let received = by_proposal.get(&proposal.id).map_or(&[][..], Vec::as_slice);
            let vote_count = received.len() as u32;

            // Rank 1 (best) is worth m−1 points, rank m is worth 0.
            let borda_sum: f64 = received
                .iter()
                .map(|entry| m - f64::from(entry.rank_position))
                .sum();
            let mbc_score = (borda_sum / denominator).clamp(0.0, 1.0);

            let first_place_votes =
                received.iter().filter(|entry| entry.rank_position == 1).count() as u32;

            let average_rank = if vote_count > 0 {
                received
                    .iter()
                    .map(|entry| f64::from(entry.rank_position))
                    .sum::<f64>()
                    / f64::from(vote_count)
            } else {
                0.0
            };

            ProposalStanding {
                proposal_id: proposal.id,
                author_id: proposal.author_id,
                filename: proposal.filename.clone(),
                mbc_score,
                global_rank: 0,
                adjusted_rank: 0,
                vote_count,
                first_place_votes,
                average_rank,
                insufficient_evaluations: vote_count < config.min_evaluations_per_file,
            }
        })
        .collect();

    standings.sort_by(|a, b| {
        b.mbc_score
            .total_cmp(&a.mbc_score)
            .then_with(|| b.first_place_votes.cmp(&a.first_place_votes))
            .then_with(|| a.proposal_id.cmp(&b.proposal_id))
    });

    for (index, standing) in standings.iter_mut().enumerate() {
        standing.global_rank = (index + 1) as u32;
        standing.adjusted_rank = standing.global_rank;
    }

    debug!(proposals = standings.len(), ballots = ballots.len(), "global ranking computed");

    standings
}
