//! Evaluator quality assessment.
//!
//! An evaluator's quality measures how closely their ballot matches the
//! global consensus restricted to the subset they actually saw:
//!
//! `Q = 1 − (2/(m·(m−1))) · Σ |R_i(f) − RelRank_G(f)|`
//!
//! where `RelRank_G` re-numbers the assigned proposals `1..m` in global-rank
//! order. The factor is the reciprocal of the maximum possible deviation sum,
//! so `Q ∈ [0, 1]` with 1 meaning perfect alignment.

use peerrank_domain::{Assignment, BallotEntry, ParticipantId, ProposalId, ProposalStanding};
use std::collections::{BTreeMap, HashMap};
use tracing::debug;

/// Relative ranks of the assigned proposals within the global ranking.
fn relative_ranks(
    assigned: &[ProposalId],
    global_rank: &HashMap<ProposalId, u32>,
) -> HashMap<ProposalId, u32> {
    let mut ranked: Vec<(ProposalId, u32)> = assigned
        .iter()
        .filter_map(|id| global_rank.get(id).map(|&rank| (*id, rank)))
        .collect();
    ranked.sort_by_key(|&(id, rank)| (rank, id));

    ranked
        .into_iter()
        .enumerate()
        .map(|(index, (id, _))| (id, (index + 1) as u32))
        .collect()
}

/// Score every evaluator with a completed assignment against the global
/// ranking. Evaluators without a completed ballot receive no score.
pub fn assess(
    standings: &[ProposalStanding],
    assignments: &[Assignment],
    ballots: &[BallotEntry],
    m: u32,
) -> BTreeMap<ParticipantId, f64> {
    let global_rank: HashMap<ProposalId, u32> = standings
        .iter()
        .map(|s| (s.proposal_id, s.global_rank))
        .collect();

    let mut by_voter: HashMap<ParticipantId, Vec<&BallotEntry>> = HashMap::new();
    for entry in ballots {
        by_voter.entry(entry.voter_id).or_default().push(entry);
    }

    let normaliser = 2.0 / (f64::from(m) * f64::from(m) - f64::from(m)).max(1.0);

    let mut qualities = BTreeMap::new();
    for assignment in assignments {
        if !assignment.completed {
            continue;
        }
        let Some(entries) = by_voter.get(&assignment.participant_id) else {
            continue;
        };

        let relative = relative_ranks(&assignment.proposal_ids, &global_rank);

        let deviation_sum: f64 = entries
            .iter()
            .filter_map(|entry| {
                relative
                    .get(&entry.proposal_id)
                    .map(|&rel| (f64::from(entry.rank_position) - f64::from(rel)).abs())
            })
            .sum();

        let quality = (1.0 - normaliser * deviation_sum).clamp(0.0, 1.0);
        qualities.insert(assignment.participant_id, quality);
    }

    debug!(evaluators = qualities.len(), "evaluator qualities computed");

    qualities
}

#[cfg(test)]
mod tests {
    use super::*;
    use peerrank_domain::{AssignmentId, EventId};
    use uuid::Uuid;

    fn pid(n: u128) -> ProposalId {
        ProposalId::from_uuid(Uuid::from_u128(n))
    }

    fn standing(id: ProposalId, rank: u32) -> ProposalStanding {
        ProposalStanding {
            proposal_id: id,
            author_id: ParticipantId::new(),
            filename: "p.pdf".into(),
            mbc_score: 0.0,
            global_rank: rank,
            adjusted_rank: rank,
            vote_count: 0,
            first_place_votes: 0,
            average_rank: 0.0,
            insufficient_evaluations: false,
        }
    }

    fn completed_assignment(
        event_id: EventId,
        voter: ParticipantId,
        proposals: Vec<ProposalId>,
    ) -> Assignment {
        let mut a = Assignment::new(event_id, voter, proposals);
        a.mark_completed(chrono::Utc::now());
        a
    }

    fn ballots_for(
        event_id: EventId,
        voter: ParticipantId,
        ranking: &[(ProposalId, u32)],
    ) -> Vec<BallotEntry> {
        let assignment_id = AssignmentId::new();
        ranking
            .iter()
            .map(|&(p, r)| BallotEntry::new(event_id, assignment_id, voter, p, r))
            .collect()
    }

    #[test]
    fn test_perfect_alignment_scores_one() {
        let event_id = EventId::new();
        let voter = ParticipantId::new();
        let standings = vec![standing(pid(1), 1), standing(pid(2), 2), standing(pid(3), 3)];
        let assignment = completed_assignment(event_id, voter, vec![pid(1), pid(2), pid(3)]);
        let ballots = ballots_for(event_id, voter, &[(pid(1), 1), (pid(2), 2), (pid(3), 3)]);

        let q = assess(&standings, &[assignment], &ballots, 3);
        assert!((q[&voter] - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_full_inversion_scores_zero() {
        // Reversing 3 items gives deviation sum 4 > m(m−1)/2 = 3; the
        // defensive clamp keeps the result at 0.
        let event_id = EventId::new();
        let voter = ParticipantId::new();
        let standings = vec![standing(pid(1), 1), standing(pid(2), 2), standing(pid(3), 3)];
        let assignment = completed_assignment(event_id, voter, vec![pid(1), pid(2), pid(3)]);
        let ballots = ballots_for(event_id, voter, &[(pid(1), 3), (pid(2), 2), (pid(3), 1)]);

        let q = assess(&standings, &[assignment], &ballots, 3);
        assert_eq!(q[&voter], 0.0);
    }

    #[test]
    fn test_relative_rank_restriction() {
        // Global ranks 2, 5, 9 restricted to the subset become 1, 2, 3.
        let event_id = EventId::new();
        let voter = ParticipantId::new();
        let standings = vec![
            standing(pid(1), 2),
            standing(pid(2), 5),
            standing(pid(3), 9),
        ];
        let assignment = completed_assignment(event_id, voter, vec![pid(1), pid(2), pid(3)]);
        // Voter agrees with the restricted order exactly.
        let ballots = ballots_for(event_id, voter, &[(pid(1), 1), (pid(2), 2), (pid(3), 3)]);

        let q = assess(&standings, &[assignment], &ballots, 3);
        assert!((q[&voter] - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_single_swap_quality() {
        // Swapping two adjacent items deviates by 2; Q = 1 − (2/6)·2 = 1/3
        // for m = 3.
        let event_id = EventId::new();
        let voter = ParticipantId::new();
        let standings = vec![standing(pid(1), 1), standing(pid(2), 2), standing(pid(3), 3)];
        let assignment = completed_assignment(event_id, voter, vec![pid(1), pid(2), pid(3)]);
        let ballots = ballots_for(event_id, voter, &[(pid(1), 2), (pid(2), 1), (pid(3), 3)]);

        let q = assess(&standings, &[assignment], &ballots, 3);
        assert!((q[&voter] - 1.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_incomplete_assignments_receive_no_quality() {
        let event_id = EventId::new();
        let voter = ParticipantId::new();
        let standings = vec![standing(pid(1), 1), standing(pid(2), 2)];
        let assignment = Assignment::new(event_id, voter, vec![pid(1), pid(2)]);
        let ballots = ballots_for(event_id, voter, &[(pid(1), 1), (pid(2), 2)]);

        let q = assess(&standings, &[assignment], &ballots, 2);
        assert!(q.is_empty());
    }
}
