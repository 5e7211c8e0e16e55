//! Entity builders for tests.
//!
//! Small helpers that produce valid domain values plus the ballot
//! constructions the end-to-end voting scenarios are built from.

use chrono::{Duration, Utc};
use peerrank_domain::{
    Assignment, BallotEntry, Event, EventId, Participant, ParticipantId, Proposal, ProposalId,
    Role, VotingConfiguration,
};

/// A participant with a derived unique e-mail.
pub fn participant(name: &str) -> Participant {
    let id = ParticipantId::new();
    Participant::new(name, "Tester", format!("{name}-{id}@example.com"))
}

/// An admin participant.
pub fn admin(name: &str) -> Participant {
    let id = ParticipantId::new();
    Participant::with_role(name, "Admin", format!("{name}-{id}@example.com"), Role::Admin)
}

/// An event in the `Creation` stage authored by the given participant.
pub fn event(author_id: ParticipantId) -> Event {
    let now = Utc::now();
    Event::new(
        "Allocation round",
        "Peer evaluation fixture event",
        author_id,
        now,
        now + Duration::days(14),
    )
}

/// A proposal owned by the given author.
pub fn proposal(event_id: EventId, author_id: ParticipantId) -> Proposal {
    Proposal::new(event_id, author_id, "proposal.pdf", 2048, "application/pdf")
}

/// A configuration with thresholds wide enough that only extreme evaluators
/// are adjusted.
pub fn configuration(event_id: EventId, m: u32, min_evals: u32, magnitude: u32) -> VotingConfiguration {
    let mut config = VotingConfiguration::new(event_id, m);
    config.min_evaluations_per_file = min_evals;
    config.quality_good_threshold = 0.8;
    config.quality_bad_threshold = 0.2;
    config.adjustment_magnitude = magnitude;
    config
}

/// A completed assignment together with the ballot entries ranking the
/// assigned proposals in the given order (first = rank 1).
pub fn completed_ballot(
    event_id: EventId,
    voter_id: ParticipantId,
    ranked_proposals: &[ProposalId],
) -> (Assignment, Vec<BallotEntry>) {
    let mut assignment = Assignment::new(event_id, voter_id, ranked_proposals.to_vec());
    assignment.mark_completed(Utc::now());

    let entries = ranked_proposals
        .iter()
        .enumerate()
        .map(|(index, &proposal_id)| {
            BallotEntry::new(
                event_id,
                assignment.id,
                voter_id,
                proposal_id,
                (index + 1) as u32,
            )
        })
        .collect();

    (assignment, entries)
}

/// Ballots for the unanimous scenario: every evaluator ranks the proposals
/// they saw consistently with one shared preference order.
///
/// Participant `i` owns proposal `i` and evaluates all others.
pub fn unanimous_round(
    event_id: EventId,
    participants: &[ParticipantId],
    proposals: &[Proposal],
) -> (Vec<Assignment>, Vec<BallotEntry>) {
    let mut assignments = Vec::new();
    let mut ballots = Vec::new();

    for &voter in participants {
        let subset: Vec<ProposalId> = proposals
            .iter()
            .filter(|p| p.author_id != voter)
            .map(|p| p.id)
            .collect();
        let (assignment, entries) = completed_ballot(event_id, voter, &subset);
        assignments.push(assignment);
        ballots.push(entries);
    }

    (assignments, ballots.into_iter().flatten().collect())
}

/// Ballots for the rotated Latin-square scenario: evaluator `i` ranks
/// proposal `j` at position `((j − i) mod k) + 1`, with the own proposal
/// removed and the remaining positions renumbered `1..m`.
pub fn latin_square_round(
    event_id: EventId,
    participants: &[ParticipantId],
    proposals: &[Proposal],
) -> (Vec<Assignment>, Vec<BallotEntry>) {
    let k = proposals.len();
    let mut assignments = Vec::new();
    let mut ballots = Vec::new();

    for (i, &voter) in participants.iter().enumerate() {
        let mut ranked: Vec<(usize, ProposalId)> = proposals
            .iter()
            .enumerate()
            .filter(|(_, p)| p.author_id != voter)
            .map(|(j, p)| (((j + k) - i) % k, p.id))
            .collect();
        ranked.sort_by_key(|&(position, _)| position);

        let subset: Vec<ProposalId> = ranked.iter().map(|&(_, id)| id).collect();
        let (assignment, entries) = completed_ballot(event_id, voter, &subset);
        assignments.push(assignment);
        ballots.push(entries);
    }

    (assignments, ballots.into_iter().flatten().collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unanimous_round_shape() {
        let event_id = EventId::new();
        let participants: Vec<ParticipantId> = (0..4).map(|_| ParticipantId::new()).collect();
        let proposals: Vec<Proposal> = participants
            .iter()
            .map(|&p| proposal(event_id, p))
            .collect();

        let (assignments, ballots) = unanimous_round(event_id, &participants, &proposals);
        assert_eq!(assignments.len(), 4);
        assert_eq!(ballots.len(), 12);
        for assignment in &assignments {
            assert_eq!(assignment.proposal_ids.len(), 3);
            assert!(assignment.completed);
        }
    }

    #[test]
    fn test_latin_square_round_is_a_valid_ballot_set() {
        let event_id = EventId::new();
        let participants: Vec<ParticipantId> = (0..4).map(|_| ParticipantId::new()).collect();
        let proposals: Vec<Proposal> = participants
            .iter()
            .map(|&p| proposal(event_id, p))
            .collect();

        let (_, ballots) = latin_square_round(event_id, &participants, &proposals);
        // Every voter uses each rank 1..=3 exactly once.
        for &voter in &participants {
            let mut ranks: Vec<u32> = ballots
                .iter()
                .filter(|b| b.voter_id == voter)
                .map(|b| b.rank_position)
                .collect();
            ranks.sort_unstable();
            assert_eq!(ranks, vec![1, 2, 3]);
        }
    }
}
