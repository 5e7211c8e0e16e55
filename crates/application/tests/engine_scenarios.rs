//! End-to-end scenarios for the voting engine, run over fixed ballot
//! constructions: tally → quality → incentive as one pipeline.

use peerrank_application::engine::{feasibility, incentive, quality, tally};
use peerrank_domain::{
    EventId, ParticipantId, Proposal, ProposalId, VotingConfiguration,
};
use peerrank_testing::fixtures;
use uuid::Uuid;

/// Population where participant `i` owns proposal `i` and proposal ids are
/// fixed so the id tie-break order equals the creation order.
fn population(size: usize, event_id: EventId) -> (Vec<ParticipantId>, Vec<Proposal>) {
    let participants: Vec<ParticipantId> = (0..size).map(|_| ParticipantId::new()).collect();
    let proposals: Vec<Proposal> = participants
        .iter()
        .enumerate()
        .map(|(i, &author)| {
            let mut proposal = fixtures::proposal(event_id, author);
            proposal.id = ProposalId::from_uuid(Uuid::from_u128((i + 1) as u128));
            proposal
        })
        .collect();
    (participants, proposals)
}

fn config(event_id: EventId, m: u32, min_evals: u32, magnitude: u32) -> VotingConfiguration {
    fixtures::configuration(event_id, m, min_evals, magnitude)
}

#[test]
fn unanimous_evaluators_produce_exact_mbc_ladder() {
    let event_id = EventId::new();
    let (participants, proposals) = population(4, event_id);
    let cfg = config(event_id, 3, 3, 0);

    let (assignments, ballots) = fixtures::unanimous_round(event_id, &participants, &proposals);

    let standings = tally::rank_proposals(&proposals, &ballots, &cfg);

    // Shared preference is the proposal order, so the scores step down
    // 1, 2/3, 1/3, 0 and the global ranking follows that order.
    let expected = [1.0, 2.0 / 3.0, 1.0 / 3.0, 0.0];
    for (standing, (expected_score, proposal)) in
        standings.iter().zip(expected.iter().zip(proposals.iter()))
    {
        assert_eq!(standing.proposal_id, proposal.id);
        assert!((standing.mbc_score - expected_score).abs() < 1e-12);
    }
    assert_eq!(
        standings.iter().map(|s| s.global_rank).collect::<Vec<_>>(),
        vec![1, 2, 3, 4]
    );

    // Perfect alignment everywhere.
    let qualities = quality::assess(&standings, &assignments, &ballots, 3);
    assert_eq!(qualities.len(), 4);
    for q in qualities.values() {
        assert!((q - 1.0).abs() < 1e-12);
    }

    // No adjustment configured: both orderings match.
    let adjusted = incentive::adjust(&standings, &qualities, &cfg);
    for (global, adj) in standings.iter().zip(adjusted.iter()) {
        assert_eq!(global.proposal_id, adj.proposal_id);
        assert_eq!(global.global_rank, adj.adjusted_rank);
    }
}

#[test]
fn rotated_latin_square_ties_break_by_id() {
    let event_id = EventId::new();
    let (participants, proposals) = population(4, event_id);
    let cfg = config(event_id, 3, 3, 0);

    let (assignments, ballots) = fixtures::latin_square_round(event_id, &participants, &proposals);

    let standings = tally::rank_proposals(&proposals, &ballots, &cfg);

    // Uniform disagreement: every proposal collects ranks {1, 2, 3} and all
    // scores are equal, so the ordering falls back to the id tie-break.
    for standing in &standings {
        assert!((standing.mbc_score - 0.5).abs() < 1e-12);
        assert_eq!(standing.vote_count, 3);
        assert_eq!(standing.first_place_votes, 1);
    }
    let ids: Vec<ProposalId> = standings.iter().map(|s| s.proposal_id).collect();
    let mut sorted = ids.clone();
    sorted.sort();
    assert_eq!(ids, sorted);

    // Two evaluators happen to agree with the tie-broken consensus exactly,
    // two are maximally off; the average alignment sits at 0.5.
    let qualities = quality::assess(&standings, &assignments, &ballots, 3);
    let mut values: Vec<f64> = qualities.values().copied().collect();
    values.sort_by(f64::total_cmp);
    assert_eq!(values, vec![0.0, 0.0, 1.0, 1.0]);
    let mean: f64 = values.iter().sum::<f64>() / values.len() as f64;
    assert!((mean - 0.5).abs() < 1e-12);

    let adjusted = incentive::adjust(&standings, &qualities, &cfg);
    for (global, adj) in standings.iter().zip(adjusted.iter()) {
        assert_eq!(global.global_rank, adj.adjusted_rank);
    }
}

#[test]
fn coverage_infeasibility_is_caught_before_generation() {
    // 2 participants × m=4 gives 8 evaluation slots, but 5 proposals at 3
    // evaluations each need 15.
    let event_id = EventId::new();
    let cfg = config(event_id, 4, 3, 1);

    let err = feasibility::ensure(&cfg, 2, 5).unwrap_err();
    assert_eq!(err.error_code(), "COVERAGE_INFEASIBLE");
    assert_eq!(err.http_status(), 422);
}

#[test]
fn reward_and_penalty_move_owner_proposals() {
    let event_id = EventId::new();
    let (participants, proposals) = population(5, event_id);
    let cfg = config(event_id, 4, 3, 1);

    // Four evaluators follow the shared preference; the fifth inverts it.
    let mut assignments = Vec::new();
    let mut ballots = Vec::new();
    for (i, &voter) in participants.iter().enumerate() {
        let mut subset: Vec<ProposalId> = proposals
            .iter()
            .filter(|p| p.author_id != voter)
            .map(|p| p.id)
            .collect();
        subset.sort();
        if i == 4 {
            subset.reverse();
        }
        let (assignment, entries) = fixtures::completed_ballot(event_id, voter, &subset);
        assignments.push(assignment);
        ballots.extend(entries);
    }

    let standings = tally::rank_proposals(&proposals, &ballots, &cfg);
    assert_eq!(
        standings.iter().map(|s| s.proposal_id).collect::<Vec<_>>(),
        proposals.iter().map(|p| p.id).collect::<Vec<_>>()
    );

    let qualities = quality::assess(&standings, &assignments, &ballots, 4);
    assert!((qualities[&participants[0]] - 1.0).abs() < 1e-12);
    assert_eq!(qualities[&participants[4]], 0.0);

    let adjusted = incentive::adjust(&standings, &qualities, &cfg);
    let rank_of = |author: ParticipantId| {
        adjusted
            .iter()
            .find(|s| s.author_id == author)
            .map(|s| (s.global_rank, s.adjusted_rank))
            .unwrap()
    };

    // E1 owns the top proposal: the bonus clamps at rank 1.
    assert_eq!(rank_of(participants[0]), (1, 1));
    // E2's bonus moves the proposal up one rank.
    assert_eq!(rank_of(participants[1]), (2, 1));
    // E5 owns the bottom proposal: the penalty clamps at rank k.
    assert_eq!(rank_of(participants[4]), (5, 5));

    // Invariants across both orderings.
    let k = proposals.len() as u32;
    for ranking in [&standings, &adjusted] {
        let mut seen: Vec<ProposalId> = ranking.iter().map(|s| s.proposal_id).collect();
        seen.sort();
        seen.dedup();
        assert_eq!(seen.len(), proposals.len());
        for standing in ranking.iter() {
            assert!((0.0..=1.0).contains(&standing.mbc_score));
            assert!(standing.adjusted_rank >= 1 && standing.adjusted_rank <= k);
        }
    }
    for q in qualities.values() {
        assert!((0.0..=1.0).contains(q));
    }
}

#[test]
fn recomputation_is_bitwise_stable() {
    let event_id = EventId::new();
    let (participants, proposals) = population(4, event_id);
    let cfg = config(event_id, 3, 3, 1);

    let (assignments, ballots) = fixtures::latin_square_round(event_id, &participants, &proposals);

    let run = || {
        let standings = tally::rank_proposals(&proposals, &ballots, &cfg);
        let qualities = quality::assess(&standings, &assignments, &ballots, 3);
        let adjusted = incentive::adjust(&standings, &qualities, &cfg);
        (standings, qualities, adjusted)
    };

    let (g1, q1, a1) = run();
    let (g2, q2, a2) = run();
    assert_eq!(g1, g2);
    assert_eq!(a1, a2);
    assert_eq!(q1, q2);
}
