//! Service-level tests driving the full lifecycle over the in-memory
//! backend: registration, configuration, assignment generation, ballot
//! intake, and result computation with all stage gates in place.

use peerrank_application::ports::{
    AssignmentRepository, BallotRepository, ConfigurationRepository, EventLockManager,
    EventRepository, ParticipantRepository, ProposalRepository, ResultsRepository,
};
use peerrank_application::validation::{
    CreateEventRequest, RankingEntry, RegisterParticipantRequest, SubmitBallotRequest,
    SubmitProposalRequest, TransitionStageRequest, VotingConfigurationRequest,
};
use peerrank_application::{EventService, ProposalService, VotingService, VotingServiceConfig};
use peerrank_domain::{Event, Participant, ParticipantId, ProposalId, Stage};
use peerrank_testing::{fixtures, InMemoryBackend};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

struct Harness {
    backend: InMemoryBackend,
    events: EventService,
    proposals: ProposalService,
    voting: VotingService,
    admin: Participant,
}

fn harness() -> Harness {
    let backend = InMemoryBackend::new();
    let events_repo: Arc<dyn EventRepository> = Arc::new(backend.clone());
    let participants_repo: Arc<dyn ParticipantRepository> = Arc::new(backend.clone());
    let proposals_repo: Arc<dyn ProposalRepository> = Arc::new(backend.clone());
    let assignments_repo: Arc<dyn AssignmentRepository> = Arc::new(backend.clone());
    let ballots_repo: Arc<dyn BallotRepository> = Arc::new(backend.clone());
    let configs_repo: Arc<dyn ConfigurationRepository> = Arc::new(backend.clone());
    let results_repo: Arc<dyn ResultsRepository> = Arc::new(backend.clone());
    let locks: Arc<dyn EventLockManager> = Arc::new(backend.clone());

    let events = EventService::new(
        Arc::clone(&events_repo),
        Arc::clone(&participants_repo),
        Arc::clone(&proposals_repo),
        Arc::clone(&assignments_repo),
        Arc::clone(&configs_repo),
    );
    let proposals = ProposalService::new(
        Arc::clone(&events_repo),
        Arc::clone(&participants_repo),
        Arc::clone(&proposals_repo),
    );
    let voting = VotingService::new(
        events_repo,
        participants_repo,
        proposals_repo,
        assignments_repo,
        ballots_repo,
        configs_repo,
        results_repo,
        locks,
        VotingServiceConfig::default(),
    );

    let admin = fixtures::admin("root");
    backend.insert_participant(admin.clone());

    Harness {
        backend,
        events,
        proposals,
        voting,
        admin,
    }
}

impl Harness {
    async fn create_event(&self) -> Event {
        self.events
            .create_event(CreateEventRequest {
                name: "Spring allocation".into(),
                description: "Ranking round".into(),
                author_id: self.admin.id.into_uuid(),
                start_date: chrono::Utc::now(),
                end_date: chrono::Utc::now() + chrono::Duration::days(7),
            })
            .await
            .unwrap()
    }

    async fn advance(&self, event: &Event, stage: Stage) {
        self.events
            .transition_stage(
                event.id,
                TransitionStageRequest {
                    stage,
                    requested_by: self.admin.id.into_uuid(),
                    force: false,
                },
            )
            .await
            .unwrap();
    }

    async fn register(&self, event: &Event, name: &str) -> Participant {
        self.events
            .register_participant(
                event.id,
                RegisterParticipantRequest {
                    name: name.into(),
                    last_name: "Tester".into(),
                    email: format!("{name}@example.com"),
                },
            )
            .await
            .unwrap()
    }

    fn config_request(m: u32, min_evals: u32, magnitude: u32) -> VotingConfigurationRequest {
        VotingConfigurationRequest {
            attachments_per_evaluator: m,
            min_evaluations_per_file: min_evals,
            quality_good_threshold: 0.8,
            quality_bad_threshold: 0.2,
            adjustment_magnitude: magnitude,
            randomization_seed: Some(42),
        }
    }

    /// Rank the voter's assigned subset by ascending proposal id.
    async fn submit_consensus_ballot(&self, event: &Event, voter: ParticipantId) {
        let assignment = self.voting.get_assignment(event.id, voter).await.unwrap();
        let mut subset: Vec<ProposalId> = assignment.proposal_ids.clone();
        subset.sort();

        self.voting
            .submit_ballot(
                event.id,
                voter,
                SubmitBallotRequest {
                    assignment_id: assignment.id.into_uuid(),
                    rankings: subset
                        .iter()
                        .enumerate()
                        .map(|(index, id)| RankingEntry {
                            proposal_id: id.into_uuid(),
                            rank: (index + 1) as u32,
                        })
                        .collect(),
                },
            )
            .await
            .unwrap();
    }

    /// Drive a 4-participant event all the way to the `Voting` stage with
    /// generated assignments; returns the participants in creation order.
    async fn event_ready_for_ballots(&self, magnitude: u32) -> (Event, Vec<Participant>) {
        let event = self.create_event().await;
        self.advance(&event, Stage::Registration).await;

        let mut participants = Vec::new();
        for name in ["alice", "bob", "carol", "dave"] {
            participants.push(self.register(&event, name).await);
        }

        self.voting
            .create_configuration(event.id, Self::config_request(3, 3, magnitude))
            .await
            .unwrap();

        self.advance(&event, Stage::Submission).await;
        for participant in &participants {
            self.proposals
                .submit_proposal(
                    event.id,
                    participant.id,
                    SubmitProposalRequest {
                        filename: format!("{}.pdf", participant.name),
                        file_size: 4096,
                        mime_type: "application/pdf".into(),
                    },
                )
                .await
                .unwrap();
        }

        self.advance(&event, Stage::Voting).await;
        let summary = self
            .voting
            .generate_assignments(event.id, CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(summary.assignments_count, 4);
        assert_eq!(summary.seed, 42);
        assert_eq!(summary.total_evaluations, 12);

        (event, participants)
    }
}

#[tokio::test]
async fn full_lifecycle_produces_consistent_results() {
    let h = harness();
    let (event, participants) = h.event_ready_for_ballots(0).await;

    for participant in &participants {
        h.submit_consensus_ballot(&event, participant.id).await;
    }

    h.advance(&event, Stage::Result).await;
    let results = h
        .voting
        .compute_results(event.id, CancellationToken::new())
        .await
        .unwrap();

    // With k=4 and m=3 every evaluator sees all non-own proposals, and the
    // shared id-order preference yields the exact score ladder.
    let mut scores: Vec<f64> = results.global_ranking.iter().map(|s| s.mbc_score).collect();
    scores.sort_by(|a, b| b.total_cmp(a));
    let expected = [1.0, 2.0 / 3.0, 1.0 / 3.0, 0.0];
    for (score, want) in scores.iter().zip(expected.iter()) {
        assert!((score - want).abs() < 1e-12);
    }

    assert_eq!(results.participant_qualities.len(), 4);
    for quality in results.participant_qualities.values() {
        assert!((quality - 1.0).abs() < 1e-12);
    }
    assert!(results.excluded_evaluators.is_empty());

    // No adjustment configured: both orderings agree.
    for (global, adjusted) in results
        .global_ranking
        .iter()
        .zip(results.adjusted_ranking.iter())
    {
        assert_eq!(global.proposal_id, adjusted.proposal_id);
        assert_eq!(global.global_rank, adjusted.adjusted_rank);
    }

    // Recomputation is deterministic and only the timestamp advances.
    let again = h
        .voting
        .compute_results(event.id, CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(results.global_ranking, again.global_ranking);
    assert_eq!(results.adjusted_ranking, again.adjusted_ranking);
    assert!(again.calculated_at >= results.calculated_at);
}

#[tokio::test]
async fn duplicate_ballot_is_rejected_and_stored_ballot_unchanged() {
    let h = harness();
    let (event, participants) = h.event_ready_for_ballots(0).await;
    let voter = participants[0].id;

    h.submit_consensus_ballot(&event, voter).await;
    assert_eq!(h.backend.ballot_count(), 3);

    let assignment = h.voting.get_assignment(event.id, voter).await.unwrap();
    let mut subset = assignment.proposal_ids.clone();
    subset.sort();
    let err = h
        .voting
        .submit_ballot(
            event.id,
            voter,
            SubmitBallotRequest {
                assignment_id: assignment.id.into_uuid(),
                rankings: subset
                    .iter()
                    .enumerate()
                    .map(|(index, id)| RankingEntry {
                        proposal_id: id.into_uuid(),
                        rank: (index + 1) as u32,
                    })
                    .collect(),
            },
        )
        .await
        .unwrap_err();

    assert_eq!(err.error_code(), "ALREADY_VOTED");
    assert_eq!(err.http_status(), 409);
    assert_eq!(h.backend.ballot_count(), 3);
}

#[tokio::test]
async fn ballot_must_cover_assignment_exactly() {
    let h = harness();
    let (event, participants) = h.event_ready_for_ballots(0).await;
    let voter = participants[0].id;

    let assignment = h.voting.get_assignment(event.id, voter).await.unwrap();
    let mut subset = assignment.proposal_ids.clone();
    subset.sort();

    // Duplicate rank positions.
    let err = h
        .voting
        .submit_ballot(
            event.id,
            voter,
            SubmitBallotRequest {
                assignment_id: assignment.id.into_uuid(),
                rankings: subset
                    .iter()
                    .map(|id| RankingEntry {
                        proposal_id: id.into_uuid(),
                        rank: 1,
                    })
                    .collect(),
            },
        )
        .await
        .unwrap_err();
    assert_eq!(err.error_code(), "DUPLICATE_RANK");

    // Rank outside 1..=m.
    let err = h
        .voting
        .submit_ballot(
            event.id,
            voter,
            SubmitBallotRequest {
                assignment_id: assignment.id.into_uuid(),
                rankings: subset
                    .iter()
                    .enumerate()
                    .map(|(index, id)| RankingEntry {
                        proposal_id: id.into_uuid(),
                        rank: (index + 2) as u32,
                    })
                    .collect(),
            },
        )
        .await
        .unwrap_err();
    assert_eq!(err.error_code(), "INVALID_RANKING");

    // A proposal outside the assigned subset.
    let err = h
        .voting
        .submit_ballot(
            event.id,
            voter,
            SubmitBallotRequest {
                assignment_id: assignment.id.into_uuid(),
                rankings: vec![
                    RankingEntry {
                        proposal_id: uuid::Uuid::now_v7(),
                        rank: 1,
                    },
                    RankingEntry {
                        proposal_id: subset[0].into_uuid(),
                        rank: 2,
                    },
                    RankingEntry {
                        proposal_id: subset[1].into_uuid(),
                        rank: 3,
                    },
                ],
            },
        )
        .await
        .unwrap_err();
    assert_eq!(err.error_code(), "INVALID_RANKING");

    // Nothing was persisted by the failed attempts.
    assert_eq!(h.backend.ballot_count(), 0);
    assert!(!h.backend.assignment(assignment.id).unwrap().completed);
}

#[tokio::test]
async fn stage_gates_reject_out_of_order_operations() {
    let h = harness();
    let event = h.create_event().await;

    // Registration before the registration stage opens.
    let err = h
        .events
        .register_participant(
            event.id,
            RegisterParticipantRequest {
                name: "early".into(),
                last_name: "Bird".into(),
                email: "early@example.com".into(),
            },
        )
        .await
        .unwrap_err();
    assert_eq!(err.error_code(), "STAGE_VIOLATION");
    assert_eq!(err.http_status(), 403);

    // Assignment generation before voting.
    let err = h
        .voting
        .generate_assignments(event.id, CancellationToken::new())
        .await
        .unwrap_err();
    assert_eq!(err.error_code(), "STAGE_VIOLATION");

    // Results before the result stage.
    let err = h
        .voting
        .compute_results(event.id, CancellationToken::new())
        .await
        .unwrap_err();
    assert_eq!(err.error_code(), "STAGE_VIOLATION");
}

#[tokio::test]
async fn transition_guards_enforce_population_invariants() {
    let h = harness();
    let event = h.create_event().await;
    h.advance(&event, Stage::Registration).await;

    // One participant is not enough to open submissions.
    h.register(&event, "solo").await;
    let err = h
        .events
        .transition_stage(
            event.id,
            TransitionStageRequest {
                stage: Stage::Submission,
                requested_by: h.admin.id.into_uuid(),
                force: false,
            },
        )
        .await
        .unwrap_err();
    assert_eq!(err.error_code(), "INSUFFICIENT_PARTICIPANTS");

    // A second registration plus a configuration unlocks the transition,
    // but voting cannot open without proposals.
    h.register(&event, "duo").await;
    h.voting
        .create_configuration(event.id, Harness::config_request(1, 1, 0))
        .await
        .unwrap();
    h.advance(&event, Stage::Submission).await;

    let err = h
        .events
        .transition_stage(
            event.id,
            TransitionStageRequest {
                stage: Stage::Voting,
                requested_by: h.admin.id.into_uuid(),
                force: false,
            },
        )
        .await
        .unwrap_err();
    assert_eq!(err.error_code(), "NO_PROPOSALS");
}

#[tokio::test]
async fn configuration_is_frozen_after_registration() {
    let h = harness();
    let event = h.create_event().await;
    h.advance(&event, Stage::Registration).await;
    h.register(&event, "alice").await;
    h.register(&event, "bob").await;

    h.voting
        .create_configuration(event.id, Harness::config_request(1, 1, 0))
        .await
        .unwrap();

    // A second configuration for the same event is a conflict.
    let err = h
        .voting
        .create_configuration(event.id, Harness::config_request(2, 1, 0))
        .await
        .unwrap_err();
    assert_eq!(err.error_code(), "CONFIGURATION_EXISTS");

    h.advance(&event, Stage::Submission).await;
    let err = h
        .voting
        .update_configuration(event.id, Default::default())
        .await
        .unwrap_err();
    assert_eq!(err.error_code(), "STAGE_VIOLATION");
}

#[tokio::test]
async fn assignments_cannot_be_regenerated() {
    let h = harness();
    let (event, _) = h.event_ready_for_ballots(0).await;

    let err = h
        .voting
        .generate_assignments(event.id, CancellationToken::new())
        .await
        .unwrap_err();
    assert_eq!(err.error_code(), "ASSIGNMENTS_EXIST");
    assert_eq!(err.http_status(), 409);
}

#[tokio::test]
async fn admin_override_records_excluded_evaluators() {
    let h = harness();
    let (event, participants) = h.event_ready_for_ballots(0).await;

    // Three of four evaluators finish; the fourth goes silent.
    for participant in &participants[..3] {
        h.submit_consensus_ballot(&event, participant.id).await;
    }

    // Closing voting without an override is refused.
    let err = h
        .events
        .transition_stage(
            event.id,
            TransitionStageRequest {
                stage: Stage::Result,
                requested_by: h.admin.id.into_uuid(),
                force: false,
            },
        )
        .await
        .unwrap_err();
    assert_eq!(err.error_code(), "STAGE_VIOLATION");

    // A non-admin cannot force it either.
    let err = h
        .events
        .transition_stage(
            event.id,
            TransitionStageRequest {
                stage: Stage::Result,
                requested_by: participants[0].id.into_uuid(),
                force: true,
            },
        )
        .await
        .unwrap_err();
    assert_eq!(err.error_code(), "STAGE_VIOLATION");

    // The admin override goes through and names the silent evaluator.
    let outcome = h
        .events
        .transition_stage(
            event.id,
            TransitionStageRequest {
                stage: Stage::Result,
                requested_by: h.admin.id.into_uuid(),
                force: true,
            },
        )
        .await
        .unwrap();
    assert_eq!(outcome.excluded_evaluators, vec![participants[3].id]);

    let results = h
        .voting
        .compute_results(event.id, CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(results.excluded_evaluators, vec![participants[3].id]);
    assert_eq!(results.participant_qualities.len(), 3);
    assert!(!results
        .participant_qualities
        .contains_key(&participants[3].id));
}

#[tokio::test]
async fn statistics_track_participation() {
    let h = harness();
    let (event, participants) = h.event_ready_for_ballots(0).await;

    for participant in &participants[..2] {
        h.submit_consensus_ballot(&event, participant.id).await;
    }

    let stats = h.voting.statistics(event.id).await.unwrap();
    assert_eq!(stats.stage, Stage::Voting);
    assert_eq!(stats.total_assignments, 4);
    assert_eq!(stats.completed_assignments, 2);
    assert_eq!(stats.votes_cast, 6);
    assert_eq!(stats.coverage.len(), 4);
    for coverage in &stats.coverage {
        assert_eq!(coverage.required_evaluations, 3);
        assert!(coverage.received_evaluations <= 3);
    }
}

#[tokio::test]
async fn unassigned_voter_cannot_submit() {
    let h = harness();
    let (event, _) = h.event_ready_for_ballots(0).await;

    let stranger = ParticipantId::new();
    let err = h
        .voting
        .submit_ballot(
            event.id,
            stranger,
            SubmitBallotRequest {
                assignment_id: uuid::Uuid::now_v7(),
                rankings: vec![RankingEntry {
                    proposal_id: uuid::Uuid::now_v7(),
                    rank: 1,
                }],
            },
        )
        .await
        .unwrap_err();
    assert_eq!(err.error_code(), "NOT_ASSIGNED");
}

#[tokio::test]
async fn duplicate_registration_is_a_conflict() {
    let h = harness();
    let event = h.create_event().await;
    h.advance(&event, Stage::Registration).await;

    h.register(&event, "alice").await;
    let err = h
        .events
        .register_participant(
            event.id,
            RegisterParticipantRequest {
                name: "alice".into(),
                last_name: "Tester".into(),
                email: "alice@example.com".into(),
            },
        )
        .await
        .unwrap_err();
    assert_eq!(err.error_code(), "DUPLICATE_REGISTRATION");
    assert_eq!(err.http_status(), 409);
}

#[tokio::test]
async fn incentives_reward_and_penalise_through_the_full_stack() {
    let h = harness();

    // Five participants, each evaluating all four non-own proposals.
    let event = h.create_event().await;
    h.advance(&event, Stage::Registration).await;
    let mut participants = Vec::new();
    for name in ["alice", "bob", "carol", "dave", "erin"] {
        participants.push(h.register(&event, name).await);
    }
    h.voting
        .create_configuration(event.id, Harness::config_request(4, 3, 1))
        .await
        .unwrap();
    h.advance(&event, Stage::Submission).await;
    for participant in &participants {
        h.proposals
            .submit_proposal(
                event.id,
                participant.id,
                SubmitProposalRequest {
                    filename: format!("{}.pdf", participant.name),
                    file_size: 4096,
                    mime_type: "application/pdf".into(),
                },
            )
            .await
            .unwrap();
    }
    h.advance(&event, Stage::Voting).await;
    h.voting
        .generate_assignments(event.id, CancellationToken::new())
        .await
        .unwrap();

    // The evaluator who owns the id-last proposal inverts the consensus;
    // that keeps the shared preference order intact in the global ranking
    // while bottoming out the rebel's own alignment.
    let listed = h
        .proposals
        .list_proposals(event.id, &Default::default())
        .await
        .unwrap();
    let rebel = listed
        .items
        .iter()
        .max_by_key(|p| p.id)
        .map(|p| p.author_id)
        .unwrap();

    for participant in &participants {
        if participant.id == rebel {
            continue;
        }
        h.submit_consensus_ballot(&event, participant.id).await;
    }
    let assignment = h.voting.get_assignment(event.id, rebel).await.unwrap();
    let mut subset = assignment.proposal_ids.clone();
    subset.sort();
    subset.reverse();
    h.voting
        .submit_ballot(
            event.id,
            rebel,
            SubmitBallotRequest {
                assignment_id: assignment.id.into_uuid(),
                rankings: subset
                    .iter()
                    .enumerate()
                    .map(|(index, id)| RankingEntry {
                        proposal_id: id.into_uuid(),
                        rank: (index + 1) as u32,
                    })
                    .collect(),
            },
        )
        .await
        .unwrap();

    h.advance(&event, Stage::Result).await;
    let results = h
        .voting
        .compute_results(event.id, CancellationToken::new())
        .await
        .unwrap();

    // The inverted ballot bottoms out; consensus evaluators align exactly.
    assert_eq!(results.participant_qualities[&rebel], 0.0);
    for participant in participants.iter().filter(|p| p.id != rebel) {
        assert!((results.participant_qualities[&participant.id] - 1.0).abs() < 1e-12);
    }

    let global_rank = |author: ParticipantId| {
        results
            .global_ranking
            .iter()
            .find(|s| s.author_id == author)
            .unwrap()
            .global_rank
    };
    let adjusted_rank = |author: ParticipantId| {
        results
            .adjusted_ranking
            .iter()
            .find(|s| s.author_id == author)
            .unwrap()
            .adjusted_rank
    };

    // The rebel owns the consensus-last proposal: rank 5, penalty clamps
    // at k.
    assert_eq!(global_rank(rebel), 5);
    assert_eq!(adjusted_rank(rebel), 5);
    // The bonus moves every consensus proposal up one rank, clamped at 1.
    for participant in participants.iter().filter(|p| p.id != rebel) {
        let global = global_rank(participant.id);
        assert_eq!(adjusted_rank(participant.id), (global - 1).max(1));
    }
}
