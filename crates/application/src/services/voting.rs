//! Distributed voting service.
//!
//! Owns the voting configuration lifecycle, assignment generation, ballot
//! intake, participation statistics, and the result computation pipeline
//! (tally → quality → incentive). Generation and computation hold the
//! event-scoped exclusive lock and run under a deadline; both abort cleanly
//! on cancellation without committing partial batches.

use crate::dto::{
    AssignmentBatchSummary, BallotSummary, FeasibilityIssue, FeasibilityPreview,
    ProposalCoverage, VotingStatistics,
};
use crate::engine::{assignment, feasibility, incentive, quality, tally};
use crate::ports::{
    AssignmentRepository, BallotRepository, ConfigurationRepository, EventLockManager,
    EventRepository, ParticipantRepository, ProposalRepository, ResultsRepository,
};
use crate::services::event::EventService;
use crate::validation::{
    SubmitBallotRequest, UpdateConfigurationRequest, ValidateExt, VotingConfigurationRequest,
};
use chrono::Utc;
use peerrank_common::pagination::PaginationParams;
use peerrank_domain::errors::{
    AppError, AppResult, ConflictError, NotFoundError, PolicyError, ValidationError,
};
use peerrank_domain::{
    Assignment, BallotEntry, EventId, ParticipantId, Proposal, ProposalId, ResultsId, Stage,
    VotingConfiguration, VotingResults,
};
use std::collections::BTreeSet;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument, warn};

/// Tunables for the voting service.
#[derive(Debug, Clone)]
pub struct VotingServiceConfig {
    /// Deadline for assignment generation and result computation
    pub operation_timeout: Duration,
    /// Page size used when draining bounded list operations
    pub scan_page_size: u32,
}

impl Default for VotingServiceConfig {
    fn default() -> Self {
        Self {
            operation_timeout: Duration::from_secs(30),
            scan_page_size: 100,
        }
    }
}

/// Service implementing the distributed voting engine operations.
pub struct VotingService {
    events: Arc<dyn EventRepository>,
    participants: Arc<dyn ParticipantRepository>,
    proposals: Arc<dyn ProposalRepository>,
    assignments: Arc<dyn AssignmentRepository>,
    ballots: Arc<dyn BallotRepository>,
    configs: Arc<dyn ConfigurationRepository>,
    results: Arc<dyn ResultsRepository>,
    locks: Arc<dyn EventLockManager>,
    config: VotingServiceConfig,
}

impl VotingService {
    /// Wire the service over its persistence ports.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        events: Arc<dyn EventRepository>,
        participants: Arc<dyn ParticipantRepository>,
        proposals: Arc<dyn ProposalRepository>,
        assignments: Arc<dyn AssignmentRepository>,
        ballots: Arc<dyn BallotRepository>,
        configs: Arc<dyn ConfigurationRepository>,
        results: Arc<dyn ResultsRepository>,
        locks: Arc<dyn EventLockManager>,
        config: VotingServiceConfig,
    ) -> Self {
        Self {
            events,
            participants,
            proposals,
            assignments,
            ballots,
            configs,
            results,
            locks,
            config,
        }
    }

    // ------------------------------------------------------------------
    // Configuration lifecycle
    // ------------------------------------------------------------------

    /// Create the event's voting configuration during `Registration`.
    #[instrument(skip(self, request), fields(event_id = %event_id))]
    pub async fn create_configuration(
        &self,
        event_id: EventId,
        request: VotingConfigurationRequest,
    ) -> AppResult<VotingConfiguration> {
        request.ensure_valid()?;

        EventService::require_event_in_stage(
            &self.events,
            event_id,
            Stage::Registration,
            "create voting configuration",
        )
        .await?;

        if self.configs.get_by_event(event_id).await?.is_some() {
            return Err(ConflictError::ConfigurationExists(event_id).into());
        }

        let mut config = VotingConfiguration::new(event_id, request.attachments_per_evaluator);
        config.min_evaluations_per_file = request.min_evaluations_per_file;
        config.quality_good_threshold = request.quality_good_threshold;
        config.quality_bad_threshold = request.quality_bad_threshold;
        config.adjustment_magnitude = request.adjustment_magnitude;
        config.randomization_seed = request.randomization_seed;
        config.validate()?;

        self.configs.create(&config).await?;
        info!(config_id = %config.id, "voting configuration created");
        Ok(config)
    }

    /// Fetch the event's voting configuration.
    pub async fn get_configuration(&self, event_id: EventId) -> AppResult<VotingConfiguration> {
        if self.events.get(event_id).await?.is_none() {
            return Err(NotFoundError::Event(event_id).into());
        }
        self.configs
            .get_by_event(event_id)
            .await?
            .ok_or_else(|| NotFoundError::Configuration(event_id).into())
    }

    /// Update the configuration; only legal during `Registration`.
    #[instrument(skip(self, request), fields(event_id = %event_id))]
    pub async fn update_configuration(
        &self,
        event_id: EventId,
        request: UpdateConfigurationRequest,
    ) -> AppResult<VotingConfiguration> {
        request.ensure_valid()?;

        EventService::require_event_in_stage(
            &self.events,
            event_id,
            Stage::Registration,
            "update voting configuration",
        )
        .await?;

        let mut config = self
            .configs
            .get_by_event(event_id)
            .await?
            .ok_or(NotFoundError::Configuration(event_id))?;

        if let Some(m) = request.attachments_per_evaluator {
            config.attachments_per_evaluator = m;
        }
        if let Some(min_evals) = request.min_evaluations_per_file {
            config.min_evaluations_per_file = min_evals;
        }
        if let Some(q_good) = request.quality_good_threshold {
            config.quality_good_threshold = q_good;
        }
        if let Some(q_bad) = request.quality_bad_threshold {
            config.quality_bad_threshold = q_bad;
        }
        if let Some(n) = request.adjustment_magnitude {
            config.adjustment_magnitude = n;
        }
        if let Some(seed) = request.randomization_seed {
            config.randomization_seed = Some(seed);
        }
        config.updated_at = Utc::now();
        config.validate()?;

        self.configs.update(&config).await?;
        info!("voting configuration updated");
        Ok(config)
    }

    /// Run the feasibility checks against the event's current counts without
    /// persisting anything.
    #[instrument(skip(self), fields(event_id = %event_id))]
    pub async fn preview_configuration(&self, event_id: EventId) -> AppResult<FeasibilityPreview> {
        let config = self.get_configuration(event_id).await?;
        let participants = self.participants.count_by_event(event_id).await?;
        let proposals = self.proposals.count_by_event(event_id).await?;

        let report = feasibility::check(&config, participants, proposals);
        Ok(FeasibilityPreview {
            feasible: report.is_feasible(),
            violations: report
                .violations
                .iter()
                .map(|err| FeasibilityIssue {
                    code: err.error_code().to_string(),
                    message: err.to_string(),
                })
                .collect(),
            warnings: report.warnings,
            participants,
            proposals,
        })
    }

    // ------------------------------------------------------------------
    // Assignment generation
    // ------------------------------------------------------------------

    /// Generate the assignment batch for an event during `Voting`.
    ///
    /// Holds the event lock, re-validates feasibility against current data,
    /// and persists the batch atomically. The seed comes from the
    /// configuration when present, otherwise a fresh one is drawn and
    /// recorded for audit.
    #[instrument(skip(self, cancel), fields(event_id = %event_id))]
    pub async fn generate_assignments(
        &self,
        event_id: EventId,
        cancel: CancellationToken,
    ) -> AppResult<AssignmentBatchSummary> {
        EventService::require_event_in_stage(
            &self.events,
            event_id,
            Stage::Voting,
            "generate assignments",
        )
        .await?;

        let guard = self.locks.acquire(event_id).await?;
        let outcome = self
            .with_deadline("generate assignments", self.generate_inner(event_id, &cancel))
            .await;
        guard.release().await?;
        outcome
    }

    async fn generate_inner(
        &self,
        event_id: EventId,
        cancel: &CancellationToken,
    ) -> AppResult<AssignmentBatchSummary> {
        if self.assignments.count_by_event(event_id).await? > 0 {
            return Err(ConflictError::AssignmentsExist(event_id).into());
        }

        let participants: Vec<ParticipantId> = self
            .drain_pages(|params| async move { self.participants.list_by_event(event_id, &params).await })
            .await?
            .into_iter()
            .map(|p| p.id)
            .collect();
        if participants.len() < 2 {
            return Err(peerrank_domain::errors::InfeasibilityError::InsufficientParticipants {
                required: 2,
                actual: participants.len() as u32,
            }
            .into());
        }

        let proposals: Vec<Proposal> = self
            .drain_pages(|params| async move { self.proposals.list_by_event(event_id, &params).await })
            .await?;
        if proposals.is_empty() {
            return Err(peerrank_domain::errors::InfeasibilityError::NoProposals.into());
        }

        let config = self
            .configs
            .get_by_event(event_id)
            .await?
            .ok_or(NotFoundError::Configuration(event_id))?;
        config.validate()?;
        let warnings = feasibility::ensure(
            &config,
            participants.len() as u64,
            proposals.len() as u64,
        )?;
        for warning in &warnings {
            warn!(?warning, "configuration is usable but below recommendation");
        }

        let seed = config.randomization_seed.unwrap_or_else(rand::random);
        let plan = assignment::generate(event_id, &participants, &proposals, &config, seed, cancel)?;

        self.assignments.create_batch(seed, &plan.assignments).await?;

        let total_evaluations: usize = plan
            .assignments
            .iter()
            .map(|a| a.proposal_ids.len())
            .sum();

        info!(
            assignments = plan.assignments.len(),
            seed, "assignment batch persisted"
        );

        Ok(AssignmentBatchSummary {
            assignments_count: plan.assignments.len() as u32,
            total_participants: participants.len() as u32,
            total_proposals: proposals.len() as u32,
            total_evaluations: total_evaluations as u32,
            attachments_per_evaluator: config.attachments_per_evaluator,
            seed,
        })
    }

    /// Fetch a participant's assignment during `Voting`.
    pub async fn get_assignment(
        &self,
        event_id: EventId,
        participant_id: ParticipantId,
    ) -> AppResult<Assignment> {
        EventService::require_event_in_stage(
            &self.events,
            event_id,
            Stage::Voting,
            "read assignment",
        )
        .await?;

        self.assignments
            .get_by_participant(event_id, participant_id)
            .await?
            .ok_or_else(|| {
                NotFoundError::Assignment {
                    event: event_id,
                    participant: participant_id,
                }
                .into()
            })
    }

    // ------------------------------------------------------------------
    // Ballot intake
    // ------------------------------------------------------------------

    /// Validate and persist a voter's complete ballot.
    ///
    /// The ballot must cover the assigned subset exactly, with rank
    /// positions forming a permutation of `{1, …, m}`. Resubmission is
    /// rejected to preserve audit history.
    #[instrument(skip(self, request), fields(event_id = %event_id, voter_id = %voter_id))]
    pub async fn submit_ballot(
        &self,
        event_id: EventId,
        voter_id: ParticipantId,
        request: SubmitBallotRequest,
    ) -> AppResult<BallotSummary> {
        request.ensure_valid()?;

        EventService::require_event_in_stage(
            &self.events,
            event_id,
            Stage::Voting,
            "submit ballot",
        )
        .await?;

        let assignment = self
            .assignments
            .get_by_participant(event_id, voter_id)
            .await?
            .ok_or(PolicyError::NotAssigned(voter_id))?;

        if assignment.id.into_uuid() != request.assignment_id {
            return Err(ValidationError::InvalidPayload(
                "assignment_id does not match the voter's assignment".into(),
            )
            .into());
        }

        if assignment.completed {
            return Err(PolicyError::AlreadyVoted(voter_id).into());
        }

        let m = assignment.proposal_ids.len();
        if request.rankings.len() != m {
            return Err(ValidationError::InvalidRanking(format!(
                "expected {m} entries, got {}",
                request.rankings.len()
            ))
            .into());
        }

        // The ranked set must equal the assigned set exactly.
        let assigned: BTreeSet<ProposalId> = assignment.proposal_ids.iter().copied().collect();
        let mut ranked: BTreeSet<ProposalId> = BTreeSet::new();
        let mut seen_ranks: BTreeSet<u32> = BTreeSet::new();

        for entry in &request.rankings {
            let proposal_id = ProposalId::from(entry.proposal_id);
            if !assigned.contains(&proposal_id) {
                return Err(ValidationError::InvalidRanking(format!(
                    "proposal {proposal_id} is not part of the assignment"
                ))
                .into());
            }
            if !ranked.insert(proposal_id) {
                return Err(ValidationError::InvalidRanking(format!(
                    "proposal {proposal_id} is ranked twice"
                ))
                .into());
            }
            if entry.rank == 0 || entry.rank > m as u32 {
                return Err(ValidationError::InvalidRanking(format!(
                    "rank {} is outside 1..={m}",
                    entry.rank
                ))
                .into());
            }
            if !seen_ranks.insert(entry.rank) {
                return Err(ValidationError::DuplicateRank(entry.rank).into());
            }
        }
        if ranked != assigned {
            return Err(ValidationError::InvalidRanking(
                "ballot does not cover the assigned subset exactly".into(),
            )
            .into());
        }

        let entries: Vec<BallotEntry> = request
            .rankings
            .iter()
            .map(|entry| {
                BallotEntry::new(
                    event_id,
                    assignment.id,
                    voter_id,
                    ProposalId::from(entry.proposal_id),
                    entry.rank,
                )
            })
            .collect();

        self.ballots.create_batch(assignment.id, &entries).await?;

        info!(votes = entries.len(), "ballot recorded");
        Ok(BallotSummary {
            votes_count: entries.len() as u32,
            assignment_completed: true,
        })
    }

    // ------------------------------------------------------------------
    // Statistics and results
    // ------------------------------------------------------------------

    /// Participation progress; available from `Voting` onwards.
    #[instrument(skip(self), fields(event_id = %event_id))]
    pub async fn statistics(&self, event_id: EventId) -> AppResult<VotingStatistics> {
        let event = self
            .events
            .get(event_id)
            .await?
            .ok_or(NotFoundError::Event(event_id))?;
        if !matches!(event.stage, Stage::Voting | Stage::Result) {
            return Err(PolicyError::StageViolation {
                operation: "read voting statistics".into(),
                stage: event.stage.to_string(),
            }
            .into());
        }

        let config = self
            .configs
            .get_by_event(event_id)
            .await?
            .ok_or(NotFoundError::Configuration(event_id))?;

        let assignments: Vec<Assignment> = self
            .drain_pages(|params| async move { self.assignments.list_by_event(event_id, &params).await })
            .await?;
        let ballots: Vec<BallotEntry> = self
            .drain_pages(|params| async move { self.ballots.list_by_event(event_id, &params).await })
            .await?;
        let proposals: Vec<Proposal> = self
            .drain_pages(|params| async move { self.proposals.list_by_event(event_id, &params).await })
            .await?;

        let coverage = proposals
            .iter()
            .map(|proposal| ProposalCoverage {
                proposal_id: proposal.id,
                received_evaluations: ballots
                    .iter()
                    .filter(|b| b.proposal_id == proposal.id)
                    .count() as u32,
                required_evaluations: config.min_evaluations_per_file,
            })
            .collect();

        Ok(VotingStatistics {
            stage: event.stage,
            total_assignments: assignments.len() as u32,
            completed_assignments: assignments.iter().filter(|a| a.completed).count() as u32,
            votes_cast: ballots.len() as u64,
            coverage,
        })
    }

    /// Compute and store the event's results during `Result`.
    ///
    /// Runs tally → quality → incentive over the completed ballots, records
    /// evaluators with incomplete assignments as excluded, and upserts the
    /// results row. Recomputation is deterministic: the same ballots produce
    /// identical rankings, only `calculated_at` advances.
    #[instrument(skip(self, cancel), fields(event_id = %event_id))]
    pub async fn compute_results(
        &self,
        event_id: EventId,
        cancel: CancellationToken,
    ) -> AppResult<VotingResults> {
        EventService::require_event_in_stage(
            &self.events,
            event_id,
            Stage::Result,
            "compute results",
        )
        .await?;

        let guard = self.locks.acquire(event_id).await?;
        let outcome = self
            .with_deadline("compute results", self.compute_inner(event_id, &cancel))
            .await;
        guard.release().await?;
        outcome
    }

    async fn compute_inner(
        &self,
        event_id: EventId,
        cancel: &CancellationToken,
    ) -> AppResult<VotingResults> {
        let config = self
            .configs
            .get_by_event(event_id)
            .await?
            .ok_or(NotFoundError::Configuration(event_id))?;

        let proposals: Vec<Proposal> = self
            .drain_pages(|params| async move { self.proposals.list_by_event(event_id, &params).await })
            .await?;
        let assignments: Vec<Assignment> = self
            .drain_pages(|params| async move { self.assignments.list_by_event(event_id, &params).await })
            .await?;
        let all_ballots: Vec<BallotEntry> = self
            .drain_pages(|params| async move { self.ballots.list_by_event(event_id, &params).await })
            .await?;

        if cancel.is_cancelled() {
            return Err(AppError::Cancelled {
                operation: "compute results".into(),
            });
        }

        // Only ballots of completed assignments count; evaluators left
        // incomplete by an admin override are recorded as excluded.
        let completed: BTreeSet<ParticipantId> = assignments
            .iter()
            .filter(|a| a.completed)
            .map(|a| a.participant_id)
            .collect();
        let excluded_evaluators: Vec<ParticipantId> = assignments
            .iter()
            .filter(|a| !a.completed)
            .map(|a| a.participant_id)
            .collect();
        let ballots: Vec<BallotEntry> = all_ballots
            .into_iter()
            .filter(|b| completed.contains(&b.voter_id))
            .collect();

        let global_ranking = tally::rank_proposals(&proposals, &ballots, &config);
        let participant_qualities = quality::assess(
            &global_ranking,
            &assignments,
            &ballots,
            config.attachments_per_evaluator,
        );
        let adjusted_ranking = incentive::adjust(&global_ranking, &participant_qualities, &config);

        if cancel.is_cancelled() {
            return Err(AppError::Cancelled {
                operation: "compute results".into(),
            });
        }

        let results = VotingResults {
            id: ResultsId::new(),
            event_id,
            total_participants: participant_qualities.len() as u32,
            attachments_per_evaluator: config.attachments_per_evaluator,
            global_ranking,
            participant_qualities,
            adjusted_ranking,
            excluded_evaluators,
            calculated_at: Utc::now(),
        };

        self.results.upsert(&results).await?;
        info!(
            proposals = results.global_ranking.len(),
            evaluators = results.total_participants,
            "results computed and stored"
        );
        Ok(results)
    }

    // ------------------------------------------------------------------
    // Helpers
    // ------------------------------------------------------------------

    async fn with_deadline<T>(
        &self,
        operation: &str,
        fut: impl Future<Output = AppResult<T>>,
    ) -> AppResult<T> {
        match tokio::time::timeout(self.config.operation_timeout, fut).await {
            Ok(result) => result,
            Err(_) => Err(AppError::DeadlineExceeded {
                operation: operation.to_string(),
            }),
        }
    }

    /// Drain a bounded list operation page by page.
    async fn drain_pages<T, F, Fut>(&self, mut fetch: F) -> AppResult<Vec<T>>
    where
        F: FnMut(PaginationParams) -> Fut,
        Fut: Future<Output = AppResult<peerrank_common::pagination::PaginatedResult<T>>>,
    {
        let mut items = Vec::new();
        let mut params = PaginationParams::new(1, self.config.scan_page_size);
        loop {
            let page = fetch(params).await?;
            let fetched = page.items.len();
            items.extend(page.items);
            if fetched < params.per_page as usize {
                break;
            }
            params.page += 1;
        }
        Ok(items)
    }
}
