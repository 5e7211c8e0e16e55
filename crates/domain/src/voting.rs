//! The voting aggregate: configuration, assignments, ballot entries, and
//! computed results.
//!
//! Naming follows the mathematical model: `m` proposals per evaluator,
//! `min_evaluations_per_file` coverage, quality thresholds `Q_good`/`Q_bad`,
//! and adjustment magnitude `n`.

use crate::errors::{AppError, ValidationError};
use crate::identifiers::*;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Per-event mathematical parameters of the voting system.
///
/// Created once per event and mutable only during `Registration`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VotingConfiguration {
    /// Unique identifier
    pub id: ConfigId,
    /// Event this configuration belongs to (unique per event)
    pub event_id: EventId,
    /// `m`: proposals assigned to each evaluator
    pub attachments_per_evaluator: u32,
    /// Minimum evaluations every proposal must receive
    pub min_evaluations_per_file: u32,
    /// `Q_good`: quality at or above which an evaluator earns a rank bonus
    pub quality_good_threshold: f64,
    /// `Q_bad`: quality at or below which an evaluator earns a rank penalty
    pub quality_bad_threshold: f64,
    /// `n`: magnitude of the rank adjustment
    pub adjustment_magnitude: u32,
    /// Seed for reproducible assignment generation; recorded on first use
    /// when absent
    pub randomization_seed: Option<u64>,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
    /// Last modification timestamp
    pub updated_at: DateTime<Utc>,
}

impl VotingConfiguration {
    /// Create a configuration with the default thresholds.
    pub fn new(event_id: EventId, attachments_per_evaluator: u32) -> Self {
        let now = Utc::now();
        Self {
            id: ConfigId::new(),
            event_id,
            attachments_per_evaluator,
            min_evaluations_per_file: 3,
            quality_good_threshold: 0.6,
            quality_bad_threshold: 0.3,
            adjustment_magnitude: 3,
            randomization_seed: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Validate the parameter shape.
    ///
    /// Feasibility against actual participant/proposal counts is a separate
    /// concern and is checked by the configuration validator.
    pub fn validate(&self) -> Result<(), AppError> {
        if self.attachments_per_evaluator == 0 {
            return Err(ValidationError::FieldValidation {
                field: "attachments_per_evaluator".into(),
                message: "must be positive".into(),
            }
            .into());
        }
        if self.min_evaluations_per_file == 0 {
            return Err(ValidationError::FieldValidation {
                field: "min_evaluations_per_file".into(),
                message: "must be positive".into(),
            }
            .into());
        }
        if !(0.0..=1.0).contains(&self.quality_good_threshold)
            || !(0.0..=1.0).contains(&self.quality_bad_threshold)
        {
            return Err(ValidationError::FieldValidation {
                field: "quality_thresholds".into(),
                message: "thresholds must be in [0, 1]".into(),
            }
            .into());
        }
        if self.quality_good_threshold <= self.quality_bad_threshold {
            return Err(ValidationError::FieldValidation {
                field: "quality_good_threshold".into(),
                message: "must be higher than quality_bad_threshold".into(),
            }
            .into());
        }
        Ok(())
    }
}

/// The set of proposals allocated to one participant for evaluation.
///
/// Invariants: exactly `m` proposal ids, never the participant's own
/// proposal, all from the same event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Assignment {
    /// Unique identifier
    pub id: AssignmentId,
    /// Event this assignment belongs to
    pub event_id: EventId,
    /// The evaluating participant
    pub participant_id: ParticipantId,
    /// Proposals to be ranked by the participant
    pub proposal_ids: Vec<ProposalId>,
    /// Whether a complete ballot has been submitted
    pub completed: bool,
    /// When the ballot was submitted
    pub completed_at: Option<DateTime<Utc>>,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
}

impl Assignment {
    /// Create a fresh, uncompleted assignment.
    pub fn new(
        event_id: EventId,
        participant_id: ParticipantId,
        proposal_ids: Vec<ProposalId>,
    ) -> Self {
        Self {
            id: AssignmentId::new(),
            event_id,
            participant_id,
            proposal_ids,
            completed: false,
            completed_at: None,
            created_at: Utc::now(),
        }
    }

    /// Mark the assignment completed at the given instant.
    pub fn mark_completed(&mut self, at: DateTime<Utc>) {
        self.completed = true;
        self.completed_at = Some(at);
    }

    /// Whether the given proposal is part of this assignment.
    pub fn contains(&self, proposal_id: ProposalId) -> bool {
        self.proposal_ids.contains(&proposal_id)
    }
}

/// One ranking record: a single voter's rank for a single proposal.
///
/// For each voter within an event the rank positions over their ballot form
/// exactly `{1, …, m}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BallotEntry {
    /// Unique identifier
    pub id: BallotId,
    /// Event voted in
    pub event_id: EventId,
    /// The assignment this ballot fulfils
    pub assignment_id: AssignmentId,
    /// The evaluating participant
    pub voter_id: ParticipantId,
    /// The ranked proposal
    pub proposal_id: ProposalId,
    /// Rank position, 1 = best
    pub rank_position: u32,
    /// Submission timestamp
    pub voted_at: DateTime<Utc>,
}

impl BallotEntry {
    /// Create a ballot entry.
    pub fn new(
        event_id: EventId,
        assignment_id: AssignmentId,
        voter_id: ParticipantId,
        proposal_id: ProposalId,
        rank_position: u32,
    ) -> Self {
        Self {
            id: BallotId::new(),
            event_id,
            assignment_id,
            voter_id,
            proposal_id,
            rank_position,
            voted_at: Utc::now(),
        }
    }
}

/// The score and position of one proposal within the computed rankings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProposalStanding {
    /// The proposal
    pub proposal_id: ProposalId,
    /// The proposal's author (the owner receiving incentive adjustments)
    pub author_id: ParticipantId,
    /// Stored file name, carried for reporting
    pub filename: String,
    /// Modified Borda Count score in `[0, 1]`
    pub mbc_score: f64,
    /// Position in the global ranking `G`, 1 = best
    pub global_rank: u32,
    /// Position after the incentive adjustment
    pub adjusted_rank: u32,
    /// Number of ballots received
    pub vote_count: u32,
    /// Number of first-place votes received (tie-break statistic)
    pub first_place_votes: u32,
    /// Mean received rank position; reporting only
    pub average_rank: f64,
    /// Set when `vote_count < min_evaluations_per_file`
    pub insufficient_evaluations: bool,
}

/// Computed results for one event.
///
/// The original global ranking is preserved alongside the adjusted ranking so
/// both orderings are auditable. `calculated_at` advances monotonically on
/// recomputation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VotingResults {
    /// Unique identifier
    pub id: ResultsId,
    /// Event the results belong to (unique per event)
    pub event_id: EventId,
    /// Proposals ordered by MBC score
    pub global_ranking: Vec<ProposalStanding>,
    /// Quality score per evaluator with a completed ballot
    pub participant_qualities: BTreeMap<ParticipantId, f64>,
    /// Proposals ordered after the incentive adjustment
    pub adjusted_ranking: Vec<ProposalStanding>,
    /// Evaluators whose assignments were incomplete when results were
    /// computed (admin override); their ballots are excluded
    pub excluded_evaluators: Vec<ParticipantId>,
    /// Number of evaluators that contributed a quality score
    pub total_participants: u32,
    /// The `m` parameter the results were computed with
    pub attachments_per_evaluator: u32,
    /// Computation timestamp
    pub calculated_at: DateTime<Utc>,
}
