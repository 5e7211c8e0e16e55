//! Response shapes produced by the services.
//!
//! Domain entities serialize directly; the types here cover derived values
//! that have no single owning entity.

use peerrank_domain::{Event, ParticipantId, ProposalId, Stage};
use serde::Serialize;
use utoipa::ToSchema;

use crate::engine::feasibility::FeasibilityWarning;

/// Outcome of a stage transition.
#[derive(Debug, Serialize, ToSchema)]
pub struct StageTransitionOutcome {
    /// The event after the transition
    #[schema(value_type = Object)]
    pub event: Event,

    /// Evaluators with incomplete assignments at the moment an admin forced
    /// the transition into `Result`; empty on regular transitions
    #[schema(value_type = Vec<String>)]
    pub excluded_evaluators: Vec<ParticipantId>,
}

/// Summary returned after assignment generation.
#[derive(Debug, Serialize, ToSchema)]
pub struct AssignmentBatchSummary {
    /// Assignments created (one per participant)
    pub assignments_count: u32,
    /// Participants covered
    pub total_participants: u32,
    /// Proposals distributed
    pub total_proposals: u32,
    /// Total evaluation slots (`assignments_count × m`)
    pub total_evaluations: u32,
    /// The `m` parameter used
    pub attachments_per_evaluator: u32,
    /// Seed the batch was generated from, recorded for audit
    pub seed: u64,
}

/// Summary returned after a ballot submission.
#[derive(Debug, Serialize, ToSchema)]
pub struct BallotSummary {
    /// Ballot entries persisted
    pub votes_count: u32,
    /// Whether the assignment is now complete
    pub assignment_completed: bool,
}

/// Feasibility preview of a voting configuration against current counts.
#[derive(Debug, Serialize, ToSchema)]
pub struct FeasibilityPreview {
    /// Whether the configuration is usable as-is
    pub feasible: bool,
    /// Hard violations, machine-readable code plus message
    pub violations: Vec<FeasibilityIssue>,
    /// Soft recommendations not met
    #[schema(value_type = Vec<Object>)]
    pub warnings: Vec<FeasibilityWarning>,
    /// Registered participants at preview time
    pub participants: u64,
    /// Submitted proposals at preview time
    pub proposals: u64,
}

/// A single hard violation in a feasibility preview.
#[derive(Debug, Serialize, ToSchema)]
pub struct FeasibilityIssue {
    /// Machine-readable code
    pub code: String,
    /// Human-readable message
    pub message: String,
}

/// Per-proposal evaluation progress.
#[derive(Debug, Serialize, ToSchema)]
pub struct ProposalCoverage {
    /// The proposal
    #[schema(value_type = String)]
    pub proposal_id: ProposalId,
    /// Ballot entries received so far
    pub received_evaluations: u32,
    /// The configured minimum
    pub required_evaluations: u32,
}

/// Participation progress during the voting stage.
#[derive(Debug, Serialize, ToSchema)]
pub struct VotingStatistics {
    /// Current lifecycle stage
    #[schema(value_type = String)]
    pub stage: Stage,
    /// Assignments generated
    pub total_assignments: u32,
    /// Assignments with a submitted ballot
    pub completed_assignments: u32,
    /// Ballot entries cast
    pub votes_cast: u64,
    /// Per-proposal received evaluations vs. the required minimum
    pub coverage: Vec<ProposalCoverage>,
}
