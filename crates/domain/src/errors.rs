//! Error types for the PeerRank domain.
//!
//! This module defines the error taxonomy for all domain operations. Each
//! error carries a machine-readable code and maps to an HTTP status code for
//! API responses.

use crate::identifiers::*;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Top-level application error type
///
/// Every fallible operation in the core returns this type. Variants are
/// grouped by kind: validation, policy violations, infeasibility, missing
/// entities, storage conflicts, transient storage faults, and internal
/// invariant breaches.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// Input outside the permitted shape; no state change occurred
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// Operation not legal in the current lifecycle stage or for this actor
    #[error("Policy violation: {0}")]
    Policy(#[from] PolicyError),

    /// Parameters or data cannot satisfy the voting invariants
    #[error("Infeasible: {0}")]
    Infeasible(#[from] InfeasibilityError),

    /// Referenced entity missing
    #[error("Not found: {0}")]
    NotFound(#[from] NotFoundError),

    /// Storage-layer uniqueness or referential invariant violated
    #[error("Conflict: {0}")]
    Conflict(#[from] ConflictError),

    /// Transient storage or I/O failure; idempotent on retry when no partial
    /// commit was performed
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// Operation exceeded its deadline with no side effects
    #[error("Deadline exceeded during {operation}")]
    DeadlineExceeded {
        /// The operation that timed out
        operation: String,
    },

    /// Operation was cancelled before committing anything
    #[error("Operation cancelled: {operation}")]
    Cancelled {
        /// The operation that was cancelled
        operation: String,
    },

    /// Invariant violated inside the core; details stay server-side
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Get the machine-readable error code for this error
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Validation(err) => err.error_code(),
            Self::Policy(err) => err.error_code(),
            Self::Infeasible(err) => err.error_code(),
            Self::NotFound(_) => "NOT_FOUND",
            Self::Conflict(err) => err.error_code(),
            Self::Storage(_) => "STORAGE_ERROR",
            Self::DeadlineExceeded { .. } => "DEADLINE_EXCEEDED",
            Self::Cancelled { .. } => "CANCELLED",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Get the HTTP status code for this error
    pub fn http_status(&self) -> u16 {
        match self {
            Self::Validation(_) => 400,
            Self::Policy(PolicyError::AlreadyVoted { .. }) => 409,
            Self::Policy(_) => 403,
            Self::Infeasible(_) => 422,
            Self::NotFound(_) => 404,
            Self::Conflict(_) => 409,
            Self::Storage(_) => 503,
            Self::DeadlineExceeded { .. } => 504,
            Self::Cancelled { .. } => 503,
            Self::Internal(_) => 500,
        }
    }

    /// Check if this error is retryable
    ///
    /// Retryable errors are transient storage faults where the operation
    /// performed no partial commit.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Storage(_) | Self::DeadlineExceeded { .. } | Self::Cancelled { .. }
        )
    }
}

/// Validation errors: inputs outside the permitted shape
#[derive(Debug, thiserror::Error)]
pub enum ValidationError {
    /// Request payload failed shape validation
    #[error("Invalid payload: {0}")]
    InvalidPayload(String),

    /// Submitted ranking is not a valid permutation over the assigned subset
    #[error("Invalid ranking: {0}")]
    InvalidRanking(String),

    /// Two ballot entries carry the same rank position
    #[error("Duplicate rank position: {0}")]
    DuplicateRank(u32),

    /// Stage string not recognised
    #[error("Invalid stage: {0}")]
    InvalidStage(String),

    /// A single field failed validation
    #[error("{field}: {message}")]
    FieldValidation {
        /// Field that failed
        field: String,
        /// Why it failed
        message: String,
    },
}

impl ValidationError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::InvalidPayload(_) => "INVALID_PAYLOAD",
            Self::InvalidRanking(_) => "INVALID_RANKING",
            Self::DuplicateRank(_) => "DUPLICATE_RANK",
            Self::InvalidStage(_) => "INVALID_STAGE",
            Self::FieldValidation { .. } => "INVALID_PAYLOAD",
        }
    }
}

/// Policy violations: the operation is not legal right now
#[derive(Debug, thiserror::Error)]
pub enum PolicyError {
    /// Operation attempted outside its permitted stages
    #[error("{operation} is not permitted in stage {stage}")]
    StageViolation {
        /// The attempted operation
        operation: String,
        /// The event's current stage
        stage: String,
    },

    /// Stage transition not in the lifecycle DAG
    #[error("cannot transition from {from} to {to}")]
    InvalidTransition {
        /// Current stage
        from: String,
        /// Requested stage
        to: String,
    },

    /// Voter already submitted a completed ballot
    #[error("participant {0} has already voted")]
    AlreadyVoted(ParticipantId),

    /// Voter holds no assignment for this event
    #[error("participant {0} has no assignment for this event")]
    NotAssigned(ParticipantId),

    /// A participant may never evaluate their own proposal
    #[error("participant {0} cannot evaluate their own proposal")]
    SelfEvaluation(ParticipantId),

    /// Actor is not registered for the event
    #[error("participant {participant} is not registered for event {event}")]
    NotRegistered {
        /// The event
        event: EventId,
        /// The unregistered participant
        participant: ParticipantId,
    },
}

impl PolicyError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::StageViolation { .. } => "STAGE_VIOLATION",
            Self::InvalidTransition { .. } => "STAGE_VIOLATION",
            Self::AlreadyVoted(_) => "ALREADY_VOTED",
            Self::NotAssigned(_) => "NOT_ASSIGNED",
            Self::SelfEvaluation(_) => "SELF_EVALUATION",
            Self::NotRegistered { .. } => "NOT_REGISTERED",
        }
    }
}

/// Infeasibility: parameters or data cannot satisfy the invariants
#[derive(Debug, thiserror::Error)]
pub enum InfeasibilityError {
    /// Total evaluation capacity is below the required coverage
    #[error("insufficient total evaluations: need {required}, have {available}")]
    CoverageInfeasible {
        /// `k × min_evals_per_file`
        required: u64,
        /// `n × m`
        available: u64,
    },

    /// Phase 1 could not reach the minimum evaluations for a proposal
    #[error("cannot reach minimum evaluations for proposal {0}")]
    CoverageUnreachable(ProposalId),

    /// Phase 2 could not fill a participant's assignment to exactly m
    #[error("cannot complete assignment for participant {participant}: {shortfall} short")]
    AssignmentShortfall {
        /// Participant whose assignment cannot be filled
        participant: ParticipantId,
        /// How many proposals are missing
        shortfall: u32,
    },

    /// Fewer participants registered than the operation requires
    #[error("insufficient participants: need {required}, have {actual}")]
    InsufficientParticipants {
        /// Minimum required
        required: u32,
        /// Currently registered
        actual: u32,
    },

    /// Each evaluator cannot receive more proposals than exist
    #[error("attachments per evaluator ({m}) cannot exceed total proposals ({k})")]
    SubsetExceedsProposals {
        /// Configured subset size
        m: u32,
        /// Number of proposals
        k: u32,
    },

    /// No proposals were submitted
    #[error("at least one proposal is required")]
    NoProposals,
}

impl InfeasibilityError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::CoverageInfeasible { .. } => "COVERAGE_INFEASIBLE",
            Self::CoverageUnreachable(_) => "COVERAGE_UNREACHABLE",
            Self::AssignmentShortfall { .. } => "INFEASIBLE_ASSIGNMENT",
            Self::InsufficientParticipants { .. } => "INSUFFICIENT_PARTICIPANTS",
            Self::SubsetExceedsProposals { .. } => "SUBSET_EXCEEDS_PROPOSALS",
            Self::NoProposals => "NO_PROPOSALS",
        }
    }
}

/// A referenced entity is missing
#[derive(Debug, thiserror::Error)]
pub enum NotFoundError {
    /// Event not found
    #[error("event {0}")]
    Event(EventId),

    /// Participant not found
    #[error("participant {0}")]
    Participant(ParticipantId),

    /// Proposal not found
    #[error("proposal {0}")]
    Proposal(ProposalId),

    /// No assignment exists for the participant in the event
    #[error("assignment for participant {participant} in event {event}")]
    Assignment {
        /// Event the assignment was looked up in
        event: EventId,
        /// Participant without an assignment
        participant: ParticipantId,
    },

    /// No voting configuration exists for the event
    #[error("voting configuration for event {0}")]
    Configuration(EventId),

    /// No computed results exist for the event
    #[error("results for event {0}")]
    Results(EventId),
}

/// Storage-layer uniqueness violations
#[derive(Debug, thiserror::Error)]
pub enum ConflictError {
    /// `(event, author)` already has a proposal
    #[error("participant {author} already submitted a proposal for event {event}")]
    DuplicateProposal {
        /// Event the proposal belongs to
        event: EventId,
        /// Author who already has one
        author: ParticipantId,
    },

    /// Ballot rows for this voter already exist
    #[error("ballot already recorded for participant {voter} in event {event}")]
    DuplicateBallot {
        /// Event voted in
        event: EventId,
        /// Voter who already has a ballot
        voter: ParticipantId,
    },

    /// Participant already registered for the event
    #[error("participant {participant} is already registered for event {event}")]
    DuplicateRegistration {
        /// Event registered for
        event: EventId,
        /// Participant already registered
        participant: ParticipantId,
    },

    /// Assignments were already generated for the event
    #[error("assignments already exist for event {0}")]
    AssignmentsExist(EventId),

    /// A voting configuration already exists for the event
    #[error("voting configuration already exists for event {0}")]
    ConfigurationExists(EventId),

    /// Generic uniqueness or referential invariant violated at the storage
    /// layer, identified by a machine-readable code
    #[error("constraint violation: {code}")]
    ConstraintViolation {
        /// Machine-readable constraint code (e.g. the index name)
        code: String,
    },
}

impl ConflictError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::DuplicateProposal { .. } => "DUPLICATE_PROPOSAL",
            Self::DuplicateBallot { .. } => "DUPLICATE_BALLOT",
            Self::DuplicateRegistration { .. } => "DUPLICATE_REGISTRATION",
            Self::AssignmentsExist(_) => "ASSIGNMENTS_EXIST",
            Self::ConfigurationExists(_) => "CONFIGURATION_EXISTS",
            Self::ConstraintViolation { .. } => "CONSTRAINT_VIOLATION",
        }
    }
}

/// Transient storage faults
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// The storage backend is unreachable or overloaded
    #[error("storage unavailable: {0}")]
    Unavailable(String),

    /// A storage query failed
    #[error("query failed: {0}")]
    QueryFailed(String),

    /// Persisted data could not be (de)serialized
    #[error("serialization failed: {0}")]
    Serialization(String),
}

/// Standardized API error response body
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Machine-readable error code
    pub code: String,

    /// Human-readable error message
    pub message: String,

    /// Additional error details (optional)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,

    /// Timestamp when the error occurred
    pub timestamp: DateTime<Utc>,
}

impl From<&AppError> for ErrorResponse {
    fn from(error: &AppError) -> Self {
        Self {
            code: error.error_code().to_string(),
            message: error.to_string(),
            details: None,
            timestamp: Utc::now(),
        }
    }
}

/// Application-wide result type
pub type AppResult<T> = Result<T, AppError>;
