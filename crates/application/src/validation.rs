//! Request payload validation.
//!
//! Shape validation happens here via `validator` derives before any service
//! logic runs; semantic checks (stage gates, feasibility, permutation rules)
//! stay in the services and the engine.

use chrono::{DateTime, Utc};
use peerrank_domain::errors::{AppResult, ValidationError};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

/// Extension turning `validator` errors into the domain error type.
pub trait ValidateExt {
    /// Validate and convert failures into an `INVALID_PAYLOAD` error.
    fn ensure_valid(&self) -> AppResult<()>;
}

impl<T: Validate> ValidateExt for T {
    fn ensure_valid(&self) -> AppResult<()> {
        self.validate().map_err(|errors| {
            let mut messages: Vec<String> = errors
                .field_errors()
                .iter()
                .flat_map(|(field, errs)| {
                    errs.iter().map(move |e| {
                        let detail = e
                            .message
                            .as_ref()
                            .map(|m| m.to_string())
                            .unwrap_or_else(|| e.code.to_string());
                        format!("{field}: {detail}")
                    })
                })
                .collect();
            messages.sort();
            ValidationError::InvalidPayload(messages.join("; ")).into()
        })
    }
}

/// Request to create an event.
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct CreateEventRequest {
    /// Display name
    #[validate(length(min = 1, max = 200))]
    pub name: String,

    /// Free-form description
    #[validate(length(max = 5000))]
    pub description: String,

    /// The creating participant
    pub author_id: Uuid,

    /// Scheduled start
    pub start_date: DateTime<Utc>,

    /// Scheduled end
    pub end_date: DateTime<Utc>,
}

/// Request to register a participant for an event.
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct RegisterParticipantRequest {
    /// Given name
    #[validate(length(min = 1, max = 100))]
    pub name: String,

    /// Family name
    #[validate(length(max = 100))]
    #[serde(default)]
    pub last_name: String,

    /// Unique e-mail address
    #[validate(email)]
    pub email: String,
}

/// Request to transition an event to a new stage.
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct TransitionStageRequest {
    /// Target stage
    #[schema(value_type = String, example = "registration")]
    pub stage: peerrank_domain::Stage,

    /// The participant requesting the transition
    pub requested_by: Uuid,

    /// Admin override: enter `Result` although assignments are incomplete
    #[serde(default)]
    pub force: bool,
}

/// Request to register proposal metadata.
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct SubmitProposalRequest {
    /// Stored file name
    #[validate(length(min = 1, max = 255))]
    pub filename: String,

    /// File size in bytes
    #[validate(range(min = 1))]
    pub file_size: i64,

    /// MIME type of the artifact
    #[validate(length(min = 1, max = 100))]
    pub mime_type: String,
}

/// Request to create a voting configuration.
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct VotingConfigurationRequest {
    /// `m`: proposals per evaluator
    #[validate(range(min = 1, max = 50))]
    pub attachments_per_evaluator: u32,

    /// Minimum evaluations per proposal
    #[validate(range(min = 1, max = 20))]
    pub min_evaluations_per_file: u32,

    /// `Q_good` threshold
    #[validate(range(min = 0.0, max = 1.0))]
    pub quality_good_threshold: f64,

    /// `Q_bad` threshold
    #[validate(range(min = 0.0, max = 1.0))]
    pub quality_bad_threshold: f64,

    /// `n`: adjustment magnitude
    #[validate(range(max = 10))]
    pub adjustment_magnitude: u32,

    /// Optional seed for reproducible assignment generation
    pub randomization_seed: Option<u64>,
}

/// Partial update of a voting configuration; only set fields change.
#[derive(Debug, Clone, Default, Deserialize, Validate, ToSchema)]
pub struct UpdateConfigurationRequest {
    /// `m`: proposals per evaluator
    #[validate(range(min = 1, max = 50))]
    pub attachments_per_evaluator: Option<u32>,

    /// Minimum evaluations per proposal
    #[validate(range(min = 1, max = 20))]
    pub min_evaluations_per_file: Option<u32>,

    /// `Q_good` threshold
    #[validate(range(min = 0.0, max = 1.0))]
    pub quality_good_threshold: Option<f64>,

    /// `Q_bad` threshold
    #[validate(range(min = 0.0, max = 1.0))]
    pub quality_bad_threshold: Option<f64>,

    /// `n`: adjustment magnitude
    #[validate(range(max = 10))]
    pub adjustment_magnitude: Option<u32>,

    /// Seed for reproducible assignment generation
    pub randomization_seed: Option<u64>,
}

/// One ranked entry of a ballot.
#[derive(Debug, Clone, Deserialize, Serialize, ToSchema)]
pub struct RankingEntry {
    /// The ranked proposal
    pub proposal_id: Uuid,

    /// Rank position, 1 = best
    pub rank: u32,
}

/// Request to submit a complete ballot.
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct SubmitBallotRequest {
    /// The assignment being fulfilled
    pub assignment_id: Uuid,

    /// One entry per assigned proposal
    #[validate(length(min = 1))]
    pub rankings: Vec<RankingEntry>,
}
