//! The event aggregate and its lifecycle stage machine.
//!
//! An event is the root aggregate of the system. Every mutating operation is
//! gated by the event's current [`Stage`]; stages form a linear DAG and no
//! stage is re-enterable.

use crate::errors::{AppError, PolicyError, ValidationError};
use crate::identifiers::{EventId, ParticipantId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Lifecycle stage of an event.
///
/// `Creation → Registration → Submission → Voting → Result`; `Result` is
/// terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    /// Event created, not yet open
    Creation,
    /// Participants register
    Registration,
    /// Participants upload proposals
    Submission,
    /// Evaluators rank their assigned proposals
    Voting,
    /// Results computed and published; terminal
    Result,
}

impl Stage {
    /// The canonical string form used on the wire and in storage.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Creation => "creation",
            Self::Registration => "registration",
            Self::Submission => "submission",
            Self::Voting => "voting",
            Self::Result => "result",
        }
    }

    /// Check whether a transition to `next` is allowed from this stage.
    pub fn can_transition_to(&self, next: Stage) -> bool {
        matches!(
            (self, next),
            (Self::Creation, Stage::Registration)
                | (Self::Registration, Stage::Submission)
                | (Self::Submission, Stage::Voting)
                | (Self::Voting, Stage::Result)
        )
    }

    /// Whether the stage permits mutating the proposal set.
    pub fn accepts_proposals(&self) -> bool {
        *self == Self::Submission
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Stage {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "creation" => Ok(Self::Creation),
            "registration" => Ok(Self::Registration),
            "submission" => Ok(Self::Submission),
            "voting" => Ok(Self::Voting),
            "result" => Ok(Self::Result),
            other => Err(ValidationError::InvalidStage(other.to_string()).into()),
        }
    }
}

/// A peer-evaluation event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    /// Unique identifier
    pub id: EventId,
    /// Display name
    pub name: String,
    /// Free-form description
    pub description: String,
    /// The participant who created the event
    pub author_id: ParticipantId,
    /// Scheduled start
    pub start_date: DateTime<Utc>,
    /// Scheduled end
    pub end_date: DateTime<Utc>,
    /// Current lifecycle stage
    pub stage: Stage,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
    /// Last modification timestamp
    pub updated_at: DateTime<Utc>,
}

impl Event {
    /// Create a new event in the `Creation` stage.
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        author_id: ParticipantId,
        start_date: DateTime<Utc>,
        end_date: DateTime<Utc>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: EventId::new(),
            name: name.into(),
            description: description.into(),
            author_id,
            start_date,
            end_date,
            stage: Stage::Creation,
            created_at: now,
            updated_at: now,
        }
    }

    /// Check if the given participant is the author of this event.
    pub fn is_author(&self, participant_id: ParticipantId) -> bool {
        self.author_id == participant_id
    }

    /// Advance the stage if the transition is in the lifecycle DAG.
    ///
    /// Guards that depend on other aggregates (participant counts, assignment
    /// completion) live in the service layer; this only enforces the DAG.
    pub fn advance_to(&mut self, next: Stage) -> Result<(), AppError> {
        if !self.stage.can_transition_to(next) {
            return Err(PolicyError::InvalidTransition {
                from: self.stage.to_string(),
                to: next.to_string(),
            }
            .into());
        }
        self.stage = next;
        self.updated_at = Utc::now();
        Ok(())
    }

    /// Fail unless the event is currently in `expected`.
    pub fn require_stage(&self, expected: Stage, operation: &str) -> Result<(), AppError> {
        if self.stage != expected {
            return Err(PolicyError::StageViolation {
                operation: operation.to_string(),
                stage: self.stage.to_string(),
            }
            .into());
        }
        Ok(())
    }

    /// Validate the event's own fields.
    pub fn validate(&self) -> Result<(), AppError> {
        if self.name.trim().is_empty() {
            return Err(ValidationError::FieldValidation {
                field: "name".into(),
                message: "name is required".into(),
            }
            .into());
        }
        if self.end_date < self.start_date {
            return Err(ValidationError::FieldValidation {
                field: "end_date".into(),
                message: "end_date must be after start_date".into(),
            }
            .into());
        }
        Ok(())
    }
}
