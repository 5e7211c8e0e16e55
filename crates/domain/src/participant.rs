//! Participants and roles.

use crate::errors::{AppError, ValidationError};
use crate::identifiers::ParticipantId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Role of a participant in the system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// May issue admin overrides (forced stage transitions)
    Admin,
    /// Regular participant: submits one proposal and evaluates peers
    Participant,
}

impl Role {
    /// Canonical string form used in storage.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Admin => "admin",
            Self::Participant => "participant",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Role {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "admin" => Ok(Self::Admin),
            "participant" => Ok(Self::Participant),
            other => Err(ValidationError::FieldValidation {
                field: "role".into(),
                message: format!("unknown role: {other}"),
            }
            .into()),
        }
    }
}

/// A system user taking part in events.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Participant {
    /// Unique identifier
    pub id: ParticipantId,
    /// Given name
    pub name: String,
    /// Family name
    pub last_name: String,
    /// Unique e-mail address
    pub email: String,
    /// Role in the system
    pub role: Role,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
}

impl Participant {
    /// Create a new participant with the `Participant` role.
    pub fn new(
        name: impl Into<String>,
        last_name: impl Into<String>,
        email: impl Into<String>,
    ) -> Self {
        Self::with_role(name, last_name, email, Role::Participant)
    }

    /// Create a new participant with an explicit role.
    pub fn with_role(
        name: impl Into<String>,
        last_name: impl Into<String>,
        email: impl Into<String>,
        role: Role,
    ) -> Self {
        Self {
            id: ParticipantId::new(),
            name: name.into(),
            last_name: last_name.into(),
            email: email.into(),
            role,
            created_at: Utc::now(),
        }
    }

    /// Whether this participant may issue admin overrides.
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    /// Validate the participant's own fields.
    pub fn validate(&self) -> Result<(), AppError> {
        if self.name.trim().is_empty() {
            return Err(ValidationError::FieldValidation {
                field: "name".into(),
                message: "name is required".into(),
            }
            .into());
        }
        if !self.email.contains('@') {
            return Err(ValidationError::FieldValidation {
                field: "email".into(),
                message: "invalid email".into(),
            }
            .into());
        }
        Ok(())
    }
}
