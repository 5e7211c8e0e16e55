//! Proposal metadata.
//!
//! A proposal is an opaque artifact submitted by a participant. Only its
//! metadata lives here; blob storage is an external collaborator.

use crate::errors::{AppError, ValidationError};
use crate::identifiers::{EventId, ParticipantId, ProposalId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A proposal submitted by a participant for evaluation.
///
/// `(event_id, author_id)` is unique: one proposal per author per event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Proposal {
    /// Unique identifier
    pub id: ProposalId,
    /// Event this proposal belongs to
    pub event_id: EventId,
    /// The submitting participant (weak reference)
    pub author_id: ParticipantId,
    /// Stored file name
    pub filename: String,
    /// File size in bytes
    pub file_size: i64,
    /// MIME type of the artifact
    pub mime_type: String,
    /// Upload timestamp
    pub uploaded_at: DateTime<Utc>,
}

impl Proposal {
    /// Register proposal metadata for an event.
    pub fn new(
        event_id: EventId,
        author_id: ParticipantId,
        filename: impl Into<String>,
        file_size: i64,
        mime_type: impl Into<String>,
    ) -> Self {
        Self {
            id: ProposalId::new(),
            event_id,
            author_id,
            filename: filename.into(),
            file_size,
            mime_type: mime_type.into(),
            uploaded_at: Utc::now(),
        }
    }

    /// Validate the proposal's own fields.
    pub fn validate(&self) -> Result<(), AppError> {
        if self.filename.trim().is_empty() {
            return Err(ValidationError::FieldValidation {
                field: "filename".into(),
                message: "filename is required".into(),
            }
            .into());
        }
        if self.file_size <= 0 {
            return Err(ValidationError::FieldValidation {
                field: "file_size".into(),
                message: "file_size must be positive".into(),
            }
            .into());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_proposal_validation() {
        let p = Proposal::new(
            EventId::new(),
            ParticipantId::new(),
            "survey-m31.pdf",
            42_000,
            "application/pdf",
        );
        assert!(p.validate().is_ok());

        let mut empty_name = p.clone();
        empty_name.filename = "  ".into();
        assert!(empty_name.validate().is_err());

        let mut zero_size = p;
        zero_size.file_size = 0;
        assert!(zero_size.validate().is_err());
    }
}
