//! Proposal service.
//!
//! Registers proposal metadata during `Submission` and enforces the
//! one-proposal-per-author invariant. The artifact bytes themselves live in
//! external blob storage.

use crate::ports::{EventRepository, ParticipantRepository, ProposalRepository};
use crate::services::event::EventService;
use crate::validation::{SubmitProposalRequest, ValidateExt};
use peerrank_common::pagination::{PaginatedResult, PaginationParams};
use peerrank_domain::errors::{AppResult, ConflictError, NotFoundError, PolicyError};
use peerrank_domain::{EventId, ParticipantId, Proposal, ProposalId, Stage};
use std::sync::Arc;
use tracing::{info, instrument};

/// Service for proposal metadata.
pub struct ProposalService {
    events: Arc<dyn EventRepository>,
    participants: Arc<dyn ParticipantRepository>,
    proposals: Arc<dyn ProposalRepository>,
}

impl ProposalService {
    /// Wire the service over its persistence ports.
    pub fn new(
        events: Arc<dyn EventRepository>,
        participants: Arc<dyn ParticipantRepository>,
        proposals: Arc<dyn ProposalRepository>,
    ) -> Self {
        Self {
            events,
            participants,
            proposals,
        }
    }

    /// Register a participant's proposal for an event.
    #[instrument(skip(self, request), fields(event_id = %event_id, author_id = %author_id))]
    pub async fn submit_proposal(
        &self,
        event_id: EventId,
        author_id: ParticipantId,
        request: SubmitProposalRequest,
    ) -> AppResult<Proposal> {
        request.ensure_valid()?;

        EventService::require_event_in_stage(
            &self.events,
            event_id,
            Stage::Submission,
            "submit proposal",
        )
        .await?;

        if !self.participants.is_registered(event_id, author_id).await? {
            return Err(PolicyError::NotRegistered {
                event: event_id,
                participant: author_id,
            }
            .into());
        }

        if self
            .proposals
            .get_by_author(event_id, author_id)
            .await?
            .is_some()
        {
            return Err(ConflictError::DuplicateProposal {
                event: event_id,
                author: author_id,
            }
            .into());
        }

        let proposal = Proposal::new(
            event_id,
            author_id,
            request.filename,
            request.file_size,
            request.mime_type,
        );
        proposal.validate()?;

        self.proposals.create(&proposal).await?;
        info!(proposal_id = %proposal.id, "proposal registered");
        Ok(proposal)
    }

    /// List an event's proposals.
    pub async fn list_proposals(
        &self,
        event_id: EventId,
        params: &PaginationParams,
    ) -> AppResult<PaginatedResult<Proposal>> {
        if self.events.get(event_id).await?.is_none() {
            return Err(NotFoundError::Event(event_id).into());
        }
        self.proposals.list_by_event(event_id, params).await
    }

    /// Delete a proposal while `Submission` is still open.
    ///
    /// After submission closes the proposal set is frozen; deletion becomes a
    /// stage violation.
    #[instrument(skip(self), fields(event_id = %event_id, proposal_id = %proposal_id))]
    pub async fn delete_proposal(
        &self,
        event_id: EventId,
        proposal_id: ProposalId,
    ) -> AppResult<()> {
        EventService::require_event_in_stage(
            &self.events,
            event_id,
            Stage::Submission,
            "delete proposal",
        )
        .await?;

        let proposal = self
            .proposals
            .get(proposal_id)
            .await?
            .ok_or(NotFoundError::Proposal(proposal_id))?;
        if proposal.event_id != event_id {
            return Err(NotFoundError::Proposal(proposal_id).into());
        }

        self.proposals.delete(proposal_id).await?;
        info!("proposal deleted");
        Ok(())
    }
}
