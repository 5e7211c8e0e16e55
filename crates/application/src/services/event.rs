//! Event lifecycle service.
//!
//! Creates events, registers participants, and drives the stage machine.
//! Transition guards that depend on other aggregates (participant counts,
//! configuration feasibility, assignment completion) are enforced here; the
//! lifecycle DAG itself lives on the domain entity.

use crate::dto::StageTransitionOutcome;
use crate::engine::feasibility;
use crate::ports::{
    AssignmentRepository, ConfigurationRepository, EventRepository, ParticipantRepository,
    ProposalRepository,
};
use crate::validation::{
    CreateEventRequest, RegisterParticipantRequest, TransitionStageRequest, ValidateExt,
};
use peerrank_common::pagination::{PaginatedResult, PaginationParams};
use peerrank_domain::errors::{
    AppResult, ConflictError, InfeasibilityError, NotFoundError, PolicyError,
};
use peerrank_domain::{Event, EventId, Participant, ParticipantId, Stage};
use std::sync::Arc;
use tracing::{info, instrument};

/// Service for event creation, registration, and stage transitions.
pub struct EventService {
    events: Arc<dyn EventRepository>,
    participants: Arc<dyn ParticipantRepository>,
    proposals: Arc<dyn ProposalRepository>,
    assignments: Arc<dyn AssignmentRepository>,
    configs: Arc<dyn ConfigurationRepository>,
}

impl EventService {
    /// Wire the service over its persistence ports.
    pub fn new(
        events: Arc<dyn EventRepository>,
        participants: Arc<dyn ParticipantRepository>,
        proposals: Arc<dyn ProposalRepository>,
        assignments: Arc<dyn AssignmentRepository>,
        configs: Arc<dyn ConfigurationRepository>,
    ) -> Self {
        Self {
            events,
            participants,
            proposals,
            assignments,
            configs,
        }
    }

    /// Create a new event in the `Creation` stage.
    #[instrument(skip(self, request), fields(name = %request.name))]
    pub async fn create_event(&self, request: CreateEventRequest) -> AppResult<Event> {
        request.ensure_valid()?;

        let author_id = ParticipantId::from(request.author_id);
        if self.participants.get(author_id).await?.is_none() {
            return Err(NotFoundError::Participant(author_id).into());
        }

        let event = Event::new(
            request.name,
            request.description,
            author_id,
            request.start_date,
            request.end_date,
        );
        event.validate()?;

        self.events.create(&event).await?;
        info!(event_id = %event.id, "event created");
        Ok(event)
    }

    /// Fetch an event.
    pub async fn get_event(&self, id: EventId) -> AppResult<Event> {
        self.events
            .get(id)
            .await?
            .ok_or_else(|| NotFoundError::Event(id).into())
    }

    /// List events.
    pub async fn list_events(
        &self,
        params: &PaginationParams,
    ) -> AppResult<PaginatedResult<Event>> {
        self.events.list(params).await
    }

    /// Register a participant for an event during `Registration`.
    ///
    /// Unknown e-mail addresses create a new participant; known ones reuse
    /// the existing account. Registering twice for the same event is a
    /// conflict.
    #[instrument(skip(self, request), fields(event_id = %event_id, email = %request.email))]
    pub async fn register_participant(
        &self,
        event_id: EventId,
        request: RegisterParticipantRequest,
    ) -> AppResult<Participant> {
        request.ensure_valid()?;

        let event = self.get_event(event_id).await?;
        event.require_stage(Stage::Registration, "register participant")?;

        let participant = match self.participants.get_by_email(&request.email).await? {
            Some(existing) => existing,
            None => {
                let participant =
                    Participant::new(request.name, request.last_name, request.email);
                participant.validate()?;
                self.participants.create(&participant).await?;
                participant
            }
        };

        if self
            .participants
            .is_registered(event_id, participant.id)
            .await?
        {
            return Err(ConflictError::DuplicateRegistration {
                event: event_id,
                participant: participant.id,
            }
            .into());
        }

        self.participants
            .register_for_event(event_id, participant.id)
            .await?;

        info!(participant_id = %participant.id, "participant registered");
        Ok(participant)
    }

    /// List an event's registered participants.
    pub async fn list_participants(
        &self,
        event_id: EventId,
        params: &PaginationParams,
    ) -> AppResult<PaginatedResult<Participant>> {
        self.get_event(event_id).await?;
        self.participants.list_by_event(event_id, params).await
    }

    /// Transition an event to the requested stage.
    ///
    /// Guards per target stage:
    /// - `Registration`: requester must be the event's author
    /// - `Submission`: at least two registered participants
    /// - `Voting`: at least one proposal and a feasible configuration
    /// - `Result`: every assignment completed, or an admin override
    ///   (`force`) which records the incomplete evaluators
    #[instrument(skip(self, request), fields(event_id = %event_id, target = %request.stage))]
    pub async fn transition_stage(
        &self,
        event_id: EventId,
        request: TransitionStageRequest,
    ) -> AppResult<StageTransitionOutcome> {
        request.ensure_valid()?;

        let mut event = self.get_event(event_id).await?;
        let requester_id = ParticipantId::from(request.requested_by);

        if !event.stage.can_transition_to(request.stage) {
            return Err(PolicyError::InvalidTransition {
                from: event.stage.to_string(),
                to: request.stage.to_string(),
            }
            .into());
        }

        let mut excluded_evaluators = Vec::new();

        match request.stage {
            Stage::Registration => {
                if !event.is_author(requester_id) {
                    return Err(PolicyError::StageViolation {
                        operation: "open registration (author only)".into(),
                        stage: event.stage.to_string(),
                    }
                    .into());
                }
            }
            Stage::Submission => {
                let registered = self.participants.count_by_event(event_id).await?;
                if registered < 2 {
                    return Err(InfeasibilityError::InsufficientParticipants {
                        required: 2,
                        actual: registered as u32,
                    }
                    .into());
                }
            }
            Stage::Voting => {
                let proposals = self.proposals.count_by_event(event_id).await?;
                if proposals == 0 {
                    return Err(InfeasibilityError::NoProposals.into());
                }
                let config = self
                    .configs
                    .get_by_event(event_id)
                    .await?
                    .ok_or(NotFoundError::Configuration(event_id))?;
                config.validate()?;

                let participants = self.participants.count_by_event(event_id).await?;
                feasibility::ensure(&config, participants, proposals)?;
            }
            Stage::Result => {
                excluded_evaluators = self.incomplete_evaluators(event_id).await?;
                if !excluded_evaluators.is_empty() {
                    if !request.force {
                        return Err(PolicyError::StageViolation {
                            operation: format!(
                                "close voting with {} incomplete assignments",
                                excluded_evaluators.len()
                            ),
                            stage: event.stage.to_string(),
                        }
                        .into());
                    }
                    let requester = self
                        .participants
                        .get(requester_id)
                        .await?
                        .ok_or(NotFoundError::Participant(requester_id))?;
                    if !requester.is_admin() {
                        return Err(PolicyError::StageViolation {
                            operation: "admin override".into(),
                            stage: event.stage.to_string(),
                        }
                        .into());
                    }
                    info!(
                        excluded = excluded_evaluators.len(),
                        "admin override: entering result stage with incomplete assignments"
                    );
                }
            }
            Stage::Creation => {
                return Err(PolicyError::InvalidTransition {
                    from: event.stage.to_string(),
                    to: Stage::Creation.to_string(),
                }
                .into());
            }
        }

        event.advance_to(request.stage)?;
        self.events.update_stage(event_id, event.stage).await?;

        info!(stage = %event.stage, "event stage advanced");
        Ok(StageTransitionOutcome {
            event,
            excluded_evaluators,
        })
    }

    /// Participants whose assignment is not yet completed.
    async fn incomplete_evaluators(&self, event_id: EventId) -> AppResult<Vec<ParticipantId>> {
        let mut incomplete = Vec::new();
        let mut params = PaginationParams::new(1, 100);
        loop {
            let page = self.assignments.list_by_event(event_id, &params).await?;
            let fetched = page.items.len();
            incomplete.extend(
                page.items
                    .into_iter()
                    .filter(|a| !a.completed)
                    .map(|a| a.participant_id),
            );
            if fetched < params.per_page as usize {
                break;
            }
            params.page += 1;
        }
        Ok(incomplete)
    }
}

impl std::fmt::Debug for EventService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventService").finish_non_exhaustive()
    }
}

impl EventService {
    /// Convenience used by other services: fetch and gate in one step.
    pub(crate) async fn require_event_in_stage(
        events: &Arc<dyn EventRepository>,
        event_id: EventId,
        stage: Stage,
        operation: &str,
    ) -> AppResult<Event> {
        let event = events
            .get(event_id)
            .await?
            .ok_or(NotFoundError::Event(event_id))?;
        event.require_stage(stage, operation)?;
        Ok(event)
    }
}
