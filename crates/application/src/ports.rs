//! Abstract persistence contracts the services depend on.
//!
//! No storage vocabulary leaks into the core: implementations live in the
//! infrastructure crate (PostgreSQL) and the testing crate (in-memory). All
//! list operations are bounded by [`PaginationParams`]; `create_batch`
//! operations are transactional — either all records land or none. Write
//! operations surface uniqueness violations as
//! [`ConflictError`](peerrank_domain::errors::ConflictError) values with
//! machine-readable codes.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use peerrank_common::pagination::{PaginatedResult, PaginationParams};
use peerrank_domain::{
    Assignment, AssignmentId, BallotEntry, Event, EventId, Participant, ParticipantId, Proposal,
    ProposalId, Stage, VotingConfiguration, VotingResults,
};
use peerrank_domain::errors::AppResult;

/// Storage operations for events.
#[async_trait]
pub trait EventRepository: Send + Sync {
    /// Persist a new event.
    async fn create(&self, event: &Event) -> AppResult<()>;

    /// Fetch an event by id.
    async fn get(&self, id: EventId) -> AppResult<Option<Event>>;

    /// Persist a stage change.
    async fn update_stage(&self, id: EventId, stage: Stage) -> AppResult<()>;

    /// List events, newest first.
    async fn list(&self, params: &PaginationParams) -> AppResult<PaginatedResult<Event>>;
}

/// Storage operations for participants and event registration.
#[async_trait]
pub trait ParticipantRepository: Send + Sync {
    /// Persist a new participant.
    async fn create(&self, participant: &Participant) -> AppResult<()>;

    /// Fetch a participant by id.
    async fn get(&self, id: ParticipantId) -> AppResult<Option<Participant>>;

    /// Fetch a participant by their unique e-mail.
    async fn get_by_email(&self, email: &str) -> AppResult<Option<Participant>>;

    /// Register a participant for an event; duplicate registration is a
    /// conflict.
    async fn register_for_event(
        &self,
        event_id: EventId,
        participant_id: ParticipantId,
    ) -> AppResult<()>;

    /// Whether the participant is registered for the event.
    async fn is_registered(
        &self,
        event_id: EventId,
        participant_id: ParticipantId,
    ) -> AppResult<bool>;

    /// List an event's registered participants.
    async fn list_by_event(
        &self,
        event_id: EventId,
        params: &PaginationParams,
    ) -> AppResult<PaginatedResult<Participant>>;

    /// Count an event's registered participants.
    async fn count_by_event(&self, event_id: EventId) -> AppResult<u64>;
}

/// Storage operations for proposal metadata.
#[async_trait]
pub trait ProposalRepository: Send + Sync {
    /// Persist a new proposal; `(event_id, author_id)` is unique.
    async fn create(&self, proposal: &Proposal) -> AppResult<()>;

    /// Fetch a proposal by id.
    async fn get(&self, id: ProposalId) -> AppResult<Option<Proposal>>;

    /// Fetch the proposal an author submitted to an event, if any.
    async fn get_by_author(
        &self,
        event_id: EventId,
        author_id: ParticipantId,
    ) -> AppResult<Option<Proposal>>;

    /// List an event's proposals.
    async fn list_by_event(
        &self,
        event_id: EventId,
        params: &PaginationParams,
    ) -> AppResult<PaginatedResult<Proposal>>;

    /// Count an event's proposals.
    async fn count_by_event(&self, event_id: EventId) -> AppResult<u64>;

    /// Delete a proposal; returns whether a row was removed.
    async fn delete(&self, id: ProposalId) -> AppResult<bool>;
}

/// Storage operations for evaluation assignments.
#[async_trait]
pub trait AssignmentRepository: Send + Sync {
    /// Persist a full assignment batch atomically, recording the seed the
    /// batch was generated from on the event's voting configuration.
    async fn create_batch(&self, seed: u64, assignments: &[Assignment]) -> AppResult<()>;

    /// Fetch a participant's assignment for an event.
    async fn get_by_participant(
        &self,
        event_id: EventId,
        participant_id: ParticipantId,
    ) -> AppResult<Option<Assignment>>;

    /// List an event's assignments.
    async fn list_by_event(
        &self,
        event_id: EventId,
        params: &PaginationParams,
    ) -> AppResult<PaginatedResult<Assignment>>;

    /// Count an event's assignments.
    async fn count_by_event(&self, event_id: EventId) -> AppResult<u64>;

    /// Mark an assignment completed; returns whether a row changed.
    async fn mark_completed(&self, id: AssignmentId, at: DateTime<Utc>) -> AppResult<bool>;
}

/// Storage operations for ballot entries.
#[async_trait]
pub trait BallotRepository: Send + Sync {
    /// Persist a voter's full ballot atomically and flag the assignment
    /// completed in the same transaction. A second ballot for the same
    /// assignment is a conflict.
    async fn create_batch(
        &self,
        assignment_id: AssignmentId,
        entries: &[BallotEntry],
    ) -> AppResult<()>;

    /// List an event's ballot entries.
    async fn list_by_event(
        &self,
        event_id: EventId,
        params: &PaginationParams,
    ) -> AppResult<PaginatedResult<BallotEntry>>;

    /// Fetch all entries a voter submitted within an event (at most `m`).
    async fn list_by_voter(
        &self,
        event_id: EventId,
        voter_id: ParticipantId,
    ) -> AppResult<Vec<BallotEntry>>;

    /// Count an event's ballot entries.
    async fn count_by_event(&self, event_id: EventId) -> AppResult<u64>;
}

/// Storage operations for voting configurations.
#[async_trait]
pub trait ConfigurationRepository: Send + Sync {
    /// Persist a new configuration; one per event.
    async fn create(&self, config: &VotingConfiguration) -> AppResult<()>;

    /// Fetch the event's configuration.
    async fn get_by_event(&self, event_id: EventId) -> AppResult<Option<VotingConfiguration>>;

    /// Persist configuration changes.
    async fn update(&self, config: &VotingConfiguration) -> AppResult<()>;
}

/// Storage operations for computed results.
#[async_trait]
pub trait ResultsRepository: Send + Sync {
    /// Insert or overwrite the event's results; `calculated_at` advances on
    /// every recomputation.
    async fn upsert(&self, results: &VotingResults) -> AppResult<()>;

    /// Fetch the event's stored results.
    async fn get_by_event(&self, event_id: EventId) -> AppResult<Option<VotingResults>>;
}

/// A held event-scoped exclusive lock.
#[async_trait]
pub trait EventLock: Send {
    /// Release the lock. Dropping an unreleased guard must also release it.
    async fn release(self: Box<Self>) -> AppResult<()>;
}

/// Acquires event-scoped exclusive locks.
///
/// Assignment generation and result computation serialise on this lock so
/// two runs for the same event can never interleave. Acquisition fails fast
/// with a conflict when the lock is already held.
#[async_trait]
pub trait EventLockManager: Send + Sync {
    /// Acquire the lock for an event.
    async fn acquire(&self, event_id: EventId) -> AppResult<Box<dyn EventLock>>;
}
