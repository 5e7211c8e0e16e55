//! In-memory implementations of the persistence ports.
//!
//! All repositories share one store so cross-aggregate operations (ballot
//! batches flipping the completion flag, seed recording) behave like the
//! transactional PostgreSQL implementations, including the conflict errors
//! they surface.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use peerrank_application::ports::{
    AssignmentRepository, BallotRepository, ConfigurationRepository, EventLock, EventLockManager,
    EventRepository, ParticipantRepository, ProposalRepository, ResultsRepository,
};
use peerrank_common::pagination::{PaginatedResult, PaginationParams};
use peerrank_domain::errors::{AppError, AppResult, ConflictError, NotFoundError};
use peerrank_domain::{
    Assignment, AssignmentId, BallotEntry, Event, EventId, Participant, ParticipantId, Proposal,
    ProposalId, Stage, VotingConfiguration, VotingResults,
};
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

#[derive(Default)]
struct Store {
    events: RwLock<BTreeMap<EventId, Event>>,
    participants: RwLock<BTreeMap<ParticipantId, Participant>>,
    registrations: RwLock<HashSet<(EventId, ParticipantId)>>,
    proposals: RwLock<BTreeMap<ProposalId, Proposal>>,
    assignments: RwLock<BTreeMap<AssignmentId, Assignment>>,
    ballots: RwLock<Vec<BallotEntry>>,
    configs: RwLock<BTreeMap<EventId, VotingConfiguration>>,
    results: RwLock<BTreeMap<EventId, VotingResults>>,
    held_locks: Mutex<HashSet<EventId>>,
}

fn page_of<T: Clone>(items: Vec<T>, params: &PaginationParams) -> PaginatedResult<T> {
    let total = items.len() as u64;
    let start = (params.offset() as usize).min(items.len());
    let end = (start + params.limit() as usize).min(items.len());
    PaginatedResult::new(items[start..end].to_vec(), params, total)
}

/// One shared in-memory backend exposing every port.
#[derive(Clone, Default)]
pub struct InMemoryBackend {
    store: Arc<Store>,
}

impl InMemoryBackend {
    /// Create an empty backend.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of ballot entries currently stored.
    pub fn ballot_count(&self) -> usize {
        self.store.ballots.read().len()
    }

    /// Snapshot of a stored assignment, for assertions.
    pub fn assignment(&self, id: AssignmentId) -> Option<Assignment> {
        self.store.assignments.read().get(&id).cloned()
    }

    /// Directly seed an event, bypassing the service layer.
    pub fn insert_event(&self, event: Event) {
        self.store.events.write().insert(event.id, event);
    }

    /// Directly seed a participant, bypassing the service layer.
    pub fn insert_participant(&self, participant: Participant) {
        self.store
            .participants
            .write()
            .insert(participant.id, participant);
    }

    /// Force an event into a stage, bypassing the transition guards.
    pub fn force_stage(&self, event_id: EventId, stage: Stage) {
        if let Some(event) = self.store.events.write().get_mut(&event_id) {
            event.stage = stage;
        }
    }
}

#[async_trait]
impl EventRepository for InMemoryBackend {
    async fn create(&self, event: &Event) -> AppResult<()> {
        self.store.events.write().insert(event.id, event.clone());
        Ok(())
    }

    async fn get(&self, id: EventId) -> AppResult<Option<Event>> {
        Ok(self.store.events.read().get(&id).cloned())
    }

    async fn update_stage(&self, id: EventId, stage: Stage) -> AppResult<()> {
        let mut events = self.store.events.write();
        let event = events
            .get_mut(&id)
            .ok_or(NotFoundError::Event(id))?;
        event.stage = stage;
        event.updated_at = Utc::now();
        Ok(())
    }

    async fn list(&self, params: &PaginationParams) -> AppResult<PaginatedResult<Event>> {
        let items: Vec<Event> = self.store.events.read().values().cloned().collect();
        Ok(page_of(items, params))
    }
}

#[async_trait]
impl ParticipantRepository for InMemoryBackend {
    async fn create(&self, participant: &Participant) -> AppResult<()> {
        let mut participants = self.store.participants.write();
        if participants
            .values()
            .any(|p| p.email.eq_ignore_ascii_case(&participant.email))
        {
            return Err(ConflictError::ConstraintViolation {
                code: "participants_email_key".into(),
            }
            .into());
        }
        participants.insert(participant.id, participant.clone());
        Ok(())
    }

    async fn get(&self, id: ParticipantId) -> AppResult<Option<Participant>> {
        Ok(self.store.participants.read().get(&id).cloned())
    }

    async fn get_by_email(&self, email: &str) -> AppResult<Option<Participant>> {
        Ok(self
            .store
            .participants
            .read()
            .values()
            .find(|p| p.email.eq_ignore_ascii_case(email))
            .cloned())
    }

    async fn register_for_event(
        &self,
        event_id: EventId,
        participant_id: ParticipantId,
    ) -> AppResult<()> {
        let mut registrations = self.store.registrations.write();
        if !registrations.insert((event_id, participant_id)) {
            return Err(ConflictError::DuplicateRegistration {
                event: event_id,
                participant: participant_id,
            }
            .into());
        }
        Ok(())
    }

    async fn is_registered(
        &self,
        event_id: EventId,
        participant_id: ParticipantId,
    ) -> AppResult<bool> {
        Ok(self
            .store
            .registrations
            .read()
            .contains(&(event_id, participant_id)))
    }

    async fn list_by_event(
        &self,
        event_id: EventId,
        params: &PaginationParams,
    ) -> AppResult<PaginatedResult<Participant>> {
        let registrations = self.store.registrations.read();
        let participants = self.store.participants.read();
        let mut items: Vec<Participant> = registrations
            .iter()
            .filter(|(e, _)| *e == event_id)
            .filter_map(|(_, p)| participants.get(p).cloned())
            .collect();
        items.sort_by_key(|p| p.id);
        Ok(page_of(items, params))
    }

    async fn count_by_event(&self, event_id: EventId) -> AppResult<u64> {
        Ok(self
            .store
            .registrations
            .read()
            .iter()
            .filter(|(e, _)| *e == event_id)
            .count() as u64)
    }
}

#[async_trait]
impl ProposalRepository for InMemoryBackend {
    async fn create(&self, proposal: &Proposal) -> AppResult<()> {
        let mut proposals = self.store.proposals.write();
        if proposals
            .values()
            .any(|p| p.event_id == proposal.event_id && p.author_id == proposal.author_id)
        {
            return Err(ConflictError::DuplicateProposal {
                event: proposal.event_id,
                author: proposal.author_id,
            }
            .into());
        }
        proposals.insert(proposal.id, proposal.clone());
        Ok(())
    }

    async fn get(&self, id: ProposalId) -> AppResult<Option<Proposal>> {
        Ok(self.store.proposals.read().get(&id).cloned())
    }

    async fn get_by_author(
        &self,
        event_id: EventId,
        author_id: ParticipantId,
    ) -> AppResult<Option<Proposal>> {
        Ok(self
            .store
            .proposals
            .read()
            .values()
            .find(|p| p.event_id == event_id && p.author_id == author_id)
            .cloned())
    }

    async fn list_by_event(
        &self,
        event_id: EventId,
        params: &PaginationParams,
    ) -> AppResult<PaginatedResult<Proposal>> {
        let items: Vec<Proposal> = self
            .store
            .proposals
            .read()
            .values()
            .filter(|p| p.event_id == event_id)
            .cloned()
            .collect();
        Ok(page_of(items, params))
    }

    async fn count_by_event(&self, event_id: EventId) -> AppResult<u64> {
        Ok(self
            .store
            .proposals
            .read()
            .values()
            .filter(|p| p.event_id == event_id)
            .count() as u64)
    }

    async fn delete(&self, id: ProposalId) -> AppResult<bool> {
        Ok(self.store.proposals.write().remove(&id).is_some())
    }
}

#[async_trait]
impl AssignmentRepository for InMemoryBackend {
    async fn create_batch(&self, seed: u64, assignments: &[Assignment]) -> AppResult<()> {
        let Some(first) = assignments.first() else {
            return Ok(());
        };

        let mut stored = self.store.assignments.write();
        for assignment in assignments {
            stored.insert(assignment.id, assignment.clone());
        }

        if let Some(config) = self.store.configs.write().get_mut(&first.event_id) {
            config.randomization_seed = Some(seed);
            config.updated_at = Utc::now();
        }
        Ok(())
    }

    async fn get_by_participant(
        &self,
        event_id: EventId,
        participant_id: ParticipantId,
    ) -> AppResult<Option<Assignment>> {
        Ok(self
            .store
            .assignments
            .read()
            .values()
            .find(|a| a.event_id == event_id && a.participant_id == participant_id)
            .cloned())
    }

    async fn list_by_event(
        &self,
        event_id: EventId,
        params: &PaginationParams,
    ) -> AppResult<PaginatedResult<Assignment>> {
        let items: Vec<Assignment> = self
            .store
            .assignments
            .read()
            .values()
            .filter(|a| a.event_id == event_id)
            .cloned()
            .collect();
        Ok(page_of(items, params))
    }

    async fn count_by_event(&self, event_id: EventId) -> AppResult<u64> {
        Ok(self
            .store
            .assignments
            .read()
            .values()
            .filter(|a| a.event_id == event_id)
            .count() as u64)
    }

    async fn mark_completed(&self, id: AssignmentId, at: DateTime<Utc>) -> AppResult<bool> {
        let mut assignments = self.store.assignments.write();
        match assignments.get_mut(&id) {
            Some(assignment) => {
                assignment.mark_completed(at);
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

#[async_trait]
impl BallotRepository for InMemoryBackend {
    async fn create_batch(
        &self,
        assignment_id: AssignmentId,
        entries: &[BallotEntry],
    ) -> AppResult<()> {
        let Some(first) = entries.first() else {
            return Ok(());
        };

        // Completion flips first, mirroring the transactional guard of the
        // PostgreSQL implementation.
        {
            let mut assignments = self.store.assignments.write();
            let assignment = assignments.get_mut(&assignment_id).ok_or(
                NotFoundError::Assignment {
                    event: first.event_id,
                    participant: first.voter_id,
                },
            )?;
            if assignment.completed {
                return Err(ConflictError::DuplicateBallot {
                    event: first.event_id,
                    voter: first.voter_id,
                }
                .into());
            }
            assignment.mark_completed(Utc::now());
        }

        self.store.ballots.write().extend(entries.iter().cloned());
        Ok(())
    }

    async fn list_by_event(
        &self,
        event_id: EventId,
        params: &PaginationParams,
    ) -> AppResult<PaginatedResult<BallotEntry>> {
        let items: Vec<BallotEntry> = self
            .store
            .ballots
            .read()
            .iter()
            .filter(|b| b.event_id == event_id)
            .cloned()
            .collect();
        Ok(page_of(items, params))
    }

    async fn list_by_voter(
        &self,
        event_id: EventId,
        voter_id: ParticipantId,
    ) -> AppResult<Vec<BallotEntry>> {
        Ok(self
            .store
            .ballots
            .read()
            .iter()
            .filter(|b| b.event_id == event_id && b.voter_id == voter_id)
            .cloned()
            .collect())
    }

    async fn count_by_event(&self, event_id: EventId) -> AppResult<u64> {
        Ok(self
            .store
            .ballots
            .read()
            .iter()
            .filter(|b| b.event_id == event_id)
            .count() as u64)
    }
}

#[async_trait]
impl ConfigurationRepository for InMemoryBackend {
    async fn create(&self, config: &VotingConfiguration) -> AppResult<()> {
        let mut configs = self.store.configs.write();
        if configs.contains_key(&config.event_id) {
            return Err(ConflictError::ConfigurationExists(config.event_id).into());
        }
        configs.insert(config.event_id, config.clone());
        Ok(())
    }

    async fn get_by_event(&self, event_id: EventId) -> AppResult<Option<VotingConfiguration>> {
        Ok(self.store.configs.read().get(&event_id).cloned())
    }

    async fn update(&self, config: &VotingConfiguration) -> AppResult<()> {
        let mut configs = self.store.configs.write();
        if !configs.contains_key(&config.event_id) {
            return Err(NotFoundError::Configuration(config.event_id).into());
        }
        configs.insert(config.event_id, config.clone());
        Ok(())
    }
}

#[async_trait]
impl ResultsRepository for InMemoryBackend {
    async fn upsert(&self, results: &VotingResults) -> AppResult<()> {
        self.store
            .results
            .write()
            .insert(results.event_id, results.clone());
        Ok(())
    }

    async fn get_by_event(&self, event_id: EventId) -> AppResult<Option<VotingResults>> {
        Ok(self.store.results.read().get(&event_id).cloned())
    }
}

struct InMemoryLock {
    held: Arc<Store>,
    event_id: EventId,
    released: bool,
}

#[async_trait]
impl EventLock for InMemoryLock {
    async fn release(mut self: Box<Self>) -> AppResult<()> {
        self.held.held_locks.lock().remove(&self.event_id);
        self.released = true;
        Ok(())
    }
}

impl Drop for InMemoryLock {
    fn drop(&mut self) {
        if !self.released {
            self.held.held_locks.lock().remove(&self.event_id);
        }
    }
}

#[async_trait]
impl EventLockManager for InMemoryBackend {
    async fn acquire(&self, event_id: EventId) -> AppResult<Box<dyn EventLock>> {
        if !self.store.held_locks.lock().insert(event_id) {
            return Err(AppError::Conflict(ConflictError::ConstraintViolation {
                code: "event_lock_held".into(),
            }));
        }
        Ok(Box::new(InMemoryLock {
            held: Arc::clone(&self.store),
            event_id,
            released: false,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures;

    #[tokio::test]
    async fn test_event_round_trip() {
        let backend = InMemoryBackend::new();
        let author = fixtures::participant("ada");
        let event = fixtures::event(author.id);

        EventRepository::create(&backend, &event).await.unwrap();
        let fetched = EventRepository::get(&backend, event.id).await.unwrap();
        assert!(fetched.is_some());

        backend
            .update_stage(event.id, Stage::Registration)
            .await
            .unwrap();
        let fetched = EventRepository::get(&backend, event.id).await.unwrap().unwrap();
        assert_eq!(fetched.stage, Stage::Registration);
    }

    #[tokio::test]
    async fn test_duplicate_proposal_is_a_conflict() {
        let backend = InMemoryBackend::new();
        let author = fixtures::participant("ada");
        let event = fixtures::event(author.id);
        let proposal = fixtures::proposal(event.id, author.id);

        ProposalRepository::create(&backend, &proposal).await.unwrap();
        let again = fixtures::proposal(event.id, author.id);
        let err = ProposalRepository::create(&backend, &again).await.unwrap_err();
        assert_eq!(err.error_code(), "DUPLICATE_PROPOSAL");
    }

    #[tokio::test]
    async fn test_ballot_batch_completes_assignment_once() {
        let backend = InMemoryBackend::new();
        let event_id = EventId::new();
        let voter = ParticipantId::new();
        let proposal = ProposalId::new();
        let assignment = Assignment::new(event_id, voter, vec![proposal]);
        AssignmentRepository::create_batch(&backend, 7, &[assignment.clone()])
            .await
            .unwrap();

        let entry = BallotEntry::new(event_id, assignment.id, voter, proposal, 1);
        BallotRepository::create_batch(&backend, assignment.id, std::slice::from_ref(&entry))
            .await
            .unwrap();
        assert!(backend.assignment(assignment.id).unwrap().completed);

        let err =
            BallotRepository::create_batch(&backend, assignment.id, std::slice::from_ref(&entry))
                .await
                .unwrap_err();
        assert_eq!(err.error_code(), "DUPLICATE_BALLOT");
        assert_eq!(backend.ballot_count(), 1);
    }

    #[tokio::test]
    async fn test_ballots_listed_by_voter() {
        let backend = InMemoryBackend::new();
        let event_id = EventId::new();
        let voter = ParticipantId::new();
        let proposals = [ProposalId::new(), ProposalId::new()];
        let assignment = Assignment::new(event_id, voter, proposals.to_vec());
        AssignmentRepository::create_batch(&backend, 1, &[assignment.clone()])
            .await
            .unwrap();

        let entries: Vec<BallotEntry> = proposals
            .iter()
            .enumerate()
            .map(|(i, &p)| BallotEntry::new(event_id, assignment.id, voter, p, (i + 1) as u32))
            .collect();
        BallotRepository::create_batch(&backend, assignment.id, &entries)
            .await
            .unwrap();

        let mine = backend.list_by_voter(event_id, voter).await.unwrap();
        assert_eq!(mine.len(), 2);
        let none = backend
            .list_by_voter(event_id, ParticipantId::new())
            .await
            .unwrap();
        assert!(none.is_empty());
    }

    #[tokio::test]
    async fn test_lock_is_exclusive_per_event() {
        let backend = InMemoryBackend::new();
        let event_id = EventId::new();

        let guard = backend.acquire(event_id).await.unwrap();
        assert!(backend.acquire(event_id).await.is_err());
        assert!(backend.acquire(EventId::new()).await.is_ok());

        guard.release().await.unwrap();
        assert!(backend.acquire(event_id).await.is_ok());
    }
}
