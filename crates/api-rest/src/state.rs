//! Application state: services wired over the PostgreSQL repositories.

use crate::config::ApiConfig;
use peerrank_application::ports::{
    AssignmentRepository, BallotRepository, ConfigurationRepository, EventLockManager,
    EventRepository, ParticipantRepository, ProposalRepository, ResultsRepository,
};
use peerrank_application::{EventService, ProposalService, VotingService, VotingServiceConfig};
use peerrank_infrastructure::{
    DatabaseConfig, DatabasePool, PgAssignmentRepository, PgBallotRepository,
    PgConfigurationRepository, PgEventLockManager, PgEventRepository, PgParticipantRepository,
    PgProposalRepository, PgResultsRepository,
};
use std::sync::Arc;
use std::time::Duration;

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    /// Event lifecycle operations
    pub events: Arc<EventService>,
    /// Proposal metadata operations
    pub proposals: Arc<ProposalService>,
    /// Voting engine operations
    pub voting: Arc<VotingService>,
    /// Pool handle, kept for health probes
    pub db: DatabasePool,
}

impl AppState {
    /// Connect to the database and wire the full service stack.
    pub async fn initialize(config: &ApiConfig) -> anyhow::Result<Self> {
        let db_config = DatabaseConfig::from_env()?;
        let db = DatabasePool::connect(&db_config).await?;
        let pool = db.pool().clone();

        let events: Arc<dyn EventRepository> = Arc::new(PgEventRepository::new(pool.clone()));
        let participants: Arc<dyn ParticipantRepository> =
            Arc::new(PgParticipantRepository::new(pool.clone()));
        let proposals: Arc<dyn ProposalRepository> =
            Arc::new(PgProposalRepository::new(pool.clone()));
        let assignments: Arc<dyn AssignmentRepository> =
            Arc::new(PgAssignmentRepository::new(pool.clone()));
        let ballots: Arc<dyn BallotRepository> = Arc::new(PgBallotRepository::new(pool.clone()));
        let configs: Arc<dyn ConfigurationRepository> =
            Arc::new(PgConfigurationRepository::new(pool.clone()));
        let results: Arc<dyn ResultsRepository> =
            Arc::new(PgResultsRepository::new(pool.clone()));
        let locks: Arc<dyn EventLockManager> = Arc::new(PgEventLockManager::new(pool));

        let event_service = EventService::new(
            Arc::clone(&events),
            Arc::clone(&participants),
            Arc::clone(&proposals),
            Arc::clone(&assignments),
            Arc::clone(&configs),
        );
        let proposal_service = ProposalService::new(
            Arc::clone(&events),
            Arc::clone(&participants),
            Arc::clone(&proposals),
        );
        let voting_service = VotingService::new(
            events,
            participants,
            proposals,
            assignments,
            ballots,
            configs,
            results,
            locks,
            VotingServiceConfig {
                operation_timeout: Duration::from_secs(config.request_timeout_seconds),
                ..VotingServiceConfig::default()
            },
        );

        Ok(Self {
            events: Arc::new(event_service),
            proposals: Arc::new(proposal_service),
            voting: Arc::new(voting_service),
            db,
        })
    }
}
