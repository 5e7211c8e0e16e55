//! Application layer for PeerRank
//!
//! This crate orchestrates domain logic and coordinates between layers.
//!
//! ## Modules
//!
//! - `engine` - the distributed voting engine: configuration feasibility,
//!   assignment generation, Modified Borda Count aggregation, quality
//!   assessment, and incentive adjustment
//! - `services` - business logic services gated by the event lifecycle
//! - `ports` - abstract persistence contracts the services depend on
//! - `validation` - request payload validation
//! - `dto` - response shapes produced by the services

pub mod dto;
pub mod engine;
pub mod ports;
pub mod services;
pub mod validation;

pub use dto::{AssignmentBatchSummary, BallotSummary, StageTransitionOutcome, VotingStatistics};
pub use services::{EventService, ProposalService, VotingService, VotingServiceConfig};
