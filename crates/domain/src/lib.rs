//! PeerRank Domain Types
//!
//! This crate provides the core domain model for the PeerRank distributed
//! peer-evaluation platform: events with a gated lifecycle, participants,
//! proposals, and the voting aggregate (configuration, assignments, ballots,
//! results).
//!
//! ## Architecture
//!
//! - **identifiers**: Strongly-typed UUID-based identifiers for all entities
//! - **event**: The event aggregate and its lifecycle stage machine
//! - **participant**: Participants and roles
//! - **proposal**: Proposal metadata submitted by participants
//! - **voting**: Voting configuration, assignments, ballot entries, results
//! - **errors**: Error taxonomy with machine-readable codes and HTTP status codes

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod errors;
pub mod event;
pub mod identifiers;
pub mod participant;
pub mod proposal;
pub mod voting;

pub use errors::{AppError, AppResult, ErrorResponse};
pub use event::{Event, Stage};
pub use identifiers::*;
pub use participant::{Participant, Role};
pub use proposal::Proposal;
pub use voting::{
    Assignment, BallotEntry, ProposalStanding, VotingConfiguration, VotingResults,
};
