//! The distributed voting engine.
//!
//! Pure, synchronous computation over domain values; persistence and stage
//! gating happen in the service layer. Stages run in sequence:
//!
//! 1. [`feasibility`] - can the configured parameters be satisfied at all
//! 2. [`assignment`] - who evaluates what (two-phase balanced random)
//! 3. [`tally`] - Modified Borda Count aggregation into the global ranking
//! 4. [`quality`] - per-evaluator alignment with the global consensus
//! 5. [`incentive`] - rank bonus/penalty applied to each evaluator's proposal

pub mod assignment;
pub mod feasibility;
pub mod incentive;
pub mod quality;
pub mod tally;
