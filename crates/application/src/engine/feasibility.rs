//! Configuration feasibility checks.
//!
//! Validates a voting configuration against the actual population sizes.
//! Hard violations make the configuration unusable; soft warnings are
//! reported but do not block.

use peerrank_domain::errors::{AppError, InfeasibilityError, ValidationError};
use peerrank_domain::VotingConfiguration;
use serde::Serialize;

/// Recommended minimum gap between the quality thresholds.
const RECOMMENDED_THRESHOLD_GAP: f64 = 0.1;

/// A soft recommendation the configuration does not meet.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FeasibilityWarning {
    /// `m` is below the convergence recommendation `⌈2·log₂(k)⌉`
    ConvergenceBelowRecommended {
        /// Configured subset size
        m: u32,
        /// Recommended minimum for `k` proposals
        recommended: u32,
    },
    /// The gap between `Q_good` and `Q_bad` is narrower than recommended
    NarrowQualityGap {
        /// Actual gap
        gap: f64,
    },
    /// `n × m` exceeds `√k`, so adjustments can dominate the ranking
    AdjustmentDominatesRanking {
        /// `n × m`
        reach: f64,
        /// `√k`
        bound: f64,
    },
}

/// Outcome of the feasibility check: hard violations in check order plus
/// soft warnings.
#[derive(Debug, Default)]
pub struct FeasibilityReport {
    /// Hard violations, in the order the checks run
    pub violations: Vec<AppError>,
    /// Soft recommendations not met
    pub warnings: Vec<FeasibilityWarning>,
}

impl FeasibilityReport {
    /// Whether the configuration can be used.
    pub fn is_feasible(&self) -> bool {
        self.violations.is_empty()
    }

    /// Return the warnings, or the first violation as an error.
    pub fn into_result(mut self) -> Result<Vec<FeasibilityWarning>, AppError> {
        if self.violations.is_empty() {
            Ok(self.warnings)
        } else {
            Err(self.violations.remove(0))
        }
    }
}

/// Run every check against the configuration and the current population
/// sizes (`n_participants` evaluators, `k_proposals` proposals).
pub fn check(
    config: &VotingConfiguration,
    n_participants: u64,
    k_proposals: u64,
) -> FeasibilityReport {
    let mut report = FeasibilityReport::default();
    let m = u64::from(config.attachments_per_evaluator);
    let min_evals = u64::from(config.min_evaluations_per_file);

    // 1. Positivity
    if m == 0 {
        report.violations.push(
            ValidationError::FieldValidation {
                field: "attachments_per_evaluator".into(),
                message: "must be positive".into(),
            }
            .into(),
        );
    }
    if min_evals == 0 {
        report.violations.push(
            ValidationError::FieldValidation {
                field: "min_evaluations_per_file".into(),
                message: "must be positive".into(),
            }
            .into(),
        );
    }

    // 2. Each evaluator cannot see more proposals than exist
    if m > k_proposals {
        report.violations.push(
            InfeasibilityError::SubsetExceedsProposals {
                m: config.attachments_per_evaluator,
                k: k_proposals as u32,
            }
            .into(),
        );
    }

    // 3. Threshold ordering and range
    if !(0.0..=1.0).contains(&config.quality_good_threshold)
        || !(0.0..=1.0).contains(&config.quality_bad_threshold)
    {
        report.violations.push(
            ValidationError::FieldValidation {
                field: "quality_thresholds".into(),
                message: "thresholds must be in [0, 1]".into(),
            }
            .into(),
        );
    } else if config.quality_good_threshold <= config.quality_bad_threshold {
        report.violations.push(
            ValidationError::FieldValidation {
                field: "quality_good_threshold".into(),
                message: "must be higher than quality_bad_threshold".into(),
            }
            .into(),
        );
    } else {
        let gap = config.quality_good_threshold - config.quality_bad_threshold;
        if gap < RECOMMENDED_THRESHOLD_GAP {
            report
                .warnings
                .push(FeasibilityWarning::NarrowQualityGap { gap });
        }
    }

    // 4. Coverage feasibility: n·m ≥ k·min_evals
    let available = n_participants.saturating_mul(m);
    let required = k_proposals.saturating_mul(min_evals);
    if available < required {
        report.violations.push(
            InfeasibilityError::CoverageInfeasible {
                required,
                available,
            }
            .into(),
        );
    }

    // 5. Convergence recommendation: m ≥ ⌈2·log₂(k)⌉
    if k_proposals > 1 {
        let recommended = (2.0 * (k_proposals as f64).log2()).ceil() as u32;
        if config.attachments_per_evaluator < recommended {
            report
                .warnings
                .push(FeasibilityWarning::ConvergenceBelowRecommended {
                    m: config.attachments_per_evaluator,
                    recommended,
                });
        }
    }

    // Soft bound: n·m ≤ √k keeps the adjustment from dominating the ranking
    let reach = f64::from(config.adjustment_magnitude) * m as f64;
    let bound = (k_proposals as f64).sqrt();
    if config.adjustment_magnitude > 0 && reach > bound {
        report
            .warnings
            .push(FeasibilityWarning::AdjustmentDominatesRanking { reach, bound });
    }

    report
}

/// Check the configuration and fail with the first violation.
pub fn ensure(
    config: &VotingConfiguration,
    n_participants: u64,
    k_proposals: u64,
) -> Result<Vec<FeasibilityWarning>, AppError> {
    check(config, n_participants, k_proposals).into_result()
}

#[cfg(test)]
mod tests {
    use super::*;
    use peerrank_domain::EventId;

    fn config(m: u32, min_evals: u32) -> VotingConfiguration {
        let mut c = VotingConfiguration::new(EventId::new(), m);
        c.min_evaluations_per_file = min_evals;
        c
    }

    #[test]
    fn test_valid_configuration_passes() {
        // 10 participants, 10 proposals, m=8 ≥ 2·log2(10) ≈ 6.64 → 7
        let report = check(&config(8, 3), 10, 10);
        assert!(report.is_feasible());
        assert!(report.into_result().is_ok());
    }

    #[test]
    fn test_zero_m_is_a_violation() {
        let report = check(&config(0, 3), 10, 10);
        assert!(!report.is_feasible());
        let err = report.into_result().unwrap_err();
        assert_eq!(err.error_code(), "INVALID_PAYLOAD");
    }

    #[test]
    fn test_m_exceeding_k_is_a_violation() {
        let report = check(&config(6, 1), 10, 5);
        let err = report.into_result().unwrap_err();
        assert_eq!(err.error_code(), "SUBSET_EXCEEDS_PROPOSALS");
    }

    #[test]
    fn test_coverage_infeasible() {
        // 2 participants, 5 proposals, m=4, min_evals=3: 8 < 15
        let report = check(&config(4, 3), 2, 5);
        assert!(!report.is_feasible());
        let err = report.into_result().unwrap_err();
        assert_eq!(err.error_code(), "COVERAGE_INFEASIBLE");
        assert_eq!(err.http_status(), 422);
    }

    #[test]
    fn test_checks_run_in_order() {
        // Both m > k and coverage fail; the subset violation comes first.
        let report = check(&config(10, 5), 1, 4);
        let err = report.into_result().unwrap_err();
        assert_eq!(err.error_code(), "SUBSET_EXCEEDS_PROPOSALS");
    }

    #[test]
    fn test_convergence_is_a_warning_not_a_rejection() {
        // k=64 → recommended m = 12; m=6 is low but usable
        let report = check(&config(6, 1), 100, 64);
        assert!(report.is_feasible());
        let warnings = report.into_result().unwrap();
        assert!(warnings
            .iter()
            .any(|w| matches!(w, FeasibilityWarning::ConvergenceBelowRecommended { recommended: 12, .. })));
    }

    #[test]
    fn test_narrow_threshold_gap_warns() {
        let mut c = config(8, 1);
        c.quality_good_threshold = 0.50;
        c.quality_bad_threshold = 0.45;
        let report = check(&c, 10, 10);
        assert!(report.is_feasible());
        assert!(report
            .warnings
            .iter()
            .any(|w| matches!(w, FeasibilityWarning::NarrowQualityGap { .. })));
    }

    #[test]
    fn test_inverted_thresholds_are_a_violation() {
        let mut c = config(8, 1);
        c.quality_good_threshold = 0.2;
        c.quality_bad_threshold = 0.8;
        let report = check(&c, 10, 10);
        assert!(!report.is_feasible());
    }

    #[test]
    fn test_adjustment_reach_warning() {
        // n=3, m=8 → reach 24 > √10
        let report = check(&config(8, 1), 10, 10);
        assert!(report
            .warnings
            .iter()
            .any(|w| matches!(w, FeasibilityWarning::AdjustmentDominatesRanking { .. })));
    }
}
