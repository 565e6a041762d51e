#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Composite score results and batch run records.
//!
//! These are the records downstream reporting consumes: one
//! [`ScoreResult`] per scored site, [`SiteOutcome`] wrapping the
//! per-site success/unresolved/failure split, and a [`BatchReport`] for
//! the whole run.

use chrono::{DateTime, Utc};
use parcel_scout_scoring_models::CategoryScore;
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

/// Pipeline stage a site has reached.
///
/// Stages advance strictly in order; `Unresolved` is the terminal stage
/// for sites whose coordinates never validated.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum SiteStage {
    /// Not yet processed.
    Pending,
    /// Spatial relationships being resolved.
    Resolving,
    /// Relationships classified into tiers.
    Classified,
    /// Category points assigned.
    Scored,
    /// Composite result produced. Terminal.
    Aggregated,
    /// Coordinates missing or invalid. Terminal.
    Unresolved,
}

impl SiteStage {
    /// Whether the stage is terminal.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Aggregated | Self::Unresolved)
    }
}

/// The composite scoring record for one site.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoreResult {
    /// The evaluated site's id.
    pub site_id: String,
    /// Weighted total across all categories. Computed even for eliminated
    /// sites, for audit.
    pub total_points: f64,
    /// Per-category breakdown, in the program's declared category order.
    pub category_scores: Vec<CategoryScore>,
    /// Whether a fatal-flaw rule fired. An eliminated site is non-viable
    /// regardless of its numeric score.
    pub eliminated: bool,
    /// Reason text of each fired elimination rule, in declared order.
    pub elimination_reasons: Vec<String>,
}

impl ScoreResult {
    /// Re-aggregates the stored breakdown. Summing the weighted category
    /// points in stored order reproduces [`Self::total_points`] exactly.
    #[must_use]
    pub fn recomputed_total(&self) -> f64 {
        self.category_scores
            .iter()
            .map(|score| score.weighted_points)
            .sum()
    }

    /// Sum of tier severity ranks across categories. Lower is better;
    /// used as a ranking tie-break.
    #[must_use]
    pub fn aggregate_severity(&self) -> u32 {
        self.category_scores
            .iter()
            .map(|score| u32::from(score.severity))
            .sum()
    }
}

/// Outcome of one site's pipeline run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum SiteOutcome {
    /// The site was scored end to end.
    #[serde(rename_all = "camelCase")]
    Scored {
        /// The composite result.
        result: ScoreResult,
    },
    /// The site never entered spatial resolution (missing or invalid
    /// coordinates).
    #[serde(rename_all = "camelCase")]
    Unresolved {
        /// The site's id.
        site_id: String,
        /// Why resolution was impossible.
        reason: String,
    },
    /// The pipeline failed for this site only (e.g. a rule-table gap
    /// surfaced by its data). Sibling sites are unaffected.
    #[serde(rename_all = "camelCase")]
    Failed {
        /// The site's id.
        site_id: String,
        /// The stage that was running when the failure occurred.
        stage: SiteStage,
        /// The error message.
        error: String,
    },
}

impl SiteOutcome {
    /// The site this outcome belongs to.
    #[must_use]
    pub fn site_id(&self) -> &str {
        match self {
            Self::Scored { result } => &result.site_id,
            Self::Unresolved { site_id, .. } | Self::Failed { site_id, .. } => site_id,
        }
    }

    /// The score result, when the site was scored.
    #[must_use]
    pub const fn as_scored(&self) -> Option<&ScoreResult> {
        match self {
            Self::Scored { result } => Some(result),
            _ => None,
        }
    }
}

/// Counts of per-site outcomes in a batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchSummary {
    /// Sites in the batch.
    pub total_sites: usize,
    /// Sites scored end to end.
    pub scored: usize,
    /// Scored sites with a fired elimination rule.
    pub eliminated: usize,
    /// Sites with unusable coordinates.
    pub unresolved: usize,
    /// Sites that failed mid-pipeline.
    pub failed: usize,
}

/// The full record of one batch run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchReport {
    /// Unique run identifier.
    pub run_id: uuid::Uuid,
    /// When the run completed.
    pub generated_at: DateTime<Utc>,
    /// The program rule set that was applied.
    pub program_id: String,
    /// Per-site outcomes, in input order.
    pub outcomes: Vec<SiteOutcome>,
    /// Outcome counts.
    pub summary: BatchSummary,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn category_score(category: &str, severity: u8, weighted: f64) -> CategoryScore {
        CategoryScore {
            category: category.to_owned(),
            tier: "TIER".to_owned(),
            severity,
            points: weighted,
            weight: 1.0,
            weighted_points: weighted,
            distance_miles: None,
            effective_distance_miles: None,
            matched_feature_id: None,
            matched_source: None,
            applied_modifiers: Vec::new(),
        }
    }

    #[test]
    fn recomputed_total_matches_stored_total() {
        let scores = vec![
            category_score("transit", 1, 5.0),
            category_score("flood", 0, 4.0),
            category_score("environmental", 2, 2.0),
        ];
        let total: f64 = scores.iter().map(|s| s.weighted_points).sum();
        let result = ScoreResult {
            site_id: "s1".to_owned(),
            total_points: total,
            category_scores: scores,
            eliminated: false,
            elimination_reasons: Vec::new(),
        };
        assert!((result.recomputed_total() - result.total_points).abs() < f64::EPSILON);
    }

    #[test]
    fn aggregate_severity_sums_category_ranks() {
        let result = ScoreResult {
            site_id: "s1".to_owned(),
            total_points: 0.0,
            category_scores: vec![
                category_score("transit", 1, 0.0),
                category_score("flood", 4, 0.0),
            ],
            eliminated: false,
            elimination_reasons: Vec::new(),
        };
        assert_eq!(result.aggregate_severity(), 5);
    }

    #[test]
    fn site_stage_serializes_screaming_snake() {
        assert_eq!(SiteStage::Resolving.to_string(), "RESOLVING");
        assert_eq!(
            "UNRESOLVED".parse::<SiteStage>().unwrap(),
            SiteStage::Unresolved
        );
        assert!(SiteStage::Unresolved.is_terminal());
        assert!(!SiteStage::Scored.is_terminal());
    }

    #[test]
    fn outcome_serializes_with_status_tag() {
        let outcome = SiteOutcome::Unresolved {
            site_id: "s9".to_owned(),
            reason: "site has no geocoded coordinates".to_owned(),
        };
        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(json["status"], "unresolved");
        assert_eq!(json["siteId"], "s9");
    }
}
