#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Program scoring rules as data.
//!
//! A housing-finance program's site scoring rules — tier tables,
//! classification predicates, modifiers, weights, elimination conditions —
//! are configuration, not code. One [`ProgramConfig`] captures everything
//! unique about a program/jurisdiction in a serializable struct, so the
//! same engine serves multiple programs by swapping TOML rule sets.
//!
//! Also defines [`CategoryScore`], the per-category output record.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Reserved tier name for "reference data has no coverage here".
///
/// Every category's tier table must include it (enforced at program
/// load), so missing data is always representable and never conflated
/// with a confirmed low-risk/no-benefit tier.
pub const NO_DATA_TIER: &str = "NO_DATA";

// ── Program definition ───────────────────────────────────────────────────

/// A complete, config-driven program scoring definition.
///
/// Loaded from TOML and validated before any site is scored.
#[derive(Debug, Clone, Deserialize)]
pub struct ProgramConfig {
    /// Unique program identifier (e.g. `"ca_ctcac_9pct"`).
    pub id: String,
    /// Human-readable program name.
    pub name: String,
    /// Scored categories, in declared order. Order is also the aggregation
    /// order, which keeps totals reproducible.
    #[serde(rename = "category")]
    pub categories: Vec<CategoryConfig>,
    /// Fatal-flaw conditions evaluated over the full category score set.
    #[serde(rename = "elimination", default)]
    pub eliminations: Vec<EliminationRule>,
}

impl ProgramConfig {
    /// Looks up a category config by id.
    #[must_use]
    pub fn category(&self, id: &str) -> Option<&CategoryConfig> {
        self.categories.iter().find(|c| c.id == id)
    }
}

/// One scored category's configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct CategoryConfig {
    /// Category identifier (e.g. `"transit"`, `"flood"`).
    pub id: String,
    /// Human-readable label.
    pub name: String,
    /// Weight applied to this category's points in the composite total.
    pub weight: f64,
    /// Maximum nearest-feature search distance in miles.
    pub search_radius_miles: f64,
    /// Dataset source tags in authority order, for overlap and
    /// distance-tie resolution. May be empty for single-source categories.
    #[serde(default)]
    pub source_priority: Vec<String>,
    /// The closed tier table: every tier this category may classify to.
    #[serde(rename = "tier")]
    pub tiers: Vec<TierDef>,
    /// Ordered classification rules; the first matching rule wins.
    #[serde(rename = "rule")]
    pub rules: Vec<TierRule>,
    /// Ordered modifiers applied by the scoring engine.
    #[serde(rename = "modifier", default)]
    pub modifiers: Vec<Modifier>,
}

impl CategoryConfig {
    /// Looks up a tier definition by name.
    #[must_use]
    pub fn tier(&self, name: &str) -> Option<&TierDef> {
        self.tiers.iter().find(|t| t.name == name)
    }
}

/// One entry in a category's closed tier table.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TierDef {
    /// Tier name in `SCREAMING_SNAKE_CASE` (e.g. `"TRANSIT_TOP"`).
    pub name: String,
    /// Points awarded for this tier, before modifiers and weighting.
    pub points: f64,
    /// Severity rank for ranking tie-breaks: 0 is best (least risk / most
    /// benefit), higher is worse.
    pub severity: u8,
}

/// One ordered classification rule.
#[derive(Debug, Clone, Deserialize)]
pub struct TierRule {
    /// The tier this rule classifies to. Must exist in the tier table.
    pub tier: String,
    /// The spatial predicate.
    #[serde(flatten)]
    pub predicate: RulePredicate,
    /// Optional attribute requirement on the matched feature; when it
    /// fails, classification falls through to the next rule.
    #[serde(default)]
    pub requires: Option<AttributeRequirement>,
}

/// The spatial predicate of a classification rule.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "match", rename_all = "snake_case")]
pub enum RulePredicate {
    /// The site lies inside a polygon of the category.
    Containment,
    /// The resolved distance is at most the bound (inclusive).
    /// Containment counts as distance zero.
    Within {
        /// Upper distance bound in miles.
        distance_miles: f64,
    },
    /// Matches any resolved relationship. Declared as the last rule of a
    /// category to make its table exhaustive.
    Fallback,
}

/// A declared requirement over a matched feature's attribute bag.
///
/// Numeric bounds parse string attribute values (CSV datasets load every
/// cell as a string); a missing or unparseable attribute fails the
/// requirement.
#[derive(Debug, Clone, Deserialize)]
pub struct AttributeRequirement {
    /// Attribute key to inspect.
    pub attribute: String,
    /// Minimum numeric value (inclusive).
    #[serde(default)]
    pub min: Option<f64>,
    /// Maximum numeric value (inclusive).
    #[serde(default)]
    pub max: Option<f64>,
    /// Exact string match.
    #[serde(default)]
    pub equals: Option<String>,
    /// String membership match.
    #[serde(default)]
    pub one_of: Option<Vec<String>>,
}

impl AttributeRequirement {
    /// Evaluates the requirement against an attribute bag.
    #[must_use]
    pub fn is_satisfied_by(&self, attributes: &BTreeMap<String, serde_json::Value>) -> bool {
        let Some(value) = attributes.get(&self.attribute) else {
            return false;
        };

        if self.min.is_some() || self.max.is_some() {
            let Some(number) = numeric_value(value) else {
                return false;
            };
            if self.min.is_some_and(|min| number < min) {
                return false;
            }
            if self.max.is_some_and(|max| number > max) {
                return false;
            }
        }

        if let Some(expected) = &self.equals
            && string_value(value) != *expected
        {
            return false;
        }

        if let Some(allowed) = &self.one_of
            && !allowed.contains(&string_value(value))
        {
            return false;
        }

        true
    }
}

/// Numeric view of an attribute value (numbers, or strings that parse).
#[must_use]
pub fn numeric_value(value: &serde_json::Value) -> Option<f64> {
    match value {
        serde_json::Value::Number(n) => n.as_f64(),
        serde_json::Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// String view of an attribute value.
#[must_use]
pub fn string_value(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

// ── Modifiers ────────────────────────────────────────────────────────────

/// An ordered scoring modifier.
///
/// Distance modifiers shift the effective distance before classification;
/// point modifiers adjust the looked-up tier points. Modifiers never apply
/// to a `NO_DATA` classification — there is nothing to modify.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Modifier {
    /// Divides the resolved distance by an attribute-keyed factor before
    /// classification (e.g. a contaminant-type risk multiplier pulling
    /// high-risk sites into tighter tiers).
    DistanceScale {
        /// Attribute key on the matched feature.
        attribute: String,
        /// Factor per attribute value.
        factors: BTreeMap<String, f64>,
        /// Factor when the attribute value is absent from `factors`.
        #[serde(default = "default_factor")]
        default: f64,
    },
    /// Multiplies the tier points by an attribute-keyed factor.
    PointsScale {
        /// Attribute key on the matched feature.
        attribute: String,
        /// Factor per attribute value.
        factors: BTreeMap<String, f64>,
        /// Factor when the attribute value is absent from `factors`.
        #[serde(default = "default_factor")]
        default: f64,
    },
    /// Adds bonus points when the site's proposed density clears a floor.
    DensityBonus {
        /// Minimum units per acre to qualify.
        min_density_per_acre: f64,
        /// Bonus points added.
        points: f64,
    },
}

const fn default_factor() -> f64 {
    1.0
}

// ── Elimination rules ────────────────────────────────────────────────────

/// A fatal-flaw condition. Any firing rule marks the site eliminated
/// regardless of its numeric score.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EliminationRule {
    /// A category classified to a named tier.
    TierIs {
        /// Category id.
        category: String,
        /// Disqualifying tier name.
        tier: String,
        /// Human-readable reason recorded on the result.
        reason: String,
    },
    /// A category's matched feature lies within a distance of the site
    /// (e.g. a competing same-program development inside the exclusion
    /// radius).
    WithinMiles {
        /// Category id.
        category: String,
        /// Exclusion distance in miles (inclusive).
        distance_miles: f64,
        /// Human-readable reason recorded on the result.
        reason: String,
    },
}

impl EliminationRule {
    /// The category this rule inspects.
    #[must_use]
    pub fn category(&self) -> &str {
        match self {
            Self::TierIs { category, .. } | Self::WithinMiles { category, .. } => category,
        }
    }

    /// The recorded reason text.
    #[must_use]
    pub fn reason(&self) -> &str {
        match self {
            Self::TierIs { reason, .. } | Self::WithinMiles { reason, .. } => reason,
        }
    }
}

// ── Category score record ────────────────────────────────────────────────

/// Point value and supporting evidence for one category on one site.
///
/// Every score is traceable: the tier, the matched feature, the distances
/// before and after modifiers, and each modifier that applied.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryScore {
    /// Category id.
    pub category: String,
    /// Classified tier name.
    pub tier: String,
    /// The tier's severity rank (0 best).
    pub severity: u8,
    /// Points after modifiers, before weighting.
    pub points: f64,
    /// The category weight from the program config.
    pub weight: f64,
    /// `points * weight`, the category's contribution to the total.
    pub weighted_points: f64,
    /// Resolved great-circle distance in miles (`None` for no-data).
    pub distance_miles: Option<f64>,
    /// Distance after distance modifiers, when one applied.
    pub effective_distance_miles: Option<f64>,
    /// Matched feature id, when a feature matched.
    pub matched_feature_id: Option<String>,
    /// Source dataset of the matched feature.
    pub matched_source: Option<String>,
    /// Human-readable log of modifiers that applied, in order.
    pub applied_modifiers: Vec<String>,
}
