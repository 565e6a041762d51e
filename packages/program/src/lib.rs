#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

//! Program rule-set loading and validation.
//!
//! Parses [`ProgramConfig`] rule sets from TOML and validates them before
//! any site is scored. A broken rule table (a rule referencing an unknown
//! tier, a category without the reserved `NO_DATA` tier, a non-positive
//! search radius) cannot produce valid results for any site, so validation
//! failures are fatal at startup rather than per-site errors.
//!
//! Ships a compile-time [`registry`] of embedded program definitions.

pub mod registry;

use parcel_scout_scoring_models::{
    CategoryConfig, EliminationRule, Modifier, NO_DATA_TIER, ProgramConfig, RulePredicate,
};
use std::collections::BTreeSet;
use thiserror::Error;

/// Errors from loading or validating a program rule set.
#[derive(Debug, Error)]
pub enum ProgramError {
    /// Reading the rule-set file failed.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// TOML parsing failed.
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    /// The parsed rule set is structurally invalid.
    #[error("invalid program configuration: {0}")]
    Invalid(String),
}

/// Parses and validates a program rule set from a TOML string.
///
/// # Errors
///
/// Returns [`ProgramError::Toml`] on parse failure and
/// [`ProgramError::Invalid`] when validation rejects the rule set.
pub fn load_program_str(toml_text: &str) -> Result<ProgramConfig, ProgramError> {
    let program: ProgramConfig = toml::from_str(toml_text)?;
    validate(&program)?;
    log::info!(
        "Loaded program '{}' with {} categories and {} elimination rules",
        program.id,
        program.categories.len(),
        program.eliminations.len()
    );
    Ok(program)
}

/// Parses and validates a program rule set from a TOML file.
///
/// # Errors
///
/// Returns [`ProgramError::Io`] if the file cannot be read, plus the
/// errors of [`load_program_str`].
pub fn load_program_file(path: &std::path::Path) -> Result<ProgramConfig, ProgramError> {
    let toml_text = std::fs::read_to_string(path)?;
    load_program_str(&toml_text)
}

/// Validates a program rule set.
///
/// # Errors
///
/// Returns [`ProgramError::Invalid`] naming the first violation found.
pub fn validate(program: &ProgramConfig) -> Result<(), ProgramError> {
    if program.id.is_empty() {
        return Err(invalid("program id is empty"));
    }
    if program.categories.is_empty() {
        return Err(invalid(format!(
            "program '{}' declares no categories",
            program.id
        )));
    }

    let mut category_ids = BTreeSet::new();
    for category in &program.categories {
        if !category_ids.insert(category.id.as_str()) {
            return Err(invalid(format!("duplicate category id '{}'", category.id)));
        }
        validate_category(category)?;
    }

    for elimination in &program.eliminations {
        validate_elimination(program, elimination)?;
    }

    Ok(())
}

fn validate_category(category: &CategoryConfig) -> Result<(), ProgramError> {
    let id = &category.id;
    if id.is_empty() {
        return Err(invalid("category id is empty"));
    }
    if !(category.weight.is_finite() && category.weight >= 0.0) {
        return Err(invalid(format!(
            "category '{id}' has invalid weight {}",
            category.weight
        )));
    }
    if !(category.search_radius_miles.is_finite() && category.search_radius_miles > 0.0) {
        return Err(invalid(format!(
            "category '{id}' has invalid search radius {}",
            category.search_radius_miles
        )));
    }

    let mut tier_names = BTreeSet::new();
    for tier in &category.tiers {
        if tier.name.is_empty() {
            return Err(invalid(format!("category '{id}' has a tier with no name")));
        }
        if !tier_names.insert(tier.name.as_str()) {
            return Err(invalid(format!(
                "category '{id}' declares tier '{}' twice",
                tier.name
            )));
        }
        if !tier.points.is_finite() {
            return Err(invalid(format!(
                "category '{id}' tier '{}' has non-finite points",
                tier.name
            )));
        }
    }
    if !tier_names.contains(NO_DATA_TIER) {
        return Err(invalid(format!(
            "category '{id}' is missing the reserved '{NO_DATA_TIER}' tier"
        )));
    }

    if category.rules.is_empty() {
        return Err(invalid(format!("category '{id}' declares no rules")));
    }
    for rule in &category.rules {
        if !tier_names.contains(rule.tier.as_str()) {
            return Err(invalid(format!(
                "category '{id}' rule references undeclared tier '{}'",
                rule.tier
            )));
        }
        if let RulePredicate::Within { distance_miles } = rule.predicate {
            if !(distance_miles.is_finite() && distance_miles >= 0.0) {
                return Err(invalid(format!(
                    "category '{id}' rule for tier '{}' has invalid distance bound {distance_miles}",
                    rule.tier
                )));
            }
            if distance_miles > category.search_radius_miles {
                log::warn!(
                    "Category '{id}' rule for tier '{}' has bound {distance_miles} mi beyond \
                     the {} mi search radius; it can only match via distance modifiers",
                    rule.tier,
                    category.search_radius_miles
                );
            }
        }
    }

    for modifier in &category.modifiers {
        validate_modifier(id, modifier)?;
    }

    Ok(())
}

fn validate_modifier(category_id: &str, modifier: &Modifier) -> Result<(), ProgramError> {
    match modifier {
        Modifier::DistanceScale {
            attribute,
            factors,
            default,
        }
        | Modifier::PointsScale {
            attribute,
            factors,
            default,
        } => {
            if attribute.is_empty() {
                return Err(invalid(format!(
                    "category '{category_id}' has a modifier with an empty attribute"
                )));
            }
            for (key, factor) in factors {
                if !(factor.is_finite() && *factor > 0.0) {
                    return Err(invalid(format!(
                        "category '{category_id}' modifier factor '{key}' is invalid ({factor})"
                    )));
                }
            }
            if !(default.is_finite() && *default > 0.0) {
                return Err(invalid(format!(
                    "category '{category_id}' modifier default factor is invalid ({default})"
                )));
            }
        }
        Modifier::DensityBonus {
            min_density_per_acre,
            points,
        } => {
            if !(min_density_per_acre.is_finite() && *min_density_per_acre >= 0.0) {
                return Err(invalid(format!(
                    "category '{category_id}' density bonus has invalid floor {min_density_per_acre}"
                )));
            }
            if !points.is_finite() {
                return Err(invalid(format!(
                    "category '{category_id}' density bonus has non-finite points"
                )));
            }
        }
    }
    Ok(())
}

fn validate_elimination(
    program: &ProgramConfig,
    elimination: &EliminationRule,
) -> Result<(), ProgramError> {
    let Some(category) = program.category(elimination.category()) else {
        return Err(invalid(format!(
            "elimination rule references undeclared category '{}'",
            elimination.category()
        )));
    };
    if elimination.reason().is_empty() {
        return Err(invalid(format!(
            "elimination rule on category '{}' has no reason text",
            category.id
        )));
    }

    match elimination {
        EliminationRule::TierIs { tier, .. } => {
            if category.tier(tier).is_none() {
                return Err(invalid(format!(
                    "elimination rule references undeclared tier '{tier}' in category '{}'",
                    category.id
                )));
            }
        }
        EliminationRule::WithinMiles { distance_miles, .. } => {
            if !(distance_miles.is_finite() && *distance_miles >= 0.0) {
                return Err(invalid(format!(
                    "elimination rule on category '{}' has invalid distance {distance_miles}",
                    category.id
                )));
            }
        }
    }
    Ok(())
}

fn invalid(message: impl Into<String>) -> ProgramError {
    ProgramError::Invalid(message.into())
}
