#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

//! Tier classification and rule-table scoring.
//!
//! Converts a resolved spatial relationship into a named tier via a
//! category's ordered rule table ([`classify`]), then into a point value
//! via the category's closed tier table with modifiers applied
//! ([`score`]). Rule-table gaps are hard errors: a tier the table cannot
//! classify or score indicates a broken program configuration, and is
//! never silently treated as zero points.

mod classify;
mod score;

pub use classify::classify;
pub use score::score;

use thiserror::Error;

/// Errors from tier classification and scoring.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ScoringError {
    /// No classification rule matched and the category declares no
    /// fallback rule. The category's rule table is not exhaustive.
    #[error("no rule in category '{category}' matched the relationship and no fallback is declared")]
    UnmappedTier {
        /// The category whose rule table has the gap.
        category: String,
    },

    /// A classified tier is absent from the category's tier table.
    #[error("tier '{tier}' is not in category '{category}'s tier table")]
    UnscoredTier {
        /// The category whose tier table has the gap.
        category: String,
        /// The unrecognized tier name.
        tier: String,
    },
}
