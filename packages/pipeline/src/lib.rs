#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

//! Composite aggregation and batch orchestration.
//!
//! [`aggregate`] combines a site's category scores into one
//! [`parcel_scout_pipeline_models::ScoreResult`], applying the program's
//! elimination rules; [`rank`] orders scored results into a total order
//! where an eliminated site never outranks a viable one. [`run_batch`]
//! drives the whole pipeline across a site collection, isolating per-site
//! failures so one bad site cannot abort its siblings.

mod aggregate;
mod run;

pub use aggregate::{aggregate, rank};
pub use run::run_batch;

use parcel_scout_geodata::CategoryNotLoadedError;
use parcel_scout_program::ProgramError;
use thiserror::Error;

/// Fatal, run-level errors. Per-site problems never surface here — they
/// are recorded on the affected site's outcome instead.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// The program rule set failed validation.
    #[error(transparent)]
    Program(#[from] ProgramError),

    /// A program category has no reference data registered in the store.
    #[error(transparent)]
    CategoryNotLoaded(#[from] CategoryNotLoadedError),
}
