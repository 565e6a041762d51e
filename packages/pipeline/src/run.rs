//! Batch orchestration with per-site fault isolation.

use parcel_scout_geodata::GeoFeatureStore;
use parcel_scout_pipeline_models::{BatchReport, BatchSummary, SiteOutcome, SiteStage};
use parcel_scout_resolver::{ResolveError, ResolveOptions, SpatialRelationship, resolve};
use parcel_scout_scoring::score;
use parcel_scout_scoring_models::{CategoryConfig, ProgramConfig};
use parcel_scout_site_models::Site;

use crate::PipelineError;
use crate::aggregate::aggregate;

/// Runs the scoring pipeline across a site collection.
///
/// Setup problems — an invalid program rule set, a program category with
/// no registered reference data — are fatal and abort the run before any
/// site is processed, since they make every result wrong. Per-site
/// problems never do: a site with unusable coordinates becomes an
/// `Unresolved` outcome, and a site whose data exposes a rule-table gap
/// becomes a `Failed` outcome, while its siblings continue.
///
/// Outcomes are returned in input order; ranking is a separate, explicit
/// step over the scored outcomes.
///
/// # Errors
///
/// Returns [`PipelineError`] for program validation failures and
/// unregistered categories.
pub fn run_batch(
    sites: &[Site],
    store: &GeoFeatureStore,
    program: &ProgramConfig,
) -> Result<BatchReport, PipelineError> {
    parcel_scout_program::validate(program)?;
    for category in &program.categories {
        store.get(&category.id)?;
    }

    log::info!(
        "Scoring {} sites against program '{}' ({} categories)",
        sites.len(),
        program.id,
        program.categories.len()
    );

    let outcomes: Vec<SiteOutcome> = sites
        .iter()
        .map(|site| evaluate_site(site, store, program))
        .collect();

    let mut summary = BatchSummary {
        total_sites: sites.len(),
        ..BatchSummary::default()
    };
    for outcome in &outcomes {
        match outcome {
            SiteOutcome::Scored { result } => {
                summary.scored += 1;
                if result.eliminated {
                    summary.eliminated += 1;
                }
            }
            SiteOutcome::Unresolved { .. } => summary.unresolved += 1,
            SiteOutcome::Failed { .. } => summary.failed += 1,
        }
    }

    log::info!(
        "Batch complete: {} scored ({} eliminated), {} unresolved, {} failed",
        summary.scored,
        summary.eliminated,
        summary.unresolved,
        summary.failed
    );

    Ok(BatchReport {
        run_id: uuid::Uuid::new_v4(),
        generated_at: chrono::Utc::now(),
        program_id: program.id.clone(),
        outcomes,
        summary,
    })
}

/// Runs one site through resolve → classify → score → aggregate.
///
/// The stage machine is `PENDING → RESOLVING → CLASSIFIED → SCORED →
/// AGGREGATED`, with `RESOLVING → UNRESOLVED` terminal for sites whose
/// coordinates never validate. A `Failed` outcome records the stage that
/// was running when the pipeline stopped.
fn evaluate_site(site: &Site, store: &GeoFeatureStore, program: &ProgramConfig) -> SiteOutcome {
    let mut relationships: Vec<(&CategoryConfig, SpatialRelationship)> =
        Vec::with_capacity(program.categories.len());
    for category in &program.categories {
        let options = ResolveOptions {
            search_radius_miles: category.search_radius_miles,
            source_priority: &category.source_priority,
        };
        match resolve(site, store, &category.id, &options) {
            Ok(relationship) => relationships.push((category, relationship)),
            Err(ResolveError::InvalidCoordinate(err)) => {
                log::warn!("Site '{}' unresolved: {err}", site.id);
                return SiteOutcome::Unresolved {
                    site_id: site.id.clone(),
                    reason: err.to_string(),
                };
            }
            Err(err @ ResolveError::CategoryNotLoaded(_)) => {
                return SiteOutcome::Failed {
                    site_id: site.id.clone(),
                    stage: SiteStage::Resolving,
                    error: err.to_string(),
                };
            }
        }
    }

    let mut category_scores = Vec::with_capacity(relationships.len());
    for (category, relationship) in &relationships {
        match score(category, site, relationship) {
            Ok(category_score) => category_scores.push(category_score),
            Err(err) => {
                log::warn!(
                    "Site '{}' failed scoring in category '{}': {err}",
                    site.id,
                    category.id
                );
                return SiteOutcome::Failed {
                    site_id: site.id.clone(),
                    stage: SiteStage::Classified,
                    error: err.to_string(),
                };
            }
        }
    }

    let result = aggregate(site, category_scores, program);
    log::debug!(
        "Site '{}' reached stage {}: {} points, eliminated={}",
        site.id,
        SiteStage::Aggregated,
        result.total_points,
        result.eliminated
    );

    SiteOutcome::Scored { result }
}
