//! Rule-table scoring with ordered modifiers.

use parcel_scout_resolver::SpatialRelationship;
use parcel_scout_scoring_models::{
    CategoryConfig, CategoryScore, Modifier, NO_DATA_TIER, string_value,
};
use parcel_scout_site_models::Site;

use crate::ScoringError;
use crate::classify::classify;

/// Scores a site's resolved relationship for one category.
///
/// Distance modifiers apply first and shift the effective distance before
/// classification (a risk multiplier on the matched feature's contaminant
/// type, for example, pulls the site into a tighter tier than its raw
/// distance would). The classified tier is then looked up in the
/// category's closed tier table, and point modifiers apply in declared
/// order. Every applied modifier is recorded on the score for audit.
///
/// Modifiers never touch a `NO_DATA` classification.
///
/// # Errors
///
/// Returns [`ScoringError::UnmappedTier`] when the category's rule table
/// is not exhaustive for this relationship, and
/// [`ScoringError::UnscoredTier`] when a classified tier is missing from
/// the tier table.
pub fn score(
    category: &CategoryConfig,
    site: &Site,
    relationship: &SpatialRelationship,
) -> Result<CategoryScore, ScoringError> {
    let raw_distance = relationship.distance_miles();
    let mut applied_modifiers = Vec::new();

    let (effective, effective_distance) =
        apply_distance_modifiers(category, relationship, &mut applied_modifiers);

    let tier_name = classify(category, &effective)?;
    let tier = category
        .tier(&tier_name)
        .ok_or_else(|| ScoringError::UnscoredTier {
            category: category.id.clone(),
            tier: tier_name.clone(),
        })?;

    let mut points = tier.points;
    if tier_name != NO_DATA_TIER {
        points = apply_point_modifiers(category, site, &effective, points, &mut applied_modifiers);
    }

    let matched = effective.matched();

    Ok(CategoryScore {
        category: category.id.clone(),
        tier: tier_name,
        severity: tier.severity,
        points,
        weight: category.weight,
        weighted_points: points * category.weight,
        distance_miles: raw_distance,
        effective_distance_miles: effective_distance,
        matched_feature_id: matched.map(|f| f.feature_id.clone()),
        matched_source: matched.map(|f| f.source.clone()),
        applied_modifiers,
    })
}

/// Applies `distance_scale` modifiers, returning the relationship to
/// classify and the effective distance when a modifier changed it.
fn apply_distance_modifiers(
    category: &CategoryConfig,
    relationship: &SpatialRelationship,
    applied: &mut Vec<String>,
) -> (SpatialRelationship, Option<f64>) {
    let SpatialRelationship::Nearby {
        mut distance_miles,
        feature,
    } = relationship.clone()
    else {
        // Containment is already the tightest relationship; no-data has no
        // distance to scale.
        return (relationship.clone(), None);
    };

    let original = distance_miles;

    for modifier in &category.modifiers {
        let Modifier::DistanceScale {
            attribute,
            factors,
            default,
        } = modifier
        else {
            continue;
        };

        let factor = feature
            .attributes
            .get(attribute)
            .map(string_value)
            .and_then(|key| factors.get(&key).copied())
            .unwrap_or(*default);

        if (factor - 1.0).abs() > f64::EPSILON {
            distance_miles /= factor;
            applied.push(format!(
                "distance_scale[{attribute}]: {original:.3} mi -> {distance_miles:.3} mi (factor {factor})"
            ));
        }
    }

    let effective_distance =
        ((distance_miles - original).abs() > f64::EPSILON).then_some(distance_miles);

    (
        SpatialRelationship::Nearby {
            distance_miles,
            feature,
        },
        effective_distance,
    )
}

/// Applies `points_scale` and `density_bonus` modifiers in declared order.
fn apply_point_modifiers(
    category: &CategoryConfig,
    site: &Site,
    relationship: &SpatialRelationship,
    mut points: f64,
    applied: &mut Vec<String>,
) -> f64 {
    for modifier in &category.modifiers {
        match modifier {
            Modifier::DistanceScale { .. } => {}
            Modifier::PointsScale {
                attribute,
                factors,
                default,
            } => {
                let Some(feature) = relationship.matched() else {
                    continue;
                };
                let factor = feature
                    .attributes
                    .get(attribute)
                    .map(string_value)
                    .and_then(|key| factors.get(&key).copied())
                    .unwrap_or(*default);

                if (factor - 1.0).abs() > f64::EPSILON {
                    points *= factor;
                    applied.push(format!("points_scale[{attribute}]: factor {factor}"));
                }
            }
            Modifier::DensityBonus {
                min_density_per_acre,
                points: bonus,
            } => {
                let qualifies = site
                    .density_per_acre
                    .is_some_and(|density| density >= *min_density_per_acre);
                if qualifies {
                    points += bonus;
                    applied.push(format!(
                        "density_bonus: +{bonus} points at >= {min_density_per_acre} units/acre"
                    ));
                }
            }
        }
    }

    points
}
