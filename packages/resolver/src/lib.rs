#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

//! Spatial resolution of sites against reference feature categories.
//!
//! Answers "what is this site's relationship to category X": containment
//! inside a category polygon, distance to the nearest feature within a
//! configured search radius, or no-data when the category has no coverage
//! near the site. Distances are great-circle miles on a spherical earth,
//! which is well within tolerance for tier boundaries measured in tenths
//! of a mile.
//!
//! Overlapping polygons from different regional datasets are resolved by
//! an explicit, caller-declared source priority order — never by load
//! order.

use geo::{Closest, ClosestPoint, Contains, Point};
use parcel_scout_geodata::{
    CategoryNotLoadedError, FeatureGeometry, FeatureSet, GeoFeature, GeoFeatureStore,
    MatchedFeature,
};
use parcel_scout_site_models::{InvalidCoordinateError, Site};
use thiserror::Error;

/// Mean earth radius in miles (spherical approximation).
const EARTH_RADIUS_MILES: f64 = 3958.756;

/// Miles spanned by one degree of latitude; used only to convert a search
/// radius into a conservative degree-space pruning bound.
const MILES_PER_DEGREE: f64 = 69.0;

/// Per-query resolution options. Both fields come from the program's
/// category configuration — the resolver has no built-in radii or
/// priorities.
#[derive(Debug, Clone)]
pub struct ResolveOptions<'a> {
    /// Maximum nearest-feature search distance in miles. Features beyond
    /// this are treated as absent.
    pub search_radius_miles: f64,
    /// Source tags in authority order for overlap and distance-tie
    /// resolution. Sources not listed rank after every listed source.
    pub source_priority: &'a [String],
}

/// A site's resolved relationship to one feature category.
#[derive(Debug, Clone, PartialEq)]
pub enum SpatialRelationship {
    /// The site lies inside a polygon of the category. Distance is zero by
    /// definition.
    Contained {
        /// The selected containing polygon.
        feature: MatchedFeature,
    },
    /// The site is within the search radius of a feature, but not inside
    /// any polygon.
    Nearby {
        /// Great-circle distance to the matched feature, in miles.
        distance_miles: f64,
        /// The nearest feature.
        feature: MatchedFeature,
    },
    /// No feature of the category exists within the search radius. This is
    /// "reference data has no coverage here" — distinct from both "far
    /// away" and an error.
    NoData,
}

impl SpatialRelationship {
    /// Whether this is the no-data relationship.
    #[must_use]
    pub const fn is_no_data(&self) -> bool {
        matches!(self, Self::NoData)
    }

    /// Resolved distance in miles (`0` for containment, `None` for
    /// no-data).
    #[must_use]
    pub const fn distance_miles(&self) -> Option<f64> {
        match self {
            Self::Contained { .. } => Some(0.0),
            Self::Nearby { distance_miles, .. } => Some(*distance_miles),
            Self::NoData => None,
        }
    }

    /// The matched feature, if any.
    #[must_use]
    pub const fn matched(&self) -> Option<&MatchedFeature> {
        match self {
            Self::Contained { feature } | Self::Nearby { feature, .. } => Some(feature),
            Self::NoData => None,
        }
    }
}

/// Errors from spatial resolution.
#[derive(Debug, Error)]
pub enum ResolveError {
    /// The site's coordinates are missing or out of range.
    #[error("invalid site coordinates: {0}")]
    InvalidCoordinate(#[from] InvalidCoordinateError),

    /// The requested category has no loaded reference data.
    #[error(transparent)]
    CategoryNotLoaded(#[from] CategoryNotLoadedError),
}

/// Resolves a site's relationship to a feature category.
///
/// Containment is checked first against every polygon whose envelope
/// covers the site; when several contain it, the declared source priority
/// selects the winner. Otherwise the nearest feature within the search
/// radius wins, with distance ties broken by source priority and feature
/// id so resolution is fully deterministic.
///
/// # Errors
///
/// Returns [`ResolveError::InvalidCoordinate`] for unusable site
/// coordinates and [`ResolveError::CategoryNotLoaded`] if the category was
/// never registered with the store.
pub fn resolve(
    site: &Site,
    store: &GeoFeatureStore,
    category: &str,
    options: &ResolveOptions<'_>,
) -> Result<SpatialRelationship, ResolveError> {
    let coords = site.validated_coordinates()?;
    let set = store.get(category)?;
    let point = Point::new(coords.longitude, coords.latitude);

    if let Some(feature) = find_containing(set, point, options.source_priority) {
        log::debug!(
            "Site '{}' contained by feature '{}' ({category}, source '{}')",
            site.id,
            feature.feature_id,
            feature.source
        );
        return Ok(SpatialRelationship::Contained { feature });
    }

    match find_nearest(set, point, options) {
        Some((distance_miles, feature)) => {
            log::debug!(
                "Site '{}' nearest {category} feature '{}' at {distance_miles:.3} mi",
                site.id,
                feature.feature_id
            );
            Ok(SpatialRelationship::Nearby {
                distance_miles,
                feature,
            })
        }
        None => {
            log::debug!(
                "Site '{}' has no {category} feature within {} mi",
                site.id,
                options.search_radius_miles
            );
            Ok(SpatialRelationship::NoData)
        }
    }
}

/// Finds the containing polygon with the highest source priority.
fn find_containing(
    set: &FeatureSet,
    point: Point<f64>,
    source_priority: &[String],
) -> Option<MatchedFeature> {
    let mut best: Option<&GeoFeature> = None;
    let mut containing = 0_usize;

    for feature in set.envelope_candidates(point.x(), point.y()) {
        let FeatureGeometry::Polygon(polygon) = &feature.geometry else {
            continue;
        };
        if !polygon.contains(&point) {
            continue;
        }
        containing += 1;

        let better = best.is_none_or(|current| {
            let feature_key = (source_rank(source_priority, &feature.source), &feature.id);
            let current_key = (source_rank(source_priority, &current.source), &current.id);
            feature_key < current_key
        });
        if better {
            best = Some(feature);
        }
    }

    if containing > 1 {
        log::debug!(
            "{containing} overlapping polygons contain the point; selected source '{}'",
            best.map_or("", |f| f.source.as_str())
        );
    }

    best.map(MatchedFeature::from)
}

/// Finds the nearest feature within the search radius.
///
/// Scans R-tree candidates in ascending envelope-distance order and stops
/// once the envelope lower bound alone exceeds the radius, so only a
/// handful of features get an exact great-circle measurement.
fn find_nearest(
    set: &FeatureSet,
    point: Point<f64>,
    options: &ResolveOptions<'_>,
) -> Option<(f64, MatchedFeature)> {
    // Conservative degree-space bound: a degree of longitude shrinks with
    // latitude, so dividing by cos(lat) always over-covers.
    let cos_lat = point.y().to_radians().cos().max(0.01);
    let radius_degrees = options.search_radius_miles / (MILES_PER_DEGREE * cos_lat);

    let mut best: Option<(f64, &GeoFeature)> = None;

    for (feature, envelope_distance_2) in set.nearest_candidates(point.x(), point.y()) {
        if envelope_distance_2.sqrt() > radius_degrees {
            break;
        }

        let distance = feature_distance_miles(feature, point);
        if distance > options.search_radius_miles {
            continue;
        }

        let better = best.is_none_or(|(best_distance, best_feature)| {
            let candidate_key = (
                distance,
                source_rank(options.source_priority, &feature.source),
                &feature.id,
            );
            let best_key = (
                best_distance,
                source_rank(options.source_priority, &best_feature.source),
                &best_feature.id,
            );
            candidate_key < best_key
        });
        if better {
            best = Some((distance, feature));
        }
    }

    best.map(|(distance, feature)| (distance, MatchedFeature::from(feature)))
}

/// Great-circle distance from the query point to a feature, in miles.
///
/// For polygons this is the distance to the closest boundary point (zero
/// if the polygon contains the query, though containment is normally
/// handled before nearest search).
fn feature_distance_miles(feature: &GeoFeature, point: Point<f64>) -> f64 {
    match &feature.geometry {
        FeatureGeometry::Point(p) => haversine_miles(point, *p),
        FeatureGeometry::Polygon(mp) => mp
            .0
            .iter()
            .map(|polygon| match polygon.closest_point(&point) {
                Closest::Intersection(_) => 0.0,
                Closest::SinglePoint(closest) => haversine_miles(point, closest),
                Closest::Indeterminate => polygon
                    .exterior()
                    .points()
                    .map(|vertex| haversine_miles(point, vertex))
                    .fold(f64::INFINITY, f64::min),
            })
            .fold(f64::INFINITY, f64::min),
    }
}

/// Haversine great-circle distance in miles between two WGS84 points.
#[must_use]
pub fn haversine_miles(a: Point<f64>, b: Point<f64>) -> f64 {
    let lat_a = a.y().to_radians();
    let lat_b = b.y().to_radians();
    let d_lat = (b.y() - a.y()).to_radians();
    let d_lng = (b.x() - a.x()).to_radians();

    let h = (d_lat / 2.0).sin().powi(2)
        + lat_a.cos() * lat_b.cos() * (d_lng / 2.0).sin().powi(2);
    let c = 2.0 * h.sqrt().atan2((1.0 - h).sqrt());

    EARTH_RADIUS_MILES * c
}

/// Rank of a source in the declared priority order. Unlisted sources rank
/// after every listed one.
fn source_rank(source_priority: &[String], source: &str) -> usize {
    source_priority
        .iter()
        .position(|s| s == source)
        .unwrap_or(usize::MAX)
}
