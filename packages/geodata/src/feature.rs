//! Reference feature types and the per-category R-tree index.

use std::collections::BTreeMap;

use geo::{BoundingRect, MultiPolygon, Point};
use rstar::{AABB, PointDistance, RTree, RTreeObject};

/// Geometry of a reference feature, already normalized to WGS84.
#[derive(Debug, Clone, PartialEq)]
pub enum FeatureGeometry {
    /// A zone, boundary, or designated-area polygon.
    Polygon(MultiPolygon<f64>),
    /// A point feature (transit stop, contamination site, development).
    Point(Point<f64>),
}

impl FeatureGeometry {
    /// Returns `true` for polygon geometry.
    #[must_use]
    pub const fn is_polygon(&self) -> bool {
        matches!(self, Self::Polygon(_))
    }

    /// Bounding box envelope in `[lng, lat]` degree space.
    #[must_use]
    pub fn envelope(&self) -> AABB<[f64; 2]> {
        match self {
            Self::Polygon(mp) => mp.bounding_rect().map_or_else(
                || AABB::from_point([0.0, 0.0]),
                |rect| {
                    AABB::from_corners([rect.min().x, rect.min().y], [rect.max().x, rect.max().y])
                },
            ),
            Self::Point(p) => AABB::from_point([p.x(), p.y()]),
        }
    }
}

/// One reference geographic object owned by the store.
///
/// Every feature is tagged with the dataset source it was loaded from so
/// that overlap tie-breaks and score evidence can name the originating
/// feed.
#[derive(Debug, Clone, PartialEq)]
pub struct GeoFeature {
    /// Feature identifier, unique within its source dataset.
    pub id: String,
    /// Source dataset tag assigned at load time.
    pub source: String,
    /// WGS84 geometry.
    pub geometry: FeatureGeometry,
    /// Category-specific attributes (flood-zone code, contaminant type,
    /// service frequency estimate, designation type, ...).
    pub attributes: BTreeMap<String, serde_json::Value>,
}

/// The evidence projection of a matched feature: everything downstream
/// classification and scoring need, without the geometry.
#[derive(Debug, Clone, PartialEq)]
pub struct MatchedFeature {
    /// Matched feature id.
    pub feature_id: String,
    /// Source dataset the feature came from.
    pub source: String,
    /// The feature's attribute bag.
    pub attributes: BTreeMap<String, serde_json::Value>,
}

impl From<&GeoFeature> for MatchedFeature {
    fn from(feature: &GeoFeature) -> Self {
        Self {
            feature_id: feature.id.clone(),
            source: feature.source.clone(),
            attributes: feature.attributes.clone(),
        }
    }
}

/// An R-tree entry referencing a feature by index.
///
/// The tree stores envelopes only; exact geometry tests go back through
/// [`FeatureSet::feature`].
#[derive(Debug)]
struct IndexedEntry {
    index: usize,
    envelope: AABB<[f64; 2]>,
}

impl RTreeObject for IndexedEntry {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        self.envelope
    }
}

impl PointDistance for IndexedEntry {
    fn distance_2(&self, point: &[f64; 2]) -> f64 {
        self.envelope.distance_2(point)
    }
}

/// An immutable, indexed collection of features for one category.
///
/// Built once at load time and read-only afterwards, so it can be shared
/// across worker threads without locking.
#[derive(Debug)]
pub struct FeatureSet {
    features: Vec<GeoFeature>,
    tree: RTree<IndexedEntry>,
}

impl FeatureSet {
    /// Builds the R-tree index over the given features.
    #[must_use]
    pub fn from_features(features: Vec<GeoFeature>) -> Self {
        let entries = features
            .iter()
            .enumerate()
            .map(|(index, feature)| IndexedEntry {
                index,
                envelope: feature.geometry.envelope(),
            })
            .collect();

        Self {
            features,
            tree: RTree::bulk_load(entries),
        }
    }

    /// Consumes the set, returning its features (used when concatenating
    /// another dataset into the same category).
    #[must_use]
    pub fn into_features(self) -> Vec<GeoFeature> {
        self.features
    }

    /// Number of features in the set.
    #[must_use]
    pub fn len(&self) -> usize {
        self.features.len()
    }

    /// Whether the set holds no features.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    /// All features, in load order.
    #[must_use]
    pub fn features(&self) -> &[GeoFeature] {
        &self.features
    }

    /// Features whose envelope contains the query point. Candidates for an
    /// exact point-in-polygon test.
    pub fn envelope_candidates(&self, lng: f64, lat: f64) -> impl Iterator<Item = &GeoFeature> {
        let query = AABB::from_point([lng, lat]);
        self.tree
            .locate_in_envelope_intersecting(&query)
            .map(move |entry| &self.features[entry.index])
    }

    /// Features ordered by ascending envelope distance from the query
    /// point, paired with the squared degree-space envelope distance.
    ///
    /// The envelope distance is a lower bound on the true distance, so a
    /// caller scanning in order may stop once the bound exceeds its search
    /// radius.
    pub fn nearest_candidates(
        &self,
        lng: f64,
        lat: f64,
    ) -> impl Iterator<Item = (&GeoFeature, f64)> {
        self.tree
            .nearest_neighbor_iter_with_distance_2(&[lng, lat])
            .map(move |(entry, distance_2)| (&self.features[entry.index], distance_2))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::polygon;

    fn square(source: &str, id: &str) -> GeoFeature {
        GeoFeature {
            id: id.to_owned(),
            source: source.to_owned(),
            geometry: FeatureGeometry::Polygon(MultiPolygon(vec![polygon![
                (x: -1.0, y: -1.0),
                (x: 1.0, y: -1.0),
                (x: 1.0, y: 1.0),
                (x: -1.0, y: 1.0),
                (x: -1.0, y: -1.0),
            ]])),
            attributes: BTreeMap::new(),
        }
    }

    #[test]
    fn envelope_candidates_hit_containing_square() {
        let set = FeatureSet::from_features(vec![square("src", "sq-1")]);
        let hits: Vec<_> = set.envelope_candidates(0.5, 0.5).collect();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, "sq-1");
    }

    #[test]
    fn envelope_candidates_miss_outside_point() {
        let set = FeatureSet::from_features(vec![square("src", "sq-1")]);
        assert_eq!(set.envelope_candidates(5.0, 5.0).count(), 0);
    }

    #[test]
    fn nearest_candidates_order_by_envelope_distance() {
        let near = GeoFeature {
            id: "near".to_owned(),
            source: "src".to_owned(),
            geometry: FeatureGeometry::Point(Point::new(0.1, 0.0)),
            attributes: BTreeMap::new(),
        };
        let far = GeoFeature {
            id: "far".to_owned(),
            source: "src".to_owned(),
            geometry: FeatureGeometry::Point(Point::new(3.0, 0.0)),
            attributes: BTreeMap::new(),
        };
        let set = FeatureSet::from_features(vec![far, near]);
        let ordered: Vec<_> = set
            .nearest_candidates(0.0, 0.0)
            .map(|(f, _)| f.id.as_str())
            .collect();
        assert_eq!(ordered, vec!["near", "far"]);
    }

    #[test]
    fn empty_set_yields_no_candidates() {
        let set = FeatureSet::from_features(Vec::new());
        assert!(set.is_empty());
        assert_eq!(set.nearest_candidates(0.0, 0.0).count(), 0);
    }
}
