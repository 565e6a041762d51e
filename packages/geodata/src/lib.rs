#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

//! Reference geodata store for site eligibility scoring.
//!
//! Loads per-category reference datasets (flood zones, transit stops and
//! quality areas, contamination sites, income-designation boundaries,
//! competing developments) into immutable R-tree indexed feature sets.
//! Datasets are registered once at startup; the resulting indexes are
//! read-only and shared by every site evaluated in a run.
//!
//! Fetching raw files over the network is the surrounding application's
//! job — this crate only parses local files and in-memory collections.

mod feature;
mod load;

pub use feature::{FeatureGeometry, FeatureSet, GeoFeature, MatchedFeature};
pub use load::{CsvColumns, DatasetSource};

use std::collections::BTreeMap;

use thiserror::Error;

/// Errors from loading a reference dataset.
#[derive(Debug, Error)]
pub enum DatasetLoadError {
    /// Reading the dataset file failed.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// GeoJSON parsing failed.
    #[error("GeoJSON error: {0}")]
    GeoJson(#[from] geojson::Error),

    /// CSV parsing failed.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// The document declares a coordinate system other than WGS84.
    #[error("unsupported coordinate system: {crs}")]
    UnsupportedCrs {
        /// The declared CRS name.
        crs: String,
    },

    /// A declared CSV column is not present in the header row.
    #[error("CSV is missing declared column '{column}'")]
    MissingColumn {
        /// The missing column name.
        column: String,
    },
}

/// Error returned when querying a category no dataset was registered for.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("no reference data loaded for category '{category}'")]
pub struct CategoryNotLoadedError {
    /// The unknown category id.
    pub category: String,
}

/// Per-category reference feature store.
///
/// Multiple datasets may be registered under one category (e.g. two
/// regional transit feeds); they concatenate into a single queryable set,
/// with every feature tagged by its source for tie-breaks and audit.
#[derive(Default)]
pub struct GeoFeatureStore {
    categories: BTreeMap<String, FeatureSet>,
}

impl GeoFeatureStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads a dataset under `category`, tagging its features with
    /// `source_id`, and rebuilds that category's index. Returns the number
    /// of features the dataset contributed.
    ///
    /// A dataset that parses to zero usable features still registers the
    /// category: "loaded but empty" resolves to no-data downstream, which
    /// is distinct from "never loaded".
    ///
    /// # Errors
    ///
    /// Returns [`DatasetLoadError`] if the source is missing, malformed,
    /// or declares a non-WGS84 coordinate system.
    pub fn load(
        &mut self,
        category: &str,
        source_id: &str,
        source: DatasetSource,
    ) -> Result<usize, DatasetLoadError> {
        let loaded = load::load_source(source_id, source)?;
        let count = loaded.len();

        let mut features = self
            .categories
            .remove(category)
            .map(FeatureSet::into_features)
            .unwrap_or_default();
        features.extend(loaded);

        log::info!(
            "Registered {count} features from source '{source_id}' under category \
             '{category}' ({} total)",
            features.len()
        );

        self.categories
            .insert(category.to_owned(), FeatureSet::from_features(features));

        Ok(count)
    }

    /// Returns the feature set for a category.
    ///
    /// # Errors
    ///
    /// Returns [`CategoryNotLoadedError`] if no dataset was registered
    /// under the category.
    pub fn get(&self, category: &str) -> Result<&FeatureSet, CategoryNotLoadedError> {
        self.categories
            .get(category)
            .ok_or_else(|| CategoryNotLoadedError {
                category: category.to_owned(),
            })
    }

    /// Registered category ids, in sorted order.
    pub fn categories(&self) -> impl Iterator<Item = &str> {
        self.categories.keys().map(String::as_str)
    }
}
