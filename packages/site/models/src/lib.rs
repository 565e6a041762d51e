#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Candidate site types for parcel eligibility scoring.
//!
//! A [`Site`] is one parcel under evaluation. Sites arrive from an upstream
//! geocoding step that may have failed, so coordinates are optional: a site
//! without coordinates is reported as unresolved by the pipeline rather
//! than being scored against made-up coordinates like `(0, 0)`.

use serde::{Deserialize, Serialize};

/// A validated WGS84 coordinate pair in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Coordinates {
    /// Latitude in decimal degrees, -90 to 90.
    pub latitude: f64,
    /// Longitude in decimal degrees, -180 to 180.
    pub longitude: f64,
}

impl Coordinates {
    /// Checks that both components are finite and within WGS84 range.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidCoordinateError`] if either component is
    /// non-finite or out of range.
    pub fn validate(self) -> Result<Self, InvalidCoordinateError> {
        let in_range = self.latitude.is_finite()
            && self.longitude.is_finite()
            && (-90.0..=90.0).contains(&self.latitude)
            && (-180.0..=180.0).contains(&self.longitude);

        if in_range {
            Ok(self)
        } else {
            Err(InvalidCoordinateError {
                latitude: self.latitude,
                longitude: self.longitude,
            })
        }
    }
}

/// A parcel under evaluation.
///
/// Immutable once handed to the scoring pipeline; all outputs are attached
/// to a separate score result keyed by [`Site::id`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Site {
    /// Unique site identifier (parcel number, application id, etc.).
    pub id: String,
    /// Geocoded location, if the upstream geocoder resolved one.
    pub coordinates: Option<Coordinates>,
    /// Proposed residential unit count, if known.
    pub unit_count: Option<u32>,
    /// Proposed residential density in units per acre, if known.
    /// Consumed by density-gated scoring modifiers.
    pub density_per_acre: Option<f64>,
}

impl Site {
    /// Creates a site with coordinates and no density metadata.
    #[must_use]
    pub fn new(id: impl Into<String>, latitude: f64, longitude: f64) -> Self {
        Self {
            id: id.into(),
            coordinates: Some(Coordinates {
                latitude,
                longitude,
            }),
            unit_count: None,
            density_per_acre: None,
        }
    }

    /// Creates a site whose geocoding failed upstream.
    #[must_use]
    pub fn ungeocoded(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            coordinates: None,
            unit_count: None,
            density_per_acre: None,
        }
    }

    /// Returns validated coordinates, or an error describing why the site
    /// cannot enter spatial resolution.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidCoordinateError`] if coordinates are absent or out
    /// of WGS84 range. Absent coordinates are reported as the sentinel
    /// `(NaN, NaN)` pair so the error stays a single type.
    pub fn validated_coordinates(&self) -> Result<Coordinates, InvalidCoordinateError> {
        match self.coordinates {
            Some(coords) => coords.validate(),
            None => Err(InvalidCoordinateError {
                latitude: f64::NAN,
                longitude: f64::NAN,
            }),
        }
    }
}

/// Error returned when a site's coordinates are missing or outside the
/// valid WGS84 range.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InvalidCoordinateError {
    /// The offending latitude (`NaN` when coordinates were absent).
    pub latitude: f64,
    /// The offending longitude (`NaN` when coordinates were absent).
    pub longitude: f64,
}

impl std::fmt::Display for InvalidCoordinateError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.latitude.is_nan() && self.longitude.is_nan() {
            write!(f, "site has no geocoded coordinates")
        } else {
            write!(
                f,
                "coordinates ({}, {}) outside WGS84 range",
                self.latitude, self.longitude
            )
        }
    }
}

impl std::error::Error for InvalidCoordinateError {}
