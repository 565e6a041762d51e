//! Dataset parsing into [`GeoFeature`] collections.
//!
//! Supports GeoJSON documents (files or strings), CSV point tables with
//! declared coordinate columns, and pre-parsed feature collections handed
//! over by the surrounding application. All parsing is tolerant per row or
//! feature: unusable records are skipped with a warning, matching how raw
//! feed ingestion treats malformed rows elsewhere in the system.

use std::collections::BTreeMap;
use std::io::Read;
use std::path::PathBuf;

use geo::MultiPolygon;
use geojson::GeoJson;

use crate::DatasetLoadError;
use crate::feature::{FeatureGeometry, GeoFeature};

/// A dataset source descriptor accepted by the store.
pub enum DatasetSource {
    /// Path to a GeoJSON document.
    GeoJsonFile(PathBuf),
    /// An in-memory GeoJSON document.
    GeoJsonText(String),
    /// Path to a CSV file of point features (e.g. a transit stop export).
    CsvPoints {
        /// Path to the CSV file.
        path: PathBuf,
        /// Column mapping for coordinates and ids.
        columns: CsvColumns,
    },
    /// Features already parsed by the surrounding application.
    Features(Vec<GeoFeature>),
}

/// Column mapping for CSV point datasets.
#[derive(Debug, Clone)]
pub struct CsvColumns {
    /// Column holding the latitude in decimal degrees.
    pub latitude: String,
    /// Column holding the longitude in decimal degrees.
    pub longitude: String,
    /// Column holding a stable feature id. When `None`, ids are derived
    /// from the source tag and row number.
    pub id: Option<String>,
}

/// Parses a dataset source into features, tagging each with `source_id`.
pub(crate) fn load_source(
    source_id: &str,
    source: DatasetSource,
) -> Result<Vec<GeoFeature>, DatasetLoadError> {
    match source {
        DatasetSource::GeoJsonFile(path) => {
            let text = std::fs::read_to_string(&path)?;
            parse_geojson(source_id, &text)
        }
        DatasetSource::GeoJsonText(text) => parse_geojson(source_id, &text),
        DatasetSource::CsvPoints { path, columns } => {
            let file = std::fs::File::open(&path)?;
            parse_csv_points(source_id, file, &columns)
        }
        DatasetSource::Features(mut features) => {
            for feature in &mut features {
                feature.source = source_id.to_owned();
            }
            Ok(features)
        }
    }
}

/// Parses a GeoJSON document into features.
///
/// Accepts a `FeatureCollection`, a single `Feature`, or a bare geometry.
/// Geometries other than `Point`/`Polygon`/`MultiPolygon` are skipped with
/// a warning. A document declaring a non-WGS84 CRS is rejected outright:
/// reprojection happens upstream or not at all, never at resolution time.
fn parse_geojson(source_id: &str, text: &str) -> Result<Vec<GeoFeature>, DatasetLoadError> {
    let geojson: GeoJson = text.parse()?;

    let mut features = Vec::new();
    let mut skipped = 0_usize;

    match geojson {
        GeoJson::FeatureCollection(collection) => {
            check_crs(collection.foreign_members.as_ref())?;
            for (i, feature) in collection.features.into_iter().enumerate() {
                let id = geojson_feature_id(source_id, feature.id.as_ref(), i);
                let attributes = feature
                    .properties
                    .map(|props| props.into_iter().collect::<BTreeMap<_, _>>())
                    .unwrap_or_default();

                let Some(geometry) = feature.geometry.and_then(convert_geometry) else {
                    skipped += 1;
                    continue;
                };

                features.push(GeoFeature {
                    id,
                    source: source_id.to_owned(),
                    geometry,
                    attributes,
                });
            }
        }
        GeoJson::Feature(feature) => {
            check_crs(feature.foreign_members.as_ref())?;
            let id = geojson_feature_id(source_id, feature.id.as_ref(), 0);
            let attributes = feature
                .properties
                .map(|props| props.into_iter().collect::<BTreeMap<_, _>>())
                .unwrap_or_default();
            if let Some(geometry) = feature.geometry.and_then(convert_geometry) {
                features.push(GeoFeature {
                    id,
                    source: source_id.to_owned(),
                    geometry,
                    attributes,
                });
            } else {
                skipped += 1;
            }
        }
        GeoJson::Geometry(geometry) => {
            if let Some(geometry) = convert_geometry(geometry) {
                features.push(GeoFeature {
                    id: format!("{source_id}-0"),
                    source: source_id.to_owned(),
                    geometry,
                    attributes: BTreeMap::new(),
                });
            } else {
                skipped += 1;
            }
        }
    }

    if skipped > 0 {
        log::warn!("[{source_id}] Skipped {skipped} features with unsupported geometry");
    }
    log::info!("[{source_id}] Parsed {} GeoJSON features", features.len());

    Ok(features)
}

/// Converts a GeoJSON geometry into the feature geometry we index.
fn convert_geometry(geometry: geojson::Geometry) -> Option<FeatureGeometry> {
    let geo_geom: geo::Geometry<f64> = geometry.try_into().ok()?;
    match geo_geom {
        geo::Geometry::MultiPolygon(mp) => Some(FeatureGeometry::Polygon(mp)),
        geo::Geometry::Polygon(p) => Some(FeatureGeometry::Polygon(MultiPolygon(vec![p]))),
        geo::Geometry::Point(p) => Some(FeatureGeometry::Point(p)),
        _ => None,
    }
}

/// Derives a feature id from the GeoJSON id field, falling back to the
/// source tag plus position.
fn geojson_feature_id(source_id: &str, id: Option<&geojson::feature::Id>, index: usize) -> String {
    match id {
        Some(geojson::feature::Id::String(s)) => s.clone(),
        Some(geojson::feature::Id::Number(n)) => n.to_string(),
        None => format!("{source_id}-{index}"),
    }
}

/// Rejects documents declaring a CRS other than WGS84.
///
/// GeoJSON per RFC 7946 is always WGS84; legacy documents may still carry
/// a `crs` member. CRS84 and EPSG:4326 name the same datum and are
/// accepted, everything else is a load error.
fn check_crs(
    foreign_members: Option<&serde_json::Map<String, serde_json::Value>>,
) -> Result<(), DatasetLoadError> {
    let Some(crs) = foreign_members.and_then(|members| members.get("crs")) else {
        return Ok(());
    };

    let name = crs
        .get("properties")
        .and_then(|props| props.get("name"))
        .and_then(serde_json::Value::as_str)
        .unwrap_or("")
        .to_owned();

    if name.contains("CRS84") || name.contains("4326") {
        Ok(())
    } else {
        Err(DatasetLoadError::UnsupportedCrs {
            crs: if name.is_empty() {
                crs.to_string()
            } else {
                name
            },
        })
    }
}

/// Parses a CSV point table into features.
///
/// Every column other than the declared coordinate/id columns lands in the
/// attribute bag as a string value. Rows with missing, unparseable, or
/// zero coordinates are skipped with a warning — a `(0, 0)` row is a
/// geocoding failure artifact, not a real location.
fn parse_csv_points<R: Read>(
    source_id: &str,
    reader: R,
    columns: &CsvColumns,
) -> Result<Vec<GeoFeature>, DatasetLoadError> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_reader(reader);

    let headers: Vec<String> = csv_reader
        .headers()?
        .iter()
        .map(|h| h.trim().to_owned())
        .collect();

    let lat_idx = column_index(&headers, &columns.latitude)?;
    let lng_idx = column_index(&headers, &columns.longitude)?;
    let id_idx = columns
        .id
        .as_deref()
        .map(|name| column_index(&headers, name))
        .transpose()?;

    let mut features = Vec::new();
    let mut skipped = 0_usize;

    for (row, result) in csv_reader.records().enumerate() {
        let record = result?;

        let Some((latitude, longitude)) = parse_lat_lng(
            record.get(lat_idx).map(str::trim),
            record.get(lng_idx).map(str::trim),
        ) else {
            skipped += 1;
            continue;
        };

        let id = id_idx
            .and_then(|idx| record.get(idx))
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map_or_else(|| format!("{source_id}-{row}"), str::to_owned);

        let mut attributes = BTreeMap::new();
        for (i, header) in headers.iter().enumerate() {
            if i == lat_idx || i == lng_idx || Some(i) == id_idx {
                continue;
            }
            let value = record.get(i).unwrap_or("").trim().to_owned();
            attributes.insert(header.clone(), serde_json::Value::String(value));
        }

        features.push(GeoFeature {
            id,
            source: source_id.to_owned(),
            geometry: FeatureGeometry::Point(geo::Point::new(longitude, latitude)),
            attributes,
        });
    }

    if skipped > 0 {
        log::warn!("[{source_id}] Skipped {skipped} CSV rows without usable coordinates");
    }
    log::info!("[{source_id}] Parsed {} point features from CSV", features.len());

    Ok(features)
}

fn column_index(headers: &[String], name: &str) -> Result<usize, DatasetLoadError> {
    headers
        .iter()
        .position(|h| h == name)
        .ok_or_else(|| DatasetLoadError::MissingColumn {
            column: name.to_owned(),
        })
}

/// Parses a lat/lng pair, rejecting missing, unparseable, or zero values.
fn parse_lat_lng(lat: Option<&str>, lng: Option<&str>) -> Option<(f64, f64)> {
    let latitude = lat?.parse::<f64>().ok()?;
    let longitude = lng?.parse::<f64>().ok()?;
    if latitude == 0.0 || longitude == 0.0 {
        return None;
    }
    Some((latitude, longitude))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stop_columns() -> CsvColumns {
        CsvColumns {
            latitude: "stop_lat".to_owned(),
            longitude: "stop_lon".to_owned(),
            id: Some("stop_id".to_owned()),
        }
    }

    #[test]
    fn parses_csv_points_with_attributes() {
        let csv = "stop_id,stop_lat,stop_lon,peak_headway_minutes\n\
                   s1,34.05,-118.24,12\n\
                   s2,34.10,-118.30,45\n";
        let features = parse_csv_points("metro", csv.as_bytes(), &stop_columns()).unwrap();
        assert_eq!(features.len(), 2);
        assert_eq!(features[0].id, "s1");
        assert_eq!(features[0].source, "metro");
        assert_eq!(
            features[0].attributes.get("peak_headway_minutes"),
            Some(&serde_json::Value::String("12".to_owned()))
        );
    }

    #[test]
    fn skips_csv_rows_with_zero_or_missing_coordinates() {
        let csv = "stop_id,stop_lat,stop_lon\n\
                   bad1,0.0,-118.24\n\
                   bad2,,\n\
                   good,34.05,-118.24\n";
        let features = parse_csv_points("metro", csv.as_bytes(), &stop_columns()).unwrap();
        assert_eq!(features.len(), 1);
        assert_eq!(features[0].id, "good");
    }

    #[test]
    fn missing_coordinate_column_is_an_error() {
        let csv = "stop_id,lat,lon\ns1,34.0,-118.0\n";
        let err = parse_csv_points("metro", csv.as_bytes(), &stop_columns()).unwrap_err();
        assert!(matches!(
            err,
            DatasetLoadError::MissingColumn { column } if column == "stop_lat"
        ));
    }

    #[test]
    fn parses_geojson_feature_collection() {
        let text = r#"{
            "type": "FeatureCollection",
            "features": [
                {
                    "type": "Feature",
                    "id": "zone-1",
                    "properties": {"fld_zone": "AE"},
                    "geometry": {
                        "type": "Polygon",
                        "coordinates": [[[0,0],[2,0],[2,2],[0,2],[0,0]]]
                    }
                },
                {
                    "type": "Feature",
                    "properties": {},
                    "geometry": {"type": "Point", "coordinates": [1.0, 1.0]}
                }
            ]
        }"#;
        let features = parse_geojson("fema", text).unwrap();
        assert_eq!(features.len(), 2);
        assert_eq!(features[0].id, "zone-1");
        assert!(features[0].geometry.is_polygon());
        assert_eq!(features[1].id, "fema-1");
        assert!(!features[1].geometry.is_polygon());
    }

    #[test]
    fn skips_unsupported_geometry_types() {
        let text = r#"{
            "type": "FeatureCollection",
            "features": [
                {
                    "type": "Feature",
                    "properties": {},
                    "geometry": {
                        "type": "LineString",
                        "coordinates": [[0,0],[1,1]]
                    }
                }
            ]
        }"#;
        let features = parse_geojson("roads", text).unwrap();
        assert!(features.is_empty());
    }

    #[test]
    fn rejects_non_wgs84_crs() {
        let text = r#"{
            "type": "FeatureCollection",
            "crs": {"type": "name", "properties": {"name": "urn:ogc:def:crs:EPSG::3857"}},
            "features": []
        }"#;
        let err = parse_geojson("fema", text).unwrap_err();
        assert!(matches!(err, DatasetLoadError::UnsupportedCrs { .. }));
    }

    #[test]
    fn accepts_legacy_crs84_declaration() {
        let text = r#"{
            "type": "FeatureCollection",
            "crs": {"type": "name", "properties": {"name": "urn:ogc:def:crs:OGC:1.3:CRS84"}},
            "features": []
        }"#;
        assert!(parse_geojson("fema", text).is_ok());
    }
}
