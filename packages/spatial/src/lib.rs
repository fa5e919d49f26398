#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Region resolution from raw coordinates.
//!
//! Region polygons are loaded from a `GeoJSON` `FeatureCollection` at
//! startup and indexed in an R-tree for point-in-polygon lookups. When no
//! polygon contains a point (missing geometry, or a point outside covered
//! territory), [`RegionResolver`] degrades to the ordered
//! [`fallback::ReferenceTable`] and finally to a default label. It never
//! fails for valid coordinates.

pub mod fallback;

use std::path::Path;

use geo::{Area, Contains, MultiPolygon};
use geoinfo_incident_models::{Coordinates, InvalidCoordinatesError, Region};
use geojson::{Feature, FeatureCollection, GeoJson, JsonObject, JsonValue};
use rstar::{AABB, RTree, RTreeObject};
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display};

use crate::fallback::ReferenceTable;

/// Errors that can occur while loading region data.
#[derive(Debug, thiserror::Error)]
pub enum RegionLoadError {
    /// File could not be read.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// File is not valid `GeoJSON`.
    #[error("GeoJSON error: {0}")]
    GeoJson(#[from] geojson::Error),

    /// `GeoJSON` parsed, but is not a `FeatureCollection`.
    #[error("Expected a GeoJSON FeatureCollection")]
    NotFeatureCollection,

    /// Fallback table could not be parsed.
    #[error("Reference table error: {0}")]
    Table(#[from] toml::de::Error),
}

/// Errors returned by [`RegionResolver::resolve`].
#[derive(Debug, thiserror::Error)]
pub enum ResolveError {
    /// Coordinates are out of range.
    #[error(transparent)]
    InvalidCoordinates(#[from] InvalidCoordinatesError),
}

/// A region as loaded, with its geometry when the dataset has one.
struct RegionRecord {
    region: Region,
    polygon: Option<MultiPolygon<f64>>,
}

/// R-tree entry pointing back at a [`RegionRecord`].
struct RegionEntry {
    record: usize,
    area: f64,
    envelope: AABB<[f64; 2]>,
}

impl RTreeObject for RegionEntry {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        self.envelope
    }
}

/// Region polygons indexed for containment lookups.
///
/// Regions without geometry are kept for listing and export but never
/// match a point.
pub struct RegionIndex {
    records: Vec<RegionRecord>,
    tree: RTree<RegionEntry>,
}

impl RegionIndex {
    /// An index with no regions. Every lookup misses.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            records: Vec::new(),
            tree: RTree::new(),
        }
    }

    /// Reads a `GeoJSON` file and builds the index.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or is not a
    /// `FeatureCollection`.
    pub fn load(path: &Path) -> Result<Self, RegionLoadError> {
        let index = Self::from_geojson(&std::fs::read_to_string(path)?)?;
        log::info!(
            "Loaded {} regions ({} with geometry) from {}",
            index.records.len(),
            index.tree.size(),
            path.display()
        );
        Ok(index)
    }

    /// Builds the index from a `GeoJSON` `FeatureCollection`.
    ///
    /// Each feature names its region with a `name` (or `nom`) property and
    /// may carry a `code`. Features without a name, or repeating an earlier
    /// name, are skipped.
    ///
    /// # Errors
    ///
    /// Returns an error if the input is not a `FeatureCollection`.
    pub fn from_geojson(geojson_str: &str) -> Result<Self, RegionLoadError> {
        let GeoJson::FeatureCollection(collection) = geojson_str.parse::<GeoJson>()? else {
            return Err(RegionLoadError::NotFeatureCollection);
        };

        let mut records: Vec<RegionRecord> = Vec::new();
        let mut entries = Vec::new();

        for feature in collection.features {
            let Some(name) = string_property(&feature, &["name", "nom"]) else {
                log::warn!("Skipping region feature without a name property");
                continue;
            };
            if records.iter().any(|r| r.region.name == name) {
                log::warn!("Skipping duplicate region '{name}'");
                continue;
            }
            let code = string_property(&feature, &["code"]);

            let polygon = feature.geometry.and_then(|geometry| {
                let polygon = to_multipolygon(geometry);
                if polygon.is_none() {
                    log::warn!("Region '{name}' has no usable polygon geometry");
                }
                polygon
            });

            if let Some(polygon) = &polygon {
                entries.push(RegionEntry {
                    record: records.len(),
                    area: polygon.unsigned_area(),
                    envelope: compute_envelope(polygon),
                });
            }

            records.push(RegionRecord {
                region: Region { name, code },
                polygon,
            });
        }

        Ok(Self {
            records,
            tree: RTree::bulk_load(entries),
        })
    }

    /// Name of the region whose polygon contains the point.
    ///
    /// Overlapping polygons resolve to the smallest one.
    #[must_use]
    pub fn lookup(&self, point: Coordinates) -> Option<&str> {
        let lng = point.longitude;
        let lat = point.latitude;
        let geo_point = geo::Point::new(lng, lat);
        let query_env = AABB::from_point([lng, lat]);

        let mut best: Option<&RegionEntry> = None;

        for entry in self.tree.locate_in_envelope_intersecting(&query_env) {
            let contains = self.records[entry.record]
                .polygon
                .as_ref()
                .is_some_and(|p| p.contains(&geo_point));
            if contains && best.is_none_or(|current| entry.area < current.area) {
                best = Some(entry);
            }
        }

        best.map(|e| self.records[e.record].region.name.as_str())
    }

    /// Loaded regions, in dataset order.
    #[must_use]
    pub fn regions(&self) -> Vec<Region> {
        self.records.iter().map(|r| r.region.clone()).collect()
    }

    /// Number of loaded regions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether no region is loaded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Number of regions that carry geometry.
    #[must_use]
    pub fn with_geometry(&self) -> usize {
        self.tree.size()
    }

    /// Loaded regions as a `GeoJSON` `FeatureCollection`.
    #[must_use]
    pub fn to_geojson(&self) -> String {
        let features = self
            .records
            .iter()
            .map(|record| {
                let mut properties = JsonObject::new();
                properties.insert(
                    "name".to_string(),
                    JsonValue::from(record.region.name.clone()),
                );
                if let Some(code) = &record.region.code {
                    properties.insert("code".to_string(), JsonValue::from(code.clone()));
                }
                Feature {
                    bbox: None,
                    geometry: record
                        .polygon
                        .as_ref()
                        .map(|p| geojson::Geometry::new(geojson::Value::from(p))),
                    id: None,
                    properties: Some(properties),
                    foreign_members: None,
                }
            })
            .collect();

        GeoJson::FeatureCollection(FeatureCollection {
            bbox: None,
            features,
            foreign_members: None,
        })
        .to_string()
    }
}

/// How a region label was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, AsRefStr)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum ResolutionMethod {
    /// A region polygon contains the point.
    Authoritative,
    /// A reference location is within its threshold.
    Approximate,
    /// Nothing matched; the default label was used.
    Default,
}

/// Result of [`RegionResolver::resolve`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Resolution {
    /// Region label.
    pub label: String,
    /// How the label was obtained.
    pub method: ResolutionMethod,
}

impl Resolution {
    /// Whether the label came from the fallback path.
    #[must_use]
    pub fn is_degraded(&self) -> bool {
        self.method != ResolutionMethod::Authoritative
    }
}

/// Resolves region labels from coordinates.
///
/// Pure with respect to its reference data and safe to share across
/// request handlers without synchronization.
pub struct RegionResolver {
    index: RegionIndex,
    table: ReferenceTable,
}

impl RegionResolver {
    /// Creates a resolver over `index`, falling back to `table`.
    #[must_use]
    pub const fn new(index: RegionIndex, table: ReferenceTable) -> Self {
        Self { index, table }
    }

    /// Creates a resolver over `index` with the embedded fallback table.
    ///
    /// # Errors
    ///
    /// Returns an error if the embedded table is malformed.
    pub fn with_embedded_table(index: RegionIndex) -> Result<Self, RegionLoadError> {
        Ok(Self::new(index, ReferenceTable::embedded()?))
    }

    /// The polygon index.
    #[must_use]
    pub const fn index(&self) -> &RegionIndex {
        &self.index
    }

    /// Resolves the region containing `(latitude, longitude)`.
    ///
    /// Tries polygon containment first, then the fallback table in order,
    /// then the table's default label.
    ///
    /// # Errors
    ///
    /// Returns [`ResolveError::InvalidCoordinates`] if either coordinate is
    /// out of range.
    pub fn resolve(&self, latitude: f64, longitude: f64) -> Result<Resolution, ResolveError> {
        let point = Coordinates::new(latitude, longitude)?;

        if let Some(name) = self.index.lookup(point) {
            log::info!("Resolved ({latitude}, {longitude}) to region '{name}'");
            return Ok(Resolution {
                label: name.to_string(),
                method: ResolutionMethod::Authoritative,
            });
        }

        if let Some(location) = self.table.first_match(point) {
            log::warn!(
                "No region polygon contains ({latitude}, {longitude}); approximated as '{}' near {}",
                location.region,
                location.name
            );
            return Ok(Resolution {
                label: location.region.clone(),
                method: ResolutionMethod::Approximate,
            });
        }

        log::warn!(
            "No region or reference location matches ({latitude}, {longitude}); using '{}'",
            self.table.default_label
        );
        Ok(Resolution {
            label: self.table.default_label.clone(),
            method: ResolutionMethod::Default,
        })
    }
}

fn string_property(feature: &Feature, keys: &[&str]) -> Option<String> {
    keys.iter()
        .filter_map(|key| feature.property(key))
        .find_map(JsonValue::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(ToString::to_string)
}

/// Converts a `GeoJSON` geometry into a [`MultiPolygon`].
/// Handles both `Polygon` and `MultiPolygon` geometry types.
fn to_multipolygon(geometry: geojson::Geometry) -> Option<MultiPolygon<f64>> {
    let geo_geom: geo::Geometry<f64> = geometry.try_into().ok()?;
    match geo_geom {
        geo::Geometry::MultiPolygon(mp) => Some(mp),
        geo::Geometry::Polygon(p) => Some(MultiPolygon(vec![p])),
        _ => None,
    }
}

/// Compute the bounding box envelope for a [`MultiPolygon`].
fn compute_envelope(mp: &MultiPolygon<f64>) -> AABB<[f64; 2]> {
    use geo::BoundingRect;

    mp.bounding_rect().map_or_else(
        || AABB::from_point([0.0, 0.0]),
        |rect| AABB::from_corners([rect.min().x, rect.min().y], [rect.max().x, rect.max().y]),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    /// A square region around Casablanca plus a smaller one inside it, and
    /// a region without geometry.
    const DATASET: &str = r#"{
        "type": "FeatureCollection",
        "features": [
            {
                "type": "Feature",
                "properties": { "name": "Grand Casablanca", "code": "06" },
                "geometry": {
                    "type": "Polygon",
                    "coordinates": [[[-8.0, 33.0], [-7.0, 33.0], [-7.0, 34.0], [-8.0, 34.0], [-8.0, 33.0]]]
                }
            },
            {
                "type": "Feature",
                "properties": { "nom": "Anfa" },
                "geometry": {
                    "type": "MultiPolygon",
                    "coordinates": [[[[-7.7, 33.5], [-7.5, 33.5], [-7.5, 33.7], [-7.7, 33.7], [-7.7, 33.5]]]]
                }
            },
            {
                "type": "Feature",
                "properties": { "name": "Dakhla-Oued Ed-Dahab" },
                "geometry": null
            },
            {
                "type": "Feature",
                "properties": {},
                "geometry": null
            }
        ]
    }"#;

    fn resolver(index: RegionIndex) -> RegionResolver {
        RegionResolver::with_embedded_table(index).unwrap()
    }

    #[test]
    fn loads_named_features_only() {
        let index = RegionIndex::from_geojson(DATASET).unwrap();
        assert_eq!(index.len(), 3);
        assert_eq!(index.with_geometry(), 2);
        assert_eq!(
            index.regions()[0],
            Region {
                name: "Grand Casablanca".to_string(),
                code: Some("06".to_string()),
            }
        );
    }

    #[test]
    fn rejects_non_collections() {
        let point = r#"{ "type": "Point", "coordinates": [0.0, 0.0] }"#;
        assert!(matches!(
            RegionIndex::from_geojson(point),
            Err(RegionLoadError::NotFeatureCollection)
        ));
    }

    #[test]
    fn point_inside_a_polygon_ignores_the_table() {
        let resolver = resolver(RegionIndex::from_geojson(DATASET).unwrap());
        // Inside the outer square but outside Anfa, and within 0.5 degrees
        // of Casablanca in the fallback table.
        let resolution = resolver.resolve(33.2, -7.9).unwrap();
        assert_eq!(resolution.label, "Grand Casablanca");
        assert_eq!(resolution.method, ResolutionMethod::Authoritative);
        assert!(!resolution.is_degraded());
    }

    #[test]
    fn smallest_containing_polygon_wins() {
        let resolver = resolver(RegionIndex::from_geojson(DATASET).unwrap());
        assert_eq!(resolver.resolve(33.6, -7.6).unwrap().label, "Anfa");
    }

    #[test]
    fn empty_dataset_falls_back_to_reference_locations() {
        let resolver = resolver(RegionIndex::empty());
        let resolution = resolver.resolve(33.5731, -7.5898).unwrap();
        assert_eq!(resolution.label, "Casablanca-Settat");
        assert_eq!(resolution.method, ResolutionMethod::Approximate);
        assert!(resolution.is_degraded());
    }

    #[test]
    fn uncovered_point_gets_the_default_label() {
        let resolver = resolver(RegionIndex::from_geojson(DATASET).unwrap());
        let resolution = resolver.resolve(23.7, -15.9).unwrap();
        assert_eq!(resolution.label, "Maroc");
        assert_eq!(resolution.method, ResolutionMethod::Default);
    }

    #[test]
    fn invalid_coordinates_fail() {
        let resolver = resolver(RegionIndex::empty());
        assert!(matches!(
            resolver.resolve(91.0, 0.0),
            Err(ResolveError::InvalidCoordinates(
                InvalidCoordinatesError::Latitude(_)
            ))
        ));
        assert!(resolver.resolve(0.0, 200.0).is_err());
    }

    #[test]
    fn export_round_trips_names_and_geometry() {
        let index = RegionIndex::from_geojson(DATASET).unwrap();
        let exported = index.to_geojson();

        let json: serde_json::Value = serde_json::from_str(&exported).unwrap();
        assert_eq!(json["type"], "FeatureCollection");
        assert_eq!(json["features"][1]["properties"]["name"], "Anfa");
        assert!(json["features"][2]["geometry"].is_null());

        let reloaded = RegionIndex::from_geojson(&exported).unwrap();
        assert_eq!(reloaded.regions(), index.regions());
        assert_eq!(reloaded.with_geometry(), 2);
    }
}
