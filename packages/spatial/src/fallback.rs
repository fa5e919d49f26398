//! Ordered table of reference locations used for approximate resolution.
//!
//! Each entry is a city centroid mapped to the region it belongs to. A point
//! matches an entry when its planar distance in degrees is within the
//! entry's threshold. The first matching entry in table order wins, even if
//! a later entry is closer.

use geoinfo_incident_models::Coordinates;
use serde::Deserialize;

use crate::RegionLoadError;

/// Table embedded at compile time.
const EMBEDDED_TABLE: &str = include_str!("../reference_locations.toml");

/// A city centroid and the region it maps to.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ReferenceLocation {
    /// City name.
    pub name: String,
    /// Centroid latitude.
    pub latitude: f64,
    /// Centroid longitude.
    pub longitude: f64,
    /// Per-entry threshold in degrees. Falls back to the table default.
    pub threshold: Option<f64>,
    /// Region label returned on a match.
    pub region: String,
}

/// Ordered fallback table plus the label returned when nothing matches.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ReferenceTable {
    /// Label returned when no entry matches.
    pub default_label: String,
    /// Threshold in degrees for entries that don't set their own.
    pub default_threshold: f64,
    /// Entries, evaluated in order.
    #[serde(default)]
    pub locations: Vec<ReferenceLocation>,
}

impl ReferenceTable {
    /// Parses a table from TOML.
    ///
    /// # Errors
    ///
    /// Returns [`RegionLoadError::Table`] if the TOML is malformed.
    pub fn parse(toml_str: &str) -> Result<Self, RegionLoadError> {
        Ok(toml::from_str(toml_str)?)
    }

    /// The embedded table of ten Moroccan cities, defaulting to `"Maroc"`.
    ///
    /// # Errors
    ///
    /// Returns [`RegionLoadError::Table`] if the embedded TOML is malformed.
    pub fn embedded() -> Result<Self, RegionLoadError> {
        Self::parse(EMBEDDED_TABLE)
    }

    /// First entry within its threshold of `point`, in table order.
    #[must_use]
    pub fn first_match(&self, point: Coordinates) -> Option<&ReferenceLocation> {
        self.locations.iter().find(|location| {
            let distance = (point.latitude - location.latitude)
                .hypot(point.longitude - location.longitude);
            distance <= location.threshold.unwrap_or(self.default_threshold)
        })
    }
}
