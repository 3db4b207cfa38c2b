//! Domain models for the Flagload pipeline.
//!
//! This module contains the core data structures used throughout the pipeline:
//!
//! - [`Record`] - One tabular row, keyed by column name
//! - [`CountFields`] - The ordered set of count columns that drive expansion
//! - [`InputColumns`] - Names of the pass-through columns the upload path reads
//! - [`Feature`] - A feature service record (attributes + point geometry)

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A single row: column name to value, in insertion order.
pub type Record = Map<String, Value>;

/// Number of count columns in the standard survey layout.
pub const DEFAULT_COUNT_FIELDS: usize = 10;

/// Prefix of the standard count column names ("Value 1" .. "Value 10").
pub const DEFAULT_COUNT_PREFIX: &str = "Value ";

/// Largest count a single cell may hold before the record is rejected.
pub const DEFAULT_MAX_COUNT: usize = 10_000;

/// WGS84 well-known id, used for every geometry.
pub const WGS84_WKID: u32 = 4326;

// =============================================================================
// Count Fields
// =============================================================================

/// Ordered, immutable list of count column names.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CountFields {
    names: Vec<String>,
}

impl CountFields {
    /// Build `"{prefix}1"` .. `"{prefix}{count}"`.
    pub fn numbered(prefix: &str, count: usize) -> Self {
        Self {
            names: (1..=count).map(|i| format!("{}{}", prefix, i)).collect(),
        }
    }

    /// Use an explicit list of column names.
    pub fn from_names<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            names: names.into_iter().map(Into::into).collect(),
        }
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.names.iter().any(|n| n == name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.names.iter().map(String::as_str)
    }
}

impl Default for CountFields {
    fn default() -> Self {
        Self::numbered(DEFAULT_COUNT_PREFIX, DEFAULT_COUNT_FIELDS)
    }
}

// =============================================================================
// Input Columns
// =============================================================================

/// Default date column name.
pub const DEFAULT_DATE_COLUMN: &str = "Date";
/// Default region column name.
pub const DEFAULT_REGION_COLUMN: &str = "Region";
/// Default city column name.
pub const DEFAULT_CITY_COLUMN: &str = "City";
/// Default longitude column name.
pub const DEFAULT_LONG_COLUMN: &str = "long";
/// Default latitude column name.
pub const DEFAULT_LAT_COLUMN: &str = "lat";

/// Names of the pass-through columns used when building features.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputColumns {
    /// Event date in dd.mm.yyyy form.
    pub date: String,
    pub region: String,
    pub city: String,
    /// Longitude (x).
    pub longitude: String,
    /// Latitude (y).
    pub latitude: String,
}

impl Default for InputColumns {
    fn default() -> Self {
        Self {
            date: DEFAULT_DATE_COLUMN.to_string(),
            region: DEFAULT_REGION_COLUMN.to_string(),
            city: DEFAULT_CITY_COLUMN.to_string(),
            longitude: DEFAULT_LONG_COLUMN.to_string(),
            latitude: DEFAULT_LAT_COLUMN.to_string(),
        }
    }
}

// =============================================================================
// Features
// =============================================================================

/// Spatial reference attached to each geometry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpatialReference {
    pub wkid: u32,
}

/// Point geometry.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Geometry {
    pub x: f64,
    pub y: f64,
    pub spatial_reference: SpatialReference,
}

impl Geometry {
    /// A WGS84 point from longitude/latitude.
    pub fn wgs84(x: f64, y: f64) -> Self {
        Self {
            x,
            y,
            spatial_reference: SpatialReference { wkid: WGS84_WKID },
        }
    }
}

/// A feature as accepted by the feature service `addFeatures` operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Feature {
    pub attributes: Map<String, Value>,
    pub geometry: Geometry,
}
