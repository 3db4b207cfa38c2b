//! Conversion of expanded records into feature service features.
//!
//! Each record becomes `{attributes, geometry}`:
//!
//! - geometry: WGS84 point from the longitude/latitude columns
//!   (a comma decimal separator is accepted)
//! - attributes: mapped columns, with the date turned into epoch milliseconds
//!
//! Records with unusable coordinates or dates are skipped and reported.

use chrono::{NaiveDate, TimeZone, Utc};
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::warn;

use crate::error::FeatureError;
use crate::models::{CountFields, Feature, Geometry, InputColumns, Record};

/// Date format of the input date column.
pub const DATE_FORMAT: &str = "%d.%m.%Y";

// =============================================================================
// Field Mapping
// =============================================================================

/// Source column to layer field mapping.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldMapping {
    /// Column holding the dd.mm.yyyy date, converted before assignment.
    date_column: String,
    pairs: Vec<(String, String)>,
}

impl FieldMapping {
    /// The survey layer layout: `d_date`, `t_region`, `t_city`, `i_value_1..`.
    pub fn standard(columns: &InputColumns, counts: &CountFields) -> Self {
        let mut pairs = vec![
            (columns.date.clone(), "d_date".to_string()),
            (columns.region.clone(), "t_region".to_string()),
            (columns.city.clone(), "t_city".to_string()),
        ];
        for (i, name) in counts.iter().enumerate() {
            pairs.push((name.to_string(), format!("i_value_{}", i + 1)));
        }

        Self {
            date_column: columns.date.clone(),
            pairs,
        }
    }

    pub fn pairs(&self) -> &[(String, String)] {
        &self.pairs
    }

    /// Build the attribute map for one record.
    ///
    /// Columns missing from the record are left out. An empty date becomes null.
    pub fn attributes(&self, record: &Record) -> Result<Map<String, Value>, FeatureError> {
        let mut attributes = Map::new();

        for (column, field) in &self.pairs {
            let Some(value) = record.get(column) else {
                continue;
            };

            let value = if *column == self.date_column {
                date_attribute(value)?
            } else {
                value.clone()
            };
            attributes.insert(field.clone(), value);
        }

        Ok(attributes)
    }
}

fn date_attribute(value: &Value) -> Result<Value, FeatureError> {
    let text = match value {
        Value::Null => return Ok(Value::Null),
        Value::String(s) => s.trim().to_string(),
        other => other.to_string(),
    };
    if text.is_empty() {
        return Ok(Value::Null);
    }
    parse_date_epoch_ms(&text).map(Value::from)
}

// =============================================================================
// Value Conversion
// =============================================================================

/// Parse a coordinate cell into a float.
///
/// Strings are trimmed and a decimal comma is replaced by a point
/// (`"30,7306393"` → `30.7306393`).
pub fn parse_coord(column: &str, value: Option<&Value>) -> Result<f64, FeatureError> {
    let invalid = |shown: String| FeatureError::InvalidCoordinate {
        column: column.to_string(),
        value: shown,
    };

    let parsed = match value {
        None | Some(Value::Null) => {
            return Err(FeatureError::MissingCoordinate {
                column: column.to_string(),
            })
        }
        Some(Value::Number(n)) => n.as_f64().ok_or_else(|| invalid(n.to_string()))?,
        Some(Value::String(s)) => {
            let normalized = s.trim().replace(',', ".");
            if normalized.is_empty() {
                return Err(FeatureError::MissingCoordinate {
                    column: column.to_string(),
                });
            }
            normalized.parse::<f64>().map_err(|_| invalid(s.clone()))?
        }
        Some(other) => return Err(invalid(other.to_string())),
    };

    if parsed.is_finite() {
        Ok(parsed)
    } else {
        Err(invalid(parsed.to_string()))
    }
}

/// Convert `dd.mm.yyyy` into milliseconds since the Unix epoch (UTC midnight).
pub fn parse_date_epoch_ms(date: &str) -> Result<i64, FeatureError> {
    let invalid = || FeatureError::InvalidDate {
        value: date.to_string(),
    };

    let day = NaiveDate::parse_from_str(date.trim(), DATE_FORMAT).map_err(|_| invalid())?;
    let midnight = day.and_hms_opt(0, 0, 0).ok_or_else(invalid)?;
    Ok(Utc.from_utc_datetime(&midnight).timestamp_millis())
}

// =============================================================================
// Feature Building
// =============================================================================

/// A record that could not become a feature.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SkippedFeature {
    /// 1-based position among the expanded records.
    pub index: usize,
    pub reason: String,
}

/// Features built from a batch of records.
#[derive(Debug, Clone, Default)]
pub struct FeatureSet {
    pub features: Vec<Feature>,
    pub skipped: Vec<SkippedFeature>,
}

/// Build a feature from one record.
pub fn to_feature(
    record: &Record,
    columns: &InputColumns,
    mapping: &FieldMapping,
) -> Result<Feature, FeatureError> {
    let x = parse_coord(&columns.longitude, record.get(&columns.longitude))?;
    let y = parse_coord(&columns.latitude, record.get(&columns.latitude))?;
    let attributes = mapping.attributes(record)?;

    Ok(Feature {
        attributes,
        geometry: Geometry::wgs84(x, y),
    })
}

/// Build features for every record, skipping the ones that fail.
pub fn to_features(
    records: &[Record],
    columns: &InputColumns,
    mapping: &FieldMapping,
) -> FeatureSet {
    let mut set = FeatureSet::default();

    for (idx, record) in records.iter().enumerate() {
        match to_feature(record, columns, mapping) {
            Ok(feature) => set.features.push(feature),
            Err(e) => {
                warn!(index = idx + 1, "skipping record: {}", e);
                set.skipped.push(SkippedFeature {
                    index: idx + 1,
                    reason: e.to_string(),
                });
            }
        }
    }

    set
}
