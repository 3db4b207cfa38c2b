//! Header presence checks.
//!
//! Only presence is checked; values are interpreted later by the expander and
//! the feature builder.
//!
//! # Rules
//!
//! - Longitude and latitude columns are required (a feature needs a point).
//! - Count columns may be absent; they read as zero and are reported.
//! - Date, region and city may be absent; their attributes are then omitted.
//!
//! # Example
//!
//! ```rust,ignore
//! use flagload::{check_headers, CountFields, InputColumns};
//!
//! let headers = vec!["Date".to_string(), "long".to_string(), "lat".to_string()];
//! let report = check_headers(&headers, &InputColumns::default(), &CountFields::default())?;
//! assert_eq!(report.missing_counts.len(), 10);
//! ```

use crate::error::ValidationError;
use crate::models::{CountFields, InputColumns};

/// Outcome of a successful header check.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HeaderReport {
    /// Count columns absent from the header (treated as zero).
    pub missing_counts: Vec<String>,
    /// Optional pass-through columns absent from the header.
    pub missing_optional: Vec<String>,
}

impl HeaderReport {
    pub fn is_complete(&self) -> bool {
        self.missing_counts.is_empty() && self.missing_optional.is_empty()
    }
}

/// Check that the columns needed for feature building are present.
pub fn check_headers(
    headers: &[String],
    columns: &InputColumns,
    counts: &CountFields,
) -> Result<HeaderReport, ValidationError> {
    let has = |name: &str| headers.iter().any(|h| h == name);

    let missing_required: Vec<String> = [&columns.longitude, &columns.latitude]
        .into_iter()
        .filter(|c| !has(c.as_str()))
        .cloned()
        .collect();

    if !missing_required.is_empty() {
        return Err(ValidationError::MissingColumns(missing_required));
    }

    Ok(HeaderReport {
        missing_counts: counts
            .iter()
            .filter(|c| !has(*c))
            .map(str::to_string)
            .collect(),
        missing_optional: [&columns.date, &columns.region, &columns.city]
            .into_iter()
            .filter(|c| !has(c.as_str()))
            .cloned()
            .collect(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headers(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_complete_header() {
        let mut names = vec!["Date", "Region", "City", "long", "lat"];
        let counts = CountFields::default();
        names.extend(counts.iter());

        let report = check_headers(&headers(&names), &InputColumns::default(), &counts).unwrap();
        assert!(report.is_complete());
    }

    #[test]
    fn test_missing_coordinates_is_error() {
        let err = check_headers(
            &headers(&["Date", "City"]),
            &InputColumns::default(),
            &CountFields::default(),
        )
        .unwrap_err();

        assert_eq!(
            err,
            ValidationError::MissingColumns(vec!["long".into(), "lat".into()])
        );
    }

    #[test]
    fn test_missing_counts_reported() {
        let report = check_headers(
            &headers(&["long", "lat", "Value 1", "Value 2"]),
            &InputColumns::default(),
            &CountFields::default(),
        )
        .unwrap();

        assert_eq!(report.missing_counts.len(), 8);
        assert_eq!(report.missing_counts[0], "Value 3");
        assert_eq!(report.missing_optional, vec!["Date", "Region", "City"]);
    }
}
