//! Error types for the Flagload pipeline.
//!
//! Each stage owns its error enum:
//!
//! - [`CsvError`] - CSV decoding and parsing errors
//! - [`ExpandError`] - Count field resolution errors (row expansion)
//! - [`FeatureError`] - Coordinate and date conversion errors
//! - [`ValidationError`] - Header presence checks
//! - [`UploadError`] - Feature service errors
//! - [`ConfigError`] - Environment configuration errors
//! - [`PipelineError`] - Top-level orchestration errors
//!
//! Error conversion is automatic via `From` implementations,
//! allowing `?` to work across error boundaries.

use thiserror::Error;

// =============================================================================
// CSV Parsing Errors
// =============================================================================

/// Errors during CSV parsing.
#[derive(Debug, Error)]
pub enum CsvError {
    /// Failed to read file.
    #[error("Failed to read file: {0}")]
    IoError(#[from] std::io::Error),

    /// Invalid CSV format.
    #[error("Invalid CSV format at line {line}: {message}")]
    ParseError { line: u64, message: String },

    /// Empty file.
    #[error("CSV file is empty")]
    EmptyFile,

    /// No headers found.
    #[error("No headers found in CSV")]
    NoHeaders,
}

// =============================================================================
// Expansion Errors
// =============================================================================

/// Errors while resolving count fields of a record.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExpandError {
    /// The value is present but is not an integer.
    #[error("count field '{field}' is not an integer (value '{value}')")]
    NotAnInteger { field: String, value: String },

    /// The value is an integer below zero.
    #[error("count field '{field}' is negative (value {value})")]
    NegativeCount { field: String, value: i64 },

    /// The value is above the expander's maximum count.
    #[error("count field '{field}' is too large (value {value}, limit {max})")]
    TooLarge {
        field: String,
        value: u64,
        max: usize,
    },
}

impl ExpandError {
    /// Name of the count field that failed to resolve.
    pub fn field(&self) -> &str {
        match self {
            Self::NotAnInteger { field, .. }
            | Self::NegativeCount { field, .. }
            | Self::TooLarge { field, .. } => field,
        }
    }
}

/// An expansion error tied to the 1-based record it came from.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("record {row}: {source}")]
pub struct RecordError {
    pub row: usize,
    #[source]
    pub source: ExpandError,
}

// =============================================================================
// Feature Errors
// =============================================================================

/// Errors while turning an expanded record into a feature.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FeatureError {
    /// Coordinate column absent or null.
    #[error("coordinate '{column}' is missing")]
    MissingCoordinate { column: String },

    /// Coordinate column present but not a finite number.
    #[error("coordinate '{column}' is not a number (value '{value}')")]
    InvalidCoordinate { column: String, value: String },

    /// Date column not in dd.mm.yyyy form.
    #[error("date '{value}' does not match dd.mm.yyyy")]
    InvalidDate { value: String },
}

// =============================================================================
// Validation Errors
// =============================================================================

/// Header presence check failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// Required columns are absent from the CSV header.
    #[error("Missing required columns: {}", .0.join(", "))]
    MissingColumns(Vec<String>),
}

// =============================================================================
// Upload Errors
// =============================================================================

/// Errors talking to the feature service.
#[derive(Debug, Error)]
pub enum UploadError {
    /// Transport-level failure.
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Non-success HTTP status.
    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },

    /// Error object returned by the service instead of a result.
    #[error("Service error {code}: {message}")]
    Service { code: i64, message: String },

    /// Item has no service URL or the layer index is out of range.
    #[error("Layer not found: {0}")]
    LayerNotFound(String),

    /// Batch size of zero.
    #[error("Batch size must be greater than zero")]
    InvalidBatchSize,

    /// Payload could not be encoded or the response could not be decoded.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

// =============================================================================
// Configuration Errors
// =============================================================================

/// Errors reading configuration from the environment.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Neither an item id nor a layer URL was provided.
    #[error("Set ARCGIS_ITEM_ID or ARCGIS_LAYER_URL")]
    MissingTarget,

    /// A variable is set but cannot be parsed.
    #[error("Invalid value for {name}: '{value}'")]
    InvalidValue { name: String, value: String },
}

// =============================================================================
// Pipeline Errors (top-level)
// =============================================================================

/// Top-level pipeline orchestration errors.
///
/// Wraps all lower-level errors so the CLI can report a single type.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// CSV parsing error.
    #[error("CSV error: {0}")]
    Csv(#[from] CsvError),

    /// Row expansion error (only surfaced under the abort policy).
    #[error("Expand error: {0}")]
    Expand(#[from] RecordError),

    /// Header validation error.
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// Upload error.
    #[error("Upload error: {0}")]
    Upload(#[from] UploadError),

    /// Configuration error.
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    /// JSON output error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// IO error writing output.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

// =============================================================================
// Result Type Aliases
// =============================================================================

/// Result type for CSV operations.
pub type CsvResult<T> = Result<T, CsvError>;

/// Result type for expansion of a single record.
pub type ExpandResult<T> = Result<T, ExpandError>;

/// Result type for upload operations.
pub type UploadResult<T> = Result<T, UploadError>;

/// Result type for pipeline operations.
pub type PipelineResult<T> = Result<T, PipelineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_conversion_chain() {
        let csv_err = CsvError::EmptyFile;
        let pipeline_err: PipelineError = csv_err.into();
        assert!(pipeline_err.to_string().contains("empty"));

        let record_err = RecordError {
            row: 4,
            source: ExpandError::NotAnInteger {
                field: "Value 2".into(),
                value: "abc".into(),
            },
        };
        let pipeline_err: PipelineError = record_err.into();
        let msg = pipeline_err.to_string();
        assert!(msg.contains("record 4"));
        assert!(msg.contains("Value 2"));
        assert!(msg.contains("abc"));
    }

    #[test]
    fn test_expand_error_field() {
        let err = ExpandError::NegativeCount {
            field: "Value 7".into(),
            value: -2,
        };
        assert_eq!(err.field(), "Value 7");
        assert!(err.to_string().contains("-2"));
    }

    #[test]
    fn test_missing_columns_format() {
        let err = ValidationError::MissingColumns(vec!["long".into(), "lat".into()]);
        assert_eq!(err.to_string(), "Missing required columns: long, lat");
    }
}
