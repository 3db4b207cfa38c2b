//! # Flagload - survey count rows to ArcGIS feature layers
//!
//! Flagload reads survey CSV exports in which each row carries several count
//! columns, expands every row into one record per counted unit with 0/1 flags,
//! and publishes the result to an ArcGIS Online hosted feature layer.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐     ┌─────────────┐     ┌─────────────┐     ┌─────────────┐
//! │   CSV File  │────▶│   Parser    │────▶│  Expander   │────▶│  Features   │────▶ addFeatures
//! │  (any enc)  │     │  (auto-enc) │     │ (0/1 flags) │     │ (x/y, date) │      (batches)
//! └─────────────┘     └─────────────┘     └─────────────┘     └─────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use flagload::{expand_file, PipelineOptions};
//! use std::path::Path;
//!
//! let summary = expand_file(Path::new("data/input.csv"), &PipelineOptions::default()).unwrap();
//! println!("{} rows expanded into {}", summary.csv_info.row_count, summary.records.len());
//! ```
//!
//! ## Modules
//!
//! - [`error`] - Error types per stage
//! - [`models`] - Records, count fields, features
//! - [`parser`] - CSV parsing with auto-detection
//! - [`transform`] - Row expansion, batch expansion and pipeline
//! - [`validation`] - Header presence checks
//! - [`features`] - Records to features
//! - [`upload`] - Batched upload and ArcGIS client
//! - [`config`] - Environment configuration and pipeline options
//! - [`logging`] - Tracing subscriber setup

// Core modules
pub mod error;
pub mod models;

// Configuration and logging
pub mod config;
pub mod logging;

// Parsing
pub mod parser;

// Transformation
pub mod transform;

// Validation
pub mod validation;

// Features
pub mod features;

// Upload
pub mod upload;

// =============================================================================
// Re-exports - Error types
// =============================================================================

pub use error::{
    ConfigError, CsvError, ExpandError, FeatureError, PipelineError, RecordError, UploadError,
    ValidationError,
};

// =============================================================================
// Re-exports - Models
// =============================================================================

pub use models::{CountFields, Feature, Geometry, InputColumns, Record, SpatialReference};

// =============================================================================
// Re-exports - Configuration
// =============================================================================

pub use config::{ArcGisConfig, PipelineOptions};

// =============================================================================
// Re-exports - CSV Parsing
// =============================================================================

pub use parser::{
    csv_to_records, decode_content, detect_delimiter, detect_encoding, parse_bytes_auto,
    parse_csv_file_auto, ParseResult,
};

// =============================================================================
// Re-exports - Expansion
// =============================================================================

pub use transform::{
    expand_row, expand_rows, BatchExpander, BatchOutcome, FailurePolicy, RowExpander,
    SkippedRecord,
};

// =============================================================================
// Re-exports - Validation
// =============================================================================

pub use validation::{check_headers, HeaderReport};

// =============================================================================
// Re-exports - Features
// =============================================================================

pub use features::{parse_coord, parse_date_epoch_ms, to_features, FeatureSet, FieldMapping};

// =============================================================================
// Re-exports - Upload
// =============================================================================

pub use upload::{
    upload_in_batches, ArcGisClient, FeatureLayer, FeatureSink, UploadReport, DEFAULT_BATCH_SIZE,
};

// =============================================================================
// Re-exports - Pipeline
// =============================================================================

pub use transform::pipeline::{
    build_features, expand_bytes, expand_file, expand_parsed, format_delimiter, publish,
    publish_features, CsvInfo, ExpandSummary,
};
