//! High-level pipeline API: CSV → expanded records → features → upload.
//!
//! # Example
//!
//! ```rust,ignore
//! use flagload::{expand_file, build_features, publish, ArcGisClient, ArcGisConfig, PipelineOptions};
//! use std::path::Path;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let options = PipelineOptions::default();
//!     let expanded = expand_file(Path::new("data/input.csv"), &options)?;
//!     let features = build_features(&expanded, &options)?;
//!
//!     let client = ArcGisClient::new(ArcGisConfig::from_env()?)?;
//!     let layer = client.resolve_layer().await?;
//!     let report = publish(&layer, &features, &options).await?;
//!
//!     println!("{} features added", report.added());
//!     Ok(())
//! }
//! ```

use serde::Serialize;
use std::path::Path;
use tracing::{info, warn};

use super::batch::{BatchExpander, SkippedRecord};
use super::expander::RowExpander;
use crate::config::PipelineOptions;
use crate::error::PipelineResult;
use crate::features::{to_features, FeatureSet, FieldMapping};
use crate::models::{Feature, Record};
use crate::parser::{parse_bytes_auto, parse_csv_file_auto, ParseResult};
use crate::upload::{upload_in_batches, FeatureSink, UploadReport};
use crate::validation::check_headers;

/// CSV file information
#[derive(Debug, Clone, Serialize)]
pub struct CsvInfo {
    pub encoding: String,
    pub delimiter: char,
    pub headers: Vec<String>,
    pub row_count: usize,
}

/// Result of the expansion stage
#[derive(Debug, Clone, Serialize)]
pub struct ExpandSummary {
    /// CSV parsing metadata
    pub csv_info: CsvInfo,

    /// Expanded flag records, in input order
    pub records: Vec<Record>,

    /// Input records left out (skip policy only)
    pub skipped: Vec<SkippedRecord>,
}

/// Expand a CSV file.
pub fn expand_file(path: &Path, options: &PipelineOptions) -> PipelineResult<ExpandSummary> {
    info!(path = %path.display(), "reading CSV");
    let parse_result = parse_csv_file_auto(path)?;
    expand_parsed(parse_result, options)
}

/// Expand CSV bytes.
///
/// Same as [`expand_file`] but accepts raw bytes instead of a file path.
pub fn expand_bytes(bytes: &[u8], options: &PipelineOptions) -> PipelineResult<ExpandSummary> {
    let parse_result = parse_bytes_auto(bytes)?;
    expand_parsed(parse_result, options)
}

/// Expand already-parsed CSV data.
pub fn expand_parsed(
    parse_result: ParseResult,
    options: &PipelineOptions,
) -> PipelineResult<ExpandSummary> {
    info!(
        encoding = %parse_result.encoding,
        delimiter = %format_delimiter(parse_result.delimiter),
        rows = parse_result.records.len(),
        columns = parse_result.headers.len(),
        "parsed CSV"
    );

    let csv_info = CsvInfo {
        encoding: parse_result.encoding,
        delimiter: parse_result.delimiter,
        headers: parse_result.headers,
        row_count: parse_result.records.len(),
    };

    let missing: Vec<&str> = options
        .count_fields
        .iter()
        .filter(|c| !csv_info.headers.iter().any(|h| h == *c))
        .collect();
    if !missing.is_empty() {
        warn!(columns = ?missing, "count columns not in header, reading them as 0");
    }

    let batch = BatchExpander::new(
        RowExpander::new(options.count_fields.clone()).with_max_count(options.max_count),
        options.failure_policy,
    );
    let outcome = if options.parallel {
        batch.par_expand_all(&parse_result.records)?
    } else {
        batch.expand_all(&parse_result.records)?
    };

    info!(
        input = csv_info.row_count,
        expanded = outcome.records.len(),
        skipped = outcome.skipped.len(),
        "expanded records"
    );

    Ok(ExpandSummary {
        csv_info,
        records: outcome.records,
        skipped: outcome.skipped,
    })
}

/// Turn expanded records into features.
///
/// Fails when the coordinate columns are absent from the header; individual
/// records with bad coordinates or dates are skipped.
pub fn build_features(
    expanded: &ExpandSummary,
    options: &PipelineOptions,
) -> PipelineResult<FeatureSet> {
    let report = check_headers(
        &expanded.csv_info.headers,
        &options.columns,
        &options.count_fields,
    )?;
    if !report.missing_optional.is_empty() {
        warn!(columns = ?report.missing_optional, "attribute columns not in header");
    }

    let mapping = FieldMapping::standard(&options.columns, &options.count_fields);
    let set = to_features(&expanded.records, &options.columns, &mapping);

    info!(
        features = set.features.len(),
        skipped = set.skipped.len(),
        "built features"
    );
    Ok(set)
}

/// Upload features in batches of `options.batch_size`.
pub async fn publish<S: FeatureSink>(
    sink: &S,
    features: &FeatureSet,
    options: &PipelineOptions,
) -> PipelineResult<UploadReport> {
    publish_features(sink, &features.features, options.batch_size).await
}

/// Upload a plain slice of features.
pub async fn publish_features<S: FeatureSink>(
    sink: &S,
    features: &[Feature],
    batch_size: usize,
) -> PipelineResult<UploadReport> {
    info!(features = features.len(), batch_size, "uploading");
    let report = upload_in_batches(sink, features, batch_size).await?;

    if report.aborted.is_some() {
        warn!(added = report.added(), "upload stopped early");
    } else {
        info!(added = report.added(), failed = report.failed(), "upload finished");
    }
    Ok(report)
}

/// Format delimiter for display
pub fn format_delimiter(d: char) -> String {
    match d {
        '\t' => "\\t".to_string(),
        c => c.to_string(),
    }
}
