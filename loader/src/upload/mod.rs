//! Batched feature upload.
//!
//! Features are sent to a [`FeatureSink`] in fixed-size chunks. The service
//! answers each chunk in one of two ways:
//!
//! - a request-level `error` object: nothing in the chunk was applied and the
//!   remaining chunks are not sent
//! - an `addResults` array: one entry per feature; failed entries are counted,
//!   the first few are kept as examples, and the next chunk is sent
//!
//! ## Usage
//!
//! ```rust,ignore
//! use flagload::upload::{upload_in_batches, ArcGisClient, DEFAULT_BATCH_SIZE};
//!
//! let client = ArcGisClient::from_env()?;
//! let layer = client.resolve_layer().await?;
//! let report = upload_in_batches(&layer, &features, DEFAULT_BATCH_SIZE).await?;
//! println!("{} added, {} failed", report.added(), report.failed());
//! ```

pub mod arcgis;

use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use crate::error::{UploadError, UploadResult};
use crate::models::Feature;

pub use arcgis::{ArcGisClient, FeatureLayer, ItemInfo, LayerInfo};

/// Default number of features per request.
pub const DEFAULT_BATCH_SIZE: usize = 200;

/// Number of failed feature results kept per batch as examples.
pub const SAMPLE_ERRORS: usize = 3;

// =============================================================================
// Service Responses
// =============================================================================

/// Request-level error object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceError {
    #[serde(default)]
    pub code: Option<i64>,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub details: Vec<String>,
}

/// Per-feature error object inside an edit result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EditResultError {
    #[serde(default)]
    pub code: Option<i64>,
    #[serde(default)]
    pub description: Option<String>,
}

/// Outcome for a single feature.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EditResult {
    #[serde(default)]
    pub object_id: Option<i64>,
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub error: Option<EditResultError>,
}

/// Response to an `addFeatures` request.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EditResponse {
    #[serde(default)]
    pub add_results: Vec<EditResult>,
    #[serde(default)]
    pub error: Option<ServiceError>,
}

// =============================================================================
// Sink
// =============================================================================

/// Destination accepting chunks of features.
#[allow(async_fn_in_trait)]
pub trait FeatureSink {
    /// Submit one chunk. Transport failures are `Err`; service-level
    /// failures come back inside the [`EditResponse`].
    async fn add_features(&self, features: &[Feature]) -> UploadResult<EditResponse>;
}

// =============================================================================
// Reports
// =============================================================================

/// Counts for one submitted chunk.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchReport {
    /// 1-based chunk number.
    pub index: usize,
    pub added: usize,
    pub failed: usize,
    /// Up to [`SAMPLE_ERRORS`] failed results.
    pub sample_errors: Vec<EditResult>,
}

/// Why the remaining chunks were not sent.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum AbortReason {
    /// The service rejected the whole request.
    RequestError { batch: usize, error: ServiceError },
    /// The response carried neither results nor an error.
    EmptyResults { batch: usize },
}

/// Summary of a whole upload.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct UploadReport {
    pub batches: Vec<BatchReport>,
    pub aborted: Option<AbortReason>,
}

impl UploadReport {
    pub fn added(&self) -> usize {
        self.batches.iter().map(|b| b.added).sum()
    }

    pub fn failed(&self) -> usize {
        self.batches.iter().map(|b| b.failed).sum()
    }

    pub fn is_complete(&self) -> bool {
        self.aborted.is_none() && self.failed() == 0
    }
}

/// Send `features` to `sink` in chunks of `batch_size`.
///
/// Chunks are sent one after another; a request-level error stops the upload
/// and is recorded in [`UploadReport::aborted`].
pub async fn upload_in_batches<S: FeatureSink>(
    sink: &S,
    features: &[Feature],
    batch_size: usize,
) -> UploadResult<UploadReport> {
    if batch_size == 0 {
        return Err(UploadError::InvalidBatchSize);
    }

    let mut report = UploadReport::default();
    let total = features.len().div_ceil(batch_size);

    for (i, chunk) in features.chunks(batch_size).enumerate() {
        let index = i + 1;
        debug!(batch = index, total, size = chunk.len(), "sending batch");

        let response = sink.add_features(chunk).await?;

        if let Some(err) = response.error {
            error!(
                batch = index,
                code = ?err.code,
                details = ?err.details,
                "service rejected batch: {}",
                err.message
            );
            report.aborted = Some(AbortReason::RequestError {
                batch: index,
                error: err,
            });
            break;
        }

        if response.add_results.is_empty() {
            error!(batch = index, "response has no addResults");
            report.aborted = Some(AbortReason::EmptyResults { batch: index });
            break;
        }

        let (ok, failed): (Vec<EditResult>, Vec<EditResult>) =
            response.add_results.into_iter().partition(|r| r.success);

        if !failed.is_empty() {
            warn!(
                batch = index,
                failed = failed.len(),
                "examples: {:?}",
                &failed[..failed.len().min(SAMPLE_ERRORS)]
            );
        }
        info!(batch = index, total, added = ok.len(), failed = failed.len(), "batch done");

        report.batches.push(BatchReport {
            index,
            added: ok.len(),
            failed: failed.len(),
            sample_errors: failed.into_iter().take(SAMPLE_ERRORS).collect(),
        });
    }

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Geometry;
    use serde_json::{json, Map};
    use std::sync::Mutex;

    fn feature(i: usize) -> Feature {
        let mut attributes = Map::new();
        attributes.insert("n".into(), json!(i));
        Feature {
            attributes,
            geometry: Geometry::wgs84(30.0, 46.0),
        }
    }

    fn ok_response(n: usize) -> EditResponse {
        EditResponse {
            add_results: (0..n)
                .map(|i| EditResult {
                    object_id: Some(i as i64 + 1),
                    success: true,
                    error: None,
                })
                .collect(),
            error: None,
        }
    }

    /// Records chunk sizes and answers with scripted responses.
    struct ScriptedSink {
        sizes: Mutex<Vec<usize>>,
        responses: Mutex<Vec<EditResponse>>,
    }

    impl ScriptedSink {
        fn new(responses: Vec<EditResponse>) -> Self {
            Self {
                sizes: Mutex::new(Vec::new()),
                responses: Mutex::new(responses.into_iter().rev().collect()),
            }
        }

        fn sizes(&self) -> Vec<usize> {
            self.sizes.lock().unwrap().clone()
        }
    }

    impl FeatureSink for ScriptedSink {
        async fn add_features(&self, features: &[Feature]) -> UploadResult<EditResponse> {
            self.sizes.lock().unwrap().push(features.len());
            let scripted = self.responses.lock().unwrap().pop();
            Ok(scripted.unwrap_or_else(|| ok_response(features.len())))
        }
    }

    #[tokio::test]
    async fn test_chunks_of_batch_size() {
        let features: Vec<Feature> = (0..450).map(feature).collect();
        let sink = ScriptedSink::new(vec![]);

        let report = upload_in_batches(&sink, &features, DEFAULT_BATCH_SIZE).await.unwrap();

        assert_eq!(sink.sizes(), vec![200, 200, 50]);
        assert_eq!(report.added(), 450);
        assert!(report.is_complete());
        assert_eq!(report.batches[2].index, 3);
    }

    #[tokio::test]
    async fn test_empty_input_sends_nothing() {
        let sink = ScriptedSink::new(vec![]);
        let report = upload_in_batches(&sink, &[], 200).await.unwrap();

        assert!(sink.sizes().is_empty());
        assert_eq!(report, UploadReport::default());
    }

    #[tokio::test]
    async fn test_zero_batch_size_rejected() {
        let sink = ScriptedSink::new(vec![]);
        let result = upload_in_batches(&sink, &[feature(0)], 0).await;

        assert!(matches!(result, Err(UploadError::InvalidBatchSize)));
    }

    #[tokio::test]
    async fn test_request_error_aborts_remaining() {
        let features: Vec<Feature> = (0..5).map(feature).collect();
        let rejected: EditResponse = serde_json::from_value(json!({
            "error": { "code": 400, "message": "Unable to complete operation.", "details": ["bad field"] }
        }))
        .unwrap();
        let sink = ScriptedSink::new(vec![ok_response(2), rejected]);

        let report = upload_in_batches(&sink, &features, 2).await.unwrap();

        assert_eq!(sink.sizes(), vec![2, 2]);
        assert_eq!(report.added(), 2);
        match report.aborted {
            Some(AbortReason::RequestError { batch, ref error }) => {
                assert_eq!(batch, 2);
                assert_eq!(error.code, Some(400));
                assert_eq!(error.details, vec!["bad field"]);
            }
            ref other => panic!("unexpected abort reason: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_empty_results_aborts() {
        let sink = ScriptedSink::new(vec![EditResponse::default()]);
        let features: Vec<Feature> = (0..3).map(feature).collect();

        let report = upload_in_batches(&sink, &features, 1).await.unwrap();

        assert_eq!(sink.sizes(), vec![1]);
        assert_eq!(report.aborted, Some(AbortReason::EmptyResults { batch: 1 }));
    }

    #[tokio::test]
    async fn test_record_failures_continue() {
        let partial: EditResponse = serde_json::from_value(json!({
            "addResults": [
                { "objectId": 1, "success": true },
                { "success": false, "error": { "code": 1000, "description": "e1" } },
                { "success": false, "error": { "code": 1000, "description": "e2" } },
                { "success": false, "error": { "code": 1000, "description": "e3" } },
                { "success": false, "error": { "code": 1000, "description": "e4" } }
            ]
        }))
        .unwrap();
        let sink = ScriptedSink::new(vec![partial]);
        let features: Vec<Feature> = (0..7).map(feature).collect();

        let report = upload_in_batches(&sink, &features, 5).await.unwrap();

        assert_eq!(sink.sizes(), vec![5, 2]);
        assert_eq!(report.added(), 3);
        assert_eq!(report.failed(), 4);
        assert!(report.aborted.is_none());
        assert!(!report.is_complete());

        let samples = &report.batches[0].sample_errors;
        assert_eq!(samples.len(), SAMPLE_ERRORS);
        assert_eq!(
            samples[0].error.as_ref().and_then(|e| e.description.as_deref()),
            Some("e1")
        );
    }
}
