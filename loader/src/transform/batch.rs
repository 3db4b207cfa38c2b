//! Batch expansion over an ordered sequence of records.
//!
//! Output is the in-order concatenation of [`RowExpander::expand`] for every
//! input record. What happens when one record cannot be expanded is chosen by
//! [`FailurePolicy`].

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::expander::RowExpander;
use crate::error::{ExpandResult, RecordError};
use crate::models::Record;

/// What to do with a record whose count columns cannot be resolved.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FailurePolicy {
    /// Drop the record, log a warning and keep going.
    #[default]
    Skip,
    /// Stop at the first bad record.
    Abort,
}

/// A record left out of the output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedRecord {
    /// 1-based position in the input.
    pub row: usize,
    pub field: String,
    pub reason: String,
}

/// Result of expanding a batch
#[derive(Debug, Clone, Default)]
pub struct BatchOutcome {
    /// Expanded records, in input order
    pub records: Vec<Record>,
    /// Records dropped under [`FailurePolicy::Skip`]
    pub skipped: Vec<SkippedRecord>,
}

impl BatchOutcome {
    /// Get summary statistics
    pub fn summary(&self) -> String {
        format!(
            "Expanded: {} records, {} skipped",
            self.records.len(),
            self.skipped.len()
        )
    }
}

/// Applies a [`RowExpander`] to whole batches.
#[derive(Debug, Clone, Default)]
pub struct BatchExpander {
    expander: RowExpander,
    policy: FailurePolicy,
}

impl BatchExpander {
    pub fn new(expander: RowExpander, policy: FailurePolicy) -> Self {
        Self { expander, policy }
    }

    pub fn policy(&self) -> FailurePolicy {
        self.policy
    }

    pub fn expander(&self) -> &RowExpander {
        &self.expander
    }

    /// Expand every record in order.
    ///
    /// An empty batch yields an empty outcome.
    pub fn expand_all(&self, records: &[Record]) -> Result<BatchOutcome, RecordError> {
        let results = records.iter().map(|record| self.expander.expand(record));
        self.fold_results(results)
    }

    /// Same output as [`expand_all`](Self::expand_all), with records expanded
    /// on the rayon pool.
    pub fn par_expand_all(&self, records: &[Record]) -> Result<BatchOutcome, RecordError> {
        let results: Vec<ExpandResult<Vec<Record>>> = records
            .par_iter()
            .map(|record| self.expander.expand(record))
            .collect();
        self.fold_results(results)
    }

    fn fold_results<I>(&self, results: I) -> Result<BatchOutcome, RecordError>
    where
        I: IntoIterator<Item = ExpandResult<Vec<Record>>>,
    {
        let mut outcome = BatchOutcome::default();

        for (idx, result) in results.into_iter().enumerate() {
            let row = idx + 1;
            match result {
                Ok(mut rows) => {
                    debug!(row, expanded = rows.len(), "expanded record");
                    outcome.records.append(&mut rows);
                }
                Err(source) => match self.policy {
                    FailurePolicy::Abort => return Err(RecordError { row, source }),
                    FailurePolicy::Skip => {
                        warn!(row, field = source.field(), "skipping record: {}", source);
                        outcome.skipped.push(SkippedRecord {
                            row,
                            field: source.field().to_string(),
                            reason: source.to_string(),
                        });
                    }
                },
            }
        }

        Ok(outcome)
    }
}

/// Expand a batch with the standard count columns, skipping bad records.
pub fn expand_rows(records: &[Record]) -> BatchOutcome {
    let batch = BatchExpander::default();
    // the skip policy never returns Err
    batch.expand_all(records).unwrap_or_default()
}
