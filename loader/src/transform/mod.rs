//! Transformation module.
//!
//! This module handles count-row expansion and orchestration:
//! - Expander: one record to flag records
//! - Batch: ordered expansion of many records with a failure policy
//! - Pipeline: CSV to expanded records to features to upload

pub mod batch;
pub mod expander;
pub mod pipeline;

pub use batch::{expand_rows, BatchExpander, BatchOutcome, FailurePolicy, SkippedRecord};
pub use expander::{expand_row, RowExpander};
pub use pipeline::*;
