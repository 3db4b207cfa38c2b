//! Row expansion: one record with count columns becomes several flag records.
//!
//! For counts `c_1..c_k` with maximum `N`, a record expands into `max(N, 1)`
//! records. In the `i`-th output record (0-based) count column `k` holds `1`
//! when `i < c_k`, otherwise `0`, so every column is a run of ones followed by
//! zeros. All other columns are copied unchanged into every output record.
//!
//! ```text
//! Value 1 = 5, Value 2 = 3    →   row  Value 1  Value 2
//!                                  0       1        1
//!                                  1       1        1
//!                                  2       1        1
//!                                  3       1        0
//!                                  4       1        0
//! ```

use serde_json::{Number, Value};

use crate::error::{ExpandError, ExpandResult};
use crate::models::{CountFields, Record, DEFAULT_MAX_COUNT};

/// Expands single records according to a fixed set of count columns.
///
/// Holds no mutable state; one expander can be shared across threads.
#[derive(Debug, Clone)]
pub struct RowExpander {
    fields: CountFields,
    max_count: usize,
}

impl Default for RowExpander {
    fn default() -> Self {
        Self::new(CountFields::default())
    }
}

impl RowExpander {
    pub fn new(fields: CountFields) -> Self {
        Self {
            fields,
            max_count: DEFAULT_MAX_COUNT,
        }
    }

    /// Reject records with any count above `max_count`.
    pub fn with_max_count(mut self, max_count: usize) -> Self {
        self.max_count = max_count;
        self
    }

    pub fn count_fields(&self) -> &CountFields {
        &self.fields
    }

    pub fn max_count(&self) -> usize {
        self.max_count
    }

    /// Resolve every count column of `record`, in column order.
    ///
    /// Absent, null and empty values count as zero. A count above the
    /// configured maximum is [`ExpandError::TooLarge`].
    pub fn counts(&self, record: &Record) -> ExpandResult<Vec<usize>> {
        self.fields
            .iter()
            .map(|field| {
                let count = resolve_count(field, record.get(field))?;
                self.check_limit(field, count)
            })
            .collect()
    }

    fn check_limit(&self, field: &str, count: u64) -> ExpandResult<usize> {
        match usize::try_from(count) {
            Ok(n) if n <= self.max_count => Ok(n),
            _ => Err(ExpandError::TooLarge {
                field: field.to_string(),
                value: count,
                max: self.max_count,
            }),
        }
    }

    /// Expand one record into `max(N, 1)` flag records.
    pub fn expand(&self, record: &Record) -> ExpandResult<Vec<Record>> {
        let counts = self.counts(record)?;
        let total = counts.iter().copied().max().unwrap_or(0);

        let base: Record = record
            .iter()
            .filter(|(key, _)| !self.fields.contains(key))
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect();

        // total == 0 still yields one row, with every flag at 0
        let rows = (0..total.max(1))
            .map(|i| {
                let mut row = base.clone();
                for (field, &count) in self.fields.iter().zip(&counts) {
                    row.insert(field.to_string(), Value::from(u8::from(i < count)));
                }
                row
            })
            .collect();

        Ok(rows)
    }
}

/// Expand a record using the standard "Value 1".."Value 10" columns.
pub fn expand_row(record: &Record) -> ExpandResult<Vec<Record>> {
    RowExpander::default().expand(record)
}

/// Convert a count cell to a non-negative integer.
fn resolve_count(field: &str, value: Option<&Value>) -> ExpandResult<u64> {
    match value {
        None | Some(Value::Null) => Ok(0),
        Some(Value::Number(n)) => count_from_number(field, n),
        Some(Value::String(s)) => count_from_str(field, s),
        Some(other) => Err(not_an_integer(field, other.to_string())),
    }
}

fn count_from_number(field: &str, n: &Number) -> ExpandResult<u64> {
    if let Some(u) = n.as_u64() {
        return Ok(u);
    }
    if let Some(i) = n.as_i64() {
        return Err(ExpandError::NegativeCount {
            field: field.to_string(),
            value: i,
        });
    }
    match n.as_f64() {
        Some(f) => count_from_f64(field, f, || n.to_string()),
        None => Err(not_an_integer(field, n.to_string())),
    }
}

fn count_from_str(field: &str, raw: &str) -> ExpandResult<u64> {
    let s = raw.trim();
    if s.is_empty() {
        return Ok(0);
    }

    if let Ok(i) = s.parse::<i64>() {
        return u64::try_from(i).map_err(|_| ExpandError::NegativeCount {
            field: field.to_string(),
            value: i,
        });
    }
    if let Ok(u) = s.parse::<u64>() {
        return Ok(u);
    }
    // spreadsheet exports often write whole numbers as "3.0"
    match s.parse::<f64>() {
        Ok(f) => count_from_f64(field, f, || raw.to_string()),
        Err(_) => Err(not_an_integer(field, raw.to_string())),
    }
}

fn count_from_f64(field: &str, f: f64, shown: impl Fn() -> String) -> ExpandResult<u64> {
    if !f.is_finite() || f.fract() != 0.0 {
        return Err(not_an_integer(field, shown()));
    }
    if f < 0.0 {
        return Err(ExpandError::NegativeCount {
            field: field.to_string(),
            value: f as i64,
        });
    }
    // saturates at u64::MAX, which the limit check rejects
    Ok(f as u64)
}

fn not_an_integer(field: &str, value: String) -> ExpandError {
    ExpandError::NotAnInteger {
        field: field.to_string(),
        value,
    }
}
