// crates/core/src/types.rs
//! Shared data model for the interpretation core.

use chrono::NaiveDate;
use serde::Serialize;

/// One grouping-dimension value in an aggregate result row.
///
/// Rollup queries collapse dimensions level by level, and a collapsed
/// dimension comes back from the database as an empty value. Tagging the
/// two cases keeps "rolled up to the total" distinct from "empty key",
/// which the wire encoding conflates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Dim {
    /// The dimension is collapsed to its total at this row.
    RolledUp,
    /// A concrete key, e.g. a country code or a query type.
    Key(String),
}

impl Dim {
    /// Map the wire encoding (empty string means rolled up) to the tagged form.
    pub fn from_raw(s: &str) -> Self {
        if s.is_empty() {
            Dim::RolledUp
        } else {
            Dim::Key(s.to_string())
        }
    }

    pub fn is_rolled_up(&self) -> bool {
        matches!(self, Dim::RolledUp)
    }

    pub fn as_key(&self) -> Option<&str> {
        match self {
            Dim::Key(k) => Some(k),
            Dim::RolledUp => None,
        }
    }
}

/// One row out of a multi-dimension rollup query: the grouping dimensions
/// in query order plus the aggregated count.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AggregateRow {
    pub dims: Vec<Dim>,
    pub count: u64,
}

impl AggregateRow {
    pub fn new(dims: Vec<Dim>, count: u64) -> Self {
        Self { dims, count }
    }
}

/// A decoded per-key count.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct KeyCount {
    pub key: String,
    pub count: u64,
}

/// Structured view of one rollup query result.
///
/// Built fresh per request from one query's result set; never shared or
/// persisted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RollupResult {
    /// Count from the row where every dimension is rolled up.
    pub total: u64,
    /// Detail counts keyed by the detail dimension, first-seen order
    /// preserved so downstream sorting can break ties by input order.
    pub by_key: Vec<KeyCount>,
}

impl RollupResult {
    /// Look up the count for a key. `None` means the key never appeared,
    /// which callers treat differently from a present-but-zero count.
    pub fn get(&self, key: &str) -> Option<u64> {
        self.by_key
            .iter()
            .find(|kc| kc.key == key)
            .map(|kc| kc.count)
    }

    pub fn len(&self) -> usize {
        self.by_key.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_key.is_empty()
    }
}

/// A key's count expressed relative to a reference total.
///
/// `points` is scaled to the caller's basis (per-ten-thousand for the
/// country reports); `ratio` is the same quantity on a 0..1 scale.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NormalizedMetric {
    pub key: String,
    pub count: u64,
    pub points: f64,
    pub ratio: f64,
}

/// One date plus every row sharing that date.
///
/// History queries return several rows per date (one per IP version);
/// decimation selects whole dates, never individual rows.
#[derive(Debug, Clone, PartialEq)]
pub struct DatedGroup<T> {
    pub date: NaiveDate,
    pub rows: Vec<T>,
}

impl<T> DatedGroup<T> {
    pub fn new(date: NaiveDate, rows: Vec<T>) -> Self {
        Self { date, rows }
    }
}
