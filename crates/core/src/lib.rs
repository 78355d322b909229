// crates/core/src/lib.rs
//! Aggregate-result interpretation for the pool reporting API.
//!
//! The query layer hands this crate flat, hierarchically rolled-up result
//! rows; this crate turns them into structured totals and per-key counts
//! ([`rollup`]), derives normalized relative metrics from those counts
//! ([`points`]), and reduces unbounded date-keyed histories to a bounded,
//! representative sample ([`decimate`]).
//!
//! Everything here is a pure transformation over already-materialized data:
//! no I/O, no shared state, safe to call from any number of concurrent
//! requests.

pub mod decimate;
pub mod points;
pub mod rollup;
pub mod types;

pub use decimate::decimate;
pub use points::{
    normalize, normalize_against_total, points, AliasTable, POINT_BASIS, POINT_SYMBOL,
};
pub use rollup::RollupDecoder;
pub use types::{AggregateRow, DatedGroup, Dim, KeyCount, NormalizedMetric, RollupResult};
