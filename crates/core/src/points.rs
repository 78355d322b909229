// crates/core/src/points.rs
//! Normalized relative metrics ("points") derived from decoded counts.

use std::collections::HashMap;

use crate::types::{KeyCount, NormalizedMetric, RollupResult};

/// Scale constant for points: a key's share of its reference total,
/// per ten thousand.
pub const POINT_BASIS: f64 = 10_000.0;

/// Display symbol matching [`POINT_BASIS`].
pub const POINT_SYMBOL: &str = "‱";

/// A key's count scaled to `basis` relative to `reference`.
///
/// A zero reference falls back to the subject's own count, so a key with
/// traffic against an unrecorded reference reads as the whole of it
/// (`basis`) rather than as infinity. Zero over zero is zero. The result
/// is finite for every input.
pub fn points(basis: f64, reference: u64, count: u64) -> f64 {
    if reference == 0 {
        if count == 0 {
            0.0
        } else {
            basis
        }
    } else {
        (basis / reference as f64) * count as f64
    }
}

/// Key aliasing applied before reference lookups.
///
/// The breakdown and reference datasets do not always agree on naming
/// (the reference data uses ISO-political names, so query traffic tagged
/// `gb` must be compared against the `uk` reference entry). Kept as data
/// so new pairs don't need code changes.
#[derive(Debug, Clone, Default)]
pub struct AliasTable {
    map: HashMap<String, String>,
}

impl AliasTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_pairs<I, S>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (S, S)>,
        S: Into<String>,
    {
        let map = pairs
            .into_iter()
            .map(|(from, to)| (from.into(), to.into()))
            .collect();
        Self { map }
    }

    pub fn insert(&mut self, from: impl Into<String>, to: impl Into<String>) {
        self.map.insert(from.into(), to.into());
    }

    /// The name to look `key` up under in the reference data.
    pub fn resolve<'a>(&'a self, key: &'a str) -> &'a str {
        self.map.get(key).map(String::as_str).unwrap_or(key)
    }
}

/// Normalize per-key counts against a per-key reference.
///
/// For each subject key the reference denominator is found by alias-resolved
/// lookup in `reference.by_key`. A key with no reference entry is still
/// emitted, with points and ratio left at zero. Output is ordered by
/// descending count; ties keep their input order.
pub fn normalize(
    subjects: &[KeyCount],
    reference: &RollupResult,
    basis: f64,
    aliases: &AliasTable,
) -> Vec<NormalizedMetric> {
    let refs: HashMap<&str, u64> = reference
        .by_key
        .iter()
        .map(|kc| (kc.key.as_str(), kc.count))
        .collect();

    let mut metrics: Vec<NormalizedMetric> = subjects
        .iter()
        .map(|subject| {
            let (pts, ratio) = match refs.get(aliases.resolve(&subject.key)) {
                Some(&r) => {
                    let pts = points(basis, r, subject.count);
                    (pts, pts / basis)
                }
                None => (0.0, 0.0),
            };
            NormalizedMetric {
                key: subject.key.clone(),
                count: subject.count,
                points: pts,
                ratio,
            }
        })
        .collect();

    // Stable sort: equal counts stay in input order.
    metrics.sort_by(|a, b| b.count.cmp(&a.count));
    metrics
}

/// Normalize per-key counts against one global scalar total.
///
/// Same algorithm as [`normalize`] with the reference treated as a constant
/// map: every key resolves to `total`.
pub fn normalize_against_total(
    subjects: &[KeyCount],
    total: u64,
    basis: f64,
) -> Vec<NormalizedMetric> {
    let mut metrics: Vec<NormalizedMetric> = subjects
        .iter()
        .map(|subject| {
            let pts = points(basis, total, subject.count);
            NormalizedMetric {
                key: subject.key.clone(),
                count: subject.count,
                points: pts,
                ratio: pts / basis,
            }
        })
        .collect();

    metrics.sort_by(|a, b| b.count.cmp(&a.count));
    metrics
}
