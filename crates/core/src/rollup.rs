// crates/core/src/rollup.rs
//! Decoding of `GROUP BY ROLLUP` result rows into a grand total and
//! per-key counts.

use std::collections::HashMap;

use crate::types::{AggregateRow, Dim, KeyCount, RollupResult};

/// Decodes the flat output of a hierarchically rolled-up aggregate query.
///
/// `dims` declares how many leading columns of each row are grouping
/// dimensions; the remaining column is the count. The detail dimension
/// (by default the first) is the one that keys the breakdown:
///
/// - every dimension rolled up → the grand total
/// - detail dimension concrete → a per-key count
/// - detail rolled up but a higher dimension concrete → an intermediate
///   rollup level; folding it into either bucket would double-count, so
///   the row is discarded
#[derive(Debug, Clone, Copy)]
pub struct RollupDecoder {
    dims: usize,
    detail: usize,
}

impl RollupDecoder {
    pub fn new(dims: usize) -> Self {
        Self { dims, detail: 0 }
    }

    /// Key the breakdown on a different dimension column.
    pub fn with_detail(dims: usize, detail: usize) -> Self {
        debug_assert!(detail < dims);
        Self { dims, detail }
    }

    /// Decode `rows` into a [`RollupResult`].
    ///
    /// Best-effort over already-validated query output: short rows are
    /// dropped with a warning, and a duplicate breakdown key keeps the
    /// latest value seen. Neither aborts the decode.
    pub fn decode(&self, rows: &[AggregateRow]) -> RollupResult {
        let mut result = RollupResult::default();
        let mut index: HashMap<String, usize> = HashMap::new();

        for row in rows {
            if row.dims.len() < self.dims {
                tracing::warn!(
                    got = row.dims.len(),
                    want = self.dims,
                    "dropping aggregate row with missing dimensions"
                );
                continue;
            }
            let dims = &row.dims[..self.dims];

            if dims.iter().all(Dim::is_rolled_up) {
                result.total = row.count;
                continue;
            }

            let Some(key) = dims[self.detail].as_key() else {
                // Intermediate rollup level (e.g. a per-qtype subtotal):
                // neither the grand total nor a usable per-key count.
                continue;
            };

            match index.get(key) {
                Some(&i) => {
                    tracing::warn!(key, "duplicate breakdown row, keeping latest value");
                    result.by_key[i].count = row.count;
                }
                None => {
                    index.insert(key.to_string(), result.by_key.len());
                    result.by_key.push(KeyCount {
                        key: key.to_string(),
                        count: row.count,
                    });
                }
            }
        }

        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn row(dims: &[&str], count: u64) -> AggregateRow {
        AggregateRow::new(dims.iter().map(|d| Dim::from_raw(d)).collect(), count)
    }

    #[test]
    fn decodes_total_and_detail_keys() {
        let rows = vec![
            row(&["", ""], 1000),
            row(&["de", "A"], 600),
            row(&["se", "A"], 300),
            row(&["us", "AAAA"], 100),
        ];

        let result = RollupDecoder::new(2).decode(&rows);

        assert_eq!(result.total, 1000);
        assert_eq!(result.len(), 3);
        assert_eq!(result.get("de"), Some(600));
        assert_eq!(result.get("se"), Some(300));
        assert_eq!(result.get("us"), Some(100));
    }

    #[test]
    fn skips_intermediate_rollup_levels() {
        // Detail (dimension 0) rolled up while the higher dimension is
        // concrete: a subtotal, not a per-key count.
        let rows = vec![
            row(&["", ""], 1000),
            row(&["", "A"], 900),
            row(&["", "AAAA"], 100),
            row(&["de", "A"], 600),
        ];

        let result = RollupDecoder::new(2).decode(&rows);

        assert_eq!(result.total, 1000);
        assert_eq!(result.by_key, vec![KeyCount { key: "de".into(), count: 600 }]);
        assert_eq!(result.get("A"), None);
        assert_eq!(result.get("AAAA"), None);
    }

    #[test]
    fn duplicate_key_keeps_latest_value() {
        let rows = vec![
            row(&["de", "A"], 600),
            row(&["de", "AAAA"], 40),
        ];

        let result = RollupDecoder::new(2).decode(&rows);

        assert_eq!(result.len(), 1);
        assert_eq!(result.get("de"), Some(40));
    }

    #[test]
    fn preserves_first_seen_order() {
        let rows = vec![
            row(&["se", "A"], 1),
            row(&["de", "A"], 2),
            row(&["ar", "A"], 3),
        ];

        let result = RollupDecoder::new(2).decode(&rows);

        let keys: Vec<&str> = result.by_key.iter().map(|kc| kc.key.as_str()).collect();
        assert_eq!(keys, vec!["se", "de", "ar"]);
    }

    #[test]
    fn short_rows_are_dropped() {
        let rows = vec![row(&["de"], 600), row(&["", ""], 1000)];

        let result = RollupDecoder::new(2).decode(&rows);

        assert_eq!(result.total, 1000);
        assert!(result.is_empty());
    }

    #[test]
    fn single_dimension_rollup() {
        let rows = vec![row(&[""], 500), row(&["de"], 300), row(&["se"], 200)];

        let result = RollupDecoder::new(1).decode(&rows);

        assert_eq!(result.total, 500);
        assert_eq!(result.len(), 2);
    }

    #[test]
    fn detail_on_second_dimension() {
        let rows = vec![
            row(&["", ""], 1000),
            row(&["A", ""], 900),
            row(&["A", "de"], 600),
        ];

        let result = RollupDecoder::with_detail(2, 1).decode(&rows);

        assert_eq!(result.total, 1000);
        assert_eq!(result.by_key, vec![KeyCount { key: "de".into(), count: 600 }]);
    }

    #[test]
    fn empty_input() {
        let result = RollupDecoder::new(2).decode(&[]);
        assert_eq!(result, RollupResult::default());
    }
}
