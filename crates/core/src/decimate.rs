// crates/core/src/decimate.rs
//! Reduction of a date-keyed history to a bounded, representative sample.

use crate::types::DatedGroup;

/// Reduce `groups` (ascending by date) to roughly `limit` entries.
///
/// Selection walks the list with a fractional accumulator: every group
/// costs 1, a selected group earns the stride back, and a group is
/// selected while the accumulator sits at or below 0.5. That spreads
/// rounding error across the whole sequence instead of letting it cluster
/// the way integer striding does, so the long-run spacing between selected
/// groups equals the stride. The most recent group is always kept;
/// dashboards must show the freshest point regardless of stride drift.
///
/// `limit == 0` or `limit >= groups.len()` means no reduction. The output
/// size is `limit ± 1` in the general case and exactly 1 for `limit == 1`.
pub fn decimate<T>(groups: Vec<DatedGroup<T>>, limit: usize) -> Vec<DatedGroup<T>> {
    let n = groups.len();
    if limit == 0 || limit >= n {
        return groups;
    }

    // limit == 1 degenerates: a stride no accumulator can pay down, so
    // only the forced last group survives.
    let stride = if limit == 1 {
        (n + 1) as f64
    } else {
        n as f64 / (limit - 1) as f64
    };
    let mut acc = if limit == 1 { stride } else { 0.0 };

    let mut selected = Vec::with_capacity(limit + 1);
    for (i, group) in groups.into_iter().enumerate() {
        let take = i == n - 1 || acc <= 0.5;
        if take {
            acc += stride;
            selected.push(group);
        }
        acc -= 1.0;
    }
    selected
}
