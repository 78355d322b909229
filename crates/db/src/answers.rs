// crates/db/src/answers.rs
//! DNS answer-count rollups from the logs connection.

use poolstats_core::{AggregateRow, Dim, RollupDecoder, RollupResult};
use serde_json::Value;

use crate::clickhouse::{row_count, row_str};
use crate::{ClickHouse, DbResult};

/// Dimension columns of the answer rollup, detail first.
const ANSWER_DIMS: [&str; 2] = ["UserCC", "Qtype"];

impl ClickHouse {
    /// Per-country answer counts for one server over the last `days` days.
    pub async fn server_answer_counts(&self, server_ip: &str, days: u32) -> DbResult<RollupResult> {
        let rows = self
            .logs
            .query_rows(
                "SELECT UserCC, Qtype, sum(queries) AS queries \
                 FROM by_server_ip_1d \
                 WHERE ServerIP = {ip:String} AND dt > now() - INTERVAL {days:UInt32} DAY \
                 GROUP BY ROLLUP(Qtype, UserCC) \
                 ORDER BY UserCC, Qtype",
                &[
                    ("ip", server_ip.to_string()),
                    ("days", days.to_string()),
                ],
            )
            .await?;
        Ok(decode_answer_rows(&rows))
    }

    /// Pool-wide per-country totals for one query type; the reference the
    /// per-server counts are normalized against.
    pub async fn answer_totals(&self, qtype: &str, days: u32) -> DbResult<RollupResult> {
        let rows = self
            .logs
            .query_rows(
                "SELECT UserCC, Qtype, sum(queries) AS queries \
                 FROM by_server_ip_1d \
                 WHERE Qtype = {qtype:String} AND dt > now() - INTERVAL {days:UInt32} DAY \
                 GROUP BY ROLLUP(Qtype, UserCC) \
                 ORDER BY UserCC, Qtype",
                &[
                    ("qtype", qtype.to_string()),
                    ("days", days.to_string()),
                ],
            )
            .await?;
        Ok(decode_answer_rows(&rows))
    }
}

fn decode_answer_rows(raw: &[Value]) -> RollupResult {
    let rows = scan_aggregate_rows(raw, &ANSWER_DIMS, "queries");
    RollupDecoder::new(ANSWER_DIMS.len()).decode(&rows)
}

/// Scan raw JSONEachRow objects into aggregate rows. A row whose count
/// is missing or unparseable is dropped with a warning; the report goes
/// on without it.
pub(crate) fn scan_aggregate_rows(
    raw: &[Value],
    dim_cols: &[&str],
    count_col: &str,
) -> Vec<AggregateRow> {
    let mut rows = Vec::with_capacity(raw.len());
    for value in raw {
        let Some(count) = row_count(value, count_col) else {
            tracing::warn!(row = %value, "could not parse count, dropping row");
            continue;
        };
        let dims = dim_cols
            .iter()
            .map(|col| Dim::from_raw(row_str(value, col)))
            .collect();
        rows.push(AggregateRow::new(dims, count));
    }
    rows
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn scans_and_decodes_a_rollup() {
        let raw = vec![
            json!({"UserCC": "", "Qtype": "", "queries": 1000}),
            json!({"UserCC": "", "Qtype": "A", "queries": 900}),
            json!({"UserCC": "de", "Qtype": "A", "queries": 600}),
            json!({"UserCC": "se", "Qtype": "A", "queries": 300}),
        ];

        let result = decode_answer_rows(&raw);

        assert_eq!(result.total, 1000);
        assert_eq!(result.get("de"), Some(600));
        assert_eq!(result.get("se"), Some(300));
        // The per-qtype subtotal never becomes a country entry.
        assert_eq!(result.len(), 2);
    }

    #[test]
    fn unparseable_count_drops_only_that_row() {
        let raw = vec![
            json!({"UserCC": "de", "Qtype": "A", "queries": "not-a-number"}),
            json!({"UserCC": "se", "Qtype": "A", "queries": "300"}),
        ];

        let rows = scan_aggregate_rows(&raw, &ANSWER_DIMS, "queries");

        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].count, 300);
    }

    #[test]
    fn quoted_counts_parse() {
        let raw = vec![json!({"UserCC": "", "Qtype": "", "queries": "18446744073709551615"})];
        let result = decode_answer_rows(&raw);
        assert_eq!(result.total, u64::MAX);
    }
}
