// crates/db/src/logscores.rs
//! Log-score history from the scores connection.

use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::models::LogScore;
use crate::{ClickHouse, DbResult};

/// Without an explicit starting point, history covers the last four days.
const DEFAULT_HISTORY_DAYS: i64 = 4;

const LOG_SCORE_COLUMNS: &str = "id, monitor_id, server_id, \
     toUnixTimestamp(ts) AS ts, toFloat64(score) AS score, \
     toFloat64(step) AS step, offset, rtt, leap, warning, error";

impl ClickHouse {
    /// Score history for one server, optionally filtered to one monitor.
    ///
    /// With no `since`, the most recent scores come first; with one, the
    /// walk runs forward from that point.
    pub async fn logscores(
        &self,
        server_id: u32,
        monitor_id: Option<u32>,
        since: Option<DateTime<Utc>>,
        limit: u32,
    ) -> DbResult<Vec<LogScore>> {
        let (since_ts, recent_first) = match since {
            Some(t) => (t.timestamp(), false),
            None => (
                (Utc::now() - chrono::Duration::days(DEFAULT_HISTORY_DAYS)).timestamp(),
                true,
            ),
        };

        let mut sql = format!("SELECT {LOG_SCORE_COLUMNS} FROM log_scores WHERE server_id = {{server_id:UInt32}}");
        let mut params = vec![("server_id", server_id.to_string())];
        if let Some(monitor_id) = monitor_id {
            sql.push_str(" AND monitor_id = {monitor_id:UInt32}");
            params.push(("monitor_id", monitor_id.to_string()));
        }
        sql.push_str(" AND ts > toDateTime({since:Int64}) ORDER BY ts");
        if recent_first {
            sql.push_str(" DESC");
        }
        sql.push_str(" LIMIT {limit:UInt32}");
        params.push(("since", since_ts.to_string()));
        params.push(("limit", limit.to_string()));

        let rows = self.scores.query_rows(&sql, &params).await?;
        Ok(scan_log_scores(&rows))
    }

    /// Scores within an explicit time range, oldest first (the Grafana
    /// convention).
    pub async fn logscores_time_range(
        &self,
        server_id: u32,
        monitor_id: Option<u32>,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
        limit: u32,
    ) -> DbResult<Vec<LogScore>> {
        let mut sql = format!(
            "SELECT {LOG_SCORE_COLUMNS} FROM log_scores \
             WHERE server_id = {{server_id:UInt32}} \
             AND ts >= toDateTime({{from:Int64}}) AND ts <= toDateTime({{to:Int64}})"
        );
        let mut params = vec![
            ("server_id", server_id.to_string()),
            ("from", from.timestamp().to_string()),
            ("to", to.timestamp().to_string()),
        ];
        if let Some(monitor_id) = monitor_id {
            sql.push_str(" AND monitor_id = {monitor_id:UInt32}");
            params.push(("monitor_id", monitor_id.to_string()));
        }
        sql.push_str(" ORDER BY ts ASC LIMIT {limit:UInt32}");
        params.push(("limit", limit.to_string()));

        let rows = self.scores.query_rows(&sql, &params).await?;
        Ok(scan_log_scores(&rows))
    }
}

fn scan_log_scores(raw: &[Value]) -> Vec<LogScore> {
    raw.iter()
        .filter_map(|row| match serde_json::from_value::<LogScore>(row.clone()) {
            Ok(score) => Some(score),
            Err(err) => {
                tracing::warn!(%err, "could not parse log score row");
                None
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn scans_rows_and_skips_malformed() {
        let raw = vec![
            json!({
                "id": 10, "monitor_id": 4, "server_id": 42, "ts": 1722330000,
                "score": 19.4, "step": 0.9, "offset": -0.0043,
                "rtt": 12500, "leap": 0, "warning": "", "error": ""
            }),
            json!({"id": "broken"}),
        ];

        let scores = scan_log_scores(&raw);

        assert_eq!(scores.len(), 1);
        assert_eq!(scores[0].server_id, 42);
        assert_eq!(scores[0].monitor_id, Some(4));
        assert_eq!(scores[0].offset, Some(-0.0043));
    }

    #[test]
    fn nullable_fields_default() {
        let raw = vec![json!({
            "id": 10, "server_id": 42, "ts": 1722330000,
            "score": 19.4, "step": 0.9,
            "offset": null, "rtt": null, "monitor_id": null
        })];

        let scores = scan_log_scores(&raw);

        assert_eq!(scores.len(), 1);
        assert_eq!(scores[0].monitor_id, None);
        assert_eq!(scores[0].offset, None);
        assert_eq!(scores[0].rtt_ms(), None);
    }
}
