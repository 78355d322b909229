// crates/db/src/queries/monitors.rs
//! Monitor lookups, server scores, and the MySQL log-score fallback.

use sqlx::FromRow;

use crate::models::{IpVersion, LogScore, Monitor, ServerScoreRow};
use crate::queries::Database;
use crate::DbResult;

const MONITOR_COLUMNS: &str = "id, type, name, location, tls_name, ip_version, status";

impl Database {
    pub async fn get_monitors_by_id(&self, ids: &[u32]) -> DbResult<Vec<Monitor>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let placeholders = vec!["?"; ids.len()].join(", ");
        let sql =
            format!("SELECT {MONITOR_COLUMNS} FROM monitors WHERE id IN ({placeholders})");
        let mut query = sqlx::query_as::<_, Monitor>(&sql);
        for id in ids {
            query = query.bind(id);
        }
        Ok(query.fetch_all(self.pool()).await?)
    }

    /// Monitor by tls-name pattern for one IP version. Name lookups pass
    /// a `prefix.%` pattern; exact lookups pass the full name.
    pub async fn get_monitor_by_name(
        &self,
        tls_name_pattern: &str,
        ip_version: IpVersion,
    ) -> DbResult<Option<Monitor>> {
        let monitor = sqlx::query_as::<_, Monitor>(&format!(
            "SELECT {MONITOR_COLUMNS} FROM monitors \
             WHERE tls_name LIKE ? AND ip_version = ? \
             ORDER BY id LIMIT 1"
        ))
        .bind(tls_name_pattern)
        .bind(ip_version)
        .fetch_optional(self.pool())
        .await?;
        Ok(monitor)
    }

    /// Current score entries for one server across a set of monitors.
    pub async fn get_server_scores(
        &self,
        server_id: u32,
        monitor_ids: &[u32],
    ) -> DbResult<Vec<ServerScoreRow>> {
        if monitor_ids.is_empty() {
            return Ok(Vec::new());
        }
        let placeholders = vec!["?"; monitor_ids.len()].join(", ");
        let sql = format!(
            "SELECT ss.monitor_id AS id, m.name, m.tls_name, m.location, m.type, \
                    ss.status, ss.score_ts, ss.score_raw \
             FROM server_scores ss \
             JOIN monitors m ON m.id = ss.monitor_id \
             WHERE ss.server_id = ? AND ss.monitor_id IN ({placeholders})"
        );
        let mut query = sqlx::query_as::<_, ServerScoreRow>(&sql).bind(server_id);
        for id in monitor_ids {
            query = query.bind(id);
        }
        Ok(query.fetch_all(self.pool()).await?)
    }

    /// Log scores from the metadata database. Fallback path for when the
    /// scores connection is unavailable; the analytic store is primary.
    pub async fn get_server_log_scores(
        &self,
        server_id: u32,
        monitor_id: Option<u32>,
        limit: u32,
    ) -> DbResult<Vec<LogScore>> {
        let mut sql = String::from(
            "SELECT CAST(id AS UNSIGNED) AS id, monitor_id, server_id, \
                    CAST(UNIX_TIMESTAMP(ts) AS SIGNED) AS ts, \
                    score, step, `offset`, CAST(rtt AS SIGNED) AS rtt \
             FROM log_scores WHERE server_id = ?",
        );
        if monitor_id.is_some() {
            sql.push_str(" AND monitor_id = ?");
        }
        sql.push_str(" ORDER BY ts DESC LIMIT ?");

        let mut query = sqlx::query_as::<_, MysqlLogScoreRow>(&sql).bind(server_id);
        if let Some(monitor_id) = monitor_id {
            query = query.bind(monitor_id);
        }
        let rows = query.bind(limit).fetch_all(self.pool()).await?;
        Ok(rows.into_iter().map(MysqlLogScoreRow::into_log_score).collect())
    }
}

/// The metadata database has no leap/warning/error columns; those only
/// exist in the analytic store.
#[derive(Debug, Clone, FromRow)]
struct MysqlLogScoreRow {
    id: u64,
    monitor_id: Option<u32>,
    server_id: u32,
    ts: i64,
    score: f64,
    step: f64,
    offset: Option<f64>,
    rtt: Option<i64>,
}

impl MysqlLogScoreRow {
    fn into_log_score(self) -> LogScore {
        LogScore {
            id: self.id,
            monitor_id: self.monitor_id,
            server_id: self.server_id,
            ts: self.ts,
            score: self.score,
            step: self.step,
            offset: self.offset,
            rtt: self.rtt,
            leap: None,
            warning: None,
            error: None,
        }
    }
}
