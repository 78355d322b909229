// crates/db/src/clickhouse.rs
//! Minimal client for the ClickHouse HTTP interface.

use std::time::Duration;

use serde_json::Value;

use crate::config::{ClickHouseSettings, ConnSettings};
use crate::{DbError, DbResult};

/// The two analytic connections: DNS query logs and monitoring scores.
#[derive(Debug, Clone)]
pub struct ClickHouse {
    pub logs: ClickHouseConn,
    pub scores: ClickHouseConn,
}

impl ClickHouse {
    pub fn new(settings: &ClickHouseSettings) -> DbResult<Self> {
        Ok(Self {
            logs: ClickHouseConn::new(&settings.logs)?,
            scores: ClickHouseConn::new(&settings.scores)?,
        })
    }
}

/// One connection to a ClickHouse server.
///
/// Queries are POSTed with `param_*` form parameters so user input is
/// bound server-side, never spliced into the SQL text. Results come back
/// as JSONEachRow, one JSON object per line.
#[derive(Debug, Clone)]
pub struct ClickHouseConn {
    http: reqwest::Client,
    url: String,
    database: String,
    user: String,
    password: Option<String>,
}

impl ClickHouseConn {
    pub fn new(settings: &ConnSettings) -> DbResult<Self> {
        if settings.url.is_empty() {
            return Err(DbError::ConfigMissing("clickhouse url"));
        }
        let http = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(5))
            .timeout(Duration::from_secs(60))
            .build()?;
        Ok(Self {
            http,
            url: settings.url.clone(),
            database: settings.database.clone(),
            user: settings.user.clone(),
            password: settings.password.clone(),
        })
    }

    /// Run `sql` with the given `{name:Type}` parameters and return one
    /// JSON value per result row.
    pub async fn query_rows(&self, sql: &str, params: &[(&str, String)]) -> DbResult<Vec<Value>> {
        let mut query: Vec<(String, String)> = vec![
            ("default_format".to_string(), "JSONEachRow".to_string()),
            // 64-bit integers as JSON numbers, not strings
            (
                "output_format_json_quote_64bit_integers".to_string(),
                "0".to_string(),
            ),
        ];
        if !self.database.is_empty() {
            query.push(("database".to_string(), self.database.clone()));
        }
        for (name, value) in params {
            query.push((format!("param_{name}"), value.clone()));
        }

        let mut request = self
            .http
            .post(&self.url)
            .query(&query)
            .body(sql.to_string());
        if !self.user.is_empty() {
            request = request.header("X-ClickHouse-User", &self.user);
        }
        if let Some(password) = &self.password {
            request = request.header("X-ClickHouse-Key", password);
        }

        let response = request.send().await?;
        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(DbError::ClickHouse {
                status: status.as_u16(),
                message: body.trim().to_string(),
            });
        }

        let mut rows = Vec::new();
        for line in body.lines() {
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<Value>(line) {
                Ok(value) => rows.push(value),
                Err(err) => tracing::warn!(%err, "could not parse result row"),
            }
        }
        Ok(rows)
    }

    pub async fn ping(&self) -> DbResult<()> {
        self.query_rows("SELECT 1", &[]).await.map(|_| ())
    }
}

/// String column access for JSONEachRow objects; missing and null both
/// read as the empty string, matching the rolled-up wire encoding.
pub(crate) fn row_str<'a>(row: &'a Value, col: &str) -> &'a str {
    row.get(col).and_then(Value::as_str).unwrap_or("")
}

/// Counts come back as JSON numbers, or as strings from servers that
/// quote 64-bit integers regardless of settings.
pub(crate) fn row_count(row: &Value, col: &str) -> Option<u64> {
    match row.get(col)? {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.parse().ok(),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn row_str_handles_missing_and_null() {
        let row = json!({"a": "x", "b": null});
        assert_eq!(row_str(&row, "a"), "x");
        assert_eq!(row_str(&row, "b"), "");
        assert_eq!(row_str(&row, "c"), "");
    }

    #[test]
    fn row_count_accepts_numbers_and_strings() {
        let row = json!({"n": 12, "s": "34", "bad": "x", "neg": -1});
        assert_eq!(row_count(&row, "n"), Some(12));
        assert_eq!(row_count(&row, "s"), Some(34));
        assert_eq!(row_count(&row, "bad"), None);
        assert_eq!(row_count(&row, "neg"), None);
        assert_eq!(row_count(&row, "missing"), None);
    }

    #[test]
    fn empty_url_is_a_config_error() {
        let err = ClickHouseConn::new(&ConnSettings::default()).unwrap_err();
        assert!(matches!(err, DbError::ConfigMissing(_)));
    }
}
