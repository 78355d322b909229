// crates/server/src/routes/grafana.rs
//! Grafana datasource endpoints: time-range score series and a static
//! test table.

use std::collections::BTreeMap;
use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use poolstats_db::LogScore;

use crate::error::{ApiError, ApiResult};
use crate::routes::history::{monitor_names, resolve_monitor};
use crate::routes::with_cache_control;
use crate::state::AppState;

const MAX_DATA_POINTS: u32 = 50_000;
const MAX_RANGE_DAYS: i64 = 90;

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct TimeRangeQuery {
    pub from: Option<i64>,
    pub to: Option<i64>,
    #[serde(rename = "maxDataPoints")]
    pub max_data_points: Option<u32>,
    /// reserved for downsampling
    pub interval: Option<String>,
    pub monitor: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ColumnDef {
    pub text: &'static str,
    #[serde(rename = "type")]
    pub column_type: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unit: Option<&'static str>,
}

/// One table series per monitor, in Grafana's table format.
#[derive(Debug, Serialize)]
pub struct GrafanaTableSeries {
    pub target: String,
    pub tags: BTreeMap<String, String>,
    pub columns: Vec<ColumnDef>,
    pub values: Vec<Vec<Value>>,
}

pub async fn scores_time_range(
    State(state): State<Arc<AppState>>,
    Path((server_param, mode_param)): Path<(String, String)>,
    Query(query): Query<TimeRangeQuery>,
) -> Response {
    let response = match run(&state, &server_param, &mode_param, &query).await {
        Ok(response) => response,
        Err(err) => err.into_response(),
    };
    with_cache_control(response, "public,max-age=240")
}

async fn run(
    state: &AppState,
    server_param: &str,
    mode_param: &str,
    query: &TimeRangeQuery,
) -> ApiResult<Response> {
    if mode_param != "json" {
        return Err(ApiError::NotFound("invalid mode".to_string()));
    }

    let (from, to) = validate_time_range(query.from, query.to)?;
    let limit = validate_max_data_points(query.max_data_points)?;

    let server = state
        .db
        .find_server(server_param)
        .await?
        .ok_or_else(|| ApiError::NotFound("server not found".to_string()))?;

    let monitor_id = resolve_monitor(&state.db, &server, query.monitor.as_deref()).await?;

    let scores = state
        .ch
        .logscores_time_range(server.id, monitor_id, from, to, limit)
        .await?;
    let names = monitor_names(&state.db, &scores).await?;

    let series = table_series(&scores, &names, &server.ip);
    Ok(Json(series).into_response())
}

fn validate_time_range(
    from: Option<i64>,
    to: Option<i64>,
) -> ApiResult<(DateTime<Utc>, DateTime<Utc>)> {
    let from = from.ok_or_else(|| ApiError::BadRequest("from parameter is required".to_string()))?;
    let to = to.ok_or_else(|| ApiError::BadRequest("to parameter is required".to_string()))?;

    let from = DateTime::from_timestamp(from, 0)
        .ok_or_else(|| ApiError::BadRequest("invalid from timestamp".to_string()))?;
    let to = DateTime::from_timestamp(to, 0)
        .ok_or_else(|| ApiError::BadRequest("invalid to timestamp".to_string()))?;

    if from >= to {
        return Err(ApiError::BadRequest("from must be before to".to_string()));
    }
    if to - from > chrono::Duration::days(MAX_RANGE_DAYS) {
        return Err(ApiError::BadRequest(format!(
            "time range cannot exceed {MAX_RANGE_DAYS} days"
        )));
    }
    Ok((from, to))
}

fn validate_max_data_points(max_data_points: Option<u32>) -> ApiResult<u32> {
    match max_data_points {
        Some(n) if n > MAX_DATA_POINTS => Err(ApiError::BadRequest(format!(
            "maxDataPoints cannot exceed {MAX_DATA_POINTS}"
        ))),
        Some(n) if n > 0 => Ok(n),
        _ => Ok(MAX_DATA_POINTS),
    }
}

/// One table series per monitor: time in milliseconds, then score,
/// offset, step and RTT.
fn table_series(
    scores: &[LogScore],
    names: &std::collections::HashMap<u32, String>,
    server_ip: &str,
) -> Vec<GrafanaTableSeries> {
    let mut by_monitor: BTreeMap<u32, Vec<&LogScore>> = BTreeMap::new();
    for score in scores {
        if let Some(id) = score.monitor_id {
            by_monitor.entry(id).or_default().push(score);
        }
    }

    by_monitor
        .into_iter()
        .map(|(id, rows)| {
            let name = names
                .get(&id)
                .filter(|n| !n.is_empty())
                .cloned()
                .unwrap_or_else(|| "unknown".to_string());

            let mut tags = BTreeMap::new();
            tags.insert("monitor".to_string(), name.clone());
            tags.insert("server_ip".to_string(), server_ip.to_string());

            GrafanaTableSeries {
                target: sanitize_monitor_name(&name),
                tags,
                columns: score_columns(),
                values: rows
                    .iter()
                    .map(|score| {
                        vec![
                            json!(score.ts * 1000),
                            json!(score.score),
                            score.offset.map_or(Value::Null, |o| json!(o)),
                            json!(score.step),
                            score.rtt_ms().map_or(Value::Null, |r| json!(r)),
                        ]
                    })
                    .collect(),
            }
        })
        .collect()
}

fn score_columns() -> Vec<ColumnDef> {
    vec![
        ColumnDef { text: "Time", column_type: "time", unit: None },
        ColumnDef { text: "Score", column_type: "number", unit: None },
        ColumnDef { text: "Offset", column_type: "number", unit: Some("s") },
        ColumnDef { text: "Step", column_type: "number", unit: None },
        ColumnDef { text: "RTT", column_type: "number", unit: Some("ms") },
    ]
}

/// Grafana targets dislike spaces and dots.
fn sanitize_monitor_name(name: &str) -> String {
    name.replace(' ', "_").replace(['.', '/'], "-")
}

/// Static sample series for datasource testing.
pub async fn test_table() -> Json<Vec<GrafanaTableSeries>> {
    let mut tags = BTreeMap::new();
    tags.insert("monitor".to_string(), "test".to_string());
    tags.insert("server_ip".to_string(), "192.0.2.1".to_string());

    Json(vec![GrafanaTableSeries {
        target: "test".to_string(),
        tags,
        columns: score_columns(),
        values: vec![
            vec![json!(1_722_330_000_000i64), json!(20.0), json!(-0.001), json!(1.0), json!(14.2)],
            vec![json!(1_722_330_900_000i64), json!(19.9), Value::Null, json!(0.95), Value::Null],
        ],
    }])
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn score(monitor_id: u32, ts: i64) -> LogScore {
        LogScore {
            id: ts as u64,
            monitor_id: Some(monitor_id),
            server_id: 42,
            ts,
            score: 20.0,
            step: 1.0,
            offset: Some(-0.002),
            rtt: Some(14_200),
            leap: None,
            warning: None,
            error: None,
        }
    }

    #[test]
    fn monitor_names_sanitize_for_targets() {
        assert_eq!(sanitize_monitor_name("ams1.mon.example.net"), "ams1-mon-example-net");
        assert_eq!(sanitize_monitor_name("us west/2"), "us_west-2");
    }

    #[test]
    fn one_series_per_monitor_in_id_order() {
        let scores = vec![score(7, 100), score(4, 101), score(7, 102)];
        let mut names = HashMap::new();
        names.insert(4, "ams1".to_string());
        names.insert(7, "sfo2".to_string());

        let series = table_series(&scores, &names, "192.0.2.1");

        assert_eq!(series.len(), 2);
        assert_eq!(series[0].target, "ams1");
        assert_eq!(series[1].target, "sfo2");
        assert_eq!(series[1].values.len(), 2);
        // time is in milliseconds
        assert_eq!(series[1].values[0][0], json!(100_000));
        assert_eq!(series[0].tags["server_ip"], "192.0.2.1");
    }

    #[test]
    fn unattributed_scores_are_skipped() {
        let mut unattributed = score(0, 100);
        unattributed.monitor_id = None;
        let series = table_series(&[unattributed], &HashMap::new(), "192.0.2.1");
        assert!(series.is_empty());
    }

    #[test]
    fn time_range_validation() {
        assert!(validate_time_range(None, Some(10)).is_err());
        assert!(validate_time_range(Some(10), None).is_err());
        assert!(validate_time_range(Some(10), Some(10)).is_err());
        assert!(validate_time_range(Some(20), Some(10)).is_err());
        // 91 days
        assert!(validate_time_range(Some(0), Some(91 * 86_400)).is_err());
        assert!(validate_time_range(Some(0), Some(86_400)).is_ok());
    }

    #[test]
    fn max_data_points_validation() {
        assert_eq!(validate_max_data_points(None).unwrap(), MAX_DATA_POINTS);
        assert_eq!(validate_max_data_points(Some(0)).unwrap(), MAX_DATA_POINTS);
        assert_eq!(validate_max_data_points(Some(500)).unwrap(), 500);
        assert!(validate_max_data_points(Some(MAX_DATA_POINTS + 1)).is_err());
    }
}
