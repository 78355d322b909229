// crates/server/src/routes/history.rs
//! Per-server score history, as JSON for the score pages and as CSV for
//! download.

use std::collections::HashMap;
use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::header;
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use poolstats_db::{Database, LogScore, Server};

use crate::error::{ApiError, ApiResult};
use crate::routes::with_cache_control;
use crate::state::AppState;

const DEFAULT_LIMIT: u32 = 100;
const MAX_LIMIT: u32 = 10_000;

/// Synthetic median monitor used when no explicit monitor is requested.
const DEFAULT_MONITOR_NAME: &str = "recentmedian.scores.pool.dev";

/// History for servers deleted longer ago than this 404s.
const DELETED_HISTORY_CUTOFF_DAYS: i64 = 30;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum HistoryMode {
    Log,
    Json,
    Monitor,
}

fn parse_history_mode(s: &str) -> Option<HistoryMode> {
    match s {
        "log" => Some(HistoryMode::Log),
        "json" => Some(HistoryMode::Json),
        "monitor" => Some(HistoryMode::Monitor),
        _ => None,
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct HistoryQuery {
    pub limit: Option<u32>,
    pub monitor: Option<String>,
    pub since: Option<i64>,
    pub source: Option<String>,
}

pub(crate) struct HistoryParams {
    pub limit: u32,
    pub monitor_id: Option<u32>,
    pub since: Option<DateTime<Utc>>,
}

/// Scores plus the display names of every monitor that produced them.
pub(crate) struct LogScoreHistory {
    pub scores: Vec<LogScore>,
    pub monitor_names: HashMap<u32, String>,
}

pub async fn history(
    State(state): State<Arc<AppState>>,
    Path((server_param, mode_param)): Path<(String, String)>,
    Query(query): Query<HistoryQuery>,
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
    query: &HistoryQuery,
) -> ApiResult<Response> {
    let mode = parse_history_mode(mode_param)
        .ok_or_else(|| ApiError::NotFound("invalid mode".to_string()))?;

    let server = state
        .db
        .find_server(server_param)
        .await?
        .filter(|s| !s.deletion_age_exceeds(DELETED_HISTORY_CUTOFF_DAYS))
        .ok_or_else(|| ApiError::NotFound("server not found".to_string()))?;

    let params = history_parameters(&state.db, &server, query).await?;
    let history = fetch_history(state, &server, &params, query.source.as_deref()).await?;

    match mode {
        HistoryMode::Json => history_json(state, &server, &history).await,
        HistoryMode::Log => history_csv(&history),
        HistoryMode::Monitor => Err(ApiError::NotFound("not implemented".to_string())),
    }
}

async fn history_parameters(
    db: &Database,
    server: &Server,
    query: &HistoryQuery,
) -> ApiResult<HistoryParams> {
    let limit = query.limit.unwrap_or(DEFAULT_LIMIT).min(MAX_LIMIT);
    let monitor_id = resolve_monitor(db, server, query.monitor.as_deref()).await?;
    let since = query
        .since
        .filter(|s| *s > 0)
        .and_then(|s| DateTime::from_timestamp(s, 0));
    Ok(HistoryParams {
        limit,
        monitor_id,
        since,
    })
}

/// Resolve the `monitor` query parameter: nothing means the default
/// median monitor for the server's IP version, `*` means all monitors,
/// otherwise a numeric id or a name prefix.
pub(crate) async fn resolve_monitor(
    db: &Database,
    server: &Server,
    param: Option<&str>,
) -> ApiResult<Option<u32>> {
    match param.unwrap_or("") {
        "" => match db
            .get_monitor_by_name(DEFAULT_MONITOR_NAME, server.ip_version)
            .await?
        {
            Some(monitor) => Ok(Some(monitor.id)),
            None => {
                tracing::warn!(
                    name = DEFAULT_MONITOR_NAME,
                    ip_version = server.ip_version.as_str(),
                    "could not find default monitor"
                );
                Ok(None)
            }
        },
        "*" => Ok(None),
        param => {
            if let Ok(id) = param.parse::<u32>() {
                return Ok((id > 0).then_some(id));
            }
            // only accept a name prefix, no wildcards; these characters
            // would punch through the LIKE match
            if param.contains(['_', '%', '.', ' ', '\t', '\n']) {
                return Err(ApiError::NotFound("monitor not found".to_string()));
            }
            match db
                .get_monitor_by_name(&format!("{param}.%"), server.ip_version)
                .await?
            {
                Some(monitor) => Ok(Some(monitor.id)),
                None => Err(ApiError::NotFound("monitor not found".to_string())),
            }
        }
    }
}

async fn fetch_history(
    state: &AppState,
    server: &Server,
    params: &HistoryParams,
    source: Option<&str>,
) -> ApiResult<LogScoreHistory> {
    let default_source = std::env::var("POOLSTATS_DEFAULT_SOURCE").unwrap_or_default();
    let source = match source {
        Some("m") => "m",
        Some("c") => "c",
        _ => default_source.as_str(),
    };

    let scores = if source == "m" {
        state
            .db
            .get_server_log_scores(server.id, params.monitor_id, params.limit)
            .await?
    } else {
        state
            .ch
            .logscores(server.id, params.monitor_id, params.since, params.limit)
            .await?
    };

    let monitor_names = monitor_names(&state.db, &scores).await?;
    Ok(LogScoreHistory {
        scores,
        monitor_names,
    })
}

pub(crate) async fn monitor_names(
    db: &Database,
    scores: &[LogScore],
) -> ApiResult<HashMap<u32, String>> {
    let mut ids: Vec<u32> = Vec::new();
    for score in scores {
        if let Some(id) = score.monitor_id {
            if !ids.contains(&id) {
                ids.push(id);
            }
        }
    }

    let mut names: HashMap<u32, String> = ids.iter().map(|id| (*id, String::new())).collect();
    for monitor in db.get_monitors_by_id(&ids).await? {
        names.insert(monitor.id, monitor.display_name());
    }
    Ok(names)
}

// ============================================================================
// JSON mode
// ============================================================================

#[derive(Debug, Serialize)]
struct ScoresEntry {
    ts: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    offset: Option<f64>,
    step: f64,
    score: f64,
    monitor_id: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    rtt: Option<f64>,
}

#[derive(Debug, Serialize)]
struct MonitorEntry {
    id: u32,
    name: String,
    #[serde(rename = "type")]
    monitor_type: String,
    ts: String,
    score: f64,
    status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    avg_rtt: Option<f64>,
}

#[derive(Debug, Serialize)]
struct ServerInfo {
    ip: String,
}

#[derive(Debug, Serialize)]
struct HistoryJson {
    history: Vec<ScoresEntry>,
    monitors: Vec<MonitorEntry>,
    server: ServerInfo,
}

async fn history_json(
    state: &AppState,
    server: &Server,
    history: &LogScoreHistory,
) -> ApiResult<Response> {
    let monitor_ids: Vec<u32> = history.monitor_names.keys().copied().collect();
    let score_rows = state.db.get_server_scores(server.id, &monitor_ids).await?;

    // average measured RTT per monitor over the returned window
    let mut rtt_sums: HashMap<u32, (f64, u32)> = HashMap::new();
    for score in &history.scores {
        if let (Some(monitor_id), Some(rtt)) = (score.monitor_id, score.rtt_ms()) {
            let entry = rtt_sums.entry(monitor_id).or_insert((0.0, 0));
            entry.0 += rtt;
            entry.1 += 1;
        }
    }

    let mut monitors: Vec<MonitorEntry> = score_rows
        .iter()
        .map(|row| MonitorEntry {
            id: row.id,
            name: row.display_name(),
            monitor_type: row.monitor_type.clone(),
            ts: row
                .score_ts
                .map(|t| t.and_utc().to_rfc3339())
                .unwrap_or_default(),
            score: (row.score_raw * 10.0).round() / 10.0,
            status: row.status.clone(),
            avg_rtt: rtt_sums
                .get(&row.id)
                .map(|(sum, count)| sum / *count as f64),
        })
        .collect();
    monitors.sort_by_key(|m| m.id);

    let entries: Vec<ScoresEntry> = history
        .scores
        .iter()
        .map(|score| ScoresEntry {
            ts: score.ts,
            offset: score.offset,
            step: score.step,
            score: round_score(score.score),
            monitor_id: score.monitor_id.unwrap_or(0),
            rtt: score.rtt_ms(),
        })
        .collect();

    let body = HistoryJson {
        history: entries,
        monitors,
        server: ServerInfo {
            ip: server.ip.clone(),
        },
    };
    Ok((
        [(header::ACCESS_CONTROL_ALLOW_ORIGIN, "*")],
        Json(body),
    )
        .into_response())
}

fn round_score(score: f64) -> f64 {
    const SCALE: f64 = 1e12;
    (score * SCALE).round() / SCALE
}

// ============================================================================
// CSV mode
// ============================================================================

fn history_csv(history: &LogScoreHistory) -> ApiResult<Response> {
    let mut csv = String::new();
    csv.push_str("ts_epoch,ts,offset,step,score,monitor_id,monitor_name,rtt,leap,error\n");

    for score in &history.scores {
        let ts = DateTime::from_timestamp(score.ts, 0)
            .map(|t| t.to_rfc3339())
            .unwrap_or_default();
        let name = score
            .monitor_id
            .and_then(|id| history.monitor_names.get(&id))
            .cloned()
            .unwrap_or_default();

        let fields = [
            score.ts.to_string(),
            ts,
            score.offset.map(format_float_trim).unwrap_or_default(),
            format_float_trim(score.step),
            format_float_trim(score.score),
            score.monitor_id.unwrap_or(0).to_string(),
            name,
            score.rtt_ms().map(format_float_trim).unwrap_or_default(),
            score.leap.map(|l| l.to_string()).unwrap_or_default(),
            score.error.clone().unwrap_or_default(),
        ];
        let row: Vec<String> = fields
            .iter()
            .map(|field| escape_csv_field(&sanitize_for_csv(field)))
            .collect();
        csv.push_str(&row.join(","));
        csv.push('\n');
    }

    Ok((
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8"),
            (header::ACCESS_CONTROL_ALLOW_ORIGIN, "*"),
        ],
        csv,
    )
        .into_response())
}

/// Nine decimals, trimmed: 0.000125000 → "0.000125", 20.0 → "20".
fn format_float_trim(f: f64) -> String {
    let s = format!("{f:.9}");
    s.trim_end_matches('0').trim_end_matches('.').to_string()
}

/// Control characters in monitor-sourced strings would corrupt the CSV
/// stream; encode them visibly instead.
fn sanitize_for_csv(s: &str) -> String {
    let mut result = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '\0' => result.push_str("<NULL>"),
            c if (c as u32) < 32 && c != '\t' && c != '\n' && c != '\r' => {
                result.push_str(&format!("<0x{:02X}>", c as u32));
            }
            c => result.push(c),
        }
    }
    result
}

fn escape_csv_field(field: &str) -> String {
    if field.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mode_parsing() {
        assert_eq!(parse_history_mode("log"), Some(HistoryMode::Log));
        assert_eq!(parse_history_mode("json"), Some(HistoryMode::Json));
        assert_eq!(parse_history_mode("monitor"), Some(HistoryMode::Monitor));
        assert_eq!(parse_history_mode("xml"), None);
    }

    #[test]
    fn float_trimming() {
        assert_eq!(format_float_trim(0.000125000), "0.000125");
        assert_eq!(format_float_trim(20.0), "20");
        assert_eq!(format_float_trim(-0.5), "-0.5");
        assert_eq!(format_float_trim(0.0), "0");
    }

    #[test]
    fn csv_escaping() {
        assert_eq!(escape_csv_field("plain"), "plain");
        assert_eq!(escape_csv_field("a,b"), "\"a,b\"");
        assert_eq!(escape_csv_field("say \"hi\""), "\"say \"\"hi\"\"\"");
        assert_eq!(escape_csv_field("two\nlines"), "\"two\nlines\"");
    }

    #[test]
    fn csv_sanitizing() {
        assert_eq!(sanitize_for_csv("ams1"), "ams1");
        assert_eq!(sanitize_for_csv("a\0b"), "a<NULL>b");
        assert_eq!(sanitize_for_csv("a\u{1b}b"), "a<0x1B>b");
        // tabs and newlines survive for the escaper to quote
        assert_eq!(sanitize_for_csv("a\tb"), "a\tb");
    }

    #[test]
    fn csv_document_shape() {
        let mut monitor_names = HashMap::new();
        monitor_names.insert(4, "ams, west".to_string());
        let history = LogScoreHistory {
            scores: vec![LogScore {
                id: 1,
                monitor_id: Some(4),
                server_id: 42,
                ts: 1_722_330_000,
                score: 19.5,
                step: 0.9,
                offset: Some(-0.00125),
                rtt: Some(12_500),
                leap: Some(0),
                warning: None,
                error: None,
            }],
            monitor_names,
        };

        let response = history_csv(&history).unwrap();
        assert_eq!(response.status(), axum::http::StatusCode::OK);

        let body = tokio_test::block_on(axum::body::to_bytes(
            response.into_body(),
            usize::MAX,
        ))
        .unwrap();
        let text = String::from_utf8(body.to_vec()).unwrap();
        let mut lines = text.lines();
        assert_eq!(
            lines.next().unwrap(),
            "ts_epoch,ts,offset,step,score,monitor_id,monitor_name,rtt,leap,error"
        );
        let row = lines.next().unwrap();
        assert!(row.starts_with("1722330000,"));
        assert!(row.contains("-0.00125,0.9,19.5,4,\"ams, west\",12.5,0,"));
    }

    #[test]
    fn score_rounding_strips_float_noise() {
        assert_eq!(round_score(19.500000000000004), 19.5);
        assert_eq!(round_score(-0.25), -0.25);
    }
}
