// crates/server/src/routes/zones.rs
//! Zone growth history with optional decimation.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::header;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};

use poolstats_core::{decimate, DatedGroup};
use poolstats_db::ZoneServerCount;

use crate::error::{ApiError, ApiResult};
use crate::routes::with_cache_control;
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ZoneCountsQuery {
    pub limit: Option<usize>,
}

/// Compact history entry: one row per day and IP version.
#[derive(Debug, Serialize)]
struct HistoryEntry {
    /// date
    d: String,
    /// epoch timestamp
    ts: i64,
    /// count registered
    rc: u32,
    /// count active
    ac: u32,
    /// netspeed active
    w: u32,
    /// ip version
    iv: &'static str,
}

#[derive(Debug, Serialize)]
struct ZoneCountsResponse {
    history: Vec<HistoryEntry>,
}

pub async fn zone_counts(
    State(state): State<Arc<AppState>>,
    Path(zone_name): Path<String>,
    Query(query): Query<ZoneCountsQuery>,
) -> Response {
    match run(&state, &zone_name, query.limit.unwrap_or(0)).await {
        Ok(response) => response,
        Err(err) => with_cache_control(err.into_response(), "public,max-age=240"),
    }
}

async fn run(state: &AppState, zone_name: &str, limit: usize) -> ApiResult<Response> {
    let zone = state
        .db
        .get_zone_by_name(zone_name)
        .await?
        .ok_or_else(|| ApiError::NotFound("zone not found".to_string()))?;

    let counts = state.db.get_zone_counts(zone.id).await?;
    let groups = decimate(group_by_date(counts), limit);

    let history: Vec<HistoryEntry> = groups
        .into_iter()
        .flat_map(|group| {
            let d = group.date.format("%Y-%m-%d").to_string();
            let ts = group
                .date
                .and_hms_opt(0, 0, 0)
                .unwrap()
                .and_utc()
                .timestamp();
            group.rows.into_iter().map(move |row| HistoryEntry {
                d: d.clone(),
                ts,
                rc: row.count_registered,
                ac: row.count_active,
                w: row.netspeed_active,
                iv: row.ip_version.as_str(),
            })
        })
        .collect();

    let response = (
        [(header::ACCESS_CONTROL_ALLOW_ORIGIN, "*")],
        Json(ZoneCountsResponse { history }),
    )
        .into_response();
    Ok(with_cache_control(response, "s-maxage=28800, max-age=7200"))
}

/// Fold date-sorted rows into per-date groups. Decimation selects whole
/// dates, so the IP versions of a selected day always survive together.
fn group_by_date(counts: Vec<ZoneServerCount>) -> Vec<DatedGroup<ZoneServerCount>> {
    let mut groups: Vec<DatedGroup<ZoneServerCount>> = Vec::new();
    for row in counts {
        match groups.last_mut() {
            Some(group) if group.date == row.date => group.rows.push(row),
            _ => groups.push(DatedGroup::new(row.date, vec![row])),
        }
    }
    groups
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use poolstats_db::IpVersion;

    fn count(date: (i32, u32, u32), ip_version: IpVersion) -> ZoneServerCount {
        ZoneServerCount {
            ip_version,
            date: NaiveDate::from_ymd_opt(date.0, date.1, date.2).unwrap(),
            count_active: 10,
            count_registered: 12,
            netspeed_active: 1000,
        }
    }

    #[test]
    fn groups_interleaved_ip_versions_by_date() {
        let counts = vec![
            count((2025, 7, 1), IpVersion::V4),
            count((2025, 7, 1), IpVersion::V6),
            count((2025, 7, 2), IpVersion::V4),
            count((2025, 7, 3), IpVersion::V4),
            count((2025, 7, 3), IpVersion::V6),
        ];

        let groups = group_by_date(counts);

        assert_eq!(groups.len(), 3);
        assert_eq!(groups[0].rows.len(), 2);
        assert_eq!(groups[1].rows.len(), 1);
        assert_eq!(groups[2].rows.len(), 2);
    }

    #[test]
    fn empty_history_groups_to_nothing() {
        assert!(group_by_date(Vec::new()).is_empty());
    }
}
