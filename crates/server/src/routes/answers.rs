// crates/server/src/routes/answers.rs
//! The per-server DNS answers report.
//!
//! Three independent queries fan out per request: the server's netspeed
//! and zone reference data from the metadata database, the per-country
//! answer counts for the server, and the pool-wide per-country totals.
//! The first failure cancels the rest and fails the report.

use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::Arc;

use axum::extract::{Path, RawQuery, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use poolstats_core::{normalize, points, AliasTable, POINT_BASIS, POINT_SYMBOL};
use poolstats_db::IpVersion;

use crate::error::{ApiError, ApiResult};
use crate::routes::with_cache_control;
use crate::state::AppState;

/// Window for the per-server counts and the pool-wide reference.
const ANSWER_DAYS: u32 = 3;

#[derive(Debug, Clone, Serialize)]
struct CountryAnswer {
    cc: String,
    count: u64,
    points: f64,
    ratio: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    netspeed: Option<f64>,
}

#[derive(Debug, Serialize)]
struct AnswersResponse {
    server: Vec<CountryAnswer>,
    point_symbol: &'static str,
}

pub async fn dns_answers(
    State(state): State<Arc<AppState>>,
    Path(server): Path<String>,
    RawQuery(query): RawQuery,
) -> Response {
    match run(&state, &server, query.as_deref()).await {
        Ok(response) => response,
        // errors and 404s get a shorter cache time
        Err(err) => with_cache_control(err.into_response(), "public,max-age=300"),
    }
}

async fn run(state: &AppState, server: &str, query: Option<&str>) -> ApiResult<Response> {
    let ip: IpAddr = server
        .parse()
        .map_err(|_| ApiError::BadRequest("invalid server address".to_string()))?;

    // better URLs are forever
    if ip.to_string() != server || query.is_some_and(|q| !q.is_empty()) {
        let response = (
            StatusCode::PERMANENT_REDIRECT,
            [(header::LOCATION, format!("/api/server/dns/answers/{ip}"))],
        )
            .into_response();
        return Ok(with_cache_control(response, "public,max-age=10400"));
    }

    let ip_str = ip.to_string();
    let qtype = if ip.is_ipv6() {
        IpVersion::V6.qtype()
    } else {
        IpVersion::V4.qtype()
    };

    let (reference, counts, totals) = tokio::try_join!(
        server_reference(state, &ip_str),
        async {
            state
                .ch
                .server_answer_counts(&ip_str, ANSWER_DAYS)
                .await
                .map_err(ApiError::from)
        },
        async {
            state
                .ch
                .answer_totals(qtype, ANSWER_DAYS)
                .await
                .map_err(ApiError::from)
        },
    )?;
    let (server_netspeed, zone_totals) = reference;

    let mut entries = Vec::with_capacity(counts.by_key.len() + 1);

    // The grand total leads the list, normalized against the pool-wide
    // total for the server's query type.
    let total_points = points(POINT_BASIS, totals.total, counts.total);
    entries.push(CountryAnswer {
        cc: String::new(),
        count: counts.total,
        points: total_points,
        ratio: total_points / POINT_BASIS,
        netspeed: netspeed_points(&zone_totals, &state.aliases, "", server_netspeed),
    });

    for metric in normalize(&counts.by_key, &totals, POINT_BASIS, &state.aliases) {
        let netspeed = netspeed_points(&zone_totals, &state.aliases, &metric.key, server_netspeed);
        entries.push(CountryAnswer {
            cc: metric.key,
            count: metric.count,
            points: metric.points,
            ratio: metric.ratio,
            netspeed,
        });
    }

    let body = AnswersResponse {
        server: entries,
        point_symbol: POINT_SYMBOL,
    };
    Ok(with_cache_control(
        Json(body).into_response(),
        "public,max-age=1800",
    ))
}

/// The server's netspeed plus the per-zone netspeed reference. A missing
/// server fails the whole report with a 404.
async fn server_reference(
    state: &AppState,
    ip: &str,
) -> ApiResult<(u32, HashMap<String, u64>)> {
    let netspeed = state
        .db
        .get_server_netspeed(ip)
        .await?
        .ok_or_else(|| ApiError::NotFound("server not found".to_string()))?;

    let zones = state.db.get_server_zone_stats(ip).await?;
    let mut totals = HashMap::with_capacity(zones.len());
    for zone in zones {
        // the root zone is keyed like the grand total entry
        let name = if zone.zone_name == "@" {
            String::new()
        } else {
            zone.zone_name
        };
        totals.insert(name, zone.netspeed_active);
    }
    Ok((netspeed, totals))
}

/// The server's share of its zone's capacity, when the zone is known.
fn netspeed_points(
    zone_totals: &HashMap<String, u64>,
    aliases: &AliasTable,
    cc: &str,
    server_netspeed: u32,
) -> Option<f64> {
    zone_totals
        .get(aliases.resolve(cc))
        .map(|&total| points(POINT_BASIS, total, server_netspeed as u64))
}
