// crates/server/src/routes/mod.rs
//! Route handlers and the API router.

pub mod answers;
pub mod grafana;
pub mod graph;
pub mod health;
pub mod history;
pub mod usercc;
pub mod zones;

use std::sync::Arc;

use axum::http::{header, HeaderValue};
use axum::response::Response;
use axum::routing::get;
use axum::Router;

use crate::state::AppState;

pub fn api_routes(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/health", get(health::health))
        .route("/api/usercc", get(usercc::user_country_data))
        .route("/api/server/dns/answers/{server}", get(answers::dns_answers))
        .route("/api/server/scores/{server}/{mode}", get(history::history))
        .route(
            "/api/v2/server/scores/{server}/{mode}",
            get(grafana::scores_time_range),
        )
        .route("/api/v2/test/grafana-table", get(grafana::test_table))
        .route("/api/zone/counts/{zone_name}", get(zones::zone_counts))
        .route("/graph/{server}/{type}", get(graph::graph_image))
        .with_state(state)
}

/// Replace the response's Cache-Control; each route owns its cache policy.
pub(crate) fn with_cache_control(mut response: Response, value: &'static str) -> Response {
    response
        .headers_mut()
        .insert(header::CACHE_CONTROL, HeaderValue::from_static(value));
    response
}
