// crates/server/src/routes/graph.rs
//! Offset graph images, proxied from the rendering service.

use std::sync::Arc;

use axum::extract::{Path, RawQuery, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};

use crate::error::{ApiError, ApiResult};
use crate::routes::with_cache_control;
use crate::state::AppState;

const GRAPH_RETRIES: u32 = 3;

/// Graphs for servers deleted longer ago than this 404.
const DELETED_GRAPH_CUTOFF_DAYS: i64 = 7;

pub async fn graph_image(
    State(state): State<Arc<AppState>>,
    Path((server_param, image_type)): Path<(String, String)>,
    RawQuery(query): RawQuery,
) -> Response {
    match run(&state, &server_param, &image_type, query.as_deref()).await {
        Ok(response) => response,
        // cache errors briefly
        Err(err) => with_cache_control(err.into_response(), "public,max-age=240"),
    }
}

async fn run(
    state: &AppState,
    server_param: &str,
    image_type: &str,
    query: Option<&str>,
) -> ApiResult<Response> {
    if image_type != "offset.png" {
        return Err(ApiError::NotFound("invalid image name".to_string()));
    }

    // query parameters bust the CDN cache; send clients back to the
    // canonical URL
    if query.is_some_and(|q| !q.is_empty()) {
        return Ok((
            StatusCode::PERMANENT_REDIRECT,
            [(header::LOCATION, format!("/graph/{server_param}/offset.png"))],
        )
            .into_response());
    }

    let server = state
        .db
        .find_server(server_param)
        .await?
        .filter(|s| !s.deletion_age_exceeds(DELETED_GRAPH_CUTOFF_DAYS))
        .ok_or_else(|| ApiError::NotFound("not found".to_string()))?;

    let base = state
        .graph_service_url
        .as_deref()
        .ok_or_else(|| ApiError::Internal("graph service not configured".to_string()))?;
    let url = format!("{}/graph/{}/offset.png", base.trim_end_matches('/'), server.ip);

    let mut last_error = String::new();
    for attempt in 1..=GRAPH_RETRIES {
        match state.http.get(&url).send().await {
            Ok(response) if response.status().is_success() => {
                let bytes = response
                    .bytes()
                    .await
                    .map_err(|err| ApiError::Upstream(err.to_string()))?;
                let response = (
                    [(header::CONTENT_TYPE, "image/png")],
                    bytes,
                )
                    .into_response();
                return Ok(with_cache_control(response, "public,max-age=1800"));
            }
            Ok(response) => {
                last_error = format!("graph service returned {}", response.status());
            }
            Err(err) => {
                last_error = err.to_string();
            }
        }
        tracing::warn!(attempt, url = %url, error = %last_error, "graph fetch failed");
    }

    Err(ApiError::Upstream(last_error))
}
