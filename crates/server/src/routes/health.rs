// crates/server/src/routes/health.rs
//! Health endpoint: concurrent backend pings.

use std::sync::Arc;
use std::time::Duration;

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde::Serialize;

use crate::state::AppState;

const PING_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Serialize)]
#[cfg_attr(test, derive(serde::Deserialize))]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_secs: u64,
}

pub async fn health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let (db, logs, scores) = tokio::join!(
        tokio::time::timeout(PING_TIMEOUT, state.db.ping()),
        tokio::time::timeout(PING_TIMEOUT, state.ch.logs.ping()),
        tokio::time::timeout(PING_TIMEOUT, state.ch.scores.ping()),
    );

    let mut healthy = true;
    let checks = [
        ("mysql", flatten(db)),
        ("ch_logs", flatten(logs)),
        ("ch_scores", flatten(scores)),
    ];
    for (backend, result) in checks {
        if let Err(error) = result {
            healthy = false;
            tracing::warn!(backend, %error, "health ping failed");
        }
    }

    let status = if healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    let body = HealthResponse {
        status: if healthy { "ok" } else { "unhealthy" }.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_secs: state.start_time.elapsed().as_secs(),
    };

    (status, Json(body))
}

fn flatten<E: std::fmt::Display>(
    result: Result<Result<(), E>, tokio::time::error::Elapsed>,
) -> Result<(), String> {
    match result {
        Ok(Ok(())) => Ok(()),
        Ok(Err(err)) => Err(err.to_string()),
        Err(_) => Err("ping timeout".to_string()),
    }
}
