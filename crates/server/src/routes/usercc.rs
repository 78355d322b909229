// crates/server/src/routes/usercc.rs
//! Country share of global query volume plus zone capacity stats.

use std::sync::Arc;

use axum::extract::State;
use axum::http::header;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use poolstats_db::{CountryShare, ZoneStat};

use crate::error::{ApiError, ApiResult};
use crate::routes::with_cache_control;
use crate::state::AppState;

#[derive(Debug, Serialize)]
struct UserCountryResponse {
    user_country: Vec<CountryShare>,
    zone_stats: Vec<ZoneStat>,
}

pub async fn user_country_data(State(state): State<Arc<AppState>>) -> Response {
    match run(&state).await {
        Ok(response) => response,
        Err(err) => err.into_response(),
    }
}

async fn run(state: &AppState) -> ApiResult<Response> {
    let (zone_stats, user_country) = tokio::try_join!(
        async { state.db.zone_stats().await.map_err(ApiError::from) },
        async { state.ch.user_country_data().await.map_err(ApiError::from) },
    )?;

    let response = (
        [(header::ACCESS_CONTROL_ALLOW_ORIGIN, "*")],
        Json(UserCountryResponse {
            user_country,
            zone_stats,
        }),
    )
        .into_response();
    Ok(with_cache_control(response, "s-maxage=30,max-age=60"))
}
