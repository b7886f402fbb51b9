//! Health check endpoint

use axum::{extract::State, routing::get, Json, Router};
use popcorn_common::db::settings::{get_setting, MEMBER_JOB_LAST_RUN, MOVIE_JOB_LAST_RUN};
use serde::Serialize;

use crate::AppState;

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub module: String,
    pub version: String,
    /// Last completion of the member job, if any
    pub member_job_last_run: Option<String>,
    /// Last completion of the movie job, if any
    pub movie_job_last_run: Option<String>,
}

/// GET /health
///
/// Reports "degraded" when the database cannot be read.
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let member_last = get_setting::<String>(&state.db, MEMBER_JOB_LAST_RUN).await;
    let movie_last = get_setting::<String>(&state.db, MOVIE_JOB_LAST_RUN).await;

    let status = if member_last.is_ok() && movie_last.is_ok() {
        "ok"
    } else {
        "degraded"
    };

    Json(HealthResponse {
        status: status.to_string(),
        module: "popcorn-scorer".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        member_job_last_run: member_last.ok().flatten(),
        movie_job_last_run: movie_last.ok().flatten(),
    })
}

/// Build health check routes
pub fn health_routes() -> Router<AppState> {
    Router::new().route("/health", get(health_check))
}
