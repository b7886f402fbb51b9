//! Administrative operations
//!
//! On-demand counterparts of the periodic jobs plus the bulk reset hooks.
//! Every handler runs the work inline and returns its outcome.

use axum::{
    extract::{Path, Query, State},
    Json,
};
use chrono::NaiveDate;
use popcorn_common::time::{parse_date, today};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::accumulator::{self, MemberScore};
use crate::error::{ApiError, ApiResult};
use crate::jobs::{BatchReport, MovieScore};
use crate::AppState;

/// Query parameters for a forced date recompute
#[derive(Debug, Deserialize)]
pub struct RecomputeDateQuery {
    /// `YYYY-MM-DD`, defaults to yesterday
    pub date: Option<String>,
}

/// Count of rows touched by a bulk operation
#[derive(Debug, Serialize)]
pub struct AffectedResponse {
    pub affected: u64,
}

fn yesterday(today: NaiveDate) -> NaiveDate {
    today.pred_opt().unwrap_or(today)
}

/// POST /api/admin/members/recompute?date=YYYY-MM-DD
pub async fn force_recompute_for_date(
    State(state): State<AppState>,
    Query(query): Query<RecomputeDateQuery>,
) -> ApiResult<Json<BatchReport>> {
    let today = today();
    let date = match query.date.as_deref() {
        Some(raw) => parse_date(raw).map_err(|e| ApiError::BadRequest(e.to_string()))?,
        None => yesterday(today),
    };

    info!("Admin: force recompute of {}", date);
    let report = state.members.force_recompute_for_date(date, today).await?;
    Ok(Json(report))
}

/// POST /api/admin/members/:id/recompute
pub async fn force_recompute_member(
    State(state): State<AppState>,
    Path(member_id): Path<i64>,
) -> ApiResult<Json<MemberScore>> {
    info!(member_id, "Admin: recompute member");
    let member = state.members.recompute_member(member_id, today()).await?;
    Ok(Json(member.into()))
}

/// POST /api/admin/members/reset
pub async fn reset_all_member_scores(
    State(state): State<AppState>,
) -> ApiResult<Json<AffectedResponse>> {
    let affected = accumulator::reset_all(&state.db).await?;
    Ok(Json(AffectedResponse { affected }))
}

/// DELETE /api/admin/exp-logs
pub async fn clear_all_ledger_rows(
    State(state): State<AppState>,
) -> ApiResult<Json<AffectedResponse>> {
    let affected = accumulator::clear_all_ledger(&state.db).await?;
    Ok(Json(AffectedResponse { affected }))
}

/// POST /api/admin/movies/:id/recompute
pub async fn recompute_movie(
    State(state): State<AppState>,
    Path(movie_id): Path<i64>,
) -> ApiResult<Json<MovieScore>> {
    let score = state.movies.recompute_movie(movie_id).await?;
    Ok(Json(score))
}

/// POST /api/admin/jobs/member-daily/run
pub async fn run_member_job(State(state): State<AppState>) -> ApiResult<Json<BatchReport>> {
    info!("Admin: running member daily job now");
    let report = state.members.run_daily(today()).await?;
    Ok(Json(report))
}

/// POST /api/admin/jobs/movie-popularity/run
pub async fn run_movie_job(State(state): State<AppState>) -> ApiResult<Json<BatchReport>> {
    info!("Admin: running movie popularity job now");
    let report = state.movies.run().await?;
    Ok(Json(report))
}
