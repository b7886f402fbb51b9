//! Member score and ledger history

use axum::{
    extract::{Path, Query, State},
    Json,
};
use popcorn_common::db::DailyExpLog;
use popcorn_common::time::{horizon_start, today};
use serde::{Deserialize, Serialize};

use crate::accumulator::{load_member, MemberScore, RECALCULATE_HORIZON_DAYS};
use crate::error::{ApiError, ApiResult};
use crate::AppState;

/// Query parameters for ledger history
#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    /// Completed days before today
    #[serde(default = "default_days")]
    pub days: u32,
}

fn default_days() -> u32 {
    30
}

/// Ledger history response
#[derive(Debug, Serialize)]
pub struct HistoryResponse {
    pub member_id: i64,
    pub days: u32,
    pub total_in_range: f64,
    pub logs: Vec<DailyExpLog>,
}

/// GET /api/members/:id/score
pub async fn get_member_score(
    State(state): State<AppState>,
    Path(member_id): Path<i64>,
) -> ApiResult<Json<MemberScore>> {
    let member = load_member(&state.db, member_id).await?;
    Ok(Json(member.into()))
}

/// GET /api/members/:id/exp-logs?days=N
///
/// The `days` completed days before today, newest first. `days` is capped
/// at the recalculation horizon.
pub async fn get_member_exp_logs(
    State(state): State<AppState>,
    Path(member_id): Path<i64>,
    Query(query): Query<HistoryQuery>,
) -> ApiResult<Json<HistoryResponse>> {
    if query.days == 0 {
        return Err(ApiError::BadRequest("days must be at least 1".to_string()));
    }
    let days = query.days.min(RECALCULATE_HORIZON_DAYS);

    load_member(&state.db, member_id).await?;
    let today = today();
    let logs = state
        .members
        .ledger()
        .history(member_id, horizon_start(today, days), today)
        .await?;

    Ok(Json(HistoryResponse {
        member_id,
        days,
        total_in_range: logs.iter().map(|log| log.daily_exp).sum(),
        logs,
    }))
}
