//! popcorn-scorer library - reputation and popularity scoring engine
//!
//! - Member side: a per-day experience ledger folded into each member's
//!   running total ([`ledger`], [`accumulator`], [`jobs::member_daily`]).
//! - Movie side: a stateless blended popularity score recomputed for every
//!   movie on each pass ([`movie_score`], [`jobs::movie_popularity`]).
//! - [`scheduler`] fires both jobs daily; [`api`] exposes the admin hooks.

use std::sync::Arc;

use axum::Router;
use sqlx::SqlitePool;
use tower_http::trace::TraceLayer;

pub mod accumulator;
pub mod api;
pub mod counts;
pub mod error;
pub mod grade;
pub mod jobs;
pub mod ledger;
pub mod movie_score;
pub mod scheduler;

pub use crate::error::{ApiError, ApiResult};

use crate::counts::{CountSource, SqliteCountSource};
use crate::jobs::{MemberScoreScheduler, MovieScoreScheduler};

/// Application state shared across HTTP handlers
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool
    pub db: SqlitePool,
    /// Member ledger driver
    pub members: Arc<MemberScoreScheduler>,
    /// Movie score driver
    pub movies: Arc<MovieScoreScheduler>,
}

impl AppState {
    /// State reading counts straight from the platform tables
    pub fn new(db: SqlitePool) -> Self {
        let counts: Arc<dyn CountSource> = Arc::new(SqliteCountSource::new(db.clone()));
        Self::with_counts(db, counts)
    }

    /// State with an explicit count source
    pub fn with_counts(db: SqlitePool, counts: Arc<dyn CountSource>) -> Self {
        Self {
            members: Arc::new(MemberScoreScheduler::new(db.clone(), counts.clone())),
            movies: Arc::new(MovieScoreScheduler::new(db.clone(), counts)),
            db,
        }
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    use axum::routing::{delete, get, post};

    let admin = Router::new()
        .route("/api/admin/members/recompute", post(api::force_recompute_for_date))
        .route("/api/admin/members/:id/recompute", post(api::force_recompute_member))
        .route("/api/admin/members/reset", post(api::reset_all_member_scores))
        .route("/api/admin/exp-logs", delete(api::clear_all_ledger_rows))
        .route("/api/admin/movies/:id/recompute", post(api::recompute_movie))
        .route("/api/admin/jobs/member-daily/run", post(api::run_member_job))
        .route("/api/admin/jobs/movie-popularity/run", post(api::run_movie_job));

    let members = Router::new()
        .route("/api/members/:id/score", get(api::get_member_score))
        .route("/api/members/:id/exp-logs", get(api::get_member_exp_logs));

    Router::new()
        .merge(admin)
        .merge(members)
        .merge(api::health_routes())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
