//! Movie popularity recompute job
//!
//! A full pass rescores every movie against one [`RunContext`] snapshot.
//! There is no per-movie state between runs, so rerunning a pass (or a single
//! movie) is always safe.

use std::sync::Arc;

use popcorn_common::db::settings::{set_setting, MOVIE_JOB_LAST_RUN};
use popcorn_common::time::format_timestamp;
use popcorn_common::{Error, Result};
use serde::Serialize;
use sqlx::SqlitePool;
use tracing::{error, info, warn};

use super::{BatchReport, MOVIE_POPULARITY_JOB};
use crate::counts::CountSource;
use crate::movie_score::{MovieScoreCalculator, RunContext, ScoreOutcome};

/// Result of rescoring one movie on demand
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MovieScore {
    pub movie_id: i64,
    pub popcorn_score: f64,
    pub context: RunContext,
}

/// Drives the movie calculator over all movies
pub struct MovieScoreScheduler {
    db: SqlitePool,
    counts: Arc<dyn CountSource>,
    calculator: MovieScoreCalculator,
}

impl MovieScoreScheduler {
    pub fn new(db: SqlitePool, counts: Arc<dyn CountSource>) -> Self {
        let calculator = MovieScoreCalculator::new(counts.clone());
        Self {
            db,
            counts,
            calculator,
        }
    }

    /// Full pass over every movie
    ///
    /// Fails only when the run snapshot itself cannot be taken; per-movie
    /// problems are counted in the report.
    pub async fn run(&self) -> Result<BatchReport> {
        let ctx = RunContext::snapshot(self.counts.as_ref()).await?;
        let movies: Vec<i64> = sqlx::query_scalar("SELECT id FROM movies ORDER BY id")
            .fetch_all(&self.db)
            .await?;
        let mut report = BatchReport::start(MOVIE_POPULARITY_JOB);

        info!(
            "Starting {} job: {} movies, {} members, global average {:.3}",
            MOVIE_POPULARITY_JOB,
            movies.len(),
            ctx.total_members,
            ctx.global_average
        );

        for movie_id in movies {
            report.subjects += 1;
            let outcome = self.calculator.score(movie_id, &ctx).await;

            match self.persist(movie_id, outcome.value()).await {
                Ok(()) if outcome == ScoreOutcome::Fallback => report.failed += 1,
                Ok(()) => report.processed += 1,
                Err(e) => {
                    report.failed += 1;
                    error!(movie_id, "Failed to store movie score: {}", e);
                }
            }
        }

        let report = report.finish();
        if let Some(finished) = report.finished_at {
            let stamp = format_timestamp(finished.naive_utc());
            if let Err(e) = set_setting(&self.db, MOVIE_JOB_LAST_RUN, stamp).await {
                warn!("Failed to record {} completion: {}", MOVIE_POPULARITY_JOB, e);
            }
        }
        info!(
            "{} job finished: {} scored, {} failed",
            MOVIE_POPULARITY_JOB, report.processed, report.failed
        );
        Ok(report)
    }

    /// Rescore a single movie with a fresh snapshot
    pub async fn recompute_movie(&self, movie_id: i64) -> Result<MovieScore> {
        let exists: Option<i64> = sqlx::query_scalar("SELECT id FROM movies WHERE id = ?")
            .bind(movie_id)
            .fetch_optional(&self.db)
            .await?;
        if exists.is_none() {
            return Err(Error::NotFound(format!("movie {}", movie_id)));
        }

        let ctx = RunContext::snapshot(self.counts.as_ref()).await?;
        let popcorn_score = self.calculator.score(movie_id, &ctx).await.value();
        self.persist(movie_id, popcorn_score).await?;

        info!(movie_id, popcorn_score, "Recomputed movie score");
        Ok(MovieScore {
            movie_id,
            popcorn_score,
            context: ctx,
        })
    }

    async fn persist(&self, movie_id: i64, popcorn_score: f64) -> Result<()> {
        sqlx::query(
            "UPDATE movies SET popcorn_score = ?, updated_at = CURRENT_TIMESTAMP WHERE id = ?",
        )
        .bind(popcorn_score)
        .bind(movie_id)
        .execute(&self.db)
        .await?;
        Ok(())
    }
}
