//! Integration tests for the movie popularity recompute job

mod common;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::NaiveDateTime;
use common::*;
use popcorn_common::db::settings::{get_setting, MOVIE_JOB_LAST_RUN};
use popcorn_common::{Error, Result};
use popcorn_scorer::counts::{CountSource, LikeHateStats, ReviewStats, SqliteCountSource};
use popcorn_scorer::jobs::MovieScoreScheduler;
use sqlx::SqlitePool;

/// Delegates to SQLite but can fail selected lookups
struct FlakyCounts {
    inner: SqliteCountSource,
    broken_movie: Option<i64>,
    broken_reviews: Option<i64>,
    broken_snapshot: bool,
    snapshots: AtomicUsize,
}

impl FlakyCounts {
    fn new(db: &SqlitePool) -> Self {
        Self {
            inner: SqliteCountSource::new(db.clone()),
            broken_movie: None,
            broken_reviews: None,
            broken_snapshot: false,
            snapshots: AtomicUsize::new(0),
        }
    }

    fn fail(&self, movie_id: i64, broken: Option<i64>) -> Result<()> {
        if broken == Some(movie_id) {
            return Err(Error::Internal(format!("lookup failed for movie {}", movie_id)));
        }
        Ok(())
    }
}

#[async_trait]
impl CountSource for FlakyCounts {
    async fn count_follows_received(&self, member_id: i64, before: NaiveDateTime) -> Result<i64> {
        self.inner.count_follows_received(member_id, before).await
    }

    async fn count_review_likes_received(
        &self,
        member_id: i64,
        before: NaiveDateTime,
    ) -> Result<i64> {
        self.inner.count_review_likes_received(member_id, before).await
    }

    async fn count_review_hates_received(
        &self,
        member_id: i64,
        before: NaiveDateTime,
    ) -> Result<i64> {
        self.inner.count_review_hates_received(member_id, before).await
    }

    async fn review_stats(&self, movie_id: i64) -> Result<ReviewStats> {
        self.fail(movie_id, self.broken_reviews)?;
        self.inner.review_stats(movie_id).await
    }

    async fn like_hate_stats(&self, movie_id: i64) -> Result<LikeHateStats> {
        self.fail(movie_id, self.broken_movie)?;
        self.inner.like_hate_stats(movie_id).await
    }

    async fn watched_count(&self, movie_id: i64) -> Result<i64> {
        self.inner.watched_count(movie_id).await
    }

    async fn global_average_rating(&self) -> Result<f64> {
        self.inner.global_average_rating().await
    }

    async fn total_registered_members(&self) -> Result<i64> {
        self.snapshots.fetch_add(1, Ordering::SeqCst);
        if self.broken_snapshot {
            return Err(Error::Internal("member count unavailable".to_string()));
        }
        self.inner.total_registered_members().await
    }
}

/// Ten members; movie 1 has 3 likes, 1 hate and 4 views, movie 2 nothing
async fn seed_two_movies(db: &SqlitePool) {
    add_members(db, 1..=10).await;
    add_movie(db, 1).await;
    add_movie(db, 2).await;
    for member in 1..=3 {
        add_movie_reaction(db, member, 1, "like").await;
    }
    add_movie_reaction(db, 4, 1, "hate").await;
    for member in 1..=4 {
        add_watched(db, member, 1).await;
    }
}

#[tokio::test]
async fn test_run_scores_every_movie() {
    let db = memory_db().await;
    seed_two_movies(&db).await;
    let scheduler = MovieScoreScheduler::new(db.clone(), Arc::new(SqliteCountSource::new(db.clone())));

    let report = scheduler.run().await.unwrap();

    assert_eq!(report.subjects, 2);
    assert_eq!(report.processed, 2);
    assert_eq!(report.failed, 0);
    assert_eq!(movie_score(&db, 1).await, 60.5);
    // Global average 3.0, neutral like ratio, nobody watched
    assert_eq!(movie_score(&db, 2).await, 45.0);

    let last_run: Option<String> = get_setting(&db, MOVIE_JOB_LAST_RUN).await.unwrap();
    assert!(last_run.is_some());
}

#[tokio::test]
async fn test_run_is_idempotent() {
    let db = memory_db().await;
    seed_two_movies(&db).await;
    let scheduler = MovieScoreScheduler::new(db.clone(), Arc::new(SqliteCountSource::new(db.clone())));

    scheduler.run().await.unwrap();
    scheduler.run().await.unwrap();

    assert_eq!(movie_score(&db, 1).await, 60.5);
    assert_eq!(movie_score(&db, 2).await, 45.0);
}

#[tokio::test]
async fn test_reviews_pull_towards_global_average() {
    let db = memory_db().await;
    add_members(&db, 1..=2).await;
    add_movie(&db, 1).await;
    add_movie(&db, 2).await;
    add_review(&db, 1, 1, 5.0).await;
    add_review(&db, 2, 2, 1.0).await;
    let scheduler = MovieScoreScheduler::new(db.clone(), Arc::new(SqliteCountSource::new(db.clone())));

    let scored = scheduler.recompute_movie(1).await.unwrap();

    assert_eq!(scored.context.total_members, 2);
    assert_eq!(scored.context.global_average, 3.0);
    // (5 + 100 * 3) / 101 = 3.0198 -> 0.30198 + 0.15 + 0
    assert_eq!(scored.popcorn_score, 45.2);
    assert_eq!(movie_score(&db, 1).await, 45.2);
}

#[tokio::test]
async fn test_snapshot_taken_once_per_run() {
    let db = memory_db().await;
    seed_two_movies(&db).await;
    add_movie(&db, 3).await;
    let counts = Arc::new(FlakyCounts::new(&db));
    let scheduler = MovieScoreScheduler::new(db.clone(), counts.clone());

    let report = scheduler.run().await.unwrap();

    assert_eq!(report.subjects, 3);
    assert_eq!(counts.snapshots.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_failing_movie_scores_zero_and_batch_continues() {
    let db = memory_db().await;
    seed_two_movies(&db).await;
    add_movie(&db, 3).await;
    sqlx::query("UPDATE movies SET popcorn_score = 88 WHERE id = 2")
        .execute(&db)
        .await
        .unwrap();
    let counts = FlakyCounts {
        broken_movie: Some(2),
        ..FlakyCounts::new(&db)
    };
    let scheduler = MovieScoreScheduler::new(db.clone(), Arc::new(counts));

    let report = scheduler.run().await.unwrap();

    assert_eq!(report.subjects, 3);
    assert_eq!(report.processed, 2);
    assert_eq!(report.failed, 1);
    assert_eq!(movie_score(&db, 1).await, 60.5);
    assert_eq!(movie_score(&db, 2).await, 0.0);
    assert_eq!(movie_score(&db, 3).await, 45.0);
}

#[tokio::test]
async fn test_review_lookup_failure_assumes_no_reviews() {
    let db = memory_db().await;
    seed_two_movies(&db).await;
    let counts = FlakyCounts {
        broken_reviews: Some(1),
        ..FlakyCounts::new(&db)
    };
    let scheduler = MovieScoreScheduler::new(db.clone(), Arc::new(counts));

    let report = scheduler.run().await.unwrap();

    assert_eq!(report.failed, 0);
    assert_eq!(movie_score(&db, 1).await, 60.5);
}

#[tokio::test]
async fn test_snapshot_failure_aborts_run() {
    let db = memory_db().await;
    seed_two_movies(&db).await;
    sqlx::query("UPDATE movies SET popcorn_score = 12.5")
        .execute(&db)
        .await
        .unwrap();
    let counts = FlakyCounts {
        broken_snapshot: true,
        ..FlakyCounts::new(&db)
    };
    let scheduler = MovieScoreScheduler::new(db.clone(), Arc::new(counts));

    assert!(scheduler.run().await.is_err());
    assert_eq!(movie_score(&db, 1).await, 12.5);
}

#[tokio::test]
async fn test_recompute_unknown_movie_is_not_found() {
    let db = memory_db().await;
    let scheduler = MovieScoreScheduler::new(db.clone(), Arc::new(SqliteCountSource::new(db.clone())));

    let err = scheduler.recompute_movie(99).await.unwrap_err();
    assert!(err.is_not_found());
}
