//! Count source: point-in-time counts and aggregate statistics
//!
//! Everything the scoring engine reads about the social graph goes through
//! [`CountSource`]. The SQLite implementation reads the platform tables;
//! tests can substitute their own.
//!
//! "Received before `t`" means: created strictly before `t` and not yet
//! deleted at `t`. Follows and review reactions are soft-deleted, so the
//! count at any past instant is reproducible.

use async_trait::async_trait;
use chrono::NaiveDateTime;
use popcorn_common::time::format_timestamp;
use popcorn_common::Result;
use serde::Serialize;
use sqlx::SqlitePool;

/// Global average rating used when no review exists anywhere
pub const DEFAULT_GLOBAL_AVERAGE: f64 = 3.0;

/// Review count and mean rating of one movie
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct ReviewStats {
    pub count: i64,
    pub average_rating: f64,
}

/// Like/hate reactions on one movie
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct LikeHateStats {
    pub likes: i64,
    pub hates: i64,
}

/// Query surface the scoring engine depends on
#[async_trait]
pub trait CountSource: Send + Sync {
    /// Follows received by `member_id` that were live at `before`
    async fn count_follows_received(&self, member_id: i64, before: NaiveDateTime) -> Result<i64>;

    /// Likes on `member_id`'s reviews that were live at `before`
    async fn count_review_likes_received(
        &self,
        member_id: i64,
        before: NaiveDateTime,
    ) -> Result<i64>;

    /// Hates on `member_id`'s reviews that were live at `before`
    async fn count_review_hates_received(
        &self,
        member_id: i64,
        before: NaiveDateTime,
    ) -> Result<i64>;

    /// Review count and average rating; average is 0.0 with no reviews
    async fn review_stats(&self, movie_id: i64) -> Result<ReviewStats>;

    async fn like_hate_stats(&self, movie_id: i64) -> Result<LikeHateStats>;

    /// Members who marked the movie as seen
    async fn watched_count(&self, movie_id: i64) -> Result<i64>;

    /// Mean of every review rating, [`DEFAULT_GLOBAL_AVERAGE`] if undefined
    async fn global_average_rating(&self) -> Result<f64>;

    async fn total_registered_members(&self) -> Result<i64>;
}

/// [`CountSource`] backed by the platform's SQLite tables
#[derive(Clone)]
pub struct SqliteCountSource {
    db: SqlitePool,
}

impl SqliteCountSource {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }

    async fn count_review_reactions(
        &self,
        member_id: i64,
        kind: &str,
        before: NaiveDateTime,
    ) -> Result<i64> {
        let before = format_timestamp(before);
        let count: Option<i64> = sqlx::query_scalar(
            r#"
            SELECT COUNT(*)
            FROM review_reactions rr
            JOIN reviews r ON r.id = rr.review_id
            WHERE r.member_id = ?
              AND rr.kind = ?
              AND rr.created_at < ?
              AND (rr.deleted_at IS NULL OR rr.deleted_at >= ?)
            "#,
        )
        .bind(member_id)
        .bind(kind)
        .bind(&before)
        .bind(&before)
        .fetch_one(&self.db)
        .await?;

        Ok(count.unwrap_or(0))
    }
}

#[async_trait]
impl CountSource for SqliteCountSource {
    async fn count_follows_received(&self, member_id: i64, before: NaiveDateTime) -> Result<i64> {
        let before = format_timestamp(before);
        let count: Option<i64> = sqlx::query_scalar(
            r#"
            SELECT COUNT(*)
            FROM follows
            WHERE following_id = ?
              AND created_at < ?
              AND (deleted_at IS NULL OR deleted_at >= ?)
            "#,
        )
        .bind(member_id)
        .bind(&before)
        .bind(&before)
        .fetch_one(&self.db)
        .await?;

        Ok(count.unwrap_or(0))
    }

    async fn count_review_likes_received(
        &self,
        member_id: i64,
        before: NaiveDateTime,
    ) -> Result<i64> {
        self.count_review_reactions(member_id, "like", before).await
    }

    async fn count_review_hates_received(
        &self,
        member_id: i64,
        before: NaiveDateTime,
    ) -> Result<i64> {
        self.count_review_reactions(member_id, "hate", before).await
    }

    async fn review_stats(&self, movie_id: i64) -> Result<ReviewStats> {
        let (count, average): (i64, Option<f64>) =
            sqlx::query_as("SELECT COUNT(*), AVG(rating) FROM reviews WHERE movie_id = ?")
                .bind(movie_id)
                .fetch_one(&self.db)
                .await?;

        Ok(ReviewStats {
            count,
            average_rating: average.unwrap_or(0.0),
        })
    }

    async fn like_hate_stats(&self, movie_id: i64) -> Result<LikeHateStats> {
        let (likes, hates): (i64, i64) = sqlx::query_as(
            r#"
            SELECT
                COALESCE(SUM(CASE WHEN kind = 'like' THEN 1 ELSE 0 END), 0),
                COALESCE(SUM(CASE WHEN kind = 'hate' THEN 1 ELSE 0 END), 0)
            FROM movie_reactions
            WHERE movie_id = ?
            "#,
        )
        .bind(movie_id)
        .fetch_one(&self.db)
        .await?;

        Ok(LikeHateStats { likes, hates })
    }

    async fn watched_count(&self, movie_id: i64) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM watched_movies WHERE movie_id = ?")
            .bind(movie_id)
            .fetch_one(&self.db)
            .await?;
        Ok(count)
    }

    async fn global_average_rating(&self) -> Result<f64> {
        let average: Option<f64> = sqlx::query_scalar("SELECT AVG(rating) FROM reviews")
            .fetch_one(&self.db)
            .await?;
        Ok(average.unwrap_or(DEFAULT_GLOBAL_AVERAGE))
    }

    async fn total_registered_members(&self) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM members")
            .fetch_one(&self.db)
            .await?;
        Ok(count)
    }
}
