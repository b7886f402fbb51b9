//! Shared fixtures for popcorn-scorer integration tests

#![allow(dead_code)]

use chrono::{NaiveDate, NaiveDateTime};
use popcorn_common::db::create_schema;
use popcorn_common::time::format_timestamp;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::SqlitePool;

/// Fresh in-memory database with the full schema
///
/// One connection only: every connection to `sqlite::memory:` is its own
/// database.
pub async fn memory_db() -> SqlitePool {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .expect("Should open in-memory database");
    create_schema(&pool).await.expect("Should create schema");
    pool
}

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
}

/// Instant on `day` at `hour`:00:00
pub fn at(day: NaiveDate, hour: u32) -> NaiveDateTime {
    day.and_hms_opt(hour, 0, 0).expect("valid time")
}

pub async fn add_member(db: &SqlitePool, id: i64) {
    sqlx::query("INSERT INTO members (id, nickname) VALUES (?, ?)")
        .bind(id)
        .bind(format!("member{}", id))
        .execute(db)
        .await
        .expect("Should insert member");
}

pub async fn add_members(db: &SqlitePool, ids: std::ops::RangeInclusive<i64>) {
    for id in ids {
        add_member(db, id).await;
    }
}

pub async fn add_movie(db: &SqlitePool, id: i64) {
    sqlx::query("INSERT INTO movies (id, title) VALUES (?, ?)")
        .bind(id)
        .bind(format!("movie{}", id))
        .execute(db)
        .await
        .expect("Should insert movie");
}

pub async fn add_follow(
    db: &SqlitePool,
    follower_id: i64,
    following_id: i64,
    created_at: NaiveDateTime,
    deleted_at: Option<NaiveDateTime>,
) {
    sqlx::query(
        "INSERT INTO follows (follower_id, following_id, created_at, deleted_at) VALUES (?, ?, ?, ?)",
    )
    .bind(follower_id)
    .bind(following_id)
    .bind(format_timestamp(created_at))
    .bind(deleted_at.map(format_timestamp))
    .execute(db)
    .await
    .expect("Should insert follow");
}

/// Review by `member_id`; returns the review id
pub async fn add_review(db: &SqlitePool, member_id: i64, movie_id: i64, rating: f64) -> i64 {
    sqlx::query("INSERT INTO reviews (member_id, movie_id, rating) VALUES (?, ?, ?)")
        .bind(member_id)
        .bind(movie_id)
        .bind(rating)
        .execute(db)
        .await
        .expect("Should insert review")
        .last_insert_rowid()
}

pub async fn add_review_reaction(
    db: &SqlitePool,
    review_id: i64,
    member_id: i64,
    kind: &str,
    created_at: NaiveDateTime,
) {
    sqlx::query(
        "INSERT INTO review_reactions (review_id, member_id, kind, created_at) VALUES (?, ?, ?, ?)",
    )
    .bind(review_id)
    .bind(member_id)
    .bind(kind)
    .bind(format_timestamp(created_at))
    .execute(db)
    .await
    .expect("Should insert review reaction");
}

pub async fn add_movie_reaction(db: &SqlitePool, member_id: i64, movie_id: i64, kind: &str) {
    sqlx::query("INSERT INTO movie_reactions (member_id, movie_id, kind) VALUES (?, ?, ?)")
        .bind(member_id)
        .bind(movie_id)
        .bind(kind)
        .execute(db)
        .await
        .expect("Should insert movie reaction");
}

pub async fn add_watched(db: &SqlitePool, member_id: i64, movie_id: i64) {
    sqlx::query("INSERT INTO watched_movies (member_id, movie_id) VALUES (?, ?)")
        .bind(member_id)
        .bind(movie_id)
        .execute(db)
        .await
        .expect("Should insert watched movie");
}

/// Stored (total_experience, popcorn_score) of a member
pub async fn member_totals(db: &SqlitePool, member_id: i64) -> (f64, f64) {
    sqlx::query_as("SELECT total_experience, popcorn_score FROM members WHERE id = ?")
        .bind(member_id)
        .fetch_one(db)
        .await
        .expect("Should read member")
}

pub async fn movie_score(db: &SqlitePool, movie_id: i64) -> f64 {
    sqlx::query_scalar("SELECT popcorn_score FROM movies WHERE id = ?")
        .bind(movie_id)
        .fetch_one(db)
        .await
        .expect("Should read movie")
}
