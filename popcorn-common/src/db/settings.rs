//! Settings database access
//!
//! Key-value bookkeeping, e.g. when each periodic job last completed.

use crate::{Error, Result};
use sqlx::SqlitePool;
use std::str::FromStr;

/// Settings key for the member daily experience job
pub const MEMBER_JOB_LAST_RUN: &str = "member_job_last_run";

/// Settings key for the movie popularity job
pub const MOVIE_JOB_LAST_RUN: &str = "movie_job_last_run";

/// Read and parse a setting; empty or missing values are `None`
pub async fn get_setting<T>(db: &SqlitePool, key: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    let value: Option<Option<String>> =
        sqlx::query_scalar("SELECT value FROM settings WHERE key = ?")
            .bind(key)
            .fetch_optional(db)
            .await?;

    match value.flatten().filter(|v| !v.is_empty()) {
        Some(raw) => raw
            .parse::<T>()
            .map(Some)
            .map_err(|e| Error::Config(format!("Invalid value for setting '{}': {}", key, e))),
        None => Ok(None),
    }
}

/// Write a setting (insert or replace)
pub async fn set_setting<T: ToString>(db: &SqlitePool, key: &str, value: T) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO settings (key, value, updated_at)
        VALUES (?, ?, CURRENT_TIMESTAMP)
        ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = CURRENT_TIMESTAMP
        "#,
    )
    .bind(key)
    .bind(value.to_string())
    .execute(db)
    .await?;

    Ok(())
}
