//! Tests for database creation, schema idempotence and settings access

use popcorn_common::db::init::{init_database, SCHEMA_VERSION};
use popcorn_common::db::settings::{get_setting, set_setting, MEMBER_JOB_LAST_RUN};
use tempfile::TempDir;

#[tokio::test]
async fn test_database_creation_when_missing() {
    let dir = TempDir::new().unwrap();
    let db_path = dir.path().join("nested").join("popcorn.db");

    let result = init_database(&db_path).await;

    assert!(result.is_ok(), "Database initialization failed: {:?}", result.err());
    assert!(db_path.exists(), "Database file was not created");
}

#[tokio::test]
async fn test_database_opens_existing() {
    let dir = TempDir::new().unwrap();
    let db_path = dir.path().join("popcorn.db");

    let pool1 = init_database(&db_path).await.unwrap();
    sqlx::query("INSERT INTO members (id, nickname) VALUES (1, 'alice')")
        .execute(&pool1)
        .await
        .unwrap();
    pool1.close().await;

    // Second open must not wipe data or fail on existing tables
    let pool2 = init_database(&db_path).await.unwrap();
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM members")
        .fetch_one(&pool2)
        .await
        .unwrap();
    assert_eq!(count, 1);

    let version: i64 = sqlx::query_scalar("SELECT MAX(version) FROM schema_version")
        .fetch_one(&pool2)
        .await
        .unwrap();
    assert_eq!(version, SCHEMA_VERSION);
}

#[tokio::test]
async fn test_daily_exp_logs_unique_per_member_and_date() {
    let dir = TempDir::new().unwrap();
    let pool = init_database(&dir.path().join("popcorn.db")).await.unwrap();

    sqlx::query("INSERT INTO members (id, nickname) VALUES (1, 'alice')")
        .execute(&pool)
        .await
        .unwrap();

    let insert = "INSERT INTO daily_exp_logs (member_id, log_date, daily_exp, processed) VALUES (1, '2024-05-01', 3.0, 1)";
    sqlx::query(insert).execute(&pool).await.unwrap();
    let duplicate = sqlx::query(insert).execute(&pool).await;

    assert!(duplicate.is_err(), "Second row for the same member/day must be rejected");
}

#[tokio::test]
async fn test_settings_roundtrip_and_empty_default() {
    let dir = TempDir::new().unwrap();
    let pool = init_database(&dir.path().join("popcorn.db")).await.unwrap();

    // Seeded empty: reads as None
    let initial: Option<String> = get_setting(&pool, MEMBER_JOB_LAST_RUN).await.unwrap();
    assert!(initial.is_none());

    set_setting(&pool, MEMBER_JOB_LAST_RUN, "2024-05-02 00:10:00")
        .await
        .unwrap();
    let stored: Option<String> = get_setting(&pool, MEMBER_JOB_LAST_RUN).await.unwrap();
    assert_eq!(stored.as_deref(), Some("2024-05-02 00:10:00"));

    // Unparseable value surfaces as a config error
    set_setting(&pool, "answer", "forty-two").await.unwrap();
    let parsed = get_setting::<i64>(&pool, "answer").await;
    assert!(parsed.is_err());
}
