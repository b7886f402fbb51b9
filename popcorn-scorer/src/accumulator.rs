//! Member score accumulator
//!
//! `members.total_experience` is the running sum of credited ledger days;
//! `members.popcorn_score` is that total clamped to `[0, 100]` and is
//! rewritten in the same statement every time the total changes.
//!
//! The ledger is authoritative. [`recalculate`] rebuilds the total from the
//! ledger and is the repair path for any drift in the incremental total.

use chrono::NaiveDate;
use popcorn_common::db::{DailyExpLog, Member};
use popcorn_common::time::horizon_start;
use popcorn_common::{Error, Result};
use serde::Serialize;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::info;

use crate::grade::Grade;

/// Upper bound of a member's popcorn score
pub const MAX_POPCORN_SCORE: f64 = 100.0;

/// Ledger days considered by [`recalculate`]
pub const RECALCULATE_HORIZON_DAYS: u32 = 365;

/// Popcorn score shown for a given total experience
pub fn popcorn_score_for(total_experience: f64) -> f64 {
    total_experience.clamp(0.0, MAX_POPCORN_SCORE)
}

/// Member reputation as exposed by the admin API
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MemberScore {
    pub member_id: i64,
    pub nickname: String,
    pub total_experience: f64,
    pub popcorn_score: f64,
    pub grade: Grade,
}

impl From<Member> for MemberScore {
    fn from(member: Member) -> Self {
        Self {
            member_id: member.id,
            nickname: member.nickname,
            total_experience: member.total_experience,
            popcorn_score: member.popcorn_score,
            grade: Grade::for_score(member.popcorn_score),
        }
    }
}

async fn fetch_member(conn: &mut SqliteConnection, member_id: i64) -> Result<Member> {
    sqlx::query_as::<_, Member>(
        "SELECT id, nickname, total_experience, popcorn_score FROM members WHERE id = ?",
    )
    .bind(member_id)
    .fetch_optional(&mut *conn)
    .await?
    .ok_or_else(|| Error::NotFound(format!("member {}", member_id)))
}

/// Load one member
pub async fn load_member(db: &SqlitePool, member_id: i64) -> Result<Member> {
    let mut conn = db.acquire().await?;
    fetch_member(&mut conn, member_id).await
}

/// All member ids in a stable order
pub async fn member_ids(db: &SqlitePool) -> Result<Vec<i64>> {
    let ids: Vec<i64> = sqlx::query_scalar("SELECT id FROM members ORDER BY id")
        .fetch_all(db)
        .await?;
    Ok(ids)
}

async fn add_experience(conn: &mut SqliteConnection, member_id: i64, amount: f64) -> Result<Member> {
    let result = sqlx::query(
        r#"
        UPDATE members
        SET total_experience = total_experience + ?,
            popcorn_score = MIN(MAX(total_experience + ?, 0.0), ?),
            updated_at = CURRENT_TIMESTAMP
        WHERE id = ?
        "#,
    )
    .bind(amount)
    .bind(amount)
    .bind(MAX_POPCORN_SCORE)
    .bind(member_id)
    .execute(&mut *conn)
    .await?;

    if result.rows_affected() == 0 {
        return Err(Error::NotFound(format!("member {}", member_id)));
    }

    fetch_member(conn, member_id).await
}

/// Fold one processed ledger day into the member's running total
///
/// Runs on the caller's connection so the ledger write and the credit commit
/// together.
pub async fn apply_daily(conn: &mut SqliteConnection, log: &DailyExpLog) -> Result<Member> {
    add_experience(conn, log.member_id, log.daily_exp).await
}

/// Take back the credit of a ledger day that is being reopened
pub async fn withdraw_daily(conn: &mut SqliteConnection, log: &DailyExpLog) -> Result<Member> {
    add_experience(conn, log.member_id, -log.daily_exp).await
}

/// Rebuild a member's total from ledger rows of the last
/// [`RECALCULATE_HORIZON_DAYS`] days before `today`
pub async fn recalculate(db: &SqlitePool, member_id: i64, today: NaiveDate) -> Result<Member> {
    let since = horizon_start(today, RECALCULATE_HORIZON_DAYS);
    let mut tx = db.begin().await?;

    let total: f64 = sqlx::query_scalar(
        r#"
        SELECT COALESCE(SUM(daily_exp), 0.0)
        FROM daily_exp_logs
        WHERE member_id = ? AND log_date >= ? AND log_date < ?
        "#,
    )
    .bind(member_id)
    .bind(since)
    .bind(today)
    .fetch_one(&mut *tx)
    .await?;

    let result = sqlx::query(
        r#"
        UPDATE members
        SET total_experience = ?, popcorn_score = ?, updated_at = CURRENT_TIMESTAMP
        WHERE id = ?
        "#,
    )
    .bind(total)
    .bind(popcorn_score_for(total))
    .bind(member_id)
    .execute(&mut *tx)
    .await?;

    if result.rows_affected() == 0 {
        return Err(Error::NotFound(format!("member {}", member_id)));
    }

    let member = fetch_member(&mut tx, member_id).await?;
    tx.commit().await?;

    info!(member_id, total_experience = total, "Recalculated member from ledger");
    Ok(member)
}

/// Zero every member's total and popcorn score
pub async fn reset_all(db: &SqlitePool) -> Result<u64> {
    let result = sqlx::query(
        "UPDATE members SET total_experience = 0, popcorn_score = 0, updated_at = CURRENT_TIMESTAMP",
    )
    .execute(db)
    .await?;

    info!("Reset scores of {} members", result.rows_affected());
    Ok(result.rows_affected())
}

/// Delete every ledger row
pub async fn clear_all_ledger(db: &SqlitePool) -> Result<u64> {
    let result = sqlx::query("DELETE FROM daily_exp_logs").execute(db).await?;

    info!("Cleared {} ledger rows", result.rows_affected());
    Ok(result.rows_affected())
}
