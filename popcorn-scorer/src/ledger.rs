//! Daily experience ledger
//!
//! One `daily_exp_logs` row per (member, calendar day). A day's experience is
//! the net change of three cumulative counts between the start of the day and
//! the start of the next day, so a follow that is undone the same day earns
//! nothing.
//!
//! Rows move one way, unprocessed → processed. The transition is a single
//! conditional upsert (`... DO UPDATE ... WHERE processed = 0`); when two
//! writers race for the same day exactly one of them sees a changed row and
//! only that one may credit the member.

use std::sync::Arc;

use chrono::NaiveDate;
use popcorn_common::db::DailyExpLog;
use popcorn_common::time::{day_start, next_day_start};
use popcorn_common::Result;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;

use crate::counts::CountSource;

/// Per-day experience computation and storage
#[derive(Clone)]
pub struct DailyExpLedger {
    db: SqlitePool,
    counts: Arc<dyn CountSource>,
}

impl DailyExpLedger {
    pub fn new(db: SqlitePool, counts: Arc<dyn CountSource>) -> Self {
        Self { db, counts }
    }

    /// Stored row for (member, day), if any
    pub async fn find_row(&self, member_id: i64, date: NaiveDate) -> Result<Option<DailyExpLog>> {
        let row = sqlx::query_as::<_, DailyExpLog>(
            r#"
            SELECT member_id, log_date, follow_delta, like_delta, hate_delta, daily_exp, processed
            FROM daily_exp_logs
            WHERE member_id = ? AND log_date = ?
            "#,
        )
        .bind(member_id)
        .bind(date)
        .fetch_optional(&self.db)
        .await?;

        Ok(row)
    }

    /// Ledger rows of one member in `[since, until)`, newest first
    pub async fn history(
        &self,
        member_id: i64,
        since: NaiveDate,
        until: NaiveDate,
    ) -> Result<Vec<DailyExpLog>> {
        let rows = sqlx::query_as::<_, DailyExpLog>(
            r#"
            SELECT member_id, log_date, follow_delta, like_delta, hate_delta, daily_exp, processed
            FROM daily_exp_logs
            WHERE member_id = ? AND log_date >= ? AND log_date < ?
            ORDER BY log_date DESC
            "#,
        )
        .bind(member_id)
        .bind(since)
        .bind(until)
        .fetch_all(&self.db)
        .await?;

        Ok(rows)
    }

    /// Net deltas for `date`, measured from the count source
    ///
    /// The returned row is not yet processed and not yet stored.
    pub async fn measure(&self, member_id: i64, date: NaiveDate) -> Result<DailyExpLog> {
        let start = day_start(date);
        let end = next_day_start(date);

        let follow_delta = self.counts.count_follows_received(member_id, end).await?
            - self.counts.count_follows_received(member_id, start).await?;
        let like_delta = self.counts.count_review_likes_received(member_id, end).await?
            - self.counts.count_review_likes_received(member_id, start).await?;
        let hate_delta = self.counts.count_review_hates_received(member_id, end).await?
            - self.counts.count_review_hates_received(member_id, start).await?;

        Ok(DailyExpLog::from_deltas(
            member_id,
            date,
            follow_delta,
            like_delta,
            hate_delta,
        ))
    }

    /// Measure a day unless it is already processed
    ///
    /// Reads only through the pool, so it must run before the caller opens
    /// the transaction that will [`commit`](Self::commit) the row.
    pub async fn prepare(&self, member_id: i64, date: NaiveDate) -> Result<Option<DailyExpLog>> {
        if let Some(existing) = self.find_row(member_id, date).await? {
            if existing.processed {
                debug!(member_id, %date, "ledger row already processed");
                return Ok(None);
            }
        }

        self.measure(member_id, date).await.map(Some)
    }

    /// Store `log` as processed if its row is not processed yet
    ///
    /// Returns the stored row when this call performed the transition, `None`
    /// when another writer got there first.
    pub async fn commit(
        conn: &mut SqliteConnection,
        log: &DailyExpLog,
    ) -> Result<Option<DailyExpLog>> {
        let result = sqlx::query(
            r#"
            INSERT INTO daily_exp_logs
                (member_id, log_date, follow_delta, like_delta, hate_delta, daily_exp, processed, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, 1, CURRENT_TIMESTAMP)
            ON CONFLICT(member_id, log_date) DO UPDATE SET
                follow_delta = excluded.follow_delta,
                like_delta = excluded.like_delta,
                hate_delta = excluded.hate_delta,
                daily_exp = excluded.daily_exp,
                processed = 1,
                updated_at = CURRENT_TIMESTAMP
            WHERE daily_exp_logs.processed = 0
            "#,
        )
        .bind(log.member_id)
        .bind(log.log_date)
        .bind(log.follow_delta)
        .bind(log.like_delta)
        .bind(log.hate_delta)
        .bind(log.daily_exp)
        .execute(&mut *conn)
        .await?;

        if result.rows_affected() == 0 {
            debug!(member_id = log.member_id, date = %log.log_date, "lost race for ledger row");
            return Ok(None);
        }

        Ok(Some(DailyExpLog {
            processed: true,
            ..log.clone()
        }))
    }

    /// Compute, store and freeze one member's day
    ///
    /// Returns the row only when this call processed it and it carries
    /// non-zero experience. A zero day is still stored as processed so it is
    /// never retried.
    pub async fn compute_for_date(
        &self,
        member_id: i64,
        date: NaiveDate,
    ) -> Result<Option<DailyExpLog>> {
        let Some(log) = self.prepare(member_id, date).await? else {
            return Ok(None);
        };

        let mut tx = self.db.begin().await?;
        let stored = Self::commit(&mut tx, &log).await?;
        tx.commit().await?;

        Ok(stored.filter(DailyExpLog::has_experience))
    }

    /// Reopen every processed row of `date`
    ///
    /// Reopened rows are zeroed and the previous rows are returned, so the
    /// caller can withdraw what they credited on the same connection. A
    /// reopened day therefore never carries credit into the next run.
    pub async fn reopen_date(
        conn: &mut SqliteConnection,
        date: NaiveDate,
    ) -> Result<Vec<DailyExpLog>> {
        let previous = sqlx::query_as::<_, DailyExpLog>(
            r#"
            SELECT member_id, log_date, follow_delta, like_delta, hate_delta, daily_exp, processed
            FROM daily_exp_logs
            WHERE log_date = ? AND processed = 1
            ORDER BY member_id
            "#,
        )
        .bind(date)
        .fetch_all(&mut *conn)
        .await?;

        sqlx::query(
            r#"
            UPDATE daily_exp_logs
            SET follow_delta = 0, like_delta = 0, hate_delta = 0, daily_exp = 0,
                processed = 0, updated_at = CURRENT_TIMESTAMP
            WHERE log_date = ? AND processed = 1
            "#,
        )
        .bind(date)
        .execute(&mut *conn)
        .await?;

        Ok(previous)
    }
}
