//! Member daily experience job
//!
//! Every run walks the last [`BACKFILL_WINDOW_DAYS`] days before today for
//! every member. Days already processed are skipped by the ledger gate, so a
//! day missed by an earlier run (outage, crash, failure) is picked up by any
//! later run inside the window, and nothing is ever credited twice.

use std::sync::Arc;

use chrono::NaiveDate;
use popcorn_common::db::settings::{set_setting, MEMBER_JOB_LAST_RUN};
use popcorn_common::db::Member;
use popcorn_common::time::{format_timestamp, trailing_window};
use popcorn_common::{Error, Result};
use sqlx::SqlitePool;
use tracing::{debug, error, info, warn};

use super::{BatchReport, MEMBER_DAILY_JOB};
use crate::accumulator::{self, load_member, member_ids};
use crate::counts::CountSource;
use crate::ledger::DailyExpLedger;

/// Days re-examined by each run, ending yesterday
pub const BACKFILL_WINDOW_DAYS: u32 = 7;

/// What happened to one member-day
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DayOutcome {
    /// Stored and folded into the member's total
    Credited(f64),
    /// Stored as processed with zero experience
    Recorded,
    /// Already processed earlier (or by a concurrent writer)
    AlreadyProcessed,
}

/// Drives the ledger and the accumulator over all members
pub struct MemberScoreScheduler {
    db: SqlitePool,
    ledger: DailyExpLedger,
}

impl MemberScoreScheduler {
    pub fn new(db: SqlitePool, counts: Arc<dyn CountSource>) -> Self {
        let ledger = DailyExpLedger::new(db.clone(), counts);
        Self { db, ledger }
    }

    pub fn ledger(&self) -> &DailyExpLedger {
        &self.ledger
    }

    /// Compute one member-day and credit it in a single transaction
    pub async fn process_member_day(&self, member_id: i64, date: NaiveDate) -> Result<DayOutcome> {
        let Some(log) = self.ledger.prepare(member_id, date).await? else {
            return Ok(DayOutcome::AlreadyProcessed);
        };

        let mut tx = self.db.begin().await?;
        let Some(stored) = DailyExpLedger::commit(&mut tx, &log).await? else {
            tx.rollback().await?;
            return Ok(DayOutcome::AlreadyProcessed);
        };

        let outcome = if stored.has_experience() {
            let member = accumulator::apply_daily(&mut tx, &stored).await?;
            debug!(
                member_id,
                %date,
                daily_exp = stored.daily_exp,
                total_experience = member.total_experience,
                "Credited daily experience"
            );
            DayOutcome::Credited(stored.daily_exp)
        } else {
            DayOutcome::Recorded
        };

        tx.commit().await?;
        Ok(outcome)
    }

    /// Scheduled run: backfill window for every member
    pub async fn run_daily(&self, today: NaiveDate) -> Result<BatchReport> {
        let window = trailing_window(today, BACKFILL_WINDOW_DAYS);
        let members = member_ids(&self.db).await?;
        let mut report = BatchReport::start(MEMBER_DAILY_JOB);

        info!(
            "Starting {} job: {} members, {} days ending {}",
            MEMBER_DAILY_JOB,
            members.len(),
            window.len(),
            window.last().map(|d| d.to_string()).unwrap_or_default()
        );

        for member_id in members {
            report.subjects += 1;
            for date in &window {
                self.tally(&mut report, member_id, *date).await;
            }
        }

        let report = report.finish();
        self.record_completion(&report).await;
        info!(
            "{} job finished: {} processed, {} skipped, {} failed",
            MEMBER_DAILY_JOB, report.processed, report.skipped, report.failed
        );
        Ok(report)
    }

    /// Reopen `date` for every member and take back what it credited
    ///
    /// One transaction: either every row is reopened and withdrawn or
    /// nothing changes.
    pub async fn reopen_date(&self, date: NaiveDate) -> Result<usize> {
        let mut tx = self.db.begin().await?;
        let previous = DailyExpLedger::reopen_date(&mut tx, date).await?;

        for log in previous.iter().filter(|log| log.has_experience()) {
            accumulator::withdraw_daily(&mut tx, log).await?;
        }

        tx.commit().await?;
        Ok(previous.len())
    }

    /// Recompute one historical date for every member, overriding the gate
    ///
    /// The day is reopened with its credit withdrawn, then processed again.
    /// A member whose day fails here is left with a reopened, uncredited
    /// row that the next run picks up.
    pub async fn force_recompute_for_date(
        &self,
        date: NaiveDate,
        today: NaiveDate,
    ) -> Result<BatchReport> {
        if date >= today {
            return Err(Error::InvalidInput(format!(
                "Cannot recompute {}: only days before {} are complete",
                date, today
            )));
        }

        let reopened = self.reopen_date(date).await?;
        let members = member_ids(&self.db).await?;
        let mut report = BatchReport::start(MEMBER_DAILY_JOB);

        info!(
            "Force recompute of {}: {} ledger rows reopened, {} members",
            date,
            reopened,
            members.len()
        );

        for member_id in members {
            report.subjects += 1;
            match self.process_member_day(member_id, date).await {
                Ok(DayOutcome::AlreadyProcessed) => report.skipped += 1,
                Ok(_) => report.processed += 1,
                Err(e) => {
                    report.failed += 1;
                    error!(member_id, %date, "Forced recompute failed: {}", e);
                    continue;
                }
            }

            if let Err(e) = accumulator::recalculate(&self.db, member_id, today).await {
                report.failed += 1;
                error!(member_id, "Recalculation after forced recompute failed: {}", e);
            }
        }

        let report = report.finish();
        info!(
            "Force recompute of {} finished: {} processed, {} skipped, {} failed",
            date, report.processed, report.skipped, report.failed
        );
        Ok(report)
    }

    /// Backfill one member and rebuild their total from the ledger
    pub async fn recompute_member(&self, member_id: i64, today: NaiveDate) -> Result<Member> {
        load_member(&self.db, member_id).await?;

        for date in trailing_window(today, BACKFILL_WINDOW_DAYS) {
            if let Err(e) = self.process_member_day(member_id, date).await {
                warn!(member_id, %date, "Skipping day during member recompute: {}", e);
            }
        }

        accumulator::recalculate(&self.db, member_id, today).await
    }

    async fn tally(&self, report: &mut BatchReport, member_id: i64, date: NaiveDate) {
        match self.process_member_day(member_id, date).await {
            Ok(DayOutcome::Credited(_)) | Ok(DayOutcome::Recorded) => report.processed += 1,
            Ok(DayOutcome::AlreadyProcessed) => report.skipped += 1,
            Err(e) => {
                report.failed += 1;
                error!(member_id, %date, "Failed to process member day: {}", e);
            }
        }
    }

    async fn record_completion(&self, report: &BatchReport) {
        if let Some(finished) = report.finished_at {
            let stamp = format_timestamp(finished.naive_utc());
            if let Err(e) = set_setting(&self.db, MEMBER_JOB_LAST_RUN, stamp).await {
                warn!("Failed to record {} completion: {}", MEMBER_DAILY_JOB, e);
            }
        }
    }
}
