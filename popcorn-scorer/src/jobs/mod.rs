//! Batch jobs
//!
//! Both jobs walk their subjects sequentially. Each subject commits on its
//! own; a failing subject is logged and the batch moves on.

pub mod member_daily;
pub mod movie_popularity;

pub use member_daily::{DayOutcome, MemberScoreScheduler, BACKFILL_WINDOW_DAYS};
pub use movie_popularity::{MovieScore, MovieScoreScheduler};

use chrono::{DateTime, Utc};
use popcorn_common::time::now;
use serde::Serialize;

/// Name of the member daily experience job
pub const MEMBER_DAILY_JOB: &str = "member daily experience";

/// Name of the movie popularity recompute job
pub const MOVIE_POPULARITY_JOB: &str = "movie popularity recompute";

/// Summary of one batch run
///
/// Units are member-days for the member job and movies for the movie job.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchReport {
    pub job: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    /// Members or movies visited
    pub subjects: usize,
    /// Units computed and written
    pub processed: usize,
    /// Units left untouched (already processed)
    pub skipped: usize,
    /// Units that failed; see the log
    pub failed: usize,
}

impl BatchReport {
    pub fn start(job: &str) -> Self {
        Self {
            job: job.to_string(),
            started_at: now(),
            finished_at: None,
            subjects: 0,
            processed: 0,
            skipped: 0,
            failed: 0,
        }
    }

    pub fn finish(mut self) -> Self {
        self.finished_at = Some(now());
        self
    }
}
