//! Daily trigger loop for the batch jobs
//!
//! Each job gets its own task that sleeps until the next occurrence of its
//! trigger time (UTC), runs the job to completion and goes back to sleep.
//! Shutdown is only observed while sleeping, never in the middle of a run.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Days, NaiveTime, Utc};
use popcorn_common::time::{now, today};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::jobs::{
    MemberScoreScheduler, MovieScoreScheduler, MEMBER_DAILY_JOB, MOVIE_POPULARITY_JOB,
};

/// First instant strictly after `after` whose time of day is `at`
pub fn next_run_after(after: DateTime<Utc>, at: NaiveTime) -> DateTime<Utc> {
    let date = after.date_naive();
    let candidate = date.and_time(at).and_utc();
    if candidate > after {
        return candidate;
    }
    date.checked_add_days(Days::new(1))
        .map(|next| next.and_time(at).and_utc())
        .unwrap_or(candidate)
}

/// Time to wait from `from` until `until` (zero if already past)
pub fn delay_until(from: DateTime<Utc>, until: DateTime<Utc>) -> Duration {
    (until - from).to_std().unwrap_or(Duration::ZERO)
}

/// Spawn a task running `job` once per day at `at`
pub fn spawn_daily<F, Fut>(
    name: &'static str,
    at: NaiveTime,
    run_on_startup: bool,
    shutdown: CancellationToken,
    job: F,
) -> JoinHandle<()>
where
    F: Fn() -> Fut + Send + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    tokio::spawn(async move {
        if run_on_startup {
            info!("Running {} job at startup", name);
            job().await;
        }

        loop {
            let current = now();
            let next = next_run_after(current, at);
            info!("Next {} run at {}", name, next);

            tokio::select! {
                _ = shutdown.cancelled() => {
                    info!("{} scheduler stopped", name);
                    break;
                }
                _ = tokio::time::sleep(delay_until(current, next)) => {
                    job().await;
                }
            }
        }
    })
}

/// Spawn both periodic jobs
pub fn spawn_jobs(
    members: Arc<MemberScoreScheduler>,
    movies: Arc<MovieScoreScheduler>,
    member_at: NaiveTime,
    movie_at: NaiveTime,
    run_on_startup: bool,
    shutdown: CancellationToken,
) -> Vec<JoinHandle<()>> {
    let member_task = spawn_daily(
        MEMBER_DAILY_JOB,
        member_at,
        run_on_startup,
        shutdown.clone(),
        move || {
            let members = members.clone();
            async move {
                if let Err(e) = members.run_daily(today()).await {
                    error!("{} run failed: {}", MEMBER_DAILY_JOB, e);
                }
            }
        },
    );

    let movie_task = spawn_daily(
        MOVIE_POPULARITY_JOB,
        movie_at,
        run_on_startup,
        shutdown,
        move || {
            let movies = movies.clone();
            async move {
                if let Err(e) = movies.run().await {
                    error!("{} run failed: {}", MOVIE_POPULARITY_JOB, e);
                }
            }
        },
    );

    vec![member_task, movie_task]
}
