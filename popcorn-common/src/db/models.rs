//! Database models

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Experience weight of one net follow received
pub const FOLLOW_WEIGHT: f64 = 3.0;

/// Experience weight of one net review like received
pub const LIKE_WEIGHT: f64 = 2.0;

/// Experience weight of one net review hate received (subtracted)
pub const HATE_WEIGHT: f64 = 1.0;

/// Member reputation columns
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Member {
    pub id: i64,
    pub nickname: String,
    pub total_experience: f64,
    pub popcorn_score: f64,
}

/// Movie popularity columns
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Movie {
    pub id: i64,
    pub title: String,
    pub popcorn_score: f64,
}

/// One member's experience for one calendar day
///
/// `daily_exp` is always [`DailyExpLog::experience_for`] of the three deltas.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct DailyExpLog {
    pub member_id: i64,
    pub log_date: NaiveDate,
    pub follow_delta: i64,
    pub like_delta: i64,
    pub hate_delta: i64,
    pub daily_exp: f64,
    pub processed: bool,
}

impl DailyExpLog {
    /// Build an unprocessed row from net deltas
    pub fn from_deltas(
        member_id: i64,
        log_date: NaiveDate,
        follow_delta: i64,
        like_delta: i64,
        hate_delta: i64,
    ) -> Self {
        Self {
            member_id,
            log_date,
            follow_delta,
            like_delta,
            hate_delta,
            daily_exp: Self::experience_for(follow_delta, like_delta, hate_delta),
            processed: false,
        }
    }

    /// Experience earned from net follow/like/hate changes
    pub fn experience_for(follow_delta: i64, like_delta: i64, hate_delta: i64) -> f64 {
        FOLLOW_WEIGHT * follow_delta as f64 + LIKE_WEIGHT * like_delta as f64
            - HATE_WEIGHT * hate_delta as f64
    }

    /// Whether this day moves the running total at all
    pub fn has_experience(&self) -> bool {
        self.daily_exp != 0.0
    }
}
