//! Movie popularity score
//!
//! ```text
//! bayesian = count == 0 ? global : (count * avg + M * global) / (count + M)
//! like     = likes + hates == 0 ? 0.5 : likes / (likes + hates)
//! seen     = members == 0 ? 0.0 : min(1, seen / members)
//! score    = round1((bayesian / 5 * 0.5 + like * 0.3 + seen * 0.2) * 100)
//! ```
//!
//! `M` is the confidence constant: a movie needs about `M` reviews before its
//! own average outweighs the global one.

use std::sync::Arc;

use popcorn_common::Result;
use serde::Serialize;
use tracing::{debug, warn};

use crate::counts::{CountSource, LikeHateStats, ReviewStats};

/// Bayesian confidence constant
pub const CONFIDENCE_REVIEWS: f64 = 100.0;

/// Top of the rating scale
pub const MAX_RATING: f64 = 5.0;

pub const RATING_WEIGHT: f64 = 0.5;
pub const LIKE_WEIGHT: f64 = 0.3;
pub const SEEN_WEIGHT: f64 = 0.2;

/// Like ratio of a movie nobody reacted to
pub const NEUTRAL_LIKE_RATIO: f64 = 0.5;

/// Global values snapshotted once per scoring pass
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RunContext {
    pub total_members: i64,
    pub global_average: f64,
}

impl RunContext {
    /// Take the snapshot every movie of one pass is scored against
    pub async fn snapshot(counts: &dyn CountSource) -> Result<Self> {
        Ok(Self {
            total_members: counts.total_registered_members().await?,
            global_average: counts.global_average_rating().await?,
        })
    }
}

/// Everything the formula needs about one movie
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct MovieStats {
    pub reviews: ReviewStats,
    pub reactions: LikeHateStats,
    pub seen_count: i64,
}

/// Review average shrunk towards the global average
pub fn bayesian_average(review_count: i64, average_rating: f64, global_average: f64) -> f64 {
    if review_count <= 0 {
        return global_average;
    }
    let n = review_count as f64;
    (n * average_rating + CONFIDENCE_REVIEWS * global_average) / (n + CONFIDENCE_REVIEWS)
}

pub fn like_ratio(likes: i64, hates: i64) -> f64 {
    let total = likes + hates;
    if total <= 0 {
        return NEUTRAL_LIKE_RATIO;
    }
    likes as f64 / total as f64
}

/// Share of members who saw the movie, capped at 1
pub fn seen_ratio(seen_count: i64, total_members: i64) -> f64 {
    if total_members <= 0 {
        return 0.0;
    }
    (seen_count as f64 / total_members as f64).min(1.0)
}

fn round_one_decimal(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

/// Pure score of one movie, in `[0, 100]`, one decimal place
pub fn calculate(stats: &MovieStats, ctx: &RunContext) -> f64 {
    let bayesian = bayesian_average(
        stats.reviews.count,
        stats.reviews.average_rating,
        ctx.global_average,
    );
    let like = like_ratio(stats.reactions.likes, stats.reactions.hates);
    let seen = seen_ratio(stats.seen_count, ctx.total_members);

    let blended = bayesian / MAX_RATING * RATING_WEIGHT + like * LIKE_WEIGHT + seen * SEEN_WEIGHT;
    round_one_decimal(blended * 100.0).clamp(0.0, 100.0)
}

/// Gathers a movie's statistics and applies [`calculate`]
#[derive(Clone)]
pub struct MovieScoreCalculator {
    counts: Arc<dyn CountSource>,
}

impl MovieScoreCalculator {
    pub fn new(counts: Arc<dyn CountSource>) -> Self {
        Self { counts }
    }

    /// Collect statistics; a failed review lookup falls back to no reviews
    pub async fn gather(&self, movie_id: i64) -> Result<MovieStats> {
        let reviews = match self.counts.review_stats(movie_id).await {
            Ok(stats) => stats,
            Err(e) => {
                warn!(movie_id, "Review stats unavailable, assuming none: {}", e);
                ReviewStats::default()
            }
        };

        Ok(MovieStats {
            reviews,
            reactions: self.counts.like_hate_stats(movie_id).await?,
            seen_count: self.counts.watched_count(movie_id).await?,
        })
    }

    /// Score one movie; any statistics failure scores it 0.0
    pub async fn score(&self, movie_id: i64, ctx: &RunContext) -> ScoreOutcome {
        match self.gather(movie_id).await {
            Ok(stats) => {
                let score = calculate(&stats, ctx);
                debug!(movie_id, score, ?stats, "Scored movie");
                ScoreOutcome::Scored(score)
            }
            Err(e) => {
                warn!(movie_id, "Failed to gather movie statistics, scoring 0.0: {}", e);
                ScoreOutcome::Fallback
            }
        }
    }
}

/// Result of scoring one movie
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ScoreOutcome {
    Scored(f64),
    /// Statistics could not be gathered; the movie is scored 0.0
    Fallback,
}

impl ScoreOutcome {
    pub fn value(self) -> f64 {
        match self {
            ScoreOutcome::Scored(score) => score,
            ScoreOutcome::Fallback => 0.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx(total_members: i64, global_average: f64) -> RunContext {
        RunContext {
            total_members,
            global_average,
        }
    }

    fn stats(count: i64, avg: f64, likes: i64, hates: i64, seen: i64) -> MovieStats {
        MovieStats {
            reviews: ReviewStats {
                count,
                average_rating: avg,
            },
            reactions: LikeHateStats { likes, hates },
            seen_count: seen,
        }
    }

    #[test]
    fn test_bayesian_without_reviews_is_global() {
        assert_eq!(bayesian_average(0, 0.0, 3.2), 3.2);
    }

    #[test]
    fn test_bayesian_converges_to_raw_average() {
        let avg = bayesian_average(10_000, 4.5, 3.0);
        assert!((avg - 4.485).abs() < 0.001, "got {}", avg);
        assert!((avg - 4.47).abs() < 0.02);
    }

    #[test]
    fn test_bayesian_small_sample_stays_near_global() {
        let avg = bayesian_average(1, 5.0, 3.0);
        assert!(avg > 3.0 && avg < 3.05, "got {}", avg);
    }

    #[test]
    fn test_like_ratio_neutral_without_reactions() {
        assert_eq!(like_ratio(0, 0), 0.5);
        assert_eq!(like_ratio(3, 1), 0.75);
        assert_eq!(like_ratio(0, 4), 0.0);
    }

    #[test]
    fn test_seen_ratio_clamps_and_handles_no_members() {
        assert_eq!(seen_ratio(15, 10), 1.0);
        assert_eq!(seen_ratio(4, 10), 0.4);
        assert_eq!(seen_ratio(4, 0), 0.0);
    }

    #[test]
    fn test_end_to_end_example() {
        let score = calculate(&stats(0, 0.0, 3, 1, 4), &ctx(10, 3.0));
        assert_eq!(score, 60.5);
    }

    #[test]
    fn test_score_rounds_to_one_decimal() {
        // 0.3 + 1/3 * 0.3 + 1/3 * 0.2 = 0.4666...
        let score = calculate(&stats(0, 0.0, 1, 2, 1), &ctx(3, 3.0));
        assert_eq!(score, 46.7);
    }

    #[test]
    fn test_score_bounds() {
        assert_eq!(calculate(&stats(1_000_000, 5.0, 10, 0, 50), &ctx(10, 5.0)), 100.0);
        assert_eq!(calculate(&stats(1_000_000, 0.0, 0, 10, 0), &ctx(10, 0.0)), 0.0);

        for count in [0, 1, 10, 100, 10_000] {
            for avg in [0.0, 1.5, 3.0, 5.0] {
                for (likes, hates) in [(0, 0), (1, 0), (0, 1), (7, 3)] {
                    for (seen, members) in [(0, 0), (0, 10), (5, 10), (20, 10)] {
                        let score = calculate(
                            &stats(count, avg, likes, hates, seen),
                            &ctx(members, 3.0),
                        );
                        assert!((0.0..=100.0).contains(&score), "out of range: {}", score);
                    }
                }
            }
        }
    }

    #[test]
    fn test_fallback_outcome_is_zero() {
        assert_eq!(ScoreOutcome::Fallback.value(), 0.0);
        assert_eq!(ScoreOutcome::Scored(42.1).value(), 42.1);
    }
}
