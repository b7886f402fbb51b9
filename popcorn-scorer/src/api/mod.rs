//! HTTP API handlers for popcorn-scorer

pub mod admin;
pub mod health;
pub mod members;

pub use admin::{
    clear_all_ledger_rows, force_recompute_for_date, force_recompute_member, recompute_movie,
    reset_all_member_scores, run_member_job, run_movie_job,
};
pub use health::health_routes;
pub use members::{get_member_exp_logs, get_member_score};
