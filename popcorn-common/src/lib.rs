//! # Popcorn Common Library
//!
//! Shared code for the popcorn scoring services:
//! - Database schema, initialization and row models
//! - Configuration loading (CLI / ENV / TOML / compiled defaults)
//! - Calendar-day helpers used by the daily ledger
//! - Common error type

pub mod config;
pub mod db;
pub mod error;
pub mod time;

pub use error::{Error, Result};
