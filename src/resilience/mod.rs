//! Resilience helpers.
//!
//! # Design Decisions
//! - Retry delays grow exponentially with a small random jitter
//! - Callers own their retry loops; this module only computes delays

pub mod backoff;

pub use backoff::calculate_backoff;
