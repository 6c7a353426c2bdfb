//! # Go Stats
//!
//! Player statistics backend for the Online Go Server public API.
//!
//! ## Architecture
//!
//! - **models**: Core data structures (players, game records, reports)
//! - **fetch**: Upstream API client and paginated history collection
//! - **resolve**: Username/id resolution with fuzzy fallback
//! - **calculate**: The statistics aggregator
//! - **api**: REST API endpoints
//! - **config**: Configuration loading and validation

pub mod api;
pub mod calculate;
pub mod config;
pub mod fetch;
pub mod models;
pub mod resolve;

pub use models::*;

use std::time::Duration;

/// Parse a human-friendly duration string (e.g., "1h", "30m", "25s", "500ms").
pub fn parse_duration(s: &str) -> Option<Duration> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }

    let (num_str, millis_per_unit) = if let Some(n) = s.strip_suffix("ms") {
        (n, 1)
    } else if let Some(n) = s.strip_suffix('h') {
        (n, 3_600_000)
    } else if let Some(n) = s.strip_suffix('m') {
        (n, 60_000)
    } else if let Some(n) = s.strip_suffix('s') {
        (n, 1000)
    } else {
        // Default to seconds
        (s, 1000)
    };

    let num: u64 = num_str.trim().parse().ok()?;
    num.checked_mul(millis_per_unit).map(Duration::from_millis)
}
