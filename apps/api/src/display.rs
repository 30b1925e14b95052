//! Formatting shared by the dashboard, leaderboard and admin views.

use chrono::{DateTime, Utc};

const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

/// `2097152` → `"2.00 MB"`.
pub fn format_size_mb(bytes: i64) -> String {
    format!("{:.2} MB", bytes as f64 / BYTES_PER_MB)
}

pub fn format_date(at: DateTime<Utc>) -> String {
    at.format("%b %-d, %Y").to_string()
}

pub fn format_score(score: i32) -> String {
    format!("{score}/100")
}
