//! Shared helpers for CLI subcommands.

use anyhow::Result;

use wb_core::VisitLog;
use wb_db::Database;

/// Loads the interval log from the database, repairing any corrupt
/// records.
pub fn load_log(db: &Database) -> Result<VisitLog> {
    let visits = db.fetch_all_ordered_by_start()?;
    let intervals = visits.into_iter().map(|visit| visit.interval).collect();
    let (log, violations) = VisitLog::from_intervals(intervals);
    if !violations.is_empty() {
        tracing::warn!(count = violations.len(), "repaired corrupt visit records");
    }
    Ok(log)
}

/// Formats milliseconds of dwell time.
/// Returns "Xd Yh" if >= 1 day, "Xh Ym" if >= 1 hour, else "Xm".
/// Negative durations are treated as 0m.
#[must_use]
pub fn format_dwell(ms: i64) -> String {
    if ms < 0 {
        return "0m".to_string();
    }
    let total_minutes = ms / 60_000;
    let total_hours = total_minutes / 60;
    let days = total_hours / 24;

    if days >= 1 {
        format!("{days}d {}h", total_hours % 24)
    } else if total_hours >= 1 {
        format!("{total_hours}h {}m", total_minutes % 60)
    } else {
        format!("{total_minutes}m")
    }
}
