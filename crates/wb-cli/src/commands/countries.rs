//! Countries command for listing per-country totals.

use std::fmt;
use std::io::Write;

use anyhow::Result;
use chrono::{DateTime, TimeZone, Utc};

use wb_core::{SortKey, SortOrder, build_profiles, classify_days, generate_summaries, sort_profiles};
use wb_db::Database;

use super::util;

pub fn run<W, Tz>(
    writer: &mut W,
    db: &Database,
    sort: SortKey,
    order: SortOrder,
    json: bool,
    now: DateTime<Utc>,
    tz: &Tz,
) -> Result<()>
where
    W: Write,
    Tz: TimeZone,
    Tz::Offset: fmt::Display,
{
    let log = util::load_log(db)?;
    let summaries = generate_summaries(log.intervals(), now, tz);
    let classification = classify_days(log.intervals(), now, tz);
    let mut profiles = build_profiles(&summaries, &classification);
    sort_profiles(&mut profiles, sort, order);

    if json {
        serde_json::to_writer_pretty(&mut *writer, &profiles)?;
        writeln!(writer)?;
        return Ok(());
    }

    if profiles.is_empty() {
        writeln!(writer, "No visits recorded.")?;
        return Ok(());
    }

    for profile in &profiles {
        writeln!(
            writer,
            "{} {} — {} days, {}",
            profile.code.flag_emoji(),
            profile.code.display_name(),
            profile.total_days,
            util::format_dwell(profile.total_dwell_ms)
        )?;
    }
    Ok(())
}
