//! History command for listing visit summaries, most recent first.

use std::fmt;
use std::io::Write;

use anyhow::Result;
use chrono::{DateTime, TimeZone, Utc};

use wb_core::generate_summaries;
use wb_db::Database;

use super::util;

pub fn run<W, Tz>(writer: &mut W, db: &Database, json: bool, now: DateTime<Utc>, tz: &Tz) -> Result<()>
where
    W: Write,
    Tz: TimeZone,
    Tz::Offset: fmt::Display,
{
    let log = util::load_log(db)?;
    let summaries = generate_summaries(log.intervals(), now, tz);

    if json {
        serde_json::to_writer_pretty(&mut *writer, &summaries)?;
        writeln!(writer)?;
        return Ok(());
    }

    if summaries.is_empty() {
        writeln!(writer, "No visits recorded.")?;
        return Ok(());
    }

    for summary in &summaries {
        writeln!(writer, "- {}", summary.description)?;
        writeln!(
            writer,
            "  {} – {}",
            summary.start.with_timezone(tz).format("%-d %b %Y %H:%M"),
            summary.end.with_timezone(tz).format("%-d %b %Y %H:%M")
        )?;
    }
    Ok(())
}
