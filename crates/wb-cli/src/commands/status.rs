//! Status command for showing the current country and most recent visit.

use std::fmt;
use std::io::Write;

use anyhow::Result;
use chrono::{DateTime, TimeZone, Utc};

use wb_core::generate_summaries;
use wb_db::Database;

use super::util;

pub fn run<W, Tz>(
    writer: &mut W,
    db: &Database,
    now: DateTime<Utc>,
    tz: &Tz,
    timezone_name: &str,
) -> Result<()>
where
    W: Write,
    Tz: TimeZone,
    Tz::Offset: fmt::Display,
{
    let log = util::load_log(db)?;

    writeln!(writer, "Whereabouts status")?;
    writeln!(writer, "Visits recorded: {}", log.len())?;

    if log.is_empty() {
        writeln!(writer, "No observations yet.")?;
        return Ok(());
    }

    if let Some(last) = log.last()
        && last.span.is_open()
    {
        writeln!(
            writer,
            "Currently in {} since {}",
            last.country.label(),
            last.span.start().with_timezone(tz).format("%-d %b %Y %H:%M")
        )?;
    }

    let summaries = generate_summaries(log.intervals(), now, tz);
    if let Some(most_recent) = summaries.first() {
        writeln!(writer, "{}", most_recent.description)?;
    }
    writeln!(writer, "Calendar days computed in {timezone_name}")?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    use insta::assert_snapshot;
    use wb_core::{CountryCode, Observation};

    fn ts(s: &str) -> DateTime<Utc> {
        s.parse().unwrap()
    }

    fn observe(db: &mut Database, at: &str, country: &str) {
        let country = CountryCode::new(country).unwrap();
        db.record_observation(&Observation::new(ts(at), country))
            .unwrap();
    }

    #[test]
    fn status_shows_current_country_and_summary() {
        let mut db = Database::open_in_memory().unwrap();
        observe(&mut db, "2024-01-01T08:00:00Z", "US");
        observe(&mut db, "2024-03-10T12:30:00Z", "RO");

        let mut output = Vec::new();
        run(&mut output, &db, ts("2024-05-12T00:00:00Z"), &Utc, "UTC").unwrap();

        let output = String::from_utf8(output).unwrap();
        assert_snapshot!(output, @r"
        Whereabouts status
        Visits recorded: 2
        Currently in Romania 🇷🇴 since 10 Mar 2024 12:30
        You've been in Romania 🇷🇴 for the past 2 months
        Calendar days computed in UTC
        ");
    }

    #[test]
    fn status_with_empty_log() {
        let db = Database::open_in_memory().unwrap();
        let mut output = Vec::new();
        run(&mut output, &db, ts("2024-05-12T00:00:00Z"), &Utc, "UTC").unwrap();

        let output = String::from_utf8(output).unwrap();
        assert_snapshot!(output, @r"
        Whereabouts status
        Visits recorded: 0
        No observations yet.
        ");
    }
}
