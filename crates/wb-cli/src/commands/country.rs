//! Country command for full/partial day details of one country.

use std::fmt;
use std::io::Write;

use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use serde::Serialize;

use wb_core::{CountryCode, DayClassification, DayRun, classify_days};
use wb_db::Database;

use super::util;

/// JSON payload for `wb country --json`.
#[derive(Debug, Serialize)]
struct CountryDetail {
    code: CountryCode,
    name: String,
    full_days: Vec<NaiveDate>,
    partial_days: Vec<NaiveDate>,
    full_day_periods: Vec<DayRun>,
    total_days: usize,
}

impl CountryDetail {
    fn new(code: CountryCode, classification: &DayClassification) -> Self {
        let name = code.display_name().to_string();
        Self {
            full_days: classification.full_days(&code),
            partial_days: classification.partial_days(&code),
            full_day_periods: classification.full_day_periods(&code),
            total_days: classification.total_days(&code),
            code,
            name,
        }
    }
}

pub fn run<W, Tz>(
    writer: &mut W,
    db: &Database,
    code: &str,
    json: bool,
    now: DateTime<Utc>,
    tz: &Tz,
) -> Result<()>
where
    W: Write,
    Tz: TimeZone,
    Tz::Offset: fmt::Display,
{
    let country: CountryCode = code
        .parse()
        .with_context(|| format!("invalid country code {code:?}"))?;

    let log = util::load_log(db)?;
    let classification = classify_days(log.intervals(), now, tz);
    let detail = CountryDetail::new(country, &classification);

    if json {
        serde_json::to_writer_pretty(&mut *writer, &detail)?;
        writeln!(writer)?;
        return Ok(());
    }

    writeln!(writer, "{}", detail.code.label())?;
    if detail.total_days == 0 {
        writeln!(writer, "No recorded time.")?;
        return Ok(());
    }

    writeln!(writer, "Full days: {}", detail.full_days.len())?;
    writeln!(writer, "Partial days: {}", detail.partial_days.len())?;

    if !detail.full_day_periods.is_empty() {
        let periods: Vec<String> = detail
            .full_day_periods
            .iter()
            .map(DayRun::to_string)
            .collect();
        writeln!(writer, "Full-day periods: {}", periods.join(", "))?;
    }
    if !detail.partial_days.is_empty() {
        let dates: Vec<String> = detail
            .partial_days
            .iter()
            .map(|day| day.format("%-d %b %Y").to_string())
            .collect();
        writeln!(writer, "Partial dates: {}", dates.join(", "))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    use insta::assert_snapshot;
    use wb_core::Observation;

    fn ts(s: &str) -> DateTime<Utc> {
        s.parse().unwrap()
    }

    fn seeded_db() -> Database {
        // US, a stretch in France, then US again: two separate US runs
        let mut db = Database::open_in_memory().unwrap();
        for (at, country) in [
            ("2024-01-01T08:00:00Z", "US"),
            ("2024-01-04T10:00:00Z", "FR"),
            ("2024-01-08T09:00:00Z", "US"),
        ] {
            let country = CountryCode::new(country).unwrap();
            db.record_observation(&Observation::new(ts(at), country))
                .unwrap();
        }
        db
    }

    #[test]
    fn country_detail_groups_contiguous_runs() {
        let db = seeded_db();
        let mut output = Vec::new();
        run(&mut output, &db, "US", false, ts("2024-01-10T12:00:00Z"), &Utc).unwrap();

        let output = String::from_utf8(output).unwrap();
        assert_snapshot!(output, @r"
        United States 🇺🇸
        Full days: 5
        Partial days: 2
        Full-day periods: 1 Jan 2024 – 3 Jan 2024, 9 Jan 2024 – 10 Jan 2024
        Partial dates: 4 Jan 2024, 8 Jan 2024
        ");
    }

    #[test]
    fn country_detail_json() {
        let db = seeded_db();
        let mut output = Vec::new();
        run(&mut output, &db, "fr", true, ts("2024-01-10T12:00:00Z"), &Utc).unwrap();

        let detail: serde_json::Value = serde_json::from_slice(&output).unwrap();
        assert_eq!(detail["code"], "FR");
        assert_eq!(detail["name"], "France");
        assert_eq!(detail["full_days"].as_array().unwrap().len(), 3);
        assert_eq!(detail["total_days"], 5);
    }

    #[test]
    fn country_with_no_recorded_time() {
        let db = seeded_db();
        let mut output = Vec::new();
        run(&mut output, &db, "JP", false, ts("2024-01-10T12:00:00Z"), &Utc).unwrap();

        let output = String::from_utf8(output).unwrap();
        assert_snapshot!(output, @r"
        Japan 🇯🇵
        No recorded time.
        ");
    }
}
