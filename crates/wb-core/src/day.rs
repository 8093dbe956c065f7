//! Calendar-day classification.
//!
//! Maps each local calendar day touched by the interval log to the set
//! of countries present that day. A day touched by exactly one country
//! is a "full" day for it; a day shared across countries is "partial"
//! for each of them.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use serde::Serialize;

use crate::interval::VisitInterval;
use crate::types::CountryCode;

/// Per-day country presence derived from an interval snapshot.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DayClassification {
    days: BTreeMap<NaiveDate, BTreeSet<CountryCode>>,
}

/// A maximal run of consecutive full calendar days.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DayRun {
    pub first: NaiveDate,
    pub last: NaiveDate,
}

impl fmt::Display for DayRun {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.first == self.last {
            write!(f, "{}", self.first.format("%-d %b %Y"))
        } else {
            write!(
                f,
                "{} – {}",
                self.first.format("%-d %b %Y"),
                self.last.format("%-d %b %Y")
            )
        }
    }
}

/// Classifies each calendar day touched by the snapshot.
///
/// Every interval contributes its country to the inclusive day span
/// from its start day through its effective end day, computed in `tz`.
pub fn classify_days<Tz: TimeZone>(
    intervals: &[VisitInterval],
    now: DateTime<Utc>,
    tz: &Tz,
) -> DayClassification {
    let mut days: BTreeMap<NaiveDate, BTreeSet<CountryCode>> = BTreeMap::new();
    for interval in intervals {
        let start_day = interval.span.start().with_timezone(tz).date_naive();
        let end_day = interval
            .span
            .effective_end(now)
            .with_timezone(tz)
            .date_naive();

        let mut day = start_day;
        while day <= end_day {
            days.entry(day).or_default().insert(interval.country.clone());
            let Some(next) = day.succ_opt() else { break };
            day = next;
        }
    }
    DayClassification { days }
}

impl DayClassification {
    /// The full day-to-countries mapping.
    #[must_use]
    pub const fn days(&self) -> &BTreeMap<NaiveDate, BTreeSet<CountryCode>> {
        &self.days
    }

    /// Days spent entirely in `code`, ascending.
    #[must_use]
    pub fn full_days(&self, code: &CountryCode) -> Vec<NaiveDate> {
        self.days
            .iter()
            .filter(|(_, countries)| countries.len() == 1 && countries.contains(code))
            .map(|(day, _)| *day)
            .collect()
    }

    /// Days split between `code` and at least one other country, ascending.
    #[must_use]
    pub fn partial_days(&self, code: &CountryCode) -> Vec<NaiveDate> {
        self.days
            .iter()
            .filter(|(_, countries)| countries.len() > 1 && countries.contains(code))
            .map(|(day, _)| *day)
            .collect()
    }

    /// Count of distinct calendar days touched by `code`, full or partial.
    #[must_use]
    pub fn total_days(&self, code: &CountryCode) -> usize {
        self.days
            .values()
            .filter(|countries| countries.contains(code))
            .count()
    }

    /// Groups `full_days(code)` into maximal runs of consecutive days.
    ///
    /// A plain min/max span would misleadingly bridge gaps spent in
    /// other countries, so runs are computed explicitly.
    #[must_use]
    pub fn full_day_periods(&self, code: &CountryCode) -> Vec<DayRun> {
        let mut runs: Vec<DayRun> = Vec::new();
        for day in self.full_days(code) {
            match runs.last_mut() {
                Some(run) if run.last.succ_opt() == Some(day) => run.last = day,
                _ => runs.push(DayRun { first: day, last: day }),
            }
        }
        runs
    }

    /// All countries present on any classified day.
    #[must_use]
    pub fn countries(&self) -> BTreeSet<CountryCode> {
        self.days.values().flatten().cloned().collect()
    }
}
