//! Visit summaries: displayable, most-recent-first descriptions of the
//! interval log.

use std::collections::BTreeSet;
use std::fmt;

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::interval::VisitInterval;
use crate::types::CountryCode;

/// A derived, displayable view of one visit interval.
///
/// `countries` is a set to allow future merging of simultaneous
/// multi-country spans; ingestion currently only produces singletons.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VisitSummary {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub countries: BTreeSet<CountryCode>,
    pub is_most_recent: bool,
    pub description: String,
}

impl VisitSummary {
    /// The summary's dwell time in milliseconds.
    #[must_use]
    pub fn dwell_ms(&self) -> i64 {
        (self.end - self.start).num_milliseconds()
    }
}

/// Generates summaries from an interval snapshot, most recent first.
///
/// Each interval's end date is the next interval's start, so summaries
/// tile the timeline without gaps; the last interval ends at `now` when
/// open. Dates in descriptions are rendered in `tz`.
pub fn generate<Tz>(intervals: &[VisitInterval], now: DateTime<Utc>, tz: &Tz) -> Vec<VisitSummary>
where
    Tz: TimeZone,
    Tz::Offset: fmt::Display,
{
    let count = intervals.len();
    let mut summaries: Vec<VisitSummary> = intervals
        .iter()
        .enumerate()
        .map(|(k, interval)| {
            let start = interval.span.start();
            let end = intervals
                .get(k + 1)
                .map_or_else(|| interval.span.effective_end(now), |next| next.span.start());
            let is_most_recent = k == count - 1;
            let countries: BTreeSet<CountryCode> = std::iter::once(interval.country.clone()).collect();
            let description = describe(start, end, &countries, is_most_recent, tz);
            VisitSummary {
                start,
                end,
                countries,
                is_most_recent,
                description,
            }
        })
        .collect();
    summaries.reverse();
    summaries
}

/// Comma-joined country labels, sorted by localized name.
fn country_list(countries: &BTreeSet<CountryCode>) -> String {
    let mut labels: Vec<_> = countries.iter().collect();
    labels.sort_by_key(|code| (code.display_name(), code.as_str()));
    labels
        .into_iter()
        .map(CountryCode::label)
        .collect::<Vec<_>>()
        .join(", ")
}

fn plural(count: i64) -> &'static str {
    if count > 1 { "s" } else { "" }
}

/// Formats the human-readable description for one summary.
///
/// Duration buckets, in priority order: years (days/365), months
/// (days/30), weeks (days/7), a single day, less than a day, then a
/// plain day count.
fn describe<Tz>(
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    countries: &BTreeSet<CountryCode>,
    is_most_recent: bool,
    tz: &Tz,
) -> String
where
    Tz: TimeZone,
    Tz::Offset: fmt::Display,
{
    let days = (end - start).num_days();
    let list = country_list(countries);
    let start_text = start.with_timezone(tz).format("%-d %b %Y");

    if is_most_recent {
        if days >= 365 {
            let years = days / 365;
            format!("You've been in {list} for the past {years} year{}", plural(years))
        } else if days >= 60 {
            let months = days / 30;
            format!("You've been in {list} for the past {months} month{}", plural(months))
        } else if days >= 14 {
            let weeks = days / 7;
            format!("You've been in {list} for the past {weeks} week{}", plural(weeks))
        } else if days == 1 {
            format!("You've been in {list} since yesterday")
        } else if days == 0 {
            format!("You've been in {list} for less than a day")
        } else {
            format!("You've been in {list} for the past {days} days")
        }
    } else if days >= 365 {
        let years = days / 365;
        format!("Over {years} year{} starting from {start_text} in {list}", plural(years))
    } else if days >= 60 {
        let months = days / 30;
        format!("{months} month{} starting from {start_text} in {list}", plural(months))
    } else if days >= 14 {
        let weeks = days / 7;
        format!("{weeks} week{} starting from {start_text} in {list}", plural(weeks))
    } else if days == 1 {
        format!("1 day in {list}")
    } else if days == 0 {
        format!("Less than a day in {list}")
    } else {
        format!("{days} days starting from {start_text} in {list}")
    }
}
