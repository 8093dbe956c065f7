//! Per-country aggregation of visit summaries.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::day::DayClassification;
use crate::summary::VisitSummary;
use crate::types::CountryCode;

/// Aggregate view of one country across all visits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CountryProfile {
    pub code: CountryCode,
    /// Total dwell time across this country's summaries, in milliseconds.
    pub total_dwell_ms: i64,
    /// Distinct calendar days touched (full or partial).
    ///
    /// Taken from the day classifier, not dwell time divided by 24h;
    /// the two disagree when a day is split across countries.
    pub total_days: usize,
    /// This country's summaries, most recent first.
    pub visits: Vec<VisitSummary>,
}

/// Sort key for country profiles.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortKey {
    /// Localized country name.
    Name,
    /// Total dwell time.
    Time,
}

/// Sort direction for country profiles.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    Ascending,
    Descending,
}

/// Builds one profile per distinct country, sorted by name ascending.
///
/// `summaries` is expected in generation order (most recent first);
/// each profile's `visits` preserves that order.
#[must_use]
pub fn build_profiles(
    summaries: &[VisitSummary],
    classification: &DayClassification,
) -> Vec<CountryProfile> {
    let mut dwell: BTreeMap<CountryCode, i64> = BTreeMap::new();
    let mut visits: BTreeMap<CountryCode, Vec<VisitSummary>> = BTreeMap::new();
    for summary in summaries {
        for code in &summary.countries {
            *dwell.entry(code.clone()).or_default() += summary.dwell_ms();
            visits.entry(code.clone()).or_default().push(summary.clone());
        }
    }

    let mut profiles: Vec<CountryProfile> = dwell
        .into_iter()
        .map(|(code, total_dwell_ms)| {
            let total_days = classification.total_days(&code);
            let visits = visits.remove(&code).unwrap_or_default();
            CountryProfile {
                code,
                total_dwell_ms,
                total_days,
                visits,
            }
        })
        .collect();
    sort_profiles(&mut profiles, SortKey::Name, SortOrder::Ascending);
    profiles
}

/// Sorts profiles by the given key and direction.
///
/// Ties always fall back to the country code, ascending, so results
/// are deterministic across runs.
pub fn sort_profiles(profiles: &mut [CountryProfile], key: SortKey, order: SortOrder) {
    profiles.sort_by(|a, b| {
        let primary = match key {
            SortKey::Name => a.code.display_name().cmp(b.code.display_name()),
            SortKey::Time => a.total_dwell_ms.cmp(&b.total_dwell_ms),
        };
        let primary = match order {
            SortOrder::Ascending => primary,
            SortOrder::Descending => primary.reverse(),
        };
        primary.then_with(|| a.code.cmp(&b.code))
    });
}
