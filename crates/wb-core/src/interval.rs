//! Visit intervals and observation ingestion.
//!
//! The interval log is an ordered, append-mostly record of continuous
//! presence in one country. Ingestion turns a stream of (timestamp,
//! country) observations into intervals under three invariants:
//!
//! - intervals are ordered by start, ascending, and never reordered
//! - at most one interval is open, and it is always the last one
//! - no two adjacent intervals share a country code
//!
//! Deciding what an observation does to the log is separated from
//! applying it ([`plan_ingest`] vs [`VisitLog::ingest`]) so the durable
//! store can apply the same plan inside a transaction.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::types::{Coordinate, CountryCode};

/// Errors raised while ingesting an observation.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum IngestError {
    /// The observation's timestamp precedes the last interval's start.
    ///
    /// History is never rewritten; the caller decides whether to drop
    /// the observation or buffer and reorder upstream.
    #[error("observation at {observed} precedes last interval start {last_start}")]
    OutOfOrderObservation {
        observed: DateTime<Utc>,
        last_start: DateTime<Utc>,
    },

    /// The observation carried no resolvable country code.
    #[error("observation has no resolvable country code")]
    MissingCountryCode,
}

/// The time span covered by a visit interval.
///
/// An open span represents ongoing presence and is resolved to an
/// effective end ("now") only at read time, never persisted as "now".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum VisitSpan {
    /// Presence that is still ongoing.
    Open { start: DateTime<Utc> },
    /// Presence that ended when the country changed.
    Closed {
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    },
}

impl VisitSpan {
    /// Returns the span's start.
    #[must_use]
    pub const fn start(&self) -> DateTime<Utc> {
        match self {
            Self::Open { start } | Self::Closed { start, .. } => *start,
        }
    }

    /// Returns the recorded end, if the span is closed.
    #[must_use]
    pub const fn end(&self) -> Option<DateTime<Utc>> {
        match self {
            Self::Open { .. } => None,
            Self::Closed { end, .. } => Some(*end),
        }
    }

    /// Returns whether the span is still open.
    #[must_use]
    pub const fn is_open(&self) -> bool {
        matches!(self, Self::Open { .. })
    }

    /// Resolves the span's end, substituting `now` for an open span.
    #[must_use]
    pub const fn effective_end(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        match self {
            Self::Open { .. } => now,
            Self::Closed { end, .. } => *end,
        }
    }
}

/// A stored record of continuous presence in one country.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VisitInterval {
    pub id: Uuid,
    pub country: CountryCode,
    #[serde(flatten)]
    pub span: VisitSpan,
}

impl VisitInterval {
    /// Creates a new open interval starting at `start`.
    #[must_use]
    pub fn new_open(country: CountryCode, start: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            country,
            span: VisitSpan::Open { start },
        }
    }
}

/// An externally supplied observation driving ingestion.
///
/// The observation source gives no ordering or deduplication guarantee;
/// the country is optional because upstream resolution can fail.
#[derive(Debug, Clone, PartialEq)]
pub struct Observation {
    pub timestamp: DateTime<Utc>,
    pub country: Option<CountryCode>,
    pub coordinate: Option<Coordinate>,
}

impl Observation {
    /// Creates an observation with a resolved country and no coordinate.
    #[must_use]
    pub const fn new(timestamp: DateTime<Utc>, country: CountryCode) -> Self {
        Self {
            timestamp,
            country: Some(country),
            coordinate: None,
        }
    }
}

/// The single store mutation an observation calls for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IngestAction {
    /// Append a new open interval.
    Open {
        country: CountryCode,
        start: DateTime<Utc>,
    },
    /// Close the trailing open interval at `end`, then append a new
    /// open interval for the observed country.
    CloseAndOpen {
        end: DateTime<Utc>,
        country: CountryCode,
        start: DateTime<Utc>,
    },
    /// Repeated observation of the current country; nothing to do.
    Unchanged,
}

/// Decides what mutation (if any) an observation calls for, given the
/// last stored interval.
///
/// Returns an error and plans no mutation for out-of-order timestamps
/// or observations with no country.
pub fn plan_ingest(
    last: Option<&VisitInterval>,
    observation: &Observation,
) -> Result<IngestAction, IngestError> {
    let country = observation
        .country
        .clone()
        .ok_or(IngestError::MissingCountryCode)?;

    let Some(last) = last else {
        return Ok(IngestAction::Open {
            country,
            start: observation.timestamp,
        });
    };

    let last_start = last.span.start();
    if observation.timestamp < last_start {
        return Err(IngestError::OutOfOrderObservation {
            observed: observation.timestamp,
            last_start,
        });
    }

    match last.span {
        VisitSpan::Open { .. } if last.country == country => Ok(IngestAction::Unchanged),
        VisitSpan::Open { .. } => Ok(IngestAction::CloseAndOpen {
            end: observation.timestamp,
            country,
            start: observation.timestamp,
        }),
        VisitSpan::Closed { .. } => {
            // The log normally ends open once anything has been ingested;
            // a closed tail only appears after repair of corrupt data.
            tracing::debug!("appending after closed tail");
            Ok(IngestAction::Open {
                country,
                start: observation.timestamp,
            })
        }
    }
}

/// The in-memory interval store.
///
/// Single source of truth for one tracked user. Mutated only through
/// [`VisitLog::ingest`]; readers take an owned snapshot and recompute
/// derived views on demand.
#[derive(Debug, Clone, Default)]
pub struct VisitLog {
    intervals: Vec<VisitInterval>,
}

impl VisitLog {
    /// Creates an empty log.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            intervals: Vec::new(),
        }
    }

    /// Builds a log from fetched intervals, repairing invariant
    /// violations.
    ///
    /// Violations signal upstream data corruption; they are surfaced as
    /// diagnostics rather than errors so a corrupt record never takes
    /// the whole log down.
    #[must_use]
    pub fn from_intervals(intervals: Vec<VisitInterval>) -> (Self, Vec<InvariantViolation>) {
        let (intervals, violations) = sanitize(intervals);
        (Self { intervals }, violations)
    }

    /// Ingests one observation, applying at most one mutation.
    ///
    /// Idempotent for repeated observations of the current country. On
    /// error the log is untouched.
    pub fn ingest(&mut self, observation: &Observation) -> Result<IngestAction, IngestError> {
        let action = plan_ingest(self.intervals.last(), observation)?;
        match &action {
            IngestAction::Open { country, start } => {
                self.intervals
                    .push(VisitInterval::new_open(country.clone(), *start));
            }
            IngestAction::CloseAndOpen {
                end,
                country,
                start,
            } => {
                if let Some(last) = self.intervals.last_mut() {
                    last.span = VisitSpan::Closed {
                        start: last.span.start(),
                        end: *end,
                    };
                }
                self.intervals
                    .push(VisitInterval::new_open(country.clone(), *start));
            }
            IngestAction::Unchanged => {}
        }
        Ok(action)
    }

    /// Returns the stored intervals, ordered by start.
    #[must_use]
    pub fn intervals(&self) -> &[VisitInterval] {
        &self.intervals
    }

    /// Returns an owned snapshot for the read-side transforms.
    #[must_use]
    pub fn snapshot(&self) -> Vec<VisitInterval> {
        self.intervals.clone()
    }

    /// Returns the most recent interval.
    #[must_use]
    pub fn last(&self) -> Option<&VisitInterval> {
        self.intervals.last()
    }

    #[must_use]
    pub const fn len(&self) -> usize {
        self.intervals.len()
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.intervals.is_empty()
    }
}

/// A diagnostic for a fetched interval that breaks a store invariant.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum InvariantViolation {
    /// A closed interval ended before it started; the record is dropped.
    #[error("interval {id} ends before it starts ({end} < {start})")]
    NegativeDuration {
        id: Uuid,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    },

    /// Two adjacent intervals share a country; merged into one.
    #[error("interval {id} repeats adjacent country {country}")]
    AdjacentSameCountry { id: Uuid, country: CountryCode },

    /// A non-trailing interval was open; closed at the next start.
    #[error("interval {id} is open but not the last interval")]
    DanglingOpen { id: Uuid },
}

/// Repairs a fetched interval list so the derived views can rely on the
/// store invariants.
fn sanitize(mut intervals: Vec<VisitInterval>) -> (Vec<VisitInterval>, Vec<InvariantViolation>) {
    let mut violations = Vec::new();
    intervals.sort_by_key(|interval| interval.span.start());

    let mut out: Vec<VisitInterval> = Vec::with_capacity(intervals.len());
    for interval in intervals {
        if let VisitSpan::Closed { start, end } = interval.span
            && end < start
        {
            violations.push(InvariantViolation::NegativeDuration {
                id: interval.id,
                start,
                end,
            });
            continue;
        }

        if let Some(prev) = out.last_mut()
            && prev.country == interval.country
        {
            violations.push(InvariantViolation::AdjacentSameCountry {
                id: interval.id,
                country: interval.country.clone(),
            });
            prev.span = merge_spans(prev.span, interval.span);
            continue;
        }

        out.push(interval);
    }

    // Any open interval that is not the last must be closed at the next
    // interval's start.
    for k in 0..out.len().saturating_sub(1) {
        if out[k].span.is_open() {
            violations.push(InvariantViolation::DanglingOpen { id: out[k].id });
            out[k].span = VisitSpan::Closed {
                start: out[k].span.start(),
                end: out[k + 1].span.start(),
            };
        }
    }

    for violation in &violations {
        tracing::warn!(%violation, "repaired corrupt visit interval");
    }
    (out, violations)
}

/// Merges two same-country spans, keeping the earlier start and the
/// later (or open) end.
fn merge_spans(prev: VisitSpan, next: VisitSpan) -> VisitSpan {
    let start = prev.start();
    match (prev, next) {
        (VisitSpan::Open { .. }, _) | (_, VisitSpan::Open { .. }) => VisitSpan::Open { start },
        (VisitSpan::Closed { end: a, .. }, VisitSpan::Closed { end: b, .. }) => {
            VisitSpan::Closed { start, end: a.max(b) }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn code(s: &str) -> CountryCode {
        CountryCode::new(s).unwrap()
    }

    fn ts(s: &str) -> DateTime<Utc> {
        s.parse().unwrap()
    }

    fn observe(log: &mut VisitLog, at: &str, country: &str) -> Result<IngestAction, IngestError> {
        log.ingest(&Observation::new(ts(at), code(country)))
    }

    #[test]
    fn first_observation_opens_interval() {
        let mut log = VisitLog::new();
        let action = observe(&mut log, "2024-01-01T08:00:00Z", "US").unwrap();
        assert!(matches!(action, IngestAction::Open { .. }));
        assert_eq!(log.len(), 1);
        assert!(log.last().unwrap().span.is_open());
    }

    #[test]
    fn same_country_observation_is_idempotent() {
        let mut log = VisitLog::new();
        observe(&mut log, "2024-01-01T08:00:00Z", "US").unwrap();
        let before = log.snapshot();

        let action = observe(&mut log, "2024-01-01T08:00:00Z", "US").unwrap();
        assert_eq!(action, IngestAction::Unchanged);
        let action = observe(&mut log, "2024-01-02T10:00:00Z", "US").unwrap();
        assert_eq!(action, IngestAction::Unchanged);

        assert_eq!(log.snapshot(), before);
    }

    #[test]
    fn country_change_closes_and_opens() {
        let mut log = VisitLog::new();
        observe(&mut log, "2024-01-01T08:00:00Z", "US").unwrap();
        observe(&mut log, "2024-01-03T12:00:00Z", "CA").unwrap();

        assert_eq!(log.len(), 2);
        let intervals = log.intervals();
        assert_eq!(
            intervals[0].span,
            VisitSpan::Closed {
                start: ts("2024-01-01T08:00:00Z"),
                end: ts("2024-01-03T12:00:00Z"),
            }
        );
        assert_eq!(intervals[1].country, code("CA"));
        assert!(intervals[1].span.is_open());
    }

    #[test]
    fn out_of_order_observation_rejected_without_mutation() {
        let mut log = VisitLog::new();
        observe(&mut log, "2024-01-05T08:00:00Z", "US").unwrap();
        let before = log.snapshot();

        let err = observe(&mut log, "2024-01-04T08:00:00Z", "CA").unwrap_err();
        assert!(matches!(err, IngestError::OutOfOrderObservation { .. }));
        assert_eq!(log.snapshot(), before);
    }

    #[test]
    fn missing_country_rejected_without_mutation() {
        let mut log = VisitLog::new();
        observe(&mut log, "2024-01-01T08:00:00Z", "US").unwrap();
        let before = log.snapshot();

        let err = log
            .ingest(&Observation {
                timestamp: ts("2024-01-02T08:00:00Z"),
                country: None,
                coordinate: None,
            })
            .unwrap_err();
        assert_eq!(err, IngestError::MissingCountryCode);
        assert_eq!(log.snapshot(), before);
    }

    #[test]
    fn closed_tail_appends_new_interval() {
        let intervals = vec![VisitInterval {
            id: Uuid::new_v4(),
            country: code("US"),
            span: VisitSpan::Closed {
                start: ts("2024-01-01T00:00:00Z"),
                end: ts("2024-01-02T00:00:00Z"),
            },
        }];
        let (mut log, violations) = VisitLog::from_intervals(intervals);
        assert!(violations.is_empty());

        observe(&mut log, "2024-01-03T00:00:00Z", "US").unwrap();
        assert_eq!(log.len(), 2);
        assert!(log.last().unwrap().span.is_open());
    }

    #[test]
    fn monotonic_ingest_preserves_invariants() {
        let mut log = VisitLog::new();
        let sequence = [
            ("2024-01-01T00:00:00Z", "US"),
            ("2024-01-02T00:00:00Z", "US"),
            ("2024-01-03T00:00:00Z", "CA"),
            ("2024-01-03T06:00:00Z", "CA"),
            ("2024-01-05T00:00:00Z", "FR"),
            ("2024-01-09T00:00:00Z", "US"),
        ];
        for (at, country) in sequence {
            observe(&mut log, at, country).unwrap();
        }

        let intervals = log.intervals();
        assert_eq!(intervals.len(), 4);
        for pair in intervals.windows(2) {
            assert!(pair[0].span.start() <= pair[1].span.start());
            assert_ne!(pair[0].country, pair[1].country);
        }
        // Only the last interval is open
        for interval in &intervals[..intervals.len() - 1] {
            assert!(!interval.span.is_open());
        }
        assert!(intervals[intervals.len() - 1].span.is_open());
    }

    #[test]
    fn sanitize_drops_negative_duration() {
        let intervals = vec![
            VisitInterval {
                id: Uuid::new_v4(),
                country: code("US"),
                span: VisitSpan::Closed {
                    start: ts("2024-01-05T00:00:00Z"),
                    end: ts("2024-01-01T00:00:00Z"),
                },
            },
            VisitInterval {
                id: Uuid::new_v4(),
                country: code("CA"),
                span: VisitSpan::Open {
                    start: ts("2024-01-06T00:00:00Z"),
                },
            },
        ];
        let (log, violations) = VisitLog::from_intervals(intervals);
        assert_eq!(log.len(), 1);
        assert_eq!(log.last().unwrap().country, code("CA"));
        assert!(matches!(
            violations[0],
            InvariantViolation::NegativeDuration { .. }
        ));
    }

    #[test]
    fn sanitize_merges_adjacent_same_country() {
        let intervals = vec![
            VisitInterval {
                id: Uuid::new_v4(),
                country: code("US"),
                span: VisitSpan::Closed {
                    start: ts("2024-01-01T00:00:00Z"),
                    end: ts("2024-01-02T00:00:00Z"),
                },
            },
            VisitInterval {
                id: Uuid::new_v4(),
                country: code("US"),
                span: VisitSpan::Closed {
                    start: ts("2024-01-02T00:00:00Z"),
                    end: ts("2024-01-04T00:00:00Z"),
                },
            },
        ];
        let (log, violations) = VisitLog::from_intervals(intervals);
        assert_eq!(log.len(), 1);
        assert_eq!(
            log.last().unwrap().span,
            VisitSpan::Closed {
                start: ts("2024-01-01T00:00:00Z"),
                end: ts("2024-01-04T00:00:00Z"),
            }
        );
        assert!(matches!(
            violations[0],
            InvariantViolation::AdjacentSameCountry { .. }
        ));
    }

    #[test]
    fn sanitize_closes_dangling_open_interval() {
        let intervals = vec![
            VisitInterval {
                id: Uuid::new_v4(),
                country: code("US"),
                span: VisitSpan::Open {
                    start: ts("2024-01-01T00:00:00Z"),
                },
            },
            VisitInterval {
                id: Uuid::new_v4(),
                country: code("CA"),
                span: VisitSpan::Open {
                    start: ts("2024-01-03T00:00:00Z"),
                },
            },
        ];
        let (log, violations) = VisitLog::from_intervals(intervals);
        assert_eq!(log.len(), 2);
        assert_eq!(
            log.intervals()[0].span,
            VisitSpan::Closed {
                start: ts("2024-01-01T00:00:00Z"),
                end: ts("2024-01-03T00:00:00Z"),
            }
        );
        assert!(log.intervals()[1].span.is_open());
        assert!(matches!(
            violations[0],
            InvariantViolation::DanglingOpen { .. }
        ));
    }
}
