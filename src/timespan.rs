//! Symbolic time spans and their resolution into concrete query windows.
//!
//! A [`TimeSpan`] is what a dashboard sends ("last 7 days", "custom range").
//! [`resolve_window`] turns it into the [`TimeWindow`] handed to the event store:
//!
//! - `live` has no lower bound at all, the listing simply walks back in time.
//! - Relative spans get a lower bound and leave the upper bound open.
//! - `custom` is the only span with an upper bound, taken from `endDate` and
//!   falling back to `startDate` when no end was given.
//!
//! All instants are UTC. `now` is always passed in so resolution stays
//! deterministic under test.

use chrono::{DateTime, Datelike, Duration, Months, NaiveDate, NaiveTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use utoipa::ToSchema;

use crate::error::{EventsError, EventsResult};

/// Time span selector accepted by the listing endpoint.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub enum TimeSpan {
    /// No lower bound; newest events first, back to the beginning.
    #[default]
    #[serde(rename = "live")]
    Live,
    /// Last hour
    #[serde(rename = "1hr")]
    OneHour,
    /// Last 24 hours
    #[serde(rename = "24hrs")]
    TwentyFourHours,
    /// Today plus the previous 6 days
    #[serde(rename = "7days")]
    SevenDays,
    /// Today plus the previous 29 days
    #[serde(rename = "30days")]
    ThirtyDays,
    /// Last 3 calendar months
    #[serde(rename = "3months")]
    ThreeMonths,
    /// Last 6 calendar months
    #[serde(rename = "6months")]
    SixMonths,
    /// Last 12 calendar months
    #[serde(rename = "1year")]
    OneYear,
    /// Caller-supplied `startDate`/`endDate`
    #[serde(rename = "custom")]
    Custom,
}

impl TimeSpan {
    /// Every span, in the order dashboards list them.
    pub const ALL: [Self; 9] = [
        Self::Live,
        Self::OneHour,
        Self::TwentyFourHours,
        Self::SevenDays,
        Self::ThirtyDays,
        Self::ThreeMonths,
        Self::SixMonths,
        Self::OneYear,
        Self::Custom,
    ];

    /// Wire name of the span.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Live => "live",
            Self::OneHour => "1hr",
            Self::TwentyFourHours => "24hrs",
            Self::SevenDays => "7days",
            Self::ThirtyDays => "30days",
            Self::ThreeMonths => "3months",
            Self::SixMonths => "6months",
            Self::OneYear => "1year",
            Self::Custom => "custom",
        }
    }
}

impl fmt::Display for TimeSpan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TimeSpan {
    type Err = EventsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|span| span.as_str() == s)
            .ok_or_else(|| {
                let names: Vec<&str> = Self::ALL.iter().map(|span| span.as_str()).collect();
                EventsError::validation(format!(
                    "Invalid timespan '{s}'. Use one of: {}",
                    names.join(", ")
                ))
            })
    }
}

/// Earliest calendar year accepted in request dates.
pub const MIN_YEAR: i32 = 1900;

/// Latest calendar year accepted in request dates.
pub const MAX_YEAR: i32 = 9999;

/// Concrete bounds passed to the event store. `None` means unbounded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TimeWindow {
    /// Inclusive lower bound
    pub start: Option<DateTime<Utc>>,
    /// Inclusive upper bound
    pub end: Option<DateTime<Utc>>,
}

/// Resolves the query window for a span.
///
/// `start_date` and `end_date` only matter for [`TimeSpan::Custom`]; for every
/// other span they are ignored, and for [`TimeSpan::Live`] no bound is set at all.
///
/// # Errors
///
/// Returns a validation error when a custom span lacks a start date or when a
/// supplied date cannot be parsed.
pub fn resolve_window(
    span: TimeSpan,
    start_date: Option<&str>,
    end_date: Option<&str>,
    now: DateTime<Utc>,
) -> EventsResult<TimeWindow> {
    let start = if span == TimeSpan::Live {
        None
    } else {
        span_start(span, start_date, now)?
    };

    let end = if span == TimeSpan::Custom {
        span_end(span, end_date.or(start_date))?
    } else {
        None
    };

    Ok(TimeWindow { start, end })
}

/// Lower bound for a span.
///
/// # Errors
///
/// Returns a validation error for a custom span without a parseable start date.
pub fn span_start(
    span: TimeSpan,
    custom_start: Option<&str>,
    now: DateTime<Utc>,
) -> EventsResult<Option<DateTime<Utc>>> {
    let start = match span {
        TimeSpan::Live => return Ok(None),
        TimeSpan::OneHour => now - Duration::hours(1),
        TimeSpan::TwentyFourHours => now - Duration::hours(24),
        TimeSpan::SevenDays => start_of_day((now - Duration::days(6)).date_naive()),
        TimeSpan::ThirtyDays => start_of_day((now - Duration::days(29)).date_naive()),
        TimeSpan::ThreeMonths => start_of_day(months_back(now, 3)),
        TimeSpan::SixMonths => start_of_day(months_back(now, 6)),
        TimeSpan::OneYear => start_of_day(months_back(now, 12)),
        TimeSpan::Custom => {
            let raw = custom_start.ok_or_else(|| {
                EventsError::validation("startDate is required for the custom timespan")
            })?;
            start_of_day(parse_date(raw)?)
        }
    };

    Ok(Some(start))
}

/// Upper bound for a span. Only [`TimeSpan::Custom`] has one.
///
/// # Errors
///
/// Returns a validation error when the supplied date cannot be parsed.
pub fn span_end(span: TimeSpan, custom_end: Option<&str>) -> EventsResult<Option<DateTime<Utc>>> {
    if span != TimeSpan::Custom {
        return Ok(None);
    }

    custom_end
        .map(|raw| parse_date(raw).and_then(end_of_day))
        .transpose()
}

/// Parses a calendar date given either as `YYYY-MM-DD` or as an RFC 3339 instant.
///
/// Years must fall within [`MIN_YEAR`]..=[`MAX_YEAR`].
///
/// # Errors
///
/// Returns a validation error for anything else.
pub fn parse_date(raw: &str) -> EventsResult<NaiveDate> {
    let raw = raw.trim();

    let date = NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .or_else(|| {
            DateTime::parse_from_rfc3339(raw)
                .ok()
                .map(|instant| instant.with_timezone(&Utc).date_naive())
        })
        .ok_or_else(|| {
            EventsError::validation(format!("Invalid date '{raw}'. Use YYYY-MM-DD or ISO 8601"))
        })?;

    if !(MIN_YEAR..=MAX_YEAR).contains(&date.year()) {
        return Err(EventsError::validation(format!(
            "Date '{raw}' is outside the years {MIN_YEAR}-{MAX_YEAR}"
        )));
    }

    Ok(date)
}

fn months_back(now: DateTime<Utc>, months: u32) -> NaiveDate {
    let today = now.date_naive();
    today
        .checked_sub_months(Months::new(months))
        .unwrap_or(NaiveDate::MIN)
}

fn start_of_day(date: NaiveDate) -> DateTime<Utc> {
    Utc.from_utc_datetime(&date.and_time(NaiveTime::MIN))
}

fn end_of_day(date: NaiveDate) -> EventsResult<DateTime<Utc>> {
    date.and_hms_milli_opt(23, 59, 59, 999)
        .map(|end| Utc.from_utc_datetime(&end))
        .ok_or_else(|| EventsError::validation(format!("No end of day for {date}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 15, 13, 45, 10).single().expect("valid instant")
    }

    fn at(y: i32, m: u32, d: u32, h: u32, min: u32, s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, min, s).single().expect("valid instant")
    }

    #[test]
    fn test_live_has_no_bounds_even_with_dates() {
        let window = resolve_window(TimeSpan::Live, Some("2024-01-01"), Some("2024-02-01"), now())
            .expect("live resolves");
        assert_eq!(window, TimeWindow::default());
    }

    #[test]
    fn test_relative_spans() {
        let window = resolve_window(TimeSpan::OneHour, None, None, now()).expect("resolves");
        assert_eq!(window.start, Some(at(2024, 5, 15, 12, 45, 10)));
        assert_eq!(window.end, None);

        let window = resolve_window(TimeSpan::TwentyFourHours, None, None, now()).expect("resolves");
        assert_eq!(window.start, Some(at(2024, 5, 14, 13, 45, 10)));

        let window = resolve_window(TimeSpan::SevenDays, None, None, now()).expect("resolves");
        assert_eq!(window.start, Some(at(2024, 5, 9, 0, 0, 0)));

        let window = resolve_window(TimeSpan::ThirtyDays, None, None, now()).expect("resolves");
        assert_eq!(window.start, Some(at(2024, 4, 16, 0, 0, 0)));

        let window = resolve_window(TimeSpan::ThreeMonths, None, None, now()).expect("resolves");
        assert_eq!(window.start, Some(at(2024, 2, 15, 0, 0, 0)));

        let window = resolve_window(TimeSpan::OneYear, None, None, now()).expect("resolves");
        assert_eq!(window.start, Some(at(2023, 5, 15, 0, 0, 0)));
        assert_eq!(window.end, None);
    }

    #[test]
    fn test_relative_span_ignores_custom_dates() {
        let window = resolve_window(TimeSpan::SixMonths, Some("2020-01-01"), Some("2020-01-02"), now())
            .expect("resolves");
        assert_eq!(window.start, Some(at(2023, 11, 15, 0, 0, 0)));
        assert_eq!(window.end, None);
    }

    #[test]
    fn test_custom_range() {
        let window = resolve_window(TimeSpan::Custom, Some("2024-03-01"), Some("2024-03-10"), now())
            .expect("resolves");
        assert_eq!(window.start, Some(at(2024, 3, 1, 0, 0, 0)));
        assert_eq!(
            window.end,
            Some(at(2024, 3, 10, 23, 59, 59) + Duration::milliseconds(999))
        );
    }

    #[test]
    fn test_custom_end_falls_back_to_start() {
        let window =
            resolve_window(TimeSpan::Custom, Some("2024-03-01"), None, now()).expect("resolves");
        assert_eq!(window.start, Some(at(2024, 3, 1, 0, 0, 0)));
        assert_eq!(
            window.end,
            Some(at(2024, 3, 1, 23, 59, 59) + Duration::milliseconds(999))
        );
    }

    #[test]
    fn test_custom_without_start_is_rejected() {
        let err = resolve_window(TimeSpan::Custom, None, Some("2024-03-01"), now());
        assert!(matches!(err, Err(EventsError::ValidationError { .. })));
    }

    #[test]
    fn test_parse_date_formats() {
        let expected = NaiveDate::from_ymd_opt(2024, 3, 1).expect("valid date");
        assert_eq!(parse_date("2024-03-01").ok(), Some(expected));
        assert_eq!(parse_date("2024-03-01T22:10:00Z").ok(), Some(expected));
        assert_eq!(parse_date("2024-03-02T01:00:00+02:00").ok(), Some(expected));
        assert!(parse_date("03/01/2024").is_err());
    }

    #[test]
    fn test_extreme_years_are_rejected() {
        assert!(parse_date("+262142-12-31").is_err());
        assert!(parse_date("-0001-01-01").is_err());
        assert!(parse_date("1899-12-31").is_err());
        assert!(parse_date("1900-01-01").is_ok());
        assert!(parse_date("9999-12-31").is_ok());

        let result = resolve_window(TimeSpan::Custom, Some("+262142-12-31"), None, now());
        assert!(matches!(result, Err(EventsError::ValidationError { .. })));

        let result = resolve_window(TimeSpan::Custom, Some("2024-03-01"), Some("+262142-12-31"), now());
        assert!(matches!(result, Err(EventsError::ValidationError { .. })));
    }

    #[test]
    fn test_last_supported_day_has_an_end() {
        let window = resolve_window(TimeSpan::Custom, Some("9999-12-31"), None, now())
            .expect("resolves");
        assert_eq!(
            window.end,
            Some(at(9999, 12, 31, 23, 59, 59) + Duration::milliseconds(999))
        );
    }

    #[test]
    fn test_timespan_wire_names() {
        for span in TimeSpan::ALL {
            assert_eq!(span.as_str().parse::<TimeSpan>().ok(), Some(span));
            let json = serde_json::to_string(&span).expect("serializes");
            assert_eq!(json, format!("\"{span}\""));
        }
        assert!("2weeks".parse::<TimeSpan>().is_err());
        assert_eq!(TimeSpan::default(), TimeSpan::Live);
    }
}
