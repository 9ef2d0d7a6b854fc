//! Cursor-paginated event listing.
//!
//! # Protocol
//!
//! 1. Resolve the time window from the request's [`TimeSpan`] (see
//!    [`crate::timespan::resolve_window`]).
//! 2. Ask the store for `PAGE_SIZE + 1` events, newest first, strictly older
//!    than the cursor.
//! 3. If more than `PAGE_SIZE` came back, keep the first `PAGE_SIZE` and hand
//!    out the `createdAt` of the last kept event as `nextCursor`.
//! 4. Emit `userId` and `projectId` as strings so 64-bit ids survive any
//!    JSON consumer.
//!
//! Nothing is cached between calls; a follow-up page depends only on the
//! cursor the caller sends back.

use chrono::{DateTime, NaiveDateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tracing::{debug, instrument};
use utoipa::ToSchema;

use crate::error::{EventsError, EventsResult};
use crate::filter::FilterConfig;
use crate::store::{EventQuery, EventStore, StoredEvent};
use crate::timespan::{parse_date, resolve_window, TimeSpan};

/// Number of events per page.
pub const PAGE_SIZE: usize = 50;

/// Maximum accepted project identifier length.

/// Position in the newest-first listing; the next page holds events strictly
/// older than this instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Cursor(DateTime<Utc>);

impl Cursor {
    /// Cursor pointing just past `instant`.
    #[must_use]
    pub const fn new(instant: DateTime<Utc>) -> Self {
        Self(instant)
    }

    /// The instant the cursor marks.
    #[must_use]
    pub const fn instant(self) -> DateTime<Utc> {
        self.0
    }
}

impl FromStr for Cursor {
    type Err = EventsError;

    /// Accepts RFC 3339 and the `YYYY-MM-DD HH:MM:SS[.fff]` form column stores
    /// print (read as UTC).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let raw = s.trim();

        if let Ok(instant) = DateTime::parse_from_rfc3339(raw) {
            return Ok(Self(instant.with_timezone(&Utc)));
        }

        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S%.f") {
            return Ok(Self(naive.and_utc()));
        }

        Err(EventsError::validation(format!(
            "Invalid cursor '{raw}'. Use an ISO 8601 timestamp"
        )))
    }
}

impl fmt::Display for Cursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&format_timestamp(self.0))
    }
}

/// Canonical wire form of event timestamps and cursors.
#[must_use]
pub fn format_timestamp(instant: DateTime<Utc>) -> String {
    instant.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Listing request body.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ListEventsRequest {
    /// ISO timestamp; only events strictly before it are returned
    #[serde(default)]
    pub cursor: Option<String>,
    /// Filters passed through to the store
    pub filter_config: FilterConfig,
    /// Time span selector (default `live`)
    #[serde(default)]
    pub timespan: Option<TimeSpan>,
    /// Start date for the custom span
    #[serde(default)]
    pub start_date: Option<String>,
    /// End date for the custom span (falls back to `startDate`)
    #[serde(default)]
    pub end_date: Option<String>,
}

impl ListEventsRequest {
    /// Effective time span.
    #[must_use]
    pub fn timespan(&self) -> TimeSpan {
        self.timespan.unwrap_or_default()
    }

    /// Schema-level checks run before any store query.
    ///
    /// # Errors
    ///
    /// Returns a validation error for an unparseable cursor, a filter config
    /// over its limits, or, under the custom span, a missing or unparseable
    /// `startDate`, an unparseable `endDate`, or a range ending before it
    /// starts. Other spans ignore the dates entirely.
    pub fn validate(&self) -> EventsResult<()> {
        if let Some(cursor) = &self.cursor {
            cursor.parse::<Cursor>()?;
        }

        if self.timespan() == TimeSpan::Custom {
            let start = self.start_date.as_deref().map(parse_date).transpose()?;
            let end = self.end_date.as_deref().map(parse_date).transpose()?;

            let start = start.ok_or_else(|| {
                EventsError::validation("startDate is required for the custom timespan")
            })?;
            if let Some(end) = end {
                if end < start {
                    return Err(EventsError::validation(format!(
                        "endDate {end} is before startDate {start}"
                    )));
                }
            }
        }

        self.filter_config.validate()
    }
}

/// Event as returned to callers: ids as strings, timestamps in cursor form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct EventView {
    /// Unique event identifier
    pub id: String,
    /// Owning project, as a decimal string
    pub project_id: String,
    /// User that triggered the event, as a decimal string
    pub user_id: String,
    /// Event name
    pub name: String,
    /// ISO 8601 timestamp, usable as a cursor
    pub created_at: String,
    /// Whether this is a page view
    pub is_page_view: bool,
    /// Page origin
    #[serde(skip_serializing_if = "Option::is_none")]
    pub origin: Option<String>,
    /// Page path
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pathname: Option<String>,
    /// Referring host
    #[serde(skip_serializing_if = "Option::is_none")]
    pub referrer: Option<String>,
    /// ISO country code
    #[serde(skip_serializing_if = "Option::is_none")]
    pub country_code: Option<String>,
    /// Operating system
    #[serde(skip_serializing_if = "Option::is_none")]
    pub os_name: Option<String>,
    /// Browser or client
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_name: Option<String>,
    /// Device class
    #[serde(skip_serializing_if = "Option::is_none")]
    pub device_type: Option<String>,
    /// Free-form event properties
    #[serde(skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Option<Object>)]
    pub custom_data: Option<serde_json::Value>,
}

impl From<StoredEvent> for EventView {
    fn from(event: StoredEvent) -> Self {
        Self {
            id: event.id,
            project_id: event.project_id.to_string(),
            user_id: event.user_id.to_string(),
            name: event.name,
            created_at: format_timestamp(event.created_at),
            is_page_view: event.is_page_view,
            origin: event.origin,
            pathname: event.pathname,
            referrer: event.referrer,
            country_code: event.country_code,
            os_name: event.os_name,
            client_name: event.client_name,
            device_type: event.device_type,
            custom_data: event.custom_data,
        }
    }
}

/// One page of events plus the continuation cursor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct EventPage {
    /// Up to `PAGE_SIZE` events, newest first
    pub events: Vec<EventView>,
    /// Present iff more events exist past this page
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_cursor: Option<String>,
}

/// Cuts an over-fetched, newest-first result down to one page.
///
/// `events` is expected to hold at most `page_size + 1` entries; anything past
/// `page_size` only signals that another page exists.
#[must_use]
pub fn paginate(mut events: Vec<StoredEvent>, page_size: usize) -> EventPage {
    let has_more = events.len() > page_size;
    if has_more {
        events.truncate(page_size);
    }

    let next_cursor = if has_more {
        events
            .last()
            .map(|event| Cursor::new(event.created_at).to_string())
    } else {
        None
    };

    EventPage {
        events: events.into_iter().map(EventView::from).collect(),
        next_cursor,
    }
}

/// Builds the store query for one page.
///
/// # Errors
///
/// Returns a validation error when the cursor or dates cannot be parsed.
pub fn build_query(
    project_id: u64,
    request: &ListEventsRequest,
    now: DateTime<Utc>,
) -> EventsResult<EventQuery> {
    let window = resolve_window(
        request.timespan(),
        request.start_date.as_deref(),
        request.end_date.as_deref(),
        now,
    )?;

    let cursor = request
        .cursor
        .as_deref()
        .map(str::parse::<Cursor>)
        .transpose()?
        .map(Cursor::instant);

    Ok(EventQuery {
        project_id,
        limit: PAGE_SIZE + 1,
        cursor,
        filter_config: request.filter_config.clone(),
        start_date: window.start,
        end_date: window.end,
    })
}

/// Parses the project identifier supplied by the transport layer.
///
/// Projects are keyed by unsigned 64-bit integers in every store, so the id
/// must be plain decimal digits that fit in a `u64`.
///
/// # Errors
///
/// Returns a validation error for empty, non-decimal, or out-of-range ids.
pub fn parse_project_id(raw: &str) -> EventsResult<u64> {
    if raw.is_empty() {
        return Err(EventsError::validation("projectId is required"));
    }
    if !raw.bytes().all(|b| b.is_ascii_digit()) {
        return Err(EventsError::validation(format!(
            "projectId '{raw}' must be a decimal number"
        )));
    }
    raw.parse::<u64>()
        .map_err(|_| EventsError::validation(format!("projectId '{raw}' is out of range")))
}

/// Lists one page of a project's events.
///
/// Store failures are returned as-is.
///
/// # Errors
///
/// Returns a validation error for malformed input and a store error when the
/// store query fails.
#[instrument(skip(store, request), fields(timespan = %request.timespan(), has_cursor = request.cursor.is_some()))]
pub async fn list_events(
    store: &dyn EventStore,
    project_id: u64,
    request: &ListEventsRequest,
    now: DateTime<Utc>,
) -> EventsResult<EventPage> {
    let query = build_query(project_id, request, now)?;
    debug!(
        start = ?query.start_date,
        end = ?query.end_date,
        cursor = ?query.cursor,
        filters = query.filter_config.filters.len(),
        "Resolved event query"
    );

    let events = store.latest_events_by_project(&query).await?;
    let page = paginate(events, PAGE_SIZE);

    debug!(
        returned = page.events.len(),
        has_more = page.next_cursor.is_some(),
        "Event page assembled"
    );
    Ok(page)
}
