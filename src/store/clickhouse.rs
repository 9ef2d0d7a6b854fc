//! ClickHouse event store over the HTTP interface.
//!
//! SQL is posted as the request body. Every user-controlled value travels as a
//! `param_<name>` query-string entry bound to a `{name:Type}` placeholder, so
//! ClickHouse substitutes it server-side.
//!
//! Expected table:
//!
//! ```sql
//! CREATE TABLE events (
//!     id String, project_id UInt64, user_id UInt64, name String,
//!     created_at DateTime64(3, 'UTC'), is_page_view Bool,
//!     origin String, pathname String, referrer String, country_code String,
//!     os_name String, client_name String, device_type String, custom_data String
//! ) ENGINE = MergeTree ORDER BY (project_id, created_at);
//! ```

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, instrument, warn};

use super::models::{lenient, non_empty, StoredEvent};
use super::{EventQuery, EventStore};
use crate::config::ClickHouseSettings;
use crate::error::{EventsError, EventsResult};
use crate::filter::SqlDialect;

/// A statement plus its named parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClickHouseQuery {
    /// Statement text with `{name:Type}` placeholders
    pub sql: String,
    /// `(name, value)` pairs sent as `param_<name>`
    pub params: Vec<(String, String)>,
}

#[derive(Debug, Deserialize)]
struct JsonResponse {
    #[serde(default)]
    data: Vec<ClickHouseEventRow>,
}

/// Row shape returned by [`ClickHouseStore`] queries.
#[derive(Debug, Deserialize)]
struct ClickHouseEventRow {
    id: String,
    #[serde(deserialize_with = "lenient::deserialize")]
    project_id: u64,
    #[serde(deserialize_with = "lenient::deserialize")]
    user_id: u64,
    name: String,
    #[serde(deserialize_with = "lenient::deserialize")]
    created_at_ms: i64,
    #[serde(default)]
    is_page_view: bool,
    #[serde(default)]
    origin: Option<String>,
    #[serde(default)]
    pathname: Option<String>,
    #[serde(default)]
    referrer: Option<String>,
    #[serde(default)]
    country_code: Option<String>,
    #[serde(default)]
    os_name: Option<String>,
    #[serde(default)]
    client_name: Option<String>,
    #[serde(default)]
    device_type: Option<String>,
    #[serde(default)]
    custom_data: Option<String>,
}

impl TryFrom<ClickHouseEventRow> for StoredEvent {
    type Error = EventsError;

    fn try_from(row: ClickHouseEventRow) -> Result<Self, Self::Error> {
        let created_at = DateTime::<Utc>::from_timestamp_millis(row.created_at_ms).ok_or_else(|| {
            EventsError::decoding(
                format!("event {} has out-of-range created_at {}", row.id, row.created_at_ms),
                None,
            )
        })?;
        let custom_data = non_empty(row.custom_data)
            .map(|raw| serde_json::from_str(&raw))
            .transpose()
            .map_err(|e| {
                EventsError::decoding(
                    format!("event {} has malformed custom_data", row.id),
                    Some(Box::new(e)),
                )
            })?;

        Ok(Self {
            id: row.id,
            project_id: row.project_id,
            user_id: row.user_id,
            name: row.name,
            created_at,
            is_page_view: row.is_page_view,
            origin: non_empty(row.origin),
            pathname: non_empty(row.pathname),
            referrer: non_empty(row.referrer),
            country_code: non_empty(row.country_code),
            os_name: non_empty(row.os_name),
            client_name: non_empty(row.client_name),
            device_type: non_empty(row.device_type),
            custom_data,
        })
    }
}

/// HTTP client wrapper for ClickHouse.
#[derive(Debug, Clone)]
pub struct ClickHouseStore {
    client: Client,
    settings: ClickHouseSettings,
}

impl ClickHouseStore {
    /// Builds a client for the given server.
    ///
    /// # Errors
    ///
    /// Returns a store error if the HTTP client cannot be constructed.
    pub fn new(settings: ClickHouseSettings) -> EventsResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| EventsError::store("Failed to build ClickHouse client", Some(Box::new(e))))?;

        Ok(Self { client, settings })
    }

    async fn post(&self, query: &ClickHouseQuery) -> EventsResult<reqwest::Response> {
        let mut url = reqwest::Url::parse(&self.settings.url).map_err(|e| {
            EventsError::store(
                format!("Invalid ClickHouse URL: {}", self.settings.url),
                Some(Box::new(e)),
            )
        })?;
        {
            let mut qs = url.query_pairs_mut();
            qs.append_pair("database", &self.settings.database);
            qs.append_pair("default_format", "JSON");
            for (name, value) in &query.params {
                qs.append_pair(&format!("param_{name}"), value);
            }
        }

        let response = self
            .client
            .post(url)
            .basic_auth(&self.settings.user, Some(&self.settings.password))
            .body(query.sql.clone())
            .send()
            .await
            .map_err(|e| EventsError::store("ClickHouse HTTP request failed", Some(Box::new(e))))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_else(|e| {
                warn!(status = %status, error = %e, "Failed to read ClickHouse error body");
                String::new()
            });
            return Err(EventsError::store(
                format!("ClickHouse error {status}: {}", body.trim()),
                None,
            ));
        }

        Ok(response)
    }
}

#[async_trait]
impl EventStore for ClickHouseStore {
    fn backend_name(&self) -> &'static str {
        "clickhouse"
    }

    #[instrument(skip(self, query), fields(project_id = %query.project_id, limit = query.limit))]
    async fn latest_events_by_project(&self, query: &EventQuery) -> EventsResult<Vec<StoredEvent>> {
        let statement = build_latest_events_query(query);
        debug!(sql = %statement.sql, params = statement.params.len(), "Querying events");

        let body: JsonResponse = self.post(&statement).await?.json().await.map_err(|e| {
            EventsError::decoding("ClickHouse response parse failed", Some(Box::new(e)))
        })?;

        body.data.into_iter().map(StoredEvent::try_from).collect()
    }

    async fn health_check(&self) -> EventsResult<()> {
        self.post(&ClickHouseQuery {
            sql: "SELECT 1".to_string(),
            params: Vec::new(),
        })
        .await?;
        Ok(())
    }
}

/// Renders the newest-first listing statement for `query`.
#[must_use]
pub fn build_latest_events_query(query: &EventQuery) -> ClickHouseQuery {
    let mut sql = String::from(
        "SELECT id, project_id, user_id, name, \
         toUnixTimestamp64Milli(created_at) AS created_at_ms, \
         toBool(is_page_view) AS is_page_view, \
         origin, pathname, referrer, country_code, os_name, client_name, \
         device_type, custom_data \
         FROM events \
         WHERE project_id = {project_id:UInt64}",
    );
    let mut params = vec![("project_id".to_string(), query.project_id.to_string())];

    if let Some(cursor) = query.cursor {
        sql.push_str(" AND created_at < fromUnixTimestamp64Milli({cursor_ms:Int64}, 'UTC')");
        params.push(("cursor_ms".to_string(), cursor.timestamp_millis().to_string()));
    }
    if let Some(start) = query.start_date {
        sql.push_str(" AND created_at >= fromUnixTimestamp64Milli({start_ms:Int64}, 'UTC')");
        params.push(("start_ms".to_string(), start.timestamp_millis().to_string()));
    }
    if let Some(end) = query.end_date {
        sql.push_str(" AND created_at <= fromUnixTimestamp64Milli({end_ms:Int64}, 'UTC')");
        params.push(("end_ms".to_string(), end.timestamp_millis().to_string()));
    }
    if let Some(predicate) = query.filter_config.to_sql(SqlDialect::ClickHouse, "filter_") {
        sql.push_str(" AND ");
        sql.push_str(&predicate.clause);
        params.extend(predicate.params);
    }

    sql.push_str(" ORDER BY created_at DESC, id DESC LIMIT {limit:UInt32}");
    params.push(("limit".to_string(), query.limit.to_string()));

    ClickHouseQuery { sql, params }
}
