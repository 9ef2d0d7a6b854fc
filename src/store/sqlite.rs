//! SQLite event store.
//!
//! # Configuration
//!
//! - **WAL mode**: Enables concurrent readers during writes
//! - **Busy timeout**: 30 seconds to handle lock contention
//! - **Max connections**: 5 for file databases, 1 for `:memory:` (every
//!   in-memory connection would otherwise see its own empty database)
//!
//! Identifiers are stored as TEXT and timestamps as epoch milliseconds.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{
    sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous},
    SqlitePool,
};
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, info, instrument};

use super::models::{non_empty, StoredEvent};
use super::{EventQuery, EventStore};
use crate::error::{EventsError, EventsResult};
use crate::filter::SqlDialect;

/// Row shape of the `events` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct EventRow {
    /// Event identifier
    pub id: String,
    /// Project identifier (decimal text)
    pub project_id: String,
    /// User identifier (decimal text)
    pub user_id: String,
    /// Event name
    pub name: String,
    /// Unix epoch milliseconds
    pub created_at: i64,
    /// Page view flag
    pub is_page_view: bool,
    /// Page origin
    pub origin: Option<String>,
    /// Page path
    pub pathname: Option<String>,
    /// Referring host
    pub referrer: Option<String>,
    /// ISO country code
    pub country_code: Option<String>,
    /// Operating system
    pub os_name: Option<String>,
    /// Browser or client
    pub client_name: Option<String>,
    /// Device class
    pub device_type: Option<String>,
    /// JSON-encoded properties
    pub custom_data: Option<String>,
}

impl TryFrom<EventRow> for StoredEvent {
    type Error = EventsError;

    fn try_from(row: EventRow) -> Result<Self, Self::Error> {
        let project_id = row.project_id.parse::<u64>().map_err(|e| {
            EventsError::decoding(
                format!("event {} has non-numeric project_id '{}'", row.id, row.project_id),
                Some(Box::new(e)),
            )
        })?;
        let user_id = row.user_id.parse::<u64>().map_err(|e| {
            EventsError::decoding(
                format!("event {} has non-numeric user_id '{}'", row.id, row.user_id),
                Some(Box::new(e)),
            )
        })?;
        let created_at = DateTime::<Utc>::from_timestamp_millis(row.created_at).ok_or_else(|| {
            EventsError::decoding(
                format!("event {} has out-of-range created_at {}", row.id, row.created_at),
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
            project_id,
            user_id,
            name: row.name,
            created_at,
            is_page_view: row.is_page_view,
            origin: row.origin,
            pathname: row.pathname,
            referrer: row.referrer,
            country_code: row.country_code,
            os_name: row.os_name,
            client_name: row.client_name,
            device_type: row.device_type,
            custom_data,
        })
    }
}

/// Value bound to a positional placeholder.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Bind {
    Text(String),
    Int(i64),
}

/// Event store backed by a SQLite connection pool.
#[derive(Debug, Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Wraps an existing, migrated pool.
    #[must_use]
    pub const fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Connects to `database_url`, creating the file if needed, and migrates it.
    ///
    /// # Errors
    ///
    /// Returns a store error if the URL is invalid, the connection fails,
    /// or migrations cannot be applied.
    pub async fn connect(database_url: &str) -> EventsResult<Self> {
        let pool = create_pool(database_url).await?;
        Ok(Self::new(pool))
    }

    /// Access to the underlying pool.
    #[must_use]
    pub const fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Inserts events in one transaction, skipping ids that already exist.
    ///
    /// Returns the number of rows actually inserted.
    ///
    /// # Errors
    ///
    /// Returns a store error if any insert fails; nothing is committed then.
    #[instrument(skip(self, events), fields(count = events.len()))]
    pub async fn insert_events(&self, events: &[StoredEvent]) -> EventsResult<u64> {
        let mut tx = self.pool.begin().await.map_err(|e| {
            EventsError::store("Failed to begin transaction", Some(Box::new(e)))
        })?;

        let mut inserted = 0;
        for event in events {
            let custom_data = event
                .custom_data
                .as_ref()
                .map(serde_json::to_string)
                .transpose()
                .map_err(|e| {
                    EventsError::decoding(
                        format!("event {} has unserializable custom_data", event.id),
                        Some(Box::new(e)),
                    )
                })?;

            let result = sqlx::query(
                r#"
                INSERT INTO events (
                    id, project_id, user_id, name, created_at, is_page_view,
                    origin, pathname, referrer, country_code, os_name,
                    client_name, device_type, custom_data
                )
                VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                ON CONFLICT(id) DO NOTHING
                "#,
            )
            .bind(&event.id)
            .bind(event.project_id.to_string())
            .bind(event.user_id.to_string())
            .bind(&event.name)
            .bind(event.created_at.timestamp_millis())
            .bind(event.is_page_view)
            .bind(&event.origin)
            .bind(&event.pathname)
            .bind(&event.referrer)
            .bind(&event.country_code)
            .bind(&event.os_name)
            .bind(&event.client_name)
            .bind(&event.device_type)
            .bind(custom_data)
            .execute(&mut *tx)
            .await
            .map_err(|e| {
                EventsError::store(format!("Failed to insert event {}", event.id), Some(Box::new(e)))
            })?;

            inserted += result.rows_affected();
        }

        tx.commit().await.map_err(|e| {
            EventsError::store("Failed to commit event batch", Some(Box::new(e)))
        })?;

        info!(inserted, skipped = events.len() as u64 - inserted, "Event batch stored");
        Ok(inserted)
    }
}

#[async_trait]
impl EventStore for SqliteStore {
    fn backend_name(&self) -> &'static str {
        "sqlite"
    }

    #[instrument(skip(self, query), fields(project_id = %query.project_id, limit = query.limit))]
    async fn latest_events_by_project(&self, query: &EventQuery) -> EventsResult<Vec<StoredEvent>> {
        let (sql, binds) = build_latest_events_query(query);
        debug!(sql = %sql, binds = binds.len(), "Querying events");

        let mut statement = sqlx::query_as::<_, EventRow>(&sql);
        for bind in binds {
            statement = match bind {
                Bind::Text(value) => statement.bind(value),
                Bind::Int(value) => statement.bind(value),
            };
        }

        let rows = statement.fetch_all(&self.pool).await.map_err(|e| {
            EventsError::store("Failed to query latest events", Some(Box::new(e)))
        })?;

        rows.into_iter().map(StoredEvent::try_from).collect()
    }

    async fn health_check(&self) -> EventsResult<()> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| EventsError::store("Database health check failed", Some(Box::new(e))))?;

        Ok(())
    }
}

fn build_latest_events_query(query: &EventQuery) -> (String, Vec<Bind>) {
    let mut sql = String::from(
        "SELECT id, project_id, user_id, name, created_at, is_page_view, \
         origin, pathname, referrer, country_code, os_name, client_name, \
         device_type, custom_data \
         FROM events WHERE project_id = ?",
    );
    let mut binds = vec![Bind::Text(query.project_id.to_string())];

    if let Some(cursor) = query.cursor {
        sql.push_str(" AND created_at < ?");
        binds.push(Bind::Int(cursor.timestamp_millis()));
    }
    if let Some(start) = query.start_date {
        sql.push_str(" AND created_at >= ?");
        binds.push(Bind::Int(start.timestamp_millis()));
    }
    if let Some(end) = query.end_date {
        sql.push_str(" AND created_at <= ?");
        binds.push(Bind::Int(end.timestamp_millis()));
    }
    if let Some(predicate) = query.filter_config.to_sql(SqlDialect::Sqlite, "f") {
        sql.push_str(" AND ");
        sql.push_str(&predicate.clause);
        binds.extend(predicate.params.into_iter().map(|(_, value)| Bind::Text(value)));
    }

    sql.push_str(" ORDER BY created_at DESC, id DESC LIMIT ?");
    binds.push(Bind::Int(i64::try_from(query.limit).unwrap_or(i64::MAX)));

    (sql, binds)
}

/// Creates a SQLite connection pool and applies migrations.
///
/// # Errors
///
/// Returns a store error if the URL is invalid, the connection fails,
/// or the schema cannot be migrated.
pub async fn create_pool(database_url: &str) -> EventsResult<SqlitePool> {
    info!(database_url, "Connecting to database");

    let in_memory = database_url.contains(":memory:");

    let options = SqliteConnectOptions::from_str(database_url)
        .map_err(|e| {
            EventsError::store(
                format!("Failed to parse database URL: {database_url}"),
                Some(Box::new(e)),
            )
        })?
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .synchronous(SqliteSynchronous::Normal)
        .busy_timeout(Duration::from_secs(30));

    let mut pool_options = SqlitePoolOptions::new()
        .max_connections(if in_memory { 1 } else { 5 })
        .min_connections(1)
        .acquire_timeout(Duration::from_secs(5));

    if in_memory {
        // Dropping the last connection drops the database.
        pool_options = pool_options.idle_timeout(None).max_lifetime(None);
    }

    let pool = pool_options.connect_with(options).await.map_err(|e| {
        EventsError::store(
            format!("Failed to connect to database at {database_url}"),
            Some(Box::new(e)),
        )
    })?;

    info!("Running database migrations");
    run_migrations(&pool).await?;
    verify_database(&pool).await?;
    info!("Database migrations complete");

    Ok(pool)
}

/// Applies pending migrations from `migrations/`.
///
/// # Errors
///
/// Returns a store error if a migration fails.
pub async fn run_migrations(pool: &SqlitePool) -> EventsResult<()> {
    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .map_err(|e| EventsError::store("Failed to run database migrations", Some(Box::new(e))))?;

    Ok(())
}

/// Verify that the `events` table exists after migrations.
///
/// # Errors
///
/// Returns a store error when the table is missing.
pub async fn verify_database(pool: &SqlitePool) -> EventsResult<()> {
    let rows = sqlx::query_as::<_, (String,)>(
        "SELECT name FROM sqlite_master WHERE type='table' AND name = 'events'",
    )
    .fetch_all(pool)
    .await
    .map_err(|e| EventsError::store("Failed to verify database schema", Some(Box::new(e))))?;

    if rows.is_empty() {
        return Err(EventsError::store(
            "Database schema incomplete: events table missing",
            None,
        ));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::{Filter, FilterConfig, FilterField, FilterOperator, MatchOperator};
    use chrono::Duration as ChronoDuration;
    use chrono::TimeZone;

    fn base_time() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).single().expect("valid instant")
    }

    fn event(id: &str, project_id: u64, minutes: i64, name: &str) -> StoredEvent {
        StoredEvent {
            id: id.to_string(),
            project_id,
            user_id: 1_000 + project_id,
            name: name.to_string(),
            created_at: base_time() + ChronoDuration::minutes(minutes),
            is_page_view: name == "$$pageView",
            origin: Some("https://example.com".to_string()),
            pathname: Some(format!("/{name}")),
            referrer: None,
            country_code: Some("DE".to_string()),
            os_name: None,
            client_name: None,
            device_type: None,
            custom_data: None,
        }
    }

    fn query(project_id: u64) -> EventQuery {
        EventQuery {
            project_id,
            limit: 10,
            cursor: None,
            filter_config: FilterConfig::default(),
            start_date: None,
            end_date: None,
        }
    }

    async fn setup_store() -> SqliteStore {
        SqliteStore::connect("sqlite::memory:")
            .await
            .expect("Failed to create store")
    }

    #[tokio::test]
    async fn test_create_pool_and_migrations() {
        let store = setup_store().await;
        assert!(verify_database(store.pool()).await.is_ok());
        assert!(store.health_check().await.is_ok());
    }

    #[tokio::test]
    async fn test_insert_is_idempotent() {
        let store = setup_store().await;
        let events = vec![event("a", 1, 0, "signup"), event("b", 1, 1, "login")];

        assert_eq!(store.insert_events(&events).await.expect("insert"), 2);
        assert_eq!(store.insert_events(&events).await.expect("insert"), 0);
    }

    #[tokio::test]
    async fn test_newest_first_per_project() {
        let store = setup_store().await;
        store
            .insert_events(&[
                event("a", 1, 0, "signup"),
                event("b", 1, 5, "login"),
                event("c", 2, 10, "signup"),
                event("d", 1, 3, "purchase"),
            ])
            .await
            .expect("insert");

        let events = store.latest_events_by_project(&query(1)).await.expect("query");
        let ids: Vec<&str> = events.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, vec!["b", "d", "a"]);
        assert_eq!(events[0].project_id, 1);
        assert_eq!(events[0].user_id, 1_001);
    }

    #[tokio::test]
    async fn test_cursor_is_exclusive_and_window_inclusive() {
        let store = setup_store().await;
        store
            .insert_events(&[
                event("a", 1, 0, "signup"),
                event("b", 1, 5, "login"),
                event("c", 1, 10, "purchase"),
            ])
            .await
            .expect("insert");

        let mut q = query(1);
        q.cursor = Some(base_time() + ChronoDuration::minutes(10));
        let ids: Vec<String> = store
            .latest_events_by_project(&q)
            .await
            .expect("query")
            .into_iter()
            .map(|e| e.id)
            .collect();
        assert_eq!(ids, vec!["b", "a"]);

        let mut q = query(1);
        q.start_date = Some(base_time() + ChronoDuration::minutes(5));
        q.end_date = Some(base_time() + ChronoDuration::minutes(10));
        let ids: Vec<String> = store
            .latest_events_by_project(&q)
            .await
            .expect("query")
            .into_iter()
            .map(|e| e.id)
            .collect();
        assert_eq!(ids, vec!["c", "b"]);
    }

    #[tokio::test]
    async fn test_filters_and_limit() {
        let store = setup_store().await;
        store
            .insert_events(&[
                event("a", 1, 0, "signup"),
                event("b", 1, 1, "$$pageView"),
                event("c", 1, 2, "signup"),
            ])
            .await
            .expect("insert");

        let mut q = query(1);
        q.filter_config = FilterConfig {
            operator: FilterOperator::And,
            filters: vec![Filter {
                field: FilterField::EventName,
                operator: MatchOperator::Is,
                value: "signup".to_string(),
            }],
        };
        q.limit = 1;

        let events = store.latest_events_by_project(&q).await.expect("query");
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].id, "c");
    }

    #[tokio::test]
    async fn test_large_ids_round_trip() {
        let store = setup_store().await;
        let mut big = event("big", u64::MAX, 0, "signup");
        big.user_id = u64::MAX - 1;
        big.custom_data = Some(serde_json::json!({"plan": "pro"}));
        store.insert_events(&[big]).await.expect("insert");

        let events = store
            .latest_events_by_project(&query(u64::MAX))
            .await
            .expect("query");
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].project_id, u64::MAX);
        assert_eq!(events[0].user_id, u64::MAX - 1);
        assert_eq!(events[0].custom_data, Some(serde_json::json!({"plan": "pro"})));
    }

    #[test]
    fn test_query_builder_binds_in_order() {
        let mut q = query(9);
        q.cursor = Some(base_time());
        q.end_date = Some(base_time());
        let (sql, binds) = build_latest_events_query(&q);

        assert!(sql.contains("created_at < ?"));
        assert!(!sql.contains("created_at >= ?"));
        assert!(sql.ends_with("ORDER BY created_at DESC, id DESC LIMIT ?"));
        assert_eq!(
            binds,
            vec![
                Bind::Text("9".to_string()),
                Bind::Int(base_time().timestamp_millis()),
                Bind::Int(base_time().timestamp_millis()),
                Bind::Int(10),
            ]
        );
    }
}
