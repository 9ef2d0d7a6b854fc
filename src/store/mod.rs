//! Event store abstraction.
//!
//! The listing endpoint never touches storage directly. It builds an
//! [`EventQuery`] and asks an [`EventStore`] for the newest matching events.
//!
//! # Backends
//!
//! - [`sqlite::SqliteStore`]: embedded SQLite via sqlx, used locally and in tests
//! - [`clickhouse::ClickHouseStore`]: ClickHouse over its HTTP interface
//!
//! Both honor the same contract: events for one project, newest first,
//! strictly older than the cursor, inside the inclusive time window, matching
//! the filter config, at most `limit` rows.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::info;

use crate::config::{Config, StoreBackend};
use crate::error::EventsResult;
use crate::filter::FilterConfig;

pub mod clickhouse;
pub mod models;
pub mod sqlite;

pub use models::StoredEvent;

/// One page request as the store sees it.
#[derive(Debug, Clone, PartialEq)]
pub struct EventQuery {
    /// Project whose events are listed
    pub project_id: u64,
    /// Maximum number of rows to return
    pub limit: usize,
    /// Only events strictly older than this instant
    pub cursor: Option<DateTime<Utc>>,
    /// Filters passed through from the request
    pub filter_config: FilterConfig,
    /// Inclusive lower bound
    pub start_date: Option<DateTime<Utc>>,
    /// Inclusive upper bound
    pub end_date: Option<DateTime<Utc>>,
}

/// Read access to stored analytics events.
#[async_trait]
pub trait EventStore: Send + Sync {
    /// Short backend identifier for logs and health output.
    fn backend_name(&self) -> &'static str;

    /// Returns up to `query.limit` events for the project, newest first.
    ///
    /// # Errors
    ///
    /// Returns a store error when the backend is unreachable or the query fails.
    async fn latest_events_by_project(&self, query: &EventQuery) -> EventsResult<Vec<StoredEvent>>;

    /// Verifies the backend answers queries.
    ///
    /// # Errors
    ///
    /// Returns a store error when the backend does not respond.
    async fn health_check(&self) -> EventsResult<()>;
}

/// Opens the store selected by the configuration.
///
/// # Errors
///
/// Returns an error when the SQLite pool cannot be created or the ClickHouse
/// client cannot be built.
pub async fn connect(config: &Config) -> EventsResult<Arc<dyn EventStore>> {
    let store: Arc<dyn EventStore> = match config.backend() {
        StoreBackend::Sqlite => Arc::new(sqlite::SqliteStore::connect(config.database_url()).await?),
        StoreBackend::ClickHouse => {
            Arc::new(clickhouse::ClickHouseStore::new(config.clickhouse().clone())?)
        }
    };

    info!(backend = store.backend_name(), "Event store ready");
    Ok(store)
}
