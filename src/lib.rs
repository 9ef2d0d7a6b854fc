//! # Event Pager
//!
//! Cursor-paginated, time-windowed event listings for product analytics
//! projects.
//!
//! A page holds at most [`pagination::PAGE_SIZE`] events, newest first. The
//! store is asked for one extra row; when it comes back, the page carries a
//! `nextCursor` equal to the `createdAt` of its last event, and the next
//! request returns only events strictly older than that instant.
//!
//! ## Architecture
//!
//! 1. **Config Layer** ([`config`]) - Environment variable loading
//! 2. **Query Layer** ([`timespan`], [`filter`]) - Time windows and event filters
//! 3. **Store Layer** ([`store`]) - SQLite and ClickHouse event stores
//! 4. **Pagination Layer** ([`pagination`]) - Page assembly and cursors
//! 5. **API Layer** ([`api`]) - Axum REST endpoints with OpenAPI docs
//!
//! ## Using as a Library
//!
//! ```rust,no_run
//! use chrono::Utc;
//! use event_pager::pagination::{list_events, ListEventsRequest};
//! use event_pager::store::sqlite::SqliteStore;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let store = SqliteStore::connect("sqlite:events.db").await?;
//!
//!     let page = list_events(&store, 42, &ListEventsRequest::default(), Utc::now()).await?;
//!     println!("{} events, next cursor {:?}", page.events.len(), page.next_cursor);
//!
//!     Ok(())
//! }
//! ```
//!
//! ## Error Handling
//!
//! All operations return [`error::EventsResult<T>`](error::EventsResult):
//!
//! ```rust
//! use event_pager::error::{EventsError, EventsResult};
//!
//! fn example() -> EventsResult<()> {
//!     Err(EventsError::validation("cursor is not a timestamp"))
//! }
//! ```

#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod api;
pub mod app_state;
pub mod cli;
pub mod config;
pub mod error;
pub mod filter;
pub mod observability;
pub mod pagination;
pub mod store;
pub mod timespan;
