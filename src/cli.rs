//! Command-line interface for the event query service.
//!
//! # Commands
//!
//! - `serve`: Run the HTTP API
//! - `list`: Fetch one page of a project's events
//! - `import`: Load newline-delimited JSON events into the SQLite store
//!
//! # Example
//!
//! ```bash
//! # Serve the API on port 8080
//! event-pager serve --port 8080
//!
//! # Newest events of the last 7 days
//! event-pager list --project 42 --timespan 7days
//!
//! # Next page
//! event-pager list --project 42 --timespan 7days --cursor 2024-05-01T11:59:11.000Z
//! ```

use crate::api::server::run_server;
use crate::app_state::AppState;
use crate::config::{Config, StoreBackend};
use crate::error::{EventsError, EventsResult};
use crate::filter::FilterConfig;
use crate::pagination::{self, EventPage, ListEventsRequest};
use crate::store::{self, sqlite::SqliteStore, StoredEvent};
use crate::timespan::TimeSpan;
use chrono::Utc;
use clap::{Parser, Subcommand};
use colored::Colorize;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Events inserted per transaction during import.
const IMPORT_BATCH_SIZE: usize = 500;

/// Paginated event listing over an analytics event store
#[derive(Parser, Debug)]
#[command(name = "event-pager")]
#[command(about = "Cursor-paginated event listing API", long_about = None)]
#[command(version)]
struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    command: Commands,
}

/// Available commands
#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the HTTP API
    Serve {
        /// Listen port (default: API_PORT or 3000)
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Print one page of a project's events
    List {
        /// Numeric project identifier
        #[arg(long)]
        project: String,

        /// Only events strictly before this ISO timestamp
        #[arg(long)]
        cursor: Option<String>,

        /// Time span (live, 1hr, 24hrs, 7days, 30days, 3months, 6months, 1year, custom)
        #[arg(short, long, default_value = "live")]
        timespan: TimeSpan,

        /// Start date for the custom span
        #[arg(long)]
        start_date: Option<String>,

        /// End date for the custom span
        #[arg(long)]
        end_date: Option<String>,

        /// Filter config as JSON
        #[arg(short, long)]
        filter: Option<String>,

        /// Print the raw JSON page
        #[arg(long)]
        json: bool,
    },

    /// Import newline-delimited JSON events into the SQLite store
    Import {
        /// Path to the .jsonl file
        #[arg(short, long)]
        file: PathBuf,
    },
}

/// Outcome of an import run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImportSummary {
    /// Events read from the file
    pub read: u64,
    /// Events newly stored
    pub inserted: u64,
}

/// Parse CLI arguments and execute the appropriate command.
///
/// # Errors
///
/// Returns an error if:
/// - Configuration loading fails
/// - The event store cannot be reached
/// - Command execution fails
pub async fn run() -> EventsResult<()> {
    let cli = Cli::parse();
    let config = Config::from_env()?;

    match cli.command {
        Commands::Serve { port } => run_serve_command(&config, port).await,
        Commands::List {
            project,
            cursor,
            timespan,
            start_date,
            end_date,
            filter,
            json,
        } => {
            let filter_config = parse_filter(filter.as_deref())?;
            let request = ListEventsRequest {
                cursor,
                filter_config,
                timespan: Some(timespan),
                start_date,
                end_date,
            };
            run_list_command(&config, &project, &request, json).await
        }
        Commands::Import { file } => run_import_command(&config, &file).await,
    }
}

async fn run_serve_command(config: &Config, port: Option<u16>) -> EventsResult<()> {
    let store = store::connect(config).await?;
    let state = AppState::new(store);

    run_server(
        state,
        port.unwrap_or_else(|| config.api_port()),
        config.rate_limit_rpm(),
        config.cors_origins(),
    )
    .await?;

    Ok(())
}

async fn run_list_command(
    config: &Config,
    project: &str,
    request: &ListEventsRequest,
    json: bool,
) -> EventsResult<()> {
    let project_id = pagination::parse_project_id(project)?;
    request.validate()?;

    let store = store::connect(config).await?;
    let page = pagination::list_events(store.as_ref(), project_id, request, Utc::now()).await?;

    if json {
        let rendered = serde_json::to_string_pretty(&page)
            .map_err(|e| EventsError::decoding("Failed to render page", Some(Box::new(e))))?;
        println!("{rendered}");
    } else {
        print_page(&page);
    }

    Ok(())
}

async fn run_import_command(config: &Config, file: &Path) -> EventsResult<()> {
    if config.backend() != StoreBackend::Sqlite {
        return Err(EventsError::config(
            "import only supports the sqlite event store (set EVENT_STORE=sqlite)",
            None,
        ));
    }

    let store = SqliteStore::connect(config.database_url()).await?;
    let summary = import_events_file(&store, file).await?;

    println!(
        "{} Imported {} of {} events from {}",
        "✅".green(),
        summary.inserted.to_string().bold(),
        summary.read,
        file.display()
    );
    Ok(())
}

/// Reads `path` as newline-delimited JSON events and stores them in batches.
///
/// Blank lines are skipped. Events whose id already exists are left untouched.
///
/// # Errors
///
/// Returns an error if the file cannot be read, a line is not a valid event,
/// or a batch insert fails.
pub async fn import_events_file(store: &SqliteStore, path: &Path) -> EventsResult<ImportSummary> {
    let file = std::fs::File::open(path).map_err(|e| {
        EventsError::config(format!("Cannot open {}", path.display()), Some(Box::new(e)))
    })?;

    let mut summary = ImportSummary::default();
    let mut batch: Vec<StoredEvent> = Vec::with_capacity(IMPORT_BATCH_SIZE);

    for (index, line) in BufReader::new(file).lines().enumerate() {
        let line = line.map_err(|e| {
            EventsError::config(format!("Failed to read {}", path.display()), Some(Box::new(e)))
        })?;
        if line.trim().is_empty() {
            continue;
        }

        let event: StoredEvent = serde_json::from_str(&line).map_err(|e| {
            EventsError::decoding(format!("line {}: invalid event", index + 1), Some(Box::new(e)))
        })?;
        batch.push(event);
        summary.read += 1;

        if batch.len() == IMPORT_BATCH_SIZE {
            summary.inserted += store.insert_events(&batch).await?;
            batch.clear();
        }
    }

    if !batch.is_empty() {
        summary.inserted += store.insert_events(&batch).await?;
    }

    if summary.inserted < summary.read {
        warn!(
            skipped = summary.read - summary.inserted,
            "Some events already existed and were skipped"
        );
    }
    info!(read = summary.read, inserted = summary.inserted, "Import complete");

    Ok(summary)
}

fn parse_filter(raw: Option<&str>) -> EventsResult<FilterConfig> {
    raw.map_or_else(
        || Ok(FilterConfig::default()),
        |json| {
            serde_json::from_str(json).map_err(|e| {
                EventsError::validation(format!("--filter is not a valid filter config: {e}"))
            })
        },
    )
}

fn print_page(page: &EventPage) {
    if page.events.is_empty() {
        println!("{}", "No events found for this window.".yellow().bold());
        return;
    }

    for event in &page.events {
        println!(
            "{}  {:<24} user {:<20} {}",
            event.created_at.dimmed(),
            event.name.bold(),
            event.user_id.cyan(),
            event.pathname.as_deref().unwrap_or("")
        );
    }

    println!();
    match &page.next_cursor {
        Some(cursor) => println!(
            "{} {} events, more available with {} {}",
            "▶".cyan(),
            page.events.len(),
            "--cursor".bold(),
            cursor
        ),
        None => println!("{} {} events, end of listing", "■".green(), page.events.len()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use std::io::Write;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_list_command_parsing() {
        let cli = Cli::try_parse_from([
            "event-pager",
            "list",
            "--project",
            "42",
            "--timespan",
            "custom",
            "--start-date",
            "2024-05-01",
        ]);
        assert!(cli.is_ok());

        if let Ok(cli) = cli {
            match cli.command {
                Commands::List {
                    project,
                    timespan,
                    start_date,
                    end_date,
                    json,
                    ..
                } => {
                    assert_eq!(project, "42");
                    assert_eq!(timespan, TimeSpan::Custom);
                    assert_eq!(start_date.as_deref(), Some("2024-05-01"));
                    assert!(end_date.is_none());
                    assert!(!json);
                }
                _ => panic!("Expected List command"),
            }
        }
    }

    #[test]
    fn test_list_rejects_unknown_timespan() {
        let cli = Cli::try_parse_from(["event-pager", "list", "--project", "42", "-t", "2weeks"]);
        assert!(cli.is_err());
    }

    #[test]
    fn test_serve_command_with_port() {
        let cli = Cli::try_parse_from(["event-pager", "serve", "--port", "8080"]);
        assert!(matches!(
            cli.map(|c| c.command),
            Ok(Commands::Serve { port: Some(8080) })
        ));
    }

    #[test]
    fn test_parse_filter() {
        assert_eq!(parse_filter(None).ok(), Some(FilterConfig::default()));
        assert!(parse_filter(Some(r#"{"filters":[{"field":"pathname","operator":"contains","value":"docs"}]}"#)).is_ok());
        assert!(parse_filter(Some("not json")).is_err());
    }

    #[tokio::test]
    async fn test_import_events_file() {
        let store = SqliteStore::connect("sqlite::memory:")
            .await
            .expect("Failed to create store");

        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        writeln!(
            file,
            r#"{{"id":"e1","projectId":1,"userId":"9007199254740993","name":"signup","createdAt":"2024-05-01T10:00:00Z"}}"#
        )
        .expect("write");
        writeln!(file).expect("write");
        writeln!(
            file,
            r#"{{"id":"e2","projectId":"1","userId":2,"name":"$$pageView","createdAt":"2024-05-01T10:01:00Z","isPageView":true,"pathname":"/pricing"}}"#
        )
        .expect("write");
        writeln!(
            file,
            r#"{{"id":"e1","projectId":1,"userId":1,"name":"duplicate","createdAt":"2024-05-01T10:02:00Z"}}"#
        )
        .expect("write");

        let summary = import_events_file(&store, file.path()).await.expect("import");
        assert_eq!(summary, ImportSummary { read: 3, inserted: 2 });
    }

    #[tokio::test]
    async fn test_import_rejects_bad_line() {
        let store = SqliteStore::connect("sqlite::memory:")
            .await
            .expect("Failed to create store");

        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        writeln!(file, r#"{{"id":"e1"}}"#).expect("write");

        let result = import_events_file(&store, file.path()).await;
        assert!(matches!(result, Err(EventsError::DecodingError { .. })));
    }

    #[tokio::test]
    async fn test_import_rejects_non_numeric_project() {
        let store = SqliteStore::connect("sqlite::memory:")
            .await
            .expect("Failed to create store");

        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        writeln!(
            file,
            r#"{{"id":"e1","projectId":"p1","userId":1,"name":"signup","createdAt":"2024-05-01T10:00:00Z"}}"#
        )
        .expect("write");

        let result = import_events_file(&store, file.path()).await;
        assert!(matches!(result, Err(EventsError::DecodingError { .. })));
    }
}
