//! Configuration management for the event query service.
//!
//! This module handles loading and validating configuration from environment variables
//! using the `dotenvy` crate. All operations return [`EventsResult`] for comprehensive
//! error handling.
//!
//! ## Environment Variables
//!
//! Optional (with defaults):
//! - `EVENT_STORE`: Store backend, `sqlite` or `clickhouse` (default: sqlite)
//! - `DATABASE_URL`: SQLite database URL (default: "sqlite:./events.db")
//! - `CLICKHOUSE_URL`: ClickHouse HTTP endpoint (default: "http://localhost:8123")
//! - `CLICKHOUSE_USER`: ClickHouse user (default: "default")
//! - `CLICKHOUSE_PASSWORD`: ClickHouse password (default: empty)
//! - `CLICKHOUSE_DATABASE`: ClickHouse database (default: "default")
//! - `API_PORT`: HTTP listen port (default: 3000)
//! - `RATE_LIMIT_RPM`: Global request quota per minute (default: 600)
//! - `CORS_ORIGINS`: Comma-separated allowed origins (default: "*")
//! - `RUST_LOG`: Logging level (default: "info")
//!
//! ## Example
//!
//! ```no_run
//! use event_pager::config::Config;
//! use event_pager::error::EventsResult;
//!
//! # fn main() -> EventsResult<()> {
//! let config = Config::from_env()?;
//! println!("Serving on port {}", config.api_port());
//! # Ok(())
//! # }
//! ```

use crate::error::{EventsError, EventsResult};
use std::env;
use std::str::FromStr;

/// Which event store backend the service talks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    /// Embedded SQLite database via sqlx.
    Sqlite,
    /// Remote ClickHouse server over its HTTP interface.
    ClickHouse,
}

impl FromStr for StoreBackend {
    type Err = EventsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "sqlite" => Ok(Self::Sqlite),
            "clickhouse" => Ok(Self::ClickHouse),
            other => Err(EventsError::config(
                format!("EVENT_STORE must be 'sqlite' or 'clickhouse', got: {other}"),
                None,
            )),
        }
    }
}

/// Connection settings for the ClickHouse backend.
#[derive(Debug, Clone)]
pub struct ClickHouseSettings {
    /// HTTP endpoint, e.g. `http://localhost:8123`
    pub url: String,
    /// User for basic auth
    pub user: String,
    /// Password for basic auth
    pub password: String,
    /// Database holding the `events` table
    pub database: String,
}

/// Main configuration struct for the service.
///
/// Contains all runtime configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Selected store backend
    backend: StoreBackend,

    /// SQLite database URL
    database_url: String,

    /// ClickHouse connection settings
    clickhouse: ClickHouseSettings,

    /// HTTP listen port
    api_port: u16,

    /// Requests per minute allowed across the API
    rate_limit_rpm: u32,

    /// Allowed CORS origins
    cors_origins: Vec<String>,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// This function:
    /// 1. Loads `.env` file using `dotenvy` (if present)
    /// 2. Reads and validates all environment variables
    /// 3. Applies defaults for optional variables
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - `EVENT_STORE` names an unknown backend
    /// - Numeric variables are not valid numbers
    /// - `CLICKHOUSE_URL` is not an http(s) URL
    pub fn from_env() -> EventsResult<Self> {
        // Load .env file if present (ignore error if file doesn't exist)
        dotenvy::dotenv().ok();

        let backend = env::var("EVENT_STORE")
            .unwrap_or_else(|_| "sqlite".to_string())
            .parse::<StoreBackend>()?;

        let database_url =
            env::var("DATABASE_URL").unwrap_or_else(|_| "sqlite:./events.db".to_string());

        let clickhouse_url =
            env::var("CLICKHOUSE_URL").unwrap_or_else(|_| "http://localhost:8123".to_string());

        if !clickhouse_url.starts_with("http://") && !clickhouse_url.starts_with("https://") {
            return Err(EventsError::config(
                format!("CLICKHOUSE_URL must be an http(s) URL, got: {clickhouse_url}"),
                None,
            ));
        }

        let clickhouse = ClickHouseSettings {
            url: clickhouse_url,
            user: env::var("CLICKHOUSE_USER").unwrap_or_else(|_| "default".to_string()),
            password: env::var("CLICKHOUSE_PASSWORD").unwrap_or_default(),
            database: env::var("CLICKHOUSE_DATABASE").unwrap_or_else(|_| "default".to_string()),
        };

        let api_port = env::var("API_PORT")
            .unwrap_or_else(|_| "3000".to_string())
            .parse::<u16>()
            .map_err(|e| {
                EventsError::config("API_PORT must be a valid port number", Some(Box::new(e)))
            })?;

        let rate_limit_rpm = env::var("RATE_LIMIT_RPM")
            .unwrap_or_else(|_| "600".to_string())
            .parse::<u32>()
            .map_err(|e| {
                EventsError::config("RATE_LIMIT_RPM must be a valid number", Some(Box::new(e)))
            })?;

        // Optional: CORS origins (default: any)
        let cors_origins =
            parse_origins(&env::var("CORS_ORIGINS").unwrap_or_else(|_| "*".to_string()));

        Ok(Self {
            backend,
            database_url,
            clickhouse,
            api_port,
            rate_limit_rpm,
            cors_origins,
        })
    }

    /// Get the selected store backend.
    #[must_use]
    pub const fn backend(&self) -> StoreBackend {
        self.backend
    }

    /// Get the SQLite database URL.
    #[must_use]
    pub fn database_url(&self) -> &str {
        &self.database_url
    }

    /// Get the ClickHouse connection settings.
    #[must_use]
    pub const fn clickhouse(&self) -> &ClickHouseSettings {
        &self.clickhouse
    }

    /// Get the HTTP listen port.
    #[must_use]
    pub const fn api_port(&self) -> u16 {
        self.api_port
    }

    /// Get the global rate limit in requests per minute.
    #[must_use]
    pub const fn rate_limit_rpm(&self) -> u32 {
        self.rate_limit_rpm
    }

    /// Get the allowed CORS origins.
    #[must_use]
    pub fn cors_origins(&self) -> &[String] {
        &self.cors_origins
    }
}

fn parse_origins(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|o| !o.is_empty())
        .map(ToString::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const VARS: [&str; 5] = [
        "EVENT_STORE",
        "CLICKHOUSE_URL",
        "API_PORT",
        "RATE_LIMIT_RPM",
        "CORS_ORIGINS",
    ];

    fn clear_env() {
        for var in VARS {
            env::remove_var(var);
        }
    }

    #[test]
    fn test_store_backend_parsing() {
        assert_eq!("sqlite".parse::<StoreBackend>().ok(), Some(StoreBackend::Sqlite));
        assert_eq!(
            " ClickHouse ".parse::<StoreBackend>().ok(),
            Some(StoreBackend::ClickHouse)
        );
        assert!("postgres".parse::<StoreBackend>().is_err());
    }

    #[test]
    fn test_parse_origins() {
        assert_eq!(
            parse_origins("https://a.example, https://b.example,,"),
            vec!["https://a.example".to_string(), "https://b.example".to_string()]
        );
        assert!(parse_origins("").is_empty());
    }

    // Environment-mutating cases share one test so they cannot race each other.
    #[test]
    fn test_config_from_env() {
        clear_env();

        let config = Config::from_env();
        assert!(config.is_ok());
        if let Ok(config) = config {
            assert_eq!(config.backend(), StoreBackend::Sqlite);
            assert_eq!(config.api_port(), 3000);
            assert_eq!(config.rate_limit_rpm(), 600);
            assert_eq!(config.cors_origins(), ["*".to_string()]);
        }

        env::set_var("API_PORT", "not-a-port");
        assert!(Config::from_env().is_err());
        env::remove_var("API_PORT");

        env::set_var("CLICKHOUSE_URL", "localhost:8123");
        assert!(Config::from_env().is_err());
        env::remove_var("CLICKHOUSE_URL");

        env::set_var("EVENT_STORE", "clickhouse");
        env::set_var("CORS_ORIGINS", "https://app.example");
        let config = Config::from_env();
        assert!(config.is_ok());
        if let Ok(config) = config {
            assert_eq!(config.backend(), StoreBackend::ClickHouse);
            assert_eq!(config.cors_origins(), ["https://app.example".to_string()]);
        }

        clear_env();
    }
}
