//! Error types for the event query service.
//!
//! This module provides a unified error type [`EventsError`] covering every
//! failure the service can surface while loading configuration, validating a
//! listing request, or talking to the event store.
//!
//! # Design
//!
//! The error hierarchy is organized by layer:
//! - [`EventsError::ConfigError`]: Configuration and environment issues
//! - [`EventsError::ValidationError`]: Malformed requests rejected before querying
//! - [`EventsError::StoreError`]: Event store unavailability or query failures
//! - [`EventsError::DecodingError`]: Store rows that do not decode into events
//!
//! All errors implement [`std::error::Error`] and keep the underlying cause
//! available through the source chain.
//!
//! # Example
//!
//! ```
//! use event_pager::error::{EventsError, EventsResult};
//!
//! fn require_project(project_id: &str) -> EventsResult<()> {
//!     if project_id.is_empty() {
//!         return Err(EventsError::validation("projectId is required"));
//!     }
//!     Ok(())
//! }
//! ```

use std::fmt;

/// Result type alias using [`EventsError`].
pub type EventsResult<T> = Result<T, EventsError>;

/// Boxed source error carried by [`EventsError`] variants.
pub type BoxedSource = Box<dyn std::error::Error + Send + Sync>;

/// Unified error type for the event query service.
#[derive(Debug)]
pub enum EventsError {
    /// Configuration or environment variable errors.
    ///
    /// Variants include:
    /// - Invalid numeric values
    /// - Unknown store backend names
    ConfigError {
        /// Human-readable error message
        message: String,
        /// Optional underlying error
        source: Option<BoxedSource>,
    },

    /// Request validation errors.
    ///
    /// Raised by the schema layer before any store query is issued.
    ValidationError {
        /// Human-readable error message
        message: String,
    },

    /// Event store errors.
    ///
    /// Variants include:
    /// - Connection or pool failures
    /// - Query execution errors
    /// - Non-success responses from a remote store
    StoreError {
        /// Human-readable error message
        message: String,
        /// Optional underlying error
        source: Option<BoxedSource>,
    },

    /// Store row decoding errors.
    ///
    /// Variants include:
    /// - Identifiers that are not valid unsigned integers
    /// - Timestamps out of range
    /// - Malformed `customData` JSON
    DecodingError {
        /// Human-readable error message
        message: String,
        /// Optional underlying error
        source: Option<BoxedSource>,
    },
}

impl EventsError {
    /// Create a new configuration error.
    ///
    /// # Example
    ///
    /// ```
    /// use event_pager::error::EventsError;
    ///
    /// let err = EventsError::config("API_PORT must be a valid port", None);
    /// assert!(matches!(err, EventsError::ConfigError { .. }));
    /// ```
    #[must_use]
    pub fn config(message: impl Into<String>, source: Option<BoxedSource>) -> Self {
        Self::ConfigError {
            message: message.into(),
            source,
        }
    }

    /// Create a new validation error.
    ///
    /// # Example
    ///
    /// ```
    /// use event_pager::error::EventsError;
    ///
    /// let err = EventsError::validation("startDate is required");
    /// assert!(matches!(err, EventsError::ValidationError { .. }));
    /// ```
    #[must_use]
    pub fn validation(message: impl Into<String>) -> Self {
        Self::ValidationError {
            message: message.into(),
        }
    }

    /// Create a new store error.
    ///
    /// # Example
    ///
    /// ```
    /// use event_pager::error::EventsError;
    ///
    /// let err = EventsError::store("Connection refused", None);
    /// assert!(matches!(err, EventsError::StoreError { .. }));
    /// ```
    #[must_use]
    pub fn store(message: impl Into<String>, source: Option<BoxedSource>) -> Self {
        Self::StoreError {
            message: message.into(),
            source,
        }
    }

    /// Create a new decoding error.
    ///
    /// # Example
    ///
    /// ```
    /// use event_pager::error::EventsError;
    ///
    /// let err = EventsError::decoding("user_id is not a number", None);
    /// assert!(matches!(err, EventsError::DecodingError { .. }));
    /// ```
    #[must_use]
    pub fn decoding(message: impl Into<String>, source: Option<BoxedSource>) -> Self {
        Self::DecodingError {
            message: message.into(),
            source,
        }
    }

    /// Returns `true` for errors caused by the caller's input.
    #[must_use]
    pub const fn is_validation(&self) -> bool {
        matches!(self, Self::ValidationError { .. })
    }
}

impl fmt::Display for EventsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ConfigError { message, .. } => write!(f, "Configuration error: {message}"),
            Self::ValidationError { message } => write!(f, "Validation error: {message}"),
            Self::StoreError { message, .. } => write!(f, "Store error: {message}"),
            Self::DecodingError { message, .. } => write!(f, "Decoding error: {message}"),
        }
    }
}

impl std::error::Error for EventsError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::ConfigError { source, .. }
            | Self::StoreError { source, .. }
            | Self::DecodingError { source, .. } => source
                .as_ref()
                .map(|e| e.as_ref() as &dyn std::error::Error),
            Self::ValidationError { .. } => None,
        }
    }
}

/// Convert from `eyre::Report` to `EventsError`.
///
/// Used at the binary boundary where server startup failures are reported
/// through eyre. They are categorized as store errors since the server only
/// fails to start when it cannot reach or bind its resources.
impl From<eyre::Report> for EventsError {
    fn from(err: eyre::Report) -> Self {
        Self::StoreError {
            message: format!("{err:#}"),
            source: None,
        }
    }
}

impl From<sqlx::Error> for EventsError {
    fn from(err: sqlx::Error) -> Self {
        Self::StoreError {
            message: err.to_string(),
            source: Some(Box::new(err)),
        }
    }
}

impl From<reqwest::Error> for EventsError {
    fn from(err: reqwest::Error) -> Self {
        Self::StoreError {
            message: err.to_string(),
            source: Some(Box::new(err)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error;

    #[test]
    fn test_config_error() {
        let err = EventsError::config("bad port", None);
        assert!(matches!(err, EventsError::ConfigError { .. }));
        assert_eq!(err.to_string(), "Configuration error: bad port");
    }

    #[test]
    fn test_validation_error() {
        let err = EventsError::validation("cursor is not a timestamp");
        assert!(err.is_validation());
        assert_eq!(err.to_string(), "Validation error: cursor is not a timestamp");
        assert!(err.source().is_none());
    }

    #[test]
    fn test_store_error() {
        let err = EventsError::store("timeout", None);
        assert!(!err.is_validation());
        assert_eq!(err.to_string(), "Store error: timeout");
    }

    #[test]
    fn test_decoding_error() {
        let err = EventsError::decoding("invalid id", None);
        assert_eq!(err.to_string(), "Decoding error: invalid id");
    }

    #[test]
    fn test_error_with_source() {
        let source = std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "refused");
        let err = EventsError::store("failed to connect", Some(Box::new(source)));

        assert!(err.source().is_some());
        assert_eq!(err.to_string(), "Store error: failed to connect");
    }

    #[test]
    fn test_from_eyre_report() {
        let err: EventsError = eyre::eyre!("bind failed").into();
        assert!(matches!(err, EventsError::StoreError { .. }));
        assert!(err.to_string().contains("bind failed"));
    }
}
