//! Event records as the store hands them back.
//!
//! Identifiers are 64-bit unsigned integers. Stores disagree on how they put
//! those on the wire (ClickHouse quotes 64-bit integers in JSON, SQLite keeps
//! them as TEXT), so decoding accepts both numbers and numeric strings.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// An analytics event owned by the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredEvent {
    /// Unique event identifier
    pub id: String,
    /// Owning project
    #[serde(deserialize_with = "lenient::deserialize")]
    pub project_id: u64,
    /// User that triggered the event
    #[serde(deserialize_with = "lenient::deserialize")]
    pub user_id: u64,
    /// Event name (e.g. "$$pageView", "signup")
    pub name: String,
    /// When the event happened, millisecond precision
    pub created_at: DateTime<Utc>,
    /// Whether this is a page view
    #[serde(default)]
    pub is_page_view: bool,
    /// Page origin
    #[serde(default)]
    pub origin: Option<String>,
    /// Page path
    #[serde(default)]
    pub pathname: Option<String>,
    /// Referring host
    #[serde(default)]
    pub referrer: Option<String>,
    /// ISO country code
    #[serde(default)]
    pub country_code: Option<String>,
    /// Operating system
    #[serde(default)]
    pub os_name: Option<String>,
    /// Browser or client
    #[serde(default)]
    pub client_name: Option<String>,
    /// Device class
    #[serde(default)]
    pub device_type: Option<String>,
    /// Free-form event properties
    #[serde(default)]
    pub custom_data: Option<serde_json::Value>,
}

/// Treats empty strings as absent. Column stores without NULLs use `''`.
pub(crate) fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}

/// Deserializes a number that may arrive either natively or as a string.
pub(crate) mod lenient {
    use serde::de::Error;
    use serde::{Deserialize, Deserializer};
    use std::fmt::Display;
    use std::str::FromStr;

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw<T> {
        Native(T),
        Text(String),
    }

    pub fn deserialize<'de, D, T>(deserializer: D) -> Result<T, D::Error>
    where
        D: Deserializer<'de>,
        T: Deserialize<'de> + FromStr,
        T::Err: Display,
    {
        match Raw::<T>::deserialize(deserializer)? {
            Raw::Native(value) => Ok(value),
            Raw::Text(text) => text.trim().parse().map_err(D::Error::custom),
        }
    }
}
