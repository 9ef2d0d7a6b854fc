//! Event filter configuration.
//!
//! A [`FilterConfig`] arrives with the listing request and is handed to the
//! event store untouched. Stores that speak SQL turn it into a parameterized
//! `WHERE` fragment with [`FilterConfig::to_sql`]; user-supplied values are
//! never interpolated into the statement text.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::error::{EventsError, EventsResult};

/// Maximum number of filters accepted in one request.
pub const MAX_FILTERS: usize = 20;

/// Maximum length of a single filter value.
pub const MAX_FILTER_VALUE_LEN: usize = 512;

/// How individual filters are combined.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum FilterOperator {
    /// Every filter must match
    #[default]
    And,
    /// At least one filter must match
    Or,
}

/// Event attribute a filter applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub enum FilterField {
    /// Event name
    EventName,
    /// Page path
    Pathname,
    /// Page origin
    Origin,
    /// Referring host
    Referrer,
    /// ISO country code
    CountryCode,
    /// Operating system
    OsName,
    /// Browser or client
    ClientName,
    /// Device class
    DeviceType,
    /// User identifier
    UserId,
}

/// String comparison applied by a filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub enum MatchOperator {
    /// Exact match
    Is,
    /// Anything but an exact match
    IsNot,
    /// Substring match
    Contains,
    /// No substring match
    NotContains,
    /// Prefix match
    StartsWith,
    /// Suffix match
    EndsWith,
}

/// A single predicate over one event attribute.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct Filter {
    /// Attribute to test
    pub field: FilterField,
    /// Comparison to apply
    pub operator: MatchOperator,
    /// Value compared against
    pub value: String,
}

/// Filter predicates for an event listing. An empty list matches every event.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct FilterConfig {
    /// How `filters` are combined
    #[serde(default)]
    pub operator: FilterOperator,
    /// Individual predicates
    #[serde(default)]
    pub filters: Vec<Filter>,
}

/// SQL flavor a predicate is rendered for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SqlDialect {
    /// Positional `?` placeholders, explicit `ESCAPE` clause
    Sqlite,
    /// Named `{name:String}` placeholders bound through `param_<name>`
    ClickHouse,
}

/// A rendered `WHERE` fragment plus the values bound to its placeholders.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SqlPredicate {
    /// Parenthesized boolean expression
    pub clause: String,
    /// `(name, value)` pairs in placeholder order
    pub params: Vec<(String, String)>,
}

impl FilterConfig {
    /// Checks size limits on the filter list.
    ///
    /// # Errors
    ///
    /// Returns a validation error for too many filters or empty/oversized values.
    pub fn validate(&self) -> EventsResult<()> {
        if self.filters.len() > MAX_FILTERS {
            return Err(EventsError::validation(format!(
                "filterConfig accepts at most {MAX_FILTERS} filters, got {}",
                self.filters.len()
            )));
        }

        for (index, filter) in self.filters.iter().enumerate() {
            if filter.value.is_empty() {
                return Err(EventsError::validation(format!(
                    "filters[{index}].value must not be empty"
                )));
            }
            if filter.value.chars().count() > MAX_FILTER_VALUE_LEN {
                return Err(EventsError::validation(format!(
                    "filters[{index}].value exceeds {MAX_FILTER_VALUE_LEN} characters"
                )));
            }
        }

        Ok(())
    }

    /// Returns `true` when no filters are set.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.filters.is_empty()
    }

    /// Renders the filters as a SQL predicate, or `None` when there are none.
    ///
    /// Placeholders are named `{prefix}{index}` so the fragment can be combined
    /// with other named parameters in the same statement.
    #[must_use]
    pub fn to_sql(&self, dialect: SqlDialect, prefix: &str) -> Option<SqlPredicate> {
        if self.filters.is_empty() {
            return None;
        }

        let mut params = Vec::with_capacity(self.filters.len());
        let mut parts = Vec::with_capacity(self.filters.len());

        for (index, filter) in self.filters.iter().enumerate() {
            let name = format!("{prefix}{index}");
            let placeholder = match dialect {
                SqlDialect::Sqlite => "?".to_string(),
                SqlDialect::ClickHouse => format!("{{{name}:String}}"),
            };
            let column = format!("COALESCE({}, '')", column_for(filter.field, dialect));
            let escape = match dialect {
                SqlDialect::Sqlite => " ESCAPE '\\'",
                SqlDialect::ClickHouse => "",
            };

            let (sql, value) = match filter.operator {
                MatchOperator::Is => (format!("{column} = {placeholder}"), filter.value.clone()),
                MatchOperator::IsNot => (format!("{column} != {placeholder}"), filter.value.clone()),
                MatchOperator::Contains => (
                    format!("{column} LIKE {placeholder}{escape}"),
                    format!("%{}%", escape_like(&filter.value)),
                ),
                MatchOperator::NotContains => (
                    format!("{column} NOT LIKE {placeholder}{escape}"),
                    format!("%{}%", escape_like(&filter.value)),
                ),
                MatchOperator::StartsWith => (
                    format!("{column} LIKE {placeholder}{escape}"),
                    format!("{}%", escape_like(&filter.value)),
                ),
                MatchOperator::EndsWith => (
                    format!("{column} LIKE {placeholder}{escape}"),
                    format!("%{}", escape_like(&filter.value)),
                ),
            };

            parts.push(sql);
            params.push((name, value));
        }

        let joiner = match self.operator {
            FilterOperator::And => " AND ",
            FilterOperator::Or => " OR ",
        };

        Some(SqlPredicate {
            clause: format!("({})", parts.join(joiner)),
            params,
        })
    }
}

fn column_for(field: FilterField, dialect: SqlDialect) -> &'static str {
    match field {
        FilterField::EventName => "name",
        FilterField::Pathname => "pathname",
        FilterField::Origin => "origin",
        FilterField::Referrer => "referrer",
        FilterField::CountryCode => "country_code",
        FilterField::OsName => "os_name",
        FilterField::ClientName => "client_name",
        FilterField::DeviceType => "device_type",
        // ClickHouse keeps ids as UInt64; SQLite already stores them as text.
        FilterField::UserId => match dialect {
            SqlDialect::Sqlite => "user_id",
            SqlDialect::ClickHouse => "toString(user_id)",
        },
    }
}

fn escape_like(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        if matches!(c, '\\' | '%' | '_') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}
