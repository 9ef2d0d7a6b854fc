//! OpenAPI documentation for the REST API.

use utoipa::OpenApi;

use crate::api::handlers;

/// OpenAPI documentation for the REST API.
#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::health::health_check,
        handlers::events::list_events,
    ),
    components(schemas(
        crate::api::models::HealthResponse,
        crate::api::models::HealthStatus,
        crate::api::models::ErrorResponse,
        crate::pagination::ListEventsRequest,
        crate::pagination::EventPage,
        crate::pagination::EventView,
        crate::timespan::TimeSpan,
        crate::filter::FilterConfig,
        crate::filter::FilterOperator,
        crate::filter::Filter,
        crate::filter::FilterField,
        crate::filter::MatchOperator,
    )),
    tags(
        (name = "Health", description = "Health check endpoints"),
        (name = "Events", description = "Paginated event listing"),
    ),
    info(
        title = "Event Pager API",
        version = "1.0.0",
        description = "Cursor-paginated, time-windowed event listings",
    )
)]
pub struct ApiDoc;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_openapi_lists_endpoints() {
        let doc = ApiDoc::openapi();
        assert!(doc
            .paths
            .paths
            .contains_key("/api/v1/projects/{projectId}/events/list"));
        assert!(doc.paths.paths.contains_key("/api/v1/health"));
    }
}
