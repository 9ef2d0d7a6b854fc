//! Event listing endpoint.

use axum::{
    extract::{Path, State},
    Json,
};
use chrono::Utc;
use tracing::{info, instrument};

use crate::api::extractors::ValidatedJson;
use crate::api::middleware::error::ApiError;
use crate::app_state::AppState;
use crate::pagination::{self, EventPage, ListEventsRequest};

#[utoipa::path(
    post,
    path = "/api/v1/projects/{projectId}/events/list",
    params(
        ("projectId" = String, Path, description = "Numeric project identifier")
    ),
    request_body = ListEventsRequest,
    responses(
        (status = 200, description = "One page of events, newest first", body = EventPage),
        (status = 400, description = "Malformed request or non-numeric projectId", body = crate::api::models::ErrorResponse),
        (status = 500, description = "Event store query failed", body = crate::api::models::ErrorResponse)
    ),
    tag = "Events"
)]
/// Returns one page of a project's events.
#[instrument(skip(state, request))]
pub async fn list_events(
    State(state): State<AppState>,
    Path(project_id): Path<String>,
    ValidatedJson(request): ValidatedJson<ListEventsRequest>,
) -> Result<Json<EventPage>, ApiError> {
    let project_id = pagination::parse_project_id(&project_id)?;

    let page =
        pagination::list_events(state.store.as_ref(), project_id, &request, Utc::now()).await?;

    info!(
        count = page.events.len(),
        has_more = page.next_cursor.is_some(),
        "Events listed"
    );

    Ok(Json(page))
}
