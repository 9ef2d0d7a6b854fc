//! Custom extractors for API parameters.

use axum::async_trait;
use axum::extract::{FromRequest, Request};
use axum::Json;
use serde::de::DeserializeOwned;

use crate::api::middleware::error::ApiError;
use crate::pagination::ListEventsRequest;

/// Request bodies that carry their own schema checks.
pub trait Validate {
    /// Rejects values that deserialized fine but are still malformed.
    ///
    /// # Errors
    ///
    /// Returns a validation error describing the first problem found.
    fn validate(&self) -> crate::error::EventsResult<()>;
}

impl Validate for ListEventsRequest {
    fn validate(&self) -> crate::error::EventsResult<()> {
        Self::validate(self)
    }
}

/// JSON body that has been deserialized and validated.
///
/// Both malformed JSON and failed validation are reported as `400` with the
/// standard error body instead of axum's plain-text rejections.
pub struct ValidatedJson<T>(pub T);

#[async_trait]
impl<S, T> FromRequest<S> for ValidatedJson<T>
where
    S: Send + Sync,
    T: DeserializeOwned + Validate,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state)
            .await
            .map_err(|rejection| ApiError::BadRequest(rejection.body_text()))?;

        value.validate()?;
        Ok(Self(value))
    }
}
