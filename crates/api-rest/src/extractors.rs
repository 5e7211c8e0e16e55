//! Request extractors.

use crate::error::ApiError;
use async_trait::async_trait;
use axum::extract::{FromRequest, Request};
use axum::Json;
use serde::de::DeserializeOwned;
use validator::Validate;

/// JSON extractor that runs `validator` checks before the handler sees the
/// payload.
pub struct ValidatedJson<T>(pub T);

#[async_trait]
impl<T, S> FromRequest<S> for ValidatedJson<T>
where
    T: DeserializeOwned + Validate,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state)
            .await
            .map_err(|err| ApiError::BadRequest(err.to_string()))?;

        value
            .validate()
            .map_err(|err| ApiError::Validation(err.to_string()))?;

        Ok(Self(value))
    }
}
