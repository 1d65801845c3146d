//! JSON extractor with automatic validation using the validator crate.

use crate::errors::AppError;
use axum::extract::{FromRequest, Json, Request};
use serde::de::DeserializeOwned;
use validator::Validate;

/// JSON extractor that runs [`Validate`] on the decoded body.
///
/// Malformed JSON is rejected as [`AppError::JsonExtractorRejection`], field
/// violations as [`AppError::ValidationError`] with per-field details.
///
/// ```ignore
/// async fn search(ValidatedJson(request): ValidatedJson<SearchRequest>) -> impl IntoResponse {
///     // request.limit is already within bounds here
/// }
/// ```
pub struct ValidatedJson<T>(pub T);

impl<T, S> FromRequest<S> for ValidatedJson<T>
where
    T: DeserializeOwned + Validate,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(data) = Json::<T>::from_request(req, state).await?;
        data.validate()?;
        Ok(ValidatedJson(data))
    }
}
