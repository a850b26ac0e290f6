use crate::core::AppError;
use axum::{
    Json,
    extract::{FromRequest, Request},
};
use serde::de::DeserializeOwned;
use tracing::warn;
use validator::Validate;

/// JSON body that is deserialized and validated before reaching the handler.
/// Both failures surface as `BadRequest` in the uniform envelope.
pub struct ValidatedJson<T>(pub T);

impl<T, S> FromRequest<S> for ValidatedJson<T>
where
    T: DeserializeOwned + Validate,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state).await.map_err(|rejection| {
            warn!("Rejected request body: {}", rejection.body_text());
            AppError::bad_request("Invalid request body").with_details(rejection.body_text())
        })?;
        value.validate()?;
        Ok(ValidatedJson(value))
    }
}
