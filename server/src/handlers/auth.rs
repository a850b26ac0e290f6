//! Profile provisioning for identities verified by the provider.

use crate::core::{ApiResponse, AppError, AppState, Identity, ValidatedJson};
use crate::dtos::{ProvisionUserDTO, UserDTO};
use crate::entities::User;
use axum::{Extension, extract::State};
use std::sync::Arc;
use tracing::{info, instrument};

#[instrument(skip(state, identity, body), fields(user_id = %identity.user_id))]
pub async fn register(
    State(state): State<Arc<AppState>>,
    Extension(identity): Extension<Identity>,
    ValidatedJson(body): ValidatedJson<ProvisionUserDTO>,
) -> Result<ApiResponse<UserDTO>, AppError> {
    let user = state.users.provision(&identity, body).await?;
    info!(user_code = %user.user_code, "Profile registered");
    Ok(ApiResponse::created(user, "Profile created"))
}

#[instrument(skip(current_user), fields(user_id = %current_user.id))]
pub async fn me(Extension(current_user): Extension<User>) -> ApiResponse<UserDTO> {
    ApiResponse::ok(UserDTO::from(current_user), "Current user")
}
