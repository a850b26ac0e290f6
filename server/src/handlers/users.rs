//! /users routes

use crate::core::{ApiResponse, AppError, AppState, ValidatedJson};
use crate::dtos::{
    ClearedListDTO, CreateItemDTO, DeletedUserDTO, InvitationDTO, ItemMutationDTO, ListDTO,
    UpdateUserDTO, UserDTO, UserGroupDTO,
};
use crate::entities::User;
use crate::handlers::upload::read_update_form;
use axum::{
    Extension,
    extract::{Multipart, Path, State},
};
use axum_macros::debug_handler;
use std::sync::Arc;
use tracing::{debug, instrument};
use validator::Validate;

#[instrument(skip(state, current_user), fields(actor = %current_user.id))]
pub async fn get_user(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<String>,
    Extension(current_user): Extension<User>,
) -> Result<ApiResponse<UserDTO>, AppError> {
    let user = state.users.get_user(&current_user, &user_id).await?;
    Ok(ApiResponse::ok(user, "User retrieved"))
}

/// Multipart: optional `first_name`, `last_name` and a `profile_pic` file.
#[debug_handler]
#[instrument(skip(state, current_user, multipart), fields(actor = %current_user.id))]
pub async fn update_user(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<String>,
    Extension(current_user): Extension<User>,
    multipart: Multipart,
) -> Result<ApiResponse<UserDTO>, AppError> {
    let form = read_update_form(multipart, &["first_name", "last_name"], "profile_pic").await?;
    let data = UpdateUserDTO {
        first_name: form.text("first_name"),
        last_name: form.text("last_name"),
    };
    data.validate()?;
    debug!(picture = form.file.is_some(), "Profile update parsed");

    let user = state
        .users
        .update_user(&current_user, &user_id, data, form.file)
        .await?;
    Ok(ApiResponse::ok(user, "Profile updated"))
}

#[instrument(skip(state, current_user), fields(actor = %current_user.id))]
pub async fn delete_user(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<String>,
    Extension(current_user): Extension<User>,
) -> Result<ApiResponse<DeletedUserDTO>, AppError> {
    let deleted = state.users.delete_user(&current_user, &user_id).await?;
    Ok(ApiResponse::ok(deleted, "Account deleted"))
}

#[instrument(skip(state, current_user), fields(actor = %current_user.id))]
pub async fn get_groups(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<String>,
    Extension(current_user): Extension<User>,
) -> Result<ApiResponse<Vec<UserGroupDTO>>, AppError> {
    let groups = state.users.get_groups(&current_user, &user_id).await?;
    Ok(ApiResponse::ok(groups, "Groups retrieved"))
}

#[instrument(skip(state, current_user), fields(actor = %current_user.id))]
pub async fn get_list(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<String>,
    Extension(current_user): Extension<User>,
) -> Result<ApiResponse<ListDTO>, AppError> {
    let list = state.users.get_list(&current_user, &user_id).await?;
    Ok(ApiResponse::ok(list, "List retrieved"))
}

#[instrument(skip(state, current_user, body), fields(actor = %current_user.id))]
pub async fn add_item(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<String>,
    Extension(current_user): Extension<User>,
    ValidatedJson(body): ValidatedJson<CreateItemDTO>,
) -> Result<ApiResponse<ItemMutationDTO>, AppError> {
    let result = state.users.add_item(&current_user, &user_id, body).await?;
    Ok(ApiResponse::created(result, "Item added"))
}

#[instrument(skip(state, current_user), fields(actor = %current_user.id))]
pub async fn clear_list(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<String>,
    Extension(current_user): Extension<User>,
) -> Result<ApiResponse<ClearedListDTO>, AppError> {
    let result = state.users.clear_list(&current_user, &user_id).await?;
    Ok(ApiResponse::ok(result, "List cleared"))
}

#[instrument(skip(state, current_user), fields(actor = %current_user.id))]
pub async fn received_invitations(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<String>,
    Extension(current_user): Extension<User>,
) -> Result<ApiResponse<Vec<InvitationDTO>>, AppError> {
    let invitations = state
        .users
        .received_invitations(&current_user, &user_id)
        .await?;
    Ok(ApiResponse::ok(invitations, "Pending invitations retrieved"))
}

#[instrument(skip(state, current_user), fields(actor = %current_user.id))]
pub async fn sent_invitations(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<String>,
    Extension(current_user): Extension<User>,
) -> Result<ApiResponse<Vec<InvitationDTO>>, AppError> {
    let invitations = state.users.sent_invitations(&current_user, &user_id).await?;
    Ok(ApiResponse::ok(invitations, "Sent invitations retrieved"))
}
