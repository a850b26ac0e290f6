//! /groups routes. All of them sit behind the group membership gate.

use crate::core::{ApiResponse, AppError, AppState, ValidatedJson};
use crate::dtos::{
    ClearedListDTO, CreateItemDTO, DisbandGroupDTO, GroupDTO, GroupMembersDTO, InviteHistoryDTO,
    ItemMutationDTO, LeaveGroupDTO, ListDTO, UpdateGroupDTO,
};
use crate::entities::User;
use crate::handlers::upload::read_update_form;
use axum::{
    Extension,
    extract::{Multipart, Path, State},
};
use axum_macros::debug_handler;
use std::sync::Arc;
use tracing::instrument;
use validator::Validate;

#[instrument(skip(state, current_user), fields(actor = %current_user.id))]
pub async fn get_group(
    State(state): State<Arc<AppState>>,
    Path(group_id): Path<i64>,
    Extension(current_user): Extension<User>,
) -> Result<ApiResponse<GroupDTO>, AppError> {
    let group = state.groups.get_details(&current_user, group_id).await?;
    Ok(ApiResponse::ok(group, "Group retrieved"))
}

/// Multipart: optional `group_name` and a `group_image` file.
#[debug_handler]
#[instrument(skip(state, current_user, multipart), fields(actor = %current_user.id))]
pub async fn update_group(
    State(state): State<Arc<AppState>>,
    Path(group_id): Path<i64>,
    Extension(current_user): Extension<User>,
    multipart: Multipart,
) -> Result<ApiResponse<GroupDTO>, AppError> {
    let form = read_update_form(multipart, &["group_name"], "group_image").await?;
    let data = UpdateGroupDTO {
        group_name: form.text("group_name"),
    };
    data.validate()?;

    let group = state
        .groups
        .update_group(&current_user, group_id, data, form.file)
        .await?;
    Ok(ApiResponse::ok(group, "Group updated"))
}

#[instrument(skip(state, current_user), fields(actor = %current_user.id))]
pub async fn disband_group(
    State(state): State<Arc<AppState>>,
    Path(group_id): Path<i64>,
    Extension(current_user): Extension<User>,
) -> Result<ApiResponse<DisbandGroupDTO>, AppError> {
    let result = state.groups.disband_group(&current_user, group_id).await?;
    Ok(ApiResponse::ok(result, "Group disbanded"))
}

#[instrument(skip(state, current_user), fields(actor = %current_user.id))]
pub async fn get_list(
    State(state): State<Arc<AppState>>,
    Path(group_id): Path<i64>,
    Extension(current_user): Extension<User>,
) -> Result<ApiResponse<ListDTO>, AppError> {
    let list = state.groups.get_list(&current_user, group_id).await?;
    Ok(ApiResponse::ok(list, "List retrieved"))
}

#[instrument(skip(state, current_user), fields(actor = %current_user.id))]
pub async fn get_members(
    State(state): State<Arc<AppState>>,
    Path(group_id): Path<i64>,
    Extension(current_user): Extension<User>,
) -> Result<ApiResponse<GroupMembersDTO>, AppError> {
    let members = state.groups.get_members(&current_user, group_id).await?;
    Ok(ApiResponse::ok(members, "Members retrieved"))
}

#[instrument(skip(state, current_user), fields(actor = %current_user.id))]
pub async fn invite_history(
    State(state): State<Arc<AppState>>,
    Path(group_id): Path<i64>,
    Extension(current_user): Extension<User>,
) -> Result<ApiResponse<InviteHistoryDTO>, AppError> {
    let history = state.groups.invite_history(&current_user, group_id).await?;
    Ok(ApiResponse::ok(history, "Invitation history retrieved"))
}

#[instrument(skip(state, current_user, body), fields(actor = %current_user.id))]
pub async fn add_item(
    State(state): State<Arc<AppState>>,
    Path(group_id): Path<i64>,
    Extension(current_user): Extension<User>,
    ValidatedJson(body): ValidatedJson<CreateItemDTO>,
) -> Result<ApiResponse<ItemMutationDTO>, AppError> {
    let result = state.groups.add_item(&current_user, group_id, body).await?;
    Ok(ApiResponse::created(result, "Item added"))
}

#[instrument(skip(state, current_user), fields(actor = %current_user.id))]
pub async fn clear_list(
    State(state): State<Arc<AppState>>,
    Path(group_id): Path<i64>,
    Extension(current_user): Extension<User>,
) -> Result<ApiResponse<ClearedListDTO>, AppError> {
    let result = state.groups.clear_list(&current_user, group_id).await?;
    Ok(ApiResponse::ok(result, "List cleared"))
}

#[instrument(skip(state, current_user), fields(actor = %current_user.id))]
pub async fn leave_group(
    State(state): State<Arc<AppState>>,
    Path(group_id): Path<i64>,
    Extension(current_user): Extension<User>,
) -> Result<ApiResponse<LeaveGroupDTO>, AppError> {
    let result = state.groups.leave_group(&current_user, group_id).await?;
    let message = if result.remaining_members == 0 {
        format!("Left {} and the group was disbanded", result.group_name)
    } else {
        format!("Left {}", result.group_name)
    };
    Ok(ApiResponse::ok(result, message))
}
