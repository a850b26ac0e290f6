//! /items routes

use crate::core::{ApiResponse, AppError, AppState, ValidatedJson};
use crate::dtos::{ItemDTO, ItemMutationDTO, UpdateItemDTO, UpdateItemStatusDTO};
use crate::entities::User;
use axum::{
    Extension,
    extract::{Path, State},
};
use std::sync::Arc;
use tracing::instrument;

#[instrument(skip(state, current_user), fields(actor = %current_user.id))]
pub async fn get_item(
    State(state): State<Arc<AppState>>,
    Path(item_id): Path<i64>,
    Extension(current_user): Extension<User>,
) -> Result<ApiResponse<ItemDTO>, AppError> {
    let item = state.items.get_item(&current_user, item_id).await?;
    Ok(ApiResponse::ok(item, "Item retrieved"))
}

#[instrument(skip(state, current_user, body), fields(actor = %current_user.id))]
pub async fn update_item(
    State(state): State<Arc<AppState>>,
    Path(item_id): Path<i64>,
    Extension(current_user): Extension<User>,
    ValidatedJson(body): ValidatedJson<UpdateItemDTO>,
) -> Result<ApiResponse<ItemMutationDTO>, AppError> {
    let result = state
        .items
        .update_details(&current_user, item_id, body)
        .await?;
    Ok(ApiResponse::ok(result, "Item updated"))
}

#[instrument(skip(state, current_user, body), fields(actor = %current_user.id))]
pub async fn update_item_status(
    State(state): State<Arc<AppState>>,
    Path(item_id): Path<i64>,
    Extension(current_user): Extension<User>,
    ValidatedJson(body): ValidatedJson<UpdateItemStatusDTO>,
) -> Result<ApiResponse<ItemMutationDTO>, AppError> {
    let result = state
        .items
        .update_status(&current_user, item_id, body.item_status)
        .await?;
    Ok(ApiResponse::ok(result, "Item status updated"))
}

#[instrument(skip(state, current_user), fields(actor = %current_user.id))]
pub async fn delete_item(
    State(state): State<Arc<AppState>>,
    Path(item_id): Path<i64>,
    Extension(current_user): Extension<User>,
) -> Result<ApiResponse<ItemMutationDTO>, AppError> {
    let result = state.items.delete_item(&current_user, item_id).await?;
    Ok(ApiResponse::ok(result, "Item deleted"))
}
