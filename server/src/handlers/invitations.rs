//! /invitations routes

use crate::core::{ApiResponse, AppError, AppState, ValidatedJson};
use crate::dtos::{
    AcceptedInvitationDTO, ExpiredInvitationsDTO, InvitationDTO, JoinRequestDTO, SendInviteDTO,
    SendRequestDTO, StartGroupDTO,
};
use crate::entities::User;
use axum::{
    Extension,
    extract::{Path, State},
};
use std::sync::Arc;
use tracing::instrument;

#[instrument(skip(state, current_user, body), fields(actor = %current_user.id))]
pub async fn send_invite(
    State(state): State<Arc<AppState>>,
    Extension(current_user): Extension<User>,
    ValidatedJson(body): ValidatedJson<SendInviteDTO>,
) -> Result<ApiResponse<InvitationDTO>, AppError> {
    let invitation = state.invitations.send_invite(&current_user, body).await?;
    Ok(ApiResponse::created(invitation, "Invitation sent"))
}

#[instrument(skip(state, current_user, body), fields(actor = %current_user.id))]
pub async fn send_request(
    State(state): State<Arc<AppState>>,
    Extension(current_user): Extension<User>,
    ValidatedJson(body): ValidatedJson<SendRequestDTO>,
) -> Result<ApiResponse<JoinRequestDTO>, AppError> {
    let request = state.invitations.send_request(&current_user, body).await?;
    let message = format!("Join request sent to {} members", request.recipients);
    Ok(ApiResponse::created(request, message))
}

#[instrument(skip(state, current_user, body), fields(actor = %current_user.id))]
pub async fn start_group(
    State(state): State<Arc<AppState>>,
    Extension(current_user): Extension<User>,
    ValidatedJson(body): ValidatedJson<StartGroupDTO>,
) -> Result<ApiResponse<InvitationDTO>, AppError> {
    let invitation = state.invitations.start_group(&current_user, body).await?;
    Ok(ApiResponse::created(invitation, "Group proposal sent"))
}

#[instrument(skip(state, current_user), fields(actor = %current_user.id))]
pub async fn expire_stale(
    State(state): State<Arc<AppState>>,
    Extension(current_user): Extension<User>,
) -> Result<ApiResponse<ExpiredInvitationsDTO>, AppError> {
    let result = state.invitations.expire_stale().await?;
    Ok(ApiResponse::ok(result, "Stale invitations expired"))
}

#[instrument(skip(state, current_user), fields(actor = %current_user.id))]
pub async fn get_invitation(
    State(state): State<Arc<AppState>>,
    Path(invitation_id): Path<i64>,
    Extension(current_user): Extension<User>,
) -> Result<ApiResponse<InvitationDTO>, AppError> {
    let invitation = state
        .invitations
        .get_details(&current_user, invitation_id)
        .await?;
    Ok(ApiResponse::ok(invitation, "Invitation retrieved"))
}

#[instrument(skip(state, current_user), fields(actor = %current_user.id))]
pub async fn accept_invitation(
    State(state): State<Arc<AppState>>,
    Path(invitation_id): Path<i64>,
    Extension(current_user): Extension<User>,
) -> Result<ApiResponse<AcceptedInvitationDTO>, AppError> {
    let accepted = state.invitations.accept(&current_user, invitation_id).await?;
    let message = format!(
        "Invitation accepted. {} now has {} members",
        accepted.group.group_name, accepted.member_count
    );
    Ok(ApiResponse::ok(accepted, message))
}

#[instrument(skip(state, current_user), fields(actor = %current_user.id))]
pub async fn decline_invitation(
    State(state): State<Arc<AppState>>,
    Path(invitation_id): Path<i64>,
    Extension(current_user): Extension<User>,
) -> Result<ApiResponse<InvitationDTO>, AppError> {
    let invitation = state.invitations.decline(&current_user, invitation_id).await?;
    Ok(ApiResponse::ok(invitation, "Invitation declined"))
}

#[instrument(skip(state, current_user), fields(actor = %current_user.id))]
pub async fn cancel_invitation(
    State(state): State<Arc<AppState>>,
    Path(invitation_id): Path<i64>,
    Extension(current_user): Extension<User>,
) -> Result<ApiResponse<InvitationDTO>, AppError> {
    let invitation = state.invitations.cancel(&current_user, invitation_id).await?;
    Ok(ApiResponse::ok(invitation, "Invitation cancelled"))
}
