//! Invitation DTOs

use crate::dtos::{GroupDTO, GroupSnippet, UserSnippet};
use crate::entities::{Invitation, InvitationStatus, InvitationType};
use crate::services::codes::{GROUP_CODE_RE, USER_CODE_RE};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

/// Invitation as shown to clients, enriched with participant and group snippets.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct InvitationDTO {
    pub id: i64,
    #[serde(rename = "type")]
    pub kind: InvitationType,
    pub status: InvitationStatus,
    pub from_user_id: String,
    pub to_user_id: String,
    pub group_id: Option<i64>,
    pub group_name: Option<String>,
    pub message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub responded_at: Option<DateTime<Utc>>,
    pub from_user: Option<UserSnippet>,
    pub to_user: Option<UserSnippet>,
    pub group: Option<GroupSnippet>,
}

impl From<Invitation> for InvitationDTO {
    fn from(value: Invitation) -> Self {
        Self {
            id: value.id,
            kind: value.invitation_type(),
            status: value.status,
            to_user_id: value.to_user_id().to_string(),
            group_id: value.kind.group_id(),
            group_name: value.kind.group_name().map(str::to_string),
            from_user_id: value.from_user_id,
            message: value.message,
            created_at: value.created_at,
            expires_at: value.expires_at,
            responded_at: value.responded_at,
            from_user: None,
            to_user: None,
            group: None,
        }
    }
}

impl InvitationDTO {
    pub fn with_parties(mut self, from: &UserSnippet, to: &UserSnippet) -> Self {
        self.from_user = Some(from.clone());
        self.to_user = Some(to.clone());
        self
    }

    pub fn with_group(mut self, group: GroupSnippet) -> Self {
        if self.group_name.is_none() {
            self.group_name = Some(group.group_name.clone());
        }
        self.group = Some(group);
        self
    }
}

#[derive(Deserialize, Debug, Clone, Validate)]
pub struct SendInviteDTO {
    #[validate(regex(path = *USER_CODE_RE, message = "to_user_code must be 7 letters or digits"))]
    pub to_user_code: String,
    pub group_id: i64,
    #[validate(length(max = 500, message = "message must be at most 500 characters"))]
    pub message: Option<String>,
}

#[derive(Deserialize, Debug, Clone, Validate)]
pub struct SendRequestDTO {
    #[validate(regex(path = *GROUP_CODE_RE, message = "group_code must be 6 letters or digits"))]
    pub group_code: String,
    #[validate(length(max = 500, message = "message must be at most 500 characters"))]
    pub message: Option<String>,
}

#[derive(Deserialize, Debug, Clone, Validate)]
pub struct StartGroupDTO {
    #[validate(regex(path = *USER_CODE_RE, message = "to_user_code must be 7 letters or digits"))]
    pub to_user_code: String,
    #[validate(length(min = 1, max = 100, message = "group_name must be 1-100 characters"))]
    pub group_name: String,
    #[validate(length(max = 500, message = "message must be at most 500 characters"))]
    pub message: Option<String>,
}

/// Result of a join request: one pending copy per current member.
#[derive(Serialize, Debug, Clone)]
pub struct JoinRequestDTO {
    pub group: GroupSnippet,
    pub recipients: usize,
    pub invitations: Vec<InvitationDTO>,
}

#[derive(Serialize, Debug, Clone)]
pub struct AcceptedInvitationDTO {
    pub invitation_id: i64,
    #[serde(rename = "type")]
    pub kind: InvitationType,
    pub group: GroupDTO,
    pub joined_user_ids: Vec<String>,
    pub member_count: i64,
}

#[derive(Serialize, Debug, Clone)]
pub struct ExpiredInvitationsDTO {
    pub expired_count: u64,
}
