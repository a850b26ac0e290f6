//! Group DTOs

use crate::dtos::InvitationDTO;
use crate::entities::Group;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct GroupDTO {
    pub id: i64,
    pub group_name: String,
    pub group_code: String,
    pub group_image: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Group> for GroupDTO {
    fn from(value: Group) -> Self {
        Self {
            id: value.id,
            group_name: value.group_name,
            group_code: value.group_code,
            group_image: value.group_image,
            created_at: value.created_at,
            updated_at: value.updated_at,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct GroupSnippet {
    pub id: i64,
    pub group_name: String,
    pub group_code: String,
}

impl From<&Group> for GroupSnippet {
    fn from(value: &Group) -> Self {
        Self {
            id: value.id,
            group_name: value.group_name.clone(),
            group_code: value.group_code.clone(),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, Validate)]
pub struct UpdateGroupDTO {
    #[validate(length(min = 1, max = 100, message = "group_name must be 1-100 characters"))]
    pub group_name: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone, sqlx::FromRow)]
pub struct MemberDTO {
    pub user_id: String,
    pub first_name: String,
    pub last_name: String,
    pub user_code: String,
    pub profile_pic: Option<String>,
    pub joined_at: DateTime<Utc>,
}

#[derive(Serialize, Debug, Clone)]
pub struct GroupMembersDTO {
    pub members: Vec<MemberDTO>,
    pub member_count: usize,
}

#[derive(Serialize, Debug, Clone)]
pub struct InviteHistoryDTO {
    pub invitations: Vec<InvitationDTO>,
    pub total_count: usize,
    pub pending_count: usize,
    pub accepted_count: usize,
    pub declined_count: usize,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct LeaveGroupDTO {
    pub group_id: i64,
    pub group_name: String,
    pub group_code: String,
    pub remaining_members: i64,
}

#[derive(Serialize, Debug, Clone)]
pub struct DisbandGroupDTO {
    pub group: GroupDTO,
    pub members: Vec<MemberDTO>,
    pub member_count: usize,
    pub deleted_invitations: u64,
    pub disbanded_by: String,
}
