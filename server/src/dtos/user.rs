//! User DTOs

use crate::entities::User;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

/// Full profile, returned only to its owner.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct UserDTO {
    pub id: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub user_code: String,
    pub profile_pic: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<User> for UserDTO {
    fn from(value: User) -> Self {
        Self {
            id: value.id,
            email: value.email,
            first_name: value.first_name,
            last_name: value.last_name,
            user_code: value.user_code,
            profile_pic: value.profile_pic,
            created_at: value.created_at,
            updated_at: value.updated_at,
        }
    }
}

/// Public identity snippet attached to items and invitations.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct UserSnippet {
    pub id: String,
    pub first_name: String,
    pub last_name: String,
    pub user_code: String,
}

impl From<&User> for UserSnippet {
    fn from(value: &User) -> Self {
        Self {
            id: value.id.clone(),
            first_name: value.first_name.clone(),
            last_name: value.last_name.clone(),
            user_code: value.user_code.clone(),
        }
    }
}

/// Body of `POST /auth/register`. Identity comes from the bearer token.
#[derive(Serialize, Deserialize, Debug, Clone, Validate)]
pub struct ProvisionUserDTO {
    #[validate(length(min = 1, max = 100, message = "first_name must be 1-100 characters"))]
    pub first_name: String,
    #[validate(length(min = 1, max = 100, message = "last_name must be 1-100 characters"))]
    pub last_name: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, Validate)]
pub struct UpdateUserDTO {
    #[validate(length(min = 1, max = 100, message = "first_name must be 1-100 characters"))]
    pub first_name: Option<String>,
    #[validate(length(min = 1, max = 100, message = "last_name must be 1-100 characters"))]
    pub last_name: Option<String>,
}

impl UpdateUserDTO {
    pub fn is_empty(&self) -> bool {
        self.first_name.is_none() && self.last_name.is_none()
    }
}

/// A group as seen from one of its members.
#[derive(Serialize, Deserialize, Debug, Clone, sqlx::FromRow)]
pub struct UserGroupDTO {
    pub id: i64,
    pub group_name: String,
    pub group_code: String,
    pub group_image: Option<String>,
    pub member_count: i64,
    pub joined_at: DateTime<Utc>,
}

/// Result of deleting an account.
#[derive(Serialize, Debug, Clone)]
pub struct DeletedUserDTO {
    pub user_id: String,
    pub groups_left: Vec<crate::dtos::LeaveGroupDTO>,
    pub deleted_items: u64,
    pub deleted_invitations: u64,
}
