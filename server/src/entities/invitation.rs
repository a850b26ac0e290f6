//! Invitation entity and its state machine.
//!
//! The database stores invitations as one flat row. In memory each invitation
//! carries an [`InvitationKind`] holding only the fields its type uses.

use super::enums::{InvitationStatus, InvitationType};
use crate::core::AppError;
use chrono::{DateTime, Utc};
use serde::Serialize;

/// Raw `invitations` row.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct InvitationRow {
    pub id: i64,
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
}

#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InvitationKind {
    /// A member invites `to_user_id` into an existing group.
    GroupInvite { to_user_id: String, group_id: i64 },
    /// One fan-out copy of a request to join `group_id`, addressed to one member.
    JoinRequest { to_user_id: String, group_id: i64 },
    /// A proposal to found a new group. `group_id` is set once accepted.
    StartGroup {
        to_user_id: String,
        group_name: String,
        group_id: Option<i64>,
    },
}

impl InvitationKind {
    pub fn invitation_type(&self) -> InvitationType {
        match self {
            InvitationKind::GroupInvite { .. } => InvitationType::GroupInvite,
            InvitationKind::JoinRequest { .. } => InvitationType::JoinRequest,
            InvitationKind::StartGroup { .. } => InvitationType::StartGroup,
        }
    }

    pub fn to_user_id(&self) -> &str {
        match self {
            InvitationKind::GroupInvite { to_user_id, .. }
            | InvitationKind::JoinRequest { to_user_id, .. }
            | InvitationKind::StartGroup { to_user_id, .. } => to_user_id,
        }
    }

    pub fn group_id(&self) -> Option<i64> {
        match self {
            InvitationKind::GroupInvite { group_id, .. }
            | InvitationKind::JoinRequest { group_id, .. } => Some(*group_id),
            InvitationKind::StartGroup { group_id, .. } => *group_id,
        }
    }

    pub fn group_name(&self) -> Option<&str> {
        match self {
            InvitationKind::StartGroup { group_name, .. } => Some(group_name),
            _ => None,
        }
    }
}

#[derive(Serialize, Debug, Clone)]
pub struct Invitation {
    pub id: i64,
    #[serde(flatten)]
    pub kind: InvitationKind,
    pub status: InvitationStatus,
    pub from_user_id: String,
    pub message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub responded_at: Option<DateTime<Utc>>,
}

/// A response a participant can give to a pending invitation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvitationAction {
    Accept,
    Decline,
    Cancel,
}

impl InvitationAction {
    pub fn target_status(self) -> InvitationStatus {
        match self {
            InvitationAction::Accept => InvitationStatus::Accepted,
            InvitationAction::Decline => InvitationStatus::Declined,
            InvitationAction::Cancel => InvitationStatus::Cancelled,
        }
    }
}

impl Invitation {
    pub fn invitation_type(&self) -> InvitationType {
        self.kind.invitation_type()
    }

    pub fn to_user_id(&self) -> &str {
        self.kind.to_user_id()
    }

    pub fn is_participant(&self, user_id: &str) -> bool {
        self.from_user_id == user_id || self.to_user_id() == user_id
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }

    /// Checks that `actor` may apply `action` at `now` and returns the
    /// resulting status.
    ///
    /// Strangers are rejected before the state is inspected, so the status of
    /// someone else's invitation is never revealed. Cancel skips the expiry
    /// check: a sender may always withdraw.
    pub fn authorize(
        &self,
        action: InvitationAction,
        actor: &str,
        now: DateTime<Utc>,
    ) -> Result<InvitationStatus, AppError> {
        if !self.is_participant(actor) {
            return Err(AppError::forbidden("You are not part of this invitation"));
        }
        if self.status.is_terminal() {
            return Err(AppError::invalid_state("Invitation is no longer pending")
                .with_details(format!("status is {:?}", self.status)));
        }
        match action {
            InvitationAction::Cancel => {
                if self.from_user_id != actor {
                    return Err(AppError::forbidden("Only the sender can cancel an invitation"));
                }
            }
            InvitationAction::Accept | InvitationAction::Decline => {
                if self.to_user_id() != actor {
                    return Err(AppError::forbidden(
                        "Only the recipient can respond to an invitation",
                    ));
                }
                if self.is_expired_at(now) {
                    return Err(AppError::expired("Invitation has expired"));
                }
            }
        }
        Ok(action.target_status())
    }
}

impl TryFrom<InvitationRow> for Invitation {
    type Error = AppError;

    fn try_from(row: InvitationRow) -> Result<Self, Self::Error> {
        let kind = match (row.kind, row.group_id, row.group_name) {
            (InvitationType::GroupInvite, Some(group_id), _) => InvitationKind::GroupInvite {
                to_user_id: row.to_user_id,
                group_id,
            },
            (InvitationType::JoinRequest, Some(group_id), _) => InvitationKind::JoinRequest {
                to_user_id: row.to_user_id,
                group_id,
            },
            (InvitationType::StartGroup, group_id, Some(group_name)) => {
                InvitationKind::StartGroup {
                    to_user_id: row.to_user_id,
                    group_name,
                    group_id,
                }
            }
            (kind, _, _) => {
                return Err(AppError::internal_server_error("Inconsistent invitation record")
                    .with_details(format!("invitation {} of type {:?}", row.id, kind)));
            }
        };

        Ok(Self {
            id: row.id,
            kind,
            status: row.status,
            from_user_id: row.from_user_id,
            message: row.message,
            created_at: row.created_at,
            expires_at: row.expires_at,
            responded_at: row.responded_at,
        })
    }
}
