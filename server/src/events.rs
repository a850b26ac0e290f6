//! Domain events and the bus they are published on.
//!
//! Services never publish directly: they queue events on their
//! [`UnitOfWork`](crate::core::UnitOfWork), which hands them to the bus only
//! after the transaction commits.

use crate::dtos::{InvitationDTO, ItemDTO, UserSnippet};
use crate::entities::{InvitationStatus, InvitationType};
use crate::services::ledger::Totals;
use serde::Serialize;
use tracing::debug;

#[derive(Serialize, Debug, Clone)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum DomainEvent {
    InvitationReceived(InvitationNotice),
    InvitationStatusUpdated(InvitationStatusNotice),
    ListItemAdded(ListItemNotice),
    ListItemUpdated(ListItemNotice),
    ListItemDeleted(ListItemNotice),
    ListCleared(ListClearedNotice),
    GroupMemberJoined(MembershipNotice),
    GroupMemberLeft(MembershipNotice),
    GroupDisbanded(GroupDisbandedNotice),
}

impl DomainEvent {
    pub fn name(&self) -> &'static str {
        match self {
            DomainEvent::InvitationReceived(_) => "invitation_received",
            DomainEvent::InvitationStatusUpdated(_) => "invitation_status_updated",
            DomainEvent::ListItemAdded(_) => "list_item_added",
            DomainEvent::ListItemUpdated(_) => "list_item_updated",
            DomainEvent::ListItemDeleted(_) => "list_item_deleted",
            DomainEvent::ListCleared(_) => "list_cleared",
            DomainEvent::GroupMemberJoined(_) => "group_member_joined",
            DomainEvent::GroupMemberLeft(_) => "group_member_left",
            DomainEvent::GroupDisbanded(_) => "group_disbanded",
        }
    }
}

/// Addressed to `recipient_id`.
#[derive(Serialize, Debug, Clone)]
pub struct InvitationNotice {
    pub recipient_id: String,
    pub invitation: InvitationDTO,
}

/// Addressed to `recipient_id`, the party that did not act.
#[derive(Serialize, Debug, Clone)]
pub struct InvitationStatusNotice {
    pub recipient_id: String,
    pub invitation_id: i64,
    #[serde(rename = "invitation_type")]
    pub kind: InvitationType,
    pub status: InvitationStatus,
    pub group_id: Option<i64>,
    pub group_name: Option<String>,
    pub responded_by: UserSnippet,
}

/// Scoped to a group's channel.
#[derive(Serialize, Debug, Clone)]
pub struct ListItemNotice {
    pub group_id: i64,
    pub list_id: i64,
    pub item: ItemDTO,
    pub user: UserSnippet,
    pub updated_totals: Totals,
}

#[derive(Serialize, Debug, Clone)]
pub struct ListClearedNotice {
    pub group_id: i64,
    pub list_id: i64,
    pub deleted_count: u64,
    pub user: UserSnippet,
}

#[derive(Serialize, Debug, Clone)]
pub struct MembershipNotice {
    pub group_id: i64,
    pub user_id: String,
}

#[derive(Serialize, Debug, Clone)]
pub struct GroupDisbandedNotice {
    pub group_id: i64,
    pub group_name: String,
    pub member_ids: Vec<String>,
}

/// Receives committed domain events. Implementations must not block.
pub trait EventBus: Send + Sync {
    fn publish(&self, event: DomainEvent);
}

/// Discards every event. For callers without real-time delivery.
pub struct NullBus;

impl EventBus for NullBus {
    fn publish(&self, event: DomainEvent) {
        debug!(event = event.name(), "Event discarded");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn events_serialize_with_their_wire_name() {
        let event = DomainEvent::GroupMemberJoined(MembershipNotice {
            group_id: 4,
            user_id: "u-1".into(),
        });
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["type"], event.name());
        assert_eq!(value["data"]["group_id"], 4);
    }
}
