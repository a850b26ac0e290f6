//! Routes committed domain events to live connections.

use crate::dtos::WsFrame;
use crate::events::{DomainEvent, EventBus};
use crate::ws::groupmap::GroupMap;
use crate::ws::usermap::{InternalSignal, UserMap};
use std::sync::Arc;
use tracing::{debug, instrument};

pub struct RealtimeBridge {
    users: Arc<UserMap>,
    groups: Arc<GroupMap>,
}

impl RealtimeBridge {
    pub fn new(users: Arc<UserMap>, groups: Arc<GroupMap>) -> Self {
        Self { users, groups }
    }
}

impl EventBus for RealtimeBridge {
    #[instrument(skip(self, event), fields(event = event.name()))]
    fn publish(&self, event: DomainEvent) {
        debug!("Delivering event");
        let frame = Arc::new(WsFrame::new(event));
        match &frame.event {
            DomainEvent::InvitationReceived(notice) => {
                self.users.send_if_online(
                    &notice.recipient_id,
                    InternalSignal::Notify(frame.clone()),
                );
            }
            DomainEvent::InvitationStatusUpdated(notice) => {
                self.users.send_if_online(
                    &notice.recipient_id,
                    InternalSignal::Notify(frame.clone()),
                );
            }
            DomainEvent::ListItemAdded(notice)
            | DomainEvent::ListItemUpdated(notice)
            | DomainEvent::ListItemDeleted(notice) => {
                self.groups.send(notice.group_id, frame.clone());
            }
            DomainEvent::ListCleared(notice) => {
                self.groups.send(notice.group_id, frame.clone());
            }
            DomainEvent::GroupMemberJoined(notice) => {
                self.users
                    .send_if_online(&notice.user_id, InternalSignal::AddGroup(notice.group_id));
                self.groups.send(notice.group_id, frame.clone());
            }
            DomainEvent::GroupMemberLeft(notice) => {
                self.users
                    .send_if_online(&notice.user_id, InternalSignal::RemoveGroup(notice.group_id));
                self.groups.send(notice.group_id, frame.clone());
            }
            DomainEvent::GroupDisbanded(notice) => {
                self.groups.send(notice.group_id, frame.clone());
                self.groups.close(notice.group_id);
                for user_id in &notice.member_ids {
                    self.users
                        .send_if_online(user_id, InternalSignal::RemoveGroup(notice.group_id));
                }
            }
        }
    }
}
