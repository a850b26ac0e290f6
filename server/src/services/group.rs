//! Group lifecycle: reads, list writes, leave and disband.

use crate::core::{AppError, Database, UnitOfWork};
use crate::dtos::{
    ClearedListDTO, CreateItemDTO, DisbandGroupDTO, GroupDTO, GroupMembersDTO, InviteHistoryDTO,
    ItemMutationDTO, LeaveGroupDTO, ListDTO, MemberDTO, UpdateGroupDTO,
};
use crate::entities::{Group, InvitationStatus, ListOwner, User};
use crate::events::{DomainEvent, EventBus, GroupDisbandedNotice, MembershipNotice};
use crate::repositories::{
    Delete, GroupRepository, InvitationRepository, ItemRepository, ListRepository,
    MembershipRepository, Read,
};
use crate::services::blob::{Bucket, LocalBlobStore, Upload};
use crate::services::{item, membership};
use sqlx::SqliteConnection;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

pub struct GroupService {
    db: Database,
    events: Arc<dyn EventBus>,
    blobs: Arc<LocalBlobStore>,
}

/// What a full disband removed.
pub(crate) struct Disbanded {
    pub members: Vec<MemberDTO>,
    pub deleted_invitations: u64,
}

impl GroupService {
    pub fn new(db: Database, events: Arc<dyn EventBus>, blobs: Arc<LocalBlobStore>) -> Self {
        Self { db, events, blobs }
    }

    #[instrument(skip(self, actor), fields(actor = %actor.id))]
    pub async fn get_details(&self, actor: &User, group_id: i64) -> Result<GroupDTO, AppError> {
        let mut conn = self.db.pool().acquire().await?;
        let group = load_group(&mut conn, group_id).await?;
        membership::require_member(&mut conn, &actor.id, group_id).await?;
        Ok(group.into())
    }

    #[instrument(skip(self, actor), fields(actor = %actor.id))]
    pub async fn get_list(&self, actor: &User, group_id: i64) -> Result<ListDTO, AppError> {
        let mut conn = self.db.pool().acquire().await?;
        load_group(&mut conn, group_id).await?;
        membership::require_member(&mut conn, &actor.id, group_id).await?;
        let list_id = group_list_id(&mut conn, group_id).await?;
        item::load_list(&mut conn, list_id).await
    }

    #[instrument(skip(self, actor), fields(actor = %actor.id))]
    pub async fn get_members(
        &self,
        actor: &User,
        group_id: i64,
    ) -> Result<GroupMembersDTO, AppError> {
        let mut conn = self.db.pool().acquire().await?;
        load_group(&mut conn, group_id).await?;
        membership::require_member(&mut conn, &actor.id, group_id).await?;
        let members = membership::list_members_of(&mut conn, group_id).await?;
        debug!("Found {} members", members.len());
        Ok(GroupMembersDTO {
            member_count: members.len(),
            members,
        })
    }

    #[instrument(skip(self, actor), fields(actor = %actor.id))]
    pub async fn invite_history(
        &self,
        actor: &User,
        group_id: i64,
    ) -> Result<InviteHistoryDTO, AppError> {
        let mut conn = self.db.pool().acquire().await?;
        load_group(&mut conn, group_id).await?;
        membership::require_member(&mut conn, &actor.id, group_id).await?;
        let invitations = InvitationRepository::by_group(&mut conn, group_id).await?;

        let count = |status: InvitationStatus| {
            invitations.iter().filter(|i| i.status == status).count()
        };
        Ok(InviteHistoryDTO {
            total_count: invitations.len(),
            pending_count: count(InvitationStatus::Pending),
            accepted_count: count(InvitationStatus::Accepted),
            declined_count: count(InvitationStatus::Declined),
            invitations,
        })
    }

    #[instrument(skip(self, actor, data), fields(actor = %actor.id))]
    pub async fn add_item(
        &self,
        actor: &User,
        group_id: i64,
        data: CreateItemDTO,
    ) -> Result<ItemMutationDTO, AppError> {
        let mut uow = self.db.begin().await?;
        load_group(uow.conn(), group_id).await?;
        membership::require_member(uow.conn(), &actor.id, group_id).await?;
        let list_id = group_list_id(uow.conn(), group_id).await?;

        let result =
            item::add_item_to_list(&mut uow, actor, list_id, &ListOwner::Group(group_id), data)
                .await?;
        uow.commit(self.events.as_ref()).await?;

        info!(item_id = result.item.id, "Item added to group list");
        Ok(result)
    }

    #[instrument(skip(self, actor), fields(actor = %actor.id))]
    pub async fn clear_list(&self, actor: &User, group_id: i64) -> Result<ClearedListDTO, AppError> {
        let mut uow = self.db.begin().await?;
        load_group(uow.conn(), group_id).await?;
        membership::require_member(uow.conn(), &actor.id, group_id).await?;
        let list_id = group_list_id(uow.conn(), group_id).await?;

        let result =
            item::clear_list_items(&mut uow, actor, list_id, &ListOwner::Group(group_id)).await?;
        uow.commit(self.events.as_ref()).await?;

        info!(deleted = result.deleted_count, "Group list cleared");
        Ok(result)
    }

    /// Renames the group and/or replaces its image.
    ///
    /// The new image is stored before the transaction and removed again if
    /// the transaction fails. The old image is removed after commit.
    #[instrument(skip(self, actor, data, image), fields(actor = %actor.id))]
    pub async fn update_group(
        &self,
        actor: &User,
        group_id: i64,
        data: UpdateGroupDTO,
        image: Option<Upload>,
    ) -> Result<GroupDTO, AppError> {
        if data.group_name.is_none() && image.is_none() {
            return Err(AppError::bad_request("Nothing to update"));
        }
        if let Some(upload) = &image {
            self.blobs.check(Bucket::GroupPics, upload)?;
        }

        {
            let mut conn = self.db.pool().acquire().await?;
            load_group(&mut conn, group_id).await?;
            membership::require_member(&mut conn, &actor.id, group_id).await?;
        }

        let new_image = match &image {
            Some(upload) => Some(
                self.blobs
                    .upload(Bucket::GroupPics, &group_id.to_string(), upload)
                    .await?,
            ),
            None => None,
        };

        let outcome = self
            .apply_group_update(actor, group_id, data.group_name.as_deref(), new_image.as_deref())
            .await;
        match outcome {
            Ok((group, old_image)) => {
                if let (Some(old), Some(_)) = (old_image, &new_image) {
                    self.blobs.delete(Bucket::GroupPics, &old).await;
                }
                info!("Group updated");
                Ok(group.into())
            }
            Err(e) => {
                if let Some(url) = &new_image {
                    self.blobs.delete(Bucket::GroupPics, url).await;
                }
                Err(e)
            }
        }
    }

    async fn apply_group_update(
        &self,
        actor: &User,
        group_id: i64,
        group_name: Option<&str>,
        group_image: Option<&str>,
    ) -> Result<(Group, Option<String>), AppError> {
        let mut uow = self.db.begin().await?;
        let current = load_group(uow.conn(), group_id).await?;
        membership::require_member(uow.conn(), &actor.id, group_id).await?;
        let updated = GroupRepository::update(uow.conn(), group_id, group_name, group_image).await?;
        uow.commit(self.events.as_ref()).await?;
        Ok((updated, current.group_image))
    }

    /// Leaves the group. A group that would keep one member or fewer is disbanded.
    #[instrument(skip(self, actor), fields(actor = %actor.id))]
    pub async fn leave_group(&self, actor: &User, group_id: i64) -> Result<LeaveGroupDTO, AppError> {
        let mut uow = self.db.begin().await?;
        let group = load_group(uow.conn(), group_id).await?;
        membership::require_member(uow.conn(), &actor.id, group_id).await?;

        let result = leave_in(&mut uow, &actor.id, &group).await?;
        uow.commit(self.events.as_ref()).await?;

        if result.remaining_members == 0 {
            if let Some(url) = &group.group_image {
                self.blobs.delete(Bucket::GroupPics, url).await;
            }
        }
        info!(remaining = result.remaining_members, "Left group");
        Ok(result)
    }

    /// Deletes the group, its list, items, invitations and memberships.
    #[instrument(skip(self, actor), fields(actor = %actor.id))]
    pub async fn disband_group(
        &self,
        actor: &User,
        group_id: i64,
    ) -> Result<DisbandGroupDTO, AppError> {
        let mut uow = self.db.begin().await?;
        let group = load_group(uow.conn(), group_id).await?;
        membership::require_member(uow.conn(), &actor.id, group_id).await?;

        let disbanded = disband_in(&mut uow, &group).await?;
        uow.commit(self.events.as_ref()).await?;

        if let Some(url) = &group.group_image {
            self.blobs.delete(Bucket::GroupPics, url).await;
        }
        info!(members = disbanded.members.len(), "Group disbanded");
        Ok(DisbandGroupDTO {
            group: group.into(),
            member_count: disbanded.members.len(),
            members: disbanded.members,
            deleted_invitations: disbanded.deleted_invitations,
            disbanded_by: actor.id.clone(),
        })
    }
}

pub(crate) async fn load_group(conn: &mut SqliteConnection, group_id: i64) -> Result<Group, AppError> {
    GroupRepository::read(conn, &group_id).await?.ok_or_else(|| {
        warn!(group_id, "Group not found");
        AppError::not_found("Group not found")
    })
}

async fn group_list_id(conn: &mut SqliteConnection, group_id: i64) -> Result<i64, AppError> {
    ListRepository::list_id_of_group(conn, group_id)
        .await?
        .ok_or_else(|| {
            warn!(group_id, "Group has no list");
            AppError::not_found("Group list not found")
        })
}

/// Removes `user_id` from `group`, disbanding it when one member or fewer would remain.
pub(crate) async fn leave_in(
    uow: &mut UnitOfWork,
    user_id: &str,
    group: &Group,
) -> Result<LeaveGroupDTO, AppError> {
    let count = membership::member_count(uow.conn(), group.id).await?;
    let remaining_members = if count - 1 <= 1 {
        debug!(group_id = group.id, count, "Last members leaving, disbanding");
        disband_in(uow, group).await?;
        0
    } else {
        membership::remove_member(uow.conn(), user_id, group.id).await?;
        uow.emit(DomainEvent::GroupMemberLeft(MembershipNotice {
            group_id: group.id,
            user_id: user_id.to_string(),
        }));
        count - 1
    };

    Ok(LeaveGroupDTO {
        group_id: group.id,
        group_name: group.group_name.clone(),
        group_code: group.group_code.clone(),
        remaining_members,
    })
}

/// Full cascade: items, list link, list, invitations, memberships, group.
pub(crate) async fn disband_in(uow: &mut UnitOfWork, group: &Group) -> Result<Disbanded, AppError> {
    let members = membership::list_members_of(uow.conn(), group.id).await?;

    if let Some(list_id) = ListRepository::list_id_of_group(uow.conn(), group.id).await? {
        let items = ItemRepository::delete_by_list(uow.conn(), list_id).await?;
        ListRepository::unlink_group(uow.conn(), group.id).await?;
        ListRepository::delete(uow.conn(), &list_id).await?;
        debug!(list_id, items, "Group list deleted");
    }
    let deleted_invitations = InvitationRepository::delete_by_group(uow.conn(), group.id).await?;
    MembershipRepository::delete_by_group(uow.conn(), group.id).await?;
    GroupRepository::delete(uow.conn(), &group.id).await?;

    uow.emit(DomainEvent::GroupDisbanded(GroupDisbandedNotice {
        group_id: group.id,
        group_name: group.group_name.clone(),
        member_ids: members.iter().map(|m| m.user_id.clone()).collect(),
    }));
    Ok(Disbanded {
        members,
        deleted_invitations,
    })
}
