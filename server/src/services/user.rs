//! User profiles, personal lists and account deletion.

use crate::core::{AppError, Database, Identity};
use crate::dtos::{
    ClearedListDTO, CreateItemDTO, DeletedUserDTO, InvitationDTO, ItemMutationDTO, ListDTO,
    ProvisionUserDTO, UpdateUserDTO, UserDTO, UserGroupDTO,
};
use crate::entities::{ListOwner, User};
use crate::events::EventBus;
use crate::repositories::{
    Create, Delete, InvitationRepository, ItemRepository, ListRepository, MembershipRepository,
    NewUser, Read, UserRepository,
};
use crate::services::blob::{Bucket, LocalBlobStore, Upload};
use crate::services::codes::{self, CodeKind};
use crate::services::group::{leave_in, load_group};
use crate::services::{item, membership};
use sqlx::SqliteConnection;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

pub struct UserService {
    db: Database,
    events: Arc<dyn EventBus>,
    blobs: Arc<LocalBlobStore>,
}

/// Users may only act on their own account.
fn require_self(actor: &User, user_id: &str) -> Result<(), AppError> {
    if actor.id != user_id {
        warn!(actor = %actor.id, target = user_id, "Access to another user's account");
        return Err(AppError::forbidden("You can only access your own account"));
    }
    Ok(())
}

impl UserService {
    pub fn new(db: Database, events: Arc<dyn EventBus>, blobs: Arc<LocalBlobStore>) -> Self {
        Self { db, events, blobs }
    }

    /// Creates the profile of a verified identity, with its code and personal list.
    #[instrument(skip(self, identity, data), fields(user_id = %identity.user_id))]
    pub async fn provision(
        &self,
        identity: &Identity,
        data: ProvisionUserDTO,
    ) -> Result<UserDTO, AppError> {
        let email = identity.email.clone().ok_or_else(|| {
            warn!("Token carries no email");
            AppError::bad_request("Identity has no email address")
        })?;
        let first_name = data.first_name.trim();
        let last_name = data.last_name.trim();
        if first_name.is_empty() || last_name.is_empty() {
            return Err(AppError::bad_request("Names must not be blank"));
        }

        let mut uow = self.db.begin().await?;
        if UserRepository::read(uow.conn(), identity.user_id.as_str())
            .await?
            .is_some()
        {
            warn!("Profile already exists");
            return Err(AppError::conflict("Profile already exists"));
        }

        let user_code = codes::unique_code(uow.conn(), CodeKind::User).await?;
        let user = UserRepository::create(
            uow.conn(),
            &NewUser {
                id: identity.user_id.clone(),
                email,
                first_name: first_name.to_string(),
                last_name: last_name.to_string(),
                user_code,
            },
        )
        .await?;
        let list = ListRepository::insert_empty(uow.conn()).await?;
        membership::attach_list(uow.conn(), list.id, &ListOwner::User(user.id.clone())).await?;
        uow.commit(self.events.as_ref()).await?;

        info!(user_code = %user.user_code, list_id = list.id, "User provisioned");
        Ok(user.into())
    }

    #[instrument(skip(self, actor), fields(actor = %actor.id))]
    pub async fn get_user(&self, actor: &User, user_id: &str) -> Result<UserDTO, AppError> {
        require_self(actor, user_id)?;
        let mut conn = self.db.pool().acquire().await?;
        let user = UserRepository::read(&mut conn, user_id)
            .await?
            .ok_or_else(|| AppError::not_found("User not found"))?;
        Ok(user.into())
    }

    #[instrument(skip(self, actor), fields(actor = %actor.id))]
    pub async fn get_groups(
        &self,
        actor: &User,
        user_id: &str,
    ) -> Result<Vec<UserGroupDTO>, AppError> {
        require_self(actor, user_id)?;
        let mut conn = self.db.pool().acquire().await?;
        let groups = membership::list_groups_of(&mut conn, user_id).await?;
        debug!("Found {} groups", groups.len());
        Ok(groups)
    }

    #[instrument(skip(self, actor), fields(actor = %actor.id))]
    pub async fn get_list(&self, actor: &User, user_id: &str) -> Result<ListDTO, AppError> {
        require_self(actor, user_id)?;
        let mut conn = self.db.pool().acquire().await?;
        let list_id = personal_list_id(&mut conn, user_id).await?;
        item::load_list(&mut conn, list_id).await
    }

    #[instrument(skip(self, actor), fields(actor = %actor.id))]
    pub async fn received_invitations(
        &self,
        actor: &User,
        user_id: &str,
    ) -> Result<Vec<InvitationDTO>, AppError> {
        require_self(actor, user_id)?;
        let mut conn = self.db.pool().acquire().await?;
        Ok(InvitationRepository::received_pending(&mut conn, user_id).await?)
    }

    #[instrument(skip(self, actor), fields(actor = %actor.id))]
    pub async fn sent_invitations(
        &self,
        actor: &User,
        user_id: &str,
    ) -> Result<Vec<InvitationDTO>, AppError> {
        require_self(actor, user_id)?;
        let mut conn = self.db.pool().acquire().await?;
        Ok(InvitationRepository::sent(&mut conn, user_id).await?)
    }

    #[instrument(skip(self, actor, data), fields(actor = %actor.id))]
    pub async fn add_item(
        &self,
        actor: &User,
        user_id: &str,
        data: CreateItemDTO,
    ) -> Result<ItemMutationDTO, AppError> {
        require_self(actor, user_id)?;
        let mut uow = self.db.begin().await?;
        let list_id = personal_list_id(uow.conn(), user_id).await?;
        let owner = membership::authorize_list(uow.conn(), &actor.id, list_id).await?;

        let result = item::add_item_to_list(&mut uow, actor, list_id, &owner, data).await?;
        uow.commit(self.events.as_ref()).await?;

        info!(item_id = result.item.id, "Item added to personal list");
        Ok(result)
    }

    #[instrument(skip(self, actor), fields(actor = %actor.id))]
    pub async fn clear_list(&self, actor: &User, user_id: &str) -> Result<ClearedListDTO, AppError> {
        require_self(actor, user_id)?;
        let mut uow = self.db.begin().await?;
        let list_id = personal_list_id(uow.conn(), user_id).await?;
        let owner = membership::authorize_list(uow.conn(), &actor.id, list_id).await?;

        let result = item::clear_list_items(&mut uow, actor, list_id, &owner).await?;
        uow.commit(self.events.as_ref()).await?;

        info!(deleted = result.deleted_count, "Personal list cleared");
        Ok(result)
    }

    /// Updates names and/or the profile picture.
    #[instrument(skip(self, actor, data, picture), fields(actor = %actor.id))]
    pub async fn update_user(
        &self,
        actor: &User,
        user_id: &str,
        data: UpdateUserDTO,
        picture: Option<Upload>,
    ) -> Result<UserDTO, AppError> {
        require_self(actor, user_id)?;
        if data.is_empty() && picture.is_none() {
            return Err(AppError::bad_request("Nothing to update"));
        }
        let first_name = data.first_name.as_deref().map(str::trim);
        let last_name = data.last_name.as_deref().map(str::trim);
        if first_name.is_some_and(str::is_empty) || last_name.is_some_and(str::is_empty) {
            return Err(AppError::bad_request("Names must not be blank"));
        }

        let new_picture = match &picture {
            Some(upload) => Some(self.blobs.upload(Bucket::ProfilePics, user_id, upload).await?),
            None => None,
        };

        let outcome = async {
            let mut uow = self.db.begin().await?;
            let current = UserRepository::read(uow.conn(), user_id)
                .await?
                .ok_or_else(|| AppError::not_found("User not found"))?;
            let updated = UserRepository::update_profile(
                uow.conn(),
                user_id,
                first_name,
                last_name,
                new_picture.as_deref(),
            )
            .await?;
            uow.commit(self.events.as_ref()).await?;
            Ok::<_, AppError>((updated, current.profile_pic))
        }
        .await;

        match outcome {
            Ok((user, old_picture)) => {
                if let (Some(old), Some(_)) = (old_picture, &new_picture) {
                    self.blobs.delete(Bucket::ProfilePics, &old).await;
                }
                info!("Profile updated");
                Ok(user.into())
            }
            Err(e) => {
                if let Some(url) = &new_picture {
                    self.blobs.delete(Bucket::ProfilePics, url).await;
                }
                Err(e)
            }
        }
    }

    /// Deletes the account.
    ///
    /// The personal list goes with it. Every group is left with the usual
    /// rule, so groups that would keep a single member are disbanded. Items
    /// the user added to group lists stay, without an author.
    #[instrument(skip(self, actor), fields(actor = %actor.id))]
    pub async fn delete_user(&self, actor: &User, user_id: &str) -> Result<DeletedUserDTO, AppError> {
        require_self(actor, user_id)?;
        let mut uow = self.db.begin().await?;
        let user = UserRepository::read(uow.conn(), user_id)
            .await?
            .ok_or_else(|| AppError::not_found("User not found"))?;

        let mut deleted_items = 0;
        if let Some(list_id) = ListRepository::list_id_of_user(uow.conn(), user_id).await? {
            deleted_items = ItemRepository::delete_by_list(uow.conn(), list_id).await?;
            ListRepository::unlink_user(uow.conn(), user_id).await?;
            ListRepository::delete(uow.conn(), &list_id).await?;
        }

        let mut groups_left = Vec::new();
        let mut orphaned_images = Vec::new();
        for group_id in MembershipRepository::group_ids_of(uow.conn(), user_id).await? {
            let group = load_group(uow.conn(), group_id).await?;
            let left = leave_in(&mut uow, user_id, &group).await?;
            if left.remaining_members == 0 {
                orphaned_images.extend(group.group_image);
            }
            groups_left.push(left);
        }

        let deleted_invitations = InvitationRepository::delete_by_user(uow.conn(), user_id).await?;
        UserRepository::delete(uow.conn(), user_id).await?;
        uow.commit(self.events.as_ref()).await?;

        if let Some(url) = &user.profile_pic {
            self.blobs.delete(Bucket::ProfilePics, url).await;
        }
        for url in &orphaned_images {
            self.blobs.delete(Bucket::GroupPics, url).await;
        }
        info!(groups = groups_left.len(), deleted_items, "Account deleted");
        Ok(DeletedUserDTO {
            user_id: user.id,
            groups_left,
            deleted_items,
            deleted_invitations,
        })
    }
}

async fn personal_list_id(conn: &mut SqliteConnection, user_id: &str) -> Result<i64, AppError> {
    ListRepository::list_id_of_user(conn, user_id)
        .await?
        .ok_or_else(|| {
            warn!(user_id, "User has no personal list");
            AppError::not_found("List not found")
        })
}
