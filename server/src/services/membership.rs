//! Membership store: who belongs to which group, and who owns which list.
//!
//! Every function borrows the caller's connection, so the same checks run
//! inside a unit of work or on a pooled connection.

use crate::core::AppError;
use crate::dtos::{MemberDTO, UserGroupDTO};
use crate::entities::{ListOwner, Membership};
use crate::repositories::{Create, ListRepository, MembershipRepository, NewMembership, Read};
use sqlx::SqliteConnection;
use tracing::{debug, error, instrument, warn};

pub async fn is_member(
    conn: &mut SqliteConnection,
    user_id: &str,
    group_id: i64,
) -> Result<bool, AppError> {
    Ok(MembershipRepository::exists(conn, user_id, group_id).await?)
}

/// Fails with Forbidden unless `user_id` belongs to the group.
pub async fn require_member(
    conn: &mut SqliteConnection,
    user_id: &str,
    group_id: i64,
) -> Result<(), AppError> {
    if !is_member(conn, user_id, group_id).await? {
        warn!(user_id, group_id, "Not a member of the group");
        return Err(AppError::forbidden("You are not a member of this group"));
    }
    Ok(())
}

/// Adds a membership. An existing one is a Conflict, never a no-op.
#[instrument(skip(conn))]
pub async fn add_member(
    conn: &mut SqliteConnection,
    user_id: &str,
    group_id: i64,
) -> Result<Membership, AppError> {
    if is_member(conn, user_id, group_id).await? {
        warn!("User is already a member");
        return Err(AppError::conflict("User is already a member of this group"));
    }
    let membership =
        MembershipRepository::create(conn, &NewMembership { user_id, group_id }).await?;
    debug!("Membership created");
    Ok(membership)
}

#[instrument(skip(conn))]
pub async fn remove_member(
    conn: &mut SqliteConnection,
    user_id: &str,
    group_id: i64,
) -> Result<(), AppError> {
    if MembershipRepository::delete(conn, user_id, group_id).await? == 0 {
        warn!("Membership not found");
        return Err(AppError::not_found("Membership not found"));
    }
    debug!("Membership removed");
    Ok(())
}

pub async fn member_count(conn: &mut SqliteConnection, group_id: i64) -> Result<i64, AppError> {
    Ok(MembershipRepository::count(conn, group_id).await?)
}

pub async fn list_groups_of(
    conn: &mut SqliteConnection,
    user_id: &str,
) -> Result<Vec<UserGroupDTO>, AppError> {
    Ok(MembershipRepository::groups_of(conn, user_id).await?)
}

pub async fn list_members_of(
    conn: &mut SqliteConnection,
    group_id: i64,
) -> Result<Vec<MemberDTO>, AppError> {
    Ok(MembershipRepository::members_of(conn, group_id).await?)
}

/// The single owner of a list.
///
/// A list linked to both a user and a group breaks the ownership invariant and
/// is reported as an internal failure.
pub async fn resolve_owner(
    conn: &mut SqliteConnection,
    list_id: i64,
) -> Result<ListOwner, AppError> {
    let user = ListRepository::user_owner(conn, list_id).await?;
    let group = ListRepository::group_owner(conn, list_id).await?;
    match (user, group) {
        (Some(user_id), None) => Ok(ListOwner::User(user_id)),
        (None, Some(group_id)) => Ok(ListOwner::Group(group_id)),
        (Some(user_id), Some(group_id)) => {
            error!(list_id, user_id, group_id, "List has two owners");
            Err(AppError::internal_server_error("List ownership is inconsistent")
                .with_details(format!("list {list_id} linked to user and group")))
        }
        (None, None) => {
            warn!(list_id, "List has no owner");
            Err(AppError::not_found("List not found"))
        }
    }
}

/// Links a list to its owner. The list must not be owned yet.
#[instrument(skip(conn))]
pub async fn attach_list(
    conn: &mut SqliteConnection,
    list_id: i64,
    owner: &ListOwner,
) -> Result<(), AppError> {
    if ListRepository::read(conn, &list_id).await?.is_none() {
        return Err(AppError::not_found("List not found"));
    }
    let owned = ListRepository::user_owner(conn, list_id).await?.is_some()
        || ListRepository::group_owner(conn, list_id).await?.is_some();
    if owned {
        warn!("List already has an owner");
        return Err(AppError::conflict("List already has an owner"));
    }
    match owner {
        ListOwner::User(user_id) => ListRepository::link_user(conn, list_id, user_id).await?,
        ListOwner::Group(group_id) => ListRepository::link_group(conn, list_id, *group_id).await?,
    }
    Ok(())
}

/// Checks that `actor` may touch the list and returns its owner.
///
/// User lists are private to their owner; group lists are open to members.
pub async fn authorize_list(
    conn: &mut SqliteConnection,
    actor: &str,
    list_id: i64,
) -> Result<ListOwner, AppError> {
    let owner = resolve_owner(conn, list_id).await?;
    match &owner {
        ListOwner::User(user_id) if user_id != actor => {
            warn!(list_id, actor, "Personal list of another user");
            return Err(AppError::forbidden("You cannot access this list"));
        }
        ListOwner::Group(group_id) => require_member(conn, actor, *group_id).await?,
        ListOwner::User(_) => {}
    }
    Ok(owner)
}
