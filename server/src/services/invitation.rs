//! Invitation workflow.
//!
//! Three kinds share one lifecycle, PENDING followed by exactly one terminal
//! state. Transition rules live on [`Invitation::authorize`]; this service
//! applies their side effects inside a single unit of work and queues the
//! resulting events.

use crate::core::{AppError, Database, UnitOfWork};
use crate::dtos::{
    AcceptedInvitationDTO, ExpiredInvitationsDTO, GroupDTO, GroupSnippet, InvitationDTO,
    JoinRequestDTO, SendInviteDTO, SendRequestDTO, StartGroupDTO, UserSnippet,
};
use crate::entities::{
    Group, Invitation, InvitationAction, InvitationKind, InvitationStatus, InvitationType,
    ListOwner, User,
};
use crate::events::{
    DomainEvent, EventBus, InvitationNotice, InvitationStatusNotice, MembershipNotice,
};
use crate::repositories::{
    GroupRepository, InvitationRepository, ListRepository, NewInvitation, Read, UserRepository,
};
use crate::services::codes::{self, CodeKind};
use crate::services::group::load_group;
use crate::services::membership;
use chrono::{DateTime, Duration, Utc};
use sqlx::SqliteConnection;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

pub struct InvitationService {
    db: Database,
    events: Arc<dyn EventBus>,
    ttl: Duration,
}

impl InvitationService {
    pub fn new(db: Database, events: Arc<dyn EventBus>, ttl: Duration) -> Self {
        Self { db, events, ttl }
    }

    /// GROUP_INVITE: a member invites a user, by code, into the group.
    #[instrument(skip(self, actor, data), fields(actor = %actor.id, group_id = data.group_id))]
    pub async fn send_invite(
        &self,
        actor: &User,
        data: SendInviteDTO,
    ) -> Result<InvitationDTO, AppError> {
        let mut uow = self.db.begin().await?;
        let group = load_group(uow.conn(), data.group_id).await?;
        membership::require_member(uow.conn(), &actor.id, group.id).await?;

        let target = find_user_by_code(uow.conn(), &data.to_user_code).await?;
        if target.id == actor.id {
            warn!("Self invitation");
            return Err(AppError::bad_request("You cannot invite yourself"));
        }
        if membership::is_member(uow.conn(), &target.id, group.id).await? {
            warn!(target = %target.id, "Target is already a member");
            return Err(AppError::conflict("User is already a member of this group"));
        }
        if InvitationRepository::has_pending(
            uow.conn(),
            InvitationType::GroupInvite,
            &actor.id,
            &target.id,
            Some(group.id),
        )
        .await?
        {
            warn!(target = %target.id, "Duplicate pending invitation");
            return Err(AppError::conflict("An invitation is already pending for this user"));
        }

        let now = Utc::now();
        let invitation = InvitationRepository::insert(
            uow.conn(),
            &NewInvitation {
                kind: InvitationType::GroupInvite,
                from_user_id: &actor.id,
                to_user_id: &target.id,
                group_id: Some(group.id),
                group_name: None,
                message: data.message.as_deref(),
                created_at: now,
                expires_at: now + self.ttl,
            },
        )
        .await?;

        let dto = InvitationDTO::from(invitation)
            .with_parties(&UserSnippet::from(actor), &UserSnippet::from(&target))
            .with_group(GroupSnippet::from(&group));
        uow.emit(received(&dto));
        uow.commit(self.events.as_ref()).await?;

        info!(invitation_id = dto.id, "Group invitation sent");
        Ok(dto)
    }

    /// JOIN_REQUEST: one pending copy per current member, so any of them may answer.
    #[instrument(skip(self, actor, data), fields(actor = %actor.id))]
    pub async fn send_request(
        &self,
        actor: &User,
        data: SendRequestDTO,
    ) -> Result<JoinRequestDTO, AppError> {
        let mut uow = self.db.begin().await?;
        let code = codes::normalize_code(&data.group_code);
        let group = GroupRepository::find_by_code(uow.conn(), &code)
            .await?
            .ok_or_else(|| {
                warn!(group_code = %code, "Group code not found");
                AppError::not_found("Group not found")
            })?;

        if membership::is_member(uow.conn(), &actor.id, group.id).await? {
            warn!(group_id = group.id, "Requester is already a member");
            return Err(AppError::conflict("You are already a member of this group"));
        }
        if InvitationRepository::has_pending_join_request(uow.conn(), &actor.id, group.id).await? {
            warn!(group_id = group.id, "Join request already pending");
            return Err(AppError::conflict("A join request for this group is already pending"));
        }

        let members = membership::list_members_of(uow.conn(), group.id).await?;
        let from = UserSnippet::from(actor);
        let snippet = GroupSnippet::from(&group);
        let now = Utc::now();
        let mut invitations = Vec::with_capacity(members.len());

        for member in &members {
            let invitation = InvitationRepository::insert(
                uow.conn(),
                &NewInvitation {
                    kind: InvitationType::JoinRequest,
                    from_user_id: &actor.id,
                    to_user_id: &member.user_id,
                    group_id: Some(group.id),
                    group_name: None,
                    message: data.message.as_deref(),
                    created_at: now,
                    expires_at: now + self.ttl,
                },
            )
            .await?;
            let to = UserSnippet {
                id: member.user_id.clone(),
                first_name: member.first_name.clone(),
                last_name: member.last_name.clone(),
                user_code: member.user_code.clone(),
            };
            let dto = InvitationDTO::from(invitation)
                .with_parties(&from, &to)
                .with_group(snippet.clone());
            uow.emit(received(&dto));
            invitations.push(dto);
        }
        uow.commit(self.events.as_ref()).await?;

        info!(group_id = group.id, copies = invitations.len(), "Join request sent");
        Ok(JoinRequestDTO {
            group: snippet,
            recipients: invitations.len(),
            invitations,
        })
    }

    /// START_GROUP: proposes founding a new group with the target user.
    #[instrument(skip(self, actor, data), fields(actor = %actor.id))]
    pub async fn start_group(
        &self,
        actor: &User,
        data: StartGroupDTO,
    ) -> Result<InvitationDTO, AppError> {
        let group_name = data.group_name.trim();
        if group_name.is_empty() {
            return Err(AppError::bad_request("group_name must not be blank"));
        }

        let mut uow = self.db.begin().await?;
        let target = find_user_by_code(uow.conn(), &data.to_user_code).await?;
        if target.id == actor.id {
            warn!("Self proposal");
            return Err(AppError::bad_request("You cannot start a group with yourself"));
        }
        if InvitationRepository::has_pending_start_group_between(uow.conn(), &actor.id, &target.id)
            .await?
        {
            warn!(target = %target.id, "Start-group proposal already pending");
            return Err(AppError::conflict(
                "A group proposal between you and this user is already pending",
            ));
        }

        let now = Utc::now();
        let invitation = InvitationRepository::insert(
            uow.conn(),
            &NewInvitation {
                kind: InvitationType::StartGroup,
                from_user_id: &actor.id,
                to_user_id: &target.id,
                group_id: None,
                group_name: Some(group_name),
                message: data.message.as_deref(),
                created_at: now,
                expires_at: now + self.ttl,
            },
        )
        .await?;

        let dto = InvitationDTO::from(invitation)
            .with_parties(&UserSnippet::from(actor), &UserSnippet::from(&target));
        uow.emit(received(&dto));
        uow.commit(self.events.as_ref()).await?;

        info!(invitation_id = dto.id, "Group proposal sent");
        Ok(dto)
    }

    /// Accepts a pending invitation and applies its membership side effects.
    #[instrument(skip(self, actor), fields(actor = %actor.id))]
    pub async fn accept(
        &self,
        actor: &User,
        invitation_id: i64,
    ) -> Result<AcceptedInvitationDTO, AppError> {
        let mut uow = self.db.begin().await?;
        let invitation = load_invitation(uow.conn(), invitation_id).await?;
        let now = Utc::now();
        if let InvitationKind::JoinRequest { group_id, .. } = &invitation.kind {
            if invitation.is_participant(&actor.id)
                && membership::is_member(uow.conn(), &invitation.from_user_id, *group_id).await?
            {
                warn!(invitation_id, "Requester already joined");
                return Err(AppError::conflict("The requester is already a member of this group"));
            }
        }
        invitation.authorize(InvitationAction::Accept, &actor.id, now)?;

        let mut settled = Vec::new();
        let (group, joined_user_ids) = match &invitation.kind {
            InvitationKind::StartGroup { group_name, .. } => {
                let group = found_group(&mut uow, &invitation, group_name).await?;
                InvitationRepository::set_status(
                    uow.conn(),
                    invitation.id,
                    InvitationStatus::Accepted,
                    now,
                )
                .await?;
                InvitationRepository::set_group(uow.conn(), invitation.id, group.id).await?;
                (group, vec![invitation.from_user_id.clone(), actor.id.clone()])
            }
            InvitationKind::JoinRequest { group_id, .. } => {
                let group = load_group(uow.conn(), *group_id).await?;
                membership::require_member(uow.conn(), &actor.id, group.id).await?;
                membership::add_member(uow.conn(), &invitation.from_user_id, group.id).await?;
                settled = InvitationRepository::settle_pending_join_requests(
                    uow.conn(),
                    &invitation.from_user_id,
                    group.id,
                    InvitationStatus::Accepted,
                    now,
                )
                .await?;
                debug!(copies = settled.len(), "Join request copies settled");
                (group, vec![invitation.from_user_id.clone()])
            }
            InvitationKind::GroupInvite { group_id, .. } => {
                let group = load_group(uow.conn(), *group_id).await?;
                membership::add_member(uow.conn(), &actor.id, group.id).await?;
                InvitationRepository::set_status(
                    uow.conn(),
                    invitation.id,
                    InvitationStatus::Accepted,
                    now,
                )
                .await?;
                (group, vec![actor.id.clone()])
            }
        };

        for user_id in &joined_user_ids {
            uow.emit(DomainEvent::GroupMemberJoined(MembershipNotice {
                group_id: group.id,
                user_id: user_id.clone(),
            }));
        }
        uow.emit(status_updated(
            &invitation,
            &invitation.from_user_id,
            InvitationStatus::Accepted,
            Some(&group),
            actor,
        ));
        for copy in settled.iter().filter(|copy| copy.id != invitation.id) {
            uow.emit(status_updated(
                copy,
                copy.to_user_id(),
                InvitationStatus::Accepted,
                Some(&group),
                actor,
            ));
        }
        let member_count = membership::member_count(uow.conn(), group.id).await?;
        uow.commit(self.events.as_ref()).await?;

        info!(invitation_id, group_id = group.id, "Invitation accepted");
        Ok(AcceptedInvitationDTO {
            invitation_id,
            kind: invitation.invitation_type(),
            group: GroupDTO::from(group),
            joined_user_ids,
            member_count,
        })
    }

    /// Declines one invitation. Other copies of a join request stay pending.
    #[instrument(skip(self, actor), fields(actor = %actor.id))]
    pub async fn decline(
        &self,
        actor: &User,
        invitation_id: i64,
    ) -> Result<InvitationDTO, AppError> {
        let mut uow = self.db.begin().await?;
        let invitation = load_invitation(uow.conn(), invitation_id).await?;
        let now = Utc::now();
        let status = invitation.authorize(InvitationAction::Decline, &actor.id, now)?;

        InvitationRepository::set_status(uow.conn(), invitation.id, status, now).await?;
        let group = group_of(uow.conn(), &invitation).await?;
        uow.emit(status_updated(
            &invitation,
            &invitation.from_user_id,
            status,
            group.as_ref(),
            actor,
        ));
        let dto = load_details(uow.conn(), invitation_id).await?;
        uow.commit(self.events.as_ref()).await?;

        info!(invitation_id, "Invitation declined");
        Ok(dto)
    }

    /// Withdraws an invitation. For a join request every pending copy is cancelled.
    #[instrument(skip(self, actor), fields(actor = %actor.id))]
    pub async fn cancel(&self, actor: &User, invitation_id: i64) -> Result<InvitationDTO, AppError> {
        let mut uow = self.db.begin().await?;
        let invitation = load_invitation(uow.conn(), invitation_id).await?;
        let now = Utc::now();
        let status = invitation.authorize(InvitationAction::Cancel, &actor.id, now)?;
        let group = group_of(uow.conn(), &invitation).await?;

        let cancelled = match &invitation.kind {
            InvitationKind::JoinRequest { group_id, .. } => {
                InvitationRepository::settle_pending_join_requests(
                    uow.conn(),
                    &invitation.from_user_id,
                    *group_id,
                    status,
                    now,
                )
                .await?
            }
            _ => {
                InvitationRepository::set_status(uow.conn(), invitation.id, status, now).await?;
                vec![invitation.clone()]
            }
        };
        for copy in &cancelled {
            uow.emit(status_updated(copy, copy.to_user_id(), status, group.as_ref(), actor));
        }
        let dto = load_details(uow.conn(), invitation_id).await?;
        uow.commit(self.events.as_ref()).await?;

        info!(invitation_id, copies = cancelled.len(), "Invitation cancelled");
        Ok(dto)
    }

    /// Visible to the sender and the recipient only.
    #[instrument(skip(self, actor), fields(actor = %actor.id))]
    pub async fn get_details(
        &self,
        actor: &User,
        invitation_id: i64,
    ) -> Result<InvitationDTO, AppError> {
        let mut conn = self.db.pool().acquire().await?;
        let dto = load_details(&mut conn, invitation_id).await?;
        if dto.from_user_id != actor.id && dto.to_user_id != actor.id {
            warn!(invitation_id, "Invitation of other users");
            return Err(AppError::forbidden("You are not part of this invitation"));
        }
        Ok(dto)
    }

    /// Marks every pending invitation past its deadline as EXPIRED.
    #[instrument(skip(self))]
    pub async fn expire_stale(&self) -> Result<ExpiredInvitationsDTO, AppError> {
        self.expire_stale_at(Utc::now()).await
    }

    pub async fn expire_stale_at(
        &self,
        now: DateTime<Utc>,
    ) -> Result<ExpiredInvitationsDTO, AppError> {
        let mut uow = self.db.begin().await?;
        let expired_count = InvitationRepository::expire_stale(uow.conn(), now).await?;
        uow.commit(self.events.as_ref()).await?;
        info!(expired_count, "Stale invitations expired");
        Ok(ExpiredInvitationsDTO { expired_count })
    }
}

async fn find_user_by_code(conn: &mut SqliteConnection, raw: &str) -> Result<User, AppError> {
    let code = codes::normalize_code(raw);
    UserRepository::find_by_code(conn, &code)
        .await?
        .ok_or_else(|| {
            warn!(user_code = %code, "User code not found");
            AppError::not_found("User not found")
        })
}

async fn load_invitation(
    conn: &mut SqliteConnection,
    invitation_id: i64,
) -> Result<Invitation, AppError> {
    InvitationRepository::read(conn, &invitation_id)
        .await?
        .ok_or_else(|| {
            warn!(invitation_id, "Invitation not found");
            AppError::not_found("Invitation not found")
        })
}

async fn load_details(
    conn: &mut SqliteConnection,
    invitation_id: i64,
) -> Result<InvitationDTO, AppError> {
    InvitationRepository::read_details(conn, invitation_id)
        .await?
        .ok_or_else(|| AppError::not_found("Invitation not found"))
}

async fn group_of(
    conn: &mut SqliteConnection,
    invitation: &Invitation,
) -> Result<Option<Group>, AppError> {
    match invitation.kind.group_id() {
        Some(group_id) => Ok(GroupRepository::read(conn, &group_id).await?),
        None => Ok(None),
    }
}

/// Creates the group proposed by a START_GROUP invitation, with both
/// parties as members and an empty list.
async fn found_group(
    uow: &mut UnitOfWork,
    invitation: &Invitation,
    group_name: &str,
) -> Result<Group, AppError> {
    let code = codes::unique_code(uow.conn(), CodeKind::Group).await?;
    let group = GroupRepository::insert(uow.conn(), group_name, &code).await?;

    membership::add_member(uow.conn(), &invitation.from_user_id, group.id).await?;
    membership::add_member(uow.conn(), invitation.to_user_id(), group.id).await?;

    let list = ListRepository::insert_empty(uow.conn()).await?;
    membership::attach_list(uow.conn(), list.id, &ListOwner::Group(group.id)).await?;

    debug!(group_id = group.id, group_code = %group.group_code, "Group founded");
    Ok(group)
}

fn received(dto: &InvitationDTO) -> DomainEvent {
    DomainEvent::InvitationReceived(InvitationNotice {
        recipient_id: dto.to_user_id.clone(),
        invitation: dto.clone(),
    })
}

fn status_updated(
    invitation: &Invitation,
    recipient_id: &str,
    status: InvitationStatus,
    group: Option<&Group>,
    actor: &User,
) -> DomainEvent {
    DomainEvent::InvitationStatusUpdated(InvitationStatusNotice {
        recipient_id: recipient_id.to_string(),
        invitation_id: invitation.id,
        kind: invitation.invitation_type(),
        status,
        group_id: group.map(|g| g.id).or(invitation.kind.group_id()),
        group_name: group
            .map(|g| g.group_name.clone())
            .or_else(|| invitation.kind.group_name().map(str::to_string)),
        responded_by: UserSnippet::from(actor),
    })
}
