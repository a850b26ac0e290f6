//! Application state shared by every route, middleware and WebSocket task.

use crate::core::{Config, Database, IdentityVerifier};
use crate::events::EventBus;
use crate::services::{
    GroupService, InvitationService, ItemService, LocalBlobStore, UserService,
};
use crate::ws::bridge::RealtimeBridge;
use crate::ws::groupmap::GroupMap;
use crate::ws::usermap::UserMap;
use std::sync::Arc;

pub struct AppState {
    pub db: Database,

    pub config: Config,

    /// Verifies provider-issued bearer tokens
    pub identity: IdentityVerifier,

    pub users: UserService,
    pub groups: GroupService,
    pub items: ItemService,
    pub invitations: InvitationService,

    /// Live WebSocket connections, keyed by user id
    pub users_online: Arc<UserMap>,

    /// Broadcast channels of groups with at least one connected member
    pub groups_online: Arc<GroupMap>,
}

impl AppState {
    /// Builds the state with real-time delivery over WebSockets.
    pub fn new(db: Database, config: Config) -> Self {
        let users_online = Arc::new(UserMap::new());
        let groups_online = Arc::new(GroupMap::new());
        let bridge = Arc::new(RealtimeBridge::new(
            users_online.clone(),
            groups_online.clone(),
        ));
        Self::assemble(db, config, bridge, users_online, groups_online)
    }

    /// Builds the state with a caller-supplied event bus.
    pub fn with_event_bus(db: Database, config: Config, events: Arc<dyn EventBus>) -> Self {
        Self::assemble(
            db,
            config,
            events,
            Arc::new(UserMap::new()),
            Arc::new(GroupMap::new()),
        )
    }

    fn assemble(
        db: Database,
        config: Config,
        events: Arc<dyn EventBus>,
        users_online: Arc<UserMap>,
        groups_online: Arc<GroupMap>,
    ) -> Self {
        let blobs = Arc::new(LocalBlobStore::new(
            config.media_root.clone(),
            config.public_base_url.clone(),
        ));

        Self {
            identity: IdentityVerifier::new(&config.jwt_secret, &config.jwt_audience),
            users: UserService::new(db.clone(), events.clone(), blobs.clone()),
            groups: GroupService::new(db.clone(), events.clone(), blobs),
            items: ItemService::new(db.clone(), events.clone()),
            invitations: InvitationService::new(db.clone(), events, config.invitation_ttl()),
            db,
            config,
            users_online,
            groups_online,
        }
    }
}
