use crate::dtos::WsFrame;
use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, info, instrument, warn};

/// Instructions for the writer task of one connection.
#[derive(Debug)]
pub enum InternalSignal {
    Shutdown,
    AddGroup(i64),
    RemoveGroup(i64),
    Notify(Arc<WsFrame>),
}

/// Live connections. A user has at most one: a new connection replaces the old.
pub struct UserMap {
    users_online: DashMap<String, UnboundedSender<InternalSignal>>,
}

impl Default for UserMap {
    fn default() -> Self {
        Self::new()
    }
}

impl UserMap {
    pub fn new() -> Self {
        UserMap {
            users_online: DashMap::new(),
        }
    }

    #[instrument(skip(self, tx))]
    pub fn register_online(&self, user_id: &str, tx: UnboundedSender<InternalSignal>) {
        if let Some(old) = self.users_online.insert(user_id.to_string(), tx) {
            debug!("Replacing previous connection");
            let _ = old.send(InternalSignal::Shutdown);
        }
        info!("Total online users: {}", self.users_online.len());
    }

    /// Removes the entry only if it still belongs to the closing connection.
    #[instrument(skip(self, tx))]
    pub fn remove_from_online(&self, user_id: &str, tx: &UnboundedSender<InternalSignal>) {
        let removed = self
            .users_online
            .remove_if(user_id, |_, current| current.same_channel(tx));
        if removed.is_some() {
            info!("User went offline");
        }
    }

    pub fn send_if_online(&self, user_id: &str, signal: InternalSignal) {
        match self.users_online.get(user_id) {
            Some(entry) => {
                if let Err(e) = entry.value().send(signal) {
                    warn!(user_id, "Failed to reach connection: {:?}", e.0);
                }
            }
            None => debug!(user_id, "User not online, signal dropped"),
        }
    }

    pub fn online_count(&self) -> usize {
        self.users_online.len()
    }

    pub fn is_user_online(&self, user_id: &str) -> bool {
        self.users_online.contains_key(user_id)
    }
}
