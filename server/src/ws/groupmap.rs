use crate::dtos::WsFrame;
use crate::ws::BROADCAST_CHANNEL_CAPACITY;
use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::broadcast::{self, Receiver, Sender};
use tracing::{debug, info, instrument};

pub struct GroupMap {
    /// Sending half of each group's broadcast channel
    channels: DashMap<i64, Sender<Arc<WsFrame>>>,
}

impl Default for GroupMap {
    fn default() -> Self {
        Self::new()
    }
}

impl GroupMap {
    pub fn new() -> Self {
        GroupMap {
            channels: DashMap::new(),
        }
    }

    #[instrument(skip(self))]
    pub fn subscribe(&self, group_id: i64) -> Receiver<Arc<WsFrame>> {
        self.channels
            .entry(group_id)
            .or_insert_with(|| {
                debug!("Creating broadcast channel for group");
                broadcast::channel::<Arc<WsFrame>>(BROADCAST_CHANNEL_CAPACITY).0
            })
            .subscribe()
    }

    pub fn subscribe_multiple(&self, group_ids: &[i64]) -> Vec<Receiver<Arc<WsFrame>>> {
        group_ids.iter().map(|id| self.subscribe(*id)).collect()
    }

    /// Broadcasts to the group's subscribers. Returns how many received it.
    #[instrument(skip(self, frame))]
    pub fn send(&self, group_id: i64, frame: Arc<WsFrame>) -> usize {
        let Some(channel) = self.channels.get(&group_id) else {
            debug!("No connected members, frame dropped");
            return 0;
        };
        match channel.send(frame) {
            Ok(n) => {
                debug!(receivers = n, "Frame broadcast");
                n
            }
            Err(_) => {
                drop(channel);
                self.channels
                    .remove_if(&group_id, |_, tx| tx.receiver_count() == 0);
                debug!("No active receivers, channel removed");
                0
            }
        }
    }

    /// Drops the channel. Subscribers see their stream end.
    pub fn close(&self, group_id: i64) {
        if self.channels.remove(&group_id).is_some() {
            info!(group_id, "Group channel closed");
        }
    }

    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }
}
