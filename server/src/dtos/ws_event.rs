//! WebSocket frames pushed to connected clients.

use crate::events::DomainEvent;
use chrono::{DateTime, Utc};
use serde::Serialize;

/// Serialized as `{ "type": <event>, "data": { ... }, "timestamp": ... }`.
#[derive(Serialize, Debug, Clone)]
pub struct WsFrame {
    #[serde(flatten)]
    pub event: DomainEvent,
    pub timestamp: DateTime<Utc>,
}

impl WsFrame {
    pub fn new(event: DomainEvent) -> Self {
        Self {
            event,
            timestamp: Utc::now(),
        }
    }
}
