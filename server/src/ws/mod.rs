//! WebSocket module - real-time delivery of committed domain events
//!
//! - `usermap`: live connections keyed by user id
//! - `groupmap`: one broadcast channel per group with connected members
//! - `bridge`: the [`EventBus`](crate::events::EventBus) that routes events
//! - `connection`: the reader/writer task pair of one socket

pub mod bridge;
pub mod connection;
pub mod groupmap;
pub mod usermap;

pub use connection::handle_socket;

use crate::{AppState, entities::User};
use axum::{
    Extension,
    extract::{State, ws::WebSocketUpgrade},
    response::Response,
};
use std::sync::Arc;
use tracing::instrument;

/// Per-group broadcast buffer. Slow readers skip frames beyond this.
pub const BROADCAST_CHANNEL_CAPACITY: usize = 64;

/// Idle connections are dropped after this long without a client frame.
pub const TIMEOUT_DURATION_SECONDS: u64 = 300;

pub const RATE_LIMITER_MILLIS: u64 = 50;

#[instrument(skip(ws, state, current_user), fields(user_id = %current_user.id))]
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
    Extension(current_user): Extension<User>,
) -> Response {
    let user_id = current_user.id;
    ws.on_upgrade(move |socket| handle_socket(socket, state, user_id))
}
