//! One WebSocket connection: a listener task for client frames and a writer
//! task for everything the server pushes.

use crate::AppState;
use crate::dtos::WsFrame;
use crate::repositories::MembershipRepository;
use crate::ws::usermap::InternalSignal;
use crate::ws::{RATE_LIMITER_MILLIS, TIMEOUT_DURATION_SECONDS};
use axum::extract::ws::{Message, Utf8Bytes, WebSocket};
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use std::sync::Arc;
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender, unbounded_channel};
use tokio::time::{Duration, interval, timeout};
use tokio_stream::StreamMap;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tracing::{debug, error, info, instrument, warn};

#[instrument(skip(ws, state))]
pub async fn handle_socket(ws: WebSocket, state: Arc<AppState>, user_id: String) {
    info!("WebSocket connection established");

    let (ws_tx, ws_rx) = ws.split();
    let (int_tx, int_rx) = unbounded_channel::<InternalSignal>();

    let group_ids = {
        let loaded = match state.db.pool().acquire().await {
            Ok(mut conn) => MembershipRepository::group_ids_of(&mut conn, &user_id).await,
            Err(e) => Err(e),
        };
        match loaded {
            Ok(ids) => ids,
            Err(e) => {
                error!("Failed to load user groups: {:?}", e);
                return;
            }
        }
    };

    state.users_online.register_online(&user_id, int_tx.clone());

    tokio::spawn(listen_ws(user_id.clone(), ws_rx, int_tx, state.clone()));
    tokio::spawn(write_ws(user_id, group_ids, ws_tx, int_rx, state));
}

#[instrument(skip(group_ids, websocket_tx, internal_rx, state))]
pub async fn write_ws(
    user_id: String,
    group_ids: Vec<i64>,
    mut websocket_tx: SplitSink<WebSocket, Message>,
    mut internal_rx: UnboundedReceiver<InternalSignal>,
    state: Arc<AppState>,
) {
    info!(groups = group_ids.len(), "Write task started");

    let mut stream_map = StreamMap::new();
    state
        .groups_online
        .subscribe_multiple(&group_ids)
        .into_iter()
        .zip(group_ids.iter())
        .for_each(|(rx, &group_id)| {
            stream_map.insert(group_id, BroadcastStream::new(rx));
        });

    loop {
        tokio::select! {
            Some((group_id, result)) = tokio_stream::StreamExt::next(&mut stream_map) => {
                match result {
                    Ok(frame) => {
                        if send_frame(&mut websocket_tx, &frame).await.is_err() {
                            warn!("Failed to send group frame, closing connection");
                            break;
                        }
                    }
                    Err(BroadcastStreamRecvError::Lagged(skipped)) => {
                        warn!(group_id, skipped, "Connection lagging, frames skipped");
                    }
                }
            }

            signal = internal_rx.recv() => {
                match signal {
                    Some(InternalSignal::Shutdown) | None => {
                        info!("Writer shutting down");
                        break;
                    }
                    Some(InternalSignal::AddGroup(group_id)) => {
                        debug!(group_id, "Adding group subscription");
                        let rx = state.groups_online.subscribe(group_id);
                        stream_map.insert(group_id, BroadcastStream::new(rx));
                    }
                    Some(InternalSignal::RemoveGroup(group_id)) => {
                        debug!(group_id, "Removing group subscription");
                        stream_map.remove(&group_id);
                    }
                    Some(InternalSignal::Notify(frame)) => {
                        if send_frame(&mut websocket_tx, &frame).await.is_err() {
                            warn!("Failed to send notification, closing connection");
                            break;
                        }
                    }
                }
            }
        }
    }

    let _ = websocket_tx.close().await;
    info!("Write task terminated");
}

async fn send_frame(
    websocket_tx: &mut SplitSink<WebSocket, Message>,
    frame: &WsFrame,
) -> Result<(), axum::Error> {
    let json = serde_json::to_string(frame).map_err(|e| {
        error!("Failed to serialize frame: {:?}", e);
        axum::Error::new(e)
    })?;
    websocket_tx.send(Message::Text(Utf8Bytes::from(json))).await
}

/// Reads client frames until close, error or timeout. Clients only send
/// keep-alives; any text is ignored.
#[instrument(skip(websocket_rx, internal_tx, state))]
pub async fn listen_ws(
    user_id: String,
    mut websocket_rx: SplitStream<WebSocket>,
    internal_tx: UnboundedSender<InternalSignal>,
    state: Arc<AppState>,
) {
    info!("Listen task started");

    let mut rate_limiter = interval(Duration::from_millis(RATE_LIMITER_MILLIS));
    let timeout_duration = Duration::from_secs(TIMEOUT_DURATION_SECONDS);

    loop {
        match timeout(timeout_duration, StreamExt::next(&mut websocket_rx)).await {
            Ok(Some(Ok(msg))) => {
                rate_limiter.tick().await;
                match msg {
                    Message::Close(_) => {
                        info!("Close message received");
                        break;
                    }
                    Message::Text(text) => debug!(len = text.len(), "Ignoring client text"),
                    _ => {}
                }
            }
            Ok(Some(Err(e))) => {
                warn!("WebSocket error: {:?}", e);
                break;
            }
            Ok(None) => {
                info!("WebSocket stream ended");
                break;
            }
            Err(_) => {
                warn!(timeout_secs = TIMEOUT_DURATION_SECONDS, "Connection timeout");
                break;
            }
        }
    }

    let _ = internal_tx.send(InternalSignal::Shutdown);
    state.users_online.remove_from_online(&user_id, &internal_tx);
    info!("Listen task terminated");
}
