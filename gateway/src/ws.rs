//! WebSocket push of refreshed rate payloads.

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::Response;
use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use ratecast_fx::RatesPayload;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::state::AppState;

/// Upgrade handler for `/ws`.
pub async fn subscribe(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: AppState) {
    let subscriber_id = Uuid::new_v4();
    // Subscribe before reading the current payload so no refresh slips between.
    let mut updates = state.updates.subscribe();
    let (mut sender, mut receiver) = socket.split();

    info!(%subscriber_id, "Rate subscriber connected");

    if let Some(payload) = state.current_payload() {
        if send_payload(&mut sender, &payload).await.is_err() {
            debug!(%subscriber_id, "Subscriber went away before first payload");
            return;
        }
    }

    loop {
        tokio::select! {
            update = updates.recv() => match update {
                Ok(payload) => {
                    if send_payload(&mut sender, &payload).await.is_err() {
                        break;
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    warn!(%subscriber_id, skipped, "Subscriber lagging, skipped payloads");
                }
                Err(RecvError::Closed) => break,
            },
            incoming = receiver.next() => match incoming {
                Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                Some(Ok(_)) => {}
            },
        }
    }

    info!(%subscriber_id, "Rate subscriber disconnected");
}

async fn send_payload(
    sender: &mut SplitSink<WebSocket, Message>,
    payload: &RatesPayload,
) -> Result<(), axum::Error> {
    let text = match serde_json::to_string(payload) {
        Ok(text) => text,
        Err(e) => {
            warn!(error = %e, "Failed to encode rates payload");
            return Ok(());
        }
    };
    sender.send(Message::Text(text)).await
}
