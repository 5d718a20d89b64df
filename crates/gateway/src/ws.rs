//! Live feed: every committed relay event, pushed as one JSON text frame.
//!
//! The feed is one-way. Inbound frames are read only to notice a close.

use std::sync::Arc;

use {
    axum::{
        extract::{
            State, WebSocketUpgrade,
            ws::{Message, WebSocket},
        },
        response::IntoResponse,
    },
    futures::{SinkExt, StreamExt},
    tokio::sync::broadcast::error::RecvError,
    ustoz_routing::RelayEvent,
};

use crate::state::GatewayState;

pub async fn ws_upgrade_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<GatewayState>>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_connection(socket, state))
}

/// Serialize one event as a frame: `{"event": "...", "payload": {...}}`.
pub fn frame(event: &RelayEvent) -> serde_json::Result<String> {
    serde_json::to_string(event)
}

async fn handle_connection(socket: WebSocket, state: Arc<GatewayState>) {
    let mut events = state.router.subscribe();
    let (mut sink, mut stream) = socket.split();
    let clients = state.client_connected();
    tracing::info!(clients, "live feed client connected");

    loop {
        tokio::select! {
            () = state.shutdown.cancelled() => {
                let _ = sink.send(Message::Close(None)).await;
                break;
            },
            incoming = stream.next() => match incoming {
                Some(Ok(Message::Close(_))) | None => break,
                Some(Ok(_)) => {},
                Some(Err(e)) => {
                    tracing::debug!(error = %e, "live feed read failed");
                    break;
                },
            },
            event = events.recv() => match event {
                Ok(event) => {
                    let text = match frame(&event) {
                        Ok(text) => text,
                        Err(e) => {
                            tracing::error!(event = event.name(), error = %e, "event serialization failed");
                            continue;
                        },
                    };
                    if sink.send(Message::Text(text.into())).await.is_err() {
                        break;
                    }
                },
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "live feed client lagging; events dropped");
                },
                Err(RecvError::Closed) => break,
            },
        }
    }

    state.client_disconnected();
    tracing::info!("live feed client disconnected");
}
