//! WebSocket upgrade handler
//!
//! One task pair per connection: the send task drains the client's outbound
//! queue onto the socket, the receive task decodes command frames and applies
//! them. Whichever finishes first tears the other down.

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        ConnectInfo, Extension,
    },
    response::Response,
};
use futures_util::{SinkExt, StreamExt};
use std::net::SocketAddr;
use thermo_protocol::Envelope;
use tokio::sync::mpsc;
use uuid::Uuid;

use super::sync::ControllerSynchronizer;

/// WebSocket upgrade handler
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    Extension(sync): Extension<ControllerSynchronizer>,
    connect_info: Option<ConnectInfo<SocketAddr>>,
) -> Response {
    let client_id = Uuid::new_v4();
    let peer = connect_info
        .map(|ConnectInfo(addr)| addr.to_string())
        .unwrap_or_else(|| "unknown".to_string());

    tracing::info!(client_id = %client_id, peer = %peer, "WebSocket connection accepted");

    ws.on_upgrade(move |socket| handle_socket(socket, client_id, sync))
}

/// Handle an established WebSocket connection
async fn handle_socket(socket: WebSocket, client_id: Uuid, sync: ControllerSynchronizer) {
    let (tx, mut rx) = mpsc::unbounded_channel::<Envelope>();

    // queues `connected` ahead of anything else for this client
    sync.on_client_connected(client_id, tx);

    let (mut ws_sender, mut ws_receiver) = socket.split();

    let mut send_task = tokio::spawn(async move {
        while let Some(frame) = rx.recv().await {
            match frame.encode() {
                Ok(text) => {
                    if ws_sender.send(Message::Text(text)).await.is_err() {
                        tracing::debug!(client_id = %client_id, "WebSocket send failed");
                        break;
                    }
                }
                Err(e) => {
                    tracing::error!(error = %e, event = %frame.event, "Failed to serialize frame");
                }
            }
        }
        let _ = ws_sender.close().await;
    });

    let recv_sync = sync.clone();
    let mut recv_task = tokio::spawn(async move {
        while let Some(result) = ws_receiver.next().await {
            match result {
                Ok(Message::Text(text)) => handle_text(&recv_sync, client_id, &text),
                Ok(Message::Binary(_)) => {
                    tracing::debug!(client_id = %client_id, "Received unsupported binary message");
                }
                Ok(Message::Ping(_)) | Ok(Message::Pong(_)) => {
                    tracing::trace!(client_id = %client_id, "Received ping/pong");
                }
                Ok(Message::Close(_)) => {
                    tracing::debug!(client_id = %client_id, "WebSocket close received");
                    break;
                }
                Err(e) => {
                    tracing::debug!(error = %e, client_id = %client_id, "WebSocket error");
                    break;
                }
            }
        }
    });

    tokio::select! {
        _ = &mut send_task => {
            tracing::debug!(client_id = %client_id, "Send task completed");
            recv_task.abort();
        }
        _ = &mut recv_task => {
            tracing::debug!(client_id = %client_id, "Receive task completed");
            send_task.abort();
        }
    }

    sync.on_client_disconnected(client_id);
    tracing::info!(client_id = %client_id, "WebSocket connection closed");
}

/// Decode and apply one text frame. Nothing is ever sent back for a bad frame.
fn handle_text(sync: &ControllerSynchronizer, client_id: Uuid, text: &str) {
    let frame = match Envelope::decode(text) {
        Ok(frame) => frame,
        Err(e) => {
            tracing::debug!(error = %e, client_id = %client_id, "Discarding malformed frame");
            return;
        }
    };

    if frame.expect_namespace(sync.namespace()).is_err() {
        tracing::debug!(
            client_id = %client_id,
            ns = %frame.ns,
            event = %frame.event,
            "Ignoring frame for another namespace"
        );
        return;
    }

    tracing::debug!(client_id = %client_id, event = %frame.event, "Command received");
    // rejections are logged by the synchronizer
    let _ = sync.apply_frame(&frame);
}
