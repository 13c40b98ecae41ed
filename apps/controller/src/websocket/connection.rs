//! WebSocket connection management
//!
//! Each connected viewer gets one unbounded outbound queue. Everything sent to
//! a client goes through its queue, which is what keeps controller → client
//! delivery in order.

use dashmap::DashMap;
use std::sync::Arc;
use thermo_protocol::Envelope;
use tokio::sync::mpsc;
use uuid::Uuid;

/// Handle for sending frames to a specific WebSocket connection
#[derive(Debug)]
pub struct ConnectionHandle {
    /// Channel for sending frames to this connection
    pub sender: mpsc::UnboundedSender<Envelope>,
}

impl ConnectionHandle {
    pub fn new(sender: mpsc::UnboundedSender<Envelope>) -> Self {
        Self { sender }
    }

    /// Queue a frame for this connection
    #[allow(clippy::result_large_err)]
    pub fn send(&self, frame: Envelope) -> Result<(), mpsc::error::SendError<Envelope>> {
        self.sender.send(frame)
    }

    /// Check if the connection is still alive
    pub fn is_alive(&self) -> bool {
        !self.sender.is_closed()
    }
}

/// Registry of connected viewers
///
/// Uses DashMap for concurrent access without explicit locking.
/// Wrapped in Arc for cheap cloning.
#[derive(Debug, Clone, Default)]
pub struct ConnectionManager {
    connections: Arc<DashMap<Uuid, ConnectionHandle>>,
}

impl ConnectionManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_connection(&self, client_id: Uuid, sender: mpsc::UnboundedSender<Envelope>) {
        self.connections
            .insert(client_id, ConnectionHandle::new(sender));
        tracing::debug!(
            client_id = %client_id,
            connections = self.connections.len(),
            "Connection registered"
        );
    }

    pub fn remove_connection(&self, client_id: Uuid) -> bool {
        let removed = self.connections.remove(&client_id).is_some();
        if removed {
            tracing::debug!(
                client_id = %client_id,
                connections = self.connections.len(),
                "Connection removed"
            );
        }
        removed
    }

    /// Queue a frame for one client. Returns false if it is gone.
    pub fn send_to(&self, client_id: Uuid, frame: Envelope) -> bool {
        match self.connections.get(&client_id) {
            Some(handle) => handle.send(frame).is_ok(),
            None => false,
        }
    }

    /// Queue a frame for every client, dropping connections whose receiver
    /// has gone away. Returns the number of clients reached.
    pub fn broadcast(&self, frame: &Envelope) -> usize {
        let mut delivered = 0;
        let mut dead = Vec::new();

        for entry in self.connections.iter() {
            if entry.value().send(frame.clone()).is_ok() {
                delivered += 1;
            } else {
                dead.push(*entry.key());
            }
        }

        for client_id in dead {
            tracing::debug!(client_id = %client_id, "Dropping closed connection");
            self.connections.remove(&client_id);
        }

        delivered
    }

    /// Drop every connection's queue, which closes its socket.
    /// Returns how many were dropped.
    pub fn disconnect_all(&self) -> usize {
        let count = self.connections.len();
        self.connections.clear();
        if count > 0 {
            tracing::info!(connections = count, "Disconnected all clients");
        }
        count
    }

    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    pub fn is_connected(&self, client_id: Uuid) -> bool {
        self.connections
            .get(&client_id)
            .map(|handle| handle.is_alive())
            .unwrap_or(false)
    }
}
