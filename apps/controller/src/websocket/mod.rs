//! Real-time thermostat sync over WebSocket
//!
//! - [`connection`]: registry of connected viewers and their outbound queues
//! - [`sync`]: the authoritative snapshot, command application and broadcasts
//! - [`handler`]: the `/ws` upgrade and per-connection tasks

pub mod connection;
pub mod handler;
pub mod sync;

pub use connection::ConnectionManager;
pub use handler::ws_handler;
pub use sync::ControllerSynchronizer;
