//! Thermostat synchronization protocol
//!
//! Shared between the controller and its clients:
//! - [`model`]: modes, operating states, snapshots and commands
//! - [`display`]: the total (mode, state) → display policy
//! - [`wire`]: namespaced event envelopes and payload normalization
//! - [`history`]: the chart backfill record shape

pub mod display;
pub mod error;
pub mod history;
pub mod model;
pub mod wire;

pub use display::{display_mapping, StatusDisplay, Theme};
pub use error::{ProtocolError, ProtocolResult};
pub use history::HistoryRecord;
pub use model::{Command, Mode, OperatingState, ThermostatSnapshot};
pub use wire::{events, ConnectedPayload, Envelope, ServerEvent};
