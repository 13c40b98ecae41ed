//! Authoritative thermostat state and its broadcasts
//!
//! [`ControllerSynchronizer`] owns the one [`ThermostatSnapshot`]. Every
//! mutation takes the snapshot lock, changes the snapshot and queues the
//! resulting broadcast before releasing it. Broadcasts therefore never observe
//! a half-applied mutation, and the order clients see matches the order
//! mutations happened in.
//!
//! Commands are validated before they touch the snapshot. A rejected command
//! changes nothing and sends nothing; the rejection is only logged.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use thermo_protocol::{
    Command, ConnectedPayload, Envelope, OperatingState, ServerEvent, ThermostatSnapshot,
};
use tokio::sync::{mpsc, Notify};
use uuid::Uuid;

use super::connection::ConnectionManager;
use crate::config::{Config, TemperatureRange};
use crate::error::{CommandError, StateError};

#[derive(Debug, Clone)]
pub struct ControllerSynchronizer {
    snapshot: Arc<Mutex<ThermostatSnapshot>>,
    connections: ConnectionManager,
    namespace: Arc<str>,
    temperature_range: TemperatureRange,
    legacy_temp_ticks: bool,
    command_applied: Arc<Notify>,
}

impl ControllerSynchronizer {
    pub fn new(config: &Config, connections: ConnectionManager) -> Self {
        Self {
            snapshot: Arc::new(Mutex::new(ThermostatSnapshot::initial(
                config.default_desired_temperature,
            ))),
            connections,
            namespace: Arc::from(config.namespace()),
            temperature_range: config.temperature_range,
            legacy_temp_ticks: config.legacy_temp_ticks,
            command_applied: Arc::new(Notify::new()),
        }
    }

    /// Copy of the current snapshot
    pub fn snapshot(&self) -> ThermostatSnapshot {
        self.lock().clone()
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn connections(&self) -> &ConnectionManager {
        &self.connections
    }

    /// Signalled after every applied command so the HVAC loop can react
    /// without waiting for its next tick
    pub fn command_notifier(&self) -> Arc<Notify> {
        Arc::clone(&self.command_applied)
    }

    // ========== Connection lifecycle ==========

    /// Register a client and queue its `connected` frame
    ///
    /// Registration and the `connected` frame happen under the snapshot lock,
    /// so no broadcast can reach the client ahead of it.
    pub fn on_client_connected(&self, client_id: Uuid, sender: mpsc::UnboundedSender<Envelope>) {
        let snapshot = self.lock();
        self.connections.add_connection(client_id, sender);

        let event = ServerEvent::Connected(ConnectedPayload::Snapshot(snapshot.clone()));
        match event.to_envelope(&self.namespace) {
            Ok(frame) => {
                if !self.connections.send_to(client_id, frame) {
                    tracing::debug!(client_id = %client_id, "Client left before connected frame");
                }
            }
            Err(e) => tracing::error!(error = %e, "Failed to encode connected frame"),
        }
    }

    pub fn on_client_disconnected(&self, client_id: Uuid) {
        self.connections.remove_connection(client_id);
    }

    // ========== Commands ==========

    /// Validate and apply one command
    ///
    /// Last write wins in arrival order. An applied command is always
    /// broadcast, even when the value did not change.
    pub fn apply_command(&self, command: Command) -> Result<(), CommandError> {
        if let Err(e) = self.validate(&command) {
            tracing::warn!(command = %command, error = %e, "Command rejected");
            return Err(e);
        }

        let mut snapshot = self.lock();
        match command {
            Command::SetEnabled(enabled) => snapshot.enabled = enabled,
            Command::SetDesiredTemperature(temperature) => {
                snapshot.desired_temperature = temperature
            }
            Command::SetMode(mode) => snapshot.mode = mode,
        }

        tracing::info!(command = %command, field = command.field(), "Command applied");
        self.broadcast_on_change(&snapshot);
        drop(snapshot);

        self.command_applied.notify_one();
        Ok(())
    }

    /// Decode a client frame and apply it
    pub fn apply_frame(&self, frame: &Envelope) -> Result<Command, CommandError> {
        let command = Command::from_envelope(frame).map_err(|e| {
            tracing::warn!(event = %frame.event, error = %e, "Undecodable command");
            CommandError::from(e)
        })?;
        self.apply_command(command)?;
        Ok(command)
    }

    fn validate(&self, command: &Command) -> Result<(), CommandError> {
        match *command {
            Command::SetDesiredTemperature(value) if !value.is_finite() => {
                Err(CommandError::NotFinite(value))
            }
            Command::SetDesiredTemperature(value) if !self.temperature_range.contains(value) => {
                Err(CommandError::OutOfRange {
                    value,
                    min: self.temperature_range.min,
                    max: self.temperature_range.max,
                })
            }
            _ => Ok(()),
        }
    }

    // ========== Broadcasts ==========

    /// Periodic full-snapshot push to every client, changed or not
    ///
    /// With legacy ticks on, a `temp_heartbeat` frame precedes the snapshot.
    pub fn broadcast_heartbeat(&self) -> usize {
        let snapshot = self.lock();
        if self.legacy_temp_ticks {
            let tick = ServerEvent::TempHeartbeat {
                temp: round_tenth(snapshot.current_temperature),
            };
            match tick.to_envelope(&self.namespace) {
                Ok(frame) => {
                    self.connections.broadcast(&frame);
                }
                Err(e) => tracing::error!(error = %e, "Failed to encode temperature tick"),
            }
        }
        self.broadcast_snapshot(&snapshot)
    }

    /// Immediate full-snapshot push after a mutation. Caller holds the
    /// snapshot lock; never carries a temperature tick.
    fn broadcast_on_change(&self, snapshot: &ThermostatSnapshot) -> usize {
        let reached = self.broadcast_snapshot(snapshot);
        tracing::debug!(clients = reached, "Change broadcast");
        reached
    }

    fn broadcast_snapshot(&self, snapshot: &ThermostatSnapshot) -> usize {
        match ServerEvent::StatusHeartbeat(snapshot.clone()).to_envelope(&self.namespace) {
            Ok(frame) => {
                let reached = self.connections.broadcast(&frame);
                tracing::trace!(clients = reached, "Snapshot broadcast");
                reached
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to encode snapshot");
                0
            }
        }
    }

    // ========== HVAC loop entry points ==========

    /// Store a smoothed sensor reading
    ///
    /// Not broadcast on its own; the next heartbeat carries it.
    pub fn record_reading(&self, temperature: f64, humidity: f64) {
        if !(temperature.is_finite() && humidity.is_finite()) {
            tracing::warn!(temperature, humidity, "Ignoring non-finite reading");
            return;
        }
        let mut snapshot = self.lock();
        snapshot.current_temperature = temperature;
        snapshot.current_humidity = humidity;
    }

    /// Write the equipment state derived by the HVAC loop
    ///
    /// Rejects states the enabled flag does not permit. Returns whether the
    /// state changed; a change is broadcast immediately.
    pub fn update_operating_state(
        &self,
        state: OperatingState,
        time_to_target: Option<f64>,
    ) -> Result<bool, StateError> {
        let mut snapshot = self.lock();
        if !state.permitted_when(snapshot.enabled) {
            return Err(StateError::NotPermitted {
                state,
                enabled: snapshot.enabled,
            });
        }

        snapshot.time_to_target_minutes = if state.is_conditioning() {
            time_to_target.filter(|minutes| minutes.is_finite())
        } else {
            None
        };

        if snapshot.operating_state == state {
            return Ok(false);
        }

        let previous = snapshot.operating_state;
        snapshot.operating_state = state;
        tracing::info!(from = %previous, to = %state, "Operating state changed");
        self.broadcast_on_change(&snapshot);
        Ok(true)
    }

    fn lock(&self) -> MutexGuard<'_, ThermostatSnapshot> {
        self.snapshot.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn round_tenth(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}
