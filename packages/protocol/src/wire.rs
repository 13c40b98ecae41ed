//! Wire vocabulary
//!
//! Every frame is a JSON text message carrying a namespace, an event name and
//! a payload:
//!
//! ```json
//! {"ns": "/thermostat", "event": "statusHeartbeat", "data": {"enabled": true, ...}}
//! ```
//!
//! Frames for another namespace are never decoded into thermostat events.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::error::{ProtocolError, ProtocolResult};
use crate::model::{Command, Mode, ThermostatSnapshot};

/// Event names
pub mod events {
    // server -> client
    pub const CONNECTED: &str = "connected";
    pub const TEMP_HEARTBEAT: &str = "tempHeartbeat";
    pub const STATUS_HEARTBEAT: &str = "statusHeartbeat";

    // client -> server
    pub const ENABLE_SYSTEM: &str = "enable_system";
    pub const DISABLE_SYSTEM: &str = "disable_system";
    pub const SET_TEMPERATURE: &str = "set_temperature";
    pub const SET_MODE: &str = "set_mode";
}

// =============================================================================
// Envelope
// =============================================================================

/// A namespaced, named event with its payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    pub ns: String,
    pub event: String,
    #[serde(default)]
    pub data: Value,
}

impl Envelope {
    pub fn new(ns: impl Into<String>, event: impl Into<String>, data: Value) -> Self {
        Self {
            ns: ns.into(),
            event: event.into(),
            data,
        }
    }

    pub fn decode(text: &str) -> ProtocolResult<Self> {
        serde_json::from_str(text).map_err(|e| ProtocolError::MalformedFrame(e.to_string()))
    }

    pub fn encode(&self) -> ProtocolResult<String> {
        serde_json::to_string(self).map_err(|e| ProtocolError::MalformedFrame(e.to_string()))
    }

    /// Reject frames that belong to another namespace
    pub fn expect_namespace(&self, ns: &str) -> ProtocolResult<()> {
        if self.ns == ns {
            Ok(())
        } else {
            Err(ProtocolError::NamespaceMismatch {
                expected: ns.to_string(),
                actual: self.ns.clone(),
            })
        }
    }
}

// =============================================================================
// Server -> client
// =============================================================================

/// Payload of the `connected` event
///
/// The canonical form carries the full snapshot. The older `{enabled}` form
/// only tells the client where the enable toggle sits.
#[derive(Debug, Clone, PartialEq)]
pub enum ConnectedPayload {
    Snapshot(ThermostatSnapshot),
    EnabledOnly { enabled: bool },
}

impl ConnectedPayload {
    pub fn enabled(&self) -> bool {
        match self {
            ConnectedPayload::Snapshot(snapshot) => snapshot.enabled,
            ConnectedPayload::EnabledOnly { enabled } => *enabled,
        }
    }
}

#[derive(Deserialize)]
struct EnabledOnlyRepr {
    enabled: bool,
}

#[derive(Serialize, Deserialize)]
struct TempTickRepr {
    temp: f64,
}

/// Events pushed by the controller
#[derive(Debug, Clone, PartialEq)]
pub enum ServerEvent {
    Connected(ConnectedPayload),
    /// Legacy temperature-only tick; never a substitute for a snapshot
    TempHeartbeat { temp: f64 },
    StatusHeartbeat(ThermostatSnapshot),
}

impl ServerEvent {
    pub fn event_name(&self) -> &'static str {
        match self {
            ServerEvent::Connected(_) => events::CONNECTED,
            ServerEvent::TempHeartbeat { .. } => events::TEMP_HEARTBEAT,
            ServerEvent::StatusHeartbeat(_) => events::STATUS_HEARTBEAT,
        }
    }

    pub fn payload(&self) -> ProtocolResult<Value> {
        let value = match self {
            ServerEvent::Connected(ConnectedPayload::Snapshot(snapshot))
            | ServerEvent::StatusHeartbeat(snapshot) => serde_json::to_value(snapshot),
            ServerEvent::Connected(ConnectedPayload::EnabledOnly { enabled }) => {
                Ok(json!({ "enabled": enabled }))
            }
            ServerEvent::TempHeartbeat { temp } => serde_json::to_value(TempTickRepr { temp: *temp }),
        };
        value.map_err(|e| ProtocolError::invalid_payload(self.event_name(), e))
    }

    pub fn to_envelope(&self, ns: &str) -> ProtocolResult<Envelope> {
        Ok(Envelope::new(ns, self.event_name(), self.payload()?))
    }

    pub fn from_envelope(envelope: &Envelope) -> ProtocolResult<Self> {
        let event = envelope.event.as_str();
        match event {
            events::CONNECTED => {
                match serde_json::from_value::<ThermostatSnapshot>(envelope.data.clone()) {
                    Ok(snapshot) => Ok(ServerEvent::Connected(ConnectedPayload::Snapshot(snapshot))),
                    Err(full_err) => {
                        // a payload that looks like a snapshot but fails to decode
                        // is a violation, not the legacy form
                        if looks_like_snapshot(&envelope.data) {
                            return Err(ProtocolError::invalid_payload(event, full_err));
                        }
                        serde_json::from_value::<EnabledOnlyRepr>(envelope.data.clone())
                            .map(|repr| {
                                ServerEvent::Connected(ConnectedPayload::EnabledOnly {
                                    enabled: repr.enabled,
                                })
                            })
                            .map_err(|e| ProtocolError::invalid_payload(event, e))
                    }
                }
            }
            events::TEMP_HEARTBEAT => serde_json::from_value::<TempTickRepr>(envelope.data.clone())
                .map(|repr| ServerEvent::TempHeartbeat { temp: repr.temp })
                .map_err(|e| ProtocolError::invalid_payload(event, e)),
            events::STATUS_HEARTBEAT => {
                serde_json::from_value::<ThermostatSnapshot>(envelope.data.clone())
                    .map(ServerEvent::StatusHeartbeat)
                    .map_err(|e| ProtocolError::invalid_payload(event, e))
            }
            other => Err(ProtocolError::UnknownEvent(other.to_string())),
        }
    }
}

fn looks_like_snapshot(data: &Value) -> bool {
    ["system_mode", "system_state", "current_state", "desired_temperature"]
        .iter()
        .any(|key| data.get(key).is_some())
}

// =============================================================================
// Client -> server
// =============================================================================

impl Command {
    pub fn event_name(&self) -> &'static str {
        match self {
            Command::SetEnabled(true) => events::ENABLE_SYSTEM,
            Command::SetEnabled(false) => events::DISABLE_SYSTEM,
            Command::SetDesiredTemperature(_) => events::SET_TEMPERATURE,
            Command::SetMode(_) => events::SET_MODE,
        }
    }

    pub fn payload(&self) -> Value {
        match self {
            Command::SetEnabled(true) => json!({ "data": "enable" }),
            Command::SetEnabled(false) => json!({ "data": "disable" }),
            Command::SetDesiredTemperature(temp) => json!(temp),
            Command::SetMode(mode) => json!(mode.code()),
        }
    }

    pub fn to_envelope(&self, ns: &str) -> Envelope {
        Envelope::new(ns, self.event_name(), self.payload())
    }

    /// Decode a client frame into a command
    ///
    /// Structural decoding only; range validation is the controller's job.
    pub fn from_envelope(envelope: &Envelope) -> ProtocolResult<Self> {
        let event = envelope.event.as_str();
        match event {
            // payload is opaque
            events::ENABLE_SYSTEM => Ok(Command::SetEnabled(true)),
            events::DISABLE_SYSTEM => Ok(Command::SetEnabled(false)),
            events::SET_TEMPERATURE => match &envelope.data {
                Value::Number(n) => n
                    .as_f64()
                    .map(Command::SetDesiredTemperature)
                    .ok_or_else(|| ProtocolError::invalid_payload(event, "not a finite number")),
                Value::String(s) => s
                    .trim()
                    .parse::<f64>()
                    .map(Command::SetDesiredTemperature)
                    .map_err(|e| ProtocolError::invalid_payload(event, e)),
                other => Err(ProtocolError::invalid_payload(
                    event,
                    format!("expected a number, got {}", other),
                )),
            },
            events::SET_MODE => match &envelope.data {
                Value::Number(n) => {
                    let code = n
                        .as_i64()
                        .ok_or_else(|| ProtocolError::UnknownMode(n.to_string()))?;
                    Mode::from_code(code).map(Command::SetMode)
                }
                Value::String(s) => s.parse::<Mode>().map(Command::SetMode),
                other => Err(ProtocolError::invalid_payload(
                    event,
                    format!("expected a mode code, got {}", other),
                )),
            },
            other => Err(ProtocolError::UnknownEvent(other.to_string())),
        }
    }
}
