//! Client-side state mirror
//!
//! The mirror is replaced wholesale by every full snapshot the controller
//! pushes and is never patched. Intents become commands on the channel without
//! touching the mirror; the change shows up once the controller broadcasts it.

use std::str::FromStr;
use std::time::Duration;

use thermo_protocol::{
    display_mapping, events, Command, ConnectedPayload, Envelope, Mode, ProtocolError,
    ServerEvent, StatusDisplay, ThermostatSnapshot,
};
use thermo_shared_config::Environment;

use crate::error::{ClientError, ClientResult};
use crate::transport::{Channel, CommandSink};

/// Where the client is in its connection lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncState {
    Disconnected,
    Connecting,
    /// Socket open, no full snapshot received on it yet
    AwaitingInitialSnapshot,
    Synced,
}

impl std::fmt::Display for SyncState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SyncState::Disconnected => write!(f, "disconnected"),
            SyncState::Connecting => write!(f, "connecting"),
            SyncState::AwaitingInitialSnapshot => write!(f, "awaiting_snapshot"),
            SyncState::Synced => write!(f, "synced"),
        }
    }
}

/// What to do with a frame that breaks the protocol
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViolationPolicy {
    /// Return the error from the handler
    FailLoudly,
    /// Drop out of `Synced` and render the neutral fallback
    Degrade,
}

impl From<Environment> for ViolationPolicy {
    fn from(environment: Environment) -> Self {
        if environment.is_development() {
            ViolationPolicy::FailLoudly
        } else {
            ViolationPolicy::Degrade
        }
    }
}

/// A user action on the viewer
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Intent {
    Enable,
    Disable,
    SetTemperature(f64),
    SetMode(Mode),
}

impl Intent {
    pub fn into_command(self) -> Command {
        match self {
            Intent::Enable => Command::SetEnabled(true),
            Intent::Disable => Command::SetEnabled(false),
            Intent::SetTemperature(value) => Command::SetDesiredTemperature(value),
            Intent::SetMode(mode) => Command::SetMode(mode),
        }
    }
}

impl FromStr for Intent {
    type Err = ClientError;

    /// Parses `enable`, `disable`, `temp 70` and `mode heat`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut words = s.split_whitespace();
        let verb = words
            .next()
            .ok_or_else(|| ClientError::InvalidIntent("empty input".to_string()))?;
        let arg = words.next();

        let intent = match (verb.to_ascii_lowercase().as_str(), arg) {
            ("enable" | "on", None) => Intent::Enable,
            ("disable" | "off", None) => Intent::Disable,
            ("temp" | "temperature", Some(value)) => value
                .parse::<f64>()
                .map(Intent::SetTemperature)
                .map_err(|e| ClientError::InvalidIntent(format!("bad temperature: {}", e)))?,
            ("mode", Some(value)) => value
                .parse::<Mode>()
                .map(Intent::SetMode)
                .map_err(|e| ClientError::InvalidIntent(e.to_string()))?,
            _ => return Err(ClientError::InvalidIntent(s.trim().to_string())),
        };

        if words.next().is_some() {
            return Err(ClientError::InvalidIntent(s.trim().to_string()));
        }
        Ok(intent)
    }
}

/// Local mirror of the controller snapshot plus its connection state
#[derive(Debug, Clone)]
pub struct ClientSynchronizer {
    state: SyncState,
    mirror: Option<ThermostatSnapshot>,
    /// Enable-toggle position from a legacy `connected {enabled}` greeting
    enabled_hint: Option<bool>,
    /// Set by a violation under [`ViolationPolicy::Degrade`]
    degraded: bool,
    policy: ViolationPolicy,
}

impl ClientSynchronizer {
    pub fn new(policy: ViolationPolicy) -> Self {
        Self {
            state: SyncState::Disconnected,
            mirror: None,
            enabled_hint: None,
            degraded: false,
            policy,
        }
    }

    pub fn state(&self) -> SyncState {
        self.state
    }

    pub fn mirror(&self) -> Option<&ThermostatSnapshot> {
        self.mirror.as_ref()
    }

    pub fn is_degraded(&self) -> bool {
        self.degraded
    }

    pub fn policy(&self) -> ViolationPolicy {
        self.policy
    }

    // ── Connection lifecycle ──

    pub fn on_connecting(&mut self) {
        self.state = SyncState::Connecting;
    }

    pub fn on_open(&mut self) {
        self.mirror = None;
        self.enabled_hint = None;
        self.degraded = false;
        self.state = SyncState::AwaitingInitialSnapshot;
    }

    /// Any close discards the mirror; it is never resumed on reconnect
    pub fn on_close(&mut self, reason: &str) {
        tracing::info!(reason, "Disconnected from controller");
        self.mirror = None;
        self.enabled_hint = None;
        self.degraded = false;
        self.state = SyncState::Disconnected;
    }

    pub fn on_reconnecting(&mut self, attempt: u32, delay: Duration) {
        tracing::debug!(attempt, delay_ms = delay.as_millis() as u64, "Reconnect scheduled");
        self.state = SyncState::Disconnected;
    }

    // ── Snapshots ──

    pub fn on_connected(&mut self, payload: ConnectedPayload) {
        match payload {
            ConnectedPayload::Snapshot(snapshot) => self.replace_mirror(snapshot),
            ConnectedPayload::EnabledOnly { enabled } => {
                tracing::debug!(enabled, "Legacy greeting, waiting for a full snapshot");
                self.enabled_hint = Some(enabled);
                if self.state != SyncState::Synced {
                    self.state = SyncState::AwaitingInitialSnapshot;
                }
            }
        }
    }

    pub fn on_heartbeat(&mut self, snapshot: ThermostatSnapshot) {
        self.replace_mirror(snapshot);
    }

    fn replace_mirror(&mut self, snapshot: ThermostatSnapshot) {
        self.enabled_hint = Some(snapshot.enabled);
        self.mirror = Some(snapshot);
        self.degraded = false;
        self.state = SyncState::Synced;
    }

    /// Apply one server frame to the mirror
    ///
    /// Returns an error only for a protocol violation under
    /// [`ViolationPolicy::FailLoudly`].
    pub fn handle_frame(&mut self, frame: &Envelope) -> ClientResult<()> {
        // a snapshot is taken as the controller sent it; `enabled` may lead
        // the operating state until the control loop catches up
        match ServerEvent::from_envelope(frame) {
            Ok(ServerEvent::Connected(payload)) => self.on_connected(payload),
            Ok(ServerEvent::StatusHeartbeat(snapshot)) => self.on_heartbeat(snapshot),
            Ok(ServerEvent::TempHeartbeat { temp }) => {
                tracing::trace!(temp, "Temperature tick");
            }
            Err(e) => return self.on_violation(&frame.event, e),
        }
        Ok(())
    }

    fn on_violation(&mut self, event: &str, error: ProtocolError) -> ClientResult<()> {
        match self.policy {
            ViolationPolicy::FailLoudly => {
                tracing::error!(event, error = %error, "Protocol violation");
                Err(ClientError::Protocol(error))
            }
            ViolationPolicy::Degrade => {
                tracing::warn!(event, error = %error, "Protocol violation, degrading display");
                self.degraded = true;
                if self.state == SyncState::Synced {
                    self.state = SyncState::AwaitingInitialSnapshot;
                }
                Ok(())
            }
        }
    }

    // ── Intents and rendering ──

    /// Turn an intent into exactly one command and hand it to the sink
    ///
    /// The mirror is left alone. A command that could not be sent is logged
    /// and still returned.
    pub fn dispatch_intent(&self, intent: Intent, sink: &impl CommandSink) -> Command {
        let command = intent.into_command();
        if sink.send_command(&command) {
            tracing::debug!(command = %command, "Command sent");
        } else {
            tracing::warn!(command = %command, state = %self.state, "Not connected, command dropped");
        }
        command
    }

    /// What the view should show right now
    pub fn render(&self) -> StatusDisplay {
        match (&self.mirror, self.state, self.degraded) {
            (Some(snapshot), SyncState::Synced, false) => display_mapping(snapshot),
            _ => StatusDisplay::unavailable(self.enabled_hint),
        }
    }

    /// Re-render into `shown`, logging the new view when it changed
    ///
    /// Returns whether anything changed.
    pub fn refresh_view(&self, shown: &mut StatusDisplay) -> bool {
        let view = self.render();
        if view == *shown {
            return false;
        }
        tracing::info!(
            status = %view.status,
            eta = view.eta.as_deref().unwrap_or(""),
            theme = %view.theme,
            enabled = view.enabled,
            temperature = %view.temperature,
            humidity = %view.humidity,
            state = %self.state,
            "Display"
        );
        *shown = view;
        true
    }

    /// Register this synchronizer's handlers on a channel
    pub fn install(channel: &mut Channel<ClientSynchronizer>) {
        for event in [events::CONNECTED, events::STATUS_HEARTBEAT, events::TEMP_HEARTBEAT] {
            channel.on_event(event, |sync: &mut ClientSynchronizer, frame| {
                sync.handle_frame(frame)
            });
        }
        channel.on_connecting(|sync, _attempt| sync.on_connecting());
        channel.on_open(|sync| sync.on_open());
        channel.on_close(|sync, reason| sync.on_close(reason));
        channel.on_reconnect(|sync, attempt, delay| sync.on_reconnecting(attempt, delay));
    }
}
