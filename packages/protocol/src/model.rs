//! Thermostat state model
//!
//! [`Mode`] is what the user asked for, [`OperatingState`] is what the
//! equipment is doing, and [`ThermostatSnapshot`] is the complete record the
//! controller owns and every client mirrors.
//!
//! Enumerations travel as integer codes. Older revisions of the protocol sent
//! formatted tags such as `"Mode.HEAT"` or `"State.COOLING"`; those are
//! normalized here, at the decode boundary, and anything unrecognized is
//! rejected rather than passed along as an open-ended string.

use serde::{de, Deserialize, Deserializer, Serialize, Serializer};

use crate::error::{ProtocolError, ProtocolResult};

// =============================================================================
// Mode
// =============================================================================

/// The user's selected operating policy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Mode {
    Cool,
    Heat,
    Auto,
    Off,
}

impl Mode {
    pub const ALL: [Mode; 4] = [Mode::Cool, Mode::Heat, Mode::Auto, Mode::Off];

    /// Wire code (0..=3)
    pub fn code(self) -> u8 {
        match self {
            Mode::Cool => 0,
            Mode::Heat => 1,
            Mode::Auto => 2,
            Mode::Off => 3,
        }
    }

    pub fn from_code(code: i64) -> ProtocolResult<Self> {
        match code {
            0 => Ok(Mode::Cool),
            1 => Ok(Mode::Heat),
            2 => Ok(Mode::Auto),
            3 => Ok(Mode::Off),
            other => Err(ProtocolError::UnknownMode(other.to_string())),
        }
    }

    /// Whether the equipment may heat under this mode
    pub fn allows_heating(self) -> bool {
        matches!(self, Mode::Heat | Mode::Auto)
    }

    /// Whether the equipment may cool under this mode
    pub fn allows_cooling(self) -> bool {
        matches!(self, Mode::Cool | Mode::Auto)
    }
}

impl std::fmt::Display for Mode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Mode::Cool => write!(f, "cool"),
            Mode::Heat => write!(f, "heat"),
            Mode::Auto => write!(f, "auto"),
            Mode::Off => write!(f, "off"),
        }
    }
}

impl std::str::FromStr for Mode {
    type Err = ProtocolError;

    /// Accepts `"1"`, `"HEAT"`, `"heat"` and the legacy `"Mode.HEAT"`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if let Ok(code) = trimmed.parse::<i64>() {
            return Self::from_code(code);
        }
        let tag = strip_prefix_ignore_case(trimmed, "Mode.");
        match tag.to_ascii_uppercase().as_str() {
            "COOL" => Ok(Mode::Cool),
            "HEAT" => Ok(Mode::Heat),
            "AUTO" => Ok(Mode::Auto),
            "OFF" | "FAN_ONLY" => Ok(Mode::Off),
            _ => Err(ProtocolError::UnknownMode(s.to_string())),
        }
    }
}

// =============================================================================
// Operating state
// =============================================================================

/// What the HVAC equipment is doing right now
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperatingState {
    Idle,
    Heating,
    Cooling,
    FanOnly,
    /// Equipment is between states (spin-up or compressor protection delay)
    Transition,
    /// Powered off by user command
    Disabled,
}

impl OperatingState {
    pub const ALL: [OperatingState; 6] = [
        OperatingState::Idle,
        OperatingState::Heating,
        OperatingState::Cooling,
        OperatingState::FanOnly,
        OperatingState::Transition,
        OperatingState::Disabled,
    ];

    /// Wire code. Code 4 is unused on output; it is the legacy shutdown state.
    pub fn code(self) -> i8 {
        match self {
            OperatingState::Disabled => -1,
            OperatingState::Idle => 0,
            OperatingState::Heating => 1,
            OperatingState::Cooling => 2,
            OperatingState::FanOnly => 3,
            OperatingState::Transition => 5,
        }
    }

    pub fn from_code(code: i64) -> ProtocolResult<Self> {
        match code {
            -1 => Ok(OperatingState::Disabled),
            0 => Ok(OperatingState::Idle),
            1 => Ok(OperatingState::Heating),
            2 => Ok(OperatingState::Cooling),
            3 => Ok(OperatingState::FanOnly),
            // legacy SHUTDOWN: equipment winding down, still between states
            4 | 5 => Ok(OperatingState::Transition),
            other => Err(ProtocolError::UnknownState(other.to_string())),
        }
    }

    /// Whether this state may be held with the given enabled flag.
    ///
    /// `Disabled` requires `enabled == false` and the running states require
    /// `enabled == true`. `Transition` is valid either way since the equipment
    /// winds down through it after a disable.
    pub fn permitted_when(self, enabled: bool) -> bool {
        match self {
            OperatingState::Disabled => !enabled,
            OperatingState::Transition => true,
            OperatingState::Idle
            | OperatingState::Heating
            | OperatingState::Cooling
            | OperatingState::FanOnly => enabled,
        }
    }

    /// Heating or cooling, the only states where time to target means anything
    pub fn is_conditioning(self) -> bool {
        matches!(self, OperatingState::Heating | OperatingState::Cooling)
    }
}

impl std::fmt::Display for OperatingState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OperatingState::Idle => write!(f, "idle"),
            OperatingState::Heating => write!(f, "heating"),
            OperatingState::Cooling => write!(f, "cooling"),
            OperatingState::FanOnly => write!(f, "fan_only"),
            OperatingState::Transition => write!(f, "transition"),
            OperatingState::Disabled => write!(f, "disabled"),
        }
    }
}

impl std::str::FromStr for OperatingState {
    type Err = ProtocolError;

    /// Accepts codes, bare tags and the legacy `"State.HEATING"` form
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if let Ok(code) = trimmed.parse::<i64>() {
            return Self::from_code(code);
        }
        let tag = strip_prefix_ignore_case(trimmed, "State.");
        match tag.to_ascii_uppercase().as_str() {
            "IDLE" => Ok(OperatingState::Idle),
            "HEATING" => Ok(OperatingState::Heating),
            "COOLING" => Ok(OperatingState::Cooling),
            "FAN_ONLY" | "FANS" => Ok(OperatingState::FanOnly),
            "TRANSITION" | "SHUTDOWN" => Ok(OperatingState::Transition),
            "DISABLED" => Ok(OperatingState::Disabled),
            _ => Err(ProtocolError::UnknownState(s.to_string())),
        }
    }
}

fn strip_prefix_ignore_case<'a>(s: &'a str, prefix: &str) -> &'a str {
    match s.get(..prefix.len()) {
        Some(head) if head.eq_ignore_ascii_case(prefix) => &s[prefix.len()..],
        _ => s,
    }
}

/// Integer code or formatted tag, as seen across protocol revisions
#[derive(Deserialize)]
#[serde(untagged)]
enum EnumRepr {
    Code(i64),
    Tag(String),
}

impl Serialize for Mode {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u8(self.code())
    }
}

impl<'de> Deserialize<'de> for Mode {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        match EnumRepr::deserialize(deserializer)? {
            EnumRepr::Code(code) => Mode::from_code(code),
            EnumRepr::Tag(tag) => tag.parse(),
        }
        .map_err(de::Error::custom)
    }
}

impl Serialize for OperatingState {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_i8(self.code())
    }
}

impl<'de> Deserialize<'de> for OperatingState {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        match EnumRepr::deserialize(deserializer)? {
            EnumRepr::Code(code) => OperatingState::from_code(code),
            EnumRepr::Tag(tag) => tag.parse(),
        }
        .map_err(de::Error::custom)
    }
}

// =============================================================================
// Snapshot
// =============================================================================

/// The complete authoritative thermostat record
///
/// Broadcasts always carry one of these in full. Clients replace their mirror
/// with it wholesale; there is no partial-update form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThermostatSnapshot {
    pub enabled: bool,

    #[serde(rename = "system_mode")]
    pub mode: Mode,

    #[serde(rename = "system_state", alias = "current_state")]
    pub operating_state: OperatingState,

    pub desired_temperature: f64,

    pub current_temperature: f64,

    #[serde(default)]
    pub current_humidity: f64,

    /// Minutes until the desired temperature is reached, while conditioning
    #[serde(rename = "time_to_temp", default)]
    pub time_to_target_minutes: Option<f64>,
}

impl ThermostatSnapshot {
    /// Snapshot at process start: disabled, AUTO, nothing measured yet
    pub fn initial(desired_temperature: f64) -> Self {
        Self {
            enabled: false,
            mode: Mode::Auto,
            operating_state: OperatingState::Disabled,
            desired_temperature,
            current_temperature: 0.0,
            current_humidity: 0.0,
            time_to_target_minutes: None,
        }
    }

    /// Time to target, only when the equipment is heating or cooling
    pub fn eta_minutes(&self) -> Option<f64> {
        if self.operating_state.is_conditioning() {
            self.time_to_target_minutes.filter(|m| m.is_finite())
        } else {
            None
        }
    }

    /// Names of the fields that differ between two snapshots
    pub fn changed_fields(&self, other: &Self) -> Vec<&'static str> {
        let mut changed = Vec::new();
        if self.enabled != other.enabled {
            changed.push("enabled");
        }
        if self.mode != other.mode {
            changed.push("mode");
        }
        if self.operating_state != other.operating_state {
            changed.push("operating_state");
        }
        if self.desired_temperature != other.desired_temperature {
            changed.push("desired_temperature");
        }
        if self.current_temperature != other.current_temperature {
            changed.push("current_temperature");
        }
        if self.current_humidity != other.current_humidity {
            changed.push("current_humidity");
        }
        if self.time_to_target_minutes != other.time_to_target_minutes {
            changed.push("time_to_target_minutes");
        }
        changed
    }
}

// =============================================================================
// Commands
// =============================================================================

/// A client intent; each one touches exactly one snapshot field
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Command {
    SetEnabled(bool),
    SetDesiredTemperature(f64),
    SetMode(Mode),
}

impl Command {
    /// The snapshot field this command writes
    pub fn field(&self) -> &'static str {
        match self {
            Command::SetEnabled(_) => "enabled",
            Command::SetDesiredTemperature(_) => "desired_temperature",
            Command::SetMode(_) => "mode",
        }
    }
}

impl std::fmt::Display for Command {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Command::SetEnabled(true) => write!(f, "enable"),
            Command::SetEnabled(false) => write!(f, "disable"),
            Command::SetDesiredTemperature(t) => write!(f, "set temperature {}", t),
            Command::SetMode(mode) => write!(f, "set mode {}", mode),
        }
    }
}
