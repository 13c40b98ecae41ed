//! Display policy
//!
//! A pure function from a snapshot to what a viewer shows: a status line, an
//! optional ETA clause and a theme tag. The match over (state, mode) is
//! exhaustive, so every pair the wire can carry has a defined rendering and a
//! new enum variant is a compile error here rather than a blank screen.

use serde::Serialize;

use crate::model::{Mode, OperatingState, ThermostatSnapshot};

pub const TRANSITION_MESSAGE: &str = "System preparing to switch modes";
pub const DISABLED_MESSAGE: &str = "System disabled";
pub const UNAVAILABLE_MESSAGE: &str = "Status unavailable";

/// Closed set of display themes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    Neutral,
    Heat,
    Cool,
    Fan,
}

impl Theme {
    pub fn as_str(&self) -> &'static str {
        match self {
            Theme::Neutral => "neutral",
            Theme::Heat => "heat",
            Theme::Cool => "cool",
            Theme::Fan => "fan",
        }
    }
}

impl std::fmt::Display for Theme {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Everything a view needs to draw the thermostat
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatusDisplay {
    pub status: String,
    pub eta: Option<String>,
    pub theme: Theme,
    /// Position of the enable toggle
    pub enabled: bool,
    pub temperature: String,
    pub humidity: String,
}

impl StatusDisplay {
    /// Safe neutral rendering used when no trustworthy snapshot is held
    pub fn unavailable(enabled_hint: Option<bool>) -> Self {
        Self {
            status: UNAVAILABLE_MESSAGE.to_string(),
            eta: None,
            theme: Theme::Neutral,
            enabled: enabled_hint.unwrap_or(false),
            temperature: "--".to_string(),
            humidity: "--".to_string(),
        }
    }
}

/// Map a snapshot to its display
pub fn display_mapping(snapshot: &ThermostatSnapshot) -> StatusDisplay {
    let desired = format_degrees(snapshot.desired_temperature);
    let (status, theme) = status_line(snapshot.mode, snapshot.operating_state, &desired);

    StatusDisplay {
        status,
        eta: eta_clause(snapshot),
        theme,
        enabled: snapshot.enabled,
        temperature: format!("{}°", format_degrees(snapshot.current_temperature)),
        humidity: format!("{}%", format_degrees(snapshot.current_humidity)),
    }
}

fn status_line(mode: Mode, state: OperatingState, desired: &str) -> (String, Theme) {
    match (state, mode) {
        (OperatingState::Disabled, _) => (DISABLED_MESSAGE.to_string(), Theme::Neutral),
        (OperatingState::Transition, _) => (TRANSITION_MESSAGE.to_string(), Theme::Neutral),
        (OperatingState::Heating, _) => (format!("Heating to {}°", desired), Theme::Heat),
        (OperatingState::Cooling, _) => (format!("Cooling to {}°", desired), Theme::Cool),
        (OperatingState::FanOnly, _) => ("Fan running".to_string(), Theme::Fan),
        (OperatingState::Idle, Mode::Cool) => (
            format!("Idle, cooling to {}° when needed", desired),
            Theme::Neutral,
        ),
        (OperatingState::Idle, Mode::Heat) => (
            format!("Idle, heating to {}° when needed", desired),
            Theme::Neutral,
        ),
        (OperatingState::Idle, Mode::Auto) => (format!("Idle, holding {}°", desired), Theme::Neutral),
        (OperatingState::Idle, Mode::Off) => ("Idle".to_string(), Theme::Neutral),
    }
}

fn eta_clause(snapshot: &ThermostatSnapshot) -> Option<String> {
    let minutes = snapshot.eta_minutes()?;
    if minutes <= 0.0 {
        return None;
    }
    // ceil of a positive finite f64 below u64::MAX is exact enough for minutes
    let whole = minutes.ceil() as u64;
    let unit = if whole == 1 { "minute" } else { "minutes" };
    Some(format!("ETA to temperature: {} {}", whole, unit))
}

/// One decimal place, trailing zeros dropped: 70.0 → "70", 70.25 → "70.3"
pub fn format_degrees(value: f64) -> String {
    let rounded = (value * 10.0).round() / 10.0;
    // avoid rendering "-0"
    let rounded = if rounded == 0.0 { 0.0 } else { rounded };
    format!("{}", rounded)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn snapshot(mode: Mode, state: OperatingState) -> ThermostatSnapshot {
        ThermostatSnapshot {
            enabled: state != OperatingState::Disabled,
            mode,
            operating_state: state,
            desired_temperature: 70.0,
            current_temperature: 65.0,
            current_humidity: 41.5,
            time_to_target_minutes: Some(12.0),
        }
    }

    #[test]
    fn test_mapping_is_total() {
        for mode in Mode::ALL {
            for state in OperatingState::ALL {
                let display = display_mapping(&snapshot(mode, state));
                assert!(
                    !display.status.is_empty(),
                    "empty status for ({mode}, {state})"
                );
            }
        }
    }

    #[test]
    fn test_heating_scenario() {
        let display = display_mapping(&snapshot(Mode::Heat, OperatingState::Heating));
        assert_eq!(display.status, "Heating to 70°");
        assert_eq!(display.eta.as_deref(), Some("ETA to temperature: 12 minutes"));
        assert_eq!(display.theme, Theme::Heat);
        assert!(display.enabled);
        assert_eq!(display.temperature, "65°");
        assert_eq!(display.humidity, "41.5%");
    }

    #[rstest]
    #[case(Mode::Cool)]
    #[case(Mode::Heat)]
    #[case(Mode::Auto)]
    #[case(Mode::Off)]
    fn test_transition_suppresses_target_and_eta(#[case] mode: Mode) {
        let mut s = snapshot(mode, OperatingState::Transition);
        s.desired_temperature = 88.0;
        s.time_to_target_minutes = Some(3.0);

        let display = display_mapping(&s);
        assert_eq!(display.status, TRANSITION_MESSAGE);
        assert_eq!(display.eta, None);
        assert_eq!(display.theme, Theme::Neutral);
    }

    #[test]
    fn test_disabled_clears_eta() {
        let display = display_mapping(&snapshot(Mode::Cool, OperatingState::Disabled));
        assert_eq!(display.status, DISABLED_MESSAGE);
        assert_eq!(display.eta, None);
        assert!(!display.enabled);
    }

    #[rstest]
    #[case(Mode::Cool, OperatingState::Cooling, Theme::Cool)]
    #[case(Mode::Auto, OperatingState::Heating, Theme::Heat)]
    #[case(Mode::Off, OperatingState::FanOnly, Theme::Fan)]
    #[case(Mode::Auto, OperatingState::Idle, Theme::Neutral)]
    fn test_theme_tags(#[case] mode: Mode, #[case] state: OperatingState, #[case] theme: Theme) {
        assert_eq!(display_mapping(&snapshot(mode, state)).theme, theme);
    }

    #[rstest]
    #[case(Mode::Cool, "Idle, cooling to 70° when needed")]
    #[case(Mode::Heat, "Idle, heating to 70° when needed")]
    #[case(Mode::Auto, "Idle, holding 70°")]
    #[case(Mode::Off, "Idle")]
    fn test_idle_status_depends_on_mode(#[case] mode: Mode, #[case] expected: &str) {
        assert_eq!(display_mapping(&snapshot(mode, OperatingState::Idle)).status, expected);
    }

    #[test]
    fn test_eta_rounding_and_singular() {
        let mut s = snapshot(Mode::Cool, OperatingState::Cooling);
        s.time_to_target_minutes = Some(0.4);
        assert_eq!(
            display_mapping(&s).eta.as_deref(),
            Some("ETA to temperature: 1 minute")
        );

        s.time_to_target_minutes = Some(2.1);
        assert_eq!(
            display_mapping(&s).eta.as_deref(),
            Some("ETA to temperature: 3 minutes")
        );

        s.time_to_target_minutes = None;
        assert_eq!(display_mapping(&s).eta, None);
    }

    #[test]
    fn test_rendering_is_idempotent() {
        let s = snapshot(Mode::Heat, OperatingState::Heating);
        assert_eq!(display_mapping(&s), display_mapping(&s));
    }

    #[test]
    fn test_format_degrees() {
        assert_eq!(format_degrees(70.0), "70");
        assert_eq!(format_degrees(70.25), "70.3");
        assert_eq!(format_degrees(-0.01), "0");
    }

    #[test]
    fn test_unavailable_display() {
        let display = StatusDisplay::unavailable(Some(true));
        assert_eq!(display.status, UNAVAILABLE_MESSAGE);
        assert_eq!(display.theme, Theme::Neutral);
        assert!(display.enabled);
    }
}
