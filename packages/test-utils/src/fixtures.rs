//! Snapshot fixtures

use thermo_protocol::{Mode, OperatingState, ThermostatSnapshot};

/// Builder for thermostat snapshots used across test suites
#[derive(Debug, Clone)]
pub struct SnapshotFixture {
    snapshot: ThermostatSnapshot,
}

impl SnapshotFixture {
    /// Powered off, AUTO, 75° desired
    pub fn disabled() -> Self {
        let mut snapshot = ThermostatSnapshot::initial(75.0);
        snapshot.current_temperature = 72.0;
        snapshot.current_humidity = 45.0;
        Self { snapshot }
    }

    /// Enabled and idle in the given mode
    pub fn idle(mode: Mode) -> Self {
        Self::disabled()
            .enabled(true)
            .mode(mode)
            .state(OperatingState::Idle)
    }

    /// Heating toward `desired` from `current`
    pub fn heating(desired: f64, current: f64) -> Self {
        Self::idle(Mode::Heat)
            .state(OperatingState::Heating)
            .desired(desired)
            .current(current)
    }

    /// Cooling toward `desired` from `current`
    pub fn cooling(desired: f64, current: f64) -> Self {
        Self::idle(Mode::Cool)
            .state(OperatingState::Cooling)
            .desired(desired)
            .current(current)
    }

    pub fn enabled(mut self, enabled: bool) -> Self {
        self.snapshot.enabled = enabled;
        self
    }

    pub fn mode(mut self, mode: Mode) -> Self {
        self.snapshot.mode = mode;
        self
    }

    pub fn state(mut self, state: OperatingState) -> Self {
        self.snapshot.operating_state = state;
        self
    }

    pub fn desired(mut self, desired: f64) -> Self {
        self.snapshot.desired_temperature = desired;
        self
    }

    pub fn current(mut self, current: f64) -> Self {
        self.snapshot.current_temperature = current;
        self
    }

    pub fn humidity(mut self, humidity: f64) -> Self {
        self.snapshot.current_humidity = humidity;
        self
    }

    pub fn eta(mut self, minutes: f64) -> Self {
        self.snapshot.time_to_target_minutes = Some(minutes);
        self
    }

    pub fn build(self) -> ThermostatSnapshot {
        self.snapshot
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixtures_respect_enabled_invariant() {
        let fixtures = [
            SnapshotFixture::disabled().build(),
            SnapshotFixture::idle(Mode::Auto).build(),
            SnapshotFixture::heating(70.0, 65.0).build(),
            SnapshotFixture::cooling(70.0, 75.0).build(),
        ];
        for snapshot in fixtures {
            assert!(snapshot.operating_state.permitted_when(snapshot.enabled));
        }
    }
}
