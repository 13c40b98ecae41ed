//! HVAC control loop
//!
//! Every tick the loop reads the sensor, smooths the reading over a rolling
//! window, appends it to the chart history, and decides the next operating
//! state. Heating or cooling starts once the room is 3° off target and stops
//! once it is within 0.25° or has overshot. Starting goes through a fan
//! spin-up and stopping through an equipment purge; both are reported as
//! `TRANSITION`.

use std::collections::VecDeque;
use std::time::Instant;

use thermo_protocol::{HistoryRecord, OperatingState, ThermostatSnapshot};
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use super::history::HistoryStore;
use super::sensor::SensorSource;
use crate::config::ClimateConfig;
use crate::websocket::ControllerSynchronizer;

/// Samples averaged into the reported temperature
pub const SMOOTHING_WINDOW: usize = 60;

/// Distance from target that starts the equipment
pub const START_THRESHOLD: f64 = 3.0;

/// Distance from target that counts as arrived
pub const STOP_TOLERANCE: f64 = 0.25;

/// Rolling mean over the most recent samples
#[derive(Debug, Clone)]
pub struct SmoothingWindow {
    samples: VecDeque<f64>,
    capacity: usize,
}

impl SmoothingWindow {
    pub fn new(capacity: usize) -> Self {
        Self {
            samples: VecDeque::with_capacity(capacity),
            capacity: capacity.max(1),
        }
    }

    pub fn push(&mut self, sample: f64) {
        if self.samples.len() == self.capacity {
            self.samples.pop_front();
        }
        self.samples.push_back(sample);
    }

    pub fn mean(&self) -> Option<f64> {
        if self.samples.is_empty() {
            return None;
        }
        Some(self.samples.iter().sum::<f64>() / self.samples.len() as f64)
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Phase {
    Steady,
    SpinUp { to: OperatingState, until: Instant },
    Purge { until: Instant },
}

/// Operating-state decisions, free of I/O
#[derive(Debug, Clone)]
pub struct ClimateController {
    config: ClimateConfig,
    phase: Phase,
}

impl ClimateController {
    pub fn new(config: ClimateConfig) -> Self {
        Self {
            config,
            phase: Phase::Steady,
        }
    }

    /// Next operating state for `snapshot` at `now`
    pub fn step(&mut self, snapshot: &ThermostatSnapshot, now: Instant) -> OperatingState {
        match self.phase {
            Phase::SpinUp { to, until } => {
                if now < until {
                    return OperatingState::Transition;
                }
                self.phase = Phase::Steady;
                let still_allowed = match to {
                    OperatingState::Heating => snapshot.mode.allows_heating(),
                    OperatingState::Cooling => snapshot.mode.allows_cooling(),
                    _ => true,
                };
                if snapshot.enabled && still_allowed {
                    to
                } else {
                    self.begin_purge(now)
                }
            }
            Phase::Purge { until } => {
                if now < until {
                    return OperatingState::Transition;
                }
                self.phase = Phase::Steady;
                resting_state(snapshot.enabled)
            }
            Phase::Steady => self.steady_step(snapshot, now),
        }
    }

    fn steady_step(&mut self, snapshot: &ThermostatSnapshot, now: Instant) -> OperatingState {
        let diff = snapshot.current_temperature - snapshot.desired_temperature;
        let mode = snapshot.mode;

        match snapshot.operating_state {
            OperatingState::Idle if !snapshot.enabled => OperatingState::Disabled,
            OperatingState::Idle if diff >= START_THRESHOLD && mode.allows_cooling() => {
                self.begin_spin_up(OperatingState::Cooling, now)
            }
            OperatingState::Idle if diff <= -START_THRESHOLD && mode.allows_heating() => {
                self.begin_spin_up(OperatingState::Heating, now)
            }
            OperatingState::Idle => OperatingState::Idle,

            OperatingState::Heating => {
                let arrived = diff.abs() < STOP_TOLERANCE || diff > 0.0;
                if arrived || !snapshot.enabled || !mode.allows_heating() {
                    self.begin_purge(now)
                } else {
                    OperatingState::Heating
                }
            }
            OperatingState::Cooling => {
                let arrived = diff.abs() < STOP_TOLERANCE || diff < 0.0;
                if arrived || !snapshot.enabled || !mode.allows_cooling() {
                    self.begin_purge(now)
                } else {
                    OperatingState::Cooling
                }
            }

            // nothing here runs the fan alone; a stray transition (for
            // example after a restart) settles immediately
            OperatingState::Disabled
            | OperatingState::FanOnly
            | OperatingState::Transition => resting_state(snapshot.enabled),
        }
    }

    fn begin_spin_up(&mut self, to: OperatingState, now: Instant) -> OperatingState {
        self.phase = Phase::SpinUp {
            to,
            until: now + self.config.spin_up,
        };
        OperatingState::Transition
    }

    fn begin_purge(&mut self, now: Instant) -> OperatingState {
        self.phase = Phase::Purge {
            until: now + self.config.purge,
        };
        OperatingState::Transition
    }
}

fn resting_state(enabled: bool) -> OperatingState {
    if enabled {
        OperatingState::Idle
    } else {
        OperatingState::Disabled
    }
}

/// Minutes to target from the smoothed temperature's rate of change
#[derive(Debug, Clone, Default)]
pub struct EtaEstimator {
    previous: Option<(f64, Instant)>,
}

impl EtaEstimator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed the latest smoothed temperature and get the estimate for `snapshot`
    pub fn update(
        &mut self,
        smoothed: f64,
        now: Instant,
        snapshot: &ThermostatSnapshot,
        state: OperatingState,
    ) -> Option<f64> {
        let previous = self.previous.replace((smoothed, now));
        let (last, at) = previous?;

        let elapsed_minutes = now.saturating_duration_since(at).as_secs_f64() / 60.0;
        if elapsed_minutes <= 0.0 {
            return None;
        }
        let rate = (smoothed - last) / elapsed_minutes;
        let remaining = snapshot.desired_temperature - smoothed;

        let moving_toward_target = match state {
            OperatingState::Heating => remaining > 0.0 && rate > 0.0,
            OperatingState::Cooling => remaining < 0.0 && rate < 0.0,
            _ => false,
        };
        if !moving_toward_target {
            return None;
        }

        Some(remaining / rate)
    }
}

/// The running control loop
pub struct ClimateLoop<S> {
    sync: ControllerSynchronizer,
    history: HistoryStore,
    sensor: S,
    controller: ClimateController,
    window: SmoothingWindow,
    eta: EtaEstimator,
    config: ClimateConfig,
}

impl<S: SensorSource> ClimateLoop<S> {
    pub fn new(
        config: ClimateConfig,
        sync: ControllerSynchronizer,
        history: HistoryStore,
        sensor: S,
    ) -> Self {
        Self {
            sync,
            history,
            sensor,
            controller: ClimateController::new(config),
            window: SmoothingWindow::new(SMOOTHING_WINDOW),
            eta: EtaEstimator::new(),
            config,
        }
    }

    /// Run until cancelled
    pub async fn run(mut self, cancel: CancellationToken) {
        let mut interval = tokio::time::interval(self.config.tick);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let commands = self.sync.command_notifier();

        tracing::info!(tick_ms = self.config.tick.as_millis() as u64, "Climate loop started");

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = interval.tick() => self.tick(Instant::now()),
                _ = commands.notified() => self.decide(Instant::now(), None),
            }
        }

        tracing::info!("Climate loop stopped");
    }

    /// Read the sensor, record the reading and decide the next state
    pub fn tick(&mut self, now: Instant) {
        let reading = match self.sensor.read() {
            Ok(reading) => reading,
            Err(e) => {
                tracing::warn!(error = %e, "Sensor read failed, skipping tick");
                self.decide(now, None);
                return;
            }
        };

        self.window.push(reading.temperature);
        self.history.record(HistoryRecord::new(
            unix_seconds(),
            reading.temperature,
            reading.humidity,
        ));

        let smoothed = self.window.mean().unwrap_or(reading.temperature);
        self.sync.record_reading(smoothed, reading.humidity);
        self.decide(now, Some(smoothed));
    }

    fn decide(&mut self, now: Instant, smoothed: Option<f64>) {
        let snapshot = self.sync.snapshot();
        let next = self.controller.step(&snapshot, now);
        let time_to_target = match smoothed {
            Some(smoothed) => self.eta.update(smoothed, now, &snapshot, next),
            None => snapshot.time_to_target_minutes,
        };

        match self.sync.update_operating_state(next, time_to_target) {
            Ok(true) => self.sensor.observe_equipment(next),
            Ok(false) => {}
            // the enabled flag moved under us; the next step recomputes
            Err(e) => tracing::debug!(error = %e, "Operating state write rejected"),
        }
    }
}

fn unix_seconds() -> f64 {
    chrono::Utc::now().timestamp_millis() as f64 / 1000.0
}
