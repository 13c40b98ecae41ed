//! Sensor boundary
//!
//! The physical temperature/humidity sensor sits behind [`SensorSource`]. The
//! controller ships [`SimulatedSensor`], a small room model that reacts to the
//! equipment state, so the binary runs without hardware attached.

use thermo_protocol::OperatingState;
use thiserror::Error;

/// One raw sensor sample
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Reading {
    /// Degrees Fahrenheit
    pub temperature: f64,
    /// Relative humidity, percent
    pub humidity: f64,
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum SensorError {
    #[error("sensor read failed: {0}")]
    ReadFailed(String),

    #[error("sensor returned an implausible value: {0}")]
    Implausible(f64),
}

/// Source of temperature and humidity samples
pub trait SensorSource: Send + 'static {
    fn read(&mut self) -> Result<Reading, SensorError>;

    /// Equipment state changed. Sources that do not model the room ignore this.
    fn observe_equipment(&mut self, _state: OperatingState) {}
}

/// Degrees per read the equipment moves the room
const EQUIPMENT_RATE: f64 = 0.08;

/// Fraction of the indoor/outdoor gap closed per read
const LEAKAGE: f64 = 0.002;

/// Simulated room with a heat pump
#[derive(Debug, Clone)]
pub struct SimulatedSensor {
    temperature: f64,
    humidity: f64,
    outdoor: f64,
    equipment: OperatingState,
    reads: u64,
}

impl SimulatedSensor {
    pub fn new(indoor: f64, outdoor: f64, humidity: f64) -> Self {
        Self {
            temperature: indoor,
            humidity,
            outdoor,
            equipment: OperatingState::Disabled,
            reads: 0,
        }
    }

    /// Deterministic sensor noise of at most ±0.05°
    fn noise(&self) -> f64 {
        (self.reads as f64 * 1.7).sin() * 0.05
    }
}

impl Default for SimulatedSensor {
    fn default() -> Self {
        Self::new(72.0, 82.0, 45.0)
    }
}

impl SensorSource for SimulatedSensor {
    fn read(&mut self) -> Result<Reading, SensorError> {
        self.reads += 1;

        self.temperature += (self.outdoor - self.temperature) * LEAKAGE;
        match self.equipment {
            OperatingState::Heating => self.temperature += EQUIPMENT_RATE,
            OperatingState::Cooling => {
                self.temperature -= EQUIPMENT_RATE;
                self.humidity = (self.humidity - 0.01).max(20.0);
            }
            _ => {}
        }

        let temperature = self.temperature + self.noise();
        if !temperature.is_finite() {
            return Err(SensorError::Implausible(temperature));
        }

        Ok(Reading {
            temperature,
            humidity: self.humidity,
        })
    }

    fn observe_equipment(&mut self, state: OperatingState) {
        self.equipment = state;
    }
}
