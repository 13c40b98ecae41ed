//! Background services behind the sync server
//!
//! - [`climate`]: the HVAC control loop
//! - [`heartbeat`]: the periodic snapshot broadcast
//! - [`sensor`]: the sensor boundary and a simulated room
//! - [`history`]: the rolling chart buffer served by `/data`

pub mod climate;
pub mod heartbeat;
pub mod history;
pub mod sensor;

pub use climate::{ClimateController, ClimateLoop};
pub use heartbeat::run_heartbeat;
pub use history::{HistoryBuffer, HistoryStore};
pub use sensor::{Reading, SensorError, SensorSource, SimulatedSensor};
