//! Chart backfill records served by `GET /data`

use serde::{Deserialize, Serialize};

/// One sensor reading as served to chart backfill polls
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HistoryRecord {
    /// Unix timestamp in seconds (fractional)
    pub time: f64,
    /// Temperature in degrees
    pub temp: f64,
    /// Relative humidity in percent
    pub humid: f64,
}

impl HistoryRecord {
    pub fn new(time: f64, temp: f64, humid: f64) -> Self {
        Self { time, temp, humid }
    }
}
