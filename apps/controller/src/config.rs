//! Controller configuration

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;

use thermo_shared_config::{parse_env, CommonConfig, ConfigError, ConfigResult, Environment};

/// Bounds on the heartbeat interval, in milliseconds
const HEARTBEAT_INTERVAL_RANGE_MS: std::ops::RangeInclusive<u64> = 250..=60_000;

/// Inclusive range accepted for `SetDesiredTemperature`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TemperatureRange {
    pub min: f64,
    pub max: f64,
}

impl TemperatureRange {
    pub fn contains(&self, value: f64) -> bool {
        value.is_finite() && value >= self.min && value <= self.max
    }
}

impl Default for TemperatureRange {
    fn default() -> Self {
        Self {
            min: 40.0,
            max: 90.0,
        }
    }
}

/// Timing of the HVAC control loop
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClimateConfig {
    /// Interval between sensor reads and control decisions
    pub tick: Duration,

    /// Fan spin-up before heating or cooling starts
    pub spin_up: Duration,

    /// Equipment purge after heating or cooling stops
    pub purge: Duration,
}

impl Default for ClimateConfig {
    fn default() -> Self {
        Self {
            tick: Duration::from_millis(2250),
            spin_up: Duration::from_secs(10),
            purge: Duration::from_secs(45),
        }
    }
}

/// Controller configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    /// Common configuration shared with clients
    pub common: CommonConfig,

    /// HTTP/WebSocket port (default: 5000)
    pub port: u16,

    /// Bind address (default: 0.0.0.0)
    pub bind_addr: IpAddr,

    /// Full-snapshot heartbeat interval (default: 2s)
    pub heartbeat_interval: Duration,

    /// Accepted desired temperature range (default: 40..=90)
    pub temperature_range: TemperatureRange,

    /// Desired temperature at process start (default: 75)
    pub default_desired_temperature: f64,

    /// Also emit the `tempHeartbeat` tick alongside each heartbeat
    pub legacy_temp_ticks: bool,

    pub climate: ClimateConfig,

    /// CORS allowed origins for the HTTP routes (optional)
    pub cors_allowed_origins: Option<Vec<String>>,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> ConfigResult<Self> {
        let common = CommonConfig::from_env()?;

        let heartbeat_ms: u64 = parse_env("HEARTBEAT_INTERVAL_MS", 2000)?;
        if !HEARTBEAT_INTERVAL_RANGE_MS.contains(&heartbeat_ms) {
            return Err(ConfigError::ValidationError(format!(
                "HEARTBEAT_INTERVAL_MS must be within {}..={}, got {}",
                HEARTBEAT_INTERVAL_RANGE_MS.start(),
                HEARTBEAT_INTERVAL_RANGE_MS.end(),
                heartbeat_ms
            )));
        }

        let temperature_range = TemperatureRange {
            min: parse_env("TEMP_MIN", 40.0)?,
            max: parse_env("TEMP_MAX", 90.0)?,
        };
        if !(temperature_range.min.is_finite()
            && temperature_range.max.is_finite()
            && temperature_range.min < temperature_range.max)
        {
            return Err(ConfigError::ValidationError(format!(
                "TEMP_MIN ({}) must be below TEMP_MAX ({})",
                temperature_range.min, temperature_range.max
            )));
        }

        let default_desired_temperature = parse_env("DEFAULT_DESIRED_TEMP", 75.0)?;
        if !temperature_range.contains(default_desired_temperature) {
            return Err(ConfigError::ValidationError(format!(
                "DEFAULT_DESIRED_TEMP ({}) must lie within {}..={}",
                default_desired_temperature, temperature_range.min, temperature_range.max
            )));
        }

        let climate = ClimateConfig {
            tick: Duration::from_millis(parse_env("CLIMATE_TICK_MS", 2250)?),
            spin_up: Duration::from_secs(parse_env("SPIN_UP_SECS", 10)?),
            purge: Duration::from_secs(parse_env("PURGE_SECS", 45)?),
        };
        if climate.tick.is_zero() {
            return Err(ConfigError::ValidationError(
                "CLIMATE_TICK_MS must be greater than zero".to_string(),
            ));
        }

        Ok(Self {
            common,
            port: parse_env("PORT", 5000)?,
            bind_addr: parse_env("BIND_ADDR", IpAddr::V4(Ipv4Addr::UNSPECIFIED))?,
            heartbeat_interval: Duration::from_millis(heartbeat_ms),
            temperature_range,
            default_desired_temperature,
            legacy_temp_ticks: parse_env("LEGACY_TEMP_TICKS", true)?,
            climate,
            cors_allowed_origins: std::env::var("CORS_ORIGINS").ok().map(|s| {
                s.split(',')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect()
            }),
        })
    }

    /// Socket address to listen on
    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind_addr, self.port)
    }

    pub fn namespace(&self) -> &str {
        &self.common.namespace
    }

    pub fn environment(&self) -> Environment {
        self.common.environment
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            common: CommonConfig {
                environment: Environment::Development,
                namespace: thermo_shared_config::DEFAULT_NAMESPACE.to_string(),
            },
            port: 5000,
            bind_addr: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            heartbeat_interval: Duration::from_secs(2),
            temperature_range: TemperatureRange::default(),
            default_desired_temperature: 75.0,
            legacy_temp_ticks: true,
            climate: ClimateConfig::default(),
            cors_allowed_origins: None,
        }
    }
}
