//! Client configuration

use std::time::Duration;

use thermo_shared_config::{
    get_env_or_default, parse_env, parse_env_opt, CommonConfig, ConfigError, ConfigResult,
    Environment,
};
use url::Url;

use crate::transport::ReconnectConfig;

pub const DEFAULT_URL: &str = "ws://127.0.0.1:5000/ws";

/// Client configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub common: CommonConfig,

    /// Controller WebSocket endpoint
    pub url: Url,

    /// Base URL for `/data` backfill (derived from `url` when unset)
    pub history_url: Url,

    pub reconnect: ReconnectConfig,

    /// Interval between history polls (default: 30s)
    pub history_poll: Duration,
}

impl ClientConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> ConfigResult<Self> {
        let common = CommonConfig::from_env()?;

        let url = parse_url("THERMO_URL", &get_env_or_default("THERMO_URL", DEFAULT_URL))?;
        if !matches!(url.scheme(), "ws" | "wss") {
            return Err(ConfigError::InvalidUrl(
                "THERMO_URL".to_string(),
                format!("expected a ws:// or wss:// url, got '{}'", url),
            ));
        }

        let history_url = match std::env::var("THERMO_HISTORY_URL") {
            Ok(raw) if !raw.trim().is_empty() => parse_url("THERMO_HISTORY_URL", raw.trim())?,
            _ => derive_history_url(&url)?,
        };

        let initial_ms: u64 = parse_env("RECONNECT_INITIAL_MS", 1000)?;
        let max_ms: u64 = parse_env("RECONNECT_MAX_MS", 30_000)?;
        if initial_ms == 0 || initial_ms > max_ms {
            return Err(ConfigError::ValidationError(format!(
                "RECONNECT_INITIAL_MS ({}) must be positive and at most RECONNECT_MAX_MS ({})",
                initial_ms, max_ms
            )));
        }

        let poll_secs: u64 = parse_env("HISTORY_POLL_SECS", 30)?;
        if poll_secs == 0 {
            return Err(ConfigError::ValidationError(
                "HISTORY_POLL_SECS must be greater than zero".to_string(),
            ));
        }

        Ok(Self {
            common,
            url,
            history_url,
            reconnect: ReconnectConfig {
                initial_delay: Duration::from_millis(initial_ms),
                max_delay: Duration::from_millis(max_ms),
                max_retries: parse_env_opt("RECONNECT_MAX_RETRIES")?,
            },
            history_poll: Duration::from_secs(poll_secs),
        })
    }

    pub fn namespace(&self) -> &str {
        &self.common.namespace
    }

    pub fn environment(&self) -> Environment {
        self.common.environment
    }
}

fn parse_url(name: &str, raw: &str) -> ConfigResult<Url> {
    Url::parse(raw).map_err(|e| ConfigError::InvalidUrl(name.to_string(), e.to_string()))
}

/// `ws://host:port/ws` → `http://host:port/`
pub fn derive_history_url(ws_url: &Url) -> ConfigResult<Url> {
    let scheme = if ws_url.scheme() == "wss" { "https" } else { "http" };
    let mut base = ws_url.clone();
    // ws → http is a special-to-special scheme change, which url permits
    base.set_scheme(scheme).map_err(|_| {
        ConfigError::InvalidUrl(
            "THERMO_URL".to_string(),
            format!("cannot derive a history url from '{}'", ws_url),
        )
    })?;
    base.set_path("/");
    base.set_query(None);
    base.set_fragment(None);
    Ok(base)
}
