//! Relay configuration.
//!
//! Every setting has a default matching the relay's historical behaviour and
//! can be overridden through the environment:
//!
//! | Variable | Default |
//! |---|---|
//! | `SIGHTING_RELAY_BIND` | `127.0.0.1:1337` |
//! | `SIGHTING_RELAY_REAPER_POLL_MS` | `500` |
//! | `SIGHTING_RELAY_REAPER_COOLDOWN_SECS` | `60` |
//! | `SIGHTING_RELAY_REGISTRY_CAPACITY` | `500` |
//! | `SIGHTING_RELAY_DRAIN_TIMEOUT_SECS` | unset (wait for every task) |
//! | `SIGHTING_RELAY_NOTIFIER` | `console` |
//!
//! The sighting path is not configurable.

use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;

use crate::dedupe::{DEFAULT_REGISTRY_CAPACITY, ReaperConfig};
use crate::notify::NotifierKind;

pub const ENV_BIND: &str = "SIGHTING_RELAY_BIND";
pub const ENV_REAPER_POLL_MS: &str = "SIGHTING_RELAY_REAPER_POLL_MS";
pub const ENV_REAPER_COOLDOWN_SECS: &str = "SIGHTING_RELAY_REAPER_COOLDOWN_SECS";
pub const ENV_REGISTRY_CAPACITY: &str = "SIGHTING_RELAY_REGISTRY_CAPACITY";
pub const ENV_DRAIN_TIMEOUT_SECS: &str = "SIGHTING_RELAY_DRAIN_TIMEOUT_SECS";
pub const ENV_NOTIFIER: &str = "SIGHTING_RELAY_NOTIFIER";

/// Default listen address.
const DEFAULT_BIND: ([u8; 4], u16) = ([127, 0, 0, 1], 1337);

/// A setting that could not be parsed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid value for {variable}: {value:?} ({reason})")]
pub struct ConfigError {
    pub variable: &'static str,
    pub value: String,
    pub reason: String,
}

/// Complete relay configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelayConfig {
    /// Address the HTTP listener binds to.
    pub bind: SocketAddr,

    /// Reaper cadence.
    pub reaper: ReaperConfig,

    /// Expected steady-state number of live encounters. Pre-sizing hint only.
    pub registry_capacity: usize,

    /// Upper bound on the shutdown drain. `None` waits for every task.
    pub drain_timeout: Option<Duration>,

    /// Downstream notifier.
    pub notifier: NotifierKind,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl RelayConfig {
    /// Creates a `RelayConfig` with default values.
    pub fn new() -> Self {
        RelayConfig {
            bind: SocketAddr::from(DEFAULT_BIND),
            reaper: ReaperConfig::new(),
            registry_capacity: DEFAULT_REGISTRY_CAPACITY,
            drain_timeout: None,
            notifier: NotifierKind::default(),
        }
    }

    /// Reads overrides from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Reads overrides through `lookup`. Unset or blank variables keep their defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let mut config = Self::new();

        if let Some(v) = get(ENV_BIND) {
            config.bind = parse(ENV_BIND, &v)?;
        }
        if let Some(v) = get(ENV_REAPER_POLL_MS) {
            let ms: u64 = parse(ENV_REAPER_POLL_MS, &v)?;
            if ms == 0 {
                return Err(invalid(ENV_REAPER_POLL_MS, &v, "must be positive"));
            }
            config.reaper.poll_interval = Duration::from_millis(ms);
        }
        if let Some(v) = get(ENV_REAPER_COOLDOWN_SECS) {
            config.reaper.cooldown = Duration::from_secs(parse(ENV_REAPER_COOLDOWN_SECS, &v)?);
        }
        if let Some(v) = get(ENV_REGISTRY_CAPACITY) {
            config.registry_capacity = parse(ENV_REGISTRY_CAPACITY, &v)?;
        }
        if let Some(v) = get(ENV_DRAIN_TIMEOUT_SECS) {
            config.drain_timeout = Some(Duration::from_secs(parse(ENV_DRAIN_TIMEOUT_SECS, &v)?));
        }
        if let Some(v) = get(ENV_NOTIFIER) {
            config.notifier = parse(ENV_NOTIFIER, &v)?;
        }

        Ok(config)
    }
}

fn parse<T>(variable: &'static str, value: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    value
        .trim()
        .parse()
        .map_err(|e: T::Err| invalid(variable, value, e.to_string()))
}

fn invalid(variable: &'static str, value: &str, reason: impl Into<String>) -> ConfigError {
    ConfigError {
        variable,
        value: value.to_string(),
        reason: reason.into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn default_config_has_expected_values() {
        let config = RelayConfig::new();

        assert_eq!(config.bind, "127.0.0.1:1337".parse().unwrap());
        assert_eq!(config.reaper.poll_interval, Duration::from_millis(500));
        assert_eq!(config.reaper.cooldown, Duration::from_secs(60));
        assert_eq!(config.registry_capacity, 500);
        assert_eq!(config.drain_timeout, None);
        assert_eq!(config.notifier, NotifierKind::Console);
    }

    #[test]
    fn empty_environment_yields_defaults() {
        assert_eq!(RelayConfig::from_lookup(lookup(&[])), Ok(RelayConfig::new()));
    }

    #[test]
    fn overrides_are_applied() {
        let config = RelayConfig::from_lookup(lookup(&[
            (ENV_BIND, "0.0.0.0:8080"),
            (ENV_REAPER_POLL_MS, "250"),
            (ENV_REAPER_COOLDOWN_SECS, "5"),
            (ENV_REGISTRY_CAPACITY, "10000"),
            (ENV_DRAIN_TIMEOUT_SECS, "30"),
            (ENV_NOTIFIER, "log"),
        ]))
        .unwrap();

        assert_eq!(config.bind, "0.0.0.0:8080".parse().unwrap());
        assert_eq!(config.reaper.poll_interval, Duration::from_millis(250));
        assert_eq!(config.reaper.cooldown, Duration::from_secs(5));
        assert_eq!(config.registry_capacity, 10_000);
        assert_eq!(config.drain_timeout, Some(Duration::from_secs(30)));
        assert_eq!(config.notifier, NotifierKind::Log);
    }

    #[test]
    fn blank_values_keep_defaults() {
        let config = RelayConfig::from_lookup(lookup(&[(ENV_BIND, "  ")])).unwrap();
        assert_eq!(config.bind, RelayConfig::new().bind);
    }

    #[test]
    fn zero_cooldown_is_allowed() {
        let config = RelayConfig::from_lookup(lookup(&[(ENV_REAPER_COOLDOWN_SECS, "0")])).unwrap();
        assert_eq!(config.reaper.cooldown, Duration::ZERO);
    }

    #[test]
    fn unparseable_value_names_the_variable() {
        let err = RelayConfig::from_lookup(lookup(&[(ENV_REGISTRY_CAPACITY, "lots")])).unwrap_err();

        assert_eq!(err.variable, ENV_REGISTRY_CAPACITY);
        assert_eq!(err.value, "lots");
        assert!(err.to_string().contains(ENV_REGISTRY_CAPACITY));
    }

    #[test]
    fn zero_poll_interval_is_rejected() {
        let err = RelayConfig::from_lookup(lookup(&[(ENV_REAPER_POLL_MS, "0")])).unwrap_err();
        assert_eq!(err.variable, ENV_REAPER_POLL_MS);
    }

    #[test]
    fn unknown_notifier_is_rejected() {
        let err = RelayConfig::from_lookup(lookup(&[(ENV_NOTIFIER, "pager")])).unwrap_err();
        assert_eq!(err.variable, ENV_NOTIFIER);
    }
}
