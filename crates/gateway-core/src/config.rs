//! Gateway configuration loaded from the environment.
//!
//! Parsing is forgiving: a missing, blank, unparsable or out-of-domain value
//! falls back to its default and is reported in [`ConfigLoad::fallbacks`].
//! Loading never fails, so a typo in one variable cannot keep the gateway
//! from starting.

use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use thiserror::Error;

/// Environment variable names.
pub mod keys {
    pub const RTL_AIS_PATH: &str = "RTL_AIS_PATH";
    pub const DEVICE_INDEX: &str = "AIS_DEVICE_INDEX";
    pub const PPM: &str = "AIS_PPM";
    pub const GAIN: &str = "AIS_GAIN";
    pub const EDGE_TUNING: &str = "AIS_EDGE_TUNING";
    pub const FORWARD_MODE: &str = "AIS_FORWARD_MODE";
    pub const SIGNALK_HOST: &str = "SIGNALK_HOST";
    pub const SIGNALK_PORT: &str = "SIGNALK_PORT";
    pub const LOG_NMEA: &str = "AIS_LOG_NMEA";
    pub const HEALTH_ADDR: &str = "GATEWAY_HEALTH_ADDR";
}

/// Why a configured value was rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("value is blank")]
    Blank,

    #[error("'{0}' is not an integer")]
    InvalidInteger(String),

    #[error("'{0}' is not a finite number")]
    InvalidNumber(String),

    #[error("'{0}' is not a boolean")]
    InvalidBool(String),

    #[error("{value} is outside {min}..={max}")]
    OutOfRange { value: i64, min: i64, max: i64 },

    #[error("unknown forward mode '{0}' (expected udp or tcp)")]
    UnknownForwardMode(String),

    #[error("'{0}' is not a socket address")]
    InvalidSocketAddr(String),
}

/// Transport used to reach the downstream Signal K listener.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ForwardMode {
    #[default]
    Udp,
    Tcp,
}

impl std::str::FromStr for ForwardMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "udp" => Ok(ForwardMode::Udp),
            "tcp" => Ok(ForwardMode::Tcp),
            _ => Err(ConfigError::UnknownForwardMode(s.to_string())),
        }
    }
}

impl std::fmt::Display for ForwardMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ForwardMode::Udp => f.write_str("udp"),
            ForwardMode::Tcp => f.write_str("tcp"),
        }
    }
}

/// Immutable gateway settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GatewayConfig {
    /// Decoder executable.
    pub rtl_ais_path: String,
    /// SDR device index passed as `-d`.
    pub device_index: u32,
    /// Frequency correction passed as `-p`.
    pub ppm: i32,
    /// Tuner gain passed as `-g`.
    pub gain: f64,
    /// Adds `-E` when set.
    pub edge_tuning: bool,
    pub forward_mode: ForwardMode,
    pub signalk_host: String,
    pub signalk_port: u16,
    /// Log every forwarded sentence.
    pub log_nmea: bool,
    /// Optional bind address for the HTTP health endpoint.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub health_addr: Option<SocketAddr>,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            rtl_ais_path: "rtl_ais.exe".to_string(),
            device_index: 1,
            ppm: -8,
            gain: 49.0,
            edge_tuning: false,
            forward_mode: ForwardMode::Udp,
            signalk_host: "127.0.0.1".to_string(),
            signalk_port: 10110,
            log_nmea: false,
            health_addr: None,
        }
    }
}

/// A value that was present but rejected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigFallback {
    pub key: &'static str,
    pub value: String,
    pub error: ConfigError,
}

/// Result of loading: the config plus every fallback that was applied.
#[derive(Debug, Clone)]
pub struct ConfigLoad {
    pub config: GatewayConfig,
    pub fallbacks: Vec<ConfigFallback>,
}

impl GatewayConfig {
    /// Load from the process environment.
    pub fn from_env() -> ConfigLoad {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load using an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> ConfigLoad
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut loader = Loader {
            lookup,
            fallbacks: Vec::new(),
        };
        let defaults = GatewayConfig::default();

        let config = GatewayConfig {
            rtl_ais_path: loader
                .get(keys::RTL_AIS_PATH, parse_string)
                .unwrap_or(defaults.rtl_ais_path),
            device_index: loader
                .get(keys::DEVICE_INDEX, |v| {
                    parse_ranged(v, 0, i64::from(u32::MAX)).map(|n| n as u32)
                })
                .unwrap_or(defaults.device_index),
            ppm: loader
                .get(keys::PPM, |v| {
                    parse_ranged(v, i64::from(i32::MIN), i64::from(i32::MAX)).map(|n| n as i32)
                })
                .unwrap_or(defaults.ppm),
            gain: loader
                .get(keys::GAIN, parse_number)
                .unwrap_or(defaults.gain),
            edge_tuning: loader
                .get(keys::EDGE_TUNING, parse_bool)
                .unwrap_or(defaults.edge_tuning),
            forward_mode: loader
                .get(keys::FORWARD_MODE, |v| v.parse::<ForwardMode>())
                .unwrap_or(defaults.forward_mode),
            signalk_host: loader
                .get(keys::SIGNALK_HOST, parse_string)
                .unwrap_or(defaults.signalk_host),
            signalk_port: loader
                .get(keys::SIGNALK_PORT, |v| parse_ranged(v, 1, 65535).map(|n| n as u16))
                .unwrap_or(defaults.signalk_port),
            log_nmea: loader
                .get(keys::LOG_NMEA, parse_bool)
                .unwrap_or(defaults.log_nmea),
            health_addr: loader.get(keys::HEALTH_ADDR, |v| {
                v.parse::<SocketAddr>()
                    .map_err(|_| ConfigError::InvalidSocketAddr(v.to_string()))
            }),
        };

        ConfigLoad {
            config,
            fallbacks: loader.fallbacks,
        }
    }

    /// Command-line arguments for the decoder: `-d N -p N -g N -n [-E]`.
    pub fn decoder_args(&self) -> Vec<String> {
        let mut args = vec![
            "-d".to_string(),
            self.device_index.to_string(),
            "-p".to_string(),
            self.ppm.to_string(),
            "-g".to_string(),
            self.gain.to_string(),
            "-n".to_string(),
        ];
        if self.edge_tuning {
            args.push("-E".to_string());
        }
        args
    }

    /// `host:port` of the downstream listener.
    pub fn signalk_target(&self) -> String {
        format!("{}:{}", self.signalk_host, self.signalk_port)
    }
}

struct Loader<F> {
    lookup: F,
    fallbacks: Vec<ConfigFallback>,
}

impl<F> Loader<F>
where
    F: Fn(&str) -> Option<String>,
{
    /// `None` when unset, blank, or rejected; rejections are recorded.
    fn get<T>(
        &mut self,
        key: &'static str,
        parse: impl FnOnce(&str) -> Result<T, ConfigError>,
    ) -> Option<T> {
        let raw = (self.lookup)(key)?;
        let value = raw.trim();
        if value.is_empty() {
            return None;
        }
        match parse(value) {
            Ok(v) => Some(v),
            Err(error) => {
                self.fallbacks.push(ConfigFallback {
                    key,
                    value: raw.clone(),
                    error,
                });
                None
            }
        }
    }
}

fn parse_string(value: &str) -> Result<String, ConfigError> {
    if value.is_empty() {
        return Err(ConfigError::Blank);
    }
    Ok(value.to_string())
}

fn parse_ranged(value: &str, min: i64, max: i64) -> Result<i64, ConfigError> {
    let n: i64 = value
        .parse()
        .map_err(|_| ConfigError::InvalidInteger(value.to_string()))?;
    if n < min || n > max {
        return Err(ConfigError::OutOfRange { value: n, min, max });
    }
    Ok(n)
}

fn parse_number(value: &str) -> Result<f64, ConfigError> {
    match value.parse::<f64>() {
        Ok(n) if n.is_finite() => Ok(n),
        _ => Err(ConfigError::InvalidNumber(value.to_string())),
    }
}

fn parse_bool(value: &str) -> Result<bool, ConfigError> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidBool(value.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::collections::HashMap;

    fn load(vars: &[(&str, &str)]) -> ConfigLoad {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        GatewayConfig::from_lookup(|key| map.get(key).cloned())
    }

    #[test]
    fn test_empty_environment_yields_defaults() {
        let loaded = load(&[]);
        assert_eq!(loaded.config, GatewayConfig::default());
        assert!(loaded.fallbacks.is_empty());
    }

    #[test]
    fn test_all_values_parsed() {
        let loaded = load(&[
            (keys::RTL_AIS_PATH, "/usr/local/bin/rtl_ais"),
            (keys::DEVICE_INDEX, "0"),
            (keys::PPM, "12"),
            (keys::GAIN, "42.1"),
            (keys::EDGE_TUNING, "true"),
            (keys::FORWARD_MODE, "TCP"),
            (keys::SIGNALK_HOST, "signalk.local"),
            (keys::SIGNALK_PORT, "10111"),
            (keys::LOG_NMEA, "yes"),
            (keys::HEALTH_ADDR, "127.0.0.1:8080"),
        ]);

        let cfg = loaded.config;
        assert_eq!(cfg.rtl_ais_path, "/usr/local/bin/rtl_ais");
        assert_eq!(cfg.device_index, 0);
        assert_eq!(cfg.ppm, 12);
        assert_eq!(cfg.gain, 42.1);
        assert!(cfg.edge_tuning);
        assert_eq!(cfg.forward_mode, ForwardMode::Tcp);
        assert_eq!(cfg.signalk_host, "signalk.local");
        assert_eq!(cfg.signalk_port, 10111);
        assert!(cfg.log_nmea);
        assert_eq!(cfg.health_addr, Some("127.0.0.1:8080".parse().unwrap()));
        assert!(loaded.fallbacks.is_empty());
    }

    #[test]
    fn test_non_numeric_gain_falls_back() {
        let loaded = load(&[(keys::GAIN, "loud")]);
        assert_eq!(loaded.config.gain, 49.0);
        assert_eq!(loaded.fallbacks.len(), 1);
        assert_eq!(loaded.fallbacks[0].key, keys::GAIN);
        assert_eq!(
            loaded.fallbacks[0].error,
            ConfigError::InvalidNumber("loud".to_string())
        );
    }

    #[test]
    fn test_unknown_forward_mode_falls_back_to_udp() {
        let loaded = load(&[(keys::FORWARD_MODE, "serial")]);
        assert_eq!(loaded.config.forward_mode, ForwardMode::Udp);
        assert_eq!(loaded.fallbacks[0].key, keys::FORWARD_MODE);
    }

    #[test]
    fn test_out_of_domain_values_fall_back() {
        let loaded = load(&[
            (keys::SIGNALK_PORT, "70000"),
            (keys::DEVICE_INDEX, "-1"),
            (keys::PPM, "3.5"),
            (keys::GAIN, "NaN"),
            (keys::EDGE_TUNING, "maybe"),
        ]);
        let cfg = &loaded.config;
        assert_eq!(cfg.signalk_port, 10110);
        assert_eq!(cfg.device_index, 1);
        assert_eq!(cfg.ppm, -8);
        assert_eq!(cfg.gain, 49.0);
        assert!(!cfg.edge_tuning);
        assert_eq!(loaded.fallbacks.len(), 5);
    }

    #[test]
    fn test_blank_values_use_defaults_silently() {
        let loaded = load(&[(keys::SIGNALK_HOST, "   "), (keys::RTL_AIS_PATH, "")]);
        assert_eq!(loaded.config.signalk_host, "127.0.0.1");
        assert_eq!(loaded.config.rtl_ais_path, "rtl_ais.exe");
        assert!(loaded.fallbacks.is_empty());
    }

    #[test]
    fn test_decoder_args() {
        let mut cfg = GatewayConfig::default();
        assert_eq!(cfg.decoder_args(), vec!["-d", "1", "-p", "-8", "-g", "49", "-n"]);

        cfg.edge_tuning = true;
        cfg.gain = 20.7;
        assert_eq!(
            cfg.decoder_args(),
            vec!["-d", "1", "-p", "-8", "-g", "20.7", "-n", "-E"]
        );
    }

    #[test]
    fn test_signalk_target() {
        assert_eq!(GatewayConfig::default().signalk_target(), "127.0.0.1:10110");
    }
}
