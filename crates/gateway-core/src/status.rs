//! Status snapshots published by adapters and the AIS supervisor.
//!
//! Both types are plain values: producers replace them wholesale on each
//! transition and consumers only ever receive copies.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Connection state of a sensor adapter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AdapterState {
    Disconnected,
    Connecting,
    Connected,
    Error,
}

impl std::fmt::Display for AdapterState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            AdapterState::Disconnected => "disconnected",
            AdapterState::Connecting => "connecting",
            AdapterState::Connected => "connected",
            AdapterState::Error => "error",
        };
        f.write_str(s)
    }
}

/// Adapter status as seen by subscribers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdapterStatus {
    pub state: AdapterState,
    pub last_change: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
}

impl AdapterStatus {
    /// Status with the given state, stamped now.
    pub fn new(state: AdapterState) -> Self {
        Self {
            state,
            last_change: Utc::now(),
            last_error: None,
        }
    }

    /// Error status carrying a reason, stamped now.
    pub fn error(reason: impl Into<String>) -> Self {
        Self {
            state: AdapterState::Error,
            last_change: Utc::now(),
            last_error: Some(reason.into()),
        }
    }

    pub fn disconnected() -> Self {
        Self::new(AdapterState::Disconnected)
    }

    pub fn connecting() -> Self {
        Self::new(AdapterState::Connecting)
    }

    pub fn connected() -> Self {
        Self::new(AdapterState::Connected)
    }
}

impl Default for AdapterStatus {
    fn default() -> Self {
        Self::disconnected()
    }
}

/// Health snapshot of the AIS decoder supervisor.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AisGatewayStatus {
    /// Whether a decoder process is currently alive.
    pub running: bool,

    /// When the current (or last) decoder process was spawned.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_start: Option<DateTime<Utc>>,

    /// When the last valid sentence was seen.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_nmea_at: Option<DateTime<Utc>>,

    /// Spawn failures and process exits observed.
    pub errors_count: u64,

    /// Restarts performed by the backoff timer.
    pub restarts: u64,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub pid: Option<u32>,
}
