//! Adapter kinds and their declared configuration.
//!
//! Only the AIS pipeline has behavior today. The serial and CAN kinds are
//! declarations that future adapters will conform to.

use serde::{Deserialize, Serialize};

/// Family of sensor source behind an adapter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum AdapterKind {
    /// NMEA 0183 over a serial port.
    Nmea0183Serial,
    /// NMEA 2000 over a CAN interface.
    Nmea2000Can,
    /// AIS via an SDR decoder subprocess.
    Ais,
    /// Vendor-specific serial protocol.
    CustomSerial,
}

impl std::fmt::Display for AdapterKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            AdapterKind::Nmea0183Serial => "NMEA0183",
            AdapterKind::Nmea2000Can => "NMEA2000",
            AdapterKind::Ais => "AIS",
            AdapterKind::CustomSerial => "custom-serial",
        };
        f.write_str(s)
    }
}

/// Serial NMEA 0183 source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Nmea0183SerialConfig {
    pub port: String,
    pub baud_rate: u32,
}

impl Default for Nmea0183SerialConfig {
    fn default() -> Self {
        Self {
            port: "/dev/ttyUSB0".to_string(),
            baud_rate: 4800,
        }
    }
}

/// CAN NMEA 2000 source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Nmea2000CanConfig {
    pub interface: String,
}

impl Default for Nmea2000CanConfig {
    fn default() -> Self {
        Self {
            interface: "can0".to_string(),
        }
    }
}

/// Custom serial source with its own record delimiter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomSerialConfig {
    pub port: String,
    pub baud_rate: u32,
    pub delimiter: String,
}
