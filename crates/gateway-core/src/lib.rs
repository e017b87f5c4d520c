//! # gateway-core
//!
//! Core types and pure logic for the sensor gateway.
//!
//! This crate provides:
//! - Gateway configuration and its environment loader
//! - Adapter and AIS supervisor status snapshots
//! - Adapter kind declarations
//! - Exponential backoff with jitter
//! - NMEA sentence shape classification and line framing
//! - The bounded outbound queue used while a link is down
//!
//! This crate is intentionally runtime-agnostic and contains no async code.
//! All I/O lives in `gateway-providers`.

pub mod adapter;
pub mod backoff;
pub mod config;
pub mod framing;
pub mod queue;
pub mod sentence;
pub mod status;

pub use adapter::*;
pub use backoff::{Backoff, BackoffConfig};
pub use config::{ConfigError, ConfigFallback, ConfigLoad, ForwardMode, GatewayConfig};
pub use framing::LineFramer;
pub use queue::{OutboundQueue, DEFAULT_QUEUE_CAPACITY};
pub use sentence::{classify_line, LineKind, Sentence};
pub use status::{AdapterState, AdapterStatus, AisGatewayStatus};
