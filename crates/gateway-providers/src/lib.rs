//! # gateway-providers
//!
//! Sensor adapters and forwarders for the gateway.
//!
//! This crate provides:
//! - The [`SensorAdapter`] contract and status subscriptions
//! - [`AdapterRegistry`] for known adapters
//! - UDP and TCP forwarders towards a Signal K listener
//! - [`AisGateway`], which supervises the `rtl_ais` decoder
//!
//! Everything here runs on tokio. Pure logic lives in `gateway-core`.

pub mod adapter;
pub mod ais;
pub mod error;
pub mod forwarder;
pub mod registry;
pub mod status;

pub use adapter::SensorAdapter;
pub use ais::{AisGateway, SupervisorOptions, AIS_ADAPTER_ID};
pub use error::{AdapterError, ForwarderError};
pub use forwarder::{
    ConnectionState, Forwarder, TcpForwarder, TcpForwarderOptions, UdpForwarder,
};
pub use registry::{AdapterInfo, AdapterRegistration, AdapterRegistry};
pub use status::{StatusPublisher, StatusSubscription};
