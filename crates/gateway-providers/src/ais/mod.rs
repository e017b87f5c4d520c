//! AIS ingestion: `rtl_ais` decoder supervision and sentence forwarding.
//!
//! Data flows one way:
//!
//! ```text
//! decoder stdout/stderr -> line framing -> classification -> Forwarder -> socket
//! ```
//!
//! Status flows back through [`AisGateway::status`] and the adapter
//! status subscription.

mod gateway;
mod reader;
mod supervisor;

pub use gateway::{AisGateway, AIS_ADAPTER_ID};
pub use supervisor::SupervisorOptions;
