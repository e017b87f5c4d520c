//! The sensor adapter contract.
//!
//! Every sensor source (serial NMEA 0183, CAN NMEA 2000, the AIS decoder,
//! vendor serial feeds) exposes the same lifecycle so the registry and the
//! binary can manage them uniformly.

use async_trait::async_trait;
use gateway_core::{AdapterKind, AdapterStatus};

use crate::error::AdapterError;
use crate::status::StatusSubscription;

/// Uniform start/stop/status lifecycle for a sensor source.
///
/// `start` and `stop` are idempotent. Recoverable runtime failures are
/// reported through status updates, not through `start`'s result.
#[async_trait]
pub trait SensorAdapter: Send + Sync {
    /// Stable identifier, used as the registry key.
    fn id(&self) -> &str;

    /// Source family.
    fn kind(&self) -> AdapterKind;

    /// Begin acquiring data.
    async fn start(&self) -> Result<(), AdapterError>;

    /// Stop acquiring data and release all resources. Always completes.
    async fn stop(&self);

    /// Snapshot of the current status.
    fn status(&self) -> AdapterStatus;

    /// Subscribe to future status transitions.
    fn on_status(&self) -> StatusSubscription;
}
