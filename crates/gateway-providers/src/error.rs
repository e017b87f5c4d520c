//! Error types for adapters and forwarders.
//!
//! Transient I/O trouble (decoder crashes, socket drops) is handled inside
//! the components and never shows up here. These errors cover misuse and
//! the few operations a caller can act on.

use thiserror::Error;

/// Errors from the adapter registry and adapter lifecycle.
#[derive(Debug, Error)]
pub enum AdapterError {
    /// No adapter with this id is registered.
    #[error("Adapter not registered: {0}")]
    NotFound(String),

    /// The adapter could not be started and will not retry by itself.
    #[error("Adapter {id} failed to start: {message}")]
    Start { id: String, message: String },
}

/// Errors from the forwarders.
#[derive(Debug, Error)]
pub enum ForwarderError {
    /// Local datagram socket could not be opened.
    #[error("Failed to bind UDP socket: {0}")]
    Bind(#[from] std::io::Error),

    /// The forwarder has not been started (or was stopped).
    #[error("Forwarder is not running")]
    NotRunning,
}
