//! Registry of known sensor adapters.
//!
//! Registering an adapter only records it. Activation is explicit:
//! [`AdapterRegistry::start_enabled`] starts every registration whose
//! `enabled` flag is set and [`AdapterRegistry::stop_all`] tears everything
//! down. The `enabled` flag is declared intent, not evidence that the adapter
//! is running; look at the adapter's status for that.

use std::collections::HashMap;
use std::sync::Arc;

use gateway_core::{AdapterKind, AdapterStatus};
use serde::Serialize;
use tracing::{debug, error, info};

use crate::adapter::SensorAdapter;
use crate::error::AdapterError;

/// An adapter plus its registry metadata.
#[derive(Clone)]
pub struct AdapterRegistration {
    pub id: String,
    pub name: String,
    pub adapter: Arc<dyn SensorAdapter>,
    pub enabled: bool,
}

impl AdapterRegistration {
    /// Build a registration keyed by the adapter's own id.
    pub fn new(name: impl Into<String>, adapter: Arc<dyn SensorAdapter>, enabled: bool) -> Self {
        Self {
            id: adapter.id().to_string(),
            name: name.into(),
            adapter,
            enabled,
        }
    }
}

impl std::fmt::Debug for AdapterRegistration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdapterRegistration")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("kind", &self.adapter.kind())
            .field("enabled", &self.enabled)
            .finish()
    }
}

/// Serializable view of a registration.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AdapterInfo {
    pub id: String,
    pub name: String,
    pub kind: AdapterKind,
    pub enabled: bool,
    pub status: AdapterStatus,
}

/// Maps adapter id to registration.
#[derive(Default)]
pub struct AdapterRegistry {
    adapters: HashMap<String, AdapterRegistration>,
}

impl AdapterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a registration, replacing and returning any with the same id.
    ///
    /// Does not start the adapter.
    pub fn register(&mut self, registration: AdapterRegistration) -> Option<AdapterRegistration> {
        debug!(
            "Registering adapter {} ({}, enabled={})",
            registration.id, registration.name, registration.enabled
        );
        self.adapters.insert(registration.id.clone(), registration)
    }

    /// Remove a registration. Does not stop the adapter.
    pub fn unregister(&mut self, id: &str) -> Option<AdapterRegistration> {
        self.adapters.remove(id)
    }

    pub fn get(&self, id: &str) -> Option<&AdapterRegistration> {
        self.adapters.get(id)
    }

    /// Change the declared intent for an adapter without starting or stopping it.
    pub fn set_enabled(&mut self, id: &str, enabled: bool) -> Result<(), AdapterError> {
        let registration = self
            .adapters
            .get_mut(id)
            .ok_or_else(|| AdapterError::NotFound(id.to_string()))?;
        registration.enabled = enabled;
        Ok(())
    }

    /// Snapshot of all registrations, sorted by id.
    pub fn list_adapters(&self) -> Vec<AdapterInfo> {
        let mut list: Vec<AdapterInfo> = self
            .adapters
            .values()
            .map(|r| AdapterInfo {
                id: r.id.clone(),
                name: r.name.clone(),
                kind: r.adapter.kind(),
                enabled: r.enabled,
                status: r.adapter.status(),
            })
            .collect();
        list.sort_by(|a, b| a.id.cmp(&b.id));
        list
    }

    pub fn len(&self) -> usize {
        self.adapters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.adapters.is_empty()
    }

    /// Start one adapter by id, regardless of its `enabled` flag.
    pub async fn start(&self, id: &str) -> Result<(), AdapterError> {
        let registration = self
            .adapters
            .get(id)
            .ok_or_else(|| AdapterError::NotFound(id.to_string()))?;
        registration.adapter.start().await
    }

    /// Stop one adapter by id.
    pub async fn stop(&self, id: &str) -> Result<(), AdapterError> {
        let registration = self
            .adapters
            .get(id)
            .ok_or_else(|| AdapterError::NotFound(id.to_string()))?;
        registration.adapter.stop().await;
        Ok(())
    }

    /// Start every enabled adapter in id order.
    ///
    /// A failure does not stop the rest; the ids that failed are returned.
    pub async fn start_enabled(&self) -> Vec<String> {
        let mut failed = Vec::new();
        for registration in self.sorted() {
            if !registration.enabled {
                debug!("Adapter {} is disabled, not starting", registration.id);
                continue;
            }
            info!("Starting adapter {} ({})", registration.id, registration.name);
            if let Err(e) = registration.adapter.start().await {
                error!("{}", e);
                failed.push(registration.id.clone());
            }
        }
        failed
    }

    /// Stop every registered adapter, enabled or not.
    pub async fn stop_all(&self) {
        for registration in self.sorted() {
            debug!("Stopping adapter {}", registration.id);
            registration.adapter.stop().await;
        }
    }

    fn sorted(&self) -> Vec<&AdapterRegistration> {
        let mut regs: Vec<&AdapterRegistration> = self.adapters.values().collect();
        regs.sort_by(|a, b| a.id.cmp(&b.id));
        regs
    }
}
