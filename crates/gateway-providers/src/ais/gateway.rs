//! AisGateway - public handle to the decoder supervisor.

use std::sync::Arc;

use async_trait::async_trait;
use gateway_core::{AdapterKind, AdapterStatus, AisGatewayStatus, GatewayConfig};
use tokio::sync::{mpsc, watch, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, error};

use super::supervisor::{Supervisor, SupervisorCommand, SupervisorOptions};
use crate::adapter::SensorAdapter;
use crate::error::AdapterError;
use crate::status::{StatusPublisher, StatusSubscription};

/// Registry id of the AIS adapter.
pub const AIS_ADAPTER_ID: &str = "ais";

struct RunningSupervisor {
    commands: mpsc::Sender<SupervisorCommand>,
    task: JoinHandle<Supervisor>,
}

#[derive(Default)]
struct Lifecycle {
    /// Supervisor state kept between runs (restart backoff, forwarder).
    idle: Option<Supervisor>,
    running: Option<RunningSupervisor>,
}

/// Supervises the `rtl_ais` decoder and forwards its sentences downstream.
///
/// `start` and `stop` are idempotent and may be called from any task.
/// Counters in [`AisGatewayStatus`] survive stop/start cycles.
pub struct AisGateway {
    config: Arc<GatewayConfig>,
    options: SupervisorOptions,
    status_tx: Arc<watch::Sender<AisGatewayStatus>>,
    status_rx: watch::Receiver<AisGatewayStatus>,
    adapter_status: Arc<StatusPublisher>,
    lifecycle: Mutex<Lifecycle>,
}

impl AisGateway {
    pub fn new(config: GatewayConfig) -> Self {
        Self::with_options(config, SupervisorOptions::default())
    }

    pub fn with_options(config: GatewayConfig, options: SupervisorOptions) -> Self {
        let (status_tx, status_rx) = watch::channel(AisGatewayStatus::default());
        Self {
            config: Arc::new(config),
            options,
            status_tx: Arc::new(status_tx),
            status_rx,
            adapter_status: Arc::new(StatusPublisher::new()),
            lifecycle: Mutex::new(Lifecycle::default()),
        }
    }

    /// Start the forwarder and the decoder. No-op while a decoder is alive.
    pub async fn start(&self) {
        let mut lifecycle = self.lifecycle.lock().await;

        if let Some(running) = lifecycle.running.take() {
            if !running.task.is_finished() {
                let _ = running.commands.send(SupervisorCommand::Start).await;
                lifecycle.running = Some(running);
                return;
            }
            lifecycle.idle = self.reclaim(running).await;
        }

        let supervisor = match lifecycle.idle.take() {
            Some(supervisor) => supervisor,
            None => self.build_supervisor(),
        };
        let (commands, rx) = mpsc::channel(8);
        let task = tokio::spawn(supervisor.run(rx));
        lifecycle.running = Some(RunningSupervisor { commands, task });
    }

    /// Interrupt the decoder, kill it after the grace period, stop forwarding.
    ///
    /// Always completes, even if the decoder ignores the interrupt.
    pub async fn stop(&self) {
        let mut lifecycle = self.lifecycle.lock().await;
        let Some(running) = lifecycle.running.take() else {
            return;
        };
        let _ = running.commands.send(SupervisorCommand::Stop).await;
        lifecycle.idle = self.reclaim(running).await;
    }

    /// Copy of the current supervisor status.
    pub fn status(&self) -> AisGatewayStatus {
        self.status_rx.borrow().clone()
    }

    /// Watch supervisor status changes.
    pub fn watch_status(&self) -> watch::Receiver<AisGatewayStatus> {
        self.status_rx.clone()
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    async fn reclaim(&self, running: RunningSupervisor) -> Option<Supervisor> {
        match running.task.await {
            Ok(supervisor) => Some(supervisor),
            Err(e) => {
                error!("AIS supervisor task failed: {}", e);
                None
            }
        }
    }

    fn build_supervisor(&self) -> Supervisor {
        debug!("Creating AIS supervisor");
        Supervisor::new(
            self.config.clone(),
            self.options.clone(),
            self.status_tx.clone(),
            self.adapter_status.clone(),
        )
    }
}

#[async_trait]
impl SensorAdapter for AisGateway {
    fn id(&self) -> &str {
        AIS_ADAPTER_ID
    }

    fn kind(&self) -> AdapterKind {
        AdapterKind::Ais
    }

    async fn start(&self) -> Result<(), AdapterError> {
        AisGateway::start(self).await;
        Ok(())
    }

    async fn stop(&self) {
        AisGateway::stop(self).await;
    }

    fn status(&self) -> AdapterStatus {
        self.adapter_status.current()
    }

    fn on_status(&self) -> StatusSubscription {
        self.adapter_status.subscribe()
    }
}
