//! The decoder supervisor task.
//!
//! One [`Supervisor`] owns the decoder child, its output readers, the
//! forwarder and the restart timer. It runs as a single task, so every
//! event (command, output line, process exit, timer) is handled one at a
//! time and no locking is needed.
//!
//! ```text
//! Stopped -> Starting -> Running -> RestartScheduled -> Starting
//!                           |
//!                           +-> Stopping -> Stopped
//! ```

use std::future::pending;
use std::pin::Pin;
use std::process::{ExitStatus, Stdio};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use gateway_core::{
    classify_line, AdapterState, AdapterStatus, AisGatewayStatus, Backoff, BackoffConfig,
    GatewayConfig, LineKind,
};
use tokio::process::{Child, Command};
use tokio::sync::{mpsc, watch};
use tokio::time::Sleep;
use tracing::{debug, error, info, warn};

use super::reader::{spawn_reader, OutputLine, OutputStream};
use crate::forwarder::{Forwarder, TcpForwarderOptions};
use crate::status::StatusPublisher;

/// Tuning for the AIS supervisor.
#[derive(Debug, Clone)]
pub struct SupervisorOptions {
    /// Delay policy between decoder restarts.
    pub restart_backoff: BackoffConfig,
    /// Options for the TCP forwarder when `forward_mode` is tcp.
    pub tcp: TcpForwarderOptions,
    /// How long `stop` waits after the interrupt before killing.
    pub stop_grace: Duration,
    /// Output lines buffered between the readers and the supervisor.
    pub line_buffer: usize,
}

impl Default for SupervisorOptions {
    fn default() -> Self {
        Self {
            restart_backoff: BackoffConfig::RESTART,
            tcp: TcpForwarderOptions::default(),
            stop_grace: Duration::from_secs(3),
            line_buffer: 1024,
        }
    }
}

/// Requests from the [`AisGateway`](super::AisGateway) handle.
pub(crate) enum SupervisorCommand {
    /// Spawn now unless a decoder is alive.
    Start,
    /// Tear everything down and end the task.
    Stop,
}

pub(crate) struct Supervisor {
    config: Arc<GatewayConfig>,
    options: SupervisorOptions,
    forwarder: Forwarder,
    backoff: Backoff,
    status: Arc<watch::Sender<AisGatewayStatus>>,
    adapter_status: Arc<StatusPublisher>,
    child: Option<Child>,
    restart_timer: Option<Pin<Box<Sleep>>>,
    lines_tx: mpsc::Sender<OutputLine>,
    lines_rx: mpsc::Receiver<OutputLine>,
    /// Incremented on every successful spawn.
    generation: u64,
    /// Whether the current process has produced a valid sentence yet.
    producing: bool,
    stopping: bool,
}

impl Supervisor {
    pub(crate) fn new(
        config: Arc<GatewayConfig>,
        options: SupervisorOptions,
        status: Arc<watch::Sender<AisGatewayStatus>>,
        adapter_status: Arc<StatusPublisher>,
    ) -> Self {
        let forwarder = Forwarder::from_config(&config, options.tcp.clone());
        let backoff = Backoff::from_config(options.restart_backoff);
        let (lines_tx, lines_rx) = mpsc::channel(options.line_buffer.max(1));
        Self {
            config,
            options,
            forwarder,
            backoff,
            status,
            adapter_status,
            child: None,
            restart_timer: None,
            lines_tx,
            lines_rx,
            generation: 0,
            producing: false,
            stopping: false,
        }
    }

    /// Drive the supervisor until stopped, then hand the state back.
    pub(crate) async fn run(mut self, mut commands: mpsc::Receiver<SupervisorCommand>) -> Self {
        self.start().await;

        loop {
            tokio::select! {
                cmd = commands.recv() => match cmd {
                    Some(SupervisorCommand::Start) => {
                        if self.child.is_none() {
                            self.restart_timer = None;
                            self.spawn_decoder();
                        }
                    }
                    Some(SupervisorCommand::Stop) | None => {
                        self.shutdown().await;
                        break;
                    }
                },
                Some(line) = self.lines_rx.recv() => self.handle_line(line).await,
                exit = wait_child(&mut self.child) => {
                    self.child = None;
                    self.handle_exit(exit);
                }
                _ = restart_due(&mut self.restart_timer) => {
                    self.restart_timer = None;
                    self.status.send_modify(|s| s.restarts += 1);
                    self.spawn_decoder();
                }
            }
        }

        self
    }

    async fn start(&mut self) {
        self.stopping = false;
        self.forwarder.start().await;
        self.spawn_decoder();
    }

    fn spawn_decoder(&mut self) {
        let path = &self.config.rtl_ais_path;
        let args = self.config.decoder_args();

        self.adapter_status.transition(AdapterState::Connecting);
        let mut command = Command::new(path);
        command
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        match command.spawn() {
            Ok(mut child) => {
                info!("Started {} {} (pid {:?})", path, args.join(" "), child.id());
                self.generation += 1;
                if let Some(stdout) = child.stdout.take() {
                    spawn_reader(
                        OutputStream::Stdout,
                        self.generation,
                        stdout,
                        self.lines_tx.clone(),
                    );
                }
                if let Some(stderr) = child.stderr.take() {
                    spawn_reader(
                        OutputStream::Stderr,
                        self.generation,
                        stderr,
                        self.lines_tx.clone(),
                    );
                }
                self.on_spawned(child.id());
                self.child = Some(child);
            }
            Err(e) => {
                let reason = format!("spawn failed: {}", e);
                error!("Failed to start {}: {}", path, e);
                self.record_failure(reason);
                self.schedule_restart();
            }
        }
    }

    /// A new process is alive. The restart backoff is left alone until it
    /// proves itself by emitting a sentence.
    fn on_spawned(&mut self, pid: Option<u32>) {
        self.producing = false;
        self.status.send_modify(|s| {
            s.running = true;
            s.pid = pid;
            s.last_start = Some(Utc::now());
        });
    }

    async fn handle_line(&mut self, line: OutputLine) {
        match classify_line(&line.text) {
            LineKind::Sentence(sentence) => {
                self.status.send_modify(|s| s.last_nmea_at = Some(Utc::now()));

                if line.generation == self.generation && !self.producing {
                    self.producing = true;
                    self.backoff.reset();
                    self.adapter_status.transition(AdapterState::Connected);
                    info!("Decoder is producing sentences");
                }

                if !sentence.checksum_matches() {
                    debug!(
                        "Checksum mismatch (declared {:02X}, computed {:02X}): {}",
                        sentence.declared_checksum(),
                        sentence.computed_checksum(),
                        sentence
                    );
                }
                if self.config.log_nmea {
                    info!(target: "nmea", "{}", sentence);
                }
                self.forwarder.send(sentence.as_str()).await;
            }
            LineKind::Chatter => {
                if !line.text.trim().is_empty() {
                    info!(target: "rtl_ais", "[{}] {}", line.stream, line.text);
                }
            }
        }
    }

    fn handle_exit(&mut self, exit: std::io::Result<ExitStatus>) {
        let reason = match exit {
            Ok(status) => describe_exit(status),
            Err(e) => format!("wait failed: {}", e),
        };
        warn!("Decoder {}", reason);
        self.record_failure(reason);
        if !self.stopping {
            self.schedule_restart();
        }
    }

    fn record_failure(&mut self, reason: String) {
        self.status.send_modify(|s| {
            s.running = false;
            s.pid = None;
            s.errors_count += 1;
            s.last_error = Some(reason.clone());
        });
        if !self.stopping {
            self.adapter_status.publish(AdapterStatus::error(reason));
        }
    }

    /// Arm the restart timer unless one is already pending.
    fn schedule_restart(&mut self) {
        if self.restart_timer.is_some() {
            return;
        }
        let delay = self.backoff.next_delay();
        info!("Restarting decoder in {} ms", delay.as_millis());
        self.restart_timer = Some(Box::pin(tokio::time::sleep(delay)));
    }

    async fn shutdown(&mut self) {
        self.stopping = true;
        self.restart_timer = None;
        self.forwarder.stop().await;

        if let Some(mut child) = self.child.take() {
            if let Err(e) = interrupt(&mut child) {
                debug!("Could not interrupt decoder: {}", e);
            }
            let exit = match tokio::time::timeout(self.options.stop_grace, child.wait()).await {
                Ok(exit) => exit,
                Err(_) => {
                    warn!(
                        "Decoder ignored interrupt for {} ms, killing",
                        self.options.stop_grace.as_millis()
                    );
                    if let Err(e) = child.start_kill() {
                        warn!("Kill failed: {}", e);
                    }
                    child.wait().await
                }
            };
            self.handle_exit(exit);
        }

        // Lines still in flight belong to a process that is gone.
        while self.lines_rx.try_recv().is_ok() {}

        self.status.send_modify(|s| {
            s.running = false;
            s.pid = None;
        });
        self.adapter_status.transition(AdapterState::Disconnected);
        info!("AIS gateway stopped");
    }
}

async fn wait_child(child: &mut Option<Child>) -> std::io::Result<ExitStatus> {
    match child {
        Some(child) => child.wait().await,
        None => pending().await,
    }
}

async fn restart_due(timer: &mut Option<Pin<Box<Sleep>>>) {
    match timer {
        Some(sleep) => sleep.as_mut().await,
        None => pending().await,
    }
}

#[cfg(unix)]
fn interrupt(child: &mut Child) -> std::io::Result<()> {
    use nix::sys::signal::{kill, Signal};
    use nix::unistd::Pid;

    match child.id() {
        Some(pid) => kill(Pid::from_raw(pid as i32), Signal::SIGINT).map_err(std::io::Error::from),
        None => Ok(()),
    }
}

#[cfg(not(unix))]
fn interrupt(child: &mut Child) -> std::io::Result<()> {
    child.start_kill()
}

fn describe_exit(status: ExitStatus) -> String {
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return format!("terminated by signal {}", signal);
        }
    }
    match status.code() {
        Some(code) => format!("exited with code {}", code),
        None => "exited".to_string(),
    }
}
