//! TcpForwarder - persistent stream with queueing and reconnect.
//!
//! The connection is driven by a background task that owns the socket, the
//! outbound queue and the reconnect backoff:
//!
//! ```text
//! Disconnected -> Connecting -> Connected
//!      ^              |             |
//!      +-- backoff <--+---- close --+
//! ```
//!
//! Sentences go through a bounded FIFO that evicts the oldest entry on
//! overflow. While connected it is drained as fast as the socket accepts
//! data; at most one sentence is in flight, so a peer that stops reading
//! fills the FIFO instead of memory. Commands are served between partial
//! writes, which keeps [`TcpForwarder::stop`] prompt even then.
//! Stopping ends the task, so no reconnect can follow it.

use std::sync::Arc;
use std::time::Duration;

use gateway_core::{Backoff, BackoffConfig, OutboundQueue, DEFAULT_QUEUE_CAPACITY};
use serde::Serialize;
use tokio::io::AsyncReadExt;
use tokio::net::tcp::OwnedWriteHalf;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::error::ForwarderError;

/// Connection state of a [`TcpForwarder`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
}

/// Tuning for a [`TcpForwarder`].
#[derive(Debug, Clone)]
pub struct TcpForwarderOptions {
    /// Delay policy between connection attempts.
    pub backoff: BackoffConfig,
    /// Sentences kept while disconnected.
    pub queue_capacity: usize,
    /// Upper bound on a single connect attempt.
    pub connect_timeout: Duration,
}

impl Default for TcpForwarderOptions {
    fn default() -> Self {
        Self {
            backoff: BackoffConfig::RECONNECT,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            connect_timeout: Duration::from_secs(5),
        }
    }
}

enum Command {
    Send(String),
    QueueLen(oneshot::Sender<usize>),
    Stop,
}

struct Running {
    commands: mpsc::UnboundedSender<Command>,
    task: JoinHandle<()>,
}

/// Streams sentences over one TCP connection, reconnecting as needed.
pub struct TcpForwarder {
    target: String,
    options: TcpForwarderOptions,
    state_tx: Arc<watch::Sender<ConnectionState>>,
    state_rx: watch::Receiver<ConnectionState>,
    /// Sentences sent before `start`, handed to the task when it starts.
    backlog: OutboundQueue,
    running: Option<Running>,
}

impl TcpForwarder {
    pub fn new(host: &str, port: u16) -> Self {
        Self::with_options(host, port, TcpForwarderOptions::default())
    }

    pub fn with_options(host: &str, port: u16, options: TcpForwarderOptions) -> Self {
        let (state_tx, state_rx) = watch::channel(ConnectionState::Disconnected);
        let backlog = OutboundQueue::new(options.queue_capacity);
        Self {
            target: format!("{}:{}", host, port),
            options,
            state_tx: Arc::new(state_tx),
            state_rx,
            backlog,
            running: None,
        }
    }

    /// Start connecting. No-op while the connection task is alive.
    pub fn start(&mut self) {
        if let Some(running) = &self.running {
            if !running.task.is_finished() {
                return;
            }
        }

        let (commands, rx) = mpsc::unbounded_channel();
        let link = Link {
            target: self.target.clone(),
            connect_timeout: self.options.connect_timeout,
            queue: std::mem::replace(
                &mut self.backlog,
                OutboundQueue::new(self.options.queue_capacity),
            ),
            backoff: Backoff::from_config(self.options.backoff),
            commands: rx,
            state: self.state_tx.clone(),
            dropped: 0,
        };
        let task = tokio::spawn(link.run());
        self.running = Some(Running { commands, task });
    }

    /// Write as soon as the socket accepts data, otherwise queue.
    ///
    /// Before `start` the sentence waits in the same bounded queue.
    pub fn send(&mut self, sentence: &str) {
        match &self.running {
            Some(running) => {
                if running.commands.send(Command::Send(sentence.to_string())).is_err() {
                    debug!("TCP forwarder task gone, dropping sentence");
                }
            }
            None => {
                self.backlog.push(sentence.to_string());
            }
        }
    }

    /// Number of sentences currently queued.
    pub async fn queued_len(&self) -> Result<usize, ForwarderError> {
        let Some(running) = self.running.as_ref() else {
            return Ok(self.backlog.len());
        };
        let (tx, rx) = oneshot::channel();
        running
            .commands
            .send(Command::QueueLen(tx))
            .map_err(|_| ForwarderError::NotRunning)?;
        rx.await.map_err(|_| ForwarderError::NotRunning)
    }

    /// Stop for good: cancel any pending reconnect, drop the queue and the socket.
    pub async fn stop(&mut self) {
        let Some(running) = self.running.take() else {
            return;
        };
        let _ = running.commands.send(Command::Stop);
        if let Err(e) = running.task.await {
            warn!("TCP forwarder task ended abnormally: {}", e);
        }
        self.state_tx.send_replace(ConnectionState::Disconnected);
        debug!(target_addr = %self.target, "TCP forwarder stopped");
    }

    pub fn state(&self) -> ConnectionState {
        *self.state_rx.borrow()
    }

    /// Watch connection state changes.
    pub fn watch_state(&self) -> watch::Receiver<ConnectionState> {
        self.state_rx.clone()
    }

    pub fn target(&self) -> &str {
        &self.target
    }
}

impl Drop for TcpForwarder {
    fn drop(&mut self) {
        if let Some(running) = self.running.take() {
            running.task.abort();
        }
    }
}

/// Why a connected session ended.
enum SessionEnd {
    Closed,
    Stopped,
}

/// Background connection task state.
struct Link {
    target: String,
    connect_timeout: Duration,
    queue: OutboundQueue,
    backoff: Backoff,
    commands: mpsc::UnboundedReceiver<Command>,
    state: Arc<watch::Sender<ConnectionState>>,
    /// Sentences evicted since the last successful connect.
    dropped: u64,
}

impl Link {
    async fn run(mut self) {
        loop {
            self.state.send_replace(ConnectionState::Connecting);
            match self.connect().await {
                Some(Ok(stream)) => {
                    self.state.send_replace(ConnectionState::Connected);
                    info!("Connected to {}", self.target);
                    self.backoff.reset();
                    if let SessionEnd::Stopped = self.serve(stream).await {
                        break;
                    }
                    self.state.send_replace(ConnectionState::Disconnected);
                }
                Some(Err(e)) => {
                    self.state.send_replace(ConnectionState::Disconnected);
                    warn!("Connect to {} failed: {}", self.target, e);
                }
                None => break,
            }

            if !self.wait_before_reconnect().await {
                break;
            }
        }

        self.queue.clear();
        self.backoff.reset();
        self.state.send_replace(ConnectionState::Disconnected);
    }

    /// `None` when stopped while connecting.
    async fn connect(&mut self) -> Option<std::io::Result<TcpStream>> {
        let attempt = tokio::time::timeout(
            self.connect_timeout,
            TcpStream::connect(self.target.clone()),
        );
        tokio::pin!(attempt);

        loop {
            tokio::select! {
                result = &mut attempt => {
                    return Some(match result {
                        Ok(r) => r,
                        Err(_) => Err(std::io::Error::new(
                            std::io::ErrorKind::TimedOut,
                            "connect timed out",
                        )),
                    });
                }
                cmd = self.commands.recv() => {
                    if !self.handle_offline(cmd) {
                        return None;
                    }
                }
            }
        }
    }

    /// Sleep for the next backoff delay. `false` when stopped meanwhile.
    async fn wait_before_reconnect(&mut self) -> bool {
        let delay = self.backoff.next_delay();
        info!("Reconnecting to {} in {} ms", self.target, delay.as_millis());
        let sleep = tokio::time::sleep(delay);
        tokio::pin!(sleep);

        loop {
            tokio::select! {
                _ = &mut sleep => return true,
                cmd = self.commands.recv() => {
                    if !self.handle_offline(cmd) {
                        return false;
                    }
                }
            }
        }
    }

    /// Handle a command while not connected. `false` means stop.
    fn handle_offline(&mut self, cmd: Option<Command>) -> bool {
        match cmd {
            Some(Command::Send(sentence)) => {
                self.enqueue(sentence);
                true
            }
            Some(Command::QueueLen(reply)) => {
                let _ = reply.send(self.queue.len());
                true
            }
            Some(Command::Stop) | None => false,
        }
    }

    fn enqueue(&mut self, sentence: String) {
        let evicted = self.queue.push(sentence) as u64;
        if evicted > 0 {
            if self.dropped == 0 {
                warn!(
                    "Outbound queue for {} full ({}), dropping oldest sentences",
                    self.target,
                    self.queue.capacity()
                );
            }
            self.dropped += evicted;
        }
    }

    async fn serve(&mut self, stream: TcpStream) -> SessionEnd {
        let (mut reader, writer) = stream.into_split();

        if self.dropped > 0 {
            warn!(
                "Dropped {} sentences for {} since the last connection",
                self.dropped, self.target
            );
            self.dropped = 0;
        }
        if !self.queue.is_empty() {
            debug!("Flushing {} queued sentences to {}", self.queue.len(), self.target);
        }

        let mut in_flight: Option<PendingWrite> = None;
        let mut buf = [0u8; 512];
        loop {
            if in_flight.is_none() {
                in_flight = self.queue.pop().map(PendingWrite::new);
            }

            tokio::select! {
                read = reader.read(&mut buf) => match read {
                    Ok(0) => {
                        info!("Connection to {} closed by peer", self.target);
                        self.requeue(in_flight.take());
                        return SessionEnd::Closed;
                    }
                    // Inbound data is not part of the protocol.
                    Ok(_) => {}
                    Err(e) => {
                        warn!("Socket error on {}: {}", self.target, e);
                        self.requeue(in_flight.take());
                        return SessionEnd::Closed;
                    }
                },
                ready = writer.writable(), if in_flight.is_some() => {
                    let result = match (ready, in_flight.as_mut()) {
                        (Ok(()), Some(pending)) => pending.advance(&writer),
                        (Err(e), _) => Err(e),
                        (Ok(()), None) => Ok(false),
                    };
                    match result {
                        Ok(true) => in_flight = None,
                        Ok(false) => {}
                        Err(e) => {
                            warn!("Write to {} failed: {}", self.target, e);
                            self.requeue(in_flight.take());
                            return SessionEnd::Closed;
                        }
                    }
                }
                cmd = self.commands.recv() => match cmd {
                    Some(Command::Send(sentence)) => self.enqueue(sentence),
                    Some(Command::QueueLen(reply)) => {
                        let _ = reply.send(self.queue.len());
                    }
                    // Dropping the halves closes the socket, even mid-write.
                    Some(Command::Stop) | None => return SessionEnd::Stopped,
                },
            }
        }
    }

    /// Put an unfinished sentence back at the head for the next connection.
    fn requeue(&mut self, pending: Option<PendingWrite>) {
        if let Some(pending) = pending {
            self.queue.push_front(pending.sentence);
        }
    }
}

/// One sentence being written, possibly across several partial writes.
struct PendingWrite {
    sentence: String,
    payload: Vec<u8>,
    written: usize,
}

impl PendingWrite {
    fn new(sentence: String) -> Self {
        let payload = format!("{}\r\n", sentence).into_bytes();
        Self {
            sentence,
            payload,
            written: 0,
        }
    }

    /// Write what the socket takes without blocking. `Ok(true)` once complete.
    fn advance(&mut self, writer: &OwnedWriteHalf) -> std::io::Result<bool> {
        match writer.try_write(&self.payload[self.written..]) {
            Ok(0) => Err(std::io::ErrorKind::WriteZero.into()),
            Ok(n) => {
                self.written += n;
                Ok(self.written == self.payload.len())
            }
            Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => Ok(false),
            Err(e) => Err(e),
        }
    }
}
