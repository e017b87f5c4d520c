//! Forwarders deliver validated sentences to the downstream listener.
//!
//! - [`UdpForwarder`] - one datagram per sentence, loss accepted
//! - [`TcpForwarder`] - persistent stream with bounded queue and reconnect
//!
//! [`Forwarder`] selects one of them from [`GatewayConfig::forward_mode`].

mod tcp;
mod udp;

pub use tcp::{ConnectionState, TcpForwarder, TcpForwarderOptions};
pub use udp::UdpForwarder;

use gateway_core::{ForwardMode, GatewayConfig};
use tracing::error;

/// The configured forwarder.
pub enum Forwarder {
    Udp(UdpForwarder),
    Tcp(TcpForwarder),
}

impl Forwarder {
    /// Build the forwarder selected by `config.forward_mode`.
    pub fn from_config(config: &GatewayConfig, tcp_options: TcpForwarderOptions) -> Self {
        match config.forward_mode {
            ForwardMode::Udp => {
                Forwarder::Udp(UdpForwarder::new(&config.signalk_host, config.signalk_port))
            }
            ForwardMode::Tcp => Forwarder::Tcp(TcpForwarder::with_options(
                &config.signalk_host,
                config.signalk_port,
                tcp_options,
            )),
        }
    }

    pub async fn start(&mut self) {
        match self {
            Forwarder::Udp(f) => {
                if let Err(e) = f.start().await {
                    error!("UDP forwarder to {} unavailable: {}", f.target(), e);
                }
            }
            Forwarder::Tcp(f) => f.start(),
        }
    }

    pub async fn send(&mut self, sentence: &str) {
        match self {
            Forwarder::Udp(f) => f.send(sentence).await,
            Forwarder::Tcp(f) => f.send(sentence),
        }
    }

    pub async fn stop(&mut self) {
        match self {
            Forwarder::Udp(f) => f.stop(),
            Forwarder::Tcp(f) => f.stop().await,
        }
    }

    pub fn mode(&self) -> ForwardMode {
        match self {
            Forwarder::Udp(_) => ForwardMode::Udp,
            Forwarder::Tcp(_) => ForwardMode::Tcp,
        }
    }

    pub fn target(&self) -> &str {
        match self {
            Forwarder::Udp(f) => f.target(),
            Forwarder::Tcp(f) => f.target(),
        }
    }
}
