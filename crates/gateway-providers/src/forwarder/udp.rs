//! UdpForwarder - one datagram per sentence, best effort.

use tokio::net::UdpSocket;
use tracing::{debug, warn};

use crate::error::ForwarderError;

/// Error logs after this many failures are suppressed until a send succeeds.
const MAX_LOGGED_ERRORS: u64 = 10;

/// Sends each sentence as its own datagram to `host:port`.
pub struct UdpForwarder {
    target: String,
    socket: Option<UdpSocket>,
    sent: u64,
    errors: u64,
    consecutive_errors: u64,
}

impl UdpForwarder {
    pub fn new(host: &str, port: u16) -> Self {
        Self {
            target: format!("{}:{}", host, port),
            socket: None,
            sent: 0,
            errors: 0,
            consecutive_errors: 0,
        }
    }

    /// Open the local socket. No-op while one is open.
    pub async fn start(&mut self) -> Result<(), ForwarderError> {
        if self.socket.is_some() {
            return Ok(());
        }
        let socket = UdpSocket::bind("0.0.0.0:0").await?;
        debug!(target_addr = %self.target, "UDP forwarder ready");
        self.socket = Some(socket);
        Ok(())
    }

    /// Send `sentence` followed by CRLF. Failures are logged and dropped.
    pub async fn send(&mut self, sentence: &str) {
        let Some(socket) = self.socket.as_ref() else {
            debug!("UDP forwarder not started, dropping sentence");
            return;
        };

        let payload = format!("{}\r\n", sentence);
        match socket.send_to(payload.as_bytes(), self.target.as_str()).await {
            Ok(_) => {
                self.sent += 1;
                self.consecutive_errors = 0;
            }
            Err(e) => {
                self.errors += 1;
                self.consecutive_errors += 1;
                if self.consecutive_errors <= MAX_LOGGED_ERRORS {
                    warn!("UDP send to {} failed: {}", self.target, e);
                }
            }
        }
    }

    /// Close the socket.
    pub fn stop(&mut self) {
        if self.socket.take().is_some() {
            debug!(target_addr = %self.target, "UDP forwarder closed");
        }
    }

    pub fn is_started(&self) -> bool {
        self.socket.is_some()
    }

    pub fn target(&self) -> &str {
        &self.target
    }

    /// Returns (sent, errors).
    pub fn stats(&self) -> (u64, u64) {
        (self.sent, self.errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::time::timeout;

    #[tokio::test]
    async fn test_sentence_arrives_with_crlf() {
        let receiver = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let port = receiver.local_addr().unwrap().port();

        let mut forwarder = UdpForwarder::new("127.0.0.1", port);
        forwarder.start().await.unwrap();
        forwarder.send("!AIVDM,1,1,,A,x,0*00").await;

        let mut buf = [0u8; 256];
        let (n, _) = timeout(Duration::from_secs(2), receiver.recv_from(&mut buf))
            .await
            .expect("datagram")
            .unwrap();
        assert_eq!(&buf[..n], b"!AIVDM,1,1,,A,x,0*00\r\n");
        assert_eq!(forwarder.stats(), (1, 0));
    }

    #[tokio::test]
    async fn test_start_is_idempotent() {
        let mut forwarder = UdpForwarder::new("127.0.0.1", 19997);
        forwarder.start().await.unwrap();
        forwarder.start().await.unwrap();
        assert!(forwarder.is_started());

        forwarder.stop();
        assert!(!forwarder.is_started());
        forwarder.stop();
    }

    #[tokio::test]
    async fn test_send_before_start_is_dropped() {
        let mut forwarder = UdpForwarder::new("127.0.0.1", 19996);
        forwarder.send("$GPGGA,*00").await;
        assert_eq!(forwarder.stats(), (0, 0));
    }
}
