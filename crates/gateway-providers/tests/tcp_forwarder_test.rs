//! Integration tests for the TCP forwarder.
//!
//! These tests run a real listener on loopback and check queueing,
//! flushing and reconnect behavior end to end.

use std::net::SocketAddr;
use std::time::Duration;

use gateway_core::BackoffConfig;
use gateway_providers::{ConnectionState, TcpForwarder, TcpForwarderOptions};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::time::timeout;

fn fast_options() -> TcpForwarderOptions {
    TcpForwarderOptions {
        backoff: BackoffConfig {
            base: Duration::from_millis(50),
            max: Duration::from_millis(100),
            jitter: Duration::ZERO,
        },
        ..Default::default()
    }
}

/// Reserve a loopback port with nothing listening on it.
fn unused_addr() -> SocketAddr {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    listener.local_addr().unwrap()
}

async fn accept(listener: &TcpListener) -> TcpStream {
    let (stream, _) = timeout(Duration::from_secs(5), listener.accept())
        .await
        .expect("forwarder should connect")
        .unwrap();
    stream
}

async fn next_line<R>(lines: &mut tokio::io::Lines<R>) -> String
where
    R: tokio::io::AsyncBufRead + Unpin,
{
    timeout(Duration::from_secs(5), lines.next_line())
        .await
        .expect("line in time")
        .unwrap()
        .expect("stream open")
}

async fn wait_for_state(forwarder: &TcpForwarder, state: ConnectionState) {
    let mut rx = forwarder.watch_state();
    timeout(Duration::from_secs(5), rx.wait_for(|s| *s == state))
        .await
        .expect("state reached")
        .unwrap();
}

#[tokio::test]
async fn test_sends_immediately_when_connected() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();

    let mut forwarder = TcpForwarder::with_options("127.0.0.1", port, fast_options());
    forwarder.start();
    let stream = accept(&listener).await;
    wait_for_state(&forwarder, ConnectionState::Connected).await;

    forwarder.send("!AIVDM,1,1,,A,15M67FC000G?ufbE`FcDFm?Q00000,0*5E");

    let mut reader = BufReader::new(stream);
    let mut raw = String::new();
    timeout(Duration::from_secs(5), reader.read_line(&mut raw))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(raw, "!AIVDM,1,1,,A,15M67FC000G?ufbE`FcDFm?Q00000,0*5E\r\n");

    forwarder.stop().await;
}

#[tokio::test]
async fn test_queue_keeps_latest_500_and_flushes_in_order() {
    let addr = unused_addr();
    let mut forwarder = TcpForwarder::with_options("127.0.0.1", addr.port(), fast_options());
    forwarder.start();

    for i in 0..501 {
        forwarder.send(&format!("msg-{}", i));
    }
    assert_eq!(forwarder.queued_len().await.unwrap(), 500);

    let listener = TcpListener::bind(addr).await.unwrap();
    let stream = accept(&listener).await;
    let mut lines = BufReader::new(stream).lines();

    for i in 1..=500 {
        assert_eq!(next_line(&mut lines).await, format!("msg-{}", i));
    }
    assert_eq!(forwarder.queued_len().await.unwrap(), 0);

    forwarder.stop().await;
}

#[tokio::test]
async fn test_reconnects_after_peer_close() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();

    let mut forwarder = TcpForwarder::with_options("127.0.0.1", port, fast_options());
    forwarder.start();

    let first = accept(&listener).await;
    drop(first);

    let second = accept(&listener).await;
    forwarder.send("$GPGGA,second*00");

    let mut lines = BufReader::new(second).lines();
    assert_eq!(next_line(&mut lines).await, "$GPGGA,second*00");

    forwarder.stop().await;
}

#[tokio::test]
async fn test_no_reconnect_after_stop() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();

    let mut forwarder = TcpForwarder::with_options("127.0.0.1", port, fast_options());
    forwarder.start();
    let stream = accept(&listener).await;

    forwarder.stop().await;
    assert_eq!(forwarder.state(), ConnectionState::Disconnected);
    drop(stream);

    let again = timeout(Duration::from_millis(400), listener.accept()).await;
    assert!(again.is_err(), "stopped forwarder must not reconnect");
    assert_eq!(forwarder.queued_len().await.unwrap(), 0);
}

#[tokio::test]
async fn test_stop_while_retrying_discards_queue() {
    let addr = unused_addr();
    let mut forwarder = TcpForwarder::with_options("127.0.0.1", addr.port(), fast_options());
    forwarder.start();
    forwarder.send("$A*00");
    forwarder.send("$B*00");
    assert_eq!(forwarder.queued_len().await.unwrap(), 2);

    forwarder.stop().await;
    forwarder.stop().await;

    // A fresh start begins with an empty queue.
    forwarder.start();
    assert_eq!(forwarder.queued_len().await.unwrap(), 0);
    forwarder.stop().await;
}

#[tokio::test]
async fn test_start_is_idempotent() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();

    let mut forwarder = TcpForwarder::with_options("127.0.0.1", port, fast_options());
    forwarder.start();
    forwarder.start();
    let _stream = accept(&listener).await;

    let second = timeout(Duration::from_millis(300), listener.accept()).await;
    assert!(second.is_err(), "only one connection attempt in flight");

    forwarder.stop().await;
}

#[tokio::test]
async fn test_stalled_peer_bounds_buffering_and_stop_resolves() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();

    let mut forwarder = TcpForwarder::with_options("127.0.0.1", port, fast_options());
    forwarder.start();
    // Accepted but never read from.
    let _stalled = accept(&listener).await;
    wait_for_state(&forwarder, ConnectionState::Connected).await;

    let big = format!("!AIVDM,{}*00", "x".repeat(8192));
    for _ in 0..5000 {
        forwarder.send(&big);
    }

    let queued = timeout(Duration::from_secs(3), forwarder.queued_len())
        .await
        .expect("task stays responsive while the peer is stalled")
        .unwrap();
    assert!(queued > 0 && queued <= 500, "queued {}", queued);

    timeout(Duration::from_secs(3), forwarder.stop())
        .await
        .expect("stop resolves while a write is pending");
    assert_eq!(forwarder.state(), ConnectionState::Disconnected);
}

#[tokio::test]
async fn test_send_before_start_is_queued() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();

    let mut forwarder = TcpForwarder::with_options("127.0.0.1", port, fast_options());
    forwarder.send("$EARLY,1*00");
    forwarder.send("$EARLY,2*00");
    assert_eq!(forwarder.queued_len().await.unwrap(), 2);

    forwarder.start();
    let stream = accept(&listener).await;
    let mut lines = BufReader::new(stream).lines();
    assert_eq!(next_line(&mut lines).await, "$EARLY,1*00");
    assert_eq!(next_line(&mut lines).await, "$EARLY,2*00");

    forwarder.stop().await;
}
