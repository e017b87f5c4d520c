//! Line readers for the decoder's stdout and stderr.

use gateway_core::LineFramer;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

const READ_CHUNK: usize = 4096;

/// Which decoder stream a line came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum OutputStream {
    Stdout,
    Stderr,
}

impl std::fmt::Display for OutputStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputStream::Stdout => f.write_str("stdout"),
            OutputStream::Stderr => f.write_str("stderr"),
        }
    }
}

/// One complete line of decoder output.
#[derive(Debug, Clone)]
pub(crate) struct OutputLine {
    pub stream: OutputStream,
    /// Spawn counter of the process that wrote the line.
    pub generation: u64,
    pub text: String,
}

/// Read `source` until EOF, forwarding complete lines in arrival order.
///
/// The bounded channel applies backpressure: when the supervisor falls
/// behind, reading pauses and the pipe fills up.
pub(crate) fn spawn_reader<R>(
    stream: OutputStream,
    generation: u64,
    mut source: R,
    lines: mpsc::Sender<OutputLine>,
) -> JoinHandle<()>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut framer = LineFramer::new();
        let mut buf = vec![0u8; READ_CHUNK];

        loop {
            match source.read(&mut buf).await {
                Ok(0) => break,
                Ok(n) => {
                    for text in framer.push(&buf[..n]) {
                        let line = OutputLine {
                            stream,
                            generation,
                            text,
                        };
                        if lines.send(line).await.is_err() {
                            return;
                        }
                    }
                }
                Err(e) => {
                    warn!("Error reading decoder {}: {}", stream, e);
                    break;
                }
            }
        }

        if let Some(text) = framer.finish() {
            let _ = lines
                .send(OutputLine {
                    stream,
                    generation,
                    text,
                })
                .await;
        }
        debug!("Decoder {} closed (generation {})", stream, generation);
    })
}
