//! Stream-based envelope source.
//!
//! Reads newline-delimited JSON envelopes from any async byte stream: a
//! file, stdin or a TCP connection.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::envelope::Envelope;

/// A source that decodes envelopes from an async reader.
///
/// This source spawns a background task that reads newline-delimited JSON
/// from the provided reader and makes envelopes available via `recv()`.
/// Lines that fail to decode are logged and counted, and reading carries
/// on.
///
/// # Example
///
/// ```
/// use std::io::Cursor;
/// use trendwatch_cli::EnvelopeSource;
///
/// # tokio_test::block_on(async {
/// let data = b"{\"topic\":\"a\",\"time\":1,\"value\":2}\n";
/// let mut source = EnvelopeSource::spawn(Cursor::new(data.to_vec()), "example", None);
/// let envelope = source.recv().await.unwrap();
/// assert_eq!(envelope.topic(), "a");
/// # });
/// ```
#[derive(Debug)]
pub struct EnvelopeSource {
    receiver: mpsc::Receiver<Envelope>,
    description: String,
    malformed: Arc<AtomicU64>,
}

impl EnvelopeSource {
    /// Spawn a background task that reads from the given async reader.
    ///
    /// Lines without a topic are addressed to `default_topic`.
    pub fn spawn<R>(reader: R, description: &str, default_topic: Option<String>) -> Self
    where
        R: AsyncRead + Unpin + Send + 'static,
    {
        let (tx, rx) = mpsc::channel(256);
        let malformed = Arc::new(AtomicU64::new(0));
        let malformed_count = malformed.clone();
        let desc = description.to_string();

        tokio::spawn(async move {
            let mut reader = BufReader::new(reader);
            let mut line = String::new();
            let mut line_no = 0u64;

            loop {
                line.clear();
                match reader.read_line(&mut line).await {
                    Ok(0) => {
                        debug!(source = %desc, lines = line_no, "End of stream");
                        break;
                    }
                    Ok(_) => {
                        line_no += 1;
                        let trimmed = line.trim();
                        if trimmed.is_empty() {
                            continue;
                        }
                        match Envelope::parse(trimmed, default_topic.as_deref()) {
                            Ok(envelope) => {
                                if tx.send(envelope).await.is_err() {
                                    // Receiver dropped
                                    break;
                                }
                            }
                            Err(e) => {
                                malformed_count.fetch_add(1, Ordering::Relaxed);
                                warn!(source = %desc, line = line_no, error = %e, "Skipping line");
                            }
                        }
                    }
                    Err(e) => {
                        warn!(source = %desc, error = %e, "Read error");
                        break;
                    }
                }
            }
        });

        Self {
            receiver: rx,
            description: format!("stream: {}", description),
            malformed,
        }
    }

    /// Receive the next envelope. Returns `None` at end of stream.
    pub async fn recv(&mut self) -> Option<Envelope> {
        self.receiver.recv().await
    }

    /// Human-readable description of the source.
    pub fn description(&self) -> &str {
        &self.description
    }

    /// Number of lines that could not be decoded.
    pub fn malformed(&self) -> u64 {
        self.malformed.load(Ordering::Relaxed)
    }
}
