//! Persistence outputs for prediction records.

use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
#[cfg(feature = "http")]
use std::time::Duration;

use tokio::io::AsyncWriteExt;
use tokio::sync::{mpsc, watch};
use tracing::{debug, warn};
use trendwatch_types::PredictionRecord;

use crate::error::Result;

/// Request timeout for HTTP outputs.
#[cfg(feature = "http")]
pub const HTTP_TIMEOUT: Duration = Duration::from_secs(10);

/// Destination for prediction records.
#[derive(Debug)]
pub enum Output {
    /// Append records to a file, one JSON object per line.
    File(PathBuf),

    /// Send records to a TCP server as newline-delimited JSON.
    ///
    /// A connection is opened per record; failures are reported and the
    /// record is skipped.
    Tcp(String),

    /// Send records through a channel.
    ///
    /// Use `Output::channel()` to create this variant and get the receiver.
    Channel(mpsc::Sender<PredictionRecord>),

    /// POST each record as JSON to an HTTP endpoint.
    #[cfg(feature = "http")]
    Http {
        client: reqwest::Client,
        url: String,
    },
}

impl Output {
    /// Create a file output.
    ///
    /// # Example
    ///
    /// ```rust
    /// use trendwatch_engine::Output;
    ///
    /// let output = Output::file("predictions.ndjson");
    /// ```
    pub fn file(path: impl Into<PathBuf>) -> Self {
        Output::File(path.into())
    }

    /// Create a TCP output.
    pub fn tcp(addr: impl Into<String>) -> Self {
        Output::Tcp(addr.into())
    }

    /// Create a channel output and return both the output and receiver.
    ///
    /// # Example
    ///
    /// ```rust
    /// use trendwatch_engine::Output;
    ///
    /// let (output, mut rx) = Output::channel(16);
    ///
    /// // Later, receive records
    /// // while let Some(record) = rx.recv().await {
    /// //     println!("{} -> {}", record.topic, record.predicted_value);
    /// // }
    /// ```
    pub fn channel(buffer: usize) -> (Self, mpsc::Receiver<PredictionRecord>) {
        let (tx, rx) = mpsc::channel(buffer);
        (Output::Channel(tx), rx)
    }

    /// Create an HTTP output with the default request timeout.
    #[cfg(feature = "http")]
    pub fn http(url: impl Into<String>) -> Result<Self> {
        Self::http_with_timeout(url, HTTP_TIMEOUT)
    }

    /// Create an HTTP output whose requests give up after `timeout`.
    #[cfg(feature = "http")]
    pub fn http_with_timeout(url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Output::Http {
            client,
            url: url.into(),
        })
    }

    /// Emit a record to this output.
    pub(crate) async fn emit(&self, record: &PredictionRecord) -> Result<()> {
        match self {
            Output::File(path) => {
                let mut line = serde_json::to_vec(record)?;
                line.push(b'\n');
                let mut file = tokio::fs::OpenOptions::new()
                    .create(true)
                    .append(true)
                    .open(path)
                    .await?;
                file.write_all(&line).await?;
            }
            Output::Tcp(addr) => {
                let mut line = serde_json::to_vec(record)?;
                line.push(b'\n');
                let mut stream = tokio::net::TcpStream::connect(addr).await?;
                stream.write_all(&line).await?;
            }
            Output::Channel(tx) => {
                // Best effort send (don't block if channel is full)
                let _ = tx.try_send(record.clone());
            }
            #[cfg(feature = "http")]
            Output::Http { client, url } => {
                client
                    .post(url)
                    .json(record)
                    .send()
                    .await?
                    .error_for_status()?;
            }
        }
        Ok(())
    }

    fn label(&self) -> String {
        match self {
            Output::File(path) => format!("file:{}", path.display()),
            Output::Tcp(addr) => format!("tcp:{addr}"),
            Output::Channel(_) => "channel".to_string(),
            #[cfg(feature = "http")]
            Output::Http { url, .. } => format!("http:{url}"),
        }
    }
}

/// Fire-and-forget delivery of prediction records to a set of outputs.
///
/// Records are queued on a bounded channel and written by a single
/// background task. When the queue is full the record is dropped and
/// counted. Output failures are logged and never reach the caller.
#[derive(Debug, Clone)]
pub struct Dispatcher {
    tx: mpsc::Sender<PredictionRecord>,
    dropped: Arc<AtomicU64>,
    done: watch::Receiver<bool>,
}

impl Dispatcher {
    /// Spawn the writer task. Must be called inside a tokio runtime.
    ///
    /// The task exits once every clone of the dispatcher is dropped and the
    /// queue has drained.
    pub fn spawn(outputs: Vec<Output>, capacity: usize) -> Self {
        let (tx, mut rx) = mpsc::channel::<PredictionRecord>(capacity.max(1));
        let (done_tx, done) = watch::channel(false);
        let outputs = Arc::new(outputs);

        tokio::spawn(async move {
            while let Some(record) = rx.recv().await {
                for output in outputs.iter() {
                    if let Err(err) = output.emit(&record).await {
                        warn!(
                            output = %output.label(),
                            topic = %record.topic,
                            error = %err,
                            "Failed to persist prediction"
                        );
                    }
                }
            }
            debug!("Persistence dispatcher stopped");
            let _ = done_tx.send(true);
        });

        Self {
            tx,
            dropped: Arc::new(AtomicU64::new(0)),
            done,
        }
    }

    /// Queue a record without waiting.
    ///
    /// Returns `false` if the record was dropped.
    pub fn submit(&self, record: PredictionRecord) -> bool {
        match self.tx.try_send(record) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(record)) => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
                warn!(topic = %record.topic, "Persistence queue full, dropping record");
                false
            }
            Err(mpsc::error::TrySendError::Closed(record)) => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
                warn!(topic = %record.topic, "Persistence dispatcher stopped, dropping record");
                false
            }
        }
    }

    /// Number of records dropped so far.
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    /// Release this dispatcher and wait for the queue to drain.
    ///
    /// Returns once every other clone has been dropped too and all queued
    /// records have been written.
    pub async fn finish(self) {
        let Dispatcher { tx, mut done, .. } = self;
        drop(tx);
        let _ = done.wait_for(|finished| *finished).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn record(topic: &str, timestamp: i64) -> PredictionRecord {
        PredictionRecord {
            topic: topic.to_string(),
            live_value: 1.0,
            predicted_value: 2.0,
            threshold: 99.0,
            timestamp,
            threshold_reached: false,
            threshold_reach_time: None,
            estimated_reach_time: None,
        }
    }

    #[test]
    fn output_constructors() {
        assert!(matches!(Output::file("a.ndjson"), Output::File(_)));
        assert!(matches!(Output::tcp("localhost:9000"), Output::Tcp(_)));
        let (output, _rx) = Output::channel(1);
        assert!(matches!(output, Output::Channel(_)));
    }

    #[cfg(feature = "http")]
    #[tokio::test]
    async fn http_output_times_out_on_silent_sink() {
        // Accepts the connection and never answers
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let mut held = Vec::new();
            while let Ok((socket, _)) = listener.accept().await {
                held.push(socket);
            }
        });

        let output =
            Output::http_with_timeout(format!("http://{addr}/"), Duration::from_millis(200)).unwrap();
        let result = tokio::time::timeout(
            Duration::from_secs(5),
            output.emit(&record("a", 1)),
        )
        .await
        .expect("emit should give up on its own");
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn file_output_appends_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("predictions.ndjson");
        let output = Output::file(&path);

        output.emit(&record("a", 1)).await.unwrap();
        output.emit(&record("a", 2)).await.unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 2);
        let second: serde_json::Value = serde_json::from_str(lines[1]).unwrap();
        assert_eq!(second["timestamp"], 2);
        assert_eq!(second["predictedValue"], 2.0);
    }

    #[tokio::test]
    async fn tcp_output_reports_connection_failure() {
        // Port 1 on localhost is reserved and not listening
        let output = Output::tcp("127.0.0.1:1");
        assert!(output.emit(&record("a", 1)).await.is_err());
    }

    #[tokio::test]
    async fn dispatcher_delivers_to_every_output() {
        let (first, mut first_rx) = Output::channel(8);
        let (second, mut second_rx) = Output::channel(8);
        let dispatcher = Dispatcher::spawn(vec![first, second], 8);

        assert!(dispatcher.submit(record("a", 1)));

        let got = tokio::time::timeout(Duration::from_secs(1), first_rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(got.timestamp, 1);
        let got = tokio::time::timeout(Duration::from_secs(1), second_rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(got.topic, "a");
        assert_eq!(dispatcher.dropped(), 0);
    }

    #[tokio::test]
    async fn failing_output_does_not_block_others() {
        let (channel, mut rx) = Output::channel(8);
        let dispatcher = Dispatcher::spawn(vec![Output::tcp("127.0.0.1:1"), channel], 8);

        dispatcher.submit(record("a", 7));
        let got = tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(got.timestamp, 7);
    }

    #[tokio::test]
    async fn finish_waits_for_queued_records() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("predictions.ndjson");
        let dispatcher = Dispatcher::spawn(vec![Output::file(&path)], 64);

        for t in 0..10 {
            assert!(dispatcher.submit(record("a", t)));
        }
        tokio::time::timeout(Duration::from_secs(5), dispatcher.finish())
            .await
            .unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        assert_eq!(contents.lines().count(), 10);
    }

    #[tokio::test(flavor = "current_thread")]
    async fn full_queue_drops_and_counts() {
        let (channel, _rx) = Output::channel(1);
        let dispatcher = Dispatcher::spawn(vec![channel], 1);

        // The writer task cannot run until we yield, so the second submit
        // finds the queue full
        assert!(dispatcher.submit(record("a", 1)));
        assert!(!dispatcher.submit(record("a", 2)));
        assert_eq!(dispatcher.dropped(), 1);
    }
}
