//! Handle to a running topic monitor.

use tokio::sync::{mpsc, oneshot, watch};
use tracing::debug;
use trendwatch_types::{ReadModel, TimeFrame};

use crate::error::{EngineError, Result};
use crate::monitor::{MonitorCommand, TopicMonitor};
use crate::output::Dispatcher;
use crate::sample::{HistoricalBatch, PersistedPrediction, RawSample};

/// A handle for driving one topic's monitor.
///
/// The monitor runs in its own task and owns its buffers outright; the
/// handle only sends commands and reads the latest published
/// [`ReadModel`]. Handles are cheap to clone. The task stops once every
/// handle is dropped.
///
/// # Example
///
/// ```rust
/// use serde_json::json;
/// use trendwatch_engine::{EngineSettings, RawSample, TopicHandle, TopicMonitor};
///
/// # tokio_test::block_on(async {
/// let monitor = TopicMonitor::new("sensor/a", &EngineSettings::default());
/// let handle = TopicHandle::spawn(monitor, None, 16);
///
/// handle
///     .send_sample(RawSample::new(json!({ "time": 100, "value": 1.5 })))
///     .await
///     .unwrap();
///
/// let mut handle = handle;
/// handle.changed().await.unwrap();
/// assert_eq!(handle.read_model().live_value(), Some(1.5));
/// # });
/// ```
#[derive(Debug, Clone)]
pub struct TopicHandle {
    topic: String,
    tx: mpsc::Sender<Request>,
    rx: watch::Receiver<ReadModel>,
}

#[derive(Debug)]
enum Request {
    Command(MonitorCommand),
    Sync(oneshot::Sender<ReadModel>),
}

impl TopicHandle {
    /// Spawn `monitor` on the current tokio runtime.
    ///
    /// Records produced by the monitor are submitted to `dispatcher`, when
    /// one is given.
    pub fn spawn(mut monitor: TopicMonitor, dispatcher: Option<Dispatcher>, queue: usize) -> Self {
        let topic = monitor.topic().to_string();
        let (tx, mut requests) = mpsc::channel::<Request>(queue.max(1));
        let (model_tx, rx) = watch::channel(monitor.read_model(monitor.now()));

        tokio::spawn(async move {
            while let Some(request) = requests.recv().await {
                match request {
                    Request::Command(command) => {
                        let record = monitor.apply(command);
                        if let (Some(record), Some(dispatcher)) = (record, dispatcher.as_ref()) {
                            dispatcher.submit(record);
                        }
                        model_tx.send_replace(monitor.read_model(monitor.now()));
                    }
                    Request::Sync(reply) => {
                        let _ = reply.send(monitor.read_model(monitor.now()));
                    }
                }
            }
            debug!(topic = %monitor.topic(), "Monitor stopped");
        });

        Self { topic, tx, rx }
    }

    /// Deliver a streamed sample.
    pub async fn send_sample(&self, sample: RawSample) -> Result<()> {
        self.send(MonitorCommand::Sample(sample)).await
    }

    /// Replace the monitor's series with a historical batch.
    pub async fn load_history(&self, batch: HistoricalBatch) -> Result<()> {
        self.send(MonitorCommand::LoadHistory(batch)).await
    }

    /// Change the threshold.
    pub async fn set_threshold(&self, threshold: f64) -> Result<()> {
        self.send(MonitorCommand::SetThreshold(threshold)).await
    }

    /// Change the time-frame.
    pub async fn set_time_frame(&self, time_frame: TimeFrame) -> Result<()> {
        self.send(MonitorCommand::SetTimeFrame(time_frame)).await
    }

    /// Re-seed threshold and forecast from a persisted prediction.
    pub async fn restore(&self, persisted: PersistedPrediction) -> Result<()> {
        self.send(MonitorCommand::Restore(persisted)).await
    }

    /// Wait for every command sent before this call to be applied, then
    /// return the resulting read model.
    pub async fn sync(&self) -> Result<ReadModel> {
        let (reply, response) = oneshot::channel();
        self.tx
            .send(Request::Sync(reply))
            .await
            .map_err(|_| self.closed())?;
        response.await.map_err(|_| self.closed())
    }

    /// The latest published read model.
    pub fn read_model(&self) -> ReadModel {
        self.rx.borrow().clone()
    }

    /// Wait until a new read model is published.
    pub async fn changed(&mut self) -> Result<()> {
        self.rx.changed().await.map_err(|_| self.closed())
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Returns true once the monitor task has stopped.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }

    async fn send(&self, command: MonitorCommand) -> Result<()> {
        self.tx
            .send(Request::Command(command))
            .await
            .map_err(|_| self.closed())
    }

    fn closed(&self) -> EngineError {
        EngineError::MonitorClosed(self.topic.clone())
    }
}
