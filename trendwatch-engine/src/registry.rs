//! Registry of topic monitors.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{debug, trace};
use trendwatch_types::{ReadModel, TimeFrame};

use crate::clock::{Clock, SystemClock};
use crate::config::EngineSettings;
use crate::error::{EngineError, Result};
use crate::forecast::TrendForecaster;
use crate::handle::TopicHandle;
use crate::monitor::TopicMonitor;
use crate::output::{Dispatcher, Output};
use crate::sample::{HistoricalBatch, PersistedPrediction, RawSample};

/// The set of monitored topics.
///
/// Each subscribed topic gets an independent [`TopicMonitor`] running in its
/// own task. The registry routes samples and configuration calls by topic
/// and collects read models; it does not own any transport.
///
/// # Example
///
/// ```rust,no_run
/// use serde_json::json;
/// use trendwatch_engine::{MonitorRegistry, Output, RawSample};
///
/// #[tokio::main]
/// async fn main() {
///     let registry = MonitorRegistry::builder()
///         .output(Output::file("predictions.ndjson"))
///         .build();
///
///     registry.subscribe("sensor/temperature");
///     registry.set_threshold("sensor/temperature", 80.0).await.unwrap();
///
///     let sample = RawSample::new(json!({
///         "success": true,
///         "message": { "message": "72.4", "timestamp": "2025-01-01T12:00:00Z" }
///     }));
///     registry.route_sample("sensor/temperature", sample).await;
///
///     for (topic, model) in registry.read_models() {
///         println!("{topic}: {}", model.status_text);
///     }
/// }
/// ```
#[derive(Debug)]
pub struct MonitorRegistry {
    monitors: RwLock<BTreeMap<String, TopicHandle>>,
    settings: EngineSettings,
    dispatcher: Option<Dispatcher>,
    clock: Arc<dyn Clock>,
    seed: Option<u64>,
    /// Subscriptions made so far, never reused.
    subscriptions: AtomicU64,
}

impl MonitorRegistry {
    /// Create a registry with default settings and no outputs.
    pub fn new() -> Self {
        Self::builder().build()
    }

    /// Create a builder for configuring the registry.
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::new()
    }

    /// Start monitoring a topic.
    ///
    /// If the topic is already subscribed, returns a handle to the existing
    /// monitor. Must be called inside a tokio runtime.
    pub fn subscribe(&self, topic: &str) -> TopicHandle {
        // Fast path: check if it exists
        {
            let monitors = self.monitors.read();
            if let Some(handle) = monitors.get(topic) {
                return handle.clone();
            }
        }

        // Slow path: create it
        let mut monitors = self.monitors.write();
        if let Some(handle) = monitors.get(topic) {
            return handle.clone();
        }
        let index = self.subscriptions.fetch_add(1, Ordering::Relaxed);
        let monitor = self.new_monitor(topic, index);
        let handle = TopicHandle::spawn(monitor, self.dispatcher.clone(), self.settings.command_queue);
        monitors.insert(topic.to_string(), handle.clone());
        debug!(topic, "Subscribed");
        handle
    }

    /// Stop monitoring a topic.
    ///
    /// Returns `true` if the topic was subscribed. The monitor task stops
    /// once outstanding handles are dropped.
    pub fn unsubscribe(&self, topic: &str) -> bool {
        let removed = self.monitors.write().remove(topic).is_some();
        if removed {
            debug!(topic, "Unsubscribed");
        }
        removed
    }

    /// Route a sample to its topic's monitor.
    ///
    /// Returns `false` without doing anything if the topic is not
    /// subscribed or its monitor has stopped.
    pub async fn route_sample(&self, topic: &str, sample: RawSample) -> bool {
        let Some(handle) = self.handle(topic) else {
            trace!(topic, "Dropped sample for unknown topic");
            return false;
        };
        handle.send_sample(sample).await.is_ok()
    }

    /// Replace a topic's series with a historical batch.
    pub async fn load_history(&self, topic: &str, batch: HistoricalBatch) -> Result<()> {
        self.require(topic)?.load_history(batch).await
    }

    /// Change a topic's threshold.
    pub async fn set_threshold(&self, topic: &str, threshold: f64) -> Result<()> {
        self.require(topic)?.set_threshold(threshold).await
    }

    /// Change several thresholds at once.
    ///
    /// Unknown topics are skipped. Returns the number of monitors updated.
    pub async fn set_thresholds(&self, thresholds: &[(String, f64)]) -> usize {
        let mut updated = 0;
        for (topic, threshold) in thresholds {
            match self.set_threshold(topic, *threshold).await {
                Ok(()) => updated += 1,
                Err(err) => trace!(topic = %topic, error = %err, "Skipped threshold update"),
            }
        }
        updated
    }

    /// Change a topic's time-frame.
    pub async fn set_time_frame(&self, topic: &str, time_frame: TimeFrame) -> Result<()> {
        self.require(topic)?.set_time_frame(time_frame).await
    }

    /// Re-seed a topic from a persisted prediction.
    pub async fn restore(&self, topic: &str, persisted: PersistedPrediction) -> Result<()> {
        self.require(topic)?.restore(persisted).await
    }

    /// Handle for a subscribed topic.
    pub fn handle(&self, topic: &str) -> Option<TopicHandle> {
        self.monitors.read().get(topic).cloned()
    }

    /// Subscribed topics, sorted.
    pub fn topics(&self) -> Vec<String> {
        self.monitors.read().keys().cloned().collect()
    }

    /// Latest read model for a topic.
    pub fn read_model(&self, topic: &str) -> Option<ReadModel> {
        self.monitors.read().get(topic).map(TopicHandle::read_model)
    }

    /// Latest read models for every topic.
    pub fn read_models(&self) -> BTreeMap<String, ReadModel> {
        self.monitors
            .read()
            .iter()
            .map(|(topic, handle)| (topic.clone(), handle.read_model()))
            .collect()
    }

    /// Wait for every monitor to apply its queued commands, then return the
    /// resulting read models.
    ///
    /// Monitors that have stopped are left out.
    pub async fn sync_all(&self) -> BTreeMap<String, ReadModel> {
        let handles: Vec<TopicHandle> = self.monitors.read().values().cloned().collect();
        let mut models = BTreeMap::new();
        for handle in handles {
            if let Ok(model) = handle.sync().await {
                models.insert(handle.topic().to_string(), model);
            }
        }
        models
    }

    /// Stop every monitor and wait for queued prediction records to be
    /// written.
    ///
    /// Handles cloned out of the registry keep their monitor running, and
    /// this call waiting, until they are dropped.
    pub async fn shutdown(self) {
        let handles = std::mem::take(&mut *self.monitors.write());
        for handle in handles.values() {
            let _ = handle.sync().await;
        }
        drop(handles);

        if let Some(dispatcher) = self.dispatcher {
            dispatcher.finish().await;
        }
        debug!("Registry shut down");
    }

    pub fn len(&self) -> usize {
        self.monitors.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.monitors.read().is_empty()
    }

    /// Prediction records dropped because the persistence queue was full.
    pub fn dropped_records(&self) -> u64 {
        self.dispatcher.as_ref().map_or(0, Dispatcher::dropped)
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    fn require(&self, topic: &str) -> Result<TopicHandle> {
        self.handle(topic)
            .ok_or_else(|| EngineError::UnknownTopic(topic.to_string()))
    }

    fn new_monitor(&self, topic: &str, index: u64) -> TopicMonitor {
        let monitor = TopicMonitor::new(topic, &self.settings).with_clock(self.clock.clone());
        match self.seed {
            Some(seed) => monitor.with_forecaster(Box::new(TrendForecaster::seeded(
                self.settings.forecast_config(),
                seed.wrapping_add(index),
            ))),
            None => monitor,
        }
    }
}

impl Default for MonitorRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for configuring a [`MonitorRegistry`].
#[derive(Debug, Default)]
pub struct RegistryBuilder {
    settings: EngineSettings,
    outputs: Vec<Output>,
    clock: Option<Arc<dyn Clock>>,
    seed: Option<u64>,
}

impl RegistryBuilder {
    /// Create a new builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the engine settings every monitor starts from.
    pub fn settings(mut self, settings: EngineSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Add an output destination.
    ///
    /// Multiple outputs can be added; records will be written to all of them.
    pub fn output(mut self, output: Output) -> Self {
        self.outputs.push(output);
        self
    }

    /// Set the clock monitors read "now" from.
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Seed forecast jitter for reproducible runs.
    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Build the registry.
    ///
    /// Spawns the persistence dispatcher when outputs are configured, so
    /// this must run inside a tokio runtime in that case.
    pub fn build(self) -> MonitorRegistry {
        let dispatcher = if self.outputs.is_empty() {
            None
        } else {
            Some(Dispatcher::spawn(self.outputs, self.settings.persist_queue))
        };

        MonitorRegistry {
            monitors: RwLock::new(BTreeMap::new()),
            settings: self.settings,
            dispatcher,
            clock: self.clock.unwrap_or_else(|| Arc::new(SystemClock)),
            seed: self.seed,
            subscriptions: AtomicU64::new(0),
        }
    }
}
