//! Per-topic monitor: live series, forecast series, threshold and status.

use std::sync::Arc;

use tracing::{debug, trace};
use trendwatch_types::{
    MonitorState, MonitorStats, Point, PredictionRecord, ReadModel, Series, ThresholdLine,
    ThresholdStatus, TimeFrame, VisibleRange,
};

use crate::buffer::SeriesBuffer;
use crate::clock::{Clock, SystemClock};
use crate::config::EngineSettings;
use crate::estimate::{describe, estimate, EstimatorConfig};
use crate::forecast::{Forecaster, TrendForecaster};
use crate::normalize::normalize;
use crate::sample::{HistoricalBatch, PersistedPrediction, RawSample};

/// Status text shown before the first estimate.
pub const MONITORING_TEXT: &str = "Monitoring...";

/// Seconds of lead room after the last live point in the visible range.
const VISIBLE_LEAD_SECS: i64 = 300;

/// A command for a topic monitor.
#[derive(Debug, Clone)]
pub enum MonitorCommand {
    Sample(RawSample),
    LoadHistory(HistoricalBatch),
    SetThreshold(f64),
    SetTimeFrame(TimeFrame),
    Restore(PersistedPrediction),
}

/// State and orchestration for one topic.
///
/// Each accepted sample flows through normalization, the live buffer, the
/// forecaster and the estimator. The monitor itself does no I/O: it returns
/// a [`PredictionRecord`] for the caller to persist and exposes a
/// [`ReadModel`] for the caller to render.
#[derive(Debug)]
pub struct TopicMonitor {
    topic: String,
    state: MonitorState,
    threshold: f64,
    default_threshold: f64,
    time_frame: TimeFrame,
    live: SeriesBuffer,
    forecast: SeriesBuffer,
    status: Option<ThresholdStatus>,
    stats: MonitorStats,
    estimator: EstimatorConfig,
    forecast_retention_secs: i64,
    forecaster: Box<dyn Forecaster>,
    clock: Arc<dyn Clock>,
}

impl TopicMonitor {
    /// Create an idle monitor using the engine settings.
    pub fn new(topic: impl Into<String>, settings: &EngineSettings) -> Self {
        Self {
            topic: topic.into(),
            state: MonitorState::Idle,
            threshold: settings.default_threshold,
            default_threshold: settings.default_threshold,
            time_frame: settings.default_time_frame,
            live: SeriesBuffer::new(),
            forecast: SeriesBuffer::new(),
            status: None,
            stats: MonitorStats::default(),
            estimator: settings.estimator_config(),
            forecast_retention_secs: settings.forecast_retention_secs,
            forecaster: Box::new(TrendForecaster::from_entropy(settings.forecast_config())),
            clock: Arc::new(SystemClock),
        }
    }

    /// Replace the forecaster.
    pub fn with_forecaster(mut self, forecaster: Box<dyn Forecaster>) -> Self {
        self.forecaster = forecaster;
        self
    }

    /// Replace the clock.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Apply a command, returning a record to persist if one was produced.
    pub fn apply(&mut self, command: MonitorCommand) -> Option<PredictionRecord> {
        match command {
            MonitorCommand::Sample(raw) => self.on_sample(&raw),
            MonitorCommand::LoadHistory(batch) => {
                self.load_history(&batch);
                None
            }
            MonitorCommand::SetThreshold(value) => self.set_threshold(value),
            MonitorCommand::SetTimeFrame(time_frame) => self.set_time_frame(time_frame),
            MonitorCommand::Restore(persisted) => {
                self.restore(&persisted);
                None
            }
        }
    }

    /// Ingest one streamed sample.
    ///
    /// Returns `None` when the sample is malformed or not strictly newer
    /// than the live tail; nothing changes in that case.
    pub fn on_sample(&mut self, raw: &RawSample) -> Option<PredictionRecord> {
        let now = self.clock.now();
        let Some(point) = raw.to_point(now) else {
            self.stats.malformed += 1;
            trace!(topic = %self.topic, "Ignored malformed sample");
            return None;
        };

        if !self.live.append(point) {
            self.stats.rejected += 1;
            trace!(
                topic = %self.topic,
                time = point.time,
                last = ?self.live.last_time(),
                "Rejected stale sample"
            );
            return None;
        }
        self.stats.accepted += 1;
        self.state = MonitorState::Live;

        let predicted = self
            .forecaster
            .forecast_next(&self.live, point, &self.forecast);
        self.forecast.append(predicted);
        self.recompute_status(now);

        self.live.trim(point.time - self.time_frame.window_secs());
        self.forecast.trim(point.time - self.forecast_retention_secs);

        Some(self.record(point.value, predicted.value, point.time))
    }

    /// Replace both series with a historical batch.
    pub fn load_history(&mut self, batch: &HistoricalBatch) {
        self.live.clear();
        self.live.merge(normalize(batch.live_records()));

        self.forecast.clear();
        self.forecast.merge(normalize(&batch.forecast_records()));

        self.state = MonitorState::Loaded;
        self.status = None;
        self.recompute_status(self.clock.now());

        debug!(
            topic = %self.topic,
            live = self.live.len(),
            forecast = self.forecast.len(),
            "Loaded history"
        );
    }

    /// Change the threshold.
    ///
    /// Non-finite values are ignored. Returns a record when the live series
    /// has data to attach it to.
    pub fn set_threshold(&mut self, threshold: f64) -> Option<PredictionRecord> {
        if !threshold.is_finite() {
            trace!(topic = %self.topic, threshold, "Ignored non-finite threshold");
            return None;
        }
        self.threshold = threshold;
        self.recompute_status(self.clock.now());
        debug!(topic = %self.topic, threshold, "Threshold changed");

        let last = *self.live.last()?;
        Some(self.record(last.value, last.value, last.time))
    }

    /// Change the time-frame. Takes effect at the next trim.
    ///
    /// Returns a record when the live series has data to attach it to.
    pub fn set_time_frame(&mut self, time_frame: TimeFrame) -> Option<PredictionRecord> {
        self.time_frame = time_frame;
        debug!(topic = %self.topic, %time_frame, "Time-frame changed");

        let last = *self.live.last()?;
        Some(self.record(last.value, last.value, last.time))
    }

    /// Re-seed threshold and forecast from a persisted prediction.
    pub fn restore(&mut self, persisted: &PersistedPrediction) {
        self.threshold = persisted
            .threshold
            .filter(|t| t.is_finite())
            .unwrap_or(self.default_threshold);

        let points = persisted.forecast_points();
        if !points.is_empty() {
            self.forecast.clear();
            self.forecast.merge(Series::from_points(points));
        }
        self.recompute_status(self.clock.now());

        debug!(
            topic = %self.topic,
            threshold = self.threshold,
            forecast = self.forecast.len(),
            "Restored prediction"
        );
    }

    /// Endpoints of the threshold line at `now`.
    ///
    /// Spans the live series. A live series covering a single instant is
    /// stretched to `now` when `now` is later; otherwise the line is empty.
    pub fn threshold_line(&self, now: i64) -> ThresholdLine {
        match (self.live.first(), self.live.last()) {
            (Some(first), Some(last)) if first.time < last.time => {
                ThresholdLine::between(first.time, last.time, self.threshold)
            }
            (Some(first), Some(_)) => ThresholdLine::between(first.time, now, self.threshold),
            _ => ThresholdLine::empty(),
        }
    }

    /// Build the read model at `now`.
    pub fn read_model(&self, now: i64) -> ReadModel {
        let anchor = self.live.last_time().unwrap_or(now);
        ReadModel {
            topic: self.topic.clone(),
            state: self.state,
            threshold: self.threshold,
            time_frame: self.time_frame,
            live_series: self.live.to_series(),
            forecast_series: self.forecast.to_series(),
            threshold_line: self.threshold_line(now),
            status: self.status,
            status_text: self.status_text(),
            visible_range: VisibleRange {
                from: anchor - self.time_frame.window_secs(),
                to: anchor + VISIBLE_LEAD_SECS,
            },
            stats: self.stats,
        }
    }

    /// Human-readable status.
    pub fn status_text(&self) -> String {
        self.status
            .as_ref()
            .map_or_else(|| MONITORING_TEXT.to_string(), describe)
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    pub fn now(&self) -> i64 {
        self.clock.now()
    }

    pub fn state(&self) -> MonitorState {
        self.state
    }

    pub fn status(&self) -> Option<ThresholdStatus> {
        self.status
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    pub fn time_frame(&self) -> TimeFrame {
        self.time_frame
    }

    pub fn stats(&self) -> MonitorStats {
        self.stats
    }

    pub fn live(&self) -> &SeriesBuffer {
        &self.live
    }

    pub fn forecast(&self) -> &SeriesBuffer {
        &self.forecast
    }

    fn recompute_status(&mut self, now: i64) {
        let tail: Vec<Point> = self.forecast.tail(self.estimator.regression_window);
        if let Some(status) = estimate(&tail, self.threshold, now, &self.estimator) {
            self.status = Some(status);
        }
    }

    fn record(&self, live_value: f64, predicted_value: f64, timestamp: i64) -> PredictionRecord {
        let (threshold_reached, threshold_reach_time, estimated_reach_time) = match &self.status {
            Some(status) if status.is_reached() => (true, Some(describe(status)), None),
            Some(status) => (false, None, Some(describe(status))),
            // No estimate yet, but the prediction itself may already be over
            None if predicted_value >= self.threshold => {
                let reached = ThresholdStatus::Reached { at: timestamp };
                (true, Some(describe(&reached)), None)
            }
            None => (false, None, None),
        };

        PredictionRecord {
            topic: self.topic.clone(),
            live_value,
            predicted_value,
            threshold: self.threshold,
            timestamp,
            threshold_reached,
            threshold_reach_time,
            estimated_reach_time,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::forecast::ForecastConfig;
    use serde_json::json;
    use trendwatch_types::Estimate;

    fn quiet_settings() -> EngineSettings {
        EngineSettings {
            noise_amplitude: 0.0,
            ..EngineSettings::default()
        }
    }

    fn monitor_at(now: i64) -> (TopicMonitor, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(now));
        let monitor = TopicMonitor::new("sensor/a", &quiet_settings()).with_clock(clock.clone());
        (monitor, clock)
    }

    fn sample(time: i64, value: f64) -> RawSample {
        RawSample::new(json!({
            "success": true,
            "message": { "message": value.to_string(), "timestamp": time }
        }))
    }

    fn history(points: &[(i64, f64)]) -> HistoricalBatch {
        HistoricalBatch {
            history: points
                .iter()
                .map(|(t, v)| json!({ "time": t, "value": v }))
                .collect(),
            ..HistoricalBatch::default()
        }
    }

    #[test]
    fn new_monitor_is_idle() {
        let (monitor, _) = monitor_at(0);
        assert_eq!(monitor.state(), MonitorState::Idle);
        assert_eq!(monitor.threshold(), 99.0);
        assert_eq!(monitor.status_text(), MONITORING_TEXT);
        assert!(monitor.threshold_line(10).is_empty());
    }

    #[test]
    fn rising_series_forecast_and_status() {
        let (mut monitor, _) = monitor_at(100);
        monitor.set_threshold(30.0);
        monitor.load_history(&history(&[(100, 10.0), (101, 12.0), (102, 14.0), (103, 16.0)]));
        assert_eq!(monitor.state(), MonitorState::Loaded);

        let record = monitor.on_sample(&sample(104, 18.0)).unwrap();
        assert_eq!(monitor.state(), MonitorState::Live);
        let predicted = *monitor.forecast().last().unwrap();
        assert_eq!(predicted.time, 105);
        assert_eq!(predicted.value, 22.0);
        assert_eq!(record.live_value, 18.0);
        assert_eq!(record.predicted_value, 22.0);
        assert_eq!(record.timestamp, 104);

        // One forecast point is not enough to estimate
        assert_eq!(monitor.forecast().len(), 1);
        assert!(monitor.status().is_none());
        assert!(record.estimated_reach_time.is_none());

        let record = monitor.on_sample(&sample(105, 20.0)).unwrap();
        assert_eq!(*monitor.forecast().last().unwrap(), Point { time: 106, value: 24.0 });
        // slope 2/s from (106, 24): reaches 30 at 109
        assert_eq!(
            monitor.status(),
            Some(ThresholdStatus::NotReached {
                estimate: Estimate::WithinDay { eta: 109 }
            })
        );
        assert!(!record.threshold_reached);
        assert!(record
            .estimated_reach_time
            .unwrap()
            .starts_with("Estimated to reach at "));
    }

    #[test]
    fn noisy_forecast_stays_in_band() {
        let settings = EngineSettings::default();
        let mut monitor = TopicMonitor::new("t", &settings)
            .with_clock(Arc::new(ManualClock::new(0)))
            .with_forecaster(Box::new(TrendForecaster::seeded(
                ForecastConfig::default(),
                42,
            )));
        monitor.load_history(&history(&[(100, 10.0), (101, 12.0), (102, 14.0), (103, 16.0)]));
        let record = monitor.on_sample(&sample(104, 18.0)).unwrap();
        assert!(record.predicted_value >= 21.0 && record.predicted_value < 23.0);
        assert!(monitor.forecast().last().unwrap().time >= 105);
    }

    #[test]
    fn duplicate_and_stale_samples_are_rejected() {
        let (mut monitor, _) = monitor_at(0);
        assert!(monitor.on_sample(&sample(100, 1.0)).is_some());
        assert!(monitor.on_sample(&sample(100, 2.0)).is_none());
        assert!(monitor.on_sample(&sample(99, 3.0)).is_none());
        assert!(monitor
            .on_sample(&RawSample::new(json!({ "message": "n/a", "timestamp": 200 })))
            .is_none());
        assert!(monitor
            .on_sample(&RawSample::new(json!({ "success": false, "message": 1 })))
            .is_none());

        assert_eq!(monitor.live().len(), 1);
        assert_eq!(monitor.forecast().len(), 1);
        assert_eq!(
            monitor.stats(),
            MonitorStats {
                accepted: 1,
                rejected: 2,
                malformed: 2
            }
        );
    }

    #[test]
    fn idle_monitor_accepts_samples() {
        let (mut monitor, _) = monitor_at(0);
        monitor.on_sample(&sample(10, 1.0));
        assert_eq!(monitor.state(), MonitorState::Live);
    }

    #[test]
    fn missing_timestamp_uses_clock() {
        let (mut monitor, clock) = monitor_at(5_000);
        let record = monitor
            .on_sample(&RawSample::new(json!({ "message": { "message": "4" } })))
            .unwrap();
        assert_eq!(record.timestamp, 5_000);

        clock.advance(1);
        let record = monitor
            .on_sample(&RawSample::new(json!({ "message": 5 })))
            .unwrap();
        assert_eq!(record.timestamp, 5_001);
    }

    #[test]
    fn live_series_is_trimmed_to_time_frame() {
        let (mut monitor, _) = monitor_at(0);
        monitor.on_sample(&sample(1_000, 1.0));
        monitor.on_sample(&sample(1_000 + 7_200, 2.0));
        assert_eq!(monitor.live().len(), 2);

        monitor.on_sample(&sample(1_000 + 7_201, 3.0));
        assert_eq!(monitor.live().first().unwrap().time, 8_200);
    }

    #[test]
    fn time_frame_change_applies_at_next_trim() {
        let (mut monitor, _) = monitor_at(0);
        monitor.on_sample(&sample(1_000, 1.0));
        monitor.on_sample(&sample(9_000, 2.0));
        assert_eq!(monitor.live().len(), 1);

        monitor.set_time_frame(TimeFrame::OneDay);
        monitor.on_sample(&sample(10_000, 3.0));
        monitor.on_sample(&sample(20_000, 4.0));
        assert_eq!(monitor.live().len(), 3);
        assert_eq!(monitor.time_frame(), TimeFrame::OneDay);
    }

    #[test]
    fn forecast_retention_is_independent_of_time_frame() {
        let (mut monitor, _) = monitor_at(0);
        monitor.set_time_frame(TimeFrame::OneMonth);
        monitor.on_sample(&sample(1_000, 1.0));
        monitor.on_sample(&sample(10_000, 2.0));
        assert_eq!(monitor.live().len(), 2);
        assert_eq!(monitor.forecast().len(), 1);
    }

    #[test]
    fn threshold_line_for_single_point() {
        let (mut monitor, _) = monitor_at(0);
        monitor.set_threshold(5.0);
        monitor.on_sample(&sample(100, 10.0));

        assert!(monitor.threshold_line(100).is_empty());
        assert!(monitor.threshold_line(50).is_empty());
        let (start, end) = monitor.threshold_line(160).endpoints().unwrap();
        assert_eq!(start, Point { time: 100, value: 5.0 });
        assert_eq!(end, Point { time: 160, value: 5.0 });
    }

    #[test]
    fn threshold_line_spans_live_series() {
        let (mut monitor, _) = monitor_at(0);
        monitor.load_history(&history(&[(100, 1.0), (150, 2.0), (200, 3.0)]));
        let (start, end) = monitor.threshold_line(10_000).endpoints().unwrap();
        assert_eq!((start.time, end.time), (100, 200));
        assert_eq!(start.value, 99.0);
    }

    #[test]
    fn threshold_change_recomputes_and_emits() {
        let (mut monitor, _) = monitor_at(0);
        assert!(monitor.set_threshold(50.0).is_none());

        monitor.on_sample(&sample(100, 10.0));
        monitor.on_sample(&sample(101, 11.0));
        assert!(!monitor.status().unwrap().is_reached());

        let record = monitor.set_threshold(1.0).unwrap();
        assert!(monitor.status().unwrap().is_reached());
        assert!(record.threshold_reached);
        assert!(record.threshold_reach_time.unwrap().starts_with("Reached at "));
        assert_eq!(record.live_value, 11.0);
        assert_eq!(record.predicted_value, 11.0);
        assert_eq!(record.timestamp, 101);
        assert_eq!(record.threshold, 1.0);

        assert!(monitor.set_threshold(f64::NAN).is_none());
        assert_eq!(monitor.threshold(), 1.0);
    }

    #[test]
    fn history_prefers_realtime_and_seeds_forecast() {
        let (mut monitor, _) = monitor_at(0);
        let batch: HistoricalBatch = serde_json::from_value(json!({
            "history": [{ "time": 1, "value": 1 }],
            "realtime": [{ "time": 10, "value": 5 }, { "time": 11, "value": 6 }],
            "predictionGraphData": [{ "time": 12, "value": 7 }],
            "predictions": [{ "time": 13, "value": 8 }, { "time": 12, "value": 9 }]
        }))
        .unwrap();
        monitor.load_history(&batch);

        let live: Vec<i64> = monitor.live().iter().map(|p| p.time).collect();
        assert_eq!(live, vec![10, 11]);
        let forecast: Vec<(i64, f64)> =
            monitor.forecast().iter().map(|p| (p.time, p.value)).collect();
        assert_eq!(forecast, vec![(12, 9.0), (13, 8.0)]);
        assert!(monitor.status().is_some());
    }

    #[test]
    fn reload_replaces_series_and_returns_to_loaded() {
        let (mut monitor, _) = monitor_at(0);
        monitor.on_sample(&sample(500, 1.0));
        monitor.on_sample(&sample(501, 1.0));
        assert_eq!(monitor.state(), MonitorState::Live);

        monitor.load_history(&history(&[(10, 1.0)]));
        assert_eq!(monitor.state(), MonitorState::Loaded);
        assert_eq!(monitor.live().len(), 1);
        assert!(monitor.forecast().is_empty());
        assert!(monitor.status().is_none());
    }

    #[test]
    fn restore_seeds_threshold_and_forecast() {
        let (mut monitor, _) = monitor_at(0);
        let persisted: PersistedPrediction = serde_json::from_value(json!({
            "threshold": 10.0,
            "predictionHistory": [
                { "timestamp": 100, "liveValue": 1, "predictedValue": 12 },
                { "timestamp": 101, "liveValue": 1, "predictedValue": 13 }
            ]
        }))
        .unwrap();
        monitor.restore(&persisted);
        assert_eq!(monitor.threshold(), 10.0);
        assert_eq!(monitor.forecast().len(), 2);
        assert_eq!(monitor.status(), Some(ThresholdStatus::Reached { at: 101 }));

        monitor.restore(&PersistedPrediction::default());
        assert_eq!(monitor.threshold(), 99.0);
        assert_eq!(monitor.forecast().len(), 2);
    }

    #[test]
    fn read_model_reflects_state() {
        let (mut monitor, _) = monitor_at(1_000);
        monitor.on_sample(&sample(900, 1.0));
        monitor.on_sample(&sample(950, 2.0));

        let model = monitor.read_model(1_000);
        assert_eq!(model.topic, "sensor/a");
        assert_eq!(model.state, MonitorState::Live);
        assert_eq!(model.live_series.len(), 2);
        assert_eq!(model.forecast_series.len(), 2);
        assert_eq!(model.live_value(), Some(2.0));
        assert_eq!(model.visible_range, VisibleRange { from: 950 - 7_200, to: 1_250 });
        assert_eq!(model.status_text, describe(&model.status.unwrap()));
        assert_eq!(model.stats.accepted, 2);
    }

    #[test]
    fn apply_dispatches_commands() {
        let (mut monitor, _) = monitor_at(0);
        assert!(monitor.apply(MonitorCommand::Sample(sample(1, 1.0))).is_some());
        assert!(monitor.apply(MonitorCommand::SetThreshold(3.0)).is_some());
        assert!(monitor
            .apply(MonitorCommand::SetTimeFrame(TimeFrame::OneWeek))
            .is_some());
        assert!(monitor
            .apply(MonitorCommand::LoadHistory(HistoricalBatch::default()))
            .is_none());
        assert!(monitor
            .apply(MonitorCommand::Restore(PersistedPrediction::default()))
            .is_none());
        assert_eq!(monitor.time_frame(), TimeFrame::OneWeek);
        assert!(monitor.live().is_empty());
    }

    #[test]
    fn first_prediction_over_threshold_is_flagged() {
        let (mut monitor, _) = monitor_at(0);
        monitor.set_threshold(5.0);

        let record = monitor.on_sample(&sample(100, 50.0)).unwrap();
        assert!(monitor.status().is_none());
        assert_eq!(record.predicted_value, 50.0);
        assert!(record.threshold_reached);
        assert!(record.threshold_reach_time.unwrap().starts_with("Reached at "));
        assert!(record.estimated_reach_time.is_none());

        let (mut monitor, _) = monitor_at(0);
        monitor.set_threshold(500.0);
        let record = monitor.on_sample(&sample(100, 50.0)).unwrap();
        assert!(!record.threshold_reached);
        assert!(record.threshold_reach_time.is_none());
    }

    #[test]
    fn time_frame_change_emits_record() {
        let (mut monitor, _) = monitor_at(0);
        assert!(monitor.set_time_frame(TimeFrame::EightHours).is_none());

        monitor.on_sample(&sample(100, 10.0));
        monitor.on_sample(&sample(101, 11.0));
        let record = monitor
            .apply(MonitorCommand::SetTimeFrame(TimeFrame::OneDay))
            .unwrap();
        assert_eq!(monitor.time_frame(), TimeFrame::OneDay);
        assert_eq!(record.topic, "sensor/a");
        assert_eq!(record.live_value, 11.0);
        assert_eq!(record.timestamp, 101);
        assert!(!record.threshold_reached);
        assert!(record.estimated_reach_time.is_some());
    }
}
