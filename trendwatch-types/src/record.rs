//! Outbound shapes: persisted prediction records and renderer read models.

use crate::{Point, Series, ThresholdStatus, TimeFrame};

/// Lifecycle state of a topic monitor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase"))]
pub enum MonitorState {
    /// No data yet.
    #[default]
    Idle,
    /// A historical batch has been merged.
    Loaded,
    /// Receiving streamed samples.
    Live,
}

/// Ingestion counters for a topic monitor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MonitorStats {
    /// Samples appended to the live series.
    pub accepted: u64,
    /// Samples at or before the live tail (duplicates, reordering).
    pub rejected: u64,
    /// Samples whose time or value could not be read.
    pub malformed: u64,
}

/// A prediction record for a persistence collaborator.
///
/// Emitted once per accepted sample and once per threshold change.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase"))]
pub struct PredictionRecord {
    pub topic: String,
    pub live_value: f64,
    pub predicted_value: f64,
    pub threshold: f64,
    /// Seconds since the Unix epoch.
    pub timestamp: i64,
    pub threshold_reached: bool,
    pub threshold_reach_time: Option<String>,
    pub estimated_reach_time: Option<String>,
}

/// Endpoints of the horizontal threshold line a renderer draws.
///
/// Either empty or exactly two points at the threshold value.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct ThresholdLine {
    points: Vec<Point>,
}

impl ThresholdLine {
    /// A line with no endpoints.
    pub fn empty() -> Self {
        Self { points: Vec::new() }
    }

    /// A line from `start` to `end` at `value`.
    ///
    /// Returns an empty line unless `start < end`.
    pub fn between(start: i64, end: i64, value: f64) -> Self {
        if start >= end {
            return Self::empty();
        }
        Self {
            points: vec![
                Point { time: start, value },
                Point { time: end, value },
            ],
        }
    }

    /// Check if the line has no endpoints.
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// The endpoints, if any.
    pub fn endpoints(&self) -> Option<(Point, Point)> {
        match self.points.as_slice() {
            [start, end] => Some((*start, *end)),
            _ => None,
        }
    }

    /// Borrow the endpoints as a slice.
    pub fn as_slice(&self) -> &[Point] {
        &self.points
    }
}

/// Suggested visible time range for a chart, in epoch seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct VisibleRange {
    pub from: i64,
    pub to: i64,
}

/// Everything a renderer needs to draw one topic.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase"))]
pub struct ReadModel {
    pub topic: String,
    pub state: MonitorState,
    pub threshold: f64,
    pub time_frame: TimeFrame,
    pub live_series: Series,
    pub forecast_series: Series,
    pub threshold_line: ThresholdLine,
    /// `None` until the forecast holds enough points to estimate.
    pub status: Option<ThresholdStatus>,
    /// Human-readable rendering of `status`.
    pub status_text: String,
    pub visible_range: VisibleRange,
    pub stats: MonitorStats,
}

impl ReadModel {
    /// An empty read model for a topic with no data.
    pub fn empty(topic: impl Into<String>, threshold: f64, time_frame: TimeFrame, now: i64) -> Self {
        Self {
            topic: topic.into(),
            state: MonitorState::Idle,
            threshold,
            time_frame,
            live_series: Series::new(),
            forecast_series: Series::new(),
            threshold_line: ThresholdLine::empty(),
            status: None,
            status_text: String::new(),
            visible_range: VisibleRange {
                from: now - time_frame.window_secs(),
                to: now + 300,
            },
            stats: MonitorStats::default(),
        }
    }

    /// Latest live value, if any.
    pub fn live_value(&self) -> Option<f64> {
        self.live_series.last().map(|p| p.value)
    }

    /// Latest forecast value, if any.
    pub fn predicted_value(&self) -> Option<f64> {
        self.forecast_series.last().map(|p| p.value)
    }
}
