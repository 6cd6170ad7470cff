//! Inbound shapes: streamed samples, historical batches and persisted
//! predictions.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use trendwatch_types::Point;

use crate::normalize::{coerce_time, coerce_value, field, is_blank};

/// A single streamed sample as delivered by the transport.
///
/// The payload is kept as raw JSON. Producers wrap the reading in up to
/// three levels of `message`, so the value is looked up at
/// `message.message.message`, then `message.message`, then `message`, then
/// `value`. The timestamp is read from `message.timestamp`, then the
/// top-level `timestamp` or `time`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RawSample(pub Value);

impl RawSample {
    pub fn new(value: Value) -> Self {
        Self(value)
    }

    /// Topic carried by the envelope, if any.
    pub fn topic(&self) -> Option<&str> {
        self.0.get("topic").and_then(Value::as_str)
    }

    /// Returns true if the producer flagged the envelope as a failure.
    pub fn is_failure(&self) -> bool {
        matches!(self.0.get("success"), Some(Value::Bool(false)))
    }

    /// The raw value field, before coercion.
    pub fn raw_value(&self) -> Option<&Value> {
        let message = self.0.get("message");
        let nested = message.and_then(|m| m.get("message"));
        let innermost = nested.and_then(|m| m.get("message"));

        [innermost, nested, message, self.0.get("value")]
            .into_iter()
            .flatten()
            .find(|v| !is_blank(v) && !v.is_object())
    }

    /// The raw timestamp field, before coercion.
    pub fn raw_time(&self) -> Option<&Value> {
        self.0
            .get("message")
            .and_then(|m| m.get("timestamp"))
            .filter(|v| !is_blank(v))
            .or_else(|| field(&self.0, &["timestamp", "time"]))
    }

    /// Read the sample as a point.
    ///
    /// A missing timestamp means the sample was taken at `now`. Returns
    /// `None` for failure envelopes, unreadable values, or a timestamp that
    /// is present but unreadable.
    pub fn to_point(&self, now: i64) -> Option<Point> {
        if self.is_failure() {
            return None;
        }
        let value = self.raw_value().and_then(coerce_value)?;
        let time = match self.raw_time() {
            Some(raw) => coerce_time(raw)?,
            None => now,
        };
        Point::new(time, value)
    }
}

impl From<Value> for RawSample {
    fn from(value: Value) -> Self {
        Self(value)
    }
}

/// A historical batch returned by a query collaborator.
///
/// Every array holds records of the point shape accepted by
/// [`normalize`](crate::normalize::normalize). Producers disagree on field
/// names, so each spelling is kept separately and resolved by
/// [`live_records`](Self::live_records). A field that is `null` or not an
/// array reads as empty.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoricalBatch {
    /// Stored history.
    #[serde(default, deserialize_with = "lenient_array")]
    pub history: Vec<Value>,

    #[serde(default, deserialize_with = "lenient_array")]
    pub historical: Vec<Value>,

    #[serde(default, deserialize_with = "lenient_array")]
    pub history_graph_data: Vec<Value>,

    /// Recent points for the requested range. Preferred over the stored
    /// history when non-empty.
    #[serde(default, deserialize_with = "lenient_array")]
    pub realtime: Vec<Value>,

    #[serde(default, deserialize_with = "lenient_array")]
    pub messages: Vec<Value>,

    /// Previously stored forecast points.
    #[serde(
        default,
        rename = "predictionGraphData",
        deserialize_with = "lenient_array"
    )]
    pub prediction_base: Vec<Value>,

    /// Forecast points produced by the query service.
    #[serde(default, deserialize_with = "lenient_array")]
    pub predictions: Vec<Value>,
}

impl HistoricalBatch {
    /// Records that seed the live series.
    ///
    /// The first non-empty of `realtime`, `messages`, `historyGraphData`,
    /// `historical` and `history`.
    pub fn live_records(&self) -> &[Value] {
        [
            &self.realtime,
            &self.messages,
            &self.history_graph_data,
            &self.historical,
            &self.history,
        ]
        .into_iter()
        .find(|records| !records.is_empty())
        .map(Vec::as_slice)
        .unwrap_or(&[])
    }

    /// Records that seed the forecast series, in merge order.
    pub fn forecast_records(&self) -> Vec<Value> {
        self.prediction_base
            .iter()
            .chain(&self.predictions)
            .cloned()
            .collect()
    }
}

/// A previously persisted prediction document for a topic.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistedPrediction {
    #[serde(default, deserialize_with = "lenient_number")]
    pub threshold: Option<f64>,
    #[serde(default, deserialize_with = "lenient_array")]
    pub prediction_history: Vec<Value>,
}

/// Read an array field, treating `null` and non-arrays as empty.
fn lenient_array<'de, D>(deserializer: D) -> Result<Vec<Value>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::Array(items) => items,
        _ => Vec::new(),
    })
}

/// Read a number or numeric string, treating anything else as absent.
fn lenient_number<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(coerce_value(&Value::deserialize(deserializer)?))
}

impl PersistedPrediction {
    /// Forecast points stored in the history, read from `timestamp` and
    /// `predictedValue`.
    pub fn forecast_points(&self) -> Vec<Point> {
        self.prediction_history
            .iter()
            .filter_map(|entry| {
                let time = field(entry, &["timestamp", "time"]).and_then(coerce_time)?;
                let value = field(entry, &["predictedValue"]).and_then(coerce_value)?;
                Point::new(time, value)
            })
            .collect()
    }
}
