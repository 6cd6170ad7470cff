//! Line envelopes accepted on the input stream.
//!
//! Each line is a JSON object addressed to a topic. Without a `type` field
//! the line is a streamed sample; otherwise `type` selects a configuration
//! call for that topic.
//!
//! ```text
//! {"topic":"sensor/a","message":{"message":"12.5","timestamp":"2025-01-01T12:00:00Z"}}
//! {"topic":"sensor/a","type":"history","history":[{"time":1735732800,"value":11.0}]}
//! {"topic":"sensor/a","type":"threshold","threshold":30}
//! {"topic":"sensor/a","type":"timeFrame","timeFrame":"1d"}
//! {"topic":"sensor/a","type":"restore","threshold":30,"predictionHistory":[]}
//! ```

use anyhow::{anyhow, bail, Context, Result};
use serde_json::Value;
use trendwatch_engine::normalize::coerce_value;
use trendwatch_engine::{HistoricalBatch, PersistedPrediction, RawSample, TimeFrame};

/// A decoded input line.
#[derive(Debug, Clone, PartialEq)]
pub enum Envelope {
    Sample { topic: String, sample: RawSample },
    History { topic: String, batch: HistoricalBatch },
    Threshold { topic: String, threshold: f64 },
    TimeFrame { topic: String, time_frame: TimeFrame },
    Restore { topic: String, persisted: PersistedPrediction },
}

impl Envelope {
    /// Decode one line.
    ///
    /// Lines without a `topic` are addressed to `default_topic`, if given.
    pub fn parse(line: &str, default_topic: Option<&str>) -> Result<Self> {
        let value: Value = serde_json::from_str(line).context("invalid JSON")?;
        if !value.is_object() {
            bail!("expected a JSON object");
        }

        let topic = value
            .get("topic")
            .and_then(Value::as_str)
            .or(default_topic)
            .ok_or_else(|| anyhow!("missing topic"))?
            .to_string();
        let kind = value
            .get("type")
            .and_then(Value::as_str)
            .unwrap_or("sample")
            .to_string();

        let envelope = match kind.as_str() {
            "sample" => Envelope::Sample {
                topic,
                sample: RawSample::new(value),
            },
            "history" => Envelope::History {
                topic,
                batch: serde_json::from_value(value).context("invalid history batch")?,
            },
            "threshold" => {
                let threshold = value
                    .get("threshold")
                    .and_then(coerce_value)
                    .ok_or_else(|| anyhow!("threshold must be a finite number"))?;
                Envelope::Threshold { topic, threshold }
            }
            "timeFrame" | "timeframe" => {
                let label = value
                    .get("timeFrame")
                    .or_else(|| value.get("timeframe"))
                    .and_then(Value::as_str)
                    .unwrap_or_default();
                Envelope::TimeFrame {
                    topic,
                    time_frame: TimeFrame::parse_lenient(label),
                }
            }
            "restore" => Envelope::Restore {
                topic,
                persisted: serde_json::from_value(value).context("invalid persisted prediction")?,
            },
            other => bail!("unknown envelope type: {other}"),
        };
        Ok(envelope)
    }

    pub fn topic(&self) -> &str {
        match self {
            Envelope::Sample { topic, .. }
            | Envelope::History { topic, .. }
            | Envelope::Threshold { topic, .. }
            | Envelope::TimeFrame { topic, .. }
            | Envelope::Restore { topic, .. } => topic,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_line_is_a_sample() {
        let envelope = Envelope::parse(r#"{"topic":"a","time":1,"value":2}"#, None).unwrap();
        match envelope {
            Envelope::Sample { topic, sample } => {
                assert_eq!(topic, "a");
                assert_eq!(sample.to_point(0).unwrap().value, 2.0);
            }
            other => panic!("unexpected envelope: {other:?}"),
        }
    }

    #[test]
    fn default_topic_fills_in() {
        let envelope = Envelope::parse(r#"{"time":1,"value":2}"#, Some("fallback")).unwrap();
        assert_eq!(envelope.topic(), "fallback");
        assert!(Envelope::parse(r#"{"time":1,"value":2}"#, None).is_err());
    }

    #[test]
    fn history_line() {
        let line = r#"{"topic":"a","type":"history","historical":[{"time":1,"value":1}],"predictions":[]}"#;
        match Envelope::parse(line, None).unwrap() {
            Envelope::History { batch, .. } => assert_eq!(batch.live_records().len(), 1),
            other => panic!("unexpected envelope: {other:?}"),
        }
    }

    #[test]
    fn history_line_with_overlapping_and_null_fields() {
        let line = r#"{"topic":"a","type":"history","historyGraphData":[{"time":1,"value":1},{"time":2,"value":2}],"historical":[{"time":1,"value":1}],"realtime":null,"predictions":null}"#;
        match Envelope::parse(line, None).unwrap() {
            Envelope::History { batch, .. } => {
                assert_eq!(batch.live_records().len(), 2);
                assert!(batch.forecast_records().is_empty());
            }
            other => panic!("unexpected envelope: {other:?}"),
        }
    }

    #[test]
    fn threshold_line_accepts_numeric_strings() {
        let envelope = Envelope::parse(r#"{"topic":"a","type":"threshold","threshold":"42"}"#, None)
            .unwrap();
        assert_eq!(
            envelope,
            Envelope::Threshold {
                topic: "a".to_string(),
                threshold: 42.0
            }
        );
        assert!(Envelope::parse(r#"{"topic":"a","type":"threshold"}"#, None).is_err());
    }

    #[test]
    fn time_frame_line_falls_back_to_two_hours() {
        let envelope =
            Envelope::parse(r#"{"topic":"a","type":"timeFrame","timeFrame":"1W"}"#, None).unwrap();
        assert!(matches!(envelope, Envelope::TimeFrame { time_frame: TimeFrame::OneWeek, .. }));

        let envelope =
            Envelope::parse(r#"{"topic":"a","type":"timeFrame","timeFrame":"90m"}"#, None).unwrap();
        assert!(matches!(envelope, Envelope::TimeFrame { time_frame: TimeFrame::TwoHours, .. }));
    }

    #[test]
    fn restore_line() {
        let line = r#"{"topic":"a","type":"restore","threshold":5,"predictionHistory":[{"timestamp":1,"predictedValue":2}]}"#;
        match Envelope::parse(line, None).unwrap() {
            Envelope::Restore { persisted, .. } => {
                assert_eq!(persisted.threshold, Some(5.0));
                assert_eq!(persisted.forecast_points().len(), 1);
            }
            other => panic!("unexpected envelope: {other:?}"),
        }
    }

    #[test]
    fn rejects_garbage() {
        assert!(Envelope::parse("not json", None).is_err());
        assert!(Envelope::parse("[1,2]", None).is_err());
        assert!(Envelope::parse(r#"{"topic":"a","type":"bogus"}"#, None).is_err());
    }
}
