//! Export of final read models.

use std::collections::BTreeMap;
use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};
use serde_json::{json, Map, Value};
use trendwatch_engine::{Estimate, ReadModel, ThresholdStatus};

/// Build the export document for a set of read models.
///
/// The document carries a summary block followed by the full read model of
/// every topic.
pub fn build_export(models: &BTreeMap<String, ReadModel>) -> Value {
    let mut export = Map::new();

    // Summary
    let mut reached = 0usize;
    let mut within_day = 0usize;
    let mut beyond_day = 0usize;
    let mut not_trending = 0usize;
    let mut monitoring = 0usize;
    for model in models.values() {
        match model.status {
            Some(ThresholdStatus::Reached { .. }) => reached += 1,
            Some(ThresholdStatus::NotReached { estimate }) => match estimate {
                Estimate::WithinDay { .. } => within_day += 1,
                Estimate::BeyondDay => beyond_day += 1,
                Estimate::NotTrending => not_trending += 1,
            },
            None => monitoring += 1,
        }
    }
    let accepted: u64 = models.values().map(|m| m.stats.accepted).sum();
    let rejected: u64 = models.values().map(|m| m.stats.rejected).sum();
    let malformed: u64 = models.values().map(|m| m.stats.malformed).sum();

    export.insert(
        "summary".to_string(),
        json!({
            "total_topics": models.len(),
            "reached": reached,
            "within_day": within_day,
            "beyond_day": beyond_day,
            "not_trending": not_trending,
            "monitoring": monitoring,
            "samples_accepted": accepted,
            "samples_rejected": rejected,
            "samples_malformed": malformed,
        }),
    );

    // Topics
    let topics: Vec<Value> = models
        .values()
        .map(|model| serde_json::to_value(model).unwrap_or(Value::Null))
        .collect();
    export.insert("topics".to_string(), Value::Array(topics));

    Value::Object(export)
}

/// Write the export document to `path` as pretty-printed JSON.
pub fn export_to_file(models: &BTreeMap<String, ReadModel>, path: &Path) -> Result<()> {
    let json = serde_json::to_string_pretty(&build_export(models))?;
    let mut file = std::fs::File::create(path)
        .with_context(|| format!("failed to create {}", path.display()))?;
    file.write_all(json.as_bytes())?;
    Ok(())
}

/// One-line summary of a topic for the terminal.
pub fn summary_line(model: &ReadModel) -> String {
    let live = model
        .live_value()
        .map_or_else(|| "-".to_string(), |v| format!("{v:.2}"));
    let predicted = model
        .predicted_value()
        .map_or_else(|| "-".to_string(), |v| format!("{v:.2}"));
    format!(
        "{}: live={} predicted={} threshold={} [{}] {}",
        model.topic, live, predicted, model.threshold, model.time_frame, model.status_text
    )
}
