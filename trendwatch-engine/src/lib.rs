//! # trendwatch-engine
//!
//! Live series normalization, trend forecasting and threshold estimation for
//! numeric metric streams.
//!
//! Each monitored topic gets a [`TopicMonitor`] that keeps a clean live
//! series, a short-horizon forecast and an estimate of when the value will
//! cross a threshold. A [`MonitorRegistry`] runs one monitor per topic and
//! routes samples to them. Rendering and transport are left to the caller.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use serde_json::json;
//! use trendwatch_engine::{MonitorRegistry, Output, RawSample};
//!
//! #[tokio::main]
//! async fn main() {
//!     // Persist a prediction record for every accepted sample
//!     let registry = MonitorRegistry::builder()
//!         .output(Output::file("predictions.ndjson"))
//!         .build();
//!
//!     let handle = registry.subscribe("sensor/pressure");
//!     registry.set_threshold("sensor/pressure", 30.0).await.unwrap();
//!
//!     // Feed samples as the transport delivers them
//!     for (time, value) in [(100, 10.0), (101, 12.0), (102, 14.0)] {
//!         let sample = RawSample::new(json!({ "time": time, "value": value }));
//!         registry.route_sample("sensor/pressure", sample).await;
//!     }
//!
//!     // Read the latest state for rendering
//!     let model = handle.read_model();
//!     println!("{}", model.status_text);
//! }
//! ```
//!
//! ## Features
//!
//! - **Tolerant input**: epoch numbers, numeric strings, ISO-8601 dates and
//!   nested `message` envelopes all normalize to the same points
//! - **Ordered series**: duplicates and out-of-order samples never reach the
//!   live series
//! - **Per-topic isolation**: one task per topic, no shared buffers
//! - **Fire-and-forget persistence**: File, TCP, channel or HTTP outputs
//!   behind a bounded queue

pub mod buffer;
pub mod clock;
pub mod config;
pub mod error;
pub mod estimate;
pub mod forecast;
mod handle;
pub mod monitor;
pub mod normalize;
mod output;
mod registry;
pub mod sample;

pub use buffer::SeriesBuffer;
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::EngineSettings;
pub use error::{EngineError, Result};
pub use estimate::{describe, estimate, EstimatorConfig};
pub use forecast::{ForecastConfig, Forecaster, TrendForecaster, TrendSignal};
pub use handle::TopicHandle;
pub use monitor::{MonitorCommand, TopicMonitor};
pub use normalize::normalize;
pub use output::{Dispatcher, Output};
pub use registry::{MonitorRegistry, RegistryBuilder};
pub use sample::{HistoricalBatch, PersistedPrediction, RawSample};

// Re-export types for convenience
pub use trendwatch_types::{
    Estimate, MonitorState, MonitorStats, Point, PredictionRecord, ReadModel, Series,
    ThresholdLine, ThresholdStatus, TimeFrame, VisibleRange,
};
