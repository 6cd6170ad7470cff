//! Library side of the `trendwatch` command.
//!
//! The binary reads newline-delimited JSON envelopes from a file, stdin or
//! a TCP connection, routes them into a [`trendwatch_engine::MonitorRegistry`]
//! and persists every prediction record to the configured outputs.
//!
//! Each line is one envelope. The `type` field selects the kind and
//! defaults to `sample`:
//!
//! ```text
//! {"topic":"sensor/a","message":{"message":41.2,"timestamp":"2024-05-01T12:00:00Z"}}
//! {"topic":"sensor/a","type":"threshold","threshold":80}
//! {"topic":"sensor/a","type":"timeFrame","timeFrame":"8h"}
//! {"topic":"sensor/a","type":"history","history":[{"time":1714564800,"value":40.0}]}
//! {"topic":"sensor/a","type":"restore","threshold":80,"predictionHistory":[]}
//! ```

pub mod app;
pub mod envelope;
pub mod export;
pub mod settings;
pub mod source;

pub use app::{App, RouteStats};
pub use envelope::Envelope;
pub use settings::{PersistSettings, Settings};
pub use source::EnvelopeSource;
