//! Layered CLI configuration.
//!
//! Settings come from an optional TOML file, then `TRENDWATCH_*`
//! environment variables, then command-line flags (applied by the caller).
//!
//! ```toml
//! topics = ["sensor/a", "sensor/b"]
//!
//! [engine]
//! default_threshold = 80.0
//! default_time_frame = "8h"
//!
//! [thresholds]
//! "sensor/b" = 45.0
//!
//! [persist]
//! file = "predictions.ndjson"
//! ```

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use config::{Config, Environment, File};
use serde::Deserialize;
use trendwatch_engine::{EngineSettings, Output};

/// Environment variable prefix, e.g. `TRENDWATCH_ENGINE__DEFAULT_THRESHOLD`.
pub const ENV_PREFIX: &str = "TRENDWATCH";

/// Everything the CLI can be configured with outside of flags.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Engine settings shared by every monitor.
    pub engine: EngineSettings,
    /// Topics to subscribe at startup.
    pub topics: Vec<String>,
    /// Per-topic thresholds applied after subscribing.
    pub thresholds: BTreeMap<String, f64>,
    /// Where prediction records go.
    pub persist: PersistSettings,
}

/// Persistence destinations.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct PersistSettings {
    /// Append NDJSON records to this file.
    pub file: Option<PathBuf>,
    /// Send NDJSON records to this TCP endpoint.
    pub tcp: Option<String>,
    /// POST records to this URL. Requires the `http` feature.
    pub http: Option<String>,
}

impl Settings {
    /// Load settings from an optional file plus the environment.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(File::from(path));
        }
        let config = builder
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .context("failed to load configuration")?;

        config
            .try_deserialize()
            .context("invalid configuration")
    }
}

impl PersistSettings {
    /// Build the configured outputs.
    pub fn outputs(&self) -> Result<Vec<Output>> {
        let mut outputs = Vec::new();
        if let Some(path) = &self.file {
            outputs.push(Output::file(path));
        }
        if let Some(addr) = &self.tcp {
            outputs.push(Output::tcp(addr.clone()));
        }
        if let Some(url) = &self.http {
            outputs.push(http_output(url)?);
        }
        Ok(outputs)
    }
}

#[cfg(feature = "http")]
fn http_output(url: &str) -> Result<Output> {
    Ok(Output::http(url)?)
}

#[cfg(not(feature = "http"))]
fn http_output(url: &str) -> Result<Output> {
    anyhow::bail!("cannot persist to {url}: built without the `http` feature")
}
