//! Engine-wide settings.

use serde::{Deserialize, Serialize};
use trendwatch_types::{TimeFrame, DEFAULT_THRESHOLD};

use crate::estimate::EstimatorConfig;
use crate::forecast::ForecastConfig;

/// Settings shared by every monitor a registry creates.
///
/// Every field has a default, so a partial TOML table or a handful of
/// environment variables is enough to override what matters.
///
/// # Example
///
/// ```rust
/// use trendwatch_engine::EngineSettings;
///
/// let settings: EngineSettings =
///     serde_json::from_str(r#"{ "default_threshold": 75.0, "default_time_frame": "1d" }"#)
///         .unwrap();
/// assert_eq!(settings.default_threshold, 75.0);
/// assert_eq!(settings.trend_window, 5);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineSettings {
    /// Threshold a new monitor starts with.
    pub default_threshold: f64,
    /// Time-frame a new monitor starts with.
    pub default_time_frame: TimeFrame,
    /// Live points the forecast trend spans.
    pub trend_window: usize,
    /// Fraction of the trend added to each forecast.
    pub trend_factor: f64,
    /// Half-width of the forecast jitter.
    pub noise_amplitude: f64,
    /// Forecast points the regression spans.
    pub regression_window: usize,
    /// Cutoff between "within a day" and "beyond a day" estimates.
    pub eta_horizon_secs: i64,
    /// How far back the forecast series is retained.
    pub forecast_retention_secs: i64,
    /// Per-monitor command queue depth.
    pub command_queue: usize,
    /// Persistence queue depth before records are dropped.
    pub persist_queue: usize,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            default_threshold: DEFAULT_THRESHOLD,
            default_time_frame: TimeFrame::TwoHours,
            trend_window: 5,
            trend_factor: 0.5,
            noise_amplitude: 1.0,
            regression_window: 10,
            eta_horizon_secs: 86_400,
            forecast_retention_secs: 7_200,
            command_queue: 64,
            persist_queue: 256,
        }
    }
}

impl EngineSettings {
    pub fn forecast_config(&self) -> ForecastConfig {
        ForecastConfig {
            trend_window: self.trend_window.max(1),
            trend_factor: self.trend_factor,
            noise_amplitude: self.noise_amplitude,
        }
    }

    pub fn estimator_config(&self) -> EstimatorConfig {
        EstimatorConfig {
            regression_window: self.regression_window.max(2),
            eta_horizon_secs: self.eta_horizon_secs,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let settings = EngineSettings::default();
        assert_eq!(settings.default_threshold, 99.0);
        assert_eq!(settings.default_time_frame, TimeFrame::TwoHours);
        assert_eq!(settings.forecast_config(), ForecastConfig::default());
        assert_eq!(settings.estimator_config(), EstimatorConfig::default());
    }

    #[test]
    fn partial_override_keeps_defaults() {
        let settings: EngineSettings =
            serde_json::from_str(r#"{ "noise_amplitude": 0.0, "regression_window": 1 }"#).unwrap();
        assert_eq!(settings.noise_amplitude, 0.0);
        assert_eq!(settings.estimator_config().regression_window, 2);
        assert_eq!(settings.forecast_retention_secs, 7_200);
    }
}
