//! Trend forecasting.
//!
//! Produces one forecast point per accepted live sample from the tail of
//! the live buffer.

use std::fmt::Debug;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use trendwatch_types::Point;

use crate::buffer::SeriesBuffer;

/// Computes the next forecast point.
pub trait Forecaster: Send + Debug {
    /// Forecast the point following `last_raw`.
    ///
    /// `live` already contains `last_raw`. `forecast` is the current
    /// forecast buffer; the returned point must be strictly newer than its
    /// tail.
    fn forecast_next(&mut self, live: &SeriesBuffer, last_raw: Point, forecast: &SeriesBuffer)
        -> Point;
}

/// Tuning for [`TrendForecaster`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ForecastConfig {
    /// Number of trailing live points the trend is computed over.
    pub trend_window: usize,
    /// Fraction of the trend added to the latest value.
    pub trend_factor: f64,
    /// Half-width of the uniform jitter. Zero or less disables it.
    pub noise_amplitude: f64,
}

impl Default for ForecastConfig {
    fn default() -> Self {
        Self {
            trend_window: 5,
            trend_factor: 0.5,
            noise_amplitude: 1.0,
        }
    }
}

/// Summary of the trailing live window.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrendSignal {
    /// Mean of the window. Not used by the forecast yet.
    pub avg: f64,
    /// Last value minus first value; zero for fewer than two points.
    pub trend: f64,
    pub len: usize,
}

impl TrendSignal {
    /// Summarize the last `window` points of `live`.
    pub fn from_tail(live: &SeriesBuffer, window: usize) -> Self {
        let tail = live.tail(window);
        let len = tail.len();
        let avg = if len == 0 {
            0.0
        } else {
            tail.iter().map(|p| p.value).sum::<f64>() / len as f64
        };
        let trend = match (tail.first(), tail.last()) {
            (Some(first), Some(last)) if len > 1 => last.value - first.value,
            _ => 0.0,
        };
        Self { avg, trend, len }
    }
}

/// Linear trend plus jitter.
///
/// The next value is `last + trend * trend_factor + noise`, where `trend`
/// spans the last `trend_window` live points and `noise` is uniform in
/// `[-noise_amplitude, noise_amplitude)`. The next time is one second past
/// whichever is later: the forecast tail or the live sample.
#[derive(Debug)]
pub struct TrendForecaster<R = StdRng> {
    config: ForecastConfig,
    rng: R,
}

impl TrendForecaster<StdRng> {
    /// Create a forecaster seeded from the operating system.
    pub fn from_entropy(config: ForecastConfig) -> Self {
        Self::with_rng(config, StdRng::from_entropy())
    }

    /// Create a forecaster with a fixed seed, for reproducible runs.
    pub fn seeded(config: ForecastConfig, seed: u64) -> Self {
        Self::with_rng(config, StdRng::seed_from_u64(seed))
    }
}

impl<R: Rng> TrendForecaster<R> {
    /// Create a forecaster drawing jitter from `rng`.
    pub fn with_rng(config: ForecastConfig, rng: R) -> Self {
        Self { config, rng }
    }

    pub fn config(&self) -> &ForecastConfig {
        &self.config
    }

    fn noise(&mut self) -> f64 {
        let amplitude = self.config.noise_amplitude;
        if amplitude > 0.0 && amplitude.is_finite() {
            self.rng.gen_range(-amplitude..amplitude)
        } else {
            0.0
        }
    }
}

impl<R: Rng + Send + Debug> Forecaster for TrendForecaster<R> {
    fn forecast_next(
        &mut self,
        live: &SeriesBuffer,
        last_raw: Point,
        forecast: &SeriesBuffer,
    ) -> Point {
        let signal = TrendSignal::from_tail(live, self.config.trend_window);
        let value = last_raw.value + signal.trend * self.config.trend_factor + self.noise();
        let time = forecast
            .last_time()
            .map_or(last_raw.time, |t| t.max(last_raw.time))
            + 1;

        Point {
            time,
            value: if value.is_finite() { value } else { last_raw.value },
        }
    }
}
