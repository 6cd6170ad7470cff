//! Threshold estimation.
//!
//! Fits a least-squares line through the forecast tail and projects when
//! it crosses the threshold.

use chrono::{DateTime, Local};
use trendwatch_types::{Estimate, Point, ThresholdStatus};

/// Tuning for [`estimate`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EstimatorConfig {
    /// Number of trailing forecast points the regression runs over.
    pub regression_window: usize,
    /// Projections further out than this are reported as beyond a day.
    pub eta_horizon_secs: i64,
}

impl Default for EstimatorConfig {
    fn default() -> Self {
        Self {
            regression_window: 10,
            eta_horizon_secs: 86_400,
        }
    }
}

/// Estimate where `forecast` stands relative to `threshold` at `now`.
///
/// Returns `None` with fewer than two forecast points; callers keep their
/// previous status in that case.
///
/// # Example
///
/// ```rust
/// use trendwatch_engine::estimate::{estimate, EstimatorConfig};
/// use trendwatch_types::{Estimate, Point, ThresholdStatus};
///
/// let forecast = [
///     Point { time: 100, value: 10.0 },
///     Point { time: 110, value: 20.0 },
/// ];
///
/// // One unit per second, 10 units short of the threshold
/// let status = estimate(&forecast, 30.0, 110, &EstimatorConfig::default());
/// assert_eq!(
///     status,
///     Some(ThresholdStatus::NotReached { estimate: Estimate::WithinDay { eta: 120 } })
/// );
/// ```
pub fn estimate(
    forecast: &[Point],
    threshold: f64,
    now: i64,
    config: &EstimatorConfig,
) -> Option<ThresholdStatus> {
    if forecast.len() < 2 {
        return None;
    }
    let last = forecast[forecast.len() - 1];
    if last.value >= threshold {
        return Some(ThresholdStatus::Reached { at: last.time });
    }

    let window = config.regression_window.max(2);
    let tail = &forecast[forecast.len().saturating_sub(window)..];
    let estimate = match slope(tail) {
        Some(slope) if slope > 0.0 => {
            let reach = last.time as f64 + (threshold - last.value) / slope;
            project(reach, now, config.eta_horizon_secs)
        }
        _ => Estimate::NotTrending,
    };

    Some(ThresholdStatus::NotReached { estimate })
}

/// Render a status as text.
pub fn describe(status: &ThresholdStatus) -> String {
    match status {
        ThresholdStatus::Reached { at } => format!("Reached at {}", format_clock(*at)),
        ThresholdStatus::NotReached { estimate } => match estimate {
            Estimate::WithinDay { eta } => {
                format!("Estimated to reach at {}", format_clock(*eta))
            }
            Estimate::BeyondDay => "Estimated to reach in more than 24 hours".to_string(),
            Estimate::NotTrending => "Not expected to reach threshold".to_string(),
        },
    }
}

/// Format epoch seconds as a local wall-clock time, `HH:MM:SS`.
pub fn format_clock(ts: i64) -> String {
    match DateTime::from_timestamp(ts, 0) {
        Some(utc) => utc.with_timezone(&Local).format("%H:%M:%S").to_string(),
        None => ts.to_string(),
    }
}

/// Least-squares slope of value over time.
///
/// Times are centred on their mean so epoch-sized x values do not swamp
/// the sums. Returns `None` when every point shares the same time.
fn slope(points: &[Point]) -> Option<f64> {
    let n = points.len() as f64;
    let mean_x = points.iter().map(|p| p.time as f64).sum::<f64>() / n;
    let mean_y = points.iter().map(|p| p.value).sum::<f64>() / n;

    let (sxy, sxx) = points.iter().fold((0.0, 0.0), |(sxy, sxx), p| {
        let dx = p.time as f64 - mean_x;
        (sxy + dx * (p.value - mean_y), sxx + dx * dx)
    });

    if sxx == 0.0 {
        return None;
    }
    let slope = sxy / sxx;
    slope.is_finite().then_some(slope)
}

fn project(reach: f64, now: i64, horizon: i64) -> Estimate {
    let ahead = reach - now as f64;
    if ahead.is_nan() || ahead <= 0.0 {
        Estimate::NotTrending
    } else if ahead < horizon as f64 {
        Estimate::WithinDay {
            eta: reach.floor() as i64,
        }
    } else {
        Estimate::BeyondDay
    }
}
