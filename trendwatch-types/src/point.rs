//! A single normalized sample.

/// A timestamped sample value.
///
/// `time` is whole seconds since the Unix epoch and never negative.
/// `value` is always finite. Use [`Point::new`] to enforce both.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Point {
    /// Seconds since the Unix epoch.
    pub time: i64,
    /// Sample value.
    pub value: f64,
}

impl Point {
    /// Create a point, returning `None` if the time is negative or the value
    /// is NaN or infinite.
    pub fn new(time: i64, value: f64) -> Option<Self> {
        if time < 0 || !value.is_finite() {
            return None;
        }
        Some(Self { time, value })
    }

    /// Check the point invariant.
    pub fn is_valid(&self) -> bool {
        self.time >= 0 && self.value.is_finite()
    }
}
