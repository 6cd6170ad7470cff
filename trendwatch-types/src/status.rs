//! Threshold status - where a topic stands relative to its threshold.

/// Estimate for a topic whose forecast has not reached the threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(tag = "kind", rename_all = "camelCase"))]
pub enum Estimate {
    /// Projected to cross within the ETA horizon, at `eta` (epoch seconds).
    WithinDay { eta: i64 },
    /// Projected to cross, but beyond the ETA horizon.
    BeyondDay,
    /// Flat or falling trend, or a projection that lies in the past.
    NotTrending,
}

/// Threshold status derived from a forecast series and a threshold.
///
/// This is never authoritative state: it can always be recomputed from the
/// current forecast and threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(tag = "status", rename_all = "camelCase"))]
pub enum ThresholdStatus {
    /// The latest forecast point is at or above the threshold.
    Reached { at: i64 },
    /// The threshold has not been reached yet.
    NotReached { estimate: Estimate },
}

impl ThresholdStatus {
    /// Shorthand for a not-trending status.
    pub const fn not_trending() -> Self {
        ThresholdStatus::NotReached {
            estimate: Estimate::NotTrending,
        }
    }

    /// Returns true if the threshold has been reached.
    pub fn is_reached(&self) -> bool {
        matches!(self, ThresholdStatus::Reached { .. })
    }

    /// The time the threshold was reached, or the projected crossing time
    /// when it is within the ETA horizon.
    pub fn eta(&self) -> Option<i64> {
        match self {
            ThresholdStatus::Reached { at } => Some(*at),
            ThresholdStatus::NotReached {
                estimate: Estimate::WithinDay { eta },
            } => Some(*eta),
            ThresholdStatus::NotReached { .. } => None,
        }
    }
}
