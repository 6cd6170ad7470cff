//! Time-frame selection and the retention windows it implies.

use core::fmt;
use core::str::FromStr;

/// The time-frame a caller is viewing.
///
/// Selects the live-series retention window and how many points a history
/// query should request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum TimeFrame {
    #[default]
    #[cfg_attr(feature = "serde", serde(rename = "2h", alias = "2H"))]
    TwoHours,
    #[cfg_attr(feature = "serde", serde(rename = "8h", alias = "8H"))]
    EightHours,
    #[cfg_attr(feature = "serde", serde(rename = "1d", alias = "1D"))]
    OneDay,
    #[cfg_attr(feature = "serde", serde(rename = "1w", alias = "1W"))]
    OneWeek,
    #[cfg_attr(feature = "serde", serde(rename = "1m", alias = "1M"))]
    OneMonth,
}

impl TimeFrame {
    /// All time-frames, shortest first.
    pub const ALL: [TimeFrame; 5] = [
        TimeFrame::TwoHours,
        TimeFrame::EightHours,
        TimeFrame::OneDay,
        TimeFrame::OneWeek,
        TimeFrame::OneMonth,
    ];

    /// Live-series retention window in seconds.
    pub const fn window_secs(&self) -> i64 {
        match self {
            TimeFrame::TwoHours => 7_200,
            TimeFrame::EightHours => 28_800,
            TimeFrame::OneDay => 86_400,
            TimeFrame::OneWeek => 604_800,
            TimeFrame::OneMonth => 2_592_000,
        }
    }

    /// Number of points a history query should ask for.
    pub const fn fetch_limit(&self) -> usize {
        match self {
            TimeFrame::TwoHours | TimeFrame::EightHours => 10_000,
            TimeFrame::OneDay => 5_000,
            TimeFrame::OneWeek => 8_000,
            TimeFrame::OneMonth => 10_000,
        }
    }

    /// Short label, e.g. "2h".
    pub const fn label(&self) -> &'static str {
        match self {
            TimeFrame::TwoHours => "2h",
            TimeFrame::EightHours => "8h",
            TimeFrame::OneDay => "1d",
            TimeFrame::OneWeek => "1w",
            TimeFrame::OneMonth => "1m",
        }
    }

    /// Parse a label, falling back to two hours for anything unrecognized.
    pub fn parse_lenient(s: &str) -> Self {
        s.parse().unwrap_or_default()
    }
}

impl fmt::Display for TimeFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Error returned when a time-frame label is not recognized.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimeFrameParseError(pub String);

impl fmt::Display for TimeFrameParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown time-frame: {}", self.0)
    }
}

impl std::error::Error for TimeFrameParseError {}

impl FromStr for TimeFrame {
    type Err = TimeFrameParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "2h" => Ok(TimeFrame::TwoHours),
            "8h" => Ok(TimeFrame::EightHours),
            "1d" => Ok(TimeFrame::OneDay),
            "1w" => Ok(TimeFrame::OneWeek),
            "1m" => Ok(TimeFrame::OneMonth),
            _ => Err(TimeFrameParseError(s.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn window_mapping() {
        assert_eq!(TimeFrame::TwoHours.window_secs(), 7200);
        assert_eq!(TimeFrame::EightHours.window_secs(), 28800);
        assert_eq!(TimeFrame::OneDay.window_secs(), 86400);
        assert_eq!(TimeFrame::OneWeek.window_secs(), 604800);
        assert_eq!(TimeFrame::OneMonth.window_secs(), 2592000);
    }

    #[test]
    fn parse_is_case_insensitive() {
        assert_eq!("2H".parse::<TimeFrame>().unwrap(), TimeFrame::TwoHours);
        assert_eq!("8h".parse::<TimeFrame>().unwrap(), TimeFrame::EightHours);
        assert_eq!("1D".parse::<TimeFrame>().unwrap(), TimeFrame::OneDay);
        assert_eq!("1w".parse::<TimeFrame>().unwrap(), TimeFrame::OneWeek);
        assert_eq!("1M".parse::<TimeFrame>().unwrap(), TimeFrame::OneMonth);
    }

    #[test]
    fn unknown_label_is_an_error_or_defaults() {
        assert!("3h".parse::<TimeFrame>().is_err());
        assert_eq!(TimeFrame::parse_lenient("3h"), TimeFrame::TwoHours);
    }

    #[test]
    fn display_round_trips_through_parse() {
        for tf in TimeFrame::ALL {
            assert_eq!(tf.to_string().parse::<TimeFrame>().unwrap(), tf);
        }
    }

    #[test]
    fn fetch_limits() {
        assert_eq!(TimeFrame::OneMonth.fetch_limit(), 10_000);
        assert_eq!(TimeFrame::OneWeek.fetch_limit(), 8_000);
        assert_eq!(TimeFrame::OneDay.fetch_limit(), 5_000);
        assert_eq!(TimeFrame::TwoHours.fetch_limit(), 10_000);
    }
}
