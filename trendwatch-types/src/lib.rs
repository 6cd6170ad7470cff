//! # trendwatch-types
//!
//! Core types for live metric forecasting. This crate defines the shapes the
//! trendwatch engine exchanges with its collaborators: normalized points and
//! series, threshold status, the persisted prediction record, and the read
//! model handed to renderers.
//!
//! ## Design Goals
//!
//! - **Zero required dependencies**: Core types work without any serialization framework
//! - **Optional serialization**: Enable the `serde` feature for JSON and friends
//! - **Invariants in the type**: A [`Series`] can only be built strictly ascending
//!
//! ## Example
//!
//! ```rust
//! use trendwatch_types::{Point, Series};
//!
//! // Later points win when two share a timestamp
//! let series = Series::from_points(vec![
//!     Point::new(101, 12.0).unwrap(),
//!     Point::new(100, 10.0).unwrap(),
//!     Point::new(101, 13.0).unwrap(),
//! ]);
//!
//! assert_eq!(series.len(), 2);
//! assert_eq!(series.last().unwrap().value, 13.0);
//! ```

mod point;
mod record;
mod series;
mod status;
mod timeframe;

pub use point::*;
pub use record::*;
pub use series::*;
pub use status::*;
pub use timeframe::*;

/// Threshold applied to a topic until a caller configures one.
pub const DEFAULT_THRESHOLD: f64 = 99.0;
