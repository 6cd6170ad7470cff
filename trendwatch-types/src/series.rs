//! Series - an ordered, duplicate-free run of points.

use crate::Point;

/// A sequence of points strictly increasing by time.
///
/// No two points share a timestamp. The only ways to build a series from
/// arbitrary points are [`Series::from_points`] and the `From<Vec<Point>>`
/// conversion, both of which sort and collapse collisions so the invariant
/// always holds.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(from = "Vec<Point>", into = "Vec<Point>"))]
pub struct Series {
    points: Vec<Point>,
}

impl Series {
    /// Create an empty series.
    pub fn new() -> Self {
        Self { points: Vec::new() }
    }

    /// Build a series from points in any order.
    ///
    /// Invalid points are discarded. Points are sorted by time; when two
    /// share a timestamp, the one appearing later in `points` wins.
    pub fn from_points(mut points: Vec<Point>) -> Self {
        points.retain(Point::is_valid);
        // Stable sort keeps input order among equal timestamps
        points.sort_by_key(|p| p.time);

        let mut out: Vec<Point> = Vec::with_capacity(points.len());
        for p in points {
            match out.last_mut() {
                Some(last) if last.time == p.time => *last = p,
                _ => out.push(p),
            }
        }

        Self { points: out }
    }

    /// Check if the series has no points.
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Number of points in the series.
    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// Earliest point.
    pub fn first(&self) -> Option<&Point> {
        self.points.first()
    }

    /// Latest point.
    pub fn last(&self) -> Option<&Point> {
        self.points.last()
    }

    /// Iterate over points in ascending time order.
    pub fn iter(&self) -> impl Iterator<Item = &Point> {
        self.points.iter()
    }

    /// Borrow the points as a slice.
    pub fn as_slice(&self) -> &[Point] {
        &self.points
    }

    /// Take ownership of the underlying points.
    pub fn into_vec(self) -> Vec<Point> {
        self.points
    }

    /// Check that the series is strictly ascending by time.
    pub fn is_strictly_increasing(&self) -> bool {
        self.points.windows(2).all(|w| w[0].time < w[1].time)
    }
}

impl From<Vec<Point>> for Series {
    fn from(points: Vec<Point>) -> Self {
        Self::from_points(points)
    }
}

impl From<Series> for Vec<Point> {
    fn from(series: Series) -> Self {
        series.points
    }
}

impl<'a> IntoIterator for &'a Series {
    type Item = &'a Point;
    type IntoIter = core::slice::Iter<'a, Point>;

    fn into_iter(self) -> Self::IntoIter {
        self.points.iter()
    }
}
