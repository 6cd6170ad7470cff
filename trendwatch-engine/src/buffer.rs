//! Time-ordered point buffer with append, merge and trim.

use std::collections::VecDeque;

use trendwatch_types::{Point, Series};

/// An ordered, time-bounded container of normalized points.
///
/// Points are kept strictly ascending by time. `append` refuses anything at
/// or before the tail; `merge` re-normalizes the whole buffer; `trim` drops
/// the head.
#[derive(Debug, Clone, Default)]
pub struct SeriesBuffer {
    points: VecDeque<Point>,
    capacity: Option<usize>,
}

impl SeriesBuffer {
    /// Create an empty, unbounded buffer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty buffer holding at most `capacity` points.
    ///
    /// The oldest points are evicted once an append exceeds the limit.
    pub fn with_capacity_limit(capacity: usize) -> Self {
        Self {
            points: VecDeque::with_capacity(capacity.min(1024)),
            capacity: Some(capacity),
        }
    }

    /// Append a point if it is strictly newer than the tail.
    ///
    /// Returns `false` and leaves the buffer untouched otherwise.
    pub fn append(&mut self, point: Point) -> bool {
        if !point.is_valid() {
            return false;
        }
        if let Some(last) = self.points.back() {
            if point.time <= last.time {
                return false;
            }
        }
        self.points.push_back(point);
        self.enforce_capacity();
        true
    }

    /// Merge a batch into the buffer.
    ///
    /// Existing points come first and the batch second, so on equal times
    /// the batch wins. The buffer is replaced with the result, which is
    /// also returned.
    pub fn merge(&mut self, batch: Series) -> Series {
        let mut combined: Vec<Point> = self.points.drain(..).collect();
        combined.extend(batch.into_vec());
        let merged = Series::from_points(combined);

        self.points = merged.iter().copied().collect();
        self.enforce_capacity();
        self.to_series()
    }

    /// Remove leading points older than `cutoff`.
    ///
    /// Returns the number of points removed.
    pub fn trim(&mut self, cutoff: i64) -> usize {
        let keep_from = self.points.partition_point(|p| p.time < cutoff);
        self.points.drain(..keep_from);
        keep_from
    }

    pub fn clear(&mut self) {
        self.points.clear();
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn first(&self) -> Option<&Point> {
        self.points.front()
    }

    pub fn last(&self) -> Option<&Point> {
        self.points.back()
    }

    pub fn last_time(&self) -> Option<i64> {
        self.points.back().map(|p| p.time)
    }

    /// The last `n` points, oldest first.
    pub fn tail(&self, n: usize) -> Vec<Point> {
        let skip = self.points.len().saturating_sub(n);
        self.points.iter().skip(skip).copied().collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Point> {
        self.points.iter()
    }

    /// Copy the contents into a [`Series`].
    pub fn to_series(&self) -> Series {
        Series::from_points(self.points.iter().copied().collect())
    }

    fn enforce_capacity(&mut self) {
        if let Some(capacity) = self.capacity {
            while self.points.len() > capacity {
                self.points.pop_front();
            }
        }
    }
}
