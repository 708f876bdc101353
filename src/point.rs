//! Normalized waypoints as consumed by the course writer.
//!
//! Every GPX element (track point, route point, standalone waypoint) is
//! reduced to a [`Point`]. Points are never mutated once built: distances
//! and synthesized times computed during conversion live in a separate,
//! index-aligned table (see [`crate::course::Annotation`]).

use std::fmt;

use time::OffsetDateTime;

/// Milliseconds since the Unix epoch.
///
/// Kept as a plain integer so that synthesized clocks can use saturating
/// arithmetic instead of panicking on absurd speeds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Timestamp(i64);

impl Timestamp {
    /// 1989-12-31T00:00:00Z, the zero of the FIT `date_time` type.
    pub const FIT_EPOCH: Timestamp = Timestamp(631_065_600_000);

    /// Shared stand-in for points that carry no time of their own.
    pub const REFERENCE: Timestamp = Self::FIT_EPOCH;

    pub const fn from_millis(ms: i64) -> Self {
        Timestamp(ms)
    }

    pub const fn as_millis(self) -> i64 {
        self.0
    }

    pub fn saturating_add_millis(self, ms: i64) -> Self {
        Timestamp(self.0.saturating_add(ms))
    }

    /// Signed difference `self - earlier` in milliseconds.
    pub fn millis_since(self, earlier: Timestamp) -> i64 {
        self.0.saturating_sub(earlier.0)
    }

    /// Whole seconds since [`Timestamp::FIT_EPOCH`], clamped into `u32`.
    pub fn fit_seconds(self) -> u32 {
        let secs = self.0.saturating_sub(Self::FIT_EPOCH.0).div_euclid(1000);
        secs.clamp(0, i64::from(u32::MAX)) as u32
    }
}

impl From<OffsetDateTime> for Timestamp {
    fn from(dt: OffsetDateTime) -> Self {
        let ms = dt.unix_timestamp_nanos() / 1_000_000;
        Timestamp(ms.clamp(i128::from(i64::MIN), i128::from(i64::MAX)) as i64)
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}ms", self.0)
    }
}

/// A geographic position with optional elevation, time and name.
#[derive(Debug, Clone, PartialEq)]
pub struct Point {
    pub name: Option<String>,
    pub lat: f64,
    pub lon: f64,
    /// Meters above the ellipsoid, `None` when unknown.
    pub ele: Option<f64>,
    pub time: Option<Timestamp>,
}

impl Point {
    pub fn new(lat: f64, lon: f64) -> Self {
        Point {
            name: None,
            lat,
            lon,
            ele: None,
            time: None,
        }
    }

    pub fn with_ele(mut self, ele: f64) -> Self {
        self.ele = Some(ele);
        self
    }

    pub fn with_time(mut self, time: Timestamp) -> Self {
        self.time = Some(time);
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// The point's time, or [`Timestamp::REFERENCE`] when it has none.
    pub fn timestamp(&self) -> Timestamp {
        self.time.unwrap_or(Timestamp::REFERENCE)
    }
}

/// Which of the three sequences drives the aggregate statistics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Source {
    Track,
    Route,
    Waypoints,
}

/// Track, route and waypoint sequences read from one input.
#[derive(Debug, Clone, Default)]
pub struct PointSet {
    /// All track segments of all tracks, flattened.
    pub track: Vec<Point>,
    /// All route points of all routes, flattened.
    pub route: Vec<Point>,
    pub waypoints: Vec<Point>,
}

impl PointSet {
    /// The first non-empty sequence in track, route, waypoint order.
    ///
    /// Returns `None` when all three are empty.
    pub fn aggregate(&self) -> Option<(Source, &[Point])> {
        if !self.track.is_empty() {
            Some((Source::Track, &self.track))
        } else if !self.route.is_empty() {
            Some((Source::Route, &self.route))
        } else if !self.waypoints.is_empty() {
            Some((Source::Waypoints, &self.waypoints))
        } else {
            None
        }
    }

    /// Combined number of raw points over all three sequences.
    pub fn total_len(&self) -> usize {
        self.track.len() + self.route.len() + self.waypoints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.total_len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    #[test]
    fn aggregate_prefers_track() {
        let set = PointSet {
            track: vec![Point::new(1.0, 1.0)],
            route: vec![Point::new(2.0, 2.0), Point::new(3.0, 3.0)],
            waypoints: vec![Point::new(4.0, 4.0)],
        };
        let (source, points) = set.aggregate().unwrap();
        assert_eq!(source, Source::Track);
        assert_eq!(points.len(), 1);
    }

    #[test]
    fn aggregate_falls_back_to_route_then_waypoints() {
        let mut set = PointSet {
            track: vec![],
            route: vec![Point::new(2.0, 2.0)],
            waypoints: vec![Point::new(4.0, 4.0)],
        };
        assert_eq!(set.aggregate().unwrap().0, Source::Route);

        set.route.clear();
        assert_eq!(set.aggregate().unwrap().0, Source::Waypoints);

        set.waypoints.clear();
        assert!(set.aggregate().is_none());
        assert!(set.is_empty());
    }

    #[test]
    fn missing_time_uses_reference() {
        let p = Point::new(47.0, 8.0);
        assert_eq!(p.timestamp(), Timestamp::REFERENCE);
        assert_eq!(p.timestamp().fit_seconds(), 0);
    }

    #[test]
    fn timestamp_from_offset_date_time() {
        let ts = Timestamp::from(datetime!(1989-12-31 0:00:10.500 UTC));
        assert_eq!(ts.millis_since(Timestamp::FIT_EPOCH), 10_500);
        assert_eq!(ts.fit_seconds(), 10);
    }

    #[test]
    fn fit_seconds_clamps_out_of_range() {
        assert_eq!(Timestamp::from_millis(0).fit_seconds(), 0);
        assert_eq!(Timestamp::from_millis(i64::MAX).fit_seconds(), u32::MAX);
    }

    #[test]
    fn saturating_add_does_not_overflow() {
        let ts = Timestamp::from_millis(i64::MAX - 5).saturating_add_millis(100);
        assert_eq!(ts.as_millis(), i64::MAX);
    }
}
