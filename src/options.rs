//! Conversion settings.
//!
//! One [`Options`] value is fixed for a whole conversion run. It can be
//! built in code, or loaded from a JSON document in which every field is
//! optional; missing fields keep their defaults. Values are passed through
//! as given: a zero speed or a negative tolerance is not rejected.

use std::io::Read;

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// 14 minutes per kilometre.
pub const DEFAULT_SPEED: f64 = 1000.0 / 14.0 / 60.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Options {
    /// Pace used to synthesize timestamps, in m/s.
    pub speed: f64,
    /// Include elevation deltas in segment distances.
    pub use_3d_distance: bool,
    /// Always synthesize timestamps from `speed`, even when the input has
    /// real ones.
    pub force_speed: bool,
    /// Emit Start/End and periodic course points along the track.
    pub inject_course_points: bool,
    /// Adjust the synthesized speed for the slope of each segment.
    pub walking_grade: bool,
    /// Lower bound for the spacing of emitted records, in meters.
    pub min_route_point_distance: f64,
    /// Lower bound for the spacing of injected course points, in meters.
    pub min_course_point_distance: f64,
    /// Target number of records; 0 means unlimited.
    pub max_points: u32,
    /// Douglas-Peucker tolerance for track points in meters; 0 disables it.
    pub tolerance: f64,
    pub tracks: bool,
    pub routes: bool,
    pub waypoints: bool,
}

impl Default for Options {
    fn default() -> Self {
        Options {
            speed: DEFAULT_SPEED,
            use_3d_distance: true,
            force_speed: false,
            inject_course_points: false,
            walking_grade: false,
            min_route_point_distance: 1.0,
            min_course_point_distance: 1000.0,
            max_points: 1000,
            tolerance: 0.0,
            tracks: true,
            routes: true,
            waypoints: true,
        }
    }
}

impl Options {
    /// Load options from a JSON document, defaulting missing fields.
    pub fn from_json_reader<R: Read>(reader: R) -> Result<Self> {
        Ok(serde_json::from_reader(reader)?)
    }

    /// Load options from a JSON string. An empty string yields defaults.
    pub fn from_json_str(json: &str) -> Result<Self> {
        if json.trim().is_empty() {
            return Ok(Options::default());
        }
        Ok(serde_json::from_str(json)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let o = Options::default();
        assert!((o.speed - 1.190_476).abs() < 1e-6);
        assert!(o.use_3d_distance);
        assert!(!o.force_speed);
        assert!(!o.inject_course_points);
        assert!(!o.walking_grade);
        assert_eq!(o.min_route_point_distance, 1.0);
        assert_eq!(o.min_course_point_distance, 1000.0);
        assert_eq!(o.max_points, 1000);
        assert_eq!(o.tolerance, 0.0);
        assert!(o.tracks && o.routes && o.waypoints);
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let o = Options::from_json_str(r#"{"speed": 3.5, "max_points": 0}"#).unwrap();
        assert_eq!(o.speed, 3.5);
        assert_eq!(o.max_points, 0);
        assert!(o.use_3d_distance);
        assert_eq!(o.min_course_point_distance, 1000.0);
    }

    #[test]
    fn empty_json_is_default() {
        assert_eq!(Options::from_json_str("  ").unwrap(), Options::default());
        assert_eq!(Options::from_json_str("{}").unwrap(), Options::default());
    }

    #[test]
    fn invalid_json_is_an_error() {
        assert!(Options::from_json_str(r#"{"speed": "fast"}"#).is_err());
    }

    #[test]
    fn round_trips_through_json() {
        let mut o = Options::default();
        o.walking_grade = true;
        o.tolerance = 5.0;
        let json = serde_json::to_string(&o).unwrap();
        let back = Options::from_json_reader(json.as_bytes()).unwrap();
        assert_eq!(back, o);
    }

    #[test]
    fn zero_speed_is_not_rejected() {
        let o = Options::from_json_str(r#"{"speed": 0.0, "force_speed": true}"#).unwrap();
        assert_eq!(o.speed, 0.0);
    }
}
