//! GPX 1.0/1.1 input.
//!
//! Wraps the `gpx` crate and flattens tracks, routes and waypoints into the
//! three sequences of a [`PointSet`]. Track segments of all tracks are
//! concatenated into one track, likewise all routes into one route.

use std::io::Read;

use log::info;
use time::OffsetDateTime;

use crate::error::Result;
use crate::options::Options;
use crate::point::{Point, PointSet, Timestamp};

fn to_point(wp: &gpx::Waypoint) -> Point {
    Point {
        name: wp.name.clone(),
        lat: wp.point().y(),
        lon: wp.point().x(),
        ele: wp.elevation,
        time: wp.time.map(|t| Timestamp::from(OffsetDateTime::from(t))),
    }
}

/// Parse a GPX document from any reader.
///
/// Categories disabled in `options` (`tracks`, `routes`, `waypoints`) are
/// left empty in the returned set.
pub fn parse<R: Read>(reader: R, options: &Options) -> Result<PointSet> {
    let gpx = gpx::read(reader)?;

    let track: Vec<Point> = if options.tracks {
        gpx.tracks
            .iter()
            .flat_map(|t| t.segments.iter())
            .flat_map(|seg| seg.points.iter())
            .map(to_point)
            .collect()
    } else {
        Vec::new()
    };

    let route: Vec<Point> = if options.routes {
        gpx.routes
            .iter()
            .flat_map(|r| r.points.iter())
            .map(to_point)
            .collect()
    } else {
        Vec::new()
    };

    let waypoints: Vec<Point> = if options.waypoints {
        gpx.waypoints.iter().map(to_point).collect()
    } else {
        Vec::new()
    };

    info!(
        "Parsed GPX: {} track points, {} route points, {} waypoints",
        track.len(),
        route.len(),
        waypoints.len()
    );

    Ok(PointSet {
        track,
        route,
        waypoints,
    })
}

/// Parse GPX from a byte slice. Convenience wrapper for JNI.
pub fn parse_bytes(data: &[u8], options: &Options) -> Result<PointSet> {
    parse(data, options)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    const MINIMAL_GPX: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<gpx version="1.1" creator="test"
     xmlns="http://www.topografix.com/GPX/1/1">
  <wpt lat="47.3769" lon="8.5417">
    <ele>408</ele>
    <name>Zurich</name>
  </wpt>
  <rte>
    <name>Test Route</name>
    <rtept lat="47.3000" lon="8.5000"><name>Turn</name></rtept>
    <rtept lat="47.3100" lon="8.5100"></rtept>
  </rte>
  <trk>
    <name>Test Track</name>
    <trkseg>
      <trkpt lat="47.3769" lon="8.5417"><ele>408</ele><time>2023-05-01T08:00:00Z</time></trkpt>
      <trkpt lat="47.3780" lon="8.5430"><ele>410</ele><time>2023-05-01T08:01:00Z</time></trkpt>
      <trkpt lat="47.3790" lon="8.5440"><ele>405.5</ele><time>2023-05-01T08:02:30Z</time></trkpt>
    </trkseg>
  </trk>
</gpx>"#;

    #[test]
    fn parse_track_points() {
        let set = parse_bytes(MINIMAL_GPX.as_bytes(), &Options::default()).unwrap();
        assert_eq!(set.track.len(), 3);

        let p = &set.track[0];
        assert!((p.lat - 47.3769).abs() < 1e-9);
        assert!((p.lon - 8.5417).abs() < 1e-9);
        assert_eq!(p.ele, Some(408.0));
        assert_eq!(set.track[2].ele, Some(405.5));
    }

    #[test]
    fn parse_track_times() {
        let set = parse_bytes(MINIMAL_GPX.as_bytes(), &Options::default()).unwrap();
        let t0 = set.track[0].time.unwrap();
        let t2 = set.track[2].time.unwrap();
        assert_eq!(t2.millis_since(t0), 150_000);
        // 2023-05-01T08:00:00Z
        assert_eq!(t0.as_millis(), 1_682_928_000_000);
    }

    #[test]
    fn parse_route_and_waypoint() {
        let set = parse_bytes(MINIMAL_GPX.as_bytes(), &Options::default()).unwrap();

        assert_eq!(set.route.len(), 2);
        assert_eq!(set.route[0].name.as_deref(), Some("Turn"));
        assert_eq!(set.route[1].name, None);
        assert_eq!(set.route[1].time, None);

        assert_eq!(set.waypoints.len(), 1);
        assert_eq!(set.waypoints[0].name.as_deref(), Some("Zurich"));
        assert_eq!(set.waypoints[0].ele, Some(408.0));
    }

    #[test]
    fn parse_respects_category_flags() {
        let options = Options {
            tracks: false,
            waypoints: false,
            ..Options::default()
        };
        let set = parse_bytes(MINIMAL_GPX.as_bytes(), &options).unwrap();
        assert!(set.track.is_empty());
        assert!(set.waypoints.is_empty());
        assert_eq!(set.route.len(), 2);
    }

    #[test]
    fn parse_empty_gpx() {
        let empty = r#"<?xml version="1.0" encoding="UTF-8"?>
<gpx version="1.1" creator="test"
     xmlns="http://www.topografix.com/GPX/1/1">
</gpx>"#;

        let set = parse_bytes(empty.as_bytes(), &Options::default()).unwrap();
        assert!(set.is_empty());
        assert!(set.aggregate().is_none());
    }

    #[test]
    fn parse_invalid_xml_returns_error() {
        let result = parse_bytes(b"not xml at all", &Options::default());
        assert!(matches!(result, Err(Error::Gpx(_))));
    }

    #[test]
    fn parse_track_without_elevation() {
        let gpx = r#"<?xml version="1.0" encoding="UTF-8"?>
<gpx version="1.1" creator="test"
     xmlns="http://www.topografix.com/GPX/1/1">
  <trk>
    <trkseg>
      <trkpt lat="48.0" lon="16.0"></trkpt>
    </trkseg>
  </trk>
</gpx>"#;

        let set = parse_bytes(gpx.as_bytes(), &Options::default()).unwrap();
        assert_eq!(set.track[0].ele, None);
        assert_eq!(set.track[0].time, None);
    }

    #[test]
    fn parse_multi_segment_multi_track() {
        let gpx = r#"<?xml version="1.0" encoding="UTF-8"?>
<gpx version="1.1" creator="test"
     xmlns="http://www.topografix.com/GPX/1/1">
  <trk>
    <trkseg>
      <trkpt lat="48.0" lon="16.0"></trkpt>
      <trkpt lat="48.1" lon="16.1"></trkpt>
    </trkseg>
    <trkseg>
      <trkpt lat="48.2" lon="16.2"></trkpt>
    </trkseg>
  </trk>
  <trk>
    <trkseg>
      <trkpt lat="48.3" lon="16.3"></trkpt>
    </trkseg>
  </trk>
</gpx>"#;

        let set = parse_bytes(gpx.as_bytes(), &Options::default()).unwrap();
        assert_eq!(set.track.len(), 4);
        assert!((set.track[3].lat - 48.3).abs() < 1e-9);
    }
}
