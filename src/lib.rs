//! GPX to FIT course conversion.
//!
//! Reads tracks, routes and waypoints from GPX, optionally simplifies the
//! track, and writes a FIT course file with synthesized distances, climb
//! totals, timestamps and course points. See [`convert`] and
//! [`convert_file`] for the whole pipeline, or [`course::CourseWriter`] to
//! drive the synthesis with your own [`fit::MessageSink`].

pub mod android_jni;
pub mod course;
pub mod error;
pub mod fit;
pub mod geo_math;
pub mod gpx;
pub mod options;
pub mod point;
pub mod simplify;

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use log::info;
use time::OffsetDateTime;

pub use course::{CourseWriter, Summary};
pub use error::{Error, Result};
pub use fit::{BufferEncoder, FileEncoder, Message, MessageSink};
pub use options::Options;
pub use point::{Point, PointSet, Timestamp};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Parse GPX and simplify the track when `options.tolerance` is positive.
pub fn load<R: Read>(reader: R, options: &Options) -> Result<PointSet> {
    let mut points = crate::gpx::parse(reader, options)?;

    if options.tolerance > 0.0 && points.track.len() > 2 {
        let before = points.track.len();
        points.track = simplify::reduce(&points.track, options.tolerance);
        info!(
            "Simplified track from {} to {} points (tolerance {} m)",
            before,
            points.track.len(),
            options.tolerance
        );
    }

    Ok(points)
}

/// Convert a GPX document into the bytes of a FIT course named `name`.
///
/// Input without any points yields a FIT file with no messages.
pub fn convert<R: Read>(reader: R, name: &str, options: &Options) -> Result<Vec<u8>> {
    let points = load(reader, options)?;

    let mut encoder = BufferEncoder::new();
    CourseWriter::new(name, options)
        .created_at(OffsetDateTime::now_utc().into())
        .write(&points, &mut encoder)?;

    Ok(encoder.finish())
}

/// Convert the GPX file at `input` into a FIT course at `output`.
///
/// `output` is only replaced once the whole course has been encoded.
pub fn convert_file(
    input: impl AsRef<Path>,
    output: impl AsRef<Path>,
    name: &str,
    options: &Options,
) -> Result<Option<Summary>> {
    let reader = BufReader::new(File::open(input.as_ref())?);
    let points = load(reader, options)?;

    let mut encoder = FileEncoder::new(output);
    let summary = CourseWriter::new(name, options)
        .created_at(OffsetDateTime::now_utc().into())
        .write(&points, &mut encoder)?;
    encoder.finish()?;

    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fit::crc::crc16;

    const GPX: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<gpx version="1.1" creator="test"
     xmlns="http://www.topografix.com/GPX/1/1">
  <wpt lat="47.0015" lon="8.0001"><name>Bridge</name></wpt>
  <trk>
    <name>Ridge</name>
    <trkseg>
      <trkpt lat="47.0000" lon="8.0000"><ele>500</ele></trkpt>
      <trkpt lat="47.0010" lon="8.0000"><ele>510</ele></trkpt>
      <trkpt lat="47.0020" lon="8.0000"><ele>520</ele></trkpt>
      <trkpt lat="47.0030" lon="8.0010"><ele>515</ele></trkpt>
    </trkseg>
  </trk>
</gpx>"#;

    const EMPTY_GPX: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<gpx version="1.1" creator="test" xmlns="http://www.topografix.com/GPX/1/1"></gpx>"#;

    #[test]
    fn convert_produces_valid_fit() {
        let bytes = convert(GPX.as_bytes(), "Ridge", &Options::default()).unwrap();
        assert_eq!(&bytes[8..12], b".FIT");
        assert_eq!(crc16(&bytes), 0);
        // file_id, course, lap, 1 course point, 2 events, 4 records
        assert!(bytes.len() > 200, "only {} bytes", bytes.len());
    }

    #[test]
    fn convert_empty_input_has_no_messages() {
        let bytes = convert(EMPTY_GPX.as_bytes(), "Nothing", &Options::default()).unwrap();
        assert_eq!(bytes.len(), 16);
        assert_eq!(crc16(&bytes), 0);
    }

    #[test]
    fn convert_rejects_garbage() {
        let result = convert(&b"<gpx"[..], "Broken", &Options::default());
        assert!(matches!(result, Err(Error::Gpx(_))));
    }

    #[test]
    fn load_simplifies_track_only() {
        let options = Options {
            tolerance: 50.0,
            ..Options::default()
        };
        let points = load(GPX.as_bytes(), &options).unwrap();
        // The straight first leg collapses, the bend survives
        assert_eq!(points.track.len(), 3);
        assert_eq!(points.waypoints.len(), 1);

        let unsimplified = load(GPX.as_bytes(), &Options::default()).unwrap();
        assert_eq!(unsimplified.track.len(), 4);
    }

    #[test]
    fn convert_file_writes_destination() {
        let dir = std::env::temp_dir().join(format!("fitcourse-lib-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let input = dir.join("ridge.gpx");
        let output = dir.join("ridge.fit");
        std::fs::write(&input, GPX).unwrap();

        let summary = convert_file(&input, &output, "Ridge", &Options::default())
            .unwrap()
            .unwrap();
        assert_eq!(summary.records, 4);
        assert_eq!(summary.course_points, 1);

        let bytes = std::fs::read(&output).unwrap();
        assert_eq!(crc16(&bytes), 0);

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn convert_file_missing_input_keeps_output_untouched() {
        let dir = std::env::temp_dir().join(format!("fitcourse-missing-in-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let output = dir.join("keep.fit");
        std::fs::write(&output, b"old").unwrap();

        let result = convert_file(dir.join("absent.gpx"), &output, "x", &Options::default());
        assert!(matches!(result, Err(Error::Io(_))));
        assert_eq!(std::fs::read(&output).unwrap(), b"old");

        std::fs::remove_dir_all(&dir).unwrap();
    }
}
