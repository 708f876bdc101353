//! FIT course synthesis.
//!
//! Turns a [`PointSet`] into the ordered message stream of a FIT course
//! file. GPX input often lacks what a course needs (times, distances,
//! climb totals), so one forward pass over the points derives it:
//!
//! 1. Pick the aggregate sequence: track, else route, else waypoints.
//! 2. Walk it once for distance, climb, bounds and (when timestamps are
//!    missing or forced) synthetic times paced by [`Options::speed`].
//! 3. Emit file id, course and lap messages, the waypoint and route
//!    course points, a timer start, optional course points injected along
//!    the track, the decimated track records and a timer stop.
//!
//! Results of the pass are kept in an [`Annotation`] table aligned with
//! the aggregate sequence; input points are never modified.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use log::debug;

use crate::error::Result;
use crate::fit::{
    truncate_name, BoundingBox, CourseMesg, CoursePointMesg, CoursePointType, Event, EventMesg,
    EventType, FileIdMesg, FileType, LapMesg, Message, MessageSink, Position, RecordMesg, Sport,
    MANUFACTURER_GARMIN,
};
use crate::geo_math::{distance, distance_3d, semicircles, walking_grade_factor};
use crate::options::Options;
use crate::point::{Point, PointSet, Source, Timestamp};

const PRODUCT: u16 = 12345;
const SERIAL_NUMBER: u32 = 12345;

/// Injected course points are at least `total distance / 48` apart.
const COURSE_POINT_DIVISOR: f64 = 48.0;

/// Per-point results of the aggregate pass.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Annotation {
    /// Meters from the first point of the sequence.
    pub distance: f64,
    /// The point's own time, or the synthesized one when forcing speed.
    pub time: Timestamp,
}

/// Aggregate statistics over one point sequence.
#[derive(Debug, Clone, PartialEq)]
pub struct CourseStats {
    pub start: Timestamp,
    pub end: Timestamp,
    pub total_distance: f64,
    pub total_ascent: Option<f64>,
    pub total_descent: Option<f64>,
    pub min_ele: Option<f64>,
    pub max_ele: Option<f64>,
    pub min_lat: f64,
    pub max_lat: f64,
    pub min_lon: f64,
    pub max_lon: f64,
    /// Whether times were synthesized from the configured speed.
    pub forced_speed: bool,
    pub annotations: Vec<Annotation>,
}

impl CourseStats {
    /// Single forward pass over `points`. Returns `None` for an empty slice.
    pub fn compute(points: &[Point], options: &Options) -> Option<Self> {
        let first = points.first()?;
        let last = points.last()?;

        let start = first.timestamp();
        let forced_speed = options.force_speed
            || (start == last.timestamp() && !options.speed.is_nan());
        let mut end = if forced_speed { start } else { last.timestamp() };

        let mut stats = CourseStats {
            start,
            end,
            total_distance: 0.0,
            total_ascent: None,
            total_descent: None,
            min_ele: None,
            max_ele: None,
            min_lat: first.lat,
            max_lat: first.lat,
            min_lon: first.lon,
            max_lon: first.lon,
            forced_speed,
            annotations: Vec::with_capacity(points.len()),
        };

        let mut prev: Option<&Point> = None;
        for p in points {
            if let Some(ele) = p.ele {
                stats.min_ele = Some(stats.min_ele.map_or(ele, |m| m.min(ele)));
                stats.max_ele = Some(stats.max_ele.map_or(ele, |m| m.max(ele)));
            }
            stats.min_lat = stats.min_lat.min(p.lat);
            stats.max_lat = stats.max_lat.max(p.lat);
            stats.min_lon = stats.min_lon.min(p.lon);
            stats.max_lon = stats.max_lon.max(p.lon);

            let Some(prev_point) = prev else {
                stats.annotations.push(Annotation {
                    distance: 0.0,
                    time: start,
                });
                prev = Some(p);
                continue;
            };

            let d = distance(prev_point, p);
            stats.total_distance += if options.use_3d_distance {
                distance_3d(prev_point, p)
            } else {
                d
            };

            let mut speed = options.speed;
            if let (Some(ele), Some(prev_ele)) = (p.ele, prev_point.ele) {
                let delta = ele - prev_ele;
                if delta > 0.0 {
                    stats.total_ascent = Some(stats.total_ascent.unwrap_or(0.0) + delta);
                } else {
                    stats.total_descent = Some(stats.total_descent.unwrap_or(0.0) - delta);
                }

                // A zero-length segment takes no time regardless of grade
                if options.walking_grade && d > 0.0 {
                    speed *= walking_grade_factor(delta / d);
                }
            }

            let time = if forced_speed {
                end = end.saturating_add_millis(segment_millis(d, speed));
                end
            } else {
                p.timestamp()
            };

            stats.annotations.push(Annotation {
                distance: stats.total_distance,
                time,
            });
            prev = Some(p);
        }

        stats.end = end;
        Some(stats)
    }

    /// `end - start` in milliseconds.
    pub fn duration_ms(&self) -> i64 {
        self.end.millis_since(self.start)
    }

    /// Mean speed in m/s, 0 for a zero duration.
    pub fn avg_speed(&self) -> f64 {
        match self.duration_ms() {
            0 => 0.0,
            ms => self.total_distance * 1000.0 / ms as f64,
        }
    }

    pub fn bounding_box(&self) -> BoundingBox {
        BoundingBox {
            max_lat: semicircles(self.max_lat),
            max_lon: semicircles(self.max_lon),
            min_lat: semicircles(self.min_lat),
            min_lon: semicircles(self.min_lon),
        }
    }
}

/// Travel time of `meters` at `speed` m/s, truncated to whole milliseconds.
///
/// A zero or negative speed is passed through: the float-to-int cast
/// saturates infinities and maps NaN to zero.
fn segment_millis(meters: f64, speed: f64) -> i64 {
    (meters / speed * 1000.0) as i64
}

/// Round-half-up of a non-negative climb total.
fn round_climb(meters: f64) -> u16 {
    (meters + 0.5) as u16
}

/// Spacing rules derived from the course length and the options.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Thresholds {
    /// Minimum spacing of injected course points, in meters.
    pub course_point_min_distance: f64,
    /// Minimum spacing of records, in meters.
    pub point_min_distance: f64,
    /// Leave out the waypoint and route course points.
    pub skip_extra_course_points: bool,
}

impl Thresholds {
    pub fn compute(total_distance: f64, points: &PointSet, options: &Options) -> Self {
        let course_point_min_distance =
            (total_distance / COURSE_POINT_DIVISOR).max(options.min_course_point_distance);

        let mut point_min_distance = 0.0;
        let mut skip_extra_course_points = false;
        if options.max_points != 0 {
            point_min_distance = total_distance / f64::from(options.max_points);
            skip_extra_course_points = points.total_len() > options.max_points as usize;
        }

        Thresholds {
            course_point_min_distance,
            point_min_distance: point_min_distance.max(options.min_route_point_distance),
            skip_extra_course_points,
        }
    }
}

/// Counts of what [`CourseWriter::write`] emitted.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Summary {
    pub records: usize,
    pub course_points: usize,
    pub total_distance: f64,
    pub duration_ms: i64,
}

/// Writes a [`PointSet`] as a FIT course.
#[derive(Debug, Clone)]
pub struct CourseWriter<'a> {
    name: String,
    options: &'a Options,
    created: Timestamp,
}

impl<'a> CourseWriter<'a> {
    pub fn new(name: &str, options: &'a Options) -> Self {
        CourseWriter {
            name: truncate_name(name),
            options,
            created: Timestamp::REFERENCE,
        }
    }

    /// Creation time recorded in the file id message.
    pub fn created_at(mut self, created: Timestamp) -> Self {
        self.created = created;
        self
    }

    /// Emit the whole course into `sink`.
    ///
    /// Returns `Ok(None)` without writing anything when all three sequences
    /// of `points` are empty.
    pub fn write<S: MessageSink>(&self, points: &PointSet, sink: &mut S) -> Result<Option<Summary>> {
        let Some((source, aggregate)) = points.aggregate() else {
            debug!("No points to write");
            return Ok(None);
        };
        let Some(stats) = CourseStats::compute(aggregate, self.options) else {
            return Ok(None);
        };
        let thresholds = Thresholds::compute(stats.total_distance, points, self.options);

        debug!(
            "Course {:?} from {:?}: {:.1} m in {} ms, forced speed {}, thresholds {:?}",
            self.name,
            source,
            stats.total_distance,
            stats.duration_ms(),
            stats.forced_speed,
            thresholds
        );

        sink.write(Message::FileId(FileIdMesg {
            file_type: FileType::Course,
            manufacturer: MANUFACTURER_GARMIN,
            product: PRODUCT,
            serial_number: SERIAL_NUMBER,
            time_created: self.created,
            number: course_number(aggregate),
        }))?;

        sink.write(Message::Course(CourseMesg {
            name: self.name.clone(),
            sport: Sport::Generic,
        }))?;

        sink.write(Message::Lap(lap(aggregate, &stats)))?;

        let mut course_points = 0;
        if !thresholds.skip_extra_course_points {
            for p in points.waypoints.iter().chain(points.route.iter()) {
                sink.write(Message::CoursePoint(CoursePointMesg {
                    timestamp: None,
                    position: Position::from_degrees(p.lat, p.lon),
                    distance: None,
                    point_type: CoursePointType::Generic,
                    name: truncate_name(p.name.as_deref().unwrap_or("")),
                }))?;
                course_points += 1;
            }
        }

        sink.write(Message::Event(EventMesg {
            timestamp: stats.start,
            event: Event::Timer,
            event_type: EventType::Start,
            event_group: 0,
        }))?;

        // Track walks reuse the annotations, which only describe the track
        // when it is the aggregate sequence. Otherwise the track is empty.
        let track_annotations: &[Annotation] = match source {
            Source::Track => &stats.annotations,
            Source::Route | Source::Waypoints => &[],
        };
        let track = TrackWalk {
            points: &points.track,
            annotations: track_annotations,
            duration_ms: stats.duration_ms(),
        };

        let mut last_time = Timestamp::REFERENCE;
        if self.options.inject_course_points {
            let (count, time) = track.emit_course_points(thresholds.course_point_min_distance, sink)?;
            course_points += count;
            if let Some(time) = time {
                last_time = time;
            }
        }

        let (records, time) = track.emit_records(stats.start, thresholds.point_min_distance, sink)?;
        if let Some(time) = time {
            last_time = time;
        }

        sink.write(Message::Event(EventMesg {
            timestamp: last_time,
            event: Event::Timer,
            event_type: EventType::StopDisableAll,
            event_group: 0,
        }))?;

        debug!("Wrote {records} records and {course_points} course points");

        Ok(Some(Summary {
            records,
            course_points,
            total_distance: stats.total_distance,
            duration_ms: stats.duration_ms(),
        }))
    }
}

fn lap(aggregate: &[Point], stats: &CourseStats) -> LapMesg {
    let first = &aggregate[0];
    let last = &aggregate[aggregate.len() - 1];
    let seconds = stats.duration_ms() as f64 / 1000.0;

    LapMesg {
        timestamp: stats.start,
        start_time: stats.start,
        start_position: Position::from_degrees(first.lat, first.lon),
        end_position: Position::from_degrees(last.lat, last.lon),
        total_elapsed_time: seconds,
        total_timer_time: seconds,
        total_distance: stats.total_distance,
        avg_speed: stats.avg_speed(),
        total_ascent: stats.total_ascent.map(round_climb),
        total_descent: stats.total_descent.map(round_climb),
        max_altitude: stats.max_ele,
        min_altitude: stats.min_ele,
        bounds: stats.bounding_box(),
    }
}

/// Stable 16-bit identifier derived from the point coordinates.
fn course_number(points: &[Point]) -> u16 {
    let mut hasher = DefaultHasher::new();
    for p in points {
        p.lat.to_bits().hash(&mut hasher);
        p.lon.to_bits().hash(&mut hasher);
    }
    let h = hasher.finish();
    (h ^ (h >> 16) ^ (h >> 32) ^ (h >> 48)) as u16
}

/// The track with its annotations, walked for course points and records.
struct TrackWalk<'p> {
    points: &'p [Point],
    annotations: &'p [Annotation],
    duration_ms: i64,
}

impl TrackWalk<'_> {
    /// Time stamped on the `index`-th track point.
    ///
    /// Without any duration the course has no usable clock, so points are
    /// spaced one second apart from the reference instant instead.
    fn time_at(&self, index: usize, annotation: &Annotation) -> Timestamp {
        if self.duration_ms != 0 {
            annotation.time
        } else {
            Timestamp::REFERENCE.saturating_add_millis((index as i64 + 1) * 1000)
        }
    }

    /// "Start" at the first point, "End" at the last, unnamed course points
    /// in between whenever the distance since the previous one exceeds
    /// `min_distance`.
    fn emit_course_points<S: MessageSink>(
        &self,
        min_distance: f64,
        sink: &mut S,
    ) -> Result<(usize, Option<Timestamp>)> {
        let last_index = self.points.len().saturating_sub(1);
        let mut last_cue_distance = 0.0;
        let mut count = 0;
        let mut time = None;

        for (i, (p, a)) in self.points.iter().zip(self.annotations).enumerate() {
            let ts = self.time_at(i, a);
            time = Some(ts);

            let cue = |name: &str| {
                Message::CoursePoint(CoursePointMesg {
                    timestamp: Some(ts),
                    position: Position::from_degrees(p.lat, p.lon),
                    distance: Some(a.distance),
                    point_type: CoursePointType::Generic,
                    name: name.to_string(),
                })
            };

            if i == 0 {
                sink.write(cue("Start"))?;
                count += 1;
            }

            if i == last_index {
                sink.write(cue("End"))?;
                count += 1;
            } else if a.distance - last_cue_distance > min_distance {
                sink.write(cue(""))?;
                count += 1;
                last_cue_distance = a.distance;
            }
        }

        Ok((count, time))
    }

    /// One record for the first point and for every point more than
    /// `min_distance` beyond the previously recorded one.
    fn emit_records<S: MessageSink>(
        &self,
        start: Timestamp,
        min_distance: f64,
        sink: &mut S,
    ) -> Result<(usize, Option<Timestamp>)> {
        let mut last_distance = 0.0;
        let mut last_ts = start;
        let mut count = 0;
        let mut time = None;

        for (i, (p, a)) in self.points.iter().zip(self.annotations).enumerate() {
            let ts = self.time_at(i, a);
            time = Some(ts);

            if i != 0 && a.distance - last_distance <= min_distance {
                continue;
            }

            let elapsed = ts.millis_since(last_ts);
            let speed = if elapsed != 0 {
                (a.distance - last_distance) / elapsed as f64 * 1000.0
            } else {
                0.0
            };

            sink.write(Message::Record(RecordMesg {
                timestamp: ts,
                position: Position::from_degrees(p.lat, p.lon),
                distance: a.distance,
                altitude: p.ele,
                speed,
            }))?;
            count += 1;
            last_distance = a.distance;
            last_ts = ts;
        }

        Ok((count, time))
    }
}
