//! FIT course messages.
//!
//! Typed versions of the six FIT messages a course file is made of, the
//! mapping of each onto numbered, typed fields, and the [`MessageSink`]
//! trait the course writer emits them into. The byte-level framing lives
//! in [`encoder`].
//!
//! Field numbers, base types, scales and offsets follow the FIT profile.
//! The lap message additionally carries four undocumented bounding-box
//! fields that Garmin devices read from course files; they are modelled as
//! [`FieldOrigin::Extension`] fields rather than profile fields.

pub mod crc;
pub mod encoder;

use crate::error::Result;
use crate::geo_math::semicircles;
use crate::point::Timestamp;

pub use encoder::{BufferEncoder, FileEncoder};

/// Global message numbers.
pub mod mesg_num {
    pub const FILE_ID: u16 = 0;
    pub const LAP: u16 = 19;
    pub const RECORD: u16 = 20;
    pub const EVENT: u16 = 21;
    pub const COURSE: u16 = 31;
    pub const COURSE_POINT: u16 = 32;
}

/// Longest string, in bytes, a field can hold next to its terminator.
pub const MAX_STRING_BYTES: usize = 254;

/// FIT base types used by course messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BaseType {
    Enum,
    UInt8,
    UInt16,
    SInt32,
    UInt32,
    UInt32z,
    String,
}

impl BaseType {
    /// Base type byte as written in definition messages.
    pub fn code(self) -> u8 {
        match self {
            BaseType::Enum => 0x00,
            BaseType::UInt8 => 0x02,
            BaseType::UInt16 => 0x84,
            BaseType::SInt32 => 0x85,
            BaseType::UInt32 => 0x86,
            BaseType::UInt32z => 0x8C,
            BaseType::String => 0x07,
        }
    }
}

/// A single encoded field value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Enum(u8),
    UInt8(u8),
    UInt16(u16),
    SInt32(i32),
    UInt32(u32),
    UInt32z(u32),
    String(String),
}

impl Value {
    pub fn base_type(&self) -> BaseType {
        match self {
            Value::Enum(_) => BaseType::Enum,
            Value::UInt8(_) => BaseType::UInt8,
            Value::UInt16(_) => BaseType::UInt16,
            Value::SInt32(_) => BaseType::SInt32,
            Value::UInt32(_) => BaseType::UInt32,
            Value::UInt32z(_) => BaseType::UInt32z,
            Value::String(_) => BaseType::String,
        }
    }

    /// Size in bytes, including the terminator for strings.
    pub fn size(&self) -> usize {
        match self {
            Value::Enum(_) | Value::UInt8(_) => 1,
            Value::UInt16(_) => 2,
            Value::SInt32(_) | Value::UInt32(_) | Value::UInt32z(_) => 4,
            Value::String(s) => s.len() + 1,
        }
    }

    /// Append the little-endian encoding to `out`.
    pub fn write_to(&self, out: &mut Vec<u8>) {
        match self {
            Value::Enum(v) | Value::UInt8(v) => out.push(*v),
            Value::UInt16(v) => out.extend_from_slice(&v.to_le_bytes()),
            Value::SInt32(v) => out.extend_from_slice(&v.to_le_bytes()),
            Value::UInt32(v) | Value::UInt32z(v) => out.extend_from_slice(&v.to_le_bytes()),
            Value::String(s) => {
                out.extend_from_slice(s.as_bytes());
                out.push(0);
            }
        }
    }
}

/// Where a field's definition comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldOrigin {
    /// Defined in the published FIT profile.
    Profile,
    /// Not in the published profile, but understood by devices.
    Extension { name: &'static str },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    pub num: u8,
    pub origin: FieldOrigin,
    pub value: Value,
}

impl Field {
    pub fn new(num: u8, value: Value) -> Self {
        Field {
            num,
            origin: FieldOrigin::Profile,
            value,
        }
    }

    pub fn extension(num: u8, name: &'static str, value: Value) -> Self {
        Field {
            num,
            origin: FieldOrigin::Extension { name },
            value,
        }
    }
}

/// `round((value + offset) * scale)`, saturating into `u32`.
pub fn scaled_u32(value: f64, scale: f64, offset: f64) -> u32 {
    ((value + offset) * scale).round() as u32
}

/// `round((value + offset) * scale)`, saturating into `u16`.
pub fn scaled_u16(value: f64, scale: f64, offset: f64) -> u16 {
    ((value + offset) * scale).round() as u16
}

/// Cut a name to what a FIT string field can carry: at most 254
/// characters and 254 bytes, never splitting a character.
pub fn truncate_name(name: &str) -> String {
    let mut end = 0;
    for (count, (idx, ch)) in name.char_indices().enumerate() {
        if count == MAX_STRING_BYTES || idx + ch.len_utf8() > MAX_STRING_BYTES {
            break;
        }
        end = idx + ch.len_utf8();
    }
    name[..end].to_string()
}

/// A position in semicircles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Position {
    pub lat: i32,
    pub lon: i32,
}

impl Position {
    pub fn from_degrees(lat: f64, lon: f64) -> Self {
        Position {
            lat: semicircles(lat),
            lon: semicircles(lon),
        }
    }
}

/// Bounding box corners in semicircles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BoundingBox {
    pub max_lat: i32,
    pub max_lon: i32,
    pub min_lat: i32,
    pub min_lon: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum FileType {
    Course = 6,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Sport {
    Generic = 0,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Event {
    Timer = 0,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum EventType {
    Start = 0,
    StopDisableAll = 9,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum CoursePointType {
    Generic = 0,
}

pub const MANUFACTURER_GARMIN: u16 = 1;

#[derive(Debug, Clone, PartialEq)]
pub struct FileIdMesg {
    pub file_type: FileType,
    pub manufacturer: u16,
    pub product: u16,
    pub serial_number: u32,
    pub time_created: Timestamp,
    pub number: u16,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CourseMesg {
    pub name: String,
    pub sport: Sport,
}

/// Summary of the whole course.
#[derive(Debug, Clone, PartialEq)]
pub struct LapMesg {
    pub timestamp: Timestamp,
    pub start_time: Timestamp,
    pub start_position: Position,
    pub end_position: Position,
    /// Seconds.
    pub total_elapsed_time: f64,
    /// Seconds.
    pub total_timer_time: f64,
    /// Meters.
    pub total_distance: f64,
    /// m/s.
    pub avg_speed: f64,
    pub total_ascent: Option<u16>,
    pub total_descent: Option<u16>,
    pub max_altitude: Option<f64>,
    pub min_altitude: Option<f64>,
    pub bounds: BoundingBox,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CoursePointMesg {
    pub timestamp: Option<Timestamp>,
    pub position: Position,
    pub distance: Option<f64>,
    pub point_type: CoursePointType,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EventMesg {
    pub timestamp: Timestamp,
    pub event: Event,
    pub event_type: EventType,
    pub event_group: u8,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RecordMesg {
    pub timestamp: Timestamp,
    pub position: Position,
    pub distance: f64,
    pub altitude: Option<f64>,
    /// m/s.
    pub speed: f64,
}

/// One message of a FIT course, in emission order.
#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    FileId(FileIdMesg),
    Course(CourseMesg),
    Lap(LapMesg),
    CoursePoint(CoursePointMesg),
    Event(EventMesg),
    Record(RecordMesg),
}

fn altitude(meters: f64) -> Value {
    Value::UInt16(scaled_u16(meters, 5.0, 500.0))
}

fn date_time(ts: Timestamp) -> Value {
    Value::UInt32(ts.fit_seconds())
}

impl Message {
    pub fn global_num(&self) -> u16 {
        match self {
            Message::FileId(_) => mesg_num::FILE_ID,
            Message::Course(_) => mesg_num::COURSE,
            Message::Lap(_) => mesg_num::LAP,
            Message::CoursePoint(_) => mesg_num::COURSE_POINT,
            Message::Event(_) => mesg_num::EVENT,
            Message::Record(_) => mesg_num::RECORD,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Message::FileId(_) => "file_id",
            Message::Course(_) => "course",
            Message::Lap(_) => "lap",
            Message::CoursePoint(_) => "course_point",
            Message::Event(_) => "event",
            Message::Record(_) => "record",
        }
    }

    /// The fields written for this message, in definition order.
    /// Unset optional values are left out entirely.
    pub fn fields(&self) -> Vec<Field> {
        match self {
            Message::FileId(m) => vec![
                Field::new(0, Value::Enum(m.file_type as u8)),
                Field::new(1, Value::UInt16(m.manufacturer)),
                Field::new(2, Value::UInt16(m.product)),
                Field::new(3, Value::UInt32z(m.serial_number)),
                Field::new(4, date_time(m.time_created)),
                Field::new(5, Value::UInt16(m.number)),
            ],
            Message::Course(m) => vec![
                Field::new(4, Value::Enum(m.sport as u8)),
                Field::new(5, Value::String(m.name.clone())),
            ],
            Message::Lap(m) => {
                let mut fields = vec![
                    Field::new(253, date_time(m.timestamp)),
                    Field::new(2, date_time(m.start_time)),
                    Field::new(3, Value::SInt32(m.start_position.lat)),
                    Field::new(4, Value::SInt32(m.start_position.lon)),
                    Field::new(5, Value::SInt32(m.end_position.lat)),
                    Field::new(6, Value::SInt32(m.end_position.lon)),
                    Field::new(7, Value::UInt32(scaled_u32(m.total_elapsed_time, 1000.0, 0.0))),
                    Field::new(8, Value::UInt32(scaled_u32(m.total_timer_time, 1000.0, 0.0))),
                    Field::new(9, Value::UInt32(scaled_u32(m.total_distance, 100.0, 0.0))),
                    Field::new(13, Value::UInt16(scaled_u16(m.avg_speed, 1000.0, 0.0))),
                ];
                if let Some(ascent) = m.total_ascent {
                    fields.push(Field::new(21, Value::UInt16(ascent)));
                }
                if let Some(descent) = m.total_descent {
                    fields.push(Field::new(22, Value::UInt16(descent)));
                }
                if let Some(max) = m.max_altitude {
                    fields.push(Field::new(43, altitude(max)));
                }
                if let Some(min) = m.min_altitude {
                    fields.push(Field::new(62, altitude(min)));
                }
                let b = &m.bounds;
                fields.push(Field::extension(27, "bound_max_position_lat", Value::SInt32(b.max_lat)));
                fields.push(Field::extension(28, "bound_max_position_long", Value::SInt32(b.max_lon)));
                fields.push(Field::extension(29, "bound_min_position_lat", Value::SInt32(b.min_lat)));
                fields.push(Field::extension(30, "bound_min_position_long", Value::SInt32(b.min_lon)));
                fields
            }
            Message::CoursePoint(m) => {
                let mut fields = Vec::with_capacity(6);
                if let Some(ts) = m.timestamp {
                    fields.push(Field::new(1, date_time(ts)));
                }
                fields.push(Field::new(2, Value::SInt32(m.position.lat)));
                fields.push(Field::new(3, Value::SInt32(m.position.lon)));
                if let Some(distance) = m.distance {
                    fields.push(Field::new(4, Value::UInt32(scaled_u32(distance, 100.0, 0.0))));
                }
                fields.push(Field::new(5, Value::Enum(m.point_type as u8)));
                fields.push(Field::new(6, Value::String(m.name.clone())));
                fields
            }
            Message::Event(m) => vec![
                Field::new(253, date_time(m.timestamp)),
                Field::new(0, Value::Enum(m.event as u8)),
                Field::new(1, Value::Enum(m.event_type as u8)),
                Field::new(4, Value::UInt8(m.event_group)),
            ],
            Message::Record(m) => {
                let mut fields = vec![
                    Field::new(253, date_time(m.timestamp)),
                    Field::new(0, Value::SInt32(m.position.lat)),
                    Field::new(1, Value::SInt32(m.position.lon)),
                ];
                if let Some(alt) = m.altitude {
                    fields.push(Field::new(2, altitude(alt)));
                }
                fields.push(Field::new(5, Value::UInt32(scaled_u32(m.distance, 100.0, 0.0))));
                fields.push(Field::new(6, Value::UInt16(scaled_u16(m.speed, 1000.0, 0.0))));
                fields
            }
        }
    }
}

/// Ordered consumer of course messages.
///
/// Sinks must keep messages in the order they are written; that order is
/// the wire order of the file. Finalizing is specific to each sink and
/// consumes it, so nothing can be written afterwards.
pub trait MessageSink {
    fn write(&mut self, message: Message) -> Result<()>;
}

/// Collects messages in memory, mostly for inspection in tests.
impl MessageSink for Vec<Message> {
    fn write(&mut self, message: Message) -> Result<()> {
        self.push(message);
        Ok(())
    }
}
