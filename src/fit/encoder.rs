//! FIT protocol 2.0 writer.
//!
//! Messages are framed into an in-memory buffer as they arrive: every
//! message uses local type 0, and a definition message is written whenever
//! the field layout differs from the previous one. Finishing prepends the
//! 14-byte file header, which needs the final data size, and appends the
//! file CRC.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use log::{debug, info};

use super::crc::crc16;
use super::{Field, Message, MessageSink};
use crate::error::{Error, Result};

pub const PROTOCOL_VERSION: u8 = 0x20;
pub const PROFILE_VERSION: u16 = 2132;
pub const HEADER_SIZE: u8 = 14;

const LOCAL_TYPE: u8 = 0;
const DEFINITION_FLAG: u8 = 0x40;
const ARCH_LITTLE_ENDIAN: u8 = 0;

#[derive(Debug, Clone, PartialEq, Eq)]
struct FieldDef {
    num: u8,
    size: u8,
    base_type: u8,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Definition {
    global_num: u16,
    fields: Vec<FieldDef>,
}

impl Definition {
    fn for_message(message: &Message, fields: &[Field]) -> Result<Self> {
        if fields.len() > usize::from(u8::MAX) {
            return Err(Error::Encode {
                message: message.name(),
                reason: format!("{} fields in one definition", fields.len()),
            });
        }

        let mut defs = Vec::with_capacity(fields.len());
        for field in fields {
            let size = u8::try_from(field.value.size()).map_err(|_| Error::Encode {
                message: message.name(),
                reason: format!("field {} is {} bytes long", field.num, field.value.size()),
            })?;
            defs.push(FieldDef {
                num: field.num,
                size,
                base_type: field.value.base_type().code(),
            });
        }

        Ok(Definition {
            global_num: message.global_num(),
            fields: defs,
        })
    }

    fn write_to(&self, out: &mut Vec<u8>) {
        out.push(DEFINITION_FLAG | LOCAL_TYPE);
        out.push(0); // reserved
        out.push(ARCH_LITTLE_ENDIAN);
        out.extend_from_slice(&self.global_num.to_le_bytes());
        out.push(self.fields.len() as u8);
        for f in &self.fields {
            out.extend_from_slice(&[f.num, f.size, f.base_type]);
        }
    }
}

/// Shared framing state of the buffer and file encoders.
#[derive(Debug, Default)]
struct FitWriter {
    data: Vec<u8>,
    current: Option<Definition>,
    messages: usize,
    definitions: usize,
}

impl FitWriter {
    fn write_message(&mut self, message: &Message) -> Result<()> {
        let fields = message.fields();
        let definition = Definition::for_message(message, &fields)?;

        if self.current.as_ref() != Some(&definition) {
            definition.write_to(&mut self.data);
            self.current = Some(definition);
            self.definitions += 1;
        }

        self.data.push(LOCAL_TYPE);
        for field in &fields {
            field.value.write_to(&mut self.data);
        }
        self.messages += 1;
        Ok(())
    }

    fn into_bytes(self) -> Vec<u8> {
        let mut out = Vec::with_capacity(usize::from(HEADER_SIZE) + self.data.len() + 2);
        out.push(HEADER_SIZE);
        out.push(PROTOCOL_VERSION);
        out.extend_from_slice(&PROFILE_VERSION.to_le_bytes());
        out.extend_from_slice(&(self.data.len() as u32).to_le_bytes());
        out.extend_from_slice(b".FIT");
        let header_crc = crc16(&out);
        out.extend_from_slice(&header_crc.to_le_bytes());

        out.extend_from_slice(&self.data);
        let file_crc = crc16(&out);
        out.extend_from_slice(&file_crc.to_le_bytes());

        debug!(
            "Encoded {} messages with {} definitions, {} data bytes",
            self.messages,
            self.definitions,
            self.data.len()
        );
        out
    }
}

/// Encodes messages into an in-memory FIT file.
#[derive(Debug, Default)]
pub struct BufferEncoder {
    writer: FitWriter,
}

impl BufferEncoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seal the file and return its bytes.
    pub fn finish(self) -> Vec<u8> {
        self.writer.into_bytes()
    }
}

impl MessageSink for BufferEncoder {
    fn write(&mut self, message: Message) -> Result<()> {
        self.writer.write_message(&message)
    }
}

/// Encodes messages into a FIT file on disk.
///
/// Nothing touches the destination until [`FileEncoder::finish`]; the file
/// is first written next to it under a temporary name and then renamed
/// over it, so a failed run never leaves a truncated file behind.
#[derive(Debug)]
pub struct FileEncoder {
    path: PathBuf,
    writer: FitWriter,
}

impl FileEncoder {
    pub fn new(path: impl AsRef<Path>) -> Self {
        FileEncoder {
            path: path.as_ref().to_path_buf(),
            writer: FitWriter::default(),
        }
    }

    /// Seal the file and commit it to the destination path.
    pub fn finish(self) -> Result<()> {
        let bytes = self.writer.into_bytes();
        let staging = staging_path(&self.path);

        let result = write_and_sync(&staging, &bytes).and_then(|()| fs::rename(&staging, &self.path));
        if let Err(e) = result {
            let _ = fs::remove_file(&staging);
            return Err(e.into());
        }

        info!("Wrote {} bytes to {}", bytes.len(), self.path.display());
        Ok(())
    }
}

impl MessageSink for FileEncoder {
    fn write(&mut self, message: Message) -> Result<()> {
        self.writer.write_message(&message)
    }
}

fn staging_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".part");
    path.with_file_name(name)
}

fn write_and_sync(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let mut file = fs::File::create(path)?;
    file.write_all(bytes)?;
    file.sync_all()
}
