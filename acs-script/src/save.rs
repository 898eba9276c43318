//! Save-game primitives.
//!
//! The interpreter only needs typed little-endian reads/writes and segment
//! markers. [`SaveBuffer`] and [`SaveCursor`] are in-memory implementations;
//! a game with its own save stream implements the two traits over it.

use std::io::Cursor;

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};

/// Markers delimiting interpreter data inside a save stream.
#[repr(i32)]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Segment {
    WorldScripts = 0x1D,
    MapScripts = 0x1E,
    ScriptInstances = 0x1F,
}

#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub enum SaveError {
    #[error("unexpected end of save data at 0x{offset:X}")]
    Truncated { offset: u64 },

    #[error("segment mismatch: expected {expected:?}, found 0x{found:X}")]
    BadSegment { expected: Segment, found: i32 },

    #[error("unsupported {what} version {version}")]
    UnsupportedVersion { what: &'static str, version: u8 },

    #[error("entrypoint index {index} out of range (count={count})")]
    BadEntryPoint { index: i32, count: usize },

    #[error("entrypoint {index} holds script {expected}, save names script {found}")]
    ScriptMismatch { index: i32, expected: i32, found: i32 },

    #[error("script state code {code} is invalid")]
    BadState { code: i16 },

    #[error("{what} {value} out of range")]
    OutOfRange { what: &'static str, value: i32 },
}

pub trait SaveWriter {
    fn write_u8(&mut self, v: u8);
    fn write_i16(&mut self, v: i16);
    fn write_i32(&mut self, v: i32);
    fn write_bytes(&mut self, v: &[u8]);

    fn begin_segment(&mut self, segment: Segment) {
        self.write_i32(segment as i32);
    }
}

pub trait SaveReader {
    fn read_u8(&mut self) -> Result<u8, SaveError>;
    fn read_i16(&mut self) -> Result<i16, SaveError>;
    fn read_i32(&mut self) -> Result<i32, SaveError>;
    fn read_bytes(&mut self, out: &mut [u8]) -> Result<(), SaveError>;

    fn assert_segment(&mut self, segment: Segment) -> Result<(), SaveError> {
        let found = self.read_i32()?;
        if found != segment as i32 {
            return Err(SaveError::BadSegment { expected: segment, found });
        }
        Ok(())
    }
}

#[derive(Debug, Default, Clone)]
pub struct SaveBuffer {
    data: Vec<u8>,
}

impl SaveBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }

    pub fn into_inner(self) -> Vec<u8> {
        self.data
    }
}

// Writes into a Vec<u8> cannot fail.
impl SaveWriter for SaveBuffer {
    fn write_u8(&mut self, v: u8) {
        self.data.push(v);
    }

    fn write_i16(&mut self, v: i16) {
        let _ = self.data.write_i16::<LittleEndian>(v);
    }

    fn write_i32(&mut self, v: i32) {
        let _ = self.data.write_i32::<LittleEndian>(v);
    }

    fn write_bytes(&mut self, v: &[u8]) {
        self.data.extend_from_slice(v);
    }
}

pub struct SaveCursor<'a> {
    cursor: Cursor<&'a [u8]>,
}

impl<'a> SaveCursor<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { cursor: Cursor::new(data) }
    }

    pub fn position(&self) -> u64 {
        self.cursor.position()
    }

    pub fn remaining(&self) -> usize {
        let len = self.cursor.get_ref().len() as u64;
        len.saturating_sub(self.cursor.position()) as usize
    }

    fn truncated(&self) -> SaveError {
        SaveError::Truncated { offset: self.cursor.position() }
    }
}

impl SaveReader for SaveCursor<'_> {
    fn read_u8(&mut self) -> Result<u8, SaveError> {
        self.cursor.read_u8().map_err(|_| self.truncated())
    }

    fn read_i16(&mut self) -> Result<i16, SaveError> {
        self.cursor.read_i16::<LittleEndian>().map_err(|_| self.truncated())
    }

    fn read_i32(&mut self) -> Result<i32, SaveError> {
        self.cursor.read_i32::<LittleEndian>().map_err(|_| self.truncated())
    }

    fn read_bytes(&mut self, out: &mut [u8]) -> Result<(), SaveError> {
        use std::io::Read;
        self.cursor.read_exact(out).map_err(|_| self.truncated())
    }
}
