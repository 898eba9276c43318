use std::sync::Arc;

use byteorder::{ByteOrder, LittleEndian};
use encoding_rs::WINDOWS_1252;

use super::layout::{ACS_MARKER, ENTRY_RECORD_SIZE, HEADER_SIZE, OPEN_SCRIPTS_BASE};

#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub enum LoadError {
    #[error("resource too short for header: len={len}")]
    TooShort { len: usize },

    #[error("bad marker: 0x{found:08X}")]
    BadMarker { found: u32 },

    #[error("{what} at 0x{offset:X} lies outside the image (len=0x{len:X})")]
    OutOfBounds { what: &'static str, offset: usize, len: usize },

    #[error("negative {what}: {value}")]
    Negative { what: &'static str, value: i32 },
}

/// One numbered script definition.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EntryPoint {
    /// Script number with the open-script base already removed.
    pub number: i32,
    /// Absolute byte offset of the first instruction.
    pub code_offset: u32,
    pub arg_count: usize,
    /// Started automatically when the level's scripts are opened.
    pub is_open: bool,
}

/// A loaded, immutable compiled script lump.
#[derive(Clone, Debug)]
pub struct BytecodeImage {
    bytes: Arc<[u8]>,
    info_offset: usize,
    entrypoints: Vec<EntryPoint>,
    strings: Vec<String>,
}

impl Default for BytecodeImage {
    fn default() -> Self {
        Self { bytes: Arc::from(&[][..]), info_offset: 0, entrypoints: Vec::new(), strings: Vec::new() }
    }
}

fn word(bytes: &[u8], off: usize, what: &'static str) -> Result<i32, LoadError> {
    match bytes.get(off..off + 4) {
        Some(w) => Ok(LittleEndian::read_i32(w)),
        None => Err(LoadError::OutOfBounds { what, offset: off, len: bytes.len() }),
    }
}

fn count(bytes: &[u8], off: usize, what: &'static str) -> Result<usize, LoadError> {
    let v = word(bytes, off, what)?;
    usize::try_from(v).map_err(|_| LoadError::Negative { what, value: v })
}

fn c_string(bytes: &[u8], off: usize) -> Result<String, LoadError> {
    let tail = bytes
        .get(off..)
        .ok_or(LoadError::OutOfBounds { what: "string", offset: off, len: bytes.len() })?;
    let end = tail.iter().position(|&b| b == 0).unwrap_or(tail.len());
    let (text, _, _) = WINDOWS_1252.decode(&tail[..end]);
    Ok(text.into_owned())
}

impl BytecodeImage {
    /// Load a level's compiled scripts.
    ///
    /// A missing or unreadable resource produces an image without entrypoints;
    /// the level then simply has no scripts.
    pub fn load(resource: Option<&[u8]>) -> Self {
        let Some(bytes) = resource else {
            log::warn!("level has no compiled scripts");
            return Self::default();
        };
        match Self::parse(bytes) {
            Ok(image) => image,
            Err(e) => {
                log::warn!("ignoring compiled scripts: {e}");
                Self::default()
            }
        }
    }

    /// Strict parse; every structural problem is reported.
    pub fn parse(bytes: &[u8]) -> Result<Self, LoadError> {
        if bytes.len() < HEADER_SIZE {
            return Err(LoadError::TooShort { len: bytes.len() });
        }
        let marker = LittleEndian::read_u32(&bytes[0..4]);
        if marker != ACS_MARKER {
            return Err(LoadError::BadMarker { found: marker });
        }

        let info_offset = count(bytes, 4, "info offset")?;
        let script_count = count(bytes, info_offset, "script count")?;

        let mut off = info_offset + 4;
        let mut entrypoints = Vec::with_capacity(script_count.min(1024));
        for _ in 0..script_count {
            let raw = word(bytes, off, "script number")?;
            let code_offset = count(bytes, off + 4, "code offset")?;
            let arg_count = count(bytes, off + 8, "argument count")?;
            off += ENTRY_RECORD_SIZE;

            if code_offset >= bytes.len() {
                return Err(LoadError::OutOfBounds {
                    what: "script code",
                    offset: code_offset,
                    len: bytes.len(),
                });
            }

            let is_open = raw >= OPEN_SCRIPTS_BASE;
            entrypoints.push(EntryPoint {
                number: if is_open { raw - OPEN_SCRIPTS_BASE } else { raw },
                code_offset: code_offset as u32,
                arg_count,
                is_open,
            });
        }

        let string_count = count(bytes, off, "string count")?;
        off += 4;
        let mut strings = Vec::with_capacity(string_count.min(4096));
        for i in 0..string_count {
            let at = count(bytes, off + i * 4, "string offset")?;
            strings.push(c_string(bytes, at)?);
        }

        Ok(Self { bytes: bytes.into(), info_offset, entrypoints, strings })
    }

    pub fn entrypoints(&self) -> &[EntryPoint] {
        &self.entrypoints
    }

    pub fn entrypoint(&self, index: usize) -> Option<&EntryPoint> {
        self.entrypoints.get(index)
    }

    /// Index of the entrypoint with the given (normalized) script number.
    pub fn find(&self, number: i32) -> Option<usize> {
        self.entrypoints.iter().position(|e| e.number == number)
    }

    pub fn strings(&self) -> &[String] {
        &self.strings
    }

    /// Bounds-checked string constant lookup.
    pub fn string_constant(&self, index: i32) -> Option<&str> {
        usize::try_from(index).ok().and_then(|i| self.strings.get(i)).map(String::as_str)
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// End of the code region (the info block follows it).
    pub fn code_end(&self) -> usize {
        self.info_offset
    }

    /// Instruction word at `pc`, or `None` past the end of the image.
    #[inline]
    pub fn word(&self, pc: u32) -> Option<i32> {
        let pc = pc as usize;
        self.bytes.get(pc..pc + 4).map(LittleEndian::read_i32)
    }
}
