//! On-disk layout of a compiled ACS lump.
//!
//! All words are little-endian `i32`.
//!
//! ```text
//! 0x00  marker       "ACS\0"
//! 0x04  info_offset  absolute offset of the info block
//! 0x08  code_start   (unused by the interpreter)
//! 0x0C  code ...     instruction words, byte-addressed by jump targets
//!
//! info_offset:
//!   script_count
//!   script_count * { number, code_offset, arg_count }
//!   string_count
//!   string_count * string_offset   (absolute, NUL-terminated)
//! ```

/// "ACS\0" read as a little-endian word.
pub const ACS_MARKER: u32 = u32::from_le_bytes(*b"ACS\0");

/// Size of the fixed header in bytes.
pub const HEADER_SIZE: usize = 12;

/// Size of one entrypoint record in the info block.
pub const ENTRY_RECORD_SIZE: usize = 12;

/// Script numbers at or above this value denote open (auto-start) scripts.
pub const OPEN_SCRIPTS_BASE: i32 = 1000;

/// Local variable slots per script instance.
pub const MAX_SCRIPT_VARS: usize = 10;

/// Map-scoped variables.
pub const MAX_MAP_VARS: usize = 32;

/// World-scoped variables.
pub const MAX_WORLD_VARS: usize = 64;

/// Value stack depth per script instance.
pub const STACK_DEPTH: usize = 32;

/// Argument bytes carried by a deferred start.
pub const DEFERRED_ARGS: usize = 4;

/// Slots in the fixed deferred-start table of legacy saves.
pub const LEGACY_STORE_SIZE: usize = 20;

/// Print buffer capacity in bytes (including the terminator of the C layout).
pub const PRINT_BUFFER_SIZE: usize = 256;
