//! Compiled script lumps.
//!
//! [`BytecodeImage`] parses the lump once per level; [`disassemble`] turns it
//! into a listing for tooling.

mod disasm;
mod image;
mod layout;

pub use disasm::{disassemble, Inst, Listing, ScriptListing};
pub use image::{BytecodeImage, EntryPoint, LoadError};
pub use layout::*;
