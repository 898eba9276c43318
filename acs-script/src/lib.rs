//! acs-script
//!
//! Loader and cooperative virtual machine for compiled ACS (Action-Code Script)
//! level scripts.
//!
//! A level's compiled script lump is parsed into a [`format::BytecodeImage`] and
//! handed to a [`vm::Interpreter`], which owns the per-entrypoint state table,
//! the live script instances, map/world variables and the deferred cross-map
//! start queue. Everything the scripts touch in the game world goes through the
//! [`host::WorldHost`] trait implemented by the embedding game.

pub mod config;
pub mod format;
pub mod host;
pub mod save;
pub mod trace;
pub mod vm;

/// Local developer utilities (kept as a module so integration tests and
/// downstream crates can drive the interpreter without a game).
pub mod test;

/// Game simulation steps per second.
pub const TICRATE: i32 = 35;
