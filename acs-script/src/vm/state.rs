use std::fmt;

use serde::{Deserialize, Serialize};

use crate::format::{EntryPoint, DEFERRED_ARGS};

/// Lifecycle of one entrypoint. The discriminants are the persisted codes.
#[repr(i16)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ScriptState {
    #[default]
    Inactive = 0,
    Running = 1,
    Suspended = 2,
    WaitingForTag = 3,
    WaitingForPolyobject = 4,
    WaitingForScript = 5,
    Terminating = 6,
}

impl ScriptState {
    pub fn code(self) -> i16 {
        self as i16
    }

    pub fn from_code(code: i16) -> Option<Self> {
        Some(match code {
            0 => Self::Inactive,
            1 => Self::Running,
            2 => Self::Suspended,
            3 => Self::WaitingForTag,
            4 => Self::WaitingForPolyobject,
            5 => Self::WaitingForScript,
            6 => Self::Terminating,
            _ => return None,
        })
    }
}

impl fmt::Display for ScriptState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Inactive => "Inactive",
            Self::Running => "Running",
            Self::Suspended => "Suspended",
            Self::WaitingForTag => "Waiting for tag",
            Self::WaitingForPolyobject => "Waiting for polyobj",
            Self::WaitingForScript => "Waiting for script",
            Self::Terminating => "Terminating",
        };
        f.write_str(s)
    }
}

/// Per-entrypoint control record.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ScriptSlot {
    pub number: i32,
    pub arg_count: usize,
    pub is_open: bool,
    pub state: ScriptState,
    /// Tag, polyobject or script number being waited on.
    pub wait_value: i32,
}

impl ScriptSlot {
    pub(crate) fn new(entry: &EntryPoint) -> Self {
        Self {
            number: entry.number,
            arg_count: entry.arg_count,
            is_open: entry.is_open,
            state: ScriptState::Inactive,
            wait_value: 0,
        }
    }
}

/// A start request for a script on a map that is not loaded yet.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DeferredTask {
    pub map: u32,
    pub script: i32,
    pub args: [u8; DEFERRED_ARGS],
}

/// Identity of a live script instance; never reused within one interpreter.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct InstanceId(pub u64);

impl fmt::Display for InstanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StartOutcome {
    /// A new instance was created.
    Started(InstanceId),
    /// A suspended script was set running again.
    Resumed,
    /// Queued for a map that is not current.
    Deferred,
    AlreadyActive,
    UnknownScript,
}

impl StartOutcome {
    pub fn instance(self) -> Option<InstanceId> {
        match self {
            Self::Started(id) => Some(id),
            _ => None,
        }
    }

    /// Whether the request had any effect on the current map.
    pub fn took_effect(self) -> bool {
        matches!(self, Self::Started(_) | Self::Resumed)
    }
}

/// One line of the script listing.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScriptInfo {
    pub number: i32,
    pub state: ScriptState,
    pub wait_value: i32,
    pub arg_count: usize,
    pub is_open: bool,
}

impl From<&ScriptSlot> for ScriptInfo {
    fn from(slot: &ScriptSlot) -> Self {
        Self {
            number: slot.number,
            state: slot.state,
            wait_value: slot.wait_value,
            arg_count: slot.arg_count,
            is_open: slot.is_open,
        }
    }
}

impl fmt::Display for ScriptInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:>4} {} (a: {}, w: {})", self.number, self.state, self.arg_count, self.wait_value)?;
        if self.is_open {
            f.write_str(" [open]")?;
        }
        Ok(())
    }
}
