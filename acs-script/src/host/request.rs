use std::collections::VecDeque;

use super::{ActorRef, LineRef};

/// A script lifecycle request raised while the interpreter is busy running a
/// script (typically by the ACS_Execute family of line specials).
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ScriptRequest {
    Start {
        script: i32,
        /// 0 means the current map.
        map: u32,
        args: Vec<u8>,
        activator: Option<ActorRef>,
        line: Option<LineRef>,
        side: u8,
    },
    Suspend {
        script: i32,
    },
    Terminate {
        script: i32,
    },
}

/// FIFO of pending requests, drained by the interpreter after every quantum.
#[derive(Debug, Default)]
pub struct ScriptRequests {
    queue: VecDeque<ScriptRequest>,
}

impl ScriptRequests {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, request: ScriptRequest) {
        self.queue.push_back(request);
    }

    pub fn start(&mut self, script: i32, map: u32, args: &[u8], activator: Option<ActorRef>, line: Option<LineRef>, side: u8) {
        self.push(ScriptRequest::Start { script, map, args: args.to_vec(), activator, line, side });
    }

    pub fn suspend(&mut self, script: i32) {
        self.push(ScriptRequest::Suspend { script });
    }

    pub fn terminate(&mut self, script: i32) {
        self.push(ScriptRequest::Terminate { script });
    }

    pub fn pop(&mut self) -> Option<ScriptRequest> {
        self.queue.pop_front()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }
}
