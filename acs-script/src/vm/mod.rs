//! Script registry, per-instance execution and persistence.

mod interpreter;
mod opcode;
mod persist;
mod print;
mod stack;
mod state;
mod thread;

pub use interpreter::Interpreter;
pub use opcode::Opcode;
pub use persist::{INSTANCE_DATA_VERSION, WORLD_DATA_VERSION};
pub use print::PrintBuffer;
pub use stack::ValueStack;
pub use state::{DeferredTask, InstanceId, ScriptInfo, ScriptSlot, ScriptState, StartOutcome};
pub use thread::{ExecOutcome, ScriptInstance};
