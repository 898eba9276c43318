//! Save and restore of interpreter state.
//!
//! World data (version 3):
//! ```text
//! segment WorldScripts
//! u8   version
//! i32  world_vars[64]
//! i32  task_count
//!      task_count * { i32 map, i32 script, u8 args[4] }
//! ```
//! Versions 1 and 2 store a fixed table of 20 tasks instead of the counted
//! list; slots with a non-positive map are unused.
//!
//! Map data: `segment MapScripts`, per entrypoint `{ i16 state, i16 wait }`,
//! then `i32 map_vars[32]`. Wait values outside the `i16` range do not
//! survive a save; they are truncated with a warning.
//!
//! Actor and line handles are stored as `u32`; `u32::MAX` marks "none" and is
//! therefore not a storable handle.

use crate::format::{BytecodeImage, DEFERRED_ARGS, LEGACY_STORE_SIZE, MAX_MAP_VARS, MAX_SCRIPT_VARS, MAX_WORLD_VARS, STACK_DEPTH};
use crate::host::{ActorRef, LineRef};
use crate::save::{SaveError, SaveReader, SaveWriter, Segment};

use super::interpreter::Interpreter;
use super::stack::ValueStack;
use super::state::{DeferredTask, InstanceId, ScriptState};
use super::thread::ScriptInstance;

pub const WORLD_DATA_VERSION: u8 = 3;
pub const INSTANCE_DATA_VERSION: u8 = 1;

const NO_HANDLE: u32 = u32::MAX;

fn write_handle<W: SaveWriter + ?Sized>(w: &mut W, handle: Option<u32>) {
    if handle == Some(NO_HANDLE) {
        log::warn!("handle 0x{:X} is reserved and will read back as none", NO_HANDLE);
    }
    w.write_i32(handle.unwrap_or(NO_HANDLE) as i32);
}

fn read_handle<R: SaveReader + ?Sized>(r: &mut R) -> Result<Option<u32>, SaveError> {
    let v = r.read_i32()? as u32;
    Ok((v != NO_HANDLE).then_some(v))
}

fn read_count<R: SaveReader + ?Sized>(r: &mut R, what: &'static str) -> Result<usize, SaveError> {
    let v = r.read_i32()?;
    usize::try_from(v).map_err(|_| SaveError::OutOfRange { what, value: v })
}

fn read_task<R: SaveReader + ?Sized>(r: &mut R) -> Result<(i32, i32, [u8; DEFERRED_ARGS]), SaveError> {
    let map = r.read_i32()?;
    let script = r.read_i32()?;
    let mut args = [0u8; DEFERRED_ARGS];
    r.read_bytes(&mut args)?;
    Ok((map, script, args))
}

impl ScriptInstance {
    pub fn write<W: SaveWriter + ?Sized>(&self, w: &mut W) {
        w.write_u8(INSTANCE_DATA_VERSION);
        write_handle(w, self.activator.map(|a| a.0));
        write_handle(w, self.line.map(|l| l.0));
        w.write_i32(i32::from(self.side));
        w.write_i32(self.number);
        w.write_i32(self.info_index as i32);
        w.write_i32(self.delay);
        for v in self.stack.raw_slots() {
            w.write_i32(*v);
        }
        w.write_i32(self.stack.len() as i32);
        for v in &self.vars {
            w.write_i32(*v);
        }
        w.write_i32(self.pc as i32);
    }

    /// Read an instance written by [`ScriptInstance::write`]. The image must
    /// be the one the instance was saved against. The returned instance has
    /// no identity until an [`Interpreter`] adopts it.
    pub fn read<R: SaveReader + ?Sized>(r: &mut R, image: &BytecodeImage) -> Result<Self, SaveError> {
        let version = r.read_u8()?;
        if version != INSTANCE_DATA_VERSION {
            return Err(SaveError::UnsupportedVersion { what: "script instance", version });
        }
        let activator = read_handle(r)?.map(ActorRef);
        let line = read_handle(r)?.map(LineRef);
        let side = r.read_i32()?;
        let number = r.read_i32()?;
        let info_index = r.read_i32()?;
        let delay = r.read_i32()?;

        let mut slots = [0i32; STACK_DEPTH];
        for v in slots.iter_mut() {
            *v = r.read_i32()?;
        }
        let depth = read_count(r, "stack depth")?;
        if depth > STACK_DEPTH {
            return Err(SaveError::OutOfRange { what: "stack depth", value: depth as i32 });
        }
        let mut vars = [0i32; MAX_SCRIPT_VARS];
        for v in vars.iter_mut() {
            *v = r.read_i32()?;
        }
        let pc = r.read_i32()?;

        let count = image.entrypoints().len();
        let index = usize::try_from(info_index)
            .ok()
            .filter(|&i| i < count)
            .ok_or(SaveError::BadEntryPoint { index: info_index, count })?;
        let expected = image.entrypoints()[index].number;
        if number != expected {
            return Err(SaveError::ScriptMismatch { index: info_index, expected, found: number });
        }
        if pc < 0 || pc as usize >= image.len() {
            return Err(SaveError::OutOfRange { what: "program counter", value: pc });
        }
        let side = u8::try_from(side).map_err(|_| SaveError::OutOfRange { what: "line side", value: side })?;

        Ok(Self {
            id: InstanceId(0),
            info_index: index,
            number,
            pc: pc as u32,
            delay,
            stack: ValueStack::from_parts(slots, depth),
            vars,
            activator,
            line,
            side,
        })
    }
}

impl Interpreter {
    pub fn write_world_data<W: SaveWriter + ?Sized>(&self, w: &mut W) {
        w.begin_segment(Segment::WorldScripts);
        w.write_u8(WORLD_DATA_VERSION);
        for v in &self.world.world_vars {
            w.write_i32(*v);
        }
        w.write_i32(self.world.deferred.len() as i32);
        for task in &self.world.deferred {
            w.write_i32(task.map as i32);
            w.write_i32(task.script);
            w.write_bytes(&task.args);
        }
    }

    /// Replace world variables and deferred tasks with saved ones. Nothing is
    /// changed if the data is unreadable.
    pub fn read_world_data<R: SaveReader + ?Sized>(&mut self, r: &mut R) -> Result<(), SaveError> {
        r.assert_segment(Segment::WorldScripts)?;
        let version = r.read_u8()?;
        if version == 0 || version > WORLD_DATA_VERSION {
            return Err(SaveError::UnsupportedVersion { what: "world script data", version });
        }

        let mut world_vars = [0i32; MAX_WORLD_VARS];
        for v in world_vars.iter_mut() {
            *v = r.read_i32()?;
        }

        let mut deferred = Vec::new();
        if version >= 3 {
            let count = read_count(r, "deferred task count")?;
            for _ in 0..count {
                let (map, script, args) = read_task(r)?;
                let map = u32::try_from(map).map_err(|_| SaveError::OutOfRange { what: "task map", value: map })?;
                deferred.push(DeferredTask { map, script, args });
            }
        } else {
            for _ in 0..LEGACY_STORE_SIZE {
                let (map, script, args) = read_task(r)?;
                if map > 0 {
                    deferred.push(DeferredTask { map: map as u32, script, args });
                }
            }
            log::debug!("upgraded {} deferred task(s) from version {} world data", deferred.len(), version);
        }

        self.world.world_vars = world_vars;
        self.world.deferred = deferred;
        Ok(())
    }

    pub fn write_map_data<W: SaveWriter + ?Sized>(&self, w: &mut W) {
        w.begin_segment(Segment::MapScripts);
        for slot in &self.level.slots {
            let wait = i16::try_from(slot.wait_value).unwrap_or_else(|_| {
                log::warn!("script {}: wait value {} does not fit the save format", slot.number, slot.wait_value);
                slot.wait_value as i16
            });
            w.write_i16(slot.state.code());
            w.write_i16(wait);
        }
        for v in &self.level.map_vars {
            w.write_i32(*v);
        }
    }

    /// Restore script states and map variables of the loaded map.
    pub fn read_map_data<R: SaveReader + ?Sized>(&mut self, r: &mut R) -> Result<(), SaveError> {
        r.assert_segment(Segment::MapScripts)?;
        let mut states = Vec::with_capacity(self.level.slots.len());
        for _ in 0..self.level.slots.len() {
            let code = r.read_i16()?;
            let state = ScriptState::from_code(code).ok_or(SaveError::BadState { code })?;
            let wait = i32::from(r.read_i16()?);
            states.push((state, wait));
        }
        let mut map_vars = [0i32; MAX_MAP_VARS];
        for v in map_vars.iter_mut() {
            *v = r.read_i32()?;
        }

        for (slot, (state, wait)) in self.level.slots.iter_mut().zip(states) {
            slot.state = state;
            slot.wait_value = wait;
        }
        self.level.map_vars = map_vars;
        Ok(())
    }

    /// Add a saved instance to the end of the run order.
    pub fn restore_instance<R: SaveReader + ?Sized>(&mut self, r: &mut R) -> Result<InstanceId, SaveError> {
        let inst = ScriptInstance::read(r, &self.level.image)?;
        Ok(self.adopt(inst))
    }

    fn adopt(&mut self, mut inst: ScriptInstance) -> InstanceId {
        let id = self.alloc_id();
        inst.id = id;
        self.instances.push(inst);
        id
    }

    /// Write every live instance in run order.
    pub fn write_instances<W: SaveWriter + ?Sized>(&self, w: &mut W) {
        w.begin_segment(Segment::ScriptInstances);
        w.write_i32(self.instances.len() as i32);
        for inst in &self.instances {
            inst.write(w);
        }
    }

    /// Read instances written by [`Interpreter::write_instances`], appending
    /// them in their saved order. Nothing is added if any of them fails.
    pub fn read_instances<R: SaveReader + ?Sized>(&mut self, r: &mut R) -> Result<Vec<InstanceId>, SaveError> {
        r.assert_segment(Segment::ScriptInstances)?;
        let count = read_count(r, "instance count")?;
        let mut restored = Vec::with_capacity(count.min(256));
        for _ in 0..count {
            restored.push(ScriptInstance::read(r, &self.level.image)?);
        }
        Ok(restored.into_iter().map(|inst| self.adopt(inst)).collect())
    }
}
