use crate::format::{BytecodeImage, EntryPoint, MAX_MAP_VARS, MAX_SCRIPT_VARS, MAX_WORLD_VARS};
use crate::host::{
    ActorRef, LineRef, LineSpecialCall, MaterialKind, Plane, ScriptRequests, SoundOrigin, TexturePosition, WorldHost,
};
use crate::trace;

use super::opcode::Opcode;
use super::print::PrintBuffer;
use super::stack::ValueStack;
use super::state::{InstanceId, ScriptSlot, ScriptState};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExecOutcome {
    /// Keep dispatching.
    Continue,
    /// Yield until the next tic (delay, wait, suspend).
    Stop,
    /// The script is done.
    Terminate,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum VarScope {
    Script,
    Map,
    World,
}

/// Variable opcodes come in Script/Map/World triples starting at AssignScriptVar.
fn var_scope(op: Opcode) -> VarScope {
    debug_assert!((Opcode::AssignScriptVar as u32..=Opcode::DecWorldVar as u32).contains(&(op as u32)));
    match (op as u32 - Opcode::AssignScriptVar as u32) % 3 {
        0 => VarScope::Script,
        1 => VarScope::Map,
        _ => VarScope::World,
    }
}

fn div(a: i32, b: i32) -> i32 {
    if b == 0 {
        0
    } else {
        a.wrapping_div(b)
    }
}

fn rem(a: i32, b: i32) -> i32 {
    if b == 0 {
        0
    } else {
        a.wrapping_rem(b)
    }
}

fn string_at(image: &BytecodeImage, index: i32) -> &str {
    image.string_constant(index).unwrap_or_else(|| {
        log::warn!("string constant {} out of range ({} strings)", index, image.strings().len());
        ""
    })
}

/// Everything a running instance may touch besides itself.
pub(crate) struct ExecEnv<'a, H: WorldHost + ?Sized> {
    pub image: &'a BytecodeImage,
    pub slots: &'a mut [ScriptSlot],
    pub map_vars: &'a mut [i32; MAX_MAP_VARS],
    pub world_vars: &'a mut [i32; MAX_WORLD_VARS],
    pub print: &'a mut PrintBuffer,
    pub requests: &'a mut ScriptRequests,
    pub host: &'a mut H,
}

/// Execution context of one running script.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ScriptInstance {
    pub(crate) id: InstanceId,
    pub(crate) info_index: usize,
    pub(crate) number: i32,
    pub(crate) pc: u32,
    pub(crate) delay: i32,
    pub(crate) stack: ValueStack,
    pub(crate) vars: [i32; MAX_SCRIPT_VARS],
    pub(crate) activator: Option<ActorRef>,
    pub(crate) line: Option<LineRef>,
    pub(crate) side: u8,
}

impl ScriptInstance {
    pub(crate) fn new(id: InstanceId, info_index: usize, entry: &EntryPoint) -> Self {
        Self {
            id,
            info_index,
            number: entry.number,
            pc: entry.code_offset,
            delay: 0,
            stack: ValueStack::default(),
            vars: [0; MAX_SCRIPT_VARS],
            activator: None,
            line: None,
            side: 0,
        }
    }

    pub(crate) fn bind(&mut self, activator: Option<ActorRef>, line: Option<LineRef>, side: u8) {
        self.activator = activator;
        self.line = line;
        self.side = side;
    }

    /// Copy start arguments into the leading locals; missing bytes read as 0.
    pub(crate) fn set_args(&mut self, args: &[u8], arg_count: usize) {
        for (i, var) in self.vars.iter_mut().take(arg_count).enumerate() {
            *var = args.get(i).copied().map(i32::from).unwrap_or(0);
        }
    }

    pub fn id(&self) -> InstanceId {
        self.id
    }

    pub fn info_index(&self) -> usize {
        self.info_index
    }

    pub fn number(&self) -> i32 {
        self.number
    }

    pub fn pc(&self) -> u32 {
        self.pc
    }

    pub fn delay(&self) -> i32 {
        self.delay
    }

    pub fn stack(&self) -> &ValueStack {
        &self.stack
    }

    pub fn vars(&self) -> &[i32; MAX_SCRIPT_VARS] {
        &self.vars
    }

    pub fn activator(&self) -> Option<ActorRef> {
        self.activator
    }

    pub fn line(&self) -> Option<LineRef> {
        self.line
    }

    pub fn side(&self) -> u8 {
        self.side
    }

    #[inline]
    fn imm(&mut self, image: &BytecodeImage) -> i32 {
        // Operand presence is checked before dispatch.
        let v = image.word(self.pc).unwrap_or_default();
        self.pc += 4;
        v
    }

    fn binary(&mut self, f: impl FnOnce(i32, i32) -> i32) {
        let b = self.stack.pop();
        let a = self.stack.pop();
        self.stack.push(f(a, b));
    }

    /// Apply `f` to the variable named by the next immediate. An index outside
    /// the scope's array is bad bytecode and ends the script.
    fn update_var<H: WorldHost + ?Sized>(
        &mut self,
        env: &mut ExecEnv<'_, H>,
        scope: VarScope,
        f: impl FnOnce(i32) -> i32,
    ) -> ExecOutcome {
        let raw = self.imm(env.image);
        let idx = usize::try_from(raw).unwrap_or(usize::MAX);
        let cell = match scope {
            VarScope::Script => self.vars.get_mut(idx),
            VarScope::Map => env.map_vars.get_mut(idx),
            VarScope::World => env.world_vars.get_mut(idx),
        };
        match cell {
            Some(cell) => {
                *cell = f(*cell);
                ExecOutcome::Continue
            }
            None => {
                self.bad_var(scope, raw);
                ExecOutcome::Terminate
            }
        }
    }

    fn read_var<H: WorldHost + ?Sized>(&mut self, env: &ExecEnv<'_, H>, scope: VarScope) -> Option<i32> {
        let raw = self.imm(env.image);
        let idx = usize::try_from(raw).unwrap_or(usize::MAX);
        let v = match scope {
            VarScope::Script => self.vars.get(idx),
            VarScope::Map => env.map_vars.get(idx),
            VarScope::World => env.world_vars.get(idx),
        };
        if v.is_none() {
            self.bad_var(scope, raw);
        }
        v.copied()
    }

    fn bad_var(&self, scope: VarScope, index: i32) {
        log::error!(
            "script {}: {:?} variable {} out of range at 0x{:X}",
            self.number,
            scope,
            index,
            self.pc.wrapping_sub(8)
        );
    }

    fn wait<H: WorldHost + ?Sized>(&self, env: &mut ExecEnv<'_, H>, state: ScriptState, value: i32) -> ExecOutcome {
        let slot = &mut env.slots[self.info_index];
        slot.wait_value = value;
        slot.state = state;
        trace::sched(format_args!("script {} {} {}", self.number, state, value));
        ExecOutcome::Stop
    }

    fn line_special<H: WorldHost + ?Sized>(&self, env: &mut ExecEnv<'_, H>, special: i32, args: [u8; 5]) {
        let call = LineSpecialCall { special, args, line: self.line, side: self.side, activator: self.activator };
        trace::special(format_args!("script {} special {} {:?}", self.number, special, args));
        env.host.execute_line_special(&call, env.requests);
    }

    fn change_plane<H: WorldHost + ?Sized>(env: &mut ExecEnv<'_, H>, plane: Plane, tag: i32, name: i32) {
        let name = string_at(env.image, name);
        let Some(material) = env.host.resolve_material(MaterialKind::Flat, name) else {
            log::warn!("unknown flat {:?}", name);
            return;
        };
        trace::special(format_args!("{:?} of tag {} -> {}", plane, tag, name));
        for sector in env.host.sectors_with_tag(tag) {
            env.host.set_sector_material(sector, plane, material);
        }
    }

    fn sound_origin(&self) -> SoundOrigin {
        self.line.map_or(SoundOrigin::None, SoundOrigin::LineFrontSector)
    }

    /// Dispatch instructions until one yields or terminates.
    ///
    /// `budget` caps the instructions run in this quantum; when reached the
    /// instance yields with its program counter intact.
    pub(crate) fn run_quantum<H: WorldHost + ?Sized>(
        &mut self,
        env: &mut ExecEnv<'_, H>,
        budget: Option<usize>,
    ) -> ExecOutcome {
        let mut executed = 0usize;
        loop {
            match self.step(env) {
                ExecOutcome::Continue => {}
                other => return other,
            }
            executed += 1;
            if budget.is_some_and(|limit| executed >= limit) {
                log::warn!("script {} used its instruction budget ({}); yielding", self.number, executed);
                return ExecOutcome::Stop;
            }
        }
    }

    /// Execute one instruction.
    pub(crate) fn step<H: WorldHost + ?Sized>(&mut self, env: &mut ExecEnv<'_, H>) -> ExecOutcome {
        let image = env.image;
        let at = self.pc;

        let Some(raw) = image.word(at) else {
            log::warn!("script {} ran off the end of the image at 0x{:X}", self.number, at);
            return ExecOutcome::Terminate;
        };
        let Some(op) = Opcode::decode(raw) else {
            log::error!("script {}: invalid opcode {} at 0x{:X}", self.number, raw, at);
            return ExecOutcome::Terminate;
        };
        if at as usize + 4 * (1 + op.immediates()) > image.len() {
            log::error!("script {}: truncated {} at 0x{:X}", self.number, op, at);
            return ExecOutcome::Terminate;
        }
        self.pc += 4;
        trace::vm(format_args!("script {} 0x{:04X} {} {:?}", self.number, at, op, self.stack.as_slice()));

        use Opcode::*;
        match op {
            Nop => {}
            Terminate => return ExecOutcome::Terminate,
            Suspend => {
                env.slots[self.info_index].state = ScriptState::Suspended;
                trace::sched(format_args!("script {} suspended", self.number));
                return ExecOutcome::Stop;
            }
            PushNumber => {
                let v = self.imm(image);
                self.stack.push(v);
            }
            LSpec1 | LSpec2 | LSpec3 | LSpec4 | LSpec5 => {
                let n = (op as u32 - LSpec1 as u32) as usize + 1;
                let special = self.imm(image);
                let mut args = [0u8; 5];
                for arg in args[..n].iter_mut().rev() {
                    *arg = self.stack.pop() as u8;
                }
                self.line_special(env, special, args);
            }
            LSpec1Direct | LSpec2Direct | LSpec3Direct | LSpec4Direct | LSpec5Direct => {
                let n = (op as u32 - LSpec1Direct as u32) as usize + 1;
                let special = self.imm(image);
                let mut args = [0u8; 5];
                for arg in args[..n].iter_mut() {
                    *arg = self.imm(image) as u8;
                }
                self.line_special(env, special, args);
            }

            Add => self.binary(i32::wrapping_add),
            Subtract => self.binary(i32::wrapping_sub),
            Multiply => self.binary(i32::wrapping_mul),
            Divide => self.binary(div),
            Modulus => self.binary(rem),
            EQ => self.binary(|a, b| (a == b) as i32),
            NE => self.binary(|a, b| (a != b) as i32),
            LT => self.binary(|a, b| (a < b) as i32),
            GT => self.binary(|a, b| (a > b) as i32),
            LE => self.binary(|a, b| (a <= b) as i32),
            GE => self.binary(|a, b| (a >= b) as i32),

            AssignScriptVar | AssignMapVar | AssignWorldVar => {
                let v = self.stack.pop();
                return self.update_var(env, var_scope(op), |_| v);
            }
            PushScriptVar | PushMapVar | PushWorldVar => {
                let Some(v) = self.read_var(env, var_scope(op)) else {
                    return ExecOutcome::Terminate;
                };
                self.stack.push(v);
            }
            AddScriptVar | AddMapVar | AddWorldVar => {
                let v = self.stack.pop();
                return self.update_var(env, var_scope(op), |x| x.wrapping_add(v));
            }
            SubScriptVar | SubMapVar | SubWorldVar => {
                let v = self.stack.pop();
                return self.update_var(env, var_scope(op), |x| x.wrapping_sub(v));
            }
            MulScriptVar | MulMapVar | MulWorldVar => {
                let v = self.stack.pop();
                return self.update_var(env, var_scope(op), |x| x.wrapping_mul(v));
            }
            DivScriptVar | DivMapVar | DivWorldVar => {
                let v = self.stack.pop();
                return self.update_var(env, var_scope(op), |x| div(x, v));
            }
            ModScriptVar | ModMapVar | ModWorldVar => {
                let v = self.stack.pop();
                return self.update_var(env, var_scope(op), |x| rem(x, v));
            }
            IncScriptVar | IncMapVar | IncWorldVar => {
                return self.update_var(env, var_scope(op), |x| x.wrapping_add(1));
            }
            DecScriptVar | DecMapVar | DecWorldVar => {
                return self.update_var(env, var_scope(op), |x| x.wrapping_sub(1));
            }

            Goto => {
                self.pc = self.imm(image) as u32;
            }
            IfGoto => {
                let target = self.imm(image);
                if self.stack.pop() != 0 {
                    self.pc = target as u32;
                }
            }
            IfNotGoto => {
                let target = self.imm(image);
                if self.stack.pop() == 0 {
                    self.pc = target as u32;
                }
            }
            CaseGoto => {
                let value = self.imm(image);
                let target = self.imm(image);
                if self.stack.top() == value {
                    self.stack.drop_top();
                    self.pc = target as u32;
                }
            }
            Drop => self.stack.drop_top(),
            Restart => {
                if let Some(entry) = image.entrypoint(self.info_index) {
                    self.pc = entry.code_offset;
                }
            }

            Delay => {
                self.delay = self.stack.pop();
                return ExecOutcome::Stop;
            }
            DelayDirect => {
                self.delay = self.imm(image);
                return ExecOutcome::Stop;
            }

            Random | RandomDirect => {
                let (low, high) = if op == RandomDirect {
                    let low = self.imm(image);
                    (low, self.imm(image))
                } else {
                    let high = self.stack.pop();
                    (self.stack.pop(), high)
                };
                let span = high.wrapping_sub(low).wrapping_add(1);
                let r = i32::from(env.host.random());
                let v = if span == 0 { low } else { low.wrapping_add(r.wrapping_rem(span)) };
                self.stack.push(v);
            }
            ThingCount | ThingCountDirect => {
                let (thing_type, tid) = if op == ThingCountDirect {
                    let thing_type = self.imm(image);
                    (thing_type, self.imm(image))
                } else {
                    let tid = self.stack.pop();
                    (self.stack.pop(), tid)
                };
                let n = env.host.thing_count(thing_type, tid);
                self.stack.push(n);
            }

            TagWait => {
                let tag = self.stack.pop();
                return self.wait(env, ScriptState::WaitingForTag, tag);
            }
            TagWaitDirect => {
                let tag = self.imm(image);
                return self.wait(env, ScriptState::WaitingForTag, tag);
            }
            PolyWait => {
                let po = self.stack.pop();
                return self.wait(env, ScriptState::WaitingForPolyobject, po);
            }
            PolyWaitDirect => {
                let po = self.imm(image);
                return self.wait(env, ScriptState::WaitingForPolyobject, po);
            }
            ScriptWait => {
                let script = self.stack.pop();
                return self.wait(env, ScriptState::WaitingForScript, script);
            }
            ScriptWaitDirect => {
                let script = self.imm(image);
                return self.wait(env, ScriptState::WaitingForScript, script);
            }

            ChangeFloor | ChangeCeiling => {
                let name = self.stack.pop();
                let tag = self.stack.pop();
                let plane = if op == ChangeFloor { Plane::Floor } else { Plane::Ceiling };
                Self::change_plane(env, plane, tag, name);
            }
            ChangeFloorDirect | ChangeCeilingDirect => {
                let tag = self.imm(image);
                let name = self.imm(image);
                let plane = if op == ChangeFloorDirect { Plane::Floor } else { Plane::Ceiling };
                Self::change_plane(env, plane, tag, name);
            }

            AndLogical => self.binary(|a, b| (a != 0 && b != 0) as i32),
            OrLogical => self.binary(|a, b| (a != 0 || b != 0) as i32),
            AndBitwise => self.binary(|a, b| a & b),
            OrBitwise => self.binary(|a, b| a | b),
            EorBitwise => self.binary(|a, b| a ^ b),
            LShift => self.binary(|a, b| a.wrapping_shl(b as u32)),
            RShift => self.binary(|a, b| a.wrapping_shr(b as u32)),
            NegateLogical => {
                let v = self.stack.pop();
                self.stack.push((v == 0) as i32);
            }
            UnaryMinus => {
                let v = self.stack.pop();
                self.stack.push(v.wrapping_neg());
            }

            LineSide => self.stack.push(i32::from(self.side)),
            ClearLineSpecial => {
                if let Some(line) = self.line {
                    env.host.clear_line_special(line);
                }
            }

            BeginPrint => env.print.clear(),
            EndPrint => {
                let player = self
                    .activator
                    .and_then(|a| env.host.player_of(a))
                    .unwrap_or_else(|| env.host.console_player());
                env.host.set_message(player, env.print.as_str());
            }
            EndPrintBold => {
                for player in env.host.players_in_game() {
                    env.host.set_yellow_message(player, env.print.as_str());
                }
            }
            PrintString => {
                let idx = self.stack.pop();
                env.print.push_str(string_at(image, idx));
            }
            PrintNumber => {
                let v = self.stack.pop();
                env.print.push_str(&v.to_string());
            }
            PrintCharacter => {
                let c = self.stack.pop() as u8;
                env.print.push_char(char::from(c));
            }

            PlayerCount => {
                let n = env.host.players_in_game().len() as i32;
                self.stack.push(n);
            }
            GameType => self.stack.push(env.host.game_type() as i32),
            GameSkill => self.stack.push(env.host.game_skill()),
            Timer => self.stack.push(env.host.level_time()),

            SectorSound | AmbientSound => {
                let volume = self.stack.pop();
                let name = string_at(image, self.stack.pop());
                let origin = if op == SectorSound { self.sound_origin() } else { SoundOrigin::None };
                env.host.start_sound(origin, name, volume);
            }
            SoundSequence => {
                let name = string_at(image, self.stack.pop());
                env.host.start_sound_sequence(self.sound_origin(), name);
            }
            ThingSound => {
                let volume = self.stack.pop();
                let name = string_at(image, self.stack.pop());
                let tid = self.stack.pop();
                for actor in env.host.actors_with_tid(tid) {
                    env.host.start_sound(SoundOrigin::Actor(actor), name, volume);
                }
            }

            SetLineTexture => {
                let name = string_at(image, self.stack.pop());
                let position = self.stack.pop();
                let side = self.stack.pop();
                let tag = self.stack.pop();
                let Some(position) = TexturePosition::from_raw(position) else {
                    log::warn!("script {}: bad texture position {}", self.number, position);
                    return ExecOutcome::Continue;
                };
                let Some(material) = env.host.resolve_material(MaterialKind::Texture, name) else {
                    log::warn!("unknown texture {:?}", name);
                    return ExecOutcome::Continue;
                };
                for line in env.host.lines_with_tag(tag) {
                    env.host.set_line_texture(line, side as u8, position, material);
                }
            }
            SetLineBlocking => {
                let blocking = self.stack.pop() != 0;
                let tag = self.stack.pop();
                for line in env.host.lines_with_tag(tag) {
                    env.host.set_line_blocking(line, blocking);
                }
            }
            SetLineSpecial => {
                let mut args = [0u8; 5];
                for arg in args.iter_mut().rev() {
                    *arg = self.stack.pop() as u8;
                }
                let special = self.stack.pop();
                let tag = self.stack.pop();
                for line in env.host.lines_with_tag(tag) {
                    env.host.set_line_special(line, special, args);
                }
            }
        }
        ExecOutcome::Continue
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::BytecodeImage;
    use crate::test::{HostCall, ImageBuilder, RecordingHost};

    struct Rig {
        image: BytecodeImage,
        slots: Vec<ScriptSlot>,
        map_vars: [i32; MAX_MAP_VARS],
        world_vars: [i32; MAX_WORLD_VARS],
        print: PrintBuffer,
        requests: ScriptRequests,
        host: RecordingHost,
    }

    impl Rig {
        fn new(b: &ImageBuilder) -> Self {
            let image = BytecodeImage::parse(&b.build()).unwrap();
            let slots = image.entrypoints().iter().map(ScriptSlot::new).collect();
            Self {
                image,
                slots,
                map_vars: [0; MAX_MAP_VARS],
                world_vars: [0; MAX_WORLD_VARS],
                print: PrintBuffer::default(),
                requests: ScriptRequests::new(),
                host: RecordingHost::new(),
            }
        }

        fn instance(&self) -> ScriptInstance {
            ScriptInstance::new(InstanceId(1), 0, &self.image.entrypoints()[0])
        }

        fn run(&mut self, inst: &mut ScriptInstance) -> ExecOutcome {
            let mut env = ExecEnv {
                image: &self.image,
                slots: &mut self.slots,
                map_vars: &mut self.map_vars,
                world_vars: &mut self.world_vars,
                print: &mut self.print,
                requests: &mut self.requests,
                host: &mut self.host,
            };
            inst.run_quantum(&mut env, None)
        }
    }

    #[test]
    fn arithmetic_pops_second_operand_first() {
        let mut b = ImageBuilder::new();
        b.script(1, 0)
            .op(Opcode::PushNumber, &[10])
            .op(Opcode::PushNumber, &[3])
            .op(Opcode::Subtract, &[])
            .op(Opcode::PushNumber, &[7])
            .op(Opcode::PushNumber, &[2])
            .op(Opcode::Modulus, &[])
            .op(Opcode::PushNumber, &[-9])
            .op(Opcode::PushNumber, &[0])
            .op(Opcode::Divide, &[])
            .op(Opcode::PushNumber, &[1])
            .op(Opcode::PushNumber, &[4])
            .op(Opcode::LShift, &[])
            .op(Opcode::PushNumber, &[-16])
            .op(Opcode::PushNumber, &[2])
            .op(Opcode::RShift, &[])
            .op(Opcode::Suspend, &[]);
        let mut rig = Rig::new(&b);
        let mut inst = rig.instance();

        assert_eq!(rig.run(&mut inst), ExecOutcome::Stop);
        assert_eq!(inst.stack().as_slice(), &[7, 1, 0, 16, -4]);
        assert_eq!(rig.slots[0].state, ScriptState::Suspended);
    }

    #[test]
    fn variable_scopes() {
        let mut b = ImageBuilder::new();
        b.script(1, 0)
            .op(Opcode::PushNumber, &[5])
            .op(Opcode::AssignScriptVar, &[2])
            .op(Opcode::PushNumber, &[6])
            .op(Opcode::AssignMapVar, &[31])
            .op(Opcode::IncWorldVar, &[63])
            .op(Opcode::IncWorldVar, &[63])
            .op(Opcode::PushNumber, &[4])
            .op(Opcode::MulScriptVar, &[2])
            .op(Opcode::PushNumber, &[4])
            .op(Opcode::SubMapVar, &[31])
            .op(Opcode::DecMapVar, &[31])
            .op(Opcode::PushScriptVar, &[2])
            .op(Opcode::PushNumber, &[3])
            .op(Opcode::ModScriptVar, &[2])
            .op(Opcode::PushScriptVar, &[2])
            .op(Opcode::Terminate, &[]);
        let mut rig = Rig::new(&b);
        let mut inst = rig.instance();

        assert_eq!(rig.run(&mut inst), ExecOutcome::Terminate);
        assert_eq!(inst.vars()[2], 2);
        assert_eq!(rig.map_vars[31], 1);
        assert_eq!(rig.world_vars[63], 2);
        assert_eq!(inst.stack().as_slice(), &[20, 2]);
    }

    #[test]
    fn case_goto_keeps_value_on_mismatch() {
        let mut b = ImageBuilder::new();
        b.script(1, 0).op(Opcode::PushNumber, &[2]);
        let miss = b.jump(Opcode::CaseGoto, &[1]);
        let hit = b.jump(Opcode::CaseGoto, &[2]);
        b.op(Opcode::Terminate, &[]);
        b.bind(miss);
        b.op(Opcode::PushNumber, &[100]).op(Opcode::Terminate, &[]);
        b.bind(hit);
        b.op(Opcode::PushNumber, &[200]).op(Opcode::Suspend, &[]);
        let mut rig = Rig::new(&b);
        let mut inst = rig.instance();

        assert_eq!(rig.run(&mut inst), ExecOutcome::Stop);
        assert_eq!(inst.stack().as_slice(), &[200]);
    }

    #[test]
    fn random_stays_in_range() {
        let mut b = ImageBuilder::new();
        b.script(1, 0)
            .op(Opcode::PushNumber, &[3])
            .op(Opcode::PushNumber, &[5])
            .op(Opcode::Random, &[])
            .op(Opcode::RandomDirect, &[10, 10])
            .op(Opcode::Terminate, &[]);
        let mut rig = Rig::new(&b);
        rig.host.random_override = Some(200);
        let mut inst = rig.instance();

        rig.run(&mut inst);
        // 3 + 200 % 3, then a single-value range
        assert_eq!(inst.stack().as_slice(), &[5, 10]);
    }

    #[test]
    fn line_special_arguments_in_source_order() {
        let mut b = ImageBuilder::new();
        b.script(1, 0)
            .op(Opcode::PushNumber, &[1])
            .op(Opcode::PushNumber, &[2])
            .op(Opcode::PushNumber, &[300])
            .op(Opcode::LSpec3, &[12])
            .op(Opcode::LSpec2Direct, &[13, 7, 8])
            .op(Opcode::Terminate, &[]);
        let mut rig = Rig::new(&b);
        let mut inst = rig.instance();
        inst.bind(Some(ActorRef(4)), Some(LineRef(9)), 1);

        rig.run(&mut inst);
        assert_eq!(
            rig.host.calls,
            vec![
                HostCall::LineSpecial(LineSpecialCall {
                    special: 12,
                    args: [1, 2, 44, 0, 0],
                    line: Some(LineRef(9)),
                    side: 1,
                    activator: Some(ActorRef(4)),
                }),
                HostCall::LineSpecial(LineSpecialCall {
                    special: 13,
                    args: [7, 8, 0, 0, 0],
                    line: Some(LineRef(9)),
                    side: 1,
                    activator: Some(ActorRef(4)),
                }),
            ]
        );
        assert!(inst.stack().is_empty());
    }

    #[test]
    fn invalid_opcode_terminates() {
        let mut b = ImageBuilder::new();
        b.script(1, 0).op(Opcode::PushNumber, &[1]).raw(&[999]);
        let mut rig = Rig::new(&b);
        let mut inst = rig.instance();
        assert_eq!(rig.run(&mut inst), ExecOutcome::Terminate);
    }

    #[test]
    fn out_of_range_variable_terminates() {
        for (op, index) in [
            (Opcode::PushScriptVar, -1),
            (Opcode::IncMapVar, MAX_MAP_VARS as i32),
            (Opcode::DecWorldVar, i32::MAX),
        ] {
            let mut b = ImageBuilder::new();
            b.script(1, 0).op(Opcode::IncMapVar, &[0]).op(op, &[index]).op(Opcode::IncMapVar, &[0]).op(Opcode::Terminate, &[]);
            let mut rig = Rig::new(&b);
            let mut inst = rig.instance();

            assert_eq!(rig.run(&mut inst), ExecOutcome::Terminate, "{op}");
            assert_eq!(rig.map_vars[0], 1, "{op}");
        }
    }

    #[test]
    fn budget_yields_without_losing_place() {
        let mut b = ImageBuilder::new();
        b.script(1, 0);
        let top = b.here();
        b.op(Opcode::IncScriptVar, &[0]).op(Opcode::Goto, &[top]);
        let mut rig = Rig::new(&b);
        let mut inst = rig.instance();

        let mut env = ExecEnv {
            image: &rig.image,
            slots: &mut rig.slots,
            map_vars: &mut rig.map_vars,
            world_vars: &mut rig.world_vars,
            print: &mut rig.print,
            requests: &mut rig.requests,
            host: &mut rig.host,
        };
        assert_eq!(inst.run_quantum(&mut env, Some(10)), ExecOutcome::Stop);
        assert_eq!(inst.vars()[0], 5);
        assert_eq!(inst.pc(), top as u32);
    }
}
