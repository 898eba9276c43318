//! Developer-facing utilities for the ACS interpreter.
//!
//! This is intentionally a module (not `#[cfg(test)]`) so it can be reused
//! from integration tests and other workspace crates: an in-memory bytecode
//! assembler and a host that records what scripts did to the world.

use std::collections::{HashMap, HashSet};

use byteorder::{ByteOrder, LittleEndian};
use encoding_rs::WINDOWS_1252;
use rand::{rngs::SmallRng, Rng, SeedableRng};

use crate::format::{ACS_MARKER, ENTRY_RECORD_SIZE, HEADER_SIZE, OPEN_SCRIPTS_BASE};
use crate::host::{
    ActorRef, GameType, LineRef, LineSpecialCall, MaterialId, MaterialKind, Plane, ScriptRequests, SectorRef,
    SoundOrigin, TexturePosition, WorldHost,
};
use crate::vm::Opcode;

/// Patch location of a forward jump target.
#[derive(Clone, Copy, Debug)]
pub struct Fixup(usize);

/// Assembles compiled script lumps in memory.
pub struct ImageBuilder {
    code: Vec<u8>,
    scripts: Vec<(i32, i32, i32)>,
    strings: Vec<String>,
}

impl Default for ImageBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ImageBuilder {
    pub fn new() -> Self {
        Self { code: vec![0; HEADER_SIZE], scripts: Vec::new(), strings: Vec::new() }
    }

    /// Begin a closed script at the current position.
    pub fn script(&mut self, number: i32, arg_count: i32) -> &mut Self {
        let here = self.here();
        self.scripts.push((number, here, arg_count));
        self
    }

    pub fn open_script(&mut self, number: i32) -> &mut Self {
        let here = self.here();
        self.scripts.push((number + OPEN_SCRIPTS_BASE, here, 0));
        self
    }

    pub fn op(&mut self, op: Opcode, operands: &[i32]) -> &mut Self {
        debug_assert_eq!(op.immediates(), operands.len(), "{} operands", op);
        self.raw(&[op as i32]).raw(operands)
    }

    /// Emit raw words.
    pub fn raw(&mut self, words: &[i32]) -> &mut Self {
        for w in words {
            let mut buf = [0u8; 4];
            LittleEndian::write_i32(&mut buf, *w);
            self.code.extend_from_slice(&buf);
        }
        self
    }

    /// Offset the next instruction will be placed at.
    pub fn here(&self) -> i32 {
        self.code.len() as i32
    }

    /// Emit a jump whose target is not known yet; the target is the last
    /// operand and is filled in by [`ImageBuilder::bind`].
    pub fn jump(&mut self, op: Opcode, leading: &[i32]) -> Fixup {
        debug_assert_eq!(op.immediates(), leading.len() + 1);
        self.raw(&[op as i32]).raw(leading);
        let at = self.code.len();
        self.raw(&[0]);
        Fixup(at)
    }

    pub fn bind(&mut self, fixup: Fixup) {
        let target = self.here();
        LittleEndian::write_i32(&mut self.code[fixup.0..fixup.0 + 4], target);
    }

    /// Add a string constant and return its index.
    pub fn string(&mut self, s: &str) -> i32 {
        self.strings.push(s.to_string());
        self.strings.len() as i32 - 1
    }

    pub fn build(&self) -> Vec<u8> {
        let mut out = self.code.clone();
        let info_offset = out.len();
        let info_len = 4 + self.scripts.len() * ENTRY_RECORD_SIZE + 4 + self.strings.len() * 4;

        let encoded: Vec<Vec<u8>> = self
            .strings
            .iter()
            .map(|s| {
                let (bytes, _, _) = WINDOWS_1252.encode(s);
                bytes.into_owned()
            })
            .collect();

        let mut words = vec![self.scripts.len() as i32];
        for (number, offset, argc) in &self.scripts {
            words.extend([*number, *offset, *argc]);
        }
        words.push(self.strings.len() as i32);
        let mut string_at = info_offset + info_len;
        for s in &encoded {
            words.push(string_at as i32);
            string_at += s.len() + 1;
        }

        for w in words {
            let mut buf = [0u8; 4];
            LittleEndian::write_i32(&mut buf, w);
            out.extend_from_slice(&buf);
        }
        for s in &encoded {
            out.extend_from_slice(s);
            out.push(0);
        }

        LittleEndian::write_u32(&mut out[0..4], ACS_MARKER);
        LittleEndian::write_i32(&mut out[4..8], info_offset as i32);
        LittleEndian::write_i32(&mut out[8..12], HEADER_SIZE as i32);
        out
    }
}

/// Observable effect of a script on the world.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum HostCall {
    LineSpecial(LineSpecialCall),
    SectorMaterial { sector: SectorRef, plane: Plane, material: MaterialId },
    LineTexture { line: LineRef, side: u8, position: TexturePosition, material: MaterialId },
    LineBlocking { line: LineRef, blocking: bool },
    SetLineSpecial { line: LineRef, special: i32, args: [u8; 5] },
    ClearLineSpecial(LineRef),
    Sound { origin: SoundOrigin, name: String, volume: i32 },
    SoundSequence { origin: SoundOrigin, name: String },
    Message { player: usize, text: String, yellow: bool },
}

/// Line specials the recording host understands itself.
pub const ACS_EXECUTE: i32 = 80;
pub const ACS_SUSPEND: i32 = 81;
pub const ACS_TERMINATE: i32 = 82;

/// A scriptable world for tests: lookups come from the public maps, every
/// side effect is appended to `calls`.
pub struct RecordingHost {
    pub calls: Vec<HostCall>,
    pub busy_tags: HashSet<i32>,
    pub busy_polyobjs: HashSet<i32>,
    pub sector_tags: HashMap<i32, Vec<SectorRef>>,
    pub line_tags: HashMap<i32, Vec<LineRef>>,
    pub tids: HashMap<i32, Vec<ActorRef>>,
    pub materials: HashMap<String, MaterialId>,
    pub players: Vec<usize>,
    pub player_actors: HashMap<ActorRef, usize>,
    pub console_player: usize,
    pub game_type: GameType,
    pub skill: i32,
    pub level_time: i32,
    pub thing_counts: HashMap<(i32, i32), i32>,
    /// Returned by `random()` instead of the generator when set.
    pub random_override: Option<u8>,
    rng: SmallRng,
}

impl Default for RecordingHost {
    fn default() -> Self {
        Self::new()
    }
}

impl RecordingHost {
    pub fn new() -> Self {
        Self {
            calls: Vec::new(),
            busy_tags: HashSet::new(),
            busy_polyobjs: HashSet::new(),
            sector_tags: HashMap::new(),
            line_tags: HashMap::new(),
            tids: HashMap::new(),
            materials: HashMap::new(),
            players: vec![0],
            player_actors: HashMap::new(),
            console_player: 0,
            game_type: GameType::SinglePlayer,
            skill: 2,
            level_time: 0,
            thing_counts: HashMap::new(),
            random_override: None,
            rng: SmallRng::seed_from_u64(0xAC5),
        }
    }

    pub fn with_material(mut self, name: &str, id: u32) -> Self {
        self.materials.insert(name.to_string(), MaterialId(id));
        self
    }

    pub fn messages(&self) -> Vec<(usize, &str, bool)> {
        self.calls
            .iter()
            .filter_map(|c| match c {
                HostCall::Message { player, text, yellow } => Some((*player, text.as_str(), *yellow)),
                _ => None,
            })
            .collect()
    }
}

impl WorldHost for RecordingHost {
    fn execute_line_special(&mut self, call: &LineSpecialCall, requests: &mut ScriptRequests) -> bool {
        self.calls.push(HostCall::LineSpecial(call.clone()));
        let script = i32::from(call.args[0]);
        match call.special {
            ACS_EXECUTE => {
                requests.start(script, u32::from(call.args[1]), &call.args[2..], call.activator, call.line, call.side);
                true
            }
            ACS_SUSPEND => {
                requests.suspend(script);
                true
            }
            ACS_TERMINATE => {
                requests.terminate(script);
                true
            }
            _ => false,
        }
    }

    fn tag_busy(&self, tag: i32) -> bool {
        self.busy_tags.contains(&tag)
    }

    fn polyobj_busy(&self, po: i32) -> bool {
        self.busy_polyobjs.contains(&po)
    }

    fn sectors_with_tag(&self, tag: i32) -> Vec<SectorRef> {
        self.sector_tags.get(&tag).cloned().unwrap_or_default()
    }

    fn lines_with_tag(&self, tag: i32) -> Vec<LineRef> {
        self.line_tags.get(&tag).cloned().unwrap_or_default()
    }

    fn actors_with_tid(&self, tid: i32) -> Vec<ActorRef> {
        self.tids.get(&tid).cloned().unwrap_or_default()
    }

    fn resolve_material(&self, _kind: MaterialKind, name: &str) -> Option<MaterialId> {
        self.materials.get(name).copied()
    }

    fn set_sector_material(&mut self, sector: SectorRef, plane: Plane, material: MaterialId) {
        self.calls.push(HostCall::SectorMaterial { sector, plane, material });
    }

    fn set_line_texture(&mut self, line: LineRef, side: u8, position: TexturePosition, material: MaterialId) {
        self.calls.push(HostCall::LineTexture { line, side, position, material });
    }

    fn set_line_blocking(&mut self, line: LineRef, blocking: bool) {
        self.calls.push(HostCall::LineBlocking { line, blocking });
    }

    fn set_line_special(&mut self, line: LineRef, special: i32, args: [u8; 5]) {
        self.calls.push(HostCall::SetLineSpecial { line, special, args });
    }

    fn clear_line_special(&mut self, line: LineRef) {
        self.calls.push(HostCall::ClearLineSpecial(line));
    }

    fn start_sound(&mut self, origin: SoundOrigin, name: &str, volume: i32) {
        self.calls.push(HostCall::Sound { origin, name: name.to_string(), volume });
    }

    fn start_sound_sequence(&mut self, origin: SoundOrigin, name: &str) {
        self.calls.push(HostCall::SoundSequence { origin, name: name.to_string() });
    }

    fn set_message(&mut self, player: usize, text: &str) {
        self.calls.push(HostCall::Message { player, text: text.to_string(), yellow: false });
    }

    fn set_yellow_message(&mut self, player: usize, text: &str) {
        self.calls.push(HostCall::Message { player, text: text.to_string(), yellow: true });
    }

    fn player_of(&self, actor: ActorRef) -> Option<usize> {
        self.player_actors.get(&actor).copied()
    }

    fn console_player(&self) -> usize {
        self.console_player
    }

    fn players_in_game(&self) -> Vec<usize> {
        self.players.clone()
    }

    fn random(&mut self) -> u8 {
        match self.random_override {
            Some(v) => v,
            None => self.rng.gen(),
        }
    }

    fn thing_count(&self, thing_type: i32, tid: i32) -> i32 {
        self.thing_counts.get(&(thing_type, tid)).copied().unwrap_or(0)
    }

    fn game_type(&self) -> GameType {
        self.game_type
    }

    fn game_skill(&self) -> i32 {
        self.skill
    }

    fn level_time(&self) -> i32 {
        self.level_time
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::BytecodeImage;

    #[test]
    fn builder_output_parses() {
        let mut b = ImageBuilder::new();
        let s = b.string("hello");
        b.script(3, 1).op(Opcode::PushNumber, &[s]).op(Opcode::Terminate, &[]);
        let image = BytecodeImage::parse(&b.build()).unwrap();
        assert_eq!(image.entrypoints()[0].code_offset, HEADER_SIZE as u32);
        assert_eq!(image.string_constant(0), Some("hello"));
        assert_eq!(image.code_end(), HEADER_SIZE + 12);
    }

    #[test]
    fn seeded_random_is_repeatable() {
        let mut a = RecordingHost::new();
        let mut b = RecordingHost::new();
        let xs: Vec<u8> = (0..8).map(|_| a.random()).collect();
        let ys: Vec<u8> = (0..8).map(|_| b.random()).collect();
        assert_eq!(xs, ys);
    }
}
