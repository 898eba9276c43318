//! Everything a script can reach outside the interpreter.
//!
//! The game implements [`WorldHost`]; the interpreter never holds references
//! into the world, only the integer handles defined here.

mod request;

pub use request::{ScriptRequest, ScriptRequests};

use serde::{Deserialize, Serialize};

/// Stable handle of a map object (the activator of a script).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ActorRef(pub u32);

/// Stable handle of a line definition.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct LineRef(pub u32);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SectorRef(pub u32);

/// Host-resolved material (flat or wall texture).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MaterialId(pub u32);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MaterialKind {
    Flat,
    Texture,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Plane {
    Floor,
    Ceiling,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TexturePosition {
    Top,
    Middle,
    Bottom,
}

impl TexturePosition {
    pub fn from_raw(v: i32) -> Option<Self> {
        match v {
            0 => Some(Self::Top),
            1 => Some(Self::Middle),
            2 => Some(Self::Bottom),
            _ => None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GameType {
    SinglePlayer = 0,
    Cooperative = 1,
    Deathmatch = 2,
}

/// Where a started sound is emitted from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SoundOrigin {
    /// Global, no position.
    None,
    /// The front sector of a line.
    LineFrontSector(LineRef),
    Actor(ActorRef),
}

/// A line special invocation issued by a script.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineSpecialCall {
    pub special: i32,
    pub args: [u8; 5],
    pub line: Option<LineRef>,
    pub side: u8,
    pub activator: Option<ActorRef>,
}

/// Game world seen from the script interpreter.
///
/// Query methods take `&self`; anything that changes the world takes
/// `&mut self`. The interpreter does its own iteration over tagged
/// sectors/lines/things, so the host only needs to enumerate them.
pub trait WorldHost {
    /// Run a line special. Specials that start, suspend or terminate scripts
    /// must queue a [`ScriptRequest`] instead of calling back into the
    /// interpreter. Returns whether the special did anything.
    fn execute_line_special(&mut self, call: &LineSpecialCall, requests: &mut ScriptRequests) -> bool;

    /// A mover is still running on sectors with this tag.
    fn tag_busy(&self, tag: i32) -> bool;

    /// The polyobject is still moving.
    fn polyobj_busy(&self, po: i32) -> bool;

    fn sectors_with_tag(&self, tag: i32) -> Vec<SectorRef>;

    fn lines_with_tag(&self, tag: i32) -> Vec<LineRef>;

    fn actors_with_tid(&self, tid: i32) -> Vec<ActorRef>;

    /// Look a material up by name; `None` if the name is unknown.
    fn resolve_material(&self, kind: MaterialKind, name: &str) -> Option<MaterialId>;

    fn set_sector_material(&mut self, sector: SectorRef, plane: Plane, material: MaterialId);

    fn set_line_texture(&mut self, line: LineRef, side: u8, position: TexturePosition, material: MaterialId);

    fn set_line_blocking(&mut self, line: LineRef, blocking: bool);

    fn set_line_special(&mut self, line: LineRef, special: i32, args: [u8; 5]);

    fn clear_line_special(&mut self, line: LineRef);

    fn start_sound(&mut self, origin: SoundOrigin, name: &str, volume: i32);

    fn start_sound_sequence(&mut self, origin: SoundOrigin, name: &str);

    fn set_message(&mut self, player: usize, text: &str);

    /// Bold message, drawn in yellow.
    fn set_yellow_message(&mut self, player: usize, text: &str);

    /// Player number controlling this actor, if it is a player.
    fn player_of(&self, actor: ActorRef) -> Option<usize>;

    fn console_player(&self) -> usize;

    fn players_in_game(&self) -> Vec<usize>;

    /// One byte from the game's deterministic random table.
    fn random(&mut self) -> u8;

    fn thing_count(&self, thing_type: i32, tid: i32) -> i32;

    fn game_type(&self) -> GameType;

    fn game_skill(&self) -> i32;

    /// Tics since the level started.
    fn level_time(&self) -> i32;
}
