use strum::{Display, EnumCount, FromRepr, IntoStaticStr};

/// ACS instruction set.
///
/// Discriminants are the opcode numbers stored in compiled lumps and must not
/// be reordered.
#[repr(u32)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Display, EnumCount, FromRepr, IntoStaticStr)]
pub enum Opcode {
    Nop = 0,
    Terminate,
    Suspend,
    PushNumber,
    LSpec1,
    LSpec2,
    LSpec3,
    LSpec4,
    LSpec5,
    LSpec1Direct,
    LSpec2Direct,
    LSpec3Direct,
    LSpec4Direct,
    LSpec5Direct,
    Add,
    Subtract,
    Multiply,
    Divide,
    Modulus,
    EQ,
    NE,
    LT,
    GT,
    LE,
    GE,
    AssignScriptVar,
    AssignMapVar,
    AssignWorldVar,
    PushScriptVar,
    PushMapVar,
    PushWorldVar,
    AddScriptVar,
    AddMapVar,
    AddWorldVar,
    SubScriptVar,
    SubMapVar,
    SubWorldVar,
    MulScriptVar,
    MulMapVar,
    MulWorldVar,
    DivScriptVar,
    DivMapVar,
    DivWorldVar,
    ModScriptVar,
    ModMapVar,
    ModWorldVar,
    IncScriptVar,
    IncMapVar,
    IncWorldVar,
    DecScriptVar,
    DecMapVar,
    DecWorldVar,
    Goto,
    IfGoto,
    Drop,
    Delay,
    DelayDirect,
    Random,
    RandomDirect,
    ThingCount,
    ThingCountDirect,
    TagWait,
    TagWaitDirect,
    PolyWait,
    PolyWaitDirect,
    ChangeFloor,
    ChangeFloorDirect,
    ChangeCeiling,
    ChangeCeilingDirect,
    Restart,
    AndLogical,
    OrLogical,
    AndBitwise,
    OrBitwise,
    EorBitwise,
    NegateLogical,
    LShift,
    RShift,
    UnaryMinus,
    IfNotGoto,
    LineSide,
    ScriptWait,
    ScriptWaitDirect,
    ClearLineSpecial,
    CaseGoto,
    BeginPrint,
    EndPrint,
    PrintString,
    PrintNumber,
    PrintCharacter,
    PlayerCount,
    GameType,
    GameSkill,
    Timer,
    SectorSound,
    AmbientSound,
    SoundSequence,
    SetLineTexture,
    SetLineBlocking,
    SetLineSpecial,
    ThingSound,
    EndPrintBold,
}

impl Opcode {
    #[inline]
    pub fn decode(raw: i32) -> Option<Self> {
        u32::try_from(raw).ok().and_then(Self::from_repr)
    }

    /// Number of inline operand words following the opcode.
    pub const fn immediates(self) -> usize {
        use Opcode::*;
        match self {
            PushNumber | LSpec1 | LSpec2 | LSpec3 | LSpec4 | LSpec5 => 1,
            LSpec1Direct => 2,
            LSpec2Direct => 3,
            LSpec3Direct => 4,
            LSpec4Direct => 5,
            LSpec5Direct => 6,
            AssignScriptVar | AssignMapVar | AssignWorldVar => 1,
            PushScriptVar | PushMapVar | PushWorldVar => 1,
            AddScriptVar | AddMapVar | AddWorldVar => 1,
            SubScriptVar | SubMapVar | SubWorldVar => 1,
            MulScriptVar | MulMapVar | MulWorldVar => 1,
            DivScriptVar | DivMapVar | DivWorldVar => 1,
            ModScriptVar | ModMapVar | ModWorldVar => 1,
            IncScriptVar | IncMapVar | IncWorldVar => 1,
            DecScriptVar | DecMapVar | DecWorldVar => 1,
            Goto | IfGoto | IfNotGoto => 1,
            DelayDirect | TagWaitDirect | PolyWaitDirect | ScriptWaitDirect => 1,
            RandomDirect | ThingCountDirect => 2,
            ChangeFloorDirect | ChangeCeilingDirect => 2,
            CaseGoto => 2,
            _ => 0,
        }
    }

    /// Operand index holding a jump target, if any.
    pub const fn jump_operand(self) -> Option<usize> {
        match self {
            Opcode::Goto | Opcode::IfGoto | Opcode::IfNotGoto => Some(0),
            Opcode::CaseGoto => Some(1),
            _ => None,
        }
    }

    /// Operand index holding a string constant index, if any.
    pub const fn string_operand(self) -> Option<usize> {
        match self {
            Opcode::ChangeFloorDirect | Opcode::ChangeCeilingDirect => Some(1),
            _ => None,
        }
    }
}
