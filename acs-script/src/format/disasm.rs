use serde::{Deserialize, Serialize};

use crate::vm::Opcode;

use super::image::BytecodeImage;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Inst {
    pub address: u32,
    pub mnemonic: String,
    pub operands: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScriptListing {
    pub number: i32,
    pub open: bool,
    pub arg_count: usize,
    pub address: u32,
    pub insts: Vec<Inst>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Listing {
    pub scripts: Vec<ScriptListing>,
    pub strings: Vec<String>,
}

/// Linear sweep of every entrypoint, from its first instruction up to the
/// next entrypoint's code (or the info block).
pub fn disassemble(image: &BytecodeImage) -> Listing {
    let mut starts: Vec<usize> = image.entrypoints().iter().map(|e| e.code_offset as usize).collect();
    starts.push(image.code_end());
    starts.sort_unstable();
    starts.dedup();

    let scripts = image
        .entrypoints()
        .iter()
        .map(|entry| {
            let begin = entry.code_offset as usize;
            let end = starts
                .iter()
                .copied()
                .find(|&s| s > begin)
                .unwrap_or(image.len())
                .min(image.len());
            ScriptListing {
                number: entry.number,
                open: entry.is_open,
                arg_count: entry.arg_count,
                address: entry.code_offset,
                insts: sweep(image, begin, end),
            }
        })
        .collect();

    Listing { scripts, strings: image.strings().to_vec() }
}

fn sweep(image: &BytecodeImage, begin: usize, end: usize) -> Vec<Inst> {
    let mut insts = Vec::new();
    let mut pc = begin;
    while pc + 4 <= end {
        let raw = image.word(pc as u32).unwrap_or_default();
        let op = Opcode::decode(raw).filter(|op| pc + 4 * (1 + op.immediates()) <= end);
        let Some(op) = op else {
            insts.push(Inst { address: pc as u32, mnemonic: "dd".to_string(), operands: vec![format!("0x{:08X}", raw)] });
            pc += 4;
            continue;
        };

        let operands = (0..op.immediates())
            .map(|i| {
                let v = image.word((pc + 4 * (1 + i)) as u32).unwrap_or_default();
                if op.jump_operand() == Some(i) {
                    format!("0x{:04X}", v)
                } else if op.string_operand() == Some(i) {
                    match image.string_constant(v) {
                        Some(s) => format!("{:?}", s),
                        None => format!("str#{}", v),
                    }
                } else {
                    v.to_string()
                }
            })
            .collect();

        insts.push(Inst { address: pc as u32, mnemonic: op.to_string(), operands });
        pc += 4 * (1 + op.immediates());
    }
    insts
}
