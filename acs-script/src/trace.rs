use std::env;
use std::fmt;
use std::sync::OnceLock;

/// Trace categories, enabled via environment variables.
///
/// Supported:
/// - ACS_TRACE="vm,special,sched" (comma/space separated; "all" enables all)
/// - ACS_TRACE_VM=1, ACS_TRACE_SPECIAL=1, ACS_TRACE_SCHED=1
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TraceKind {
    /// Every dispatched instruction.
    Vm,
    /// Line specials and world edits issued by scripts.
    Special,
    /// Script state transitions.
    Sched,
}

const M_VM: u32 = 1 << 0;
const M_SPECIAL: u32 = 1 << 1;
const M_SCHED: u32 = 1 << 2;

fn parse_bool_env(name: &str) -> bool {
    match env::var(name) {
        Ok(v) => {
            let s = v.trim().to_ascii_lowercase();
            !(s.is_empty() || s == "0" || s == "false" || s == "no" || s == "off")
        }
        Err(_) => false,
    }
}

fn parse_mask(s: &str) -> u32 {
    let mut mask = 0u32;
    for raw in s.split(|c: char| c == ',' || c == ';' || c.is_whitespace()) {
        match raw.trim().to_ascii_lowercase().as_str() {
            "all" => mask |= M_VM | M_SPECIAL | M_SCHED,
            "vm" => mask |= M_VM,
            "special" | "spec" => mask |= M_SPECIAL,
            "sched" | "state" => mask |= M_SCHED,
            _ => {}
        }
    }
    mask
}

fn build_mask() -> u32 {
    let mut mask = env::var("ACS_TRACE").map(|l| parse_mask(&l)).unwrap_or(0);
    if parse_bool_env("ACS_TRACE_VM") {
        mask |= M_VM;
    }
    if parse_bool_env("ACS_TRACE_SPECIAL") {
        mask |= M_SPECIAL;
    }
    if parse_bool_env("ACS_TRACE_SCHED") {
        mask |= M_SCHED;
    }
    mask
}

fn mask() -> u32 {
    static MASK: OnceLock<u32> = OnceLock::new();
    *MASK.get_or_init(build_mask)
}

fn bit(kind: TraceKind) -> u32 {
    match kind {
        TraceKind::Vm => M_VM,
        TraceKind::Special => M_SPECIAL,
        TraceKind::Sched => M_SCHED,
    }
}

#[inline]
pub fn enabled(kind: TraceKind) -> bool {
    mask() & bit(kind) != 0
}

pub fn vm(args: fmt::Arguments) {
    if enabled(TraceKind::Vm) {
        log::info!("[acs:vm] {}", args);
    }
}

pub fn special(args: fmt::Arguments) {
    if enabled(TraceKind::Special) {
        log::info!("[acs:special] {}", args);
    }
}

pub fn sched(args: fmt::Arguments) {
    if enabled(TraceKind::Sched) {
        log::info!("[acs:sched] {}", args);
    }
}
