use serde::{Deserialize, Serialize};

// =============================================================================
// INSTR - VM assembly instructions
// =============================================================================

/// Handle into the emitter's label table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LabelId(pub usize);

/// Jump destination: either final, or waiting for the link pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Target {
    Addr(u32),
    Label(LabelId),
}

/// Encoded width of the push/jump family.
pub const WIDE: u32 = 5;
/// Encoded width of single-byte instructions.
pub const NARROW: u32 = 1;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Instr {
    /// Discard the top of the stack.
    Pop,

    /// Pop destination and source addresses, copy source into destination.
    Copy,

    /// Push the address of a named variable.
    Push(String),

    /// Push a raw constant address.
    PushAddr(u32),

    // ==========================================================================
    // Control flow
    // ==========================================================================
    /// Unconditional absolute jump.
    Jump(Target),

    /// Pop a boolean; jump when it is false.
    JumpIfFalse(Target),

    /// Jump to the address stored in the named variable.
    JumpIndirect(String),

    /// Call a host operation. It consumes `arity` stacked operands
    /// (inputs followed by the output slot, if any).
    Extern { symbol: String, arity: usize },

    /// Entry point marker of a lifecycle event. Occupies no bytes.
    EventHead(String),
}

impl Instr {
    /// Encoded size in bytes; the program counter advances by this much.
    pub fn width(&self) -> u32 {
        match self {
            Instr::Pop | Instr::Copy => NARROW,
            Instr::Push(_)
            | Instr::PushAddr(_)
            | Instr::Jump(_)
            | Instr::JumpIfFalse(_)
            | Instr::JumpIndirect(_)
            | Instr::Extern { .. } => WIDE,
            Instr::EventHead(_) => 0,
        }
    }

    /// Returns (pops, pushes).
    pub fn stack_effect(&self) -> (usize, usize) {
        match self {
            Instr::Push(_) | Instr::PushAddr(_) => (0, 1),
            Instr::Pop => (1, 0),
            Instr::Copy => (2, 0),
            Instr::JumpIfFalse(_) => (1, 0),
            Instr::Extern { arity, .. } => (*arity, 0),
            Instr::Jump(_) | Instr::JumpIndirect(_) | Instr::EventHead(_) => (0, 0),
        }
    }

    /// Jump destination, if this instruction has one.
    pub fn target(&self) -> Option<&Target> {
        match self {
            Instr::Jump(t) | Instr::JumpIfFalse(t) => Some(t),
            _ => None,
        }
    }

    pub fn target_mut(&mut self) -> Option<&mut Target> {
        match self {
            Instr::Jump(t) | Instr::JumpIfFalse(t) => Some(t),
            _ => None,
        }
    }
}

/// Net stack change of a straight-line run of instructions.
pub fn net_effect(code: &[Instr]) -> isize {
    code.iter()
        .map(|i| {
            let (pops, pushes) = i.stack_effect();
            pushes as isize - pops as isize
        })
        .sum()
}
