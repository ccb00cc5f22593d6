//! Final address resolution.
//!
//! Runs once, after generation: every `Target::Label` in the code and every
//! `Init::Label` in the data segment is replaced by the label's absolute
//! address. Any label that was referenced but never bound is fatal.

use log::debug;

use crate::asm::ir::{AsmProgram, Init};
use crate::asm::{LabelId, Target};
use crate::compile_error::CompileError;

fn address_of(program: &AsmProgram, id: LabelId) -> Result<u32, CompileError> {
    let label = program.label(id);
    label
        .addr
        .ok_or_else(|| CompileError::unresolved_label(&label.name))
}

/// Resolve every label reference in place.
pub fn link(mut program: AsmProgram) -> Result<AsmProgram, CompileError> {
    let mut patched = 0usize;

    for i in 0..program.code.len() {
        let id = match program.code[i].target() {
            Some(Target::Label(id)) => *id,
            _ => continue,
        };
        let addr = address_of(&program, id)?;
        if let Some(target) = program.code[i].target_mut() {
            *target = Target::Addr(addr);
        }
        patched += 1;
    }

    for i in 0..program.vars.len() {
        let id = match program.vars[i].init {
            Init::Label(id) => id,
            _ => continue,
        };
        program.vars[i].init = Init::Addr(address_of(&program, id)?);
        patched += 1;
    }

    debug!(
        "linked {} label references, code segment is {} bytes",
        patched,
        program.code_len()
    );
    Ok(program)
}

/// True when no label reference is left.
pub fn is_linked(program: &AsmProgram) -> bool {
    program
        .code
        .iter()
        .all(|i| !matches!(i.target(), Some(Target::Label(_))))
        && program
            .vars
            .iter()
            .all(|v| !matches!(v.init, Init::Label(_)))
}
