use std::collections::{BTreeMap, HashSet};
use std::fmt::Write;

use crate::asm::ir::{AsmProgram, Init};
use crate::asm::{Instr, Target};

/// Absolute addresses are always ten lowercase hex digits.
fn fmt_addr(addr: u32) -> String {
    format!("0x{:010x}", addr)
}

fn fmt_target(program: &AsmProgram, target: &Target) -> String {
    match target {
        Target::Addr(a) => fmt_addr(*a),
        // Only visible when rendering before the link pass.
        Target::Label(id) => format!("###{}###", program.label(*id).name),
    }
}

fn fmt_init(program: &AsmProgram, init: &Init) -> String {
    match init {
        Init::Null => "null".to_string(),
        Init::Literal(text) => text.clone(),
        Init::Addr(a) => fmt_addr(*a),
        Init::Label(id) => format!("###{}###", program.label(*id).name),
    }
}

/// Text of one instruction, without indentation. `None` for event heads.
pub fn fmt_instr(program: &AsmProgram, instr: &Instr) -> Option<String> {
    Some(match instr {
        Instr::Pop => "POP".to_string(),
        Instr::Copy => "COPY".to_string(),
        Instr::Push(var) => format!("PUSH, {}", var),
        Instr::PushAddr(a) => format!("PUSH, {}", fmt_addr(*a)),
        Instr::Jump(t) => format!("JUMP, {}", fmt_target(program, t)),
        Instr::JumpIfFalse(t) => format!("JUMP_IF_FALSE, {}", fmt_target(program, t)),
        Instr::JumpIndirect(var) => format!("JUMP_INDIRECT, {}", var),
        Instr::Extern { symbol, .. } => format!("EXTERN, \"{}\"", symbol),
        Instr::EventHead(_) => return None,
    })
}

/// `.data_start` … `.data_end`
pub fn data_segment(program: &AsmProgram) -> String {
    let mut out = String::from(".data_start\n\n");
    for name in &program.exports {
        let _ = writeln!(out, "    .export {}", name);
    }
    for var in &program.vars {
        let _ = writeln!(
            out,
            "        {}: %{}, {}",
            var.name,
            var.vm_type,
            fmt_init(program, &var.init)
        );
    }
    out.push_str("\n.data_end\n\n");
    out
}

/// `.code_start` … `.code_end`
pub fn code_segment(program: &AsmProgram) -> String {
    let mut out = String::from(".code_start\n\n");
    for event in &program.events {
        let _ = writeln!(out, "    .export {}", event);
    }
    for instr in &program.code {
        match instr {
            Instr::EventHead(name) => {
                let _ = writeln!(out, "    {}:", name);
            }
            other => {
                if let Some(text) = fmt_instr(program, other) {
                    let _ = writeln!(out, "        {}", text);
                }
            }
        }
    }
    out.push_str("\n.code_end\n");
    out
}

/// The complete assembly document.
pub fn render(program: &AsmProgram) -> String {
    let mut out = data_segment(program);
    out.push_str(&code_segment(program));
    out
}

/// Address listing for debugging: every instruction with its byte address,
/// bound labels above the instruction they point at, and a marker on jump
/// targets.
pub fn listing(program: &AsmProgram) -> String {
    let addrs = program.addresses();

    let mut labels_at: BTreeMap<u32, Vec<&str>> = BTreeMap::new();
    for label in &program.labels {
        if let Some(a) = label.addr {
            labels_at.entry(a).or_default().push(&label.name);
        }
    }

    let jump_targets = collect_jump_targets(program);

    let mut out = String::new();
    for (instr, &addr) in program.code.iter().zip(&addrs) {
        if let Instr::EventHead(name) = instr {
            let _ = writeln!(out, "{}:", name);
            continue;
        }
        if let Some(names) = labels_at.remove(&addr) {
            for name in names {
                let _ = writeln!(out, "  {}:", name);
            }
        }
        let marker = if jump_targets.contains(&addr) { "►" } else { " " };
        let text = fmt_instr(program, instr).unwrap_or_default();
        let _ = writeln!(out, "{} {} {}", fmt_addr(addr), marker, text);
    }
    out
}

fn collect_jump_targets(program: &AsmProgram) -> HashSet<u32> {
    program
        .code
        .iter()
        .filter_map(|op| match op.target() {
            Some(Target::Addr(a)) => Some(*a),
            Some(Target::Label(id)) => program.label(*id).addr,
            None => None,
        })
        .collect()
}
