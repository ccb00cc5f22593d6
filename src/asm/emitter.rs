//! Append-only instruction buffer with a byte-accurate program counter.
//!
//! The emitter knows nothing about types or scopes. It exposes the VM
//! primitives, the label table, and the two halves of the call convention;
//! the lowering engine decides what to feed it.

use std::collections::HashMap;

use log::trace;

use crate::asm::ir::Label;
use crate::asm::{Instr, LabelId, Target};
use crate::compile_error::CompileError;

/// Jump target that halts the VM; events end by jumping here.
pub const HALT_ADDRESS: u32 = 0xFF_FFFF;

/// Where a call's result goes once control is back at the call site.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResultSlot<'a> {
    /// The callee leaves nothing behind.
    None,
    /// Pop the result into this variable.
    Into(&'a str),
    /// Drop the result with `POP`.
    Discard,
}

/// Everything pushed before the jump into a user function.
#[derive(Debug, Clone, Copy)]
pub struct CallFrame<'a> {
    /// The caller's own return-address slot.
    pub ret_addr: &'a str,
    /// The caller's live parameters.
    pub env: &'a [String],
    /// Constant holding the address to come back to.
    pub ret_const: &'a str,
    pub args: &'a [String],
    pub entry: LabelId,
    /// Bound right after the jump; `ret_const` points here.
    pub ret_label: LabelId,
}

#[derive(Debug, Default)]
pub struct Emitter {
    code: Vec<Instr>,
    pc: u32,
    labels: Vec<Label>,
    named: HashMap<String, LabelId>,
    events: Vec<String>,
    counter: usize,
}

impl Emitter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Address the next instruction will land at.
    pub fn pc(&self) -> u32 {
        self.pc
    }

    pub fn code(&self) -> &[Instr] {
        &self.code
    }

    /// Unique name `__{n}_{kind}`; the counter is shared by temporaries and
    /// labels so every generated name is distinct. The segment after `__`
    /// starts with a digit, so no qualified source identifier can match it.
    pub fn next_id(&mut self, kind: &str) -> String {
        let id = format!("__{}_{}", self.counter, kind);
        self.counter += 1;
        id
    }

    fn add(&mut self, instr: Instr) {
        trace!("{:#010x}: {:?}", self.pc, instr);
        self.pc += instr.width();
        self.code.push(instr);
    }

    // =========================================================================
    // Labels
    // =========================================================================

    /// A new anonymous label, e.g. `__4_else_label`.
    pub fn fresh_label(&mut self, kind: &str) -> LabelId {
        let name = self.next_id(kind);
        self.push_label(name)
    }

    /// The label registered under `name`, created on first use.
    pub fn named_label(&mut self, name: &str) -> LabelId {
        if let Some(id) = self.named.get(name) {
            return *id;
        }
        let id = self.push_label(name.to_string());
        self.named.insert(name.to_string(), id);
        id
    }

    fn push_label(&mut self, name: String) -> LabelId {
        let id = LabelId(self.labels.len());
        self.labels.push(Label { name, addr: None });
        id
    }

    /// Bind `id` to the current program counter.
    pub fn bind(&mut self, id: LabelId) -> Result<(), CompileError> {
        let pc = self.pc;
        let label = &mut self.labels[id.0];
        if label.addr.is_some() {
            return Err(CompileError::declaration(&label.name, "label is bound twice"));
        }
        trace!("{:#010x}: {}:", pc, label.name);
        label.addr = Some(pc);
        Ok(())
    }

    // =========================================================================
    // Events
    // =========================================================================

    pub fn add_event(&mut self, name: &str) {
        self.events.push(name.to_string());
    }

    pub fn event_head(&mut self, name: &str) {
        self.add(Instr::EventHead(name.to_string()));
    }

    /// Terminate an event body.
    pub fn end(&mut self) {
        self.jump_addr(HALT_ADDRESS);
    }

    // =========================================================================
    // Primitives
    // =========================================================================

    /// Discard the top of the stack.
    pub fn remove_top(&mut self) {
        self.add(Instr::Pop);
    }

    pub fn copy(&mut self) {
        self.add(Instr::Copy);
    }

    pub fn push_var(&mut self, name: &str) {
        self.add(Instr::Push(name.to_string()));
    }

    pub fn push_vars(&mut self, names: &[String]) {
        for name in names {
            self.push_var(name);
        }
    }

    pub fn push_addr(&mut self, addr: u32) {
        self.add(Instr::PushAddr(addr));
    }

    pub fn jump(&mut self, label: LabelId) {
        self.add(Instr::Jump(Target::Label(label)));
    }

    pub fn jump_addr(&mut self, addr: u32) {
        self.add(Instr::Jump(Target::Addr(addr)));
    }

    /// Push `cond` and branch to `label` when it is false.
    pub fn jump_if_false(&mut self, cond: &str, label: LabelId) {
        self.push_var(cond);
        self.add(Instr::JumpIfFalse(Target::Label(label)));
    }

    pub fn jump_indirect(&mut self, var: &str) {
        self.add(Instr::JumpIndirect(var.to_string()));
    }

    /// Push every operand (inputs, then the output slot) and call `symbol`.
    pub fn call_extern(&mut self, symbol: &str, operands: &[String]) {
        self.push_vars(operands);
        self.add(Instr::Extern {
            symbol: symbol.to_string(),
            arity: operands.len(),
        });
    }

    /// `dst = src`
    pub fn assign(&mut self, dst: &str, src: &str) {
        self.push_var(src);
        self.push_var(dst);
        self.copy();
    }

    /// Move the value on top of the stack into `var`.
    ///
    /// The VM has no store instruction: the destination is pushed and `COPY`
    /// takes the value beneath it.
    pub fn pop_into(&mut self, var: &str) {
        self.push_var(var);
        self.copy();
    }

    /// Pop into each of `vars`, last one first.
    pub fn pop_into_all(&mut self, vars: &[String]) {
        for var in vars.iter().rev() {
            self.pop_into(var);
        }
    }

    // =========================================================================
    // Call convention
    // =========================================================================

    /// Caller side, before the jump: save the return address and the
    /// environment, push the return constant and the arguments, jump.
    pub fn call_enter(&mut self, frame: &CallFrame<'_>) -> Result<(), CompileError> {
        self.push_var(frame.ret_addr);
        self.push_vars(frame.env);
        self.push_var(frame.ret_const);
        self.push_vars(frame.args);
        self.jump(frame.entry);
        self.bind(frame.ret_label)
    }

    /// Caller side, after the callee returned: collect the result, restore
    /// the environment in reverse order, restore the return address.
    pub fn call_leave(&mut self, result: ResultSlot<'_>, env: &[String], ret_addr: &str) {
        match result {
            ResultSlot::None => {}
            ResultSlot::Into(var) => self.pop_into(var),
            ResultSlot::Discard => self.remove_top(),
        }
        self.pop_into_all(env);
        self.pop_into(ret_addr);
    }

    /// Callee side: leave through the return address, optionally pushing a
    /// result first.
    pub fn ret(&mut self, ret_addr: &str, value: Option<&str>) {
        self.pop_into(ret_addr);
        self.leave(ret_addr, value);
    }

    /// Second half of [`Emitter::ret`], for when the return address was
    /// already popped and the value computed afterwards.
    pub fn leave(&mut self, ret_addr: &str, value: Option<&str>) {
        if let Some(value) = value {
            self.push_var(value);
        }
        self.jump_indirect(ret_addr);
    }

    /// Hand over the buffers: (code, labels, events).
    pub fn finish(self) -> (Vec<Instr>, Vec<Label>, Vec<String>) {
        (self.code, self.labels, self.events)
    }
}
