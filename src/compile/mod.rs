//! # AST Lowering
//!
//! Turns a [`Module`] into an [`AsmProgram`] in two passes:
//!
//! 1. **Declarations.** Every top-level `def` is visited once. Events (names
//!    with a leading `_`) are checked against the catalog's event table;
//!    plain functions go into the signature table so call sites can refer to
//!    functions defined further down.
//! 2. **Generation.** A recursive descent over the same statements that
//!    emits instructions through the [`Emitter`].
//!
//! The VM has no call stack, so user function calls follow the convention
//! implemented by [`Emitter::call_enter`] / [`Emitter::call_leave`]: the
//! caller saves its return address and parameters on the VM stack around the
//! jump, and the callee returns through `JUMP_INDIRECT ret_addr`.
//!
//! All state for one compile unit lives in [`Compiler`]; nothing is global.

mod call;
mod expr;
mod stmt;
pub mod symbols;

use std::collections::HashSet;

use log::debug;

use crate::asm::emitter::HALT_ADDRESS;
use crate::asm::ir::{AsmProgram, Init};
use crate::asm::{Emitter, link};
use crate::catalog::Catalog;
use crate::compile_error::{CompileError, Locate, SymbolKind};
use crate::lang::node::{FunctionDef, Stmt, StmtKind};
use crate::lang::program::Module;
use crate::lang::types::{Type, VOID_ANNOTATION, fmt_types};

use symbols::{SignatureTable, VarTable, function_id, qualify};

/// Return-address slot shared by every function.
pub const RET_ADDR: &str = "ret_addr";
/// The behaviour's own transform, initialized by the VM.
pub const THIS_TRANSFORM: &str = "this_trans";
/// The behaviour's own game object, initialized by the VM.
pub const THIS_GAME_OBJECT: &str = "this_gameObj";

/// What the generator is currently inside of.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Frame {
    Module,
    Event,
    Function { ret: Type },
}

/// The function or event being generated.
#[derive(Debug, Clone)]
struct Scope {
    frame: Frame,
    /// Qualifier of this scope's locals; empty at module level.
    prefix: String,
    /// Parameters to save around nested calls.
    env: Vec<String>,
}

impl Scope {
    fn module() -> Self {
        Self {
            frame: Frame::Module,
            prefix: String::new(),
            env: Vec::new(),
        }
    }

    fn event(name: &str) -> Self {
        Self {
            frame: Frame::Event,
            prefix: name.to_string(),
            env: Vec::new(),
        }
    }

    fn function(id: &str, ret: Type, params: Vec<String>) -> Self {
        Self {
            frame: Frame::Function { ret },
            prefix: id.to_string(),
            env: params,
        }
    }
}

/// Result of lowering an expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Operand {
    /// A variable (user variable or temporary) holding the value.
    Var(String),
    /// A type identifier used as a value, e.g. the `SystemInt32` in
    /// `x = SystemInt32`.
    TypeRef(Type),
    /// A call that produces nothing.
    Nothing,
}

/// Compiler context for one compile unit.
pub struct Compiler<'c> {
    catalog: &'c Catalog,
    vars: VarTable,
    funcs: SignatureTable,
    emitter: Emitter,
    scope: Scope,
}

impl<'c> Compiler<'c> {
    pub fn new(catalog: &'c Catalog) -> Self {
        Self {
            catalog,
            vars: VarTable::new(),
            funcs: SignatureTable::new(),
            emitter: Emitter::new(),
            scope: Scope::module(),
        }
    }

    /// Compile a whole module into a linked program.
    pub fn compile_module(mut self, module: &Module) -> Result<AsmProgram, CompileError> {
        self.declare_reserved()?;

        debug!("declaration pass over {} statements", module.body.len());
        self.declare_functions(&module.body)?;

        debug!("generation pass");
        for stmt in &module.body {
            self.gen_toplevel(stmt).at(stmt.pos)?;
        }

        self.finish()
    }

    fn finish(self) -> Result<AsmProgram, CompileError> {
        let (exports, vars) = self.vars.into_data_segment(self.catalog)?;
        let (code, labels, events) = self.emitter.finish();
        let program = AsmProgram {
            exports,
            vars,
            events,
            code,
            labels,
        };
        debug!(
            "{} variables, {} events, {} instructions",
            program.vars.len(),
            program.events.len(),
            program.code.len()
        );
        link::link(program)
    }

    fn declare_reserved(&mut self) -> Result<(), CompileError> {
        self.vars
            .declare(RET_ADDR, &Type::uint32(), Init::Addr(HALT_ADDRESS))?;
        for (name, ty) in [
            (THIS_TRANSFORM, "UnityEngineTransform"),
            (THIS_GAME_OBJECT, "UnityEngineGameObject"),
        ] {
            if self.catalog.is_type(ty) {
                self.vars
                    .declare(name, &Type::named(ty), Init::Literal("this".to_string()))?;
            }
        }
        Ok(())
    }

    // =========================================================================
    // Declaration pass
    // =========================================================================

    fn declare_functions(&mut self, body: &[Stmt]) -> Result<(), CompileError> {
        let mut events = HashSet::new();
        for stmt in body {
            let StmtKind::FunctionDef(def) = &stmt.kind else {
                continue;
            };
            if def.is_event() {
                if !events.insert(def.name.as_str()) {
                    return Err(CompileError::declaration(&def.name, "event is defined twice").at(stmt.pos));
                }
                self.declare_event(def).at(stmt.pos)?;
            } else {
                self.declare_function(def).at(stmt.pos)?;
            }
        }
        Ok(())
    }

    /// Resolve a type annotation. A missing annotation or `SystemVoid` is
    /// the void sentinel.
    fn annotation_type(&self, annotation: Option<&str>) -> Result<Type, CompileError> {
        match annotation {
            None | Some(VOID_ANNOTATION) => Ok(Type::Void),
            Some(name) if self.catalog.is_type(name) => Ok(Type::named(name)),
            Some(name) => Err(CompileError::undefined(SymbolKind::Type, name)),
        }
    }

    /// Parameter types (in order) and return type of a definition.
    fn signature_of(&self, def: &FunctionDef) -> Result<(Vec<Type>, Type), CompileError> {
        let mut types = Vec::with_capacity(def.params.len());
        for param in &def.params {
            let Some(annotation) = param.annotation.as_deref() else {
                return Err(CompileError::declaration(&param.name, "parameter has no type annotation")
                    .with_hint(format!("write `{}: SystemInt32` or another type", param.name)));
            };
            let ty = self.annotation_type(Some(annotation))?;
            if ty.is_void() {
                return Err(CompileError::declaration(&param.name, "a parameter cannot have the void type"));
            }
            types.push(ty);
        }
        let ret = self.annotation_type(def.returns.as_deref())?;
        Ok((types, ret))
    }

    fn declare_event(&mut self, def: &FunctionDef) -> Result<(), CompileError> {
        let (types, ret) = self.signature_of(def)?;
        if !ret.is_void() {
            return Err(CompileError::type_mismatch(format!(
                "event '{}' cannot return {}",
                def.name, ret
            )));
        }

        match self.catalog.event(&def.name) {
            Some(required) => {
                if required.len() != types.len() {
                    return Err(CompileError::type_mismatch(format!(
                        "event '{}' takes {} arguments, {} declared",
                        def.name,
                        required.len(),
                        types.len()
                    )));
                }
                let required = required.to_vec();
                for (arg, ty) in required.iter().zip(&types) {
                    if arg.ty != ty.name() {
                        return Err(CompileError::type_mismatch(format!(
                            "argument '{}' of event '{}' must be {}, found {}",
                            arg.slot, def.name, arg.ty, ty
                        )));
                    }
                    if !self.vars.contains(&arg.slot) {
                        self.vars.declare(&arg.slot, ty, Init::Null)?;
                    }
                }
            }
            None if !types.is_empty() => {
                return Err(CompileError::type_mismatch(format!(
                    "custom event '{}' cannot take arguments",
                    def.name
                ))
                .with_hint("only events known to the catalog receive arguments from the VM"));
            }
            None => {}
        }

        for (param, ty) in def.params.iter().zip(&types) {
            self.vars.declare(&qualify(&def.name, &param.name), ty, Init::Null)?;
        }
        self.emitter.add_event(&def.name);
        debug!("event {}{}", def.name, fmt_types(&types));
        Ok(())
    }

    fn declare_function(&mut self, def: &FunctionDef) -> Result<(), CompileError> {
        let (types, ret) = self.signature_of(def)?;
        let id = function_id(&def.name, &types);

        let params: Vec<String> = def.params.iter().map(|p| qualify(&id, &p.name)).collect();
        self.funcs
            .add_function(&def.name, types.clone(), ret.clone(), params.clone())?;
        for (param, ty) in params.iter().zip(&types) {
            self.vars.declare(param, ty, Init::Null)?;
        }
        debug!("function {} -> {}", id, ret);
        Ok(())
    }

    // =========================================================================
    // Generation pass
    // =========================================================================

    /// A module-level statement. Definitions get their own scope; anything
    /// else is lowered in module scope like a statement of any body.
    fn gen_toplevel(&mut self, stmt: &Stmt) -> Result<(), CompileError> {
        match &stmt.kind {
            StmtKind::FunctionDef(def) if def.is_event() => self.gen_event(def),
            StmtKind::FunctionDef(def) => self.gen_function(def),
            StmtKind::Assign { target, value } => {
                if self.gen_data_init(target, value)? {
                    return Ok(());
                }
                self.gen_stmt(stmt)
            }
            _ => self.gen_stmt(stmt),
        }
    }

    fn gen_event(&mut self, def: &FunctionDef) -> Result<(), CompileError> {
        self.scope = Scope::event(&def.name);
        self.emitter.event_head(&def.name);

        self.emitter.push_addr(HALT_ADDRESS);
        self.emitter.pop_into(RET_ADDR);

        let catalog = self.catalog;
        if let Some(required) = catalog.event(&def.name) {
            for (arg, param) in required.iter().zip(&def.params) {
                let local = qualify(&def.name, &param.name);
                self.emitter.assign(&local, &arg.slot);
            }
        }

        self.gen_block(&def.body)?;
        self.emitter.end();
        self.scope = Scope::module();
        Ok(())
    }

    fn gen_function(&mut self, def: &FunctionDef) -> Result<(), CompileError> {
        let (types, ret) = self.signature_of(def)?;
        let id = function_id(&def.name, &types);
        let params = self
            .funcs
            .get(&def.name, &types)
            .map(|sig| sig.params.clone())
            .ok_or_else(|| CompileError::undefined(SymbolKind::Function, id.as_str()))?;

        let entry = self.emitter.named_label(&id);
        self.emitter.bind(entry)?;
        self.emitter.pop_into_all(&params);

        self.scope = Scope::function(&id, ret, params);
        self.gen_block(&def.body)?;
        self.emitter.ret(RET_ADDR, None);
        self.scope = Scope::module();
        Ok(())
    }

    // =========================================================================
    // Variables
    // =========================================================================

    /// A fresh write-once temporary of type `ty`, qualified by the current
    /// scope.
    fn temp(&mut self, kind: &str, ty: &Type) -> Result<String, CompileError> {
        let name = format!("{}{}", self.scope.prefix, self.emitter.next_id(kind));
        self.vars.declare(&name, ty, Init::Null)?;
        Ok(name)
    }

    /// A fresh variable whose value lives in the data segment.
    fn constant(&mut self, kind: &str, ty: &Type, init: Init) -> Result<String, CompileError> {
        let name = format!("{}{}", self.scope.prefix, self.emitter.next_id(kind));
        self.vars.declare(&name, ty, init)?;
        Ok(name)
    }

    fn resolve(&self, name: &str) -> String {
        self.vars.resolve(&self.scope.prefix, name)
    }

    fn type_of(&self, var: &str) -> Result<Type, CompileError> {
        self.vars.type_of(var, self.catalog)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::asm::Instr;
    use crate::compile_error::ErrorKind;
    use crate::lang::node::Expr;

    fn compile(body: Vec<Stmt>) -> Result<AsmProgram, CompileError> {
        let catalog = Catalog::builtin();
        Compiler::new(&catalog).compile_module(&Module::new(body))
    }

    fn var<'a>(program: &'a AsmProgram, name: &str) -> Option<&'a crate::asm::ir::DataVar> {
        program.vars.iter().find(|v| v.name == name)
    }

    #[test]
    fn test_reserved_variables_come_first() {
        let program = compile(vec![]).unwrap();
        let names: Vec<&str> = program.vars.iter().map(|v| v.name.as_str()).collect();
        assert_eq!(names, vec![RET_ADDR, THIS_TRANSFORM, THIS_GAME_OBJECT]);
        assert_eq!(program.vars[0].init, Init::Addr(HALT_ADDRESS));
        assert_eq!(program.vars[1].init, Init::Literal("this".into()));
    }

    #[test]
    fn test_empty_catalog_cannot_type_ret_addr() {
        let program = Compiler::new(&Catalog::empty())
            .compile_module(&Module::default());
        // `ret_addr` needs SystemUInt32 in the type table.
        let err = program.unwrap_err();
        assert!(matches!(
            err.kind,
            ErrorKind::UndefinedSymbol {
                kind: SymbolKind::Type,
                ..
            }
        ));
    }

    #[test]
    fn test_event_is_exported_and_terminated() {
        let program = compile(vec![Stmt::def("_start", &[], None, vec![])]).unwrap();
        assert_eq!(program.events, vec!["_start".to_string()]);
        assert_eq!(
            &program.code[..4],
            &[
                Instr::EventHead("_start".into()),
                Instr::PushAddr(HALT_ADDRESS),
                Instr::Push(RET_ADDR.into()),
                Instr::Copy,
            ]
        );
        assert_eq!(
            program.code.last(),
            Some(&Instr::Jump(crate::asm::Target::Addr(HALT_ADDRESS)))
        );
    }

    #[test]
    fn test_event_argument_is_bound_to_parameter() {
        let program = compile(vec![Stmt::def(
            "_onTriggerEnter",
            &[("other", "UnityEngineCollider")],
            None,
            vec![],
        )])
        .unwrap();

        assert_eq!(var(&program, "onTriggerEnterOther").unwrap().vm_type, "UnityEngineCollider");
        assert!(var(&program, "_onTriggerEnter__other").is_some());

        let copies: Vec<&Instr> = program.code.iter().collect();
        let slot = copies
            .iter()
            .position(|i| **i == Instr::Push("onTriggerEnterOther".into()))
            .unwrap();
        assert_eq!(copies[slot + 1], &Instr::Push("_onTriggerEnter__other".into()));
        assert_eq!(copies[slot + 2], &Instr::Copy);
    }

    #[test]
    fn test_event_argument_type_mismatch() {
        let err = compile(vec![Stmt::def(
            "_onTriggerEnter",
            &[("other", "SystemInt32")],
            None,
            vec![],
        )])
        .unwrap_err();
        assert!(matches!(err.kind, ErrorKind::TypeMismatch(_)));
    }

    #[test]
    fn test_event_arity_mismatch() {
        let err = compile(vec![Stmt::def("_start", &[("x", "SystemInt32")], None, vec![])]).unwrap_err();
        assert!(matches!(err.kind, ErrorKind::TypeMismatch(_)));
    }

    #[test]
    fn test_custom_event_without_arguments() {
        let program = compile(vec![Stmt::def("_onRespawn", &[], None, vec![])]).unwrap();
        assert_eq!(program.events, vec!["_onRespawn".to_string()]);
    }

    #[test]
    fn test_duplicate_event_fails() {
        let err = compile(vec![
            Stmt::def("_start", &[], None, vec![]),
            Stmt::def("_start", &[], None, vec![]),
        ])
        .unwrap_err();
        assert!(matches!(err.kind, ErrorKind::Declaration { .. }));
    }

    #[test]
    fn test_event_with_return_type_fails() {
        let err = compile(vec![Stmt::def("_start", &[], Some("SystemInt32"), vec![])]).unwrap_err();
        assert!(matches!(err.kind, ErrorKind::TypeMismatch(_)));
    }

    #[test]
    fn test_unknown_annotation_is_undefined_type() {
        let err = compile(vec![Stmt::def("f", &[("x", "Int")], None, vec![])]).unwrap_err();
        assert_eq!(
            err.kind,
            ErrorKind::UndefinedSymbol {
                kind: SymbolKind::Type,
                name: "Int".into()
            }
        );
    }

    #[test]
    fn test_missing_parameter_annotation_fails() {
        let mut def = Stmt::def("f", &[("x", "SystemInt32")], None, vec![]);
        if let StmtKind::FunctionDef(f) = &mut def.kind {
            f.params[0].annotation = None;
        }
        let err = compile(vec![def]).unwrap_err();
        assert!(matches!(err.kind, ErrorKind::Declaration { .. }));
    }

    #[test]
    fn test_function_parameters_are_qualified() {
        let program = compile(vec![Stmt::def(
            "add",
            &[("a", "SystemInt32"), ("b", "SystemInt32")],
            Some("SystemInt32"),
            vec![Stmt::ret(Some(Expr::binop(
                Expr::name("a"),
                crate::lang::node::BinOp::Add,
                Expr::name("b"),
            )))],
        )])
        .unwrap();
        assert!(var(&program, "add__SystemInt32_SystemInt32__a").is_some());
        assert!(var(&program, "add__SystemInt32_SystemInt32__b").is_some());
        assert!(program.labels.iter().any(|l| l.name == "add__SystemInt32_SystemInt32"));
    }

    #[test]
    fn test_parameter_names_never_clash_with_temporaries() {
        let program = compile(vec![Stmt::def(
            "f",
            &[("const_0", "SystemInt32"), ("extern_1", "SystemInt32")],
            Some("SystemInt32"),
            vec![Stmt::ret(Some(Expr::binop(
                Expr::name("const_0"),
                crate::lang::node::BinOp::Add,
                Expr::int(1),
            )))],
        )])
        .unwrap();
        assert!(var(&program, "f__SystemInt32_SystemInt32__const_0").is_some());
        assert!(var(&program, "f__SystemInt32_SystemInt32__extern_1").is_some());
        assert!(var(&program, "f__SystemInt32_SystemInt32__0_const").is_some());
        assert!(var(&program, "f__SystemInt32_SystemInt32__1_extern").is_some());
    }

    #[test]
    fn test_module_level_literal_becomes_initializer() {
        let program = compile(vec![
            Stmt::assign(Expr::name("speed"), Expr::float(2.5)),
            Stmt::global(&["speed"]),
        ])
        .unwrap();
        let speed = var(&program, "speed").unwrap();
        assert_eq!(speed.vm_type, "SystemSingle");
        assert_eq!(speed.init, Init::Literal("2.5".into()));
        assert_eq!(program.exports, vec!["speed".to_string()]);
        assert!(program.code.is_empty());
    }

    #[test]
    fn test_module_level_call_is_lowered_in_module_scope() {
        let add = Stmt::def(
            "add",
            &[("a", "SystemInt32"), ("b", "SystemInt32")],
            Some("SystemInt32"),
            vec![Stmt::ret(Some(Expr::binop(
                Expr::name("a"),
                crate::lang::node::BinOp::Add,
                Expr::name("b"),
            )))],
        );
        let program = compile(vec![
            add,
            Stmt::assign(Expr::name("c"), Expr::call(Expr::name("add"), vec![Expr::int(5), Expr::int(7)])),
            Stmt::assign(Expr::name("flag"), Expr::bool(true)),
        ])
        .unwrap();

        let c = var(&program, "c").unwrap();
        assert_eq!(c.vm_type, "SystemInt32");
        assert_eq!(c.init, Init::Null);
        assert_eq!(var(&program, "flag").unwrap().vm_type, "SystemBoolean");
        // Module-level temporaries carry no scope prefix.
        assert!(program.vars.iter().any(|v| v.name.starts_with("__") && v.name.ends_with("_const_ret_addr")));
        let entry = program
            .labels
            .iter()
            .find(|l| l.name == "add__SystemInt32_SystemInt32")
            .and_then(|l| l.addr)
            .unwrap();
        assert!(program.code.contains(&Instr::Jump(crate::asm::Target::Addr(entry))));
    }

    #[test]
    fn test_module_level_return_is_rejected() {
        let err = compile(vec![Stmt::ret(None)]).unwrap_err();
        assert!(matches!(err.kind, ErrorKind::UnsupportedConstruct(_)));
    }

    #[test]
    fn test_module_level_reassignment_emits_code() {
        let program = compile(vec![
            Stmt::assign(Expr::name("n"), Expr::int(1)),
            Stmt::assign(Expr::name("n"), Expr::int(2)),
        ])
        .unwrap();
        assert_eq!(var(&program, "n").unwrap().init, Init::Literal("1".into()));
        assert_eq!(program.code.len(), 3);
        assert_eq!(program.code[1], Instr::Push("n".into()));
    }

    #[test]
    fn test_undefined_global_export_fails() {
        let err = compile(vec![Stmt::global(&["ghost"])]).unwrap_err();
        assert!(matches!(
            err.kind,
            ErrorKind::UndefinedSymbol {
                kind: SymbolKind::Variable,
                ..
            }
        ));
    }
}
