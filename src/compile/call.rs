//! Call lowering: catalog members through `EXTERN`, user functions through
//! the jump-based call convention.

use log::trace;

use super::symbols::function_id;
use super::{Compiler, Operand, RET_ADDR};
use crate::asm::emitter::{CallFrame, ResultSlot};
use crate::asm::ir::Init;
use crate::catalog::{Method, MethodKind};
use crate::compile_error::CompileError;
use crate::lang::node::{Expr, ExprKind};
use crate::lang::types::Type;

/// Built-in spawning function, resolved as `VRCInstantiate.Instantiate`.
const INSTANTIATE: &str = "instantiate";

impl Compiler<'_> {
    /// Lower `func(args)`. With `discard`, a user function's result is
    /// dropped instead of being stored in a temporary.
    pub(super) fn call(&mut self, func: &Expr, args: &[Expr], discard: bool) -> Result<Operand, CompileError> {
        let mut arg_vars = Vec::with_capacity(args.len());
        for arg in args {
            arg_vars.push(self.value(arg)?);
        }

        match &func.kind {
            ExprKind::Attribute { value, attr } => self.dotted_call(value, attr, arg_vars),
            ExprKind::Name(name) => self.plain_call(name, arg_vars, discard),
            other => Err(CompileError::unsupported(format!("call of {}", other.describe()))),
        }
    }

    fn arg_types(&self, args: &[String]) -> Result<Vec<Type>, CompileError> {
        args.iter().map(|a| self.type_of(a)).collect()
    }

    /// `Owner.member(args)` or `receiver.member(args)`.
    fn dotted_call(&mut self, qualifier: &Expr, member: &str, args: Vec<String>) -> Result<Operand, CompileError> {
        if let ExprKind::Name(owner) = &qualifier.kind {
            if !self.vars.contains(&self.resolve(owner)) {
                return self.static_call(owner, member, args);
            }
        }
        let receiver = self.value(qualifier)?;
        self.instance_call(receiver, member, args)
    }

    /// Module or type member: a static function first, then a constructor.
    fn static_call(&mut self, owner: &str, member: &str, args: Vec<String>) -> Result<Operand, CompileError> {
        let types = self.arg_types(&args)?;
        let method = [MethodKind::StaticFunc, MethodKind::Constructor]
            .into_iter()
            .find_map(|kind| self.catalog.method(kind, owner, member, &types))
            .cloned()
            .ok_or_else(|| {
                let err = CompileError::method_not_found(MethodKind::StaticFunc, owner, member, &types);
                if self.catalog.is_type(owner) {
                    err.with_hint("no constructor with these argument types either")
                } else {
                    err
                }
            })?;
        self.extern_call(&method, args)
    }

    /// Instance member on the receiver's type. The receiver is passed first.
    pub(super) fn instance_call(
        &mut self,
        receiver: String,
        member: &str,
        args: Vec<String>,
    ) -> Result<Operand, CompileError> {
        let owner = self.type_of(&receiver)?;
        let types = self.arg_types(&args)?;
        let method = self
            .catalog
            .method(MethodKind::InstanceFunc, owner.name(), member, &types)
            .cloned()
            .ok_or_else(|| CompileError::method_not_found(MethodKind::InstanceFunc, owner.name(), member, &types))?;

        let mut operands = Vec::with_capacity(args.len() + 1);
        operands.push(receiver);
        operands.extend(args);
        self.extern_call(&method, operands)
    }

    /// Push the operands, plus a fresh result slot for members that return
    /// something, and `EXTERN`.
    pub(super) fn extern_call(&mut self, method: &Method, mut operands: Vec<String>) -> Result<Operand, CompileError> {
        trace!("extern {}", method.symbol);
        if method.ret.is_void() {
            self.emitter.call_extern(&method.symbol, &operands);
            return Ok(Operand::Nothing);
        }
        let result = self.temp("extern", &method.ret)?;
        operands.push(result.clone());
        self.emitter.call_extern(&method.symbol, &operands);
        Ok(Operand::Var(result))
    }

    /// `name(args)`: `instantiate`, a cast, or a user function.
    fn plain_call(&mut self, name: &str, args: Vec<String>, discard: bool) -> Result<Operand, CompileError> {
        if name == INSTANTIATE {
            if args.len() != 1 {
                return Err(CompileError::malformed(format!(
                    "instantiate takes exactly one argument, found {}",
                    args.len()
                )));
            }
            return self.static_call("VRCInstantiate", "Instantiate", args);
        }

        if self.catalog.is_type(name) {
            let [arg] = args.as_slice() else {
                return Err(CompileError::malformed(format!(
                    "a cast to {} takes exactly one argument, found {}",
                    name,
                    args.len()
                )));
            };
            let casted = self.temp("cast", &Type::named(name))?;
            self.emitter.assign(&casted, arg);
            return Ok(Operand::Var(casted));
        }

        self.user_call(name, args, discard)
    }

    /// Call a function defined in the script.
    fn user_call(&mut self, name: &str, args: Vec<String>, discard: bool) -> Result<Operand, CompileError> {
        let types = self.arg_types(&args)?;
        let ret = self.funcs.return_type_of(name, &types)?.clone();
        let id = function_id(name, &types);
        trace!("call {} -> {}", id, ret);

        let entry = self.emitter.named_label(&id);
        let ret_label = self.emitter.fresh_label("ret_call_label");
        let ret_const = self.constant("const_ret_addr", &Type::uint32(), Init::Label(ret_label))?;
        let env = self.scope.env.clone();

        self.emitter.call_enter(&CallFrame {
            ret_addr: RET_ADDR,
            env: &env,
            ret_const: &ret_const,
            args: &args,
            entry,
            ret_label,
        })?;

        if ret.is_void() {
            self.emitter.call_leave(ResultSlot::None, &env, RET_ADDR);
            return Ok(Operand::Nothing);
        }
        if discard {
            self.emitter.call_leave(ResultSlot::Discard, &env, RET_ADDR);
            return Ok(Operand::Nothing);
        }
        let result = self.temp("ret_value", &ret)?;
        self.emitter.call_leave(ResultSlot::Into(&result), &env, RET_ADDR);
        Ok(Operand::Var(result))
    }
}

#[cfg(test)]
mod tests {
    use crate::asm::ir::{AsmProgram, Init};
    use crate::asm::op::net_effect;
    use crate::asm::{Instr, Target};
    use crate::catalog::Catalog;
    use crate::compile::Compiler;
    use crate::compile_error::{CompileError, ErrorKind, SymbolKind};
    use crate::lang::node::{BinOp, CmpOp, Expr, Stmt};
    use crate::lang::program::Module;

    fn compile(body: Vec<Stmt>) -> Result<AsmProgram, CompileError> {
        let catalog = Catalog::builtin();
        Compiler::new(&catalog).compile_module(&Module::new(body))
    }

    fn start(body: Vec<Stmt>) -> Stmt {
        Stmt::def("_start", &[], None, body)
    }

    fn double() -> Stmt {
        Stmt::def(
            "double",
            &[("x", "SystemInt32")],
            Some("SystemInt32"),
            vec![Stmt::ret(Some(Expr::binop(Expr::name("x"), BinOp::Add, Expr::name("x"))))],
        )
    }

    #[test]
    fn test_forward_reference_to_later_function() {
        let program = compile(vec![
            start(vec![Stmt::assign(
                Expr::name("y"),
                Expr::call(Expr::name("double"), vec![Expr::int(21)]),
            )]),
            double(),
        ])
        .unwrap();

        let entry = program
            .labels
            .iter()
            .find(|l| l.name == "double__SystemInt32")
            .and_then(|l| l.addr)
            .unwrap();
        assert!(program.code.contains(&Instr::Jump(Target::Addr(entry))));
    }

    #[test]
    fn test_return_constant_points_after_jump() {
        let program = compile(vec![
            double(),
            start(vec![Stmt::assign(
                Expr::name("y"),
                Expr::call(Expr::name("double"), vec![Expr::int(2)]),
            )]),
        ])
        .unwrap();

        let ret_const = program
            .vars
            .iter()
            .find(|v| v.name.contains("const_ret_addr"))
            .unwrap();
        let Init::Addr(back) = ret_const.init else {
            panic!("return constant not linked: {:?}", ret_const.init);
        };
        let addrs = program.addresses();
        let jump = program
            .code
            .iter()
            .position(|i| matches!(i, Instr::Jump(Target::Addr(a)) if *a == 0))
            .unwrap();
        assert_eq!(back, addrs[jump] + 5);
    }

    #[test]
    fn test_call_site_is_stack_balanced() {
        let program = compile(vec![
            double(),
            start(vec![Stmt::assign(
                Expr::name("y"),
                Expr::call(Expr::name("double"), vec![Expr::int(2)]),
            )]),
        ])
        .unwrap();
        let head = program
            .code
            .iter()
            .position(|i| matches!(i, Instr::EventHead(_)))
            .unwrap();
        let event = &program.code[head..];
        let jump = event
            .iter()
            .position(|i| matches!(i, Instr::Jump(Target::Addr(0))))
            .unwrap();
        // ret_addr, the return constant and one argument cross the jump.
        // The callee takes the argument and the constant and leaves its
        // result, so the caller has two values left to pop.
        let before = net_effect(&event[..jump]);
        let after = net_effect(&event[jump + 1..]);
        assert_eq!(before, 3);
        assert_eq!(after, -2);
    }

    #[test]
    fn test_recursive_call_saves_parameters() {
        let countdown = Stmt::def(
            "countdown",
            &[("n", "SystemInt32")],
            None,
            vec![Stmt::if_else(
                Expr::compare(Expr::name("n"), CmpOp::Gt, Expr::int(0)),
                vec![Stmt::expr(Expr::call(
                    Expr::name("countdown"),
                    vec![Expr::binop(Expr::name("n"), BinOp::Sub, Expr::int(1))],
                ))],
                vec![],
            )],
        );
        let program = compile(vec![countdown]).unwrap();
        let param = "countdown__SystemInt32__n".to_string();
        let pushes = program
            .code
            .iter()
            .filter(|i| **i == Instr::Push(param.clone()))
            .count();
        // entry pop, compare, subtraction, env save, env restore
        assert_eq!(pushes, 5);
    }

    #[test]
    fn test_caller_parameters_are_restored_in_reverse() {
        let add = Stmt::def(
            "add",
            &[("a", "SystemInt32"), ("b", "SystemInt32")],
            Some("SystemInt32"),
            vec![Stmt::ret(Some(Expr::binop(Expr::name("a"), BinOp::Add, Expr::name("b"))))],
        );
        let caller = Stmt::def(
            "g",
            &[("p", "SystemInt32"), ("q", "SystemInt32")],
            None,
            vec![Stmt::assign(
                Expr::name("s"),
                Expr::call(Expr::name("add"), vec![Expr::name("q"), Expr::name("p")]),
            )],
        );
        let program = compile(vec![add, caller]).unwrap();

        let named = |suffix: &str| {
            program
                .vars
                .iter()
                .find(|v| v.name.starts_with("g__SystemInt32_SystemInt32__") && v.name.ends_with(suffix))
                .map(|v| v.name.clone())
                .unwrap()
        };
        let ret_const = named("_const_ret_addr");
        let result = named("_ret_value");
        let p = "g__SystemInt32_SystemInt32__p";
        let q = "g__SystemInt32_SystemInt32__q";
        let push = |name: &str| Instr::Push(name.to_string());

        let entry = program
            .labels
            .iter()
            .find(|l| l.name == "add__SystemInt32_SystemInt32")
            .and_then(|l| l.addr)
            .unwrap();
        let jump = program
            .code
            .iter()
            .position(|i| *i == Instr::Jump(Target::Addr(entry)))
            .unwrap();

        assert_eq!(
            &program.code[jump - 6..jump + 9],
            &[
                push("ret_addr"),
                push(p),
                push(q),
                push(&ret_const),
                push(q),
                push(p),
                Instr::Jump(Target::Addr(entry)),
                push(&result),
                Instr::Copy,
                push(q),
                Instr::Copy,
                push(p),
                Instr::Copy,
                push("ret_addr"),
                Instr::Copy,
            ]
        );
    }

    #[test]
    fn test_discarded_result_is_popped() {
        let program = compile(vec![
            double(),
            start(vec![Stmt::expr(Expr::call(Expr::name("double"), vec![Expr::int(1)]))]),
        ])
        .unwrap();
        assert!(program.code.contains(&Instr::Pop));
        assert!(!program.vars.iter().any(|v| v.name.contains("ret_value")));
    }

    fn identity(ty: &str) -> Stmt {
        Stmt::def("same", &[("x", ty)], Some(ty), vec![Stmt::ret(Some(Expr::name("x")))])
    }

    #[test]
    fn test_overload_is_chosen_by_exact_types() {
        let program = compile(vec![
            identity("SystemInt32"),
            identity("SystemSingle"),
            start(vec![Stmt::assign(
                Expr::name("h"),
                Expr::call(Expr::name("same"), vec![Expr::float(3.0)]),
            )]),
        ])
        .unwrap();
        let h = program.vars.iter().find(|v| v.name == "h").unwrap();
        assert_eq!(h.vm_type, "SystemSingle");

        let err = compile(vec![
            identity("SystemInt32"),
            start(vec![Stmt::expr(Expr::call(Expr::name("same"), vec![Expr::str("x")]))]),
        ])
        .unwrap_err();
        assert!(matches!(
            err.kind,
            ErrorKind::UndefinedSymbol {
                kind: SymbolKind::Function,
                ..
            }
        ));
    }

    #[test]
    fn test_static_and_constructor_calls() {
        let program = compile(vec![start(vec![
            Stmt::assign(
                Expr::name("go"),
                Expr::method(Expr::name("UnityEngineGameObject"), "Find", vec![Expr::str("button")]),
            ),
            Stmt::assign(
                Expr::name("v"),
                Expr::method(
                    Expr::name("UnityEngineVector3"),
                    "ctor",
                    vec![Expr::float(0.0), Expr::float(1.0), Expr::float(0.0)],
                ),
            ),
        ])])
        .unwrap();
        assert!(program.code.contains(&Instr::Extern {
            symbol: "UnityEngineGameObject.__Find__SystemString__UnityEngineGameObject".into(),
            arity: 2,
        }));
        assert!(program.code.contains(&Instr::Extern {
            symbol: "UnityEngineVector3.__ctor__SystemSingle_SystemSingle_SystemSingle__UnityEngineVector3".into(),
            arity: 4,
        }));
    }

    #[test]
    fn test_instance_call_passes_receiver_first() {
        let program = compile(vec![start(vec![Stmt::expr(Expr::method(
            Expr::name("this_gameObj"),
            "SetActive",
            vec![Expr::bool(false)],
        ))])])
        .unwrap();
        let ext = program
            .code
            .iter()
            .position(|i| matches!(i, Instr::Extern { symbol, .. } if symbol.contains("SetActive")))
            .unwrap();
        assert_eq!(program.code[ext - 2], Instr::Push("this_gameObj".into()));
        assert_eq!(
            program.code[ext],
            Instr::Extern {
                symbol: "UnityEngineGameObject.__SetActive__SystemBoolean__SystemVoid".into(),
                arity: 2,
            }
        );
    }

    #[test]
    fn test_unknown_member_reports_kind_and_types() {
        let err = compile(vec![start(vec![Stmt::expr(Expr::method(
            Expr::name("this_trans"),
            "Explode",
            vec![Expr::int(1)],
        ))])])
        .unwrap_err();
        assert_eq!(
            err.to_string(),
            "compile error: instance function UnityEngineTransform.Explode(SystemInt32) not found"
        );
    }

    #[test]
    fn test_instantiate_and_cast() {
        let program = compile(vec![start(vec![
            Stmt::assign(Expr::name("copy"), Expr::call(Expr::name("instantiate"), vec![Expr::name("this_gameObj")])),
            Stmt::assign(
                Expr::name("o"),
                Expr::call(Expr::name("SystemObject"), vec![Expr::str("hi")]),
            ),
        ])])
        .unwrap();
        assert!(program.code.contains(&Instr::Extern {
            symbol: "VRCInstantiate.__Instantiate__UnityEngineGameObject__UnityEngineGameObject".into(),
            arity: 2,
        }));
        let o = program.vars.iter().find(|v| v.name == "o").unwrap();
        assert_eq!(o.vm_type, "SystemObject");
    }

    #[test]
    fn test_cast_and_instantiate_arity() {
        let err = compile(vec![start(vec![Stmt::expr(Expr::call(
            Expr::name("SystemObject"),
            vec![Expr::int(1), Expr::int(2)],
        ))])])
        .unwrap_err();
        assert!(matches!(err.kind, ErrorKind::MalformedExpression(_)));

        let err = compile(vec![start(vec![Stmt::expr(Expr::call(Expr::name("instantiate"), vec![]))])]).unwrap_err();
        assert!(matches!(err.kind, ErrorKind::MalformedExpression(_)));
    }

    #[test]
    fn test_local_parameter_shadows_global() {
        let program = compile(vec![
            Stmt::def(
                "show",
                &[("a", "SystemInt32")],
                None,
                vec![Stmt::assign(Expr::name("a"), Expr::int(10000))],
            ),
            start(vec![
                Stmt::assign(Expr::name("a"), Expr::int(5)),
                Stmt::expr(Expr::call(Expr::name("show"), vec![Expr::name("a")])),
            ]),
        ])
        .unwrap();
        // The function writes its own parameter, the event passes the global.
        let writes_local = program
            .code
            .windows(2)
            .any(|w| w[0] == Instr::Push("show__SystemInt32__a".into()) && w[1] == Instr::Copy);
        assert!(writes_local);
        assert!(program.code.contains(&Instr::Push("a".into())));
    }
}
