use log::trace;

use super::{Compiler, Operand};
use crate::asm::ir::Init;
use crate::catalog::MethodKind;
use crate::compile_error::{CompileError, Locate, SymbolKind};
use crate::lang::node::{BinOp, BoolOp, CmpOp, Expr, ExprKind, UnaryOp};
use crate::lang::types::Type;

fn unary_member(op: UnaryOp) -> Option<&'static str> {
    match op {
        UnaryOp::Neg => Some("op_UnaryMinus"),
        UnaryOp::Not => Some("op_UnaryNegation"),
        UnaryOp::Pos | UnaryOp::Invert => None,
    }
}

fn binary_member(op: BinOp) -> Option<&'static str> {
    match op {
        BinOp::Add => Some("op_Addition"),
        BinOp::Sub => Some("op_Subtraction"),
        BinOp::Mul => Some("op_Multiplication"),
        BinOp::Div => Some("op_Division"),
        BinOp::Mod => Some("op_Modulus"),
        BinOp::FloorDiv | BinOp::Pow => None,
    }
}

fn compare_member(op: CmpOp) -> Option<&'static str> {
    match op {
        CmpOp::Eq => Some("op_Equality"),
        CmpOp::NotEq => Some("op_Inequality"),
        CmpOp::Lt => Some("op_LessThan"),
        CmpOp::Gt => Some("op_GreaterThan"),
        CmpOp::LtE => Some("op_LessThanOrEqual"),
        CmpOp::GtE => Some("op_GreaterThanOrEqual"),
        CmpOp::Is | CmpOp::IsNot | CmpOp::In | CmpOp::NotIn => None,
    }
}

fn bool_member(op: BoolOp) -> &'static str {
    match op {
        BoolOp::And => "op_LogicalAnd",
        BoolOp::Or => "op_LogicalOr",
    }
}

/// Data-segment text of a string literal. A declaration must stay on one
/// line, so line breaks and tabs are escaped too.
fn quote(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c => out.push(c),
        }
    }
    out.push('"');
    out
}

impl Compiler<'_> {
    /// Lower an expression. Errors without a position get this node's.
    pub(super) fn expr(&mut self, e: &Expr) -> Result<Operand, CompileError> {
        trace!("{}:   {}", e.pos, e.kind.describe());
        self.lower_expr(e).at(e.pos)
    }

    /// Lower an expression that must produce a value; returns the variable
    /// holding it.
    pub(super) fn value(&mut self, e: &Expr) -> Result<String, CompileError> {
        match self.expr(e)? {
            Operand::Var(name) => Ok(name),
            Operand::Nothing => Err(CompileError::type_mismatch(format!(
                "{} produces no value",
                e.kind.describe()
            ))
            .at(e.pos)),
            Operand::TypeRef(ty) => Err(CompileError::type_mismatch(format!(
                "type {} cannot be used as a value",
                ty
            ))
            .with_hint(format!("to convert a value write `{}(value)`", ty))
            .at(e.pos)),
        }
    }

    /// Type and data-segment initializer of a literal that needs no code,
    /// or `None` for anything else.
    pub(super) fn literal_init(&self, e: &Expr) -> Result<Option<(Type, Init)>, CompileError> {
        Ok(Some(match &e.kind {
            ExprKind::Int(n) => {
                let n = i32::try_from(*n).map_err(|_| {
                    CompileError::malformed(format!("integer literal {} does not fit SystemInt32", n)).at(e.pos)
                })?;
                (Type::int32(), Init::Literal(n.to_string()))
            }
            ExprKind::Float(x) => (Type::single(), Init::Literal(format!("{:?}", x))),
            ExprKind::Str(s) => (Type::string(), Init::Literal(quote(s))),
            ExprKind::NoneLit => (Type::object(), Init::Null),
            _ => return Ok(None),
        }))
    }

    fn lower_expr(&mut self, e: &Expr) -> Result<Operand, CompileError> {
        match &e.kind {
            ExprKind::Int(_) | ExprKind::Float(_) | ExprKind::Str(_) | ExprKind::NoneLit => {
                let (ty, init) = self
                    .literal_init(e)?
                    .ok_or_else(|| CompileError::unsupported(e.kind.describe()))?;
                self.constant("const", &ty, init).map(Operand::Var)
            }
            ExprKind::Bool(b) => self.bool_literal(*b).map(Operand::Var),
            ExprKind::Name(id) => self.name(id),
            ExprKind::Call { func, args } => self.call(func, args, false),
            ExprKind::Subscript { value, index } => {
                // container[index]  =>  container.Get(index)
                let receiver = self.value(value)?;
                let index = self.value(index)?;
                self.instance_call(receiver, "Get", vec![index])
            }
            ExprKind::UnaryOp { op, operand } => {
                let Some(member) = unary_member(*op) else {
                    return Err(CompileError::unsupported(e.kind.describe()));
                };
                let operand = self.value(operand)?;
                self.operator(member, vec![operand])
            }
            ExprKind::BinOp { left, op, right } => {
                let Some(member) = binary_member(*op) else {
                    return Err(CompileError::unsupported(e.kind.describe()));
                };
                let left = self.value(left)?;
                let right = self.value(right)?;
                self.operator(member, vec![left, right])
            }
            ExprKind::Compare {
                left,
                ops,
                comparators,
            } => {
                // Checked before any operand is lowered.
                let ([op], [right]) = (ops.as_slice(), comparators.as_slice()) else {
                    return Err(CompileError::malformed("comparisons cannot be chained")
                        .with_hint("write `0 <= x < 100` as `(0 <= x) and (x < 100)`"));
                };
                let Some(member) = compare_member(*op) else {
                    return Err(CompileError::unsupported(format!("comparison operator `{}`", op)));
                };
                let left = self.value(left)?;
                let right = self.value(right)?;
                self.operator(member, vec![left, right])
            }
            ExprKind::BoolOp { op, values } => {
                let [left, right] = values.as_slice() else {
                    return Err(CompileError::malformed(format!(
                        "`{}` takes exactly two operands, found {}",
                        op,
                        values.len()
                    ))
                    .with_hint(format!("parenthesize: `(a {} b) {} c`", op, op)));
                };
                let left = self.value(left)?;
                let right = self.value(right)?;
                self.operator(bool_member(*op), vec![left, right])
            }
            ExprKind::Attribute { attr, .. } => Err(CompileError::unsupported(format!(
                "attribute access `.{}` outside of a call",
                attr
            ))
            .with_hint(format!("use the accessor method, e.g. `.get_{}()`", attr))),
            ExprKind::Other(_) => Err(CompileError::unsupported(e.kind.describe())),
        }
    }

    /// A variable reference, or a type identifier as a pseudo-value.
    fn name(&self, id: &str) -> Result<Operand, CompileError> {
        let var = self.resolve(id);
        if self.vars.contains(&var) {
            return Ok(Operand::Var(var));
        }
        if self.catalog.is_type(id) {
            return Ok(Operand::TypeRef(Type::named(id)));
        }
        Err(CompileError::undefined(SymbolKind::Variable, id)
            .with_hint("variables are declared by their first assignment"))
    }

    /// The VM has no boolean literal: parse one from a string at run time.
    fn bool_literal(&mut self, b: bool) -> Result<String, CompileError> {
        let arg = [Type::string()];
        let parse = self
            .catalog
            .method(MethodKind::StaticFunc, "SystemBoolean", "Parse", &arg)
            .ok_or_else(|| CompileError::method_not_found(MethodKind::StaticFunc, "SystemBoolean", "Parse", &arg))?
            .symbol
            .clone();
        let text = self.constant("const", &Type::string(), Init::Literal(quote(if b { "true" } else { "false" })))?;
        let dst = self.temp("bool", &Type::boolean())?;
        self.emitter.call_extern(&parse, &[text, dst.clone()]);
        Ok(dst)
    }

    /// Operators are static members of the left operand's type.
    fn operator(&mut self, member: &str, operands: Vec<String>) -> Result<Operand, CompileError> {
        let types = operands
            .iter()
            .map(|v| self.type_of(v))
            .collect::<Result<Vec<_>, _>>()?;
        let owner = types[0].name().to_string();
        let method = self
            .catalog
            .method(MethodKind::StaticFunc, &owner, member, &types)
            .cloned()
            .ok_or_else(|| CompileError::method_not_found(MethodKind::StaticFunc, &owner, member, &types))?;
        self.extern_call(&method, operands)
    }
}

#[cfg(test)]
mod tests {
    use crate::asm::Instr;
    use crate::asm::ir::{AsmProgram, Init};
    use crate::asm::render::render;
    use crate::catalog::Catalog;
    use crate::compile::Compiler;
    use crate::compile_error::{CompileError, ErrorKind, SymbolKind};
    use crate::lang::node::{BinOp, BoolOp, CmpOp, Expr, ExprKind, Stmt, UnaryOp};
    use crate::lang::program::Module;

    fn start(body: Vec<Stmt>) -> Result<AsmProgram, CompileError> {
        let catalog = Catalog::builtin();
        Compiler::new(&catalog).compile_module(&Module::new(vec![Stmt::def("_start", &[], None, body)]))
    }

    fn externs(program: &AsmProgram) -> Vec<&str> {
        program
            .code
            .iter()
            .filter_map(|i| match i {
                Instr::Extern { symbol, .. } => Some(symbol.as_str()),
                _ => None,
            })
            .collect()
    }

    fn let_(name: &str, value: Expr) -> Stmt {
        Stmt::assign(Expr::name(name), value)
    }

    #[test]
    fn test_literal_initializers() {
        let program = start(vec![
            let_("i", Expr::int(-3)),
            let_("f", Expr::float(1.0)),
            let_("s", Expr::str("say \"hi\"")),
            let_("o", Expr::new(ExprKind::NoneLit, Default::default())),
        ])
        .unwrap();
        let inits: Vec<(&str, &Init)> = program
            .vars
            .iter()
            .filter(|v| v.name.starts_with("_start__") && v.name.ends_with("_const"))
            .map(|v| (v.vm_type.as_str(), &v.init))
            .collect();
        assert_eq!(
            inits,
            vec![
                ("SystemInt32", &Init::Literal("-3".into())),
                ("SystemSingle", &Init::Literal("1.0".into())),
                ("SystemString", &Init::Literal("\"say \\\"hi\\\"\"".into())),
                ("SystemObject", &Init::Null),
            ]
        );
    }

    #[test]
    fn test_string_literal_stays_on_one_line() {
        let program = start(vec![let_("s", Expr::str("a\nb\r\tc\\"))]).unwrap();
        let s = program.vars.iter().find(|v| v.name == "s").unwrap();
        assert_eq!(s.vm_type, "SystemString");

        let text = render(&program);
        assert!(text.contains(": %SystemString, \"a\\nb\\r\\tc\\\\\"\n"));
        assert!(!text.lines().any(|l| l.starts_with("b")));
    }

    #[test]
    fn test_integer_literal_out_of_range() {
        let err = start(vec![let_("i", Expr::int(1 << 40))]).unwrap_err();
        assert!(matches!(err.kind, ErrorKind::MalformedExpression(_)));
    }

    #[test]
    fn test_bool_literal_is_parsed_at_run_time() {
        let program = start(vec![let_("b", Expr::bool(true))]).unwrap();
        assert_eq!(externs(&program), vec!["SystemBoolean.__Parse__SystemString__SystemBoolean"]);
        assert!(program.vars.iter().any(|v| v.init == Init::Literal("\"true\"".into())));
    }

    #[test]
    fn test_binary_operator_resolves_on_left_type() {
        let program = start(vec![
            let_("a", Expr::int(1)),
            let_("b", Expr::binop(Expr::name("a"), BinOp::Mod, Expr::int(2))),
        ])
        .unwrap();
        assert_eq!(
            externs(&program),
            vec!["SystemInt32.__op_Modulus__SystemInt32_SystemInt32__SystemInt32"]
        );
    }

    #[test]
    fn test_mixed_operand_types_are_not_coerced() {
        let err = start(vec![let_(
            "x",
            Expr::binop(Expr::int(1), BinOp::Add, Expr::float(2.0)),
        )])
        .unwrap_err();
        match err.kind {
            ErrorKind::MethodNotFound { owner, name, args, .. } => {
                assert_eq!(owner, "SystemInt32");
                assert_eq!(name, "op_Addition");
                assert_eq!(args, "(SystemInt32, SystemSingle)");
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_string_concatenation() {
        let program = start(vec![let_(
            "s",
            Expr::binop(Expr::str("a"), BinOp::Add, Expr::str("b")),
        )])
        .unwrap();
        assert_eq!(
            externs(&program),
            vec!["SystemString.__Concat__SystemString_SystemString__SystemString"]
        );
    }

    #[test]
    fn test_unary_operators() {
        let program = start(vec![
            let_("n", Expr::unary(UnaryOp::Neg, Expr::int(4))),
            let_("t", Expr::unary(UnaryOp::Not, Expr::bool(false))),
        ])
        .unwrap();
        let symbols = externs(&program);
        assert!(symbols.contains(&"SystemInt32.__op_UnaryMinus__SystemInt32__SystemInt32"));
        assert!(symbols.contains(&"SystemBoolean.__op_UnaryNegation__SystemBoolean__SystemBoolean"));
    }

    #[test]
    fn test_unsupported_operators() {
        let err = start(vec![let_("x", Expr::binop(Expr::int(2), BinOp::Pow, Expr::int(3)))]).unwrap_err();
        assert!(matches!(err.kind, ErrorKind::UnsupportedConstruct(_)));

        let err = start(vec![let_("x", Expr::unary(UnaryOp::Invert, Expr::int(3)))]).unwrap_err();
        assert!(matches!(err.kind, ErrorKind::UnsupportedConstruct(_)));
    }

    #[test]
    fn test_chained_comparison_fails_before_lowering_operands() {
        let chained = Expr::new(
            ExprKind::Compare {
                left: Box::new(Expr::int(0)),
                ops: vec![CmpOp::LtE, CmpOp::Lt],
                comparators: vec![Expr::name("x"), Expr::int(100)],
            },
            Default::default(),
        )
        .at(2, 5);
        let err = start(vec![let_("ok", chained)]).unwrap_err();
        assert!(matches!(err.kind, ErrorKind::MalformedExpression(_)));
        // `x` is undefined, so lowering any operand would have failed differently.
        assert_eq!(err.pos.map(|p| (p.line, p.col)), Some((2, 5)));
    }

    #[test]
    fn test_bool_op_needs_two_operands() {
        let three = Expr::boolop(
            BoolOp::And,
            vec![Expr::bool(true), Expr::bool(true), Expr::bool(false)],
        );
        let err = start(vec![let_("x", three)]).unwrap_err();
        assert!(matches!(err.kind, ErrorKind::MalformedExpression(_)));

        let program = start(vec![let_(
            "x",
            Expr::boolop(BoolOp::Or, vec![Expr::bool(true), Expr::bool(false)]),
        )])
        .unwrap();
        assert!(externs(&program).contains(&"SystemBoolean.__op_LogicalOr__SystemBoolean_SystemBoolean__SystemBoolean"));
    }

    #[test]
    fn test_undefined_variable() {
        let err = start(vec![let_("y", Expr::name("nowhere"))]).unwrap_err();
        assert_eq!(
            err.kind,
            ErrorKind::UndefinedSymbol {
                kind: SymbolKind::Variable,
                name: "nowhere".into()
            }
        );
    }

    #[test]
    fn test_type_as_operand_fails() {
        let err = start(vec![let_(
            "x",
            Expr::binop(Expr::name("SystemInt32"), BinOp::Add, Expr::int(1)),
        )])
        .unwrap_err();
        assert!(matches!(err.kind, ErrorKind::TypeMismatch(_)));
    }

    #[test]
    fn test_subscript_read_calls_get() {
        let program = start(vec![
            let_("arr", Expr::method(Expr::name("SystemInt32Array"), "ctor", vec![Expr::int(3)])),
            let_("v", Expr::subscript(Expr::name("arr"), Expr::int(1))),
        ])
        .unwrap();
        assert!(externs(&program).contains(&"SystemInt32Array.__Get__SystemInt32__SystemInt32"));
        let v = program.vars.iter().find(|v| v.name == "v").unwrap();
        assert_eq!(v.vm_type, "SystemInt32");
    }

    #[test]
    fn test_bare_attribute_is_unsupported() {
        let err = start(vec![let_("p", Expr::attr(Expr::name("this_trans"), "position"))]).unwrap_err();
        assert!(matches!(err.kind, ErrorKind::UnsupportedConstruct(_)));
        assert!(err.hint.unwrap().contains("get_position"));
    }
}
