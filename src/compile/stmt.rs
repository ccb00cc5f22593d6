use log::trace;

use super::symbols::Validity;
use super::{Compiler, Frame, Operand, RET_ADDR};
use crate::asm::ir::Init;
use crate::compile_error::{CompileError, Locate};
use crate::lang::node::{BinOp, Expr, ExprKind, Stmt, StmtKind};
use crate::lang::types::Type;

impl Compiler<'_> {
    pub(super) fn gen_block(&mut self, body: &[Stmt]) -> Result<(), CompileError> {
        for stmt in body {
            self.gen_stmt(stmt).at(stmt.pos)?;
        }
        Ok(())
    }

    pub(super) fn gen_stmt(&mut self, stmt: &Stmt) -> Result<(), CompileError> {
        trace!("{}: {}", stmt.pos, stmt.kind.describe());
        match &stmt.kind {
            StmtKind::Assign { target, value } => self.gen_assign(target, value),
            StmtKind::AugAssign { target, op, value } => self.gen_aug_assign(target, *op, value),
            StmtKind::If { test, body, orelse } => self.gen_if(test, body, orelse),
            StmtKind::While { test, body, orelse } => {
                if !orelse.is_empty() {
                    return Err(CompileError::unsupported("`else` clause on a while loop"));
                }
                self.gen_while(test, body)
            }
            StmtKind::Return(value) => self.gen_return(value.as_ref()),
            StmtKind::Expr(value) => self.gen_expr_stmt(value),
            StmtKind::Global(names) => {
                for name in names {
                    self.vars.mark_exported(name);
                }
                Ok(())
            }
            StmtKind::Import(_) | StmtKind::ImportFrom { .. } | StmtKind::Pass => Ok(()),
            StmtKind::FunctionDef(def) => Err(CompileError::unsupported(format!(
                "nested definition of '{}'",
                def.name
            ))),
            other @ (StmtKind::For | StmtKind::Break | StmtKind::Continue | StmtKind::Other(_)) => {
                Err(CompileError::unsupported(other.describe()))
            }
        }
    }

    // =========================================================================
    // Assignment
    // =========================================================================

    fn gen_assign(&mut self, target: &Expr, value: &Expr) -> Result<(), CompileError> {
        match &target.kind {
            ExprKind::Name(name) => self.assign_name(name, value),
            ExprKind::Subscript {
                value: container,
                index,
            } => {
                // container[index] = value  =>  container.Set(index, value)
                let receiver = self.value(container)?;
                let index = self.value(index)?;
                let item = self.value(value)?;
                self.instance_call(receiver, "Set", vec![index, item])
                    .at(target.pos)?;
                Ok(())
            }
            other => Err(CompileError::unsupported(format!("assignment to {}", other.describe()))
                .at(target.pos)),
        }
    }

    /// `target op= value` is `target = target op value`.
    fn gen_aug_assign(&mut self, target: &Expr, op: BinOp, value: &Expr) -> Result<(), CompileError> {
        let combined = Expr::new(
            ExprKind::BinOp {
                left: Box::new(target.clone()),
                op,
                right: Box::new(value.clone()),
            },
            target.pos,
        );
        self.gen_assign(target, &combined)
    }

    fn assign_name(&mut self, name: &str, value: &Expr) -> Result<(), CompileError> {
        let src = self.expr(value)?;
        let dst = self.resolve(name);
        match src {
            Operand::Nothing => {
                if self.vars.contains(&dst) {
                    Err(CompileError::type_mismatch(format!(
                        "cannot assign a call without a result to '{}'",
                        name
                    )))
                } else {
                    self.vars.declare(&dst, &Type::Void, Init::Null)
                }
            }
            // `x = SystemInt32` declares `x` without initializing it.
            Operand::TypeRef(ty) => self.vars.declare(&dst, &ty, Init::Null),
            Operand::Var(src) => {
                let ty = self.type_of(&src)?;
                match self.vars.validate_type(&dst, &ty) {
                    Validity::NotExist => self.vars.declare(&dst, &ty, Init::Null)?,
                    Validity::Valid => {}
                    Validity::Invalid => {
                        let declared = self.type_of(&dst)?;
                        return Err(CompileError::type_mismatch(format!(
                            "cannot assign {} to '{}' of type {}",
                            ty, name, declared
                        ))
                        .with_hint(format!("convert explicitly, e.g. `{}(...)`", declared)));
                    }
                }
                self.emitter.assign(&dst, &src);
                Ok(())
            }
        }
    }

    /// `name = <literal>` at module level, for a name not declared yet: the
    /// literal becomes the variable's data-segment initializer and no code is
    /// emitted. Returns `false` when the assignment needs code.
    pub(super) fn gen_data_init(&mut self, target: &Expr, value: &Expr) -> Result<bool, CompileError> {
        let ExprKind::Name(name) = &target.kind else {
            return Ok(false);
        };
        if self.vars.contains(name) {
            return Ok(false);
        }
        let Some((ty, init)) = self.literal_init(value)? else {
            return Ok(false);
        };
        self.vars.declare(name, &ty, init)?;
        Ok(true)
    }

    // =========================================================================
    // Control flow
    // =========================================================================

    /// Lower a condition and check it is a Boolean.
    fn condition(&mut self, test: &Expr) -> Result<String, CompileError> {
        let var = self.value(test)?;
        let ty = self.type_of(&var)?;
        if ty != Type::boolean() {
            return Err(CompileError::type_mismatch(format!("condition must be SystemBoolean, found {}", ty))
                .at(test.pos));
        }
        Ok(var)
    }

    fn gen_if(&mut self, test: &Expr, body: &[Stmt], orelse: &[Stmt]) -> Result<(), CompileError> {
        let else_label = self.emitter.fresh_label("else_label");
        let end_label = self.emitter.fresh_label("if_end_label");

        let cond = self.condition(test)?;
        self.emitter.jump_if_false(&cond, else_label);
        self.gen_block(body)?;
        self.emitter.jump(end_label);
        self.emitter.bind(else_label)?;
        self.gen_block(orelse)?;
        self.emitter.bind(end_label)
    }

    fn gen_while(&mut self, test: &Expr, body: &[Stmt]) -> Result<(), CompileError> {
        let top = self.emitter.fresh_label("while_label");
        let end = self.emitter.fresh_label("while_end_label");

        self.emitter.bind(top)?;
        let cond = self.condition(test)?;
        self.emitter.jump_if_false(&cond, end);
        self.gen_block(body)?;
        self.emitter.jump(top);
        self.emitter.bind(end)
    }

    fn gen_return(&mut self, value: Option<&Expr>) -> Result<(), CompileError> {
        let ret = match &self.scope.frame {
            Frame::Function { ret } => ret.clone(),
            Frame::Event => {
                if value.is_some() {
                    return Err(CompileError::type_mismatch("an event cannot return a value"));
                }
                // Leaving an event halts the VM.
                self.emitter.end();
                return Ok(());
            }
            Frame::Module => return Err(CompileError::unsupported("return outside of a function")),
        };

        let Some(value) = value else {
            if !ret.is_void() {
                return Err(CompileError::type_mismatch(format!("missing return value of type {}", ret)));
            }
            self.emitter.ret(RET_ADDR, None);
            return Ok(());
        };

        if ret.is_void() {
            return Err(CompileError::type_mismatch("a function without a return type cannot return a value")
                .with_hint("annotate the function with `-> <type>`"));
        }

        self.emitter.pop_into(RET_ADDR);
        let var = self.value(value)?;
        let ty = self.type_of(&var)?;
        if ty != ret {
            return Err(CompileError::type_mismatch(format!("expected return value of type {}, found {}", ret, ty))
                .at(value.pos));
        }
        self.emitter.leave(RET_ADDR, Some(&var));
        Ok(())
    }

    /// An expression evaluated for its effects. A user call's result is
    /// dropped from the stack.
    fn gen_expr_stmt(&mut self, value: &Expr) -> Result<(), CompileError> {
        match &value.kind {
            ExprKind::Call { func, args } => {
                self.call(func, args, true).at(value.pos)?;
            }
            _ => {
                self.expr(value)?;
            }
        }
        Ok(())
    }
}
