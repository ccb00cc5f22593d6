use serde::{Deserialize, Serialize};

/// Source position of a node, as reported by the parser.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pos {
    pub line: u32,
    pub col: u32,
}

impl Pos {
    pub fn new(line: u32, col: u32) -> Self {
        Self { line, col }
    }
}

impl std::fmt::Display for Pos {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.line, self.col)
    }
}

/// One statement together with its source position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stmt {
    #[serde(default)]
    pub pos: Pos,
    pub kind: StmtKind,
}

/// Statement node.
///
/// The set is closed: anything the parser produces outside the supported
/// grammar arrives as one of the rejected variants (`For`, `Break`,
/// `Continue`, `Other`) and is refused by the compiler.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum StmtKind {
    // ─────────────────────────── Definitions ────────────────────────────
    /// `def name(a: T, ...) -> R: body`
    ///
    /// Names starting with `_` are VM lifecycle events.
    FunctionDef(FunctionDef),

    /// `global a, b`: marks variables as exported.
    Global(Vec<String>),

    // ─────────────────────────── Assignment ─────────────────────────────
    /// `target = value`
    Assign { target: Expr, value: Expr },

    /// `target op= value`
    AugAssign { target: Expr, op: BinOp, value: Expr },

    // ─────────────────────────── Control flow ───────────────────────────
    /// `if test: body else: orelse` (`elif` arrives as a nested `If`).
    If {
        test: Expr,
        body: Vec<Stmt>,
        #[serde(default)]
        orelse: Vec<Stmt>,
    },

    /// `while test: body`; a non-empty `orelse` is rejected.
    While {
        test: Expr,
        body: Vec<Stmt>,
        #[serde(default)]
        orelse: Vec<Stmt>,
    },

    /// `return [value]`
    Return(Option<Expr>),

    // ───────────────────────────── Misc ─────────────────────────────────
    /// Expression evaluated for its side effects.
    Expr(Expr),

    /// `import a, b`
    Import(Vec<String>),

    /// `from module import a, b`
    ImportFrom {
        module: Option<String>,
        names: Vec<String>,
    },

    Pass,

    // ──────────────────────────── Rejected ──────────────────────────────
    For,
    Break,
    Continue,

    /// Any other statement kind the parser knows about, by name.
    Other(String),
}

/// A function or event definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionDef {
    pub name: String,
    pub params: Vec<Param>,
    /// Return annotation; `None` means no return value.
    #[serde(default)]
    pub returns: Option<String>,
    pub body: Vec<Stmt>,
}

impl FunctionDef {
    /// Lifecycle events are marked by a leading underscore.
    pub fn is_event(&self) -> bool {
        self.name.starts_with('_')
    }
}

/// A function parameter with its (mandatory) type annotation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Param {
    pub name: String,
    #[serde(default)]
    pub annotation: Option<String>,
}

/// One expression together with its source position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Expr {
    #[serde(default)]
    pub pos: Pos,
    pub kind: ExprKind,
}

/// Expression node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ExprKind {
    // ───────────────────────────── Literals ─────────────────────────────
    Int(i64),
    Float(f64),
    Str(String),
    Bool(bool),
    /// `None`
    NoneLit,

    // ───────────────────────────── Access ───────────────────────────────
    /// Variable reference, or a type identifier used as a value.
    Name(String),

    /// `value.attr`; only meaningful as the callee of a `Call`.
    Attribute { value: Box<Expr>, attr: String },

    /// `value[index]`
    Subscript { value: Box<Expr>, index: Box<Expr> },

    /// `func(args...)`
    Call { func: Box<Expr>, args: Vec<Expr> },

    // ──────────────────────────── Operators ─────────────────────────────
    UnaryOp { op: UnaryOp, operand: Box<Expr> },

    BinOp {
        left: Box<Expr>,
        op: BinOp,
        right: Box<Expr>,
    },

    /// `left op0 c0 op1 c1 ...`; only a single operator is accepted.
    Compare {
        left: Box<Expr>,
        ops: Vec<CmpOp>,
        comparators: Vec<Expr>,
    },

    /// `a and b` / `a or b`; exactly two values are accepted.
    BoolOp { op: BoolOp, values: Vec<Expr> },

    /// Any other expression kind the parser knows about, by name.
    Other(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UnaryOp {
    Neg,
    Not,
    Pos,
    Invert,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    FloorDiv,
    Pow,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CmpOp {
    Eq,
    NotEq,
    Lt,
    Gt,
    LtE,
    GtE,
    Is,
    IsNot,
    In,
    NotIn,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BoolOp {
    And,
    Or,
}

impl StmtKind {
    /// Short human-readable name, used in diagnostics and trace output.
    pub fn describe(&self) -> String {
        match self {
            StmtKind::FunctionDef(def) => format!("definition of '{}'", def.name),
            StmtKind::Global(_) => "global declaration".to_string(),
            StmtKind::Assign { .. } => "assignment".to_string(),
            StmtKind::AugAssign { .. } => "augmented assignment".to_string(),
            StmtKind::If { .. } => "if statement".to_string(),
            StmtKind::While { .. } => "while statement".to_string(),
            StmtKind::Return(_) => "return statement".to_string(),
            StmtKind::Expr(_) => "expression statement".to_string(),
            StmtKind::Import(_) | StmtKind::ImportFrom { .. } => "import".to_string(),
            StmtKind::Pass => "pass".to_string(),
            StmtKind::For => "for statement".to_string(),
            StmtKind::Break => "break statement".to_string(),
            StmtKind::Continue => "continue statement".to_string(),
            StmtKind::Other(kind) => format!("{} statement", kind),
        }
    }
}

impl ExprKind {
    pub fn describe(&self) -> String {
        match self {
            ExprKind::Int(_) | ExprKind::Float(_) | ExprKind::Str(_) | ExprKind::Bool(_) => {
                "literal".to_string()
            }
            ExprKind::NoneLit => "None".to_string(),
            ExprKind::Name(id) => format!("name '{}'", id),
            ExprKind::Attribute { attr, .. } => format!("attribute '.{}'", attr),
            ExprKind::Subscript { .. } => "subscript".to_string(),
            ExprKind::Call { .. } => "call".to_string(),
            ExprKind::UnaryOp { op, .. } => format!("unary operator {}", op),
            ExprKind::BinOp { op, .. } => format!("binary operator {}", op),
            ExprKind::Compare { .. } => "comparison".to_string(),
            ExprKind::BoolOp { op, .. } => format!("boolean operator {}", op),
            ExprKind::Other(kind) => format!("{} expression", kind),
        }
    }
}

impl std::fmt::Display for UnaryOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            UnaryOp::Neg => "-",
            UnaryOp::Not => "not",
            UnaryOp::Pos => "+",
            UnaryOp::Invert => "~",
        };
        f.write_str(s)
    }
}

impl std::fmt::Display for BinOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            BinOp::Add => "+",
            BinOp::Sub => "-",
            BinOp::Mul => "*",
            BinOp::Div => "/",
            BinOp::Mod => "%",
            BinOp::FloorDiv => "//",
            BinOp::Pow => "**",
        };
        f.write_str(s)
    }
}

impl std::fmt::Display for CmpOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            CmpOp::Eq => "==",
            CmpOp::NotEq => "!=",
            CmpOp::Lt => "<",
            CmpOp::Gt => ">",
            CmpOp::LtE => "<=",
            CmpOp::GtE => ">=",
            CmpOp::Is => "is",
            CmpOp::IsNot => "is not",
            CmpOp::In => "in",
            CmpOp::NotIn => "not in",
        };
        f.write_str(s)
    }
}

impl std::fmt::Display for BoolOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BoolOp::And => f.write_str("and"),
            BoolOp::Or => f.write_str("or"),
        }
    }
}

// ───────────────────────────── Constructors ─────────────────────────────
//
// Hosts that build trees directly (instead of deserializing them) use these.

impl Stmt {
    pub fn new(kind: StmtKind, pos: Pos) -> Self {
        Self { pos, kind }
    }

    pub fn assign(target: Expr, value: Expr) -> Self {
        let pos = target.pos;
        Self::new(StmtKind::Assign { target, value }, pos)
    }

    pub fn aug_assign(target: Expr, op: BinOp, value: Expr) -> Self {
        let pos = target.pos;
        Self::new(StmtKind::AugAssign { target, op, value }, pos)
    }

    pub fn expr(value: Expr) -> Self {
        let pos = value.pos;
        Self::new(StmtKind::Expr(value), pos)
    }

    pub fn if_else(test: Expr, body: Vec<Stmt>, orelse: Vec<Stmt>) -> Self {
        let pos = test.pos;
        Self::new(StmtKind::If { test, body, orelse }, pos)
    }

    pub fn while_loop(test: Expr, body: Vec<Stmt>) -> Self {
        let pos = test.pos;
        Self::new(
            StmtKind::While {
                test,
                body,
                orelse: Vec::new(),
            },
            pos,
        )
    }

    pub fn ret(value: Option<Expr>) -> Self {
        let pos = value.as_ref().map(|v| v.pos).unwrap_or_default();
        Self::new(StmtKind::Return(value), pos)
    }

    pub fn global(names: &[&str]) -> Self {
        Self::new(
            StmtKind::Global(names.iter().map(|n| n.to_string()).collect()),
            Pos::default(),
        )
    }

    /// `def name(params) -> returns: body`, params given as `(name, type)`.
    pub fn def(name: &str, params: &[(&str, &str)], returns: Option<&str>, body: Vec<Stmt>) -> Self {
        Self::new(
            StmtKind::FunctionDef(FunctionDef {
                name: name.to_string(),
                params: params
                    .iter()
                    .map(|(n, t)| Param {
                        name: n.to_string(),
                        annotation: Some(t.to_string()),
                    })
                    .collect(),
                returns: returns.map(str::to_string),
                body,
            }),
            Pos::default(),
        )
    }
}

impl Expr {
    pub fn new(kind: ExprKind, pos: Pos) -> Self {
        Self { pos, kind }
    }

    pub fn at(mut self, line: u32, col: u32) -> Self {
        self.pos = Pos::new(line, col);
        self
    }

    pub fn int(n: i64) -> Self {
        Self::new(ExprKind::Int(n), Pos::default())
    }

    pub fn float(n: f64) -> Self {
        Self::new(ExprKind::Float(n), Pos::default())
    }

    pub fn str(s: &str) -> Self {
        Self::new(ExprKind::Str(s.to_string()), Pos::default())
    }

    pub fn bool(b: bool) -> Self {
        Self::new(ExprKind::Bool(b), Pos::default())
    }

    pub fn name(id: &str) -> Self {
        Self::new(ExprKind::Name(id.to_string()), Pos::default())
    }

    pub fn attr(value: Expr, attr: &str) -> Self {
        let pos = value.pos;
        Self::new(
            ExprKind::Attribute {
                value: Box::new(value),
                attr: attr.to_string(),
            },
            pos,
        )
    }

    pub fn subscript(value: Expr, index: Expr) -> Self {
        let pos = value.pos;
        Self::new(
            ExprKind::Subscript {
                value: Box::new(value),
                index: Box::new(index),
            },
            pos,
        )
    }

    pub fn call(func: Expr, args: Vec<Expr>) -> Self {
        let pos = func.pos;
        Self::new(
            ExprKind::Call {
                func: Box::new(func),
                args,
            },
            pos,
        )
    }

    /// `owner.member(args)`
    pub fn method(owner: Expr, member: &str, args: Vec<Expr>) -> Self {
        Self::call(Self::attr(owner, member), args)
    }

    pub fn unary(op: UnaryOp, operand: Expr) -> Self {
        let pos = operand.pos;
        Self::new(
            ExprKind::UnaryOp {
                op,
                operand: Box::new(operand),
            },
            pos,
        )
    }

    pub fn binop(left: Expr, op: BinOp, right: Expr) -> Self {
        let pos = left.pos;
        Self::new(
            ExprKind::BinOp {
                left: Box::new(left),
                op,
                right: Box::new(right),
            },
            pos,
        )
    }

    pub fn compare(left: Expr, op: CmpOp, right: Expr) -> Self {
        let pos = left.pos;
        Self::new(
            ExprKind::Compare {
                left: Box::new(left),
                ops: vec![op],
                comparators: vec![right],
            },
            pos,
        )
    }

    pub fn boolop(op: BoolOp, values: Vec<Expr>) -> Self {
        let pos = values.first().map(|v| v.pos).unwrap_or_default();
        Self::new(ExprKind::BoolOp { op, values }, pos)
    }
}
