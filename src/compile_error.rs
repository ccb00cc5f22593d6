use crate::catalog::MethodKind;
use crate::lang::node::Pos;
use crate::lang::types::{Type, fmt_types};

/// What kind of name failed to resolve.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SymbolKind {
    Variable,
    Function,
    Type,
    Label,
}

impl std::fmt::Display for SymbolKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SymbolKind::Variable => write!(f, "variable"),
            SymbolKind::Function => write!(f, "function"),
            SymbolKind::Type => write!(f, "type"),
            SymbolKind::Label => write!(f, "label"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ErrorKind {
    /// Duplicate declaration, or a declaration with the void type.
    #[error("cannot declare '{name}': {reason}")]
    Declaration { name: String, reason: String },

    #[error("undefined {kind} '{name}'")]
    UndefinedSymbol { kind: SymbolKind, name: String },

    #[error("type mismatch: {0}")]
    TypeMismatch(String),

    /// An AST node outside the accepted grammar.
    #[error("unsupported {0}")]
    UnsupportedConstruct(String),

    /// No catalog entry for the exact call shape.
    #[error("{kind} {owner}.{name}{args} not found")]
    MethodNotFound {
        kind: MethodKind,
        owner: String,
        name: String,
        args: String,
    },

    #[error("malformed expression: {0}")]
    MalformedExpression(String),

    #[error("label '{0}' is referenced but never bound")]
    UnresolvedLabel(String),
}

/// A fatal compile error, positioned at the node where it was detected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompileError {
    pub kind: ErrorKind,
    pub pos: Option<Pos>,
    pub hint: Option<String>,
}

impl CompileError {
    pub fn new(kind: ErrorKind) -> Self {
        Self {
            kind,
            pos: None,
            hint: None,
        }
    }

    pub fn declaration(name: &str, reason: impl Into<String>) -> Self {
        Self::new(ErrorKind::Declaration {
            name: name.to_string(),
            reason: reason.into(),
        })
    }

    pub fn undefined(kind: SymbolKind, name: impl Into<String>) -> Self {
        Self::new(ErrorKind::UndefinedSymbol {
            kind,
            name: name.into(),
        })
    }

    pub fn type_mismatch(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::TypeMismatch(msg.into()))
    }

    pub fn unsupported(what: impl Into<String>) -> Self {
        Self::new(ErrorKind::UnsupportedConstruct(what.into()))
    }

    pub fn method_not_found(kind: MethodKind, owner: &str, name: &str, args: &[Type]) -> Self {
        Self::new(ErrorKind::MethodNotFound {
            kind,
            owner: owner.to_string(),
            name: name.to_string(),
            args: fmt_types(args),
        })
    }

    pub fn malformed(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::MalformedExpression(msg.into()))
    }

    pub fn unresolved_label(name: &str) -> Self {
        Self::new(ErrorKind::UnresolvedLabel(name.to_string()))
    }

    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }

    /// Attach a position unless one is already known. The innermost
    /// detection point wins; `0:0` marks a node without a position and is
    /// skipped so an enclosing node can supply one.
    pub fn at(mut self, pos: Pos) -> Self {
        if pos != Pos::default() {
            self.pos.get_or_insert(pos);
        }
        self
    }
}

impl std::fmt::Display for CompileError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if let Some(pos) = self.pos {
            write!(f, "{}: ", pos)?;
        }
        write!(f, "compile error: {}", self.kind)?;
        if let Some(h) = &self.hint {
            write!(f, "\n  hint: {}", h)?;
        }
        Ok(())
    }
}

impl std::error::Error for CompileError {}

/// Position results coming back from table lookups.
pub trait Locate<T> {
    fn at(self, pos: Pos) -> Result<T, CompileError>;
}

impl<T> Locate<T> for Result<T, CompileError> {
    fn at(self, pos: Pos) -> Result<T, CompileError> {
        self.map_err(|e| e.at(pos))
    }
}
