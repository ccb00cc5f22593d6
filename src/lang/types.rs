use serde::{Deserialize, Serialize};

/// Source-level type identifier, e.g. `SystemInt32`.
pub type TypeName = String;

/// Annotation spelling that means "no value".
pub const VOID_ANNOTATION: &str = "SystemVoid";

pub const INT32: &str = "SystemInt32";
pub const UINT32: &str = "SystemUInt32";
pub const SINGLE: &str = "SystemSingle";
pub const STRING: &str = "SystemString";
pub const BOOLEAN: &str = "SystemBoolean";
pub const OBJECT: &str = "SystemObject";

/// Static type of a value.
///
/// `Void` is a sentinel: it is what a call without a result produces, and a
/// variable can never be declared with it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Type {
    Void,
    Named(TypeName),
}

impl Type {
    pub fn named(name: &str) -> Self {
        Type::Named(name.to_string())
    }

    pub fn int32() -> Self {
        Self::named(INT32)
    }

    pub fn uint32() -> Self {
        Self::named(UINT32)
    }

    pub fn single() -> Self {
        Self::named(SINGLE)
    }

    pub fn string() -> Self {
        Self::named(STRING)
    }

    pub fn boolean() -> Self {
        Self::named(BOOLEAN)
    }

    pub fn object() -> Self {
        Self::named(OBJECT)
    }

    pub fn is_void(&self) -> bool {
        matches!(self, Type::Void)
    }

    /// The identifier, or `SystemVoid` for the sentinel.
    pub fn name(&self) -> &str {
        match self {
            Type::Void => VOID_ANNOTATION,
            Type::Named(n) => n,
        }
    }
}

impl std::fmt::Display for Type {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Render an argument-type tuple the way diagnostics show it: `(A, B)`.
pub fn fmt_types(types: &[Type]) -> String {
    let names: Vec<&str> = types.iter().map(Type::name).collect();
    format!("({})", names.join(", "))
}
