//! Flat variable namespace and the user-function signature registry.
//!
//! The VM has no scopes, so every variable lives for the whole compile unit.
//! Function-local names are made unique with [`qualify`] before they
//! get here.

use std::collections::HashMap;

use crate::asm::ir::{DataVar, Init};
use crate::catalog::Catalog;
use crate::compile_error::{CompileError, SymbolKind};
use crate::lang::types::{Type, fmt_types};

/// Outcome of [`VarTable::validate_type`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Validity {
    Valid,
    Invalid,
    NotExist,
}

#[derive(Debug, Clone)]
struct VarEntry {
    ty: Type,
    init: Init,
}

#[derive(Debug, Default)]
pub struct VarTable {
    /// Declaration order, which is also data-segment order.
    order: Vec<String>,
    vars: HashMap<String, VarEntry>,
    exported: Vec<String>,
}

impl VarTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn declare(&mut self, name: &str, ty: &Type, init: Init) -> Result<(), CompileError> {
        if self.vars.contains_key(name) {
            return Err(CompileError::declaration(name, "already declared"));
        }
        if ty.is_void() {
            return Err(CompileError::declaration(name, "a variable cannot have the void type")
                .with_hint("the right-hand side produces no value"));
        }
        self.order.push(name.to_string());
        self.vars.insert(
            name.to_string(),
            VarEntry {
                ty: ty.clone(),
                init,
            },
        );
        Ok(())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.vars.contains_key(name)
    }

    /// Type of a variable. A recognized type identifier that is not a
    /// variable denotes that type itself (casts and declarations use it).
    pub fn type_of(&self, name: &str, catalog: &Catalog) -> Result<Type, CompileError> {
        if let Some(entry) = self.vars.get(name) {
            return Ok(entry.ty.clone());
        }
        if catalog.is_type(name) {
            return Ok(Type::named(name));
        }
        Err(CompileError::undefined(SymbolKind::Variable, name))
    }

    /// Resolve a source name inside the function or event whose locals carry
    /// `prefix`: a qualified local wins, anything else is the global.
    pub fn resolve(&self, prefix: &str, name: &str) -> String {
        if !prefix.is_empty() {
            let local = qualify(prefix, name);
            if self.vars.contains_key(&local) {
                return local;
            }
        }
        name.to_string()
    }

    pub fn validate_type(&self, name: &str, expected: &Type) -> Validity {
        match self.vars.get(name) {
            None => Validity::NotExist,
            Some(entry) if &entry.ty == expected => Validity::Valid,
            Some(_) => Validity::Invalid,
        }
    }

    pub fn mark_exported(&mut self, name: &str) {
        if !self.exported.iter().any(|n| n == name) {
            self.exported.push(name.to_string());
        }
    }

    /// Produce the data segment: (exports, declarations).
    pub fn into_data_segment(self, catalog: &Catalog) -> Result<(Vec<String>, Vec<DataVar>), CompileError> {
        for name in &self.exported {
            if !self.vars.contains_key(name) {
                return Err(CompileError::undefined(SymbolKind::Variable, name.as_str())
                    .with_hint("a `global` name must be assigned somewhere in the script"));
            }
        }

        let mut vars = self.vars;
        let mut data = Vec::with_capacity(self.order.len());
        for name in self.order {
            let Some(entry) = vars.remove(&name) else {
                continue;
            };
            let vm_type = catalog
                .vm_type_name(entry.ty.name())
                .ok_or_else(|| CompileError::undefined(SymbolKind::Type, entry.ty.name()))?
                .to_string();
            data.push(DataVar {
                name,
                vm_type,
                init: entry.init,
            });
        }
        Ok((self.exported, data))
    }
}

/// A registered user function.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Signature {
    pub ret: Type,
    pub params: Vec<String>,
}

/// User functions keyed by `(name, exact argument types)`.
#[derive(Debug, Default)]
pub struct SignatureTable {
    funcs: HashMap<(String, Vec<Type>), Signature>,
}

impl SignatureTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_function(
        &mut self,
        name: &str,
        arg_types: Vec<Type>,
        ret: Type,
        arg_names: Vec<String>,
    ) -> Result<(), CompileError> {
        let key = (name.to_string(), arg_types);
        if self.funcs.contains_key(&key) {
            return Err(CompileError::declaration(
                name,
                format!("function with arguments {} is defined twice", fmt_types(&key.1)),
            ));
        }
        self.funcs.insert(
            key,
            Signature {
                ret,
                params: arg_names,
            },
        );
        Ok(())
    }

    pub fn get(&self, name: &str, arg_types: &[Type]) -> Option<&Signature> {
        self.funcs.get(&(name.to_string(), arg_types.to_vec()))
    }

    /// Exact-tuple match only; no widening.
    pub fn return_type_of(&self, name: &str, arg_types: &[Type]) -> Result<&Type, CompileError> {
        self.get(name, arg_types).map(|s| &s.ret).ok_or_else(|| {
            CompileError::undefined(
                SymbolKind::Function,
                format!("{}{}", name, fmt_types(arg_types)),
            )
            .with_hint("argument types must match a definition exactly")
        })
    }
}

/// Flat-namespace name of a local: `owner__name`.
pub fn qualify(prefix: &str, name: &str) -> String {
    format!("{}__{}", prefix, name)
}

/// Identifier of one overload, used for its entry label and to qualify its
/// locals: `name__T1_T2`, or just `name` without parameters.
pub fn function_id(name: &str, arg_types: &[Type]) -> String {
    if arg_types.is_empty() {
        return name.to_string();
    }
    let types: Vec<&str> = arg_types.iter().map(Type::name).collect();
    format!("{}__{}", name, types.join("_"))
}
