//! Static data the compiler consults but never changes: the type table, the
//! method/operator catalog and the lifecycle-event signature table.
//!
//! A built-in seed catalog covers the primitive operators and a handful of
//! common library members; hosts layer JSON overlays on top of it.

mod builtin;

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

use crate::lang::types::{Type, VOID_ANNOTATION};

/// How a catalog member is invoked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MethodKind {
    StaticFunc,
    Constructor,
    InstanceFunc,
}

impl std::fmt::Display for MethodKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MethodKind::StaticFunc => write!(f, "static function"),
            MethodKind::Constructor => write!(f, "constructor"),
            MethodKind::InstanceFunc => write!(f, "instance function"),
        }
    }
}

/// Lookup key: call shape plus the exact argument types.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MethodKey {
    pub kind: MethodKind,
    pub owner: String,
    pub name: String,
    pub args: Vec<Type>,
}

/// What a catalog hit resolves to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Method {
    pub ret: Type,
    /// Linkage symbol passed to `EXTERN`.
    pub symbol: String,
}

/// One `(type, slot)` pair of an event signature. The host writes the
/// argument into the variable named `slot` before entering the event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventArg {
    pub ty: String,
    pub slot: String,
}

/// Serialized form of one catalog member.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MethodEntry {
    pub kind: MethodKind,
    pub owner: String,
    pub name: String,
    #[serde(default)]
    pub args: Vec<String>,
    /// `None` for members without a result.
    #[serde(default)]
    pub ret: Option<String>,
    #[serde(rename = "extern")]
    pub symbol: String,
}

/// Serialized catalog overlay.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CatalogFile {
    #[serde(default)]
    pub types: BTreeMap<String, String>,
    #[serde(default)]
    pub methods: Vec<MethodEntry>,
    #[serde(default)]
    pub events: BTreeMap<String, Vec<EventArg>>,
}

#[derive(Debug, Clone, Default)]
pub struct Catalog {
    /// Source type identifier -> VM type name.
    types: HashMap<String, String>,
    methods: HashMap<MethodKey, Method>,
    events: HashMap<String, Vec<EventArg>>,
}

impl Catalog {
    /// An empty catalog; nothing resolves.
    pub fn empty() -> Self {
        Self::default()
    }

    /// The seed catalog shipped with the compiler.
    pub fn builtin() -> Self {
        let mut catalog = Self::empty();
        catalog.merge(builtin::seed());
        catalog
    }

    /// Parse a JSON overlay.
    pub fn file_from_json(json: &str) -> Result<CatalogFile, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Layer `file` over the current contents. Later entries win.
    pub fn merge(&mut self, file: CatalogFile) {
        self.types.extend(file.types);
        for entry in file.methods {
            self.add_method(entry);
        }
        self.events.extend(file.events);
    }

    fn add_method(&mut self, entry: MethodEntry) {
        let key = MethodKey {
            kind: entry.kind,
            owner: entry.owner,
            name: entry.name,
            args: entry.args.iter().map(|a| Type::named(a)).collect(),
        };
        let ret = match entry.ret.as_deref() {
            None | Some(VOID_ANNOTATION) => Type::Void,
            Some(name) => Type::named(name),
        };
        self.methods.insert(
            key,
            Method {
                ret,
                symbol: entry.symbol,
            },
        );
    }

    // ─────────────────────────────── Queries ────────────────────────────────

    /// Is `ident` a recognized primitive type identifier?
    pub fn is_type(&self, ident: &str) -> bool {
        self.types.contains_key(ident)
    }

    /// VM spelling of a type for the data segment.
    pub fn vm_type_name(&self, ident: &str) -> Option<&str> {
        self.types.get(ident).map(String::as_str)
    }

    /// Exact-match lookup; no coercion, no overload ranking.
    pub fn method(&self, kind: MethodKind, owner: &str, name: &str, args: &[Type]) -> Option<&Method> {
        let key = MethodKey {
            kind,
            owner: owner.to_string(),
            name: name.to_string(),
            args: args.to_vec(),
        };
        self.methods.get(&key)
    }

    /// Required argument signature of a lifecycle event, if it is known.
    pub fn event(&self, name: &str) -> Option<&[EventArg]> {
        self.events.get(name).map(Vec::as_slice)
    }
}

/// Linkage symbol in the VM's naming scheme:
/// `Owner.__name__Arg1_Arg2__Ret`, with the argument part omitted when empty.
pub fn extern_symbol(owner: &str, name: &str, args: &[&str], ret: &str) -> String {
    if args.is_empty() {
        format!("{}.__{}__{}", owner, name, ret)
    } else {
        format!("{}.__{}__{}__{}", owner, name, args.join("_"), ret)
    }
}
