use serde::{Deserialize, Serialize};

use super::node::Stmt;

/// Parsed compile unit: the module's top-level statements in source order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Module {
    pub body: Vec<Stmt>,
}

impl Module {
    pub fn new(body: Vec<Stmt>) -> Self {
        Self { body }
    }

    /// Read a module from the JSON form produced by the external parser.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}
