use crate::asm::{Instr, LabelId};
use serde::{Deserialize, Serialize};

/// Initial value of a data-segment variable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Init {
    Null,
    /// Literal text exactly as it appears in the data segment.
    Literal(String),
    /// Address of a code label; filled in by the link pass.
    Label(LabelId),
    Addr(u32),
}

/// One data-segment declaration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataVar {
    pub name: String,
    /// VM spelling of the variable's type.
    pub vm_type: String,
    pub init: Init,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Label {
    pub name: String,
    pub addr: Option<u32>,
}

/// An assembled compile unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AsmProgram {
    /// Exported variable names, in `global` order.
    pub exports: Vec<String>,

    /// Every known variable, in declaration order.
    pub vars: Vec<DataVar>,

    /// Exported lifecycle events, in declaration order.
    pub events: Vec<String>,

    /// Instruction stream.
    pub code: Vec<Instr>,

    /// Label table; `LabelId` indexes into it.
    pub labels: Vec<Label>,
}

impl AsmProgram {
    /// Total encoded size of the code segment.
    pub fn code_len(&self) -> u32 {
        self.code.iter().map(Instr::width).sum()
    }

    pub fn label(&self, id: LabelId) -> &Label {
        &self.labels[id.0]
    }

    /// Byte address of every instruction, in order.
    pub fn addresses(&self) -> Vec<u32> {
        let mut pc = 0;
        self.code
            .iter()
            .map(|i| {
                let at = pc;
                pc += i.width();
                at
            })
            .collect()
    }

    /// Serialize to postcard bytes.
    pub fn dump(&self) -> Result<Vec<u8>, postcard::Error> {
        postcard::to_allocvec(self)
    }

    /// Deserialize from bytes produced by [`AsmProgram::dump`].
    pub fn load(bytes: &[u8]) -> Result<Self, postcard::Error> {
        postcard::from_bytes(bytes)
    }
}
