pub mod emitter;
pub mod ir;
pub mod link;
pub mod op;
pub mod render;

pub use emitter::Emitter;
pub use ir::AsmProgram;
pub use op::{Instr, LabelId, Target};
