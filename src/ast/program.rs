use serde::{Deserialize, Serialize};

use super::stmt::{Stmt, StructInfo};

/// A parsed compile unit. `raw_source` is retained byte-identical to the file
/// contents (Invariant 1/3) so diagnostics and doc-comment extraction can
/// index back into the original text by line.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Program {
    pub file: String,
    pub raw_source: String,
    pub stmts: Vec<Stmt>,
    pub structs: Vec<StructInfo>,
}

impl Program {
    pub fn line(&self, one_based: usize) -> Option<&str> {
        self.raw_source.lines().nth(one_based.checked_sub(1)?)
    }
}
