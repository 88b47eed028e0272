//! File-scope declarations: the top level of a generated host source file.

use super::expr::Expr;
use super::stmt::Stmt;

#[derive(Debug, Clone)]
pub struct File {
    pub package: String,
    pub imports: Vec<Import>,
    pub decls: Vec<Decl>,
}

#[derive(Debug, Clone)]
pub struct Import {
    pub path: String,
    /// `_` when the import is pulled in only for its runtime side effects
    /// and never referenced, matching spec.md §4.10's "silence unused"
    /// aliasing step.
    pub alias: Option<String>,
}

#[derive(Debug, Clone)]
pub enum Decl {
    Func(FuncDecl),
    Var(VarDecl),
    /// Escape hatch (spec.md §4.9): a file-scope fragment emitted verbatim
    /// — the runtime prelude/postlude and per-module embedded runtimes are
    /// carried this way rather than modeled node-by-node.
    Raw(String),
}

#[derive(Debug, Clone)]
pub struct Param {
    pub name: String,
    pub ty: String,
}

#[derive(Debug, Clone, Default)]
pub struct FuncDecl {
    pub name: String,
    pub params: Vec<Param>,
    /// Set when this function's defaulted-parameter form needed a variadic
    /// signature (spec.md §4.10 step 4).
    pub variadic: Option<Param>,
    pub results: Vec<String>,
    pub body: Vec<Stmt>,
}

#[derive(Debug, Clone)]
pub struct VarDecl {
    pub name: String,
    pub ty: Option<String>,
    pub value: Option<Expr>,
}
