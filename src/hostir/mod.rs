//! Host-language IR (L9, spec.md §4.9): the target this crate's codegen
//! emits instead of text. Split into per-node-family files the way the
//! teacher separates its target IR (`ast::rq`) from its printer
//! (`sql::gen_query`/`sql::gen_expr`) — here the target is a general host
//! language rather than SQL, so the node catalog itself is original to this
//! crate; only the typed-IR-then-dedicated-printer split is borrowed.

pub mod decl;
pub mod expr;
pub mod printer;
pub mod stmt;

pub use decl::{Decl, File, FuncDecl, Import, Param, VarDecl};
pub use expr::Expr;
pub use printer::{print_expr, print_file};
pub use stmt::{AssignOp, Stmt};
