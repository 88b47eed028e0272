//! Typed AST (L4): node kinds plus the traversal helpers every later stage
//! (type inference, semantic checks, codegen) walks.

pub mod expr;
pub mod ident;
pub mod program;
pub mod stmt;
pub mod visit;

pub use expr::*;
pub use ident::IdentPath;
pub use program::Program;
pub use stmt::*;
pub use visit::{collect_assign_targets, collect_dispatch_handlers, collect_idents, walk_exprs, walk_stmts};
