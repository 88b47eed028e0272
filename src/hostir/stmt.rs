//! Host-language statement IR. Mirrors the shapes spec.md §4.10 names:
//! assignment (declare vs. reassign), the 3-clause and range forms of
//! `for`, `switch`, and the concurrency statements (`defer`, `go`) codegen
//! needs for `try`/`spawn`/`parallel` lowering.

use super::expr::Expr;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssignOp {
    /// `:=` — first binding of this name in the current block.
    Declare,
    /// `=` — reassignment of an already-declared name.
    Assign,
}

#[derive(Debug, Clone)]
pub enum Stmt {
    Assign {
        targets: Vec<String>,
        op: AssignOp,
        values: Vec<Expr>,
    },
    /// `target[index] = value` — kept as its own node (rather than folded
    /// into `Assign`'s string-target list) since the LHS is itself an
    /// expression, not a plain identifier.
    IndexAssign {
        target: Expr,
        index: Expr,
        value: Expr,
    },
    ExprStmt(Expr),
    If {
        cond: Expr,
        then_body: Vec<Stmt>,
        else_body: Option<Vec<Stmt>>,
    },
    /// `for init; cond; post { ... }` — emitted instead of materializing a
    /// sequence when codegen detects an integer-range loop.
    ForClause {
        init: Option<Box<Stmt>>,
        cond: Option<Expr>,
        post: Option<Box<Stmt>>,
        body: Vec<Stmt>,
    },
    /// `for key, value := range iterable { ... }`.
    ForRange {
        key: Option<String>,
        value: Option<String>,
        iterable: Expr,
        body: Vec<Stmt>,
    },
    Switch {
        tag: Option<Expr>,
        cases: Vec<(Vec<Expr>, Vec<Stmt>)>,
        default: Option<Vec<Stmt>>,
    },
    Return(Vec<Expr>),
    Defer(Expr),
    Go(Expr),
    /// `//line file:N` — reinserted before a statement when codegen's own
    /// line-prefixing would otherwise mismatch a panic's reported location.
    LineDirective {
        file: String,
        line: usize,
    },
    /// Escape hatch (spec.md §4.9): a host statement emitted verbatim.
    Raw(String),
}
