//! Host-language expression IR, built by codegen (L10) and rendered by
//! [`super::printer`]. One node per shape codegen actually emits (spec.md
//! §4.9/§4.10) rather than a general-purpose target-language grammar.

use super::stmt::Stmt;

#[derive(Debug, Clone)]
pub enum Expr {
    Ident(String),
    Int(i64),
    Float(f64),
    /// Already host-escaped; the printer wraps it in quotes verbatim.
    String(String),
    Bool(bool),
    Nil,
    Binary {
        left: Box<Expr>,
        op: &'static str,
        right: Box<Expr>,
    },
    Unary {
        op: &'static str,
        expr: Box<Expr>,
    },
    /// `T(expr)` numeric/interface conversion.
    Cast {
        ty: String,
        expr: Box<Expr>,
    },
    /// `expr.(T)` — used by dispatch-table lookups and bridge return
    /// unwrapping.
    TypeAssert {
        expr: Box<Expr>,
        ty: String,
    },
    Call {
        callee: Box<Expr>,
        args: Vec<Expr>,
        /// Trailing `args...` spread, for variadic bridge calls.
        spread: bool,
    },
    /// `target.method(args)`, kept distinct from [`Expr::Call`] over a
    /// [`Expr::Dot`] callee so codegen can special-case task methods
    /// (`.wait`, `.value`, `.done`) without re-deriving the shape.
    MethodCall {
        target: Box<Expr>,
        method: String,
        args: Vec<Expr>,
    },
    Dot {
        target: Box<Expr>,
        field: String,
    },
    Index {
        target: Box<Expr>,
        index: Box<Expr>,
    },
    Slice {
        target: Box<Expr>,
        start: Option<Box<Expr>>,
        end: Option<Box<Expr>>,
    },
    Paren(Box<Expr>),
    /// `[]T{elems...}`.
    SliceLiteral {
        elem_ty: String,
        elems: Vec<Expr>,
    },
    /// `map[K]V{key: value, ...}`.
    MapLiteral {
        key_ty: String,
        value_ty: String,
        entries: Vec<(Expr, Expr)>,
    },
    /// `fmt.Sprintf(format, args...)` — the fallback for string
    /// interpolation when not every part is a typed string (spec.md
    /// §4.10).
    Sprintf {
        format: String,
        args: Vec<Expr>,
    },
    /// Native `+`-chained string concatenation — used instead of
    /// [`Expr::Sprintf`] when every interpolated part is already `string`.
    Concat(Vec<Expr>),
    /// Immediately-invoked function literal: `func(...) T { ... }()`. Used
    /// to lower `try`/`spawn`/`parallel`/short-circuit-on-non-bool.
    Iife {
        results: Vec<String>,
        body: Vec<Stmt>,
    },
    /// A non-invoked function literal — lambdas and callback adapters.
    Lambda {
        params: Vec<(String, String)>,
        results: Vec<String>,
        body: Vec<Stmt>,
    },
    /// Escape hatch (spec.md §4.9) for fragments not worth modeling, e.g.
    /// an inline `e := recover(); e != nil` initializer clause.
    Raw(String),
}

impl Expr {
    pub fn ident<S: Into<String>>(name: S) -> Self {
        Expr::Ident(name.into())
    }

    pub fn call(callee: Expr, args: Vec<Expr>) -> Self {
        Expr::Call { callee: Box::new(callee), args, spread: false }
    }

    pub fn dot(target: Expr, field: impl Into<String>) -> Self {
        Expr::Dot { target: Box::new(target), field: field.into() }
    }
}
