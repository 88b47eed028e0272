use enum_as_inner::EnumAsInner;
use serde::{Deserialize, Serialize};

use crate::error::Span;

use super::expr::{CaseArm, Expr};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stmt {
    pub id: usize,
    #[serde(flatten)]
    pub kind: StmtKind,
    #[serde(skip)]
    pub span: Option<Span>,
    /// First original-source line of this statement.
    pub line: usize,
    /// Last original-source line of this statement.
    pub end_line: usize,
}

impl Stmt {
    pub fn new(id: usize, kind: StmtKind, line: usize, end_line: usize) -> Self {
        Stmt {
            id,
            kind,
            span: None,
            line,
            end_line,
        }
    }

    pub fn stmt_line(&self) -> usize {
        self.line
    }

    pub fn stmt_end_line(&self) -> usize {
        self.end_line
    }
}

#[derive(Debug, EnumAsInner, Clone, PartialEq, Serialize, Deserialize)]
pub enum StmtKind {
    Assign {
        target: String,
        value: Expr,
    },
    IndexAssign {
        target: Expr,
        index: Expr,
        value: Expr,
    },
    DotAssign {
        target: Expr,
        field: String,
        value: Expr,
    },
    Expr(Expr),
    If(IfStmt),
    While {
        cond: Expr,
        body: Vec<Stmt>,
    },
    For(ForStmt),
    Break,
    Next,
    Return(Option<Expr>),
    ImplicitReturn(Expr),
    TryResult(Expr),
    SpawnReturn(Expr),
    TryHandlerReturn(Expr),
    FuncDef(FuncDef),
    TestDef(TestDef),
    BenchDef(BenchDef),
    Use(UseDirective),
    Import(ImportDirective),
    Require(RequireDirective),
    Sandbox(SandboxDirective),
    CaseStmt(CaseStmtNode),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IfStmt {
    pub cond: Expr,
    pub then_body: Vec<Stmt>,
    pub elifs: Vec<(Expr, Vec<Stmt>)>,
    pub else_body: Option<Vec<Stmt>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForStmt {
    pub var: String,
    /// Set for `for k, v in hash` forms.
    pub value_var: Option<String>,
    pub iterable: Expr,
    pub body: Vec<Stmt>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaseStmtNode {
    pub subject: Option<Expr>,
    pub arms: Vec<(Expr, Vec<Stmt>)>,
    pub else_body: Option<Vec<Stmt>>,
}

impl From<CaseArm> for (Expr, Expr) {
    fn from(arm: CaseArm) -> Self {
        (arm.pattern, arm.value)
    }
}

/// A single function parameter, optionally defaulted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Param {
    pub name: String,
    pub default: Option<Expr>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Params(pub Vec<Param>);

impl Params {
    /// `(Min, Max, HasDefaults)` used by the arity check (L8) and by codegen's
    /// variadic-signature/arity-range emission.
    pub fn arity(&self) -> (usize, usize, bool) {
        let min = self.0.iter().take_while(|p| p.default.is_none()).count();
        let max = self.0.len();
        let has_defaults = min < max;
        (min, max, has_defaults)
    }
}

/// `def [Namespace.]name(params) … end`. `namespace` is empty for top-level
/// definitions and set to `T` for dotted-definition form `def T.method(...)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FuncDef {
    pub name: String,
    pub namespace: String,
    pub params: Params,
    pub body: Vec<Stmt>,
    /// May differ from the root compile unit's file when this definition
    /// was carried in from a required module.
    pub source_file: String,
    pub line: usize,
}

impl FuncDef {
    /// `Namespace.Name` or bare `Name`, used as the function-type table key
    /// by the inferrer and as the dispatch-table key by codegen.
    pub fn key(&self) -> String {
        if self.namespace.is_empty() {
            self.name.clone()
        } else {
            format!("{}.{}", self.namespace, self.name)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestDef {
    pub name: String,
    pub body: Vec<Stmt>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BenchDef {
    pub name: String,
    pub body: Vec<Stmt>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UseDirective {
    pub module: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImportDirective {
    pub package: String,
    pub alias: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequireDirective {
    pub path: String,
    pub alias: Option<String>,
    pub with: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SandboxDirective {
    pub ro: Vec<String>,
    pub rw: Vec<String>,
    pub rox: Vec<String>,
    pub rwx: Vec<String>,
    pub connect: Vec<u16>,
    pub bind: Vec<u16>,
    /// `None` means no `env:` key was given (inherit everything); `Some([])`
    /// means `env: []`, clear all.
    pub env: Option<Vec<String>>,
}

/// Captured at parse time for `struct … end`; the walker expands each one
/// into a constructor `FuncDef` plus per-field accessors.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StructInfo {
    pub name: String,
    pub fields: Vec<String>,
    pub line: usize,
}
