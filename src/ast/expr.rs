use enum_as_inner::EnumAsInner;
use serde::{Deserialize, Serialize};

use crate::error::Span;
use crate::types::Type;

use super::ident::IdentPath;
use super::stmt::{Params, Stmt};

/// Anything that has a value and thus (eventually) a type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Expr {
    /// Assigned once by the walker; used as the [`crate::types::TypeInfo`]
    /// map key instead of node identity/address.
    pub id: usize,
    #[serde(flatten)]
    pub kind: ExprKind,
    #[serde(skip)]
    pub span: Option<Span>,
    /// `None` until the inferrer visits this node.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ty: Option<Type>,
}

impl Expr {
    pub fn new(id: usize, kind: ExprKind) -> Self {
        Expr {
            id,
            kind,
            span: None,
            ty: None,
        }
    }

    pub fn with_span(mut self, span: Span) -> Self {
        self.span = Some(span);
        self
    }
}

#[derive(Debug, EnumAsInner, Clone, PartialEq, Serialize, Deserialize)]
pub enum ExprKind {
    Int(i64),
    Float(f64),
    String { value: String, raw: bool },
    Bool(bool),
    Nil,
    Ident(IdentPath),
    Dot {
        target: Box<Expr>,
        field: String,
    },
    Binary(BinaryExpr),
    Unary(UnaryExpr),
    Call(CallExpr),
    Index {
        target: Box<Expr>,
        index: Box<Expr>,
    },
    Slice {
        target: Box<Expr>,
        start: Option<Box<Expr>>,
        end: Option<Box<Expr>>,
    },
    Array(Vec<Expr>),
    Hash(Vec<(Expr, Expr)>),
    /// An interpolated string (`"hi #{name}"`), kept distinct from a plain
    /// `String` so codegen can decide native concatenation vs `Sprintf`.
    Interpolated(Vec<InterpolationPart>),
    Fn(Box<LambdaExpr>),
    LoweredTry(Box<LoweredTry>),
    LoweredSpawn(Box<LoweredSpawn>),
    LoweredParallel(Box<LoweredParallel>),
    Case(Box<CaseExpr>),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum InterpolationPart {
    Literal(String),
    Expr(Box<Expr>),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BinaryExpr {
    pub left: Box<Expr>,
    pub op: BinOp,
    pub right: Box<Expr>,
}

#[derive(
    Debug, PartialEq, Eq, Clone, Copy, Hash, Serialize, Deserialize, strum::Display, strum::EnumString,
)]
pub enum BinOp {
    #[strum(to_string = "+")]
    Add,
    #[strum(to_string = "-")]
    Sub,
    #[strum(to_string = "*")]
    Mul,
    #[strum(to_string = "/")]
    Div,
    #[strum(to_string = "%")]
    Mod,
    #[strum(to_string = "==")]
    Eq,
    #[strum(to_string = "!=")]
    Ne,
    #[strum(to_string = "<")]
    Lt,
    #[strum(to_string = ">")]
    Gt,
    #[strum(to_string = "<=")]
    Le,
    #[strum(to_string = ">=")]
    Ge,
    #[strum(to_string = "&&")]
    And,
    #[strum(to_string = "||")]
    Or,
}

impl BinOp {
    pub fn is_comparison(self) -> bool {
        matches!(
            self,
            BinOp::Eq | BinOp::Ne | BinOp::Lt | BinOp::Gt | BinOp::Le | BinOp::Ge
        )
    }

    pub fn is_ordering(self) -> bool {
        matches!(self, BinOp::Lt | BinOp::Gt | BinOp::Le | BinOp::Ge)
    }

    pub fn is_logical(self) -> bool {
        matches!(self, BinOp::And | BinOp::Or)
    }

    pub fn is_arithmetic(self) -> bool {
        matches!(self, BinOp::Add | BinOp::Sub | BinOp::Mul | BinOp::Div | BinOp::Mod)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnaryExpr {
    pub op: UnOp,
    pub expr: Box<Expr>,
}

#[derive(
    Debug, PartialEq, Eq, Clone, Copy, Hash, Serialize, Deserialize, strum::Display, strum::EnumString,
)]
pub enum UnOp {
    #[strum(to_string = "-")]
    Neg,
    #[strum(to_string = "!")]
    Not,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallExpr {
    pub callee: Box<Expr>,
    pub args: Vec<Expr>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LambdaExpr {
    pub params: Params,
    pub body: Vec<Stmt>,
}

/// `try E or D` / block form, lowered so codegen always sees an explicit
/// tried expression plus a handler body with its own scope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoweredTry {
    pub tried: Box<Expr>,
    pub err_name: String,
    pub handler: Vec<Stmt>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoweredSpawn {
    pub body: Vec<Stmt>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoweredParallel {
    pub branches: Vec<Vec<Stmt>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaseExpr {
    pub subject: Option<Box<Expr>>,
    pub arms: Vec<CaseArm>,
    pub else_value: Option<Box<Expr>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaseArm {
    pub pattern: Expr,
    pub value: Expr,
}
