use anyhow::{bail, Result};

use crate::ast::{
    BinOp, BinaryExpr, CallExpr, CaseArm, CaseExpr, Expr, ExprKind, IdentPath, InterpolationPart,
    LambdaExpr, Param, Params, UnOp, UnaryExpr,
};
use crate::parser::{FlatNode, TokenKind};

use super::{as_terminal, Walker};

/// Builds a typed [`Expr`] from one grammar node. Unlike statements,
/// expressions carry no line of their own — only the statement they're
/// nested in does (Invariant 1) — so this never touches the line map.
pub(crate) fn walk_expr(walker: &mut Walker, node: &FlatNode) -> Result<Expr> {
    let sym = match node {
        FlatNode::Terminal(_) => return walk_literal(walker, node),
        FlatNode::NonTerminal { sym, .. } => *sym,
    };

    match sym {
        "paren_expr" => {
            let children = super::non_terminal_children(node, "paren_expr")?;
            walk_expr(walker, &children[0])
        }
        "ident_expr" => {
            let children = super::non_terminal_children(node, "ident_expr")?;
            let mut parts = Vec::with_capacity(children.len());
            for c in children {
                parts.push(as_terminal(c)?.text.clone());
            }
            Ok(Expr::new(walker.next_id(), ExprKind::Ident(IdentPath::from_parts(parts))))
        }
        "dot_expr" => {
            let children = super::non_terminal_children(node, "dot_expr")?;
            let target = Box::new(walk_expr(walker, &children[0])?);
            let field = as_terminal(&children[1])?.text.clone();
            Ok(Expr::new(walker.next_id(), ExprKind::Dot { target, field }))
        }
        "binary_expr" => {
            let children = super::non_terminal_children(node, "binary_expr")?;
            let left = Box::new(walk_expr(walker, &children[0])?);
            let op_text = &as_terminal(&children[1])?.text;
            let op: BinOp = op_text
                .parse()
                .map_err(|_| anyhow::anyhow!("walker: unknown binary operator `{op_text}`"))?;
            let right = Box::new(walk_expr(walker, &children[2])?);
            Ok(Expr::new(walker.next_id(), ExprKind::Binary(BinaryExpr { left, op, right })))
        }
        "unary_expr" => {
            let children = super::non_terminal_children(node, "unary_expr")?;
            let op_text = &as_terminal(&children[0])?.text;
            let op: UnOp = op_text
                .parse()
                .map_err(|_| anyhow::anyhow!("walker: unknown unary operator `{op_text}`"))?;
            let expr = Box::new(walk_expr(walker, &children[1])?);
            Ok(Expr::new(walker.next_id(), ExprKind::Unary(UnaryExpr { op, expr })))
        }
        "call_expr" => {
            let children = super::non_terminal_children(node, "call_expr")?;
            let callee = Box::new(walk_expr(walker, &children[0])?);
            let mut args = Vec::with_capacity(children.len() - 1);
            for c in &children[1..] {
                args.push(walk_expr(walker, c)?);
            }
            Ok(Expr::new(walker.next_id(), ExprKind::Call(CallExpr { callee, args })))
        }
        "index_expr" => {
            let children = super::non_terminal_children(node, "index_expr")?;
            let target = Box::new(walk_expr(walker, &children[0])?);
            let index = Box::new(walk_expr(walker, &children[1])?);
            Ok(Expr::new(walker.next_id(), ExprKind::Index { target, index }))
        }
        "slice_expr" => {
            let children = super::non_terminal_children(node, "slice_expr")?;
            let target = Box::new(walk_expr(walker, &children[0])?);
            let start = walk_optional_bound(walker, &children[1])?;
            let end = walk_optional_bound(walker, &children[2])?;
            Ok(Expr::new(walker.next_id(), ExprKind::Slice { target, start, end }))
        }
        "array_expr" => {
            let children = super::non_terminal_children(node, "array_expr")?;
            let mut items = Vec::with_capacity(children.len());
            for c in children {
                items.push(walk_expr(walker, c)?);
            }
            Ok(Expr::new(walker.next_id(), ExprKind::Array(items)))
        }
        "hash_expr" => {
            let children = super::non_terminal_children(node, "hash_expr")?;
            if children.len() % 2 != 0 {
                bail!("walker: hash_expr must have an even number of key/value children");
            }
            let mut pairs = Vec::with_capacity(children.len() / 2);
            for pair in children.chunks_exact(2) {
                let key = walk_expr(walker, &pair[0])?;
                let value = walk_expr(walker, &pair[1])?;
                pairs.push((key, value));
            }
            Ok(Expr::new(walker.next_id(), ExprKind::Hash(pairs)))
        }
        "interp_string" => {
            let children = super::non_terminal_children(node, "interp_string")?;
            let mut parts = Vec::with_capacity(children.len());
            for c in children {
                match c {
                    FlatNode::Terminal(t) if t.kind == TokenKind::String => {
                        parts.push(InterpolationPart::Literal(t.text.clone()));
                    }
                    other => parts.push(InterpolationPart::Expr(Box::new(walk_expr(walker, other)?))),
                }
            }
            Ok(Expr::new(walker.next_id(), ExprKind::Interpolated(parts)))
        }
        "lambda_expr" => {
            let children = super::non_terminal_children(node, "lambda_expr")?;
            let params = walk_params(walker, &children[0])?;
            let body = super::walk_block(walker, &children[1])?;
            Ok(Expr::new(walker.next_id(), ExprKind::Fn(Box::new(LambdaExpr { params, body }))))
        }
        "case_expr" => {
            let children = super::non_terminal_children(node, "case_expr")?;
            walk_case_expr(walker, children)
        }
        other => bail!("walker: unrecognized expression node `{other}`"),
    }
}

fn walk_optional_bound(walker: &mut Walker, node: &FlatNode) -> Result<Option<Box<Expr>>> {
    if let FlatNode::NonTerminal { sym: "none", .. } = node {
        Ok(None)
    } else {
        Ok(Some(Box::new(walk_expr(walker, node)?)))
    }
}

fn walk_literal(walker: &mut Walker, node: &FlatNode) -> Result<Expr> {
    let token = as_terminal(node)?;
    let kind = match token.kind {
        TokenKind::Int => ExprKind::Int(
            token
                .text
                .parse()
                .map_err(|_| anyhow::anyhow!("walker: invalid integer literal `{}`", token.text))?,
        ),
        TokenKind::Float => ExprKind::Float(
            token
                .text
                .parse()
                .map_err(|_| anyhow::anyhow!("walker: invalid float literal `{}`", token.text))?,
        ),
        TokenKind::String => ExprKind::String { value: token.text.clone(), raw: false },
        TokenKind::RawString => ExprKind::String { value: token.text.clone(), raw: true },
        TokenKind::Keyword if token.text == "true" => ExprKind::Bool(true),
        TokenKind::Keyword if token.text == "false" => ExprKind::Bool(false),
        TokenKind::Keyword if token.text == "nil" => ExprKind::Nil,
        TokenKind::Ident => ExprKind::Ident(IdentPath::from_name(token.text.clone())),
        other => bail!("walker: terminal {other:?} (`{}`) is not a valid expression", token.text),
    };
    Ok(Expr::new(walker.next_id(), kind))
}

/// `"params"` node: children are `"param"` nodes, each a bare name terminal
/// or `[name, default_expr]`.
pub(crate) fn walk_params(walker: &mut Walker, node: &FlatNode) -> Result<Params> {
    let children = super::non_terminal_children(node, "params")?;
    let mut params = Vec::with_capacity(children.len());
    for child in children {
        let param_children = super::non_terminal_children(child, "param")?;
        let name = as_terminal(&param_children[0])?.text.clone();
        let default = match param_children.get(1) {
            Some(expr_node) => Some(walk_expr(walker, expr_node)?),
            None => None,
        };
        params.push(Param { name, default });
    }
    Ok(Params(params))
}

fn walk_case_expr(walker: &mut Walker, children: &[FlatNode]) -> Result<Expr> {
    // children: [subject_or_none, arm*, else_or_none] where each arm is a
    // `"case_arm"` node `[pattern_expr, value_expr]`.
    let subject = walk_optional_bound(walker, &children[0])?;
    let mut arms = Vec::new();
    let mut idx = 1;
    while idx < children.len() {
        if let FlatNode::NonTerminal { sym: "case_arm", .. } = &children[idx] {
            let arm_children = super::non_terminal_children(&children[idx], "case_arm")?;
            let pattern = walk_expr(walker, &arm_children[0])?;
            let value = walk_expr(walker, &arm_children[1])?;
            arms.push(CaseArm { pattern, value });
            idx += 1;
        } else {
            break;
        }
    }
    let else_value = if idx < children.len() {
        walk_optional_bound(walker, &children[idx])?
    } else {
        None
    };
    Ok(Expr::new(walker.next_id(), ExprKind::Case(Box::new(CaseExpr { subject, arms, else_value }))))
}
