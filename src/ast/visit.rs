//! Traversal helpers over the typed AST. Two families, per the walk
//! contracts every later stage (L7, L8, L10) is built on:
//! [`walk_stmts`] visits every reachable statement pre-order and lets the
//! callback skip descent by returning `false`; [`walk_exprs`] visits every
//! reachable expression pre-order and short-circuits when the callback
//! returns `true`.

use super::expr::{Expr, ExprKind, InterpolationPart};
use super::stmt::{Stmt, StmtKind};

/// Pre-order walk over every statement reachable from `stmts`, including
/// nested blocks and lowered-expression bodies (`try`/`spawn`/`parallel`).
/// `visit` returning `false` skips descent into that statement's children.
pub fn walk_stmts(stmts: &[Stmt], visit: &mut dyn FnMut(&Stmt) -> bool) {
    for stmt in stmts {
        if !visit(stmt) {
            continue;
        }
        walk_stmt_children(stmt, visit);
    }
}

fn walk_stmt_children(stmt: &Stmt, visit: &mut dyn FnMut(&Stmt) -> bool) {
    match &stmt.kind {
        StmtKind::If(if_stmt) => {
            walk_stmts(&if_stmt.then_body, visit);
            for (_, body) in &if_stmt.elifs {
                walk_stmts(body, visit);
            }
            if let Some(else_body) = &if_stmt.else_body {
                walk_stmts(else_body, visit);
            }
            walk_expr_stmts(&if_stmt.cond, visit);
            for (cond, _) in &if_stmt.elifs {
                walk_expr_stmts(cond, visit);
            }
        }
        StmtKind::While { cond, body } => {
            walk_expr_stmts(cond, visit);
            walk_stmts(body, visit);
        }
        StmtKind::For(for_stmt) => {
            walk_expr_stmts(&for_stmt.iterable, visit);
            walk_stmts(&for_stmt.body, visit);
        }
        StmtKind::FuncDef(f) => walk_stmts(&f.body, visit),
        StmtKind::TestDef(t) => walk_stmts(&t.body, visit),
        StmtKind::BenchDef(b) => walk_stmts(&b.body, visit),
        StmtKind::CaseStmt(c) => {
            for (_, body) in &c.arms {
                walk_stmts(body, visit);
            }
            if let Some(else_body) = &c.else_body {
                walk_stmts(else_body, visit);
            }
        }
        StmtKind::Assign { value, .. }
        | StmtKind::Expr(value)
        | StmtKind::ImplicitReturn(value)
        | StmtKind::TryResult(value)
        | StmtKind::SpawnReturn(value)
        | StmtKind::TryHandlerReturn(value) => walk_expr_stmts(value, visit),
        StmtKind::IndexAssign { target, index, value } => {
            walk_expr_stmts(target, visit);
            walk_expr_stmts(index, visit);
            walk_expr_stmts(value, visit);
        }
        StmtKind::DotAssign { target, value, .. } => {
            walk_expr_stmts(target, visit);
            walk_expr_stmts(value, visit);
        }
        StmtKind::Return(Some(e)) => walk_expr_stmts(e, visit),
        StmtKind::Return(None)
        | StmtKind::Break
        | StmtKind::Next
        | StmtKind::Use(_)
        | StmtKind::Import(_)
        | StmtKind::Require(_)
        | StmtKind::Sandbox(_) => {}
    }
}

/// Descends into any statement bodies reachable only through an expression
/// (lambda bodies, `try`/`spawn`/`parallel` lowered blocks).
fn walk_expr_stmts(expr: &Expr, visit: &mut dyn FnMut(&Stmt) -> bool) {
    match &expr.kind {
        ExprKind::Fn(lambda) => walk_stmts(&lambda.body, visit),
        ExprKind::LoweredTry(t) => {
            walk_expr_stmts(&t.tried, visit);
            walk_stmts(&t.handler, visit);
        }
        ExprKind::LoweredSpawn(s) => walk_stmts(&s.body, visit),
        ExprKind::LoweredParallel(p) => {
            for branch in &p.branches {
                walk_stmts(branch, visit);
            }
        }
        ExprKind::Binary(b) => {
            walk_expr_stmts(&b.left, visit);
            walk_expr_stmts(&b.right, visit);
        }
        ExprKind::Unary(u) => walk_expr_stmts(&u.expr, visit),
        ExprKind::Call(c) => {
            walk_expr_stmts(&c.callee, visit);
            for a in &c.args {
                walk_expr_stmts(a, visit);
            }
        }
        ExprKind::Dot { target, .. } => walk_expr_stmts(target, visit),
        ExprKind::Index { target, index } => {
            walk_expr_stmts(target, visit);
            walk_expr_stmts(index, visit);
        }
        ExprKind::Slice { target, start, end } => {
            walk_expr_stmts(target, visit);
            if let Some(s) = start {
                walk_expr_stmts(s, visit);
            }
            if let Some(e) = end {
                walk_expr_stmts(e, visit);
            }
        }
        ExprKind::Array(items) => {
            for i in items {
                walk_expr_stmts(i, visit);
            }
        }
        ExprKind::Hash(pairs) => {
            for (k, v) in pairs {
                walk_expr_stmts(k, visit);
                walk_expr_stmts(v, visit);
            }
        }
        ExprKind::Interpolated(parts) => {
            for p in parts {
                if let InterpolationPart::Expr(e) = p {
                    walk_expr_stmts(e, visit);
                }
            }
        }
        ExprKind::Case(c) => {
            if let Some(subject) = &c.subject {
                walk_expr_stmts(subject, visit);
            }
            for arm in &c.arms {
                walk_expr_stmts(&arm.pattern, visit);
                walk_expr_stmts(&arm.value, visit);
            }
            if let Some(e) = &c.else_value {
                walk_expr_stmts(e, visit);
            }
        }
        ExprKind::Int(_)
        | ExprKind::Float(_)
        | ExprKind::String { .. }
        | ExprKind::Bool(_)
        | ExprKind::Nil
        | ExprKind::Ident(_) => {}
    }
}

/// Pre-order walk over every expression reachable from `stmts`. `visit`
/// returning `true` short-circuits descent into that expression's children.
pub fn walk_exprs(stmts: &[Stmt], visit: &mut dyn FnMut(&Expr) -> bool) {
    walk_stmts(stmts, &mut |stmt| {
        for expr in stmt_exprs(stmt) {
            walk_expr_tree(expr, visit);
        }
        true
    });
}

fn stmt_exprs(stmt: &Stmt) -> Vec<&Expr> {
    match &stmt.kind {
        StmtKind::Assign { value, .. }
        | StmtKind::Expr(value)
        | StmtKind::ImplicitReturn(value)
        | StmtKind::TryResult(value)
        | StmtKind::SpawnReturn(value)
        | StmtKind::TryHandlerReturn(value) => vec![value],
        StmtKind::IndexAssign { target, index, value } => vec![target, index, value],
        StmtKind::DotAssign { target, value, .. } => vec![target, value],
        StmtKind::If(s) => {
            let mut exprs = vec![&s.cond];
            exprs.extend(s.elifs.iter().map(|(c, _)| c));
            exprs
        }
        StmtKind::While { cond, .. } => vec![cond],
        StmtKind::For(s) => vec![&s.iterable],
        StmtKind::Return(Some(e)) => vec![e],
        StmtKind::CaseStmt(c) => {
            let mut exprs: Vec<&Expr> = c.subject.iter().collect();
            exprs.extend(c.arms.iter().map(|(cond, _)| cond));
            exprs
        }
        _ => vec![],
    }
}

/// Walks a single expression tree pre-order, short-circuiting when `visit`
/// returns `true`. Returns whether the walk was short-circuited.
pub fn walk_expr_tree(expr: &Expr, visit: &mut dyn FnMut(&Expr) -> bool) -> bool {
    if visit(expr) {
        return true;
    }
    match &expr.kind {
        ExprKind::Binary(b) => walk_expr_tree(&b.left, visit) || walk_expr_tree(&b.right, visit),
        ExprKind::Unary(u) => walk_expr_tree(&u.expr, visit),
        ExprKind::Call(c) => {
            walk_expr_tree(&c.callee, visit) || c.args.iter().any(|a| walk_expr_tree(a, visit))
        }
        ExprKind::Dot { target, .. } => walk_expr_tree(target, visit),
        ExprKind::Index { target, index } => {
            walk_expr_tree(target, visit) || walk_expr_tree(index, visit)
        }
        ExprKind::Slice { target, start, end } => {
            walk_expr_tree(target, visit)
                || start.as_deref().map_or(false, |s| walk_expr_tree(s, visit))
                || end.as_deref().map_or(false, |e| walk_expr_tree(e, visit))
        }
        ExprKind::Array(items) => items.iter().any(|i| walk_expr_tree(i, visit)),
        ExprKind::Hash(pairs) => pairs
            .iter()
            .any(|(k, v)| walk_expr_tree(k, visit) || walk_expr_tree(v, visit)),
        ExprKind::Interpolated(parts) => parts.iter().any(|p| match p {
            InterpolationPart::Expr(e) => walk_expr_tree(e, visit),
            InterpolationPart::Literal(_) => false,
        }),
        ExprKind::Fn(lambda) => {
            let mut stopped = false;
            walk_exprs(&lambda.body, &mut |e| {
                if walk_expr_tree(e, visit) {
                    stopped = true;
                }
                false
            });
            stopped
        }
        ExprKind::LoweredTry(t) => {
            let mut stopped = walk_expr_tree(&t.tried, visit);
            walk_exprs(&t.handler, &mut |e| {
                if walk_expr_tree(e, visit) {
                    stopped = true;
                }
                false
            });
            stopped
        }
        ExprKind::LoweredSpawn(s) => {
            let mut stopped = false;
            walk_exprs(&s.body, &mut |e| {
                if walk_expr_tree(e, visit) {
                    stopped = true;
                }
                false
            });
            stopped
        }
        ExprKind::LoweredParallel(p) => {
            let mut stopped = false;
            for branch in &p.branches {
                walk_exprs(branch, &mut |e| {
                    if walk_expr_tree(e, visit) {
                        stopped = true;
                    }
                    false
                });
            }
            stopped
        }
        ExprKind::Case(c) => {
            c.subject.as_deref().map_or(false, |s| walk_expr_tree(s, visit))
                || c.arms.iter().any(|arm| {
                    walk_expr_tree(&arm.pattern, visit) || walk_expr_tree(&arm.value, visit)
                })
                || c.else_value.as_deref().map_or(false, |e| walk_expr_tree(e, visit))
        }
        ExprKind::Int(_)
        | ExprKind::Float(_)
        | ExprKind::String { .. }
        | ExprKind::Bool(_)
        | ExprKind::Nil
        | ExprKind::Ident(_) => false,
    }
}

/// Every name that an `Assign`/`IndexAssign`/`DotAssign`/`For` binds,
/// top-level and in nested blocks. Used by semantic checks to seed a
/// function's local scope and by codegen to decide declaration vs.
/// reassignment.
pub fn collect_assign_targets(stmts: &[Stmt]) -> Vec<String> {
    let mut targets = Vec::new();
    walk_stmts(stmts, &mut |stmt| {
        match &stmt.kind {
            StmtKind::Assign { target, .. } => targets.push(target.clone()),
            StmtKind::For(f) => {
                targets.push(f.var.clone());
                if let Some(v) = &f.value_var {
                    targets.push(v.clone());
                }
            }
            _ => {}
        }
        true
    });
    targets
}

/// Names referenced as string-literal arguments in top-level calls shaped
/// like `namespace.method("handler_name", ...)` — the set codegen filters
/// its per-module dispatch table emission against.
pub fn collect_dispatch_handlers(stmts: &[Stmt]) -> Vec<String> {
    let mut handlers = Vec::new();
    walk_exprs(stmts, &mut |expr| {
        if let ExprKind::Call(call) = &expr.kind {
            if matches!(call.callee.kind, ExprKind::Dot { .. }) {
                for arg in &call.args {
                    if let ExprKind::String { value, .. } = &arg.kind {
                        handlers.push(value.clone());
                    }
                }
            }
        }
        false
    });
    handlers
}

/// Every bare identifier referenced by value in `expr`, recursing into
/// interpolated string sub-expressions.
pub fn collect_idents(expr: &Expr) -> Vec<String> {
    let mut idents = Vec::new();
    walk_expr_tree(expr, &mut |e| {
        if let ExprKind::Ident(path) = &e.kind {
            if path.is_simple() {
                idents.push(path.name().to_string());
            }
        }
        false
    });
    idents
}
