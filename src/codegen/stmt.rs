//! Statement lowering: typed AST [`Stmt`] → [`hostir::Stmt`] (spec.md
//! §4.10's per-statement codegen rules).

use crate::ast::{CaseStmtNode, ForStmt, IfStmt, Stmt, StmtKind};
use crate::hostir;
use crate::types::Type;

use super::expr::lower_expr;
use super::Codegen;

pub fn lower_stmts(cg: &mut Codegen, stmts: &[Stmt]) -> Vec<hostir::Stmt> {
    stmts.iter().flat_map(|s| lower_stmt(cg, s)).collect()
}

/// `//line <file>:<N>` markers the Go runtime's panic formatter reads to
/// report the *original* source location rather than the generated one —
/// spec.md §4.10's "every statement's error wrapped with file:line" becomes,
/// once translated out of an exceptions-based host language, a line marker
/// ahead of every statement that can itself produce a panic.
fn lower_stmt(cg: &mut Codegen, stmt: &Stmt) -> Vec<hostir::Stmt> {
    let needs_line_marker = matches!(
        stmt.kind,
        StmtKind::Expr(_)
            | StmtKind::Assign { .. }
            | StmtKind::IndexAssign { .. }
            | StmtKind::DotAssign { .. }
            | StmtKind::Return(_)
            | StmtKind::ImplicitReturn(_)
            | StmtKind::TryResult(_)
            | StmtKind::SpawnReturn(_)
            | StmtKind::TryHandlerReturn(_)
    );

    let lowered = match &stmt.kind {
        StmtKind::Assign { target, value } => vec![lower_assign(cg, target, value)],
        StmtKind::IndexAssign { target, index, value } => {
            vec![hostir::Stmt::IndexAssign {
                target: lower_expr(cg, target),
                index: lower_expr(cg, index),
                value: lower_expr(cg, value),
            }]
        }
        StmtKind::DotAssign { target, field, value } => {
            let target = lower_expr(cg, target);
            vec![hostir::Stmt::ExprStmt(hostir::Expr::call(
                hostir::Expr::ident("rugo_set_field"),
                vec![target, hostir::Expr::String(field.clone()), lower_expr(cg, value)],
            ))]
        }
        StmtKind::Expr(e) => vec![hostir::Stmt::ExprStmt(lower_expr(cg, e))],
        StmtKind::If(if_stmt) => vec![lower_if(cg, if_stmt)],
        StmtKind::While { cond, body } => {
            let cond = to_bool(cg, cond);
            cg.scope.push();
            let body = lower_stmts(cg, body);
            cg.scope.pop();
            vec![hostir::Stmt::ForClause { init: None, cond: Some(cond), post: None, body }]
        }
        StmtKind::For(for_stmt) => vec![lower_for(cg, for_stmt)],
        StmtKind::Break => vec![hostir::Stmt::Raw("break".to_string())],
        StmtKind::Next => vec![hostir::Stmt::Raw("continue".to_string())],
        StmtKind::Return(value) => {
            let values = value.iter().map(|e| lower_expr(cg, e)).collect();
            vec![hostir::Stmt::Return(values)]
        }
        StmtKind::ImplicitReturn(e) | StmtKind::TryResult(e) | StmtKind::SpawnReturn(e) | StmtKind::TryHandlerReturn(e) => {
            vec![hostir::Stmt::Return(vec![lower_expr(cg, e)])]
        }
        // Declarations are hoisted to file scope by the caller (`codegen::generate`);
        // encountering one mid-body (nested `def` inside a block) is a no-op here.
        StmtKind::FuncDef(_) | StmtKind::TestDef(_) | StmtKind::BenchDef(_) => vec![],
        StmtKind::Use(_) | StmtKind::Import(_) | StmtKind::Require(_) | StmtKind::Sandbox(_) => vec![],
        StmtKind::CaseStmt(c) => lower_case_stmt(cg, c),
    };
    if needs_line_marker {
        let mut marked = vec![hostir::Stmt::LineDirective { file: cg.file.clone(), line: stmt.line }];
        marked.extend(lowered);
        marked
    } else {
        lowered
    }
}

fn lower_assign(cg: &mut Codegen, target: &str, value: &crate::ast::Expr) -> hostir::Stmt {
    let ty = cg.types.expr_type(value.id);
    let mut rhs = lower_expr(cg, value);

    if is_const_name(target) {
        cg.scope.mark_const(target);
    }

    let is_captured = cg.scope.is_captured(target);
    let outer_ty = cg.scope.type_of(target);
    if is_captured && outer_ty.is_typed_for_codegen() && !ty.is_typed_for_codegen() {
        rhs = hostir::Expr::Cast { ty: super::type_to_go(outer_ty).to_string(), expr: Box::new(rhs) };
    } else if !is_captured && cg.scope.is_first_assignment(target) {
        // first binding: nothing to widen against yet
    } else if outer_ty.is_typed_for_codegen() && ty.is_typed_for_codegen() && outer_ty != ty {
        // A dynamic-looking target receiving a differently-typed RHS widens.
        rhs = hostir::Expr::Cast { ty: "interface{}".to_string(), expr: Box::new(rhs) };
    }

    let op = if cg.scope.is_first_assignment(target) { hostir::AssignOp::Declare } else { hostir::AssignOp::Assign };
    cg.scope.declare(target, ty);
    hostir::Stmt::Assign { targets: vec![target.to_string()], op, values: vec![rhs] }
}

fn is_const_name(name: &str) -> bool {
    name.chars().next().is_some_and(|c| c.is_ascii_uppercase())
}

/// Wraps a condition with `rugo_to_bool` unless the inferrer already
/// resolved it to `Bool`.
fn to_bool(cg: &mut Codegen, cond: &crate::ast::Expr) -> hostir::Expr {
    let lowered = lower_expr(cg, cond);
    if cg.types.expr_type(cond.id) == Type::Bool {
        lowered
    } else {
        hostir::Expr::call(hostir::Expr::ident("rugo_to_bool"), vec![lowered])
    }
}

/// Pre-declares every variable assigned in any branch (Ruby scoping: the
/// name is visible after the `if` regardless of which branch ran).
fn lower_if(cg: &mut Codegen, if_stmt: &IfStmt) -> hostir::Stmt {
    for name in collect_branch_targets(if_stmt) {
        if cg.scope.is_first_assignment(&name) {
            cg.scope.declare(&name, Type::Dynamic);
        }
    }

    let cond = to_bool(cg, &if_stmt.cond);
    let then_body = lower_stmts(cg, &if_stmt.then_body);

    let mut else_body = if_stmt.else_body.as_ref().map(|b| lower_stmts(cg, b));
    for (elif_cond, elif_body) in if_stmt.elifs.iter().rev() {
        let elif_cond = to_bool(cg, elif_cond);
        let elif_body = lower_stmts(cg, elif_body);
        else_body = Some(vec![hostir::Stmt::If { cond: elif_cond, then_body: elif_body, else_body }]);
    }

    hostir::Stmt::If { cond, then_body, else_body }
}

fn collect_branch_targets(if_stmt: &IfStmt) -> Vec<String> {
    let mut targets = crate::ast::collect_assign_targets(&if_stmt.then_body);
    for (_, body) in &if_stmt.elifs {
        targets.extend(crate::ast::collect_assign_targets(body));
    }
    if let Some(body) = &if_stmt.else_body {
        targets.extend(crate::ast::collect_assign_targets(body));
    }
    targets
}

/// `for i in N` / `for i in range(a, b)` lowers to a plain 3-clause `for`
/// when the iterable is detectably an integer range; anything else
/// materializes a sequence and ranges over it.
fn lower_for(cg: &mut Codegen, for_stmt: &ForStmt) -> hostir::Stmt {
    cg.scope.push();
    cg.scope.declare(&for_stmt.var, Type::Dynamic);
    if let Some(v) = &for_stmt.value_var {
        cg.scope.declare(v, Type::Dynamic);
    }

    if let Some((start, end)) = detect_integer_range(cg, &for_stmt.iterable) {
        let body = lower_stmts(cg, &for_stmt.body);
        cg.scope.pop();
        return hostir::Stmt::ForClause {
            init: Some(Box::new(hostir::Stmt::Assign {
                targets: vec![for_stmt.var.clone()],
                op: hostir::AssignOp::Declare,
                values: vec![start],
            })),
            cond: Some(hostir::Expr::Binary {
                left: Box::new(hostir::Expr::ident(for_stmt.var.clone())),
                op: "<",
                right: Box::new(end),
            }),
            post: Some(Box::new(hostir::Stmt::Raw(format!("{}++", for_stmt.var)))),
            body,
        };
    }

    let iterable = lower_expr(cg, &for_stmt.iterable);
    let body = lower_stmts(cg, &for_stmt.body);
    cg.scope.pop();
    hostir::Stmt::ForRange {
        key: Some(for_stmt.var.clone()),
        value: for_stmt.value_var.clone(),
        iterable,
        body,
    }
}

fn detect_integer_range(cg: &mut Codegen, iterable: &crate::ast::Expr) -> Option<(hostir::Expr, hostir::Expr)> {
    use crate::ast::ExprKind;
    match &iterable.kind {
        ExprKind::Int(n) => Some((hostir::Expr::Int(0), hostir::Expr::Int(*n))),
        ExprKind::Ident(path) if path.is_simple() && cg.scope.type_of(path.name()) == Type::Int => {
            Some((hostir::Expr::Int(0), hostir::Expr::ident(path.name())))
        }
        ExprKind::Call(call) => match &call.callee.kind {
            ExprKind::Ident(path) if path.is_simple() && path.name() == "range" && call.args.len() == 2 => {
                Some((lower_expr(cg, &call.args[0]), lower_expr(cg, &call.args[1])))
            }
            _ => None,
        },
        _ => None,
    }
}

fn lower_case_stmt(cg: &mut Codegen, c: &CaseStmtNode) -> Vec<hostir::Stmt> {
    let subject_name = c.subject.as_ref().map(|_| cg.fresh_tmp("rugoSubject"));
    let mut out = Vec::new();
    if let (Some(name), Some(subject)) = (&subject_name, &c.subject) {
        let subject = lower_expr(cg, subject);
        out.push(hostir::Stmt::Assign { targets: vec![name.clone()], op: hostir::AssignOp::Declare, values: vec![subject] });
    }

    let mut chain: Option<Vec<hostir::Stmt>> = c.else_body.as_ref().map(|body| lower_stmts(cg, body));
    for (pattern, body) in c.arms.iter().rev() {
        let pattern_expr = lower_expr(cg, pattern);
        let cond = match &subject_name {
            Some(name) => hostir::Expr::call(hostir::Expr::ident("rugo_eq"), vec![hostir::Expr::ident(name.clone()), pattern_expr]),
            None => to_bool(cg, pattern),
        };
        let then_body = lower_stmts(cg, body);
        chain = Some(vec![hostir::Stmt::If { cond, then_body, else_body: chain }]);
    }
    if let Some(stmts) = chain {
        out.extend(stmts);
    }
    out
}
