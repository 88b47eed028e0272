//! Expression lowering: typed AST [`Expr`] → [`hostir::Expr`] (spec.md
//! §4.10's per-expression codegen rules).

use crate::ast::{
    BinOp, BinaryExpr, CallExpr, CaseExpr, Expr, ExprKind, IdentPath, InterpolationPart, LambdaExpr,
    LoweredParallel, LoweredSpawn, LoweredTry, UnOp, UnaryExpr,
};
use crate::hostir;
use crate::resolve::DeclKind;
use crate::resolve::registry::{GoParamType, ReturnShape};
use crate::types::Type;

use super::stmt::lower_stmts;
use super::{mangle_func, type_to_go, Codegen};

pub fn lower_expr(cg: &mut Codegen, e: &Expr) -> hostir::Expr {
    match &e.kind {
        ExprKind::Int(n) => hostir::Expr::Int(*n),
        ExprKind::Float(f) => hostir::Expr::Float(*f),
        ExprKind::String { value, .. } => hostir::Expr::String(value.clone()),
        ExprKind::Bool(b) => hostir::Expr::Bool(*b),
        ExprKind::Nil => hostir::Expr::Nil,
        ExprKind::Ident(path) => lower_ident(cg, path),
        ExprKind::Dot { target, field } => lower_dot(cg, target, field),
        ExprKind::Binary(b) => lower_binary(cg, e.id, b),
        ExprKind::Unary(u) => lower_unary(cg, e.id, u),
        ExprKind::Call(c) => lower_call(cg, e.id, c),
        ExprKind::Index { target, index } => hostir::Expr::Index {
            target: Box::new(lower_expr(cg, target)),
            index: Box::new(lower_expr(cg, index)),
        },
        ExprKind::Slice { target, start, end } => hostir::Expr::Slice {
            target: Box::new(lower_expr(cg, target)),
            start: start.as_deref().map(|s| Box::new(lower_expr(cg, s))),
            end: end.as_deref().map(|e| Box::new(lower_expr(cg, e))),
        },
        ExprKind::Array(items) => hostir::Expr::SliceLiteral {
            elem_ty: "interface{}".to_string(),
            elems: items.iter().map(|i| lower_expr(cg, i)).collect(),
        },
        ExprKind::Hash(pairs) => hostir::Expr::MapLiteral {
            key_ty: "interface{}".to_string(),
            value_ty: "interface{}".to_string(),
            entries: pairs.iter().map(|(k, v)| (lower_expr(cg, k), lower_expr(cg, v))).collect(),
        },
        ExprKind::Interpolated(parts) => lower_interpolated(cg, e.id, parts),
        ExprKind::Fn(lambda) => lower_lambda(cg, lambda),
        ExprKind::LoweredTry(t) => lower_try(cg, t),
        ExprKind::LoweredSpawn(s) => lower_spawn(cg, s),
        ExprKind::LoweredParallel(p) => lower_parallel(cg, p),
        ExprKind::Case(c) => lower_case(cg, e.id, c),
    }
}

fn lower_ident(cg: &mut Codegen, path: &IdentPath) -> hostir::Expr {
    if path.is_simple() {
        return hostir::Expr::ident(path.name());
    }
    // A bare namespaced reference outside a call position — a function
    // passed by name (dispatch handler plumbing) or a required constant.
    hostir::Expr::ident(mangle_func(path.namespace().unwrap_or_default(), path.name()))
}

/// Task properties (`.value`, `.done`) are recognized on any receiver at
/// codegen time (spec.md §4.10); everything else is a plain field/property
/// read on whatever the target evaluates to.
fn lower_dot(cg: &mut Codegen, target: &Expr, field: &str) -> hostir::Expr {
    let lowered_target = lower_expr(cg, target);
    match field {
        "value" => hostir::Expr::MethodCall { target: Box::new(lowered_target), method: "value".into(), args: vec![] },
        "done" => hostir::Expr::MethodCall { target: Box::new(lowered_target), method: "isDone".into(), args: vec![] },
        _ => hostir::Expr::dot(lowered_target, field),
    }
}

fn lower_binary(cg: &mut Codegen, id: usize, b: &BinaryExpr) -> hostir::Expr {
    if b.op.is_logical() {
        return lower_short_circuit(cg, b);
    }

    let lt = cg.types.expr_type(b.left.id);
    let rt = cg.types.expr_type(b.right.id);
    let left = lower_expr(cg, &b.left);
    let right = lower_expr(cg, &b.right);
    let _ = id;

    let both_typed = lt.is_typed_for_codegen() && rt.is_typed_for_codegen();
    let same_kind = lt == rt;

    if b.op.is_comparison() {
        if b.op.is_ordering() {
            if both_typed && same_kind {
                return native_binary(b.op, left, right);
            }
            return runtime_binary(b.op, left, right);
        }
        // Eq/Ne: native when both sides are the exact same typed kind.
        if both_typed && same_kind {
            return native_binary(b.op, left, right);
        }
        return runtime_binary(b.op, left, right);
    }

    debug_assert!(b.op.is_arithmetic());
    if both_typed && same_kind {
        return native_binary(b.op, left, right);
    }
    if both_typed && matches!((lt, rt), (Type::Int, Type::Float) | (Type::Float, Type::Int)) {
        // Mixed-numeric promotes via ensureFloat rather than a native op on
        // mismatched Go types.
        let wrap = |e: hostir::Expr, ty: Type| {
            if ty == Type::Int {
                hostir::Expr::call(hostir::Expr::ident("rugo_ensure_float"), vec![e])
            } else {
                e
            }
        };
        return hostir::Expr::Binary {
            left: Box::new(wrap(left, lt)),
            op: go_op(b.op),
            right: Box::new(wrap(right, rt)),
        };
    }
    runtime_binary(b.op, left, right)
}

fn native_binary(op: BinOp, left: hostir::Expr, right: hostir::Expr) -> hostir::Expr {
    hostir::Expr::Binary { left: Box::new(left), op: go_op(op), right: Box::new(right) }
}

fn runtime_binary(op: BinOp, left: hostir::Expr, right: hostir::Expr) -> hostir::Expr {
    let helper = match op {
        BinOp::Add => "rugo_add",
        BinOp::Sub => "rugo_sub",
        BinOp::Mul => "rugo_mul",
        BinOp::Div => "rugo_div",
        BinOp::Mod => "rugo_mod",
        BinOp::Eq => "rugo_eq",
        BinOp::Ne => "rugo_ne",
        BinOp::Lt => "rugo_lt",
        BinOp::Gt => "rugo_gt",
        BinOp::Le => "rugo_le",
        BinOp::Ge => "rugo_ge",
        BinOp::And | BinOp::Or => unreachable!("logical ops lower via lower_short_circuit"),
    };
    hostir::Expr::call(hostir::Expr::ident(helper), vec![left, right])
}

fn go_op(op: BinOp) -> &'static str {
    match op {
        BinOp::Add => "+",
        BinOp::Sub => "-",
        BinOp::Mul => "*",
        BinOp::Div => "/",
        BinOp::Mod => "%",
        BinOp::Eq => "==",
        BinOp::Ne => "!=",
        BinOp::Lt => "<",
        BinOp::Gt => ">",
        BinOp::Le => "<=",
        BinOp::Ge => ">=",
        BinOp::And => "&&",
        BinOp::Or => "||",
    }
}

/// `&&`/`||` on possibly-non-bool operands lower to an IIFE that evaluates
/// the left once and returns it when it already decides the result,
/// otherwise evaluates and returns the right — Ruby-like value semantics
/// rather than Go's bool-only short circuit.
fn lower_short_circuit(cg: &mut Codegen, b: &BinaryExpr) -> hostir::Expr {
    let lt = cg.types.expr_type(b.left.id);
    let rt = cg.types.expr_type(b.right.id);
    if lt == Type::Bool && rt == Type::Bool {
        return native_binary(b.op, lower_expr(cg, &b.left), lower_expr(cg, &b.right));
    }

    let left = lower_expr(cg, &b.left);
    let right = lower_expr(cg, &b.right);
    let lhs_name = cg.fresh_tmp("rugoLhs");

    let decides_here = match b.op {
        BinOp::Or => hostir::Expr::call(hostir::Expr::ident("rugo_to_bool"), vec![hostir::Expr::ident(lhs_name.clone())]),
        BinOp::And => hostir::Expr::Unary {
            op: "!",
            expr: Box::new(hostir::Expr::call(
                hostir::Expr::ident("rugo_to_bool"),
                vec![hostir::Expr::ident(lhs_name.clone())],
            )),
        },
        _ => unreachable!("only Or/And reach lower_short_circuit"),
    };

    let body = vec![
        hostir::Stmt::Assign { targets: vec![lhs_name.clone()], op: hostir::AssignOp::Declare, values: vec![left] },
        hostir::Stmt::If {
            cond: decides_here,
            then_body: vec![hostir::Stmt::Return(vec![hostir::Expr::ident(lhs_name)])],
            else_body: None,
        },
        hostir::Stmt::Return(vec![right]),
    ];
    hostir::Expr::Iife { results: vec!["interface{}".to_string()], body }
}

fn lower_unary(cg: &mut Codegen, _id: usize, u: &UnaryExpr) -> hostir::Expr {
    let operand_ty = cg.types.expr_type(u.expr.id);
    let operand = lower_expr(cg, &u.expr);
    match u.op {
        UnOp::Not => hostir::Expr::call(hostir::Expr::ident("rugo_to_bool"), vec![operand]),
        UnOp::Neg if operand_ty.is_typed_for_codegen() && operand_ty != Type::String && operand_ty != Type::Bool => {
            hostir::Expr::Unary { op: "-", expr: Box::new(operand) }
        }
        UnOp::Neg => hostir::Expr::call(
            hostir::Expr::ident("rugo_sub"),
            vec![hostir::Expr::Int(0), operand],
        ),
    }
}

fn lower_interpolated(cg: &mut Codegen, _id: usize, parts: &[InterpolationPart]) -> hostir::Expr {
    let all_typed_strings = parts.iter().all(|p| match p {
        InterpolationPart::Literal(_) => true,
        InterpolationPart::Expr(e) => cg.types.expr_type(e.id) == Type::String,
    });

    if all_typed_strings {
        let pieces = parts
            .iter()
            .map(|p| match p {
                InterpolationPart::Literal(s) => hostir::Expr::String(s.clone()),
                InterpolationPart::Expr(e) => lower_expr(cg, e),
            })
            .collect();
        return hostir::Expr::Concat(pieces);
    }

    let mut format = String::new();
    let mut args = Vec::new();
    for part in parts {
        match part {
            InterpolationPart::Literal(s) => format.push_str(&s.replace('%', "%%")),
            InterpolationPart::Expr(e) => {
                format.push_str("%s");
                args.push(hostir::Expr::call(hostir::Expr::ident("rugo_to_string"), vec![lower_expr(cg, e)]));
            }
        }
    }
    hostir::Expr::Sprintf { format, args }
}

fn lower_lambda(cg: &mut Codegen, lambda: &LambdaExpr) -> hostir::Expr {
    let (min, max, _) = lambda.params.arity();
    cg.scope.push();
    let mut body = Vec::new();
    body.push(hostir::Stmt::If {
        cond: hostir::Expr::Binary {
            left: Box::new(hostir::Expr::call(hostir::Expr::ident("len"), vec![hostir::Expr::ident("rugoArgs")])),
            op: "<",
            right: Box::new(hostir::Expr::Int(min as i64)),
        },
        then_body: vec![hostir::Stmt::ExprStmt(hostir::Expr::call(
            hostir::Expr::ident("panic"),
            vec![hostir::Expr::Sprintf {
                format: "wrong number of arguments (%d for %d)".to_string(),
                args: vec![
                    hostir::Expr::call(hostir::Expr::ident("len"), vec![hostir::Expr::ident("rugoArgs")]),
                    hostir::Expr::Int(min as i64),
                ],
            }],
        ))],
        else_body: None,
    });
    for (i, p) in lambda.params.0.iter().enumerate() {
        cg.scope.declare(&p.name, Type::Dynamic);
        let value = if i < max {
            let idx = hostir::Expr::Index { target: Box::new(hostir::Expr::ident("rugoArgs")), index: Box::new(hostir::Expr::Int(i as i64)) };
            if let Some(default) = &p.default {
                let default_expr = lower_expr(cg, default);
                hostir::Expr::Iife {
                    results: vec!["interface{}".to_string()],
                    body: vec![
                        hostir::Stmt::If {
                            cond: hostir::Expr::Binary {
                                left: Box::new(hostir::Expr::call(hostir::Expr::ident("len"), vec![hostir::Expr::ident("rugoArgs")])),
                                op: ">",
                                right: Box::new(hostir::Expr::Int(i as i64)),
                            },
                            then_body: vec![hostir::Stmt::Return(vec![idx])],
                            else_body: None,
                        },
                        hostir::Stmt::Return(vec![default_expr]),
                    ],
                }
            } else {
                idx
            }
        } else {
            hostir::Expr::Nil
        };
        body.push(hostir::Stmt::Assign { targets: vec![p.name.clone()], op: hostir::AssignOp::Declare, values: vec![value] });
    }
    body.extend(lower_stmts(cg, &lambda.body));
    cg.scope.pop();
    hostir::Expr::Lambda { params: vec![("rugoArgs".to_string(), "...interface{}".to_string())], results: vec!["interface{}".to_string()], body }
}

/// `try tried or handler` → IIFE returning `(r interface{})` with a
/// `defer { if e := recover(); ... }` wrapping the handler body.
fn lower_try(cg: &mut Codegen, t: &LoweredTry) -> hostir::Expr {
    cg.scope.push();
    cg.scope.declare(&t.err_name, Type::Dynamic);
    let tried = lower_expr(cg, &t.tried);
    let mut handler_body = vec![hostir::Stmt::Assign {
        targets: vec![t.err_name.clone()],
        op: hostir::AssignOp::Declare,
        values: vec![hostir::Expr::call(hostir::Expr::ident("recover"), vec![])],
    }];
    let handler_cond = hostir::Expr::Binary {
        left: Box::new(hostir::Expr::ident(t.err_name.clone())),
        op: "!=",
        right: Box::new(hostir::Expr::Nil),
    };
    handler_body.push(hostir::Stmt::If { cond: handler_cond, then_body: lower_stmts(cg, &t.handler), else_body: None });
    cg.scope.pop();

    let defer_lambda = hostir::Expr::Lambda { params: vec![], results: vec![], body: handler_body };
    let body = vec![
        hostir::Stmt::Defer(hostir::Expr::call(defer_lambda, vec![])),
        hostir::Stmt::Return(vec![tried]),
    ];
    hostir::Expr::Iife { results: vec!["interface{}".to_string()], body }
}

/// `spawn { ... }` → IIFE constructing a task value and launching a
/// goroutine whose deferred recover writes `err` and closes `done`.
fn lower_spawn(cg: &mut Codegen, s: &LoweredSpawn) -> hostir::Expr {
    cg.scope.push();
    let goroutine_body = vec![
        hostir::Stmt::Defer(hostir::Expr::Lambda {
            params: vec![],
            results: vec![],
            body: vec![
                hostir::Stmt::Assign {
                    targets: vec!["rugoErr".to_string()],
                    op: hostir::AssignOp::Declare,
                    values: vec![hostir::Expr::call(hostir::Expr::ident("recover"), vec![])],
                },
                hostir::Stmt::If {
                    cond: hostir::Expr::Binary { left: Box::new(hostir::Expr::ident("rugoErr")), op: "!=", right: Box::new(hostir::Expr::Nil) },
                    then_body: vec![hostir::Stmt::Assign {
                        targets: vec!["task.err".to_string()],
                        op: hostir::AssignOp::Assign,
                        values: vec![hostir::Expr::ident("rugoErr")],
                    }],
                    else_body: None,
                },
                hostir::Stmt::ExprStmt(hostir::Expr::call(hostir::Expr::ident("close"), vec![hostir::Expr::ident("task.done")])),
            ],
        }),
    ]
    .into_iter()
    .map(|s| s)
    .chain(lower_stmts(cg, &s.body))
    .collect::<Vec<_>>();
    cg.scope.pop();

    let body = vec![
        hostir::Stmt::Assign {
            targets: vec!["task".to_string()],
            op: hostir::AssignOp::Declare,
            values: vec![hostir::Expr::Raw("&rugoTask{done: make(chan struct{})}".to_string())],
        },
        hostir::Stmt::Go(hostir::Expr::call(
            hostir::Expr::Lambda { params: vec![], results: vec![], body: goroutine_body },
            vec![],
        )),
        hostir::Stmt::Return(vec![hostir::Expr::ident("task")]),
    ];
    hostir::Expr::Iife { results: vec!["*rugoTask".to_string()], body }
}

/// `parallel { branch; branch; ... }` → IIFE allocating a result slice,
/// launching one goroutine per branch with once-only panic capture, joining
/// via a wait group, and rethrowing the first panic after join.
fn lower_parallel(cg: &mut Codegen, p: &LoweredParallel) -> hostir::Expr {
    let n = p.branches.len();
    let mut body = vec![
        hostir::Stmt::Assign {
            targets: vec!["rugoResults".to_string()],
            op: hostir::AssignOp::Declare,
            values: vec![hostir::Expr::Raw(format!("make([]interface{{}}, {n})"))],
        },
        hostir::Stmt::Assign {
            targets: vec!["rugoWg".to_string()],
            op: hostir::AssignOp::Declare,
            values: vec![hostir::Expr::Raw("sync.WaitGroup{}".to_string())],
        },
        hostir::Stmt::Assign {
            targets: vec!["rugoPanicOnce".to_string()],
            op: hostir::AssignOp::Declare,
            values: vec![hostir::Expr::Raw("sync.Once{}".to_string())],
        },
        hostir::Stmt::Assign {
            targets: vec!["rugoFirstPanic".to_string()],
            op: hostir::AssignOp::Declare,
            values: vec![hostir::Expr::Nil],
        },
        hostir::Stmt::ExprStmt(hostir::Expr::call(
            hostir::Expr::dot(hostir::Expr::ident("rugoWg"), "Add".to_string()),
            vec![hostir::Expr::Int(n as i64)],
        )),
    ];

    for (i, branch) in p.branches.iter().enumerate() {
        cg.scope.push();
        let branch_body = lower_stmts(cg, branch);
        cg.scope.pop();
        let goroutine = hostir::Expr::Lambda {
            params: vec![],
            results: vec![],
            body: vec![
                hostir::Stmt::Defer(hostir::Expr::call(hostir::Expr::dot(hostir::Expr::ident("rugoWg"), "Done".to_string()), vec![])),
                hostir::Stmt::Defer(hostir::Expr::Raw(
                    "func() { if r := recover(); r != nil { rugoPanicOnce.Do(func() { rugoFirstPanic = r }) } }()".to_string(),
                )),
                hostir::Stmt::Assign {
                    targets: vec![format!("rugoResults[{i}]")],
                    op: hostir::AssignOp::Assign,
                    values: vec![hostir::Expr::Iife { results: vec!["interface{}".to_string()], body: branch_body }],
                },
            ],
        };
        body.push(hostir::Stmt::Go(hostir::Expr::call(goroutine, vec![])));
    }

    body.push(hostir::Stmt::ExprStmt(hostir::Expr::call(
        hostir::Expr::dot(hostir::Expr::ident("rugoWg"), "Wait".to_string()),
        vec![],
    )));
    body.push(hostir::Stmt::If {
        cond: hostir::Expr::Binary {
            left: Box::new(hostir::Expr::ident("rugoFirstPanic")),
            op: "!=",
            right: Box::new(hostir::Expr::Nil),
        },
        then_body: vec![hostir::Stmt::ExprStmt(hostir::Expr::call(hostir::Expr::ident("panic"), vec![hostir::Expr::ident("rugoFirstPanic")]))],
        else_body: None,
    });
    body.push(hostir::Stmt::Return(vec![hostir::Expr::ident("rugoResults")]));

    hostir::Expr::Iife { results: vec!["[]interface{}".to_string()], body }
}

fn lower_case(cg: &mut Codegen, _id: usize, c: &CaseExpr) -> hostir::Expr {
    let subject_name = c.subject.as_ref().map(|_| cg.fresh_tmp("rugoSubject"));
    let mut body = Vec::new();
    if let (Some(name), Some(subject)) = (&subject_name, &c.subject) {
        let subject = lower_expr(cg, subject);
        body.push(hostir::Stmt::Assign { targets: vec![name.clone()], op: hostir::AssignOp::Declare, values: vec![subject] });
    }

    let mut chain: Option<hostir::Stmt> = None;
    for arm in c.arms.iter().rev() {
        let pattern = lower_expr(cg, &arm.pattern);
        let cond = match &subject_name {
            Some(name) => hostir::Expr::call(hostir::Expr::ident("rugo_eq"), vec![hostir::Expr::ident(name.clone()), pattern]),
            None => hostir::Expr::call(hostir::Expr::ident("rugo_to_bool"), vec![pattern]),
        };
        let value = lower_expr(cg, &arm.value);
        let then_body = vec![hostir::Stmt::Return(vec![value])];
        let else_body = chain.take().map(|s| vec![s]);
        chain = Some(hostir::Stmt::If { cond, then_body, else_body });
    }
    if let Some(stmt) = chain {
        body.push(stmt);
    }
    if let Some(else_value) = &c.else_value {
        body.push(hostir::Stmt::Return(vec![lower_expr(cg, else_value)]));
    } else {
        body.push(hostir::Stmt::Return(vec![hostir::Expr::Nil]));
    }

    hostir::Expr::Iife { results: vec!["interface{}".to_string()], body }
}

fn lower_call(cg: &mut Codegen, _id: usize, c: &CallExpr) -> hostir::Expr {
    if let ExprKind::Ident(path) = &c.callee.kind {
        if path.is_simple() {
            return lower_simple_call(cg, path.name(), &c.args);
        }
        return lower_namespaced_call(cg, path.namespace().expect("non-simple path has a namespace"), path.name(), &c.args);
    }
    if let ExprKind::Dot { target, field } = &c.callee.kind {
        if let ExprKind::Ident(ns) = &target.kind {
            if ns.is_simple() && cg.module.names.contains_key(ns.name()) {
                return lower_namespaced_call(cg, ns.name(), field, &c.args);
            }
            if ns.is_simple() && cg.structs.contains_key(ns.name()) {
                return lower_struct_call(cg, ns.name(), field, &c.args);
            }
        }
        // Arbitrary `target.method(args)` — a generic instance method call.
        let target_expr = lower_expr(cg, target);
        let args = c.args.iter().map(|a| lower_expr(cg, a)).collect();
        return hostir::Expr::MethodCall { target: Box::new(target_expr), method: field.clone(), args };
    }

    // The callee is itself a computed value (a stored lambda, `try`/`case`
    // result, etc.) — call it directly.
    let callee = lower_expr(cg, &c.callee);
    let args = c.args.iter().map(|a| lower_expr(cg, a)).collect();
    hostir::Expr::call(callee, args)
}

fn lower_simple_call(cg: &mut Codegen, name: &str, args: &[Expr]) -> hostir::Expr {
    let lowered_args: Vec<hostir::Expr> = args.iter().map(|a| lower_expr(cg, a)).collect();
    match name {
        "print" | "puts" => hostir::Expr::call(hostir::Expr::ident("rugo_print"), lowered_args),
        "len" => hostir::Expr::call(hostir::Expr::ident("rugo_len"), lowered_args),
        _ => {
            if let Some(DeclKind::Func(f)) = cg.module.names.get(name).map(|d| &d.kind) {
                let go_name = mangle_func(&f.namespace, &f.name);
                hostir::Expr::call(hostir::Expr::ident(go_name), lowered_args)
            } else {
                hostir::Expr::call(hostir::Expr::ident(name), lowered_args)
            }
        }
    }
}

fn lower_namespaced_call(cg: &mut Codegen, ns: &str, name: &str, args: &[Expr]) -> hostir::Expr {
    let lowered_args: Vec<hostir::Expr> = args.iter().map(|a| lower_expr(cg, a)).collect();
    let Some(decl) = cg.module.names.get(ns).map(|d| d.kind.clone()) else {
        return hostir::Expr::call(hostir::Expr::ident(mangle_func(ns, name)), lowered_args);
    };
    match decl {
        DeclKind::StdModule { .. } => {
            hostir::Expr::call(hostir::Expr::ident(format!("rugo_std_{ns}_{name}")), lowered_args)
        }
        DeclKind::Bridge { package } => lower_bridge_call(cg, &package, name, args, lowered_args),
        DeclKind::RequireNamespace(nested) => {
            if let Some(DeclKind::Func(f)) = nested.names.get(name).map(|d| &d.kind) {
                hostir::Expr::call(hostir::Expr::ident(mangle_func(&f.namespace, &f.name)), lowered_args)
            } else {
                hostir::Expr::call(hostir::Expr::ident(mangle_func(ns, name)), lowered_args)
            }
        }
        DeclKind::Func(_) => hostir::Expr::call(hostir::Expr::ident(mangle_func("", ns)), lowered_args),
    }
}

fn lower_struct_call(cg: &mut Codegen, struct_name: &str, method: &str, args: &[Expr]) -> hostir::Expr {
    let lowered_args: Vec<hostir::Expr> = args.iter().map(|a| lower_expr(cg, a)).collect();
    if method == "new" {
        let fields = cg.structs.get(struct_name).map(|s| s.fields.clone()).unwrap_or_default();
        let entries = fields
            .into_iter()
            .zip(lowered_args)
            .map(|(field, value)| (hostir::Expr::String(field), value))
            .collect();
        return hostir::Expr::MapLiteral { key_ty: "string".to_string(), value_ty: "interface{}".to_string(), entries };
    }
    hostir::Expr::call(hostir::Expr::ident(mangle_func(struct_name, method)), lowered_args)
}

/// Per-param host-type conversions and return-value unwrapping for a bridge
/// call (spec.md §4.10's bridge-call rules).
fn lower_bridge_call(cg: &mut Codegen, package: &str, name: &str, args: &[Expr], lowered_args: Vec<hostir::Expr>) -> hostir::Expr {
    let Some(bridge) = cg.registry.bridge(package).and_then(|b| b.functions.get(name)) else {
        return hostir::Expr::call(hostir::Expr::ident(mangle_func(package, name)), lowered_args);
    };

    let converted: Vec<hostir::Expr> = lowered_args
        .into_iter()
        .zip(args.iter())
        .enumerate()
        .map(|(i, (lowered, arg))| match bridge.params.get(i) {
            Some(GoParamType::String) => hostir::Expr::call(hostir::Expr::ident("rugo_to_string"), vec![lowered]),
            Some(GoParamType::Int) => hostir::Expr::Cast { ty: "int".to_string(), expr: Box::new(lowered) },
            Some(GoParamType::Float) => hostir::Expr::call(hostir::Expr::ident("rugo_ensure_float"), vec![lowered]),
            Some(GoParamType::Bool) => hostir::Expr::call(hostir::Expr::ident("rugo_to_bool"), vec![lowered]),
            Some(GoParamType::Any) | None => {
                let _ = cg.types.expr_type(arg.id);
                lowered
            }
        })
        .collect();

    let call_name = bridge.needs_helper.map(str::to_string).unwrap_or_else(|| mangle_func(package, name));
    let raw_call = hostir::Expr::call(hostir::Expr::ident(call_name), converted);

    match &bridge.returns {
        ReturnShape::Single => raw_call,
        ReturnShape::ValueError => {
            let result = cg.fresh_tmp("rugoResult");
            let err = cg.fresh_tmp("rugoErr");
            hostir::Expr::Iife {
                results: vec!["interface{}".to_string()],
                body: vec![
                    hostir::Stmt::Assign {
                        targets: vec![result.clone(), err.clone()],
                        op: hostir::AssignOp::Declare,
                        values: vec![raw_call],
                    },
                    hostir::Stmt::ExprStmt(hostir::Expr::call(
                        hostir::Expr::ident("rugo_bridge_unwrap_error"),
                        vec![hostir::Expr::String(format!("{package}.{name}")), hostir::Expr::ident(err)],
                    )),
                    hostir::Stmt::Return(vec![hostir::Expr::ident(result)]),
                ],
            }
        }
        ReturnShape::ValueBool => {
            let result = cg.fresh_tmp("rugoResult");
            let ok = cg.fresh_tmp("rugoOk");
            hostir::Expr::Iife {
                results: vec!["interface{}".to_string()],
                body: vec![
                    hostir::Stmt::Assign {
                        targets: vec![result.clone(), ok.clone()],
                        op: hostir::AssignOp::Declare,
                        values: vec![raw_call],
                    },
                    hostir::Stmt::If {
                        cond: hostir::Expr::Unary { op: "!", expr: Box::new(hostir::Expr::ident(ok)) },
                        then_body: vec![hostir::Stmt::Return(vec![hostir::Expr::Nil])],
                        else_body: None,
                    },
                    hostir::Stmt::Return(vec![hostir::Expr::ident(result)]),
                ],
            }
        }
        ReturnShape::Struct(fields) => {
            let entries = fields
                .iter()
                .map(|f| (hostir::Expr::String(f.clone()), hostir::Expr::dot(raw_call.clone(), f.clone())))
                .collect();
            hostir::Expr::MapLiteral { key_ty: "string".to_string(), value_ty: "interface{}".to_string(), entries }
        }
        ReturnShape::FixedArray(n) => hostir::Expr::Slice {
            target: Box::new(raw_call),
            start: Some(Box::new(hostir::Expr::Int(0))),
            end: Some(Box::new(hostir::Expr::Int(*n as i64))),
        },
        ReturnShape::Multi(n) => {
            let tmp_names: Vec<String> = (0..*n).map(|i| cg.fresh_tmp(&format!("rugoMulti{i}"))).collect();
            hostir::Expr::Iife {
                results: vec!["[]interface{}".to_string()],
                body: vec![
                    hostir::Stmt::Assign {
                        targets: tmp_names.clone(),
                        op: hostir::AssignOp::Declare,
                        values: vec![raw_call],
                    },
                    hostir::Stmt::Return(vec![hostir::Expr::SliceLiteral {
                        elem_ty: "interface{}".to_string(),
                        elems: tmp_names.into_iter().map(hostir::Expr::ident).collect(),
                    }]),
                ],
            }
        }
    }
}

pub fn go_type_for(cg: &Codegen, expr_id: usize) -> &'static str {
    type_to_go(cg.types.expr_type(expr_id))
}
