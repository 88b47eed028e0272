use std::collections::HashMap;

use super::{unify, Type};
use crate::ast::{
    BinOp, BinaryExpr, CallExpr, CaseStmtNode, Expr, ExprKind, ForStmt, IfStmt, InterpolationPart,
    Params, Program, Stmt, StmtKind, UnOp, UnaryExpr,
};

/// Per-expression and per-function/variable types produced by
/// [`infer_program`]. Keyed by node id rather than address, matching the
/// walker's node identity scheme.
#[derive(Debug, Clone, Default)]
pub struct TypeInfo {
    expr_types: HashMap<usize, Type>,
    functions: HashMap<String, (Vec<Type>, Type)>,
    vars: HashMap<(String, String), Type>,
}

impl TypeInfo {
    pub fn expr_type(&self, expr_id: usize) -> Type {
        self.expr_types.get(&expr_id).copied().unwrap_or(Type::Unknown)
    }

    /// `(param types, return type)` for a function key (`Namespace.name` or
    /// bare `name`, see [`crate::ast::FuncDef::key`]).
    pub fn function_signature(&self, key: &str) -> Option<(&[Type], Type)> {
        self.functions.get(key).map(|(params, ret)| (params.as_slice(), *ret))
    }

    pub fn var_type(&self, scope_key: &str, name: &str) -> Type {
        self.vars
            .get(&(scope_key.to_string(), name.to_string()))
            .copied()
            .unwrap_or(Type::Unknown)
    }
}

struct InferCtx<'a> {
    info: &'a mut TypeInfo,
    vars: HashMap<String, Type>,
    returns: Vec<Type>,
}

/// Fixed-point inference over the merged program: up to 10 rounds, each
/// re-inferring every function body into a fresh variable scope seeded from
/// the current parameter types, then the top-level statements. Stops early
/// once the function signature table stops changing.
pub fn infer_program(program: &Program) -> TypeInfo {
    let mut info = TypeInfo::default();

    for stmt in &program.stmts {
        match &stmt.kind {
            StmtKind::FuncDef(f) => {
                info.functions
                    .insert(f.key(), (vec![Type::Unknown; f.params.0.len()], Type::Unknown));
            }
            StmtKind::TestDef(_) => {
                info.functions.insert(format!("test#{}", stmt.id), (Vec::new(), Type::Unknown));
            }
            StmtKind::BenchDef(_) => {
                info.functions.insert(format!("bench#{}", stmt.id), (Vec::new(), Type::Unknown));
            }
            _ => {}
        }
    }

    for _round in 0..10 {
        let snapshot = info.functions.clone();

        for stmt in &program.stmts {
            match &stmt.kind {
                StmtKind::FuncDef(f) => infer_function(&mut info, &f.key(), &f.params, &f.body),
                StmtKind::TestDef(t) => {
                    infer_function(&mut info, &format!("test#{}", stmt.id), &Params::default(), &t.body)
                }
                StmtKind::BenchDef(b) => {
                    infer_function(&mut info, &format!("bench#{}", stmt.id), &Params::default(), &b.body)
                }
                _ => {}
            }
        }

        let top_level: Vec<&Stmt> = program
            .stmts
            .iter()
            .filter(|s| !matches!(s.kind, StmtKind::FuncDef(_) | StmtKind::TestDef(_) | StmtKind::BenchDef(_)))
            .collect();
        let top_vars = {
            let mut ctx = InferCtx {
                info: &mut info,
                vars: HashMap::new(),
                returns: Vec::new(),
            };
            for stmt in top_level {
                infer_stmt(&mut ctx, stmt);
            }
            ctx.vars
        };
        for (name, ty) in top_vars {
            info.vars.insert((String::new(), name), ty);
        }

        if info.functions == snapshot {
            break;
        }
    }

    info
}

fn infer_function(info: &mut TypeInfo, key: &str, params: &Params, body: &[Stmt]) {
    let param_types = info.functions.get(key).map(|(p, _)| p.clone()).unwrap_or_default();
    let mut vars: HashMap<String, Type> = HashMap::new();
    for (param, ty) in params.0.iter().zip(param_types.iter()) {
        vars.insert(param.name.clone(), *ty);
    }

    let (vars, returns) = {
        let mut ctx = InferCtx {
            info,
            vars,
            returns: Vec::new(),
        };
        for stmt in body {
            infer_stmt(&mut ctx, stmt);
        }
        (ctx.vars, ctx.returns)
    };

    // A parameter reassigned from a dynamic expression widens to Dynamic for
    // the next round, rather than staying poisoned on a single bad guess.
    let mut new_param_types = param_types;
    for (i, param) in params.0.iter().enumerate() {
        if let (Some(slot), Some(&observed)) = (new_param_types.get_mut(i), vars.get(&param.name)) {
            *slot = unify(*slot, observed);
        }
    }
    let ret_ty = returns.into_iter().fold(Type::Unknown, unify);

    for (name, ty) in vars {
        info.vars.insert((key.to_string(), name), ty);
    }
    if let Some(entry) = info.functions.get_mut(key) {
        entry.0 = new_param_types;
        entry.1 = ret_ty;
    }
}

fn infer_stmt(ctx: &mut InferCtx, stmt: &Stmt) {
    match &stmt.kind {
        StmtKind::Assign { target, value } => {
            let ty = infer_expr(ctx, value);
            ctx.vars.insert(target.clone(), ty);
        }
        StmtKind::IndexAssign { target, index, value } => {
            infer_expr(ctx, target);
            infer_expr(ctx, index);
            infer_expr(ctx, value);
        }
        StmtKind::DotAssign { target, value, .. } => {
            infer_expr(ctx, target);
            infer_expr(ctx, value);
        }
        StmtKind::Expr(e) => {
            infer_expr(ctx, e);
        }
        StmtKind::If(IfStmt { cond, then_body, elifs, else_body }) => {
            infer_expr(ctx, cond);
            for s in then_body {
                infer_stmt(ctx, s);
            }
            for (c, body) in elifs {
                infer_expr(ctx, c);
                for s in body {
                    infer_stmt(ctx, s);
                }
            }
            if let Some(body) = else_body {
                for s in body {
                    infer_stmt(ctx, s);
                }
            }
        }
        StmtKind::While { cond, body } => {
            infer_expr(ctx, cond);
            for s in body {
                infer_stmt(ctx, s);
            }
        }
        StmtKind::For(ForStmt { var, value_var, iterable, body }) => {
            infer_expr(ctx, iterable);
            ctx.vars.insert(var.clone(), Type::Dynamic);
            if let Some(vv) = value_var {
                ctx.vars.insert(vv.clone(), Type::Dynamic);
            }
            // Run twice: the first pass may widen a variable assigned inside
            // the body, the second lets expressions see the widened type.
            for s in body {
                infer_stmt(ctx, s);
            }
            for s in body {
                infer_stmt(ctx, s);
            }
        }
        StmtKind::Break | StmtKind::Next => {}
        StmtKind::Return(value) => {
            let ty = value.as_ref().map(|e| infer_expr(ctx, e)).unwrap_or(Type::Nil);
            ctx.returns.push(ty);
        }
        StmtKind::ImplicitReturn(e)
        | StmtKind::TryResult(e)
        | StmtKind::SpawnReturn(e)
        | StmtKind::TryHandlerReturn(e) => {
            let ty = infer_expr(ctx, e);
            ctx.returns.push(ty);
        }
        StmtKind::FuncDef(_) | StmtKind::TestDef(_) | StmtKind::BenchDef(_) => {
            // Inferred directly from the program-level scan, not re-entered
            // when encountered while walking another scope's body.
        }
        StmtKind::Use(_) | StmtKind::Import(_) | StmtKind::Require(_) | StmtKind::Sandbox(_) => {}
        StmtKind::CaseStmt(CaseStmtNode { subject, arms, else_body }) => {
            if let Some(s) = subject {
                infer_expr(ctx, s);
            }
            for (pattern, body) in arms {
                infer_expr(ctx, pattern);
                for s in body {
                    infer_stmt(ctx, s);
                }
            }
            if let Some(body) = else_body {
                for s in body {
                    infer_stmt(ctx, s);
                }
            }
        }
    }
}

fn is_numeric(t: Type) -> bool {
    matches!(t, Type::Int | Type::Float)
}

fn infer_expr(ctx: &mut InferCtx, expr: &Expr) -> Type {
    let ty = match &expr.kind {
        ExprKind::Int(_) => Type::Int,
        ExprKind::Float(_) => Type::Float,
        ExprKind::String { .. } => Type::String,
        ExprKind::Bool(_) => Type::Bool,
        ExprKind::Nil => Type::Nil,
        ExprKind::Ident(path) => {
            if path.is_simple() {
                ctx.vars.get(path.name()).copied().unwrap_or(Type::Unknown)
            } else {
                Type::Dynamic
            }
        }
        ExprKind::Dot { target, .. } => {
            infer_expr(ctx, target);
            Type::Dynamic
        }
        ExprKind::Binary(b) => infer_binary(ctx, b),
        ExprKind::Unary(u) => infer_unary(ctx, u),
        ExprKind::Call(c) => infer_call(ctx, c),
        ExprKind::Index { target, index } => {
            infer_expr(ctx, target);
            infer_expr(ctx, index);
            Type::Dynamic
        }
        ExprKind::Slice { target, start, end } => {
            infer_expr(ctx, target);
            if let Some(s) = start {
                infer_expr(ctx, s);
            }
            if let Some(e) = end {
                infer_expr(ctx, e);
            }
            Type::Dynamic
        }
        ExprKind::Array(items) => {
            for item in items {
                infer_expr(ctx, item);
            }
            Type::Array
        }
        ExprKind::Hash(pairs) => {
            for (k, v) in pairs {
                infer_expr(ctx, k);
                infer_expr(ctx, v);
            }
            Type::Hash
        }
        ExprKind::Interpolated(parts) => {
            for part in parts {
                if let InterpolationPart::Expr(e) = part {
                    infer_expr(ctx, e);
                }
            }
            Type::String
        }
        ExprKind::Fn(lambda) => {
            let saved_vars = std::mem::take(&mut ctx.vars);
            let saved_returns = std::mem::take(&mut ctx.returns);
            for p in &lambda.params.0 {
                ctx.vars.insert(p.name.clone(), Type::Unknown);
            }
            for s in &lambda.body {
                infer_stmt(ctx, s);
            }
            ctx.vars = saved_vars;
            ctx.returns = saved_returns;
            Type::Dynamic
        }
        ExprKind::LoweredTry(t) => {
            infer_expr(ctx, &t.tried);
            ctx.vars.insert(t.err_name.clone(), Type::Dynamic);
            for s in &t.handler {
                infer_stmt(ctx, s);
            }
            Type::Dynamic
        }
        ExprKind::LoweredSpawn(s) => {
            for stmt in &s.body {
                infer_stmt(ctx, stmt);
            }
            Type::Dynamic
        }
        ExprKind::LoweredParallel(p) => {
            for branch in &p.branches {
                for stmt in branch {
                    infer_stmt(ctx, stmt);
                }
            }
            Type::Array
        }
        ExprKind::Case(c) => {
            if let Some(s) = &c.subject {
                infer_expr(ctx, s);
            }
            let mut result = Type::Unknown;
            for arm in &c.arms {
                infer_expr(ctx, &arm.pattern);
                result = unify(result, infer_expr(ctx, &arm.value));
            }
            if let Some(e) = &c.else_value {
                result = unify(result, infer_expr(ctx, e));
            }
            result
        }
    };
    ctx.info.expr_types.insert(expr.id, ty);
    ty
}

fn infer_binary(ctx: &mut InferCtx, b: &BinaryExpr) -> Type {
    let lt = infer_expr(ctx, &b.left);
    let rt = infer_expr(ctx, &b.right);
    match b.op {
        BinOp::Add => match (lt, rt) {
            (Type::String, Type::String) => Type::String,
            (Type::Int, Type::Int) => Type::Int,
            (Type::Unknown, _) | (_, Type::Unknown) => Type::Unknown,
            (a, b) if is_numeric(a) && is_numeric(b) => Type::Float,
            _ => Type::Dynamic,
        },
        BinOp::Sub | BinOp::Mul | BinOp::Div | BinOp::Mod => match (lt, rt) {
            (Type::Int, Type::Int) => Type::Int,
            (Type::Unknown, _) | (_, Type::Unknown) => Type::Unknown,
            (a, b) if is_numeric(a) && is_numeric(b) => Type::Float,
            _ => Type::Dynamic,
        },
        BinOp::Eq | BinOp::Ne => {
            if lt == rt && lt.is_resolved() {
                Type::Bool
            } else {
                Type::Dynamic
            }
        }
        BinOp::Lt | BinOp::Gt | BinOp::Le | BinOp::Ge => {
            if lt == rt && (is_numeric(lt) || lt == Type::String) {
                Type::Bool
            } else {
                Type::Dynamic
            }
        }
        BinOp::And | BinOp::Or => {
            if lt == Type::Bool && rt == Type::Bool {
                Type::Bool
            } else {
                Type::Dynamic
            }
        }
    }
}

fn infer_unary(ctx: &mut InferCtx, u: &UnaryExpr) -> Type {
    let t = infer_expr(ctx, &u.expr);
    match u.op {
        UnOp::Neg if is_numeric(t) => t,
        UnOp::Neg if t == Type::Unknown => Type::Unknown,
        UnOp::Neg => Type::Dynamic,
        UnOp::Not => Type::Bool,
    }
}

fn infer_call(ctx: &mut InferCtx, c: &CallExpr) -> Type {
    infer_expr(ctx, &c.callee);
    let arg_types: Vec<Type> = c.args.iter().map(|a| infer_expr(ctx, a)).collect();

    let key = match &c.callee.kind {
        ExprKind::Ident(path) => Some(path.to_string()),
        ExprKind::Dot { target, field } => match &target.kind {
            ExprKind::Ident(path) => Some(format!("{path}.{field}")),
            _ => None,
        },
        _ => None,
    };
    let Some(key) = key else { return Type::Dynamic };
    let Some((params, ret)) = ctx.info.functions.get_mut(&key) else {
        return Type::Dynamic;
    };

    for (slot, arg_ty) in params.iter_mut().zip(arg_types.iter()) {
        if slot.is_resolved() && arg_ty.is_resolved() {
            *slot = unify(*slot, *arg_ty);
        }
    }
    *ret
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::ast::{ExprKind, FuncDef, IdentPath, Param, StmtKind};

    fn int_lit(id: usize) -> Expr {
        Expr::new(id, ExprKind::Int(1))
    }

    fn ident(id: usize, name: &str) -> Expr {
        Expr::new(id, ExprKind::Ident(IdentPath::from_name(name)))
    }

    #[test]
    fn typed_arithmetic_infers_int() {
        let program = Program {
            file: "t.rugo".into(),
            raw_source: String::new(),
            stmts: vec![Stmt::new(
                1,
                StmtKind::Assign {
                    target: "x".into(),
                    value: Expr::new(
                        2,
                        ExprKind::Binary(BinaryExpr {
                            left: Box::new(int_lit(3)),
                            op: BinOp::Add,
                            right: Box::new(int_lit(4)),
                        }),
                    ),
                },
                1,
                1,
            )],
            structs: vec![],
        };
        let info = infer_program(&program);
        assert_eq!(info.expr_type(2), Type::Int);
        assert_eq!(info.var_type("", "x"), Type::Int);
    }

    #[test]
    fn fibonacci_converges_to_int_signature() {
        // def fib(n) if n < 2 then n else fib(n - 1) + fib(n - 2) end end
        let n_lt_2 = Expr::new(
            10,
            ExprKind::Binary(BinaryExpr {
                left: Box::new(ident(11, "n")),
                op: BinOp::Lt,
                right: Box::new(int_lit(12)),
            }),
        );
        let call = |id: usize, arg_id: usize, offset: i64| {
            Expr::new(
                id,
                ExprKind::Call(CallExpr {
                    callee: Box::new(ident(arg_id, "fib")),
                    args: vec![Expr::new(
                        arg_id + 1,
                        ExprKind::Binary(BinaryExpr {
                            left: Box::new(ident(arg_id + 2, "n")),
                            op: BinOp::Sub,
                            right: Box::new(Expr::new(arg_id + 3, ExprKind::Int(offset))),
                        }),
                    )],
                }),
            )
        };
        let recurse = Expr::new(
            20,
            ExprKind::Binary(BinaryExpr {
                left: Box::new(call(21, 100, 1)),
                op: BinOp::Add,
                right: Box::new(call(22, 200, 2)),
            }),
        );
        let body = vec![Stmt::new(
            2,
            StmtKind::If(IfStmt {
                cond: n_lt_2,
                then_body: vec![Stmt::new(3, StmtKind::ImplicitReturn(ident(13, "n")), 1, 1)],
                elifs: vec![],
                else_body: Some(vec![Stmt::new(4, StmtKind::ImplicitReturn(recurse), 1, 1)]),
            }),
            1,
            1,
        )];
        let program = Program {
            file: "fib.rugo".into(),
            raw_source: String::new(),
            stmts: vec![Stmt::new(
                1,
                StmtKind::FuncDef(FuncDef {
                    name: "fib".into(),
                    namespace: String::new(),
                    params: Params(vec![Param { name: "n".into(), default: None }]),
                    body,
                    source_file: "fib.rugo".into(),
                    line: 1,
                }),
                1,
                1,
            )],
            structs: vec![],
        };

        let info = infer_program(&program);
        let (params, ret) = info.function_signature("fib").unwrap();
        assert_eq!(params, &[Type::Int]);
        assert_eq!(ret, Type::Int);
    }

    #[test]
    fn for_loop_variable_is_dynamic() {
        let program = Program {
            file: "t.rugo".into(),
            raw_source: String::new(),
            stmts: vec![Stmt::new(
                1,
                StmtKind::For(ForStmt {
                    var: "x".into(),
                    value_var: None,
                    iterable: Expr::new(2, ExprKind::Array(vec![])),
                    body: vec![Stmt::new(3, StmtKind::Expr(ident(4, "x")), 1, 1)],
                }),
                1,
                1,
            )],
            structs: vec![],
        };
        let info = infer_program(&program);
        assert_eq!(info.var_type("", "x"), Type::Dynamic);
    }
}
