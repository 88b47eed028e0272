//! Semantic checks (L8): undefined-identifier, const-reassignment, and
//! arity, run over an already-resolved [`Program`] before codegen.
//!
//! Grounded on `semantic/module.rs`'s scope-chain lookup (adapted to a
//! simpler parent-linked block scope, since Rugo scoping is lexical block
//! nesting rather than relational column namespaces) and
//! `semantic/resolver.rs`'s practice of reporting the specific kind of name
//! that went unresolved rather than one generic "not found".

pub mod scope;

use std::collections::HashMap;

use anyhow::{bail, Result};

use crate::ast::{Expr, ExprKind, ForStmt, IdentPath, IfStmt, Program, Stmt, StmtKind, StructInfo};
use crate::resolve::{Decl, DeclKind, Module, Registry};

use scope::Scope;

struct CheckCtx<'a> {
    module: &'a Module,
    registry: &'a Registry,
    structs: &'a HashMap<String, &'a StructInfo>,
    file: &'a str,
}

/// Runs every L8 check over `program`, stopping at the first offending
/// statement (spec.md §4.8: "report … on the first offending use").
pub fn check_program(program: &Program, module: &Module, registry: &Registry, file: &str) -> Result<()> {
    check_consts(program, file)?;

    let structs = build_struct_table(&program.structs);
    let ctx = CheckCtx { module, registry, structs: &structs, file };

    let global = Scope::root();
    for name in module.names.keys() {
        global.declare(name, 0);
    }
    for name in structs.keys() {
        global.declare(name, 0);
    }

    check_stmts(&ctx, &program.stmts, &global)
}

fn build_struct_table(structs: &[StructInfo]) -> HashMap<String, &StructInfo> {
    structs.iter().map(|s| (s.name.clone(), s)).collect()
}

/// Uppercase-leading names are constants: legal to assign once, an error to
/// reassign. Tracked flat across the whole program rather than per-scope —
/// Rugo has no module/class nesting for constants to be lexically scoped to.
fn check_consts(program: &Program, file: &str) -> Result<()> {
    let mut declared: HashMap<String, usize> = HashMap::new();
    let mut error = None;
    crate::ast::walk_stmts(&program.stmts, &mut |stmt| {
        if error.is_some() {
            return false;
        }
        if let StmtKind::Assign { target, .. } = &stmt.kind {
            if is_const_name(target) {
                if let Some(&first_line) = declared.get(target) {
                    error = Some(format!(
                        "{file}:{}: cannot reassign constant `{target}` (first assigned at line {first_line})",
                        stmt.line
                    ));
                    return false;
                }
                declared.insert(target.clone(), stmt.line);
            }
        }
        true
    });
    match error {
        Some(e) => bail!(e),
        None => Ok(()),
    }
}

fn is_const_name(name: &str) -> bool {
    name.chars().next().is_some_and(|c| c.is_ascii_uppercase())
}

fn check_stmts(ctx: &CheckCtx, stmts: &[Stmt], scope: &Scope) -> Result<()> {
    for stmt in stmts {
        check_stmt(ctx, stmt, scope)?;
    }
    Ok(())
}

fn check_stmt(ctx: &CheckCtx, stmt: &Stmt, scope: &Scope) -> Result<()> {
    match &stmt.kind {
        StmtKind::Assign { target, value } => {
            check_expr(ctx, value, scope, stmt.line)?;
            scope.declare(target, stmt.line);
        }
        StmtKind::IndexAssign { target, index, value } => {
            check_expr(ctx, target, scope, stmt.line)?;
            check_expr(ctx, index, scope, stmt.line)?;
            check_expr(ctx, value, scope, stmt.line)?;
        }
        StmtKind::DotAssign { target, value, .. } => {
            check_expr(ctx, target, scope, stmt.line)?;
            check_expr(ctx, value, scope, stmt.line)?;
        }
        StmtKind::Expr(e)
        | StmtKind::ImplicitReturn(e)
        | StmtKind::TryResult(e)
        | StmtKind::SpawnReturn(e)
        | StmtKind::TryHandlerReturn(e) => {
            check_expr(ctx, e, scope, stmt.line)?;
        }
        StmtKind::If(IfStmt { cond, then_body, elifs, else_body }) => {
            check_expr(ctx, cond, scope, stmt.line)?;
            // No child scope: Ruby-like leak-out, an assignment in any
            // branch is visible to statements after the `if`.
            check_stmts(ctx, then_body, scope)?;
            for (elif_cond, body) in elifs {
                check_expr(ctx, elif_cond, scope, stmt.line)?;
                check_stmts(ctx, body, scope)?;
            }
            if let Some(body) = else_body {
                check_stmts(ctx, body, scope)?;
            }
        }
        StmtKind::While { cond, body } => {
            check_expr(ctx, cond, scope, stmt.line)?;
            check_stmts(ctx, body, &scope.child())?;
        }
        StmtKind::For(ForStmt { var, value_var, iterable, body }) => {
            check_expr(ctx, iterable, scope, stmt.line)?;
            let child = scope.child();
            child.declare(var, stmt.line);
            if let Some(v) = value_var {
                child.declare(v, stmt.line);
            }
            check_stmts(ctx, body, &child)?;
        }
        StmtKind::Break | StmtKind::Next => {}
        StmtKind::Return(value) => {
            if let Some(e) = value {
                check_expr(ctx, e, scope, stmt.line)?;
            }
        }
        StmtKind::FuncDef(f) => {
            // Plain `def`s aren't closures: their scope is rooted at the
            // globals, not at the lexical scope surrounding the definition.
            let fn_scope = global_of(scope).child();
            for p in &f.params.0 {
                fn_scope.declare(&p.name, f.line);
            }
            check_stmts(ctx, &f.body, &fn_scope)?;
        }
        StmtKind::TestDef(t) => check_stmts(ctx, &t.body, &global_of(scope).child())?,
        StmtKind::BenchDef(b) => check_stmts(ctx, &b.body, &global_of(scope).child())?,
        StmtKind::Use(_) | StmtKind::Import(_) | StmtKind::Require(_) | StmtKind::Sandbox(_) => {}
        StmtKind::CaseStmt(c) => {
            if let Some(subject) = &c.subject {
                check_expr(ctx, subject, scope, stmt.line)?;
            }
            for (pattern, body) in &c.arms {
                check_expr(ctx, pattern, scope, stmt.line)?;
                check_stmts(ctx, body, scope)?;
            }
            if let Some(body) = &c.else_body {
                check_stmts(ctx, body, scope)?;
            }
        }
    }
    Ok(())
}

/// Walks a scope's parent chain to its root. `FuncDef`/`TestDef`/`BenchDef`
/// bodies anchor there rather than at the scope they're textually nested
/// in, since the language's named definitions don't close over locals.
fn global_of(scope: &Scope) -> Scope {
    let mut current = scope.clone();
    while let Some(parent) = current.parent() {
        current = parent;
    }
    current
}

fn check_expr(ctx: &CheckCtx, expr: &Expr, scope: &Scope, line: usize) -> Result<()> {
    match &expr.kind {
        ExprKind::Ident(path) => {
            if path.is_simple() {
                if !scope.is_defined(path.name()) {
                    bail!("{}:{line}: undefined variable '{}'", ctx.file, path.name());
                }
            } else {
                check_namespaced(ctx, path, line)?;
            }
        }
        ExprKind::Dot { target, field } => {
            if let ExprKind::Ident(path) = &target.kind {
                if path.is_simple() && !scope.is_defined(path.name()) {
                    let full = IdentPath::from_parts(vec![path.name().to_string(), field.clone()]);
                    return check_namespaced(ctx, &full, line);
                }
            }
            check_expr(ctx, target, scope, line)?;
        }
        ExprKind::Binary(b) => {
            check_expr(ctx, &b.left, scope, line)?;
            check_expr(ctx, &b.right, scope, line)?;
        }
        ExprKind::Unary(u) => check_expr(ctx, &u.expr, scope, line)?,
        ExprKind::Call(c) => {
            check_expr(ctx, &c.callee, scope, line)?;
            for a in &c.args {
                check_expr(ctx, a, scope, line)?;
            }
            check_arity(ctx, &c.callee, c.args.len(), line)?;
        }
        ExprKind::Index { target, index } => {
            check_expr(ctx, target, scope, line)?;
            check_expr(ctx, index, scope, line)?;
        }
        ExprKind::Slice { target, start, end } => {
            check_expr(ctx, target, scope, line)?;
            if let Some(s) = start {
                check_expr(ctx, s, scope, line)?;
            }
            if let Some(e) = end {
                check_expr(ctx, e, scope, line)?;
            }
        }
        ExprKind::Array(items) => {
            for i in items {
                check_expr(ctx, i, scope, line)?;
            }
        }
        ExprKind::Hash(pairs) => {
            for (k, v) in pairs {
                check_expr(ctx, k, scope, line)?;
                check_expr(ctx, v, scope, line)?;
            }
        }
        ExprKind::Interpolated(parts) => {
            for part in parts {
                if let crate::ast::InterpolationPart::Expr(e) = part {
                    check_expr(ctx, e, scope, line)?;
                }
            }
        }
        ExprKind::Fn(lambda) => {
            let child = scope.child();
            for p in &lambda.params.0 {
                child.declare(&p.name, line);
            }
            check_stmts(ctx, &lambda.body, &child)?;
        }
        ExprKind::LoweredTry(t) => {
            check_expr(ctx, &t.tried, scope, line)?;
            let child = scope.child();
            child.declare(&t.err_name, line);
            check_stmts(ctx, &t.handler, &child)?;
        }
        ExprKind::LoweredSpawn(s) => check_stmts(ctx, &s.body, &scope.child())?,
        ExprKind::LoweredParallel(p) => {
            for branch in &p.branches {
                check_stmts(ctx, branch, &scope.child())?;
            }
        }
        ExprKind::Case(c) => {
            if let Some(s) = &c.subject {
                check_expr(ctx, s, scope, line)?;
            }
            for arm in &c.arms {
                check_expr(ctx, &arm.pattern, scope, line)?;
                check_expr(ctx, &arm.value, scope, line)?;
            }
            if let Some(e) = &c.else_value {
                check_expr(ctx, e, scope, line)?;
            }
        }
        ExprKind::Int(_) | ExprKind::Float(_) | ExprKind::String { .. } | ExprKind::Bool(_) | ExprKind::Nil => {}
    }
    Ok(())
}

/// Validates `ns.name` against whichever registry `ns` actually names —
/// stdlib module, host bridge, required module, or struct — reporting the
/// specific kind of miss rather than a single generic "undefined".
fn check_namespaced(ctx: &CheckCtx, path: &IdentPath, line: usize) -> Result<()> {
    let ns = path.namespace().expect("check_namespaced only called on a dotted path");
    let name = path.name();

    match ctx.module.names.get(ns) {
        Some(Decl { kind: DeclKind::StdModule { funcs }, .. }) => {
            if !funcs.contains(name) {
                bail!("{}:{line}: module `{ns}` has no function `{name}`", ctx.file);
            }
        }
        Some(Decl { kind: DeclKind::Bridge { package }, .. }) => {
            let bridge = ctx
                .registry
                .bridge(package)
                .expect("a Bridge decl's package was validated against the registry at resolve time");
            if !bridge.functions.contains_key(name) {
                bail!("{}:{line}: bridge `{ns}` has no function `{name}`", ctx.file);
            }
        }
        Some(Decl { kind: DeclKind::RequireNamespace(nested), .. }) => {
            if !nested.names.contains_key(name) {
                bail!("{}:{line}: required module `{ns}` has no function `{name}`", ctx.file);
            }
        }
        Some(Decl { kind: DeclKind::Func(_), .. }) => {
            bail!("{}:{line}: `{ns}` is a function, not a namespace", ctx.file);
        }
        None => match ctx.structs.get(ns) {
            Some(s) => {
                if name != "new" && !s.fields.iter().any(|f| f == name) {
                    bail!("{}:{line}: struct `{ns}` has no field `{name}`", ctx.file);
                }
            }
            None => bail!("{}:{line}: undefined module or struct `{ns}`", ctx.file),
        },
    }
    Ok(())
}

/// Arity check for a call whose callee statically names a declared
/// function: bare top-level `def`s and `require`d-module functions. Bridge
/// functions check against their declared `(params, variadic)` shape
/// instead. Anything else (a variable holding a lambda, a struct
/// constructor/accessor, a stdlib call) is left to runtime.
fn check_arity(ctx: &CheckCtx, callee: &Expr, argc: usize, line: usize) -> Result<()> {
    match &callee.kind {
        ExprKind::Ident(path) if path.is_simple() => {
            if let Some(Decl { kind: DeclKind::Func(f), .. }) = ctx.module.names.get(path.name()) {
                report_arity_mismatch(ctx, path.name(), f.params.arity(), argc, line)?;
            }
        }
        ExprKind::Ident(path) => check_namespaced_arity(ctx, path, argc, line)?,
        ExprKind::Dot { target, field } => {
            if let ExprKind::Ident(p) = &target.kind {
                if p.is_simple() {
                    let full = IdentPath::from_parts(vec![p.name().to_string(), field.clone()]);
                    check_namespaced_arity(ctx, &full, argc, line)?;
                }
            }
        }
        _ => {}
    }
    Ok(())
}

fn check_namespaced_arity(ctx: &CheckCtx, path: &IdentPath, argc: usize, line: usize) -> Result<()> {
    let ns = path.namespace().expect("check_namespaced_arity only called on a dotted path");
    let name = path.name();
    let full_name = path.to_string();

    let Some(decl) = ctx.module.names.get(ns) else {
        return Ok(()); // struct ctor/accessor calling convention is codegen-decided
    };
    match &decl.kind {
        DeclKind::RequireNamespace(nested) => {
            if let Some(Decl { kind: DeclKind::Func(f), .. }) = nested.names.get(name) {
                report_arity_mismatch(ctx, &full_name, f.params.arity(), argc, line)?;
            }
        }
        DeclKind::Bridge { package } => {
            if let Some(bridge) = ctx.registry.bridge(package) {
                if let Some(bf) = bridge.functions.get(name) {
                    let min = bf.params.len();
                    if bf.variadic {
                        if argc < min {
                            bail!(
                                "{}:{line}: too few arguments to `{full_name}` ({argc} for at least {min})",
                                ctx.file
                            );
                        }
                    } else if argc != min {
                        bail!("{}:{line}: wrong number of arguments to `{full_name}` ({argc} for {min})", ctx.file);
                    }
                }
            }
        }
        _ => {}
    }
    Ok(())
}

fn report_arity_mismatch(
    ctx: &CheckCtx,
    name: &str,
    (min, max, _has_defaults): (usize, usize, bool),
    argc: usize,
    line: usize,
) -> Result<()> {
    if argc < min || argc > max {
        if min == max {
            bail!("{}:{line}: wrong number of arguments to `{name}` ({argc} for {min})", ctx.file);
        }
        bail!("{}:{line}: wrong number of arguments to `{name}` ({argc} for {min}..{max})", ctx.file);
    }
    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::ast::{CallExpr, FuncDef, IdentPath, Param, Params};
    use crate::error::Span;

    fn ident(id: usize, name: &str) -> Expr {
        Expr::new(id, ExprKind::Ident(IdentPath::from_name(name)))
    }

    fn program_with(stmts: Vec<Stmt>) -> Program {
        Program { file: "t.rugo".into(), raw_source: String::new(), stmts, structs: vec![] }
    }

    fn declare(module: &mut Module, name: &str, kind: DeclKind) {
        module.names.insert(name.to_string(), Decl { kind, declared_at: Some(Span { start: 0, end: 0 }) });
    }

    #[test]
    fn undefined_variable_is_reported() {
        let program = program_with(vec![Stmt::new(1, StmtKind::Expr(ident(2, "x")), 1, 1)]);
        let module = Module::default();
        let registry = Registry::new();
        let err = check_program(&program, &module, &registry, "t.rugo").unwrap_err();
        assert!(err.to_string().contains("undefined variable 'x'"));
    }

    #[test]
    fn assignment_before_use_is_fine() {
        let program = program_with(vec![
            Stmt::new(1, StmtKind::Assign { target: "x".into(), value: Expr::new(2, ExprKind::Int(1)) }, 1, 1),
            Stmt::new(3, StmtKind::Expr(ident(4, "x")), 2, 2),
        ]);
        let module = Module::default();
        let registry = Registry::new();
        assert!(check_program(&program, &module, &registry, "t.rugo").is_ok());
    }

    #[test]
    fn if_branch_assignment_leaks_out() {
        let assign = Stmt::new(1, StmtKind::Assign { target: "x".into(), value: Expr::new(2, ExprKind::Int(1)) }, 2, 2);
        let if_stmt = Stmt::new(
            10,
            StmtKind::If(IfStmt {
                cond: Expr::new(11, ExprKind::Bool(true)),
                then_body: vec![assign],
                elifs: vec![],
                else_body: None,
            }),
            1,
            3,
        );
        let after = Stmt::new(20, StmtKind::Expr(ident(21, "x")), 4, 4);
        let program = program_with(vec![if_stmt, after]);
        let module = Module::default();
        let registry = Registry::new();
        assert!(check_program(&program, &module, &registry, "t.rugo").is_ok());
    }

    #[test]
    fn while_body_assignment_does_not_leak() {
        let assign = Stmt::new(1, StmtKind::Assign { target: "x".into(), value: Expr::new(2, ExprKind::Int(1)) }, 2, 2);
        let while_stmt = Stmt::new(
            10,
            StmtKind::While { cond: Expr::new(11, ExprKind::Bool(true)), body: vec![assign] },
            1,
            3,
        );
        let after = Stmt::new(20, StmtKind::Expr(ident(21, "x")), 4, 4);
        let program = program_with(vec![while_stmt, after]);
        let module = Module::default();
        let registry = Registry::new();
        let err = check_program(&program, &module, &registry, "t.rugo").unwrap_err();
        assert!(err.to_string().contains("undefined variable 'x'"));
    }

    #[test]
    fn const_reassignment_errors() {
        let program = program_with(vec![
            Stmt::new(1, StmtKind::Assign { target: "MAX".into(), value: Expr::new(2, ExprKind::Int(1)) }, 1, 1),
            Stmt::new(3, StmtKind::Assign { target: "MAX".into(), value: Expr::new(4, ExprKind::Int(2)) }, 2, 2),
        ]);
        let module = Module::default();
        let registry = Registry::new();
        let err = check_program(&program, &module, &registry, "t.rugo").unwrap_err();
        assert!(err.to_string().contains("cannot reassign constant `MAX`"));
    }

    #[test]
    fn arity_mismatch_against_declared_function_errors() {
        let f = FuncDef {
            name: "add".into(),
            namespace: String::new(),
            params: Params(vec![
                Param { name: "a".into(), default: None },
                Param { name: "b".into(), default: None },
            ]),
            body: vec![],
            source_file: "t.rugo".into(),
            line: 1,
        };
        let mut module = Module::default();
        declare(&mut module, "add", DeclKind::Func(f));

        let call = Expr::new(
            3,
            ExprKind::Call(CallExpr { callee: Box::new(ident(1, "add")), args: vec![Expr::new(2, ExprKind::Int(1))] }),
        );
        let program = program_with(vec![Stmt::new(10, StmtKind::Expr(call), 5, 5)]);
        let registry = Registry::new();
        let err = check_program(&program, &module, &registry, "t.rugo").unwrap_err();
        assert!(err.to_string().contains("wrong number of arguments"));
    }

    #[test]
    fn namespaced_unknown_function_errors() {
        let registry = Registry::new();
        let mut module = Module::default();
        declare(&mut module, "strings", DeclKind::StdModule { funcs: registry.std_module("strings").unwrap().funcs.clone() });

        let call = Expr::new(
            3,
            ExprKind::Call(CallExpr {
                callee: Box::new(Expr::new(1, ExprKind::Ident(IdentPath::from_parts(vec!["strings".into(), "nope".into()])))),
                args: vec![],
            }),
        );
        let program = program_with(vec![Stmt::new(10, StmtKind::Expr(call), 5, 5)]);
        let err = check_program(&program, &module, &registry, "t.rugo").unwrap_err();
        assert!(err.to_string().contains("has no function `nope`"));
    }
}
