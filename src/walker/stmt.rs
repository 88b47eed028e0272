use anyhow::{bail, Result};

use crate::ast::{
    BenchDef, CaseStmtNode, Expr, ExprKind, ForStmt, FuncDef, IfStmt, ImportDirective, Param, Params,
    RequireDirective, SandboxDirective, Stmt, StmtKind, StructInfo, TestDef, UseDirective,
};
use crate::parser::FlatNode;

use super::expr::{walk_expr, walk_params};
use super::{as_terminal, first_line, last_line, non_terminal_children, walk_block, Walker};

/// Builds the statement(s) a single grammar node expands to. Almost every
/// node produces exactly one `Stmt`; `struct_stmt` is the exception — it
/// expands into a constructor plus one accessor per field (spec.md §4.3).
pub(crate) fn walk_stmt(walker: &mut Walker, node: &FlatNode) -> Result<Vec<Stmt>> {
    let sym = match node {
        FlatNode::Terminal(t) => bail!("walker: expected a statement node, found terminal `{}`", t.text),
        FlatNode::NonTerminal { sym, .. } => *sym,
    };

    let line = walker.translate(first_line(node).unwrap_or(1));
    let end_line = walker.translate(last_line(node).unwrap_or(line));

    let kind = match sym {
        "assign_stmt" => {
            let c = non_terminal_children(node, "assign_stmt")?;
            let target = as_terminal(&c[0])?.text.clone();
            let value = walk_expr(walker, &c[1])?;
            StmtKind::Assign { target, value }
        }
        "index_assign_stmt" => {
            let c = non_terminal_children(node, "index_assign_stmt")?;
            let target = walk_expr(walker, &c[0])?;
            let index = walk_expr(walker, &c[1])?;
            let value = walk_expr(walker, &c[2])?;
            StmtKind::IndexAssign { target, index, value }
        }
        "dot_assign_stmt" => {
            let c = non_terminal_children(node, "dot_assign_stmt")?;
            let target = walk_expr(walker, &c[0])?;
            let field = as_terminal(&c[1])?.text.clone();
            let value = walk_expr(walker, &c[2])?;
            StmtKind::DotAssign { target, field, value }
        }
        "expr_stmt" => {
            let c = non_terminal_children(node, "expr_stmt")?;
            StmtKind::Expr(walk_expr(walker, &c[0])?)
        }
        "if_stmt" => StmtKind::If(walk_if(walker, node)?),
        "while_stmt" => {
            let c = non_terminal_children(node, "while_stmt")?;
            let cond = walk_expr(walker, &c[0])?;
            let body = walk_block(walker, &c[1])?;
            StmtKind::While { cond, body }
        }
        "for_stmt" => {
            let c = non_terminal_children(node, "for_stmt")?;
            let vars = non_terminal_children(&c[0], "for_vars")?;
            let var = as_terminal(&vars[0])?.text.clone();
            let value_var = match vars.get(1) {
                Some(v) => Some(as_terminal(v)?.text.clone()),
                None => None,
            };
            let iterable = walk_expr(walker, &c[1])?;
            let body = walk_block(walker, &c[2])?;
            StmtKind::For(ForStmt { var, value_var, iterable, body })
        }
        "break_stmt" => StmtKind::Break,
        "next_stmt" => StmtKind::Next,
        "return_stmt" => {
            let c = non_terminal_children(node, "return_stmt")?;
            let value = match c.first() {
                Some(e) => Some(walk_expr(walker, e)?),
                None => None,
            };
            StmtKind::Return(value)
        }
        "def_stmt" => StmtKind::FuncDef(walk_def(walker, node, line)?),
        "test_stmt" => {
            let c = non_terminal_children(node, "test_stmt")?;
            let name = as_terminal(&c[0])?.text.clone();
            let body = walk_block(walker, &c[1])?;
            StmtKind::TestDef(TestDef { name, body })
        }
        "bench_stmt" => {
            let c = non_terminal_children(node, "bench_stmt")?;
            let name = as_terminal(&c[0])?.text.clone();
            let body = walk_block(walker, &c[1])?;
            StmtKind::BenchDef(BenchDef { name, body })
        }
        "use_stmt" => {
            let c = non_terminal_children(node, "use_stmt")?;
            StmtKind::Use(UseDirective { module: as_terminal(&c[0])?.text.clone() })
        }
        "import_stmt" => {
            let c = non_terminal_children(node, "import_stmt")?;
            let package = as_terminal(&c[0])?.text.clone();
            let alias = match c.get(1) {
                Some(a) => Some(as_terminal(a)?.text.clone()),
                None => None,
            };
            StmtKind::Import(ImportDirective { package, alias })
        }
        "require_stmt" => StmtKind::Require(walk_require(node)?),
        "sandbox_stmt" => StmtKind::Sandbox(walk_sandbox(node)?),
        "case_stmt" => StmtKind::CaseStmt(walk_case_stmt(walker, node)?),
        "struct_stmt" => return Ok(expand_struct(walker, node, line)?),
        "try_block" => return Ok(vec![walk_try_block_stmt(walker, node, line, end_line)?]),
        "spawn_block" => {
            let c = non_terminal_children(node, "spawn_block")?;
            let body = walk_block(walker, &c[0])?;
            StmtKind::SpawnReturn(Expr::new(
                walker.next_id(),
                ExprKind::LoweredSpawn(Box::new(crate::ast::LoweredSpawn { body })),
            ))
        }
        "parallel_block" => {
            let c = non_terminal_children(node, "parallel_block")?;
            let mut branches = Vec::with_capacity(c.len());
            for branch in c {
                branches.push(walk_block(walker, branch)?);
            }
            StmtKind::Expr(Expr::new(
                walker.next_id(),
                ExprKind::LoweredParallel(Box::new(crate::ast::LoweredParallel { branches })),
            ))
        }
        other => bail!("walker: unrecognized statement node `{other}`"),
    };

    Ok(vec![Stmt::new(walker.next_id(), kind, line, end_line)])
}

fn walk_if(walker: &mut Walker, node: &FlatNode) -> Result<IfStmt> {
    let c = non_terminal_children(node, "if_stmt")?;
    let cond = walk_expr(walker, &c[0])?;
    let then_body = walk_block(walker, &c[1])?;
    let mut elifs = Vec::new();
    let mut else_body = None;
    for rest in &c[2..] {
        match rest {
            FlatNode::NonTerminal { sym: "elif", .. } => {
                let ec = non_terminal_children(rest, "elif")?;
                let elif_cond = walk_expr(walker, &ec[0])?;
                let elif_body = walk_block(walker, &ec[1])?;
                elifs.push((elif_cond, elif_body));
            }
            FlatNode::NonTerminal { sym: "else_block", .. } => {
                let ec = non_terminal_children(rest, "else_block")?;
                else_body = Some(walk_block(walker, &ec[0])?);
            }
            other => bail!("walker: unexpected child of if_stmt: {other:?}"),
        }
    }
    Ok(IfStmt { cond, then_body, elifs, else_body })
}

fn walk_def(walker: &mut Walker, node: &FlatNode, line: usize) -> Result<FuncDef> {
    let c = non_terminal_children(node, "def_stmt")?;
    let name_parts = non_terminal_children(&c[0], "def_name")?;
    let (namespace, name) = match name_parts.len() {
        1 => (String::new(), as_terminal(&name_parts[0])?.text.clone()),
        2 => (as_terminal(&name_parts[0])?.text.clone(), as_terminal(&name_parts[1])?.text.clone()),
        n => bail!("walker: def_name must have 1 or 2 parts, found {n}"),
    };
    let params = walk_params(walker, &c[1])?;
    let body = walk_block(walker, &c[2])?;
    Ok(FuncDef { name, namespace, params, body, source_file: String::new(), line })
}

fn walk_require(node: &FlatNode) -> Result<RequireDirective> {
    let c = non_terminal_children(node, "require_stmt")?;
    let path = as_terminal(&c[0])?.text.clone();
    let mut alias = None;
    let mut with = Vec::new();
    for rest in &c[1..] {
        match rest {
            FlatNode::NonTerminal { sym: "alias", .. } => {
                let ac = non_terminal_children(rest, "alias")?;
                alias = Some(as_terminal(&ac[0])?.text.clone());
            }
            FlatNode::NonTerminal { sym: "with_list", .. } => {
                let wc = non_terminal_children(rest, "with_list")?;
                for w in wc {
                    with.push(as_terminal(w)?.text.clone());
                }
            }
            other => bail!("walker: unexpected child of require_stmt: {other:?}"),
        }
    }
    Ok(RequireDirective { path, alias, with })
}

fn walk_sandbox(node: &FlatNode) -> Result<SandboxDirective> {
    let c = non_terminal_children(node, "sandbox_stmt")?;
    let mut directive = SandboxDirective::default();
    for entry in c {
        let (sym, children) = match entry {
            FlatNode::NonTerminal { sym, children } => (*sym, children),
            FlatNode::Terminal(t) => bail!("walker: expected sandbox entry node, found terminal `{}`", t.text),
        };
        match sym {
            "sandbox_ro" => directive.ro = string_list(children)?,
            "sandbox_rw" => directive.rw = string_list(children)?,
            "sandbox_rox" => directive.rox = string_list(children)?,
            "sandbox_rwx" => directive.rwx = string_list(children)?,
            "sandbox_connect" => directive.connect = port_list(children)?,
            "sandbox_bind" => directive.bind = port_list(children)?,
            "sandbox_env" => directive.env = Some(string_list(children)?),
            other => bail!("walker: unrecognized sandbox entry `{other}`"),
        }
    }
    Ok(directive)
}

fn string_list(children: &[FlatNode]) -> Result<Vec<String>> {
    children.iter().map(|c| Ok(as_terminal(c)?.text.clone())).collect()
}

fn port_list(children: &[FlatNode]) -> Result<Vec<u16>> {
    children
        .iter()
        .map(|c| {
            as_terminal(c)?
                .text
                .parse::<u16>()
                .map_err(|_| anyhow::anyhow!("walker: invalid port literal"))
        })
        .collect()
}

fn walk_case_stmt(walker: &mut Walker, node: &FlatNode) -> Result<CaseStmtNode> {
    let c = non_terminal_children(node, "case_stmt")?;
    let subject = match &c[0] {
        FlatNode::NonTerminal { sym: "none", .. } => None,
        e => Some(walk_expr(walker, e)?),
    };
    let mut arms = Vec::new();
    let mut else_body = None;
    for rest in &c[1..] {
        match rest {
            FlatNode::NonTerminal { sym: "case_arm_stmt", .. } => {
                let ac = non_terminal_children(rest, "case_arm_stmt")?;
                let pattern = walk_expr(walker, &ac[0])?;
                let body = walk_block(walker, &ac[1])?;
                arms.push((pattern, body));
            }
            FlatNode::NonTerminal { sym: "else_block", .. } => {
                let ec = non_terminal_children(rest, "else_block")?;
                else_body = Some(walk_block(walker, &ec[0])?);
            }
            other => bail!("walker: unexpected child of case_stmt: {other:?}"),
        }
    }
    Ok(CaseStmtNode { subject, arms, else_body })
}

/// `try <expr> [rescue <err>] <handler_block> end` lowers to a
/// `TryHandlerReturn`-bearing handler body wrapped in a `LoweredTry`
/// expression statement, so codegen always sees an explicit tried
/// expression plus a handler scope (spec.md §4.3).
fn walk_try_block_stmt(walker: &mut Walker, node: &FlatNode, line: usize, end_line: usize) -> Result<Stmt> {
    let c = non_terminal_children(node, "try_block")?;
    let (tried_node, err_name, handler_node) = match c.len() {
        2 => (&c[0], "err".to_string(), &c[1]),
        3 => (&c[0], as_terminal(&c[1])?.text.clone(), &c[2]),
        n => bail!("walker: try_block must have 2 or 3 children, found {n}"),
    };
    let tried = Box::new(walk_expr(walker, tried_node)?);
    let handler = walk_block(walker, handler_node)?;
    let lowered = Expr::new(
        walker.next_id(),
        ExprKind::LoweredTry(Box::new(crate::ast::LoweredTry { tried, err_name, handler })),
    );
    Ok(Stmt::new(walker.next_id(), StmtKind::Expr(lowered), line, end_line))
}

/// Expands `struct Name\n  field*\nend` into a `StructInfo` plus a `new`
/// constructor and one accessor per field, all namespaced under `Name`.
/// Structs are modeled as hashes keyed by field name — the simplest
/// representation codegen can lower without inventing a host-side record
/// type just for this.
fn expand_struct(walker: &mut Walker, node: &FlatNode, line: usize) -> Result<Vec<Stmt>> {
    let c = non_terminal_children(node, "struct_stmt")?;
    let name = as_terminal(&c[0])?.text.clone();
    let mut fields = Vec::with_capacity(c.len() - 1);
    for f in &c[1..] {
        fields.push(as_terminal(f)?.text.clone());
    }

    walker.structs.push(StructInfo { name: name.clone(), fields: fields.clone(), line });

    let mut out = Vec::with_capacity(fields.len() + 1);

    let ctor_params = Params(fields.iter().map(|f| Param { name: f.clone(), default: None }).collect());
    let hash_pairs = fields
        .iter()
        .map(|f| {
            let key = Expr::new(walker.next_id(), ExprKind::String { value: f.clone(), raw: false });
            let value = Expr::new(walker.next_id(), ExprKind::Ident(crate::ast::IdentPath::from_name(f.clone())));
            (key, value)
        })
        .collect();
    let ctor_body = vec![Stmt::new(
        walker.next_id(),
        StmtKind::ImplicitReturn(Expr::new(walker.next_id(), ExprKind::Hash(hash_pairs))),
        line,
        line,
    )];
    out.push(Stmt::new(
        walker.next_id(),
        StmtKind::FuncDef(FuncDef {
            name: "new".to_string(),
            namespace: name.clone(),
            params: ctor_params,
            body: ctor_body,
            source_file: String::new(),
            line,
        }),
        line,
        line,
    ));

    for field in &fields {
        let accessor_params = Params(vec![Param { name: "self".to_string(), default: None }]);
        let self_ident = Expr::new(walker.next_id(), ExprKind::Ident(crate::ast::IdentPath::from_name("self")));
        let accessor_body = vec![Stmt::new(
            walker.next_id(),
            StmtKind::ImplicitReturn(Expr::new(
                walker.next_id(),
                ExprKind::Dot { target: Box::new(self_ident), field: field.clone() },
            )),
            line,
            line,
        )];
        out.push(Stmt::new(
            walker.next_id(),
            StmtKind::FuncDef(FuncDef {
                name: field.clone(),
                namespace: name.clone(),
                params: accessor_params,
                body: accessor_body,
                source_file: String::new(),
                line,
            }),
            line,
            line,
        ));
    }

    Ok(out)
}
