//! Renders a [`File`] to host source text. Owns all indentation and
//! linewise emission (spec.md §4.9) so every other module builds IR nodes
//! instead of formatting strings by hand.

use super::decl::{Decl, File, FuncDecl, Import, VarDecl};
use super::expr::Expr;
use super::stmt::{AssignOp, Stmt};

pub fn print_file(file: &File) -> String {
    Printer::default().file(file)
}

/// Renders a single expression outside of a file context — used by codegen
/// when an expression needs to be embedded as a string fragment (e.g. a
/// bridge helper's textual argument list).
pub fn print_expr(expr: &Expr) -> String {
    Printer::default().expr(expr)
}

#[derive(Default)]
struct Printer {
    out: String,
    indent: usize,
}

impl Printer {
    fn line(&mut self, text: &str) {
        if !text.is_empty() {
            for _ in 0..self.indent {
                self.out.push('\t');
            }
            self.out.push_str(text);
        }
        self.out.push('\n');
    }

    fn file(mut self, file: &File) -> String {
        self.line(&format!("package {}", file.package));
        self.line("");

        if !file.imports.is_empty() {
            self.line("import (");
            self.indent += 1;
            for import in &file.imports {
                self.import_line(import);
            }
            self.indent -= 1;
            self.line(")");
            self.line("");
        }

        for decl in &file.decls {
            self.decl(decl);
            self.line("");
        }

        self.out
    }

    fn import_line(&mut self, import: &Import) {
        match &import.alias {
            Some(alias) => self.line(&format!("{alias} {:?}", import.path)),
            None => self.line(&format!("{:?}", import.path)),
        }
    }

    fn decl(&mut self, decl: &Decl) {
        match decl {
            Decl::Func(f) => self.func_decl(f),
            Decl::Var(v) => self.var_decl(v),
            Decl::Raw(text) => self.raw_block(text),
        }
    }

    fn func_decl(&mut self, f: &FuncDecl) {
        let params = f
            .params
            .iter()
            .map(|p| format!("{} {}", p.name, p.ty))
            .chain(f.variadic.iter().map(|p| format!("{} ...{}", p.name, p.ty)))
            .collect::<Vec<_>>()
            .join(", ");
        let results = match f.results.as_slice() {
            [] => String::new(),
            [one] => format!(" {one}"),
            many => format!(" ({})", many.join(", ")),
        };
        self.line(&format!("func {}({params}){results} {{", f.name));
        self.indent += 1;
        self.stmts(&f.body);
        self.indent -= 1;
        self.line("}");
    }

    fn var_decl(&mut self, v: &VarDecl) {
        match (&v.ty, &v.value) {
            (Some(ty), Some(value)) => self.line(&format!("var {} {ty} = {}", v.name, self.expr(value))),
            (Some(ty), None) => self.line(&format!("var {} {ty}", v.name)),
            (None, Some(value)) => self.line(&format!("var {} = {}", v.name, self.expr(value))),
            (None, None) => self.line(&format!("var {}", v.name)),
        }
    }

    fn raw_block(&mut self, text: &str) {
        for line in text.lines() {
            self.line(line);
        }
    }

    fn stmts(&mut self, stmts: &[Stmt]) {
        for stmt in stmts {
            self.stmt(stmt);
        }
    }

    fn stmt(&mut self, stmt: &Stmt) {
        match stmt {
            Stmt::Assign { targets, op, values } => {
                let op = match op {
                    AssignOp::Declare => ":=",
                    AssignOp::Assign => "=",
                };
                let lhs = targets.join(", ");
                let rhs = values.iter().map(|v| self.expr(v)).collect::<Vec<_>>().join(", ");
                self.line(&format!("{lhs} {op} {rhs}"));
            }
            Stmt::IndexAssign { target, index, value } => {
                let target = self.expr(target);
                let index = self.expr(index);
                let value = self.expr(value);
                self.line(&format!("{target}[{index}] = {value}"));
            }
            Stmt::ExprStmt(e) => {
                let rendered = self.expr(e);
                self.line(&rendered);
            }
            Stmt::If { cond, then_body, else_body } => {
                let cond = self.expr(cond);
                self.line(&format!("if {cond} {{"));
                self.indent += 1;
                self.stmts(then_body);
                self.indent -= 1;
                match else_body {
                    Some(body) => {
                        self.line("} else {");
                        self.indent += 1;
                        self.stmts(body);
                        self.indent -= 1;
                        self.line("}");
                    }
                    None => self.line("}"),
                }
            }
            Stmt::ForClause { init, cond, post, body } => {
                let init = init.as_deref().map(|s| self.stmt_inline(s)).unwrap_or_default();
                let cond = cond.as_ref().map(|c| self.expr(c)).unwrap_or_default();
                let post = post.as_deref().map(|s| self.stmt_inline(s)).unwrap_or_default();
                self.line(&format!("for {init}; {cond}; {post} {{"));
                self.indent += 1;
                self.stmts(body);
                self.indent -= 1;
                self.line("}");
            }
            Stmt::ForRange { key, value, iterable, body } => {
                let iterable = self.expr(iterable);
                let binding = match (key, value) {
                    (Some(k), Some(v)) => format!("{k}, {v} := range "),
                    (Some(k), None) => format!("{k} := range "),
                    (None, Some(v)) => format!("_, {v} := range "),
                    (None, None) => "range ".to_string(),
                };
                self.line(&format!("for {binding}{iterable} {{"));
                self.indent += 1;
                self.stmts(body);
                self.indent -= 1;
                self.line("}");
            }
            Stmt::Switch { tag, cases, default } => {
                let tag = tag.as_ref().map(|t| format!(" {}", self.expr(t))).unwrap_or_default();
                self.line(&format!("switch{tag} {{"));
                self.indent += 1;
                for (matches, body) in cases {
                    let matches = matches.iter().map(|m| self.expr(m)).collect::<Vec<_>>().join(", ");
                    self.line(&format!("case {matches}:"));
                    self.indent += 1;
                    self.stmts(body);
                    self.indent -= 1;
                }
                if let Some(body) = default {
                    self.line("default:");
                    self.indent += 1;
                    self.stmts(body);
                    self.indent -= 1;
                }
                self.indent -= 1;
                self.line("}");
            }
            Stmt::Return(values) => {
                if values.is_empty() {
                    self.line("return");
                } else {
                    let values = values.iter().map(|v| self.expr(v)).collect::<Vec<_>>().join(", ");
                    self.line(&format!("return {values}"));
                }
            }
            Stmt::Defer(e) => {
                let e = self.expr(e);
                self.line(&format!("defer {e}"));
            }
            Stmt::Go(e) => {
                let e = self.expr(e);
                self.line(&format!("go {e}"));
            }
            Stmt::LineDirective { file, line } => self.line(&format!("//line {file}:{line}")),
            Stmt::Raw(text) => self.raw_block(text),
        }
    }

    /// Renders a statement as a single fragment with no trailing newline —
    /// used for a `for`-clause's init/post, which must sit on the header
    /// line rather than its own.
    fn stmt_inline(&mut self, stmt: &Stmt) -> String {
        match stmt {
            Stmt::Assign { targets, op, values } => {
                let op = match op {
                    AssignOp::Declare => ":=",
                    AssignOp::Assign => "=",
                };
                let lhs = targets.join(", ");
                let rhs = values.iter().map(|v| self.expr(v)).collect::<Vec<_>>().join(", ");
                format!("{lhs} {op} {rhs}")
            }
            Stmt::ExprStmt(e) => self.expr(e),
            other => {
                debug_assert!(false, "stmt_inline called on non-inlinable statement {other:?}");
                String::new()
            }
        }
    }

    fn expr(&mut self, expr: &Expr) -> String {
        match expr {
            Expr::Ident(name) => name.clone(),
            Expr::Int(n) => n.to_string(),
            Expr::Float(f) => format!("{f}"),
            Expr::String(s) => format!("{s:?}"),
            Expr::Bool(b) => b.to_string(),
            Expr::Nil => "nil".to_string(),
            Expr::Binary { left, op, right } => {
                format!("{} {op} {}", self.expr(left), self.expr(right))
            }
            Expr::Unary { op, expr } => format!("{op}{}", self.expr(expr)),
            Expr::Cast { ty, expr } => format!("{ty}({})", self.expr(expr)),
            Expr::TypeAssert { expr, ty } => format!("{}.({ty})", self.expr(expr)),
            Expr::Call { callee, args, spread } => {
                let suffix = if *spread { "..." } else { "" };
                let args = args.iter().map(|a| self.expr(a)).collect::<Vec<_>>().join(", ");
                format!("{}({args}{suffix})", self.expr(callee))
            }
            Expr::MethodCall { target, method, args } => {
                let args = args.iter().map(|a| self.expr(a)).collect::<Vec<_>>().join(", ");
                format!("{}.{method}({args})", self.expr(target))
            }
            Expr::Dot { target, field } => format!("{}.{field}", self.expr(target)),
            Expr::Index { target, index } => format!("{}[{}]", self.expr(target), self.expr(index)),
            Expr::Slice { target, start, end } => {
                let start = start.as_deref().map(|e| self.expr(e)).unwrap_or_default();
                let end = end.as_deref().map(|e| self.expr(e)).unwrap_or_default();
                format!("{}[{start}:{end}]", self.expr(target))
            }
            Expr::Paren(inner) => format!("({})", self.expr(inner)),
            Expr::SliceLiteral { elem_ty, elems } => {
                let elems = elems.iter().map(|e| self.expr(e)).collect::<Vec<_>>().join(", ");
                format!("[]{elem_ty}{{{elems}}}")
            }
            Expr::MapLiteral { key_ty, value_ty, entries } => {
                let entries = entries
                    .iter()
                    .map(|(k, v)| format!("{}: {}", self.expr(k), self.expr(v)))
                    .collect::<Vec<_>>()
                    .join(", ");
                format!("map[{key_ty}]{value_ty}{{{entries}}}")
            }
            Expr::Sprintf { format, args } => {
                let args = args.iter().map(|a| self.expr(a)).collect::<Vec<_>>().join(", ");
                format!("fmt.Sprintf({format:?}, {args})")
            }
            Expr::Concat(parts) => parts.iter().map(|p| self.expr(p)).collect::<Vec<_>>().join(" + "),
            Expr::Iife { results, body } => format!("{}()", self.func_literal(&[], results, body)),
            Expr::Lambda { params, results, body } => self.func_literal(params, results, body),
            Expr::Raw(text) => text.clone(),
        }
    }

    /// Renders a function literal as a standalone string fragment (not
    /// appended to `self.out`) so it can be embedded inline wherever an
    /// expression is expected — an [`Expr::Iife`]'s callee, a lambda passed
    /// as a call argument, or the right-hand side of an assignment.
    fn func_literal(&mut self, params: &[(String, String)], results: &[String], body: &[Stmt]) -> String {
        let param_list = params.iter().map(|(n, t)| format!("{n} {t}")).collect::<Vec<_>>().join(", ");
        let result_list = match results {
            [] => String::new(),
            [one] => format!(" {one}"),
            many => format!(" ({})", many.join(", ")),
        };

        let mut sub = Printer { out: String::new(), indent: self.indent + 1 };
        sub.stmts(body);
        let body_text = sub.out;

        let mut lit = format!("func({param_list}){result_list} {{\n");
        lit.push_str(&body_text);
        lit.push_str(&"\t".repeat(self.indent));
        lit.push('}');
        lit
    }
}
