//! AST walker (L3): turns the flat, post-order [`crate::parser::FlatNode`]
//! tree the grammar hands back into the typed [`crate::ast`] it defines.
//!
//! The grammar itself is external (see `src/parser/mod.rs`'s doc comment);
//! this module only defines the `sym` vocabulary it expects non-terminals
//! to use and the shape it builds from them. Every [`Stmt`]/[`Expr`] gets an
//! id from a single counter and, for statements, a `line`/`end_line` pair
//! translated back to the original file through the line map — the walker
//! is the one place preprocessed-line numbers stop being visible at all.

mod expr;
mod stmt;

use anyhow::{bail, Result};

use crate::ast::{Program, Stmt, StructInfo};
use crate::lineinfo::LineMap;
use crate::parser::{FlatNode, Token};

/// Per-walk counter and line translator. One `Walker` is built per compile
/// unit; ids are unique within that unit only (matching
/// [`crate::types::TypeInfo`]'s per-compile-unit key scheme).
pub struct Walker<'a> {
    next_id: usize,
    line_map: &'a LineMap,
    pub(crate) structs: Vec<StructInfo>,
}

impl<'a> Walker<'a> {
    fn new(line_map: &'a LineMap) -> Self {
        Walker {
            next_id: 1,
            line_map,
            structs: Vec::new(),
        }
    }

    pub(crate) fn next_id(&mut self) -> usize {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    pub(crate) fn translate(&self, preprocessed_line: usize) -> usize {
        self.line_map.translate(preprocessed_line)
    }
}

/// Walks a `"program"` node (children: top-level `"block"` of statement
/// nodes) into a [`Program`]. `file` and `raw_source` are carried through
/// unchanged (Invariant 1/3 — `raw_source` must stay byte-identical to the
/// original file, never the preprocessed text).
pub fn walk_program(root: &FlatNode, line_map: &LineMap, file: &str, raw_source: &str) -> Result<Program> {
    let mut walker = Walker::new(line_map);
    let children = non_terminal_children(root, "program")?;
    let mut stmts = Vec::new();
    for child in children {
        stmts.extend(stmt::walk_stmt(&mut walker, child)?);
    }
    Ok(Program {
        file: file.to_string(),
        raw_source: raw_source.to_string(),
        stmts,
        structs: walker.structs,
    })
}

/// Walks a `"block"` node's children into a statement list, in source order.
pub(crate) fn walk_block(walker: &mut Walker, node: &FlatNode) -> Result<Vec<Stmt>> {
    let children = non_terminal_children(node, "block")?;
    let mut out = Vec::new();
    for child in children {
        out.extend(stmt::walk_stmt(walker, child)?);
    }
    Ok(out)
}

pub(crate) fn non_terminal_children<'n>(node: &'n FlatNode, expected_sym: &str) -> Result<&'n [FlatNode]> {
    match node {
        FlatNode::NonTerminal { sym, children } if *sym == expected_sym => Ok(children),
        FlatNode::NonTerminal { sym, .. } => bail!("walker: expected `{expected_sym}` node, found `{sym}`"),
        FlatNode::Terminal(t) => bail!("walker: expected `{expected_sym}` node, found terminal {:?}", t.text),
    }
}

pub(crate) fn as_terminal<'n>(node: &'n FlatNode) -> Result<&'n Token> {
    node.as_terminal()
        .ok_or_else(|| anyhow::anyhow!("walker: expected a terminal token, found a non-terminal node"))
}

/// Finds the leftmost terminal reachable from `node`, used to attach a
/// preprocessed-source line to a statement or sub-expression before it is
/// translated back to the original file.
pub(crate) fn first_line(node: &FlatNode) -> Option<usize> {
    match node {
        FlatNode::Terminal(t) => Some(t.line),
        FlatNode::NonTerminal { children, .. } => children.iter().find_map(first_line),
    }
}

pub(crate) fn last_line(node: &FlatNode) -> Option<usize> {
    match node {
        FlatNode::Terminal(t) => Some(t.line),
        FlatNode::NonTerminal { children, .. } => children.iter().rev().find_map(last_line),
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::ast::{ExprKind, StmtKind};
    use crate::parser::{Token, TokenKind};

    fn tok(kind: TokenKind, text: &str, line: usize) -> FlatNode {
        FlatNode::terminal(Token { kind, text: text.to_string(), line })
    }

    fn nt(sym: &'static str, children: Vec<FlatNode>) -> FlatNode {
        FlatNode::non_terminal(sym, children)
    }

    #[test]
    fn walks_simple_assignment_and_attaches_original_line() {
        // Preprocessed line 2 maps back to original line 5 (e.g. after a
        // 3-line heredoc collapsed above it).
        let line_map = LineMap::from_rows(vec![1, 5]);
        let program = nt(
            "program",
            vec![nt(
                "block",
                vec![nt(
                    "assign_stmt",
                    vec![
                        tok(TokenKind::Ident, "x", 2),
                        nt(
                            "binary_expr",
                            vec![
                                tok(TokenKind::Int, "1", 2),
                                tok(TokenKind::Op, "+", 2),
                                tok(TokenKind::Int, "2", 2),
                            ],
                        ),
                    ],
                )],
            )],
        );

        let result = walk_program(&program, &line_map, "t.rugo", "...\n...\n...\nx = 1 + 2\n").unwrap();
        assert_eq!(result.stmts.len(), 1);
        assert_eq!(result.stmts[0].line, 5);
        match &result.stmts[0].kind {
            StmtKind::Assign { target, value } => {
                assert_eq!(target, "x");
                match &value.kind {
                    ExprKind::Binary(b) => {
                        assert!(matches!(b.left.kind, ExprKind::Int(1)));
                        assert!(matches!(b.right.kind, ExprKind::Int(2)));
                    }
                    other => panic!("expected binary expr, got {other:?}"),
                }
            }
            other => panic!("expected assign, got {other:?}"),
        }
    }

    #[test]
    fn struct_stmt_expands_into_struct_info_and_func_defs() {
        let line_map = LineMap::identity(3);
        let program = nt(
            "program",
            vec![nt(
                "block",
                vec![nt(
                    "struct_stmt",
                    vec![
                        tok(TokenKind::Ident, "Point", 1),
                        tok(TokenKind::Ident, "x", 2),
                        tok(TokenKind::Ident, "y", 2),
                    ],
                )],
            )],
        );

        let result = walk_program(&program, &line_map, "t.rugo", "struct Point\n  x y\nend\n").unwrap();
        assert_eq!(result.structs.len(), 1);
        assert_eq!(result.structs[0].name, "Point");
        assert_eq!(result.structs[0].fields, vec!["x".to_string(), "y".to_string()]);

        // constructor + one accessor per field
        let defs: Vec<_> = result
            .stmts
            .iter()
            .filter_map(|s| s.kind.as_func_def())
            .collect();
        assert_eq!(defs.len(), 3);
        assert!(defs.iter().any(|f| f.name == "new" && f.namespace == "Point"));
        assert!(defs.iter().any(|f| f.name == "x" && f.namespace == "Point"));
        assert!(defs.iter().any(|f| f.name == "y" && f.namespace == "Point"));
    }
}
