//! Codegen-time lexical scope stack (spec.md §4.10's "a stack of scopes" for
//! distinguishing declaration from reassignment and detecting captures). A
//! separate, simpler construct from [`crate::checks::scope::Scope`]: that one
//! only answers "is this name visible here", this one also tracks each
//! variable's inferred [`Type`] so assignment codegen can decide whether a
//! coercion is needed, and which frame first bound a name so a lambda body
//! can tell a capture from a fresh local.
//!
//! Grounded on `sql::context::Context`'s `push_query`/`pop_query` pattern:
//! one frame per nested scope, pushed on entry and popped on exit, never
//! surviving past the codegen call that owns it.

use std::collections::{HashMap, HashSet};

use crate::types::Type;

#[derive(Debug, Default)]
struct ScopeFrame {
    vars: HashMap<String, Type>,
    consts: HashSet<String>,
}

#[derive(Debug, Default)]
pub struct ScopeStack {
    frames: Vec<ScopeFrame>,
}

impl ScopeStack {
    pub fn push(&mut self) {
        self.frames.push(ScopeFrame::default());
    }

    pub fn pop(&mut self) {
        self.frames.pop();
    }

    fn top(&mut self) -> &mut ScopeFrame {
        self.frames.last_mut().expect("codegen never lowers a statement outside a pushed scope")
    }

    /// `true` the first time `name` is assigned anywhere in the currently
    /// open scopes — codegen emits `:=`; every later assignment emits `=`.
    pub fn is_first_assignment(&self, name: &str) -> bool {
        !self.frames.iter().any(|f| f.vars.contains_key(name))
    }

    pub fn declare(&mut self, name: &str, ty: Type) {
        self.top().vars.insert(name.to_string(), ty);
    }

    pub fn type_of(&self, name: &str) -> Type {
        self.frames.iter().rev().find_map(|f| f.vars.get(name).copied()).unwrap_or(Type::Unknown)
    }

    /// `true` when `name` was already bound in an enclosing frame before the
    /// current (innermost) one — a lambda body reading such a name is
    /// capturing it rather than declaring a fresh local.
    pub fn is_captured(&self, name: &str) -> bool {
        let Some((current, outer)) = self.frames.split_last() else { return false };
        !current.vars.contains_key(name) && outer.iter().any(|f| f.vars.contains_key(name))
    }

    pub fn mark_const(&mut self, name: &str) {
        self.top().consts.insert(name.to_string());
    }

    pub fn is_const(&self, name: &str) -> bool {
        self.frames.iter().any(|f| f.consts.contains(name))
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn first_assignment_then_reassignment() {
        let mut scopes = ScopeStack::default();
        scopes.push();
        assert!(scopes.is_first_assignment("x"));
        scopes.declare("x", Type::Int);
        assert!(!scopes.is_first_assignment("x"));
    }

    #[test]
    fn inner_scope_sees_outer_as_captured() {
        let mut scopes = ScopeStack::default();
        scopes.push();
        scopes.declare("x", Type::Int);
        scopes.push();
        assert!(scopes.is_captured("x"));
        scopes.declare("x", Type::Dynamic);
        assert!(!scopes.is_captured("x"));
    }
}
