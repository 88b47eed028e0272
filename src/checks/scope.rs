//! Parent-linked lexical scope for the undefined-identifier check
//! (spec.md §4.8). `if`/`else` bodies share the enclosing scope — an
//! assignment inside either branch is visible after the statement, Ruby-like
//! leak-out — while `while`/`for`/lambda bodies/`try` handlers get a fresh
//! child whose own assignments stay local.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

#[derive(Debug, Default)]
struct ScopeInner {
    parent: Option<Scope>,
    vars: HashMap<String, usize>,
}

#[derive(Debug, Clone)]
pub struct Scope(Rc<RefCell<ScopeInner>>);

impl Scope {
    pub fn root() -> Self {
        Scope(Rc::new(RefCell::new(ScopeInner::default())))
    }

    pub fn child(&self) -> Self {
        Scope(Rc::new(RefCell::new(ScopeInner {
            parent: Some(self.clone()),
            vars: HashMap::new(),
        })))
    }

    pub fn declare(&self, name: &str, line: usize) {
        self.0.borrow_mut().vars.insert(name.to_string(), line);
    }

    pub fn is_defined(&self, name: &str) -> bool {
        let inner = self.0.borrow();
        inner.vars.contains_key(name)
            || inner.parent.as_ref().is_some_and(|p| p.is_defined(name))
    }

    pub fn parent(&self) -> Option<Scope> {
        self.0.borrow().parent.clone()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn child_sees_parent_vars() {
        let root = Scope::root();
        root.declare("x", 1);
        let child = root.child();
        assert!(child.is_defined("x"));
    }

    #[test]
    fn parent_does_not_see_child_vars() {
        let root = Scope::root();
        let child = root.child();
        child.declare("y", 1);
        assert!(!root.is_defined("y"));
    }
}
