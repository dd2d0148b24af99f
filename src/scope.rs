//! Defines [`ScopeStack`], the stack of per-scope bindings visible to hints.

use std::any::Any;
use std::collections::HashMap;
use std::fmt;

use crate::error::Error;

/// A single scope: a dictionary of name → value, where a value may be any type a hint chooses
/// to stash (an integer, a list of addresses, whatever the builtin needs to remember between
/// steps).
pub type Scope = HashMap<String, Box<dyn Any>>;

/// The stack of scopes visible to hints during a run.
///
/// The base scope (index 0, the "main" scope) is seeded at VM construction time from
/// `hint_locals` and can never be popped; hints grow and shrink the stack above it via
/// `enter_scope`/`exit_scope`. Only the top of the stack is visible to a running hint.
pub struct ScopeStack {
    scopes: Vec<Scope>,
}

impl ScopeStack {
    /// Creates a new stack with a single main scope, seeded with `hint_locals`.
    pub fn new(hint_locals: Scope) -> Self {
        Self {
            scopes: vec![hint_locals],
        }
    }

    /// Returns the number of scopes currently on the stack.
    pub fn len(&self) -> usize {
        self.scopes.len()
    }

    /// Returns whether the stack is empty.
    ///
    /// Always `false`: the main scope can never be popped, so the invariant `len() >= 1` holds
    /// for the entire lifetime of a [`ScopeStack`].
    pub fn is_empty(&self) -> bool {
        false
    }

    /// Pushes a new scope, initialized with `locals`, on top of the stack (`vm_enter_scope`).
    pub fn enter_scope(&mut self, locals: Scope) {
        self.scopes.push(locals);
    }

    /// Pops the topmost scope off the stack (`vm_exit_scope`).
    ///
    /// Fails with [`Error::UnbalancedScope`] if only the main scope remains.
    pub fn exit_scope(&mut self) -> Result<(), Error> {
        if self.scopes.len() <= 1 {
            return Err(Error::UnbalancedScope);
        }
        self.scopes.pop();
        Ok(())
    }

    /// Returns a reference to the topmost scope.
    pub fn top(&self) -> &Scope {
        self.scopes.last().expect("the main scope can never be popped")
    }

    /// Returns a mutable reference to the topmost scope.
    pub fn top_mut(&mut self) -> &mut Scope {
        self.scopes.last_mut().expect("the main scope can never be popped")
    }

    /// Looks up a typed binding by name in the topmost scope.
    pub fn get<T: 'static>(&self, name: &str) -> Option<&T> {
        self.top().get(name)?.downcast_ref()
    }

    /// Inserts a typed binding by name into the topmost scope.
    pub fn insert<T: 'static>(&mut self, name: impl Into<String>, value: T) {
        self.top_mut().insert(name.into(), Box::new(value));
    }
}

impl fmt::Debug for ScopeStack {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScopeStack")
            .field("depth", &self.scopes.len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_scope_on_main_scope_fails() {
        let mut stack = ScopeStack::new(Scope::new());
        assert!(matches!(stack.exit_scope(), Err(Error::UnbalancedScope)));
    }

    #[test]
    fn enter_then_exit_balances() {
        let mut stack = ScopeStack::new(Scope::new());
        stack.insert("x", 1i64);
        stack.enter_scope(Scope::new());
        assert_eq!(stack.len(), 2);
        stack.exit_scope().unwrap();
        assert_eq!(stack.len(), 1);
        assert_eq!(stack.get::<i64>("x"), Some(&1));
    }

    #[test]
    fn scope_balance_scenario() {
        let mut stack = ScopeStack::new(Scope::new());
        stack.enter_scope(Scope::new());
        stack.enter_scope(Scope::new());
        stack.exit_scope().unwrap();
        stack.exit_scope().unwrap();
        assert_eq!(stack.len(), 1);

        let mut unbalanced = ScopeStack::new(Scope::new());
        unbalanced.enter_scope(Scope::new());
        assert_eq!(unbalanced.len(), 2);
    }
}
