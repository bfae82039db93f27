//! Scope handles and the table they index into.
//!
//! Per the design notes: the template AST must expose scope slots without owning the
//! host-language scope objects themselves (which have their own parent pointers). The
//! strategy used here is that a [`HostScopeTable`] is a small, fully-owned, append-only
//! arena of scopes; a [`Scope`] handle is a cheap `Rc` clone plus an index into that
//! arena. Handles never own AST nodes, and the table outlives every handle into it for
//! the duration of the resolver instance.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use crate::ty::Type;

/// An index into a [`HostScopeTable`]. Opaque outside this module and [`crate::checker`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ScopeId(pub(crate) usize);

/// A lexical scope: a set of name bindings plus at most one parent.
#[derive(Debug, Default)]
struct ScopeNode {
    parent: Option<ScopeId>,
    bindings: HashMap<String, Type>,
}

/// An append-only table of lexical scopes, owned by one loaded package.
///
/// A table with no entries has no root; [`HostScopeTable::root`] creates the first scope
/// (the package scope), which has no parent. Every other scope is created as a child of
/// an existing one via [`HostScopeTable::child_of`].
#[derive(Debug, Default)]
pub struct HostScopeTable {
    scopes: Vec<ScopeNode>,
}

impl HostScopeTable {
    pub fn new() -> Self {
        Self { scopes: Vec::new() }
    }

    /// Create the table's root scope (has no parent). Calling this more than once
    /// creates additional disconnected roots; callers should call it exactly once
    /// per table (typically for the package-level scope).
    pub fn root(&mut self) -> ScopeId {
        self.scopes.push(ScopeNode::default());
        ScopeId(self.scopes.len() - 1)
    }

    pub fn child_of(&mut self, parent: ScopeId) -> ScopeId {
        self.scopes.push(ScopeNode {
            parent: Some(parent),
            bindings: HashMap::new(),
        });
        ScopeId(self.scopes.len() - 1)
    }

    pub fn insert(&mut self, scope: ScopeId, name: impl Into<String>, ty: Type) {
        let name = name.into();
        if name == "_" {
            // Blank identifier: never enters scope.
            return;
        }
        self.scopes[scope.0].bindings.insert(name, ty);
    }

    pub fn parent(&self, scope: ScopeId) -> Option<ScopeId> {
        self.scopes[scope.0].parent
    }

    pub fn lookup_local(&self, scope: ScopeId, name: &str) -> Option<&Type> {
        self.scopes[scope.0].bindings.get(name)
    }

    pub fn lookup(&self, scope: ScopeId, name: &str) -> Option<&Type> {
        let mut current = Some(scope);
        while let Some(id) = current {
            if let Some(ty) = self.lookup_local(id, name) {
                return Some(ty);
            }
            current = self.parent(id);
        }
        None
    }

    pub fn names(&self, scope: ScopeId) -> impl Iterator<Item = &str> {
        self.scopes[scope.0].bindings.keys().map(String::as_str)
    }

    /// Depth of `scope` (0 for a root scope). Used by well-formedness tests.
    pub fn depth(&self, scope: ScopeId) -> usize {
        let mut depth = 0;
        let mut current = self.parent(scope);
        while let Some(id) = current {
            depth += 1;
            current = self.parent(id);
        }
        depth
    }
}

/// An opaque handle to one scope inside a loaded package's scope table.
///
/// Cloning a `Scope` is cheap (an `Rc` bump); every clone observes the same
/// underlying table, so bindings inserted through one handle are visible through
/// all handles sharing that table.
#[derive(Clone)]
pub struct Scope {
    table: Rc<RefCell<HostScopeTable>>,
    id: ScopeId,
}

impl Scope {
    pub fn new(table: Rc<RefCell<HostScopeTable>>, id: ScopeId) -> Self {
        Self { table, id }
    }

    pub fn id(&self) -> ScopeId {
        self.id
    }

    /// Look up `name` in this scope only (no parent search).
    pub fn lookup_local(&self, name: &str) -> Option<Type> {
        self.table.borrow().lookup_local(self.id, name).cloned()
    }

    /// Look up `name` in this scope, then its parents, up to the root.
    pub fn lookup(&self, name: &str) -> Option<Type> {
        self.table.borrow().lookup(self.id, name).cloned()
    }

    /// Enumerate every name bound directly in this scope.
    pub fn names(&self) -> Vec<String> {
        self.table.borrow().names(self.id).map(String::from).collect()
    }

    /// This scope's parent, or `None` at the root (the conceptual "Universe" scope).
    pub fn parent(&self) -> Option<Scope> {
        let parent_id = self.table.borrow().parent(self.id)?;
        Some(Scope {
            table: Rc::clone(&self.table),
            id: parent_id,
        })
    }

    /// Create and return a new child scope of `self`.
    pub fn child(&self) -> Scope {
        let id = self.table.borrow_mut().child_of(self.id);
        Scope {
            table: Rc::clone(&self.table),
            id,
        }
    }

    pub fn bind(&self, name: impl Into<String>, ty: Type) {
        self.table.borrow_mut().insert(self.id, name, ty);
    }

    /// Whether `self` and `other` are the exact same scope (same table, same id).
    pub fn is_same_scope(&self, other: &Scope) -> bool {
        Rc::ptr_eq(&self.table, &other.table) && self.id == other.id
    }

    /// Walk parents until the root; used by well-formedness tests.
    pub fn depth(&self) -> usize {
        self.table.borrow().depth(self.id)
    }
}

impl std::fmt::Debug for Scope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scope")
            .field("id", &self.id)
            .field("depth", &self.depth())
            .finish()
    }
}

/// A mutable slot on an AST node that holds a scope once binding has happened.
///
/// Setting the slot is idempotent: assigning the same scope twice (by identity) is a
/// no-op; assigning a *different* scope after one has already been set is a logic
/// error in the binder and will panic, since §8 requires `assign_scopes` to be safe to
/// call repeatedly and always produce identical annotations.
#[derive(Debug, Default)]
pub struct ScopeSlot(RefCell<Option<Scope>>);

impl ScopeSlot {
    pub fn empty() -> Self {
        Self(RefCell::new(None))
    }

    pub fn get(&self) -> Option<Scope> {
        self.0.borrow().clone()
    }

    pub fn set(&self, scope: Scope) {
        let mut slot = self.0.borrow_mut();
        match slot.as_ref() {
            Some(existing) if existing.is_same_scope(&scope) => {}
            Some(_) => panic!("scope slot assigned twice with different scopes"),
            None => *slot = Some(scope),
        }
    }

    pub fn is_set(&self) -> bool {
        self.0.borrow().is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fresh_root() -> Scope {
        let mut table = HostScopeTable::new();
        let root = table.root();
        Scope::new(Rc::new(RefCell::new(table)), root)
    }

    #[test]
    fn lookup_searches_parents() {
        let root = fresh_root();
        root.bind("x", Type::Basic(crate::ty::BasicType::Number));
        let child = root.child();
        assert_eq!(child.lookup_local("x"), None);
        assert_eq!(child.lookup("x"), Some(Type::Basic(crate::ty::BasicType::Number)));
    }

    #[test]
    fn blank_identifier_never_enters_scope() {
        let root = fresh_root();
        root.bind("_", Type::Basic(crate::ty::BasicType::Number));
        assert_eq!(root.names().len(), 0);
    }

    #[test]
    fn depth_counts_parent_hops() {
        let root = fresh_root();
        let child = root.child();
        let grandchild = child.child();
        assert_eq!(root.depth(), 0);
        assert_eq!(child.depth(), 1);
        assert_eq!(grandchild.depth(), 2);
    }

    #[test]
    fn scope_slot_set_is_idempotent() {
        let root = fresh_root();
        let slot = ScopeSlot::empty();
        slot.set(root.clone());
        slot.set(root.clone());
        assert!(slot.is_set());
    }

    #[test]
    #[should_panic(expected = "assigned twice")]
    fn scope_slot_rejects_conflicting_assignment() {
        let root = fresh_root();
        let other_root = fresh_root();
        let slot = ScopeSlot::empty();
        slot.set(root);
        slot.set(other_root);
    }
}
