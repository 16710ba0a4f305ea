//! Scope tree used by the checker and read back by the code generator.
//!
//! Scopes live in an arena and point at their parent. Function and class
//! scopes own an offset counter; block scopes draw their offsets from the
//! nearest enclosing owner, so all blocks of one function share one flat
//! frame. The global scope is its own owner and denotes shared memory.

use hashbrown::HashMap;
use thiserror::Error;

use super::ty::Type;
use crate::{
    frontend::intern::Symbol,
    index::{Index, IndexVec},
};

crate::simple_index! {
    pub struct ScopeId;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopeKind {
    Global,
    /// Member scope of a class, offsets are field slots of an object
    Class,
    Function,
    Block,
}

impl ScopeKind {
    fn owns_counter(self) -> bool {
        !matches!(self, Self::Block)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Binding {
    pub ty: Type,
    /// Storage slot relative to the frame (or object, or static region).
    /// Derived bindings have none.
    pub offset: Option<u32>,
}

#[derive(Debug)]
struct Scope {
    parent: Option<ScopeId>,
    kind: ScopeKind,
    bindings: HashMap<Symbol, Binding>,
    /// Scope whose counter hands out offsets for this one (itself for owners)
    counter_owner: ScopeId,
    /// Next free offset, only meaningful on counter owners
    next_offset: u32,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ScopeError {
    #[error("attempted to close the global scope")]
    CloseOutermost,
}

#[derive(Debug)]
pub struct ScopeTree {
    scopes: IndexVec<ScopeId, Scope>,
    current: ScopeId,
}

impl Default for ScopeTree {
    fn default() -> Self {
        Self::new()
    }
}

impl ScopeTree {
    pub fn new() -> Self {
        let mut scopes = IndexVec::new();
        let global = scopes.next_index();

        scopes.push(Scope {
            parent: None,
            kind: ScopeKind::Global,
            bindings: HashMap::new(),
            counter_owner: global,
            next_offset: 0,
        });

        Self {
            scopes,
            current: global,
        }
    }

    pub fn global(&self) -> ScopeId {
        ScopeId::new(0)
    }

    pub fn current(&self) -> ScopeId {
        self.current
    }

    pub fn kind(&self, scope: ScopeId) -> ScopeKind {
        self.scopes[scope].kind
    }

    pub fn parent(&self, scope: ScopeId) -> Option<ScopeId> {
        self.scopes[scope].parent
    }

    pub fn is_global(&self, scope: ScopeId) -> bool {
        self.scopes[scope].parent.is_none()
    }

    /// Creates a child of `parent` without making it current.
    pub fn open_child(&mut self, parent: ScopeId, kind: ScopeKind) -> ScopeId {
        assert!(
            kind != ScopeKind::Global,
            "there is exactly one global scope"
        );

        let id = self.scopes.next_index();
        let counter_owner = if kind.owns_counter() {
            id
        } else {
            self.scopes[parent].counter_owner
        };

        self.scopes.push(Scope {
            parent: Some(parent),
            kind,
            bindings: HashMap::new(),
            counter_owner,
            next_offset: 0,
        });

        id
    }

    /// Creates a child of the current scope and makes it current.
    pub fn open_scope(&mut self, kind: ScopeKind) -> ScopeId {
        self.current = self.open_child(self.current, kind);
        self.current
    }

    /// Leaves the current scope, returning it.
    pub fn close_scope(&mut self) -> Result<ScopeId, ScopeError> {
        let closed = self.current;
        self.current = self.scopes[closed]
            .parent
            .ok_or(ScopeError::CloseOutermost)?;

        Ok(closed)
    }

    /// Makes `scope` (and with it its ancestor chain) current while `f` runs,
    /// then restores the previous current scope.
    ///
    /// This is the scope swap for callers working on the current scope. The
    /// type checker passes scopes explicitly and does not need it.
    pub fn with_scope<R>(&mut self, scope: ScopeId, f: impl FnOnce(&mut Self) -> R) -> R {
        let previous = std::mem::replace(&mut self.current, scope);
        let result = f(self);
        self.current = previous;
        result
    }

    /// Binds `name` in the current scope. See [`ScopeTree::declare_in`].
    pub fn declare(&mut self, name: Symbol, ty: Type) -> bool {
        self.declare_in(self.current, name, ty)
    }

    /// Binds `name` in `scope` and gives it the next free offset of the
    /// scope's frame. Returns false if `scope` already binds `name`.
    pub fn declare_in(&mut self, scope: ScopeId, name: Symbol, ty: Type) -> bool {
        if self.scopes[scope].bindings.contains_key(&name) {
            return false;
        }

        let owner = self.scopes[scope].counter_owner;
        let offset = self.scopes[owner].next_offset;
        self.scopes[owner].next_offset += ty.size();

        tracing::trace!(%name, %ty, offset, ?scope, "declared");

        self.scopes[scope].bindings.insert(
            name,
            Binding {
                ty,
                offset: Some(offset),
            },
        );

        true
    }

    /// Binds `name` in `scope` to a type without reserving storage.
    pub fn declare_without_offset(&mut self, name: Symbol, ty: Type, scope: ScopeId) -> bool {
        let bindings = &mut self.scopes[scope].bindings;

        if bindings.contains_key(&name) {
            return false;
        }

        bindings.insert(name, Binding { ty, offset: None });
        true
    }

    /// Finds `name` walking from the current scope to the root.
    pub fn resolve(&self, name: Symbol) -> Option<(Type, ScopeId)> {
        self.resolve_from(self.current, name)
    }

    /// Finds `name` walking from `scope` to the root, returning its type and
    /// the scope that binds it.
    pub fn resolve_from(&self, scope: ScopeId, name: Symbol) -> Option<(Type, ScopeId)> {
        let mut next = Some(scope);

        while let Some(scope) = next {
            if let Some(binding) = self.scopes[scope].bindings.get(&name) {
                return Some((binding.ty.clone(), scope));
            }

            next = self.scopes[scope].parent;
        }

        None
    }

    /// Looks `name` up in `scope` only.
    pub fn binding(&self, scope: ScopeId, name: Symbol) -> Option<&Binding> {
        self.scopes[scope].bindings.get(&name)
    }

    pub fn offset_of(&self, scope: ScopeId, name: Symbol) -> Option<u32> {
        self.binding(scope, name).and_then(|b| b.offset)
    }

    /// Slots handed out so far by the counter `scope` draws from. For a
    /// function scope after checking this is the size of its frame.
    pub fn frame_size(&self, scope: ScopeId) -> u32 {
        self.scopes[self.scopes[scope].counter_owner].next_offset
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sym(s: &str) -> Symbol {
        Symbol::new(s)
    }

    #[test]
    fn redeclaration_fails_but_shadowing_succeeds() {
        let mut tree = ScopeTree::new();

        assert!(tree.declare(sym("x"), Type::Int));
        assert!(!tree.declare(sym("x"), Type::Bool));

        tree.open_scope(ScopeKind::Block);
        assert!(tree.declare(sym("x"), Type::Bool));
        assert_eq!(tree.resolve(sym("x")).map(|(ty, _)| ty), Some(Type::Bool));

        tree.close_scope().unwrap();
        assert_eq!(tree.resolve(sym("x")).map(|(ty, _)| ty), Some(Type::Int));
    }

    #[test]
    fn function_frame_counts_parameters_and_locals() {
        let mut tree = ScopeTree::new();
        tree.declare(sym("g"), Type::Int);

        let function = tree.open_scope(ScopeKind::Function);
        for name in ["a", "b"] {
            assert!(tree.declare(sym(name), Type::Int));
        }
        for name in ["x", "y", "z"] {
            assert!(tree.declare(sym(name), Type::Bool));
        }

        assert_eq!(tree.frame_size(function), 5);
        assert_eq!(tree.offset_of(function, sym("a")), Some(0));
        assert_eq!(tree.offset_of(function, sym("z")), Some(4));
    }

    #[test]
    fn blocks_extend_the_enclosing_frame() {
        let mut tree = ScopeTree::new();
        let function = tree.open_scope(ScopeKind::Function);
        tree.declare(sym("a"), Type::Int);

        let block = tree.open_scope(ScopeKind::Block);
        tree.declare(sym("b"), Type::Int);
        tree.close_scope().unwrap();

        let sibling = tree.open_scope(ScopeKind::Block);
        tree.declare(sym("c"), Type::Int);

        assert_eq!(tree.offset_of(block, sym("b")), Some(1));
        assert_eq!(tree.offset_of(sibling, sym("c")), Some(2));
        assert_eq!(tree.frame_size(function), 3);
        assert_eq!(tree.frame_size(sibling), 3);
    }

    #[test]
    fn global_and_local_bindings() {
        let mut tree = ScopeTree::new();
        tree.declare(sym("shared"), Type::Int);
        tree.open_scope(ScopeKind::Function);
        tree.declare(sym("local"), Type::Int);

        let (_, shared_scope) = tree.resolve(sym("shared")).unwrap();
        let (_, local_scope) = tree.resolve(sym("local")).unwrap();

        assert!(tree.is_global(shared_scope));
        assert!(!tree.is_global(local_scope));
        assert!(tree.resolve(sym("missing")).is_none());
    }

    #[test]
    fn derived_bindings_take_no_slot() {
        let mut tree = ScopeTree::new();
        let function = tree.open_scope(ScopeKind::Function);

        assert!(tree.declare_without_offset(sym("a[i]"), Type::Int, function));
        assert!(!tree.declare_without_offset(sym("a[i]"), Type::Int, function));
        assert_eq!(tree.frame_size(function), 0);
        assert_eq!(
            tree.binding(function, sym("a[i]")),
            Some(&Binding {
                ty: Type::Int,
                offset: None
            })
        );
    }

    #[test]
    fn scope_swap_restores_current_chain() {
        let mut tree = ScopeTree::new();
        let class = tree.open_scope(ScopeKind::Class);
        tree.declare(sym("field"), Type::Int);
        tree.close_scope().unwrap();

        let function = tree.open_scope(ScopeKind::Function);
        let block = tree.open_scope(ScopeKind::Block);

        let found = tree.with_scope(class, |tree| {
            assert_eq!(tree.current(), class);
            tree.resolve(sym("field"))
        });

        assert_eq!(found, Some((Type::Int, class)));
        assert_eq!(tree.current(), block);
        assert_eq!(tree.parent(block), Some(function));
        assert!(tree.resolve(sym("field")).is_none());
    }

    #[test]
    fn closing_the_global_scope_is_an_error() {
        let mut tree = ScopeTree::new();
        let block = tree.open_scope(ScopeKind::Block);

        assert_eq!(tree.close_scope(), Ok(block));
        assert_eq!(tree.close_scope(), Err(ScopeError::CloseOutermost));
        assert_eq!(tree.current(), tree.global());
    }
}
