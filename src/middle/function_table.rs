//! Overload sets of every function, method and constructor in the program.

use std::rc::Rc;

use hashbrown::HashMap;

use super::{
    scope::ScopeId,
    ty::{ClassType, FunctionSignature, Type},
};
use crate::{
    frontend::{ast::NodeId, intern::Symbol},
    index::IndexVec,
};

crate::simple_index! {
    pub struct FunctionId;
}

/// Constructors of every class share this name, their first argument (the
/// class itself) keeps the overload sets of different classes apart
pub const CONSTRUCTOR_NAME: &str = "<constructor>";

pub fn constructor_name() -> Symbol {
    Symbol::new(CONSTRUCTOR_NAME)
}

#[derive(Debug)]
pub struct Function {
    pub name: Symbol,
    pub signature: Rc<FunctionSignature>,
    pub is_thread: bool,
    /// Class defining this method or constructor
    pub class: Option<ClassType>,
    /// Frame scope holding the parameters and locals, attached by the body
    /// pass
    pub scope: Option<ScopeId>,
}

impl Function {
    pub fn is_constructor(&self) -> bool {
        self.name == constructor_name()
    }

    pub fn return_type(&self) -> &Type {
        &self.signature.return_type
    }
}

#[derive(Debug, Default)]
pub struct FunctionTable {
    functions: IndexVec<FunctionId, Function>,
    overloads: HashMap<Symbol, Vec<FunctionId>>,
    /// Call sites and definitions bound to the overload they refer to
    bindings: HashMap<NodeId, FunctionId>,
}

impl FunctionTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an overload. Returns `None` if one with the same argument types
    /// and method flag already exists under `name`.
    pub fn define(
        &mut self,
        name: Symbol,
        signature: FunctionSignature,
        is_thread: bool,
        class: Option<ClassType>,
    ) -> Option<FunctionId> {
        if self
            .resolve_call(name, &signature.arguments, signature.is_method)
            .is_some()
        {
            return None;
        }

        let id = self.functions.push(Function {
            name,
            signature: Rc::new(signature),
            is_thread,
            class,
            scope: None,
        });
        self.overloads.entry(name).or_default().push(id);

        tracing::debug!(%name, ?id, "defined function");

        Some(id)
    }

    /// Finds the overload of `name` whose arguments match `arguments` exactly.
    pub fn resolve_call(
        &self,
        name: Symbol,
        arguments: &[Type],
        is_method_call: bool,
    ) -> Option<FunctionId> {
        self.overloads.get(&name)?.iter().copied().find(|id| {
            let signature = &self.functions[*id].signature;

            signature.is_method == is_method_call && signature.arguments == arguments
        })
    }

    /// Whether any overload exists under `name`
    pub fn is_defined(&self, name: Symbol) -> bool {
        self.overloads.contains_key(&name)
    }

    /// Records which overload `node` refers to. Each node is bound once.
    pub fn bind(&mut self, node: NodeId, function: FunctionId) {
        let previous = self.bindings.insert(node, function);

        assert!(
            previous.is_none(),
            "node {node:?} was already bound to a function"
        );
    }

    pub fn lookup(&self, node: NodeId) -> Option<FunctionId> {
        self.bindings.get(&node).copied()
    }

    pub fn attach_scope(&mut self, function: FunctionId, scope: ScopeId) {
        self.functions[function].scope = Some(scope);
    }

    pub fn get(&self, function: FunctionId) -> &Function {
        &self.functions[function]
    }

    pub fn iter(&self) -> impl Iterator<Item = (FunctionId, &Function)> {
        self.functions.enumerate()
    }

    /// Thread functions in definition order, thread `i` runs on core `i + 1`
    pub fn threads(&self) -> Vec<FunctionId> {
        self.iter()
            .filter(|(_, f)| f.is_thread)
            .map(|(id, _)| id)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn signature(arguments: Vec<Type>, return_type: Type) -> FunctionSignature {
        FunctionSignature {
            arguments,
            return_type,
            is_method: false,
        }
    }

    #[test]
    fn overloads_resolve_by_exact_arguments() {
        let mut table = FunctionTable::new();
        let f = Symbol::new("f");

        let one = table
            .define(f, signature(vec![Type::Int], Type::Int), false, None)
            .unwrap();
        let two = table
            .define(f, signature(vec![Type::Int, Type::Bool], Type::Void), false, None)
            .unwrap();

        assert_eq!(table.resolve_call(f, &[Type::Int], false), Some(one));
        assert_eq!(table.resolve_call(f, &[Type::Int, Type::Bool], false), Some(two));
        assert_eq!(table.resolve_call(f, &[Type::Int, Type::Int], false), None);
        assert_eq!(table.resolve_call(f, &[Type::Int], true), None);
    }

    #[test]
    fn return_type_is_not_part_of_overload_identity() {
        let mut table = FunctionTable::new();
        let f = Symbol::new("f");

        assert!(
            table
                .define(f, signature(vec![Type::Int], Type::Int), false, None)
                .is_some()
        );
        assert!(
            table
                .define(f, signature(vec![Type::Int], Type::Bool), false, None)
                .is_none()
        );
        assert!(
            table
                .define(
                    f,
                    FunctionSignature {
                        is_method: true,
                        ..signature(vec![Type::Int], Type::Int)
                    },
                    false,
                    None
                )
                .is_some()
        );
    }

    #[test]
    fn bindings_and_threads() {
        let mut table = FunctionTable::new();
        let worker = table
            .define(Symbol::new("worker"), signature(vec![], Type::Void), true, None)
            .unwrap();
        let helper = table
            .define(Symbol::new("helper"), signature(vec![], Type::Void), false, None)
            .unwrap();

        let call = NodeId::fresh();
        table.bind(call, helper);

        assert_eq!(table.lookup(call), Some(helper));
        assert_eq!(table.lookup(NodeId::fresh()), None);
        assert_eq!(table.threads(), vec![worker]);
    }
}
