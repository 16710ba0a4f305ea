//! Semantic types and the per-compilation registry of named types.

use std::rc::Rc;

use hashbrown::HashMap;
use itertools::Itertools;
use once_cell::unsync::OnceCell;
use thiserror::Error;

use super::scope::ScopeId;
use crate::frontend::intern::Symbol;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Type {
    Int,
    Bool,
    Char,
    Void,
    Lock,
    /// Reference to a block of elements in shared memory
    Array(Rc<Type>),
    Function(Rc<FunctionSignature>),
    Enum(EnumType),
    /// Reference to an object in shared memory
    Class(ClassType),
}

impl Type {
    pub fn array_of(element: Type) -> Self {
        Self::Array(Rc::new(element))
    }

    /// Number of memory slots a value of this type occupies. Arrays and
    /// objects are stored as a single address.
    pub fn size(&self) -> u32 {
        1
    }

    pub fn is_bool(&self) -> bool {
        matches!(self, Self::Bool)
    }

    pub fn is_int(&self) -> bool {
        matches!(self, Self::Int)
    }

    pub fn is_void(&self) -> bool {
        matches!(self, Self::Void)
    }

    pub fn is_lock(&self) -> bool {
        matches!(self, Self::Lock)
    }

    pub fn element_type(&self) -> Option<&Type> {
        match self {
            Self::Array(element) => Some(element),
            _ => None,
        }
    }

    pub fn as_class(&self) -> Option<&ClassType> {
        match self {
            Self::Class(class) => Some(class),
            _ => None,
        }
    }
}

impl core::fmt::Display for Type {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Int => write!(f, "int"),
            Self::Bool => write!(f, "bool"),
            Self::Char => write!(f, "char"),
            Self::Void => write!(f, "void"),
            Self::Lock => write!(f, "lock"),
            Self::Array(element) => write!(f, "{element}[]"),
            Self::Function(signature) => write!(f, "{signature}"),
            Self::Enum(enumeration) => write!(f, "{}", enumeration.name()),
            Self::Class(class) => write!(f, "{}", class.name()),
        }
    }
}

/// Argument and return types of a function. Methods carry their receiver as
/// the first argument.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FunctionSignature {
    pub arguments: Vec<Type>,
    pub return_type: Type,
    pub is_method: bool,
}

impl core::fmt::Display for FunctionSignature {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}({}) -> {}",
            if self.is_method { "method" } else { "function" },
            self.arguments.iter().join(", "),
            self.return_type
        )
    }
}

#[derive(Debug)]
struct EnumData {
    name: Symbol,
    values: Vec<Symbol>,
}

/// A nominal enum type, two handles are equal only if they came from the same
/// registration
#[derive(Debug, Clone)]
pub struct EnumType(Rc<EnumData>);

impl EnumType {
    pub fn name(&self) -> Symbol {
        self.0.name
    }

    pub fn values(&self) -> &[Symbol] {
        &self.0.values
    }

    /// Ordinal of `member`, starting at 1. Unknown members map to 0.
    pub fn ordinal(&self, member: Symbol) -> i32 {
        self.0
            .values
            .iter()
            .position(|v| *v == member)
            .map(|i| i as i32 + 1)
            .unwrap_or(0)
    }
}

impl PartialEq for EnumType {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl Eq for EnumType {}

impl std::hash::Hash for EnumType {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        Rc::as_ptr(&self.0).hash(state)
    }
}

#[derive(Debug)]
struct ClassData {
    name: Symbol,
    /// Member scope, assigned once while the class is declared
    scope: OnceCell<ScopeId>,
}

/// A nominal class type
#[derive(Debug, Clone)]
pub struct ClassType(Rc<ClassData>);

impl ClassType {
    pub fn name(&self) -> Symbol {
        self.0.name
    }

    pub fn scope(&self) -> Option<ScopeId> {
        self.0.scope.get().copied()
    }

    pub fn set_scope(&self, scope: ScopeId) {
        if self.0.scope.set(scope).is_err() {
            panic!("class `{}` already owns a member scope", self.0.name);
        }
    }
}

impl PartialEq for ClassType {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl Eq for ClassType {}

impl std::hash::Hash for ClassType {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        Rc::as_ptr(&self.0).hash(state)
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("type `{name}` is already defined")]
pub struct DuplicateTypeDefinition {
    pub name: Symbol,
}

/// Catalog of user defined types for one compilation. Enum and class names
/// share a single namespace.
#[derive(Debug, Default)]
pub struct TypeRegistry {
    enums: HashMap<Symbol, EnumType>,
    classes: HashMap<Symbol, ClassType>,
}

impl TypeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn is_defined(&self, name: Symbol) -> bool {
        self.enums.contains_key(&name) || self.classes.contains_key(&name)
    }

    pub fn define_enum(
        &mut self,
        name: Symbol,
        values: Vec<Symbol>,
    ) -> Result<EnumType, DuplicateTypeDefinition> {
        if self.is_defined(name) {
            return Err(DuplicateTypeDefinition { name });
        }

        let enumeration = EnumType(Rc::new(EnumData { name, values }));
        self.enums.insert(name, enumeration.clone());

        Ok(enumeration)
    }

    pub fn define_class(&mut self, name: Symbol) -> Result<ClassType, DuplicateTypeDefinition> {
        if self.is_defined(name) {
            return Err(DuplicateTypeDefinition { name });
        }

        let class = ClassType(Rc::new(ClassData {
            name,
            scope: OnceCell::new(),
        }));
        self.classes.insert(name, class.clone());

        Ok(class)
    }

    pub fn lookup_enum(&self, name: Symbol) -> Option<EnumType> {
        self.enums.get(&name).cloned()
    }

    pub fn lookup_class(&self, name: Symbol) -> Option<ClassType> {
        self.classes.get(&name).cloned()
    }

    /// Looks a name up in either namespace
    pub fn lookup(&self, name: Symbol) -> Option<Type> {
        self.lookup_enum(name)
            .map(Type::Enum)
            .or_else(|| self.lookup_class(name).map(Type::Class))
    }

    /// Forgets every registered type
    pub fn clear(&mut self) {
        self.enums.clear();
        self.classes.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sym(s: &str) -> Symbol {
        Symbol::new(s)
    }

    #[test]
    fn enum_ordinals_start_at_one() {
        let mut registry = TypeRegistry::new();
        let color = registry
            .define_enum(sym("Color"), vec![sym("Red"), sym("Green"), sym("Blue")])
            .unwrap();

        assert_eq!(color.ordinal(sym("Red")), 1);
        assert_eq!(color.ordinal(sym("Blue")), 3);
        assert_eq!(color.ordinal(sym("Purple")), 0);
    }

    #[test]
    fn names_are_shared_between_enums_and_classes() {
        let mut registry = TypeRegistry::new();
        registry.define_enum(sym("Shape"), vec![]).unwrap();

        assert_eq!(
            registry.define_class(sym("Shape")),
            Err(DuplicateTypeDefinition { name: sym("Shape") })
        );
        assert!(registry.define_enum(sym("Shape"), vec![]).is_err());
        assert!(registry.define_class(sym("Point")).is_ok());
        assert!(registry.define_enum(sym("Point"), vec![]).is_err());
    }

    #[test]
    fn nominal_and_structural_equality() {
        let mut first = TypeRegistry::new();
        let mut second = TypeRegistry::new();
        let a = first.define_class(sym("Node")).unwrap();
        let b = second.define_class(sym("Node")).unwrap();

        assert_eq!(Type::Class(a.clone()), Type::Class(a.clone()));
        assert_ne!(Type::Class(a.clone()), Type::Class(b));
        assert_eq!(Type::array_of(Type::Int), Type::array_of(Type::Int));
        assert_ne!(Type::array_of(Type::Int), Type::array_of(Type::Char));
        assert_eq!(Type::array_of(Type::Class(a)).to_string(), "Node[]");
    }

    #[test]
    fn clear_forgets_registrations() {
        let mut registry = TypeRegistry::new();
        registry.define_class(sym("Node")).unwrap();
        registry.clear();

        assert!(registry.lookup(sym("Node")).is_none());
        assert!(registry.define_class(sym("Node")).is_ok());
    }
}
