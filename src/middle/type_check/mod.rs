//! AWL Type Checker
//!
//! Checking runs in two passes over the aggregate compilation unit:
//!
//!   1) the declaration pass registers every enum and class, lays out class
//!      fields and collects the signatures of all functions, methods and
//!      constructors so bodies can refer to definitions that appear later
//!   2) the body pass checks the free top level statements, class field
//!      initializers and every function body
//!
//! Errors never stop the pass. Each one is recorded as a [`Diagnostic`] and a
//! substitute type (`bool`) is used at the failure site. Expressions that
//! already produced a diagnostic are flagged as erroneous so that enclosing
//! checks do not report the same problem again.
//!
//! The result of a clean run is a [`CheckedProgram`]: the scope tree, the
//! function table and an annotation table giving the type (and for names the
//! binding scope) of every checked node. The code generator only reads it.

use hashbrown::HashMap;

use super::{
    diagnostic::{Diagnostic, DiagnosticKind},
    function_table::{FunctionId, FunctionTable, constructor_name},
    scope::{ScopeId, ScopeKind, ScopeTree},
    ty::{ClassType, FunctionSignature, Type, TypeRegistry},
};
use crate::frontend::{
    CompilationUnit, Span,
    ast::{Block, Expression, FunctionBody, NodeId, Parameter, TypeExpression},
    intern::Symbol,
};

mod expression;
mod returns;
mod statement;

#[cfg(test)]
mod tests;

/// Name of the receiver inside methods and constructors
pub const THIS: &str = "this";

/// Per node results of the checker. Every entry is written once.
#[derive(Debug, Default)]
pub struct Annotations {
    types: HashMap<NodeId, Type>,
    scopes: HashMap<NodeId, ScopeId>,
}

impl Annotations {
    fn record_type(&mut self, node: NodeId, ty: Type) {
        let previous = self.types.insert(node, ty);

        assert!(previous.is_none(), "type of {node:?} recorded twice");
    }

    fn record_scope(&mut self, node: NodeId, scope: ScopeId) {
        let previous = self.scopes.insert(node, scope);

        assert!(previous.is_none(), "scope of {node:?} recorded twice");
    }

    pub fn type_of(&self, node: NodeId) -> Option<&Type> {
        self.types.get(&node)
    }

    /// Scope binding the name used (or declared) at `node`
    pub fn scope_of(&self, node: NodeId) -> Option<ScopeId> {
        self.scopes.get(&node).copied()
    }
}

/// Everything the code generator needs from a successful check
#[derive(Debug)]
pub struct CheckedProgram {
    pub types: TypeRegistry,
    pub scopes: ScopeTree,
    pub functions: FunctionTable,
    pub annotations: Annotations,
}

/// Type of a checked expression. Erroneous expressions have already been
/// reported and carry a substitute type.
#[derive(Debug, Clone)]
struct Typed {
    ty: Type,
    erroneous: bool,
}

impl Typed {
    fn ok(ty: Type) -> Self {
        Self {
            ty,
            erroneous: false,
        }
    }

    fn error(ty: Type) -> Self {
        Self {
            ty,
            erroneous: true,
        }
    }
}

/// Body of a function, method or constructor
#[derive(Debug, Clone, Copy)]
enum BodyRef<'b> {
    Block(&'b Block),
    Expression(&'b Expression),
}

impl<'b> From<&'b FunctionBody> for BodyRef<'b> {
    fn from(body: &'b FunctionBody) -> Self {
        match body {
            FunctionBody::Block(block) => Self::Block(block),
            FunctionBody::Expression(expression) => Self::Expression(expression),
        }
    }
}

/// Where a statement or expression is being checked
#[derive(Debug, Clone, Copy)]
struct BodyContext {
    scope: ScopeId,
    /// Function whose body is being checked, `None` for top level code
    function: Option<FunctionId>,
    /// `Some(true)` inside a case block followed by another block, `None`
    /// inside the final block of a switch, `Some(false)` outside any switch
    in_switch: Option<bool>,
}

impl BodyContext {
    fn in_scope(self, scope: ScopeId) -> Self {
        Self { scope, ..self }
    }

    fn in_switch(self, in_switch: Option<bool>) -> Self {
        Self { in_switch, ..self }
    }
}

pub struct TypeChecker<'a> {
    unit: &'a CompilationUnit,
    types: TypeRegistry,
    scopes: ScopeTree,
    functions: FunctionTable,
    annotations: Annotations,
    diagnostics: Vec<Diagnostic>,
    /// Classes that were registered successfully, by index into `unit.classes`
    classes: Vec<(usize, ClassType)>,
}

impl<'a> TypeChecker<'a> {
    /// Checks a whole program. Either every construct is well typed and the
    /// annotated tables are returned, or the diagnostics are.
    #[tracing::instrument(level = "debug", skip_all)]
    pub fn check(unit: &'a CompilationUnit) -> Result<CheckedProgram, Vec<Diagnostic>> {
        let mut checker = Self {
            unit,
            types: TypeRegistry::new(),
            scopes: ScopeTree::new(),
            functions: FunctionTable::new(),
            annotations: Annotations::default(),
            diagnostics: Vec::new(),
            classes: Vec::new(),
        };

        checker.declare_types();
        checker.declare_functions();
        checker.check_bodies();

        tracing::debug!(
            diagnostics = checker.diagnostics.len(),
            "finished type checking"
        );

        if !checker.diagnostics.is_empty() {
            return Err(checker.diagnostics);
        }

        Ok(CheckedProgram {
            types: checker.types,
            scopes: checker.scopes,
            functions: checker.functions,
            annotations: checker.annotations,
        })
    }

    fn report(&mut self, kind: DiagnosticKind, span: Span, message: impl Into<String>) {
        let diagnostic = Diagnostic::new(kind, span, message);

        tracing::trace!(%diagnostic, "reported");

        self.diagnostics.push(diagnostic);
    }

    /// Resolves source type syntax, substituting `bool` for unknown names.
    fn resolve_type(&mut self, ty: &TypeExpression, span: Span) -> Type {
        match ty {
            TypeExpression::Int => Type::Int,
            TypeExpression::Bool => Type::Bool,
            TypeExpression::Char => Type::Char,
            TypeExpression::Void => Type::Void,
            TypeExpression::Lock => Type::Lock,
            TypeExpression::Array(element) => Type::array_of(self.resolve_type(element, span)),
            TypeExpression::Named(name) => match self.types.lookup(*name) {
                Some(ty) => ty,
                None => {
                    self.report(
                        DiagnosticKind::UnknownType,
                        span,
                        format!("unknown type `{name}`"),
                    );
                    Type::Bool
                }
            },
        }
    }

    fn resolve_parameter_types(&mut self, parameters: &[Parameter]) -> Vec<Type> {
        parameters
            .iter()
            .map(|parameter| {
                let ty = self.resolve_type(&parameter.ty, parameter.span);

                if ty.is_void() {
                    self.report(
                        DiagnosticKind::InvalidVoid,
                        parameter.span,
                        format!("parameter `{}` cannot have type void", parameter.name),
                    );
                }

                // locks only live in shared memory
                if ty.is_lock() {
                    self.report(
                        DiagnosticKind::LockOutsideGlobalScope,
                        parameter.span,
                        format!("parameter `{}` cannot have type lock", parameter.name),
                    );
                }

                ty
            })
            .collect()
    }

    fn resolve_return_type(&mut self, ty: &TypeExpression, name: Symbol, span: Span) -> Type {
        let ty = self.resolve_type(ty, span);

        if ty.is_lock() {
            self.report(
                DiagnosticKind::LockOutsideGlobalScope,
                span,
                format!("`{name}` cannot return a lock"),
            );
        }

        ty
    }

    /* Declaration pass */

    fn declare_types(&mut self) {
        let unit = self.unit;

        for definition in &unit.enums {
            if let Err(err) = self
                .types
                .define_enum(definition.name, definition.values.clone())
            {
                self.report(
                    DiagnosticKind::DuplicateTypeDefinition,
                    definition.span,
                    err.to_string(),
                );
            }
        }

        // every class name is known before any member is resolved so classes
        // can refer to each other
        for (index, definition) in unit.classes.iter().enumerate() {
            match self.types.define_class(definition.name) {
                Ok(class) => self.classes.push((index, class)),
                Err(err) => self.report(
                    DiagnosticKind::DuplicateTypeDefinition,
                    definition.span,
                    err.to_string(),
                ),
            }
        }

        for (index, class) in self.classes.clone() {
            let definition = &unit.classes[index];
            let global = self.scopes.global();
            let class_scope = self.scopes.open_child(global, ScopeKind::Class);

            class.set_scope(class_scope);

            for field in &definition.fields {
                let ty = self.resolve_type(&field.ty, field.span);

                if ty.is_void() || ty.is_lock() {
                    self.report(
                        DiagnosticKind::InvalidVoid,
                        field.span,
                        format!("field `{}` cannot have type {ty}", field.name),
                    );
                }

                if !self.scopes.declare_in(class_scope, field.name, ty.clone()) {
                    self.report(
                        DiagnosticKind::Redeclaration,
                        field.span,
                        format!("field `{}` is already declared in `{}`", field.name, class.name()),
                    );
                }

                self.annotations.record_type(field.id, ty);
                self.annotations.record_scope(field.id, class_scope);
            }
        }
    }

    fn declare_functions(&mut self) {
        let unit = self.unit;

        for (index, class) in self.classes.clone() {
            let definition = &unit.classes[index];
            let class_scope = self.class_scope(&class);
            let receiver = Type::Class(class.clone());

            for method in &definition.methods {
                if method.is_thread {
                    self.report(
                        DiagnosticKind::InvalidThreadFunction,
                        method.span,
                        format!("method `{}` cannot be a thread function", method.name),
                    );
                }

                let mut arguments = vec![receiver.clone()];
                arguments.extend(self.resolve_parameter_types(&method.parameters));
                let return_type =
                    self.resolve_return_type(&method.return_type, method.name, method.span);
                let signature = FunctionSignature {
                    arguments,
                    return_type,
                    is_method: true,
                };

                // overloads share one binding, it only reserves the name
                // against fields
                let existing = self.scopes.binding(class_scope, method.name).cloned();
                match existing {
                    Some(binding) if !matches!(binding.ty, Type::Function(_)) => self.report(
                        DiagnosticKind::Redeclaration,
                        method.span,
                        format!(
                            "`{}` is already declared as a field of `{}`",
                            method.name,
                            class.name()
                        ),
                    ),
                    Some(_) => {}
                    None => {
                        self.scopes.declare_without_offset(
                            method.name,
                            Type::Function(signature.clone().into()),
                            class_scope,
                        );
                    }
                }

                self.define_function(
                    method.name,
                    signature,
                    false,
                    Some(class.clone()),
                    method.id,
                    method.span,
                );
            }

            for constructor in &definition.constructors {
                let mut arguments = vec![receiver.clone()];
                arguments.extend(self.resolve_parameter_types(&constructor.parameters));
                let signature = FunctionSignature {
                    arguments,
                    return_type: Type::Void,
                    is_method: true,
                };

                self.define_function(
                    constructor_name(),
                    signature,
                    false,
                    Some(class.clone()),
                    constructor.id,
                    constructor.span,
                );
            }
        }

        for function in &unit.functions {
            let arguments = self.resolve_parameter_types(&function.parameters);
            let return_type =
                self.resolve_return_type(&function.return_type, function.name, function.span);

            if function.is_thread && (!arguments.is_empty() || !return_type.is_void()) {
                self.report(
                    DiagnosticKind::InvalidThreadFunction,
                    function.span,
                    format!(
                        "thread function `{}` must take no arguments and return void",
                        function.name
                    ),
                );
            }

            let signature = FunctionSignature {
                arguments,
                return_type,
                is_method: false,
            };

            self.define_function(
                function.name,
                signature,
                function.is_thread,
                None,
                function.id,
                function.span,
            );
        }
    }

    fn define_function(
        &mut self,
        name: Symbol,
        signature: FunctionSignature,
        is_thread: bool,
        class: Option<ClassType>,
        definition: NodeId,
        span: Span,
    ) {
        let description = signature.to_string();

        match self.functions.define(name, signature, is_thread, class) {
            Some(id) => self.functions.bind(definition, id),
            None => self.report(
                DiagnosticKind::DuplicateFunction,
                span,
                format!("`{name}` is already defined as {description}"),
            ),
        }
    }

    fn class_scope(&self, class: &ClassType) -> ScopeId {
        class
            .scope()
            .expect("member scopes are assigned as soon as a class is registered")
    }

    /* Body pass */

    fn check_bodies(&mut self) {
        let unit = self.unit;
        let global = BodyContext {
            scope: self.scopes.global(),
            function: None,
            in_switch: Some(false),
        };

        for statement in &unit.statements {
            self.check_statement(statement, global);
        }

        for (index, class) in self.classes.clone() {
            let definition = &unit.classes[index];

            for field in &definition.fields {
                if let Some(initializer) = &field.initializer {
                    let value = self.check_expression(initializer, global);
                    let ty = self.scopes.binding(self.class_scope(&class), field.name);

                    if let Some(ty) = ty.map(|binding| binding.ty.clone()) {
                        self.expect_type(&value, &ty, initializer.span, || {
                            format!("field `{}` of type {ty}", field.name)
                        });
                    }
                }
            }

            for method in &definition.methods {
                self.check_function_body(
                    method.id,
                    Some(&class),
                    &method.parameters,
                    (&method.body).into(),
                    method.span,
                );
            }

            for constructor in &definition.constructors {
                self.check_function_body(
                    constructor.id,
                    Some(&class),
                    &constructor.parameters,
                    BodyRef::Block(&constructor.body),
                    constructor.span,
                );
            }
        }

        for function in &unit.functions {
            self.check_function_body(
                function.id,
                None,
                &function.parameters,
                (&function.body).into(),
                function.span,
            );
        }
    }

    fn check_function_body(
        &mut self,
        definition: NodeId,
        class: Option<&ClassType>,
        parameters: &[Parameter],
        body: BodyRef<'_>,
        span: Span,
    ) {
        // duplicates were reported in the declaration pass
        let Some(id) = self.functions.lookup(definition) else {
            return;
        };

        let parent = match class {
            Some(class) => self.class_scope(class),
            None => self.scopes.global(),
        };
        let scope = self.scopes.open_child(parent, ScopeKind::Function);
        let signature = self.functions.get(id).signature.clone();
        let mut argument_types = signature.arguments.iter();

        if let Some(class) = class {
            argument_types.next();
            self.scopes
                .declare_in(scope, Symbol::new(THIS), Type::Class(class.clone()));
        }

        for (parameter, ty) in parameters.iter().zip(argument_types) {
            if !self.scopes.declare_in(scope, parameter.name, ty.clone()) {
                self.report(
                    DiagnosticKind::Redeclaration,
                    parameter.span,
                    format!("parameter `{}` is declared twice", parameter.name),
                );
            }

            self.annotations.record_type(parameter.id, ty.clone());
            self.annotations.record_scope(parameter.id, scope);
        }

        self.functions.attach_scope(id, scope);

        let context = BodyContext {
            scope,
            function: Some(id),
            in_switch: Some(false),
        };
        let name = self.functions.get(id).name;

        match body {
            BodyRef::Block(block) => {
                for statement in &block.statements {
                    self.check_statement(statement, context);
                }

                if !signature.return_type.is_void() && !returns::block_returns(block) {
                    self.report(
                        DiagnosticKind::MissingReturn,
                        span,
                        format!("`{name}` does not return a value on every path"),
                    );
                }
            }
            BodyRef::Expression(expression) => {
                let value = self.check_expression(expression, context);

                self.expect_type(&value, &signature.return_type, expression.span, || {
                    format!("return type of `{name}`")
                });
            }
        }
    }

    /// Reports a mismatch between a checked value and the type its context
    /// requires, unless the value was already reported.
    fn expect_type(
        &mut self,
        value: &Typed,
        expected: &Type,
        span: Span,
        context: impl FnOnce() -> String,
    ) {
        if !value.erroneous && value.ty != *expected {
            let context = context();

            self.report(
                DiagnosticKind::TypeMismatch,
                span,
                format!("expected {expected} for {context} but found {}", value.ty),
            );
        }
    }
}
