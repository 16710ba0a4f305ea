use itertools::Itertools;

use super::{BodyContext, TypeChecker, Typed};
use crate::{
    frontend::{
        Span,
        ast::{
            BinaryOperatorClass, BinaryOperatorKind, Expression, ExpressionKind, Literal,
            UnaryOperatorKind,
        },
        intern::Symbol,
    },
    middle::{diagnostic::DiagnosticKind, function_table::constructor_name, ty::Type},
};

impl TypeChecker<'_> {
    /// Checks an expression and records its type.
    pub(super) fn check_expression(&mut self, expression: &Expression, context: BodyContext) -> Typed {
        let span = expression.span;

        let typed = match &expression.kind {
            ExpressionKind::Literal(literal) => Typed::ok(match literal {
                Literal::Int(_) => Type::Int,
                Literal::Bool(_) => Type::Bool,
                Literal::Char(_) => Type::Char,
                Literal::String(_) => Type::array_of(Type::Char),
            }),
            ExpressionKind::Identifier(name) => {
                match self.scopes.resolve_from(context.scope, *name) {
                    Some((Type::Function(_), _)) => {
                        self.report(
                            DiagnosticKind::Undeclared,
                            span,
                            format!("`{name}` is a method and cannot be used as a value"),
                        );
                        Typed::error(Type::Bool)
                    }
                    Some((ty, scope)) => {
                        self.annotations.record_scope(expression.id, scope);
                        Typed::ok(ty)
                    }
                    None => {
                        self.report(
                            DiagnosticKind::Undeclared,
                            span,
                            format!("use of undeclared identifier `{name}`"),
                        );
                        Typed::error(Type::Bool)
                    }
                }
            }
            ExpressionKind::EnumValue {
                enumeration,
                member,
            } => match self.types.lookup_enum(*enumeration) {
                Some(ty) if ty.ordinal(*member) == 0 => {
                    self.report(
                        DiagnosticKind::UnknownEnumValue,
                        span,
                        format!("`{enumeration}` has no member `{member}`"),
                    );
                    Typed::error(Type::Enum(ty))
                }
                Some(ty) => Typed::ok(Type::Enum(ty)),
                None => {
                    self.report(
                        DiagnosticKind::UnknownType,
                        span,
                        format!("unknown enum `{enumeration}`"),
                    );
                    Typed::error(Type::Bool)
                }
            },
            ExpressionKind::ArrayLiteral(elements) => self.check_array_literal(elements, span, context),
            ExpressionKind::NewArray { element, length } => {
                let element = self.resolve_type(element, span);
                let length = self.check_expression(length, context);

                if !length.erroneous && !length.ty.is_int() {
                    self.report(
                        DiagnosticKind::NonIntLength,
                        span,
                        format!("array length must be int but found {}", length.ty),
                    );
                }

                Typed::ok(Type::array_of(element))
            }
            ExpressionKind::Index { array, index } => self.check_index(array, index, span, context),
            ExpressionKind::Field { object, field } => {
                self.check_field(object, *field, span, context)
            }
            ExpressionKind::Call {
                function,
                arguments,
            } => {
                let arguments = self.check_arguments(arguments, context);
                self.check_call(expression, *function, arguments, false)
            }
            ExpressionKind::MethodCall {
                receiver,
                method,
                arguments,
            } => {
                let receiver = self.check_expression(receiver, context);
                let mut arguments = self.check_arguments(arguments, context);

                if receiver.erroneous {
                    Typed::error(Type::Bool)
                } else if receiver.ty.as_class().is_none() {
                    self.report(
                        DiagnosticKind::NotAClass,
                        span,
                        format!("cannot call method `{method}` on a value of type {}", receiver.ty),
                    );
                    Typed::error(Type::Bool)
                } else {
                    arguments.insert(0, receiver);
                    self.check_call(expression, *method, arguments, true)
                }
            }
            ExpressionKind::New { class, arguments } => {
                let arguments = self.check_arguments(arguments, context);

                match self.types.lookup_class(*class) {
                    None => {
                        self.report(
                            DiagnosticKind::UnknownType,
                            span,
                            format!("unknown class `{class}`"),
                        );
                        Typed::error(Type::Bool)
                    }
                    Some(ty) => {
                        let ty = Type::Class(ty);
                        let mut argument_types = vec![ty.clone()];
                        let mut erroneous = false;

                        for argument in &arguments {
                            erroneous |= argument.erroneous;
                            argument_types.push(argument.ty.clone());
                        }

                        match self
                            .functions
                            .resolve_call(constructor_name(), &argument_types, true)
                        {
                            Some(constructor) => self.functions.bind(expression.id, constructor),
                            // without arguments the default construction applies
                            None if arguments.is_empty() || erroneous => {}
                            None => self.report(
                                DiagnosticKind::NoMatchingOverload,
                                span,
                                format!(
                                    "no constructor of `{class}` accepts ({})",
                                    argument_types[1..].iter().join(", ")
                                ),
                            ),
                        }

                        Typed::ok(ty)
                    }
                }
            }
            ExpressionKind::Unary { operator, operand } => {
                let operand = self.check_expression(operand, context);
                let expected = match operator {
                    UnaryOperatorKind::Not => Type::Bool,
                    UnaryOperatorKind::Negate => Type::Int,
                };

                if operand.erroneous {
                    Typed::error(expected)
                } else if operand.ty != expected {
                    self.report(
                        DiagnosticKind::InvalidOperands,
                        span,
                        format!("operator `{operator}` cannot be applied to {}", operand.ty),
                    );
                    Typed::error(expected)
                } else {
                    Typed::ok(expected)
                }
            }
            ExpressionKind::Binary {
                operator,
                left,
                right,
            } => {
                let left = self.check_expression(left, context);
                let right = self.check_expression(right, context);

                self.check_binary(*operator, left, right, span)
            }
        };

        self.annotations
            .record_type(expression.id, typed.ty.clone());

        typed
    }

    fn check_arguments(&mut self, arguments: &[Expression], context: BodyContext) -> Vec<Typed> {
        arguments
            .iter()
            .map(|argument| self.check_expression(argument, context))
            .collect()
    }

    /// Resolves the overload of `name` taking exactly `arguments` and binds
    /// it to the call.
    fn check_call(
        &mut self,
        call: &Expression,
        name: Symbol,
        arguments: Vec<Typed>,
        is_method_call: bool,
    ) -> Typed {
        let erroneous = arguments.iter().any(|a| a.erroneous);
        let argument_types = arguments.into_iter().map(|a| a.ty).collect::<Vec<_>>();

        if let Some(function) = self
            .functions
            .resolve_call(name, &argument_types, is_method_call)
        {
            self.functions.bind(call.id, function);

            let ty = self.functions.get(function).return_type().clone();
            return if erroneous {
                Typed::error(ty)
            } else {
                Typed::ok(ty)
            };
        }

        if erroneous {
            return Typed::error(Type::Bool);
        }

        // the receiver is not part of what the user wrote
        let shown = if is_method_call {
            &argument_types[1..]
        } else {
            &argument_types[..]
        };

        if self.functions.is_defined(name) {
            self.report(
                DiagnosticKind::NoMatchingOverload,
                call.span,
                format!("no overload of `{name}` accepts ({})", shown.iter().join(", ")),
            );
        } else {
            self.report(
                DiagnosticKind::UndeclaredFunction,
                call.span,
                format!("call to undefined function `{name}`"),
            );
        }

        Typed::error(Type::Bool)
    }

    fn check_array_literal(
        &mut self,
        elements: &[Expression],
        span: Span,
        context: BodyContext,
    ) -> Typed {
        let mut elements = elements.iter();

        let Some(first) = elements.next() else {
            self.report(
                DiagnosticKind::EmptyArrayLiteral,
                span,
                "array literals need at least one element",
            );
            return Typed::error(Type::array_of(Type::Bool));
        };

        let first = self.check_expression(first, context);
        let mut erroneous = first.erroneous;

        for element in elements {
            let value = self.check_expression(element, context);
            erroneous |= value.erroneous;

            if !erroneous && value.ty != first.ty {
                self.report(
                    DiagnosticKind::TypeMismatch,
                    element.span,
                    format!(
                        "array element of type {} in an array of {}",
                        value.ty, first.ty
                    ),
                );
                erroneous = true;
            }
        }

        Typed {
            ty: Type::array_of(first.ty),
            erroneous,
        }
    }

    /// Types `array[index]`, used for both reads and assignment targets.
    pub(super) fn check_index(
        &mut self,
        array: &Expression,
        index: &Expression,
        span: Span,
        context: BodyContext,
    ) -> Typed {
        let array = self.check_expression(array, context);
        let index = self.check_expression(index, context);

        if !index.erroneous && !index.ty.is_int() {
            self.report(
                DiagnosticKind::NonIntIndex,
                span,
                format!("array index must be int but found {}", index.ty),
            );
        }

        match array.ty.element_type() {
            Some(element) if !array.erroneous => Typed::ok(element.clone()),
            _ if array.erroneous => Typed::error(Type::Bool),
            _ => {
                self.report(
                    DiagnosticKind::NotAnArray,
                    span,
                    format!("cannot index into a value of type {}", array.ty),
                );
                Typed::error(Type::Bool)
            }
        }
    }

    /// Types `object.field`, used for both reads and assignment targets.
    pub(super) fn check_field(
        &mut self,
        object: &Expression,
        field: Symbol,
        span: Span,
        context: BodyContext,
    ) -> Typed {
        let object = self.check_expression(object, context);

        if object.erroneous {
            return Typed::error(Type::Bool);
        }

        let Some(class) = object.ty.as_class() else {
            self.report(
                DiagnosticKind::NotAClass,
                span,
                format!("cannot access field `{field}` of a value of type {}", object.ty),
            );
            return Typed::error(Type::Bool);
        };

        let binding = self
            .scopes
            .binding(self.class_scope(class), field)
            .filter(|binding| binding.offset.is_some());

        match binding {
            Some(binding) => Typed::ok(binding.ty.clone()),
            None => {
                self.report(
                    DiagnosticKind::UnknownField,
                    span,
                    format!("`{}` has no field `{field}`", class.name()),
                );
                Typed::error(Type::Bool)
            }
        }
    }

    fn check_binary(
        &mut self,
        operator: BinaryOperatorKind,
        left: Typed,
        right: Typed,
        span: Span,
    ) -> Typed {
        let class = operator.class();
        let result = match class {
            BinaryOperatorClass::Arithmetic => Type::Int,
            _ => Type::Bool,
        };

        if left.erroneous || right.erroneous {
            return Typed::error(result);
        }

        let valid = match class {
            BinaryOperatorClass::Arithmetic => left.ty.is_int() && right.ty.is_int(),
            BinaryOperatorClass::Ordering => {
                left.ty == right.ty && matches!(left.ty, Type::Int | Type::Char)
            }
            BinaryOperatorClass::Equality => left.ty == right.ty,
            BinaryOperatorClass::Logical => left.ty.is_bool() && right.ty.is_bool(),
        };

        if !valid {
            self.report(
                DiagnosticKind::InvalidOperands,
                span,
                format!(
                    "operator `{operator}` cannot be applied to {} and {}",
                    left.ty, right.ty
                ),
            );
            return Typed::error(result);
        }

        Typed::ok(result)
    }
}
