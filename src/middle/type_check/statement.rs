use super::{BodyContext, TypeChecker, Typed};
use crate::{
    frontend::{
        Span,
        ast::{
            Block, Declaration, Expression, Statement, StatementKind, SwitchStatement, Target,
            TargetKind,
        },
    },
    middle::{diagnostic::DiagnosticKind, scope::ScopeKind, ty::Type},
};

impl TypeChecker<'_> {
    pub(super) fn check_statement(&mut self, statement: &Statement, context: BodyContext) {
        let span = statement.span;

        match &statement.kind {
            StatementKind::Declaration(declaration) => {
                self.check_declaration(declaration, context);
            }
            StatementKind::Assignment { target, value } => {
                let target_type = self.check_target(target, context);
                let value = self.check_expression(value, context);

                if !target_type.erroneous {
                    self.expect_type(&value, &target_type.ty, span, || {
                        "the assignment target".to_owned()
                    });
                }
            }
            StatementKind::If {
                condition,
                then_block,
                else_block,
            } => {
                self.check_condition(condition, "if", context);
                self.check_block(then_block, context);

                if let Some(else_block) = else_block {
                    self.check_block(else_block, context);
                }
            }
            StatementKind::While { condition, body } => {
                self.check_condition(condition, "while", context);
                self.check_block(body, context);
            }
            StatementKind::Do { body, condition } => {
                self.check_block(body, context);
                self.check_condition(condition, "do", context);
            }
            StatementKind::For {
                initializer,
                condition,
                step,
                body,
            } => {
                // the loop variable lives in a block around the whole loop
                let scope = self.scopes.open_child(context.scope, ScopeKind::Block);
                let context = context.in_scope(scope);

                if let Some(initializer) = initializer {
                    self.check_statement(initializer, context);
                }

                self.check_condition(condition, "for", context);

                if let Some(step) = step {
                    self.check_statement(step, context);
                }

                self.check_block(body, context);
            }
            StatementKind::Block(block) => self.check_block(block, context),
            StatementKind::Switch(switch) => self.check_switch(switch, context),
            StatementKind::Next => {
                if context.in_switch != Some(true) {
                    let reason = match context.in_switch {
                        None => "the last block of a switch",
                        _ => "outside of a switch",
                    };

                    self.report(
                        DiagnosticKind::MisplacedNext,
                        span,
                        format!("`next` cannot be used in {reason}"),
                    );
                }
            }
            StatementKind::Return(value) => self.check_return(value.as_ref(), span, context),
            StatementKind::Expression(expression) => {
                self.check_expression(expression, context);
            }
            StatementKind::Acquire(expression) | StatementKind::Release(expression) => {
                let lock = self.check_expression(expression, context);
                let operation = match statement.kind {
                    StatementKind::Acquire(_) => "acquire",
                    _ => "release",
                };

                if !lock.erroneous && !lock.ty.is_lock() {
                    self.report(
                        DiagnosticKind::NotALock,
                        expression.span,
                        format!("cannot {operation} a value of type {}", lock.ty),
                    );
                } else if !lock.erroneous && !expression.is_place() {
                    self.report(
                        DiagnosticKind::NotALock,
                        expression.span,
                        format!("cannot {operation} a computed lock"),
                    );
                }
            }
        }
    }

    /// Checks `block` in a fresh block scope nested in the context's scope.
    pub(super) fn check_block(&mut self, block: &Block, context: BodyContext) {
        let scope = self.scopes.open_child(context.scope, ScopeKind::Block);
        let context = context.in_scope(scope);

        for statement in &block.statements {
            self.check_statement(statement, context);
        }
    }

    fn check_declaration(&mut self, declaration: &Declaration, context: BodyContext) {
        let span = declaration.span;
        let name = declaration.name;
        let ty = self.resolve_type(&declaration.ty, span);

        if ty.is_void() {
            self.report(
                DiagnosticKind::InvalidVoid,
                span,
                format!("variable `{name}` cannot have type void"),
            );
        }

        if ty.is_lock() && !self.scopes.is_global(context.scope) {
            self.report(
                DiagnosticKind::LockOutsideGlobalScope,
                span,
                format!("lock `{name}` must be declared in the global scope"),
            );
        }

        // the initializer is checked before the name is bound, so it cannot
        // refer to the variable it initializes
        if let Some(initializer) = &declaration.initializer {
            let value = self.check_expression(initializer, context);

            self.expect_type(&value, &ty, initializer.span, || {
                format!("the initializer of `{name}`")
            });
        }

        if !self.scopes.declare_in(context.scope, name, ty.clone()) {
            self.report(
                DiagnosticKind::Redeclaration,
                span,
                format!("`{name}` is already declared in this scope"),
            );
        }

        self.annotations.record_type(declaration.id, ty);
        self.annotations.record_scope(declaration.id, context.scope);
    }

    fn check_target(&mut self, target: &Target, context: BodyContext) -> Typed {
        let typed = match &target.kind {
            TargetKind::Identifier(name) => {
                match self.scopes.resolve_from(context.scope, *name) {
                    Some((Type::Function(_), _)) | None => {
                        self.report(
                            DiagnosticKind::Undeclared,
                            target.span,
                            format!("assignment to undeclared variable `{name}`"),
                        );

                        Typed::error(Type::Bool)
                    }
                    Some((ty, scope)) => {
                        self.annotations.record_scope(target.id, scope);
                        Typed::ok(ty)
                    }
                }
            }
            TargetKind::Index { array, index } => {
                self.check_index(array, index, target.span, context)
            }
            TargetKind::Field { object, field } => {
                self.check_field(object, *field, target.span, context)
            }
        };

        self.annotations.record_type(target.id, typed.ty.clone());

        typed
    }

    fn check_condition(
        &mut self,
        condition: &Expression,
        construct: &str,
        context: BodyContext,
    ) {
        let value = self.check_expression(condition, context);

        if !value.erroneous && !value.ty.is_bool() {
            self.report(
                DiagnosticKind::NonBoolCondition,
                condition.span,
                format!(
                    "{construct} condition must be bool but found {}",
                    value.ty
                ),
            );
        }
    }

    fn check_switch(&mut self, switch: &SwitchStatement, context: BodyContext) {
        let discriminant = self.check_expression(&switch.discriminant, context);
        let last_case = switch.cases.len().saturating_sub(1);

        for (index, case) in switch.cases.iter().enumerate() {
            let value = self.check_expression(&case.value, context);

            if !discriminant.erroneous && !value.erroneous && value.ty != discriminant.ty {
                self.report(
                    DiagnosticKind::CaseTypeMismatch,
                    case.span,
                    format!(
                        "case of type {} in a switch over {}",
                        value.ty, discriminant.ty
                    ),
                );
            }

            let has_successor = index < last_case || switch.default.is_some();
            let state = if has_successor { Some(true) } else { None };

            self.check_block(&case.body, context.in_switch(state));
        }

        if let Some(default) = &switch.default {
            self.check_block(default, context.in_switch(None));
        }
    }

    fn check_return(
        &mut self,
        value: Option<&Expression>,
        span: Span,
        context: BodyContext,
    ) {
        let Some(function) = context.function else {
            self.report(
                DiagnosticKind::ReturnOutsideFunction,
                span,
                "`return` outside of a function",
            );

            if let Some(value) = value {
                self.check_expression(value, context);
            }

            return;
        };

        let function = self.functions.get(function);
        let name = function.name;
        let expected = function.return_type().clone();

        match value {
            Some(value) => {
                let value = self.check_expression(value, context);

                if expected.is_void() {
                    self.report(
                        DiagnosticKind::TypeMismatch,
                        span,
                        format!("`{name}` returns void but a value is returned"),
                    );
                } else {
                    self.expect_type(&value, &expected, span, || {
                        format!("the return value of `{name}`")
                    });
                }
            }
            None if !expected.is_void() => self.report(
                DiagnosticKind::TypeMismatch,
                span,
                format!("`{name}` must return a value of type {expected}"),
            ),
            None => {}
        }
    }
}
