use pretty_assertions::assert_eq;

use super::{CheckedProgram, TypeChecker};
use crate::{
    frontend::{
        CompilationUnit,
        ast::{
            BinaryOperatorKind, Block, ClassDefinition, ConstructorDefinition, Declaration,
            EnumDefinition, Expression, ExpressionKind, FunctionBody, FunctionDefinition,
            Parameter, Statement, StatementKind, SwitchCase, SwitchStatement, Target, TargetKind,
            TypeExpression,
        },
        intern::Symbol,
    },
    middle::diagnostic::{Diagnostic, DiagnosticKind},
};

fn check(unit: &CompilationUnit) -> Vec<Diagnostic> {
    TypeChecker::check(unit).err().unwrap_or_default()
}

fn kinds(unit: &CompilationUnit) -> Vec<DiagnosticKind> {
    check(unit).into_iter().map(|d| d.kind).collect()
}

fn checked(unit: &CompilationUnit) -> CheckedProgram {
    match TypeChecker::check(unit) {
        Ok(program) => program,
        Err(diagnostics) => panic!("unexpected diagnostics: {diagnostics:#?}"),
    }
}

fn block(statements: Vec<Statement>) -> Block {
    Block::new(statements)
}

fn int(value: i32) -> Expression {
    Expression::int(value)
}

fn ident(name: &str) -> Expression {
    Expression::identifier(name)
}

fn function(
    name: &str,
    parameters: Vec<Parameter>,
    return_type: TypeExpression,
    statements: Vec<Statement>,
) -> FunctionDefinition {
    FunctionDefinition::new(
        name,
        parameters,
        return_type,
        FunctionBody::Block(block(statements)),
    )
}

fn switch(discriminant: Expression, cases: Vec<SwitchCase>, default: Option<Block>) -> Statement {
    Statement::new(StatementKind::Switch(SwitchStatement {
        discriminant,
        cases,
        default,
    }))
}

#[test]
fn redeclaration_in_one_scope_but_shadowing_is_allowed() {
    let unit = CompilationUnit::new()
        .with_statement(Statement::declare(TypeExpression::Int, "x", None))
        .with_statement(Statement::declare(TypeExpression::Bool, "x", None).at(2, 1))
        .with_statement(Statement::new(StatementKind::Block(block(vec![
            Statement::declare(TypeExpression::Int, "x", None),
        ]))));

    let diagnostics = check(&unit);

    assert_eq!(diagnostics.len(), 1);
    assert_eq!(diagnostics[0].kind, DiagnosticKind::Redeclaration);
    assert_eq!(
        diagnostics[0].to_string(),
        "`x` is already declared in this scope (line 2:1)"
    );
}

#[test]
fn undeclared_use_is_reported_once() {
    let unit = CompilationUnit::new()
        .with_statement(Statement::declare(
            TypeExpression::Int,
            "y",
            Some(Expression::binary(
                BinaryOperatorKind::Add,
                ident("x").at(1, 9),
                int(1),
            )),
        ))
        .with_statement(Statement::if_else(ident("z"), block(vec![]), None));

    let diagnostics = check(&unit);

    assert_eq!(
        diagnostics.iter().map(|d| d.kind).collect::<Vec<_>>(),
        vec![DiagnosticKind::Undeclared, DiagnosticKind::Undeclared]
    );
    assert_eq!(
        diagnostics[0].to_string(),
        "use of undeclared identifier `x` (line 1:9)"
    );
}

fn overloaded_f() -> CompilationUnit {
    let f = |parameters: Vec<Parameter>| {
        FunctionDefinition::new(
            "f",
            parameters,
            TypeExpression::Int,
            FunctionBody::Expression(int(0)),
        )
    };

    CompilationUnit::new()
        .with_function(f(vec![Parameter::new(TypeExpression::Int, "a")]))
        .with_function(f(vec![
            Parameter::new(TypeExpression::Int, "a"),
            Parameter::new(TypeExpression::Bool, "b"),
        ]))
}

#[test]
fn overloads_resolve_by_exact_argument_types() {
    let call = Expression::call("f", vec![int(1), Expression::bool(true)]);
    let call_id = call.id;
    let program = checked(&overloaded_f().with_statement(Statement::expression(call)));

    let bound = program.functions.lookup(call_id).unwrap();
    assert_eq!(program.functions.get(bound).signature.arguments.len(), 2);

    let unit = overloaded_f().with_statement(Statement::expression(Expression::call(
        "f",
        vec![int(1), int(2)],
    )));
    assert_eq!(kinds(&unit), vec![DiagnosticKind::NoMatchingOverload]);

    let unit = CompilationUnit::new()
        .with_statement(Statement::expression(Expression::call("missing", vec![])));
    assert_eq!(kinds(&unit), vec![DiagnosticKind::UndeclaredFunction]);
}

#[test]
fn duplicate_overloads_are_rejected() {
    let unit = overloaded_f().with_function(FunctionDefinition::new(
        "f",
        vec![Parameter::new(TypeExpression::Int, "other")],
        TypeExpression::Bool,
        FunctionBody::Expression(Expression::bool(true)),
    ));

    assert_eq!(kinds(&unit), vec![DiagnosticKind::DuplicateFunction]);
}

#[test]
fn every_path_of_a_non_void_function_must_return() {
    let returns_one = || block(vec![Statement::ret(Some(int(1)))]);
    let parameter = || vec![Parameter::new(TypeExpression::Bool, "b")];

    let unit = CompilationUnit::new().with_function(function(
        "f",
        parameter(),
        TypeExpression::Int,
        vec![Statement::if_else(ident("b"), returns_one(), None)],
    ));
    assert_eq!(kinds(&unit), vec![DiagnosticKind::MissingReturn]);

    let unit = CompilationUnit::new().with_function(function(
        "f",
        parameter(),
        TypeExpression::Int,
        vec![Statement::if_else(
            ident("b"),
            returns_one(),
            Some(returns_one()),
        )],
    ));
    assert_eq!(kinds(&unit), vec![]);

    let unit = CompilationUnit::new().with_function(function(
        "f",
        parameter(),
        TypeExpression::Int,
        vec![Statement::while_loop(ident("b"), returns_one())],
    ));
    assert_eq!(kinds(&unit), vec![DiagnosticKind::MissingReturn]);
}

#[test]
fn switch_returns_when_every_block_does() {
    let unit = CompilationUnit::new().with_function(function(
        "f",
        vec![Parameter::new(TypeExpression::Int, "x")],
        TypeExpression::Int,
        vec![switch(
            ident("x"),
            vec![
                SwitchCase::new(int(1), block(vec![Statement::new(StatementKind::Next)])),
                SwitchCase::new(int(2), block(vec![Statement::ret(Some(int(2)))])),
            ],
            Some(block(vec![Statement::ret(Some(int(0)))])),
        )],
    ));

    assert_eq!(kinds(&unit), vec![]);
}

#[test]
fn case_types_must_match_the_discriminant() {
    let unit = CompilationUnit::new()
        .with_statement(Statement::declare(TypeExpression::Int, "x", Some(int(3))))
        .with_statement(switch(
            ident("x"),
            vec![
                SwitchCase::new(int(5), block(vec![])),
                SwitchCase::new(Expression::bool(true), block(vec![])),
            ],
            None,
        ));

    assert_eq!(kinds(&unit), vec![DiagnosticKind::CaseTypeMismatch]);
}

#[test]
fn next_is_only_allowed_before_another_block() {
    let next = || Statement::new(StatementKind::Next);
    let unit = CompilationUnit::new()
        .with_statement(Statement::declare(TypeExpression::Int, "x", Some(int(3))))
        .with_statement(next())
        .with_statement(switch(
            ident("x"),
            vec![
                SwitchCase::new(int(1), block(vec![next()])),
                SwitchCase::new(int(2), block(vec![next()])),
            ],
            None,
        ))
        .with_statement(switch(
            ident("x"),
            vec![SwitchCase::new(int(1), block(vec![next()]))],
            Some(block(vec![next()])),
        ));

    let diagnostics = check(&unit);

    assert_eq!(
        diagnostics.iter().map(|d| d.kind).collect::<Vec<_>>(),
        vec![DiagnosticKind::MisplacedNext; 3]
    );
    assert!(diagnostics[0].message.contains("outside of a switch"));
    assert!(diagnostics[1].message.contains("last block"));
}

#[test]
fn frame_holds_parameters_then_locals() {
    let definition = function(
        "g",
        vec![
            Parameter::new(TypeExpression::Int, "a"),
            Parameter::new(TypeExpression::Bool, "b"),
        ],
        TypeExpression::Void,
        vec![
            Statement::declare(TypeExpression::Int, "x", None),
            Statement::declare(TypeExpression::Bool, "y", None),
            Statement::declare(TypeExpression::Char, "z", None),
        ],
    );
    let id = definition.id;
    let program = checked(&CompilationUnit::new().with_function(definition));

    let function = program.functions.lookup(id).unwrap();
    let scope = program.functions.get(function).scope.unwrap();

    assert_eq!(program.scopes.frame_size(scope), 5);
    assert_eq!(program.scopes.offset_of(scope, Symbol::new("b")), Some(1));
    assert_eq!(program.scopes.offset_of(scope, Symbol::new("x")), Some(2));
}

#[test]
fn globals_and_locals_resolve_to_different_segments() {
    let global = Declaration::new(TypeExpression::Int, "counter", None);
    let local = Declaration::new(TypeExpression::Int, "counter", None);
    let (global_id, local_id) = (global.id, local.id);

    let unit = CompilationUnit::new()
        .with_statement(Statement::new(StatementKind::Declaration(global)))
        .with_function(function(
            "f",
            vec![],
            TypeExpression::Void,
            vec![Statement::new(StatementKind::Declaration(local))],
        ));
    let program = checked(&unit);

    let global_scope = program.annotations.scope_of(global_id).unwrap();
    let local_scope = program.annotations.scope_of(local_id).unwrap();

    assert!(program.scopes.is_global(global_scope));
    assert!(!program.scopes.is_global(local_scope));
}

#[test]
fn declaration_and_assignment_are_annotated() {
    let declaration = Declaration::new(TypeExpression::Int, "i", Some(int(0)));
    let target = Target::identifier("i");
    let (declaration_id, target_id) = (declaration.id, target.id);

    let unit = CompilationUnit::new()
        .with_statement(Statement::new(StatementKind::Declaration(declaration)))
        .with_statement(Statement::assign(target, int(7)));
    let program = checked(&unit);

    assert_eq!(
        program.annotations.type_of(declaration_id),
        Some(&crate::middle::ty::Type::Int)
    );
    assert_eq!(
        program.annotations.type_of(target_id),
        Some(&crate::middle::ty::Type::Int)
    );
    assert_eq!(
        program.annotations.scope_of(declaration_id),
        program.annotations.scope_of(target_id)
    );
}

#[test]
fn mismatched_operands_are_reported_without_cascading() {
    let unit = CompilationUnit::new()
        .with_statement(Statement::declare(
            TypeExpression::Int,
            "a",
            Some(Expression::binary(
                BinaryOperatorKind::Add,
                int(1),
                Expression::bool(true),
            )),
        ))
        .with_statement(Statement::declare(
            TypeExpression::Bool,
            "b",
            Some(Expression::binary(
                BinaryOperatorKind::LessThan,
                Expression::char('a'),
                Expression::char('b'),
            )),
        ))
        .with_statement(Statement::declare(TypeExpression::Int, "c", Some(Expression::bool(false))))
        .with_statement(Statement::while_loop(int(1), block(vec![])));

    assert_eq!(
        kinds(&unit),
        vec![
            DiagnosticKind::InvalidOperands,
            DiagnosticKind::TypeMismatch,
            DiagnosticKind::NonBoolCondition,
        ]
    );
}

#[test]
fn locks_live_in_the_global_scope() {
    let unit = CompilationUnit::new()
        .with_statement(Statement::declare(TypeExpression::Lock, "l", None))
        .with_statement(Statement::declare(TypeExpression::Int, "n", None))
        .with_statement(Statement::new(StatementKind::Acquire(ident("l"))))
        .with_statement(Statement::new(StatementKind::Release(ident("l"))))
        .with_statement(Statement::new(StatementKind::Acquire(ident("n"))))
        .with_function(function(
            "f",
            vec![],
            TypeExpression::Void,
            vec![Statement::declare(TypeExpression::Lock, "inner", None)],
        ));

    assert_eq!(
        kinds(&unit),
        vec![
            DiagnosticKind::NotALock,
            DiagnosticKind::LockOutsideGlobalScope,
        ]
    );
}

#[test]
fn locks_are_not_passed_or_returned() {
    let unit = CompilationUnit::new()
        .with_statement(Statement::declare(TypeExpression::Lock, "g", None))
        .with_function(function(
            "take",
            vec![Parameter::new(TypeExpression::Lock, "l")],
            TypeExpression::Void,
            vec![Statement::new(StatementKind::Acquire(ident("l")))],
        ))
        .with_function(FunctionDefinition::new(
            "get",
            vec![],
            TypeExpression::Lock,
            FunctionBody::Expression(ident("g")),
        ));

    assert_eq!(
        kinds(&unit),
        vec![
            DiagnosticKind::LockOutsideGlobalScope,
            DiagnosticKind::LockOutsideGlobalScope,
        ]
    );
}

#[test]
fn lock_operations_need_a_named_lock() {
    let unit = CompilationUnit::new()
        .with_statement(Statement::declare(TypeExpression::Lock, "g", None))
        .with_statement(Statement::declare(
            TypeExpression::array(TypeExpression::Lock),
            "locks",
            Some(Expression::new(ExpressionKind::NewArray {
                element: TypeExpression::Lock,
                length: Box::new(int(2)),
            })),
        ))
        .with_statement(Statement::new(StatementKind::Acquire(Expression::index(
            ident("locks"),
            int(1),
        ))))
        .with_statement(Statement::new(StatementKind::Release(Expression::index(
            ident("locks"),
            int(1),
        ))))
        .with_statement(Statement::new(StatementKind::Acquire(
            Expression::call("get", vec![]).at(3, 9),
        )))
        .with_function(FunctionDefinition::new(
            "get",
            vec![],
            TypeExpression::Lock,
            FunctionBody::Expression(ident("g")),
        ));

    let diagnostics = check(&unit);

    // the return type is reported while declaring, the operand while checking
    // the main program
    assert_eq!(
        diagnostics.iter().map(|d| d.kind).collect::<Vec<_>>(),
        vec![
            DiagnosticKind::LockOutsideGlobalScope,
            DiagnosticKind::NotALock,
        ]
    );
    assert_eq!(
        diagnostics[1].to_string(),
        "cannot acquire a computed lock (line 3:9)"
    );
}

#[test]
fn thread_functions_take_no_arguments_and_are_not_methods() {
    let mut with_argument = function(
        "worker",
        vec![Parameter::new(TypeExpression::Int, "n")],
        TypeExpression::Void,
        vec![],
    );
    with_argument.is_thread = true;

    let unit = CompilationUnit::new()
        .with_function(with_argument)
        .with_function(FunctionDefinition::thread("fine", block(vec![])))
        .with_class(
            ClassDefinition::new("Job")
                .with_method(FunctionDefinition::thread("run", block(vec![]))),
        );

    assert_eq!(
        kinds(&unit),
        vec![
            DiagnosticKind::InvalidThreadFunction,
            DiagnosticKind::InvalidThreadFunction,
        ]
    );
}

fn point_class() -> ClassDefinition {
    let sum = FunctionDefinition::new(
        "sum",
        vec![],
        TypeExpression::Int,
        FunctionBody::Expression(Expression::binary(
            BinaryOperatorKind::Add,
            Expression::field(ident("this"), "x"),
            ident("y"),
        )),
    );
    let constructor = ConstructorDefinition::new(
        vec![Parameter::new(TypeExpression::Int, "a")],
        block(vec![Statement::assign(Target::identifier("x"), ident("a"))]),
    );

    ClassDefinition::new("Point")
        .with_field(Declaration::new(TypeExpression::Int, "x", None))
        .with_field(Declaration::new(TypeExpression::Int, "y", Some(int(5))))
        .with_method(sum)
        .with_constructor(constructor)
}

fn new_point(arguments: Vec<Expression>) -> Expression {
    Expression::new(ExpressionKind::New {
        class: Symbol::new("Point"),
        arguments,
    })
}

#[test]
fn classes_methods_and_constructors() {
    let point = || TypeExpression::named("Point");
    let call_sum = Expression::new(ExpressionKind::MethodCall {
        receiver: Box::new(ident("p")),
        method: Symbol::new("sum"),
        arguments: vec![],
    });

    let unit = CompilationUnit::new()
        .with_class(point_class())
        .with_statement(Statement::declare(point(), "p", Some(new_point(vec![int(3)]))))
        .with_statement(Statement::declare(point(), "q", Some(new_point(vec![]))))
        .with_statement(Statement::declare(TypeExpression::Int, "s", Some(call_sum)))
        .with_statement(Statement::assign(
            Target::new(TargetKind::Field {
                object: Box::new(ident("p")),
                field: Symbol::new("y"),
            }),
            int(2),
        ));

    assert_eq!(kinds(&unit), vec![]);
}

#[test]
fn class_misuse_is_reported() {
    let unit = CompilationUnit::new()
        .with_class(point_class())
        .with_class(ClassDefinition::new("Point"))
        .with_statement(Statement::declare(
            TypeExpression::named("Point"),
            "p",
            Some(new_point(vec![Expression::bool(true)])),
        ))
        .with_statement(Statement::declare(TypeExpression::Int, "n", Some(int(1))))
        .with_statement(Statement::expression(Expression::field(ident("p"), "z")))
        .with_statement(Statement::expression(Expression::field(ident("n"), "x")))
        .with_statement(Statement::declare(TypeExpression::named("Shape"), "s", None));

    assert_eq!(
        kinds(&unit),
        vec![
            DiagnosticKind::DuplicateTypeDefinition,
            DiagnosticKind::NoMatchingOverload,
            DiagnosticKind::UnknownField,
            DiagnosticKind::NotAClass,
            DiagnosticKind::UnknownType,
        ]
    );
}

#[test]
fn enum_values_and_unknown_members() {
    let value = |member: &str| {
        Expression::new(ExpressionKind::EnumValue {
            enumeration: Symbol::new("Color"),
            member: Symbol::new(member),
        })
    };

    let unit = CompilationUnit::new()
        .with_enum(EnumDefinition::new("Color", &["Red", "Green"]))
        .with_statement(Statement::declare(
            TypeExpression::named("Color"),
            "c",
            Some(value("Red")),
        ))
        .with_statement(Statement::declare(
            TypeExpression::named("Color"),
            "d",
            Some(value("Purple")),
        ))
        .with_statement(Statement::declare(
            TypeExpression::Bool,
            "same",
            Some(Expression::binary(
                BinaryOperatorKind::Equals,
                ident("c"),
                value("Green"),
            )),
        ));

    assert_eq!(kinds(&unit), vec![DiagnosticKind::UnknownEnumValue]);
}

#[test]
fn array_typing() {
    let int_array = || TypeExpression::array(TypeExpression::Int);
    let literal = |elements| Expression::new(ExpressionKind::ArrayLiteral(elements));
    let new_array = |length| {
        Expression::new(ExpressionKind::NewArray {
            element: TypeExpression::Int,
            length: Box::new(length),
        })
    };

    let unit = CompilationUnit::new()
        .with_statement(Statement::declare(
            int_array(),
            "a",
            Some(literal(vec![int(1), int(2), int(3)])),
        ))
        .with_statement(Statement::declare(int_array(), "b", Some(new_array(int(4)))))
        .with_statement(Statement::declare(
            TypeExpression::array(TypeExpression::Char),
            "s",
            Some(Expression::string("hi")),
        ))
        .with_statement(Statement::assign(
            Target::new(TargetKind::Index {
                array: Box::new(ident("a")),
                index: Box::new(int(0)),
            }),
            Expression::index(ident("b"), int(1)),
        ));
    assert_eq!(kinds(&unit), vec![]);

    let unit = CompilationUnit::new()
        .with_statement(Statement::declare(int_array(), "a", Some(literal(vec![]))))
        .with_statement(Statement::declare(
            int_array(),
            "b",
            Some(literal(vec![int(1), Expression::bool(true)])),
        ))
        .with_statement(Statement::declare(
            int_array(),
            "c",
            Some(new_array(Expression::bool(true))),
        ))
        .with_statement(Statement::expression(Expression::index(
            ident("c"),
            Expression::char('x'),
        )))
        .with_statement(Statement::expression(Expression::index(int(1), int(0))));

    assert_eq!(
        kinds(&unit),
        vec![
            DiagnosticKind::EmptyArrayLiteral,
            DiagnosticKind::TypeMismatch,
            DiagnosticKind::NonIntLength,
            DiagnosticKind::NonIntIndex,
            DiagnosticKind::NotAnArray,
        ]
    );
}

#[test]
fn return_statements_are_checked_against_the_function() {
    let unit = CompilationUnit::new()
        .with_statement(Statement::ret(None))
        .with_function(function(
            "f",
            vec![],
            TypeExpression::Void,
            vec![Statement::ret(Some(int(1)))],
        ))
        .with_function(function(
            "g",
            vec![],
            TypeExpression::Int,
            vec![Statement::ret(Some(Expression::bool(false)))],
        ));

    assert_eq!(
        kinds(&unit),
        vec![
            DiagnosticKind::ReturnOutsideFunction,
            DiagnosticKind::TypeMismatch,
            DiagnosticKind::TypeMismatch,
        ]
    );
}
