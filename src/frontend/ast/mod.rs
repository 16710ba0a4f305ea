//! Abstract syntax tree handed to the checker by the external parser.
//!
//! Every node that the checker annotates carries a [`NodeId`]. Ids are not
//! part of the serialized form, they are minted whenever a node is built or
//! deserialized, so two nodes never share one.

use std::sync::atomic::{AtomicU32, Ordering};

use serde::{Deserialize, Serialize};

use super::{Span, intern::Symbol};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(u32);

static NEXT_NODE_ID: AtomicU32 = AtomicU32::new(0);

impl NodeId {
    pub fn fresh() -> Self {
        Self(NEXT_NODE_ID.fetch_add(1, Ordering::Relaxed))
    }
}

/// Source level type syntax, resolved to a `middle::ty::Type` by the checker
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TypeExpression {
    Int,
    Bool,
    Char,
    Void,
    Lock,
    Array(Box<TypeExpression>),
    /// An enum or class name
    Named(Symbol),
}

impl TypeExpression {
    pub fn array(element: TypeExpression) -> Self {
        Self::Array(Box::new(element))
    }

    pub fn named(name: &str) -> Self {
        Self::Named(Symbol::new(name))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnumDefinition {
    #[serde(skip, default = "NodeId::fresh")]
    pub id: NodeId,
    #[serde(default)]
    pub span: Span,
    pub name: Symbol,
    /// Members in declaration order, their ordinals start at 1
    pub values: Vec<Symbol>,
}

impl EnumDefinition {
    pub fn new(name: &str, values: &[&str]) -> Self {
        Self {
            id: NodeId::fresh(),
            span: Span::default(),
            name: Symbol::new(name),
            values: values.iter().map(|v| Symbol::new(v)).collect(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassDefinition {
    #[serde(skip, default = "NodeId::fresh")]
    pub id: NodeId,
    #[serde(default)]
    pub span: Span,
    pub name: Symbol,
    #[serde(default)]
    pub fields: Vec<Declaration>,
    #[serde(default)]
    pub methods: Vec<FunctionDefinition>,
    #[serde(default)]
    pub constructors: Vec<ConstructorDefinition>,
}

impl ClassDefinition {
    pub fn new(name: &str) -> Self {
        Self {
            id: NodeId::fresh(),
            span: Span::default(),
            name: Symbol::new(name),
            fields: Vec::new(),
            methods: Vec::new(),
            constructors: Vec::new(),
        }
    }

    pub fn with_field(mut self, field: Declaration) -> Self {
        self.fields.push(field);
        self
    }

    pub fn with_method(mut self, method: FunctionDefinition) -> Self {
        self.methods.push(method);
        self
    }

    pub fn with_constructor(mut self, constructor: ConstructorDefinition) -> Self {
        self.constructors.push(constructor);
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConstructorDefinition {
    #[serde(skip, default = "NodeId::fresh")]
    pub id: NodeId,
    #[serde(default)]
    pub span: Span,
    pub parameters: Vec<Parameter>,
    pub body: Block,
}

impl ConstructorDefinition {
    pub fn new(parameters: Vec<Parameter>, body: Block) -> Self {
        Self {
            id: NodeId::fresh(),
            span: Span::default(),
            parameters,
            body,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Parameter {
    #[serde(skip, default = "NodeId::fresh")]
    pub id: NodeId,
    #[serde(default)]
    pub span: Span,
    pub name: Symbol,
    pub ty: TypeExpression,
}

impl Parameter {
    pub fn new(ty: TypeExpression, name: &str) -> Self {
        Self {
            id: NodeId::fresh(),
            span: Span::default(),
            name: Symbol::new(name),
            ty,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FunctionDefinition {
    #[serde(skip, default = "NodeId::fresh")]
    pub id: NodeId,
    #[serde(default)]
    pub span: Span,
    pub name: Symbol,
    pub parameters: Vec<Parameter>,
    pub return_type: TypeExpression,
    /// Thread functions run on a core of their own once launched
    #[serde(default)]
    pub is_thread: bool,
    pub body: FunctionBody,
}

impl FunctionDefinition {
    pub fn new(
        name: &str,
        parameters: Vec<Parameter>,
        return_type: TypeExpression,
        body: FunctionBody,
    ) -> Self {
        Self {
            id: NodeId::fresh(),
            span: Span::default(),
            name: Symbol::new(name),
            parameters,
            return_type,
            is_thread: false,
            body,
        }
    }

    /// A `thread name() { .. }` definition
    pub fn thread(name: &str, body: Block) -> Self {
        Self {
            is_thread: true,
            ..Self::new(name, Vec::new(), TypeExpression::Void, FunctionBody::Block(body))
        }
    }

    pub fn at(mut self, line: u32, column: u32) -> Self {
        self.span = Span::new(line, column);
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum FunctionBody {
    Block(Block),
    /// `= expression;` shorthand, the expression is the return value
    Expression(Expression),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Block {
    #[serde(skip, default = "NodeId::fresh")]
    pub id: NodeId,
    #[serde(default)]
    pub span: Span,
    pub statements: Vec<Statement>,
}

impl Block {
    pub fn new(statements: Vec<Statement>) -> Self {
        Self {
            id: NodeId::fresh(),
            span: Span::default(),
            statements,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Declaration {
    #[serde(skip, default = "NodeId::fresh")]
    pub id: NodeId,
    #[serde(default)]
    pub span: Span,
    pub ty: TypeExpression,
    pub name: Symbol,
    #[serde(default)]
    pub initializer: Option<Expression>,
}

impl Declaration {
    pub fn new(ty: TypeExpression, name: &str, initializer: Option<Expression>) -> Self {
        Self {
            id: NodeId::fresh(),
            span: Span::default(),
            ty,
            name: Symbol::new(name),
            initializer,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Statement {
    #[serde(skip, default = "NodeId::fresh")]
    pub id: NodeId,
    #[serde(default)]
    pub span: Span,
    pub kind: StatementKind,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum StatementKind {
    Declaration(Declaration),
    Assignment {
        target: Target,
        value: Expression,
    },
    If {
        condition: Expression,
        then_block: Block,
        #[serde(default)]
        else_block: Option<Block>,
    },
    While {
        condition: Expression,
        body: Block,
    },
    /// `do { .. } while condition;`
    Do {
        body: Block,
        condition: Expression,
    },
    For {
        #[serde(default)]
        initializer: Option<Box<Statement>>,
        condition: Expression,
        #[serde(default)]
        step: Option<Box<Statement>>,
        body: Block,
    },
    Block(Block),
    Switch(SwitchStatement),
    /// Explicit fallthrough into the next case block of the enclosing switch
    Next,
    Return(Option<Expression>),
    Expression(Expression),
    Acquire(Expression),
    Release(Expression),
}

impl Statement {
    pub fn new(kind: StatementKind) -> Self {
        Self {
            id: NodeId::fresh(),
            span: Span::default(),
            kind,
        }
    }

    pub fn at(mut self, line: u32, column: u32) -> Self {
        self.span = Span::new(line, column);

        if let StatementKind::Declaration(declaration) = &mut self.kind {
            declaration.span = self.span;
        }

        self
    }

    pub fn declare(ty: TypeExpression, name: &str, initializer: Option<Expression>) -> Self {
        Self::new(StatementKind::Declaration(Declaration::new(
            ty,
            name,
            initializer,
        )))
    }

    pub fn assign(target: Target, value: Expression) -> Self {
        Self::new(StatementKind::Assignment { target, value })
    }

    pub fn if_else(condition: Expression, then_block: Block, else_block: Option<Block>) -> Self {
        Self::new(StatementKind::If {
            condition,
            then_block,
            else_block,
        })
    }

    pub fn while_loop(condition: Expression, body: Block) -> Self {
        Self::new(StatementKind::While { condition, body })
    }

    pub fn ret(value: Option<Expression>) -> Self {
        Self::new(StatementKind::Return(value))
    }

    pub fn expression(expression: Expression) -> Self {
        Self::new(StatementKind::Expression(expression))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SwitchStatement {
    pub discriminant: Expression,
    pub cases: Vec<SwitchCase>,
    #[serde(default)]
    pub default: Option<Block>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SwitchCase {
    #[serde(skip, default = "NodeId::fresh")]
    pub id: NodeId,
    #[serde(default)]
    pub span: Span,
    pub value: Expression,
    pub body: Block,
}

impl SwitchCase {
    pub fn new(value: Expression, body: Block) -> Self {
        Self {
            id: NodeId::fresh(),
            span: Span::default(),
            value,
            body,
        }
    }
}

/// Left hand side of an assignment
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Target {
    #[serde(skip, default = "NodeId::fresh")]
    pub id: NodeId,
    #[serde(default)]
    pub span: Span,
    pub kind: TargetKind,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum TargetKind {
    Identifier(Symbol),
    Index {
        array: Box<Expression>,
        index: Box<Expression>,
    },
    Field {
        object: Box<Expression>,
        field: Symbol,
    },
}

impl Target {
    pub fn new(kind: TargetKind) -> Self {
        Self {
            id: NodeId::fresh(),
            span: Span::default(),
            kind,
        }
    }

    pub fn identifier(name: &str) -> Self {
        Self::new(TargetKind::Identifier(Symbol::new(name)))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Expression {
    #[serde(skip, default = "NodeId::fresh")]
    pub id: NodeId,
    #[serde(default)]
    pub span: Span,
    pub kind: ExpressionKind,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ExpressionKind {
    Literal(Literal),
    Identifier(Symbol),
    /// `Enum.member`
    EnumValue {
        enumeration: Symbol,
        member: Symbol,
    },
    ArrayLiteral(Vec<Expression>),
    /// `new T[length]`
    NewArray {
        element: TypeExpression,
        length: Box<Expression>,
    },
    Index {
        array: Box<Expression>,
        index: Box<Expression>,
    },
    Field {
        object: Box<Expression>,
        field: Symbol,
    },
    Call {
        function: Symbol,
        arguments: Vec<Expression>,
    },
    MethodCall {
        receiver: Box<Expression>,
        method: Symbol,
        arguments: Vec<Expression>,
    },
    /// `new Class(arguments)`
    New {
        class: Symbol,
        arguments: Vec<Expression>,
    },
    Unary {
        operator: UnaryOperatorKind,
        operand: Box<Expression>,
    },
    Binary {
        operator: BinaryOperatorKind,
        left: Box<Expression>,
        right: Box<Expression>,
    },
}

impl Expression {
    pub fn new(kind: ExpressionKind) -> Self {
        Self {
            id: NodeId::fresh(),
            span: Span::default(),
            kind,
        }
    }

    pub fn at(mut self, line: u32, column: u32) -> Self {
        self.span = Span::new(line, column);
        self
    }

    /// Whether the expression names storage rather than computing a value
    pub fn is_place(&self) -> bool {
        matches!(
            self.kind,
            ExpressionKind::Identifier(_)
                | ExpressionKind::Index { .. }
                | ExpressionKind::Field { .. }
        )
    }

    pub fn int(value: i32) -> Self {
        Self::new(ExpressionKind::Literal(Literal::Int(value)))
    }

    pub fn bool(value: bool) -> Self {
        Self::new(ExpressionKind::Literal(Literal::Bool(value)))
    }

    pub fn char(value: char) -> Self {
        Self::new(ExpressionKind::Literal(Literal::Char(value)))
    }

    pub fn string(value: &str) -> Self {
        Self::new(ExpressionKind::Literal(Literal::String(value.to_owned())))
    }

    pub fn identifier(name: &str) -> Self {
        Self::new(ExpressionKind::Identifier(Symbol::new(name)))
    }

    pub fn binary(operator: BinaryOperatorKind, left: Expression, right: Expression) -> Self {
        Self::new(ExpressionKind::Binary {
            operator,
            left: Box::new(left),
            right: Box::new(right),
        })
    }

    pub fn call(function: &str, arguments: Vec<Expression>) -> Self {
        Self::new(ExpressionKind::Call {
            function: Symbol::new(function),
            arguments,
        })
    }

    pub fn index(array: Expression, index: Expression) -> Self {
        Self::new(ExpressionKind::Index {
            array: Box::new(array),
            index: Box::new(index),
        })
    }

    pub fn field(object: Expression, field: &str) -> Self {
        Self::new(ExpressionKind::Field {
            object: Box::new(object),
            field: Symbol::new(field),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Literal {
    Int(i32),
    Bool(bool),
    Char(char),
    String(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BinaryOperatorKind {
    Add,                  // +
    Subtract,             // -
    Multiply,             // *
    Divide,               // /
    Modulus,              // %
    Equals,               // ==
    NotEquals,            // !=
    LessThan,             // <
    LessThanOrEqualTo,    // <=
    GreaterThan,          // >
    GreaterThanOrEqualTo, // >=
    And,                  // and
    Or,                   // or
    Xor,                  // xor
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOperatorClass {
    /// int, int -> int
    Arithmetic,
    /// int or char operands of the same type -> bool
    Ordering,
    /// any two operands of the same type -> bool
    Equality,
    /// bool, bool -> bool
    Logical,
}

impl BinaryOperatorKind {
    pub fn class(self) -> BinaryOperatorClass {
        match self {
            Self::Add | Self::Subtract | Self::Multiply | Self::Divide | Self::Modulus => {
                BinaryOperatorClass::Arithmetic
            }
            Self::LessThan
            | Self::LessThanOrEqualTo
            | Self::GreaterThan
            | Self::GreaterThanOrEqualTo => BinaryOperatorClass::Ordering,
            Self::Equals | Self::NotEquals => BinaryOperatorClass::Equality,
            Self::And | Self::Or | Self::Xor => BinaryOperatorClass::Logical,
        }
    }
}

impl core::fmt::Display for BinaryOperatorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Add => "+",
            Self::Subtract => "-",
            Self::Multiply => "*",
            Self::Divide => "/",
            Self::Modulus => "%",
            Self::Equals => "==",
            Self::NotEquals => "!=",
            Self::LessThan => "<",
            Self::LessThanOrEqualTo => "<=",
            Self::GreaterThan => ">",
            Self::GreaterThanOrEqualTo => ">=",
            Self::And => "and",
            Self::Or => "or",
            Self::Xor => "xor",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UnaryOperatorKind {
    Not,    // !
    Negate, // -
}

impl core::fmt::Display for UnaryOperatorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Not => write!(f, "!"),
            Self::Negate => write!(f, "-"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deserialized_nodes_get_distinct_ids() {
        let json = r#"{
            "kind": { "Binary": {
                "operator": "Add",
                "left": { "kind": { "Literal": { "Int": 1 } } },
                "right": { "kind": { "Identifier": "x" }, "span": { "line": 3, "column": 9 } }
            } }
        }"#;

        let expression: Expression = serde_json::from_str(json).unwrap();
        let ExpressionKind::Binary { left, right, .. } = &expression.kind else {
            panic!("expected a binary expression, got {expression:?}");
        };

        assert_ne!(left.id, right.id);
        assert_ne!(expression.id, left.id);
        assert_eq!(right.span, Span::new(3, 9));
        assert!(matches!(right.kind, ExpressionKind::Identifier(name) if name.value() == "x"));
    }
}
