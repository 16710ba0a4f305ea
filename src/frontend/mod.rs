//! Input side of the compiler: the syntax tree produced by the external
//! parser and the compilation unit that bundles it.

use serde::{Deserialize, Serialize};

use self::ast::{ClassDefinition, EnumDefinition, FunctionDefinition, Statement};

pub mod ast;
pub mod intern;

/// Source position of a node, 1 based. The default span (`0:0`) marks nodes
/// that were built by hand rather than parsed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Span {
    pub line: u32,
    pub column: u32,
}

impl Span {
    pub fn new(line: u32, column: u32) -> Self {
        Self { line, column }
    }
}

impl core::fmt::Display for Span {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "line {}:{}", self.line, self.column)
    }
}

/// One aggregate program: the main source merged with every (deduplicated)
/// import. Order inside each list is source order.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CompilationUnit {
    #[serde(default)]
    pub enums: Vec<EnumDefinition>,
    #[serde(default)]
    pub classes: Vec<ClassDefinition>,
    #[serde(default)]
    pub functions: Vec<FunctionDefinition>,
    /// Free top level statements, run by the main core
    #[serde(default)]
    pub statements: Vec<Statement>,
}

impl CompilationUnit {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }

    /// Appends the definitions and statements of an imported unit.
    pub fn merge(&mut self, other: CompilationUnit) {
        self.enums.extend(other.enums);
        self.classes.extend(other.classes);
        self.functions.extend(other.functions);
        self.statements.extend(other.statements);
    }

    pub fn with_enum(mut self, definition: EnumDefinition) -> Self {
        self.enums.push(definition);
        self
    }

    pub fn with_class(mut self, definition: ClassDefinition) -> Self {
        self.classes.push(definition);
        self
    }

    pub fn with_function(mut self, definition: FunctionDefinition) -> Self {
        self.functions.push(definition);
        self
    }

    pub fn with_statement(mut self, statement: Statement) -> Self {
        self.statements.push(statement);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merge_keeps_source_order() {
        let mut main = CompilationUnit::from_json(
            r#"{ "statements": [ { "kind": { "Expression": { "kind": { "Identifier": "a" } } } } ] }"#,
        )
        .unwrap();
        let import = CompilationUnit::from_json(
            r#"{
                "enums": [ { "name": "Color", "values": ["Red", "Green"] } ],
                "statements": [ { "kind": "Next" } ]
            }"#,
        )
        .unwrap();

        main.merge(import);

        assert_eq!(main.enums.len(), 1);
        assert_eq!(main.enums[0].values.len(), 2);
        assert_eq!(main.statements.len(), 2);
        assert!(matches!(main.statements[1].kind, ast::StatementKind::Next));
    }
}
