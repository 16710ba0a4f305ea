use colored::Colorize;

use crate::frontend::Span;

/// Category of a user facing semantic error
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display, strum::IntoStaticStr)]
#[strum(serialize_all = "kebab-case")]
pub enum DiagnosticKind {
    Redeclaration,
    Undeclared,
    TypeMismatch,
    UnknownType,
    DuplicateTypeDefinition,
    DuplicateFunction,
    UndeclaredFunction,
    NoMatchingOverload,
    NonBoolCondition,
    InvalidOperands,
    NonIntIndex,
    NonIntLength,
    NotAnArray,
    NotAClass,
    UnknownField,
    UnknownEnumValue,
    EmptyArrayLiteral,
    CaseTypeMismatch,
    MisplacedNext,
    NotALock,
    LockOutsideGlobalScope,
    MissingReturn,
    ReturnOutsideFunction,
    InvalidThreadFunction,
    InvalidVoid,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub kind: DiagnosticKind,
    pub message: String,
    pub span: Span,
}

impl Diagnostic {
    pub fn new(kind: DiagnosticKind, span: Span, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            span,
        }
    }

    /// Terminal rendering used by the command line driver
    pub fn render(&self) -> String {
        format!(
            "{}{} {} {}",
            "error".red(),
            format!("[{}]:", self.kind).red(),
            self.message,
            format!("({})", self.span).white()
        )
    }
}

impl core::fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.message, self.span)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_appends_the_position() {
        let diagnostic = Diagnostic::new(
            DiagnosticKind::Undeclared,
            Span::new(4, 12),
            "use of undeclared identifier `x`",
        );

        assert_eq!(
            diagnostic.to_string(),
            "use of undeclared identifier `x` (line 4:12)"
        );
        assert_eq!(
            strip_ansi_escapes::strip_str(diagnostic.render()),
            "error[undeclared]: use of undeclared identifier `x` (line 4:12)"
        );
    }
}
