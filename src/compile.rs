use thiserror::Error;

use crate::{
    backend::{CodegenError, CodegenOptions, codegen, program::ResolvedProgram},
    frontend::CompilationUnit,
    middle::{diagnostic::Diagnostic, type_check::TypeChecker},
};

#[derive(Debug, Error)]
pub enum CompileError {
    /// The program is ill typed. Nothing is generated.
    #[error("compilation failed with {} error(s)", .0.len())]
    Diagnostics(Vec<Diagnostic>),
    #[error("internal compiler error: {0}")]
    Internal(#[from] CodegenError),
}

/// Checks `unit` and generates its program.
#[tracing::instrument(level = "info", skip_all)]
pub fn compile(
    unit: &CompilationUnit,
    options: &CodegenOptions,
) -> Result<ResolvedProgram, CompileError> {
    let checked = TypeChecker::check(unit).map_err(CompileError::Diagnostics)?;
    let generated = codegen::generate(unit, &checked, options)?;
    let program = generated.program.resolve()?;

    tracing::info!(
        instructions = program.instructions.len(),
        cores = program.cores,
        "compiled"
    );

    Ok(program)
}
