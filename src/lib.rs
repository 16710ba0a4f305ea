//! Compiler for awesome lang targeting the Sprockell multi-core machine.
//!
//! The pipeline takes a parsed [`CompilationUnit`](frontend::CompilationUnit),
//! checks it with [`TypeChecker`](middle::type_check::TypeChecker) and lowers
//! it to a [`ResolvedProgram`](backend::program::ResolvedProgram) through
//! [`generate`](backend::codegen::generate). [`compile`] runs all of it.

pub mod backend;
pub mod compile;
pub mod frontend;
pub mod index;
pub mod middle;

pub use compile::{CompileError, compile};
