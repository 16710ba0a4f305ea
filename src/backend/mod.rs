//! Sprockell backend: instruction model, code generation and listings.

use thiserror::Error;

use self::isa::{OpCode, Register};

pub mod codegen;
pub mod isa;
pub mod pretty_print;
pub mod program;

#[derive(Debug, Clone)]
pub struct CodegenOptions {
    /// Size of the machine's shared memory. The static region (heap
    /// bookkeeping, thread flags and globals) is placed at its top.
    pub shared_memory_size: u32,
    /// Attach descriptive comments to generated instructions
    pub emit_comments: bool,
}

impl Default for CodegenOptions {
    fn default() -> Self {
        Self {
            shared_memory_size: 256,
            emit_comments: true,
        }
    }
}

/// Internal failures of the generator. A program that passed the checker
/// only hits these when it exceeds a machine limit.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CodegenError {
    #[error("expression needs more registers than the machine has")]
    RegistersExhausted,
    #[error("register {0} was freed twice")]
    DoubleFree(Register),
    #[error("label `{name}` is already bound")]
    LabelRebound { name: String },
    #[error("label `{name}` was never bound")]
    UnresolvedLabel { name: String },
    #[error("{opcode} takes operands ({expected}) but was given ({found})")]
    OperandMismatch {
        opcode: OpCode,
        expected: String,
        found: String,
    },
    #[error("static data needs {required} words of shared memory but only {available} exist")]
    SharedMemoryExhausted { required: u32, available: u32 },
    #[error("checker left no {0} annotation for a node the generator needs")]
    MissingAnnotation(&'static str),
    #[error("{0} has no shared memory address")]
    NotAddressable(&'static str),
    #[error("`next` outside of a switch case")]
    NextOutsideSwitch,
}

pub type CodegenResult<T> = Result<T, CodegenError>;
