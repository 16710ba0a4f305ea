use std::collections::VecDeque;

use crate::backend::{CodegenError, CodegenResult, isa::Register};

/// Registers handed out to expression evaluation. `regF` holds the
/// activation record pointer and is never part of the pool.
pub const GENERAL_PURPOSE: [Register; 5] = [
    Register::A,
    Register::B,
    Register::C,
    Register::D,
    Register::E,
];

/// Free list allocator over [`GENERAL_PURPOSE`]. Registers in use are
/// remembered in allocation order so calls can save and restore them.
#[derive(Debug)]
pub struct RegisterAllocator {
    free: VecDeque<Register>,
    in_use: Vec<Register>,
}

impl Default for RegisterAllocator {
    fn default() -> Self {
        Self::new()
    }
}

impl RegisterAllocator {
    pub fn new() -> Self {
        Self {
            free: VecDeque::from(GENERAL_PURPOSE),
            in_use: Vec::new(),
        }
    }

    pub fn allocate(&mut self) -> CodegenResult<Register> {
        let register = self
            .free
            .pop_front()
            .ok_or(CodegenError::RegistersExhausted)?;

        tracing::trace!(%register, in_use = self.in_use.len() + 1, "allocated register");

        self.in_use.push(register);
        Ok(register)
    }

    pub fn free(&mut self, register: Register) -> CodegenResult<()> {
        let Some(index) = self.in_use.iter().position(|r| *r == register) else {
            return Err(CodegenError::DoubleFree(register));
        };

        tracing::trace!(%register, "freed register");

        self.in_use.remove(index);
        self.free.push_back(register);
        Ok(())
    }

    /// Registers currently allocated, oldest first
    pub fn in_use(&self) -> &[Register] {
        &self.in_use
    }

    pub fn all_free(&self) -> bool {
        self.in_use.is_empty()
    }
}
