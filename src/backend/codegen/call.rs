//! Calling convention
//!
//! A frame of `n` slots occupies `ARP + 1 ..= ARP + n` and sits directly on
//! top of the saved ARP, the return address and the return value slot:
//!
//! ```text
//!   ARP + n    last local
//!   ...
//!   ARP + 1    first argument
//!   ARP        saved ARP of the caller
//!   ARP - 1    return address
//!   ARP - 2    return value
//!   ...        registers saved by the caller
//! ```
//!
//! The caller builds the whole record and saves its live registers below it.
//! It points ARP at the new record right before jumping to the entry, so the
//! callee starts with its frame in place, and restores ARP and SP after the
//! callee returns. The callee only writes its return value and jumps back.

use super::{Generator, statement::Context};
use crate::{
    backend::{
        CodegenError, CodegenResult,
        isa::{Address, OpCode, Operator, Register, Target},
        program::{InstructionId, LabelId},
    },
    frontend::{ast::Expression, intern::Symbol},
    middle::function_table::FunctionId,
};

/// Frame of the allocation routine: the requested size
const ALLOC_FRAME_SIZE: u32 = 1;

/// Frame of a field initializer routine: the new object
const INITIALIZER_FRAME_SIZE: u32 = 1;

/// A value passed to a call
pub(super) enum Argument<'e> {
    Expression(&'e Expression),
    /// Register that stays live in the caller after the call, such as the
    /// object being constructed
    Shared(Register),
    /// Register the call consumes
    Temporary(Register),
}

impl Generator<'_> {
    pub(super) fn gen_function_call(
        &mut self,
        function: FunctionId,
        arguments: Vec<Argument<'_>>,
        context: Context,
    ) -> CodegenResult<Register> {
        let scope = self.frame_scope(function)?;
        let frame_size = self.checked.scopes.frame_size(scope);
        let entry = self.entries[&function];

        let first = self.program.next_instruction();
        let result = self.gen_call(entry, frame_size, arguments, context)?;

        let name = self.label_name(function);
        self.comment(first, || format!("call {name}"));

        Ok(result)
    }

    /// Requests `size` words of heap, consuming the size register. The
    /// returned register holds the base address.
    pub(super) fn gen_alloc(&mut self, size: Register) -> CodegenResult<Register> {
        self.gen_call(
            self.alloc_entry,
            ALLOC_FRAME_SIZE,
            vec![Argument::Temporary(size)],
            Context::default(),
        )
    }

    /// Runs the field initializer routine at `entry` on `object`, which stays
    /// live.
    pub(super) fn gen_initialize(&mut self, entry: LabelId, object: Register) -> CodegenResult<()> {
        let result = self.gen_call(
            entry,
            INITIALIZER_FRAME_SIZE,
            vec![Argument::Shared(object)],
            Context::default(),
        )?;

        self.registers.free(result)
    }

    fn gen_call(
        &mut self,
        entry: LabelId,
        frame_size: u32,
        arguments: Vec<Argument<'_>>,
        context: Context,
    ) -> CodegenResult<Register> {
        debug_assert!(arguments.len() as u32 <= frame_size);

        for _ in arguments.len() as u32..frame_size {
            self.push(Register::Zero)?;
        }

        // the first argument ends up at the lowest address, ARP + 1
        for argument in arguments.into_iter().rev() {
            match argument {
                Argument::Expression(expression) => {
                    let register = self.gen_expression(expression, context)?;
                    self.push(register)?;
                    self.registers.free(register)?;
                }
                Argument::Temporary(register) => {
                    self.push(register)?;
                    self.registers.free(register)?;
                }
                Argument::Shared(register) => {
                    self.push(register)?;
                }
            }
        }

        let return_label = self.program.create_label("return");

        // ARP is saved, from here on it serves as scratch
        self.push(Register::ARP)?;
        self.constant_label(return_label, Register::ARP)?;
        self.push(Register::ARP)?;
        self.push(Register::Zero)?;

        let saved = self.registers.in_use().to_vec();
        for register in &saved {
            self.push(*register)?;
        }

        self.constant(saved.len() as i32 + 2, Register::ARP)?;
        self.compute(Operator::Add, Register::SP, Register::ARP, Register::ARP)?;
        self.jump(Target::Label(entry))?;
        self.anchor(return_label)?;

        for register in saved.iter().rev() {
            self.pop(*register)?;
        }

        // ARP still points at the callee's record
        let result = self.registers.allocate()?;
        self.constant(frame_size as i32 + 1, result)?;
        self.compute(Operator::Add, Register::ARP, result, Register::SP)?;
        self.constant(2, result)?;
        self.compute(Operator::Sub, Register::ARP, result, result)?;
        self.load(Address::Indirect(result), result)?;
        self.load(Address::Indirect(Register::ARP), Register::ARP)?;

        Ok(result)
    }

    /// Calling a thread function raises its start flag
    pub(super) fn gen_launch(&mut self, thread: FunctionId, name: Symbol) -> CodegenResult<Register> {
        let index = self
            .threads
            .iter()
            .position(|t| *t == thread)
            .ok_or(CodegenError::MissingAnnotation("thread"))?;
        let flag = self.layout.thread_flag(index);
        let register = self.registers.allocate()?;

        let first = self.constant(1, register)?;
        self.write(register, Address::Direct(flag))?;
        self.comment(first, || format!("launch {name}"));

        Ok(register)
    }

    pub(super) fn gen_return(
        &mut self,
        value: Option<&Expression>,
        context: Context,
    ) -> CodegenResult<()> {
        match value {
            Some(value) => {
                let register = self.gen_expression(value, context)?;
                self.emit_return(Some(register))?;
                self.registers.free(register)
            }
            None => self.emit_return(None).map(|_| ()),
        }
    }

    /// Stores the return value, if any, and jumps to the return address.
    pub(super) fn emit_return(&mut self, value: Option<Register>) -> CodegenResult<InstructionId> {
        let first = self.program.next_instruction();
        let register = self.registers.allocate()?;

        if let Some(value) = value {
            self.constant(2, register)?;
            self.compute(Operator::Sub, Register::ARP, register, register)?;
            self.store(value, Address::Indirect(register))?;
        }

        self.constant(1, register)?;
        self.compute(Operator::Sub, Register::ARP, register, register)?;
        self.load(Address::Indirect(register), register)?;
        self.jump(Target::Indirect(register))?;

        self.registers.free(register)?;

        Ok(first)
    }

    /// Sets up the outermost record of a core. Returning from it jumps to
    /// `exit`.
    pub(super) fn enter_root_frame(
        &mut self,
        frame_size: u32,
        exit: LabelId,
    ) -> CodegenResult<InstructionId> {
        let first = self.program.next_instruction();

        for _ in 0..frame_size {
            self.push(Register::Zero)?;
        }

        self.push(Register::ARP)?;
        self.constant_label(exit, Register::ARP)?;
        self.push(Register::ARP)?;
        self.push(Register::Zero)?;
        self.constant(2, Register::ARP)?;
        self.compute(Operator::Add, Register::SP, Register::ARP, Register::ARP)?;

        Ok(first)
    }

    /// Heap allocation shared by all cores. Takes the size as its only
    /// argument and returns the old heap pointer after bumping it.
    pub(super) fn alloc_routine(&mut self) -> CodegenResult<()> {
        let entry = self.alloc_entry;
        let locked = self.program.create_label("alloc_locked");
        let lock = Address::Direct(self.layout.allocator_lock());
        let heap = Address::Direct(self.layout.heap_pointer());

        let base = self.registers.allocate()?;
        let size = self.registers.allocate()?;

        let first = self.emit(OpCode::TestAndSet, &[lock.into()])?;
        self.program.bind(entry, first)?;
        self.comment(first, || "allocate heap memory".to_owned());
        self.receive(base)?;
        self.branch(base, Target::Label(locked))?;
        self.jump(Target::Label(entry))?;

        let start = self.read(heap)?;
        self.program.bind(locked, start)?;
        self.receive(base)?;
        self.constant(1, size)?;
        self.compute(Operator::Add, Register::ARP, size, size)?;
        self.load(Address::Indirect(size), size)?;
        self.compute(Operator::Add, base, size, size)?;
        self.write(size, heap)?;
        self.write(Register::Zero, lock)?;
        self.registers.free(size)?;

        self.emit_return(Some(base))?;

        self.registers.free(base)
    }

    pub(super) fn gen_acquire(&mut self, address: Address) -> CodegenResult<InstructionId> {
        let retry = self.program.create_label("acquire");
        let acquired = self.program.create_label("acquired");
        let register = self.registers.allocate()?;

        let first = self.emit(OpCode::TestAndSet, &[address.into()])?;
        self.program.bind(retry, first)?;
        self.receive(register)?;
        self.branch(register, Target::Label(acquired))?;
        self.jump(Target::Label(retry))?;
        self.anchor(acquired)?;

        self.registers.free(register)?;

        Ok(first)
    }

    pub(super) fn gen_release(&mut self, address: Address) -> CodegenResult<InstructionId> {
        self.write(Register::Zero, address)
    }
}
