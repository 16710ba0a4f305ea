//! Sprockell code generation
//!
//! The generator walks a checked compilation unit once and appends
//! instructions to a [`Program`]. Every core runs the same program; a
//! dispatch sequence at position 0 sends each thread core to its thread body
//! while core 0 falls through into the main code.
//!
//! Memory model:
//!
//!   * shared memory holds the heap, growing up from address 0, and the
//!     static region at the top: `[heap pointer][allocator lock][one flag per
//!     thread][globals]`
//!   * private memory holds each core's stack. `regSP` points at the most
//!     recently pushed word and `regF` (ARP) at the saved caller ARP of the
//!     active frame. Parameters and locals live at `ARP + offset + 1`, the
//!     return address at `ARP - 1` and the return value at `ARP - 2`
//!
//! Arrays, strings and objects are blocks in the heap referenced by their
//! base address. Element `i` lives at `base + i` and field `f` at
//! `base + offset(f)` since every value takes one word.

use hashbrown::HashMap;

use self::{registers::RegisterAllocator, statement::Context};
use super::{
    CodegenError, CodegenOptions, CodegenResult,
    isa::{Address, Immediate, Instruction, OpCode, Operand, Operator, Register, Target},
    program::{InstructionId, LabelId, Program},
};
use crate::{
    frontend::{
        CompilationUnit,
        ast::{Block, Expression, FunctionBody},
        intern::Symbol,
    },
    middle::{
        function_table::FunctionId,
        scope::ScopeId,
        type_check::CheckedProgram,
    },
};

mod call;
mod expression;
pub mod registers;
mod statement;


/// Addresses of the static region at the top of shared memory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StaticLayout {
    pub base: u32,
    pub thread_count: u32,
    pub global_count: u32,
}

impl StaticLayout {
    pub fn new(shared_memory_size: u32, thread_count: u32, global_count: u32) -> CodegenResult<Self> {
        let required = 2 + thread_count + global_count;

        if required > shared_memory_size {
            return Err(CodegenError::SharedMemoryExhausted {
                required,
                available: shared_memory_size,
            });
        }

        Ok(Self {
            base: shared_memory_size - required,
            thread_count,
            global_count,
        })
    }

    /// Next free heap address
    pub fn heap_pointer(&self) -> u32 {
        self.base
    }

    /// Lock word serialising heap allocation
    pub fn allocator_lock(&self) -> u32 {
        self.base + 1
    }

    /// Start flag of the `index`th thread function
    pub fn thread_flag(&self, index: usize) -> u32 {
        self.base + 2 + index as u32
    }

    pub fn global(&self, offset: u32) -> u32 {
        self.base + 2 + self.thread_count + offset
    }
}

/// Output of code generation
#[derive(Debug)]
pub struct Generated {
    pub program: Program,
    pub layout: StaticLayout,
    /// Thread functions in core order, thread `i` runs on core `i + 1`
    pub threads: Vec<FunctionId>,
}

impl Generated {
    /// Shared memory flag that starts `thread`
    pub fn thread_flag(&self, thread: FunctionId) -> Option<u32> {
        self.threads
            .iter()
            .position(|t| *t == thread)
            .map(|index| self.layout.thread_flag(index))
    }
}

/// Executable body of a function, method or constructor
#[derive(Clone, Copy)]
enum Body<'a> {
    Block(&'a Block),
    Expression(&'a Expression),
}

struct Generator<'a> {
    unit: &'a CompilationUnit,
    checked: &'a CheckedProgram,
    options: &'a CodegenOptions,
    program: Program,
    registers: RegisterAllocator,
    layout: StaticLayout,
    threads: Vec<FunctionId>,
    /// Entry label of every function, thread bodies included
    entries: HashMap<FunctionId, LabelId>,
    /// Field initializer routine of every class that has initializers
    initializers: HashMap<Symbol, LabelId>,
    alloc_entry: LabelId,
}

/// Generates the program for a unit that passed the checker.
#[tracing::instrument(level = "debug", skip_all)]
pub fn generate(
    unit: &CompilationUnit,
    checked: &CheckedProgram,
    options: &CodegenOptions,
) -> CodegenResult<Generated> {
    let threads = checked.functions.threads();
    let globals = checked.scopes.frame_size(checked.scopes.global());
    let layout = StaticLayout::new(options.shared_memory_size, threads.len() as u32, globals)?;

    let mut program = Program::new(threads.len() + 1);
    let entries = checked
        .functions
        .iter()
        .map(|(id, function)| {
            let name = match &function.class {
                Some(class) if function.is_constructor() => format!("{}.new", class.name()),
                Some(class) => format!("{}.{}", class.name(), function.name),
                None => function.name.to_string(),
            };

            (id, program.create_label(&name))
        })
        .collect();
    let initializers = unit
        .classes
        .iter()
        .filter(|definition| definition.fields.iter().any(|f| f.initializer.is_some()))
        .filter(|definition| checked.types.lookup_class(definition.name).is_some())
        .map(|definition| {
            let label = program.create_label(&format!("{}.init", definition.name));
            (definition.name, label)
        })
        .collect();
    let alloc_entry = program.create_label("alloc");

    let mut generator = Generator {
        unit,
        checked,
        options,
        program,
        registers: RegisterAllocator::new(),
        layout,
        threads,
        entries,
        initializers,
        alloc_entry,
    };

    generator.generate_program()?;

    tracing::debug!(
        instructions = generator.program.len(),
        cores = generator.program.cores(),
        "generated program"
    );

    Ok(Generated {
        program: generator.program,
        layout: generator.layout,
        threads: generator.threads,
    })
}

impl<'a> Generator<'a> {
    fn generate_program(&mut self) -> CodegenResult<()> {
        self.dispatch()?;
        self.main()?;

        let (functions, threads) = self.bodies();

        for (function, body) in functions {
            self.function(function, body)?;
        }

        let unit = self.unit;
        for definition in &unit.classes {
            if let Some(&entry) = self.initializers.get(&definition.name) {
                self.gen_field_initializers(definition, entry)?;
            }
        }

        self.alloc_routine()?;

        for (index, (function, body)) in threads.into_iter().enumerate() {
            self.thread(index, function, body)?;
        }

        Ok(())
    }

    /// Bodies of every checked definition, split into callable functions and
    /// thread functions
    #[allow(clippy::type_complexity)]
    fn bodies(&self) -> (Vec<(FunctionId, Body<'a>)>, Vec<(FunctionId, Body<'a>)>) {
        let unit = self.unit;
        let functions = &self.checked.functions;
        let mut callable = Vec::new();
        let mut threads = Vec::new();

        for class in &unit.classes {
            for method in &class.methods {
                if let Some(id) = functions.lookup(method.id) {
                    callable.push((id, body_of(&method.body)));
                }
            }

            for constructor in &class.constructors {
                if let Some(id) = functions.lookup(constructor.id) {
                    callable.push((id, Body::Block(&constructor.body)));
                }
            }
        }

        for function in &unit.functions {
            if let Some(id) = functions.lookup(function.id) {
                if functions.get(id).is_thread {
                    threads.push((id, body_of(&function.body)));
                } else {
                    callable.push((id, body_of(&function.body)));
                }
            }
        }

        // thread cores are numbered in definition order
        threads.sort_by_key(|(id, _)| self.threads.iter().position(|t| t == id));

        (callable, threads)
    }

    /// Sends every thread core to its thread body, core 0 falls through.
    fn dispatch(&mut self) -> CodegenResult<()> {
        for (index, thread) in self.threads.clone().into_iter().enumerate() {
            let core = index as i32 + 1;
            let register = self.registers.allocate()?;
            let first = self.constant(core, register)?;

            self.compute(Operator::Equal, Register::SprId, register, register)?;
            self.branch(register, Target::Label(self.entries[&thread]))?;
            self.registers.free(register)?;

            let name = self.checked.functions.get(thread).name;
            self.comment(first, || format!("core {core} runs thread {name}"));
        }

        Ok(())
    }

    fn main(&mut self) -> CodegenResult<()> {
        let exit = self.program.create_label("main_exit");
        let scopes = &self.checked.scopes;
        let frame_size = scopes.frame_size(scopes.global());

        let first = self.enter_root_frame(frame_size, exit)?;
        self.comment(first, || "main".to_owned());

        let unit = self.unit;
        for statement in &unit.statements {
            self.gen_statement(statement, Context::default())?;
        }

        let end = self.emit(OpCode::EndProg, &[])?;
        self.program.bind(exit, end)
    }

    fn function(&mut self, function: FunctionId, body: Body<'_>) -> CodegenResult<()> {
        debug_assert!(self.registers.all_free());

        let context = Context::in_function(self.frame_scope(function)?);
        let first = self.program.next_instruction();

        match body {
            Body::Block(block) => {
                for statement in &block.statements {
                    self.gen_statement(statement, context)?;
                }

                // falling off the end returns, only reachable for void
                self.emit_return(None)?;
            }
            Body::Expression(expression) => {
                self.gen_return(Some(expression), context)?;
            }
        }

        self.program.bind(self.entries[&function], first)?;

        let name = self.label_name(function);
        self.comment(first, || format!("function {name}"));

        Ok(())
    }

    fn thread(&mut self, index: usize, thread: FunctionId, body: Body<'_>) -> CodegenResult<()> {
        let flag = self.layout.thread_flag(index);
        let entry = self.entries[&thread];
        let register = self.registers.allocate()?;

        // spin until the main core launches this thread
        let first = self.read(Address::Direct(flag))?;
        self.program.bind(entry, first)?;
        self.receive(register)?;
        self.compute(Operator::Equal, Register::Zero, register, register)?;
        self.branch(register, Target::Label(entry))?;
        self.registers.free(register)?;

        let name = self.label_name(thread);
        self.comment(first, || format!("thread {name} waits for its flag"));

        let scope = self.frame_scope(thread)?;
        let exit = self.program.create_label("thread_exit");
        self.enter_root_frame(self.checked.scopes.frame_size(scope), exit)?;

        let context = Context::in_function(scope);

        match body {
            Body::Block(block) => {
                for statement in &block.statements {
                    self.gen_statement(statement, context)?;
                }
            }
            Body::Expression(expression) => {
                let register = self.gen_expression(expression, context)?;
                self.registers.free(register)?;
            }
        }

        let end = self.emit(OpCode::EndProg, &[])?;
        self.program.bind(exit, end)
    }

    fn label_name(&self, function: FunctionId) -> String {
        self.program.label(self.entries[&function]).name.clone()
    }

    fn frame_scope(&self, function: FunctionId) -> CodegenResult<ScopeId> {
        self.checked
            .functions
            .get(function)
            .scope
            .ok_or(CodegenError::MissingAnnotation("frame scope"))
    }

    /* Emission helpers */

    fn emit(&mut self, opcode: OpCode, operands: &[Operand]) -> CodegenResult<InstructionId> {
        let instruction = Instruction::new(opcode, operands.to_vec())?;

        Ok(self.program.push(instruction))
    }

    /// Describes an instruction in listings. The first description wins, so
    /// the innermost construct starting at an instruction names it.
    fn comment(&mut self, id: InstructionId, comment: impl FnOnce() -> String) {
        if self.options.emit_comments && self.program.instruction(id).comment.is_none() {
            self.program.set_comment(id, comment());
        }
    }

    /// Emits a `Nop` that `label` names, used as a join point.
    fn anchor(&mut self, label: LabelId) -> CodegenResult<InstructionId> {
        let id = self.emit(OpCode::Nop, &[])?;
        self.program.bind(label, id)?;

        Ok(id)
    }

    fn constant(&mut self, value: i32, register: Register) -> CodegenResult<InstructionId> {
        self.emit(OpCode::Const, &[value.into(), register.into()])
    }

    fn compute(
        &mut self,
        operator: Operator,
        left: Register,
        right: Register,
        destination: Register,
    ) -> CodegenResult<InstructionId> {
        self.emit(
            OpCode::Compute,
            &[
                operator.into(),
                left.into(),
                right.into(),
                destination.into(),
            ],
        )
    }

    fn load(&mut self, address: Address, register: Register) -> CodegenResult<InstructionId> {
        self.emit(OpCode::Load, &[address.into(), register.into()])
    }

    fn store(&mut self, register: Register, address: Address) -> CodegenResult<InstructionId> {
        self.emit(OpCode::Store, &[register.into(), address.into()])
    }

    fn push(&mut self, register: Register) -> CodegenResult<InstructionId> {
        self.emit(OpCode::Push, &[register.into()])
    }

    fn pop(&mut self, register: Register) -> CodegenResult<InstructionId> {
        self.emit(OpCode::Pop, &[register.into()])
    }

    fn read(&mut self, address: Address) -> CodegenResult<InstructionId> {
        self.emit(OpCode::Read, &[address.into()])
    }

    fn receive(&mut self, register: Register) -> CodegenResult<InstructionId> {
        self.emit(OpCode::Receive, &[register.into()])
    }

    fn write(&mut self, register: Register, address: Address) -> CodegenResult<InstructionId> {
        self.emit(OpCode::Write, &[register.into(), address.into()])
    }

    fn branch(&mut self, register: Register, target: Target) -> CodegenResult<InstructionId> {
        self.emit(OpCode::Branch, &[register.into(), target.into()])
    }

    fn jump(&mut self, target: Target) -> CodegenResult<InstructionId> {
        self.emit(OpCode::Jump, &[target.into()])
    }

    fn constant_label(&mut self, label: LabelId, register: Register) -> CodegenResult<InstructionId> {
        self.emit(OpCode::Const, &[Immediate::Label(label).into(), register.into()])
    }
}

fn body_of(body: &FunctionBody) -> Body<'_> {
    match body {
        FunctionBody::Block(block) => Body::Block(block),
        FunctionBody::Expression(expression) => Body::Expression(expression),
    }
}
