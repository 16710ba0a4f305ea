use super::Generator;
use crate::{
    backend::{
        CodegenError, CodegenResult,
        isa::{Address, OpCode, Operator, Register, Target},
        program::{InstructionId, LabelId},
    },
    frontend::ast::{Block, Expression, Statement, StatementKind, SwitchStatement, TargetKind},
    middle::scope::ScopeId,
};

/// Where a statement is generated
#[derive(Debug, Clone, Copy, Default)]
pub(super) struct Context {
    /// Frame scope of the enclosing function, `None` on the main core
    pub function: Option<ScopeId>,
    /// Body of the case block a `next` continues into
    pub next_target: Option<LabelId>,
}

impl Context {
    pub fn in_function(function: ScopeId) -> Self {
        Self {
            function: Some(function),
            next_target: None,
        }
    }

    fn with_next(self, next_target: Option<LabelId>) -> Self {
        Self {
            next_target,
            ..self
        }
    }
}

impl Generator<'_> {
    /// Generates `statement` and returns its first instruction. Statements
    /// that would emit nothing get a `Nop` so they can carry a label.
    pub(super) fn gen_statement(
        &mut self,
        statement: &Statement,
        context: Context,
    ) -> CodegenResult<InstructionId> {
        let first = self.program.next_instruction();

        match &statement.kind {
            StatementKind::Declaration(declaration) => {
                let value = match &declaration.initializer {
                    Some(initializer) => self.gen_expression(initializer, context)?,
                    None => Register::Zero,
                };
                let place = self.place_of_name(declaration.id, declaration.name, context)?;

                self.store_place(value, place)?;

                if value != Register::Zero {
                    self.registers.free(value)?;
                }

                self.comment(first, || format!("declare {}", declaration.name));
            }
            StatementKind::Assignment { target, value } => {
                let place = match &target.kind {
                    TargetKind::Identifier(name) => self.place_of_name(target.id, *name, context)?,
                    TargetKind::Index { array, index } => {
                        self.place_of_element(array, index, context)?
                    }
                    TargetKind::Field { object, field } => {
                        self.place_of_field(object, *field, context)?
                    }
                };
                let value = self.gen_expression(value, context)?;

                self.store_place(value, place)?;
                self.registers.free(value)?;

                if let TargetKind::Identifier(name) = &target.kind {
                    self.comment(first, || format!("assign {name}"));
                }
            }
            StatementKind::If {
                condition,
                then_block,
                else_block,
            } => {
                let end = self.program.create_label("if_end");
                let condition = self.gen_expression(condition, context)?;

                match else_block {
                    None => {
                        self.compute(Operator::Equal, Register::Zero, condition, condition)?;
                        self.branch(condition, Target::Label(end))?;
                        self.registers.free(condition)?;
                        self.gen_block(then_block, context)?;
                    }
                    Some(else_block) => {
                        let then = self.program.create_label("then");

                        self.branch(condition, Target::Label(then))?;
                        self.registers.free(condition)?;
                        self.gen_block(else_block, context)?;
                        self.jump(Target::Label(end))?;

                        let then_start = self.gen_block(then_block, context)?;
                        self.program.bind(then, then_start)?;
                    }
                }

                self.anchor(end)?;
            }
            StatementKind::While { condition, body } => {
                self.gen_loop(condition, body, None, context)?;
            }
            StatementKind::Do { body, condition } => {
                let start = self.program.create_label("do");
                let body_start = self.gen_block(body, context)?;
                self.program.bind(start, body_start)?;

                let condition = self.gen_expression(condition, context)?;
                self.branch(condition, Target::Label(start))?;
                self.registers.free(condition)?;
            }
            StatementKind::For {
                initializer,
                condition,
                step,
                body,
            } => {
                if let Some(initializer) = initializer {
                    self.gen_statement(initializer, context)?;
                }

                self.gen_loop(condition, body, step.as_deref(), context)?;
            }
            StatementKind::Block(block) => {
                self.gen_block(block, context)?;
            }
            StatementKind::Switch(switch) => {
                self.gen_switch(switch, context)?;
            }
            StatementKind::Next => {
                let target = context
                    .next_target
                    .ok_or(CodegenError::NextOutsideSwitch)?;

                self.jump(Target::Label(target))?;
            }
            StatementKind::Return(value) => {
                self.gen_return(value.as_ref(), context)?;
            }
            StatementKind::Expression(expression) => {
                let register = self.gen_expression(expression, context)?;
                self.registers.free(register)?;
            }
            StatementKind::Acquire(lock) => {
                let place = self.place_of_expression(lock, context)?;
                let address = place.address()?;

                self.gen_acquire(address)?;
                self.release_place_register(address)?;
            }
            StatementKind::Release(lock) => {
                let place = self.place_of_expression(lock, context)?;
                let address = place.address()?;

                self.gen_release(address)?;
                self.release_place_register(address)?;
            }
        }

        if self.program.next_instruction() == first {
            self.emit(OpCode::Nop, &[])?;
        }

        Ok(first)
    }

    fn release_place_register(&mut self, address: Address) -> CodegenResult<()> {
        match address {
            Address::Indirect(register) => self.registers.free(register),
            Address::Direct(_) => Ok(()),
        }
    }

    /// Generates `block` and returns its first instruction.
    pub(super) fn gen_block(&mut self, block: &Block, context: Context) -> CodegenResult<InstructionId> {
        let first = self.program.next_instruction();

        for statement in &block.statements {
            self.gen_statement(statement, context)?;
        }

        if self.program.next_instruction() == first {
            self.emit(OpCode::Nop, &[])?;
        }

        Ok(first)
    }

    /// `while` and `for` loops: the condition is tested before every pass
    fn gen_loop(
        &mut self,
        condition: &Expression,
        body: &Block,
        step: Option<&Statement>,
        context: Context,
    ) -> CodegenResult<()> {
        let test = self.program.create_label("loop");
        let end = self.program.create_label("loop_end");

        let start = self.program.next_instruction();
        let condition = self.gen_expression(condition, context)?;
        self.program.bind(test, start)?;

        self.compute(Operator::Equal, Register::Zero, condition, condition)?;
        self.branch(condition, Target::Label(end))?;
        self.registers.free(condition)?;

        self.gen_block(body, context)?;

        if let Some(step) = step {
            self.gen_statement(step, context)?;
        }

        self.jump(Target::Label(test))?;
        self.anchor(end)?;

        Ok(())
    }

    /// Case tests and bodies are interleaved. A failed test skips to the next
    /// test (or the default body), a finished body jumps past the switch.
    fn gen_switch(&mut self, switch: &SwitchStatement, context: Context) -> CodegenResult<()> {
        let end = self.program.create_label("switch_end");
        let tests = switch
            .cases
            .iter()
            .map(|_| self.program.create_label("case"))
            .collect::<Vec<_>>();
        let mut bodies = switch
            .cases
            .iter()
            .map(|_| self.program.create_label("case_body"))
            .collect::<Vec<_>>();

        if switch.default.is_some() {
            bodies.push(self.program.create_label("default"));
        }

        let discriminant = self.gen_expression(&switch.discriminant, context)?;

        for (index, case) in switch.cases.iter().enumerate() {
            let start = self.program.next_instruction();
            let value = self.gen_expression(&case.value, context)?;
            self.program.bind(tests[index], start)?;

            let miss = tests
                .get(index + 1)
                .or(bodies.get(switch.cases.len()))
                .copied()
                .unwrap_or(end);

            self.compute(Operator::NEq, discriminant, value, value)?;
            self.branch(value, Target::Label(miss))?;
            self.registers.free(value)?;

            let body = self.gen_block(&case.body, context.with_next(bodies.get(index + 1).copied()))?;
            self.program.bind(bodies[index], body)?;
            self.jump(Target::Label(end))?;
        }

        if let Some(default) = &switch.default {
            let body = self.gen_block(default, context.with_next(None))?;
            self.program.bind(bodies[switch.cases.len()], body)?;
        }

        self.anchor(end)?;
        self.registers.free(discriminant)
    }
}
