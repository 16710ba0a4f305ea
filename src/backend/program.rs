//! Instruction container with deferred label resolution.
//!
//! The generator appends instructions and refers to positions through
//! labels, which may be bound before or after the instructions that use
//! them. [`Program::resolve`] replaces every label with the absolute position
//! it was bound to.

use std::collections::BTreeMap;

use super::{
    CodegenError,
    isa::{Immediate, Instruction, Operand, Target},
};
use crate::index::{Index, IndexVec};

crate::simple_index! {
    pub struct LabelId;
}

crate::simple_index! {
    pub struct InstructionId;
}

#[derive(Debug, Clone)]
pub struct Label {
    pub name: String,
    /// Instruction the label names, written once
    pub target: Option<InstructionId>,
}

#[derive(Debug, Default)]
pub struct Program {
    instructions: IndexVec<InstructionId, Instruction>,
    labels: IndexVec<LabelId, Label>,
    /// Cores the program needs: the main core plus one per thread function
    cores: usize,
}

impl Program {
    pub fn new(cores: usize) -> Self {
        Self {
            instructions: IndexVec::new(),
            labels: IndexVec::new(),
            cores,
        }
    }

    pub fn cores(&self) -> usize {
        self.cores
    }

    pub fn len(&self) -> usize {
        self.instructions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instructions.is_empty()
    }

    pub fn instruction(&self, id: InstructionId) -> &Instruction {
        &self.instructions[id]
    }

    /// Id the next appended instruction will get
    pub fn next_instruction(&self) -> InstructionId {
        self.instructions.next_index()
    }

    pub fn push(&mut self, instruction: Instruction) -> InstructionId {
        self.instructions.push(instruction)
    }

    pub fn set_comment(&mut self, id: InstructionId, comment: String) {
        self.instructions[id].comment = Some(comment);
    }

    /// Creates an unbound label. The label id is appended to `name` so label
    /// names stay unique in listings.
    pub fn create_label(&mut self, name: &str) -> LabelId {
        let id = self.labels.next_index();

        self.labels.push(Label {
            name: format!("{name}_{}", id.index()),
            target: None,
        })
    }

    pub fn label(&self, label: LabelId) -> &Label {
        &self.labels[label]
    }

    /// Binds `label` to an instruction. Labels can only be bound once.
    pub fn bind(&mut self, label: LabelId, instruction: InstructionId) -> Result<(), CodegenError> {
        let entry = &mut self.labels[label];

        if entry.target.is_some() {
            return Err(CodegenError::LabelRebound {
                name: entry.name.clone(),
            });
        }

        tracing::trace!(label = %entry.name, position = instruction.index(), "bound label");

        entry.target = Some(instruction);
        Ok(())
    }

    fn position(&self, label: LabelId) -> Result<u32, CodegenError> {
        let entry = &self.labels[label];

        entry
            .target
            .map(|id| id.index() as u32)
            .ok_or_else(|| CodegenError::UnresolvedLabel {
                name: entry.name.clone(),
            })
    }

    /// Produces the final instruction list with every label replaced by the
    /// absolute position of the instruction it names.
    pub fn resolve(&self) -> Result<ResolvedProgram, CodegenError> {
        let instructions = self
            .instructions
            .iter()
            .map(|instruction| -> Result<Instruction, CodegenError> {
                let operands = instruction
                    .operands
                    .iter()
                    .map(|operand| -> Result<Operand, CodegenError> {
                        Ok(match *operand {
                            Operand::Immediate(Immediate::Label(label)) => {
                                Operand::Immediate(Immediate::Value(self.position(label)? as i32))
                            }
                            Operand::Target(Target::Label(label)) => {
                                Operand::Target(Target::Absolute(self.position(label)?))
                            }
                            other => other,
                        })
                    })
                    .collect::<Result<Vec<_>, CodegenError>>()?;

                Ok(Instruction {
                    operands,
                    ..instruction.clone()
                })
            })
            .collect::<Result<Vec<_>, CodegenError>>()?;

        let mut labels = BTreeMap::<usize, Vec<String>>::new();
        for label in self.labels.iter() {
            if let Some(target) = label.target {
                labels.entry(target.index()).or_default().push(label.name.clone());
            }
        }

        Ok(ResolvedProgram {
            instructions,
            labels,
            cores: self.cores,
        })
    }
}

/// A finished program. Jump targets and label immediates are absolute
/// positions; label names are kept only for listings.
#[derive(Debug, Clone)]
pub struct ResolvedProgram {
    pub instructions: Vec<Instruction>,
    /// Names of the labels bound to each position
    pub labels: BTreeMap<usize, Vec<String>>,
    pub cores: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::isa::{OpCode, Register};

    fn nop() -> Instruction {
        Instruction::new(OpCode::Nop, vec![]).unwrap()
    }

    fn jump(label: LabelId) -> Instruction {
        Instruction::new(OpCode::Jump, vec![Target::Label(label).into()]).unwrap()
    }

    #[test]
    fn forward_and_backward_references_resolve() {
        let mut program = Program::new(1);
        let start = program.create_label("start");
        let end = program.create_label("end");

        let first = program.push(nop());
        program.bind(start, first).unwrap();
        program.push(jump(end));
        program.push(
            Instruction::new(
                OpCode::Const,
                vec![Immediate::Label(end).into(), Register::A.into()],
            )
            .unwrap(),
        );
        program.push(jump(start));
        let last = program.push(nop());
        program.bind(end, last).unwrap();

        let resolved = program.resolve().unwrap();

        assert_eq!(
            resolved.instructions[1].operands,
            vec![Operand::Target(Target::Absolute(4))]
        );
        assert_eq!(
            resolved.instructions[2].operands[0],
            Operand::Immediate(Immediate::Value(4))
        );
        assert_eq!(
            resolved.instructions[3].operands,
            vec![Operand::Target(Target::Absolute(0))]
        );
        assert_eq!(resolved.labels[&4], vec!["end_1".to_owned()]);
    }

    #[test]
    fn labels_bind_once() {
        let mut program = Program::new(1);
        let label = program.create_label("loop");
        let a = program.push(nop());
        let b = program.push(nop());

        program.bind(label, a).unwrap();

        assert_eq!(
            program.bind(label, b),
            Err(CodegenError::LabelRebound {
                name: "loop_0".to_owned()
            })
        );
        assert_eq!(program.label(label).target, Some(a));
    }

    #[test]
    fn unbound_labels_do_not_resolve() {
        let mut program = Program::new(1);
        let label = program.create_label("dangling");
        program.push(jump(label));

        assert_eq!(
            program.resolve().unwrap_err(),
            CodegenError::UnresolvedLabel {
                name: "dangling_0".to_owned()
            }
        );
    }
}
