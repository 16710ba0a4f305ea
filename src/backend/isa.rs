//! Instruction set of the Sprockell machine as emitted by the generator.
//!
//! Operand lists are validated against the opcode when an [`Instruction`] is
//! built, so an ill formed instruction never reaches a [`Program`].
//!
//! [`Program`]: super::program::Program

use itertools::Itertools;

use super::{CodegenError, program::LabelId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display, strum::EnumIter)]
pub enum OpCode {
    /// `Const value register`
    Const,
    /// `Compute operator left right destination`, the three operand form
    /// writes to its right operand
    Compute,
    /// `Load address register` from private memory
    Load,
    /// `Store register address` to private memory
    Store,
    /// `Branch register target`, taken when the register is not zero
    Branch,
    Jump,
    Push,
    Pop,
    /// Issues a shared memory read, the value arrives with `Receive`
    Read,
    Receive,
    /// `Write register address` to shared memory
    Write,
    TestAndSet,
    EndProg,
    Nop,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
pub enum OperandKind {
    Register,
    Immediate,
    Address,
    Target,
    Operator,
}

impl OpCode {
    /// Kinds of the operands in order, followed by the number of leading
    /// operands that must be present
    fn signature(self) -> (&'static [OperandKind], usize) {
        use OperandKind::*;

        let kinds: &'static [OperandKind] = match self {
            Self::Const => &[Immediate, Register],
            Self::Compute => &[Operator, Register, Register, Register],
            Self::Load => &[Address, Register],
            Self::Store => &[Register, Address],
            Self::Branch => &[Register, Target],
            Self::Jump => &[Target],
            Self::Push | Self::Pop | Self::Receive => &[Register],
            Self::Read | Self::TestAndSet => &[Address],
            Self::Write => &[Register, Address],
            Self::EndProg | Self::Nop => &[],
        };

        let required = match self {
            Self::Compute => 3,
            _ => kinds.len(),
        };

        (kinds, required)
    }

    /// Smallest and largest number of operands the opcode takes
    pub fn arity(self) -> (usize, usize) {
        let (kinds, required) = self.signature();

        (required, kinds.len())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display)]
pub enum Register {
    #[strum(serialize = "reg0")]
    Zero,
    #[strum(serialize = "regSprID")]
    SprId,
    #[strum(serialize = "regA")]
    A,
    #[strum(serialize = "regB")]
    B,
    #[strum(serialize = "regC")]
    C,
    #[strum(serialize = "regD")]
    D,
    #[strum(serialize = "regE")]
    E,
    /// Activation record pointer
    #[strum(serialize = "regF")]
    F,
    #[strum(serialize = "regSP")]
    SP,
    #[strum(serialize = "regPC")]
    PC,
}

impl Register {
    pub const ARP: Register = Register::F;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display)]
pub enum Operator {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Equal,
    NEq,
    Gt,
    Lt,
    GtE,
    LtE,
    And,
    Or,
    Xor,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Immediate {
    Value(i32),
    /// Position of a labeled instruction, used for return addresses
    Label(LabelId),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Address {
    Direct(u32),
    /// Address held in a register
    Indirect(Register),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Target {
    Label(LabelId),
    Absolute(u32),
    Indirect(Register),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operand {
    Register(Register),
    Immediate(Immediate),
    Address(Address),
    Target(Target),
    Operator(Operator),
}

impl Operand {
    pub fn kind(&self) -> OperandKind {
        match self {
            Self::Register(_) => OperandKind::Register,
            Self::Immediate(_) => OperandKind::Immediate,
            Self::Address(_) => OperandKind::Address,
            Self::Target(_) => OperandKind::Target,
            Self::Operator(_) => OperandKind::Operator,
        }
    }
}

impl From<Register> for Operand {
    fn from(value: Register) -> Self {
        Self::Register(value)
    }
}

impl From<Immediate> for Operand {
    fn from(value: Immediate) -> Self {
        Self::Immediate(value)
    }
}

impl From<i32> for Operand {
    fn from(value: i32) -> Self {
        Self::Immediate(Immediate::Value(value))
    }
}

impl From<Address> for Operand {
    fn from(value: Address) -> Self {
        Self::Address(value)
    }
}

impl From<Target> for Operand {
    fn from(value: Target) -> Self {
        Self::Target(value)
    }
}

impl From<Operator> for Operand {
    fn from(value: Operator) -> Self {
        Self::Operator(value)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Instruction {
    pub opcode: OpCode,
    pub operands: Vec<Operand>,
    pub comment: Option<String>,
}

impl Instruction {
    pub fn new(opcode: OpCode, operands: Vec<Operand>) -> Result<Self, CodegenError> {
        let (kinds, required) = opcode.signature();
        let matches = operands.len() >= required
            && operands.len() <= kinds.len()
            && operands.iter().zip(kinds).all(|(o, k)| o.kind() == *k);

        if !matches {
            return Err(CodegenError::OperandMismatch {
                opcode,
                expected: kinds.iter().join(", "),
                found: operands.iter().map(|o| o.kind()).join(", "),
            });
        }

        Ok(Self {
            opcode,
            operands,
            comment: None,
        })
    }

    pub fn with_comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = Some(comment.into());
        self
    }

    /// Labels this instruction refers to
    pub fn label_references(&self) -> impl Iterator<Item = LabelId> + '_ {
        self.operands.iter().filter_map(|operand| match operand {
            Operand::Immediate(Immediate::Label(label))
            | Operand::Target(Target::Label(label)) => Some(*label),
            _ => None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn operand_arity_is_enforced() {
        assert!(Instruction::new(OpCode::Nop, vec![]).is_ok());
        assert!(Instruction::new(OpCode::EndProg, vec![Register::A.into()]).is_err());
        assert!(Instruction::new(OpCode::Jump, vec![]).is_err());
        assert!(
            Instruction::new(
                OpCode::Compute,
                vec![Operator::Add.into(), Register::A.into(), Register::B.into()]
            )
            .is_ok()
        );
        assert!(
            Instruction::new(
                OpCode::Compute,
                vec![
                    Operator::Add.into(),
                    Register::A.into(),
                    Register::B.into(),
                    Register::C.into()
                ]
            )
            .is_ok()
        );
        assert!(
            Instruction::new(OpCode::Compute, vec![Operator::Add.into(), Register::A.into()])
                .is_err()
        );
    }

    #[test]
    fn operand_kinds_are_enforced() {
        let err = Instruction::new(OpCode::Const, vec![Register::A.into(), 5.into()]).unwrap_err();

        assert_eq!(
            err,
            CodegenError::OperandMismatch {
                opcode: OpCode::Const,
                expected: "Immediate, Register".to_owned(),
                found: "Register, Immediate".to_owned(),
            }
        );
        assert!(Instruction::new(OpCode::Const, vec![5.into(), Register::A.into()]).is_ok());
    }

    #[test]
    fn arity_table() {
        assert_eq!(OpCode::Const.arity(), (2, 2));
        assert_eq!(OpCode::Compute.arity(), (3, 4));
        assert_eq!(OpCode::Branch.arity(), (2, 2));
        assert_eq!(OpCode::Receive.arity(), (1, 1));
        assert_eq!(OpCode::Nop.arity(), (0, 0));

        for opcode in <OpCode as strum::IntoEnumIterator>::iter() {
            let (min, max) = opcode.arity();
            assert!(min <= max && max <= 4, "{opcode} has arity {min}..={max}");
        }
    }
}
