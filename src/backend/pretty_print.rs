use std::fmt::Write;

use colored::Colorize;
use itertools::Itertools;

use super::{
    isa::{Address, Immediate, Instruction, OpCode, Operand, Target},
    program::ResolvedProgram,
};

/// Renders `program` as a Sprockell program in Haskell syntax: one
/// instruction per line, label names and descriptions as comments, and a
/// `main` that runs the program on every core.
pub fn format_program(program: &ResolvedProgram) -> String {
    let mut out = String::new();
    let width = program.instructions.len().to_string().len();

    writeln!(out, "{}", "import Sprockell".magenta()).unwrap();
    writeln!(out).unwrap();
    writeln!(out, "{} :: [{}]", "prog".blue(), "Instruction".green()).unwrap();
    writeln!(out, "{} = [", "prog".blue()).unwrap();

    for (position, instruction) in program.instructions.iter().enumerate() {
        if let Some(labels) = program.labels.get(&position) {
            for label in labels {
                writeln!(out, "    {}", format!("-- {label}:").bright_red()).unwrap();
            }
        }

        let separator = if position == 0 { " " } else { "," };
        let mut line = format!(
            "  {separator} {}",
            format_instruction(instruction)
        );

        // pad on the uncolored text so comments line up
        let visible = strip_ansi_escapes::strip_str(&line).chars().count();
        line.push_str(&" ".repeat(48usize.saturating_sub(visible)));

        let comment = match &instruction.comment {
            Some(comment) => format!("-- {position:>width$}: {comment}"),
            None => format!("-- {position:>width$}"),
        };

        writeln!(out, "{line} {}", comment.bright_black()).unwrap();
    }

    writeln!(out, "  ]").unwrap();
    writeln!(out).unwrap();
    writeln!(out, "{} = run ({} {} {})", "main".blue(), "replicate".blue(), program.cores, "prog".blue())
        .unwrap();

    out
}

pub fn format_instruction(instruction: &Instruction) -> String {
    let mut operands = instruction.operands.iter().map(format_operand).collect_vec();

    // the three operand form of Compute writes its result to the right operand
    if instruction.opcode == OpCode::Compute && operands.len() == 3 {
        operands.push(operands[2].clone());
    }

    std::iter::once(instruction.opcode.to_string().cyan().to_string())
        .chain(operands)
        .join(" ")
}

fn format_operand(operand: &Operand) -> String {
    match operand {
        Operand::Register(register) => register.to_string().yellow().to_string(),
        Operand::Immediate(Immediate::Value(value)) => signed(*value),
        Operand::Immediate(Immediate::Label(label)) => format!("{label:?}").bright_red().to_string(),
        Operand::Address(Address::Direct(address)) => format!("({} {address})", "DirAddr".green()),
        Operand::Address(Address::Indirect(register)) => {
            format!("({} {})", "IndAddr".green(), register.to_string().yellow())
        }
        Operand::Target(Target::Absolute(position)) => format!("({} {position})", "Abs".green()),
        Operand::Target(Target::Indirect(register)) => {
            format!("({} {})", "Ind".green(), register.to_string().yellow())
        }
        Operand::Target(Target::Label(label)) => format!("{label:?}").bright_red().to_string(),
        Operand::Operator(operator) => operator.to_string(),
    }
}

/// Haskell needs parentheses around negative literals
fn signed(value: i32) -> String {
    if value < 0 {
        format!("({value})")
    } else {
        value.to_string()
    }
}

#[cfg(test)]
mod tests {
    use indoc::indoc;
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::backend::isa::{Operator, Register};

    fn plain(text: &str) -> String {
        strip_ansi_escapes::strip_str(text)
    }

    fn instruction(opcode: OpCode, operands: Vec<Operand>) -> Instruction {
        Instruction::new(opcode, operands).unwrap()
    }

    #[test]
    fn operands_use_sprockell_syntax() {
        let cases = [
            (
                instruction(OpCode::Const, vec![(-3).into(), Register::A.into()]),
                "Const (-3) regA",
            ),
            (
                instruction(
                    OpCode::Compute,
                    vec![Operator::Sub.into(), Register::F.into(), Register::B.into()],
                ),
                "Compute Sub regF regB regB",
            ),
            (
                instruction(
                    OpCode::Load,
                    vec![Address::Indirect(Register::C).into(), Register::C.into()],
                ),
                "Load (IndAddr regC) regC",
            ),
            (
                instruction(OpCode::Read, vec![Address::Direct(250).into()]),
                "Read (DirAddr 250)",
            ),
            (
                instruction(
                    OpCode::Branch,
                    vec![Register::SprId.into(), Target::Absolute(12).into()],
                ),
                "Branch regSprID (Abs 12)",
            ),
            (
                instruction(OpCode::Jump, vec![Target::Indirect(Register::E).into()]),
                "Jump (Ind regE)",
            ),
            (instruction(OpCode::EndProg, vec![]), "EndProg"),
        ];

        for (instruction, expected) in cases {
            assert_eq!(plain(&format_instruction(&instruction)), expected);
        }
    }

    #[test]
    fn listing_has_labels_positions_and_comments() {
        let program = ResolvedProgram {
            instructions: vec![
                instruction(OpCode::Nop, vec![]).with_comment("start"),
                instruction(OpCode::Jump, vec![Target::Absolute(0).into()]),
            ],
            labels: [(0, vec!["loop_0".to_owned()])].into_iter().collect(),
            cores: 2,
        };

        let listing = plain(&format_program(&program));
        let expected = indoc! {"
            import Sprockell

            prog :: [Instruction]
            prog = [
                -- loop_0:
                Nop                                          -- 0: start
              , Jump (Abs 0)                                 -- 1
              ]

            main = run (replicate 2 prog)
        "};

        assert_eq!(listing, expected);
    }
}
