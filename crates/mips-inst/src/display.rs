//! Disassembly formatting.

use std::fmt;

use crate::inst::{Instruction, Operands};
use crate::op::Op;

impl fmt::Display for Instruction {
    /// One instruction in assembler syntax, e.g. `add $10, $8, $9`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = self.op.name();
        match self.op {
            Op::Syscall | Op::Break | Op::Sync | Op::Eret | Op::Rfe | Op::Tlbp | Op::Tlbr
            | Op::Tlbwi | Op::Tlbwr | Op::Cop2 | Op::Unknown => write!(f, "{name}"),

            Op::Sll | Op::Srl | Op::Sra => {
                write!(f, "{name} ${}, ${}, {}", self.rd(), self.rt(), self.shamt())
            }

            Op::Jr | Op::Mthi | Op::Mtlo => write!(f, "{name} ${}", self.rs()),
            Op::Mfhi | Op::Mflo => write!(f, "{name} ${}", self.rd()),
            Op::Jalr => write!(f, "{name} ${}, ${}", self.rd(), self.rs()),

            Op::Mult | Op::Multu | Op::Div | Op::Divu | Op::Madd | Op::Maddu | Op::Msub
            | Op::Msubu | Op::Teq | Op::Tne | Op::Tge | Op::Tgeu | Op::Tlt | Op::Tltu => {
                write!(f, "{name} ${}, ${}", self.rs(), self.rt())
            }

            Op::Clo | Op::Clz => write!(f, "{name} ${}, ${}", self.rd(), self.rs()),

            Op::J | Op::Jal => write!(f, "{name} {:#010x}", self.target() << 2),

            Op::Lui => write!(f, "{name} ${}, {:#x}", self.rt(), self.imm() as u16),

            Op::Lb | Op::Lbu | Op::Lh | Op::Lhu | Op::Lw | Op::Lwl | Op::Lwr | Op::Ll
            | Op::Sb | Op::Sh | Op::Sw | Op::Swl | Op::Swr | Op::Sc => {
                write!(f, "{name} ${}, {}(${})", self.rt(), self.imm(), self.base())
            }

            Op::Lwc1 | Op::Ldc1 | Op::Swc1 | Op::Sdc1 => {
                write!(f, "{name} $f{}, {}(${})", self.ft(), self.imm(), self.base())
            }

            Op::Beq | Op::Bne | Op::Beql | Op::Bnel => {
                write!(f, "{name} ${}, ${}, {}", self.rs(), self.rt(), self.imm())
            }

            Op::Blez | Op::Blezl | Op::Bgtz | Op::Bgtzl | Op::Bltz | Op::Bltzl | Op::Bgez
            | Op::Bgezl | Op::Bltzal | Op::Bltzall | Op::Bgezal | Op::Bgezall => {
                write!(f, "{name} ${}, {}", self.rs(), self.imm())
            }

            Op::Teqi | Op::Tnei | Op::Tgei | Op::Tgeiu | Op::Tlti | Op::Tltiu => {
                write!(f, "{name} ${}, {}", self.rs(), self.imm())
            }

            Op::Mfc0 | Op::Mtc0 | Op::Cfc0 | Op::Ctc0 => {
                write!(f, "{name} ${}, ${}", self.rt(), self.rd())
            }
            Op::Mfc1 | Op::Mtc1 | Op::Cfc1 | Op::Ctc1 => {
                write!(f, "{name} ${}, $f{}", self.rt(), self.fs())
            }

            Op::Bc1f | Op::Bc1t | Op::Bc1fl | Op::Bc1tl => {
                write!(f, "{name} {}, {}", self.cc(), self.imm())
            }

            Op::Movf | Op::Movt => {
                write!(f, "{name} ${}, ${}, {}", self.rd(), self.rs(), self.cc())
            }

            Op::CCondS | Op::CCondD => {
                let fmt_tag = if self.op == Op::CCondD { "d" } else { "s" };
                write!(
                    f,
                    "c.{:x}.{} {}, $f{}, $f{}",
                    self.fp_cond(),
                    fmt_tag,
                    self.cmp_cc(),
                    self.fs(),
                    self.ft()
                )
            }

            Op::AddS | Op::AddD | Op::SubS | Op::SubD | Op::MulS | Op::MulD | Op::DivS
            | Op::DivD => {
                write!(f, "{name} $f{}, $f{}, $f{}", self.fd(), self.fs(), self.ft())
            }

            Op::AbsS | Op::AbsD | Op::NegS | Op::NegD | Op::SqrtS | Op::SqrtD | Op::MovS
            | Op::MovD | Op::CeilWS | Op::CeilWD | Op::FloorWS | Op::FloorWD | Op::RoundWS
            | Op::RoundWD | Op::TruncWS | Op::TruncWD | Op::CvtSD | Op::CvtSW | Op::CvtDS
            | Op::CvtDW | Op::CvtWS | Op::CvtWD => {
                write!(f, "{name} $f{}, $f{}", self.fd(), self.fs())
            }

            Op::MovfS | Op::MovfD | Op::MovtS | Op::MovtD => {
                write!(f, "{name} $f{}, $f{}, {}", self.fd(), self.fs(), self.cc())
            }
            Op::MovnS | Op::MovnD | Op::MovzS | Op::MovzD => {
                write!(f, "{name} $f{}, $f{}, ${}", self.fd(), self.fs(), self.rt())
            }

            Op::Sllv | Op::Srlv | Op::Srav => {
                write!(f, "{name} ${}, ${}, ${}", self.rd(), self.rt(), self.rs())
            }

            Op::Movn | Op::Movz | Op::Add | Op::Addu | Op::Sub | Op::Subu | Op::And | Op::Or
            | Op::Xor | Op::Nor | Op::Slt | Op::Sltu | Op::Mul => {
                write!(f, "{name} ${}, ${}, ${}", self.rd(), self.rs(), self.rt())
            }

            Op::Addi | Op::Addiu | Op::Slti | Op::Sltiu | Op::Andi | Op::Ori | Op::Xori => {
                write!(f, "{name} ${}, ${}, {}", self.rt(), self.rs(), self.imm())
            }

            Op::Pref | Op::Cache => write!(f, "{name} {}, {}(${})", self.rt(), self.imm(), self.base()),

            Op::Lwc2 | Op::Ldc2 | Op::Swc2 | Op::Sdc2 => {
                write!(f, "{name} ${}, {}(${})", self.rt(), self.imm(), self.base())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_common_shapes() {
        assert_eq!(
            Instruction::rtype(Op::Add, 10, 8, 9).to_string(),
            "add $10, $8, $9"
        );
        assert_eq!(
            Instruction::itype(Op::Lw, 8, 29, -4).to_string(),
            "lw $8, -4($29)"
        );
        assert_eq!(Instruction::bare(Op::Syscall).to_string(), "syscall");
    }
}
