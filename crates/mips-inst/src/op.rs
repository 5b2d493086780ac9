//! The MIPS32 revision 1 opcode set.

/// Operation tag of a decoded instruction.
///
/// One variant per architectural instruction. Floating-point compares
/// collapse to one tag per format; the condition number lives in the
/// encoding and is recovered through [`crate::Instruction::fp_cond`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Op {
    // === Integer arithmetic ===
    Add,
    Addi,
    Addiu,
    Addu,
    Sub,
    Subu,
    Clo,
    Clz,

    // === Logical ===
    And,
    Andi,
    Or,
    Ori,
    Xor,
    Xori,
    Nor,
    Lui,

    // === Shifts ===
    Sll,
    Srl,
    Sra,
    Sllv,
    Srlv,
    Srav,

    // === Compare-set ===
    Slt,
    Slti,
    Sltiu,
    Sltu,

    // === Multiply / divide ===
    Mult,
    Multu,
    Mul,
    Madd,
    Maddu,
    Msub,
    Msubu,
    Div,
    Divu,
    Mfhi,
    Mflo,
    Mthi,
    Mtlo,

    // === Conditional moves ===
    Movn,
    Movz,
    Movf,
    Movt,

    // === Branches ===
    Beq,
    Beql,
    Bne,
    Bnel,
    Blez,
    Blezl,
    Bgtz,
    Bgtzl,
    Bltz,
    Bltzl,
    Bgez,
    Bgezl,
    Bltzal,
    Bltzall,
    Bgezal,
    Bgezall,

    // === Jumps ===
    J,
    Jal,
    Jr,
    Jalr,

    // === Loads ===
    Lb,
    Lbu,
    Lh,
    Lhu,
    Lw,
    Lwl,
    Lwr,
    Ll,

    // === Stores ===
    Sb,
    Sh,
    Sw,
    Swl,
    Swr,
    Sc,

    // === Coprocessor 0 ===
    Mfc0,
    Mtc0,
    Cfc0,
    Ctc0,
    Eret,
    Rfe,
    Tlbp,
    Tlbr,
    Tlbwi,
    Tlbwr,

    // === Coprocessor 2 (unusable) ===
    Cop2,
    Lwc2,
    Ldc2,
    Swc2,
    Sdc2,

    // === Traps ===
    Teq,
    Teqi,
    Tne,
    Tnei,
    Tge,
    Tgei,
    Tgeu,
    Tgeiu,
    Tlt,
    Tlti,
    Tltu,
    Tltiu,

    // === System ===
    Syscall,
    Break,
    Sync,
    Pref,
    Cache,

    // === FPU arithmetic ===
    AddS,
    AddD,
    SubS,
    SubD,
    MulS,
    MulD,
    DivS,
    DivD,
    AbsS,
    AbsD,
    NegS,
    NegD,
    SqrtS,
    SqrtD,
    MovS,
    MovD,

    // === FPU conversions ===
    CeilWS,
    CeilWD,
    FloorWS,
    FloorWD,
    RoundWS,
    RoundWD,
    TruncWS,
    TruncWD,
    CvtDS,
    CvtDW,
    CvtSD,
    CvtSW,
    CvtWS,
    CvtWD,

    // === FPU compare / branch / moves ===
    CCondS,
    CCondD,
    Bc1f,
    Bc1fl,
    Bc1t,
    Bc1tl,
    MovfS,
    MovfD,
    MovtS,
    MovtD,
    MovnS,
    MovnD,
    MovzS,
    MovzD,

    // === FPU load / store / transfer ===
    Lwc1,
    Ldc1,
    Swc1,
    Sdc1,
    Mfc1,
    Mtc1,
    Cfc1,
    Ctc1,

    /// Encoding not in the MIPS32 rev 1 table.
    Unknown,
}

impl Op {
    /// Assembler mnemonic.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Op::Add => "add",
            Op::Addi => "addi",
            Op::Addiu => "addiu",
            Op::Addu => "addu",
            Op::Sub => "sub",
            Op::Subu => "subu",
            Op::Clo => "clo",
            Op::Clz => "clz",
            Op::And => "and",
            Op::Andi => "andi",
            Op::Or => "or",
            Op::Ori => "ori",
            Op::Xor => "xor",
            Op::Xori => "xori",
            Op::Nor => "nor",
            Op::Lui => "lui",
            Op::Sll => "sll",
            Op::Srl => "srl",
            Op::Sra => "sra",
            Op::Sllv => "sllv",
            Op::Srlv => "srlv",
            Op::Srav => "srav",
            Op::Slt => "slt",
            Op::Slti => "slti",
            Op::Sltiu => "sltiu",
            Op::Sltu => "sltu",
            Op::Mult => "mult",
            Op::Multu => "multu",
            Op::Mul => "mul",
            Op::Madd => "madd",
            Op::Maddu => "maddu",
            Op::Msub => "msub",
            Op::Msubu => "msubu",
            Op::Div => "div",
            Op::Divu => "divu",
            Op::Mfhi => "mfhi",
            Op::Mflo => "mflo",
            Op::Mthi => "mthi",
            Op::Mtlo => "mtlo",
            Op::Movn => "movn",
            Op::Movz => "movz",
            Op::Movf => "movf",
            Op::Movt => "movt",
            Op::Beq => "beq",
            Op::Beql => "beql",
            Op::Bne => "bne",
            Op::Bnel => "bnel",
            Op::Blez => "blez",
            Op::Blezl => "blezl",
            Op::Bgtz => "bgtz",
            Op::Bgtzl => "bgtzl",
            Op::Bltz => "bltz",
            Op::Bltzl => "bltzl",
            Op::Bgez => "bgez",
            Op::Bgezl => "bgezl",
            Op::Bltzal => "bltzal",
            Op::Bltzall => "bltzall",
            Op::Bgezal => "bgezal",
            Op::Bgezall => "bgezall",
            Op::J => "j",
            Op::Jal => "jal",
            Op::Jr => "jr",
            Op::Jalr => "jalr",
            Op::Lb => "lb",
            Op::Lbu => "lbu",
            Op::Lh => "lh",
            Op::Lhu => "lhu",
            Op::Lw => "lw",
            Op::Lwl => "lwl",
            Op::Lwr => "lwr",
            Op::Ll => "ll",
            Op::Sb => "sb",
            Op::Sh => "sh",
            Op::Sw => "sw",
            Op::Swl => "swl",
            Op::Swr => "swr",
            Op::Sc => "sc",
            Op::Mfc0 => "mfc0",
            Op::Mtc0 => "mtc0",
            Op::Cfc0 => "cfc0",
            Op::Ctc0 => "ctc0",
            Op::Eret => "eret",
            Op::Rfe => "rfe",
            Op::Tlbp => "tlbp",
            Op::Tlbr => "tlbr",
            Op::Tlbwi => "tlbwi",
            Op::Tlbwr => "tlbwr",
            Op::Cop2 => "cop2",
            Op::Lwc2 => "lwc2",
            Op::Ldc2 => "ldc2",
            Op::Swc2 => "swc2",
            Op::Sdc2 => "sdc2",
            Op::Teq => "teq",
            Op::Teqi => "teqi",
            Op::Tne => "tne",
            Op::Tnei => "tnei",
            Op::Tge => "tge",
            Op::Tgei => "tgei",
            Op::Tgeu => "tgeu",
            Op::Tgeiu => "tgeiu",
            Op::Tlt => "tlt",
            Op::Tlti => "tlti",
            Op::Tltu => "tltu",
            Op::Tltiu => "tltiu",
            Op::Syscall => "syscall",
            Op::Break => "break",
            Op::Sync => "sync",
            Op::Pref => "pref",
            Op::Cache => "cache",
            Op::AddS => "add.s",
            Op::AddD => "add.d",
            Op::SubS => "sub.s",
            Op::SubD => "sub.d",
            Op::MulS => "mul.s",
            Op::MulD => "mul.d",
            Op::DivS => "div.s",
            Op::DivD => "div.d",
            Op::AbsS => "abs.s",
            Op::AbsD => "abs.d",
            Op::NegS => "neg.s",
            Op::NegD => "neg.d",
            Op::SqrtS => "sqrt.s",
            Op::SqrtD => "sqrt.d",
            Op::MovS => "mov.s",
            Op::MovD => "mov.d",
            Op::CeilWS => "ceil.w.s",
            Op::CeilWD => "ceil.w.d",
            Op::FloorWS => "floor.w.s",
            Op::FloorWD => "floor.w.d",
            Op::RoundWS => "round.w.s",
            Op::RoundWD => "round.w.d",
            Op::TruncWS => "trunc.w.s",
            Op::TruncWD => "trunc.w.d",
            Op::CvtDS => "cvt.d.s",
            Op::CvtDW => "cvt.d.w",
            Op::CvtSD => "cvt.s.d",
            Op::CvtSW => "cvt.s.w",
            Op::CvtWS => "cvt.w.s",
            Op::CvtWD => "cvt.w.d",
            Op::CCondS => "c.cond.s",
            Op::CCondD => "c.cond.d",
            Op::Bc1f => "bc1f",
            Op::Bc1fl => "bc1fl",
            Op::Bc1t => "bc1t",
            Op::Bc1tl => "bc1tl",
            Op::MovfS => "movf.s",
            Op::MovfD => "movf.d",
            Op::MovtS => "movt.s",
            Op::MovtD => "movt.d",
            Op::MovnS => "movn.s",
            Op::MovnD => "movn.d",
            Op::MovzS => "movz.s",
            Op::MovzD => "movz.d",
            Op::Lwc1 => "lwc1",
            Op::Ldc1 => "ldc1",
            Op::Swc1 => "swc1",
            Op::Sdc1 => "sdc1",
            Op::Mfc1 => "mfc1",
            Op::Mtc1 => "mtc1",
            Op::Cfc1 => "cfc1",
            Op::Ctc1 => "ctc1",
            Op::Unknown => "???",
        }
    }
}
