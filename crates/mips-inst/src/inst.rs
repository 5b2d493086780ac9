//! The decoded instruction record.
//!
//! Text segments store these records, not raw words. The original 32-bit
//! encoding rides along so raw-word reads of text can synthesize it and
//! the disassembler can show it.

use std::sync::Arc;

use crate::op::Op;

/// FPU compare condition bit: unordered.
pub const COND_UN: u8 = 0x1;
/// FPU compare condition bit: equal.
pub const COND_EQ: u8 = 0x2;
/// FPU compare condition bit: less-than.
pub const COND_LT: u8 = 0x4;
/// FPU compare condition bit: signal invalid on unordered operands.
pub const COND_IN: u8 = 0x8;

/// Which half of a resolved label address an immediate takes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum HalfSelect {
    /// The full address (jumps, data words).
    Whole,
    /// Bits 31..16 (the `lui` half of a split address).
    High,
    /// Bits 15..0.
    Low,
}

/// A handle to an assembler symbol, with the address the assembler patched
/// in at load time. An address of zero means the reference was never
/// resolved; executing such an instruction is an engine-time error.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SymbolRef {
    pub name: Arc<str>,
    pub addr: u32,
}

/// The expression that produced an immediate: `label +/- offset`.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ImmExpr {
    /// Offset from the symbol.
    pub offset: i32,
    /// Symbolic label, if any.
    pub symbol: Option<SymbolRef>,
    /// Half of the resolved value this immediate carries.
    pub bits: HalfSelect,
    /// Offset is relative to the referencing instruction's address.
    pub pc_relative: bool,
}

/// Operand fields, discriminated by encoding format.
///
/// Floating-point instructions reuse the R form: `fmt` sits in `rs`,
/// `ft` in `rt`, `fs` in `rd` and `fd` in `shamt`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Operands {
    /// Register format: rs, rt, rd, shamt.
    R { rs: u8, rt: u8, rd: u8, shamt: u8 },
    /// Immediate format: rs, rt and a 16-bit signed immediate.
    I { rs: u8, rt: u8, imm: i16 },
    /// Jump format: a 26-bit word index.
    J { target: u32 },
}

/// One decoded MIPS32 instruction.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Instruction {
    pub op: Op,
    pub operands: Operands,
    /// The architectural 32-bit encoding.
    pub encoding: u32,
    /// Unresolved-label expression behind the immediate, if any.
    pub expr: Option<ImmExpr>,
    /// The assembly source line this came from, if known.
    pub source: Option<String>,
}

impl Instruction {
    /// Build an instruction from its tag and operands, synthesizing the
    /// architectural encoding.
    #[must_use]
    pub fn new(op: Op, operands: Operands) -> Self {
        Self {
            op,
            operands,
            encoding: crate::decode::encode(op, operands),
            expr: None,
            source: None,
        }
    }

    /// R-format sugar in assembler operand order: `op rd, rs, rt`.
    #[must_use]
    pub fn rtype(op: Op, rd: u8, rs: u8, rt: u8) -> Self {
        Self::new(op, Operands::R { rs, rt, rd, shamt: 0 })
    }

    /// Shift sugar: `op rd, rt, shamt`.
    #[must_use]
    pub fn shift(op: Op, rd: u8, rt: u8, shamt: u8) -> Self {
        Self::new(op, Operands::R { rs: 0, rt, rd, shamt })
    }

    /// I-format sugar in assembler operand order: `op rt, rs, imm`.
    /// Also covers loads and stores (`rs` is the base register).
    #[must_use]
    pub fn itype(op: Op, rt: u8, rs: u8, imm: i16) -> Self {
        Self::new(op, Operands::I { rs, rt, imm })
    }

    /// J-format sugar from a byte address; keeps the low 28 bits.
    #[must_use]
    pub fn jtype(op: Op, addr: u32) -> Self {
        Self::new(op, Operands::J { target: (addr >> 2) & 0x03ff_ffff })
    }

    /// Zero-operand sugar (`syscall`, `eret`, `sync`, ...).
    #[must_use]
    pub fn bare(op: Op) -> Self {
        Self::new(op, Operands::R { rs: 0, rt: 0, rd: 0, shamt: 0 })
    }

    /// FPU compare: `c.cond.fmt cc, fs, ft`.
    ///
    /// The condition predicate lives in the function field of the
    /// encoding, so this constructor assembles the word directly.
    #[must_use]
    pub fn fp_compare(double: bool, cond: u8, cc: u8, fs: u8, ft: u8) -> Self {
        let (op, fmt) = if double { (Op::CCondD, 17) } else { (Op::CCondS, 16) };
        let shamt = (cc & 0x7) << 2;
        let encoding = (0x11 << 26)
            | (fmt << 21)
            | (u32::from(ft) << 16)
            | (u32::from(fs) << 11)
            | (u32::from(shamt) << 6)
            | (0x30 | u32::from(cond & 0xf));
        Self {
            op,
            operands: Operands::R { rs: fmt as u8, rt: ft, rd: fs, shamt },
            encoding,
            expr: None,
            source: None,
        }
    }

    /// Attach the originating source line.
    #[must_use]
    pub fn with_source(mut self, line: impl Into<String>) -> Self {
        self.source = Some(line.into());
        self
    }

    /// Attach an immediate expression.
    #[must_use]
    pub fn with_expr(mut self, expr: ImmExpr) -> Self {
        self.expr = Some(expr);
        self
    }

    // === Field accessors ===
    //
    // Accessors tolerate format mismatch and return 0; the dispatch table
    // only asks for fields the instruction's format carries.

    #[must_use]
    pub fn rs(&self) -> u8 {
        match self.operands {
            Operands::R { rs, .. } | Operands::I { rs, .. } => rs,
            Operands::J { .. } => 0,
        }
    }

    #[must_use]
    pub fn rt(&self) -> u8 {
        match self.operands {
            Operands::R { rt, .. } | Operands::I { rt, .. } => rt,
            Operands::J { .. } => 0,
        }
    }

    #[must_use]
    pub fn rd(&self) -> u8 {
        match self.operands {
            Operands::R { rd, .. } => rd,
            _ => 0,
        }
    }

    #[must_use]
    pub fn shamt(&self) -> u8 {
        match self.operands {
            Operands::R { shamt, .. } => shamt,
            _ => 0,
        }
    }

    #[must_use]
    pub fn imm(&self) -> i16 {
        match self.operands {
            Operands::I { imm, .. } => imm,
            _ => 0,
        }
    }

    /// 26-bit jump word index.
    #[must_use]
    pub fn target(&self) -> u32 {
        match self.operands {
            Operands::J { target } => target,
            _ => 0,
        }
    }

    /// Base register of a load/store (the `rs` field).
    #[must_use]
    pub fn base(&self) -> u8 {
        self.rs()
    }

    /// Branch displacement in bytes: `sign-extend(imm) << 2`.
    #[must_use]
    pub fn branch_disp(&self) -> i32 {
        i32::from(self.imm()) << 2
    }

    // === FPU field aliases ===

    #[must_use]
    pub fn ft(&self) -> u8 {
        self.rt()
    }

    #[must_use]
    pub fn fs(&self) -> u8 {
        self.rd()
    }

    #[must_use]
    pub fn fd(&self) -> u8 {
        self.shamt()
    }

    /// Condition-code number of `bc1t/bc1f` and the conditional moves
    /// (bits 20:18 of the encoding).
    #[must_use]
    pub fn cc(&self) -> u8 {
        self.rt() >> 2
    }

    /// Condition-code number written by `c.cond.fmt` (bits 10:8).
    #[must_use]
    pub fn cmp_cc(&self) -> u8 {
        self.shamt() >> 2
    }

    /// Condition predicate of `c.cond.fmt` (`COND_*` bits).
    #[must_use]
    pub fn fp_cond(&self) -> u8 {
        (self.encoding & 0xf) as u8
    }
}
