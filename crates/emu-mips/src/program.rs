//! The assembled-program input contract and the loader.
//!
//! The external assembler hands the simulator a [`ProgramImage`]: decoded
//! text indexed by `(addr - base) / 4`, raw data bytes, and a resolved
//! entry symbol. Label references are the assembler's job; anything left
//! unresolved surfaces as an engine-time error on first fetch.

use mips_cpu::{Context, EXCEPTION_ADDR};
use mips_inst::{Instruction, Op};
use mips_mem::{DATA_BOT, K_DATA_BOT, K_TEXT_BOT, MemFault, TEXT_BOT};
use thiserror::Error;

/// Kernel scratch registers, conventionally reserved for handlers.
const K0: u8 = 26;
const K1: u8 = 27;

/// Loading failed; the image does not fit the configured segments.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("program image does not fit: {0}")]
    OutOfRange(#[from] MemFault),
}

/// One context's assembled program.
#[derive(Debug, Clone, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ProgramImage {
    /// User text, indexed by `(addr - 0x0040_0000) / 4`; `None` slots
    /// stay empty.
    pub text: Vec<Option<Instruction>>,
    /// User data bytes, placed from `0x1000_0000`.
    pub data: Vec<u8>,
    /// Kernel text, indexed from `0x8000_0000`. Empty means "install the
    /// default exception handler".
    pub k_text: Vec<Option<Instruction>>,
    /// Kernel data bytes, placed from `0x9000_0000`.
    pub k_data: Vec<u8>,
    /// Resolved address of the start symbol (`main`); `None` runs from
    /// the bottom of text.
    pub entry: Option<u32>,
}

impl ProgramImage {
    /// Convenience: an image from a straight run of instructions at the
    /// bottom of text.
    #[must_use]
    pub fn from_instructions(insts: Vec<Instruction>) -> Self {
        Self {
            text: insts.into_iter().map(Some).collect(),
            ..Self::default()
        }
    }
}

/// Install a program image into a context and point the PC at its entry.
///
/// Installs the default exception handler into kernel text unless the
/// image carries its own or the configuration asks for a bare machine.
pub fn load_program(ctx: &mut Context, program: &ProgramImage) -> Result<(), LoadError> {
    for (i, slot) in program.text.iter().enumerate() {
        if let Some(inst) = slot {
            ctx.mem
                .write_inst(TEXT_BOT + 4 * i as u32, inst.clone())?;
        }
    }
    for (i, byte) in program.data.iter().enumerate() {
        if let Err(mips_mem::MemError::Fault(f)) =
            ctx.mem.write_byte(DATA_BOT + i as u32, u32::from(*byte))
        {
            return Err(f.into());
        }
    }
    for (i, byte) in program.k_data.iter().enumerate() {
        if let Err(mips_mem::MemError::Fault(f)) =
            ctx.mem.write_byte(K_DATA_BOT + i as u32, u32::from(*byte))
        {
            return Err(f.into());
        }
    }

    if program.k_text.is_empty() {
        if !ctx.cfg.bare_machine {
            install_default_handler(ctx)?;
        }
    } else {
        for (i, slot) in program.k_text.iter().enumerate() {
            if let Some(inst) = slot {
                ctx.mem
                    .write_inst(K_TEXT_BOT + 4 * i as u32, inst.clone())?;
            }
        }
    }

    ctx.regs.pc = program.entry.unwrap_or(TEXT_BOT);
    Ok(())
}

/// The built-in exception handler: return to EPC for interrupts, EPC + 4
/// for everything else.
fn install_default_handler(ctx: &mut Context) -> Result<(), LoadError> {
    use mips_cpu::cp0::{CAUSE, EPC};

    let delayed = ctx.cfg.delayed_branches;
    let mut insts = Vec::new();
    // k0 = Cause.ExcCode
    insts.push(mfc0(K0, CAUSE as u8));
    insts.push(Instruction::itype(Op::Andi, K0, K0, 0x7c));
    insts.push(mfc0(K1, EPC as u8));
    if delayed {
        // beq skips the bump over its delay-slot nop
        insts.push(Instruction::itype(Op::Beq, K0, 0, 3));
        insts.push(Instruction::bare(Op::Sync)); // delay slot
    } else {
        insts.push(Instruction::itype(Op::Beq, K0, 0, 2));
    }
    insts.push(Instruction::itype(Op::Addiu, K1, K1, 4));
    insts.push(mtc0(K1, EPC as u8));
    insts.push(Instruction::bare(Op::Eret));
    if delayed {
        insts.push(Instruction::bare(Op::Sync)); // eret delay slot
    }

    for (i, inst) in insts.into_iter().enumerate() {
        ctx.mem.write_inst(EXCEPTION_ADDR + 4 * i as u32, inst)?;
    }
    Ok(())
}

fn mfc0(rt: u8, rd: u8) -> Instruction {
    Instruction::new(Op::Mfc0, mips_inst::Operands::R { rs: 0, rt, rd, shamt: 0 })
}

fn mtc0(rt: u8, rd: u8) -> Instruction {
    Instruction::new(Op::Mtc0, mips_inst::Operands::R { rs: 0, rt, rd, shamt: 0 })
}
