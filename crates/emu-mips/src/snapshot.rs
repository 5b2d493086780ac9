//! The external reader interface.
//!
//! A [`Snapshot`] wraps the simulator lock: while it lives, the worker
//! is parked between cycles and every view is consistent. Views borrow
//! the snapshot; nothing escapes the lock.

use mips_cpu::Context;
use mips_cpu::cp0;
use mips_mem::{K_TEXT_BOT, TEXT_BOT};

use crate::scheduler::ContextTable;

/// A consistent between-cycles view of every context.
pub struct Snapshot<'a> {
    guard: parking_lot::MutexGuard<'a, ContextTable>,
}

impl<'a> Snapshot<'a> {
    pub(crate) fn new(guard: parking_lot::MutexGuard<'a, ContextTable>) -> Self {
        Self { guard }
    }

    /// Ids of all contexts, halted ones included.
    #[must_use]
    pub fn context_ids(&self) -> Vec<u32> {
        self.guard.contexts.keys().copied().collect()
    }

    /// Whether a context is still executing.
    #[must_use]
    pub fn is_live(&self, ctx: u32) -> bool {
        self.guard.live.contains(&ctx)
    }

    /// Direct access to one context.
    #[must_use]
    pub fn context(&self, ctx: u32) -> Option<&Context> {
        self.guard.contexts.get(&ctx)
    }

    /// Formatted disassembly of one context's user text.
    #[must_use]
    pub fn user_text(&self, ctx: u32) -> Option<String> {
        let context = self.context(ctx)?;
        Some(format_text(context, TEXT_BOT, context.mem.text_top()))
    }

    /// Formatted disassembly of one context's kernel text.
    #[must_use]
    pub fn kernel_text(&self, ctx: u32) -> Option<String> {
        let context = self.context(ctx)?;
        Some(format_text(context, K_TEXT_BOT, context.mem.k_text_top()))
    }

    /// Word view of one context's user data segment.
    #[must_use]
    pub fn data_words(&self, ctx: u32) -> Option<&[u32]> {
        self.context(ctx).map(|c| c.mem.data_words())
    }

    /// Word view of one context's kernel data segment.
    #[must_use]
    pub fn k_data_words(&self, ctx: u32) -> Option<&[u32]> {
        self.context(ctx).map(|c| c.mem.k_data_words())
    }

    /// Word view of one context's stack, bottom first.
    #[must_use]
    pub fn stack_words(&self, ctx: u32) -> Option<&[u32]> {
        self.context(ctx).map(|c| c.mem.stack_words())
    }

    /// The 32 general registers.
    #[must_use]
    pub fn gprs(&self, ctx: u32) -> Option<[u32; 32]> {
        self.context(ctx).map(|c| c.regs.r)
    }

    /// The 32 single-precision FPU registers.
    #[must_use]
    pub fn fprs_single(&self, ctx: u32) -> Option<[f32; 32]> {
        self.context(ctx).map(|c| c.regs.fpr_singles())
    }

    /// The 16 double-precision FPU registers.
    #[must_use]
    pub fn fprs_double(&self, ctx: u32) -> Option<[f64; 16]> {
        self.context(ctx).map(|c| c.regs.fpr_doubles())
    }

    /// The special register block:
    /// `{PC, EPC, Cause, BadVAddr, Status, HI, LO, FIR, FCSR}`.
    #[must_use]
    pub fn special_registers(&self, ctx: u32) -> Option<[u32; 9]> {
        self.context(ctx).map(|c| {
            [
                c.regs.pc,
                c.regs.epc(),
                c.regs.cause(),
                c.regs.bad_vaddr(),
                c.regs.status(),
                c.regs.hi,
                c.regs.lo,
                c.regs.fcr[cp0::FIR],
                c.regs.fcr[cp0::FCSR],
            ]
        })
    }
}

/// One line per occupied text slot: address, encoding, disassembly and
/// the source line when the assembler provided one.
fn format_text(context: &Context, base: u32, top: u32) -> String {
    let mut out = String::new();
    let mut addr = base;
    while addr < top {
        if let Some(inst) = context.mem.inst_at(addr) {
            out.push_str(&format!("[0x{addr:08x}] 0x{:08x}  {inst}", inst.encoding));
            if let Some(source) = &inst.source {
                out.push_str(&format!("  ; {source}"));
            }
            out.push('\n');
        }
        addr += 4;
    }
    out
}
