//! Exception raising and vectoring.
//!
//! The engine's raise-and-continue pattern: `raise_exception` latches an
//! edge flag on the register file and fills in EPC/Cause/Status; a
//! tail-position check at the end of the cycle invokes `handle_exception`,
//! which vectors the next fetch to the handler address. The guest may
//! install a handler and expect linear control flow, so none of this
//! unwinds.

use mips_mem::{BYTES_PER_WORD, MemError, MemFault};

use crate::context::Context;
use crate::cp0;

/// Address of the assembled exception handler.
pub const EXCEPTION_ADDR: u32 = 0x8000_0180;

/// MIPS32 exception codes, as they appear in `Cause.ExcCode`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum ExcCode {
    /// External interrupt.
    Int = 0,
    /// Address error on load or instruction fetch.
    AdEL = 4,
    /// Address error on store.
    AdES = 5,
    /// Bus error on instruction fetch.
    Ibe = 6,
    /// Bus error on data access.
    Dbe = 7,
    /// Syscall error.
    Sys = 8,
    /// Breakpoint.
    Bp = 9,
    /// Reserved instruction.
    Ri = 10,
    /// Coprocessor unusable.
    CpU = 11,
    /// Arithmetic overflow.
    Ov = 12,
    /// Trap.
    Tr = 13,
    /// Floating point exception.
    Fpe = 15,
}

impl Context {
    /// Latch an exception for this cycle.
    ///
    /// Interrupts are ignored while `Status.IE` is clear or `Status.EXL`
    /// is set. In a branch delay slot, EPC records the branch and
    /// `Cause.BD` is set so the handler can re-execute the branch.
    pub fn raise_exception(&mut self, code: ExcCode) {
        if code == ExcCode::Int && !self.regs.interrupts_enabled() {
            return;
        }

        self.regs.exception_occurred = true;
        self.regs.last_exception_addr = self.regs.pc;

        if self.regs.status() & cp0::STATUS_EXL == 0 {
            if self.in_delay_slot {
                self.regs
                    .set_epc((self.regs.pc - BYTES_PER_WORD) & !(BYTES_PER_WORD - 1));
                self.regs.set_cause(self.regs.cause() | cp0::CAUSE_BD);
            } else {
                self.regs.set_epc(self.regs.pc & !(BYTES_PER_WORD - 1));
            }
        }

        self.regs.set_cause(
            (self.regs.cause() & !cp0::CAUSE_EXCCODE) | ((code as u32) << 2),
        );
        // EXL keeps subsequent interrupts from clobbering EPC
        self.regs.set_status(self.regs.status() | cp0::STATUS_EXL);
    }

    /// Latch the exception corresponding to a memory fault and record the
    /// faulting address in `BadVAddr`.
    pub fn raise_mem_fault(&mut self, fault: MemFault) {
        self.regs.set_bad_vaddr(fault.addr());
        let code = match fault {
            MemFault::LoadAddressError(_) => ExcCode::AdEL,
            MemFault::StoreAddressError(_) => ExcCode::AdES,
            MemFault::InstructionBusError(_) => ExcCode::Ibe,
            MemFault::DataBusError(_) => ExcCode::Dbe,
        };
        self.raise_exception(code);
    }

    /// Handle a memory access result: architectural faults are latched,
    /// fatal errors propagate.
    pub(crate) fn absorb_mem_error(&mut self, err: MemError) -> Result<(), mips_mem::FatalError> {
        match err {
            MemError::Fault(fault) => {
                self.raise_mem_fault(fault);
                Ok(())
            }
            MemError::Fatal(fatal) => Err(fatal),
        }
    }

    /// Vector to the exception handler.
    ///
    /// Prints the per-kind diagnostic to this context's stderr, clears
    /// the edge flag and points the next fetch at the handler address.
    pub fn handle_exception(&mut self) {
        let code = self.regs.exc_code();
        log::debug!(
            "ctx {}: exception code {code} at 0x{:08x}",
            self.id(),
            self.regs.last_exception_addr
        );

        if code != ExcCode::Int as u32 {
            let at = self.regs.last_exception_addr;
            self.run_error(&format!("Exception occurred at PC=0x{at:08x}"));
        }

        self.regs.exception_occurred = false;
        self.regs.pc = EXCEPTION_ADDR;

        let bad = self.regs.bad_vaddr();
        match code {
            c if c == ExcCode::Int as u32 => {}
            c if c == ExcCode::AdEL as u32 => {
                self.run_error(&format!("  Unaligned address in inst/data fetch: 0x{bad:08x}"));
            }
            c if c == ExcCode::AdES as u32 => {
                self.run_error(&format!("  Unaligned address in store: 0x{bad:08x}"));
            }
            c if c == ExcCode::Ibe as u32 => {
                self.run_error(&format!("  Bad address in text read: 0x{bad:08x}"));
            }
            c if c == ExcCode::Dbe as u32 => {
                self.run_error(&format!("  Bad address in data/stack read: 0x{bad:08x}"));
            }
            c if c == ExcCode::Sys as u32 => self.run_error("  Error in syscall"),
            c if c == ExcCode::Bp as u32 => {}
            c if c == ExcCode::Ri as u32 => self.run_error("  Reserved instruction execution"),
            c if c == ExcCode::CpU as u32 => self.run_error("  Coprocessor unusable"),
            c if c == ExcCode::Ov as u32 => self.run_error("  Arithmetic overflow"),
            c if c == ExcCode::Tr as u32 => self.run_error("  Trap"),
            c if c == ExcCode::Fpe as u32 => self.run_error("  Floating point"),
            c => self.run_error(&format!("Unknown exception: {c}")),
        }
    }
}
