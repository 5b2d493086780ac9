//! MIPS32 execution engine and per-context state.
//!
//! A [`Context`] bundles one simulated machine: registers, memory,
//! breakpoints and output streams. [`Context::step`] runs one
//! instruction (two, when a delayed branch executes its slot), raising
//! architectural exceptions through the CP0 mechanism and reporting
//! engine halts to the caller.

pub mod cp0;
mod context;
mod exceptions;
mod execute;
pub mod registers;
mod syscall;

pub use context::{Breakpoint, Context, StepResult};
pub use exceptions::{EXCEPTION_ADDR, ExcCode};
pub use registers::RegFile;

pub use mips_mem::FatalError;
