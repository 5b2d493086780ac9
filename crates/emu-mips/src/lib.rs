//! Multi-context MIPS32 simulator.
//!
//! Runs any number of independent simulator contexts in lockstep under
//! one worker thread. An embedding host loads a [`ProgramImage`] per
//! context, drives execution with play/pause/step commands and inspects
//! state through the timed snapshot lock:
//!
//! ```no_run
//! use std::collections::BTreeMap;
//! use std::time::Duration;
//!
//! use emu_core::SimConfig;
//! use emu_mips::{ProgramImage, Simulator, load_program};
//! use mips_cpu::Context;
//! use mips_inst::{Instruction, Op};
//!
//! let cfg = SimConfig::default();
//! let mut ctx = Context::new(0, cfg);
//! let image = ProgramImage::from_instructions(vec![
//!     Instruction::itype(Op::Addi, 2, 0, 10), // $v0 = exit
//!     Instruction::bare(Op::Syscall),
//! ]);
//! load_program(&mut ctx, &image).unwrap();
//! ctx.initialize_stack(&[]);
//!
//! let mut sim = Simulator::new();
//! sim.reset(BTreeMap::from([(0, ctx)]));
//! sim.play();
//!
//! while sim.status().code() != 1 {
//!     std::thread::sleep(Duration::from_millis(1));
//! }
//! if let Some(snap) = sim.try_lock(Duration::from_millis(100)) {
//!     println!("{}", snap.user_text(0).unwrap());
//! }
//! ```

mod program;
mod scheduler;
mod snapshot;

pub use program::{LoadError, ProgramImage, load_program};
pub use scheduler::{SimStatus, Simulator};
pub use snapshot::Snapshot;

pub use emu_core::SimConfig;
pub use mips_cpu::{Context, StepResult};
