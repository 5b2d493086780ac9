//! The per-context container.
//!
//! A `Context` is one isolated simulator instance: its memory image, its
//! registers, its breakpoints and its own output streams. Contexts never
//! share mutable state; observers go through the scheduler's lock.

use std::collections::HashMap;
use std::fs::File;
use std::io::BufRead;
use std::sync::Arc;

use emu_core::{BufferSink, HostSink, Observable, OutputSink, SimConfig, Value};
use mips_inst::Instruction;
use mips_mem::{BYTES_PER_WORD, MemImage, STACK_TOP};

use crate::registers::{REG_A0, REG_A1, REG_A2, REG_SP, RegFile};

/// Result of one engine cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepResult {
    /// Execution can continue.
    Continue,
    /// A debugger `break` was retired; the scheduler should pause.
    Breakpoint,
    /// The context cannot continue (exit syscall, engine halt).
    Halted,
}

/// A breakpoint: the address and the instruction it shadows.
#[derive(Debug, Clone)]
pub struct Breakpoint {
    pub addr: u32,
    pub inst: Option<Arc<Instruction>>,
}

/// Destination of an in-flight delayed load.
#[derive(Debug, Clone, Copy)]
pub(crate) enum LoadDest {
    Gpr(u8),
    /// FPU word slot (for `lwc1`/`ldc1`).
    Fpr(u8),
}

/// One stage of the delayed-load shift register.
#[derive(Debug, Clone, Copy)]
pub(crate) struct PendingLoad {
    pub dest: LoadDest,
    pub value: u32,
}

/// One isolated simulator instance.
pub struct Context {
    id: u32,
    pub cfg: SimConfig,
    pub mem: MemImage,
    pub regs: RegFile,
    breakpoints: HashMap<u32, Breakpoint>,
    pub(crate) stdout: Box<dyn OutputSink>,
    pub(crate) stderr: Box<dyn OutputSink>,
    /// Console line source for the read syscalls; `None` reads host stdin.
    pub(crate) input: Option<Box<dyn BufRead + Send>>,
    /// Host files opened by the guest; index + 3 is the guest fd.
    pub(crate) files: Vec<Option<File>>,
    /// Two-stage delayed-load pipeline.
    pub(crate) pending_load: [Option<PendingLoad>; 2],
    /// Executing the instruction in a taken branch's delay slot.
    pub(crate) in_delay_slot: bool,
    /// Branch target awaiting its delay slot.
    pub(crate) pending_branch: Option<u32>,
    /// Set by the exit syscalls.
    pub exit_code: Option<i32>,
}

impl Context {
    /// Create a context wired to the process streams.
    #[must_use]
    pub fn new(id: u32, cfg: SimConfig) -> Self {
        Self::with_sinks(
            id,
            cfg,
            Box::new(HostSink::stdout(id)),
            Box::new(HostSink::stderr(id)),
        )
    }

    /// Create a context with caller-supplied sinks (embedded builds,
    /// tests).
    #[must_use]
    pub fn with_sinks(
        id: u32,
        cfg: SimConfig,
        stdout: Box<dyn OutputSink>,
        stderr: Box<dyn OutputSink>,
    ) -> Self {
        Self {
            id,
            cfg,
            mem: MemImage::new(&cfg),
            regs: RegFile::new(),
            breakpoints: HashMap::new(),
            stdout,
            stderr,
            input: None,
            files: Vec::new(),
            pending_load: [None, None],
            in_delay_slot: false,
            pending_branch: None,
            exit_code: None,
        }
    }

    /// Create a context capturing both streams into buffers.
    #[must_use]
    pub fn with_captured_output(id: u32, cfg: SimConfig) -> (Self, BufferSink, BufferSink) {
        let out = BufferSink::new();
        let err = BufferSink::new();
        let ctx = Self::with_sinks(id, cfg, Box::new(out.clone()), Box::new(err.clone()));
        (ctx, out, err)
    }

    #[must_use]
    pub fn id(&self) -> u32 {
        self.id
    }

    /// Replace the console input source (tests inject buffers here).
    pub fn set_input(&mut self, input: Box<dyn BufRead + Send>) {
        self.input = Some(input);
    }

    /// Flush both output streams.
    pub fn flush(&mut self) {
        self.stdout.flush();
        self.stderr.flush();
    }

    /// Report a run-time error on this context's stderr. Execution
    /// normally continues; the caller decides whether to halt.
    pub fn run_error(&mut self, msg: &str) {
        self.stderr.write(msg.as_bytes());
        if !msg.ends_with('\n') {
            self.stderr.write(b"\n");
        }
    }

    // === Breakpoints ===

    /// Set a breakpoint. Setting one where one already exists is a no-op
    /// success.
    pub fn add_breakpoint(&mut self, addr: u32) {
        if self.breakpoints.contains_key(&addr) {
            return;
        }
        let inst = self.mem.inst_at(addr).cloned();
        self.breakpoints.insert(addr, Breakpoint { addr, inst });
    }

    /// Delete a breakpoint. Reports a soft error if none exists.
    pub fn delete_breakpoint(&mut self, addr: u32) -> bool {
        if self.breakpoints.remove(&addr).is_some() {
            true
        } else {
            self.run_error(&format!("No breakpoint to delete at 0x{addr:08x}"));
            false
        }
    }

    #[must_use]
    pub fn has_breakpoint(&self, addr: u32) -> bool {
        self.breakpoints.contains_key(&addr)
    }

    /// All breakpoint addresses, unordered.
    #[must_use]
    pub fn breakpoints(&self) -> Vec<u32> {
        self.breakpoints.keys().copied().collect()
    }

    // === Startup state ===

    /// Build the startup stack image: argument strings high on the
    /// stack, a null-terminated argv vector below them, `$a0 = argc`,
    /// `$a1 = &argv`, argc left on the stack, `$sp` double-word aligned.
    pub fn initialize_stack(&mut self, args: &[&str]) {
        self.regs.r[REG_SP] = STACK_TOP - 1;

        let mut addrs = Vec::with_capacity(args.len());
        for arg in args {
            addrs.push(self.push_str(arg));
        }

        // Word-align, reserve the first free word, then double-word align
        let sp = self.regs.r[REG_SP] & !3;
        self.regs.r[REG_SP] = (sp - BYTES_PER_WORD) & !7;

        // env vector: just the terminator
        self.push_word(0);
        self.regs.r[REG_A2] = self.regs.r[REG_SP] + BYTES_PER_WORD;

        // argv vector, last argument first
        self.push_word(0);
        for addr in addrs.iter().rev() {
            self.regs.r[REG_A1] = self.push_word(*addr);
        }

        self.regs.r[REG_A0] = args.len() as u32;
        let sp = self.regs.r[REG_SP];
        let _ = self.mem.write_word(sp, args.len() as u32);
    }

    /// Copy a NUL-terminated string downward from `$sp`; returns its
    /// address.
    fn push_str(&mut self, s: &str) -> u32 {
        let bytes = s.as_bytes();
        let mut i = bytes.len() as i64;
        // NUL first, then the characters, moving down
        while i >= 0 {
            let b = if i == bytes.len() as i64 { 0 } else { bytes[i as usize] };
            let sp = self.regs.r[REG_SP];
            let _ = self.mem.write_byte(sp, u32::from(b));
            self.regs.r[REG_SP] -= 1;
            i -= 1;
        }
        self.regs.r[REG_SP] + 1
    }

    /// Push one word at `$sp` and step down; returns the word's address.
    fn push_word(&mut self, v: u32) -> u32 {
        let sp = self.regs.r[REG_SP];
        let _ = self.mem.write_word(sp, v);
        self.regs.r[REG_SP] -= BYTES_PER_WORD;
        self.regs.r[REG_SP] + BYTES_PER_WORD
    }
}

impl Observable for Context {
    fn query(&self, path: &str) -> Option<Value> {
        if let Some(n) = path.strip_prefix("gpr.") {
            let n: usize = n.parse().ok()?;
            return self.regs.r.get(n).map(|v| Value::U32(*v));
        }
        match path {
            "pc" => Some(Value::U32(self.regs.pc)),
            "hi" => Some(Value::U32(self.regs.hi)),
            "lo" => Some(Value::U32(self.regs.lo)),
            "cp0.status" => Some(Value::U32(self.regs.status())),
            "cp0.cause" => Some(Value::U32(self.regs.cause())),
            "cp0.epc" => Some(Value::U32(self.regs.epc())),
            "cp0.badvaddr" => Some(Value::U32(self.regs.bad_vaddr())),
            _ => None,
        }
    }

    fn query_paths(&self) -> &'static [&'static str] {
        &[
            "pc",
            "hi",
            "lo",
            "gpr.<n>",
            "cp0.status",
            "cp0.cause",
            "cp0.epc",
            "cp0.badvaddr",
        ]
    }
}
