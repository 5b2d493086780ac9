//! The multi-context scheduler.
//!
//! One dedicated worker thread drives every live context in lockstep,
//! one instruction per context per cycle, in ascending context order.
//! Foreign threads issue commands (play/pause/step/delay/breakpoints)
//! and take snapshots between cycles.
//!
//! Two locks, one condition variable:
//! - the *settings* mutex guards the step budget, delay, finished flag
//!   and the edge-triggered status code; the worker holds it only across
//!   its cycle gate
//! - the *simulator* mutex guards the context table for the duration of
//!   one cycle; readers take it with a timeout so a slow UI cannot stall
//!   the engine

use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, Condvar, Mutex};
use std::thread::JoinHandle;
use std::time::Duration;

use emu_core::SimConfig;
use mips_cpu::{Context, StepResult};

use crate::program::{ProgramImage, load_program};
use crate::snapshot::Snapshot;

/// Edge-triggered scheduler status, cleared on read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum SimStatus {
    /// A breakpoint was encountered.
    Breakpoint = -1,
    /// Nothing changed since the last read.
    NoChange = 0,
    /// Every live context has terminated.
    Finished = 1,
    /// The worker is parked waiting for a step budget.
    Waiting = 2,
    /// At least one cycle ran since the last read.
    Stepped = 3,
}

impl SimStatus {
    /// The status as its wire code (`-1` breakpoint .. `3` stepped).
    #[must_use]
    pub fn code(self) -> i32 {
        self as i32
    }
}

/// Externally adjustable run settings, guarded by the settings mutex.
struct Settings {
    /// Remaining step budget; `None` is unbounded (play).
    steps_left: Option<u64>,
    /// Cooperative shutdown flag for the worker.
    finished: bool,
    status: SimStatus,
    /// Inter-cycle delay for visualization throttling.
    cycle_delay: Duration,
    cycles_elapsed: u64,
}

impl Settings {
    fn new() -> Self {
        Self {
            steps_left: Some(0),
            finished: false,
            status: SimStatus::NoChange,
            cycle_delay: Duration::ZERO,
            cycles_elapsed: 0,
        }
    }
}

/// The context table, guarded by the simulator mutex.
pub(crate) struct ContextTable {
    pub(crate) contexts: BTreeMap<u32, Context>,
    /// Contexts still executing; halted ones stay in `contexts` for
    /// inspection but leave this set.
    pub(crate) live: BTreeSet<u32>,
}

pub(crate) struct Shared {
    settings: Mutex<Settings>,
    steps_cv: Condvar,
    pub(crate) table: parking_lot::Mutex<ContextTable>,
}

/// What one lockstep cycle produced.
struct CycleResult {
    /// Contexts whose PC matched a breakpoint; nothing executed.
    breakpoints: Vec<(u32, u32)>,
    /// Contexts that halted this cycle.
    finished: Vec<u32>,
    /// No live contexts remain.
    all_halted: bool,
}

/// The multi-context simulator.
pub struct Simulator {
    shared: Arc<Shared>,
    worker: Option<JoinHandle<()>>,
}

impl Default for Simulator {
    fn default() -> Self {
        Self::new()
    }
}

impl Simulator {
    #[must_use]
    pub fn new() -> Self {
        Self {
            shared: Arc::new(Shared {
                settings: Mutex::new(Settings::new()),
                steps_cv: Condvar::new(),
                table: parking_lot::Mutex::new(ContextTable {
                    contexts: BTreeMap::new(),
                    live: BTreeSet::new(),
                }),
            }),
            worker: None,
        }
    }

    /// Tear down any running worker and start over with freshly built,
    /// freshly loaded contexts.
    pub fn reset(&mut self, contexts: BTreeMap<u32, Context>) {
        self.shutdown();

        {
            let mut table = self.shared.table.lock();
            table.live = contexts.keys().copied().collect();
            table.contexts = contexts;
        }
        {
            let mut settings = self
                .shared
                .settings
                .lock()
                .unwrap_or_else(std::sync::PoisonError::into_inner);
            if settings.cycles_elapsed > 0 {
                log::info!("the last program ran for {} cycles", settings.cycles_elapsed);
            }
            *settings = Settings::new();
        }

        let shared = Arc::clone(&self.shared);
        self.worker = Some(std::thread::spawn(move || worker_loop(&shared)));
    }

    /// Rebuild hosted contexts for the active set and restart the
    /// worker: ids at or above `max_contexts` are ignored, ids without a
    /// program image are skipped.
    pub fn reset_images(
        &mut self,
        max_contexts: u32,
        active: &[u32],
        images: &BTreeMap<u32, ProgramImage>,
        cfg: SimConfig,
    ) {
        let mut contexts = BTreeMap::new();
        for &id in active {
            if id >= max_contexts {
                continue;
            }
            let Some(image) = images.get(&id) else {
                continue;
            };
            let mut ctx = Context::new(id, cfg);
            if let Err(err) = load_program(&mut ctx, image) {
                log::warn!("ctx {id}: {err}");
                continue;
            }
            ctx.initialize_stack(&[]);
            contexts.insert(id, ctx);
        }
        self.reset(contexts);
    }

    /// Cooperatively stop and join the worker.
    pub fn shutdown(&mut self) {
        {
            let mut settings = self
                .shared
                .settings
                .lock()
                .unwrap_or_else(std::sync::PoisonError::into_inner);
            settings.finished = true;
            self.shared.steps_cv.notify_all();
        }
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }

    /// Add `n` cycles to the step budget and wake the worker.
    pub fn step(&self, n: u64) {
        let mut settings = self.lock_settings();
        settings.steps_left = Some(settings.steps_left.unwrap_or(0) + n);
        self.shared.steps_cv.notify_all();
    }

    /// Run unbounded until pause, breakpoint or termination.
    pub fn play(&self) {
        let mut settings = self.lock_settings();
        settings.steps_left = None;
        self.shared.steps_cv.notify_all();
    }

    /// Clear the step budget; the worker parks at its next gate.
    pub fn pause(&self) {
        let mut settings = self.lock_settings();
        settings.steps_left = Some(0);
        self.shared.steps_cv.notify_all();
    }

    /// Throttle execution for visualization.
    pub fn set_delay(&self, usec: u64) {
        let mut settings = self.lock_settings();
        settings.cycle_delay = Duration::from_micros(usec);
    }

    /// Read and clear the edge-triggered status.
    #[must_use]
    pub fn status(&self) -> SimStatus {
        let mut settings = self.lock_settings();
        std::mem::replace(&mut settings.status, SimStatus::NoChange)
    }

    /// Total cycles executed since the last reset.
    #[must_use]
    pub fn cycles_elapsed(&self) -> u64 {
        self.lock_settings().cycles_elapsed
    }

    /// Set a breakpoint in one context. Ordered at a cycle boundary by
    /// the simulator lock. Returns false if the context does not exist.
    pub fn add_breakpoint(&self, ctx: u32, addr: u32) -> bool {
        let mut table = self.shared.table.lock();
        match table.contexts.get_mut(&ctx) {
            Some(context) => {
                context.add_breakpoint(addr);
                true
            }
            None => false,
        }
    }

    /// Remove a breakpoint in one context. Returns false if the context
    /// or the breakpoint does not exist.
    pub fn delete_breakpoint(&self, ctx: u32, addr: u32) -> bool {
        let mut table = self.shared.table.lock();
        match table.contexts.get_mut(&ctx) {
            Some(context) => context.delete_breakpoint(addr),
            None => false,
        }
    }

    /// Take the simulator lock for a consistent between-cycles snapshot.
    ///
    /// Returns `None` if the worker held the lock for the whole timeout.
    /// Views obtained from the snapshot are valid only until it drops.
    #[must_use]
    pub fn try_lock(&self, timeout: Duration) -> Option<Snapshot<'_>> {
        self.shared
            .table
            .try_lock_for(timeout)
            .map(Snapshot::new)
    }

    fn lock_settings(&self) -> std::sync::MutexGuard<'_, Settings> {
        self.shared
            .settings
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

impl Drop for Simulator {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// The simulator thread.
fn worker_loop(shared: &Shared) {
    let mut settings = shared
        .settings
        .lock()
        .unwrap_or_else(std::sync::PoisonError::into_inner);
    let mut cont_bkpt = false;

    loop {
        // === Cycle gate ===
        let delay = settings.cycle_delay;
        let mut slept_for_delay = false;
        while !settings.finished
            && (settings.steps_left == Some(0) || (!delay.is_zero() && !slept_for_delay))
        {
            if settings.steps_left == Some(0) {
                // Don't clobber an unread breakpoint report with Waiting
                if matches!(settings.status, SimStatus::NoChange | SimStatus::Stepped) {
                    settings.status = SimStatus::Waiting;
                }
                settings = shared
                    .steps_cv
                    .wait(settings)
                    .unwrap_or_else(std::sync::PoisonError::into_inner);
            } else {
                settings = shared
                    .steps_cv
                    .wait_timeout(settings, delay)
                    .map(|(guard, _)| guard)
                    .unwrap_or_else(|e| e.into_inner().0);
            }
            slept_for_delay = true;
        }
        if settings.finished {
            break;
        }

        if settings.status != SimStatus::Stepped {
            settings.status = SimStatus::NoChange;
        }
        if let Some(n) = settings.steps_left.as_mut() {
            *n -= 1;
        }
        drop(settings);

        // === One lockstep cycle ===
        let result = {
            let mut table = shared.table.lock();
            run_cycle(&mut table, cont_bkpt)
        };

        settings = shared
            .settings
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        settings.cycles_elapsed += 1;
        settings.status = SimStatus::Stepped;
        cont_bkpt = false;

        if !result.breakpoints.is_empty() {
            // Halt before the instruction retires; the next cycle steps
            // past the breakpoint.
            cont_bkpt = true;
            settings.steps_left = Some(0);
            settings.status = SimStatus::Breakpoint;
        }

        if !result.finished.is_empty() && result.all_halted {
            settings.finished = true;
            settings.status = SimStatus::Finished;
            break;
        }
    }

    let cycles = settings.cycles_elapsed;
    drop(settings);

    // Flush every context's streams on the way out
    let mut table = shared.table.lock();
    for context in table.contexts.values_mut() {
        context.flush();
    }
    log::debug!("simulator worker exiting after {cycles} cycles");
}

/// Execute one cycle across all live contexts.
///
/// If any live context's PC sits on a breakpoint (and we are not
/// stepping past one), nothing executes and the hits are reported.
/// Otherwise every live context steps once, in ascending id order.
fn run_cycle(table: &mut ContextTable, cont_bkpt: bool) -> CycleResult {
    let mut result = CycleResult {
        breakpoints: Vec::new(),
        finished: Vec::new(),
        all_halted: false,
    };

    if !cont_bkpt {
        let live = table.live.clone();
        for id in &live {
            let context = table
                .contexts
                .get_mut(id)
                .expect("live context must exist");
            let pc = context.regs.pc;
            if context.has_breakpoint(pc) {
                context.run_error(&format!("Breakpoint encountered at 0x{pc:08x}"));
                result.breakpoints.push((*id, pc));
            }
        }
        if !result.breakpoints.is_empty() {
            return result;
        }
    }

    let live = table.live.clone();
    for id in &live {
        let context = table
            .contexts
            .get_mut(id)
            .expect("live context must exist");
        match context.step(false) {
            Ok(StepResult::Continue) => {}
            Ok(StepResult::Breakpoint) => {
                let pc = context.regs.pc;
                context.run_error(&format!("Breakpoint encountered at 0x{pc:08x}"));
                result.breakpoints.push((*id, pc));
            }
            Ok(StepResult::Halted) => {
                context.run_error("Execution finished");
                context.flush();
                result.finished.push(*id);
                table.live.remove(id);
            }
            Err(fatal) => {
                // Fatal errors bypass the scheduler entirely
                context.run_error(&fatal.to_string());
                context.flush();
                log::error!("ctx {id}: fatal error: {fatal}");
                std::process::exit(-1);
            }
        }
    }

    result.all_halted = table.live.is_empty();
    result
}
