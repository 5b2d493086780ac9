//! Scheduler tests: lockstep stepping, breakpoints, termination and the
//! snapshot reader.

use std::collections::BTreeMap;
use std::time::{Duration, Instant};

use emu_core::{BufferSink, SimConfig};
use emu_mips::{Context, ProgramImage, SimStatus, Simulator, load_program};
use mips_inst::{Instruction, Op};
use mips_mem::TEXT_BOT;

const T0: u8 = 8;
const V0: u8 = 2;
const ZERO: u8 = 0;

const POLL: Duration = Duration::from_millis(1);
const DEADLINE: Duration = Duration::from_secs(10);
const LOCK_TIMEOUT: Duration = Duration::from_millis(500);

fn captured_context(id: u32, image: &ProgramImage) -> (Context, BufferSink) {
    let (mut ctx, out, _err) = Context::with_captured_output(id, SimConfig::default());
    load_program(&mut ctx, image).unwrap();
    ctx.initialize_stack(&[]);
    (ctx, out)
}

/// An exit-with-success program.
fn exit_image() -> ProgramImage {
    ProgramImage::from_instructions(vec![
        Instruction::itype(Op::Addi, V0, ZERO, 10),
        Instruction::bare(Op::Syscall),
    ])
}

/// `$t0 += 1` forever; the back-edge branch sits at `TEXT_BOT + 4`.
fn loop_image() -> ProgramImage {
    ProgramImage::from_instructions(vec![
        Instruction::itype(Op::Addi, T0, T0, 1),
        Instruction::itype(Op::Beq, ZERO, ZERO, -1),
    ])
}

/// Poll the edge-triggered status until `wanted` shows up.
fn wait_for_status(sim: &Simulator, wanted: SimStatus) {
    let start = Instant::now();
    loop {
        if sim.status() == wanted {
            return;
        }
        assert!(
            start.elapsed() < DEADLINE,
            "timed out waiting for status {wanted:?}"
        );
        std::thread::sleep(POLL);
    }
}

#[test]
fn single_context_runs_to_completion() {
    let (ctx, out) = captured_context(
        0,
        &ProgramImage::from_instructions(vec![
            Instruction::itype(Op::Addi, T0, ZERO, 2),
            Instruction::itype(Op::Addi, 9, ZERO, 3),
            Instruction::rtype(Op::Add, 10, T0, 9),
            Instruction::itype(Op::Addi, V0, ZERO, 1),
            Instruction::rtype(Op::Addu, 4, ZERO, 10),
            Instruction::bare(Op::Syscall),
            Instruction::itype(Op::Addi, V0, ZERO, 10),
            Instruction::bare(Op::Syscall),
        ]),
    );

    let mut sim = Simulator::new();
    sim.reset(BTreeMap::from([(0, ctx)]));
    sim.play();
    wait_for_status(&sim, SimStatus::Finished);

    assert_eq!(out.contents_string(), "5");
    assert!(sim.cycles_elapsed() >= 8);

    let snap = sim.try_lock(LOCK_TIMEOUT).expect("worker has exited");
    assert!(!snap.is_live(0));
    assert_eq!(snap.context(0).unwrap().exit_code, Some(0));
}

#[test]
fn step_budget_executes_exactly_n_cycles() {
    let (ctx, _out) = captured_context(0, &loop_image());
    let mut sim = Simulator::new();
    sim.reset(BTreeMap::from([(0, ctx)]));

    sim.step(3);

    let start = Instant::now();
    loop {
        {
            let snap = sim.try_lock(LOCK_TIMEOUT).expect("snapshot");
            if sim.cycles_elapsed() == 3 {
                // 3 cycles of the 2-instruction loop: addi, beq, addi
                assert_eq!(snap.gprs(0).unwrap()[T0 as usize], 2);
                break;
            }
        }
        assert!(start.elapsed() < DEADLINE, "budget never drained");
        std::thread::sleep(POLL);
    }

    // Paused now: the cycle count must not move
    std::thread::sleep(Duration::from_millis(20));
    assert_eq!(sim.cycles_elapsed(), 3);
}

#[test]
fn pause_parks_the_worker_between_cycles() {
    let (ctx, _out) = captured_context(0, &loop_image());
    let mut sim = Simulator::new();
    sim.reset(BTreeMap::from([(0, ctx)]));

    sim.play();
    std::thread::sleep(Duration::from_millis(10));
    sim.pause();
    wait_for_status(&sim, SimStatus::Waiting);

    let cycles = sim.cycles_elapsed();
    std::thread::sleep(Duration::from_millis(20));
    assert_eq!(sim.cycles_elapsed(), cycles, "no cycles while paused");

    // Snapshots under pause are stable
    let pc1 = sim.try_lock(LOCK_TIMEOUT).unwrap().special_registers(0).unwrap()[0];
    let pc2 = sim.try_lock(LOCK_TIMEOUT).unwrap().special_registers(0).unwrap()[0];
    assert_eq!(pc1, pc2);
}

#[test]
fn two_contexts_one_breakpoint() {
    let (looper, _lout) = captured_context(0, &loop_image());
    let (exiter, _eout) = captured_context(1, &exit_image());

    let mut sim = Simulator::new();
    sim.reset(BTreeMap::from([(0, looper), (1, exiter)]));

    let back_edge = TEXT_BOT + 4;
    assert!(sim.add_breakpoint(0, back_edge));
    assert!(!sim.add_breakpoint(7, back_edge), "no such context");

    sim.play();
    wait_for_status(&sim, SimStatus::Breakpoint);

    {
        let snap = sim.try_lock(LOCK_TIMEOUT).expect("snapshot at breakpoint");
        // Context 0 halted before the branch retired
        assert_eq!(snap.special_registers(0).unwrap()[0], back_edge);
        assert_eq!(snap.gprs(0).unwrap()[T0 as usize], 1);
        // Context 1 ran its first instruction independently
        assert_eq!(snap.gprs(1).unwrap()[V0 as usize], 10);
        assert!(snap.is_live(1), "exit syscall not reached yet");
    }

    // Resume: the branch at the breakpoint executes exactly once and
    // context 1 finishes on its syscall
    sim.step(2);
    let start = Instant::now();
    loop {
        {
            let snap = sim.try_lock(LOCK_TIMEOUT).expect("snapshot");
            if !snap.is_live(1) {
                assert_eq!(snap.context(1).unwrap().exit_code, Some(0));
                break;
            }
        }
        assert!(start.elapsed() < DEADLINE, "context 1 never finished");
        std::thread::sleep(POLL);
    }
}

#[test]
fn breakpoint_add_delete_round_trip() {
    let (ctx, _out) = captured_context(0, &loop_image());
    let mut sim = Simulator::new();
    sim.reset(BTreeMap::from([(0, ctx)]));

    assert!(sim.add_breakpoint(0, TEXT_BOT));
    assert!(sim.delete_breakpoint(0, TEXT_BOT));
    assert!(!sim.delete_breakpoint(0, TEXT_BOT), "already gone");

    // With the map back to empty, the loop runs unimpeded
    sim.step(4);
    let start = Instant::now();
    while sim.cycles_elapsed() < 4 {
        assert!(start.elapsed() < DEADLINE);
        std::thread::sleep(POLL);
    }
    assert_ne!(sim.status(), SimStatus::Breakpoint);
}

#[test]
fn reset_rebuilds_pristine_state() {
    let (ctx, _out) = captured_context(0, &loop_image());
    let mut sim = Simulator::new();
    sim.reset(BTreeMap::from([(0, ctx)]));
    sim.step(5);

    let start = Instant::now();
    while sim.cycles_elapsed() < 5 {
        assert!(start.elapsed() < DEADLINE);
        std::thread::sleep(POLL);
    }

    // Rebuild: same image, fresh context
    let (fresh, _out2) = captured_context(0, &loop_image());
    sim.reset(BTreeMap::from([(0, fresh)]));

    assert_eq!(sim.cycles_elapsed(), 0);
    let snap = sim.try_lock(LOCK_TIMEOUT).expect("snapshot after reset");
    assert_eq!(snap.special_registers(0).unwrap()[0], TEXT_BOT);
    assert_eq!(snap.gprs(0).unwrap()[T0 as usize], 0);
}

#[test]
fn snapshot_views_cover_the_register_surface() {
    let (ctx, _out) = captured_context(0, &exit_image());
    let mut sim = Simulator::new();
    sim.reset(BTreeMap::from([(0, ctx)]));

    let snap = sim.try_lock(LOCK_TIMEOUT).expect("snapshot");
    assert_eq!(snap.context_ids(), vec![0]);
    assert_eq!(snap.gprs(0).unwrap().len(), 32);
    assert_eq!(snap.fprs_single(0).unwrap().len(), 32);
    assert_eq!(snap.fprs_double(0).unwrap().len(), 16);
    let special = snap.special_registers(0).unwrap();
    assert_eq!(special[0], TEXT_BOT); // PC
    assert!(!snap.stack_words(0).unwrap().is_empty());

    let text = snap.user_text(0).unwrap();
    assert!(text.contains("syscall"));
    let k_text = snap.kernel_text(0).unwrap();
    assert!(k_text.contains("eret"), "default handler installed");
}

#[test]
fn reset_images_builds_only_active_contexts_with_programs() {
    let mut images = BTreeMap::new();
    images.insert(0u32, loop_image());
    images.insert(1, exit_image());
    images.insert(9, exit_image());

    let mut sim = Simulator::new();
    // 5 has no image, 9 is above the context limit
    sim.reset_images(2, &[0, 1, 5, 9], &images, SimConfig::default());

    let snap = sim.try_lock(LOCK_TIMEOUT).expect("snapshot");
    assert_eq!(snap.context_ids(), vec![0, 1]);
    assert!(snap.is_live(0) && snap.is_live(1));
    assert_eq!(snap.special_registers(0).unwrap()[0], TEXT_BOT);
}

#[test]
fn status_reads_are_edge_triggered() {
    let (ctx, _out) = captured_context(0, &exit_image());
    let mut sim = Simulator::new();
    sim.reset(BTreeMap::from([(0, ctx)]));
    sim.play();
    wait_for_status(&sim, SimStatus::Finished);
    assert_eq!(sim.status(), SimStatus::NoChange, "cleared on read");
}
