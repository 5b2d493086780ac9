//! End-to-end tests for instruction behavior: load a short program,
//! step the engine, assert on registers, memory and output.

use emu_core::SimConfig;
use mips_cpu::{Context, EXCEPTION_ADDR, ExcCode, StepResult, cp0};
use mips_inst::{HalfSelect, ImmExpr, Instruction, Op, SymbolRef};
use mips_mem::{DATA_BOT, TEXT_BOT};

const T0: u8 = 8;
const T1: u8 = 9;
const T2: u8 = 10;
const T3: u8 = 11;
const V0: u8 = 2;
const A0: u8 = 4;
const ZERO: u8 = 0;

fn context(cfg: SimConfig) -> (Context, emu_core::BufferSink) {
    let (ctx, out, _err) = Context::with_captured_output(0, cfg);
    (ctx, out)
}

fn load_program(ctx: &mut Context, insts: &[Instruction]) {
    for (i, inst) in insts.iter().enumerate() {
        ctx.mem
            .write_inst(TEXT_BOT + 4 * i as u32, inst.clone())
            .unwrap();
    }
    ctx.regs.pc = TEXT_BOT;
}

fn run(ctx: &mut Context, steps: usize) -> StepResult {
    let mut last = StepResult::Continue;
    for _ in 0..steps {
        last = ctx.step(false).unwrap();
        if last != StepResult::Continue {
            break;
        }
    }
    last
}

#[test]
fn hello_add_prints_five() {
    let (mut ctx, out) = context(SimConfig::default());
    load_program(
        &mut ctx,
        &[
            Instruction::itype(Op::Addi, T0, ZERO, 2),
            Instruction::itype(Op::Addi, T1, ZERO, 3),
            Instruction::rtype(Op::Add, T2, T0, T1),
            Instruction::itype(Op::Addi, V0, ZERO, 1), // print_int
            Instruction::rtype(Op::Addu, A0, ZERO, T2),
            Instruction::bare(Op::Syscall),
            Instruction::itype(Op::Addi, V0, ZERO, 10), // exit
            Instruction::bare(Op::Syscall),
        ],
    );

    let result = run(&mut ctx, 10);
    assert_eq!(result, StepResult::Halted);
    assert_eq!(ctx.exit_code, Some(0));
    assert_eq!(out.contents_string(), "5");
}

#[test]
fn register_zero_reads_zero_after_every_step() {
    let (mut ctx, _) = context(SimConfig::default());
    load_program(
        &mut ctx,
        &[
            Instruction::itype(Op::Addi, ZERO, ZERO, 42), // write to $zero
            Instruction::rtype(Op::Add, T0, ZERO, ZERO),
        ],
    );
    ctx.step(false).unwrap();
    ctx.step(false).unwrap();
    assert_eq!(ctx.regs.r[0], 0);
    assert_eq!(ctx.regs.r[T0 as usize], 0);
}

#[test]
fn signed_overflow_raises_ov_and_preserves_dest() {
    let (mut ctx, _) = context(SimConfig::default());
    load_program(
        &mut ctx,
        &[
            Instruction::itype(Op::Lui, T0, ZERO, 0x7fff),
            Instruction::itype(Op::Ori, T0, T0, -1), // 0x7fffffff
            Instruction::itype(Op::Addi, T1, ZERO, 1),
            Instruction::rtype(Op::Add, T2, T0, T1),
        ],
    );
    ctx.regs.r[T2 as usize] = 0x1234;
    let add_addr = TEXT_BOT + 12;

    run(&mut ctx, 4);

    assert_eq!(ctx.regs.exc_code(), ExcCode::Ov as u32);
    assert_eq!(ctx.regs.epc(), add_addr);
    assert_eq!(ctx.regs.r[T2 as usize], 0x1234, "dest must be unchanged");
    // Execution vectored into the handler
    assert_eq!(ctx.regs.pc, EXCEPTION_ADDR);
}

#[test]
fn addu_never_overflows() {
    let (mut ctx, _) = context(SimConfig::default());
    load_program(
        &mut ctx,
        &[
            Instruction::itype(Op::Lui, T0, ZERO, 0x7fff),
            Instruction::itype(Op::Ori, T0, T0, -1),
            Instruction::itype(Op::Addi, T1, ZERO, 1),
            Instruction::rtype(Op::Addu, T2, T0, T1),
        ],
    );
    run(&mut ctx, 4);
    assert_eq!(ctx.regs.r[T2 as usize], 0x8000_0000);
    assert!(!ctx.regs.exception_occurred);
}

#[test]
fn unaligned_load_faults_with_bad_vaddr() {
    let (mut ctx, _) = context(SimConfig::default());
    load_program(&mut ctx, &[Instruction::itype(Op::Lw, T0, ZERO, 1)]);

    let result = ctx.step(false).unwrap();

    assert_eq!(result, StepResult::Continue);
    assert_eq!(ctx.regs.exc_code(), ExcCode::AdEL as u32);
    assert_eq!(ctx.regs.bad_vaddr(), 1);
    assert_eq!(ctx.regs.pc, EXCEPTION_ADDR, "continues into the handler");
}

#[test]
fn stack_auto_grows_on_store_far_below_bottom() {
    let (mut ctx, _) = context(SimConfig::default());
    let addr = 0x7fff_eff0 - 0x0010_0000;
    load_program(
        &mut ctx,
        &[
            Instruction::itype(Op::Lui, T0, ZERO, (addr >> 16) as i16),
            Instruction::itype(Op::Ori, T0, T0, (addr & 0xffff) as i16),
            Instruction::itype(Op::Lui, T1, ZERO, 0xdead_u16 as i16),
            Instruction::itype(Op::Ori, T1, T1, 0xbeef_u16 as i16),
            Instruction::itype(Op::Sw, T1, T0, 0),
            Instruction::itype(Op::Lw, T2, T0, 0),
        ],
    );
    run(&mut ctx, 6);
    assert!(!ctx.regs.exception_occurred);
    assert_eq!(ctx.regs.r[T2 as usize], 0xdead_beef);
    assert_eq!(ctx.mem.read_word(addr).unwrap(), 0xdead_beef);
}

#[test]
fn delayed_load_lands_two_cycles_later() {
    let cfg = SimConfig {
        delayed_loads: true,
        ..SimConfig::default()
    };
    let (mut ctx, _) = context(cfg);
    ctx.mem.write_word(DATA_BOT, 77).unwrap();
    load_program(
        &mut ctx,
        &[
            Instruction::itype(Op::Lui, T1, ZERO, 0x1000), // $t1 = DATA_BOT
            Instruction::itype(Op::Lw, T0, T1, 0),
            Instruction::rtype(Op::Addu, T2, T0, ZERO), // sees the old value
            Instruction::rtype(Op::Addu, T3, T0, ZERO), // sees the loaded value
        ],
    );
    ctx.regs.r[T0 as usize] = 5;

    run(&mut ctx, 4);

    assert_eq!(ctx.regs.r[T2 as usize], 5, "pre-load value visible");
    assert_eq!(ctx.regs.r[T3 as usize], 77, "loaded value visible");
    assert_eq!(ctx.regs.r[T0 as usize], 77);
}

#[test]
fn immediate_load_lands_at_once_when_not_delayed() {
    let (mut ctx, _) = context(SimConfig::default());
    ctx.mem.write_word(DATA_BOT, 77).unwrap();
    load_program(
        &mut ctx,
        &[
            Instruction::itype(Op::Lui, T1, ZERO, 0x1000),
            Instruction::itype(Op::Lw, T0, T1, 0),
            Instruction::rtype(Op::Addu, T2, T0, ZERO),
        ],
    );
    run(&mut ctx, 3);
    assert_eq!(ctx.regs.r[T2 as usize], 77);
}

#[test]
fn division_by_zero_leaves_hi_lo_unchanged() {
    let (mut ctx, _) = context(SimConfig::default());
    load_program(
        &mut ctx,
        &[
            Instruction::itype(Op::Addi, T0, ZERO, 9),
            Instruction::rtype(Op::Div, 0, T0, ZERO),
        ],
    );
    ctx.regs.hi = 0xaaaa_aaaa;
    ctx.regs.lo = 0x5555_5555;
    run(&mut ctx, 2);
    assert_eq!(ctx.regs.hi, 0xaaaa_aaaa);
    assert_eq!(ctx.regs.lo, 0x5555_5555);
    assert!(!ctx.regs.exception_occurred);
}

#[test]
fn div_sets_quotient_and_remainder() {
    let (mut ctx, _) = context(SimConfig::default());
    load_program(
        &mut ctx,
        &[
            Instruction::itype(Op::Addi, T0, ZERO, -7),
            Instruction::itype(Op::Addi, T1, ZERO, 2),
            Instruction::rtype(Op::Div, 0, T0, T1),
        ],
    );
    run(&mut ctx, 3);
    assert_eq!(ctx.regs.lo as i32, -3);
    assert_eq!(ctx.regs.hi as i32, -1);
}

#[test]
fn madd_accumulates_64_bit_product() {
    let (mut ctx, _) = context(SimConfig::default());
    load_program(
        &mut ctx,
        &[
            Instruction::itype(Op::Lui, T0, ZERO, 0x4000),
            Instruction::rtype(Op::Mult, 0, T0, T0), // hi:lo = 0x4000_0000^2
            Instruction::rtype(Op::Madd, 0, T0, T0), // doubled
        ],
    );
    run(&mut ctx, 3);
    let acc = (u64::from(ctx.regs.hi) << 32) | u64::from(ctx.regs.lo);
    assert_eq!(acc, 2 * 0x4000_0000u64 * 0x4000_0000u64);
}

#[test]
fn branch_likely_not_taken_nullifies_delay_slot() {
    let (mut ctx, _) = context(SimConfig::default());
    load_program(
        &mut ctx,
        &[
            Instruction::itype(Op::Addi, T0, ZERO, 1),
            Instruction::itype(Op::Bnel, T0, T0, 4), // never taken ($t0 == $t0)
            Instruction::itype(Op::Addi, T1, ZERO, 99), // nullified
            Instruction::itype(Op::Addi, T2, ZERO, 7),
        ],
    );
    run(&mut ctx, 3);
    assert_eq!(ctx.regs.r[T1 as usize], 0, "delay slot must be skipped");
    assert_eq!(ctx.regs.r[T2 as usize], 7);
}

#[test]
fn plain_branch_not_taken_falls_through() {
    let (mut ctx, _) = context(SimConfig::default());
    load_program(
        &mut ctx,
        &[
            Instruction::itype(Op::Addi, T0, ZERO, 1),
            Instruction::itype(Op::Bne, T0, T0, 4),
            Instruction::itype(Op::Addi, T1, ZERO, 99), // executed
        ],
    );
    run(&mut ctx, 3);
    assert_eq!(ctx.regs.r[T1 as usize], 99);
}

#[test]
fn branch_target_is_pc_relative() {
    let (mut ctx, _) = context(SimConfig::default());
    load_program(
        &mut ctx,
        &[
            Instruction::itype(Op::Beq, ZERO, ZERO, 2), // to TEXT_BOT + 8
            Instruction::itype(Op::Addi, T0, ZERO, 1),  // skipped
            Instruction::itype(Op::Addi, T1, ZERO, 2),
        ],
    );
    ctx.step(false).unwrap();
    assert_eq!(ctx.regs.pc, TEXT_BOT + 8);
    ctx.step(false).unwrap();
    assert_eq!(ctx.regs.r[T0 as usize], 0);
    assert_eq!(ctx.regs.r[T1 as usize], 2);
}

#[test]
fn delayed_branch_executes_slot_then_transfers() {
    let cfg = SimConfig {
        delayed_branches: true,
        ..SimConfig::default()
    };
    let (mut ctx, _) = context(cfg);
    load_program(
        &mut ctx,
        &[
            Instruction::itype(Op::Beq, ZERO, ZERO, 2), // to TEXT_BOT + 8
            Instruction::itype(Op::Addi, T0, ZERO, 5),  // delay slot: executed
            Instruction::itype(Op::Addi, T1, ZERO, 6),
        ],
    );
    // One step retires the branch and its slot
    ctx.step(false).unwrap();
    assert_eq!(ctx.regs.r[T0 as usize], 5, "delay slot executed");
    assert_eq!(ctx.regs.pc, TEXT_BOT + 8);
}

#[test]
fn jal_return_address_depends_on_branch_mode() {
    let (mut ctx, _) = context(SimConfig::default());
    load_program(&mut ctx, &[Instruction::jtype(Op::Jal, TEXT_BOT + 0x40)]);
    ctx.step(false).unwrap();
    assert_eq!(ctx.regs.r[31], TEXT_BOT + 4);
    assert_eq!(ctx.regs.pc, TEXT_BOT + 0x40);

    let cfg = SimConfig {
        delayed_branches: true,
        ..SimConfig::default()
    };
    let (mut ctx, _) = context(cfg);
    load_program(
        &mut ctx,
        &[
            Instruction::jtype(Op::Jal, TEXT_BOT + 0x40),
            Instruction::bare(Op::Sync), // delay slot
        ],
    );
    ctx.step(false).unwrap();
    assert_eq!(ctx.regs.r[31], TEXT_BOT + 8);
    assert_eq!(ctx.regs.pc, TEXT_BOT + 0x40);
}

#[test]
fn lwr_then_lwl_reconstructs_unaligned_word() {
    let (mut ctx, _) = context(SimConfig::default());
    // Bytes 0x44 0x33 0x22 0x11 | 0x55 ... at DATA_BOT
    ctx.mem.write_word(DATA_BOT, 0x1122_3344).unwrap();
    ctx.mem.write_word(DATA_BOT + 4, 0x8877_6655).unwrap();
    load_program(
        &mut ctx,
        &[
            Instruction::itype(Op::Lui, T1, ZERO, 0x1000),
            Instruction::itype(Op::Lwr, T0, T1, 1),
            Instruction::itype(Op::Lwl, T0, T1, 4),
        ],
    );
    run(&mut ctx, 3);
    // Unaligned word at DATA_BOT + 1: bytes 33 22 11 55, little-endian
    assert_eq!(ctx.regs.r[T0 as usize], 0x5511_2233);
}

#[test]
fn swl_swr_store_unaligned_word() {
    let (mut ctx, _) = context(SimConfig::default());
    load_program(
        &mut ctx,
        &[
            Instruction::itype(Op::Lui, T1, ZERO, 0x1000),
            Instruction::itype(Op::Lui, T0, ZERO, 0x1122_u16 as i16),
            Instruction::itype(Op::Ori, T0, T0, 0x3344_u16 as i16),
            Instruction::itype(Op::Swr, T0, T1, 1),
            Instruction::itype(Op::Swl, T0, T1, 4),
        ],
    );
    run(&mut ctx, 5);
    // Bytes 0x44 0x33 0x22 land above DATA_BOT, 0x11 in the next word:
    // the unaligned word at DATA_BOT + 1 reads back as 0x11223344
    assert_eq!(ctx.mem.read_word(DATA_BOT).unwrap(), 0x2233_4400);
    assert_eq!(ctx.mem.read_word(DATA_BOT + 4).unwrap(), 0x0000_0011);
}

#[test]
fn sc_stores_and_writes_one() {
    let (mut ctx, _) = context(SimConfig::default());
    load_program(
        &mut ctx,
        &[
            Instruction::itype(Op::Lui, T1, ZERO, 0x1000),
            Instruction::itype(Op::Addi, T0, ZERO, 321),
            Instruction::itype(Op::Sc, T0, T1, 8),
        ],
    );
    run(&mut ctx, 3);
    assert_eq!(ctx.mem.read_word(DATA_BOT + 8).unwrap(), 321);
    assert_eq!(ctx.regs.r[T0 as usize], 1);
}

#[test]
fn trap_raises_when_condition_holds() {
    let (mut ctx, _) = context(SimConfig::default());
    load_program(
        &mut ctx,
        &[
            Instruction::itype(Op::Addi, T0, ZERO, 4),
            Instruction::rtype(Op::Teq, 0, T0, T0),
        ],
    );
    run(&mut ctx, 2);
    assert_eq!(ctx.regs.exc_code(), ExcCode::Tr as u32);
}

#[test]
fn cop2_is_unusable() {
    let (mut ctx, _) = context(SimConfig::default());
    load_program(&mut ctx, &[Instruction::itype(Op::Lwc2, T0, ZERO, 0)]);
    ctx.step(false).unwrap();
    assert_eq!(ctx.regs.exc_code(), ExcCode::CpU as u32);
}

#[test]
fn eret_clears_exl_and_returns_to_epc() {
    let (mut ctx, _) = context(SimConfig::default());
    load_program(&mut ctx, &[Instruction::bare(Op::Eret)]);
    ctx.regs.set_epc(TEXT_BOT + 0x20);
    ctx.regs
        .set_status(ctx.regs.status() | cp0::STATUS_EXL);
    ctx.step(false).unwrap();
    assert_eq!(ctx.regs.status() & cp0::STATUS_EXL, 0);
    assert_eq!(ctx.regs.pc, TEXT_BOT + 0x20);
}

#[test]
fn mtc0_applies_writable_masks() {
    let (mut ctx, _) = context(SimConfig::default());
    load_program(
        &mut ctx,
        &[
            Instruction::itype(Op::Addi, T0, ZERO, -1), // 0xffffffff
            Instruction::new(
                Op::Mtc0,
                mips_inst::Operands::R { rs: 0, rt: T0, rd: cp0::CAUSE as u8, shamt: 0 },
            ),
        ],
    );
    run(&mut ctx, 2);
    assert_eq!(ctx.regs.cause() & !cp0::CAUSE_MASK, 0);
}

#[test]
fn executing_empty_slot_halts() {
    let (mut ctx, out) = context(SimConfig::default());
    ctx.regs.pc = TEXT_BOT;
    let result = ctx.step(false).unwrap();
    assert_eq!(result, StepResult::Halted);
    drop(out);
}

#[test]
fn unresolved_symbol_halts_with_message() {
    let (mut ctx, _) = context(SimConfig::default());
    let inst = Instruction::itype(Op::Lw, T0, ZERO, 0).with_expr(ImmExpr {
        offset: 0,
        symbol: Some(SymbolRef { name: "extern_sym".into(), addr: 0 }),
        bits: HalfSelect::Low,
        pc_relative: false,
    });
    load_program(&mut ctx, &[inst]);
    assert_eq!(ctx.step(false).unwrap(), StepResult::Halted);
}

#[test]
fn unknown_syscall_reports_and_continues() {
    let (mut ctx, _) = context(SimConfig::default());
    load_program(
        &mut ctx,
        &[
            Instruction::itype(Op::Addi, V0, ZERO, 99),
            Instruction::bare(Op::Syscall),
            Instruction::itype(Op::Addi, T0, ZERO, 1),
        ],
    );
    let result = run(&mut ctx, 3);
    assert_eq!(result, StepResult::Continue);
    assert_eq!(ctx.regs.r[T0 as usize], 1);
}

#[test]
fn exit2_reports_exit_code() {
    let (mut ctx, _) = context(SimConfig::default());
    load_program(
        &mut ctx,
        &[
            Instruction::itype(Op::Addi, A0, ZERO, 3),
            Instruction::itype(Op::Addi, V0, ZERO, 17), // exit2
            Instruction::bare(Op::Syscall),
        ],
    );
    assert_eq!(run(&mut ctx, 3), StepResult::Halted);
    assert_eq!(ctx.exit_code, Some(3));
}

#[test]
fn read_int_comes_from_injected_input() {
    let (mut ctx, _) = context(SimConfig::default());
    ctx.set_input(Box::new(std::io::Cursor::new(b"42\n".to_vec())));
    load_program(
        &mut ctx,
        &[
            Instruction::itype(Op::Addi, V0, ZERO, 5), // read_int
            Instruction::bare(Op::Syscall),
        ],
    );
    run(&mut ctx, 2);
    assert_eq!(ctx.regs.r[V0 as usize], 42);
}

#[test]
fn sbrk_returns_old_top_and_grows() {
    let (mut ctx, _) = context(SimConfig::default());
    let old_top = ctx.mem.data_top();
    load_program(
        &mut ctx,
        &[
            Instruction::itype(Op::Addi, A0, ZERO, 0x100),
            Instruction::itype(Op::Addi, V0, ZERO, 9), // sbrk
            Instruction::bare(Op::Syscall),
        ],
    );
    run(&mut ctx, 3);
    assert_eq!(ctx.regs.r[V0 as usize], old_top);
    assert_eq!(ctx.mem.data_top(), old_top + 0x100);
}

#[test]
fn fpu_single_arithmetic_and_compare() {
    let (mut ctx, _) = context(SimConfig::default());
    ctx.regs.set_fpr_s(0, 1.5);
    ctx.regs.set_fpr_s(2, 2.25);
    load_program(
        &mut ctx,
        &[
            Instruction::new(
                Op::AddS,
                mips_inst::Operands::R { rs: 16, rt: 2, rd: 0, shamt: 4 },
            ), // $f4 = $f0 + $f2
            Instruction::fp_compare(false, mips_inst::COND_LT, 0, 0, 2), // c.olt.s $f0, $f2
        ],
    );
    run(&mut ctx, 2);
    assert_eq!(ctx.regs.fpr_s(4), 3.75);
    assert!(ctx.regs.fcc(0));
}

#[test]
fn fpu_double_round_trip_through_memory() {
    let (mut ctx, _) = context(SimConfig::default());
    ctx.regs.set_fpr_d(2, -2.5).unwrap();
    load_program(
        &mut ctx,
        &[
            Instruction::itype(Op::Lui, T1, ZERO, 0x1000),
            Instruction::itype(Op::Sdc1, 2, T1, 0),
            Instruction::itype(Op::Ldc1, 4, T1, 0),
        ],
    );
    run(&mut ctx, 3);
    assert_eq!(ctx.regs.fpr_d(4).unwrap(), -2.5);
}

#[test]
fn fpu_compare_with_nan_is_unordered() {
    let (mut ctx, _) = context(SimConfig::default());
    ctx.regs.set_fpr_s(0, f32::NAN);
    ctx.regs.set_fpr_s(2, 1.0);
    load_program(
        &mut ctx,
        &[
            // c.eq.s: no invalid bit, NaN gives unordered, EQ fails
            Instruction::fp_compare(false, mips_inst::COND_EQ, 1, 0, 2),
            // c.ule.s: unordered bit set, NaN satisfies it
            Instruction::fp_compare(
                false,
                mips_inst::COND_UN | mips_inst::COND_EQ | mips_inst::COND_LT,
                2,
                0,
                2,
            ),
        ],
    );
    run(&mut ctx, 2);
    assert!(!ctx.regs.fcc(1));
    assert!(ctx.regs.fcc(2));
}

#[test]
fn bc1t_branches_on_condition_code() {
    let (mut ctx, _) = context(SimConfig::default());
    ctx.regs.set_fcc(0, true);
    load_program(
        &mut ctx,
        &[
            Instruction::itype(Op::Bc1t, 0, ZERO, 2), // to TEXT_BOT + 8
            Instruction::itype(Op::Addi, T0, ZERO, 1), // skipped
            Instruction::itype(Op::Addi, T1, ZERO, 2),
        ],
    );
    run(&mut ctx, 2);
    assert_eq!(ctx.regs.r[T0 as usize], 0);
    assert_eq!(ctx.regs.r[T1 as usize], 2);
}

#[test]
fn cvt_and_trunc_between_formats() {
    let (mut ctx, _) = context(SimConfig::default());
    ctx.regs.set_fpr_w(0, (-7i32) as u32);
    load_program(
        &mut ctx,
        &[
            // cvt.d.w $f2, $f0
            Instruction::new(
                Op::CvtDW,
                mips_inst::Operands::R { rs: 20, rt: 0, rd: 0, shamt: 2 },
            ),
            // trunc.w.d $f4, $f2
            Instruction::new(
                Op::TruncWD,
                mips_inst::Operands::R { rs: 17, rt: 0, rd: 2, shamt: 4 },
            ),
        ],
    );
    run(&mut ctx, 2);
    assert_eq!(ctx.regs.fpr_d(2).unwrap(), -7.0);
    assert_eq!(ctx.regs.fpr_w(4) as i32, -7);
}

#[test]
fn startup_stack_carries_argc_and_argv() {
    let (mut ctx, _) = context(SimConfig::default());
    ctx.initialize_stack(&["prog", "arg1"]);

    assert_eq!(ctx.regs.r[A0 as usize], 2, "$a0 = argc");
    let sp = ctx.regs.r[29];
    assert_eq!(ctx.mem.read_word(sp).unwrap(), 2, "argc left on the stack");

    // $a1 points at argv[0]; the vector entries point at the strings
    let argv = ctx.regs.r[5];
    let arg0 = ctx.mem.read_word(argv).unwrap();
    for (i, b) in b"prog\0".iter().enumerate() {
        assert_eq!(
            ctx.mem.read_byte(arg0 + i as u32).unwrap() & 0xff,
            u32::from(*b)
        );
    }
    let arg1 = ctx.mem.read_word(argv + 4).unwrap();
    assert_eq!(ctx.mem.read_byte(arg1).unwrap() & 0xff, u32::from(b'a'));
    // The vector is null-terminated
    assert_eq!(ctx.mem.read_word(argv + 8).unwrap(), 0);
}

#[test]
fn breakpoint_round_trip_restores_map() {
    let (mut ctx, _) = context(SimConfig::default());
    assert!(ctx.breakpoints().is_empty());
    ctx.add_breakpoint(TEXT_BOT);
    ctx.add_breakpoint(TEXT_BOT); // idempotent
    assert_eq!(ctx.breakpoints(), vec![TEXT_BOT]);
    assert!(ctx.delete_breakpoint(TEXT_BOT));
    assert!(ctx.breakpoints().is_empty());
    assert!(!ctx.delete_breakpoint(TEXT_BOT), "soft error, not a panic");
}
