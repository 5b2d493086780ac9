//! The execution engine: one instruction per call.

use mips_inst::{COND_EQ, COND_IN, COND_LT, COND_UN, Instruction, Op};
use mips_mem::{BYTES_PER_WORD, FatalError};

use crate::context::{Context, LoadDest, PendingLoad, StepResult};
use crate::cp0;
use crate::exceptions::ExcCode;

/// What the dispatcher decided about control flow.
pub(crate) enum Flow {
    Normal,
    /// Exit syscall or engine halt; the cycle ends without a PC bump.
    Halt,
    /// Debugger `break` (rd == 1); reported before the PC bump with the
    /// Bp edge still latched.
    DebugBreak,
}

impl Context {
    /// Run one instruction. Under delayed branches a taken branch also
    /// runs its delay slot before control transfers, so one `step` may
    /// retire two instructions.
    pub fn step(&mut self, display: bool) -> Result<StepResult, FatalError> {
        self.regs.exception_occurred = false;

        let (mut result, _) = self.execute_one(display)?;

        if result == StepResult::Continue
            && let Some(target) = self.pending_branch.take()
        {
            // Delayed branch: run the slot, then transfer. A branch in
            // the slot is architecturally undefined; the second branch
            // wins here. An exception in the slot discards the transfer
            // so the handler address survives.
            self.in_delay_slot = true;
            let slot = self.execute_one(display);
            self.in_delay_slot = false;
            let (slot_result, handled) = slot?;
            let target = self.pending_branch.take().unwrap_or(target);
            if slot_result == StepResult::Continue && !handled {
                self.regs.pc = target;
            }
            result = slot_result;
        }

        if result == StepResult::Breakpoint {
            // The break is handled by the embedder, not guest code, so
            // subsequent interrupts must still be able to set EPC.
            self.regs
                .set_status(self.regs.status() & !cp0::STATUS_EXL);
        }
        Ok(result)
    }

    /// Fetch, dispatch and retire one instruction. The second return is
    /// true when the exception handler was invoked this cycle.
    fn execute_one(&mut self, display: bool) -> Result<(StepResult, bool), FatalError> {
        self.regs.r[0] = 0;

        let inst = match self.mem.read_inst(self.regs.pc) {
            Err(fault) => {
                self.raise_mem_fault(fault);
                self.handle_exception();
                return Ok((StepResult::Continue, true));
            }
            Ok(None) => {
                let pc = self.regs.pc;
                self.run_error(&format!(
                    "Attempt to execute non-instruction at 0x{pc:08x}"
                ));
                return Ok((StepResult::Halted, false));
            }
            Ok(Some(inst)) => inst,
        };

        if let Some(expr) = &inst.expr
            && let Some(sym) = &expr.symbol
            && sym.addr == 0
        {
            let pc = self.regs.pc;
            self.run_error(&format!(
                "Instruction references undefined symbol at 0x{pc:08x}\n  {inst}"
            ));
            return Ok((StepResult::Halted, false));
        }

        if display {
            let line = format!("[0x{:08x}] {inst}\n", self.regs.pc);
            self.stdout.write(line.as_bytes());
        }

        self.do_delayed_update();

        match self.dispatch(&inst)? {
            Flow::Normal => {}
            Flow::Halt => return Ok((StepResult::Halted, false)),
            Flow::DebugBreak => return Ok((StepResult::Breakpoint, false)),
        }

        self.regs.pc += BYTES_PER_WORD;

        self.end_of_cycle_io();

        let mut handled = false;
        if self.regs.exception_occurred {
            self.handle_exception();
            // A pending transfer must not clobber the handler address
            self.pending_branch = None;
            handled = true;
        }
        Ok((StepResult::Continue, handled))
    }

    /// Promote console input, drain transmitter output to this context's
    /// stdout, and sense device interrupt lines into `Cause.IP`.
    fn end_of_cycle_io(&mut self) {
        self.mem.console().tick();
        let out = self.mem.console().take_output();
        if !out.is_empty() {
            self.stdout.write(&out);
        }

        let recv = self.mem.console().recv_interrupt();
        let xmit = self.mem.console().xmit_interrupt();
        let mut cause = self.regs.cause();
        cause = if recv { cause | cp0::CAUSE_IP3 } else { cause & !cp0::CAUSE_IP3 };
        cause = if xmit { cause | cp0::CAUSE_IP2 } else { cause & !cp0::CAUSE_IP2 };
        self.regs.set_cause(cause);

        if self.regs.interrupts_enabled() && self.regs.status() & cause & cp0::CAUSE_IP != 0 {
            self.raise_exception(ExcCode::Int);
        }
    }

    // === Control transfer helpers ===

    /// Transfer control to `target`, honoring the delayed-branch mode.
    fn jump_to(&mut self, target: u32) {
        if self.cfg.delayed_branches {
            self.pending_branch = Some(target);
        } else {
            // The PC bump after dispatch lands exactly on the target
            self.regs.pc = target.wrapping_sub(BYTES_PER_WORD);
        }
    }

    /// Conditional branch. A failed likely-branch nullifies the
    /// instruction in the delay slot.
    fn branch(&mut self, taken: bool, inst: &Instruction, nullify: bool) {
        if taken {
            let target = self.regs.pc.wrapping_add(inst.branch_disp() as u32);
            self.jump_to(target);
        } else if nullify {
            self.regs.pc += BYTES_PER_WORD;
        }
    }

    /// Write the return address for a linking jump or branch.
    fn link(&mut self, reg: usize) {
        let delta = if self.cfg.delayed_branches {
            2 * BYTES_PER_WORD
        } else {
            BYTES_PER_WORD
        };
        self.regs.r[reg] = self.regs.pc + delta;
    }

    // === Load helpers ===

    /// Deliver a load result, honoring the delayed-load mode.
    fn load_gpr(&mut self, rt: u8, value: u32) {
        if self.cfg.delayed_loads {
            self.pending_load[0] = Some(PendingLoad { dest: LoadDest::Gpr(rt), value });
        } else {
            self.regs.r[rt as usize] = value;
        }
    }

    /// Deliver a load result into an FPU word slot.
    fn load_fpr(&mut self, ft: u8, value: u32) {
        if self.cfg.delayed_loads {
            self.pending_load[0] = Some(PendingLoad { dest: LoadDest::Fpr(ft), value });
        } else {
            self.regs.set_fpr_w(ft, value);
        }
    }

    /// Advance the two-stage delayed-load shift register: the older
    /// pending load writes back, the younger one ages.
    fn do_delayed_update(&mut self) {
        if !self.cfg.delayed_loads {
            return;
        }
        if let Some(p) = self.pending_load[1].take() {
            match p.dest {
                LoadDest::Gpr(n) => self.regs.r[n as usize] = p.value,
                LoadDest::Fpr(n) => self.regs.set_fpr_w(n, p.value),
            }
        }
        self.pending_load[1] = self.pending_load[0].take();
    }

    /// Effective address of a load/store.
    fn ea(&self, inst: &Instruction) -> u32 {
        self.regs.r[inst.base() as usize].wrapping_add(inst.imm() as i32 as u32)
    }

    // === The dispatch table ===

    #[allow(clippy::cognitive_complexity)]
    fn dispatch(&mut self, inst: &Instruction) -> Result<Flow, FatalError> {
        let rs = inst.rs() as usize;
        let rt = inst.rt() as usize;
        let rd = inst.rd() as usize;

        match inst.op {
            // === Integer arithmetic ===
            Op::Add => {
                let (vs, vt) = (self.regs.r[rs], self.regs.r[rt]);
                let sum = vs.wrapping_add(vt);
                if arith_overflow(sum, vs, vt) {
                    self.raise_exception(ExcCode::Ov);
                } else {
                    self.regs.r[rd] = sum;
                }
            }
            Op::Addi => {
                let (vs, imm) = (self.regs.r[rs], inst.imm() as i32 as u32);
                let sum = vs.wrapping_add(imm);
                if arith_overflow(sum, vs, imm) {
                    self.raise_exception(ExcCode::Ov);
                } else {
                    self.regs.r[rt] = sum;
                }
            }
            Op::Addiu => {
                self.regs.r[rt] = self.regs.r[rs].wrapping_add(inst.imm() as i32 as u32);
            }
            Op::Addu => self.regs.r[rd] = self.regs.r[rs].wrapping_add(self.regs.r[rt]),
            Op::Sub => {
                let (vs, vt) = (self.regs.r[rs], self.regs.r[rt]);
                let diff = vs.wrapping_sub(vt);
                if sign_bit(vs) != sign_bit(vt) && sign_bit(vs) != sign_bit(diff) {
                    self.raise_exception(ExcCode::Ov);
                } else {
                    self.regs.r[rd] = diff;
                }
            }
            Op::Subu => self.regs.r[rd] = self.regs.r[rs].wrapping_sub(self.regs.r[rt]),
            Op::Clo => self.regs.r[rd] = self.regs.r[rs].leading_ones(),
            Op::Clz => self.regs.r[rd] = self.regs.r[rs].leading_zeros(),

            // === Logical ===
            Op::And => self.regs.r[rd] = self.regs.r[rs] & self.regs.r[rt],
            Op::Andi => self.regs.r[rt] = self.regs.r[rs] & u32::from(inst.imm() as u16),
            Op::Or => self.regs.r[rd] = self.regs.r[rs] | self.regs.r[rt],
            Op::Ori => self.regs.r[rt] = self.regs.r[rs] | u32::from(inst.imm() as u16),
            Op::Xor => self.regs.r[rd] = self.regs.r[rs] ^ self.regs.r[rt],
            Op::Xori => self.regs.r[rt] = self.regs.r[rs] ^ u32::from(inst.imm() as u16),
            Op::Nor => self.regs.r[rd] = !(self.regs.r[rs] | self.regs.r[rt]),
            Op::Lui => self.regs.r[rt] = u32::from(inst.imm() as u16) << 16,

            // === Shifts ===
            Op::Sll => self.regs.r[rd] = self.regs.r[rt] << inst.shamt(),
            Op::Srl => self.regs.r[rd] = self.regs.r[rt] >> inst.shamt(),
            Op::Sra => {
                self.regs.r[rd] = ((self.regs.r[rt] as i32) >> inst.shamt()) as u32;
            }
            Op::Sllv => self.regs.r[rd] = self.regs.r[rt] << (self.regs.r[rs] & 0x1f),
            Op::Srlv => self.regs.r[rd] = self.regs.r[rt] >> (self.regs.r[rs] & 0x1f),
            Op::Srav => {
                self.regs.r[rd] =
                    ((self.regs.r[rt] as i32) >> (self.regs.r[rs] & 0x1f)) as u32;
            }

            // === Compare-set ===
            Op::Slt => {
                self.regs.r[rd] =
                    u32::from((self.regs.r[rs] as i32) < (self.regs.r[rt] as i32));
            }
            Op::Slti => {
                self.regs.r[rt] =
                    u32::from((self.regs.r[rs] as i32) < i32::from(inst.imm()));
            }
            Op::Sltu => self.regs.r[rd] = u32::from(self.regs.r[rs] < self.regs.r[rt]),
            Op::Sltiu => {
                self.regs.r[rt] =
                    u32::from(self.regs.r[rs] < inst.imm() as i32 as u32);
            }

            // === Multiply / divide ===
            Op::Mult => {
                let prod =
                    i64::from(self.regs.r[rs] as i32) * i64::from(self.regs.r[rt] as i32);
                self.regs.lo = prod as u32;
                self.regs.hi = (prod as u64 >> 32) as u32;
            }
            Op::Multu => {
                let prod = u64::from(self.regs.r[rs]) * u64::from(self.regs.r[rt]);
                self.regs.lo = prod as u32;
                self.regs.hi = (prod >> 32) as u32;
            }
            Op::Mul => {
                let prod =
                    i64::from(self.regs.r[rs] as i32) * i64::from(self.regs.r[rt] as i32);
                self.regs.lo = prod as u32;
                self.regs.hi = (prod as u64 >> 32) as u32;
                self.regs.r[rd] = self.regs.lo;
            }
            Op::Madd | Op::Maddu => {
                let prod = if inst.op == Op::Madd {
                    (i64::from(self.regs.r[rs] as i32) * i64::from(self.regs.r[rt] as i32))
                        as u64
                } else {
                    u64::from(self.regs.r[rs]) * u64::from(self.regs.r[rt])
                };
                let acc = (u64::from(self.regs.hi) << 32) | u64::from(self.regs.lo);
                let acc = acc.wrapping_add(prod);
                self.regs.hi = (acc >> 32) as u32;
                self.regs.lo = acc as u32;
            }
            Op::Msub | Op::Msubu => {
                let prod = if inst.op == Op::Msub {
                    (i64::from(self.regs.r[rs] as i32) * i64::from(self.regs.r[rt] as i32))
                        as u64
                } else {
                    u64::from(self.regs.r[rs]) * u64::from(self.regs.r[rt])
                };
                let acc = (u64::from(self.regs.hi) << 32) | u64::from(self.regs.lo);
                let acc = acc.wrapping_sub(prod);
                self.regs.hi = (acc >> 32) as u32;
                self.regs.lo = acc as u32;
            }
            Op::Div => {
                // Divide by zero and INT_MIN / -1 leave HI/LO unchanged
                let (vs, vt) = (self.regs.r[rs] as i32, self.regs.r[rt] as i32);
                if vt != 0 && !(vs == i32::MIN && vt == -1) {
                    self.regs.lo = (vs / vt) as u32;
                    self.regs.hi = (vs % vt) as u32;
                }
            }
            Op::Divu => {
                let (vs, vt) = (self.regs.r[rs], self.regs.r[rt]);
                if vt != 0 && !(vs == 0x8000_0000 && vt == 0xffff_ffff) {
                    self.regs.lo = vs / vt;
                    self.regs.hi = vs % vt;
                }
            }
            Op::Mfhi => self.regs.r[rd] = self.regs.hi,
            Op::Mflo => self.regs.r[rd] = self.regs.lo,
            Op::Mthi => self.regs.hi = self.regs.r[rs],
            Op::Mtlo => self.regs.lo = self.regs.r[rs],

            // === Conditional moves ===
            Op::Movn => {
                if self.regs.r[rt] != 0 {
                    self.regs.r[rd] = self.regs.r[rs];
                }
            }
            Op::Movz => {
                if self.regs.r[rt] == 0 {
                    self.regs.r[rd] = self.regs.r[rs];
                }
            }
            Op::Movf => {
                if !self.regs.fcc(inst.cc()) {
                    self.regs.r[rd] = self.regs.r[rs];
                }
            }
            Op::Movt => {
                if self.regs.fcc(inst.cc()) {
                    self.regs.r[rd] = self.regs.r[rs];
                }
            }

            // === Branches ===
            Op::Beq => self.branch(self.regs.r[rs] == self.regs.r[rt], inst, false),
            Op::Beql => self.branch(self.regs.r[rs] == self.regs.r[rt], inst, true),
            Op::Bne => self.branch(self.regs.r[rs] != self.regs.r[rt], inst, false),
            Op::Bnel => self.branch(self.regs.r[rs] != self.regs.r[rt], inst, true),
            Op::Blez => {
                self.branch(self.regs.r[rs] == 0 || sign_bit(self.regs.r[rs]) != 0, inst, false);
            }
            Op::Blezl => {
                self.branch(self.regs.r[rs] == 0 || sign_bit(self.regs.r[rs]) != 0, inst, true);
            }
            Op::Bgtz => {
                self.branch(self.regs.r[rs] != 0 && sign_bit(self.regs.r[rs]) == 0, inst, false);
            }
            Op::Bgtzl => {
                self.branch(self.regs.r[rs] != 0 && sign_bit(self.regs.r[rs]) == 0, inst, true);
            }
            Op::Bltz => self.branch(sign_bit(self.regs.r[rs]) != 0, inst, false),
            Op::Bltzl => self.branch(sign_bit(self.regs.r[rs]) != 0, inst, true),
            Op::Bgez => self.branch(sign_bit(self.regs.r[rs]) == 0, inst, false),
            Op::Bgezl => self.branch(sign_bit(self.regs.r[rs]) == 0, inst, true),
            Op::Bltzal => {
                self.link(31);
                self.branch(sign_bit(self.regs.r[rs]) != 0, inst, false);
            }
            Op::Bltzall => {
                self.link(31);
                self.branch(sign_bit(self.regs.r[rs]) != 0, inst, true);
            }
            Op::Bgezal => {
                self.link(31);
                self.branch(sign_bit(self.regs.r[rs]) == 0, inst, false);
            }
            Op::Bgezall => {
                self.link(31);
                self.branch(sign_bit(self.regs.r[rs]) == 0, inst, true);
            }

            // === Jumps ===
            Op::J => {
                self.jump_to((self.regs.pc & 0xf000_0000) | (inst.target() << 2));
            }
            Op::Jal => {
                self.link(31);
                self.jump_to((self.regs.pc & 0xf000_0000) | (inst.target() << 2));
            }
            Op::Jr => self.jump_to(self.regs.r[rs]),
            Op::Jalr => {
                let target = self.regs.r[rs];
                self.link(rd);
                self.jump_to(target);
            }

            // === Loads ===
            Op::Lb => match self.mem.read_byte(self.ea(inst)) {
                Ok(v) => self.load_gpr(inst.rt(), v),
                Err(e) => self.absorb_mem_error(e)?,
            },
            Op::Lbu => match self.mem.read_byte(self.ea(inst)) {
                Ok(v) => self.load_gpr(inst.rt(), v & 0xff),
                Err(e) => self.absorb_mem_error(e)?,
            },
            Op::Lh => match self.mem.read_half(self.ea(inst)) {
                Ok(v) => self.load_gpr(inst.rt(), v),
                Err(e) => self.absorb_mem_error(e)?,
            },
            Op::Lhu => match self.mem.read_half(self.ea(inst)) {
                Ok(v) => self.load_gpr(inst.rt(), v & 0xffff),
                Err(e) => self.absorb_mem_error(e)?,
            },
            // Uniprocessor: ll is a plain load
            Op::Lw | Op::Ll => match self.mem.read_word(self.ea(inst)) {
                Ok(v) => self.load_gpr(inst.rt(), v),
                Err(e) => self.absorb_mem_error(e)?,
            },
            Op::Lwl => {
                let addr = self.ea(inst);
                match self.mem.read_word(addr & !0x3) {
                    Ok(word) => {
                        let merged = merge_lwl(word, self.regs.r[rt], addr);
                        self.load_gpr(inst.rt(), merged);
                    }
                    Err(e) => self.absorb_mem_error(e)?,
                }
            }
            Op::Lwr => {
                let addr = self.ea(inst);
                match self.mem.read_word(addr & !0x3) {
                    Ok(word) => {
                        let merged = merge_lwr(word, self.regs.r[rt], addr);
                        self.load_gpr(inst.rt(), merged);
                    }
                    Err(e) => self.absorb_mem_error(e)?,
                }
            }

            // === Stores ===
            Op::Sb => {
                let (addr, v) = (self.ea(inst), self.regs.r[rt]);
                if let Err(e) = self.mem.write_byte(addr, v) {
                    self.absorb_mem_error(e)?;
                }
            }
            Op::Sh => {
                let (addr, v) = (self.ea(inst), self.regs.r[rt]);
                if let Err(e) = self.mem.write_half(addr, v) {
                    self.absorb_mem_error(e)?;
                }
            }
            Op::Sw => {
                let (addr, v) = (self.ea(inst), self.regs.r[rt]);
                if let Err(e) = self.mem.write_word(addr, v) {
                    self.absorb_mem_error(e)?;
                }
            }
            Op::Sc => {
                // Uniprocessor: the store always succeeds
                let (addr, v) = (self.ea(inst), self.regs.r[rt]);
                match self.mem.write_word(addr, v) {
                    Ok(()) => self.regs.r[rt] = 1,
                    Err(e) => self.absorb_mem_error(e)?,
                }
            }
            Op::Swl => {
                let addr = self.ea(inst);
                match self.mem.read_word(addr & !0x3) {
                    Ok(word) => {
                        let merged = merge_swl(word, self.regs.r[rt], addr);
                        if let Err(e) = self.mem.write_word(addr & !0x3, merged) {
                            self.absorb_mem_error(e)?;
                        }
                    }
                    Err(e) => self.absorb_mem_error(e)?,
                }
            }
            Op::Swr => {
                let addr = self.ea(inst);
                match self.mem.read_word(addr & !0x3) {
                    Ok(word) => {
                        let merged = merge_swr(word, self.regs.r[rt], addr);
                        if let Err(e) = self.mem.write_word(addr & !0x3, merged) {
                            self.absorb_mem_error(e)?;
                        }
                    }
                    Err(e) => self.absorb_mem_error(e)?,
                }
            }

            // === Coprocessor 0 ===
            Op::Mfc0 => self.regs.r[rt] = self.regs.cpr0[rd],
            Op::Mtc0 => {
                self.regs.cpr0[rd] = self.regs.r[rt];
                match rd {
                    cp0::COMPARE => {
                        // Writing Compare acknowledges the timer interrupt
                        self.regs.set_cause(self.regs.cause() & !cp0::CAUSE_IP7);
                    }
                    cp0::STATUS => {
                        let v = self.regs.status() & cp0::STATUS_MASK;
                        self.regs
                            .set_status(v | (cp0::STATUS_CU & 0x3000_0000) | cp0::STATUS_UM);
                    }
                    cp0::CAUSE => self.regs.cpr0[rd] &= cp0::CAUSE_MASK,
                    cp0::CONFIG => self.regs.cpr0[rd] &= cp0::CONFIG_MASK,
                    _ => {}
                }
            }
            Op::Cfc0 => self.regs.r[rt] = self.regs.ccr0[rd],
            Op::Ctc0 => self.regs.ccr0[rd] = self.regs.r[rt],
            Op::Eret => {
                self.regs
                    .set_status(self.regs.status() & !cp0::STATUS_EXL);
                self.jump_to(self.regs.epc());
            }
            Op::Rfe => self.raise_exception(ExcCode::Ri), // not a MIPS32 instruction
            Op::Tlbp | Op::Tlbr | Op::Tlbwi | Op::Tlbwr => {
                self.raise_exception(ExcCode::Ri); // no TLB
            }

            // === Coprocessor 2 ===
            Op::Cop2 | Op::Lwc2 | Op::Ldc2 | Op::Swc2 | Op::Sdc2 => {
                self.raise_exception(ExcCode::CpU);
            }

            // === Traps ===
            Op::Teq => {
                if self.regs.r[rs] == self.regs.r[rt] {
                    self.raise_exception(ExcCode::Tr);
                }
            }
            Op::Teqi => {
                if self.regs.r[rs] as i32 == i32::from(inst.imm()) {
                    self.raise_exception(ExcCode::Tr);
                }
            }
            Op::Tne => {
                if self.regs.r[rs] != self.regs.r[rt] {
                    self.raise_exception(ExcCode::Tr);
                }
            }
            Op::Tnei => {
                if self.regs.r[rs] as i32 != i32::from(inst.imm()) {
                    self.raise_exception(ExcCode::Tr);
                }
            }
            Op::Tge => {
                if self.regs.r[rs] as i32 >= self.regs.r[rt] as i32 {
                    self.raise_exception(ExcCode::Tr);
                }
            }
            Op::Tgei => {
                if self.regs.r[rs] as i32 >= i32::from(inst.imm()) {
                    self.raise_exception(ExcCode::Tr);
                }
            }
            Op::Tgeu => {
                if self.regs.r[rs] >= self.regs.r[rt] {
                    self.raise_exception(ExcCode::Tr);
                }
            }
            Op::Tgeiu => {
                if self.regs.r[rs] >= inst.imm() as i32 as u32 {
                    self.raise_exception(ExcCode::Tr);
                }
            }
            Op::Tlt => {
                if (self.regs.r[rs] as i32) < self.regs.r[rt] as i32 {
                    self.raise_exception(ExcCode::Tr);
                }
            }
            Op::Tlti => {
                if (self.regs.r[rs] as i32) < i32::from(inst.imm()) {
                    self.raise_exception(ExcCode::Tr);
                }
            }
            Op::Tltu => {
                if self.regs.r[rs] < self.regs.r[rt] {
                    self.raise_exception(ExcCode::Tr);
                }
            }
            Op::Tltiu => {
                if self.regs.r[rs] < inst.imm() as i32 as u32 {
                    self.raise_exception(ExcCode::Tr);
                }
            }

            // === System ===
            Op::Syscall => return self.do_syscall(),
            Op::Break => {
                self.raise_exception(ExcCode::Bp);
                if inst.rd() == 1 {
                    // Debugger breakpoint: report before retiring
                    return Ok(Flow::DebugBreak);
                }
            }
            Op::Sync | Op::Pref | Op::Cache => {} // memory details not modelled

            // === FPU ===
            _ => return self.dispatch_fpu(inst),
        }

        Ok(Flow::Normal)
    }

    /// Floating-point dispatch, split out of the integer table.
    fn dispatch_fpu(&mut self, inst: &Instruction) -> Result<Flow, FatalError> {
        let rt = inst.rt() as usize;
        let ft = inst.ft();
        let fs = inst.fs();
        let fd = inst.fd();

        match inst.op {
            Op::AddS => self.regs.set_fpr_s(fd, self.regs.fpr_s(fs) + self.regs.fpr_s(ft)),
            Op::AddD => {
                let v = self.regs.fpr_d(fs)? + self.regs.fpr_d(ft)?;
                self.regs.set_fpr_d(fd, v)?;
            }
            Op::SubS => self.regs.set_fpr_s(fd, self.regs.fpr_s(fs) - self.regs.fpr_s(ft)),
            Op::SubD => {
                let v = self.regs.fpr_d(fs)? - self.regs.fpr_d(ft)?;
                self.regs.set_fpr_d(fd, v)?;
            }
            Op::MulS => self.regs.set_fpr_s(fd, self.regs.fpr_s(fs) * self.regs.fpr_s(ft)),
            Op::MulD => {
                let v = self.regs.fpr_d(fs)? * self.regs.fpr_d(ft)?;
                self.regs.set_fpr_d(fd, v)?;
            }
            Op::DivS => self.regs.set_fpr_s(fd, self.regs.fpr_s(fs) / self.regs.fpr_s(ft)),
            Op::DivD => {
                let v = self.regs.fpr_d(fs)? / self.regs.fpr_d(ft)?;
                self.regs.set_fpr_d(fd, v)?;
            }
            Op::AbsS => self.regs.set_fpr_s(fd, self.regs.fpr_s(fs).abs()),
            Op::AbsD => {
                let v = self.regs.fpr_d(fs)?.abs();
                self.regs.set_fpr_d(fd, v)?;
            }
            Op::NegS => self.regs.set_fpr_s(fd, -self.regs.fpr_s(fs)),
            Op::NegD => {
                let v = -self.regs.fpr_d(fs)?;
                self.regs.set_fpr_d(fd, v)?;
            }
            Op::SqrtS => self.regs.set_fpr_s(fd, self.regs.fpr_s(fs).sqrt()),
            Op::SqrtD => {
                let v = self.regs.fpr_d(fs)?.sqrt();
                self.regs.set_fpr_d(fd, v)?;
            }
            Op::MovS => self.regs.set_fpr_s(fd, self.regs.fpr_s(fs)),
            Op::MovD => {
                let v = self.regs.fpr_d(fs)?;
                self.regs.set_fpr_d(fd, v)?;
            }

            // === Conversions to W truncate per the rounding op ===
            Op::CeilWS => self.regs.set_fpr_w(fd, f64::from(self.regs.fpr_s(fs)).ceil() as i32 as u32),
            Op::CeilWD => {
                let v = self.regs.fpr_d(fs)?.ceil() as i32;
                self.regs.set_fpr_w(fd, v as u32);
            }
            Op::FloorWS => {
                self.regs.set_fpr_w(fd, f64::from(self.regs.fpr_s(fs)).floor() as i32 as u32);
            }
            Op::FloorWD => {
                let v = self.regs.fpr_d(fs)?.floor() as i32;
                self.regs.set_fpr_w(fd, v as u32);
            }
            Op::RoundWS => {
                self.regs.set_fpr_w(fd, f64::from(self.regs.fpr_s(fs)).round() as i32 as u32);
            }
            Op::RoundWD => {
                let v = self.regs.fpr_d(fs)?.round() as i32;
                self.regs.set_fpr_w(fd, v as u32);
            }
            Op::TruncWS => {
                self.regs.set_fpr_w(fd, f64::from(self.regs.fpr_s(fs)) as i32 as u32);
            }
            Op::TruncWD => {
                let v = self.regs.fpr_d(fs)? as i32;
                self.regs.set_fpr_w(fd, v as u32);
            }
            Op::CvtDS => {
                let v = f64::from(self.regs.fpr_s(fs));
                self.regs.set_fpr_d(fd, v)?;
            }
            Op::CvtDW => {
                let v = f64::from(self.regs.fpr_w(fs) as i32);
                self.regs.set_fpr_d(fd, v)?;
            }
            Op::CvtSD => {
                let v = self.regs.fpr_d(fs)? as f32;
                self.regs.set_fpr_s(fd, v);
            }
            Op::CvtSW => self.regs.set_fpr_s(fd, self.regs.fpr_w(fs) as i32 as f32),
            Op::CvtWS => self.regs.set_fpr_w(fd, self.regs.fpr_s(fs) as i32 as u32),
            Op::CvtWD => {
                let v = self.regs.fpr_d(fs)? as i32;
                self.regs.set_fpr_w(fd, v as u32);
            }

            // === Compares ===
            Op::CCondS | Op::CCondD => {
                let (v1, v2) = if inst.op == Op::CCondD {
                    (self.regs.fpr_d(fs)?, self.regs.fpr_d(ft)?)
                } else {
                    (f64::from(self.regs.fpr_s(fs)), f64::from(self.regs.fpr_s(ft)))
                };
                let cond = inst.fp_cond();
                let cc = inst.cmp_cc();
                if v1.is_nan() || v2.is_nan() {
                    if cond & COND_IN != 0 {
                        self.raise_exception(ExcCode::Fpe);
                    } else {
                        self.set_fpu_cc(cond, cc, false, false, true);
                    }
                } else {
                    self.set_fpu_cc(cond, cc, v1 < v2, v1 == v2, false);
                }
            }

            // === Branches on FCC ===
            Op::Bc1f => {
                let taken = !self.regs.fcc(inst.cc());
                self.branch(taken, inst, false);
            }
            Op::Bc1fl => {
                let taken = !self.regs.fcc(inst.cc());
                self.branch(taken, inst, true);
            }
            Op::Bc1t => {
                let taken = self.regs.fcc(inst.cc());
                self.branch(taken, inst, false);
            }
            Op::Bc1tl => {
                let taken = self.regs.fcc(inst.cc());
                self.branch(taken, inst, true);
            }

            // === Conditional moves ===
            Op::MovfS => {
                if !self.regs.fcc(inst.cc()) {
                    self.regs.set_fpr_s(fd, self.regs.fpr_s(fs));
                }
            }
            Op::MovfD => {
                if !self.regs.fcc(inst.cc()) {
                    let v = self.regs.fpr_d(fs)?;
                    self.regs.set_fpr_d(fd, v)?;
                }
            }
            Op::MovtS => {
                if self.regs.fcc(inst.cc()) {
                    self.regs.set_fpr_s(fd, self.regs.fpr_s(fs));
                }
            }
            Op::MovtD => {
                if self.regs.fcc(inst.cc()) {
                    let v = self.regs.fpr_d(fs)?;
                    self.regs.set_fpr_d(fd, v)?;
                }
            }
            Op::MovnS => {
                if self.regs.r[rt] != 0 {
                    self.regs.set_fpr_s(fd, self.regs.fpr_s(fs));
                }
            }
            Op::MovnD => {
                if self.regs.r[rt] != 0 {
                    let v = self.regs.fpr_d(fs)?;
                    self.regs.set_fpr_d(fd, v)?;
                }
            }
            Op::MovzS => {
                if self.regs.r[rt] == 0 {
                    self.regs.set_fpr_s(fd, self.regs.fpr_s(fs));
                }
            }
            Op::MovzD => {
                if self.regs.r[rt] == 0 {
                    let v = self.regs.fpr_d(fs)?;
                    self.regs.set_fpr_d(fd, v)?;
                }
            }

            // === Load / store / transfer ===
            Op::Lwc1 => {
                let addr = self.ea(inst);
                match self.mem.read_word(addr) {
                    Ok(v) => self.load_fpr(ft, v),
                    Err(e) => self.absorb_mem_error(e)?,
                }
            }
            Op::Ldc1 => {
                let addr = self.ea(inst);
                if ft & 0x1 != 0 {
                    return Err(FatalError("odd FP double register number".into()));
                }
                match self.mem.read_word(addr) {
                    Ok(lo) => match self.mem.read_word(addr + BYTES_PER_WORD) {
                        Ok(hi) => {
                            // Both words land at once; a two-word load
                            // cannot ride the one-slot load pipeline
                            self.regs.set_fpr_w(ft, lo);
                            self.regs.set_fpr_w(ft + 1, hi);
                        }
                        Err(e) => self.absorb_mem_error(e)?,
                    },
                    Err(e) => self.absorb_mem_error(e)?,
                }
            }
            Op::Swc1 => {
                let (addr, v) = (self.ea(inst), self.regs.fpr_w(ft));
                if let Err(e) = self.mem.write_word(addr, v) {
                    self.absorb_mem_error(e)?;
                }
            }
            Op::Sdc1 => {
                let addr = self.ea(inst);
                let bits = self.regs.fpr_d_bits(ft)?;
                match self.mem.write_word(addr, (bits & 0xffff_ffff) as u32) {
                    Ok(()) => {
                        if let Err(e) =
                            self.mem.write_word(addr + BYTES_PER_WORD, (bits >> 32) as u32)
                        {
                            self.absorb_mem_error(e)?;
                        }
                    }
                    Err(e) => self.absorb_mem_error(e)?,
                }
            }
            Op::Mfc1 => self.regs.r[rt] = self.regs.fpr_w(fs),
            Op::Mtc1 => {
                let v = self.regs.r[rt];
                self.regs.set_fpr_w(fs, v);
            }
            Op::Cfc1 => self.regs.r[rt] = self.regs.fcr[fs as usize],
            Op::Ctc1 => {
                let v = self.regs.r[rt];
                self.regs.fcr[fs as usize] = v;
                match fs as usize {
                    cp0::FIR => self.regs.fcr[cp0::FIR] = cp0::FIR_MASK, // read-only
                    cp0::FCCR => self.regs.assign_fcc(v),
                    cp0::FCSR => {
                        if v & !cp0::FCSR_MASK != 0 {
                            // Unsupported mode bits
                            self.raise_exception(ExcCode::Fpe);
                        }
                    }
                    _ => {}
                }
            }

            Op::Unknown => {
                let pc = self.regs.pc;
                self.run_error(&format!("Unknown instruction at 0x{pc:08x}"));
                return Ok(Flow::Halt);
            }

            // Integer ops never reach here
            _ => unreachable!("non-FPU op {:?} routed to FPU dispatch", inst.op),
        }

        Ok(Flow::Normal)
    }

    /// Evaluate a compare predicate into a condition-code bit.
    fn set_fpu_cc(&mut self, cond: u8, cc: u8, less: bool, equal: bool, unordered: bool) {
        let result = (cond & COND_LT != 0 && less)
            || (cond & COND_EQ != 0 && equal)
            || (cond & COND_UN != 0 && unordered);
        self.regs.set_fcc(cc, result);
    }
}

fn sign_bit(v: u32) -> u32 {
    v & 0x8000_0000
}

/// Signed overflow: operand signs match and the result sign differs.
fn arith_overflow(result: u32, op1: u32, op2: u32) -> bool {
    sign_bit(op1) == sign_bit(op2) && sign_bit(op1) != sign_bit(result)
}

// === Unaligned access merges ===
//
// The byte index within the aligned word selects how much of the memory
// word lands in the register (lwl/lwr) or the memory word (swl/swr). The
// masks are endian-specific.

#[cfg(not(feature = "big-endian"))]
fn merge_lwl(word: u32, reg: u32, addr: u32) -> u32 {
    match addr & 0x3 {
        0 => ((word & 0xff) << 24) | (reg & 0x00ff_ffff),
        1 => ((word & 0xffff) << 16) | (reg & 0xffff),
        2 => ((word & 0x00ff_ffff) << 8) | (reg & 0xff),
        _ => word,
    }
}

#[cfg(feature = "big-endian")]
fn merge_lwl(word: u32, reg: u32, addr: u32) -> u32 {
    match addr & 0x3 {
        0 => word,
        1 => ((word & 0x00ff_ffff) << 8) | (reg & 0xff),
        2 => ((word & 0xffff) << 16) | (reg & 0xffff),
        _ => ((word & 0xff) << 24) | (reg & 0x00ff_ffff),
    }
}

#[cfg(not(feature = "big-endian"))]
fn merge_lwr(word: u32, reg: u32, addr: u32) -> u32 {
    match addr & 0x3 {
        0 => word,
        1 => (reg & 0xff00_0000) | ((word & 0xffff_ff00) >> 8),
        2 => (reg & 0xffff_0000) | ((word & 0xffff_0000) >> 16),
        _ => (reg & 0xffff_ff00) | ((word & 0xff00_0000) >> 24),
    }
}

#[cfg(feature = "big-endian")]
fn merge_lwr(word: u32, reg: u32, addr: u32) -> u32 {
    match addr & 0x3 {
        0 => (reg & 0xffff_ff00) | ((word & 0xff00_0000) >> 24),
        1 => (reg & 0xffff_0000) | ((word & 0xffff_0000) >> 16),
        2 => (reg & 0xff00_0000) | ((word & 0xffff_ff00) >> 8),
        _ => word,
    }
}

#[cfg(not(feature = "big-endian"))]
fn merge_swl(word: u32, reg: u32, addr: u32) -> u32 {
    match addr & 0x3 {
        0 => (word & 0xffff_ff00) | ((reg >> 24) & 0xff),
        1 => (word & 0xffff_0000) | ((reg >> 16) & 0xffff),
        2 => (word & 0xff00_0000) | ((reg >> 8) & 0x00ff_ffff),
        _ => reg,
    }
}

#[cfg(feature = "big-endian")]
fn merge_swl(word: u32, reg: u32, addr: u32) -> u32 {
    match addr & 0x3 {
        0 => reg,
        1 => (word & 0xff00_0000) | ((reg >> 8) & 0x00ff_ffff),
        2 => (word & 0xffff_0000) | ((reg >> 16) & 0xffff),
        _ => (word & 0xffff_ff00) | ((reg >> 24) & 0xff),
    }
}

#[cfg(not(feature = "big-endian"))]
fn merge_swr(word: u32, reg: u32, addr: u32) -> u32 {
    match addr & 0x3 {
        0 => reg,
        1 => ((reg << 8) & 0xffff_ff00) | (word & 0xff),
        2 => ((reg << 16) & 0xffff_0000) | (word & 0xffff),
        _ => ((reg << 24) & 0xff00_0000) | (word & 0x00ff_ffff),
    }
}

#[cfg(feature = "big-endian")]
fn merge_swr(word: u32, reg: u32, addr: u32) -> u32 {
    match addr & 0x3 {
        0 => ((reg << 24) & 0xff00_0000) | (word & 0x00ff_ffff),
        1 => ((reg << 16) & 0xffff_0000) | (word & 0xffff),
        2 => ((reg << 8) & 0xffff_ff00) | (word & 0xff),
        _ => reg,
    }
}
