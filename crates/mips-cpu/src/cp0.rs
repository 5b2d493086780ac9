//! Coprocessor 0 register numbers and implemented bitfields.

/// BadVAddr register number.
pub const BADVADDR: usize = 8;
/// Count register number.
pub const COUNT: usize = 9;
/// Compare register number.
pub const COMPARE: usize = 11;
/// Status register number.
pub const STATUS: usize = 12;
/// Cause register number.
pub const CAUSE: usize = 13;
/// EPC register number.
pub const EPC: usize = 14;
/// Config register number.
pub const CONFIG: usize = 16;

// === Status fields ===

pub const STATUS_CU: u32 = 0xf000_0000;
pub const STATUS_IM: u32 = 0x0000_ff00;
pub const STATUS_UM: u32 = 0x0000_0010;
pub const STATUS_EXL: u32 = 0x0000_0002;
pub const STATUS_IE: u32 = 0x0000_0001;
pub const STATUS_MASK: u32 = STATUS_CU | STATUS_UM | STATUS_IM | STATUS_EXL | STATUS_IE;

// === Cause fields ===

pub const CAUSE_BD: u32 = 0x8000_0000;
pub const CAUSE_IP: u32 = 0x0000_ff00;
/// HW interrupt 5 (the timer).
pub const CAUSE_IP7: u32 = 0x0000_8000;
/// HW interrupt 1: console receiver.
pub const CAUSE_IP3: u32 = 0x0000_0800;
/// HW interrupt 0: console transmitter.
pub const CAUSE_IP2: u32 = 0x0000_0400;
pub const CAUSE_EXCCODE: u32 = 0x0000_007c;
pub const CAUSE_MASK: u32 = CAUSE_BD | CAUSE_IP | CAUSE_EXCCODE;

// === Config fields ===

pub const CONFIG_BE: u32 = 0x0008_0000;
pub const CONFIG_AT: u32 = 0x0006_0000;
pub const CONFIG_AR: u32 = 0x0001_c000;
pub const CONFIG_MT: u32 = 0x0000_0380;
pub const CONFIG_MASK: u32 = CONFIG_BE | CONFIG_AT | CONFIG_AR | CONFIG_MT;

// === FPU control registers ===

/// FIR register number within the FPU control file.
pub const FIR: usize = 0;
/// FCCR register number (whole condition-code vector).
pub const FCCR: usize = 25;
/// FCSR register number.
pub const FCSR: usize = 31;

pub const FIR_W: u32 = 0x0000_8000;
pub const FIR_D: u32 = 0x0000_1000;
pub const FIR_S: u32 = 0x0000_0800;
pub const FIR_MASK: u32 = FIR_W | FIR_D | FIR_S;

/// The eight FCC bits: bit 23 plus bits 25..=31.
pub const FCSR_FCC: u32 = 0xfe80_0000;
pub const FCSR_MASK: u32 = FCSR_FCC;

const CC0_BIT: u32 = 23;
const CC1_BIT: u32 = 25;

/// Bit mask of condition code `n` within FCSR.
#[must_use]
pub fn cc_mask(n: u8) -> u32 {
    if n == 0 || n > 7 {
        1 << CC0_BIT
    } else {
        1 << (CC1_BIT + u32::from(n) - 1)
    }
}
