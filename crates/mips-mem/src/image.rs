//! The memory image: five segments, typed accessors, growth.

use std::sync::Arc;

use emu_core::SimConfig;
use mips_inst::{Instruction, decode};
use thiserror::Error;

use crate::console::Console;
use crate::hook::MemHook;
use crate::{
    BYTES_PER_WORD, DATA_BOT, K_DATA_BOT, K_TEXT_BOT, MM_IO_BOT, SPECIAL_BOT, SPECIAL_TOP,
    STACK_GROWTH_WINDOW, STACK_TOP, TEXT_BOT,
};

/// An architectural memory fault, routed through the CP0 exception
/// mechanism by the engine. Carries the faulting address for `BadVAddr`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum MemFault {
    /// AdEL: unaligned or otherwise bad address on a load.
    #[error("unaligned address in inst/data fetch: {0:#010x}")]
    LoadAddressError(u32),
    /// AdES: unaligned or otherwise bad address on a store.
    #[error("unaligned address in store: {0:#010x}")]
    StoreAddressError(u32),
    /// IBE: instruction fetch outside text.
    #[error("bad address in text read: {0:#010x}")]
    InstructionBusError(u32),
    /// DBE: data access outside every segment.
    #[error("bad address in data/stack read: {0:#010x}")]
    DataBusError(u32),
}

impl MemFault {
    /// The address that goes to `CP0 BadVAddr`.
    #[must_use]
    pub fn addr(self) -> u32 {
        match self {
            MemFault::LoadAddressError(a)
            | MemFault::StoreAddressError(a)
            | MemFault::InstructionBusError(a)
            | MemFault::DataBusError(a) => a,
        }
    }
}

/// Unrecoverable simulator error. The scheduler flushes the context
/// streams and terminates the process with exit code -1.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct FatalError(pub String);

/// Either an architectural fault or a fatal simulator error.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MemError {
    #[error(transparent)]
    Fault(#[from] MemFault),
    #[error(transparent)]
    Fatal(#[from] FatalError),
}

pub type MemResult<T> = Result<T, MemError>;

fn round_up(n: u32, align: u32) -> u32 {
    (n + align - 1) / align * align
}

/// Byte position of `addr`'s byte within its aligned word.
#[cfg(not(feature = "big-endian"))]
fn byte_shift(addr: u32) -> u32 {
    8 * (addr & 0x3)
}

#[cfg(feature = "big-endian")]
fn byte_shift(addr: u32) -> u32 {
    8 * (3 - (addr & 0x3))
}

/// Bit position of `addr`'s half-word within its aligned word.
#[cfg(not(feature = "big-endian"))]
fn half_shift(addr: u32) -> u32 {
    8 * (addr & 0x2)
}

#[cfg(feature = "big-endian")]
fn half_shift(addr: u32) -> u32 {
    8 * (2 - (addr & 0x2))
}

/// A text segment: decoded instruction records plus a fetch profile.
struct TextSeg {
    base: u32,
    insts: Vec<Option<Arc<Instruction>>>,
    prof: Vec<u32>,
    top: u32,
}

impl TextSeg {
    fn new(base: u32, size: u32) -> Self {
        let words = (round_up(size, BYTES_PER_WORD) / BYTES_PER_WORD) as usize;
        Self {
            base,
            insts: vec![None; words],
            prof: vec![0; words],
            top: base + round_up(size, BYTES_PER_WORD),
        }
    }

    fn contains(&self, addr: u32) -> bool {
        addr >= self.base && addr < self.top
    }

    fn index(&self, addr: u32) -> usize {
        ((addr - self.base) / BYTES_PER_WORD) as usize
    }

    /// Stored encoding of the word at `addr`, 0 for an empty slot.
    fn encoding_at(&self, addr: u32) -> u32 {
        self.insts[self.index(addr)]
            .as_ref()
            .map_or(0, |inst| inst.encoding)
    }
}

/// A word-granular data segment growing upward from its base.
struct DataSeg {
    base: u32,
    words: Vec<u32>,
    top: u32,
}

impl DataSeg {
    fn new(base: u32, size: u32) -> Self {
        let size = round_up(size, BYTES_PER_WORD);
        Self {
            base,
            words: vec![0; (size / BYTES_PER_WORD) as usize],
            top: base + size,
        }
    }

    fn contains(&self, addr: u32) -> bool {
        addr >= self.base && addr < self.top
    }

    fn word(&self, addr: u32) -> u32 {
        self.words[((addr - self.base) / BYTES_PER_WORD) as usize]
    }

    fn word_mut(&mut self, addr: u32) -> &mut u32 {
        &mut self.words[((addr - self.base) / BYTES_PER_WORD) as usize]
    }
}

/// One context's memory.
pub struct MemImage {
    text: TextSeg,
    k_text: TextSeg,
    data: DataSeg,
    k_data: DataSeg,
    special: DataSeg,
    /// Stack storage; `words[0]` sits at `stack_bot`.
    stack: Vec<u32>,
    stack_bot: u32,
    data_limit: u32,
    stack_limit: u32,
    k_data_limit: u32,
    console: Console,
    hook: Option<Box<dyn MemHook>>,
    text_modified: bool,
    data_modified: bool,
}

impl MemImage {
    #[must_use]
    pub fn new(cfg: &SimConfig) -> Self {
        // Keep at least 64 KiB of data so the small-data area fits.
        let data_size = cfg.data_size.max(0x10000);
        let stack_size = round_up(cfg.stack_size, BYTES_PER_WORD);
        Self {
            text: TextSeg::new(TEXT_BOT, cfg.text_size),
            k_text: TextSeg::new(K_TEXT_BOT, cfg.k_text_size),
            data: DataSeg::new(DATA_BOT, data_size),
            k_data: DataSeg::new(K_DATA_BOT, cfg.k_data_size),
            special: DataSeg::new(SPECIAL_BOT, SPECIAL_TOP - SPECIAL_BOT),
            stack: vec![0; (stack_size / BYTES_PER_WORD) as usize],
            stack_bot: STACK_TOP - stack_size,
            data_limit: cfg.data_limit,
            stack_limit: cfg.stack_limit,
            k_data_limit: cfg.k_data_limit,
            console: Console::new(),
            hook: None,
            text_modified: false,
            data_modified: false,
        }
    }

    /// Install a custom access hook consulted before segment routing.
    pub fn set_hook(&mut self, hook: Box<dyn MemHook>) {
        self.hook = Some(hook);
    }

    pub fn console(&mut self) -> &mut Console {
        &mut self.console
    }

    // === Segment bounds, for routing and the reader interface ===

    #[must_use]
    pub fn text_top(&self) -> u32 {
        self.text.top
    }

    #[must_use]
    pub fn k_text_top(&self) -> u32 {
        self.k_text.top
    }

    #[must_use]
    pub fn data_top(&self) -> u32 {
        self.data.top
    }

    #[must_use]
    pub fn k_data_top(&self) -> u32 {
        self.k_data.top
    }

    #[must_use]
    pub fn stack_bot(&self) -> u32 {
        self.stack_bot
    }

    /// Word view of user data, for snapshot readers.
    #[must_use]
    pub fn data_words(&self) -> &[u32] {
        &self.data.words
    }

    /// Word view of kernel data, for snapshot readers.
    #[must_use]
    pub fn k_data_words(&self) -> &[u32] {
        &self.k_data.words
    }

    /// Word view of the stack, bottom first, for snapshot readers.
    #[must_use]
    pub fn stack_words(&self) -> &[u32] {
        &self.stack
    }

    /// Fetch counts per user-text word.
    #[must_use]
    pub fn text_profile(&self) -> &[u32] {
        &self.text.prof
    }

    /// Fetch counts per kernel-text word.
    #[must_use]
    pub fn k_text_profile(&self) -> &[u32] {
        &self.k_text.prof
    }

    /// Non-faulting peek at a text slot, for disassembly.
    #[must_use]
    pub fn inst_at(&self, addr: u32) -> Option<&Arc<Instruction>> {
        if self.text.contains(addr) && addr & 0x3 == 0 {
            self.text.insts[self.text.index(addr)].as_ref()
        } else if self.k_text.contains(addr) && addr & 0x3 == 0 {
            self.k_text.insts[self.k_text.index(addr)].as_ref()
        } else {
            None
        }
    }

    #[must_use]
    pub fn text_modified(&self) -> bool {
        self.text_modified
    }

    #[must_use]
    pub fn data_modified(&self) -> bool {
        self.data_modified
    }

    // === Instruction access ===

    /// Fetch the decoded instruction at `addr` and bump its profile
    /// counter. `Ok(None)` is an empty slot.
    pub fn read_inst(&mut self, addr: u32) -> Result<Option<Arc<Instruction>>, MemFault> {
        let seg = if self.text.contains(addr) && addr & 0x3 == 0 {
            &mut self.text
        } else if self.k_text.contains(addr) && addr & 0x3 == 0 {
            &mut self.k_text
        } else {
            return Err(MemFault::InstructionBusError(addr));
        };
        let idx = seg.index(addr);
        seg.prof[idx] += 1;
        Ok(seg.insts[idx].clone())
    }

    /// Install an instruction record, assembler-driven.
    pub fn write_inst(&mut self, addr: u32, inst: Instruction) -> Result<(), MemFault> {
        self.text_modified = true;
        let seg = if self.text.contains(addr) && addr & 0x3 == 0 {
            &mut self.text
        } else if self.k_text.contains(addr) && addr & 0x3 == 0 {
            &mut self.k_text
        } else {
            return Err(MemFault::InstructionBusError(addr));
        };
        let idx = seg.index(addr);
        seg.insts[idx] = Some(Arc::new(inst));
        Ok(())
    }

    // === Data reads ===
    //
    // Routing is a fixed cascade of range tests; the infrequent cases
    // (text aliasing, stack growth, MMIO, faults) live in `bad_read`.

    /// Read one byte, sign-extended to 32 bits.
    pub fn read_byte(&mut self, addr: u32) -> MemResult<u32> {
        if let Some(hook) = self.hook.as_mut()
            && let Some(v) = hook.read_byte(addr)
        {
            return Ok(v);
        }
        let seg = if self.data.contains(addr) {
            &self.data
        } else if addr >= self.stack_bot && addr < STACK_TOP {
            return Ok(sign_extend_byte(
                self.stack[((addr - self.stack_bot) / BYTES_PER_WORD) as usize],
                addr,
            ));
        } else if self.k_data.contains(addr) {
            &self.k_data
        } else if self.special.contains(addr) {
            &self.special
        } else {
            return self.bad_read(addr, 0x0);
        };
        Ok(sign_extend_byte(seg.word(addr & !0x3), addr))
    }

    /// Read one half-word, sign-extended to 32 bits.
    pub fn read_half(&mut self, addr: u32) -> MemResult<u32> {
        if let Some(hook) = self.hook.as_mut()
            && let Some(v) = hook.read_half(addr)
        {
            return Ok(v);
        }
        let aligned = addr & 0x1 == 0;
        let seg = if self.data.contains(addr) && aligned {
            &self.data
        } else if addr >= self.stack_bot && addr < STACK_TOP && aligned {
            return Ok(sign_extend_half(
                self.stack[((addr - self.stack_bot) / BYTES_PER_WORD) as usize],
                addr,
            ));
        } else if self.k_data.contains(addr) && aligned {
            &self.k_data
        } else if self.special.contains(addr) && aligned {
            &self.special
        } else {
            return self.bad_read(addr, 0x1);
        };
        Ok(sign_extend_half(seg.word(addr & !0x3), addr))
    }

    /// Read one aligned word.
    pub fn read_word(&mut self, addr: u32) -> MemResult<u32> {
        if let Some(hook) = self.hook.as_mut()
            && let Some(v) = hook.read_word(addr)
        {
            return Ok(v);
        }
        let aligned = addr & 0x3 == 0;
        if self.data.contains(addr) && aligned {
            Ok(self.data.word(addr))
        } else if addr >= self.stack_bot && addr < STACK_TOP && aligned {
            Ok(self.stack[((addr - self.stack_bot) / BYTES_PER_WORD) as usize])
        } else if self.k_data.contains(addr) && aligned {
            Ok(self.k_data.word(addr))
        } else if self.special.contains(addr) && aligned {
            Ok(self.special.word(addr))
        } else {
            self.bad_read(addr, 0x3)
        }
    }

    // === Data writes ===

    pub fn write_byte(&mut self, addr: u32, value: u32) -> MemResult<()> {
        self.data_modified = true;
        if let Some(hook) = self.hook.as_mut()
            && hook.write_byte(addr, value)
        {
            return Ok(());
        }
        let shift = byte_shift(addr);
        let merge = |word: &mut u32| *word = (*word & !(0xff << shift)) | ((value & 0xff) << shift);
        if self.data.contains(addr) {
            merge(self.data.word_mut(addr & !0x3));
        } else if addr >= self.stack_bot && addr < STACK_TOP {
            let idx = ((addr - self.stack_bot) / BYTES_PER_WORD) as usize;
            merge(&mut self.stack[idx]);
        } else if self.k_data.contains(addr) {
            merge(self.k_data.word_mut(addr & !0x3));
        } else if self.special.contains(addr) {
            merge(self.special.word_mut(addr & !0x3));
        } else {
            return self.bad_write(addr, value, 0x0);
        }
        Ok(())
    }

    pub fn write_half(&mut self, addr: u32, value: u32) -> MemResult<()> {
        self.data_modified = true;
        if let Some(hook) = self.hook.as_mut()
            && hook.write_half(addr, value)
        {
            return Ok(());
        }
        let aligned = addr & 0x1 == 0;
        let shift = half_shift(addr);
        let merge =
            |word: &mut u32| *word = (*word & !(0xffff << shift)) | ((value & 0xffff) << shift);
        if self.data.contains(addr) && aligned {
            merge(self.data.word_mut(addr & !0x3));
        } else if addr >= self.stack_bot && addr < STACK_TOP && aligned {
            let idx = ((addr - self.stack_bot) / BYTES_PER_WORD) as usize;
            merge(&mut self.stack[idx]);
        } else if self.k_data.contains(addr) && aligned {
            merge(self.k_data.word_mut(addr & !0x3));
        } else if self.special.contains(addr) && aligned {
            merge(self.special.word_mut(addr & !0x3));
        } else {
            return self.bad_write(addr, value, 0x1);
        }
        Ok(())
    }

    pub fn write_word(&mut self, addr: u32, value: u32) -> MemResult<()> {
        self.data_modified = true;
        if let Some(hook) = self.hook.as_mut()
            && hook.write_word(addr, value)
        {
            return Ok(());
        }
        let aligned = addr & 0x3 == 0;
        if self.data.contains(addr) && aligned {
            *self.data.word_mut(addr) = value;
        } else if addr >= self.stack_bot && addr < STACK_TOP && aligned {
            let idx = ((addr - self.stack_bot) / BYTES_PER_WORD) as usize;
            self.stack[idx] = value;
        } else if self.k_data.contains(addr) && aligned {
            *self.k_data.word_mut(addr) = value;
        } else if self.special.contains(addr) && aligned {
            *self.special.word_mut(addr) = value;
        } else {
            return self.bad_write(addr, value, 0x3);
        }
        Ok(())
    }

    // === The infrequent and erroneous cases ===

    /// Reads that fell out of the main cascade: text aliasing, stack
    /// growth, MMIO, and the faults.
    fn bad_read(&mut self, addr: u32, mask: u32) -> MemResult<u32> {
        if addr & mask != 0 {
            return Err(MemFault::LoadAddressError(addr).into());
        }
        if self.text.contains(addr) {
            // Raw data read of text: synthesize from the stored encoding.
            let word = self.text.encoding_at(addr & !0x3);
            return Ok(match mask {
                0x0 => sign_extend_byte(word, addr),
                0x1 => sign_extend_half(word, addr),
                _ => word,
            });
        }
        if addr > self.data.top && addr < self.stack_bot
            && addr > self.stack_bot.saturating_sub(STACK_GROWTH_WINDOW)
        {
            self.expand_stack(self.stack_bot - addr + 4)?;
            return Ok(0);
        }
        if addr >= MM_IO_BOT {
            if Console::maps(addr) {
                return Ok(self.console.read(addr));
            }
            return Err(MemFault::DataBusError(addr).into());
        }
        Err(MemFault::DataBusError(addr).into())
    }

    /// Writes that fell out of the main cascade.
    fn bad_write(&mut self, addr: u32, value: u32, mask: u32) -> MemResult<()> {
        if addr & mask != 0 {
            return Err(MemFault::StoreAddressError(addr).into());
        }
        if self.text.contains(addr) {
            // Raw write into text: merge into the stored encoding and
            // re-decode, replacing the instruction record.
            let old = self.text.encoding_at(addr & !0x3);
            let word = match mask {
                0x0 => {
                    let shift = byte_shift(addr);
                    (old & !(0xff << shift)) | ((value & 0xff) << shift)
                }
                0x1 => {
                    let shift = half_shift(addr);
                    (old & !(0xffff << shift)) | ((value & 0xffff) << shift)
                }
                _ => value,
            };
            let idx = self.text.index(addr & !0x3);
            self.text.insts[idx] = Some(Arc::new(decode(word)));
            self.text_modified = true;
            return Ok(());
        }
        if addr > self.data.top && addr < self.stack_bot
            && addr > self.stack_bot.saturating_sub(STACK_GROWTH_WINDOW)
        {
            self.expand_stack(self.stack_bot - addr + 4)?;
            if addr >= self.stack_bot {
                let idx = ((addr - self.stack_bot) / BYTES_PER_WORD) as usize;
                let word = &mut self.stack[idx];
                match mask {
                    0x0 => {
                        let shift = byte_shift(addr);
                        *word = (*word & !(0xff << shift)) | ((value & 0xff) << shift);
                    }
                    0x1 => {
                        let shift = half_shift(addr);
                        *word = (*word & !(0xffff << shift)) | ((value & 0xffff) << shift);
                    }
                    _ => *word = value,
                }
                return Ok(());
            }
            return Err(MemFault::DataBusError(addr).into());
        }
        if addr >= MM_IO_BOT {
            if Console::maps(addr) {
                self.console.write(addr, value);
                return Ok(());
            }
            return Err(MemFault::DataBusError(addr).into());
        }
        Err(MemFault::DataBusError(addr).into())
    }

    // === Growth ===

    /// Grow the user data segment by `addl_bytes`, zero-filled.
    pub fn expand_data(&mut self, addl_bytes: i32) -> Result<(), FatalError> {
        let delta = round_up(addl_bytes.max(0) as u32, BYTES_PER_WORD);
        let new_size = (self.data.top - DATA_BOT) + delta;
        if addl_bytes < 0 || new_size > self.data_limit {
            return Err(FatalError(format!(
                "can't expand data segment by {addl_bytes} bytes to {new_size} bytes (limit {})",
                self.data_limit
            )));
        }
        self.data
            .words
            .resize((new_size / BYTES_PER_WORD) as usize, 0);
        self.data.top += delta;
        Ok(())
    }

    /// Grow the kernel data segment by `addl_bytes`, zero-filled.
    pub fn expand_k_data(&mut self, addl_bytes: i32) -> Result<(), FatalError> {
        let delta = round_up(addl_bytes.max(0) as u32, BYTES_PER_WORD);
        let new_size = (self.k_data.top - K_DATA_BOT) + delta;
        if addl_bytes < 0 || new_size > self.k_data_limit {
            return Err(FatalError(format!(
                "can't expand kernel data segment by {addl_bytes} bytes to {new_size} bytes (limit {})",
                self.k_data_limit
            )));
        }
        self.k_data
            .words
            .resize((new_size / BYTES_PER_WORD) as usize, 0);
        self.k_data.top += delta;
        Ok(())
    }

    /// Grow the stack by at least `addl_bytes`. The stack at least
    /// doubles each time to amortize the backward copy.
    pub fn expand_stack(&mut self, addl_bytes: u32) -> Result<(), FatalError> {
        let delta = round_up(addl_bytes, BYTES_PER_WORD);
        let old_size = STACK_TOP - self.stack_bot;
        let new_size = old_size + delta.max(old_size);
        if new_size > self.stack_limit {
            return Err(FatalError(format!(
                "can't expand stack segment by {addl_bytes} bytes to {new_size} bytes (limit {})",
                self.stack_limit
            )));
        }
        // The stack grows down, so existing words move to the end of the
        // new buffer.
        let mut new_seg = vec![0u32; (new_size / BYTES_PER_WORD) as usize];
        let offset = ((new_size - old_size) / BYTES_PER_WORD) as usize;
        new_seg[offset..].copy_from_slice(&self.stack);
        self.stack = new_seg;
        self.stack_bot -= new_size - old_size;
        Ok(())
    }
}

/// Extract the addressed byte from its aligned word and sign-extend.
fn sign_extend_byte(word: u32, addr: u32) -> u32 {
    let b = (word >> byte_shift(addr)) & 0xff;
    b as u8 as i8 as i32 as u32
}

/// Extract the addressed half-word from its aligned word and sign-extend.
fn sign_extend_half(word: u32, addr: u32) -> u32 {
    let h = (word >> half_shift(addr)) & 0xffff;
    h as u16 as i16 as i32 as u32
}
