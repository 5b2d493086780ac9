//! Segmented MIPS32 memory image.
//!
//! Memory is five independent segments plus a scratch area:
//!
//! - user text from `0x0040_0000`, holding decoded instruction records
//! - user data from `0x1000_0000`, growable via `sbrk`
//! - the stack, growing down from `0x7fff_f000` and auto-extended on
//!   faults within 16 MiB of its current bottom
//! - kernel text from `0x8000_0000` and kernel data from `0x9000_0000`
//! - the special scratch area below the memory-mapped I/O window at the
//!   top of the address space
//!
//! "Bottom" is the direction of decreasing addresses, "top" increasing.

mod console;
mod hook;
mod image;

pub use console::{Console, RECV_CTRL, RECV_DATA, XMIT_CTRL, XMIT_DATA};
pub use hook::MemHook;
pub use image::{FatalError, MemError, MemFault, MemImage, MemResult};

/// Bottom of the user text segment.
pub const TEXT_BOT: u32 = 0x0040_0000;
/// Bottom of the user data segment.
pub const DATA_BOT: u32 = 0x1000_0000;
/// Exclusive top of the stack; the last stack byte is `0x7fff_efff`.
pub const STACK_TOP: u32 = 0x7fff_f000;
/// Bottom of the kernel text segment.
pub const K_TEXT_BOT: u32 = 0x8000_0000;
/// Bottom of the kernel data segment.
pub const K_DATA_BOT: u32 = 0x9000_0000;
/// Bottom of the special scratch segment.
pub const SPECIAL_BOT: u32 = 0xfffe_0000;
/// Exclusive top of the special scratch segment.
pub const SPECIAL_TOP: u32 = 0xffff_0000;
/// Bottom of the memory-mapped I/O window.
pub const MM_IO_BOT: u32 = 0xffff_0000;
/// Inclusive top of the memory-mapped I/O window.
pub const MM_IO_TOP: u32 = 0xffff_ffff;

pub const BYTES_PER_WORD: u32 = 4;

/// A data reference this far below the stack bottom grows the stack;
/// anything farther is treated as a stray pointer.
pub const STACK_GROWTH_WINDOW: u32 = 16 * 1024 * 1024;
