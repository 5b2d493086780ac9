//! Memory-mapped console device.
//!
//! Four word-wide registers at the top of the address space. Control
//! registers expose a device-owned ready bit and a guest-writable
//! interrupt-enable bit; reading the receiver data register consumes the
//! byte and clears ready.

use std::collections::VecDeque;

/// Receiver control register.
pub const RECV_CTRL: u32 = 0xffff_0000;
/// Receiver data register.
pub const RECV_DATA: u32 = 0xffff_0004;
/// Transmitter control register.
pub const XMIT_CTRL: u32 = 0xffff_0008;
/// Transmitter data register.
pub const XMIT_DATA: u32 = 0xffff_000c;

const CTRL_READY: u32 = 0x1;
const CTRL_INT_ENABLE: u32 = 0x2;

/// The memory-mapped terminal.
#[derive(Debug, Default)]
pub struct Console {
    recv_ctrl: u32,
    recv_data: u32,
    xmit_ctrl: u32,
    pending_input: VecDeque<u8>,
    output: Vec<u8>,
}

impl Console {
    #[must_use]
    pub fn new() -> Self {
        Self {
            // The transmitter is always ready; writes complete instantly.
            xmit_ctrl: CTRL_READY,
            ..Self::default()
        }
    }

    /// Queue host input for the guest to read.
    pub fn push_input(&mut self, bytes: &[u8]) {
        self.pending_input.extend(bytes.iter().copied());
    }

    /// Drain bytes the guest wrote to the transmitter.
    pub fn take_output(&mut self) -> Vec<u8> {
        std::mem::take(&mut self.output)
    }

    /// Promote queued input into the receiver data register.
    ///
    /// Called once per cycle; a byte becomes visible only after the
    /// previous one was consumed.
    pub fn tick(&mut self) {
        if self.recv_ctrl & CTRL_READY == 0
            && let Some(b) = self.pending_input.pop_front()
        {
            self.recv_data = u32::from(b);
            self.recv_ctrl |= CTRL_READY;
        }
    }

    /// Receiver has a byte and interrupts are enabled.
    #[must_use]
    pub fn recv_interrupt(&self) -> bool {
        self.recv_ctrl & CTRL_READY != 0 && self.recv_ctrl & CTRL_INT_ENABLE != 0
    }

    /// Transmitter can accept a byte and interrupts are enabled.
    #[must_use]
    pub fn xmit_interrupt(&self) -> bool {
        self.xmit_ctrl & CTRL_READY != 0 && self.xmit_ctrl & CTRL_INT_ENABLE != 0
    }

    /// Whether `addr` falls on one of the console registers.
    #[must_use]
    pub fn maps(addr: u32) -> bool {
        matches!(addr, RECV_CTRL | RECV_DATA | XMIT_CTRL | XMIT_DATA)
    }

    /// Guest read of a console register.
    pub fn read(&mut self, addr: u32) -> u32 {
        match addr {
            RECV_CTRL => self.recv_ctrl,
            RECV_DATA => {
                self.recv_ctrl &= !CTRL_READY;
                self.recv_data
            }
            XMIT_CTRL => self.xmit_ctrl,
            XMIT_DATA => 0,
            _ => 0,
        }
    }

    /// Guest write of a console register.
    ///
    /// Control writes may only change the interrupt-enable bit; the ready
    /// bits stay device-controlled.
    pub fn write(&mut self, addr: u32, value: u32) {
        match addr {
            RECV_CTRL => {
                self.recv_ctrl = (self.recv_ctrl & !CTRL_INT_ENABLE) | (value & CTRL_INT_ENABLE);
            }
            XMIT_CTRL => {
                self.xmit_ctrl = (self.xmit_ctrl & !CTRL_INT_ENABLE) | (value & CTRL_INT_ENABLE);
            }
            XMIT_DATA => {
                self.output.push((value & 0xff) as u8);
            }
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reading_receiver_data_clears_ready() {
        let mut console = Console::new();
        console.push_input(b"a");
        console.tick();
        assert_eq!(console.read(RECV_CTRL) & 0x1, 1);
        assert_eq!(console.read(RECV_DATA), u32::from(b'a'));
        assert_eq!(console.read(RECV_CTRL) & 0x1, 0);
    }

    #[test]
    fn control_writes_only_touch_interrupt_enable() {
        let mut console = Console::new();
        console.write(RECV_CTRL, 0xffff_ffff);
        assert_eq!(console.read(RECV_CTRL), 0x2);
        console.write(XMIT_CTRL, 0);
        // Transmitter ready bit survives the write
        assert_eq!(console.read(XMIT_CTRL) & 0x1, 1);
    }

    #[test]
    fn transmitter_collects_output() {
        let mut console = Console::new();
        console.write(XMIT_DATA, u32::from(b'h'));
        console.write(XMIT_DATA, u32::from(b'i'));
        assert_eq!(console.take_output(), b"hi");
        assert!(console.take_output().is_empty());
    }
}
