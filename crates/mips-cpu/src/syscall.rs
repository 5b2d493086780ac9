//! SPIM-compatible system calls, selected by `$v0`.
//!
//! These are the source-language syscalls: easier to use than real
//! kernel calls and portable to non-MIPS hosts. Unknown numbers report a
//! run-time error and execution continues.

use std::fs::OpenOptions;
use std::io::{BufRead, Read, Write};

use mips_mem::FatalError;

use crate::context::Context;
use crate::execute::Flow;
use crate::registers::{REG_A0, REG_A1, REG_A2, REG_FA0, REG_FRES, REG_V0};

const PRINT_INT: u32 = 1;
const PRINT_FLOAT: u32 = 2;
const PRINT_DOUBLE: u32 = 3;
const PRINT_STRING: u32 = 4;
const READ_INT: u32 = 5;
const READ_FLOAT: u32 = 6;
const READ_DOUBLE: u32 = 7;
const READ_STRING: u32 = 8;
const SBRK: u32 = 9;
const EXIT: u32 = 10;
const PRINT_CHAR: u32 = 11;
const READ_CHAR: u32 = 12;
const OPEN: u32 = 13;
const READ: u32 = 14;
const WRITE: u32 = 15;
const CLOSE: u32 = 16;
const EXIT2: u32 = 17;
const PRINT_HEX: u32 = 34;

/// Guest file descriptors 0-2 are the console; host files start here.
const FIRST_FILE_FD: u32 = 3;

impl Context {
    pub(crate) fn do_syscall(&mut self) -> Result<Flow, FatalError> {
        match self.regs.r[REG_V0] {
            PRINT_INT => {
                let s = format!("{}", self.regs.r[REG_A0] as i32);
                self.stdout.write(s.as_bytes());
            }
            PRINT_FLOAT => {
                let s = format!("{:.8}", self.regs.fpr_s(REG_FA0 as u8));
                self.stdout.write(s.as_bytes());
            }
            PRINT_DOUBLE => {
                let s = format!("{}", self.regs.fpr_d(REG_FA0 as u8)?);
                self.stdout.write(s.as_bytes());
            }
            PRINT_STRING => {
                let addr = self.regs.r[REG_A0];
                if let Some(bytes) = self.read_c_string(addr) {
                    self.stdout.write(&bytes);
                }
            }
            READ_INT => {
                let line = self.read_input_line();
                self.regs.r[REG_V0] = line.trim().parse::<i64>().unwrap_or(0) as u32;
            }
            READ_FLOAT => {
                let line = self.read_input_line();
                let v = line.trim().parse::<f32>().unwrap_or(0.0);
                self.regs.set_fpr_s(REG_FRES as u8, v);
            }
            READ_DOUBLE => {
                let line = self.read_input_line();
                let v = line.trim().parse::<f64>().unwrap_or(0.0);
                self.regs.set_fpr_d(REG_FRES as u8, v)?;
            }
            READ_STRING => {
                let line = self.read_input_line();
                let buf = self.regs.r[REG_A0];
                let max = self.regs.r[REG_A1];
                self.write_guest_string(buf, max, line.as_bytes());
            }
            SBRK => {
                let old_top = self.mem.data_top();
                self.mem.expand_data(self.regs.r[REG_A0] as i32)?;
                self.regs.r[REG_V0] = old_top;
            }
            EXIT => {
                self.exit_code = Some(0);
                return Ok(Flow::Halt);
            }
            PRINT_CHAR => {
                self.stdout.write(&[(self.regs.r[REG_A0] & 0xff) as u8]);
            }
            READ_CHAR => {
                let line = self.read_input_line();
                let c = line.bytes().next().unwrap_or(b'\n');
                self.regs.r[REG_V0] = u32::from(c);
            }
            OPEN => {
                self.regs.r[REG_V0] = self.syscall_open();
            }
            READ => {
                self.regs.r[REG_V0] = self.syscall_read();
            }
            WRITE => {
                self.regs.r[REG_V0] = self.syscall_write();
            }
            CLOSE => {
                let fd = self.regs.r[REG_A0];
                if fd >= FIRST_FILE_FD {
                    if let Some(slot) = self.files.get_mut((fd - FIRST_FILE_FD) as usize) {
                        *slot = None;
                    }
                }
                self.regs.r[REG_V0] = 0;
            }
            EXIT2 => {
                self.exit_code = Some(self.regs.r[REG_A0] as i32);
                return Ok(Flow::Halt);
            }
            PRINT_HEX => {
                let s = format!("{:x}", self.regs.r[REG_A0]);
                self.stdout.write(s.as_bytes());
            }
            n => {
                self.run_error(&format!("Unknown system call: {n}"));
            }
        }
        Ok(Flow::Normal)
    }

    /// One line from the console source (host stdin unless replaced).
    fn read_input_line(&mut self) -> String {
        let mut line = String::new();
        if let Some(input) = self.input.as_mut() {
            let _ = input.read_line(&mut line);
        } else {
            let _ = std::io::stdin().lock().read_line(&mut line);
        }
        line
    }

    /// NUL-terminated guest string, or a run-time error on a bad pointer.
    fn read_c_string(&mut self, addr: u32) -> Option<Vec<u8>> {
        let mut bytes = Vec::new();
        let mut p = addr;
        loop {
            match self.mem.read_byte(p) {
                Ok(0) => return Some(bytes),
                Ok(b) => bytes.push((b & 0xff) as u8),
                Err(_) => {
                    self.run_error("Memory address out of bounds");
                    return None;
                }
            }
            p = p.wrapping_add(1);
        }
    }

    /// fgets semantics: up to `max - 1` bytes, NUL-terminated.
    fn write_guest_string(&mut self, buf: u32, max: u32, line: &[u8]) {
        if max == 0 {
            return;
        }
        let take = line.len().min((max - 1) as usize);
        for (i, b) in line[..take].iter().enumerate() {
            if self.mem.write_byte(buf + i as u32, u32::from(*b)).is_err() {
                self.run_error("Memory address out of bounds");
                return;
            }
        }
        let _ = self.mem.write_byte(buf + take as u32, 0);
    }

    fn syscall_open(&mut self) -> u32 {
        let Some(path) = self.read_c_string(self.regs.r[REG_A0]) else {
            return u32::MAX;
        };
        let Ok(path) = String::from_utf8(path) else {
            return u32::MAX;
        };
        let flags = self.regs.r[REG_A1];
        let access = flags & 0x3;
        let mut options = OpenOptions::new();
        options
            .read(access == 0 || access == 2)
            .write(access == 1 || access == 2)
            .create(flags & 0x40 != 0)
            .truncate(flags & 0x200 != 0)
            .append(flags & 0x400 != 0);
        match options.open(&path) {
            Ok(file) => {
                self.files.push(Some(file));
                FIRST_FILE_FD + (self.files.len() as u32 - 1)
            }
            Err(_) => u32::MAX,
        }
    }

    fn syscall_read(&mut self) -> u32 {
        let fd = self.regs.r[REG_A0];
        let addr = self.regs.r[REG_A1];
        let len = self.regs.r[REG_A2] as usize;

        let data = if fd == 0 {
            self.read_input_line().into_bytes()
        } else if fd >= FIRST_FILE_FD {
            let Some(Some(file)) = self.files.get_mut((fd - FIRST_FILE_FD) as usize) else {
                return u32::MAX;
            };
            let mut buf = vec![0u8; len];
            match file.read(&mut buf) {
                Ok(n) => {
                    buf.truncate(n);
                    buf
                }
                Err(_) => return u32::MAX,
            }
        } else {
            return u32::MAX;
        };

        let take = data.len().min(len);
        for (i, b) in data[..take].iter().enumerate() {
            if self.mem.write_byte(addr + i as u32, u32::from(*b)).is_err() {
                self.run_error("Memory address out of bounds");
                return i as u32;
            }
        }
        take as u32
    }

    fn syscall_write(&mut self) -> u32 {
        let fd = self.regs.r[REG_A0];
        let addr = self.regs.r[REG_A1];
        let len = self.regs.r[REG_A2];

        let mut data = Vec::with_capacity(len as usize);
        for i in 0..len {
            match self.mem.read_byte(addr + i) {
                Ok(b) => data.push((b & 0xff) as u8),
                Err(_) => {
                    self.run_error("Memory address out of bounds");
                    return u32::MAX;
                }
            }
        }

        match fd {
            1 => self.stdout.write(&data),
            2 => self.stderr.write(&data),
            fd if fd >= FIRST_FILE_FD => {
                let Some(Some(file)) = self.files.get_mut((fd - FIRST_FILE_FD) as usize) else {
                    return u32::MAX;
                };
                if file.write_all(&data).is_err() {
                    return u32::MAX;
                }
            }
            _ => return u32::MAX,
        }
        len
    }
}
