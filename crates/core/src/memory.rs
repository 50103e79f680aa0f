//! AVR data space, program memory, and register-hook tables.
//!
//! The data space follows the classic AVR unified layout:
//!
//! | Address Range      | Content                       |
//! |--------------------|-------------------------------|
//! | 0x0000–0x001F      | General registers R0–R31      |
//! | 0x0020–0x00FF      | I/O + extended I/O registers  |
//! | 0x0100–0x0100+SRAM | Internal SRAM                 |
//!
//! Program memory is a separate array of 16-bit words. Peripherals intercept
//! register accesses through [`HookTable`] rather than through subclassing.

use std::collections::HashMap;
use std::rc::Rc;

use crate::cpu::Cpu;
use crate::{REGISTER_SPACE, X_ADDR, Y_ADDR, Z_ADDR};

/// Replaces the raw byte for a data-space read. Receives the address read.
pub type ReadHook = Rc<dyn Fn(&mut Cpu, u16) -> u8>;

/// Intercepts a data-space write.
///
/// Arguments are `(value, old_value, addr, mask)`. Returning `true` marks the
/// write as handled, and the raw store is skipped.
pub type WriteHook = Rc<dyn Fn(&mut Cpu, u8, u8, u16, u8) -> bool>;

/// Data space and program memory.
pub struct Memory {
    /// Registers (0x00-0x1F) + I/O (0x20-0xFF) + SRAM (0x100+)
    pub data: Vec<u8>,
    /// Program memory, one entry per 16-bit instruction word
    pub prog: Vec<u16>,
}

impl Memory {
    pub fn new(prog: Vec<u16>, sram_bytes: usize) -> Self {
        Memory {
            data: vec![0u8; sram_bytes + REGISTER_SPACE],
            prog,
        }
    }

    // --- Register access ---

    #[inline(always)]
    pub fn reg(&self, r: u8) -> u8 {
        self.data[r as usize]
    }

    #[inline(always)]
    pub fn set_reg(&mut self, r: u8, v: u8) {
        self.data[r as usize] = v;
    }

    /// Read a little-endian 16-bit value at any data address.
    #[inline(always)]
    pub fn read_u16(&self, addr: usize) -> u16 {
        self.data[addr] as u16 | ((self.data[addr + 1] as u16) << 8)
    }

    #[inline(always)]
    pub fn write_u16(&mut self, addr: usize, v: u16) {
        self.data[addr] = v as u8;
        self.data[addr + 1] = (v >> 8) as u8;
    }

    /// Read 16-bit register pair (little-endian: low reg first)
    /// pair 0=W(R24:R25), 1=X(R26:R27), 2=Y(R28:R29), 3=Z(R30:R31)
    #[inline(always)]
    pub fn reg_pair(&self, pair: u8) -> u16 {
        self.read_u16(24 + (pair as usize) * 2)
    }

    #[inline(always)]
    pub fn set_reg_pair(&mut self, pair: u8, v: u16) {
        self.write_u16(24 + (pair as usize) * 2, v);
    }

    #[inline(always)]
    pub fn x(&self) -> u16 {
        self.read_u16(X_ADDR)
    }

    #[inline(always)]
    pub fn y(&self) -> u16 {
        self.read_u16(Y_ADDR)
    }

    #[inline(always)]
    pub fn z(&self) -> u16 {
        self.read_u16(Z_ADDR)
    }

    #[inline(always)]
    pub fn set_x(&mut self, v: u16) {
        self.write_u16(X_ADDR, v);
    }

    #[inline(always)]
    pub fn set_y(&mut self, v: u16) {
        self.write_u16(Y_ADDR, v);
    }

    #[inline(always)]
    pub fn set_z(&mut self, v: u16) {
        self.write_u16(Z_ADDR, v);
    }

    // --- Program memory ---

    /// Read an instruction word; words past the end of the image read as 0.
    #[inline(always)]
    pub fn prog_word(&self, word_addr: usize) -> u16 {
        self.prog.get(word_addr).copied().unwrap_or(0)
    }

    /// Read a single byte from program memory at a byte address (LPM view).
    #[inline(always)]
    pub fn prog_byte(&self, byte_addr: usize) -> u8 {
        let word = self.prog_word(byte_addr >> 1);
        if byte_addr & 1 == 0 { word as u8 } else { (word >> 8) as u8 }
    }

    /// Size of program memory in bytes.
    pub fn prog_bytes(&self) -> usize {
        self.prog.len() * 2
    }
}

/// Sparse address→callback maps consulted on every data-space access.
///
/// At most one hook per address per table; registering again replaces the
/// previous hook.
#[derive(Default, Clone)]
pub struct HookTable {
    read: HashMap<u16, ReadHook>,
    write: HashMap<u16, WriteHook>,
}

impl HookTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_read(&mut self, addr: u16, hook: ReadHook) {
        self.read.insert(addr, hook);
    }

    pub fn set_write(&mut self, addr: u16, hook: WriteHook) {
        self.write.insert(addr, hook);
    }

    pub fn remove_read(&mut self, addr: u16) -> bool {
        self.read.remove(&addr).is_some()
    }

    pub fn remove_write(&mut self, addr: u16) -> bool {
        self.write.remove(&addr).is_some()
    }

    /// Cloned handle to the read hook at `addr`, so the caller can invoke it
    /// while holding `&mut Cpu`.
    #[inline(always)]
    pub fn read_hook(&self, addr: u16) -> Option<ReadHook> {
        self.read.get(&addr).cloned()
    }

    #[inline(always)]
    pub fn write_hook(&self, addr: u16) -> Option<WriteHook> {
        self.write.get(&addr).cloned()
    }
}
