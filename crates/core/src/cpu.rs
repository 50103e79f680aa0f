//! AVR CPU state.
//!
//! [`Cpu`] owns everything one emulated core touches: the data space and
//! program memory, the register hook tables, the pending-interrupt set, the
//! clock-event scheduler, and the registry of GPIO ports installed on it.
//! SP and SREG are not shadowed in fields; they live at their memory-mapped
//! addresses so hooks and instructions always agree on their value.
//!
//! Flag computation follows the AVR instruction set manual, including the
//! carry-chain behavior of SBC/SBCI/CPC where Z is only cleared (never set)
//! to support multi-byte comparisons.

use std::rc::Rc;

use crate::clock::ClockScheduler;
use crate::interrupt::PendingInterrupts;
use crate::memory::{HookTable, Memory, ReadHook, WriteHook};
use crate::peripherals::GpioPort;
use crate::{SP_ADDR, SREG_ADDR, SREG_I};

/// Program memory larger than this many bytes needs 3-byte return addresses.
const PC_16_BIT_LIMIT: usize = 0x20000;

/// Hook invoked by the WDR instruction.
pub type WatchdogHook = Rc<dyn Fn(&mut Cpu)>;

/// One AVR core.
pub struct Cpu {
    pub mem: Memory,
    /// Program counter (word address)
    pub pc: u32,
    /// Monotonic cycle counter
    pub cycles: u64,
    /// Return addresses take 3 bytes on the stack instead of 2
    pub pc_22_bits: bool,
    pub hooks: HookTable,
    pub interrupts: PendingInterrupts,
    pub clock: ClockScheduler,
    /// Every GPIO port constructed against this CPU
    pub gpio_ports: Vec<GpioPort>,
    on_watchdog_reset: Option<WatchdogHook>,
}

impl Cpu {
    /// Create a core with `prog` loaded and `sram_bytes` of internal SRAM.
    pub fn new(prog: Vec<u16>, sram_bytes: usize) -> Self {
        let mem = Memory::new(prog, sram_bytes);
        let pc_22_bits = mem.prog_bytes() > PC_16_BIT_LIMIT;
        let mut cpu = Cpu {
            mem,
            pc: 0,
            cycles: 0,
            pc_22_bits,
            hooks: HookTable::new(),
            interrupts: PendingInterrupts::new(),
            clock: ClockScheduler::new(),
            gpio_ports: Vec::new(),
            on_watchdog_reset: None,
        };
        cpu.reset();
        cpu
    }

    /// Clear the data space and pending work. Installed hooks and ports stay.
    pub fn reset(&mut self) {
        self.mem.data.fill(0);
        let top = (self.mem.data.len() - 1) as u16;
        self.set_sp(top);
        self.pc = 0;
        self.interrupts.clear();
        self.clock.clear();
    }

    // --- Memory-mapped core registers ---

    #[inline(always)]
    pub fn sp(&self) -> u16 {
        self.mem.read_u16(SP_ADDR as usize)
    }

    #[inline(always)]
    pub fn set_sp(&mut self, v: u16) {
        self.mem.write_u16(SP_ADDR as usize, v);
    }

    #[inline(always)]
    pub fn sreg(&self) -> u8 {
        self.mem.data[SREG_ADDR as usize]
    }

    #[inline(always)]
    pub fn set_sreg(&mut self, v: u8) {
        self.mem.data[SREG_ADDR as usize] = v;
    }

    #[inline(always)]
    pub fn flag(&self, bit: u8) -> bool {
        self.sreg() & (1 << bit) != 0
    }

    #[inline(always)]
    pub fn set_flag(&mut self, bit: u8, v: bool) {
        let sreg = self.sreg();
        self.set_sreg(if v { sreg | (1 << bit) } else { sreg & !(1 << bit) });
    }

    #[inline(always)]
    pub fn interrupts_enabled(&self) -> bool {
        self.flag(SREG_I)
    }

    // --- Data space with hooks ---

    /// Read a data-space byte. Read hooks apply only above the register file.
    ///
    /// Panics if `addr` is outside the data space.
    pub fn read_data(&mut self, addr: u16) -> u8 {
        if addr >= 32 {
            if let Some(hook) = self.hooks.read_hook(addr) {
                return hook(self, addr);
            }
        }
        self.mem.data[addr as usize]
    }

    /// Write a full byte. See [`write_data_masked`](Self::write_data_masked).
    #[inline]
    pub fn write_data(&mut self, addr: u16, value: u8) {
        self.write_data_masked(addr, value, 0xFF);
    }

    /// Write the bits of `value` selected by `mask`.
    ///
    /// A registered write hook sees `(value, old, addr, mask)` first and may
    /// claim the write; otherwise unmasked bits keep their old content.
    /// Panics if `addr` is outside the data space.
    pub fn write_data_masked(&mut self, addr: u16, value: u8, mask: u8) {
        let old = self.mem.data[addr as usize];
        if let Some(hook) = self.hooks.write_hook(addr) {
            if hook(self, value, old, addr, mask) {
                return;
            }
        }
        self.mem.data[addr as usize] = (value & mask) | (old & !mask);
    }

    pub fn add_read_hook(&mut self, addr: u16, hook: ReadHook) {
        self.hooks.set_read(addr, hook);
    }

    pub fn add_write_hook(&mut self, addr: u16, hook: WriteHook) {
        self.hooks.set_write(addr, hook);
    }

    pub fn remove_read_hook(&mut self, addr: u16) -> bool {
        self.hooks.remove_read(addr)
    }

    pub fn remove_write_hook(&mut self, addr: u16) -> bool {
        self.hooks.remove_write(addr)
    }

    // --- Watchdog ---

    pub fn set_watchdog_reset_hook(&mut self, hook: Option<WatchdogHook>) {
        self.on_watchdog_reset = hook;
    }

    pub(crate) fn watchdog_reset(&mut self) {
        if let Some(hook) = self.on_watchdog_reset.clone() {
            hook(self);
        }
    }

    // --- Return-address stack ---

    /// Push a return address: low byte at SP, high below it, then bits
    /// 16..21 in 22-bit mode.
    pub(crate) fn push_pc(&mut self, ret: u32) {
        let sp = self.sp() as usize;
        self.mem.data[sp] = ret as u8;
        self.mem.data[sp - 1] = (ret >> 8) as u8;
        if self.pc_22_bits {
            self.mem.data[sp - 2] = (ret >> 16) as u8;
        }
        let width = if self.pc_22_bits { 3 } else { 2 };
        self.set_sp((sp - width) as u16);
    }

    pub(crate) fn pop_pc(&mut self) -> u32 {
        let width = if self.pc_22_bits { 3 } else { 2 };
        let i = self.sp() as usize + width;
        self.set_sp(i as u16);
        let mut ret = ((self.mem.data[i - 1] as u32) << 8) | self.mem.data[i] as u32;
        if self.pc_22_bits {
            ret |= (self.mem.data[i - 2] as u32) << 16;
        }
        ret
    }

    // --- Service step ---

    /// Fire at most one due clock event, then take at most one interrupt.
    pub fn tick(&mut self) {
        if let Some(callback) = self.clock.pop_due(self.cycles) {
            callback(self);
        }
        if self.interrupts_enabled() {
            if let Some(config) = self.interrupts.next_pending() {
                self.avr_interrupt(config.address);
                if !config.is_constant() {
                    self.clear_interrupt(&config, true);
                }
            }
        }
    }

    /// GPIO port whose PORT register lives at `port_addr`.
    pub fn gpio_by_port(&self, port_addr: u16) -> Option<GpioPort> {
        self.gpio_ports.iter().find(|p| p.config().port == port_addr).cloned()
    }
}

// --- Flag helpers ---
//
// Each helper takes the current SREG and returns the updated byte.

#[inline(always)]
fn bit(v: u8, n: u8) -> u8 {
    (v >> n) & 1
}

/// SREG after ADD/ADC producing `r` from `rd` and `rr`.
pub fn flags_add(sreg: u8, rd: u8, rr: u8, r: u8) -> u8 {
    let (r7, rd7, rr7) = (bit(r, 7), bit(rd, 7), bit(rr, 7));
    let (r3, rd3, rr3) = (bit(r, 3), bit(rd, 3), bit(rr, 3));
    let h = (rd3 & rr3) | (rr3 & (r3 ^ 1)) | ((r3 ^ 1) & rd3);
    let v = (rd7 & rr7 & (r7 ^ 1)) | ((rd7 ^ 1) & (rr7 ^ 1) & r7);
    let n = r7;
    let z = (r == 0) as u8;
    let c = (rd7 & rr7) | (rr7 & (r7 ^ 1)) | ((r7 ^ 1) & rd7);
    let s = n ^ v;
    (sreg & 0b1100_0000) | (h << 5) | (s << 4) | (v << 3) | (n << 2) | (z << 1) | c
}

/// SREG after SUB/SBC/CP/CPC/NEG.
///
/// When `keep_z` is true (SBC/SBCI/CPC), Z is only cleared, never set.
pub fn flags_sub(sreg: u8, rd: u8, rr: u8, r: u8, keep_z: bool) -> u8 {
    let (r7, rd7, rr7) = (bit(r, 7), bit(rd, 7), bit(rr, 7));
    let (r3, rd3, rr3) = (bit(r, 3), bit(rd, 3), bit(rr, 3));
    let h = ((rd3 ^ 1) & rr3) | (rr3 & r3) | (r3 & (rd3 ^ 1));
    let v = (rd7 & (rr7 ^ 1) & (r7 ^ 1)) | ((rd7 ^ 1) & rr7 & r7);
    let n = r7;
    let c = ((rd7 ^ 1) & rr7) | (rr7 & r7) | (r7 & (rd7 ^ 1));
    let s = n ^ v;
    let z = if keep_z {
        ((r == 0) as u8) & bit(sreg, 1)
    } else {
        (r == 0) as u8
    };
    (sreg & 0b1100_0000) | (h << 5) | (s << 4) | (v << 3) | (n << 2) | (z << 1) | c
}

/// SREG after AND/OR/EOR and their immediate forms. V is always cleared.
pub fn flags_logic(sreg: u8, r: u8) -> u8 {
    let n = bit(r, 7);
    let z = (r == 0) as u8;
    (sreg & 0b1110_0001) | (n << 4) | (n << 2) | (z << 1)
}

/// SREG after LSR/ASR/ROR: C from the shifted-out bit, V = N ^ C.
pub fn flags_shift(sreg: u8, rd: u8, r: u8) -> u8 {
    let c = rd & 1;
    let n = bit(r, 7);
    let v = n ^ c;
    let z = (r == 0) as u8;
    let s = n ^ v;
    (sreg & 0b1110_0000) | (s << 4) | (v << 3) | (n << 2) | (z << 1) | c
}

/// SREG after a 16-bit multiply result (C = bit 15, Z = result zero).
pub fn flags_mul(sreg: u8, carry: bool, r: u16) -> u8 {
    (sreg & 0b1111_1100) | (((r == 0) as u8) << 1) | carry as u8
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{SREG_C, SREG_H, SREG_N, SREG_S, SREG_V, SREG_Z};
    use std::cell::Cell;

    #[test]
    fn test_initial_sp() {
        let cpu = Cpu::new(vec![0; 0x100], 0x1000);
        assert_eq!(cpu.sp(), 0x10FF);
        assert_eq!(cpu.pc, 0);
        assert!(!cpu.pc_22_bits);
    }

    #[test]
    fn test_pc_22_bits_threshold() {
        assert!(!Cpu::new(vec![0; 0x10000], 0x100).pc_22_bits);
        assert!(Cpu::new(vec![0; 0x10001], 0x100).pc_22_bits);
    }

    #[test]
    fn test_read_hook_ignored_for_registers() {
        let mut cpu = Cpu::new(vec![0; 0x10], 0x100);
        cpu.mem.data[5] = 0x11;
        cpu.mem.data[0x40] = 0x22;
        cpu.add_read_hook(5, Rc::new(|_: &mut Cpu, _addr: u16| 0xAA));
        cpu.add_read_hook(0x40, Rc::new(|_: &mut Cpu, addr: u16| addr as u8));
        assert_eq!(cpu.read_data(5), 0x11);
        assert_eq!(cpu.read_data(0x40), 0x40);
    }

    #[test]
    fn test_write_hook_veto() {
        let mut cpu = Cpu::new(vec![0; 0x10], 0x100);
        let seen = Rc::new(Cell::new((0u8, 0u8, 0u16, 0u8)));
        let log = Rc::clone(&seen);
        cpu.mem.data[0x50] = 0x0F;
        cpu.add_write_hook(0x50, Rc::new(move |_: &mut Cpu, value: u8, old: u8, addr: u16, mask: u8| {
            log.set((value, old, addr, mask));
            true
        }));
        cpu.write_data(0x50, 0xF0);
        assert_eq!(seen.get(), (0xF0, 0x0F, 0x50, 0xFF));
        assert_eq!(cpu.mem.data[0x50], 0x0F);

        assert!(cpu.remove_write_hook(0x50));
        cpu.write_data(0x50, 0xF0);
        assert_eq!(cpu.mem.data[0x50], 0xF0);
    }

    #[test]
    fn test_write_hook_passthrough() {
        let mut cpu = Cpu::new(vec![0; 0x10], 0x100);
        cpu.add_write_hook(0x60, Rc::new(|cpu: &mut Cpu, value: u8, _old: u8, _addr: u16, _mask: u8| {
            cpu.mem.data[0x61] = value;
            false
        }));
        cpu.write_data(0x60, 0x5A);
        assert_eq!(cpu.mem.data[0x60], 0x5A);
        assert_eq!(cpu.mem.data[0x61], 0x5A);
    }

    #[test]
    fn test_masked_write_keeps_other_bits() {
        let mut cpu = Cpu::new(vec![0; 0x10], 0x100);
        cpu.mem.data[0x30] = 0b1010_0000;
        cpu.write_data_masked(0x30, 0b0000_0101, 0b0000_0100);
        assert_eq!(cpu.mem.data[0x30], 0b1010_0100);
    }

    #[test]
    #[should_panic]
    fn test_out_of_range_write_panics() {
        let mut cpu = Cpu::new(vec![0; 0x10], 0x100);
        cpu.write_data(0x200, 1);
    }

    #[test]
    fn test_reset_clears_state() {
        let mut cpu = Cpu::new(vec![0; 0x10], 0x100);
        cpu.mem.data[0x100] = 0x42;
        cpu.pc = 7;
        cpu.add_clock_event(Rc::new(|_: &mut Cpu| {}), 3);
        cpu.reset();
        assert_eq!(cpu.mem.data[0x100], 0);
        assert_eq!(cpu.pc, 0);
        assert_eq!(cpu.sp(), 0x1FF);
        assert!(cpu.clock.is_empty());
    }

    #[test]
    fn test_watchdog_hook() {
        let mut cpu = Cpu::new(vec![0; 0x10], 0x100);
        let hits = Rc::new(Cell::new(0));
        let counter = Rc::clone(&hits);
        cpu.set_watchdog_reset_hook(Some(Rc::new(move |_: &mut Cpu| counter.set(counter.get() + 1))));
        cpu.watchdog_reset();
        cpu.watchdog_reset();
        assert_eq!(hits.get(), 2);
    }

    #[test]
    fn test_flags_add_half_carry() {
        let sreg = flags_add(0, 0x0F, 0x01, 0x10);
        assert_ne!(sreg & (1 << SREG_H), 0);
        assert_eq!(sreg & (1 << SREG_C), 0);
        let sreg = flags_add(0, 0x7F, 0x01, 0x80);
        assert_ne!(sreg & (1 << SREG_V), 0);
        assert_ne!(sreg & (1 << SREG_N), 0);
        assert_eq!(sreg & (1 << SREG_S), 0);
    }

    #[test]
    fn test_flags_sub_keep_z() {
        let z = 1 << SREG_Z;
        assert_eq!(flags_sub(z, 5, 5, 0, true) & z, z);
        assert_eq!(flags_sub(0, 5, 5, 0, true) & z, 0);
        assert_eq!(flags_sub(0, 5, 5, 0, false) & z, z);
    }

    #[test]
    fn test_flags_logic_clears_v() {
        let sreg = flags_logic(0xFF, 0x80);
        assert_eq!(sreg & (1 << SREG_V), 0);
        assert_ne!(sreg & (1 << SREG_N), 0);
        assert_ne!(sreg & (1 << SREG_S), 0);
        assert_ne!(sreg & (1 << SREG_C), 0, "C is preserved");
    }
}
