//! Interrupt controller.
//!
//! Every interrupt source is described by an [`InterruptConfig`]: its vector
//! address (which doubles as its priority, lower wins), plus the enable and
//! flag bits that gate it in the data space. Peripherals own their configs
//! and hand shared references to the controller; the pending set stores
//! those references, one slot per vector address.
//!
//! Vectors move Idle → Pending → dispatched → Idle. A `constant`
//! (level-triggered) vector stays Pending after dispatch and is taken again on
//! every enabled tick until its owner clears it.

use std::cell::Cell;
use std::rc::Rc;

use tracing::trace;

use crate::cpu::Cpu;
use crate::{MAX_INTERRUPTS, SREG_I};

/// Static description of one interrupt source.
#[derive(Debug)]
pub struct InterruptConfig {
    /// Vector address (word address, also the priority)
    pub address: u8,
    pub enable_register: u16,
    pub enable_mask: u8,
    pub flag_register: u16,
    pub flag_mask: u8,
    /// Level-triggered: re-dispatched until the owner clears it
    pub constant: Cell<bool>,
    /// Flag bit is active-low
    pub inverse_flag: bool,
}

impl InterruptConfig {
    pub fn new(address: u8, enable_register: u16, enable_mask: u8, flag_register: u16, flag_mask: u8) -> Self {
        InterruptConfig {
            address,
            enable_register,
            enable_mask,
            flag_register,
            flag_mask,
            constant: Cell::new(false),
            inverse_flag: false,
        }
    }

    pub fn with_constant(self, constant: bool) -> Self {
        self.constant.set(constant);
        self
    }

    pub fn with_inverse_flag(mut self, inverse: bool) -> Self {
        self.inverse_flag = inverse;
        self
    }

    #[inline]
    pub fn is_constant(&self) -> bool {
        self.constant.get()
    }

    /// True when the flag bit currently reports the condition as asserted.
    #[inline]
    pub fn flag_asserted(&self, data: &[u8]) -> bool {
        let set = data[self.flag_register as usize] & self.flag_mask != 0;
        set != self.inverse_flag
    }
}

/// Pending vectors, indexed by vector address.
pub struct PendingInterrupts {
    slots: Vec<Option<Rc<InterruptConfig>>>,
    /// Lowest pending vector address
    next: Option<u8>,
    /// Highest address ever queued; bounds the forward rescan
    max: u8,
}

impl PendingInterrupts {
    pub fn new() -> Self {
        PendingInterrupts { slots: vec![None; MAX_INTERRUPTS], next: None, max: 0 }
    }

    /// Lowest pending vector address, if any.
    #[inline(always)]
    pub fn next(&self) -> Option<u8> {
        self.next
    }

    /// Config of the highest-priority pending vector.
    #[inline]
    pub fn next_pending(&self) -> Option<Rc<InterruptConfig>> {
        self.next.and_then(|addr| self.slots[addr as usize].clone())
    }

    pub fn is_pending(&self, address: u8) -> bool {
        self.slots[address as usize].is_some()
    }

    pub fn insert(&mut self, config: Rc<InterruptConfig>) {
        let address = config.address;
        self.slots[address as usize] = Some(config);
        if self.next.map_or(true, |next| address < next) {
            self.next = Some(address);
        }
        if address > self.max {
            self.max = address;
        }
    }

    /// Drop the pending entry at `address`. Returns false if nothing was pending.
    pub fn remove(&mut self, address: u8) -> bool {
        if self.slots[address as usize].take().is_none() {
            return false;
        }
        if self.next == Some(address) {
            self.next = (address as usize + 1..=self.max as usize)
                .find(|&a| self.slots[a].is_some())
                .map(|a| a as u8);
        }
        true
    }

    pub fn clear(&mut self) {
        self.slots.iter_mut().for_each(|slot| *slot = None);
        self.next = None;
        self.max = 0;
    }
}

impl Default for PendingInterrupts {
    fn default() -> Self {
        Self::new()
    }
}

impl Cpu {
    /// Assert the flag of `config`; queue it if its enable bit is already set.
    pub fn set_interrupt_flag(&mut self, config: &Rc<InterruptConfig>) {
        let flag = config.flag_register as usize;
        if config.inverse_flag {
            self.mem.data[flag] &= !config.flag_mask;
        } else {
            self.mem.data[flag] |= config.flag_mask;
        }
        if self.mem.data[config.enable_register as usize] & config.enable_mask != 0 {
            self.queue_interrupt(config);
        }
    }

    /// React to a write of `value` to the enable register of `config`.
    pub fn update_interrupt_enable(&mut self, config: &Rc<InterruptConfig>, value: u8) {
        if value & config.enable_mask != 0 {
            if config.flag_asserted(&self.mem.data) {
                self.queue_interrupt(config);
            }
        } else {
            self.clear_interrupt(config, false);
        }
    }

    pub fn queue_interrupt(&mut self, config: &Rc<InterruptConfig>) {
        self.interrupts.insert(Rc::clone(config));
    }

    pub fn clear_interrupt(&mut self, config: &InterruptConfig, clear_flag: bool) {
        if clear_flag {
            self.mem.data[config.flag_register as usize] &= !config.flag_mask;
        }
        self.interrupts.remove(config.address);
    }

    /// Write-one-to-clear flag register semantics.
    pub fn clear_interrupt_by_flag(&mut self, config: &InterruptConfig, value: u8) {
        if value & config.flag_mask != 0 {
            self.clear_interrupt(config, true);
        }
    }

    /// Enter the handler at vector `address`: push PC, clear I, charge 2 cycles.
    pub fn avr_interrupt(&mut self, address: u8) {
        trace!(vector = address, pc = self.pc, "interrupt");
        let ret = self.pc;
        self.push_pc(ret);
        let sreg = self.sreg() & !(1 << SREG_I);
        self.set_sreg(sreg);
        self.cycles += 2;
        self.pc = address as u32;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{SREG_C, SREG_I};

    fn config(address: u8, bit: u8) -> Rc<InterruptConfig> {
        Rc::new(InterruptConfig::new(address, 0x6E, 1 << bit, 0x35, 1 << bit))
    }

    #[test]
    fn test_dispatch_16bit() {
        let mut cpu = Cpu::new(vec![0; 0x1000], 0x100);
        cpu.pc = 0x520;
        cpu.cycles = 0;
        cpu.set_sp(0x80);
        cpu.set_sreg((1 << SREG_I) | (1 << SREG_C));
        cpu.avr_interrupt(5);
        assert_eq!(cpu.cycles, 2);
        assert_eq!(cpu.pc, 5);
        assert_eq!(cpu.sp(), 0x7E);
        assert_eq!(cpu.mem.data[0x80], 0x20);
        assert_eq!(cpu.mem.data[0x7F], 0x05);
        assert_eq!(cpu.sreg(), 1 << SREG_C);
    }

    #[test]
    fn test_dispatch_22bit() {
        let mut cpu = Cpu::new(vec![0; 0x80000], 0x100);
        assert!(cpu.pc_22_bits);
        cpu.pc = 0x10520;
        cpu.cycles = 0;
        cpu.set_sp(0x80);
        cpu.set_sreg((1 << SREG_I) | (1 << SREG_C));
        cpu.avr_interrupt(5);
        assert_eq!(cpu.cycles, 2);
        assert_eq!(cpu.pc, 5);
        assert_eq!(cpu.sp(), 0x7D);
        assert_eq!(cpu.mem.data[0x80], 0x20);
        assert_eq!(cpu.mem.data[0x7F], 0x05);
        assert_eq!(cpu.mem.data[0x7E], 0x01);
        assert_eq!(cpu.sreg(), 1 << SREG_C);
    }

    #[test]
    fn test_set_flag_queues_when_enabled() {
        let mut cpu = Cpu::new(vec![0; 0x100], 0x100);
        let irq = config(5, 1);
        cpu.set_interrupt_flag(&irq);
        assert_eq!(cpu.mem.data[0x35], 0x02);
        assert!(!cpu.interrupts.is_pending(5));

        cpu.mem.data[0x6E] = 0x02;
        cpu.update_interrupt_enable(&irq, 0x02);
        assert!(cpu.interrupts.is_pending(5));

        cpu.update_interrupt_enable(&irq, 0x00);
        assert!(!cpu.interrupts.is_pending(5));
        assert_eq!(cpu.mem.data[0x35], 0x02, "disabling must not touch the flag");
    }

    #[test]
    fn test_priority_lowest_vector_first() {
        let mut cpu = Cpu::new(vec![0; 0x100], 0x100);
        let low = config(2, 0);
        let high = config(5, 1);
        cpu.queue_interrupt(&high);
        cpu.queue_interrupt(&low);
        assert_eq!(cpu.interrupts.next(), Some(2));

        cpu.set_sreg(1 << SREG_I);
        cpu.tick();
        assert_eq!(cpu.pc, 2);
        assert_eq!(cpu.interrupts.next(), Some(5));

        cpu.set_sreg(1 << SREG_I);
        cpu.tick();
        assert_eq!(cpu.pc, 5);
        assert_eq!(cpu.interrupts.next(), None);
    }

    #[test]
    fn test_no_dispatch_with_interrupts_disabled() {
        let mut cpu = Cpu::new(vec![0; 0x100], 0x100);
        cpu.pc = 0x40;
        cpu.queue_interrupt(&config(3, 0));
        cpu.tick();
        assert_eq!(cpu.pc, 0x40);
        assert!(cpu.interrupts.is_pending(3));
    }

    #[test]
    fn test_constant_stays_pending() {
        let mut cpu = Cpu::new(vec![0; 0x100], 0x100);
        let level = Rc::new(InterruptConfig::new(2, 0x3D, 1, 0x3C, 1).with_constant(true));
        cpu.queue_interrupt(&level);
        cpu.set_sreg(1 << SREG_I);
        cpu.tick();
        assert_eq!(cpu.pc, 2);
        assert!(cpu.interrupts.is_pending(2));

        cpu.clear_interrupt(&level, true);
        assert!(!cpu.interrupts.is_pending(2));
    }

    #[test]
    fn test_clear_by_flag_write() {
        let mut cpu = Cpu::new(vec![0; 0x100], 0x100);
        let irq = config(7, 2);
        cpu.mem.data[0x6E] = 0x04;
        cpu.set_interrupt_flag(&irq);
        assert!(cpu.interrupts.is_pending(7));

        cpu.clear_interrupt_by_flag(&irq, 0x01);
        assert!(cpu.interrupts.is_pending(7));
        cpu.clear_interrupt_by_flag(&irq, 0x04);
        assert!(!cpu.interrupts.is_pending(7));
        assert_eq!(cpu.mem.data[0x35], 0);
    }

    #[test]
    fn test_inverse_flag() {
        let mut cpu = Cpu::new(vec![0; 0x100], 0x100);
        let irq = Rc::new(InterruptConfig::new(9, 0x6E, 1, 0x35, 1).with_inverse_flag(true));
        cpu.mem.data[0x35] = 0x01;
        cpu.mem.data[0x6E] = 0x01;
        cpu.set_interrupt_flag(&irq);
        assert_eq!(cpu.mem.data[0x35], 0x00);
        assert!(cpu.interrupts.is_pending(9));
    }

    #[test]
    fn test_rescan_after_clear() {
        let mut pending = PendingInterrupts::new();
        pending.insert(config(4, 0));
        pending.insert(config(9, 1));
        pending.insert(config(30, 2));
        assert!(pending.remove(4));
        assert_eq!(pending.next(), Some(9));
        assert!(pending.remove(30));
        assert_eq!(pending.next(), Some(9));
        assert!(!pending.remove(30));
        assert!(pending.remove(9));
        assert_eq!(pending.next(), None);
    }
}
