//! GPIO port (DDR / PORT / PIN) with external and pin-change interrupts.
//!
//! A port owns three consecutive registers. Writes to DDR and PORT recompute
//! the driven output and the PIN view; writing ones to PIN toggles PORT.
//! Pins configured as inputs read the externally supplied level set with
//! [`GpioPort::set_pin`]. Every PIN bit change is classified against the
//! INTn sense mode (EICRA/EICRB) and the pin-change mask (PCMSKn).
//!
//! Timer compare-output units can take over individual pins through
//! [`GpioPort::timer_override_pin`].

use std::cell::RefCell;
use std::rc::Rc;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::cpu::Cpu;
use crate::interrupt::InterruptConfig;

/// Output-change callback: `(new_value, old_value)`.
pub type GpioListener = Rc<dyn Fn(u8, u8)>;

/// Per-pin input-level callback used by timers clocked from a pin.
pub type ExternalClockListener = Rc<dyn Fn(bool)>;

/// INTn source wired to one pin.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExternalInterrupt {
    pub eicra: u16,
    pub eicrb: u16,
    pub eimsk: u16,
    pub eifr: u16,
    /// INTn number, 0..7
    pub index: u8,
    /// Vector address
    pub vector: u8,
}

impl ExternalInterrupt {
    fn interrupt_config(&self) -> InterruptConfig {
        let bit = 1 << self.index;
        InterruptConfig::new(self.vector, self.eimsk, bit, self.eifr, bit)
    }

    fn sense_mode(&self, data: &[u8]) -> InterruptMode {
        let register = if self.index >= 4 { self.eicrb } else { self.eicra };
        let shift = (self.index % 4) * 2;
        match (data[register as usize] >> shift) & 0x3 {
            0 => InterruptMode::LowLevel,
            1 => InterruptMode::Change,
            2 => InterruptMode::FallingEdge,
            _ => InterruptMode::RisingEdge,
        }
    }
}

/// Pin-change interrupt group (PCINTn).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PinChangeInterrupt {
    /// Bit index in PCICR/PCIFR
    pub pcie: u8,
    pub pcicr: u16,
    pub pcifr: u16,
    pub pcmsk: u16,
    pub vector: u8,
    /// Port pins that belong to the group
    pub mask: u8,
    /// PCMSK bit of port pin 0
    pub offset: u8,
}

impl PinChangeInterrupt {
    fn interrupt_config(&self) -> InterruptConfig {
        let bit = 1 << self.pcie;
        InterruptConfig::new(self.vector, self.pcicr, bit, self.pcifr, bit)
    }
}

/// Register addresses and interrupt wiring of one port.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PortConfig {
    pub pin: u16,
    pub ddr: u16,
    pub port: u16,
    pub pin_change: Option<PinChangeInterrupt>,
    /// External interrupt per port pin
    pub external_interrupts: [Option<ExternalInterrupt>; 8],
}

// ATmega328P wiring
pub const INT0: ExternalInterrupt =
    ExternalInterrupt { eicra: 0x69, eicrb: 0, eimsk: 0x3D, eifr: 0x3C, index: 0, vector: 2 };
pub const INT1: ExternalInterrupt =
    ExternalInterrupt { eicra: 0x69, eicrb: 0, eimsk: 0x3D, eifr: 0x3C, index: 1, vector: 4 };

pub const PCINT0: PinChangeInterrupt =
    PinChangeInterrupt { pcie: 0, pcicr: 0x68, pcifr: 0x3B, pcmsk: 0x6B, vector: 6, mask: 0xFF, offset: 0 };
pub const PCINT1: PinChangeInterrupt =
    PinChangeInterrupt { pcie: 1, pcicr: 0x68, pcifr: 0x3B, pcmsk: 0x6C, vector: 8, mask: 0xFF, offset: 0 };
pub const PCINT2: PinChangeInterrupt =
    PinChangeInterrupt { pcie: 2, pcicr: 0x68, pcifr: 0x3B, pcmsk: 0x6D, vector: 10, mask: 0xFF, offset: 0 };

pub const PORTA_CONFIG: PortConfig =
    PortConfig { pin: 0x20, ddr: 0x21, port: 0x22, pin_change: None, external_interrupts: [None; 8] };
pub const PORTB_CONFIG: PortConfig =
    PortConfig { pin: 0x23, ddr: 0x24, port: 0x25, pin_change: Some(PCINT0), external_interrupts: [None; 8] };
pub const PORTC_CONFIG: PortConfig =
    PortConfig { pin: 0x26, ddr: 0x27, port: 0x28, pin_change: Some(PCINT1), external_interrupts: [None; 8] };
pub const PORTD_CONFIG: PortConfig = PortConfig {
    pin: 0x29,
    ddr: 0x2A,
    port: 0x2B,
    pin_change: Some(PCINT2),
    external_interrupts: [None, None, Some(INT0), Some(INT1), None, None, None, None],
};

/// Observable state of a pin as seen from outside the chip.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PinState {
    Low,
    High,
    Input,
    InputPullUp,
}

/// How a timer compare-output unit drives a pin.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PinOverrideMode {
    /// Release the pin back to PORT
    None,
    /// Take over, starting from the current PORT bit
    Enable,
    Set,
    Clear,
    Toggle,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum InterruptMode {
    LowLevel,
    Change,
    FallingEdge,
    RisingEdge,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum HookKind {
    Other,
    Mask,
    Flag,
}

/// Serializable latch state of a port.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GpioState {
    pub pin_value: u8,
    pub override_mask: u8,
    pub override_value: u8,
    pub last_value: u8,
    pub last_ddr: u8,
    pub last_pin: u8,
}

struct PortState {
    /// External input levels
    pin_value: u8,
    override_mask: u8,
    override_value: u8,
    /// Driven output value
    last_value: u8,
    last_ddr: u8,
    last_pin: u8,
    listeners: Vec<GpioListener>,
    external_clock_listeners: [Option<ExternalClockListener>; 8],
}

struct PortInner {
    config: PortConfig,
    external_ints: Vec<Option<Rc<InterruptConfig>>>,
    pcint: Option<Rc<InterruptConfig>>,
    state: RefCell<PortState>,
}

/// Shared handle to a GPIO port installed on a [`Cpu`].
#[derive(Clone)]
pub struct GpioPort(Rc<PortInner>);

impl GpioPort {
    /// Create a port, register it with `cpu` and install its register hooks.
    pub fn new(cpu: &mut Cpu, config: PortConfig) -> Self {
        let external_ints = config
            .external_interrupts
            .iter()
            .map(|ext| ext.map(|e| Rc::new(e.interrupt_config())))
            .collect();
        let pcint = config.pin_change.map(|pc| Rc::new(pc.interrupt_config()));
        let port = GpioPort(Rc::new(PortInner {
            config,
            external_ints,
            pcint,
            state: RefCell::new(PortState {
                pin_value: 0,
                override_mask: 0xFF,
                override_value: 0,
                last_value: 0,
                last_ddr: 0,
                last_pin: 0,
                listeners: Vec::new(),
                external_clock_listeners: Default::default(),
            }),
        }));
        cpu.gpio_ports.push(port.clone());
        port.install_hooks(cpu);
        debug!(port = config.port, ddr = config.ddr, pin = config.pin, "gpio port attached");
        port
    }

    pub fn config(&self) -> &PortConfig {
        &self.0.config
    }

    /// Value currently driven on the pins.
    pub fn output(&self) -> u8 {
        self.0.state.borrow().last_value
    }

    fn install_hooks(&self, cpu: &mut Cpu) {
        let cfg = self.0.config;

        let port = self.clone();
        cpu.add_write_hook(cfg.ddr, Rc::new(move |cpu: &mut Cpu, value: u8, _old: u8, _addr: u16, _mask: u8| {
            let port_value = cpu.mem.data[cfg.port as usize];
            cpu.mem.data[cfg.ddr as usize] = value;
            port.write_gpio(port_value, value);
            port.update_pin_register(cpu, value);
            true
        }));

        let port = self.clone();
        cpu.add_write_hook(cfg.port, Rc::new(move |cpu: &mut Cpu, value: u8, _old: u8, _addr: u16, _mask: u8| {
            let ddr = cpu.mem.data[cfg.ddr as usize];
            cpu.mem.data[cfg.port as usize] = value;
            port.write_gpio(value, ddr);
            port.update_pin_register(cpu, ddr);
            true
        }));

        // Writing ones to PIN toggles the matching PORT bits
        let port = self.clone();
        cpu.add_write_hook(cfg.pin, Rc::new(move |cpu: &mut Cpu, value: u8, _old: u8, _addr: u16, mask: u8| {
            let ddr = cpu.mem.data[cfg.ddr as usize];
            let port_value = cpu.mem.data[cfg.port as usize] ^ (value & mask);
            cpu.mem.data[cfg.port as usize] = port_value;
            port.write_gpio(port_value, ddr);
            port.update_pin_register(cpu, ddr);
            true
        }));

        if let Some(ext) = cfg.external_interrupts.iter().flatten().next() {
            Self::attach_interrupt_hook(cpu, ext.eicra, HookKind::Other);
            Self::attach_interrupt_hook(cpu, ext.eicrb, HookKind::Other);
            Self::attach_interrupt_hook(cpu, ext.eimsk, HookKind::Mask);
            Self::attach_interrupt_hook(cpu, ext.eifr, HookKind::Flag);
        }

        if let Some(pc) = cfg.pin_change {
            cpu.add_write_hook(pc.pcifr, Rc::new(|cpu: &mut Cpu, value: u8, _old: u8, _addr: u16, _mask: u8| {
                for gpio in cpu.gpio_ports.clone() {
                    if let Some(pcint) = &gpio.0.pcint {
                        cpu.clear_interrupt_by_flag(pcint, value);
                    }
                }
                true
            }));
            cpu.add_write_hook(pc.pcicr, Rc::new(move |cpu: &mut Cpu, value: u8, _old: u8, _addr: u16, _mask: u8| {
                cpu.mem.data[pc.pcicr as usize] = value;
                for gpio in cpu.gpio_ports.clone() {
                    if let Some(pcint) = &gpio.0.pcint {
                        cpu.update_interrupt_enable(pcint, value);
                    }
                }
                true
            }));
            cpu.add_write_hook(pc.pcmsk, Rc::new(move |cpu: &mut Cpu, value: u8, _old: u8, _addr: u16, _mask: u8| {
                cpu.mem.data[pc.pcmsk as usize] = value;
                true
            }));
        }
    }

    /// Hook on a shared external-interrupt register. Acts on every port's
    /// INTn sources, then re-checks held-low level interrupts.
    fn attach_interrupt_hook(cpu: &mut Cpu, register: u16, kind: HookKind) {
        if register == 0 {
            return;
        }
        cpu.add_write_hook(register, Rc::new(move |cpu: &mut Cpu, value: u8, _old: u8, _addr: u16, _mask: u8| {
            if kind != HookKind::Flag {
                cpu.mem.data[register as usize] = value;
            }
            for gpio in cpu.gpio_ports.clone() {
                for external in gpio.0.external_ints.iter().flatten() {
                    match kind {
                        HookKind::Mask => cpu.update_interrupt_enable(external, value),
                        HookKind::Flag if !external.is_constant() => cpu.clear_interrupt_by_flag(external, value),
                        _ => {}
                    }
                }
                gpio.check_external_interrupts(cpu);
            }
            true
        }));
    }

    pub fn add_listener(&self, listener: GpioListener) {
        self.0.state.borrow_mut().listeners.push(listener);
    }

    /// Remove a listener by identity. Returns false if it was not registered.
    pub fn remove_listener(&self, listener: &GpioListener) -> bool {
        let mut state = self.0.state.borrow_mut();
        let before = state.listeners.len();
        state.listeners.retain(|l| !Rc::ptr_eq(l, listener));
        state.listeners.len() != before
    }

    pub fn set_external_clock_listener(&self, pin: u8, listener: Option<ExternalClockListener>) {
        self.0.state.borrow_mut().external_clock_listeners[pin as usize] = listener;
    }

    /// State of pin `index` (0..7): driven level for outputs, pull-up
    /// setting for inputs.
    pub fn pin_state(&self, cpu: &Cpu, index: u8) -> PinState {
        let cfg = &self.0.config;
        let ddr = cpu.mem.data[cfg.ddr as usize];
        let port = cpu.mem.data[cfg.port as usize];
        let bit = 1 << index;
        if ddr & bit != 0 {
            if self.output() & bit != 0 { PinState::High } else { PinState::Low }
        } else if port & bit != 0 {
            PinState::InputPullUp
        } else {
            PinState::Input
        }
    }

    /// Drive the external input level of pin `index`.
    pub fn set_pin(&self, cpu: &mut Cpu, index: u8, value: bool) {
        {
            let mut state = self.0.state.borrow_mut();
            let bit = 1 << index;
            state.pin_value &= !bit;
            if value {
                state.pin_value |= bit;
            }
        }
        let ddr = cpu.mem.data[self.0.config.ddr as usize];
        self.update_pin_register(cpu, ddr);
    }

    /// Let a timer compare-output unit take over (or release) a pin.
    pub fn timer_override_pin(&self, cpu: &mut Cpu, pin: u8, mode: PinOverrideMode) {
        let cfg = self.0.config;
        let bit = 1 << pin;
        {
            let mut state = self.0.state.borrow_mut();
            if mode == PinOverrideMode::None {
                state.override_mask |= bit;
                state.override_value &= !bit;
            } else {
                state.override_mask &= !bit;
                match mode {
                    PinOverrideMode::Enable => {
                        state.override_value &= !bit;
                        state.override_value |= cpu.mem.data[cfg.port as usize] & bit;
                    }
                    PinOverrideMode::Set => state.override_value |= bit,
                    PinOverrideMode::Clear => state.override_value &= !bit,
                    PinOverrideMode::Toggle => state.override_value ^= bit,
                    PinOverrideMode::None => {}
                }
            }
        }
        let ddr = cpu.mem.data[cfg.ddr as usize];
        self.write_gpio(cpu.mem.data[cfg.port as usize], ddr);
        self.update_pin_register(cpu, ddr);
    }

    pub fn snapshot(&self) -> GpioState {
        let state = self.0.state.borrow();
        GpioState {
            pin_value: state.pin_value,
            override_mask: state.override_mask,
            override_value: state.override_value,
            last_value: state.last_value,
            last_ddr: state.last_ddr,
            last_pin: state.last_pin,
        }
    }

    /// Restore latches without notifying listeners or raising interrupts.
    pub fn restore(&self, saved: &GpioState) {
        let mut state = self.0.state.borrow_mut();
        state.pin_value = saved.pin_value;
        state.override_mask = saved.override_mask;
        state.override_value = saved.override_value;
        state.last_value = saved.last_value;
        state.last_ddr = saved.last_ddr;
        state.last_pin = saved.last_pin;
    }

    /// Rewrite the PIN register from the latches, without edge detection.
    pub(crate) fn refresh_pin_register(&self, cpu: &mut Cpu) {
        let ddr = cpu.mem.data[self.0.config.ddr as usize];
        let mut state = self.0.state.borrow_mut();
        let pin = (state.pin_value & !ddr) | (state.last_value & ddr);
        state.last_pin = pin;
        cpu.mem.data[self.0.config.pin as usize] = pin;
    }

    /// Interrupt descriptors owned by this port.
    pub fn interrupt_configs(&self) -> impl Iterator<Item = &Rc<InterruptConfig>> {
        self.0.external_ints.iter().flatten().chain(self.0.pcint.iter())
    }

    fn write_gpio(&self, value: u8, ddr: u8) {
        let (new_value, prev_value, listeners) = {
            let mut state = self.0.state.borrow_mut();
            let new_value = (((value & state.override_mask) | state.override_value) & ddr) | (value & !ddr);
            let prev_value = state.last_value;
            if new_value == prev_value && ddr == state.last_ddr {
                return;
            }
            state.last_value = new_value;
            state.last_ddr = ddr;
            (new_value, prev_value, state.listeners.clone())
        };
        for listener in listeners {
            listener(new_value, prev_value);
        }
    }

    fn update_pin_register(&self, cpu: &mut Cpu, ddr: u8) {
        let (new_pin, last_pin) = {
            let mut state = self.0.state.borrow_mut();
            let new_pin = (state.pin_value & !ddr) | (state.last_value & ddr);
            let last_pin = state.last_pin;
            state.last_pin = new_pin;
            (new_pin, last_pin)
        };
        cpu.mem.data[self.0.config.pin as usize] = new_pin;
        if new_pin == last_pin {
            return;
        }
        for index in 0..8u8 {
            let bit = 1 << index;
            if (new_pin ^ last_pin) & bit == 0 {
                continue;
            }
            let value = new_pin & bit != 0;
            self.toggle_interrupt(cpu, index, value);
            let listener = self.0.state.borrow().external_clock_listeners[index as usize].clone();
            if let Some(listener) = listener {
                listener(value);
            }
        }
    }

    fn toggle_interrupt(&self, cpu: &mut Cpu, pin: u8, rising_edge: bool) {
        let cfg = &self.0.config;
        if let (Some(ext), Some(external)) = (cfg.external_interrupts[pin as usize], &self.0.external_ints[pin as usize]) {
            if cpu.mem.data[ext.eimsk as usize] & (1 << ext.index) != 0 {
                let mode = ext.sense_mode(&cpu.mem.data);
                external.constant.set(mode == InterruptMode::LowLevel);
                let generate = match mode {
                    InterruptMode::LowLevel | InterruptMode::FallingEdge => !rising_edge,
                    InterruptMode::Change => true,
                    InterruptMode::RisingEdge => rising_edge,
                };
                if generate {
                    cpu.set_interrupt_flag(external);
                } else if external.is_constant() {
                    cpu.clear_interrupt(external, true);
                }
            }
        }

        if let (Some(pc), Some(pcint)) = (cfg.pin_change, &self.0.pcint) {
            let pcmsk_bit = 1u32 << (pin + pc.offset);
            if pc.mask & (1 << pin) != 0 && (cpu.mem.data[pc.pcmsk as usize] as u32) & pcmsk_bit != 0 {
                cpu.set_interrupt_flag(pcint);
            }
        }
    }

    /// Queue level-triggered INTn sources whose pin is currently held low.
    pub(crate) fn check_external_interrupts(&self, cpu: &mut Cpu) {
        let last_pin = self.0.state.borrow().last_pin;
        let cfg = &self.0.config;
        for (pin, ext) in cfg.external_interrupts.iter().enumerate() {
            let (Some(ext), Some(external)) = (ext, &self.0.external_ints[pin]) else {
                continue;
            };
            if cpu.mem.data[ext.eimsk as usize] & (1 << ext.index) == 0 || last_pin & (1 << pin) != 0 {
                continue;
            }
            if ext.sense_mode(&cpu.mem.data) == InterruptMode::LowLevel {
                external.constant.set(true);
                cpu.queue_interrupt(external);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::opcodes::Instruction;
    use crate::SREG_I;
    use std::cell::Cell;

    fn cpu() -> Cpu {
        Cpu::new(vec![0; 0x100], 0x800)
    }

    #[test]
    fn test_ddr_port_pin() {
        let mut cpu = cpu();
        let port = GpioPort::new(&mut cpu, PORTB_CONFIG);
        cpu.write_data(0x24, 0xFF);
        cpu.write_data(0x25, 0x55);
        assert_eq!(cpu.mem.data[0x23], 0x55);
        assert_eq!(cpu.mem.data[0x25], 0x55);
        assert_eq!(port.output(), 0x55);
    }

    #[test]
    fn test_pin_write_toggles_port() {
        let mut cpu = cpu();
        GpioPort::new(&mut cpu, PORTB_CONFIG);
        cpu.write_data(0x24, 0xFF);
        cpu.write_data(0x25, 0x0F);
        cpu.write_data(0x23, 0x03);
        assert_eq!(cpu.mem.data[0x25], 0x0C);
        assert_eq!(cpu.mem.data[0x23], 0x0C);
    }

    #[test]
    fn test_sbi_pin_toggles_single_bit() {
        let mut cpu = cpu();
        GpioPort::new(&mut cpu, PORTB_CONFIG);
        cpu.write_data(0x24, 0xFF);
        cpu.write_data(0x25, 0x01);
        cpu.execute(Instruction::Sbi { a: 0x23, b: 1 }, 1);
        assert_eq!(cpu.mem.data[0x25], 0x03);
    }

    #[test]
    fn test_listener_sees_new_and_old() {
        let mut cpu = cpu();
        let port = GpioPort::new(&mut cpu, PORTB_CONFIG);
        let seen = Rc::new(RefCell::new(Vec::new()));
        let log = Rc::clone(&seen);
        let listener: GpioListener = Rc::new(move |new: u8, old: u8| log.borrow_mut().push((new, old)));
        port.add_listener(Rc::clone(&listener));
        cpu.write_data(0x24, 0xFF);
        cpu.write_data(0x25, 0x55);
        cpu.write_data(0x25, 0x55);
        assert_eq!(*seen.borrow(), vec![(0x00, 0x00), (0x55, 0x00)]);

        assert!(port.remove_listener(&listener));
        assert!(!port.remove_listener(&listener));
        cpu.write_data(0x25, 0xAA);
        assert_eq!(seen.borrow().len(), 2);
    }

    #[test]
    fn test_set_pin_and_pin_state() {
        let mut cpu = cpu();
        let port = GpioPort::new(&mut cpu, PORTB_CONFIG);
        port.set_pin(&mut cpu, 3, true);
        assert_eq!(cpu.mem.data[0x23], 0x08);
        assert_eq!(port.pin_state(&cpu, 3), PinState::Input);
        cpu.write_data(0x25, 0x08);
        assert_eq!(port.pin_state(&cpu, 3), PinState::InputPullUp);
        cpu.write_data(0x24, 0x08);
        assert_eq!(port.pin_state(&cpu, 3), PinState::High);
        cpu.write_data(0x25, 0x00);
        assert_eq!(port.pin_state(&cpu, 3), PinState::Low);
        assert_eq!(cpu.mem.data[0x23], 0x00, "output pins read the driven level");
    }

    #[test]
    fn test_int0_falling_edge() {
        let mut cpu = cpu();
        let port = GpioPort::new(&mut cpu, PORTD_CONFIG);
        port.set_pin(&mut cpu, 2, true);
        cpu.write_data(0x69, 0b10);
        cpu.write_data(0x3D, 0x01);
        assert!(!cpu.interrupts.is_pending(2));

        port.set_pin(&mut cpu, 2, false);
        assert_eq!(cpu.mem.data[0x3C] & 1, 1);
        assert!(cpu.interrupts.is_pending(2));

        cpu.pc = 0x40;
        cpu.set_sreg(1 << SREG_I);
        cpu.tick();
        assert_eq!(cpu.pc, 2);
        assert!(!cpu.interrupts.is_pending(2));
        assert_eq!(cpu.mem.data[0x3C] & 1, 0);

        port.set_pin(&mut cpu, 2, true);
        assert!(!cpu.interrupts.is_pending(2), "rising edge ignored");
    }

    #[test]
    fn test_int0_low_level_redispatches() {
        let mut cpu = cpu();
        let port = GpioPort::new(&mut cpu, PORTD_CONFIG);
        cpu.write_data(0x69, 0b00);
        cpu.write_data(0x3D, 0x01);
        assert!(cpu.interrupts.is_pending(2));

        cpu.set_sreg(1 << SREG_I);
        cpu.tick();
        assert_eq!(cpu.pc, 2);
        let sp = cpu.sp();
        cpu.pc = 0x50;
        cpu.set_sreg(1 << SREG_I);
        cpu.tick();
        assert_eq!(cpu.pc, 2);
        assert_eq!(cpu.sp(), sp - 2);

        port.set_pin(&mut cpu, 2, true);
        assert!(!cpu.interrupts.is_pending(2));
        cpu.pc = 0x50;
        cpu.set_sreg(1 << SREG_I);
        cpu.tick();
        assert_eq!(cpu.pc, 0x50);
    }

    #[test]
    fn test_eifr_write_clears_edge_interrupt() {
        let mut cpu = cpu();
        let port = GpioPort::new(&mut cpu, PORTD_CONFIG);
        cpu.write_data(0x69, 0b0100);
        cpu.write_data(0x3D, 0x02);
        port.set_pin(&mut cpu, 3, true);
        assert!(cpu.interrupts.is_pending(4));
        cpu.write_data(0x3C, 0x02);
        assert!(!cpu.interrupts.is_pending(4));
        assert_eq!(cpu.mem.data[0x3C], 0);
    }

    #[test]
    fn test_pin_change_interrupt() {
        let mut cpu = cpu();
        let port = GpioPort::new(&mut cpu, PORTB_CONFIG);
        cpu.write_data(0x6B, 0x01);
        cpu.write_data(0x68, 0x01);
        port.set_pin(&mut cpu, 1, true);
        assert!(!cpu.interrupts.is_pending(6), "pin 1 is masked");
        port.set_pin(&mut cpu, 0, true);
        assert_eq!(cpu.mem.data[0x3B], 0x01);
        assert!(cpu.interrupts.is_pending(6));

        cpu.write_data(0x3B, 0x01);
        assert!(!cpu.interrupts.is_pending(6));
        assert_eq!(cpu.mem.data[0x3B], 0);
    }

    #[test]
    fn test_pcicr_enable_after_flag() {
        let mut cpu = cpu();
        let port = GpioPort::new(&mut cpu, PORTC_CONFIG);
        cpu.write_data(0x6C, 0x04);
        port.set_pin(&mut cpu, 2, true);
        assert_eq!(cpu.mem.data[0x3B], 0x02);
        assert!(!cpu.interrupts.is_pending(8));
        cpu.write_data(0x68, 0x02);
        assert!(cpu.interrupts.is_pending(8));
    }

    #[test]
    fn test_timer_override() {
        let mut cpu = cpu();
        let port = GpioPort::new(&mut cpu, PORTB_CONFIG);
        cpu.write_data(0x24, 0xFF);
        port.timer_override_pin(&mut cpu, 1, PinOverrideMode::Set);
        assert_eq!(port.output(), 0x02);
        port.timer_override_pin(&mut cpu, 1, PinOverrideMode::Toggle);
        assert_eq!(port.output(), 0x00);
        cpu.write_data(0x25, 0x02);
        assert_eq!(port.output(), 0x00, "overridden pin ignores PORT");
        port.timer_override_pin(&mut cpu, 1, PinOverrideMode::None);
        assert_eq!(port.output(), 0x02);
    }

    #[test]
    fn test_external_clock_listener() {
        let mut cpu = cpu();
        let port = GpioPort::new(&mut cpu, PORTD_CONFIG);
        let edges = Rc::new(Cell::new(0));
        let counter = Rc::clone(&edges);
        port.set_external_clock_listener(4, Some(Rc::new(move |_: bool| counter.set(counter.get() + 1))));
        port.set_pin(&mut cpu, 4, true);
        port.set_pin(&mut cpu, 4, true);
        port.set_pin(&mut cpu, 4, false);
        assert_eq!(edges.get(), 2);
    }

    #[test]
    fn test_registered_with_cpu() {
        let mut cpu = cpu();
        GpioPort::new(&mut cpu, PORTB_CONFIG);
        GpioPort::new(&mut cpu, PORTD_CONFIG);
        assert_eq!(cpu.gpio_ports.len(), 2);
        assert!(cpu.gpio_by_port(0x2B).is_some());
        assert!(cpu.gpio_by_port(0x22).is_none());
    }

    #[test]
    fn test_snapshot_restore() {
        let mut cpu = cpu();
        let port = GpioPort::new(&mut cpu, PORTB_CONFIG);
        cpu.write_data(0x24, 0xF0);
        cpu.write_data(0x25, 0x30);
        port.set_pin(&mut cpu, 0, true);
        let saved = port.snapshot();
        cpu.write_data(0x25, 0x00);
        port.restore(&saved);
        assert_eq!(port.output(), 0x30);
        assert_eq!(port.snapshot(), saved);
    }
}
