//! # avr-core
//!
//! Instruction-level emulation core for 8-bit AVR microcontrollers.
//!
//! Runs firmware one instruction at a time against a memory-mapped data space
//! (32 registers, 224 I/O registers, internal SRAM) and a separate program
//! memory of 16-bit words. Peripherals attach through register hooks, the
//! interrupt controller and the clock-event scheduler; the GPIO ports are the
//! only peripherals built in.
//!
//! ## Architecture
//!
//! - [`Avr`]: Tick driver running one instruction, then one service step
//! - [`Cpu`]: Core state (data space, PC, cycle counter, hooks, pending interrupts, scheduler)
//! - [`Memory`]: Data space, program words and register pair accessors
//! - [`opcodes`]: 16-bit opcode decoder
//! - [`instruction`]: Instruction execution and cycle accounting
//! - [`interrupt`]: Pending interrupt set and vector dispatch
//! - [`clock`]: Deferred callbacks keyed by absolute cycle count
//! - [`peripherals`]: GPIO ports with INTn and PCINTn interrupt sources
//! - [`disasm`]: Instruction disassembler for traces and register dumps
//! - [`savestate`]: Compressed machine snapshots
//!
//! ## Example
//!
//! ```
//! use avr_core::{Avr, AvrConfig};
//!
//! // LDI r16, 0x2A ; RJMP .-2
//! let mut avr = Avr::new(vec![0xE20A, 0xCFFF], AvrConfig::default());
//! avr.step();
//! assert_eq!(avr.cpu.mem.reg(16), 0x2A);
//! assert_eq!(avr.cpu.cycles, 1);
//! ```

pub mod clock;
pub mod cpu;
pub mod disasm;
pub mod instruction;
pub mod interrupt;
pub mod memory;
pub mod opcodes;
pub mod peripherals;
pub mod savestate;

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, trace, Level};

pub use cpu::Cpu;
pub use interrupt::InterruptConfig;
pub use memory::Memory;
pub use peripherals::{GpioPort, PORTB_CONFIG, PORTC_CONFIG, PORTD_CONFIG};
pub use savestate::{SaveState, StateError};

/// Registers + I/O space in front of SRAM
pub const REGISTER_SPACE: usize = 0x100;
/// Default internal SRAM size: 8 KB
pub const DEFAULT_SRAM_BYTES: usize = 8 * 1024;
/// Default CPU clock frequency: 16 MHz
pub const DEFAULT_CLOCK_HZ: u32 = 16_000_000;
/// Number of interrupt vector slots
pub const MAX_INTERRUPTS: usize = 128;

// SREG bit positions
pub const SREG_C: u8 = 0;
pub const SREG_Z: u8 = 1;
pub const SREG_N: u8 = 2;
pub const SREG_V: u8 = 3;
pub const SREG_S: u8 = 4;
pub const SREG_H: u8 = 5;
pub const SREG_T: u8 = 6;
pub const SREG_I: u8 = 7;

// Pointer registers (low byte)
pub const X_ADDR: usize = 26;
pub const Y_ADDR: usize = 28;
pub const Z_ADDR: usize = 30;

// I/O register addresses (data space addresses, not I/O addresses)
pub const RAMPZ_ADDR: u16 = 0x5B;
pub const EIND_ADDR: u16 = 0x5C;
pub const SP_ADDR: u16 = 0x5D;
pub const SREG_ADDR: u16 = 0x5F;

/// Machine configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AvrConfig {
    /// Internal SRAM size in bytes
    pub sram_bytes: usize,
    /// Nominal clock, used to convert cycles to time
    pub clock_hz: u32,
}

impl Default for AvrConfig {
    fn default() -> Self {
        AvrConfig { sram_bytes: DEFAULT_SRAM_BYTES, clock_hz: DEFAULT_CLOCK_HZ }
    }
}

/// Why [`Avr::run_cycles`] returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// The cycle budget was used up
    Budget,
    /// PC reached a breakpoint (word address)
    Breakpoint(u32),
}

/// A CPU with GPIO ports B, C and D attached.
pub struct Avr {
    pub cpu: Cpu,
    pub config: AvrConfig,
    pub port_b: GpioPort,
    pub port_c: GpioPort,
    pub port_d: GpioPort,
    /// Breakpoint addresses (word addresses)
    pub breakpoints: Vec<u32>,
}

impl Avr {
    /// Create a machine with `program` loaded and all state in reset.
    pub fn new(program: Vec<u16>, config: AvrConfig) -> Self {
        let mut cpu = Cpu::new(program, config.sram_bytes);
        let port_b = GpioPort::new(&mut cpu, PORTB_CONFIG);
        let port_c = GpioPort::new(&mut cpu, PORTC_CONFIG);
        let port_d = GpioPort::new(&mut cpu, PORTD_CONFIG);
        debug!(
            sram = config.sram_bytes,
            prog_words = cpu.mem.prog.len(),
            pc_22_bits = cpu.pc_22_bits,
            "avr created"
        );
        Avr { cpu, config, port_b, port_c, port_d, breakpoints: Vec::new() }
    }

    /// Reset the core. Hooks, listeners and external pin inputs survive.
    pub fn reset(&mut self) {
        self.cpu.reset();
        for port in self.cpu.gpio_ports.clone() {
            let mut state = port.snapshot();
            state.override_mask = 0xFF;
            state.override_value = 0;
            state.last_value = 0;
            state.last_ddr = 0;
            port.restore(&state);
            port.refresh_pin_register(&mut self.cpu);
        }
    }

    /// Execute one instruction and one service step. Returns the cycles spent.
    pub fn step(&mut self) -> u64 {
        if tracing::enabled!(Level::TRACE) {
            trace!(cycles = self.cpu.cycles, "{}", self.disasm_at_pc());
        }
        let start = self.cpu.cycles;
        instruction::avr_instruction(&mut self.cpu);
        self.cpu.tick();
        self.cpu.cycles - start
    }

    /// Step until at least `budget` cycles have elapsed or a breakpoint is reached.
    ///
    /// A breakpoint at the starting PC does not stop the run, so calling this
    /// again after a breakpoint resumes execution.
    pub fn run_cycles(&mut self, budget: u64) -> StopReason {
        let end = self.cpu.cycles.saturating_add(budget);
        let mut first = true;
        while self.cpu.cycles < end {
            if !first && self.breakpoints.contains(&self.cpu.pc) {
                debug!(pc = self.cpu.pc * 2, "breakpoint hit");
                return StopReason::Breakpoint(self.cpu.pc);
            }
            first = false;
            self.step();
        }
        StopReason::Budget
    }

    /// Emulated time in seconds at the configured clock.
    pub fn elapsed_secs(&self) -> f64 {
        self.cpu.cycles as f64 / self.config.clock_hz as f64
    }

    /// Disassemble the instruction at the current PC without executing it.
    pub fn disasm_at_pc(&self) -> String {
        let pc = self.cpu.pc;
        let word = self.cpu.mem.prog_word(pc as usize);
        let next_word = self.cpu.mem.prog_word(pc as usize + 1);
        let (inst, _) = opcodes::decode(word, next_word);
        format!("0x{:04X}: {}", pc * 2, disasm::disassemble(inst, pc))
    }

    /// Format a register dump string with R0-R31, SP, PC, SREG.
    pub fn dump_regs(&self) -> String {
        let mem = &self.cpu.mem;
        let mut s = String::new();
        for i in 0..32u8 {
            if i % 8 == 0 && i > 0 {
                s.push('\n');
            }
            s.push_str(&format!("R{:2}={:02X} ", i, mem.reg(i)));
        }
        let sreg = self.cpu.sreg();
        s.push_str(&format!(
            "\nPC={:04X} SP={:04X} SREG={} (0x{:02X})",
            self.cpu.pc * 2,
            self.cpu.sp(),
            disasm::format_sreg(sreg),
            sreg
        ));
        s.push_str(&format!("\nX={:04X} Y={:04X} Z={:04X}", mem.x(), mem.y(), mem.z()));
        s.push_str(&format!("\nCYCLES={}", self.cpu.cycles));
        s
    }

    pub fn save_state(&self) -> SaveState {
        SaveState::capture(&self.cpu, &self.config)
    }

    pub fn load_state(&mut self, state: &SaveState) -> Result<(), StateError> {
        state.apply(&mut self.cpu)?;
        self.config.clock_hz = state.config.clock_hz;
        Ok(())
    }

    pub fn save_state_to_file(&self, path: &Path) -> Result<(), StateError> {
        savestate::save_to_file(&self.save_state(), path)
    }

    pub fn load_state_from_file(&mut self, path: &Path) -> Result<(), StateError> {
        let state = savestate::load_from_file(path, self.config.sram_bytes)?;
        self.load_state(&state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small() -> AvrConfig {
        AvrConfig { sram_bytes: 0x1000, ..AvrConfig::default() }
    }

    #[test]
    fn test_avr_creation() {
        let avr = Avr::new(vec![0; 16], small());
        assert_eq!(avr.cpu.pc, 0);
        assert_eq!(avr.cpu.sp(), 0x10FF);
        assert_eq!(avr.cpu.mem.data.len(), 0x1100);
        assert_eq!(avr.cpu.gpio_ports.len(), 3);
        assert!(!avr.cpu.pc_22_bits);
    }

    #[test]
    fn test_default_config() {
        let config = AvrConfig::default();
        assert_eq!(config.sram_bytes, 8192);
        assert_eq!(config.clock_hz, 16_000_000);
    }

    #[test]
    fn test_step_counts_cycles() {
        // LDI r16, 0xFF ; OUT DDRB, r16 ; OUT PORTB, r16 ; RJMP .-2
        let prog = vec![0xEF0F, 0xB904, 0xB905, 0xCFFF];
        let mut avr = Avr::new(prog, small());
        assert_eq!(avr.step(), 1);
        assert_eq!(avr.step(), 1);
        assert_eq!(avr.step(), 1);
        assert_eq!(avr.port_b.output(), 0xFF);
        assert_eq!(avr.step(), 2);
        assert_eq!(avr.cpu.pc, 3);
        assert_eq!(avr.cpu.cycles, 5);
    }

    #[test]
    fn test_run_cycles_budget() {
        // RJMP .-2
        let mut avr = Avr::new(vec![0xCFFF], small());
        assert_eq!(avr.run_cycles(101), StopReason::Budget);
        assert_eq!(avr.cpu.cycles, 102);
        assert!((avr.elapsed_secs() - 102.0 / 16_000_000.0).abs() < 1e-12);
    }

    #[test]
    fn test_breakpoint() {
        // NOP ; NOP ; NOP ; RJMP .-2
        let mut avr = Avr::new(vec![0x0000, 0x0000, 0x0000, 0xCFFF], small());
        avr.breakpoints.push(2);
        assert_eq!(avr.run_cycles(1000), StopReason::Breakpoint(2));
        assert_eq!(avr.cpu.cycles, 2);
        // Resuming steps past the breakpoint
        assert_eq!(avr.run_cycles(3), StopReason::Budget);
        assert_eq!(avr.cpu.pc, 3);
    }

    #[test]
    fn test_interrupt_dispatch_after_instruction() {
        // SEI ; NOP ...
        let mut prog = vec![0x9478];
        prog.resize(0x20, 0x0000);
        let mut avr = Avr::new(prog, small());
        avr.cpu.write_data(0x69, 0b10); // EICRA: INT0 falling
        avr.cpu.write_data(0x3D, 0x01); // EIMSK
        avr.port_d.set_pin(&mut avr.cpu, 2, true);
        avr.port_d.set_pin(&mut avr.cpu, 2, false);
        assert!(avr.cpu.interrupts.is_pending(2));
        avr.step();
        assert_eq!(avr.cpu.pc, 2);
        assert!(!avr.cpu.interrupts_enabled());
        assert!(!avr.cpu.interrupts.is_pending(2));
    }

    #[test]
    fn test_clock_event_fires_from_step() {
        use std::cell::Cell;
        use std::rc::Rc;

        let mut avr = Avr::new(vec![0xCFFF], small());
        let fired = Rc::new(Cell::new(0u64));
        let seen = fired.clone();
        avr.cpu.add_clock_event(Rc::new(move |cpu: &mut Cpu| seen.set(cpu.cycles)), 5);
        avr.run_cycles(10);
        assert_eq!(fired.get(), 6);
    }

    #[test]
    fn test_disasm_at_pc() {
        let avr = Avr::new(vec![0xE20A], small());
        assert_eq!(avr.disasm_at_pc(), "0x0000: LDI R16, 0x2A");
    }

    #[test]
    fn test_dump_regs() {
        let mut avr = Avr::new(vec![0xE20A, 0xCFFF], small());
        avr.step();
        let dump = avr.dump_regs();
        assert!(dump.contains("R16=2A"));
        assert!(dump.contains("PC=0002 SP=10FF"));
        assert!(dump.contains("CYCLES=1"));
    }

    #[test]
    fn test_reset() {
        let mut avr = Avr::new(vec![0xEF0F, 0xB904, 0xB905], small());
        avr.run_cycles(3);
        assert_eq!(avr.port_b.output(), 0xFF);
        avr.reset();
        assert_eq!(avr.cpu.pc, 0);
        assert_eq!(avr.cpu.mem.reg(16), 0);
        assert_eq!(avr.port_b.output(), 0);
        assert_eq!(avr.cpu.sp(), 0x10FF);
    }

    #[test]
    fn test_reset_keeps_pin_inputs() {
        let mut avr = Avr::new(vec![0; 4], small());
        avr.port_b.set_pin(&mut avr.cpu, 0, true);
        avr.port_d.set_pin(&mut avr.cpu, 5, true);
        avr.reset();
        assert_eq!(avr.cpu.read_data(0x23), 0x01);
        assert_eq!(avr.cpu.read_data(0x29), 0x20);
        assert_eq!(avr.cpu.read_data(0x26), 0x00);
        // Driving the pin low after reset is seen as a change
        avr.port_b.set_pin(&mut avr.cpu, 0, false);
        assert_eq!(avr.cpu.read_data(0x23), 0x00);
    }

    #[test]
    fn test_save_load_state() {
        let prog = vec![0xEF0F, 0xB904, 0xB905, 0xCFFF];
        let mut avr = Avr::new(prog.clone(), small());
        avr.run_cycles(3);
        let bytes = avr.save_state().to_bytes().unwrap();

        let mut other = Avr::new(prog, small());
        let state = SaveState::from_bytes(&bytes, 0x1000).unwrap();
        other.load_state(&state).unwrap();
        assert_eq!(other.cpu.pc, avr.cpu.pc);
        assert_eq!(other.cpu.cycles, avr.cpu.cycles);
        assert_eq!(other.port_b.output(), 0xFF);
        assert_eq!(other.cpu.mem.reg(16), 0xFF);
    }
}
