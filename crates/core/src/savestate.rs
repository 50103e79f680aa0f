//! Save state for the emulator core.
//!
//! Captures the CPU, data space and GPIO latches with bincode serialization
//! and deflate compression.
//!
//! ## File format
//!
//! ```text
//! +------------------+
//! | Magic "AVRS"     |  4 bytes
//! +------------------+
//! | Format version   |  u32 little-endian (currently 1)
//! +------------------+
//! | SRAM size        |  u32 little-endian, bytes
//! +------------------+
//! | Compressed data  |  deflate-compressed bincode payload
//! +------------------+
//! ```
//!
//! Pending interrupts are not stored; they are re-derived from the restored
//! enable and flag registers. Scheduled clock events are left untouched.

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

use crate::cpu::Cpu;
use crate::peripherals::GpioState;
use crate::AvrConfig;

/// Magic bytes identifying a save state file.
const MAGIC: &[u8; 4] = b"AVRS";
/// Current save state format version.
const FORMAT_VERSION: u32 = 1;
const HEADER_LEN: usize = 12;

#[derive(Debug, Error)]
pub enum StateError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("encode error: {0}")]
    Encode(#[from] bincode::Error),
    #[error("decode error: {0}")]
    Decode(String),
    #[error("not a save state file (bad magic)")]
    BadMagic,
    #[error("unsupported save state version {found} (expected {expected})")]
    UnsupportedVersion { found: u32, expected: u32 },
    #[error("sram size mismatch: save={saved} current={current}")]
    SizeMismatch { saved: usize, current: usize },
    #[error("save state too short ({0} bytes)")]
    TooShort(usize),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SaveState {
    pub pc: u32,
    pub cycles: u64,
    pub config: AvrConfig,
    /// Registers + I/O + SRAM
    pub data: Vec<u8>,
    /// One entry per GPIO port, in registration order
    pub ports: Vec<GpioState>,
}

impl SaveState {
    pub fn capture(cpu: &Cpu, config: &AvrConfig) -> Self {
        SaveState {
            pc: cpu.pc,
            cycles: cpu.cycles,
            config: config.clone(),
            data: cpu.mem.data.clone(),
            ports: cpu.gpio_ports.iter().map(|p| p.snapshot()).collect(),
        }
    }

    /// Load this state into `cpu` and re-derive its pending interrupts.
    pub fn apply(&self, cpu: &mut Cpu) -> Result<(), StateError> {
        if self.data.len() != cpu.mem.data.len() {
            return Err(StateError::SizeMismatch { saved: self.data.len(), current: cpu.mem.data.len() });
        }
        if self.ports.len() != cpu.gpio_ports.len() {
            warn!(saved = self.ports.len(), current = cpu.gpio_ports.len(), "gpio port count differs");
        }
        cpu.mem.data.copy_from_slice(&self.data);
        cpu.pc = self.pc;
        cpu.cycles = self.cycles;

        let ports = cpu.gpio_ports.clone();
        for (port, saved) in ports.iter().zip(&self.ports) {
            port.restore(saved);
        }

        cpu.interrupts.clear();
        for port in &ports {
            for config in port.interrupt_configs() {
                let enable = cpu.mem.data[config.enable_register as usize];
                cpu.update_interrupt_enable(config, enable);
            }
            port.check_external_interrupts(cpu);
        }
        Ok(())
    }

    /// Encode with header and deflate compression.
    pub fn to_bytes(&self) -> Result<Vec<u8>, StateError> {
        let payload = bincode::serialize(self)?;
        let compressed = miniz_oxide::deflate::compress_to_vec(&payload, 6);

        let sram = self.config.sram_bytes as u32;
        let mut out = Vec::with_capacity(HEADER_LEN + compressed.len());
        out.extend_from_slice(MAGIC);
        out.extend_from_slice(&FORMAT_VERSION.to_le_bytes());
        out.extend_from_slice(&sram.to_le_bytes());
        out.extend_from_slice(&compressed);
        Ok(out)
    }

    /// Decode, verifying magic, version and SRAM size.
    pub fn from_bytes(bytes: &[u8], expected_sram: usize) -> Result<Self, StateError> {
        if bytes.len() < HEADER_LEN {
            return Err(StateError::TooShort(bytes.len()));
        }
        if &bytes[0..4] != MAGIC {
            return Err(StateError::BadMagic);
        }
        let version = u32::from_le_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]);
        if version != FORMAT_VERSION {
            return Err(StateError::UnsupportedVersion { found: version, expected: FORMAT_VERSION });
        }
        let sram = u32::from_le_bytes([bytes[8], bytes[9], bytes[10], bytes[11]]) as usize;
        if sram != expected_sram {
            return Err(StateError::SizeMismatch { saved: sram, current: expected_sram });
        }

        let decompressed = miniz_oxide::inflate::decompress_to_vec(&bytes[HEADER_LEN..])
            .map_err(|e| StateError::Decode(format!("{:?}", e)))?;
        bincode::deserialize(&decompressed).map_err(|e| StateError::Decode(e.to_string()))
    }
}

pub fn save_to_file(state: &SaveState, path: &Path) -> Result<(), StateError> {
    let bytes = state.to_bytes()?;
    std::fs::write(path, bytes)?;
    Ok(())
}

pub fn load_from_file(path: &Path, expected_sram: usize) -> Result<SaveState, StateError> {
    let bytes = std::fs::read(path)?;
    SaveState::from_bytes(&bytes, expected_sram)
}
