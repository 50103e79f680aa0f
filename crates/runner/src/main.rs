//! Headless runner for avr-core.
//!
//! Loads a raw little-endian program image, runs it for a cycle budget and
//! reports where it stopped. PORTB/PORTC/PORTD output changes are logged at
//! INFO level; `--trace` logs every instruction.
//!
//! ```text
//! avr-run blink.bin --cycles 16000000 --break 0x1a4 --dump-regs
//! ```

use std::error::Error;
use std::fs;
use std::path::PathBuf;
use std::rc::Rc;

use avr_core::{Avr, AvrConfig, StopReason};
use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "avr-run", version, about = "Run AVR firmware without hardware")]
struct Args {
    /// Raw program image (little-endian instruction words)
    #[arg(value_name = "PROGRAM")]
    program: PathBuf,

    /// Number of CPU cycles to run
    #[arg(short, long, default_value_t = 1_000_000)]
    cycles: u64,

    /// Internal SRAM size in bytes
    #[arg(long, default_value_t = avr_core::DEFAULT_SRAM_BYTES)]
    sram: usize,

    /// CPU clock in Hz
    #[arg(long, default_value_t = avr_core::DEFAULT_CLOCK_HZ)]
    clock_hz: u32,

    /// Log every executed instruction
    #[arg(short, long)]
    trace: bool,

    /// Breakpoint at hex byte address (repeatable)
    #[arg(long = "break", value_name = "ADDR", value_parser = parse_addr)]
    breakpoints: Vec<u32>,

    /// Write a save state here when the run stops
    #[arg(long, value_name = "PATH")]
    save_state: Option<PathBuf>,

    /// Restore a save state before running
    #[arg(long, value_name = "PATH")]
    load_state: Option<PathBuf>,

    /// Print registers when the run stops
    #[arg(long)]
    dump_regs: bool,
}

/// Parse a hex byte address, with or without `0x`.
fn parse_addr(s: &str) -> Result<u32, String> {
    let digits = s.trim_start_matches("0x").trim_start_matches("0X");
    let addr = u32::from_str_radix(digits, 16).map_err(|e| format!("bad address {s:?}: {e}"))?;
    if addr % 2 != 0 {
        return Err(format!("address {s} is not word aligned"));
    }
    Ok(addr)
}

/// Pack a byte image into program words. An odd trailing byte is zero padded.
fn words_from_bytes(bytes: &[u8]) -> Vec<u16> {
    bytes
        .chunks(2)
        .map(|c| u16::from_le_bytes([c[0], c.get(1).copied().unwrap_or(0)]))
        .collect()
}

fn init_logging(trace: bool) {
    let filter = if trace {
        EnvFilter::new("trace")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr).init();
}

fn run(args: Args) -> Result<(), Box<dyn Error>> {
    let image = fs::read(&args.program)
        .map_err(|e| format!("cannot read {}: {e}", args.program.display()))?;
    if image.is_empty() {
        return Err(format!("{} is empty", args.program.display()).into());
    }
    let program = words_from_bytes(&image);
    info!(path = %args.program.display(), words = program.len(), "program loaded");

    let config = AvrConfig { sram_bytes: args.sram, clock_hz: args.clock_hz };
    let mut avr = Avr::new(program, config);
    avr.breakpoints = args.breakpoints.iter().map(|a| a / 2).collect();

    for (name, port) in [("PORTB", &avr.port_b), ("PORTC", &avr.port_c), ("PORTD", &avr.port_d)] {
        port.add_listener(Rc::new(move |value: u8, old: u8| {
            info!("{name} {old:08b} -> {value:08b}");
        }));
    }

    if let Some(path) = &args.load_state {
        avr.load_state_from_file(path)?;
        info!(path = %path.display(), pc = avr.cpu.pc * 2, cycles = avr.cpu.cycles, "state loaded");
    }

    match avr.run_cycles(args.cycles) {
        StopReason::Budget => {
            info!(cycles = avr.cpu.cycles, secs = avr.elapsed_secs(), "cycle budget reached");
        }
        StopReason::Breakpoint(_) => {
            warn!("breakpoint: {}", avr.disasm_at_pc());
        }
    }

    if args.dump_regs {
        println!("{}", avr.dump_regs());
    }

    if let Some(path) = &args.save_state {
        avr.save_state_to_file(path)?;
        info!(path = %path.display(), "state saved");
    }
    Ok(())
}

fn main() {
    let args = Args::parse();
    init_logging(args.trace);
    if let Err(err) = run(args) {
        eprintln!("fatal: {err}");
        std::process::exit(1);
    }
}
