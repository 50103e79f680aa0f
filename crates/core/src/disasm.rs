//! AVR instruction disassembler.
//!
//! Converts decoded [`Instruction`] values back to assembly text for the
//! runner's trace output, breakpoints and register dumps. I/O operands are
//! printed as I/O addresses (data address - 0x20), jump targets as byte
//! addresses.

use crate::opcodes::{self, Instruction};

const SET_NAMES: [&str; 8] = ["SEC", "SEZ", "SEN", "SEV", "SES", "SEH", "SET", "SEI"];
const CLEAR_NAMES: [&str; 8] = ["CLC", "CLZ", "CLN", "CLV", "CLS", "CLH", "CLT", "CLI"];
const BRBS_NAMES: [&str; 8] = ["BRCS", "BREQ", "BRMI", "BRVS", "BRLT", "BRHS", "BRTS", "BRIE"];
const BRBC_NAMES: [&str; 8] = ["BRCC", "BRNE", "BRPL", "BRVC", "BRGE", "BRHC", "BRTC", "BRID"];

#[inline]
fn io(a: u8) -> u8 {
    a.wrapping_sub(0x20)
}

/// Byte address of a relative jump from the instruction at word `pc`.
#[inline]
fn rel_target(pc: u32, k: i32) -> u32 {
    (pc as i32).wrapping_add(1).wrapping_add(k) as u32 * 2
}

/// Format a decoded instruction as an assembly string.
///
/// `pc` is the word address of the instruction, used for relative targets.
pub fn disassemble(inst: Instruction, pc: u32) -> String {
    match inst {
        Instruction::Nop => "NOP".into(),
        // Arithmetic
        Instruction::Add { d, r }  => format!("ADD R{}, R{}", d, r),
        Instruction::Adc { d, r }  => format!("ADC R{}, R{}", d, r),
        Instruction::Sub { d, r }  => format!("SUB R{}, R{}", d, r),
        Instruction::Subi { d, k } => format!("SUBI R{}, 0x{:02X}", d, k),
        Instruction::Sbc { d, r }  => format!("SBC R{}, R{}", d, r),
        Instruction::Sbci { d, k } => format!("SBCI R{}, 0x{:02X}", d, k),
        Instruction::And { d, r }  => format!("AND R{}, R{}", d, r),
        Instruction::Andi { d, k } => format!("ANDI R{}, 0x{:02X}", d, k),
        Instruction::Or { d, r }   => format!("OR R{}, R{}", d, r),
        Instruction::Ori { d, k }  => format!("ORI R{}, 0x{:02X}", d, k),
        Instruction::Eor { d, r }  => format!("EOR R{}, R{}", d, r),
        Instruction::Com { d }     => format!("COM R{}", d),
        Instruction::Neg { d }     => format!("NEG R{}", d),
        Instruction::Inc { d }     => format!("INC R{}", d),
        Instruction::Dec { d }     => format!("DEC R{}", d),
        Instruction::Mul { d, r }  => format!("MUL R{}, R{}", d, r),
        Instruction::Muls { d, r } => format!("MULS R{}, R{}", d, r),
        Instruction::Mulsu { d, r }  => format!("MULSU R{}, R{}", d, r),
        Instruction::Fmul { d, r }   => format!("FMUL R{}, R{}", d, r),
        Instruction::Fmuls { d, r }  => format!("FMULS R{}, R{}", d, r),
        Instruction::Fmulsu { d, r } => format!("FMULSU R{}, R{}", d, r),
        Instruction::Adiw { d, k } => format!("ADIW R{}:R{}, {}", d + 1, d, k),
        Instruction::Sbiw { d, k } => format!("SBIW R{}:R{}, {}", d + 1, d, k),
        // Compare
        Instruction::Cp { d, r }   => format!("CP R{}, R{}", d, r),
        Instruction::Cpc { d, r }  => format!("CPC R{}, R{}", d, r),
        Instruction::Cpi { d, k }  => format!("CPI R{}, 0x{:02X}", d, k),
        // Data transfer
        Instruction::Mov { d, r }  => format!("MOV R{}, R{}", d, r),
        Instruction::Movw { d, r } => format!("MOVW R{}:R{}, R{}:R{}", d + 1, d, r + 1, r),
        Instruction::Ldi { d, k }  => format!("LDI R{}, 0x{:02X}", d, k),
        Instruction::Lds { d, k }  => format!("LDS R{}, 0x{:04X}", d, k),
        Instruction::Sts { k, r }  => format!("STS 0x{:04X}, R{}", k, r),
        Instruction::LdX { d }     => format!("LD R{}, X", d),
        Instruction::LdXInc { d }  => format!("LD R{}, X+", d),
        Instruction::LdXDec { d }  => format!("LD R{}, -X", d),
        Instruction::LdY { d }     => format!("LD R{}, Y", d),
        Instruction::LdYInc { d }  => format!("LD R{}, Y+", d),
        Instruction::LdYDec { d }  => format!("LD R{}, -Y", d),
        Instruction::LdYQ { d, q } => format!("LDD R{}, Y+{}", d, q),
        Instruction::LdZ { d }     => format!("LD R{}, Z", d),
        Instruction::LdZInc { d }  => format!("LD R{}, Z+", d),
        Instruction::LdZDec { d }  => format!("LD R{}, -Z", d),
        Instruction::LdZQ { d, q } => format!("LDD R{}, Z+{}", d, q),
        Instruction::StX { r }     => format!("ST X, R{}", r),
        Instruction::StXInc { r }  => format!("ST X+, R{}", r),
        Instruction::StXDec { r }  => format!("ST -X, R{}", r),
        Instruction::StY { r }     => format!("ST Y, R{}", r),
        Instruction::StYInc { r }  => format!("ST Y+, R{}", r),
        Instruction::StYDec { r }  => format!("ST -Y, R{}", r),
        Instruction::StYQ { r, q } => format!("STD Y+{}, R{}", q, r),
        Instruction::StZ { r }     => format!("ST Z, R{}", r),
        Instruction::StZInc { r }  => format!("ST Z+, R{}", r),
        Instruction::StZDec { r }  => format!("ST -Z, R{}", r),
        Instruction::StZQ { r, q } => format!("STD Z+{}, R{}", q, r),
        Instruction::Xch { r }     => format!("XCH Z, R{}", r),
        Instruction::Las { r }     => format!("LAS Z, R{}", r),
        Instruction::Lac { r }     => format!("LAC Z, R{}", r),
        Instruction::Lat { r }     => format!("LAT Z, R{}", r),
        // Stack
        Instruction::Push { r }    => format!("PUSH R{}", r),
        Instruction::Pop { d }     => format!("POP R{}", d),
        // Shift/Bit
        Instruction::Lsr { d }     => format!("LSR R{}", d),
        Instruction::Asr { d }     => format!("ASR R{}", d),
        Instruction::Ror { d }     => format!("ROR R{}", d),
        Instruction::Swap { d }    => format!("SWAP R{}", d),
        Instruction::Bst { d, b }  => format!("BST R{}, {}", d, b),
        Instruction::Bld { d, b }  => format!("BLD R{}, {}", d, b),
        Instruction::Sbi { a, b }  => format!("SBI 0x{:02X}, {}", io(a), b),
        Instruction::Cbi { a, b }  => format!("CBI 0x{:02X}, {}", io(a), b),
        Instruction::Bset { s } => SET_NAMES[(s & 7) as usize].into(),
        Instruction::Bclr { s } => CLEAR_NAMES[(s & 7) as usize].into(),
        // Branch
        Instruction::Rjmp { k } => format!("RJMP .{:+} ; 0x{:04X}", k, rel_target(pc, k as i32)),
        Instruction::Rcall { k } => format!("RCALL .{:+} ; 0x{:04X}", k, rel_target(pc, k as i32)),
        Instruction::Ret  => "RET".into(),
        Instruction::Reti => "RETI".into(),
        Instruction::Jmp { k }  => format!("JMP 0x{:06X}", k * 2),
        Instruction::Call { k } => format!("CALL 0x{:06X}", k * 2),
        Instruction::Ijmp   => "IJMP".into(),
        Instruction::Icall  => "ICALL".into(),
        Instruction::Eijmp  => "EIJMP".into(),
        Instruction::Eicall => "EICALL".into(),
        Instruction::Cpse { d, r } => format!("CPSE R{}, R{}", d, r),
        Instruction::Sbrc { r, b } => format!("SBRC R{}, {}", r, b),
        Instruction::Sbrs { r, b } => format!("SBRS R{}, {}", r, b),
        Instruction::Sbic { a, b } => format!("SBIC 0x{:02X}, {}", io(a), b),
        Instruction::Sbis { a, b } => format!("SBIS 0x{:02X}, {}", io(a), b),
        Instruction::Brbs { s, k } => {
            format!("{} .{:+} ; 0x{:04X}", BRBS_NAMES[(s & 7) as usize], k, rel_target(pc, k as i32))
        }
        Instruction::Brbc { s, k } => {
            format!("{} .{:+} ; 0x{:04X}", BRBC_NAMES[(s & 7) as usize], k, rel_target(pc, k as i32))
        }
        // I/O
        Instruction::In { d, a }  => format!("IN R{}, 0x{:02X}", d, io(a)),
        Instruction::Out { a, r } => format!("OUT 0x{:02X}, R{}", io(a), r),
        // LPM
        Instruction::Lpm0          => "LPM".into(),
        Instruction::LpmD { d }    => format!("LPM R{}, Z", d),
        Instruction::LpmDInc { d } => format!("LPM R{}, Z+", d),
        Instruction::Elpm0          => "ELPM".into(),
        Instruction::ElpmD { d }    => format!("ELPM R{}, Z", d),
        Instruction::ElpmDInc { d } => format!("ELPM R{}, Z+", d),
        // Misc
        Instruction::Sleep   => "SLEEP".into(),
        Instruction::Wdr     => "WDR".into(),
        Instruction::Break   => "BREAK".into(),
        Instruction::Spm     => "SPM".into(),
        Instruction::SpmZInc => "SPM Z+".into(),
        Instruction::Unknown(w) => format!(".dw 0x{:04X}", w),
    }
}

/// Format the SREG byte as "ITHSVNZC", uppercase for set flags.
pub fn format_sreg(sreg: u8) -> String {
    let flags = ['I', 'T', 'H', 'S', 'V', 'N', 'Z', 'C'];
    flags
        .iter()
        .enumerate()
        .map(|(i, &f)| if sreg & (1 << (7 - i)) != 0 { f } else { f.to_ascii_lowercase() })
        .collect()
}

/// Disassemble program memory from word `start` up to (not including) `end`.
///
/// Returns lines of `"0xAAAA: OPCODE  MNEMONIC"` with byte addresses.
pub fn disassemble_range(prog: &[u16], start: usize, end: usize) -> Vec<String> {
    let mut lines = Vec::new();
    let mut pc = start;
    let end = end.min(prog.len());
    while pc < end {
        let word = prog[pc];
        let next = prog.get(pc + 1).copied().unwrap_or(0);
        let (inst, size) = opcodes::decode(word, next);
        let asm = disassemble(inst, pc as u32);
        if size == 2 {
            lines.push(format!("0x{:04X}: {:04X} {:04X}  {}", pc * 2, word, next, asm));
        } else {
            lines.push(format!("0x{:04X}: {:04X}       {}", pc * 2, word, asm));
        }
        pc += size as usize;
    }
    lines
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_disasm_basic() {
        assert_eq!(disassemble(Instruction::Nop, 0), "NOP");
        assert_eq!(disassemble(Instruction::Add { d: 1, r: 2 }, 0), "ADD R1, R2");
        assert_eq!(disassemble(Instruction::Ldi { d: 16, k: 0xFF }, 0), "LDI R16, 0xFF");
        assert_eq!(disassemble(Instruction::Xch { r: 4 }, 0), "XCH Z, R4");
    }

    #[test]
    fn test_disasm_branch() {
        // RJMP +2 at word 0x10 lands on word 0x13
        let s = disassemble(Instruction::Rjmp { k: 2 }, 0x10);
        assert_eq!(s, "RJMP .+2 ; 0x0026");
        let s = disassemble(Instruction::Brbc { s: 1, k: -3 }, 0x10);
        assert_eq!(s, "BRNE .-3 ; 0x001C");
    }

    #[test]
    fn test_disasm_sreg_ops_and_io() {
        assert_eq!(disassemble(Instruction::Bset { s: 7 }, 0), "SEI");
        assert_eq!(disassemble(Instruction::Bclr { s: 0 }, 0), "CLC");
        assert_eq!(disassemble(Instruction::Sbi { a: 0x25, b: 3 }, 0), "SBI 0x05, 3");
        assert_eq!(disassemble(Instruction::Out { a: 0x5F, r: 0 }, 0), "OUT 0x3F, R0");
    }

    #[test]
    fn test_format_sreg() {
        assert_eq!(format_sreg(0xFF), "ITHSVNZC");
        assert_eq!(format_sreg(0x00), "ithsvnzc");
        assert_eq!(format_sreg(0x83), "IthsvnZC");
    }

    #[test]
    fn test_disassemble_range_two_word() {
        // LDI r16, 0x7F ; JMP 0x0100 ; NOP
        let prog = [0xE70F, 0x940C, 0x0100, 0x0000];
        let lines = disassemble_range(&prog, 0, 4);
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], "0x0000: E70F       LDI R16, 0x7F");
        assert_eq!(lines[1], "0x0002: 940C 0100  JMP 0x000200");
        assert!(lines[2].starts_with("0x0006: 0000"));
    }
}
