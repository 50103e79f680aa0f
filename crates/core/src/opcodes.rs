//! AVR instruction decoder.
//!
//! Decodes 16-bit (and 32-bit) AVR instruction words into a typed
//! [`Instruction`] enum. The table covers the full AVRe+/AVRxm instruction
//! set: arithmetic, logic, branches, load/store with every X/Y/Z addressing
//! mode, program-memory loads (LPM/ELPM), the extended-address jumps and
//! calls, the XMEGA read-modify-write forms (XCH/LAS/LAC/LAT), multiplies,
//! bit manipulation and the SREG set/clear forms.

/// Decoded AVR instruction with operands.
///
/// Register fields `d` and `r` are 0–31, `k` is an immediate or address,
/// `a` is an I/O address already converted to data space (I/O + 0x20),
/// `b` is a bit index and `s` is an SREG bit index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Instruction {
    Nop,
    // Arithmetic
    Add { d: u8, r: u8 },
    Adc { d: u8, r: u8 },
    Sub { d: u8, r: u8 },
    Subi { d: u8, k: u8 },
    Sbc { d: u8, r: u8 },
    Sbci { d: u8, k: u8 },
    And { d: u8, r: u8 },
    Andi { d: u8, k: u8 },
    Or { d: u8, r: u8 },
    Ori { d: u8, k: u8 },
    Eor { d: u8, r: u8 },
    Com { d: u8 },
    Neg { d: u8 },
    Inc { d: u8 },
    Dec { d: u8 },
    Mul { d: u8, r: u8 },
    Muls { d: u8, r: u8 },
    Mulsu { d: u8, r: u8 },
    Fmul { d: u8, r: u8 },
    Fmuls { d: u8, r: u8 },
    Fmulsu { d: u8, r: u8 },
    Adiw { d: u8, k: u8 },
    Sbiw { d: u8, k: u8 },
    // Compare
    Cp { d: u8, r: u8 },
    Cpc { d: u8, r: u8 },
    Cpi { d: u8, k: u8 },
    // Data transfer
    Mov { d: u8, r: u8 },
    Movw { d: u8, r: u8 },
    Ldi { d: u8, k: u8 },
    Lds { d: u8, k: u16 },
    Sts { k: u16, r: u8 },
    LdX { d: u8 },
    LdXInc { d: u8 },
    LdXDec { d: u8 },
    LdY { d: u8 },
    LdYInc { d: u8 },
    LdYDec { d: u8 },
    LdYQ { d: u8, q: u8 },
    LdZ { d: u8 },
    LdZInc { d: u8 },
    LdZDec { d: u8 },
    LdZQ { d: u8, q: u8 },
    StX { r: u8 },
    StXInc { r: u8 },
    StXDec { r: u8 },
    StY { r: u8 },
    StYInc { r: u8 },
    StYDec { r: u8 },
    StYQ { r: u8, q: u8 },
    StZ { r: u8 },
    StZInc { r: u8 },
    StZDec { r: u8 },
    StZQ { r: u8, q: u8 },
    // Read-modify-write on (Z)
    Xch { r: u8 },
    Las { r: u8 },
    Lac { r: u8 },
    Lat { r: u8 },
    // Stack
    Push { r: u8 },
    Pop { d: u8 },
    // Shift/Bit
    Lsr { d: u8 },
    Asr { d: u8 },
    Ror { d: u8 },
    Swap { d: u8 },
    Bst { d: u8, b: u8 },
    Bld { d: u8, b: u8 },
    Sbi { a: u8, b: u8 },
    Cbi { a: u8, b: u8 },
    Bset { s: u8 },
    Bclr { s: u8 },
    // Branch
    Rjmp { k: i16 },
    Rcall { k: i16 },
    Ret,
    Reti,
    Jmp { k: u32 },
    Call { k: u32 },
    Ijmp,
    Icall,
    Eijmp,
    Eicall,
    Cpse { d: u8, r: u8 },
    Sbrc { r: u8, b: u8 },
    Sbrs { r: u8, b: u8 },
    Sbic { a: u8, b: u8 },
    Sbis { a: u8, b: u8 },
    Brbs { s: u8, k: i8 },
    Brbc { s: u8, k: i8 },
    // I/O
    In { d: u8, a: u8 },
    Out { a: u8, r: u8 },
    // LPM
    Lpm0,
    LpmD { d: u8 },
    LpmDInc { d: u8 },
    // ELPM (Extended LPM - uses RAMPZ:Z)
    Elpm0,
    ElpmD { d: u8 },
    ElpmDInc { d: u8 },
    // Misc
    Sleep,
    Wdr,
    Break,
    Spm,
    SpmZInc,
    Unknown(u16),
}

/// True for the four encodings that carry a second operand word.
///
/// Skip instructions use this to step over both words of the next instruction.
#[inline(always)]
pub fn is_two_word(word: u16) -> bool {
    (word & 0xFE0F == 0x9000)
        || (word & 0xFE0F == 0x9200)
        || (word & 0xFE0E == 0x940C)
        || (word & 0xFE0E == 0x940E)
}

/// Decode a 16-bit instruction word (with the next word for 32-bit instructions).
/// Returns (Instruction, size_in_words)
pub fn decode(word: u16, next_word: u16) -> (Instruction, u8) {
    // 32-bit instructions first (JMP, CALL, LDS, STS)
    // JMP: 1001 010k kkkk 110k kkkk kkkk kkkk kkkk
    if word & 0xFE0E == 0x940C {
        return (Instruction::Jmp { k: long_address(word, next_word) }, 2);
    }
    // CALL: 1001 010k kkkk 111k kkkk kkkk kkkk kkkk
    if word & 0xFE0E == 0x940E {
        return (Instruction::Call { k: long_address(word, next_word) }, 2);
    }
    // LDS Rd,k: 1001 000d dddd 0000 kkkk kkkk kkkk kkkk
    if word & 0xFE0F == 0x9000 {
        let d = ((word >> 4) & 0x1F) as u8;
        return (Instruction::Lds { d, k: next_word }, 2);
    }
    // STS k,Rr: 1001 001d dddd 0000 kkkk kkkk kkkk kkkk
    if word & 0xFE0F == 0x9200 {
        let r = ((word >> 4) & 0x1F) as u8;
        return (Instruction::Sts { k: next_word, r }, 2);
    }

    // Fixed 16-bit encodings
    match word {
        0x0000 => return (Instruction::Nop, 1),
        0x9508 => return (Instruction::Ret, 1),
        0x9518 => return (Instruction::Reti, 1),
        0x9409 => return (Instruction::Ijmp, 1),
        0x9419 => return (Instruction::Eijmp, 1),
        0x9509 => return (Instruction::Icall, 1),
        0x9519 => return (Instruction::Eicall, 1),
        0x9588 => return (Instruction::Sleep, 1),
        0x9598 => return (Instruction::Break, 1),
        0x95A8 => return (Instruction::Wdr, 1),
        0x95C8 => return (Instruction::Lpm0, 1),
        0x95D8 => return (Instruction::Elpm0, 1),
        0x95E8 => return (Instruction::Spm, 1),
        0x95F8 => return (Instruction::SpmZInc, 1),
        _ => {}
    }

    // BSET: 1001 0100 0sss 1000, BCLR: 1001 0100 1sss 1000
    if word & 0xFF8F == 0x9408 {
        return (Instruction::Bset { s: ((word >> 4) & 7) as u8 }, 1);
    }
    if word & 0xFF8F == 0x9488 {
        return (Instruction::Bclr { s: ((word >> 4) & 7) as u8 }, 1);
    }

    match word >> 12 {
        // 0000 xxxx - NOP, MOVW, MULS, MULSU, FMUL*, CPC, SBC, ADD
        0x0 => {
            // MOVW: 0000 0001 dddd rrrr
            if word & 0xFF00 == 0x0100 {
                let d = (((word >> 4) & 0xF) * 2) as u8;
                let r = ((word & 0xF) * 2) as u8;
                return (Instruction::Movw { d, r }, 1);
            }
            // MULS: 0000 0010 dddd rrrr
            if word & 0xFF00 == 0x0200 {
                let d = (((word >> 4) & 0xF) + 16) as u8;
                let r = ((word & 0xF) + 16) as u8;
                return (Instruction::Muls { d, r }, 1);
            }
            // 0000 0011 xddd xrrr: MULSU / FMUL / FMULS / FMULSU
            if word & 0xFF00 == 0x0300 {
                let d = (((word >> 4) & 0x7) + 16) as u8;
                let r = ((word & 0x7) + 16) as u8;
                let inst = match word & 0x0088 {
                    0x0000 => Instruction::Mulsu { d, r },
                    0x0008 => Instruction::Fmul { d, r },
                    0x0080 => Instruction::Fmuls { d, r },
                    _ => Instruction::Fmulsu { d, r },
                };
                return (inst, 1);
            }
            // CPC: 0000 01rd dddd rrrr
            if word & 0xFC00 == 0x0400 {
                let (d, r) = decode_5_5(word);
                return (Instruction::Cpc { d, r }, 1);
            }
            // SBC: 0000 10rd dddd rrrr
            if word & 0xFC00 == 0x0800 {
                let (d, r) = decode_5_5(word);
                return (Instruction::Sbc { d, r }, 1);
            }
            // ADD: 0000 11rd dddd rrrr
            if word & 0xFC00 == 0x0C00 {
                let (d, r) = decode_5_5(word);
                return (Instruction::Add { d, r }, 1);
            }
        }

        // 0001 xxxx - CPSE, CP, SUB, ADC
        0x1 => {
            let (d, r) = decode_5_5(word);
            let inst = match word & 0xFC00 {
                0x1000 => Instruction::Cpse { d, r },
                0x1400 => Instruction::Cp { d, r },
                0x1800 => Instruction::Sub { d, r },
                _ => Instruction::Adc { d, r },
            };
            return (inst, 1);
        }

        // 0010 xxxx - AND, EOR, OR, MOV
        0x2 => {
            let (d, r) = decode_5_5(word);
            let inst = match word & 0xFC00 {
                0x2000 => Instruction::And { d, r },
                0x2400 => Instruction::Eor { d, r },
                0x2800 => Instruction::Or { d, r },
                _ => Instruction::Mov { d, r },
            };
            return (inst, 1);
        }

        // 0011..0111 - register/immediate forms on R16-R31
        0x3 => {
            let (d, k) = decode_4_8(word);
            return (Instruction::Cpi { d: d + 16, k }, 1);
        }
        0x4 => {
            let (d, k) = decode_4_8(word);
            return (Instruction::Sbci { d: d + 16, k }, 1);
        }
        0x5 => {
            let (d, k) = decode_4_8(word);
            return (Instruction::Subi { d: d + 16, k }, 1);
        }
        0x6 => {
            let (d, k) = decode_4_8(word);
            return (Instruction::Ori { d: d + 16, k }, 1);
        }
        0x7 => {
            let (d, k) = decode_4_8(word);
            return (Instruction::Andi { d: d + 16, k }, 1);
        }

        // 10q0 qqsd dddd yqqq - LDD/STD with displacement, LD/ST Y/Z
        0x8 | 0xA => {
            let q = ((((word >> 13) & 1) << 5) | (((word >> 10) & 3) << 3) | (word & 7)) as u8;
            let d_r = ((word >> 4) & 0x1F) as u8;
            let is_store = word & 0x0200 != 0;
            let is_y = word & 0x0008 != 0;

            let inst = match (is_y, is_store, q) {
                (true, false, 0) => Instruction::LdY { d: d_r },
                (true, false, q) => Instruction::LdYQ { d: d_r, q },
                (true, true, 0) => Instruction::StY { r: d_r },
                (true, true, q) => Instruction::StYQ { r: d_r, q },
                (false, false, 0) => Instruction::LdZ { d: d_r },
                (false, false, q) => Instruction::LdZQ { d: d_r, q },
                (false, true, 0) => Instruction::StZ { r: d_r },
                (false, true, q) => Instruction::StZQ { r: d_r, q },
            };
            return (inst, 1);
        }

        // 1001 xxxx - single-register ops, LD/ST, PUSH/POP, I/O bit ops, MUL
        0x9 => return decode_1001(word),

        // 1011 xxxx - IN/OUT
        0xB => {
            let d_r = ((word >> 4) & 0x1F) as u8;
            let a = ((((word >> 9) & 3) << 4) | (word & 0xF)) as u8 + 0x20;
            if word & 0x0800 == 0 {
                return (Instruction::In { d: d_r, a }, 1);
            }
            return (Instruction::Out { a, r: d_r }, 1);
        }

        0xC => return (Instruction::Rjmp { k: sign_extend_12(word & 0x0FFF) }, 1),
        0xD => return (Instruction::Rcall { k: sign_extend_12(word & 0x0FFF) }, 1),

        // 1110 KKKK dddd KKKK - LDI
        0xE => {
            let (d, k) = decode_4_8(word);
            return (Instruction::Ldi { d: d + 16, k }, 1);
        }

        // 1111 xxxx - BRBS/BRBC, BLD, BST, SBRC, SBRS
        0xF => return decode_1111(word),

        _ => {}
    }

    (Instruction::Unknown(word), 1)
}

/// Decode 1001 xxxx instructions
fn decode_1001(word: u16) -> (Instruction, u8) {
    let d_r = ((word >> 4) & 0x1F) as u8;

    // Single-register ops: 1001 010d dddd xxxx
    if word & 0xFE00 == 0x9400 {
        let inst = match word & 0x000F {
            0x0 => Instruction::Com { d: d_r },
            0x1 => Instruction::Neg { d: d_r },
            0x2 => Instruction::Swap { d: d_r },
            0x3 => Instruction::Inc { d: d_r },
            0x5 => Instruction::Asr { d: d_r },
            0x6 => Instruction::Lsr { d: d_r },
            0x7 => Instruction::Ror { d: d_r },
            0xA => Instruction::Dec { d: d_r },
            _ => Instruction::Unknown(word),
        };
        return (inst, 1);
    }

    // ADIW/SBIW: 1001 011x KKdd KKKK
    if word & 0xFE00 == 0x9600 {
        let d = ((((word >> 4) & 3) * 2) + 24) as u8;
        let k = ((((word >> 6) & 0x03) << 4) | (word & 0x0F)) as u8;
        if word & 0x0100 == 0 {
            return (Instruction::Adiw { d, k }, 1);
        }
        return (Instruction::Sbiw { d, k }, 1);
    }

    // CBI/SBIC/SBI/SBIS: 1001 10xx AAAA Abbb
    if word & 0xFC00 == 0x9800 {
        let a = ((word >> 3) & 0x1F) as u8 + 0x20;
        let b = (word & 7) as u8;
        let inst = match word & 0xFF00 {
            0x9800 => Instruction::Cbi { a, b },
            0x9900 => Instruction::Sbic { a, b },
            0x9A00 => Instruction::Sbi { a, b },
            _ => Instruction::Sbis { a, b },
        };
        return (inst, 1);
    }

    // MUL: 1001 11rd dddd rrrr
    if word & 0xFC00 == 0x9C00 {
        let (d, r) = decode_5_5(word);
        return (Instruction::Mul { d, r }, 1);
    }

    // Load variants: 1001 000d dddd xxxx
    if word & 0xFE00 == 0x9000 {
        let inst = match word & 0x000F {
            0x1 => Instruction::LdZInc { d: d_r },
            0x2 => Instruction::LdZDec { d: d_r },
            0x4 => Instruction::LpmD { d: d_r },
            0x5 => Instruction::LpmDInc { d: d_r },
            0x6 => Instruction::ElpmD { d: d_r },
            0x7 => Instruction::ElpmDInc { d: d_r },
            0x9 => Instruction::LdYInc { d: d_r },
            0xA => Instruction::LdYDec { d: d_r },
            0xC => Instruction::LdX { d: d_r },
            0xD => Instruction::LdXInc { d: d_r },
            0xE => Instruction::LdXDec { d: d_r },
            0xF => Instruction::Pop { d: d_r },
            _ => Instruction::Unknown(word),
        };
        return (inst, 1);
    }

    // Store variants: 1001 001r rrrr xxxx
    if word & 0xFE00 == 0x9200 {
        let inst = match word & 0x000F {
            0x1 => Instruction::StZInc { r: d_r },
            0x2 => Instruction::StZDec { r: d_r },
            0x4 => Instruction::Xch { r: d_r },
            0x5 => Instruction::Las { r: d_r },
            0x6 => Instruction::Lac { r: d_r },
            0x7 => Instruction::Lat { r: d_r },
            0x9 => Instruction::StYInc { r: d_r },
            0xA => Instruction::StYDec { r: d_r },
            0xC => Instruction::StX { r: d_r },
            0xD => Instruction::StXInc { r: d_r },
            0xE => Instruction::StXDec { r: d_r },
            0xF => Instruction::Push { r: d_r },
            _ => Instruction::Unknown(word),
        };
        return (inst, 1);
    }

    (Instruction::Unknown(word), 1)
}

/// Decode 1111 xxxx instructions (branches, BLD, BST, SBRC, SBRS)
fn decode_1111(word: u16) -> (Instruction, u8) {
    let s = (word & 7) as u8;
    // BRBS/BRBC: 1111 0Xkk kkkk ksss
    if word & 0x0800 == 0 {
        let k = ((((word >> 3) & 0x7F) as u8) << 1) as i8 >> 1;
        if word & 0x0400 == 0 {
            return (Instruction::Brbs { s, k }, 1);
        }
        return (Instruction::Brbc { s, k }, 1);
    }
    // Bit forms require bit 3 clear: 1111 1xxd dddd 0bbb
    if word & 0x0008 != 0 {
        return (Instruction::Unknown(word), 1);
    }
    let d = ((word >> 4) & 0x1F) as u8;
    let inst = match word & 0xFE00 {
        0xF800 => Instruction::Bld { d, b: s },
        0xFA00 => Instruction::Bst { d, b: s },
        0xFC00 => Instruction::Sbrc { r: d, b: s },
        _ => Instruction::Sbrs { r: d, b: s },
    };
    (inst, 1)
}

// --- Helper decoders ---

/// 22-bit absolute address of JMP/CALL: 5 bits at 8..4, 1 bit at 0, then 16 bits.
#[inline(always)]
fn long_address(word: u16, next_word: u16) -> u32 {
    ((((word as u32 >> 3) & 0x3E) | (word as u32 & 1)) << 16) | next_word as u32
}

/// Decode 5-bit d, 5-bit r from: xxxx xxrd dddd rrrr
#[inline(always)]
fn decode_5_5(word: u16) -> (u8, u8) {
    let d = ((word >> 4) & 0x1F) as u8;
    let r = ((word & 0x0F) | ((word >> 5) & 0x10)) as u8;
    (d, r)
}

/// Decode 4-bit d, 8-bit K from: xxxx KKKK dddd KKKK
#[inline(always)]
fn decode_4_8(word: u16) -> (u8, u8) {
    let d = ((word >> 4) & 0x0F) as u8;
    let k = (((word >> 4) & 0xF0) | (word & 0x0F)) as u8;
    (d, k)
}

/// Sign-extend 12-bit value to i16
#[inline(always)]
fn sign_extend_12(val: u16) -> i16 {
    if val & 0x800 != 0 {
        (val | 0xF000) as i16
    } else {
        val as i16
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_nop() {
        let (inst, sz) = decode(0x0000, 0);
        assert_eq!(inst, Instruction::Nop);
        assert_eq!(sz, 1);
    }

    #[test]
    fn test_decode_ldi() {
        // LDI R16, 0xFF => 1110 1111 0000 1111
        let (inst, sz) = decode(0xEF0F, 0);
        assert_eq!(sz, 1);
        assert_eq!(inst, Instruction::Ldi { d: 16, k: 0xFF });
    }

    #[test]
    fn test_decode_rjmp() {
        assert_eq!(decode(0xC000, 0).0, Instruction::Rjmp { k: 0 });
        assert_eq!(decode(0xCFFF, 0).0, Instruction::Rjmp { k: -1 });
    }

    #[test]
    fn test_decode_jmp_call() {
        let (inst, sz) = decode(0x940C, 0x0034);
        assert_eq!(sz, 2);
        assert_eq!(inst, Instruction::Jmp { k: 0x0034 });
        // CALL with k bit 16 set: 1001 0100 0000 1111
        let (inst, sz) = decode(0x940F, 0x0520);
        assert_eq!(sz, 2);
        assert_eq!(inst, Instruction::Call { k: 0x10520 });
    }

    #[test]
    fn test_decode_add() {
        assert_eq!(decode(0x0C01, 0).0, Instruction::Add { d: 0, r: 1 });
        // ADD R31, R31 => 0000 1111 1111 1111
        assert_eq!(decode(0x0FFF, 0).0, Instruction::Add { d: 31, r: 31 });
    }

    #[test]
    fn test_decode_push_pop() {
        assert_eq!(decode(0x920F, 0).0, Instruction::Push { r: 0 });
        assert_eq!(decode(0x900F, 0).0, Instruction::Pop { d: 0 });
    }

    #[test]
    fn test_decode_std_y_q() {
        // STD Y+1, R0 => 10q0 qq1r rrrr 1qqq = 0x8209
        assert_eq!(decode(0x8209, 0), (Instruction::StYQ { r: 0, q: 1 }, 1));
    }

    #[test]
    fn test_decode_ldd_z_q() {
        // LDD R0, Z+1 => 10q0 qq0d dddd 0qqq = 0x8001
        assert_eq!(decode(0x8001, 0), (Instruction::LdZQ { d: 0, q: 1 }, 1));
    }

    #[test]
    fn test_decode_std_y_q_large_offset() {
        // STD Y+63, R31 => 1010 1111 1111 1111
        assert_eq!(decode(0xAFFF, 0).0, Instruction::StYQ { r: 31, q: 63 });
    }

    #[test]
    fn test_decode_adiw_sbiw() {
        // ADIW R26, 1 => 1001 0110 0001 0001
        assert_eq!(decode(0x9611, 0).0, Instruction::Adiw { d: 26, k: 1 });
        // SBIW R24, 63 => 1001 0111 1100 1111
        assert_eq!(decode(0x97CF, 0).0, Instruction::Sbiw { d: 24, k: 63 });
    }

    #[test]
    fn test_decode_bset_bclr() {
        assert_eq!(decode(0x9478, 0).0, Instruction::Bset { s: 7 }); // SEI
        assert_eq!(decode(0x94F8, 0).0, Instruction::Bclr { s: 7 }); // CLI
        assert_eq!(decode(0x9408, 0).0, Instruction::Bset { s: 0 }); // SEC
    }

    #[test]
    fn test_decode_fmul_family() {
        assert_eq!(decode(0x0312, 0).0, Instruction::Mulsu { d: 17, r: 18 });
        assert_eq!(decode(0x031A, 0).0, Instruction::Fmul { d: 17, r: 18 });
        assert_eq!(decode(0x0392, 0).0, Instruction::Fmuls { d: 17, r: 18 });
        assert_eq!(decode(0x039A, 0).0, Instruction::Fmulsu { d: 17, r: 18 });
    }

    #[test]
    fn test_decode_xmega_rmw() {
        assert_eq!(decode(0x9204, 0).0, Instruction::Xch { r: 0 });
        assert_eq!(decode(0x9355, 0).0, Instruction::Las { r: 21 });
        assert_eq!(decode(0x9266, 0).0, Instruction::Lac { r: 6 });
        assert_eq!(decode(0x93F7, 0).0, Instruction::Lat { r: 31 });
    }

    #[test]
    fn test_decode_branch_offsets() {
        // BRNE .-2 => 1111 01kk kkkk k001, k = -2 = 0b1111110
        assert_eq!(decode(0xF7F1, 0).0, Instruction::Brbc { s: 1, k: -2 });
        // BREQ .+63
        assert_eq!(decode(0xF1F9, 0).0, Instruction::Brbs { s: 1, k: 63 });
    }

    #[test]
    fn test_decode_io() {
        // OUT 0x3F, R16 => 1011 1111 0000 1111 (SREG in data space = 0x5F)
        assert_eq!(decode(0xBF0F, 0).0, Instruction::Out { a: 0x5F, r: 16 });
        // SBI 0x05, 3 (PORTB in data space = 0x25)
        assert_eq!(decode(0x9A2B, 0).0, Instruction::Sbi { a: 0x25, b: 3 });
    }

    #[test]
    fn test_decode_unknown() {
        assert_eq!(decode(0x9404, 0).0, Instruction::Unknown(0x9404));
        assert_eq!(decode(0xFF08, 0).0, Instruction::Unknown(0xFF08));
        assert_eq!(decode(0x9003, 0).0, Instruction::Unknown(0x9003));
    }

    #[test]
    fn test_is_two_word() {
        assert!(is_two_word(0x940C));
        assert!(is_two_word(0x940F));
        assert!(is_two_word(0x91E0));
        assert!(is_two_word(0x93F0));
        assert!(!is_two_word(0x0000));
        assert!(!is_two_word(0x9409));
    }
}
