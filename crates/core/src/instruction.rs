//! Instruction execution.
//!
//! [`Cpu::execute`] applies one decoded [`Instruction`] and returns its cycle
//! cost. PC is advanced past the instruction before the operation runs, so
//! relative branches and return addresses are computed from the next word.
//! [`avr_instruction`] is the fetch/decode/execute step used by the driver.

use tracing::debug;

use crate::cpu::{flags_add, flags_logic, flags_mul, flags_shift, flags_sub, Cpu};
use crate::opcodes::{decode, is_two_word, Instruction};
use crate::{EIND_ADDR, RAMPZ_ADDR, SREG_I, SREG_T};

/// Fetch, decode and execute one instruction at PC, charge its cycles and
/// wrap PC into program memory.
pub fn avr_instruction(cpu: &mut Cpu) {
    let pc = cpu.pc as usize;
    let word = cpu.mem.prog_word(pc);
    let next = cpu.mem.prog_word(pc + 1);
    let (inst, size) = decode(word, next);
    let cycles = cpu.execute(inst, size);
    cpu.cycles += cycles as u64;
    let len = cpu.mem.prog.len() as u32;
    if len > 0 {
        cpu.pc %= len;
    }
}

impl Cpu {
    /// Execute a single decoded instruction and return the cycle cost.
    pub fn execute(&mut self, inst: Instruction, size: u8) -> u8 {
        self.pc = self.pc.wrapping_add(size as u32);
        let call_extra = self.pc_22_bits as u8;

        match inst {
            Instruction::Nop => 1,

            // -- Arithmetic --
            Instruction::Add { d, r } => {
                let rd = self.mem.reg(d); let rr = self.mem.reg(r);
                let res = rd.wrapping_add(rr);
                self.mem.set_reg(d, res);
                self.set_sreg(flags_add(self.sreg(), rd, rr, res)); 1
            }
            Instruction::Adc { d, r } => {
                let rd = self.mem.reg(d); let rr = self.mem.reg(r);
                let res = rd.wrapping_add(rr).wrapping_add(self.sreg() & 1);
                self.mem.set_reg(d, res);
                self.set_sreg(flags_add(self.sreg(), rd, rr, res)); 1
            }
            Instruction::Sub { d, r } => {
                let rd = self.mem.reg(d); let rr = self.mem.reg(r);
                let res = rd.wrapping_sub(rr);
                self.mem.set_reg(d, res);
                self.set_sreg(flags_sub(self.sreg(), rd, rr, res, false)); 1
            }
            Instruction::Subi { d, k } => {
                let rd = self.mem.reg(d);
                let res = rd.wrapping_sub(k);
                self.mem.set_reg(d, res);
                self.set_sreg(flags_sub(self.sreg(), rd, k, res, false)); 1
            }
            Instruction::Sbc { d, r } => {
                let rd = self.mem.reg(d); let rr = self.mem.reg(r);
                let res = rd.wrapping_sub(rr).wrapping_sub(self.sreg() & 1);
                self.mem.set_reg(d, res);
                self.set_sreg(flags_sub(self.sreg(), rd, rr, res, true)); 1
            }
            Instruction::Sbci { d, k } => {
                let rd = self.mem.reg(d);
                let res = rd.wrapping_sub(k).wrapping_sub(self.sreg() & 1);
                self.mem.set_reg(d, res);
                self.set_sreg(flags_sub(self.sreg(), rd, k, res, true)); 1
            }
            Instruction::And { d, r } => {
                let res = self.mem.reg(d) & self.mem.reg(r);
                self.mem.set_reg(d, res);
                self.set_sreg(flags_logic(self.sreg(), res)); 1
            }
            Instruction::Andi { d, k } => {
                let res = self.mem.reg(d) & k;
                self.mem.set_reg(d, res);
                self.set_sreg(flags_logic(self.sreg(), res)); 1
            }
            Instruction::Or { d, r } => {
                let res = self.mem.reg(d) | self.mem.reg(r);
                self.mem.set_reg(d, res);
                self.set_sreg(flags_logic(self.sreg(), res)); 1
            }
            Instruction::Ori { d, k } => {
                let res = self.mem.reg(d) | k;
                self.mem.set_reg(d, res);
                self.set_sreg(flags_logic(self.sreg(), res)); 1
            }
            Instruction::Eor { d, r } => {
                let res = self.mem.reg(d) ^ self.mem.reg(r);
                self.mem.set_reg(d, res);
                self.set_sreg(flags_logic(self.sreg(), res)); 1
            }
            Instruction::Com { d } => {
                let res = !self.mem.reg(d);
                self.mem.set_reg(d, res);
                let n = (res >> 7) & 1; let z = (res == 0) as u8;
                self.set_sreg((self.sreg() & 0b1110_0000) | (n << 4) | (n << 2) | (z << 1) | 1); 1
            }
            Instruction::Neg { d } => {
                let rd = self.mem.reg(d);
                let res = 0u8.wrapping_sub(rd);
                self.mem.set_reg(d, res);
                let h = ((res | rd) >> 3) & 1;
                let v = (res == 0x80) as u8;
                let n = (res >> 7) & 1;
                let z = (res == 0) as u8;
                let c = (res != 0) as u8;
                let s = n ^ v;
                self.set_sreg((self.sreg() & 0b1100_0000) | (h << 5) | (s << 4) | (v << 3) | (n << 2) | (z << 1) | c); 1
            }
            Instruction::Inc { d } => {
                let rd = self.mem.reg(d); let res = rd.wrapping_add(1);
                self.mem.set_reg(d, res);
                let n = (res >> 7) & 1; let v = (rd == 0x7F) as u8;
                let z = (res == 0) as u8; let s = n ^ v;
                self.set_sreg((self.sreg() & 0b1110_0001) | (s << 4) | (v << 3) | (n << 2) | (z << 1)); 1
            }
            Instruction::Dec { d } => {
                let rd = self.mem.reg(d); let res = rd.wrapping_sub(1);
                self.mem.set_reg(d, res);
                let n = (res >> 7) & 1; let v = (rd == 0x80) as u8;
                let z = (res == 0) as u8; let s = n ^ v;
                self.set_sreg((self.sreg() & 0b1110_0001) | (s << 4) | (v << 3) | (n << 2) | (z << 1)); 1
            }
            Instruction::Mul { d, r } => {
                let res = (self.mem.reg(d) as u16) * (self.mem.reg(r) as u16);
                self.store_product(res, res & 0x8000 != 0); 2
            }
            Instruction::Muls { d, r } => {
                let res = ((self.mem.reg(d) as i8 as i16) * (self.mem.reg(r) as i8 as i16)) as u16;
                self.store_product(res, res & 0x8000 != 0); 2
            }
            Instruction::Mulsu { d, r } => {
                let res = ((self.mem.reg(d) as i8 as i16) * (self.mem.reg(r) as i16)) as u16;
                self.store_product(res, res & 0x8000 != 0); 2
            }
            Instruction::Fmul { d, r } => {
                let prod = (self.mem.reg(d) as u16) * (self.mem.reg(r) as u16);
                self.store_product(prod << 1, prod & 0x8000 != 0); 2
            }
            Instruction::Fmuls { d, r } => {
                let prod = ((self.mem.reg(d) as i8 as i16) * (self.mem.reg(r) as i8 as i16)) as u16;
                self.store_product(prod << 1, prod & 0x8000 != 0); 2
            }
            Instruction::Fmulsu { d, r } => {
                let prod = ((self.mem.reg(d) as i8 as i16) * (self.mem.reg(r) as i16)) as u16;
                self.store_product(prod << 1, prod & 0x8000 != 0); 2
            }
            Instruction::Adiw { d, k } => {
                let pi = (d - 24) / 2; let val = self.mem.reg_pair(pi);
                let res = val.wrapping_add(k as u16);
                self.mem.set_reg_pair(pi, res);
                let rdh7 = (val >> 15) as u8; let r15 = (res >> 15) as u8;
                let v = (rdh7 ^ 1) & r15; let n = r15; let z = (res == 0) as u8;
                let c = (r15 ^ 1) & rdh7; let s = n ^ v;
                self.set_sreg((self.sreg() & 0b1110_0000) | (s << 4) | (v << 3) | (n << 2) | (z << 1) | c); 2
            }
            Instruction::Sbiw { d, k } => {
                let pi = (d - 24) / 2; let val = self.mem.reg_pair(pi);
                let res = val.wrapping_sub(k as u16);
                self.mem.set_reg_pair(pi, res);
                let rdh7 = (val >> 15) as u8; let r15 = (res >> 15) as u8;
                let v = rdh7 & (r15 ^ 1); let n = r15; let z = (res == 0) as u8;
                let c = r15 & (rdh7 ^ 1); let s = n ^ v;
                self.set_sreg((self.sreg() & 0b1110_0000) | (s << 4) | (v << 3) | (n << 2) | (z << 1) | c); 2
            }

            // -- Compare --
            Instruction::Cp { d, r } => {
                let rd = self.mem.reg(d); let rr = self.mem.reg(r);
                self.set_sreg(flags_sub(self.sreg(), rd, rr, rd.wrapping_sub(rr), false)); 1
            }
            Instruction::Cpc { d, r } => {
                let rd = self.mem.reg(d); let rr = self.mem.reg(r);
                let res = rd.wrapping_sub(rr).wrapping_sub(self.sreg() & 1);
                self.set_sreg(flags_sub(self.sreg(), rd, rr, res, true)); 1
            }
            Instruction::Cpi { d, k } => {
                let rd = self.mem.reg(d);
                self.set_sreg(flags_sub(self.sreg(), rd, k, rd.wrapping_sub(k), false)); 1
            }

            // -- Data transfer --
            Instruction::Mov { d, r } => { let v = self.mem.reg(r); self.mem.set_reg(d, v); 1 }
            Instruction::Movw { d, r } => {
                let lo = self.mem.reg(r); let hi = self.mem.reg(r + 1);
                self.mem.set_reg(d, lo); self.mem.set_reg(d + 1, hi); 1
            }
            Instruction::Ldi { d, k } => { self.mem.set_reg(d, k); 1 }
            Instruction::Lds { d, k } => { let v = self.read_data(k); self.mem.set_reg(d, v); 2 }
            Instruction::Sts { k, r } => { let v = self.mem.reg(r); self.write_data(k, v); 2 }

            Instruction::LdX { d } => { let a = self.mem.x(); self.load(d, a); 1 }
            Instruction::LdXInc { d } => {
                let a = self.mem.x(); self.load(d, a);
                self.mem.set_x(a.wrapping_add(1)); 2
            }
            Instruction::LdXDec { d } => {
                let a = self.mem.x().wrapping_sub(1);
                self.mem.set_x(a); self.load(d, a); 3
            }
            Instruction::LdY { d } => { let a = self.mem.y(); self.load(d, a); 1 }
            Instruction::LdYInc { d } => {
                let a = self.mem.y(); self.load(d, a);
                self.mem.set_y(a.wrapping_add(1)); 2
            }
            Instruction::LdYDec { d } => {
                let a = self.mem.y().wrapping_sub(1);
                self.mem.set_y(a); self.load(d, a); 3
            }
            Instruction::LdYQ { d, q } => { let a = self.mem.y().wrapping_add(q as u16); self.load(d, a); 3 }
            Instruction::LdZ { d } => { let a = self.mem.z(); self.load(d, a); 1 }
            Instruction::LdZInc { d } => {
                let a = self.mem.z(); self.load(d, a);
                self.mem.set_z(a.wrapping_add(1)); 2
            }
            Instruction::LdZDec { d } => {
                let a = self.mem.z().wrapping_sub(1);
                self.mem.set_z(a); self.load(d, a); 3
            }
            Instruction::LdZQ { d, q } => { let a = self.mem.z().wrapping_add(q as u16); self.load(d, a); 3 }

            Instruction::StX { r } => { let a = self.mem.x(); self.store(a, r); 1 }
            Instruction::StXInc { r } => {
                let a = self.mem.x(); self.store(a, r);
                self.mem.set_x(a.wrapping_add(1)); 1
            }
            Instruction::StXDec { r } => {
                let v = self.mem.reg(r);
                let a = self.mem.x().wrapping_sub(1);
                self.mem.set_x(a); self.write_data(a, v); 2
            }
            Instruction::StY { r } => { let a = self.mem.y(); self.store(a, r); 1 }
            Instruction::StYInc { r } => {
                let a = self.mem.y(); self.store(a, r);
                self.mem.set_y(a.wrapping_add(1)); 1
            }
            Instruction::StYDec { r } => {
                let v = self.mem.reg(r);
                let a = self.mem.y().wrapping_sub(1);
                self.mem.set_y(a); self.write_data(a, v); 2
            }
            Instruction::StYQ { r, q } => { let a = self.mem.y().wrapping_add(q as u16); self.store(a, r); 2 }
            Instruction::StZ { r } => { let a = self.mem.z(); self.store(a, r); 1 }
            Instruction::StZInc { r } => {
                let a = self.mem.z(); self.store(a, r);
                self.mem.set_z(a.wrapping_add(1)); 1
            }
            Instruction::StZDec { r } => {
                let v = self.mem.reg(r);
                let a = self.mem.z().wrapping_sub(1);
                self.mem.set_z(a); self.write_data(a, v); 2
            }
            Instruction::StZQ { r, q } => { let a = self.mem.z().wrapping_add(q as u16); self.store(a, r); 2 }

            // -- Read-modify-write on (Z) --
            Instruction::Xch { r } => {
                let z = self.mem.z() as usize;
                let v = self.mem.reg(r);
                self.mem.set_reg(r, self.mem.data[z]);
                self.mem.data[z] = v; 2
            }
            Instruction::Las { r } => {
                let z = self.mem.z();
                let value = self.read_data(z);
                self.write_data(z, value | self.mem.reg(r));
                self.mem.set_reg(r, value); 2
            }
            Instruction::Lac { r } => {
                let z = self.mem.z();
                let value = self.read_data(z);
                self.write_data(z, value & !self.mem.reg(r));
                self.mem.set_reg(r, value); 2
            }
            Instruction::Lat { r } => {
                let z = self.mem.z();
                let value = self.read_data(z);
                self.write_data(z, value ^ self.mem.reg(r));
                self.mem.set_reg(r, value); 2
            }

            // -- Stack --
            Instruction::Push { r } => {
                let v = self.mem.reg(r); let sp = self.sp();
                self.mem.data[sp as usize] = v;
                self.set_sp(sp.wrapping_sub(1)); 2
            }
            Instruction::Pop { d } => {
                let sp = self.sp().wrapping_add(1);
                self.set_sp(sp);
                let v = self.mem.data[sp as usize];
                self.mem.set_reg(d, v); 2
            }

            // -- Shift/Bit --
            Instruction::Lsr { d } => {
                let rd = self.mem.reg(d); let res = rd >> 1;
                self.mem.set_reg(d, res);
                self.set_sreg(flags_shift(self.sreg(), rd, res)); 1
            }
            Instruction::Asr { d } => {
                let rd = self.mem.reg(d); let res = ((rd as i8) >> 1) as u8;
                self.mem.set_reg(d, res);
                self.set_sreg(flags_shift(self.sreg(), rd, res)); 1
            }
            Instruction::Ror { d } => {
                let rd = self.mem.reg(d);
                let res = (rd >> 1) | ((self.sreg() & 1) << 7);
                self.mem.set_reg(d, res);
                self.set_sreg(flags_shift(self.sreg(), rd, res)); 1
            }
            Instruction::Swap { d } => {
                let rd = self.mem.reg(d);
                self.mem.set_reg(d, rd.rotate_left(4)); 1
            }
            Instruction::Bst { d, b } => {
                let v = (self.mem.reg(d) >> b) & 1 != 0;
                self.set_flag(SREG_T, v); 1
            }
            Instruction::Bld { d, b } => {
                let mut rd = self.mem.reg(d);
                if self.flag(SREG_T) { rd |= 1 << b; } else { rd &= !(1 << b); }
                self.mem.set_reg(d, rd); 1
            }
            Instruction::Sbi { a, b } => {
                let addr = a as u16;
                let v = self.read_data(addr) | (1 << b);
                self.write_data_masked(addr, v, 1 << b); 2
            }
            Instruction::Cbi { a, b } => {
                let addr = a as u16;
                let v = self.read_data(addr) & !(1 << b);
                self.write_data_masked(addr, v, 1 << b); 2
            }
            Instruction::Bset { s } => { self.set_flag(s, true); 1 }
            Instruction::Bclr { s } => { self.set_flag(s, false); 1 }

            // -- Branch --
            Instruction::Rjmp { k } => { self.pc = self.relative(k as i32); 2 }
            Instruction::Rcall { k } => {
                let ret = self.pc;
                self.push_pc(ret);
                self.pc = self.relative(k as i32); 3 + call_extra
            }
            Instruction::Ret => { self.pc = self.pop_pc(); 4 + call_extra }
            Instruction::Reti => {
                self.pc = self.pop_pc();
                self.set_flag(SREG_I, true); 4 + call_extra
            }
            Instruction::Jmp { k } => { self.pc = k; 3 }
            Instruction::Call { k } => {
                let ret = self.pc;
                self.push_pc(ret);
                self.pc = k; 4 + call_extra
            }
            Instruction::Ijmp => { self.pc = self.mem.z() as u32; 2 }
            Instruction::Eijmp => { self.pc = self.extended_z(EIND_ADDR); 2 }
            Instruction::Icall => {
                let ret = self.pc;
                self.push_pc(ret);
                self.pc = self.mem.z() as u32; 3 + call_extra
            }
            Instruction::Eicall => {
                let ret = self.pc;
                self.push_pc(ret);
                self.pc = self.extended_z(EIND_ADDR); 4
            }
            Instruction::Cpse { d, r } => {
                let cond = self.mem.reg(d) == self.mem.reg(r);
                self.skip_if(cond)
            }
            Instruction::Sbrc { r, b } => {
                let cond = self.mem.reg(r) & (1 << b) == 0;
                self.skip_if(cond)
            }
            Instruction::Sbrs { r, b } => {
                let cond = self.mem.reg(r) & (1 << b) != 0;
                self.skip_if(cond)
            }
            Instruction::Sbic { a, b } => {
                let cond = self.read_data(a as u16) & (1 << b) == 0;
                self.skip_if(cond)
            }
            Instruction::Sbis { a, b } => {
                let cond = self.read_data(a as u16) & (1 << b) != 0;
                self.skip_if(cond)
            }
            Instruction::Brbs { s, k } => {
                if self.flag(s) {
                    self.pc = self.relative(k as i32); return 2;
                } 1
            }
            Instruction::Brbc { s, k } => {
                if !self.flag(s) {
                    self.pc = self.relative(k as i32); return 2;
                } 1
            }

            // -- I/O --
            Instruction::In { d, a } => { let v = self.read_data(a as u16); self.mem.set_reg(d, v); 1 }
            Instruction::Out { a, r } => { let v = self.mem.reg(r); self.write_data(a as u16, v); 1 }

            // -- LPM --
            Instruction::Lpm0 => {
                let v = self.mem.prog_byte(self.mem.z() as usize);
                self.mem.set_reg(0, v); 3
            }
            Instruction::LpmD { d } => {
                let v = self.mem.prog_byte(self.mem.z() as usize);
                self.mem.set_reg(d, v); 3
            }
            Instruction::LpmDInc { d } => {
                let z = self.mem.z();
                let v = self.mem.prog_byte(z as usize);
                self.mem.set_reg(d, v); self.mem.set_z(z.wrapping_add(1)); 3
            }

            // -- ELPM (RAMPZ:Z) --
            Instruction::Elpm0 => {
                let v = self.mem.prog_byte(self.extended_z(RAMPZ_ADDR) as usize);
                self.mem.set_reg(0, v); 3
            }
            Instruction::ElpmD { d } => {
                let v = self.mem.prog_byte(self.extended_z(RAMPZ_ADDR) as usize);
                self.mem.set_reg(d, v); 3
            }
            Instruction::ElpmDInc { d } => {
                let addr = self.extended_z(RAMPZ_ADDR);
                let v = self.mem.prog_byte(addr as usize);
                self.mem.set_reg(d, v);
                let next = addr.wrapping_add(1);
                self.mem.set_z(next as u16);
                self.mem.data[RAMPZ_ADDR as usize] = (next >> 16) as u8; 3
            }

            // -- Misc --
            Instruction::Wdr => { self.watchdog_reset(); 1 }
            Instruction::Sleep | Instruction::Break | Instruction::Spm | Instruction::SpmZInc => 1,
            Instruction::Unknown(w) => {
                debug!(opcode = w, pc = self.pc.wrapping_sub(size as u32), "unknown opcode");
                1
            }
        }
    }

    #[inline(always)]
    fn load(&mut self, d: u8, addr: u16) {
        let v = self.read_data(addr);
        self.mem.set_reg(d, v);
    }

    #[inline(always)]
    fn store(&mut self, addr: u16, r: u8) {
        let v = self.mem.reg(r);
        self.write_data(addr, v);
    }

    /// R1:R0 = product; C from `carry`, Z from the stored result.
    fn store_product(&mut self, res: u16, carry: bool) {
        self.mem.set_reg(0, res as u8);
        self.mem.set_reg(1, (res >> 8) as u8);
        self.set_sreg(flags_mul(self.sreg(), carry, res));
    }

    /// `hi:Z` where `hi` is the extended-address register at `reg`.
    #[inline(always)]
    fn extended_z(&self, reg: u16) -> u32 {
        ((self.mem.data[reg as usize] as u32) << 16) | self.mem.z() as u32
    }

    #[inline(always)]
    fn relative(&self, k: i32) -> u32 {
        (self.pc as i32).wrapping_add(k) as u32
    }

    /// Skip the next instruction when `cond` holds; one or two words.
    fn skip_if(&mut self, cond: bool) -> u8 {
        if !cond {
            return 1;
        }
        let next = self.mem.prog_word(self.pc as usize);
        let words = if is_two_word(next) { 2 } else { 1 };
        self.pc = self.pc.wrapping_add(words);
        1 + words as u8
    }
}
