//! Control register moves and multi-register moves (FMOVE(M))

use anyhow::Result;
use arrayvec::ArrayVec;
use log::*;

use super::ea::EaField;
use super::fault::Fault;
use super::instruction::{FmoveControlReg, FmovemMode, FpuExtWord};
use super::regs::RegisterFPCR;
use super::storage::{BitsExtReal, EXTENDED_SIZE};
use super::Fpu;
use crate::cpu::{BusCycle, CpuInterface};
use crate::types::{Address, Long, Word};

/// FPCR reads back the low word only
const FPCR_MASK: Long = 0xFFFF;

impl Fpu {
    fn control_reg(&self, reg: FmoveControlReg) -> Long {
        match reg {
            FmoveControlReg::FPCR => self.regs.fpcr.0 & FPCR_MASK,
            FmoveControlReg::FPSR => self.get_fpsr(),
            FmoveControlReg::FPIAR => self.regs.fpiar,
        }
    }

    fn set_control_reg(&mut self, reg: FmoveControlReg, value: Long) {
        match reg {
            FmoveControlReg::FPCR => self.regs.fpcr = RegisterFPCR(value),
            FmoveControlReg::FPSR => self.set_fpsr(value),
            FmoveControlReg::FPIAR => self.regs.fpiar = value,
        }
    }

    /// FMOVE(M) to/from FPCR, FPSR and FPIAR
    pub(super) fn op_fmove_control<C: CpuInterface>(
        &mut self,
        cpu: &mut C,
        opcode: Word,
        ext: FpuExtWord,
        pc: Address,
    ) -> Result<()> {
        let ea = EaField::from(opcode);
        let to_ea = ext.movem_dir();
        let list = ext.ctrl_regs();

        if matches!(ea.mode, EaField::MODE_DN | EaField::MODE_AN) || ea.is_immediate() {
            let decision = self.check_no_fpu(cpu);
            if self.guard(cpu, decision, opcode, 0, pc)? {
                return Ok(());
            }
            for reg in FmoveControlReg::selected(list) {
                match ea.mode {
                    EaField::MODE_DN if to_ea => cpu.write_d(ea.reg, self.control_reg(reg)),
                    EaField::MODE_DN => self.set_control_reg(reg, cpu.read_d(ea.reg)),
                    EaField::MODE_AN if to_ea => cpu.write_a(ea.reg, self.control_reg(reg)),
                    EaField::MODE_AN => self.set_control_reg(reg, cpu.read_a(ea.reg)),
                    // Immediate is a source only
                    _ if to_ea => (),
                    _ => {
                        let value = cpu.next_ilong()?;
                        self.set_control_reg(reg, value);
                    }
                }
            }
            return Ok(());
        }

        let Some(ad) = Self::operand_address(cpu, opcode)? else {
            return self.raise(cpu, Fault::NoInstruction, opcode, 0, pc);
        };
        let decision = self.check_no_fpu(cpu);
        if self.guard(cpu, decision, opcode, ad, pc)? {
            return Ok(());
        }

        let count = FmoveControlReg::selected(list).count() as Address;
        let incr = if ea.mode == EaField::MODE_PREDEC {
            count * 4
        } else {
            0
        };
        let start = ad.wrapping_sub(incr);
        let mut addr = start;
        for reg in FmoveControlReg::selected(list) {
            if to_ea {
                cpu.write(BusCycle::Coprocessor, addr, self.control_reg(reg))?;
            } else {
                let value = cpu.read(BusCycle::Coprocessor, addr)?;
                self.set_control_reg(reg, value);
            }
            addr = addr.wrapping_add(4);
        }

        match ea.mode {
            EaField::MODE_POSTINC => cpu.write_a(ea.reg, addr),
            EaField::MODE_PREDEC => cpu.write_a(ea.reg, start),
            _ => (),
        }
        Ok(())
    }

    /// FMOVEM of floating point data registers
    pub(super) fn op_fmovem<C: CpuInterface>(
        &mut self,
        cpu: &mut C,
        opcode: Word,
        ext: FpuExtWord,
        pc: Address,
    ) -> Result<()> {
        let ea = EaField::from(opcode);
        let Some(ad) = Self::operand_address(cpu, opcode)? else {
            return self.raise(cpu, Fault::NoInstruction, opcode, 0, pc);
        };
        let decision = self.check_no_fpu(cpu);
        if self.guard(cpu, decision, opcode, ad, pc)? {
            return Ok(());
        }

        let mode = FmovemMode::from(ext);
        let list = if mode.dynamic() {
            cpu.read_d(ext.movem_dyn_reg()) as u8
        } else {
            ext.movem_reglist()
        };
        let predec = mode.predecrement();

        // Predecrement lists are reversed: bit 0 is FP0
        let regs: ArrayVec<usize, 8> = if predec {
            (0..8).rev().filter(|r| list & (1 << r) != 0).collect()
        } else {
            (0..8).filter(|r| list & (0x80 >> r) != 0).collect()
        };

        let mmu = self.config.mmu030;
        let ad = if mmu && self.cursor.begin(pc, ad) {
            self.cursor.base()
        } else {
            ad
        };

        if ext.movem_dir() {
            self.fmovem_to_memory(cpu, ad, &regs, predec)?;
        } else {
            self.fmovem_to_registers(cpu, ad, &regs, predec)?;
        }
        if mmu {
            self.cursor.finish();
        }

        let size = EXTENDED_SIZE * regs.len() as Address;
        match ea.mode {
            EaField::MODE_POSTINC => cpu.write_a(ea.reg, ad.wrapping_add(size)),
            EaField::MODE_PREDEC => cpu.write_a(ea.reg, ad.wrapping_sub(size)),
            _ => (),
        }
        Ok(())
    }

    /// Address of the long word `mem` (memory order) of the `k`th register
    /// transferred. Predecrement transfers walk memory downwards.
    fn fmovem_word_addr(ad: Address, k: usize, mem: usize, predec: bool) -> Address {
        let k = k as Address;
        let block = if predec {
            ad.wrapping_sub(EXTENDED_SIZE * (k + 1))
        } else {
            ad.wrapping_add(EXTENDED_SIZE * k)
        };
        block.wrapping_add(4 * mem as Address)
    }

    /// Memory order index of transfer word `i`. Predecrement stores the
    /// mantissa low word first.
    fn fmovem_word_index(i: usize, predec: bool) -> usize {
        if predec { 2 - i } else { i }
    }

    fn fmovem_to_memory<C: CpuInterface>(
        &mut self,
        cpu: &mut C,
        ad: Address,
        regs: &[usize],
        predec: bool,
    ) -> Result<()> {
        let mmu = self.config.mmu030;
        for (k, &reg) in regs.iter().enumerate() {
            let longs = BitsExtReal::from(self.regs.fp[reg]).longs();
            for i in 0..3 {
                let mem = Self::fmovem_word_index(i, predec);
                let addr = Self::fmovem_word_addr(ad, k, mem, predec);
                if !mmu {
                    cpu.write(BusCycle::Data, addr, longs[mem])?;
                    continue;
                }
                if !self.cursor.pending(k * 3 + i) {
                    continue;
                }
                if self.cursor.stage_write(longs[mem]) {
                    cpu.write(BusCycle::Data, addr, longs[mem])?;
                }
                self.cursor.advance();
            }
        }
        Ok(())
    }

    fn fmovem_to_registers<C: CpuInterface>(
        &mut self,
        cpu: &mut C,
        ad: Address,
        regs: &[usize],
        predec: bool,
    ) -> Result<()> {
        let mmu = self.config.mmu030;
        for (k, &reg) in regs.iter().enumerate() {
            let mut longs: [Long; 3] = [0; 3];
            let mut complete = false;
            for i in 0..3 {
                let mem = Self::fmovem_word_index(i, predec);
                let addr = Self::fmovem_word_addr(ad, k, mem, predec);
                if !mmu {
                    longs[mem] = cpu.read(BusCycle::Data, addr)?;
                    complete = i == 2;
                    continue;
                }
                if !self.cursor.pending(k * 3 + i) {
                    // Loaded before the restart
                    if i < 2 {
                        longs[mem] = self.cursor.partial(i);
                    }
                    continue;
                }
                let value = match self.cursor.take_read() {
                    Some(v) => v,
                    None => cpu.read(BusCycle::Data, addr)?,
                };
                if i < 2 {
                    self.cursor.set_partial(i, value);
                }
                self.cursor.advance();
                longs[mem] = value;
                complete = i == 2;
            }
            if complete {
                self.regs.fp[reg] = BitsExtReal::from_longs(longs[0], longs[1], longs[2]).into();
                trace!("FMOVEM FP{} <- {}", reg, self.regs.fp[reg]);
            }
        }
        Ok(())
    }
}
