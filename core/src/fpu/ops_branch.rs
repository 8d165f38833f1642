//! Conditional instructions: FBcc, FDBcc, FScc, FTRAPcc

use anyhow::Result;

use super::ea::EaField;
use super::fault::Fault;
use super::instruction::OperandFormat;
use super::{Fpu, FpuState};
use crate::cpu::{BusCycle, CpuInterface, CpuSized};
use crate::types::{Address, Byte, Long, Word};

/// TRAPcc/FTRAPcc exception vector
pub const VECTOR_TRAPCC: u8 = 7;

/// FBcc: 32-bit displacement
const FBCC_LONG: Word = 1 << 6;

/// Evaluates a floating point condition predicate against the condition
/// codes. Returns the outcome and whether BSUN is to be raised, or None for
/// predicates outside the 32 defined ones.
pub fn fcc(cc: u8, neg: bool, zero: bool, nan: bool) -> Option<(bool, bool)> {
    Some(match cc {
        // IEEE Aware Tests (never set BSUN)
        0b000001 => (zero, false),                   // EQ: Equal
        0b001110 => (!zero, false),                  // NE: Not Equal
        0b000010 => (!nan && !zero && !neg, false),  // OGT: Ordered Greater Than
        0b001101 => (nan || zero || neg, false),     // ULE: Unordered or Less or Equal
        0b000011 => (zero || (!nan && !neg), false), // OGE: Ordered Greater Than or Equal
        0b001100 => (nan || (neg && !zero), false),  // ULT: Unordered or Less Than
        0b000100 => (neg && !nan && !zero, false),   // OLT: Ordered Less Than
        0b001011 => (nan || zero || !neg, false),    // UGE: Unordered or Greater or Equal
        0b000101 => (zero || (neg && !nan), false),  // OLE: Ordered Less Than or Equal
        0b001010 => (nan || (!neg && !zero), false), // UGT: Unordered or Greater Than
        0b000110 => (!nan && !zero, false),          // OGL: Ordered Greater or Less Than
        0b001001 => (nan || zero, false),            // UEQ: Unordered or Equal
        0b000111 => (!nan, false),                   // OR: Ordered
        0b001000 => (nan, false),                    // UN: Unordered

        // IEEE Nonaware Tests (set BSUN when unordered)
        0b010010 => (!nan && !zero && !neg, nan),  // GT: Greater Than
        0b011101 => (nan || zero || neg, nan),     // NGT: Not Greater Than
        0b010011 => (zero || (!nan && !neg), nan), // GE: Greater Than or Equal
        0b011100 => (nan || (neg && !zero), nan),  // NGE: Not (Greater Than or Equal)
        0b010100 => (neg && !nan && !zero, nan),   // LT: Less Than
        0b011011 => (nan || zero || !neg, nan),    // NLT: Not Less Than
        0b010101 => (zero || (neg && !nan), nan),  // LE: Less Than or Equal
        0b011010 => (nan || (!neg && !zero), nan), // NLE: Not (Less Than or Equal)
        0b010110 => (!nan && !zero, nan),          // GL: Greater or Less Than
        0b011001 => (nan || zero, nan),            // NGL: Not (Greater or Less Than)
        0b010111 => (!nan, nan),                   // GLE: Greater, Less or Equal
        0b011000 => (nan, nan),                    // NGLE: Not (Greater, Less or Equal)

        // Miscellaneous Tests
        0b000000 => (false, false), // F: False
        0b001111 => (true, false),  // T: True
        0b010000 => (false, nan),   // SF: Signaling False
        0b011111 => (true, nan),    // ST: Signaling True
        0b010001 => (zero, nan),    // SEQ: Signaling Equal
        0b011110 => (!zero, nan),   // SNE: Signaling Not Equal

        _ => return None,
    })
}

impl Fpu {
    /// Tests a predicate against the last result, raising BSUN as needed
    fn test_condition(&mut self, cc: u8) -> Option<bool> {
        let fpsr = self.regs.fpsr();
        let (test, bsun) = fcc(cc & 0b111111, fpsr.fpcc_n(), fpsr.fpcc_z(), fpsr.fpcc_nan())?;
        self.regs.fpsr.exs_mut().set_bsun(bsun);
        if bsun {
            self.regs.fpsr.aexc_mut().set_iop(true);
        }
        Some(test)
    }

    /// Gate shared by FDBcc, FScc and FTRAPcc
    fn guard_conditional<C: CpuInterface>(
        &mut self,
        cpu: &mut C,
        opcode: Word,
        ea: Address,
        oldpc: Address,
    ) -> Result<bool> {
        match self.check_no_fpu_conditional(cpu, oldpc) {
            Some((fault, pc)) => {
                self.raise(cpu, fault, opcode, ea, pc)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// FBcc. `oldpc` is the address following the opcode word, `extra` the
    /// displacement (16 or 32 bit, as encoded).
    pub fn op_fbcc<C: CpuInterface>(
        &mut self,
        cpu: &mut C,
        opcode: Word,
        oldpc: Address,
        extra: Long,
    ) -> Result<()> {
        self.exception = false;
        let pc = oldpc.wrapping_sub(2);
        let decision = self.check_no_fpu(cpu);
        if self.guard(cpu, decision, opcode, 0, pc)? {
            return Ok(());
        }

        self.regs.fpiar = pc;
        self.state = FpuState::Idle;
        match self.test_condition(opcode as u8) {
            None => self.raise(cpu, Fault::Disabled, opcode, 0, pc)?,
            Some(true) => {
                let disp = if opcode & FBCC_LONG == 0 {
                    (extra as Word).expand_sign_extend()
                } else {
                    extra
                };
                cpu.set_pc(oldpc.wrapping_add(disp));
            }
            Some(false) => (),
        }
        Ok(())
    }

    /// FDBcc. PC points past the command word.
    pub fn op_fdbcc<C: CpuInterface>(&mut self, cpu: &mut C, opcode: Word, extra: Word) -> Result<()> {
        self.exception = false;
        let pc = cpu.get_pc();
        let oldpc = pc.wrapping_sub(4);
        let decision = self.check_no_6888x();
        if self.guard(cpu, decision, opcode, 0, oldpc)? {
            return Ok(());
        }

        let disp = cpu.next_iword()?.expand_sign_extend();
        if self.guard_conditional(cpu, opcode, pc.wrapping_add(disp), oldpc)? {
            return Ok(());
        }

        self.regs.fpiar = oldpc;
        self.state = FpuState::Idle;
        match self.test_condition(extra as u8) {
            None => self.raise(cpu, Fault::Disabled, opcode, 0, oldpc)?,
            Some(false) => {
                let reg = usize::from(opcode & 7);
                let d = cpu.read_d(reg);
                let counter = (d as Word).wrapping_sub(1);
                cpu.write_d(reg, counter.replace_in(d));
                if counter != 0xFFFF {
                    cpu.set_pc(pc.wrapping_add(disp));
                }
            }
            Some(true) => (),
        }
        Ok(())
    }

    /// FScc. PC points past the command word.
    pub fn op_fscc<C: CpuInterface>(&mut self, cpu: &mut C, opcode: Word, extra: Word) -> Result<()> {
        self.exception = false;
        let pc = cpu.get_pc().wrapping_sub(4);
        if self.guard_conditional(cpu, opcode, 0, pc)? {
            return Ok(());
        }

        self.regs.fpiar = pc;
        self.state = FpuState::Idle;
        let Some(test) = self.test_condition(extra as u8) else {
            return self.raise(cpu, Fault::Disabled, opcode, 0, pc);
        };
        let value: Byte = if test { 0xFF } else { 0x00 };

        let ea = EaField::from(opcode);
        if ea.mode == EaField::MODE_DN {
            let decision = self.check_no_fpu(cpu);
            if self.guard(cpu, decision, opcode, 0, pc)? {
                return Ok(());
            }
            let d = cpu.read_d(ea.reg);
            cpu.write_d(ea.reg, value.replace_in(d));
            return Ok(());
        }

        // Data alterable modes only
        let alterable = ea.mode != EaField::MODE_AN
            && (ea.mode != EaField::MODE_EXT || ea.reg <= EaField::EXT_ABSL);
        if !alterable {
            return self.raise(cpu, Fault::NoInstruction, opcode, 0, pc);
        }
        let size = OperandFormat::Byte.size(ea.reg == 7);
        match Self::operand_location(cpu, ea, opcode, size)? {
            Some(ad) => cpu.write(BusCycle::Coprocessor, ad, value),
            None => self.raise(cpu, Fault::NoInstruction, opcode, 0, pc),
        }
    }

    /// FTRAPcc. `oldpc` is the address of the instruction; any immediate
    /// operand has been consumed by the caller.
    pub fn op_ftrapcc<C: CpuInterface>(
        &mut self,
        cpu: &mut C,
        opcode: Word,
        oldpc: Address,
        extra: Word,
    ) -> Result<()> {
        self.exception = false;
        if self.guard_conditional(cpu, opcode, 0, oldpc)? {
            return Ok(());
        }

        self.regs.fpiar = oldpc;
        self.state = FpuState::Idle;
        match self.test_condition(extra as u8) {
            None => self.raise(cpu, Fault::Disabled, opcode, 0, oldpc),
            Some(true) => cpu.exception(VECTOR_TRAPCC),
            Some(false) => Ok(()),
        }
    }
}
