//! General (arithmetic) instructions, cpGEN

use anyhow::Result;
use log::*;

use super::constants::rom_constant;
use super::ea::Resolved;
use super::fault::Fault;
use super::instruction::{ArithOp, FpuExtWord, OpClass, Precision};
use super::math::FloatMath;
use super::regs::{FpuExceptions, RegisterFPSR};
use super::storage::round_single;
use super::Fpu;
use crate::cpu::CpuInterface;
use crate::types::{Address, Word};

/// FPCR rounding precision field
const PREC_SINGLE: u8 = 0b01;

/// FMOD/FREM report the low 7 bits of the quotient
const QUOTIENT_MASK: f64 = 128.0;

impl Fpu {
    /// Executes a general FPU instruction. `extra` is the command word; PC
    /// points past it.
    pub fn op_arithmetic<C: CpuInterface>(
        &mut self,
        cpu: &mut C,
        opcode: Word,
        extra: Word,
    ) -> Result<()> {
        self.begin_arithmetic();
        let result = self.dispatch_general(cpu, opcode, FpuExtWord(extra));
        self.end_arithmetic();
        result
    }

    fn dispatch_general<C: CpuInterface>(
        &mut self,
        cpu: &mut C,
        opcode: Word,
        ext: FpuExtWord,
    ) -> Result<()> {
        let pc = cpu.get_pc().wrapping_sub(4);
        trace!("FPU {:04X} {:04X} at {:08X}", opcode, ext.0, pc);

        let decision = self.check_no_6888x();
        if self.guard(cpu, decision, opcode, 0, pc)? {
            return Ok(());
        }

        match OpClass::from(ext) {
            OpClass::RegToReg | OpClass::EaToReg => self.op_general(cpu, opcode, ext, pc),
            OpClass::RegToEa => {
                let value = self.regs.fp[ext.dst_reg()];
                if self.write_operand(cpu, value, opcode, ext, pc)? == Resolved::Unsupported {
                    self.raise(cpu, Fault::NoInstruction, opcode, 0, pc)?;
                }
                Ok(())
            }
            OpClass::EaToControl | OpClass::ControlToEa => {
                self.op_fmove_control(cpu, opcode, ext, pc)
            }
            OpClass::EaToRegs | OpClass::RegsToEa => self.op_fmovem(cpu, opcode, ext, pc),
            OpClass::Reserved => self.raise(cpu, Fault::NoInstruction, opcode, 0, pc),
        }
    }

    /// Register/memory to register operations, including FMOVECR
    fn op_general<C: CpuInterface>(
        &mut self,
        cpu: &mut C,
        opcode: Word,
        ext: FpuExtWord,
        pc: Address,
    ) -> Result<()> {
        self.regs.fpiar = pc;
        let reg = ext.dst_reg();

        if ext.is_fmovecr() {
            let decision = self.check_no_fpu(cpu);
            if self.guard(cpu, decision, opcode, 0, pc)? {
                return Ok(());
            }
            let Some(value) = rom_constant(ext.rom_offset()) else {
                return self.raise(cpu, Fault::NoInstruction, opcode, 0, pc);
            };
            self.regs.fp[reg] = value;
            self.set_result(value);
            return Ok(());
        }

        // The 6888x has no unimplemented instruction exception, check first
        let decision = self.check_unimplemented_6888x(ext);
        if self.guard(cpu, decision, opcode, 0, pc)? {
            return Ok(());
        }

        let Some((op, precision)) = ArithOp::decode(ext.opmode()) else {
            return self.raise(cpu, Fault::NoInstruction, opcode, 0, pc);
        };

        let src = match self.read_operand(cpu, opcode, ext, pc)? {
            Resolved::Value(v) => v,
            Resolved::Faulted => return Ok(()),
            Resolved::Unsupported => {
                return self.raise(cpu, Fault::NoInstruction, opcode, 0, pc);
            }
        };

        // Memory operands were checked while resolving
        let decision = self.check_unimplemented_680x0(cpu, ext);
        if self.guard(cpu, decision, opcode, 0, pc)? {
            return Ok(());
        }

        self.regs.fpiar = pc;
        let dst = self.regs.fp[reg];

        if op.is_compare() {
            self.regs.fpsr = RegisterFPSR(0);
            let basis = match op {
                ArithOp::Ftst => src,
                // Equal infinities compare equal
                _ if dst == src => 0.0,
                _ => dst - src,
            };
            self.set_result(basis);
            return Ok(());
        }

        let value = self.compute(op, src, dst);
        let value = self.check_result(op, src, dst, value);
        let value = self.apply_precision(op, precision, value);
        if op == ArithOp::Fsincos {
            let cos = self.check_result(op, src, dst, src.cos());
            self.regs.fp[ext.sincos_cos_reg()] = cos;
        }
        self.regs.fp[reg] = value;
        self.set_result(value);
        Ok(())
    }

    /// Rounds the result of an operation to the precision in effect
    fn apply_precision(&self, op: ArithOp, precision: Precision, value: f64) -> f64 {
        let single = match precision {
            Precision::Single => true,
            Precision::Double => false,
            Precision::Default => {
                matches!(op, ArithOp::Fsgldiv | ArithOp::Fsglmul)
                    || (op.uses_rounding_precision() && self.regs.fpcr.prec() == PREC_SINGLE)
            }
        };
        if single {
            round_single(value, self.rounding_mode())
        } else {
            value
        }
    }

    /// Records the quotient byte of FMOD/FREM
    fn set_quotient(&mut self, quotient: f64) {
        let q = if quotient.is_finite() {
            (quotient.abs() % QUOTIENT_MASK) as u8
        } else {
            0
        };
        self.regs.fpsr = self
            .regs
            .fpsr
            .with_quotient(q)
            .with_quotient_s(quotient.is_sign_negative());
    }

    fn compute(&mut self, op: ArithOp, src: f64, dst: f64) -> f64 {
        use ArithOp::*;

        match op {
            Fmove => src,
            Fint => src.round_with(self.rounding_mode()),
            Fintrz => src.trunc(),
            Fsinh => src.sinh(),
            Fsqrt => src.sqrt(),
            Flognp1 => src.ln_1p(),
            Fetoxm1 => src.exp_m1(),
            Ftanh => src.tanh(),
            Fatan => src.atan(),
            Fasin => src.asin(),
            Fatanh => src.atanh(),
            Fsin | Fsincos => src.sin(),
            Ftan => src.tan(),
            Fetox => src.exp(),
            Ftwotox => src.exp2(),
            Ftentox => 10f64.powf(src),
            Flogn => src.ln(),
            Flog10 => src.log10(),
            Flog2 => src.log2(),
            Fabs => src.abs(),
            Fcosh => src.cosh(),
            Fneg => -src,
            Facos => src.acos(),
            Fcos => src.cos(),
            Fgetexp => {
                if src == 0.0 || src.is_nan() {
                    src
                } else if src.is_infinite() {
                    f64::NAN
                } else {
                    f64::from(src.frexp().1 - 1)
                }
            }
            Fgetman => {
                if src == 0.0 || src.is_nan() {
                    src
                } else if src.is_infinite() {
                    f64::NAN
                } else {
                    src.frexp().0 * 2.0
                }
            }
            Fdiv | Fsgldiv => dst / src,
            Fmod => {
                let (r, q) = dst.fmod_quotient(src);
                self.set_quotient(q);
                r
            }
            Frem => {
                let (r, q) = dst.frem_quotient(src);
                self.set_quotient(q);
                r
            }
            Fadd => dst + src,
            Fmul | Fsglmul => dst * src,
            Fsub => dst - src,
            Fscale => {
                if src.is_nan() {
                    src
                } else if src == 0.0 {
                    dst
                } else {
                    // Saturates, ldexp clamps far beyond the double range
                    dst.ldexp(src.trunc() as i32)
                }
            }
            Fcmp | Ftst => src,
        }
    }

    /// Signals IEEE exceptions for a computed result
    fn check_result(&mut self, op: ArithOp, src: f64, dst: f64, value: f64) -> f64 {
        use ArithOp::*;

        let dyadic = matches!(
            op,
            Fdiv | Fsgldiv | Fmod | Frem | Fadd | Fmul | Fsglmul | Fsub | Fscale
        );
        let nan_in = src.is_nan() || (dyadic && dst.is_nan());
        let finite_in = src.is_finite() && (!dyadic || dst.is_finite());

        let divide_by_zero = match op {
            Fdiv | Fsgldiv => src == 0.0 && dst != 0.0 && dst.is_finite(),
            Flogn | Flog10 | Flog2 => src == 0.0,
            Flognp1 => src == -1.0,
            Fatanh => src.abs() == 1.0,
            _ => false,
        };

        let mut exc = FpuExceptions::default();
        if divide_by_zero {
            exc.set_dz(true);
        } else if value.is_nan() && !nan_in {
            exc.set_operr(true);
        } else if value.is_infinite() && finite_in {
            exc.set_ovfl(true);
            exc.set_inex2(true);
        }
        if exc.0 != 0 {
            debug!("{} {} {} -> {} exc {:02X}", op, dst, src, value, exc.0);
            self.signal(exc);
        }
        value
    }
}
