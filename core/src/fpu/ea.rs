//! Effective address handling for FPU operands

use anyhow::Result;
use arrayvec::ArrayVec;

use super::instruction::{FpuExtWord, OperandFormat};
use super::math::FloatMath;
use super::regs::FpuExceptions;
use super::storage::{
    double_to_f64, f64_to_double, f64_to_packed, f64_to_single, single_to_f64, BitsExtReal,
    BitsPackedReal,
};
use super::Fpu;
use crate::cpu::{BusCycle, CpuInterface, CpuSized};
use crate::types::{Address, Byte, Long, Word};

/// Outcome of resolving an operand
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolved<T> {
    Value(T),
    /// A fault was delivered, the instruction is finished
    Faulted,
    /// Addressing mode/format combination the FPU does not accept
    Unsupported,
}

/// Addressing mode and register fields of an opcode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) struct EaField {
    pub mode: u8,
    pub reg: usize,
}

impl From<Word> for EaField {
    fn from(opcode: Word) -> Self {
        Self {
            mode: ((opcode >> 3) & 7) as u8,
            reg: usize::from(opcode & 7),
        }
    }
}

impl EaField {
    pub const MODE_DN: u8 = 0;
    pub const MODE_AN: u8 = 1;
    pub const MODE_IND: u8 = 2;
    pub const MODE_POSTINC: u8 = 3;
    pub const MODE_PREDEC: u8 = 4;
    pub const MODE_DISP16: u8 = 5;
    pub const MODE_INDEX: u8 = 6;
    pub const MODE_EXT: u8 = 7;

    pub const EXT_ABSW: usize = 0;
    pub const EXT_ABSL: usize = 1;
    pub const EXT_PCDISP16: usize = 2;
    pub const EXT_PCINDEX: usize = 3;
    pub const EXT_IMM: usize = 4;

    pub fn is_immediate(&self) -> bool {
        self.mode == Self::MODE_EXT && self.reg == Self::EXT_IMM
    }
}

/// Where the long words of a memory operand come from
enum Source {
    Immediate(ArrayVec<Long, 3>),
    Memory(Address),
}

impl Source {
    fn long<C: CpuInterface>(&self, cpu: &mut C, i: usize) -> Result<Long> {
        match self {
            Self::Immediate(exts) => Ok(exts[i]),
            Self::Memory(addr) => cpu.read(BusCycle::Coprocessor, addr.wrapping_add(4 * i as Address)),
        }
    }

    fn sized<C: CpuInterface, T: CpuSized>(&self, cpu: &mut C) -> Result<T> {
        match self {
            Self::Immediate(exts) => Ok(T::chop(exts[0])),
            Self::Memory(addr) => cpu.read(BusCycle::Coprocessor, *addr),
        }
    }
}

/// Address register step for (An)+ and -(An). Bytes keep A7 word aligned.
fn step(format: OperandFormat, reg: usize) -> Address {
    format.size(reg == 7)
}

impl Fpu {
    /// Effective address of a memory operand, without side effects on the
    /// address registers. None for register direct and immediate modes.
    pub(super) fn operand_address<C: CpuInterface>(
        cpu: &mut C,
        opcode: Word,
    ) -> Result<Option<Address>> {
        let ea = EaField::from(opcode);
        let addr = match ea.mode {
            EaField::MODE_DN | EaField::MODE_AN => return Ok(None),
            EaField::MODE_IND | EaField::MODE_POSTINC | EaField::MODE_PREDEC => cpu.read_a(ea.reg),
            EaField::MODE_DISP16 => {
                let disp = cpu.next_iword()?.expand_sign_extend();
                cpu.read_a(ea.reg).wrapping_add(disp)
            }
            EaField::MODE_INDEX => {
                let base = cpu.read_a(ea.reg);
                cpu.disp_ea_020(base)?
            }
            _ => match ea.reg {
                EaField::EXT_ABSW => cpu.next_iword()?.expand_sign_extend(),
                EaField::EXT_ABSL => cpu.next_ilong()?,
                EaField::EXT_PCDISP16 => {
                    let pc = cpu.get_pc();
                    pc.wrapping_add(cpu.next_iword()?.expand_sign_extend())
                }
                EaField::EXT_PCINDEX => {
                    let pc = cpu.get_pc();
                    cpu.disp_ea_020(pc)?
                }
                _ => return Ok(None),
            },
        };
        Ok(Some(addr))
    }

    /// Memory address of an operand, applying the (An)+ / -(An) register
    /// update for an operand of `size` bytes.
    pub(super) fn operand_location<C: CpuInterface>(
        cpu: &mut C,
        ea: EaField,
        opcode: Word,
        size: Address,
    ) -> Result<Option<Address>> {
        match ea.mode {
            EaField::MODE_POSTINC => {
                let addr = cpu.read_a(ea.reg);
                cpu.write_a(ea.reg, addr.wrapping_add(size));
                Ok(Some(addr))
            }
            EaField::MODE_PREDEC => {
                let addr = cpu.read_a(ea.reg).wrapping_sub(size);
                cpu.write_a(ea.reg, addr);
                Ok(Some(addr))
            }
            _ => Self::operand_address(cpu, opcode),
        }
    }

    /// Reads the source operand of a general arithmetic instruction
    pub(super) fn read_operand<C: CpuInterface>(
        &mut self,
        cpu: &mut C,
        opcode: Word,
        ext: FpuExtWord,
        oldpc: Address,
    ) -> Result<Resolved<f64>> {
        if !ext.rm() {
            let decision = self.check_no_fpu(cpu);
            if self.guard(cpu, decision, opcode, 0, oldpc)? {
                return Ok(Resolved::Faulted);
            }
            return Ok(Resolved::Value(self.regs.fp[ext.src_reg()]));
        }

        let ea = EaField::from(opcode);
        let format = ext.format();
        match ea.mode {
            EaField::MODE_DN => {
                let d = cpu.read_d(ea.reg);
                return Ok(match format {
                    OperandFormat::Long => Resolved::Value(f64::from(d as i32)),
                    OperandFormat::Single => Resolved::Value(single_to_f64(d)),
                    OperandFormat::Word => Resolved::Value(f64::from(d as Word as i16)),
                    OperandFormat::Byte => Resolved::Value(f64::from(d as Byte as i8)),
                    _ => Resolved::Unsupported,
                });
            }
            EaField::MODE_AN => return Ok(Resolved::Unsupported),
            _ => (),
        }

        let (source, ad) = if ea.is_immediate() {
            let mut exts = ArrayVec::<Long, 3>::new();
            match format {
                OperandFormat::Long | OperandFormat::Single => exts.push(cpu.next_ilong()?),
                OperandFormat::Extended | OperandFormat::Packed => {
                    for _ in 0..3 {
                        exts.push(cpu.next_ilong()?);
                    }
                }
                OperandFormat::Word | OperandFormat::Byte => {
                    exts.push(cpu.next_iword()?.expand());
                }
                OperandFormat::Double => {
                    exts.push(cpu.next_ilong()?);
                    exts.push(cpu.next_ilong()?);
                }
                OperandFormat::PackedDynamic => return Ok(Resolved::Unsupported),
            }
            (Source::Immediate(exts), 0)
        } else {
            match Self::operand_location(cpu, ea, opcode, step(format, ea.reg))? {
                Some(ad) => (Source::Memory(ad), ad),
                None => return Ok(Resolved::Unsupported),
            }
        };

        let decision = self.check_unimplemented_680x0(cpu, ext);
        if self.guard(cpu, decision, opcode, ad, oldpc)? {
            return Ok(Resolved::Faulted);
        }

        let value = match format {
            OperandFormat::Long => f64::from(source.long(cpu, 0)? as i32),
            OperandFormat::Single => single_to_f64(source.long(cpu, 0)?),
            OperandFormat::Extended | OperandFormat::Packed => {
                let decision = self.check_datatype(ext);
                if self.guard(cpu, decision, opcode, ad, oldpc)? {
                    return Ok(Resolved::Faulted);
                }
                let high = source.long(cpu, 0)?;
                let mid = source.long(cpu, 1)?;
                let low = source.long(cpu, 2)?;
                if format == OperandFormat::Extended {
                    BitsExtReal::from_longs(high, mid, low).into()
                } else {
                    BitsPackedReal::from_longs(high, mid, low).into()
                }
            }
            OperandFormat::Word => f64::from(source.sized::<_, Word>(cpu)? as i16),
            OperandFormat::Double => {
                let hi = source.long(cpu, 0)?;
                let lo = source.long(cpu, 1)?;
                double_to_f64(hi, lo)
            }
            OperandFormat::Byte => f64::from(source.sized::<_, Byte>(cpu)? as i8),
            OperandFormat::PackedDynamic => return Ok(Resolved::Unsupported),
        };
        Ok(Resolved::Value(value))
    }

    /// Writes the destination operand of FMOVE to <ea>
    pub(super) fn write_operand<C: CpuInterface>(
        &mut self,
        cpu: &mut C,
        value: f64,
        opcode: Word,
        ext: FpuExtWord,
        oldpc: Address,
    ) -> Result<Resolved<()>> {
        if !ext.rm() {
            let decision = self.check_no_fpu(cpu);
            if self.guard(cpu, decision, opcode, 0, oldpc)? {
                return Ok(Resolved::Faulted);
            }
            self.regs.fp[ext.src_reg()] = value;
            return Ok(Resolved::Value(()));
        }

        let ea = EaField::from(opcode);
        let format = ext.format();
        match ea.mode {
            EaField::MODE_DN => {
                let d = cpu.read_d(ea.reg);
                let v = match format {
                    OperandFormat::Byte => (self.store_int(value, format) as Byte).replace_in(d),
                    OperandFormat::Word => (self.store_int(value, format) as Word).replace_in(d),
                    OperandFormat::Long => self.store_int(value, format) as Long,
                    OperandFormat::Single => f64_to_single(value),
                    _ => return Ok(Resolved::Unsupported),
                };
                cpu.write_d(ea.reg, v);
                return Ok(Resolved::Value(()));
            }
            EaField::MODE_AN => return Ok(Resolved::Unsupported),
            _ if ea.is_immediate() => return Ok(Resolved::Unsupported),
            _ => (),
        }

        let Some(ad) = Self::operand_location(cpu, ea, opcode, step(format, ea.reg))? else {
            return Ok(Resolved::Unsupported);
        };

        let decision = self.check_no_fpu(cpu);
        if self.guard(cpu, decision, opcode, ad, oldpc)? {
            return Ok(Resolved::Faulted);
        }

        match format {
            OperandFormat::Long => {
                let v = self.store_int(value, format) as Long;
                cpu.write(BusCycle::Coprocessor, ad, v)?;
            }
            OperandFormat::Single => {
                cpu.write(BusCycle::Coprocessor, ad, f64_to_single(value))?;
            }
            OperandFormat::Extended | OperandFormat::Packed | OperandFormat::PackedDynamic => {
                let decision = self.check_datatype(ext);
                if self.guard(cpu, decision, opcode, ad, oldpc)? {
                    return Ok(Resolved::Faulted);
                }
                let words = match format {
                    OperandFormat::Extended => BitsExtReal::from(value).longs(),
                    OperandFormat::Packed => f64_to_packed(value, ext.static_kfactor()).longs(),
                    _ => {
                        let k = cpu.read_d(ext.kfactor_reg()) as i8;
                        // 7-bit two's complement
                        f64_to_packed(value, (k << 1) >> 1).longs()
                    }
                };
                for (i, w) in words.into_iter().enumerate() {
                    cpu.write(BusCycle::Coprocessor, ad.wrapping_add(4 * i as Address), w)?;
                }
            }
            OperandFormat::Word => {
                let v = self.store_int(value, format) as Word;
                cpu.write(BusCycle::Coprocessor, ad, v)?;
            }
            OperandFormat::Double => {
                let [hi, lo] = f64_to_double(value);
                cpu.write(BusCycle::Coprocessor, ad, hi)?;
                cpu.write(BusCycle::Coprocessor, ad.wrapping_add(4), lo)?;
            }
            OperandFormat::Byte => {
                let v = self.store_int(value, format) as Byte;
                cpu.write(BusCycle::Coprocessor, ad, v)?;
            }
        }
        Ok(Resolved::Value(()))
    }

    /// Converts to an integer format, rounding per FPCR. Out of range values
    /// and NaN saturate and signal an operand error.
    pub(super) fn store_int(&mut self, value: f64, format: OperandFormat) -> i64 {
        let (min, max) = match format {
            OperandFormat::Byte => (i64::from(i8::MIN), i64::from(i8::MAX)),
            OperandFormat::Word => (i64::from(i16::MIN), i64::from(i16::MAX)),
            _ => (i64::from(i32::MIN), i64::from(i32::MAX)),
        };
        if value.is_nan() {
            self.signal(FpuExceptions::default().with_operr(true));
            return min;
        }
        let r = value.round_with(self.rounding_mode());
        if r < min as f64 {
            self.signal(FpuExceptions::default().with_operr(true));
            min
        } else if r > max as f64 {
            self.signal(FpuExceptions::default().with_operr(true));
            max
        } else {
            r as i64
        }
    }
}
