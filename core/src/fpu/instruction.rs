use proc_bitfield::bitfield;

use super::config::CpuModel;
use crate::types::Word;

bitfield! {
    /// FPU command (extension) word
    #[derive(Clone, Copy, PartialEq, Eq, Default)]
    pub struct FpuExtWord(pub Word): Debug, FromStorage, IntoStorage, DerefStorage {
        /// Operation class
        pub class: u8 @ 13..=15,

        /// R/M: source is an effective address
        pub rm: bool @ 14,

        /// (Control register) Register select
        pub ctrl_regs: u8 @ 10..=12,

        /// (Arithmetic) Source register or operand format
        pub src_spec: u8 @ 10..=12,

        /// (Arithmetic) Source FP register
        pub src_reg: usize @ 10..=12,

        /// (Arithmetic) Destination FP register
        pub dst_reg: usize @ 7..=9,

        /// (Arithmetic) Opmode
        pub opmode: u8 @ 0..=6,

        /// (FMOVECR) ROM offset
        pub rom_offset: u8 @ 0..=6,

        /// (FSINCOS) Cosine destination register
        pub sincos_cos_reg: usize @ 0..=2,

        /// (FMOVE.P) Static k-factor, 7-bit two's complement
        pub kfactor: u8 @ 0..=6,

        /// (FMOVE.P) Data register holding the dynamic k-factor
        pub kfactor_reg: usize @ 4..=6,

        /// (FMOVEM) Direction: 0=EA to register, 1=register to EA
        pub movem_dir: bool @ 13,

        /// (FMOVEM) Register list mask
        pub movem_reglist: u8 @ 0..=7,

        /// (FMOVEM) Data register holding a dynamic register list
        pub movem_dyn_reg: usize @ 4..=6,

        /// (FMOVEM) Mode field
        pub movem_mode: u8 @ 11..=12,
    }
}

impl FpuExtWord {
    /// Constant ROM load (FMOVECR)
    pub fn is_fmovecr(&self) -> bool {
        (self.0 & 0xFC00) == 0x5C00
    }

    /// Static k-factor, sign extended
    pub fn static_kfactor(&self) -> i8 {
        ((self.kfactor() << 1) as i8) >> 1
    }

    pub fn format(&self) -> OperandFormat {
        OperandFormat::from_spec(self.src_spec())
    }
}

/// Operation class (command word bits 13-15)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpClass {
    /// FPm to FPn
    RegToReg,
    /// <ea> to FPn, including FMOVECR
    EaToReg,
    /// FMOVE FPm to <ea>
    RegToEa,
    /// FMOVE(M) <ea> to FPCR/FPSR/FPIAR
    EaToControl,
    /// FMOVE(M) FPCR/FPSR/FPIAR to <ea>
    ControlToEa,
    /// FMOVEM <ea> to FP registers
    EaToRegs,
    /// FMOVEM FP registers to <ea>
    RegsToEa,
    /// Class 1 does not exist
    Reserved,
}

impl From<FpuExtWord> for OpClass {
    fn from(value: FpuExtWord) -> Self {
        match value.class() {
            0b000 => Self::RegToReg,
            0b010 => Self::EaToReg,
            0b011 => Self::RegToEa,
            0b100 => Self::EaToControl,
            0b101 => Self::ControlToEa,
            0b110 => Self::EaToRegs,
            0b111 => Self::RegsToEa,
            _ => Self::Reserved,
        }
    }
}

/// External operand formats (source specifier field)
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
pub enum OperandFormat {
    #[strum(serialize = "L")]
    Long = 0,
    #[strum(serialize = "S")]
    Single = 1,
    #[strum(serialize = "X")]
    Extended = 2,
    /// Packed decimal, static k-factor
    #[strum(serialize = "P")]
    Packed = 3,
    #[strum(serialize = "W")]
    Word = 4,
    #[strum(serialize = "D")]
    Double = 5,
    #[strum(serialize = "B")]
    Byte = 6,
    /// Packed decimal, k-factor in a data register
    #[strum(serialize = "P")]
    PackedDynamic = 7,
}

impl OperandFormat {
    pub fn from_spec(spec: u8) -> Self {
        match spec & 7 {
            0 => Self::Long,
            1 => Self::Single,
            2 => Self::Extended,
            3 => Self::Packed,
            4 => Self::Word,
            5 => Self::Double,
            6 => Self::Byte,
            _ => Self::PackedDynamic,
        }
    }

    /// Operand size in memory. Bytes on the A7 stack occupy a word.
    pub fn size(self, stack: bool) -> u32 {
        match self {
            Self::Long | Self::Single => 4,
            Self::Extended | Self::Packed => 12,
            Self::Word => 2,
            Self::Double => 8,
            Self::Byte if stack => 2,
            Self::Byte => 1,
            // Not accepted as a source operand
            Self::PackedDynamic => 0,
        }
    }
}

/// Explicit rounding of the result (FSxxx/FDxxx variants)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Precision {
    /// Per FPCR
    Default,
    Single,
    Double,
}

/// Arithmetic operations (opmode field)
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "UPPERCASE")]
pub enum ArithOp {
    Fmove,
    Fint,
    Fsinh,
    Fintrz,
    Fsqrt,
    Flognp1,
    Fetoxm1,
    Ftanh,
    Fatan,
    Fasin,
    Fatanh,
    Fsin,
    Ftan,
    Fetox,
    Ftwotox,
    Ftentox,
    Flogn,
    Flog10,
    Flog2,
    Fabs,
    Fcosh,
    Fneg,
    Facos,
    Fcos,
    Fgetexp,
    Fgetman,
    Fdiv,
    Fmod,
    Fadd,
    Fmul,
    Fsgldiv,
    Frem,
    Fscale,
    Fsglmul,
    Fsub,
    Fsincos,
    Fcmp,
    Ftst,
}

impl ArithOp {
    pub fn decode(opmode: u8) -> Option<(Self, Precision)> {
        use ArithOp::*;
        use Precision::*;

        Some(match opmode & 0x7F {
            0x00 => (Fmove, Default),
            0x40 => (Fmove, Single),
            0x44 => (Fmove, Double),
            0x01 => (Fint, Default),
            0x02 => (Fsinh, Default),
            0x03 => (Fintrz, Default),
            0x04 => (Fsqrt, Default),
            0x41 => (Fsqrt, Single),
            0x45 => (Fsqrt, Double),
            0x06 => (Flognp1, Default),
            0x08 => (Fetoxm1, Default),
            0x09 => (Ftanh, Default),
            0x0A => (Fatan, Default),
            0x0C => (Fasin, Default),
            0x0D => (Fatanh, Default),
            0x0E => (Fsin, Default),
            0x0F => (Ftan, Default),
            0x10 => (Fetox, Default),
            0x11 => (Ftwotox, Default),
            0x12 => (Ftentox, Default),
            0x14 => (Flogn, Default),
            0x15 => (Flog10, Default),
            0x16 => (Flog2, Default),
            0x18 => (Fabs, Default),
            0x58 => (Fabs, Single),
            0x5C => (Fabs, Double),
            0x19 => (Fcosh, Default),
            0x1A => (Fneg, Default),
            0x5A => (Fneg, Single),
            0x5E => (Fneg, Double),
            0x1C => (Facos, Default),
            0x1D => (Fcos, Default),
            0x1E => (Fgetexp, Default),
            0x1F => (Fgetman, Default),
            0x20 => (Fdiv, Default),
            0x60 => (Fdiv, Single),
            0x64 => (Fdiv, Double),
            0x21 => (Fmod, Default),
            0x22 => (Fadd, Default),
            0x62 => (Fadd, Single),
            0x66 => (Fadd, Double),
            0x23 => (Fmul, Default),
            0x63 => (Fmul, Single),
            0x67 => (Fmul, Double),
            0x24 => (Fsgldiv, Default),
            0x25 => (Frem, Default),
            0x26 => (Fscale, Default),
            0x27 => (Fsglmul, Default),
            0x28 => (Fsub, Default),
            0x68 => (Fsub, Single),
            0x6C => (Fsub, Double),
            0x30..=0x37 => (Fsincos, Default),
            0x38 => (Fcmp, Default),
            0x3A => (Ftst, Default),
            _ => return None,
        })
    }

    /// Operations the 68040/68060 leave to the software package
    pub fn emulated_on_040(self, cpu: CpuModel) -> bool {
        use ArithOp::*;

        match self {
            // The 68060 has these in hardware again
            Fint | Fintrz => cpu == CpuModel::M68040,
            Fsinh | Flognp1 | Fetoxm1 | Ftanh | Fatan | Fasin | Fatanh | Fsin | Ftan | Fetox
            | Ftwotox | Ftentox | Flogn | Flog10 | Flog2 | Fcosh | Facos | Fcos | Fgetexp
            | Fgetman | Fsincos | Fmod | Frem | Fscale => true,
            _ => false,
        }
    }

    /// Explicitly rounded variants the 6888x does not know
    pub fn missing_on_6888x(self, precision: Precision) -> bool {
        use ArithOp::*;

        precision != Precision::Default
            && matches!(self, Fadd | Fsub | Fneg | Fabs | Fmul | Fsqrt)
    }

    /// Result is subject to the FPCR rounding precision
    pub fn uses_rounding_precision(self) -> bool {
        use ArithOp::*;

        matches!(self, Fadd | Fsub | Fmul | Fdiv | Fsqrt)
    }

    /// Compares only, the destination register is not written
    pub fn is_compare(self) -> bool {
        matches!(self, Self::Fcmp | Self::Ftst)
    }
}

/// FPU control registers, in transfer order
#[allow(clippy::upper_case_acronyms)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
pub enum FmoveControlReg {
    FPCR = 0b100,
    FPSR = 0b010,
    FPIAR = 0b001,
}

impl FmoveControlReg {
    /// Selected registers of a register select field, in transfer order
    pub fn selected(list: u8) -> impl Iterator<Item = Self> {
        [Self::FPCR, Self::FPSR, Self::FPIAR]
            .into_iter()
            .filter(move |r| list & (*r as u8) != 0)
    }
}

/// FMOVEM addressing/list mode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FmovemMode {
    StaticPredecrement,
    DynamicPredecrement,
    StaticPostincrement,
    DynamicPostincrement,
}

impl From<FpuExtWord> for FmovemMode {
    fn from(value: FpuExtWord) -> Self {
        match value.movem_mode() {
            0 => Self::StaticPredecrement,
            1 => Self::DynamicPredecrement,
            2 => Self::StaticPostincrement,
            _ => Self::DynamicPostincrement,
        }
    }
}

impl FmovemMode {
    pub fn predecrement(self) -> bool {
        matches!(self, Self::StaticPredecrement | Self::DynamicPredecrement)
    }

    pub fn dynamic(self) -> bool {
        matches!(self, Self::DynamicPredecrement | Self::DynamicPostincrement)
    }
}
