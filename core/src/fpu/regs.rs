use proc_bitfield::bitfield;
use serde::{Deserialize, Serialize};

use crate::types::{Address, Byte, Long};

bitfield! {
    /// Exception bitfields
    #[derive(Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
    pub struct FpuExceptions(pub u8): Debug, FromStorage, IntoStorage, DerefStorage {
        /// Inexact Decimal Input
        pub inex1: bool @ 0,

        /// Inexact Operation
        pub inex2: bool @ 1,

        /// Division by zero
        pub dz: bool @ 2,

        /// Underflow
        pub unfl: bool @ 3,

        /// Overflow
        pub ovfl: bool @ 4,

        /// Operand error
        pub operr: bool @ 5,

        /// Signaling Not-a-Number
        pub snan: bool @ 6,

        /// Branch/set on unordered
        pub bsun: bool @ 7,
    }
}

bitfield! {
    /// Accrued exception bitfields
    #[derive(Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
    pub struct FpuAccruedExceptions(pub u8): Debug, FromStorage, IntoStorage, DerefStorage {
        /// Inexact
        pub inex: bool @ 3,

        /// Division by zero
        pub dz: bool @ 4,

        /// Underflow
        pub unfl: bool @ 5,

        /// Overflow
        pub ovfl: bool @ 6,

        /// Invalid operation
        pub iop: bool @ 7,
    }
}

impl FpuAccruedExceptions {
    /// Accrues the exceptions of the last operation into this byte (PRM 1.6.5)
    pub fn accrue(self, exc: FpuExceptions) -> Self {
        self.with_iop(self.iop() || exc.snan() || exc.operr())
            .with_ovfl(self.ovfl() || exc.ovfl())
            .with_unfl(self.unfl() || (exc.unfl() && exc.inex2()))
            .with_dz(self.dz() || exc.dz())
            .with_inex(self.inex() || exc.inex1() || exc.inex2() || exc.ovfl())
    }
}

bitfield! {
    /// Floating Point Control Register
    #[derive(Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
    pub struct RegisterFPCR(pub Long): Debug, FromStorage, IntoStorage, DerefStorage {
        /// Full mode control byte
        pub mode: Byte @ 0..=7,

        /// Rounding mode
        pub rnd: u8 @ 4..=5,

        /// Rounding precision
        pub prec: u8 @ 6..=7,

        /// Exception control
        pub exc: nested FpuExceptions @ 8..=15,
    }
}

bitfield! {
    /// Floating Point Status Register
    ///
    /// The condition code byte is not kept here while running; it is derived
    /// from the last result (see [`FpuRegisterFile::fpsr`]).
    #[derive(Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
    pub struct RegisterFPSR(pub Long): Debug, FromStorage, IntoStorage, DerefStorage {
        /// Full condition code byte
        pub fpcc: u8 @ 24..=31,

        /// Condition code: Not-a-number or unordered
        pub fpcc_nan: bool @ 24,

        /// Condition code: Infinity
        pub fpcc_i: bool @ 25,

        /// Condition code: Zero
        pub fpcc_z: bool @ 26,

        /// Condition code: Negative
        pub fpcc_n: bool @ 27,

        /// 7 least significant bits of quotient
        pub quotient: u8 @ 16..=22,

        /// Sign of quotient
        pub quotient_s: bool @ 23,

        /// Full exception status
        pub exs: nested FpuExceptions @ 8..=15,

        /// Raw exception status byte
        pub exs_byte: u8 @ 8..=15,

        /// Accrued exception byte
        pub aexc: nested FpuAccruedExceptions @ 0..=7,

        /// Raw accrued exception byte
        pub aexc_byte: u8 @ 0..=7,
    }
}

/// Bits of the FPSR that are stored as-is
pub const FPSR_STORED_MASK: Long = 0x00FF_FFFF;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FpuRegisterFile {
    pub fp: [f64; 8],
    pub fpcr: RegisterFPCR,
    /// Quotient, exception and accrued bytes. The condition codes live in
    /// `result`.
    pub fpsr: RegisterFPSR,
    pub fpiar: Address,
    /// Value the condition codes are derived from
    pub result: f64,
}

impl FpuRegisterFile {
    /// Composes the visible FPSR: stored bytes plus condition codes
    pub fn fpsr(&self) -> RegisterFPSR {
        let r = self.result;
        let cc = RegisterFPSR(0)
            .with_fpcc_nan(r.is_nan())
            .with_fpcc_z(!r.is_nan() && r == 0.0)
            .with_fpcc_n(!r.is_nan() && r < 0.0)
            .with_fpcc_i(r.is_infinite());
        RegisterFPSR((self.fpsr.0 & FPSR_STORED_MASK) | cc.0)
    }

    /// Loads the FPSR, rebuilding a result that reproduces its condition codes
    pub fn set_fpsr(&mut self, value: Long) {
        let v = RegisterFPSR(value);
        self.fpsr = RegisterFPSR(value & FPSR_STORED_MASK);
        self.result = if v.fpcc_nan() {
            f64::NAN
        } else if v.fpcc_z() {
            0.0
        } else if v.fpcc_n() {
            -1.0
        } else {
            1.0
        };
    }
}

impl Default for FpuRegisterFile {
    fn default() -> Self {
        Self {
            fp: [0.0; 8],
            fpcr: RegisterFPCR(0),
            fpsr: RegisterFPSR(0),
            fpiar: 0,
            result: 0.0,
        }
    }
}
