//! Interface to the integer CPU core hosting the FPU.
//!
//! The FPU never owns processor state. Everything it needs from the
//! surrounding 680x0 (program counter, integer registers, the instruction
//! stream, memory and exception delivery) is reached through [`CpuInterface`].

#[cfg(test)]
pub mod testcpu;

use anyhow::Result;
use num_traits::{PrimInt, WrappingAdd};
use thiserror::Error;

use crate::types::{Address, Byte, Long, Word};

/// Errors raised by the hosting CPU on behalf of the FPU
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum CpuError {
    /// Bus/MMU access fault. The instruction is aborted and may be restarted.
    #[error("Access fault at {0:08X}")]
    AccessFault(Address),
}

/// Bus cycle flavour for a memory access
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
pub enum BusCycle {
    /// Coprocessor interface access (operand transfers)
    Coprocessor,
    /// Plain data access (stack frames, register lists, FSAVE frames)
    Data,
}

/// Bus access sizes used by the FPU
pub trait CpuSized:
    PrimInt + WrappingAdd + Into<Long> + std::fmt::Display + std::fmt::UpperHex + std::fmt::Debug
{
    /// Size in bytes
    const SIZE: Address;

    /// Expands the value in the generic to a full register's width
    fn expand(self) -> Long {
        self.into()
    }

    /// Expands the value in the generic to a full register's width,
    /// with sign extension.
    fn expand_sign_extend(self) -> Long;

    /// Replaces the lower bytes of the given value for types < Long
    /// or the full value for Long.
    fn replace_in(self, value: Long) -> Long;

    /// Downcasts to T from Long, discarding excess bits.
    fn chop(value: Long) -> Self;
}

macro_rules! impl_cpusized {
    ($t:ty, $signed:ty, $mask:expr) => {
        impl CpuSized for $t {
            const SIZE: Address = std::mem::size_of::<$t>() as Address;

            #[inline(always)]
            fn expand_sign_extend(self) -> Long {
                self as $signed as i32 as Long
            }

            #[inline(always)]
            fn replace_in(self, value: Long) -> Long {
                (value & $mask) | self.expand()
            }

            #[inline(always)]
            fn chop(value: Long) -> Self {
                value as $t
            }
        }
    };
}

impl_cpusized!(Byte, i8, 0xFFFFFF00);
impl_cpusized!(Word, i16, 0xFFFF0000);
impl_cpusized!(Long, i32, 0x00000000);

/// The processor state and services the FPU consumes.
///
/// Memory accessors return `Err` when the access faults (e.g. a 68030 MMU
/// page fault). The FPU propagates such errors unchanged, leaving any
/// in-progress transfer resumable.
pub trait CpuInterface {
    /// Current program counter (the next instruction stream word)
    fn get_pc(&self) -> Address;

    fn set_pc(&mut self, pc: Address);

    fn read_d(&self, reg: usize) -> Long;

    fn write_d(&mut self, reg: usize, value: Long);

    /// Reads an address register. A7 is the active stack pointer.
    fn read_a(&self, reg: usize) -> Address;

    fn write_a(&mut self, reg: usize, value: Address);

    /// Fetches the next word of the instruction stream, advancing PC.
    /// Words already consumed by the prefetch queue are served from there.
    fn next_iword(&mut self) -> Result<Word>;

    /// Fetches the next long word of the instruction stream, advancing PC.
    fn next_ilong(&mut self) -> Result<Long> {
        let hi = Long::from(self.next_iword()?);
        let lo = Long::from(self.next_iword()?);
        Ok((hi << 16) | lo)
    }

    /// Decodes a 68020+ brief/full format extension word from the
    /// instruction stream and returns the effective address.
    fn disp_ea_020(&mut self, base: Address) -> Result<Address>;

    fn read<T: CpuSized>(&mut self, cycle: BusCycle, addr: Address) -> Result<T>;

    fn write<T: CpuSized>(&mut self, cycle: BusCycle, addr: Address, value: T) -> Result<()>;

    /// Vector base register
    fn vbr(&self) -> Address;

    /// 68060 Processor Configuration Register. Bit 1 disables the FPU.
    fn pcr(&self) -> Long {
        0
    }

    /// Prepares exception processing: clears the trace bits, switches to
    /// the supervisor stack and returns the status register to be stacked.
    fn enter_exception(&mut self) -> Word;

    /// Takes the illegal instruction exception for `opcode`.
    fn illegal_instruction(&mut self, opcode: Word) -> Result<()>;

    /// Takes a plain exception through `vector` (e.g. TRAPcc).
    fn exception(&mut self, vector: u8) -> Result<()>;

    /// Ends the current translated block, if the host translates code.
    fn end_compile(&mut self) {}
}
