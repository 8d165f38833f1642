pub mod alu;
pub mod config;
pub mod constants;
pub mod ea;
pub mod fault;
pub mod instruction;
pub mod math;
pub mod ops_branch;
pub mod ops_move;
pub mod ops_state;
pub mod regs;
pub mod restart;
pub mod save;
pub mod storage;

#[cfg(test)]
mod tests;

use arpfloat::{RoundingMode, Semantics};
use log::*;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::{Long, Word};

use config::{FpuConfig, FpuModel};
use regs::{FpuAccruedExceptions, FpuExceptions, FpuRegisterFile};
use restart::TransferCursor;

/// 6888x/68040 single precision float semantics
pub const SEMANTICS_SINGLE: Semantics = Semantics::new(8, 24, RoundingMode::NearestTiesToEven);

/// 6888x/68040 extended precision float semantics
pub const SEMANTICS_EXTENDED: Semantics = Semantics::new(15, 64, RoundingMode::NearestTiesToEven);

/// Fault diagnostics emitted per FPU context before going quiet
pub const LOG_BUDGET: usize = 20;

#[derive(Error, Debug)]
pub enum FpuError {
    #[error("Invalid FPU save state: {0}")]
    InvalidSaveState(String),
    #[error("Unknown FPU model {0}")]
    UnknownFpuModel(u32),
}

/// Internal state as seen by FSAVE
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default, strum::Display)]
pub enum FpuState {
    /// Reset/never used, FSAVE produces a null frame
    #[default]
    Null,
    /// Executed at least one instruction since the last null transition
    Idle,
}

/// Floating point unit context
#[derive(Debug, Clone)]
pub struct Fpu {
    pub config: FpuConfig,
    pub regs: FpuRegisterFile,
    pub state: FpuState,

    /// Exceptions signalled by the instruction in flight, FPSR EXC layout
    pending_exceptions: FpuExceptions,

    /// The last instruction raised a fault
    exception: bool,

    /// Restart cursor for transfers interrupted by an access fault
    pub(crate) cursor: TransferCursor,

    /// Remaining fault diagnostics
    log_budget: usize,
}

impl Fpu {
    pub fn new(config: FpuConfig) -> Self {
        let mut fpu = Self {
            config,
            regs: FpuRegisterFile::default(),
            state: FpuState::Null,
            pending_exceptions: FpuExceptions(0),
            exception: false,
            cursor: TransferCursor::default(),
            log_budget: LOG_BUDGET,
        };
        fpu.reset();
        fpu
    }

    /// Processor reset
    pub fn reset(&mut self) {
        self.null();
        self.regs.result = 1.0;
    }

    /// Transition to the null state (FRESTORE of a null frame)
    pub fn null(&mut self) {
        self.state = FpuState::Null;
        self.regs = FpuRegisterFile::default();
        self.pending_exceptions = FpuExceptions(0);
        self.regs.result = 0.0;
    }

    /// Version byte reported in FSAVE frames
    pub fn version(&self) -> u8 {
        match self.config.fpu_model {
            FpuModel::M68881 => 0x1F,
            FpuModel::M68882 => 0x20,
            FpuModel::M68040 => 0x41,
            FpuModel::M68060 | FpuModel::None => 0,
        }
    }

    /// True if the last executed FPU instruction raised a fault
    pub fn exception_raised(&self) -> bool {
        self.exception
    }

    /// Visible FPSR with condition codes from the last result
    pub fn get_fpsr(&self) -> Long {
        self.regs.fpsr().0
    }

    pub fn set_fpsr(&mut self, value: Long) {
        self.regs.set_fpsr(value);
    }

    /// Records IEEE exceptions for the instruction in flight. `mask` uses the
    /// FPSR layout (exception byte in bits 8-15).
    pub fn signal_exception(&mut self, mask: Word) {
        self.signal(FpuExceptions((mask >> 8) as u8));
    }

    fn signal(&mut self, exc: FpuExceptions) {
        self.pending_exceptions = FpuExceptions(self.pending_exceptions.0 | exc.0);
    }

    pub fn transfer_cursor(&self) -> &TransferCursor {
        &self.cursor
    }

    /// Access for the MMU fault handler completing a faulted transfer
    pub fn transfer_cursor_mut(&mut self) -> &mut TransferCursor {
        &mut self.cursor
    }

    /// Starts an arithmetic instruction
    fn begin_arithmetic(&mut self) {
        self.pending_exceptions = FpuExceptions(0);
        self.state = FpuState::Idle;
        self.exception = false;
    }

    /// Folds the exceptions signalled by the finished instruction into FPSR
    fn end_arithmetic(&mut self) {
        let exc = self.pending_exceptions;
        if exc.0 == 0 {
            return;
        }
        let fpsr = self.regs.fpsr;
        let aexc = FpuAccruedExceptions(fpsr.aexc_byte()).accrue(exc);
        self.regs.fpsr = fpsr.with_exs_byte(exc.0).with_aexc_byte(aexc.0);
        warn!("FPU exception: {:08X}", self.get_fpsr());
    }

    /// Rounding mode from FPCR (PRM 3.5.2, table 3-21)
    fn rounding_mode(&self) -> RoundingMode {
        match self.regs.fpcr.rnd() {
            0b00 => RoundingMode::NearestTiesToEven,
            0b01 => RoundingMode::Zero,
            0b10 => RoundingMode::Negative,
            _ => RoundingMode::Positive,
        }
    }

    /// Sets the condition code basis
    fn set_result(&mut self, value: f64) {
        self.regs.result = value;
    }

    /// Emits a fault diagnostic while budget remains
    fn log_fault(&mut self, args: std::fmt::Arguments) {
        if self.log_budget > 0 {
            self.log_budget -= 1;
            warn!("{}", args);
        }
    }
}
