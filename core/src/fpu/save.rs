//! FPU context save states

use anyhow::{bail, Result};
use binrw::io::Cursor;
use binrw::{binrw, BinRead, BinWrite};
use log::*;
use num_traits::FromPrimitive;

use super::config::FpuModel;
use super::regs::RegisterFPCR;
use super::storage::BitsExtReal;
use super::{Fpu, FpuError, FpuState};

/// Reserved trailer present
const SAVE_FLAG_TRAILER: u32 = 1 << 31;
/// FPU was in the null state
const SAVE_FLAG_NULL: u32 = 1 << 0;

/// Floating point data register in extended precision
#[binrw]
#[brw(big)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SavedRegister {
    pub mantissa_hi: u32,
    pub mantissa_lo: u32,
    pub sign_exponent: u16,
}

impl From<f64> for SavedRegister {
    fn from(value: f64) -> Self {
        let ext = BitsExtReal::from(value);
        Self {
            mantissa_hi: ext.mid(),
            mantissa_lo: ext.low(),
            sign_exponent: (ext.high() >> 16) as u16,
        }
    }
}

impl From<SavedRegister> for f64 {
    fn from(value: SavedRegister) -> Self {
        BitsExtReal::from_longs(
            u32::from(value.sign_exponent) << 16,
            value.mantissa_hi,
            value.mantissa_lo,
        )
        .into()
    }
}

#[binrw]
#[brw(big)]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FpuSaveState {
    /// FPU model number
    pub model: u32,
    pub flags: u32,
    pub fp: [SavedRegister; 8],
    pub fpcr: u32,
    pub fpsr: u32,
    pub fpiar: u32,
    #[br(if(flags & SAVE_FLAG_TRAILER != 0))]
    pub reserved: Option<[u32; 2]>,
}

impl Fpu {
    /// Serializes the FPU context. None if no FPU is fitted.
    pub fn save_state(&self) -> Result<Option<Vec<u8>>> {
        if !self.config.fpu_model.present() {
            return Ok(None);
        }
        let null = if self.state == FpuState::Null {
            SAVE_FLAG_NULL
        } else {
            0
        };
        let state = FpuSaveState {
            model: self.config.fpu_model.number(),
            flags: SAVE_FLAG_TRAILER | null,
            fp: core::array::from_fn(|i| self.regs.fp[i].into()),
            fpcr: self.regs.fpcr.0,
            fpsr: self.get_fpsr(),
            fpiar: self.regs.fpiar,
            reserved: Some([u32::MAX, 0]),
        };
        let mut writer = Cursor::new(Vec::new());
        state.write(&mut writer)?;
        Ok(Some(writer.into_inner()))
    }

    /// Restores the FPU context, including the FPU model
    pub fn restore_state(&mut self, data: &[u8]) -> Result<()> {
        let mut reader = Cursor::new(data);
        let state = FpuSaveState::read(&mut reader)
            .map_err(|e| FpuError::InvalidSaveState(e.to_string()))?;
        if reader.position() != data.len() as u64 {
            bail!(FpuError::InvalidSaveState(format!(
                "{} trailing bytes",
                data.len() as u64 - reader.position()
            )));
        }
        let Some(model) = FpuModel::from_u32(state.model) else {
            bail!(FpuError::UnknownFpuModel(state.model));
        };

        self.config.fpu_model = model;
        for (reg, saved) in self.regs.fp.iter_mut().zip(state.fp) {
            *reg = saved.into();
        }
        self.regs.fpcr = RegisterFPCR(state.fpcr);
        self.set_fpsr(state.fpsr);
        self.regs.fpiar = state.fpiar;
        self.state = if state.flags & SAVE_FLAG_NULL != 0 {
            FpuState::Null
        } else {
            FpuState::Idle
        };
        self.cursor.reset();
        debug!("FPU state restored: {} {}", model, self.state);
        Ok(())
    }
}
