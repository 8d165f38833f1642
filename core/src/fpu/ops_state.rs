//! FSAVE/FRESTORE and the internal state frames

use anyhow::Result;
use arrayvec::ArrayVec;
use log::*;

use super::config::FpuModel;
use super::ea::EaField;
use super::fault::Fault;
use super::{Fpu, FpuState};
use crate::cpu::{BusCycle, CpuInterface};
use crate::types::{Address, Long, Word};

/// Longest frame (68882 idle)
const FRAME_LONGS_MAX: usize = 15;

/// 68060 idle frame ID
const FRAME_ID_68060_IDLE: Long = 0x0000_6000;
/// 68060 frame: ID plus two reserved long words
const FRAME_LONGS_68060: usize = 3;
/// 6888x null frame ID
const FRAME_ID_6888X_NULL: Long = 0x18 << 16;
/// 6888x idle frame sizes
const FRAME_SIZE_68881_IDLE: Long = 0x1C;
const FRAME_SIZE_68882_IDLE: Long = 0x3C;
/// Last long word of a 6888x idle frame (BIU flags)
const FRAME_6888X_BIU: Long = 0x7000_0000;

impl Fpu {
    /// FSAVE frame for the current state, in memory order
    pub fn fsave_frame(&self) -> ArrayVec<Long, FRAME_LONGS_MAX> {
        let mut frame = ArrayVec::new();
        let idle = self.state != FpuState::Null;
        let version = Long::from(self.version());

        match self.config.fpu_model {
            FpuModel::M68060 => {
                frame.push(if idle { FRAME_ID_68060_IDLE } else { 0 });
                while frame.len() < FRAME_LONGS_68060 {
                    frame.push(0);
                }
            }
            FpuModel::M68040 => {
                frame.push(if idle { version << 24 } else { 0 });
            }
            _ => {
                if !idle {
                    frame.push(FRAME_ID_6888X_NULL);
                    return frame;
                }
                let size = if self.config.fpu_model == FpuModel::M68882 {
                    FRAME_SIZE_68882_IDLE
                } else {
                    FRAME_SIZE_68881_IDLE
                };
                frame.push((version << 24) | ((size - 4) << 16));
                let longs = (size / 4) as usize;
                while frame.len() < longs - 1 {
                    frame.push(0);
                }
                frame.push(FRAME_6888X_BIU);
            }
        }
        frame
    }

    /// Common start of FSAVE/FRESTORE. Returns the effective address, or
    /// None if a fault was taken.
    fn state_frame_prologue<C: CpuInterface>(
        &mut self,
        cpu: &mut C,
        opcode: Word,
        pc: Address,
    ) -> Result<Option<Address>> {
        self.exception = false;
        let decision = self.check_no_6888x();
        if self.guard(cpu, decision, opcode, 0, pc)? {
            return Ok(None);
        }
        let Some(ad) = Self::operand_address(cpu, opcode)? else {
            self.raise(cpu, Fault::Disabled, opcode, 0, pc)?;
            return Ok(None);
        };
        let decision = self.check_no_fpu(cpu);
        if self.guard(cpu, decision, opcode, ad, pc)? {
            return Ok(None);
        }
        self.regs.fpiar = pc;
        Ok(Some(ad))
    }

    /// FSAVE. PC points past the opcode word.
    pub fn op_fsave<C: CpuInterface>(&mut self, cpu: &mut C, opcode: Word) -> Result<()> {
        let pc = cpu.get_pc().wrapping_sub(2);
        let Some(ad) = self.state_frame_prologue(cpu, opcode, pc)? else {
            return Ok(());
        };

        let ea = EaField::from(opcode);
        let predec = ea.mode == EaField::MODE_PREDEC;
        let frame = self.fsave_frame();
        let size = 4 * frame.len() as Address;
        let start = if predec { ad.wrapping_sub(size) } else { ad };

        // 6888x frames are stored long by long and can be interrupted
        let restartable = self.config.mmu030
            && matches!(self.config.fpu_model, FpuModel::M68881 | FpuModel::M68882);
        let start = if restartable && self.cursor.begin(pc, start) {
            self.cursor.base()
        } else {
            start
        };

        for pos in 0..frame.len() {
            let idx = if predec { frame.len() - 1 - pos } else { pos };
            let addr = start.wrapping_add(4 * idx as Address);
            if !restartable {
                cpu.write(BusCycle::Data, addr, frame[idx])?;
                continue;
            }
            if !self.cursor.pending(pos) {
                continue;
            }
            if self.cursor.stage_write(frame[idx]) {
                cpu.write(BusCycle::Data, addr, frame[idx])?;
            }
            self.cursor.advance();
        }
        if restartable {
            self.cursor.finish();
        }

        debug!("FSAVE {} frame, {} bytes at {:08X}", self.state, size, start);
        match ea.mode {
            EaField::MODE_POSTINC => cpu.write_a(ea.reg, start.wrapping_add(size)),
            EaField::MODE_PREDEC => cpu.write_a(ea.reg, start),
            _ => (),
        }
        Ok(())
    }

    /// FRESTORE. PC points past the opcode word.
    pub fn op_frestore<C: CpuInterface>(&mut self, cpu: &mut C, opcode: Word) -> Result<()> {
        let pc = cpu.get_pc().wrapping_sub(2);
        let Some(mut ad) = self.state_frame_prologue(cpu, opcode, pc)? else {
            return Ok(());
        };

        let ea = EaField::from(opcode);
        let predec = ea.mode == EaField::MODE_PREDEC;
        let advance = |ad: Address, n: Address| {
            if predec {
                ad.wrapping_sub(n)
            } else {
                ad.wrapping_add(n)
            }
        };

        let d = if predec {
            ad = ad.wrapping_sub(4);
            cpu.read::<Long>(BusCycle::Data, ad)?
        } else {
            let d = cpu.read::<Long>(BusCycle::Data, ad)?;
            ad = ad.wrapping_add(4);
            d
        };

        if self.config.fpu_model == FpuModel::M68060 {
            if d & 0x0000_FF00 != 0 {
                self.state = FpuState::Idle;
            } else {
                self.null();
            }
            ad = advance(ad, 4 * (FRAME_LONGS_68060 as Address - 1));
        } else if d & 0xFF00_0000 != 0 {
            self.state = FpuState::Idle;
            // Frame contents are not interpreted, skip them
            ad = advance(ad, (d >> 16) & 0xFF);
        } else {
            self.null();
        }
        debug!("FRESTORE frame {:08X}, now {}", d, self.state);

        match ea.mode {
            EaField::MODE_POSTINC | EaField::MODE_PREDEC => cpu.write_a(ea.reg, ad),
            _ => (),
        }
        Ok(())
    }
}
