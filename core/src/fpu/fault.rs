//! Decides whether an FPU instruction runs natively or traps, and delivers
//! the trap.
//!
//! Every `check_*` function is a pure decision returning the fault to take,
//! if any. [`Fpu::raise`] turns a decision into the architectural exception.

use anyhow::Result;
use log::*;

use super::config::{CpuModel, FpuModel};
use super::instruction::{ArithOp, FpuExtWord};
use super::Fpu;
use crate::cpu::{BusCycle, CpuInterface, CpuSized};
use crate::types::{Address, Long, Word};

/// Line 1111 emulator / FPU unimplemented instruction
pub const VECTOR_LINEF: u8 = 11;
/// 68040 unimplemented data type
pub const VECTOR_UNIMP_DATATYPE_040: u8 = 55;
/// 68060 unimplemented data type
pub const VECTOR_UNIMP_DATATYPE_060: u8 = 60;

/// Stack frame format words
const FRAME_FORMAT_0: Word = 0x0000;
const FRAME_FORMAT_2: Word = 0x2000;
const FRAME_FORMAT_4: Word = 0x4000;

/// 68060 PCR: FPU disabled
const PCR_DFP: Long = 1 << 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
pub enum Fault {
    /// No usable FPU. Takes the FPU disabled exception where the CPU has
    /// one, otherwise an illegal instruction.
    Disabled,
    /// Illegal instruction
    Illegal,
    /// Opcode decodes to nothing the FPU knows
    NoInstruction,
    /// Left to the software package (68040/68060)
    Unimplemented,
    /// Operand data type left to the software package (68040/68060)
    UnimplementedDatatype,
}

/// Stack frame flavour of the line-F style FPU exceptions
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
enum FrameKind {
    Instruction,
    Disabled,
    Datatype,
}

fn push<C: CpuInterface, T: CpuSized>(cpu: &mut C, value: T) -> Result<()> {
    let sp = cpu.read_a(7).wrapping_sub(T::SIZE);
    cpu.write_a(7, sp);
    cpu.write(BusCycle::Data, sp, value)
}

impl Fpu {
    fn fpu_unusable<C: CpuInterface>(&self, cpu: &C) -> bool {
        cpu.pcr() & PCR_DFP != 0 || !self.config.fpu_model.present()
    }

    fn emulating_unimplemented(&self) -> bool {
        self.config.fpu_model.present() && self.config.no_unimplemented
    }

    pub(super) fn check_no_fpu<C: CpuInterface>(&self, cpu: &C) -> Option<Fault> {
        self.fpu_unusable(cpu).then_some(Fault::Disabled)
    }

    /// Integer-only 68020/68030 system: FPU opcodes are plain illegal
    pub(super) fn check_no_6888x(&self) -> Option<Fault> {
        (self.config.cpu_model < CpuModel::M68040 && !self.config.fpu_model.present())
            .then_some(Fault::Illegal)
    }

    /// Arithmetic the 68040/68060 do not implement in hardware
    pub(super) fn check_unimplemented_680x0<C: CpuInterface>(
        &self,
        cpu: &C,
        ext: FpuExtWord,
    ) -> Option<Fault> {
        if let Some(f) = self.check_no_fpu(cpu) {
            return Some(f);
        }
        if self.config.cpu_model < CpuModel::M68040 || !self.emulating_unimplemented() {
            return None;
        }
        match ArithOp::decode(ext.opmode()) {
            Some((op, _)) if op.emulated_on_040(self.config.cpu_model) => {
                Some(Fault::Unimplemented)
            }
            _ => None,
        }
    }

    /// FSxxx/FDxxx variants on a 6888x
    pub(super) fn check_unimplemented_6888x(&self, ext: FpuExtWord) -> Option<Fault> {
        if !matches!(
            self.config.fpu_model,
            FpuModel::M68881 | FpuModel::M68882
        ) || !self.config.no_unimplemented
        {
            return None;
        }
        match ArithOp::decode(ext.opmode()) {
            Some((op, precision)) if op.missing_on_6888x(precision) => {
                Some(Fault::NoInstruction)
            }
            _ => None,
        }
    }

    /// Extended/packed operands on the 68040/68060.
    /// Unimplemented data types need pre- and post-instruction exception
    /// handling; this is always declined and the operand is converted.
    pub(super) fn check_datatype(&self, ext: FpuExtWord) -> Option<Fault> {
        if self.config.cpu_model >= CpuModel::M68040 && self.emulating_unimplemented() {
            trace!(
                "Not raising unimplemented data type for {} operand",
                ext.format()
            );
        }
        None
    }

    /// FDBcc, FScc and FTRAPcc, which the 68060 leaves to software.
    /// Returns the fault and the PC to report it at.
    pub(super) fn check_no_fpu_conditional<C: CpuInterface>(
        &self,
        cpu: &C,
        oldpc: Address,
    ) -> Option<(Fault, Address)> {
        if let Some(f) = self.check_no_fpu(cpu) {
            return Some((f, oldpc));
        }
        (self.config.cpu_model == CpuModel::M68060 && self.emulating_unimplemented())
            .then(|| (Fault::Unimplemented, cpu.get_pc()))
    }

    /// Delivers `decision` if there is one. Returns true if a fault was taken.
    pub(super) fn guard<C: CpuInterface>(
        &mut self,
        cpu: &mut C,
        decision: Option<Fault>,
        opcode: Word,
        ea: Address,
        oldpc: Address,
    ) -> Result<bool> {
        match decision {
            Some(fault) => {
                self.raise(cpu, fault, opcode, ea, oldpc)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Takes a fault
    pub(super) fn raise<C: CpuInterface>(
        &mut self,
        cpu: &mut C,
        fault: Fault,
        opcode: Word,
        ea: Address,
        oldpc: Address,
    ) -> Result<()> {
        self.exception = true;
        match fault {
            Fault::Disabled => {
                let cpu_model = self.config.cpu_model;
                let present = self.config.fpu_model.present();
                if (cpu_model == CpuModel::M68060 && self.fpu_unusable(cpu))
                    || (cpu_model == CpuModel::M68040 && !present)
                {
                    return self.exception_frame(cpu, FrameKind::Disabled, opcode, ea, oldpc);
                }
                self.log_fault(format_args!(
                    "No FPU: opcode {:04X} at {:08X}",
                    opcode, oldpc
                ));
                cpu.set_pc(oldpc);
                cpu.illegal_instruction(opcode)
            }
            Fault::Illegal => {
                self.log_fault(format_args!(
                    "FPU opcode {:04X} at {:08X} without FPU",
                    opcode, oldpc
                ));
                cpu.set_pc(oldpc);
                cpu.illegal_instruction(opcode)
            }
            Fault::NoInstruction => {
                self.log_fault(format_args!(
                    "Unknown FPU instruction {:04X} at {:08X}",
                    opcode, oldpc
                ));
                cpu.set_pc(oldpc);
                cpu.illegal_instruction(opcode)
            }
            Fault::Unimplemented => {
                self.exception_frame(cpu, FrameKind::Instruction, opcode, ea, oldpc)
            }
            Fault::UnimplementedDatatype => {
                self.exception_frame(cpu, FrameKind::Datatype, opcode, ea, oldpc)
            }
        }
    }

    /// 68040 unimplemented / 68060 FPU disabled exceptions: a line-F
    /// exception with a model specific stack frame.
    fn exception_frame<C: CpuInterface>(
        &mut self,
        cpu: &mut C,
        kind: FrameKind,
        opcode: Word,
        ea: Address,
        oldpc: Address,
    ) -> Result<()> {
        let mut vector = VECTOR_LINEF;
        let mut oldpc = oldpc;
        let newpc = cpu.get_pc();
        let sr = cpu.enter_exception();

        match self.config.cpu_model {
            CpuModel::M68060 => {
                self.regs.fpiar = oldpc;
                match kind {
                    FrameKind::Disabled => {
                        push::<_, Long>(cpu, oldpc)?;
                        push::<_, Long>(cpu, ea)?;
                        push(cpu, FRAME_FORMAT_4 + Word::from(vector) * 4)?;
                    }
                    FrameKind::Instruction => {
                        // Resumes at the next instruction
                        oldpc = newpc;
                        push::<_, Long>(cpu, ea)?;
                        push(cpu, FRAME_FORMAT_2 + Word::from(vector) * 4)?;
                    }
                    FrameKind::Datatype => {
                        vector = VECTOR_UNIMP_DATATYPE_060;
                        push(cpu, FRAME_FORMAT_0 + Word::from(vector) * 4)?;
                    }
                }
            }
            CpuModel::M68040 => {
                self.regs.fpiar = oldpc;
                match kind {
                    FrameKind::Instruction | FrameKind::Disabled => {
                        oldpc = newpc;
                    }
                    FrameKind::Datatype => {
                        vector = VECTOR_UNIMP_DATATYPE_040;
                    }
                }
                push::<_, Long>(cpu, ea)?;
                push(cpu, FRAME_FORMAT_2 + Word::from(vector) * 4)?;
            }
            _ => (),
        }
        push::<_, Long>(cpu, newpc)?;
        push(cpu, sr)?;

        let handler_addr = cpu.vbr().wrapping_add(Address::from(vector) * 4);
        let handler = cpu.read::<Long>(BusCycle::Data, handler_addr)?;
        self.log_fault(format_args!(
            "FPU exception {} OP={:04X} EA={:08X} PC={:08X} -> {:08X}",
            kind, opcode, ea, oldpc, handler
        ));
        self.exception = true;
        cpu.set_pc(handler);
        cpu.end_compile();
        Ok(())
    }
}
