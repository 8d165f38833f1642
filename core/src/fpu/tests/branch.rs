use super::*;
use crate::cpu::testcpu::{Access, Taken};
use crate::cpu::BusCycle;
use crate::fpu::ops_branch::VECTOR_TRAPCC;
use crate::fpu::FpuState;
use crate::types::Byte;

fn fpu68882() -> (Fpu, TestCpu) {
    system(CpuModel::M68030, FpuModel::M68882)
}

/// Runs FBcc with the PC past the opcode word
fn fbcc(fpu: &mut Fpu, cpu: &mut TestCpu, opcode: Word, extra: Long) {
    load(cpu, &[opcode], 1);
    fpu.op_fbcc(cpu, opcode, TestCpu::CODE + 2, extra).unwrap();
}

/// Runs FDBcc/FScc with the PC past the condition word
fn conditional(fpu: &mut Fpu, cpu: &mut TestCpu, code: &[Word]) {
    load(cpu, code, 2);
    if code[0] & 0x38 == 0x08 {
        fpu.op_fdbcc(cpu, code[0], code[1]).unwrap();
    } else {
        fpu.op_fscc(cpu, code[0], code[1]).unwrap();
    }
}

#[test]
fn fbcc_taken() {
    let (mut fpu, mut cpu) = fpu68882();
    fpu.regs.result = 0.0;

    // FBEQ.W *+$12
    fbcc(&mut fpu, &mut cpu, 0xF281, 0x0010);
    assert_eq!(cpu.pc, TestCpu::CODE + 0x12);
    assert_eq!(fpu.regs.fpiar, TestCpu::CODE);
    assert_eq!(fpu.state, FpuState::Idle);

    // FBEQ.W *+0
    fbcc(&mut fpu, &mut cpu, 0xF281, 0xFFFE);
    assert_eq!(cpu.pc, TestCpu::CODE);

    // FBEQ.L
    fbcc(&mut fpu, &mut cpu, 0xF2C1, 0x0001_0000);
    assert_eq!(cpu.pc, TestCpu::CODE + 0x1_0002);
}

#[test]
fn fbcc_not_taken() {
    let (mut fpu, mut cpu) = fpu68882();
    fpu.regs.result = 0.0;

    // FBOLT
    fbcc(&mut fpu, &mut cpu, 0xF284, 0x0010);
    assert_eq!(cpu.pc, TestCpu::CODE + 2);

    // FBF
    fbcc(&mut fpu, &mut cpu, 0xF280, 0x0010);
    assert_eq!(cpu.pc, TestCpu::CODE + 2);
    assert_eq!(fpu.get_fpsr() & 0xFFFF, 0);
}

#[test]
fn fbcc_after_fcmp() {
    let (mut fpu, mut cpu) = fpu68882();
    fpu.regs.fp[0] = 2.0;
    fpu.regs.fp[1] = 1.0;

    // FCMP FP1,FP0 / FBGT
    general(&mut fpu, &mut cpu, &[0xF200, 0x0438]);
    fbcc(&mut fpu, &mut cpu, 0xF292, 0x0010);
    assert_eq!(cpu.pc, TestCpu::CODE + 0x12);

    // FBLE
    fbcc(&mut fpu, &mut cpu, 0xF295, 0x0010);
    assert_eq!(cpu.pc, TestCpu::CODE + 2);
}

#[test]
fn bsun() {
    let (mut fpu, mut cpu) = fpu68882();
    fpu.regs.result = f64::NAN;

    // FBOGT is IEEE aware
    fbcc(&mut fpu, &mut cpu, 0xF282, 0x0010);
    assert_eq!(cpu.pc, TestCpu::CODE + 2);
    assert_eq!(fpu.get_fpsr() & 0xFFFF, 0);

    // FBGT on unordered raises BSUN
    fbcc(&mut fpu, &mut cpu, 0xF292, 0x0010);
    assert_eq!(cpu.pc, TestCpu::CODE + 2);
    assert_eq!(fpu.get_fpsr(), 0x0100_8080);

    // FBNGLE is taken, still BSUN
    fpu.set_fpsr(0x0100_0000);
    fbcc(&mut fpu, &mut cpu, 0xF298, 0x0010);
    assert_eq!(cpu.pc, TestCpu::CODE + 0x12);
    assert_eq!(fpu.get_fpsr(), 0x0100_8080);
}

#[test]
fn undefined_predicate() {
    let (mut fpu, mut cpu) = fpu68882();

    fbcc(&mut fpu, &mut cpu, 0xF2A0, 0x0010);
    assert_eq!(cpu.taken, [Taken::Illegal(0xF2A0)]);
    assert_eq!(cpu.pc, TestCpu::CODE);
    assert!(fpu.exception_raised());
}

#[test]
fn fdbcc_loop() {
    let (mut fpu, mut cpu) = fpu68882();
    cpu.d[0] = 0x1234_0002;

    // FDBF D0,*-2
    let code = [0xF248, 0x0000, 0xFFFA];
    conditional(&mut fpu, &mut cpu, &code);
    assert_eq!(cpu.d[0], 0x1234_0001);
    assert_eq!(cpu.pc, TestCpu::CODE - 2);
    assert_eq!(fpu.regs.fpiar, TestCpu::CODE);

    conditional(&mut fpu, &mut cpu, &code);
    assert_eq!(cpu.d[0], 0x1234_0000);
    assert_eq!(cpu.pc, TestCpu::CODE - 2);

    // Counter expires
    conditional(&mut fpu, &mut cpu, &code);
    assert_eq!(cpu.d[0], 0x1234_FFFF);
    assert_eq!(cpu.pc, TestCpu::CODE + 6);
}

#[test]
fn fdbcc_condition_true() {
    let (mut fpu, mut cpu) = fpu68882();
    cpu.d[3] = 5;

    // FDBT D3,*-2
    conditional(&mut fpu, &mut cpu, &[0xF24B, 0x000F, 0xFFFA]);
    assert_eq!(cpu.d[3], 5);
    assert_eq!(cpu.pc, TestCpu::CODE + 6);
}

#[test]
fn fscc_register() {
    let (mut fpu, mut cpu) = fpu68882();
    fpu.regs.result = 0.0;
    cpu.d[1] = 0x1234_5678;

    // FSEQ D1
    conditional(&mut fpu, &mut cpu, &[0xF241, 0x0001]);
    assert_eq!(cpu.d[1], 0x1234_56FF);
    assert_eq!(fpu.regs.fpiar, TestCpu::CODE);

    // FSNE D1
    conditional(&mut fpu, &mut cpu, &[0xF241, 0x000E]);
    assert_eq!(cpu.d[1], 0x1234_5600);
}

#[test]
fn fscc_memory() {
    let (mut fpu, mut cpu) = fpu68882();
    fpu.regs.result = -1.0;

    // FSLT (A7)+
    conditional(&mut fpu, &mut cpu, &[0xF25F, 0x0014]);
    assert_eq!(cpu.peek::<Byte>(TestCpu::STACK), 0xFF);
    assert_eq!(cpu.a[7], TestCpu::STACK + 2);
    let trace = cpu.get_trace();
    assert_eq!(trace.len(), 1);
    assert_eq!(trace[0].access, Access::Write);
    assert_eq!(trace[0].cycle, BusCycle::Coprocessor);

    // FSGT -(A0)
    cpu.a[0] = DATA + 1;
    cpu.poke::<Byte>(DATA, 0x55);
    conditional(&mut fpu, &mut cpu, &[0xF260, 0x0012]);
    assert_eq!(cpu.peek::<Byte>(DATA), 0x00);
    assert_eq!(cpu.a[0], DATA);

    // FSGT (d16,PC) is not alterable
    conditional(&mut fpu, &mut cpu, &[0xF27A, 0x0012, 0x0010]);
    assert_eq!(cpu.taken, [Taken::Illegal(0xF27A)]);
    assert_eq!(cpu.pc, TestCpu::CODE);
}

#[test]
fn ftrapcc() {
    let (mut fpu, mut cpu) = fpu68882();
    fpu.regs.result = 0.0;

    // FTRAPNE
    load(&mut cpu, &[0xF27C, 0x000E], 2);
    fpu.op_ftrapcc(&mut cpu, 0xF27C, TestCpu::CODE, 0x000E).unwrap();
    assert!(cpu.taken.is_empty());

    // FTRAPEQ
    fpu.op_ftrapcc(&mut cpu, 0xF27C, TestCpu::CODE, 0x0001).unwrap();
    assert_eq!(cpu.taken, [Taken::Vector(VECTOR_TRAPCC)]);
    assert_eq!(fpu.regs.fpiar, TestCpu::CODE);
}

#[test]
fn conditional_unimplemented_060() {
    let config = FpuConfig {
        no_unimplemented: true,
        ..FpuConfig::new(CpuModel::M68060, FpuModel::M68060)
    };
    let (mut fpu, mut cpu) = system_with(config);
    fpu.regs.result = 0.0;
    cpu.d[1] = 0x1234_5678;

    // FSEQ D1
    conditional(&mut fpu, &mut cpu, &[0xF241, 0x0001]);
    assert_eq!(cpu.d[1], 0x1234_5678);
    assert!(fpu.exception_raised());
    assert_eq!(cpu.pc, HANDLER + 11 * 4);
    assert_eq!(cpu.peek::<Word>(0x7FFA), 0x202C);
    assert_eq!(cpu.peek::<Long>(0x7FF6), TestCpu::CODE + 4);

    // FDBF D0 reports the branch target
    let (mut fpu, mut cpu) = system_with(config);
    conditional(&mut fpu, &mut cpu, &[0xF248, 0x0000, 0xFFFA]);
    assert_eq!(cpu.peek::<Long>(0x7FFC), TestCpu::CODE - 2);
    assert_eq!(cpu.d[0], 0);

    // FBcc is implemented
    let (mut fpu, mut cpu) = system_with(config);
    fpu.regs.result = 0.0;
    fbcc(&mut fpu, &mut cpu, 0xF281, 0x0010);
    assert_eq!(cpu.pc, TestCpu::CODE + 0x12);
    assert!(!fpu.exception_raised());
}
