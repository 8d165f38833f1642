use super::*;
use crate::cpu::testcpu::{Access, Taken};
use crate::cpu::{BusCycle, CpuError};
use crate::fpu::storage::BitsExtReal;

fn fpu68882() -> (Fpu, TestCpu) {
    system(CpuModel::M68030, FpuModel::M68882)
}

fn fpu_mmu() -> (Fpu, TestCpu) {
    let config = FpuConfig {
        mmu030: true,
        ..FpuConfig::new(CpuModel::M68030, FpuModel::M68882)
    };
    system_with(config)
}

fn peek_ext(cpu: &TestCpu, addr: Address) -> f64 {
    BitsExtReal::from_longs(
        cpu.peek(addr),
        cpu.peek(addr + 4),
        cpu.peek(addr + 8),
    )
    .into()
}

fn poke_ext(cpu: &mut TestCpu, addr: Address, value: f64) {
    for (i, l) in BitsExtReal::from(value).longs().into_iter().enumerate() {
        cpu.poke(addr + 4 * i as Address, l);
    }
}

/// Runs an instruction that is expected to hit an access fault
fn faulting(fpu: &mut Fpu, cpu: &mut TestCpu, code: &[Word]) -> Address {
    load(cpu, code, 2);
    let err = fpu.op_arithmetic(cpu, code[0], code[1]).unwrap_err();
    match err.downcast_ref::<CpuError>() {
        Some(CpuError::AccessFault(addr)) => *addr,
        None => panic!("Unexpected error {}", err),
    }
}

#[test]
fn save_restore_all() {
    let (mut fpu, mut cpu) = fpu68882();
    let values = [1.0, -2.0, 3.5, 0.0, f64::INFINITY, 1e100, -1e-100, 8.0];
    fpu.regs.fp = values;

    // FMOVEM.X FP0-FP7,-(A7)
    general(&mut fpu, &mut cpu, &[0xF227, 0xE0FF]);
    assert_eq!(cpu.a[7], TestCpu::STACK - 96);
    for (i, &v) in values.iter().enumerate() {
        assert_eq!(peek_ext(&cpu, TestCpu::STACK - 96 + 12 * i as Address), v);
    }
    let trace = cpu.get_trace();
    assert_eq!(trace.len(), 24);
    assert!(trace
        .iter()
        .all(|t| t.access == Access::Write && t.cycle == BusCycle::Data));
    // Highest register first, mantissa low word first
    assert_eq!(trace[0].addr, TestCpu::STACK - 4);
    assert_eq!(trace[2].addr, TestCpu::STACK - 12);

    fpu.regs.fp = [0.0; 8];
    cpu.reset_trace();

    // FMOVEM.X (A7)+,FP0-FP7
    general(&mut fpu, &mut cpu, &[0xF21F, 0xD0FF]);
    assert_eq!(cpu.a[7], TestCpu::STACK);
    assert_eq!(fpu.regs.fp, values);
    assert_eq!(cpu.get_trace()[0].addr, TestCpu::STACK - 96);
}

#[test]
fn partial_lists() {
    let (mut fpu, mut cpu) = fpu68882();
    fpu.regs.fp[0] = 1.25;
    fpu.regs.fp[2] = -7.0;

    // FMOVEM.X FP0/FP2,-(A7)
    general(&mut fpu, &mut cpu, &[0xF227, 0xE005]);
    assert_eq!(cpu.a[7], TestCpu::STACK - 24);
    assert_eq!(peek_ext(&cpu, TestCpu::STACK - 24), 1.25);
    assert_eq!(peek_ext(&cpu, TestCpu::STACK - 12), -7.0);

    // FMOVEM.X (A0)+,FP0/FP2
    cpu.a[0] = TestCpu::STACK - 24;
    fpu.regs.fp = [0.0; 8];
    general(&mut fpu, &mut cpu, &[0xF218, 0xD0A0]);
    assert_eq!(fpu.regs.fp[0], 1.25);
    assert_eq!(fpu.regs.fp[2], -7.0);
    assert_eq!(cpu.a[0], TestCpu::STACK);

    // FMOVEM.X (d16,A0),FP1 leaves A0 alone
    general(&mut fpu, &mut cpu, &[0xF228, 0xD040, 0xFFF4]);
    assert_eq!(fpu.regs.fp[1], -7.0);
    assert_eq!(cpu.a[0], TestCpu::STACK);
}

#[test]
fn dynamic_list() {
    let (mut fpu, mut cpu) = fpu68882();
    fpu.regs.fp[0] = 1.0;
    fpu.regs.fp[1] = 2.0;
    cpu.d[3] = 0xFFFF_FF03;

    // FMOVEM.X D3,-(A7)
    general(&mut fpu, &mut cpu, &[0xF227, 0xE830]);
    assert_eq!(cpu.a[7], TestCpu::STACK - 24);
    assert_eq!(peek_ext(&cpu, TestCpu::STACK - 24), 1.0);
    assert_eq!(peek_ext(&cpu, TestCpu::STACK - 12), 2.0);

    // FMOVEM.X (A7)+,D7
    fpu.regs.fp = [0.0; 8];
    cpu.d[7] = 0xC0;
    general(&mut fpu, &mut cpu, &[0xF21F, 0xD870]);
    assert_eq!(fpu.regs.fp[0], 1.0);
    assert_eq!(fpu.regs.fp[1], 2.0);
    assert_eq!(cpu.a[7], TestCpu::STACK);
}

#[test]
fn register_direct_list() {
    let (mut fpu, mut cpu) = fpu68882();

    // FMOVEM.X FP0-FP7,D0 does not exist
    general(&mut fpu, &mut cpu, &[0xF200, 0xE0FF]);
    assert_eq!(cpu.taken, [Taken::Illegal(0xF200)]);
    assert_eq!(cpu.pc, TestCpu::CODE);
}

#[test]
fn control_registers() {
    let (mut fpu, mut cpu) = fpu68882();

    // FMOVE.L D1,FPCR
    cpu.d[1] = 0x0000_3A50;
    general(&mut fpu, &mut cpu, &[0xF201, 0x9000]);
    assert_eq!(fpu.regs.fpcr.0, 0x3A50);
    assert_eq!(fpu.regs.fpcr.rnd(), 0b01);

    // FMOVE.L FPSR,D2
    fpu.set_fpsr(0x0800_0208);
    general(&mut fpu, &mut cpu, &[0xF202, 0xA800]);
    assert_eq!(cpu.d[2], 0x0800_0208);

    // FMOVE.L #$12345678,FPIAR
    general(&mut fpu, &mut cpu, &[0xF23C, 0x8400, 0x1234, 0x5678]);
    assert_eq!(fpu.regs.fpiar, 0x1234_5678);
    assert_eq!(cpu.pc, TestCpu::CODE + 8);

    // FMOVEM.L FPCR/FPSR/FPIAR,-(A0)
    cpu.a[0] = DATA + 12;
    general(&mut fpu, &mut cpu, &[0xF220, 0xBC00]);
    assert_eq!(cpu.a[0], DATA);
    assert_eq!(cpu.peek::<Long>(DATA), 0x3A50);
    assert_eq!(cpu.peek::<Long>(DATA + 4), 0x0800_0208);
    assert_eq!(cpu.peek::<Long>(DATA + 8), 0x1234_5678);
    assert!(cpu
        .get_trace()
        .iter()
        .all(|t| t.cycle == BusCycle::Coprocessor));

    // FMOVEM.L (A0)+,FPCR/FPSR/FPIAR
    fpu.reset();
    general(&mut fpu, &mut cpu, &[0xF218, 0x9C00]);
    assert_eq!(cpu.a[0], DATA + 12);
    assert_eq!(fpu.regs.fpcr.0, 0x3A50);
    assert_eq!(fpu.get_fpsr(), 0x0800_0208);
    assert_eq!(fpu.regs.fpiar, 0x1234_5678);
}

#[test]
fn control_register_fpcr_readback() {
    let (mut fpu, mut cpu) = fpu68882();
    cpu.d[1] = 0xFFFF_FFFF;

    // FMOVE.L D1,FPCR / FMOVE.L FPCR,D1
    general(&mut fpu, &mut cpu, &[0xF201, 0x9000]);
    general(&mut fpu, &mut cpu, &[0xF201, 0xB000]);
    assert_eq!(cpu.d[1], 0xFFFF);
}

#[test]
fn restart_store() {
    let (mut fpu, mut cpu) = fpu_mmu();
    fpu.regs.fp[0] = 1.5;
    fpu.regs.fp[1] = -2.0;
    let code = [0xF227, 0xE003];

    // FMOVEM.X FP0/FP1,-(A7), FP0's mantissa high word faults
    cpu.fault_once(TestCpu::STACK - 20);
    assert_eq!(faulting(&mut fpu, &mut cpu, &code), TestCpu::STACK - 20);
    assert_eq!(cpu.get_trace().len(), 4);
    assert_eq!(cpu.a[7], TestCpu::STACK);
    assert!(fpu.transfer_cursor().in_flight());
    assert_eq!(fpu.transfer_cursor().index(), 4);

    // Restarted from the top, only the outstanding words are written
    cpu.reset_trace();
    general(&mut fpu, &mut cpu, &code);
    let addrs: Vec<_> = cpu.get_trace().iter().map(|t| t.addr).collect();
    assert_eq!(addrs, [TestCpu::STACK - 20, TestCpu::STACK - 24]);
    assert_eq!(cpu.a[7], TestCpu::STACK - 24);
    assert_eq!(peek_ext(&cpu, TestCpu::STACK - 24), 1.5);
    assert_eq!(peek_ext(&cpu, TestCpu::STACK - 12), -2.0);
    assert!(!fpu.transfer_cursor().in_flight());
}

#[test]
fn restart_store_completed() {
    let (mut fpu, mut cpu) = fpu_mmu();
    fpu.regs.fp[0] = 1.5;
    fpu.regs.fp[1] = -2.0;
    let code = [0xF227, 0xE003];

    cpu.fault_once(TestCpu::STACK - 20);
    faulting(&mut fpu, &mut cpu, &code);

    // The fault handler finishes the access
    let data = fpu.transfer_cursor().data_buffer();
    assert_eq!(data, BitsExtReal::from(1.5).longs()[1]);
    cpu.poke(TestCpu::STACK - 20, data);
    fpu.transfer_cursor_mut().complete_pending(data);

    cpu.reset_trace();
    general(&mut fpu, &mut cpu, &code);
    let addrs: Vec<_> = cpu.get_trace().iter().map(|t| t.addr).collect();
    assert_eq!(addrs, [TestCpu::STACK - 24]);
    assert_eq!(peek_ext(&cpu, TestCpu::STACK - 24), 1.5);
}

#[test]
fn restart_load() {
    let (mut fpu, mut cpu) = fpu_mmu();
    cpu.a[0] = DATA;
    poke_ext(&mut cpu, DATA, 3.0);
    poke_ext(&mut cpu, DATA + 12, -4.0);
    let code = [0xF218, 0xD0C0];

    // FMOVEM.X (A0)+,FP0/FP1, FP1's mantissa high word faults
    cpu.fault_once(DATA + 16);
    assert_eq!(faulting(&mut fpu, &mut cpu, &code), DATA + 16);
    assert_eq!(fpu.regs.fp[0], 3.0);
    assert_eq!(fpu.regs.fp[1], 0.0);
    assert_eq!(cpu.a[0], DATA);

    let data = cpu.peek::<Long>(DATA + 16);
    fpu.transfer_cursor_mut().complete_pending(data);
    cpu.reset_trace();
    general(&mut fpu, &mut cpu, &code);
    let addrs: Vec<_> = cpu.get_trace().iter().map(|t| t.addr).collect();
    assert_eq!(addrs, [DATA + 20]);
    assert_eq!(fpu.regs.fp[0], 3.0);
    assert_eq!(fpu.regs.fp[1], -4.0);
    assert_eq!(cpu.a[0], DATA + 24);
}

#[test]
fn restart_other_instruction() {
    let (mut fpu, mut cpu) = fpu_mmu();
    fpu.regs.fp[0] = 1.5;

    // FMOVEM.X FP0,-(A7) faults and is abandoned
    cpu.fault_once(TestCpu::STACK - 8);
    faulting(&mut fpu, &mut cpu, &[0xF227, 0xE001]);
    assert!(fpu.transfer_cursor().in_flight());

    // A different instruction starts a fresh transfer
    cpu.a[0] = DATA;
    cpu.pc = TestCpu::CODE + 0x10;
    cpu.load_stream(&[0xF210, 0xF080]);
    cpu.pc = TestCpu::CODE + 0x14;
    fpu.op_arithmetic(&mut cpu, 0xF210, 0xF080).unwrap();
    assert_eq!(peek_ext(&cpu, DATA), 1.5);
    assert!(!fpu.transfer_cursor().in_flight());
}
