//! Whole-instruction tests, driven through the test CPU

mod branch;
mod movem;

use super::config::{CpuModel, FpuConfig, FpuModel};
use super::storage::f64_to_double;
use super::Fpu;
use crate::cpu::testcpu::TestCpu;
use crate::types::{Address, Long, Word};

/// Operand scratch area
const DATA: Address = 0x4000;
/// Exception handlers are placed here
const HANDLER: Address = 0x6000;

fn system(cpu_model: CpuModel, fpu_model: FpuModel) -> (Fpu, TestCpu) {
    system_with(FpuConfig::new(cpu_model, fpu_model))
}

fn system_with(config: FpuConfig) -> (Fpu, TestCpu) {
    let fpu = Fpu::new(config);
    let mut cpu = TestCpu::new();
    for vector in 0..64 {
        cpu.poke::<Long>(vector * 4, HANDLER + vector * 4);
    }
    (fpu, cpu)
}

/// Places an instruction at the code address and positions PC after the
/// first `fetched` words.
fn load(cpu: &mut TestCpu, code: &[Word], fetched: Address) {
    cpu.pc = TestCpu::CODE;
    cpu.load_stream(code);
    cpu.pc = TestCpu::CODE + fetched * 2;
}

/// Runs a general instruction (opcode, command word, extension words)
fn general(fpu: &mut Fpu, cpu: &mut TestCpu, code: &[Word]) {
    load(cpu, code, 2);
    fpu.op_arithmetic(cpu, code[0], code[1]).unwrap();
}

fn poke_double(cpu: &mut TestCpu, addr: Address, value: f64) {
    let [hi, lo] = f64_to_double(value);
    cpu.poke(addr, hi);
    cpu.poke(addr + 4, lo);
}

fn peek_double(cpu: &TestCpu, addr: Address) -> f64 {
    let hi = u64::from(cpu.peek::<Long>(addr));
    let lo = u64::from(cpu.peek::<Long>(addr + 4));
    f64::from_bits((hi << 32) | lo)
}
