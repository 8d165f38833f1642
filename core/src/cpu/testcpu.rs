use std::cell::RefCell;
use std::collections::HashMap;

use anyhow::{bail, Result};

use super::{BusCycle, CpuError, CpuInterface, CpuSized};
use crate::types::{Address, Byte, Long, Word};

const SR_SUPERVISOR: Word = 0x2000;
const SR_TRACE: Word = 0xC000;

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Access {
    Read,
    Write,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct TraceEntry {
    pub addr: Address,
    pub access: Access,
    pub cycle: BusCycle,
    pub val: Long,
}

/// Exceptions handed back to the CPU by the FPU
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Taken {
    Illegal(Word),
    Vector(u8),
}

/// Minimal integer CPU with flat memory for exercising the FPU
pub struct TestCpu {
    pub mem: HashMap<Address, Byte>,
    pub d: [Long; 8],
    pub a: [Address; 8],
    pub usp: Address,
    pub isp: Address,
    pub pc: Address,
    pub sr: Word,
    pub vbr: Address,
    pub pcr: Long,
    pub taken: Vec<Taken>,
    pub end_compiles: usize,
    fault_at: Option<Address>,
    trace: RefCell<Vec<TraceEntry>>,
}

impl TestCpu {
    pub const CODE: Address = 0x1000;
    pub const STACK: Address = 0x8000;

    pub fn new() -> Self {
        let mut a = [0; 8];
        a[7] = Self::STACK;
        Self {
            mem: HashMap::new(),
            d: [0; 8],
            a,
            usp: 0,
            isp: Self::STACK,
            pc: Self::CODE,
            sr: SR_SUPERVISOR,
            vbr: 0,
            pcr: 0,
            taken: vec![],
            end_compiles: 0,
            fault_at: None,
            trace: RefCell::new(vec![]),
        }
    }

    /// Places instruction stream words at PC
    pub fn load_stream(&mut self, words: &[Word]) {
        for (i, &w) in words.iter().enumerate() {
            self.poke(self.pc + (i as Address) * 2, w);
        }
    }

    pub fn poke<T: CpuSized>(&mut self, addr: Address, value: T) {
        let v = value.expand();
        for i in 0..T::SIZE {
            let shift = (T::SIZE - 1 - i) * 8;
            self.mem.insert(addr.wrapping_add(i), (v >> shift) as Byte);
        }
    }

    pub fn peek<T: CpuSized>(&self, addr: Address) -> T {
        let mut v: Long = 0;
        for i in 0..T::SIZE {
            v = (v << 8) | Long::from(*self.mem.get(&addr.wrapping_add(i)).unwrap_or(&0));
        }
        T::chop(v)
    }

    /// Makes the next access touching `addr` fail once
    pub fn fault_once(&mut self, addr: Address) {
        self.fault_at = Some(addr);
    }

    pub fn get_trace(&self) -> Vec<TraceEntry> {
        self.trace.borrow().clone()
    }

    pub fn reset_trace(&mut self) {
        self.trace.borrow_mut().clear();
    }

    fn check_fault(&mut self, addr: Address, size: Address) -> Result<()> {
        if let Some(f) = self.fault_at
            && f >= addr
            && f < addr.wrapping_add(size)
        {
            self.fault_at = None;
            return Err(CpuError::AccessFault(f).into());
        }
        Ok(())
    }
}

impl CpuInterface for TestCpu {
    fn get_pc(&self) -> Address {
        self.pc
    }

    fn set_pc(&mut self, pc: Address) {
        self.pc = pc;
    }

    fn read_d(&self, reg: usize) -> Long {
        self.d[reg]
    }

    fn write_d(&mut self, reg: usize, value: Long) {
        self.d[reg] = value;
    }

    fn read_a(&self, reg: usize) -> Address {
        self.a[reg]
    }

    fn write_a(&mut self, reg: usize, value: Address) {
        self.a[reg] = value;
    }

    fn next_iword(&mut self) -> Result<Word> {
        let w = self.peek::<Word>(self.pc);
        self.pc = self.pc.wrapping_add(2);
        Ok(w)
    }

    fn disp_ea_020(&mut self, base: Address) -> Result<Address> {
        let ext = self.next_iword()?;
        if ext & (1 << 8) != 0 {
            bail!("Full format extension word {:04X} not supported", ext);
        }
        let reg = usize::from((ext >> 12) & 7);
        let index = if ext & 0x8000 != 0 {
            self.a[reg]
        } else {
            self.d[reg]
        };
        let index = if ext & (1 << 11) != 0 {
            index
        } else {
            (index as Word).expand_sign_extend()
        };
        let scale = (ext >> 9) & 3;
        let disp = (ext as Byte).expand_sign_extend();
        Ok(base.wrapping_add(disp).wrapping_add(index << scale))
    }

    fn read<T: CpuSized>(&mut self, cycle: BusCycle, addr: Address) -> Result<T> {
        self.check_fault(addr, T::SIZE)?;
        let val = self.peek::<T>(addr);
        self.trace.borrow_mut().push(TraceEntry {
            addr,
            access: Access::Read,
            cycle,
            val: val.expand(),
        });
        Ok(val)
    }

    fn write<T: CpuSized>(&mut self, cycle: BusCycle, addr: Address, value: T) -> Result<()> {
        self.check_fault(addr, T::SIZE)?;
        self.poke(addr, value);
        self.trace.borrow_mut().push(TraceEntry {
            addr,
            access: Access::Write,
            cycle,
            val: value.expand(),
        });
        Ok(())
    }

    fn vbr(&self) -> Address {
        self.vbr
    }

    fn pcr(&self) -> Long {
        self.pcr
    }

    fn enter_exception(&mut self) -> Word {
        let sr = self.sr;
        self.sr &= !SR_TRACE;
        if self.sr & SR_SUPERVISOR == 0 {
            self.usp = self.a[7];
            self.a[7] = self.isp;
            self.sr |= SR_SUPERVISOR;
        }
        sr
    }

    fn illegal_instruction(&mut self, opcode: Word) -> Result<()> {
        self.taken.push(Taken::Illegal(opcode));
        Ok(())
    }

    fn exception(&mut self, vector: u8) -> Result<()> {
        self.taken.push(Taken::Vector(vector));
        Ok(())
    }

    fn end_compile(&mut self) {
        self.end_compiles += 1;
    }
}
