use std::str::FromStr;

use anyhow::{Context, Result};
use num_derive::FromPrimitive;
use serde::{Deserialize, Serialize};

/// Integer CPU model the FPU is attached to
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    FromPrimitive,
    strum::Display,
    Default,
)]
#[repr(u32)]
pub enum CpuModel {
    #[default]
    #[strum(serialize = "68020")]
    M68020 = 68020,
    #[strum(serialize = "68030")]
    M68030 = 68030,
    #[strum(serialize = "68040")]
    M68040 = 68040,
    #[strum(serialize = "68060")]
    M68060 = 68060,
}

/// Floating point unit model
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    FromPrimitive,
    strum::Display,
    Default,
)]
#[repr(u32)]
pub enum FpuModel {
    /// No FPU fitted
    #[strum(serialize = "none")]
    None = 0,
    #[default]
    #[strum(serialize = "68881")]
    M68881 = 68881,
    #[strum(serialize = "68882")]
    M68882 = 68882,
    /// 68040 on-chip FPU
    #[strum(serialize = "68040")]
    M68040 = 68040,
    /// 68060 on-chip FPU
    #[strum(serialize = "68060")]
    M68060 = 68060,
}

impl FpuModel {
    pub fn present(self) -> bool {
        self != Self::None
    }

    /// Model number as stored in save states
    pub fn number(self) -> u32 {
        self as u32
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct FpuConfig {
    pub cpu_model: CpuModel,
    pub fpu_model: FpuModel,

    /// Trap opcodes the real hardware leaves to software emulation
    /// (68040/68060 transcendentals, 6888x lacks the rounded variants)
    pub no_unimplemented: bool,

    /// 68030 MMU emulation active: multi-word transfers are restartable
    pub mmu030: bool,
}

impl FpuConfig {
    pub fn new(cpu_model: CpuModel, fpu_model: FpuModel) -> Self {
        Self {
            cpu_model,
            fpu_model,
            ..Default::default()
        }
    }
}

impl FromStr for FpuConfig {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        serde_json::from_str(s).context("Cannot parse FPU configuration")
    }
}
