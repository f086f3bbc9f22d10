//! Zynq UltraScale+ register ABI used during APU bring-up
//!
//! The addresses are fixed by the platform. Everything above this module
//! talks to [`RegisterFile`] so the reset and handoff logic can run against a
//! fake register file in tests.

use crate::utils::mmio::Mmio32;

/// Number of Cortex-A53 cores in the APU cluster
pub const APU_CORE_COUNT: usize = 4;

/// APU_RVBARADDR0L; each core owns a low/high pair, 8 bytes apart
pub const RVBARADDR_BASE: usize = 0xFD5C_0040;
/// CRF_APB RST_FPD_APU; bits 0..3 hold APU cores 0..3 in reset
pub const RST_FPD_APU: usize = 0xFD1A_0104;
/// PMU_GLOBAL GLOBAL_GEN_STORAGE6; the next stage reads the handoff block address here
pub const GLOBAL_GEN_STORAGE6: usize = 0xFFD8_0048;

/// Named hardware register
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Register {
    /// Reset vector base address, low word, for an APU core
    VectorLow(usize),
    /// Reset vector base address, high word, for an APU core
    VectorHigh(usize),
    /// APU core reset control
    ApuReset,
    /// Shared scratch register carrying the handoff block address
    HandoffScratch,
}

impl Register {
    /// Physical address of the register
    pub fn address(&self) -> usize {
        match *self {
            Register::VectorLow(core) => {
                debug_assert!(core < APU_CORE_COUNT);
                RVBARADDR_BASE + core * 8
            }
            Register::VectorHigh(core) => {
                debug_assert!(core < APU_CORE_COUNT);
                RVBARADDR_BASE + core * 8 + 4
            }
            Register::ApuReset => RST_FPD_APU,
            Register::HandoffScratch => GLOBAL_GEN_STORAGE6,
        }
    }
}

/// Access to the bring-up registers
#[cfg_attr(test, mockall::automock)]
pub trait RegisterFile {
    fn read(&self, reg: Register) -> u32;
    fn write(&mut self, reg: Register, value: u32);
}

/// The real registers, reached through volatile MMIO
pub struct MmioRegisterFile {
    _private: (),
}

impl MmioRegisterFile {
    /// # Safety
    ///
    /// Must only be created on the platform whose register map this module
    /// describes, with the CRF_APB, APU and PMU_GLOBAL blocks accessible from
    /// the running core's exception level.
    pub const unsafe fn new() -> Self {
        Self { _private: () }
    }

    fn reg(reg: Register) -> Mmio32 {
        // SAFETY: `Register::address` only yields aligned addresses from the
        // fixed map above, which the constructor's contract makes accessible.
        unsafe { Mmio32::new(reg.address()) }
    }
}

impl RegisterFile for MmioRegisterFile {
    fn read(&self, reg: Register) -> u32 {
        Self::reg(reg).read()
    }

    fn write(&mut self, reg: Register, value: u32) {
        Self::reg(reg).write(value)
    }
}
