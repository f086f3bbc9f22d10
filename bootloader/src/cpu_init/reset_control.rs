//! APU Reset Control - vector programming and core release
//!
//! Cores are redirected by holding them in reset, rewriting their reset
//! vector base address registers and letting them go. The hold → program →
//! release order is encoded in the types: only [`ProgrammedCores`] can
//! release, and it can only be obtained by programming every held core.

use bitflags::bitflags;
use core::fmt;

use crate::error::{BootError, Result};
use crate::platform::{CacheMaintenance, Register, RegisterFile, APU_CORE_COUNT};

bitflags! {
    /// Set of APU cores, laid out like the reset control register
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct CoreMask: u32 {
        const CORE0 = 1 << 0;
        const CORE1 = 1 << 1;
        const CORE2 = 1 << 2;
        const CORE3 = 1 << 3;
        const ALL = Self::CORE0.bits()
            | Self::CORE1.bits()
            | Self::CORE2.bits()
            | Self::CORE3.bits();
    }
}

impl CoreMask {
    /// Mask holding a single core
    pub fn core(index: usize) -> Option<Self> {
        if index < APU_CORE_COUNT {
            Some(Self::from_bits_retain(1 << index))
        } else {
            None
        }
    }

    /// Core indices in ascending order
    pub fn cores(&self) -> impl Iterator<Item = usize> + '_ {
        (0..APU_CORE_COUNT).filter(move |&i| self.bits() & (1 << i) != 0)
    }
}

/// Reset vector of one core as read back from its register pair
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResetVector {
    pub low: u32,
    pub high: u32,
}

impl fmt::Display for ResetVector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "H={:#010x} L={:#010x}", self.high, self.low)
    }
}

/// Value written to the low vector word
pub const RVBARADDR_LOW_VALUE: u32 = 0;

/// Raw access to the APU reset and vector registers
pub struct ResetController<'a, R: RegisterFile, K: CacheMaintenance> {
    regs: &'a mut R,
    cache: &'a mut K,
}

impl<'a, R: RegisterFile, K: CacheMaintenance> ResetController<'a, R, K> {
    pub fn new(regs: &'a mut R, cache: &'a mut K) -> Self {
        Self { regs, cache }
    }

    /// Hold `mask` in reset, leaving other bits of the register alone
    pub fn assert_reset(&mut self, mask: CoreMask) {
        let value = self.regs.read(Register::ApuReset);
        self.regs.write(Register::ApuReset, value | mask.bits());
    }

    /// Let `mask` out of reset once all outstanding cache maintenance is done
    pub fn release_reset(&mut self, mask: CoreMask) {
        self.cache.barrier();
        let value = self.regs.read(Register::ApuReset);
        self.regs.write(Register::ApuReset, value & !mask.bits());
    }

    /// Cores currently held in reset
    pub fn held(&self) -> CoreMask {
        CoreMask::from_bits_truncate(self.regs.read(Register::ApuReset))
    }

    pub fn vector(&self, core: usize) -> Result<ResetVector> {
        check_core(core)?;
        Ok(ResetVector {
            low: self.regs.read(Register::VectorLow(core)),
            high: self.regs.read(Register::VectorHigh(core)),
        })
    }

    /// Point `core` at `address`: low word zero, high word the address
    ///
    /// The pair is read back; a register that did not take its value is a
    /// hardware fault.
    pub fn program_vector(&mut self, core: usize, address: u32) -> Result {
        check_core(core)?;
        self.regs.write(Register::VectorLow(core), RVBARADDR_LOW_VALUE);
        self.regs.write(Register::VectorHigh(core), address);

        let readback = self.vector(core)?;
        if readback.low != RVBARADDR_LOW_VALUE || readback.high != address {
            log::error!(
                "APU core {} vector read back as {} after writing {:#010x}",
                core,
                readback,
                address
            );
            return Err(BootError::Hardware(
                "Reset vector register did not take the programmed value",
            ));
        }
        Ok(())
    }

    /// Begin a bring-up: hold `mask` in reset
    pub fn hold(mut self, mask: CoreMask) -> Result<HeldCores<'a, R, K>> {
        if mask.is_empty() {
            return Err(BootError::InvalidConfig("No APU cores selected for bring-up"));
        }
        log::info!("Placing APU core(s) {:#x} in reset state", mask.bits());
        self.assert_reset(mask);
        Ok(HeldCores { ctrl: self, mask })
    }

    fn log_vectors(&self, mask: CoreMask, what: &str) {
        for core in mask.cores() {
            if let Ok(vector) = self.vector(core) {
                log::info!("RVBARADDR{} {}: {}", core, what, vector);
            }
        }
    }
}

fn check_core(core: usize) -> Result {
    if core < APU_CORE_COUNT {
        Ok(())
    } else {
        Err(BootError::Hardware("Core index outside the APU cluster"))
    }
}

/// Cores held in reset, vectors not yet programmed
pub struct HeldCores<'a, R: RegisterFile, K: CacheMaintenance> {
    ctrl: ResetController<'a, R, K>,
    mask: CoreMask,
}

impl<'a, R: RegisterFile, K: CacheMaintenance> HeldCores<'a, R, K> {
    /// Program every held core to start at `entry`
    ///
    /// On failure the whole mask is put back into reset before the error is
    /// returned; no core leaves reset half-configured.
    pub fn program_vectors(mut self, entry: u32) -> Result<ProgrammedCores<'a, R, K>> {
        self.ctrl.log_vectors(self.mask, "current");
        log::info!("Relocating APU core(s) PC to {:#010x}", entry);

        for core in self.mask.cores() {
            if let Err(err) = self.ctrl.program_vector(core, entry) {
                self.ctrl.assert_reset(self.mask);
                return Err(err);
            }
        }

        self.ctrl.log_vectors(self.mask, "updated");
        Ok(ProgrammedCores {
            ctrl: self.ctrl,
            mask: self.mask,
            entry,
        })
    }
}

/// Cores held in reset with their vectors programmed
pub struct ProgrammedCores<'a, R: RegisterFile, K: CacheMaintenance> {
    ctrl: ResetController<'a, R, K>,
    mask: CoreMask,
    entry: u32,
}

impl<R: RegisterFile, K: CacheMaintenance> ProgrammedCores<'_, R, K> {
    /// Release the cores; they start fetching at the programmed vector
    ///
    /// If the reset register still shows any of the cores held afterwards,
    /// the mask is re-asserted and a hardware fault returned.
    pub fn release(mut self) -> Result {
        log::info!(
            "Clearing APU core(s) {:#x} reset state, start at {:#010x}",
            self.mask.bits(),
            self.entry
        );
        self.ctrl.release_reset(self.mask);

        if self.ctrl.held().intersects(self.mask) {
            self.ctrl.assert_reset(self.mask);
            return Err(BootError::Hardware("APU cores did not leave reset"));
        }
        Ok(())
    }
}
