//! Architecture support for the two MPSoC processing units
//!
//! AArch64 for the Cortex-A53 APU, ARMv7-R for the Cortex-R5 RPU. Other
//! targets (host test builds) get portable stand-ins.

#[cfg(target_arch = "aarch64")]
mod aarch64;
#[cfg(target_arch = "aarch64")]
use aarch64 as cpu;

#[cfg(target_arch = "arm")]
mod arm;
#[cfg(target_arch = "arm")]
use arm as cpu;

#[cfg(not(any(target_arch = "aarch64", target_arch = "arm")))]
mod cpu {
    use core::sync::atomic::{fence, Ordering};

    pub fn clean_invalidate_dcache_range(_address: u64, _length: usize) {
        fence(Ordering::SeqCst);
    }

    pub fn data_sync_barrier() {
        fence(Ordering::SeqCst);
    }

    pub fn delay_ms(_ms: u32) {}

    pub fn current_apu_core() -> Option<usize> {
        None
    }

    pub fn wait_for_event() {
        core::hint::spin_loop();
    }
}

use crate::platform::CacheMaintenance;

/// Data cache maintenance by virtual address on the running core
#[derive(Debug, Default)]
pub struct ArchCache;

impl CacheMaintenance for ArchCache {
    fn flush_range(&mut self, address: u64, length: usize) {
        if length != 0 {
            cpu::clean_invalidate_dcache_range(address, length);
        }
    }

    fn barrier(&mut self) {
        cpu::data_sync_barrier();
    }
}

/// Busy-wait for `ms` milliseconds
pub fn delay_ms(ms: u32) {
    cpu::delay_ms(ms);
}

/// APU core the loader is running on, `None` when it runs on the RPU
pub fn current_apu_core() -> Option<usize> {
    cpu::current_apu_core()
}

/// Park the running core for good
pub fn halt() -> ! {
    loop {
        cpu::wait_for_event();
    }
}
