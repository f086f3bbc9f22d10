//! ARMv7-R (Cortex-R5) primitives

use core::arch::asm;

/// Cortex-R5 L1 data cache line
const DCACHE_LINE_SIZE: u32 = 32;

/// Core clock used to scale the delay loop
const RPU_CPU_HZ: u32 = 500_000_000;

/// DCCIMVAC over every line in the range, then DSB
pub fn clean_invalidate_dcache_range(address: u64, length: usize) {
    // The RPU address space is 32 bits wide
    let start = address as u32 & !(DCACHE_LINE_SIZE - 1);
    let end = (address as u32).saturating_add(length as u32);
    let mut line = start;
    while line < end {
        unsafe { asm!("mcr p15, 0, {}, c7, c14, 1", in(reg) line, options(nostack)) };
        line = line.wrapping_add(DCACHE_LINE_SIZE);
        if line == 0 {
            break;
        }
    }
    data_sync_barrier();
}

pub fn data_sync_barrier() {
    unsafe { asm!("dsb", options(nostack)) };
}

/// Spin roughly `ms` milliseconds; the R5 has no generic timer
pub fn delay_ms(ms: u32) {
    let per_ms = RPU_CPU_HZ / 1000 / 2;
    for _ in 0..ms {
        for _ in 0..per_ms {
            core::hint::spin_loop();
        }
    }
}

/// The R5 sits outside the APU cluster
pub fn current_apu_core() -> Option<usize> {
    None
}

pub fn wait_for_event() {
    unsafe { asm!("wfe", options(nomem, nostack)) };
}
