//! AArch64 (Cortex-A53) primitives

use core::arch::asm;

/// Smallest data cache line, from CTR_EL0.DminLine
fn dcache_line_size() -> u64 {
    let ctr: u64;
    unsafe { asm!("mrs {}, ctr_el0", out(reg) ctr, options(nomem, nostack)) };
    4 << ((ctr >> 16) & 0xF)
}

/// Clean and invalidate to the point of coherency, then wait for completion
pub fn clean_invalidate_dcache_range(address: u64, length: usize) {
    let line = dcache_line_size();
    let end = address.saturating_add(length as u64);
    let mut line_addr = address & !(line - 1);
    while line_addr < end {
        unsafe { asm!("dc civac, {}", in(reg) line_addr, options(nostack)) };
        line_addr += line;
    }
    data_sync_barrier();
}

pub fn data_sync_barrier() {
    unsafe { asm!("dsb sy", options(nostack)) };
}

/// Busy-wait on the generic timer's physical count
pub fn delay_ms(ms: u32) {
    let freq: u64;
    let start: u64;
    unsafe {
        asm!("mrs {}, cntfrq_el0", out(reg) freq, options(nomem, nostack));
        asm!("isb", "mrs {}, cntpct_el0", out(reg) start, options(nostack));
    }
    let ticks = freq / 1000 * ms as u64;
    loop {
        let now: u64;
        unsafe { asm!("isb", "mrs {}, cntpct_el0", out(reg) now, options(nostack)) };
        if now.wrapping_sub(start) >= ticks {
            break;
        }
    }
}

/// Index of the running A53 within the cluster, MPIDR_EL1.Aff0
pub fn current_apu_core() -> Option<usize> {
    let mpidr: u64;
    unsafe { asm!("mrs {}, mpidr_el1", out(reg) mpidr, options(nomem, nostack)) };
    Some((mpidr & 0xFF) as usize)
}

pub fn wait_for_event() {
    unsafe { asm!("wfe", options(nomem, nostack)) };
}
