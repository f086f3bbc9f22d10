// 32-bit memory-mapped register access

use core::ptr::{read_volatile, write_volatile};

/// One 32-bit device register; every register the loader touches is this width
pub struct Mmio32 {
    addr: *mut u32,
}

impl Mmio32 {
    /// # Safety
    /// - `addr` must be the 4-byte aligned address of a 32-bit register (or
    ///   ordinary memory standing in for one)
    /// - the register must be readable and writable from the running core
    pub const unsafe fn new(addr: usize) -> Self {
        Self {
            addr: addr as *mut u32,
        }
    }

    pub fn read(&self) -> u32 {
        // SAFETY: validity of `addr` was promised by the caller of `new`.
        unsafe { read_volatile(self.addr) }
    }

    pub fn write(&mut self, val: u32) {
        // SAFETY: as for `read`.
        unsafe { write_volatile(self.addr, val) }
    }
}
