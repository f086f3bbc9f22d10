//! Physical memory sink for segment data
//!
//! Load addresses come straight from the image's program headers and are used
//! without translation. The loader owns none of that memory; the image's
//! link map is the contract.

use crate::error::{BootError, Result};

/// Destination for segment bytes
pub trait PhysicalMemory {
    /// Copy `bytes` to physical `address`
    fn write(&mut self, address: u64, bytes: &[u8]) -> Result;

    /// Zero `length` bytes starting at physical `address`
    fn zero(&mut self, address: u64, length: u64) -> Result;
}

/// Identity-mapped physical memory of the running core
pub struct DirectMemory {
    _private: (),
}

impl DirectMemory {
    /// # Safety
    ///
    /// Caller must guarantee that every address later handed to `write` or
    /// `zero` is identity-mapped, writable, and not used by the loader itself
    /// (stack, heap, code, handoff block).
    pub const unsafe fn new() -> Self {
        Self { _private: () }
    }

    fn to_ptr(address: u64, length: u64) -> Result<*mut u8> {
        let start = usize::try_from(address)
            .map_err(|_| BootError::Format("segment address exceeds the address space"))?;
        let length = usize::try_from(length)
            .map_err(|_| BootError::Format("segment length exceeds the address space"))?;
        start
            .checked_add(length)
            .ok_or(BootError::Format("segment wraps the address space"))?;
        Ok(start as *mut u8)
    }
}

impl PhysicalMemory for DirectMemory {
    fn write(&mut self, address: u64, bytes: &[u8]) -> Result {
        let dst = Self::to_ptr(address, bytes.len() as u64)?;
        // SAFETY: the range is valid and writable per the contract of `new`,
        // and the source buffer belongs to the loader so the two cannot overlap.
        unsafe { core::ptr::copy_nonoverlapping(bytes.as_ptr(), dst, bytes.len()) };
        Ok(())
    }

    fn zero(&mut self, address: u64, length: u64) -> Result {
        let dst = Self::to_ptr(address, length)?;
        // SAFETY: see `write`; `to_ptr` proved `length` fits in usize.
        unsafe { core::ptr::write_bytes(dst, 0, length as usize) };
        Ok(())
    }
}
