//! Boot-time heap for no_std builds
//!
//! A bump allocator over a fixed static array. The loader only allocates the
//! program header table and the per-image segment list, both released before
//! the next image, so freed space is never reused.

use core::alloc::{GlobalAlloc, Layout};
use core::cell::UnsafeCell;
use core::ptr;
use core::sync::atomic::{AtomicUsize, Ordering};

/// Heap size used by the firmware binary
pub const BOOTLOADER_HEAP_SIZE: usize = 256 * 1024;
/// Minimum alignment of every block
pub const BOOTLOADER_HEAP_ALIGN: usize = 16;

#[repr(C, align(16))]
struct Arena<const N: usize>([u8; N]);

pub struct BumpAllocator<const N: usize> {
    heap: UnsafeCell<Arena<N>>,
    offset: AtomicUsize,
}

impl<const N: usize> BumpAllocator<N> {
    pub const fn new() -> Self {
        Self {
            heap: UnsafeCell::new(Arena([0; N])),
            offset: AtomicUsize::new(0),
        }
    }

    /// Get current allocation offset
    pub fn allocated(&self) -> usize {
        self.offset.load(Ordering::Relaxed)
    }

    /// Get remaining free space
    pub fn free(&self) -> usize {
        N - self.allocated()
    }

    fn align_up(offset: usize, align: usize) -> Option<usize> {
        Some(offset.checked_add(align - 1)? & !(align - 1))
    }
}

impl<const N: usize> Default for BumpAllocator<N> {
    fn default() -> Self {
        Self::new()
    }
}

// SAFETY: the offset is only advanced by compare-exchange; handed-out ranges
// never overlap.
unsafe impl<const N: usize> Sync for BumpAllocator<N> {}

unsafe impl<const N: usize> GlobalAlloc for BumpAllocator<N> {
    unsafe fn alloc(&self, layout: Layout) -> *mut u8 {
        let align = layout.align().max(BOOTLOADER_HEAP_ALIGN);
        let mut current = self.offset.load(Ordering::Relaxed);
        loop {
            let Some(start) = Self::align_up(current, align) else {
                return ptr::null_mut();
            };
            let end = match start.checked_add(layout.size()) {
                Some(end) if end <= N => end,
                _ => return ptr::null_mut(),
            };
            match self
                .offset
                .compare_exchange_weak(current, end, Ordering::AcqRel, Ordering::Relaxed)
            {
                // SAFETY: `start + size <= N`, inside the arena
                Ok(_) => return unsafe { (self.heap.get() as *mut u8).add(start) },
                Err(seen) => current = seen,
            }
        }
    }

    unsafe fn dealloc(&self, _ptr: *mut u8, _layout: Layout) {}
}
