//! Memory - boot heap

pub mod allocator;

pub use allocator::{BumpAllocator, BOOTLOADER_HEAP_SIZE};
