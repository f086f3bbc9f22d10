//! Platform Abstraction - storage, cache, physical memory and register contracts

pub mod cache;
#[cfg(target_os = "none")]
pub mod fatfs;
pub mod memory;
pub mod registers;
pub mod storage;

pub use cache::CacheMaintenance;
pub use memory::{DirectMemory, PhysicalMemory};
pub use registers::{MmioRegisterFile, Register, RegisterFile, APU_CORE_COUNT};
pub use storage::{read_fully, ImageFile, Volume};
