//! Data cache maintenance contract

/// Cache operations the loader depends on for cross-core visibility
///
/// Every byte written into a region another core will execute or read must be
/// flushed before that core leaves reset, and the flush must have completed
/// (`barrier`) before the reset release is issued.
pub trait CacheMaintenance {
    /// Clean and invalidate the data cache over `[address, address + length)`
    fn flush_range(&mut self, address: u64, length: usize);

    /// Wait until all outstanding maintenance and memory accesses are complete
    fn barrier(&mut self);
}
