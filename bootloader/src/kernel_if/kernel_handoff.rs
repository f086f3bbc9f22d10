/// Loader → Next Stage Handoff
///
/// Builds the parameter block the trusted firmware reads on its first
/// instruction and publishes its address through the shared scratch register.

use bitflags::bitflags;
use core::mem;

use crate::error::{BootError, Result};
use crate::platform::{CacheMaintenance, Register, RegisterFile};

/// Identification stamped into the first four bytes of the block
pub const HANDOFF_MAGIC: [u8; 4] = *b"XLNX";

/// Fixed entry capacity of the block
pub const MAX_HANDOFF_ENTRIES: usize = 10;

bitflags! {
    /// Partition attributes handed to the next stage with each entry
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct HandoffFlags: u32 {
        /// Target runs in AArch32 state (clear: AArch64)
        const AARCH32 = 1 << 0;
        /// Target runs big-endian
        const BIG_ENDIAN = 1 << 1;
        /// Target runs in the secure world
        const SECURE = 1 << 2;
        /// Target exception level, two bits
        const EL_MASK = 0b11 << 3;
        /// Target APU core, two bits
        const CPU_MASK = 0b11 << 5;
    }
}

impl HandoffFlags {
    const EL_SHIFT: u32 = 3;
    const CPU_SHIFT: u32 = 5;

    pub const fn with_exception_level(self, el: u32) -> Self {
        Self::from_bits_retain(
            (self.bits() & !Self::EL_MASK.bits()) | ((el << Self::EL_SHIFT) & Self::EL_MASK.bits()),
        )
    }

    pub const fn exception_level(&self) -> u32 {
        (self.bits() & Self::EL_MASK.bits()) >> Self::EL_SHIFT
    }

    pub const fn with_cpu(self, cpu: u32) -> Self {
        let cpu_bits = (cpu << Self::CPU_SHIFT) & Self::CPU_MASK.bits();
        Self::from_bits_retain((self.bits() & !Self::CPU_MASK.bits()) | cpu_bits)
    }

    pub const fn cpu(&self) -> u32 {
        (self.bits() & Self::CPU_MASK.bits()) >> Self::CPU_SHIFT
    }
}

/// One boot-stage transition
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HandoffEntry {
    /// Address to execute the partition at
    pub entry_point: u64,
    pub partition_flags: u32,
}

impl HandoffEntry {
    pub const EMPTY: Self = Self {
        entry_point: 0,
        partition_flags: 0,
    };
}

/// Parameter block read by the next stage
///
/// Layout matches the consumer's `struct { char magic[4]; u32 num; entry[10]; }`
/// with 64-bit entry pointers.
#[repr(C)]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandoffParams {
    pub magic: [u8; 4],
    pub num_entries: u32,
    pub entries: [HandoffEntry; MAX_HANDOFF_ENTRIES],
}

impl HandoffParams {
    pub const fn new() -> Self {
        Self {
            magic: [0; 4],
            num_entries: 0,
            entries: [HandoffEntry::EMPTY; MAX_HANDOFF_ENTRIES],
        }
    }

    /// Valid entries in order
    pub fn entries(&self) -> &[HandoffEntry] {
        let n = (self.num_entries as usize).min(MAX_HANDOFF_ENTRIES);
        &self.entries[..n]
    }

    pub fn has_magic(&self) -> bool {
        self.magic == HANDOFF_MAGIC
    }

    pub const fn size() -> usize {
        mem::size_of::<Self>()
    }
}

impl Default for HandoffParams {
    fn default() -> Self {
        Self::new()
    }
}

/// Backing storage for the block; lives for the whole program
static HANDOFF_AREA: spin::Mutex<HandoffParams> = spin::Mutex::new(HandoffParams::new());

/// Take exclusive, permanent ownership of the static handoff block
///
/// Succeeds once per program run; the lock is never released, so later calls
/// return `None`.
pub fn claim_static_storage() -> Option<&'static mut HandoffParams> {
    HANDOFF_AREA.try_lock().map(spin::MutexGuard::leak)
}

/// Channel through which the block's address reaches the next stage
pub trait HandoffSink {
    fn publish(&mut self, address: usize) -> Result;
}

/// The PMU global scratch register, written through a register file
pub struct ScratchRegister<'r, R: RegisterFile> {
    regs: &'r mut R,
}

impl<'r, R: RegisterFile> ScratchRegister<'r, R> {
    pub fn new(regs: &'r mut R) -> Self {
        Self { regs }
    }
}

impl<R: RegisterFile> HandoffSink for ScratchRegister<'_, R> {
    fn publish(&mut self, address: usize) -> Result {
        let value = u32::try_from(address).map_err(|_| {
            BootError::Hardware("Handoff block lies above the 32-bit scratch register range")
        })?;
        self.regs.write(Register::HandoffScratch, value);
        Ok(())
    }
}

/// Fills a `'static` block entry by entry and publishes it once
pub struct HandoffBuilder {
    params: &'static mut HandoffParams,
    capacity: usize,
}

impl HandoffBuilder {
    /// Start a fresh block in `params`, accepting at most `capacity` entries
    pub fn new(params: &'static mut HandoffParams, capacity: usize) -> Result<Self> {
        if capacity == 0 || capacity > MAX_HANDOFF_ENTRIES {
            return Err(BootError::InvalidConfig("Handoff capacity must be 1..=10"));
        }
        *params = HandoffParams::new();
        Ok(Self { params, capacity })
    }

    pub fn entry_count(&self) -> u32 {
        self.params.num_entries
    }

    pub fn params(&self) -> &HandoffParams {
        self.params
    }

    /// Append an entry; the magic is stamped on the first one only
    ///
    /// A full table is reported, never silently truncated, and leaves the
    /// block unchanged.
    pub fn add_entry(&mut self, entry_point: u64, flags: HandoffFlags) -> Result {
        let count = self.params.num_entries as usize;
        if count >= self.capacity {
            log::error!(
                "Handoff table full ({} entries); cannot add {:#x}",
                self.capacity,
                entry_point
            );
            return Err(BootError::Allocation("Handoff entry table full"));
        }

        if count == 0 {
            self.params.magic = HANDOFF_MAGIC;
        }

        self.params.entries[count] = HandoffEntry {
            entry_point,
            partition_flags: flags.bits(),
        };
        self.params.num_entries = count as u32 + 1;

        log::debug!(
            "Handoff entry {}: entry={:#x}, flags={:#x}",
            count,
            entry_point,
            flags.bits()
        );
        Ok(())
    }

    /// Flush the block out of the cache and hand its address to `sink`
    pub fn publish<S: HandoffSink, K: CacheMaintenance>(
        self,
        sink: &mut S,
        cache: &mut K,
    ) -> Result<&'static HandoffParams> {
        if self.params.num_entries == 0 {
            return Err(BootError::InvalidState);
        }

        let params: &'static HandoffParams = self.params;
        let address = params as *const HandoffParams as usize;

        cache.flush_range(address as u64, HandoffParams::size());
        cache.barrier();
        sink.publish(address)?;

        log::info!(
            "Handoff block published at {:#x} with {} entries",
            address,
            params.num_entries
        );
        Ok(params)
    }
}
