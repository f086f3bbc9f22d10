//! Bootloader error handling
//!
//! Every fallible step of the boot pass returns [`Result`]. Errors are never
//! retried: the first one aborts the pass, the binary logs it and parks the
//! controlling core.

use core::fmt;

/// Storage operation that failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageOp {
    Mount,
    Open,
    Read,
    Seek,
}

impl StorageOp {
    pub fn as_str(&self) -> &'static str {
        match self {
            StorageOp::Mount => "mount",
            StorageOp::Open => "open",
            StorageOp::Read => "read",
            StorageOp::Seek => "seek",
        }
    }
}

/// Failure reported by the storage driver
///
/// `status` is the driver's raw result code. A read that returns zero bytes
/// before the requested range is complete is reported with status 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StorageError {
    pub op: StorageOp,
    pub status: u32,
}

impl StorageError {
    pub const fn new(op: StorageOp, status: u32) -> Self {
        Self { op, status }
    }
}

impl fmt::Display for StorageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} failed (status {})", self.op.as_str(), self.status)
    }
}

/// Bootloader error type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BootError {
    /// Mount, open, read or seek failure
    Storage(StorageError),

    /// Bad magic, wrong class, truncated header or table, bad table offset
    Format(&'static str),

    /// Descriptor table allocation failed or a fixed table is full
    Allocation(&'static str),

    /// A program header's file range lies outside the image
    SegmentBounds {
        index: usize,
        offset: u64,
        file_size: u64,
        image_size: u64,
    },

    /// Entry point does not fit the 32-bit vector and scratch registers
    EntryOutOfRange(u64),

    /// A hardware register did not take the programmed value
    Hardware(&'static str),

    /// Boot configuration rejected by validation
    InvalidConfig(&'static str),

    /// Bring-up state machine asked for an illegal transition
    InvalidState,
}

impl BootError {
    /// Convert to an error code suitable for a post-mortem register dump
    pub fn as_error_code(&self) -> u32 {
        match self {
            BootError::Allocation(_) => 0x2000,
            BootError::Hardware(_) => 0x6001,
            BootError::Storage(_) => 0x7001,
            BootError::Format(_) => 0x9002,
            BootError::SegmentBounds { .. } => 0x9003,
            BootError::EntryOutOfRange(_) => 0x9004,
            BootError::InvalidConfig(_) => 0xA001,
            BootError::InvalidState => 0xE001,
        }
    }

    /// Get a human-readable description of the error
    pub fn description(&self) -> &'static str {
        match self {
            BootError::Storage(_) => "Storage driver error",
            BootError::Format(msg) => msg,
            BootError::Allocation(msg) => msg,
            BootError::SegmentBounds { .. } => "Segment exceeds file bounds",
            BootError::EntryOutOfRange(_) => "Entry point does not fit a 32-bit register",
            BootError::Hardware(msg) => msg,
            BootError::InvalidConfig(msg) => msg,
            BootError::InvalidState => "Invalid bring-up state transition",
        }
    }

    /// Whether the failure came from the image contents rather than the platform
    pub fn is_image_fault(&self) -> bool {
        matches!(
            self,
            BootError::Format(_)
                | BootError::SegmentBounds { .. }
                | BootError::EntryOutOfRange(_)
        )
    }
}

impl From<StorageError> for BootError {
    fn from(err: StorageError) -> Self {
        BootError::Storage(err)
    }
}

impl fmt::Display for BootError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BootError::Storage(err) => {
                write!(f, "BootError: storage {} (code: {:#x})", err, self.as_error_code())
            }
            BootError::SegmentBounds {
                index,
                offset,
                file_size,
                image_size,
            } => write!(
                f,
                "BootError: program header {} range {:#x}+{:#x} \
                 exceeds image size {:#x} (code: {:#x})",
                index,
                offset,
                file_size,
                image_size,
                self.as_error_code()
            ),
            BootError::EntryOutOfRange(entry) => write!(
                f,
                "BootError: entry point {:#x} does not fit a 32-bit register (code: {:#x})",
                entry,
                self.as_error_code()
            ),
            _ => write!(
                f,
                "BootError: {} (code: {:#x})",
                self.description(),
                self.as_error_code()
            ),
        }
    }
}

/// Result type used throughout the bootloader
pub type Result<T = ()> = core::result::Result<T, BootError>;
