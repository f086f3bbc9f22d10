//! FatFs-backed boot volume, linked from the BSP through `csrc/ff_shim.c`

use core::ffi::{c_char, c_int, c_uint, c_ulonglong, c_void};

use crate::error::{BootError, Result, StorageError, StorageOp};
use crate::platform::storage::{ImageFile, Volume};

unsafe extern "C" {
    fn ldr_mount(path: *const c_char) -> c_int;
    fn ldr_open(name: *const c_char) -> c_int;
    fn ldr_read(buf: *mut c_void, len: c_uint, read: *mut c_uint) -> c_int;
    fn ldr_seek(offset: c_ulonglong) -> c_int;
    fn ldr_size() -> c_ulonglong;
    fn ldr_close() -> c_int;
}

/// FatFs path limit used by the shim build
const MAX_PATH: usize = 64;

/// `name` with a trailing NUL, in a stack buffer
fn c_path(name: &str) -> Result<[u8; MAX_PATH]> {
    let bytes = name.as_bytes();
    if bytes.len() >= MAX_PATH || bytes.contains(&0) {
        return Err(BootError::InvalidConfig("File name does not fit the FatFs path buffer"));
    }
    let mut path = [0u8; MAX_PATH];
    path[..bytes.len()].copy_from_slice(bytes);
    Ok(path)
}

fn check(op: StorageOp, status: c_int) -> Result {
    if status == 0 {
        Ok(())
    } else {
        Err(StorageError::new(op, status as u32).into())
    }
}

/// The SD card volume; only one instance may exist
pub struct FatVolume {
    drive: &'static str,
}

impl FatVolume {
    /// # Safety
    /// The shim keeps global FatFs state; at most one `FatVolume` may exist.
    pub const unsafe fn new(drive: &'static str) -> Self {
        Self { drive }
    }
}

impl Volume for FatVolume {
    type File = FatFile;

    fn mount(&mut self) -> Result {
        let path = c_path(self.drive)?;
        check(StorageOp::Mount, unsafe { ldr_mount(path.as_ptr().cast()) })
    }

    fn open(&mut self, name: &str) -> Result<FatFile> {
        let path = c_path(name)?;
        check(StorageOp::Open, unsafe { ldr_open(path.as_ptr().cast()) })?;
        Ok(FatFile {
            size: unsafe { ldr_size() },
        })
    }
}

/// The one open file; closed on drop
pub struct FatFile {
    size: u64,
}

impl ImageFile for FatFile {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        let len = c_uint::try_from(buf.len()).unwrap_or(c_uint::MAX);
        let mut read: c_uint = 0;
        check(StorageOp::Read, unsafe {
            ldr_read(buf.as_mut_ptr().cast(), len, &mut read)
        })?;
        Ok(read as usize)
    }

    fn seek(&mut self, offset: u64) -> Result {
        check(StorageOp::Seek, unsafe { ldr_seek(offset) })
    }

    fn size(&self) -> u64 {
        self.size
    }
}

impl Drop for FatFile {
    fn drop(&mut self) {
        let status = unsafe { ldr_close() };
        if status != 0 {
            log::warn!("f_close failed (status {})", status);
        }
    }
}
