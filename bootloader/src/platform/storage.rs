//! Storage driver contract
//!
//! The loader never talks to the SD controller or the FAT layer directly. It
//! consumes this narrow interface: mount once, open an image by name, then
//! read/seek/size until the handle is dropped (which closes the file).

use crate::error::Result;

/// An open image file
pub trait ImageFile {
    /// Read up to `buf.len()` bytes at the current position
    ///
    /// Returns the number of bytes read; zero means end of file. Driver
    /// failures are reported as `BootError::Storage`.
    fn read(&mut self, buf: &mut [u8]) -> Result<usize>;

    /// Move the read position to an absolute byte offset
    fn seek(&mut self, offset: u64) -> Result;

    /// Total file size in bytes
    fn size(&self) -> u64;
}

/// A mountable volume holding boot images
pub trait Volume {
    type File: ImageFile;

    fn mount(&mut self) -> Result;

    /// Open `name` read-only
    fn open(&mut self, name: &str) -> Result<Self::File>;
}

/// Fill `buf` from `file`, stopping early only at end of file
///
/// Returns the number of bytes placed in `buf`; callers compare it with the
/// length they asked for.
pub fn read_fully<F: ImageFile + ?Sized>(file: &mut F, buf: &mut [u8]) -> Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        let n = file.read(&mut buf[filled..])?;
        if n == 0 {
            break;
        }
        filled += n;
    }
    Ok(filled)
}
