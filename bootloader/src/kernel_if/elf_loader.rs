/// ELF Segment Loader
///
/// Streams every segment of an image from storage straight to its link
/// address, zero-fills the BSS tail, and flushes the data cache behind each
/// write so the cores released later observe the bytes.

use alloc::vec::Vec;

use crate::error::{BootError, Result, StorageError, StorageOp};
use crate::kernel_if::elf::{
    read_header, Elf32, Elf64, ElfClass, ElfHeader, ProgramHeader, ProgramHeaderTable, WordSize,
};
use crate::platform::{CacheMaintenance, ImageFile, PhysicalMemory};

/// Copy granularity; every chunk is flushed on its own
pub const CHUNK_SIZE: usize = 4096;

/// What one descriptor put into memory
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadedSegment {
    pub index: usize,
    pub p_type: u32,
    pub vaddr: u64,
    pub filesz: u64,
    pub memsz: u64,
}

/// Result of loading one image
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadedImage {
    pub word_size: WordSize,
    /// Entry point, taken verbatim from the header
    pub entry: u64,
    pub segments: Vec<LoadedSegment>,
}

/// Entry point of an image whose segments have all been loaded
///
/// Not checked against the loaded segments; a header may name any address.
pub fn entry_point(header: &ElfHeader) -> u64 {
    header.entry
}

/// Segment copier bound to a memory sink and the cache maintenance primitive
pub struct ElfLoader<'a, M: PhysicalMemory, K: CacheMaintenance> {
    memory: &'a mut M,
    cache: &'a mut K,
    buffer: [u8; CHUNK_SIZE],
}

impl<'a, M: PhysicalMemory, K: CacheMaintenance> ElfLoader<'a, M, K> {
    pub fn new(memory: &'a mut M, cache: &'a mut K) -> Self {
        Self {
            memory,
            cache,
            buffer: [0; CHUNK_SIZE],
        }
    }

    /// Load an image of the given word size
    pub fn load<F: ImageFile>(&mut self, word_size: WordSize, file: &mut F) -> Result<LoadedImage> {
        match word_size {
            WordSize::Elf32 => self.load_class::<Elf32, F>(file),
            WordSize::Elf64 => self.load_class::<Elf64, F>(file),
        }
    }

    /// Validate, read the descriptor table, copy every segment in table order
    ///
    /// The first failing descriptor aborts the load; segments copied before it
    /// stay in memory.
    pub fn load_class<C: ElfClass, F: ImageFile>(&mut self, file: &mut F) -> Result<LoadedImage> {
        let header = read_header::<C, F>(file)?;
        let table = ProgramHeaderTable::<C>::read(file, &header)?;
        let image_size = file.size();
        if table.is_empty() {
            log::warn!("{} image has no program headers", C::WORD_SIZE.as_str());
        }

        let mut segments = Vec::new();
        segments
            .try_reserve_exact(table.len())
            .map_err(|_| BootError::Allocation("Memory allocation for segment list failed"))?;

        for (index, ph) in table.iter().enumerate() {
            log::debug!(
                "Program header {}: type={:#x}, offset={:#x}, filesz={:#x}, memsz={:#x}",
                index,
                ph.p_type,
                ph.p_offset,
                ph.p_filesz,
                ph.p_memsz
            );
            segments.push(self.copy_segment(file, index, &ph, image_size)?);
        }
        drop(table);

        let entry = entry_point(&header);
        log::info!(
            "All {} segments loaded; entry point {:#x}",
            segments.len(),
            entry
        );

        Ok(LoadedImage {
            word_size: header.word_size,
            entry,
            segments,
        })
    }

    /// Copy one descriptor's file bytes and zero its BSS tail
    pub fn copy_segment<F: ImageFile>(
        &mut self,
        file: &mut F,
        index: usize,
        ph: &ProgramHeader,
        image_size: u64,
    ) -> Result<LoadedSegment> {
        let in_bounds = ph
            .p_offset
            .checked_add(ph.p_filesz)
            .is_some_and(|end| end <= image_size);
        if !in_bounds {
            log::error!(
                "Invalid segment offset for program header {}: \
                 offset={:#x}, filesz={:#x}, file size={:#x}",
                index,
                ph.p_offset,
                ph.p_filesz,
                image_size
            );
            return Err(BootError::SegmentBounds {
                index,
                offset: ph.p_offset,
                file_size: ph.p_filesz,
                image_size,
            });
        }

        if !ph.is_loadable() {
            log::warn!(
                "Program header {} is not PT_LOAD (type {:#x}); copying anyway",
                index,
                ph.p_type
            );
        }

        ph.p_vaddr
            .checked_add(ph.p_memsz.max(ph.p_filesz))
            .ok_or(BootError::Format("Segment wraps the address space"))?;

        file.seek(ph.p_offset)?;

        let mut loaded: u64 = 0;
        while loaded < ph.p_filesz {
            let want = (ph.p_filesz - loaded).min(CHUNK_SIZE as u64) as usize;
            let n = file.read(&mut self.buffer[..want])?;
            if n == 0 {
                log::error!(
                    "Error reading segment data at offset {:#x}: short read",
                    ph.p_offset + loaded
                );
                return Err(StorageError::new(StorageOp::Read, 0).into());
            }

            let dst = ph.p_vaddr + loaded;
            self.memory.write(dst, &self.buffer[..n])?;
            self.cache.flush_range(dst, n);
            log::trace!("Flushed {:#x}+{:#x}", dst, n);
            loaded += n as u64;
        }

        let bss = ph.bss_size();
        if bss > 0 {
            let dst = ph.p_vaddr + ph.p_filesz;
            self.memory.zero(dst, bss)?;
            let len = usize::try_from(bss)
                .map_err(|_| BootError::Format("BSS tail exceeds the address space"))?;
            self.cache.flush_range(dst, len);
        } else if ph.p_memsz < ph.p_filesz {
            log::warn!(
                "Program header {} has memsz {:#x} below filesz {:#x}",
                index,
                ph.p_memsz,
                ph.p_filesz
            );
        }

        log::info!(
            "Segment loaded successfully: vaddr={:#x}, filesz={:#x}, memsz={:#x}",
            ph.p_vaddr,
            ph.p_filesz,
            ph.p_memsz
        );

        Ok(LoadedSegment {
            index,
            p_type: ph.p_type,
            vaddr: ph.p_vaddr,
            filesz: ph.p_filesz,
            memsz: ph.p_memsz,
        })
    }
}
