//! ELF format support
//!
//! Header validation and program header table reading for both word widths.
//! The two layouts differ only in field widths and offsets, so they are
//! described once each by an [`ElfClass`] policy and everything else is
//! written against the policy.

use alloc::vec::Vec;
use core::marker::PhantomData;

use crate::diagnostics::hexdump;
use crate::error::{BootError, Result};
use crate::platform::storage::{read_fully, ImageFile};

/// ELF constants
pub mod constants {
    /// ELF magic number
    pub const ELF_MAGIC: [u8; 4] = [0x7F, b'E', b'L', b'F'];

    /// Byte index of the class field in `e_ident`
    pub const EI_CLASS: usize = 4;

    /// ELF classes
    pub const ELFCLASS32: u8 = 1;
    pub const ELFCLASS64: u8 = 2;

    /// Loadable segment; every other type is copied with a warning
    pub const PT_LOAD: u32 = 1;
}

use constants::*;

/// Largest header of any supported class
pub const MAX_HEADER_SIZE: usize = 64;

/// ELF word width
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WordSize {
    Elf32,
    Elf64,
}

impl WordSize {
    pub fn as_str(&self) -> &'static str {
        match self {
            WordSize::Elf32 => "ELF32",
            WordSize::Elf64 => "ELF64",
        }
    }
}

/// Validated ELF file header, widened to 64-bit fields
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ElfHeader {
    pub word_size: WordSize,
    /// Entry point virtual address
    pub entry: u64,
    /// Program header table file offset
    pub phoff: u64,
    /// Program header entry count
    pub phnum: u16,
}

/// One program header (segment descriptor), widened to 64-bit fields
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgramHeader {
    pub p_type: u32,
    pub p_flags: u32,
    pub p_offset: u64,
    pub p_vaddr: u64,
    pub p_paddr: u64,
    pub p_filesz: u64,
    pub p_memsz: u64,
}

impl ProgramHeader {
    pub fn is_loadable(&self) -> bool {
        self.p_type == PT_LOAD
    }

    /// Zero-filled tail length; a descriptor with `memsz < filesz` has none
    pub fn bss_size(&self) -> u64 {
        self.p_memsz.saturating_sub(self.p_filesz)
    }
}

/// Word-size policy: layout of the header and of one program header
pub trait ElfClass {
    const WORD_SIZE: WordSize;
    /// Expected `e_ident[EI_CLASS]`
    const IDENT_CLASS: u8;
    const HEADER_SIZE: usize;
    const PHDR_SIZE: usize;

    /// Decode a header; `raw` holds at least `HEADER_SIZE` bytes
    fn decode_header(raw: &[u8]) -> ElfHeader;

    /// Decode a descriptor; `raw` holds at least `PHDR_SIZE` bytes
    fn decode_program_header(raw: &[u8]) -> ProgramHeader;
}

/// 32-bit layout (`Elf32_Ehdr`, `Elf32_Phdr`)
#[derive(Debug, Clone, Copy)]
pub struct Elf32;

/// 64-bit layout (`Elf64_Ehdr`, `Elf64_Phdr`)
#[derive(Debug, Clone, Copy)]
pub struct Elf64;

impl ElfClass for Elf32 {
    const WORD_SIZE: WordSize = WordSize::Elf32;
    const IDENT_CLASS: u8 = ELFCLASS32;
    const HEADER_SIZE: usize = 52;
    const PHDR_SIZE: usize = 32;

    fn decode_header(raw: &[u8]) -> ElfHeader {
        ElfHeader {
            word_size: WordSize::Elf32,
            entry: le_u32(raw, 24) as u64,
            phoff: le_u32(raw, 28) as u64,
            phnum: le_u16(raw, 44),
        }
    }

    fn decode_program_header(raw: &[u8]) -> ProgramHeader {
        ProgramHeader {
            p_type: le_u32(raw, 0),
            p_offset: le_u32(raw, 4) as u64,
            p_vaddr: le_u32(raw, 8) as u64,
            p_paddr: le_u32(raw, 12) as u64,
            p_filesz: le_u32(raw, 16) as u64,
            p_memsz: le_u32(raw, 20) as u64,
            p_flags: le_u32(raw, 24),
        }
    }
}

impl ElfClass for Elf64 {
    const WORD_SIZE: WordSize = WordSize::Elf64;
    const IDENT_CLASS: u8 = ELFCLASS64;
    const HEADER_SIZE: usize = 64;
    const PHDR_SIZE: usize = 56;

    fn decode_header(raw: &[u8]) -> ElfHeader {
        ElfHeader {
            word_size: WordSize::Elf64,
            entry: le_u64(raw, 24),
            phoff: le_u64(raw, 32),
            phnum: le_u16(raw, 56),
        }
    }

    fn decode_program_header(raw: &[u8]) -> ProgramHeader {
        ProgramHeader {
            p_type: le_u32(raw, 0),
            p_flags: le_u32(raw, 4),
            p_offset: le_u64(raw, 8),
            p_vaddr: le_u64(raw, 16),
            p_paddr: le_u64(raw, 24),
            p_filesz: le_u64(raw, 32),
            p_memsz: le_u64(raw, 40),
        }
    }
}

fn le_u16(raw: &[u8], at: usize) -> u16 {
    let mut b = [0u8; 2];
    b.copy_from_slice(&raw[at..at + 2]);
    u16::from_le_bytes(b)
}

fn le_u32(raw: &[u8], at: usize) -> u32 {
    let mut b = [0u8; 4];
    b.copy_from_slice(&raw[at..at + 4]);
    u32::from_le_bytes(b)
}

fn le_u64(raw: &[u8], at: usize) -> u64 {
    let mut b = [0u8; 8];
    b.copy_from_slice(&raw[at..at + 8]);
    u64::from_le_bytes(b)
}

/// Validate a raw header buffer against the policy `C`
///
/// Checks, in order: enough bytes for the header, the identification magic,
/// and that `EI_CLASS` names the width `C` decodes.
pub fn validate_header<C: ElfClass>(raw: &[u8]) -> Result<ElfHeader> {
    if raw.len() < C::HEADER_SIZE {
        return Err(BootError::Format("ELF header truncated"));
    }

    if raw[..4] != ELF_MAGIC {
        return Err(BootError::Format("File is not a valid ELF file"));
    }

    if raw[EI_CLASS] != C::IDENT_CLASS {
        return Err(BootError::Format("ELF class does not match the selected word size"));
    }

    Ok(C::decode_header(raw))
}

/// Read and validate the header at the start of `file`
pub fn read_header<C: ElfClass, F: ImageFile>(file: &mut F) -> Result<ElfHeader> {
    let mut buf = [0u8; MAX_HEADER_SIZE];
    let raw = &mut buf[..C::HEADER_SIZE];

    file.seek(0)?;
    let n = read_fully(file, raw)?;
    hexdump::trace_dump(&raw[..n]);

    let header = validate_header::<C>(&raw[..n])?;
    log::debug!(
        "{} header: entry={:#x}, phoff={:#x}, phnum={}",
        C::WORD_SIZE.as_str(),
        header.entry,
        header.phoff,
        header.phnum
    );
    Ok(header)
}

/// Program header table, read in one piece and owned by a single load
pub struct ProgramHeaderTable<C: ElfClass> {
    raw: Vec<u8>,
    count: usize,
    _class: PhantomData<C>,
}

impl<C: ElfClass> ProgramHeaderTable<C> {
    /// Bounds-check the table offset, allocate, seek, and bulk-read the table
    pub fn read<F: ImageFile>(file: &mut F, header: &ElfHeader) -> Result<Self> {
        let image_size = file.size();
        if header.phoff >= image_size {
            return Err(BootError::Format("Invalid program header offset"));
        }

        let count = header.phnum as usize;
        let table_size = count * C::PHDR_SIZE;

        let mut raw = Vec::new();
        raw.try_reserve_exact(table_size)
            .map_err(|_| BootError::Allocation("Memory allocation for program headers failed"))?;
        raw.resize(table_size, 0);

        file.seek(header.phoff)?;
        let n = read_fully(file, &mut raw)?;
        if n != table_size {
            log::error!(
                "Failed to read program headers; read {} bytes, expected {}",
                n,
                table_size
            );
            return Err(BootError::Format("Program header table truncated"));
        }

        Ok(Self {
            raw,
            count,
            _class: PhantomData,
        })
    }

    pub fn len(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Descriptors in table order
    pub fn iter(&self) -> impl Iterator<Item = ProgramHeader> + '_ {
        self.raw
            .chunks_exact(C::PHDR_SIZE)
            .map(C::decode_program_header)
    }
}
