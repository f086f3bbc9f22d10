// Shared fakes for the integration tests: an ELF image builder, a RAM-backed
// volume, sparse physical memory and a register file + cache that record into
// one event log.

#![allow(dead_code)]

use std::cell::{Cell, RefCell};
use std::collections::{BTreeMap, HashMap};
use std::rc::Rc;

use mpsoc_loader::error::{BootError, Result, StorageError, StorageOp};
use mpsoc_loader::kernel_if::elf::constants::PT_LOAD;
use mpsoc_loader::kernel_if::kernel_handoff::{HandoffParams, HandoffSink};
use mpsoc_loader::kernel_if::WordSize;
use mpsoc_loader::platform::{
    CacheMaintenance, ImageFile, PhysicalMemory, Register, RegisterFile, Volume,
};

/// Fresh handoff storage with the `'static` lifetime the builder demands
pub fn handoff_storage() -> &'static mut HandoffParams {
    Box::leak(Box::new(HandoffParams::new()))
}

// ---------------------------------------------------------------------------
// ELF image builder
// ---------------------------------------------------------------------------

#[derive(Clone, Debug)]
pub struct Segment {
    pub p_type: u32,
    pub vaddr: u64,
    pub data: Vec<u8>,
    pub memsz: u64,
}

/// Builds a minimal little-endian executable: header, program header table
/// right behind it, then segment data in table order
#[derive(Clone, Debug)]
pub struct ElfImageBuilder {
    word_size: WordSize,
    entry: u64,
    segments: Vec<Segment>,
}

impl ElfImageBuilder {
    pub fn new(word_size: WordSize) -> Self {
        Self {
            word_size,
            entry: 0,
            segments: Vec::new(),
        }
    }

    pub fn entry(mut self, entry: u64) -> Self {
        self.entry = entry;
        self
    }

    pub fn load(self, vaddr: u64, data: Vec<u8>) -> Self {
        let memsz = data.len() as u64;
        self.load_with_bss(vaddr, data, memsz)
    }

    pub fn load_with_bss(mut self, vaddr: u64, data: Vec<u8>, memsz: u64) -> Self {
        self.segments.push(Segment {
            p_type: PT_LOAD,
            vaddr,
            data,
            memsz,
        });
        self
    }

    pub fn segment(mut self, segment: Segment) -> Self {
        self.segments.push(segment);
        self
    }

    pub fn header_size(&self) -> usize {
        match self.word_size {
            WordSize::Elf32 => 52,
            WordSize::Elf64 => 64,
        }
    }

    pub fn phdr_size(&self) -> usize {
        match self.word_size {
            WordSize::Elf32 => 32,
            WordSize::Elf64 => 56,
        }
    }

    /// File offset of the `index`th program header
    pub fn phdr_offset(&self, index: usize) -> usize {
        self.header_size() + index * self.phdr_size()
    }

    pub fn build(&self) -> Vec<u8> {
        let phoff = self.header_size();
        let mut data_offset = phoff + self.segments.len() * self.phdr_size();

        let mut out = Vec::new();
        out.extend_from_slice(&[0x7F, b'E', b'L', b'F']);
        out.push(match self.word_size {
            WordSize::Elf32 => 1,
            WordSize::Elf64 => 2,
        });
        out.extend_from_slice(&[1, 1, 0]);
        out.resize(16, 0);
        out.extend_from_slice(&2u16.to_le_bytes()); // ET_EXEC
        out.extend_from_slice(&0xB7u16.to_le_bytes()); // EM_AARCH64
        out.extend_from_slice(&1u32.to_le_bytes());

        match self.word_size {
            WordSize::Elf32 => {
                out.extend_from_slice(&(self.entry as u32).to_le_bytes());
                out.extend_from_slice(&(phoff as u32).to_le_bytes());
                out.extend_from_slice(&0u32.to_le_bytes()); // shoff
            }
            WordSize::Elf64 => {
                out.extend_from_slice(&self.entry.to_le_bytes());
                out.extend_from_slice(&(phoff as u64).to_le_bytes());
                out.extend_from_slice(&0u64.to_le_bytes());
            }
        }
        out.extend_from_slice(&0u32.to_le_bytes()); // flags
        out.extend_from_slice(&(self.header_size() as u16).to_le_bytes());
        out.extend_from_slice(&(self.phdr_size() as u16).to_le_bytes());
        out.extend_from_slice(&(self.segments.len() as u16).to_le_bytes());
        out.extend_from_slice(&[0; 6]); // shentsize, shnum, shstrndx
        assert_eq!(out.len(), self.header_size());

        for seg in &self.segments {
            let filesz = seg.data.len() as u64;
            let flags = 0x7; // PF_R | PF_W | PF_X
            match self.word_size {
                WordSize::Elf32 => {
                    for word in [
                        seg.p_type,
                        data_offset as u32,
                        seg.vaddr as u32,
                        seg.vaddr as u32,
                        filesz as u32,
                        seg.memsz as u32,
                        flags,
                        0x1000,
                    ] {
                        out.extend_from_slice(&word.to_le_bytes());
                    }
                }
                WordSize::Elf64 => {
                    out.extend_from_slice(&seg.p_type.to_le_bytes());
                    out.extend_from_slice(&flags.to_le_bytes());
                    let offset = data_offset as u64;
                    let words = [offset, seg.vaddr, seg.vaddr, filesz, seg.memsz, 0x1000];
                    for word in words {
                        out.extend_from_slice(&word.to_le_bytes());
                    }
                }
            }
            data_offset += seg.data.len();
        }

        for seg in &self.segments {
            out.extend_from_slice(&seg.data);
        }
        out
    }
}

/// Overwrite the file offset of program header `index` in a built image
pub fn patch_segment_offset(
    image: &mut [u8],
    builder: &ElfImageBuilder,
    index: usize,
    offset: u64,
) {
    let at = builder.phdr_offset(index);
    match builder.header_size() {
        52 => image[at + 4..at + 8].copy_from_slice(&(offset as u32).to_le_bytes()),
        _ => image[at + 8..at + 16].copy_from_slice(&offset.to_le_bytes()),
    }
}

pub fn pattern(len: usize, seed: u8) -> Vec<u8> {
    (0..len).map(|i| (i as u8).wrapping_mul(31).wrapping_add(seed)).collect()
}

// ---------------------------------------------------------------------------
// Storage
// ---------------------------------------------------------------------------

/// Files held in memory, with optional failure injection
#[derive(Default)]
pub struct RamVolume {
    files: HashMap<String, Vec<u8>>,
    pub mount_status: Option<u32>,
    pub mounts: usize,
    pub opened: Vec<String>,
    /// Files currently open; decremented when a handle drops
    pub open_handles: Rc<Cell<usize>>,
    /// Largest chunk a single read hands out
    pub read_step: Option<usize>,
}

impl RamVolume {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_file(mut self, name: &str, data: Vec<u8>) -> Self {
        self.files.insert(name.to_string(), data);
        self
    }
}

impl Volume for RamVolume {
    type File = RamFile;

    fn mount(&mut self) -> Result {
        self.mounts += 1;
        match self.mount_status {
            Some(status) => Err(StorageError::new(StorageOp::Mount, status).into()),
            None => Ok(()),
        }
    }

    fn open(&mut self, name: &str) -> Result<RamFile> {
        let data = self
            .files
            .get(name)
            .cloned()
            .ok_or(BootError::Storage(StorageError::new(StorageOp::Open, 4)))?;
        self.opened.push(name.to_string());
        self.open_handles.set(self.open_handles.get() + 1);
        Ok(RamFile {
            data,
            pos: 0,
            step: self.read_step,
            handles: Rc::clone(&self.open_handles),
        })
    }
}

pub struct RamFile {
    data: Vec<u8>,
    pos: usize,
    step: Option<usize>,
    handles: Rc<Cell<usize>>,
}

impl RamFile {
    pub fn new(data: Vec<u8>) -> Self {
        Self {
            data,
            pos: 0,
            step: None,
            handles: Rc::new(Cell::new(1)),
        }
    }
}

impl ImageFile for RamFile {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        let available = self.data.len().saturating_sub(self.pos);
        let n = buf.len().min(available).min(self.step.unwrap_or(usize::MAX));
        buf[..n].copy_from_slice(&self.data[self.pos..self.pos + n]);
        self.pos += n;
        Ok(n)
    }

    fn seek(&mut self, offset: u64) -> Result {
        self.pos = offset as usize;
        Ok(())
    }

    fn size(&self) -> u64 {
        self.data.len() as u64
    }
}

impl Drop for RamFile {
    fn drop(&mut self) {
        self.handles.set(self.handles.get() - 1);
    }
}

// ---------------------------------------------------------------------------
// Memory
// ---------------------------------------------------------------------------

/// Byte-granular physical memory; unwritten bytes read as `None`
#[derive(Default, Debug)]
pub struct SparseMemory {
    bytes: BTreeMap<u64, u8>,
}

impl SparseMemory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fill(&mut self, address: u64, length: u64, value: u8) {
        for a in address..address + length {
            self.bytes.insert(a, value);
        }
    }

    pub fn byte(&self, address: u64) -> Option<u8> {
        self.bytes.get(&address).copied()
    }

    /// Contents of a fully written range
    pub fn read(&self, address: u64, length: usize) -> Vec<u8> {
        (0..length as u64)
            .map(|i| {
                self.byte(address + i)
                    .unwrap_or_else(|| panic!("byte {:#x} never written", address + i))
            })
            .collect()
    }

    pub fn is_untouched(&self) -> bool {
        self.bytes.is_empty()
    }
}

impl PhysicalMemory for SparseMemory {
    fn write(&mut self, address: u64, bytes: &[u8]) -> Result {
        for (i, &b) in bytes.iter().enumerate() {
            self.bytes.insert(address + i as u64, b);
        }
        Ok(())
    }

    fn zero(&mut self, address: u64, length: u64) -> Result {
        self.fill(address, length, 0);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Cache, registers, handoff sink
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    Flush(u64, usize),
    Barrier,
    Write(Register, u32),
}

pub type EventLog = Rc<RefCell<Vec<Event>>>;

pub struct RecordingCache {
    pub events: EventLog,
}

impl RecordingCache {
    pub fn new(events: &EventLog) -> Self {
        Self {
            events: Rc::clone(events),
        }
    }

    pub fn flushes(&self) -> Vec<(u64, usize)> {
        self.events
            .borrow()
            .iter()
            .filter_map(|event| match *event {
                Event::Flush(address, length) => Some((address, length)),
                _ => None,
            })
            .collect()
    }
}

impl CacheMaintenance for RecordingCache {
    fn flush_range(&mut self, address: u64, length: usize) {
        self.events.borrow_mut().push(Event::Flush(address, length));
    }

    fn barrier(&mut self) {
        self.events.borrow_mut().push(Event::Barrier);
    }
}

/// Register file backed by a map; a register listed in `stuck` ignores writes
pub struct FakeRegisters {
    pub values: HashMap<Register, u32>,
    pub events: EventLog,
    pub stuck: Option<Register>,
}

impl FakeRegisters {
    pub fn new(events: &EventLog) -> Self {
        Self {
            values: HashMap::new(),
            events: Rc::clone(events),
            stuck: None,
        }
    }

    pub fn value(&self, reg: Register) -> u32 {
        self.values.get(&reg).copied().unwrap_or(0)
    }
}

impl RegisterFile for FakeRegisters {
    fn read(&self, reg: Register) -> u32 {
        self.value(reg)
    }

    fn write(&mut self, reg: Register, value: u32) {
        self.events.borrow_mut().push(Event::Write(reg, value));
        if self.stuck != Some(reg) {
            self.values.insert(reg, value);
        }
    }
}

/// Records every published address
#[derive(Default, Debug)]
pub struct AddressSink {
    pub published: Vec<usize>,
}

impl HandoffSink for AddressSink {
    fn publish(&mut self, address: usize) -> Result {
        self.published.push(address);
        Ok(())
    }
}
