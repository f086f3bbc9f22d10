// Segment loading through the public loader API

mod common;

use std::cell::RefCell;
use std::rc::Rc;

use common::*;
use mpsoc_loader::error::{BootError, Result, StorageError, StorageOp};
use mpsoc_loader::kernel_if::elf_loader::CHUNK_SIZE;
use mpsoc_loader::kernel_if::{ElfLoader, LoadedImage, WordSize};
use mpsoc_loader::platform::Volume;

const PT_NOTE: u32 = 4;

type Loaded = (Result<LoadedImage>, SparseMemory, RecordingCache);

fn load(image: Vec<u8>, word_size: WordSize) -> Loaded {
    let events = EventLog::default();
    let mut memory = SparseMemory::new();
    let mut cache = RecordingCache::new(&events);
    let mut file = RamFile::new(image);
    let result = ElfLoader::new(&mut memory, &mut cache).load(word_size, &mut file);
    (result, memory, cache)
}

#[test]
fn test_two_segment_image_returns_header_entry() {
    let first = pattern(0x1000, 1);
    let second = pattern(0x1000, 2);
    let image = ElfImageBuilder::new(WordSize::Elf64)
        .entry(0x10000)
        .load(0x10000, first.clone())
        .load(0x20000, second.clone())
        .build();

    let (result, memory, cache) = load(image, WordSize::Elf64);
    let loaded = result.unwrap();

    assert_eq!(loaded.entry, 0x10000);
    assert_eq!(loaded.segments.len(), 2);
    assert_eq!(memory.read(0x10000, 0x1000), first);
    assert_eq!(memory.read(0x20000, 0x1000), second);
    assert_eq!(cache.flushes(), vec![(0x10000, 0x1000), (0x20000, 0x1000)]);
}

#[test]
fn test_elf32_image_loads_through_same_loader() {
    let data = pattern(300, 7);
    let image = ElfImageBuilder::new(WordSize::Elf32)
        .entry(0x0010_0040)
        .load_with_bss(0x0010_0000, data.clone(), 0x200)
        .build();

    let (result, memory, _) = load(image, WordSize::Elf32);
    let loaded = result.unwrap();

    assert_eq!(loaded.entry, 0x0010_0040);
    assert_eq!(loaded.word_size, WordSize::Elf32);
    assert_eq!(memory.read(0x0010_0000, 300), data);
    assert!(memory.read(0x0010_0000 + 300, 0x200 - 300).iter().all(|&b| b == 0));
}

#[test]
fn test_segment_straddling_chunk_boundary_is_exact() {
    let data = pattern(CHUNK_SIZE + 1, 3);
    let image = ElfImageBuilder::new(WordSize::Elf64)
        .entry(0x8000)
        .load(0x8000, data.clone())
        .build();

    let (result, memory, cache) = load(image, WordSize::Elf64);
    result.unwrap();

    assert_eq!(memory.read(0x8000, data.len()), data);
    assert_eq!(memory.byte(0x8000 + data.len() as u64), None);
    assert_eq!(cache.flushes(), vec![(0x8000, CHUNK_SIZE), (0x9000, 1)]);
}

#[test]
fn test_short_reads_still_copy_everything() {
    let data = pattern(10_000, 9);
    let image = ElfImageBuilder::new(WordSize::Elf64)
        .entry(0x4000)
        .load(0x4000, data.clone())
        .build();

    let events = EventLog::default();
    let mut volume = RamVolume::new().with_file("bl31.elf", image);
    volume.read_step = Some(1000);
    let mut file = volume.open("bl31.elf").unwrap();
    let mut memory = SparseMemory::new();
    let mut cache = RecordingCache::new(&events);

    ElfLoader::new(&mut memory, &mut cache)
        .load(WordSize::Elf64, &mut file)
        .unwrap();

    assert_eq!(memory.read(0x4000, data.len()), data);
    let flushed: usize = cache.flushes().iter().map(|&(_, len)| len).sum();
    assert_eq!(flushed, data.len());
}

#[test]
fn test_bss_tail_is_zeroed_and_flushed() {
    let data = pattern(0x80, 5);
    let image = ElfImageBuilder::new(WordSize::Elf64)
        .entry(0x1000)
        .load_with_bss(0x1000, data.clone(), 0x1000)
        .build();

    let events = EventLog::default();
    let mut memory = SparseMemory::new();
    memory.fill(0x1000, 0x1000, 0xFF);
    let mut cache = RecordingCache::new(&events);

    ElfLoader::new(&mut memory, &mut cache)
        .load(WordSize::Elf64, &mut RamFile::new(image))
        .unwrap();

    assert_eq!(memory.read(0x1000, 0x80), data);
    assert!(memory.read(0x1080, 0x1000 - 0x80).iter().all(|&b| b == 0));
    assert_eq!(cache.flushes(), vec![(0x1000, 0x80), (0x1080, 0x1000 - 0x80)]);
}

#[test]
fn test_out_of_bounds_descriptor_stops_the_load() {
    let builder = ElfImageBuilder::new(WordSize::Elf64)
        .entry(0x1000)
        .load(0x1000, pattern(0x40, 1))
        .load(0x2000, pattern(0x40, 2))
        .load(0x3000, pattern(0x40, 3));
    let mut image = builder.build();
    let size = image.len() as u64;
    patch_segment_offset(&mut image, &builder, 1, size - 0x20);

    let (result, memory, _) = load(image, WordSize::Elf64);

    assert_eq!(
        result.unwrap_err(),
        BootError::SegmentBounds {
            index: 1,
            offset: size - 0x20,
            file_size: 0x40,
            image_size: size,
        }
    );
    assert!(memory.byte(0x1000).is_some());
    assert_eq!(memory.byte(0x2000), None);
    assert_eq!(memory.byte(0x3000), None);
}

#[test]
fn test_non_load_descriptor_is_copied() {
    let note = Segment {
        p_type: PT_NOTE,
        vaddr: 0x5000,
        data: pattern(16, 4),
        memsz: 16,
    };
    let image = ElfImageBuilder::new(WordSize::Elf64)
        .entry(0x5000)
        .segment(note)
        .build();

    let (result, memory, _) = load(image, WordSize::Elf64);
    let loaded = result.unwrap();

    assert_eq!(loaded.segments[0].p_type, PT_NOTE);
    assert_eq!(memory.read(0x5000, 16), pattern(16, 4));
}

#[test]
fn test_memsz_below_filesz_is_tolerated() {
    let image = ElfImageBuilder::new(WordSize::Elf64)
        .entry(0x1000)
        .load_with_bss(0x1000, pattern(0x40, 1), 0x10)
        .build();

    let (result, memory, _) = load(image, WordSize::Elf64);
    result.unwrap();
    assert_eq!(memory.read(0x1000, 0x40), pattern(0x40, 1));
}

#[test]
fn test_bad_magic_is_a_format_error() {
    let mut image = ElfImageBuilder::new(WordSize::Elf64)
        .entry(0x1000)
        .load(0x1000, pattern(8, 0))
        .build();
    image[1] = b'X';

    let (result, memory, _) = load(image, WordSize::Elf64);
    assert_eq!(result.unwrap_err(), BootError::Format("File is not a valid ELF file"));
    assert!(memory.is_untouched());
}

#[test]
fn test_class_mismatch_is_a_format_error() {
    let image = ElfImageBuilder::new(WordSize::Elf32)
        .entry(0x1000)
        .load(0x1000, pattern(64, 0))
        .build();

    let (result, _, _) = load(image, WordSize::Elf64);
    assert!(matches!(result.unwrap_err(), BootError::Format(_)));
}

#[test]
fn test_truncated_header_is_a_format_error() {
    let (result, _, _) = load(vec![0x7F, b'E', b'L', b'F', 2, 1, 1], WordSize::Elf64);
    assert_eq!(result.unwrap_err(), BootError::Format("ELF header truncated"));
}

#[test]
fn test_table_offset_past_end_is_a_format_error() {
    let mut image = ElfImageBuilder::new(WordSize::Elf64)
        .entry(0x1000)
        .load(0x1000, pattern(8, 0))
        .build();
    image[32..40].copy_from_slice(&0x10_0000u64.to_le_bytes());

    let (result, _, _) = load(image, WordSize::Elf64);
    assert_eq!(result.unwrap_err(), BootError::Format("Invalid program header offset"));
}

#[test]
fn test_truncated_table_is_a_format_error() {
    let builder = ElfImageBuilder::new(WordSize::Elf64)
        .entry(0x1000)
        .load(0x1000, pattern(8, 0))
        .load(0x2000, pattern(8, 0));
    let mut image = builder.build();
    image.truncate(builder.phdr_offset(1) + 10);

    let (result, _, _) = load(image, WordSize::Elf64);
    assert_eq!(result.unwrap_err(), BootError::Format("Program header table truncated"));
}

#[test]
fn test_missing_file_reports_open_status() {
    let mut volume = RamVolume::new();
    let err = volume.open("u-boot.elf").err().unwrap();
    assert_eq!(err, BootError::Storage(StorageError::new(StorageOp::Open, 4)));
}

#[test]
fn test_file_handle_released_after_load() {
    let image = ElfImageBuilder::new(WordSize::Elf64)
        .entry(0x1000)
        .load(0x1000, pattern(8, 0))
        .build();
    let mut volume = RamVolume::new().with_file("a.elf", image);
    let handles = Rc::clone(&volume.open_handles);
    let events = Rc::new(RefCell::new(Vec::new()));

    {
        let mut file = volume.open("a.elf").unwrap();
        let mut memory = SparseMemory::new();
        let mut cache = RecordingCache::new(&events);
        ElfLoader::new(&mut memory, &mut cache)
            .load(WordSize::Elf64, &mut file)
            .unwrap();
        assert_eq!(handles.get(), 1);
    }
    assert_eq!(handles.get(), 0);
}
