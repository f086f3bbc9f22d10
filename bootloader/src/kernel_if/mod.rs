//! Kernel interface - ELF parsing, segment loading and stage handoff

pub mod elf;
pub mod elf_loader;
pub mod kernel_handoff;

pub use elf::{Elf32, Elf64, ElfClass, ElfHeader, ProgramHeader, WordSize};
pub use elf_loader::{ElfLoader, LoadedImage, LoadedSegment};
pub use kernel_handoff::{HandoffBuilder, HandoffFlags, HandoffParams, HandoffSink, ScratchRegister};
