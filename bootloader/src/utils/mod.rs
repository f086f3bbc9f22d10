//! Utility library - MMIO register access

pub mod mmio;
