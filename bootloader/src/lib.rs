//! MPSoC Loader Library
//!
//! Second-stage loader for the Zynq UltraScale+ MPSoC: reads ELF images from
//! the boot volume, copies their segments to their link addresses, publishes a
//! handoff block for the next stage and restarts the APU cores at the loaded
//! firmware. Hardware and storage sit behind traits so the whole pass runs on
//! the host under test.

#![cfg_attr(not(test), no_std)]

extern crate alloc;

/// Architecture support - cache maintenance, delay, halt
pub mod arch;

/// Boot orchestration - state machine and pass sequencer
pub mod boot_stage;

/// CPU initialization - reset vectors and core release
pub mod cpu_init;

/// Diagnostics - hex dumps
pub mod diagnostics;

/// Domain layer - boot configuration
pub mod domain;

/// Device drivers - UART, console logger
pub mod drivers;

/// Kernel interface - ELF loading and handoff
pub mod kernel_if;

/// Boot heap
pub mod memory;

/// Platform abstraction - storage, memory, cache and register contracts
pub mod platform;

/// Utility library - MMIO
pub mod utils;

pub mod error;

pub use boot_stage::{BootPhase, BootReport, Sequencer};
pub use domain::{BootConfig, BootImage};
pub use error::{BootError, Result};
