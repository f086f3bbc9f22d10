//! Boot Configuration - Pure Value Object
//!
//! Which images to load, in what order, which of them get a handoff entry and
//! which one the APU cores start in. Construction and validation only.
//!
//! # Examples
//!
//! ```
//! # use mpsoc_loader::domain::boot_config::BootConfig;
//! let config = BootConfig::apu();
//! assert!(config.validate().is_ok());
//! assert_eq!(config.images[0].file_name, "bl31.elf");
//! ```

use arrayvec::ArrayVec;
use core::fmt;

use crate::cpu_init::reset_control::CoreMask;
use crate::error::{BootError, Result};
use crate::kernel_if::elf::WordSize;
use crate::kernel_if::kernel_handoff::{HandoffFlags, MAX_HANDOFF_ENTRIES};

/// Most images one pass can load
pub const MAX_BOOT_IMAGES: usize = MAX_HANDOFF_ENTRIES;

/// Pause before touching storage, so the console can be attached
pub const DEFAULT_STARTUP_DELAY_MS: u32 = 3000;

/// One image on the boot volume
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BootImage {
    /// File name on the volume
    pub file_name: &'static str,
    /// ELF class the image must carry
    pub word_size: WordSize,
    /// Handoff entry to record for the image, if any
    pub handoff: Option<HandoffFlags>,
    /// Whether the held cores start at this image's entry point
    pub reset_target: bool,
}

impl BootImage {
    pub const fn new(file_name: &'static str, word_size: WordSize) -> Self {
        Self {
            file_name,
            word_size,
            handoff: None,
            reset_target: false,
        }
    }

    pub const fn with_handoff(mut self, flags: HandoffFlags) -> Self {
        self.handoff = Some(flags);
        self
    }

    pub const fn as_reset_target(mut self) -> Self {
        self.reset_target = true;
        self
    }
}

impl fmt::Display for BootImage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.file_name, self.word_size.as_str())
    }
}

/// Boot configuration - Value Object
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BootConfig {
    /// Logical drive to mount
    pub volume: &'static str,
    /// Images in load order
    pub images: ArrayVec<BootImage, MAX_BOOT_IMAGES>,
    /// Cores held, programmed and released for the reset target
    pub cores: CoreMask,
    /// APU core running the loader; never part of `cores`
    pub controller: Option<usize>,
    /// Entries the handoff block may hold
    pub handoff_capacity: usize,
    pub startup_delay_ms: u32,
}

impl BootConfig {
    /// Empty configuration on `volume`; images are added with [`Self::add_image`]
    pub fn new(volume: &'static str) -> Self {
        Self {
            volume,
            images: ArrayVec::new(),
            cores: CoreMask::empty(),
            controller: None,
            handoff_capacity: MAX_HANDOFF_ENTRIES,
            startup_delay_ms: 0,
        }
    }

    /// APU profile: ARM Trusted Firmware, then U-Boot, all four A53 cores
    /// released into the firmware
    pub fn apu() -> Self {
        let mut config = Self::new("0:");
        config.images.push(
            BootImage::new("bl31.elf", WordSize::Elf64)
                .with_handoff(HandoffFlags::empty())
                .as_reset_target(),
        );
        config.images.push(BootImage::new("u-boot.elf", WordSize::Elf64));
        config.cores = CoreMask::ALL;
        config.startup_delay_ms = DEFAULT_STARTUP_DELAY_MS;
        config
    }

    /// RPU profile: load the 32-bit application image only
    pub fn rpu() -> Self {
        let mut config = Self::new("0:");
        config.images.push(BootImage::new("vxWorks.elf", WordSize::Elf32));
        config.startup_delay_ms = DEFAULT_STARTUP_DELAY_MS;
        config
    }

    /// Record the core running the loader and drop it from the release mask
    ///
    /// The controlling core cannot hold itself in reset and go on to program
    /// vectors, so an APU-hosted loader only brings up its siblings.
    pub fn for_controller(mut self, core: Option<usize>) -> Self {
        if let Some(index) = core {
            let mask = CoreMask::core(index).unwrap_or(CoreMask::empty());
            if self.cores.intersects(mask) {
                log::info!("Leaving controlling APU core {} out of bring-up", index);
                self.cores.remove(mask);
            }
        }
        self.controller = core;
        self
    }

    pub fn add_image(&mut self, image: BootImage) -> Result {
        self.images
            .try_push(image)
            .map_err(|_| BootError::InvalidConfig("Too many boot images"))
    }

    pub fn reset_target(&self) -> Option<&BootImage> {
        self.images.iter().find(|image| image.reset_target)
    }

    pub fn handoff_requests(&self) -> usize {
        self.images.iter().filter(|image| image.handoff.is_some()).count()
    }

    /// Validate configuration
    pub fn validate(&self) -> Result {
        if self.volume.is_empty() {
            return Err(BootError::InvalidConfig("Volume name is empty"));
        }
        if self.images.is_empty() {
            return Err(BootError::InvalidConfig("No boot images configured"));
        }
        if self.images.iter().any(|image| image.file_name.is_empty()) {
            return Err(BootError::InvalidConfig("Boot image has an empty file name"));
        }
        if self.images.iter().filter(|image| image.reset_target).count() > 1 {
            return Err(BootError::InvalidConfig("More than one reset target"));
        }
        if let Some(mask) = self.controller.and_then(CoreMask::core) {
            if self.cores.intersects(mask) {
                return Err(BootError::InvalidConfig(
                    "Release mask includes the controlling core",
                ));
            }
        }
        if self.reset_target().is_some() && self.cores.is_empty() {
            return Err(BootError::InvalidConfig("Reset target without cores to release"));
        }
        if self.handoff_capacity == 0 || self.handoff_capacity > MAX_HANDOFF_ENTRIES {
            return Err(BootError::InvalidConfig("Handoff capacity must be 1..=10"));
        }
        if self.handoff_requests() > self.handoff_capacity {
            return Err(BootError::InvalidConfig("More handoff entries than capacity"));
        }
        Ok(())
    }
}

impl Default for BootConfig {
    fn default() -> Self {
        if cfg!(feature = "rpu_profile") {
            Self::rpu()
        } else {
            Self::apu()
        }
    }
}
