//! Boot pass sequencer
//!
//! Drives one complete pass over a [`BootConfig`]: mount, load every image in
//! order, publish the handoff block, then bring the configured cores up at the
//! reset target's entry point.

use arrayvec::ArrayVec;

use crate::boot_stage::boot_state::{BootPhase, BringUp};
use crate::cpu_init::reset_control::{CoreMask, ResetController};
use crate::domain::boot_config::{BootConfig, BootImage, MAX_BOOT_IMAGES};
use crate::error::{BootError, Result};
use crate::kernel_if::elf_loader::{ElfLoader, LoadedImage};
use crate::kernel_if::kernel_handoff::{HandoffBuilder, HandoffParams, HandoffSink};
use crate::platform::{CacheMaintenance, PhysicalMemory, RegisterFile, Volume};

/// Summary of one loaded image
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageReport {
    pub file_name: &'static str,
    pub entry: u64,
    pub segments: usize,
}

/// Outcome of a successful pass
#[derive(Debug)]
pub struct BootReport {
    pub images: ArrayVec<ImageReport, MAX_BOOT_IMAGES>,
    /// Published block, when any image requested an entry
    pub handoff: Option<&'static HandoffParams>,
    /// Cores released and the vector they start at
    pub released: Option<(CoreMask, u32)>,
}

impl BootReport {
    pub fn handoff_entries(&self) -> u32 {
        self.handoff.map_or(0, |params| params.num_entries)
    }
}

pub struct Sequencer<'a, V, M, K, R>
where
    V: Volume,
    M: PhysicalMemory,
    K: CacheMaintenance,
    R: RegisterFile,
{
    config: &'a BootConfig,
    volume: &'a mut V,
    memory: &'a mut M,
    cache: &'a mut K,
    regs: &'a mut R,
    state: BringUp,
}

impl<'a, V, M, K, R> Sequencer<'a, V, M, K, R>
where
    V: Volume,
    M: PhysicalMemory,
    K: CacheMaintenance,
    R: RegisterFile,
{
    pub fn new(
        config: &'a BootConfig,
        volume: &'a mut V,
        memory: &'a mut M,
        cache: &'a mut K,
        regs: &'a mut R,
    ) -> Self {
        Self {
            config,
            volume,
            memory,
            cache,
            regs,
            state: BringUp::new(),
        }
    }

    pub fn phase(&self) -> BootPhase {
        self.state.phase()
    }

    /// Run the pass; on error the phase is left at [`BootPhase::Failed`]
    ///
    /// The handoff block is built in `handoff_storage` and its address given
    /// to `sink` (the scratch register on hardware).
    pub fn run<S: HandoffSink>(
        &mut self,
        handoff_storage: &'static mut HandoffParams,
        sink: &mut S,
    ) -> Result<BootReport> {
        let result = self.run_pass(handoff_storage, sink);
        if let Err(ref err) = result {
            log::error!("Boot pass failed in phase {:?}: {}", self.state.phase(), err);
            self.state.fail();
        }
        result
    }

    fn run_pass<S: HandoffSink>(
        &mut self,
        handoff_storage: &'static mut HandoffParams,
        sink: &mut S,
    ) -> Result<BootReport> {
        let config = self.config;
        config.validate()?;

        self.volume.mount()?;
        log::info!("Volume {} mounted successfully", config.volume);

        let mut report = BootReport {
            images: ArrayVec::new(),
            handoff: None,
            released: None,
        };
        let mut reset_entry = None;

        for image in &config.images {
            let loaded = self.load_image(image)?;
            self.state.advance(BootPhase::ImageLoaded)?;

            if image.reset_target {
                let entry = u32::try_from(loaded.entry).map_err(|_| {
                    log::error!(
                        "{}: entry {:#x} does not fit the vector register",
                        image,
                        loaded.entry
                    );
                    BootError::EntryOutOfRange(loaded.entry)
                })?;
                reset_entry = Some(entry);
            }

            report
                .images
                .try_push(ImageReport {
                    file_name: image.file_name,
                    entry: loaded.entry,
                    segments: loaded.segments.len(),
                })
                .map_err(|_| BootError::InvalidConfig("Too many boot images"))?;
        }

        if config.handoff_requests() > 0 {
            report.handoff = Some(self.publish_handoff(handoff_storage, sink, &report)?);
            self.state.advance(BootPhase::HandoffPublished)?;
        }

        if let Some(entry) = reset_entry {
            self.bring_up(entry)?;
            report.released = Some((config.cores, entry));
        }

        self.state.advance(BootPhase::Running)?;
        Ok(report)
    }

    fn load_image(&mut self, image: &BootImage) -> Result<LoadedImage> {
        log::info!("Loading {}", image);
        let mut file = self.volume.open(image.file_name)?;
        let loaded = ElfLoader::new(&mut *self.memory, &mut *self.cache)
            .load(image.word_size, &mut file)?;
        log::info!("{} loaded, entry point {:#x}", image.file_name, loaded.entry);
        Ok(loaded)
    }

    fn publish_handoff<S: HandoffSink>(
        &mut self,
        storage: &'static mut HandoffParams,
        sink: &mut S,
        report: &BootReport,
    ) -> Result<&'static HandoffParams> {
        let config = self.config;
        let mut builder = HandoffBuilder::new(storage, config.handoff_capacity)?;
        for (image, loaded) in config.images.iter().zip(&report.images) {
            if let Some(flags) = image.handoff {
                builder.add_entry(loaded.entry, flags)?;
            }
        }
        builder.publish(sink, &mut *self.cache)
    }

    fn bring_up(&mut self, entry: u32) -> Result {
        let controller = ResetController::new(&mut *self.regs, &mut *self.cache);

        let held = controller.hold(self.config.cores)?;
        self.state.advance(BootPhase::ResetAsserted)?;

        let programmed = held.program_vectors(entry)?;
        self.state.advance(BootPhase::VectorsProgrammed)?;

        programmed.release()?;
        self.state.advance(BootPhase::ResetReleased)?;

        log::info!("APU cores {:#x} released at {:#010x}", self.config.cores.bits(), entry);
        Ok(())
    }
}
