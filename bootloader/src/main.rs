//! MPSoC loader firmware image
//!
//! Linked against the Xilinx standalone BSP, whose startup code initialises
//! the stack and caches and then calls `main`.

#![cfg_attr(target_os = "none", no_std)]
#![cfg_attr(target_os = "none", no_main)]

#[cfg(target_os = "none")]
mod firmware {
    use core::ffi::c_int;
    use core::panic::PanicInfo;

    use mpsoc_loader::arch::{self, ArchCache};
    use mpsoc_loader::boot_stage::boot_state;
    use mpsoc_loader::drivers::console::{self, default_level, ConsoleLogger};
    use mpsoc_loader::drivers::uart::{CadenceUart, UART0_BASE};
    use mpsoc_loader::kernel_if::kernel_handoff::{claim_static_storage, ScratchRegister};
    use mpsoc_loader::memory::{BumpAllocator, BOOTLOADER_HEAP_SIZE};
    use mpsoc_loader::platform::fatfs::FatVolume;
    use mpsoc_loader::platform::{DirectMemory, MmioRegisterFile};
    use mpsoc_loader::{BootConfig, BootError, BootReport, Result, Sequencer};

    #[global_allocator]
    static HEAP: BumpAllocator<BOOTLOADER_HEAP_SIZE> = BumpAllocator::new();

    static LOGGER: ConsoleLogger<CadenceUart> = ConsoleLogger::new(default_level());

    #[unsafe(no_mangle)]
    pub extern "C" fn main() -> c_int {
        // SAFETY: UART0 is configured by the boot ROM and used only here
        LOGGER.attach(unsafe { CadenceUart::new(UART0_BASE) });
        let _ = console::init(&LOGGER);
        log::info!("MPSoC loader {}", env!("CARGO_PKG_VERSION"));

        let config = BootConfig::default().for_controller(arch::current_apu_core());
        if config.startup_delay_ms > 0 {
            log::info!("Waiting {} ms before loading", config.startup_delay_ms);
            arch::delay_ms(config.startup_delay_ms);
        }

        match boot(&config) {
            Ok(report) => {
                for image in &report.images {
                    log::info!("{}: entry {:#x}", image.file_name, image.entry);
                }
                log::info!(
                    "Boot pass complete; {} handoff entries",
                    report.handoff_entries()
                );
            }
            Err(err) => {
                log::error!("{} - {}", err, err.description());
                if err.is_image_fault() {
                    log::error!("Rebuild or replace the image on volume {}", config.volume);
                }
            }
        }

        arch::halt()
    }

    fn boot(config: &BootConfig) -> Result<BootReport> {
        let storage = claim_static_storage().ok_or(BootError::InvalidState)?;

        // SAFETY: single volume and memory instance; the two register files
        // touch disjoint registers (reset block vs. PMU scratch)
        let mut volume = unsafe { FatVolume::new(config.volume) };
        let mut memory = unsafe { DirectMemory::new() };
        let mut regs = unsafe { MmioRegisterFile::new() };
        let mut scratch_regs = unsafe { MmioRegisterFile::new() };
        let mut cache = ArchCache;

        let mut sink = ScratchRegister::new(&mut scratch_regs);
        Sequencer::new(config, &mut volume, &mut memory, &mut cache, &mut regs)
            .run(storage, &mut sink)
    }

    #[panic_handler]
    fn panic(info: &PanicInfo) -> ! {
        log::error!("PANIC in phase {:?}: {}", boot_state::get_phase(), info);
        arch::halt()
    }
}

#[cfg(not(target_os = "none"))]
fn main() {
    eprintln!(
        "mpsoc-loader runs on the MPSoC; \
         build it for aarch64-unknown-none or armv7r-none-eabihf"
    );
}
