// Bring-up state tracking for diagnostics and ordering checks

use core::sync::atomic::{AtomicU32, Ordering};

use crate::error::{BootError, Result};

/// Phases of one boot pass, in the only order they may occur
#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BootPhase {
    Init = 0,
    ImageLoaded = 1,
    HandoffPublished = 2,
    ResetAsserted = 3,
    VectorsProgrammed = 4,
    ResetReleased = 5,
    Running = 6,
    Failed = 0xFFFF_FFFF,
}

impl BootPhase {
    pub fn from_u32(raw: u32) -> Option<Self> {
        Some(match raw {
            0 => BootPhase::Init,
            1 => BootPhase::ImageLoaded,
            2 => BootPhase::HandoffPublished,
            3 => BootPhase::ResetAsserted,
            4 => BootPhase::VectorsProgrammed,
            5 => BootPhase::ResetReleased,
            6 => BootPhase::Running,
            0xFFFF_FFFF => BootPhase::Failed,
            _ => return None,
        })
    }

    /// Whether a pass may go from `self` to `next`
    ///
    /// A load-only pass may finish straight after its images, and a pass that
    /// publishes a handoff block need not release any core.
    pub fn can_advance_to(self, next: BootPhase) -> bool {
        use BootPhase::*;
        matches!(
            (self, next),
            (Init, ImageLoaded)
                | (ImageLoaded, ImageLoaded)
                | (ImageLoaded, HandoffPublished)
                | (ImageLoaded, ResetAsserted)
                | (ImageLoaded, Running)
                | (HandoffPublished, ResetAsserted)
                | (HandoffPublished, Running)
                | (ResetAsserted, VectorsProgrammed)
                | (VectorsProgrammed, ResetReleased)
                | (ResetReleased, Running)
        )
    }
}

/// Last phase reached, readable from a debugger after a halt
pub struct BootState {
    current_phase: AtomicU32,
}

impl BootState {
    pub const fn new() -> Self {
        Self {
            current_phase: AtomicU32::new(BootPhase::Init as u32),
        }
    }

    pub fn set_phase(&self, phase: BootPhase) {
        self.current_phase.store(phase as u32, Ordering::Release);
    }

    pub fn get_phase(&self) -> u32 {
        self.current_phase.load(Ordering::Acquire)
    }
}

impl Default for BootState {
    fn default() -> Self {
        Self::new()
    }
}

pub static BOOT_STATE: BootState = BootState::new();

/// Phase last recorded by any [`BringUp`]
pub fn get_phase() -> Option<BootPhase> {
    BootPhase::from_u32(BOOT_STATE.get_phase())
}

/// Single-pass state machine; every change is mirrored into [`BOOT_STATE`]
#[derive(Debug)]
pub struct BringUp {
    phase: BootPhase,
}

impl BringUp {
    pub fn new() -> Self {
        BOOT_STATE.set_phase(BootPhase::Init);
        Self {
            phase: BootPhase::Init,
        }
    }

    pub fn phase(&self) -> BootPhase {
        self.phase
    }

    pub fn advance(&mut self, next: BootPhase) -> Result {
        if !self.phase.can_advance_to(next) {
            log::error!("Illegal bring-up transition {:?} -> {:?}", self.phase, next);
            return Err(BootError::InvalidState);
        }
        self.phase = next;
        BOOT_STATE.set_phase(next);
        Ok(())
    }

    /// Record a failure; the machine accepts no further transitions
    pub fn fail(&mut self) {
        self.phase = BootPhase::Failed;
        BOOT_STATE.set_phase(BootPhase::Failed);
    }
}

impl Default for BringUp {
    fn default() -> Self {
        Self::new()
    }
}
