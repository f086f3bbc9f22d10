//! Boot Stage - bring-up state tracking and the pass sequencer

pub mod boot_state;
pub mod sequencer;

pub use boot_state::{BootPhase, BringUp};
pub use sequencer::{BootReport, ImageReport, Sequencer};
