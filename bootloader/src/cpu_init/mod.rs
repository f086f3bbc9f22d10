//! CPU initialization - secondary core reset control

pub mod reset_control;

pub use reset_control::{CoreMask, ResetController};
