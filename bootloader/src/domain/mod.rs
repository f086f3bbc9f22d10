//! Domain layer - boot configuration value objects

pub mod boot_config;

pub use boot_config::{BootConfig, BootImage};
