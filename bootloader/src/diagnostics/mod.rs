//! Diagnostics - raw buffer dumps

pub mod hexdump;
