// Cadence UART (UART0 on the MPSoC), transmit path only
// The boot ROM and FSBL leave the controller configured; only the FIFO is used.

use core::fmt;

use crate::utils::mmio::Mmio32;

/// UART0 base address
pub const UART0_BASE: usize = 0xFF00_0000;

const CHANNEL_STS_OFFSET: usize = 0x2C;
const TX_RX_FIFO_OFFSET: usize = 0x30;

/// Transmit FIFO full
const STS_TXFULL: u32 = 1 << 4;

pub struct CadenceUart {
    status: Mmio32,
    fifo: Mmio32,
}

impl CadenceUart {
    /// # Safety
    /// `base` must be the base of a Cadence UART that is already configured
    /// and not driven by anything else.
    pub const unsafe fn new(base: usize) -> Self {
        // SAFETY: forwarded to the caller
        unsafe {
            Self {
                status: Mmio32::new(base + CHANNEL_STS_OFFSET),
                fifo: Mmio32::new(base + TX_RX_FIFO_OFFSET),
            }
        }
    }

    pub fn write_byte(&mut self, byte: u8) {
        while self.status.read() & STS_TXFULL != 0 {
            core::hint::spin_loop();
        }
        self.fifo.write(byte as u32);
    }
}

// SAFETY: the registers are fixed device addresses, valid from any core;
// exclusive use is promised by the caller of `new`.
unsafe impl Send for CadenceUart {}

impl fmt::Write for CadenceUart {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        for byte in s.bytes() {
            self.write_byte(byte);
        }
        Ok(())
    }
}
