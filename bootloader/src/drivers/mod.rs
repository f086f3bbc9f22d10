//! Device drivers - UART and the console logger on top of it

pub mod console;
pub mod uart;

pub use console::ConsoleLogger;
pub use uart::CadenceUart;
