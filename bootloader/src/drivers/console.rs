//! Console logger: `log` backend over any `fmt::Write` sink

use core::fmt::{self, Write};

use log::{LevelFilter, Log, Metadata, Record};
use spin::Mutex;

/// Level used when the `verbose_logging` feature is off
pub const DEFAULT_LEVEL: LevelFilter = LevelFilter::Info;

pub const fn default_level() -> LevelFilter {
    if cfg!(feature = "verbose_logging") {
        LevelFilter::Trace
    } else {
        DEFAULT_LEVEL
    }
}

/// Writes `[LEVEL] target: message` lines, CR-LF terminated
pub struct ConsoleLogger<W: Write + Send> {
    writer: Mutex<Option<W>>,
    level: LevelFilter,
}

impl<W: Write + Send> ConsoleLogger<W> {
    /// Logger with no writer yet; records are dropped until [`Self::attach`]
    pub const fn new(level: LevelFilter) -> Self {
        Self {
            writer: Mutex::new(None),
            level,
        }
    }

    pub fn attach(&self, writer: W) {
        *self.writer.lock() = Some(writer);
    }

    pub fn level(&self) -> LevelFilter {
        self.level
    }

    /// Write a record; output errors are ignored
    fn write_record(writer: &mut W, record: &Record) -> fmt::Result {
        write!(
            writer,
            "[{}] {}: {}\r\n",
            record.level(),
            record.target(),
            record.args()
        )
    }
}

impl<W: Write + Send> Log for ConsoleLogger<W> {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.level
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        // A record raised while the writer is held (a panic inside
        // `write_record`) is dropped rather than spinning forever
        if let Some(mut guard) = self.writer.try_lock() {
            if let Some(writer) = guard.as_mut() {
                let _ = Self::write_record(writer, record);
            }
        }
    }

    fn flush(&self) {}
}

/// Install `logger` as the global `log` backend
pub fn init<W: Write + Send>(
    logger: &'static ConsoleLogger<W>,
) -> Result<(), log::SetLoggerError> {
    log::set_logger(logger)?;
    log::set_max_level(logger.level());
    Ok(())
}
