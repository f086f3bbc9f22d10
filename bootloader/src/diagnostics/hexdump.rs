// Hex dump of raw buffers for bring-up debugging

use arrayvec::ArrayString;
use core::fmt::Write;

pub const BYTES_PER_LINE: usize = 16;

/// Capacity of one formatted line: offset, 16 hex columns, ASCII gutter
pub type DumpLine = ArrayString<80>;

/// Format one dump line, e.g. `00000010  7F 45 4C 46 ...  |.ELF...|`
///
/// `chunk` holds at most [`BYTES_PER_LINE`] bytes; short chunks are padded so
/// the ASCII gutter stays aligned.
pub fn format_line(offset: usize, chunk: &[u8]) -> DumpLine {
    let mut line = DumpLine::new();
    let _ = write!(line, "{:08X}  ", offset);

    for i in 0..BYTES_PER_LINE {
        match chunk.get(i) {
            Some(byte) => {
                let _ = write!(line, "{:02X} ", byte);
            }
            None => line.push_str("   "),
        }
    }

    line.push_str(" |");
    for &byte in chunk.iter().take(BYTES_PER_LINE) {
        line.push(if (32..127).contains(&byte) { byte as char } else { '.' });
    }
    line.push('|');
    line
}

/// Emit `bytes` at trace level, one line per 16 bytes
pub fn trace_dump(bytes: &[u8]) {
    if !log::log_enabled!(log::Level::Trace) {
        return;
    }

    for (i, chunk) in bytes.chunks(BYTES_PER_LINE).enumerate() {
        log::trace!("{}", format_line(i * BYTES_PER_LINE, chunk).as_str());
    }
}
