//! Console output for the log rings.
//!
//! Runs in the foreground only; formatting and writing may block.
//!
//! Output format: `[     stamp] LEVEL: message`

use core::fmt::Write;

use crate::logging::{LogRecord, LogRing};

/// Write one record as a single line.
pub fn write_record<W: Write>(out: &mut W, record: &LogRecord) -> core::fmt::Result {
    writeln!(
        out,
        "[{:10}] {}: {}",
        record.stamp,
        record.level.as_str(),
        record.message()
    )
}

/// Drain every pending record of `ring` into `out`.
///
/// Records lost to a full ring since the last drain are reported once,
/// after the drained lines.
/// Returns the number of records written.
pub fn drain_to<W: Write, const N: usize>(ring: &LogRing<N>, out: &mut W) -> usize {
    let mut written = 0;
    while let Some(record) = ring.drain() {
        if write_record(out, &record).is_err() {
            break;
        }
        written += 1;
    }

    let dropped = ring.take_dropped();
    if dropped > 0 {
        let _ = writeln!(out, "[{:>10}] WARN: {} log records dropped", "-", dropped);
    }
    written
}
