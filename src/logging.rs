//! RT-safe logging.
//!
//! ```text
//! timer tick / main task     LogRing              console drain
//! ──────────────────────     ───────              ─────────────
//!
//! rt_log!() ───────────────▶ [R0][R1][R2] ──────▶ stdout / UART
//! no alloc, no lock           SPSC ring            blocking ok
//! ```
//!
//! - The tick context never prints. It formats into a stack buffer and
//!   pushes a fixed-size record.
//! - Each ring has exactly one producer and one consumer.
//! - Records are dropped (and counted) when the ring is full.

use core::cell::UnsafeCell;
use core::sync::atomic::{AtomicU32, Ordering};

/// Maximum message length.
pub const MAX_MSG_LEN: usize = 96;

/// Default ring capacity (number of records).
pub const LOG_RING_SIZE: usize = 64;

/// Log level.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
#[repr(u8)]
pub enum LogLevel {
    Error = 0,
    Warn = 1,
    Info = 2,
    Debug = 3,
}

impl LogLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            LogLevel::Error => "ERROR",
            LogLevel::Warn => "WARN",
            LogLevel::Info => "INFO",
            LogLevel::Debug => "DEBUG",
        }
    }
}

/// A single log record.
///
/// `stamp` is chosen by the producer: microseconds from the capture clock
/// in the foreground, the tick index inside the playback tick.
#[derive(Clone, Copy)]
pub struct LogRecord {
    pub stamp: u32,
    pub level: LogLevel,
    pub len: u8,
    pub msg: [u8; MAX_MSG_LEN],
}

impl LogRecord {
    const EMPTY: Self = Self {
        stamp: 0,
        level: LogLevel::Info,
        len: 0,
        msg: [0; MAX_MSG_LEN],
    };

    /// Message text; invalid UTF-8 (a cut multi-byte char) is trimmed.
    pub fn message(&self) -> &str {
        let bytes = &self.msg[..self.len as usize];
        match core::str::from_utf8(bytes) {
            Ok(s) => s,
            Err(e) => core::str::from_utf8(&bytes[..e.valid_up_to()]).unwrap_or(""),
        }
    }
}

impl Default for LogRecord {
    fn default() -> Self {
        Self::EMPTY
    }
}

/// Fixed-capacity single-producer/single-consumer log ring.
pub struct LogRing<const N: usize = LOG_RING_SIZE> {
    records: UnsafeCell<[LogRecord; N]>,
    write_idx: AtomicU32,
    read_idx: AtomicU32,
    dropped: AtomicU32,
}

// SAFETY: one producer writes only the slot at write_idx and publishes it
// with a Release store; one consumer reads only slots below write_idx and
// frees them with a Release store of read_idx. Slots are never shared.
unsafe impl<const N: usize> Sync for LogRing<N> {}
unsafe impl<const N: usize> Send for LogRing<N> {}

impl<const N: usize> LogRing<N> {
    const MASK: u32 = N as u32 - 1;

    pub const fn new() -> Self {
        assert!(N.is_power_of_two(), "Log ring size must be power of 2");

        Self {
            records: UnsafeCell::new([LogRecord::EMPTY; N]),
            write_idx: AtomicU32::new(0),
            read_idx: AtomicU32::new(0),
            dropped: AtomicU32::new(0),
        }
    }

    /// Queue a record. Never blocks.
    ///
    /// Returns `false` if the ring was full and the record was dropped.
    #[inline]
    pub fn push(&self, stamp: u32, level: LogLevel, msg: &[u8]) -> bool {
        let write = self.write_idx.load(Ordering::Relaxed);
        let read = self.read_idx.load(Ordering::Acquire);

        if write.wrapping_sub(read) >= N as u32 {
            self.dropped.fetch_add(1, Ordering::Relaxed);
            return false;
        }

        let len = msg.len().min(MAX_MSG_LEN);

        // SAFETY: single producer; the consumer does not touch this slot
        // until write_idx is advanced below.
        unsafe {
            let record = &mut (*self.records.get())[(write & Self::MASK) as usize];
            record.stamp = stamp;
            record.level = level;
            record.len = len as u8;
            record.msg[..len].copy_from_slice(&msg[..len]);
        }

        self.write_idx.store(write.wrapping_add(1), Ordering::Release);
        true
    }

    /// Take the oldest record, if any.
    #[inline]
    pub fn drain(&self) -> Option<LogRecord> {
        let read = self.read_idx.load(Ordering::Relaxed);
        let write = self.write_idx.load(Ordering::Acquire);

        if read == write {
            return None;
        }

        // SAFETY: single consumer; the slot was published by the producer.
        let record = unsafe { (*self.records.get())[(read & Self::MASK) as usize] };

        self.read_idx.store(read.wrapping_add(1), Ordering::Release);
        Some(record)
    }

    #[inline]
    pub fn dropped(&self) -> u32 {
        self.dropped.load(Ordering::Relaxed)
    }

    /// Read and reset the dropped counter (after reporting it).
    #[inline]
    pub fn take_dropped(&self) -> u32 {
        self.dropped.swap(0, Ordering::Relaxed)
    }

    /// Records waiting to be drained.
    #[inline]
    pub fn pending(&self) -> u32 {
        let read = self.read_idx.load(Ordering::Relaxed);
        let write = self.write_idx.load(Ordering::Acquire);
        write.wrapping_sub(read)
    }
}

impl<const N: usize> Default for LogRing<N> {
    fn default() -> Self {
        Self::new()
    }
}

/// Format into a byte buffer, truncating at its end.
///
/// Returns the number of bytes written.
#[inline]
pub fn format_to_buffer(buf: &mut [u8], args: core::fmt::Arguments<'_>) -> usize {
    let mut writer = SliceWriter { buf, pos: 0 };
    let _ = core::fmt::write(&mut writer, args);
    writer.pos
}

/// `core::fmt::Write` over a fixed byte slice; excess output is cut off.
pub struct SliceWriter<'a> {
    pub buf: &'a mut [u8],
    pub pos: usize,
}

impl core::fmt::Write for SliceWriter<'_> {
    fn write_str(&mut self, s: &str) -> core::fmt::Result {
        let bytes = s.as_bytes();
        let to_write = bytes.len().min(self.buf.len() - self.pos);
        self.buf[self.pos..self.pos + to_write].copy_from_slice(&bytes[..to_write]);
        self.pos += to_write;
        Ok(())
    }
}

/// RT-safe log macro.
///
/// ```ignore
/// rt_log!(LogLevel::Info, ring, stamp, "loop {} done", n);
/// ```
#[macro_export]
macro_rules! rt_log {
    ($level:expr, $ring:expr, $stamp:expr, $($arg:tt)*) => {{
        let mut buf = [0u8; $crate::logging::MAX_MSG_LEN];
        let len = $crate::logging::format_to_buffer(&mut buf, format_args!($($arg)*));
        $ring.push($stamp, $level, &buf[..len]);
    }};
}

#[macro_export]
macro_rules! rt_error {
    ($ring:expr, $stamp:expr, $($arg:tt)*) => {
        $crate::rt_log!($crate::logging::LogLevel::Error, $ring, $stamp, $($arg)*)
    };
}

#[macro_export]
macro_rules! rt_warn {
    ($ring:expr, $stamp:expr, $($arg:tt)*) => {
        $crate::rt_log!($crate::logging::LogLevel::Warn, $ring, $stamp, $($arg)*)
    };
}

#[macro_export]
macro_rules! rt_info {
    ($ring:expr, $stamp:expr, $($arg:tt)*) => {
        $crate::rt_log!($crate::logging::LogLevel::Info, $ring, $stamp, $($arg)*)
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_and_drain() {
        let ring = LogRing::<16>::new();

        assert!(ring.push(1000, LogLevel::Info, b"capture done"));
        assert_eq!(ring.pending(), 1);

        let record = ring.drain().unwrap();
        assert_eq!(record.stamp, 1000);
        assert_eq!(record.level, LogLevel::Info);
        assert_eq!(record.message(), "capture done");

        assert!(ring.drain().is_none());
    }

    #[test]
    fn test_full_ring_drops() {
        let ring = LogRing::<4>::new();

        for i in 0..4 {
            assert!(ring.push(i, LogLevel::Info, b"x"));
        }
        assert!(!ring.push(5, LogLevel::Info, b"y"));
        assert_eq!(ring.dropped(), 1);

        // Drain one, should be able to push again
        assert_eq!(ring.drain().unwrap().stamp, 0);
        assert!(ring.push(6, LogLevel::Info, b"z"));
        assert_eq!(ring.pending(), 4);
    }

    #[test]
    fn test_long_message_truncated() {
        let ring = LogRing::<2>::new();
        let long = [b'a'; MAX_MSG_LEN + 20];
        ring.push(0, LogLevel::Warn, &long);
        assert_eq!(ring.drain().unwrap().len as usize, MAX_MSG_LEN);
    }

    #[test]
    fn test_macro_formats() {
        let ring = LogRing::<4>::new();
        crate::rt_error!(ring, 7, "fault at {}", 42);

        let record = ring.drain().unwrap();
        assert_eq!(record.level, LogLevel::Error);
        assert_eq!(record.message(), "fault at 42");
    }

    #[test]
    fn test_cut_utf8_is_trimmed() {
        let mut record = LogRecord::default();
        let text = "ab\u{00e9}".as_bytes(); // 'é' is two bytes
        record.msg[..3].copy_from_slice(&text[..3]);
        record.len = 3;
        assert_eq!(record.message(), "ab");
    }

    #[test]
    fn test_spsc_across_threads() {
        use std::sync::Arc;
        use std::thread;

        let ring = Arc::new(LogRing::<8>::new());
        let producer = {
            let ring = Arc::clone(&ring);
            thread::spawn(move || {
                let mut sent = 0u32;
                while sent < 200 {
                    if ring.push(sent, LogLevel::Debug, b"tick") {
                        sent += 1;
                    }
                }
            })
        };

        let mut expected = 0u32;
        while expected < 200 {
            if let Some(record) = ring.drain() {
                assert_eq!(record.stamp, expected);
                expected += 1;
            }
        }
        producer.join().unwrap();
    }
}
