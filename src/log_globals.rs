//! Global log rings.
//!
//! One ring per producer context, as `LogRing` is single-producer.

use crate::logging::LogRing;

/// Ring for the playback timer tick.
///
/// Single producer (the tick callback), single consumer (console drain).
pub static TICK_LOG: LogRing = LogRing::new();

/// Ring for the foreground task (sessions, capture, startup).
///
/// Single producer (main task), single consumer (console drain).
pub static MAIN_LOG: LogRing = LogRing::new();
