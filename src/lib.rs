//! # pwm-audio
//!
//! 8-bit PCM capture, conditioning and PWM playback for microcontrollers.
//!
//! ## Architecture
//!
//! ```text
//!  ADC ──▶ CaptureEngine ──▶ smooth ──▶ WAV file
//!                                          │
//!  PWM ◀── PlaybackEngine::on_tick ◀── WAV decode
//!              ▲
//!        periodic timer
//! ```
//!
//! - Capture is a busy-wait loop on absolute deadlines (no drift)
//! - Playback is one duty update per timer tick; the tick never blocks,
//!   never allocates, and only logs through a lock-free ring
//! - Hardware is injected through the [`hal`] traits
//!
//! The core is `no_std`; file I/O, allocating helpers, the session runner
//! and the simulated hardware need the `std` feature.

#![cfg_attr(not(any(test, feature = "std")), no_std)]

pub mod audio;
pub mod config;
pub mod error;
pub mod fault;
pub mod hal;
pub mod log_drain;
pub mod log_globals;
pub mod logging;
#[cfg(feature = "std")]
pub mod session;
pub mod telemetry;
pub mod ticks;

pub use audio::{CaptureEngine, PlaybackEngine, PlaybackState, PlaybackStatus};
pub use config::{AudioConfig, CONFIG};
pub use error::AudioError;
pub use fault::{FaultCode, FaultState};
pub use log_globals::{MAIN_LOG, TICK_LOG};
pub use logging::{LogLevel, LogRing};
pub use ticks::TickSpace;
