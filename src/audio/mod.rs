//! Audio path: capture, conditioning, storage and playback.
//!
//! Architecture:
//! - Capture: busy-wait paced ADC reads into a preallocated buffer
//! - Filter: single-pole low-pass, in place
//! - WAV: 8-bit unsigned mono PCM container
//! - Playback: periodic timer tick writes one sample per PWM duty update
//! - Spectrum: windowed FFT columns for the telemetry spectrogram (`std`)

pub mod capture;
pub mod filter;
pub mod level;
pub mod playback;
#[cfg(feature = "std")]
pub mod spectrum;
pub mod wav;

pub use capture::{CaptureEngine, CaptureReport};
pub use filter::smooth;
pub use level::{measure, Level, PCM_CENTER};
pub use playback::{supervise, PlaybackEngine, PlaybackState, PlaybackStatus};
#[cfg(feature = "std")]
pub use spectrum::SpectrumPipeline;
pub use wav::{Wav, WavDescriptor, WavError};
