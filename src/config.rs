//! Build-time configuration.
//!
//! All values are fixed at compile time; there is no persistence layer.

use crate::error::AudioError;
use crate::hal::period_us;

/// Audio session parameters.
///
/// Board wiring lives with the firmware: the pin drivers are typed per pin.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AudioConfig {
    /// Capture and default playback rate (Hz)
    pub sample_rate: u32,
    /// Recording length (seconds)
    pub record_secs: u32,
    /// Smoothing coefficient, (0, 1]
    pub alpha: f32,
    /// PWM carrier (Hz)
    pub carrier_hz: u32,
    pub looping: bool,
    /// Grace period before any session starts (ms)
    pub boot_delay_ms: u32,
    /// "Ready in n..." lines before recording, one per second
    pub countdown_secs: u32,
    pub record_path: &'static str,
    pub playback_path: &'static str,
}

impl AudioConfig {
    pub const DEFAULT: Self = Self {
        sample_rate: 8000,
        record_secs: 2,
        alpha: 0.6,
        carrier_hz: 20_000,
        looping: false,
        boot_delay_ms: 3000,
        countdown_secs: 3,
        record_path: "record.wav",
        playback_path: "audio.wav",
    };

    /// Check the values the engines would otherwise reject at run time.
    pub fn validate(&self) -> Result<(), AudioError> {
        if period_us(self.sample_rate).is_none() {
            return Err(AudioError::InvalidParameter("sample_rate"));
        }
        if self.record_secs == 0 || self.sample_rate.checked_mul(self.record_secs).is_none() {
            return Err(AudioError::InvalidParameter("record_secs"));
        }
        if !(self.alpha > 0.0 && self.alpha <= 1.0) {
            return Err(AudioError::InvalidParameter("alpha"));
        }
        if self.carrier_hz <= self.sample_rate {
            return Err(AudioError::InvalidParameter("carrier_hz"));
        }
        Ok(())
    }

    /// Samples in one recording.
    pub fn record_samples(&self) -> usize {
        self.sample_rate as usize * self.record_secs as usize
    }
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Configuration the binary runs with.
pub static CONFIG: AudioConfig = AudioConfig::DEFAULT;
