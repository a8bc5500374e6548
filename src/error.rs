//! Crate-level error type.

use crate::audio::wav::WavError;
use crate::fault::FaultCode;
use crate::hal::HalError;

/// Error surfaced synchronously to the caller of a capture, codec or
/// playback operation. Nothing here is retried automatically.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AudioError {
    /// Malformed or unsupported WAV container
    Format(WavError),
    /// Storage read/write failure
    #[cfg(feature = "std")]
    Io(std::io::ErrorKind),
    /// Peripheral failure outside the playback tick
    Hardware(HalError),
    /// Playback ended in the Faulted state; start a new session
    Faulted(FaultCode),
    /// Argument outside its documented range
    InvalidParameter(&'static str),
    /// Start called while already playing
    AlreadyPlaying,
    /// Cancelled by the caller; hardware was torn down first
    Interrupted,
}

impl core::fmt::Display for AudioError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Format(e) => write!(f, "format error: {}", e),
            #[cfg(feature = "std")]
            Self::Io(kind) => write!(f, "I/O error: {}", kind),
            Self::Hardware(e) => write!(f, "hardware fault: {}", e),
            Self::Faulted(code) => write!(f, "playback faulted: {}", code),
            Self::InvalidParameter(what) => write!(f, "invalid parameter: {}", what),
            Self::AlreadyPlaying => f.write_str("already playing"),
            Self::Interrupted => f.write_str("interrupted"),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for AudioError {}

impl From<WavError> for AudioError {
    fn from(e: WavError) -> Self {
        Self::Format(e)
    }
}

impl From<HalError> for AudioError {
    fn from(e: HalError) -> Self {
        Self::Hardware(e)
    }
}

#[cfg(feature = "std")]
impl From<std::io::Error> for AudioError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e.kind())
    }
}
