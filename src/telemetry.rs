//! Spectrogram telemetry frames.
//!
//! Wire format (little-endian):
//!
//! ```text
//! ┌──────────┬──────────┬────────────────────────────────────┐
//! │ magic    │ length   │ payload: TIME_FRAMES × N_BINS i8   │
//! │ 0xA55A   │ u16      │ frame-major, bin fastest           │
//! └──────────┴──────────┴────────────────────────────────────┘
//! ```
//!
//! The stream has no other framing. A receiver that loses sync drops one
//! byte at a time until the magic lines up. The payload size is fixed, so
//! after a good magic the receiver always takes one full payload; a length
//! field that disagrees is counted, not trusted.

use core::fmt;

pub const MAGIC: u16 = 0xA55A;
pub const HEADER_LEN: usize = 4;
pub const N_BINS: usize = 32;
pub const TIME_FRAMES: usize = 80;
pub const PAYLOAD_LEN: usize = N_BINS * TIME_FRAMES;
pub const FRAME_LEN: usize = HEADER_LEN + PAYLOAD_LEN;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TelemetryError {
    /// Payload length does not fit the u16 length field
    PayloadTooLarge(usize),
    BufferTooSmall { needed: usize },
}

impl fmt::Display for TelemetryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PayloadTooLarge(len) => write!(f, "payload of {} bytes too large", len),
            Self::BufferTooSmall { needed } => write!(f, "output buffer too small, need {} bytes", needed),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for TelemetryError {}

/// Write header and payload into `out`. Returns bytes written.
pub fn encode_frame(payload: &[u8], out: &mut [u8]) -> Result<usize, TelemetryError> {
    let len = u16::try_from(payload.len()).map_err(|_| TelemetryError::PayloadTooLarge(payload.len()))?;
    let needed = HEADER_LEN + payload.len();
    if out.len() < needed {
        return Err(TelemetryError::BufferTooSmall { needed });
    }
    out[0..2].copy_from_slice(&MAGIC.to_le_bytes());
    out[2..4].copy_from_slice(&len.to_le_bytes());
    out[HEADER_LEN..needed].copy_from_slice(payload);
    Ok(needed)
}

/// Incremental frame decoder with byte-wise resynchronization.
///
/// Holds at most one frame; allocation-free.
pub struct FrameParser<const P: usize = PAYLOAD_LEN> {
    header: [u8; HEADER_LEN],
    header_len: usize,
    payload: [u8; P],
    payload_len: usize,
    frames: u32,
    discarded: u32,
    bad_lengths: u32,
}

impl<const P: usize> FrameParser<P> {
    pub const fn new() -> Self {
        Self {
            header: [0; HEADER_LEN],
            header_len: 0,
            payload: [0; P],
            payload_len: 0,
            frames: 0,
            discarded: 0,
            bad_lengths: 0,
        }
    }

    /// Consume one byte. Returns the payload when it completes a frame.
    pub fn push(&mut self, byte: u8) -> Option<&[u8; P]> {
        if self.header_len < HEADER_LEN {
            self.header[self.header_len] = byte;
            self.header_len += 1;
            if self.header_len < HEADER_LEN {
                return None;
            }
            if u16::from_le_bytes([self.header[0], self.header[1]]) != MAGIC {
                self.header.copy_within(1.., 0);
                self.header_len -= 1;
                self.discarded = self.discarded.wrapping_add(1);
                return None;
            }
            if u16::from_le_bytes([self.header[2], self.header[3]]) as usize != P {
                self.bad_lengths = self.bad_lengths.wrapping_add(1);
            }
            if P == 0 {
                return self.complete();
            }
            return None;
        }

        self.payload[self.payload_len] = byte;
        self.payload_len += 1;
        if self.payload_len == P {
            return self.complete();
        }
        None
    }

    /// Consume a chunk, calling `on_frame` for every completed frame.
    /// Returns the number of frames completed.
    pub fn feed<F: FnMut(&[u8; P])>(&mut self, bytes: &[u8], mut on_frame: F) -> usize {
        let mut completed = 0;
        for &byte in bytes {
            if let Some(payload) = self.push(byte) {
                on_frame(payload);
                completed += 1;
            }
        }
        completed
    }

    /// Frames decoded so far.
    pub fn frames(&self) -> u32 {
        self.frames
    }

    /// Bytes dropped while hunting for a header.
    pub fn discarded(&self) -> u32 {
        self.discarded
    }

    /// Headers whose length field did not match the fixed payload size.
    pub fn bad_lengths(&self) -> u32 {
        self.bad_lengths
    }

    /// Drop any partial frame.
    pub fn reset(&mut self) {
        self.header_len = 0;
        self.payload_len = 0;
    }

    fn complete(&mut self) -> Option<&[u8; P]> {
        self.reset();
        self.frames = self.frames.wrapping_add(1);
        Some(&self.payload)
    }
}

impl<const P: usize> Default for FrameParser<P> {
    fn default() -> Self {
        Self::new()
    }
}

/// Value at (`bin`, `frame`), or `None` outside the grid.
#[inline]
pub fn cell(payload: &[u8], bin: usize, frame: usize) -> Option<i8> {
    if bin >= N_BINS {
        return None;
    }
    payload.get(frame * N_BINS + bin).map(|&b| b as i8)
}

/// Move the window left by `n` frames and zero the freed tail.
pub fn shift_frames(payload: &mut [u8], n: usize) {
    let frames = payload.len() / N_BINS;
    let used = frames * N_BINS;
    if n >= frames {
        payload[..used].fill(0);
        return;
    }
    let offset = n * N_BINS;
    payload.copy_within(offset..used, 0);
    payload[used - offset..used].fill(0);
}

/// Shift by one frame and store `column` as the newest frame.
pub fn append_frame(payload: &mut [u8], column: &[i8; N_BINS]) {
    let frames = payload.len() / N_BINS;
    if frames == 0 {
        return;
    }
    shift_frames(payload, 1);
    let start = (frames - 1) * N_BINS;
    for (dst, &src) in payload[start..start + N_BINS].iter_mut().zip(column) {
        *dst = src as u8;
    }
}
